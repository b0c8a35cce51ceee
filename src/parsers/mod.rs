pub mod detail;
pub mod extractor;
pub mod marks;
pub mod summary;
