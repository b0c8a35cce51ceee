// Declare all our modules
mod aggregate;
mod client;
mod config;
mod error;
mod models;
pub mod parsers;
mod rate_limit;

// Publicly export the parts of our library that users will need
pub use aggregate::{aggregate, category_average, category_averages, weighted_overall};
pub use client::{SessionContext, TeachAssistClient};
pub use config::{ClientConfig, DEFAULT_BASE_URL, DelayConfig};
pub use error::{ErrorKind, Result, ScraperError};
pub use models::*; // Exposes all structs like CourseRecord, MarkEntry, etc.
pub use rate_limit::RequestBudget;
