// tests/integration_test.rs

use dotenvy::from_path;
use teachassist_core::{ClientConfig, Credentials, MarkSource, Result, TeachAssistClient};
use std::env;
use std::path::PathBuf;

/// End-to-end run against the live portal.
///
/// To run this test:
/// TA_USERNAME="student_number" TA_PASSWORD="password" cargo test -- --ignored --nocapture
#[tokio::test]
#[ignore = "talks to the live TeachAssist portal"]
async fn test_full_login_and_scrape_flow() -> Result<()> {
    // Load .env from project root
    let env_path = PathBuf::from(env!("CARGO_MANIFEST_DIR")).join(".env");
    from_path(&env_path).ok();

    let username = env::var("TA_USERNAME").expect("ERROR: TA_USERNAME environment variable not set.");
    let password = env::var("TA_PASSWORD").expect("ERROR: TA_PASSWORD environment variable not set.");

    let client = TeachAssistClient::with_config(ClientConfig::from_env());

    // --- STEP 1: Login ---
    let session = client.login(&username, &password).await?;
    assert_eq!(session.identifier(), username);

    // --- STEP 2: Course list ---
    let courses = client.fetch_courses(&session).await?;
    assert!(!courses.is_empty(), "Course list should not be empty");

    // --- STEP 3: First course with a detail page ---
    if let Some(course) = courses.iter().find(|c| c.detail_link.is_some()) {
        let assignments = client.fetch_course_detail(&session, course).await?;
        println!("{} has {} assignments", course.code, assignments.len());
    }

    // --- STEP 4: Whole pipeline with a fresh session ---
    let snapshot = client.fetch_all(&Credentials::new(&username, &password)).await?;
    for course in &snapshot.courses {
        match course.mark_source {
            MarkSource::Unavailable => assert_eq!(course.overall_mark, None),
            _ => assert!(course.overall_mark.is_some()),
        }
    }
    println!("{}", serde_json::to_string_pretty(&snapshot).unwrap());

    Ok(())
}
