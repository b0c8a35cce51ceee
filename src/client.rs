use crate::aggregate::aggregate;
use crate::config::{ClientConfig, DelayConfig};
use crate::error::{Result, ScraperError};
use crate::models::{AssignmentRecord, CourseDetail, CourseRecord, CourseSnapshot, CourseSummary, Credentials};
use crate::parsers;
use crate::rate_limit::RequestBudget;
use backon::{ExponentialBuilder, Retryable};
use chrono::{DateTime, Utc};
use futures::{StreamExt, TryStreamExt, stream};
use rand::Rng;
use reqwest::cookie::Jar;
use reqwest::header::{HeaderMap, HeaderValue, USER_AGENT};
use std::collections::HashMap;
use std::future::Future;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::Mutex;
use tracing::{debug, info, instrument, warn};

const LOGIN_PATH: &str = "index.php";
const LISTING_PATH: &str = "students/listReports.php";
const DETAIL_DIR: &str = "students/";

const BROWSER_UA: &str = "Mozilla/5.0 (Windows NT 10.0; Win64; x64) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/100.0.0.0 Safari/537.36";

/// Body text the portal shows after a rejected login.
const INVALID_CREDENTIAL_MARKERS: &[&str] = &["Invalid Student Number or Password"];

/// Body text of the login page itself. After a login POST it means the
/// credentials were refused; on a report page it means the session cookie
/// was not accepted.
const LOGIN_PAGE_MARKERS: &[&str] = &["YRDSB teachassist login"];

/// Cookie state for one login. Every request made with it carries the
/// cookies the portal set during that login and nothing else.
#[derive(Debug, Clone)]
pub struct SessionContext {
    identifier: String,
    http: reqwest::Client,
    established_at: DateTime<Utc>,
}

impl SessionContext {
    pub fn identifier(&self) -> &str {
        &self.identifier
    }

    pub fn established_at(&self) -> DateTime<Utc> {
        self.established_at
    }
}

pub struct TeachAssistClient {
    config: ClientConfig,
    limiter: RequestBudget,
    login_locks: Mutex<HashMap<String, Arc<Mutex<()>>>>,
}

impl Default for TeachAssistClient {
    fn default() -> Self {
        Self::new()
    }
}

impl TeachAssistClient {
    pub fn new() -> Self {
        Self::with_config(ClientConfig::default())
    }

    pub fn with_config(config: ClientConfig) -> Self {
        Self {
            limiter: RequestBudget::per_minute(config.requests_per_minute),
            config,
            login_locks: Mutex::new(HashMap::new()),
        }
    }

    pub fn config(&self) -> &ClientConfig {
        &self.config
    }

    fn build_http(&self) -> Result<reqwest::Client> {
        let cookie_jar = Arc::new(Jar::default());

        let mut headers = HeaderMap::new();
        headers.insert(USER_AGENT, HeaderValue::from_static(BROWSER_UA));

        Ok(reqwest::Client::builder()
            .cookie_provider(cookie_jar)
            .default_headers(headers)
            .timeout(self.config.timeout)
            .build()?)
    }

    fn url(&self, path: &str) -> String {
        if path.starts_with("http://") || path.starts_with("https://") {
            return path.to_string();
        }
        format!("{}{}", self.config.base_url, path.trim_start_matches('/'))
    }

    /// Detail links on the listing page are relative to the `students/` directory.
    fn detail_url(&self, link: &str) -> String {
        if link.contains('/') {
            self.url(link)
        } else {
            self.url(&format!("{}{}", DETAIL_DIR, link))
        }
    }

    /// Spends one unit of request budget, then waits out the politeness delay.
    async fn pace(&self) -> Result<()> {
        self.limiter.try_acquire()?;
        if self.config.delay.enabled {
            let ms = jitter_ms(&self.config.delay);
            tokio::time::sleep(Duration::from_millis(ms)).await;
        }
        Ok(())
    }

    /// Logs into TeachAssist and returns the resulting session.
    ///
    /// Logins for the same identifier are serialized; the portal ties a
    /// session to a single login call.
    #[instrument(skip(self, secret))]
    pub async fn login(&self, identifier: &str, secret: &str) -> Result<SessionContext> {
        let lock = {
            let mut locks = self.login_locks.lock().await;
            locks.entry(identifier.to_string()).or_default().clone()
        };
        let result = {
            let _guard = lock.lock().await;
            self.login_once(identifier, secret).await
        };

        let mut locks = self.login_locks.lock().await;
        if Arc::strong_count(&lock) <= 2 {
            locks.remove(identifier);
        }
        result
    }

    async fn login_once(&self, identifier: &str, secret: &str) -> Result<SessionContext> {
        let http = self.build_http()?;
        let login_url = self.url(LOGIN_PATH);

        // --- STEP 1: GET the login page so the portal hands out its cookies ---
        self.pace().await?;
        http.get(&login_url).send().await?;

        // --- STEP 2: POST the form ---
        let params = [
            ("username", identifier),
            ("password", secret),
            ("subject_id", "0"),
            ("submit", "Login"),
        ];
        self.pace().await?;
        let response = http.post(&login_url).form(&params).send().await?;

        // --- STEP 3: Classify the answer ---
        let status = response.status();
        let final_url = response.url().to_string();
        let body = response.text().await?;

        if INVALID_CREDENTIAL_MARKERS.iter().any(|m| body.contains(m)) {
            warn!("portal rejected credentials");
            return Err(ScraperError::AuthenticationFailed);
        }
        // Some rejections just re-render the login form with no banner.
        if LOGIN_PAGE_MARKERS.iter().any(|m| body.contains(m)) {
            warn!("portal answered the login with its login form");
            return Err(ScraperError::AuthenticationFailed);
        }
        if !status.is_success() {
            return Err(ScraperError::HttpStatus {
                status: status.as_u16(),
                url: final_url,
            });
        }

        info!("login successful");
        Ok(SessionContext {
            identifier: identifier.to_string(),
            http,
            established_at: Utc::now(),
        })
    }

    async fn get_html(&self, session: &SessionContext, url: &str) -> Result<String> {
        self.pace().await?;
        let response = session.http.get(url).send().await?;

        let status = response.status();
        if !status.is_success() {
            return Err(ScraperError::HttpStatus {
                status: status.as_u16(),
                url: url.to_string(),
            });
        }

        let body = response.text().await?;
        if LOGIN_PAGE_MARKERS.iter().any(|m| body.contains(m)) {
            return Err(ScraperError::SessionExpired);
        }
        debug!(url, bytes = body.len(), "fetched page");
        Ok(body)
    }

    /// Fetches and parses the marks listing page.
    pub async fn get_course_summaries(&self, session: &SessionContext) -> Result<Vec<CourseSummary>> {
        let html = self.get_html(session, &self.url(LISTING_PATH)).await?;
        parsers::summary::parse_courses_from_html(&html)
    }

    /// Courses as listed on the summary page, without assignments.
    pub async fn fetch_courses(&self, session: &SessionContext) -> Result<Vec<CourseRecord>> {
        let summaries = self.get_course_summaries(session).await?;
        Ok(summaries
            .into_iter()
            .map(|s| aggregate(s, Vec::new(), None))
            .collect())
    }

    async fn get_detail(&self, session: &SessionContext, link: &str) -> Result<CourseDetail> {
        let html = self.get_html(session, &self.detail_url(link)).await?;
        parsers::detail::parse_course_detail_from_html(&html)
    }

    /// Assignments and weighting from a course's detail page.
    pub async fn fetch_course_report(
        &self,
        session: &SessionContext,
        course: &CourseRecord,
    ) -> Result<CourseDetail> {
        let link = course.detail_link.as_deref().ok_or_else(|| {
            ScraperError::ElementNotFound(format!("detail link for course {}", course.code))
        })?;
        self.get_detail(session, link).await
    }

    pub async fn fetch_course_detail(
        &self,
        session: &SessionContext,
        course: &CourseRecord,
    ) -> Result<Vec<AssignmentRecord>> {
        Ok(self.fetch_course_report(session, course).await?.assignments)
    }

    /// Full fetch cycle: login, listing, every detail page, aggregation.
    ///
    /// This is the only place that retries. Network failures are retried up
    /// to `max_retries` times with doubling backoff; every other error is
    /// returned as soon as it happens.
    #[instrument(skip(self, credentials), fields(identifier = %credentials.identifier))]
    pub async fn fetch_all(&self, credentials: &Credentials) -> Result<CourseSnapshot> {
        let session = self
            .retrying("login", || self.login(&credentials.identifier, &credentials.secret))
            .await?;
        let summaries = self
            .retrying("listing", || self.get_course_summaries(&session))
            .await?;

        let courses: Vec<CourseRecord> = stream::iter(summaries)
            .map(|summary| self.assemble(&session, summary))
            .buffered(self.config.detail_concurrency.max(1))
            .try_collect()
            .await?;

        info!(courses = courses.len(), "fetch cycle complete");
        Ok(CourseSnapshot {
            fetched_at: Utc::now(),
            courses,
        })
    }

    async fn assemble(&self, session: &SessionContext, summary: CourseSummary) -> Result<CourseRecord> {
        let Some(link) = summary.detail_link.clone() else {
            return Ok(aggregate(summary, Vec::new(), None));
        };
        let detail = self
            .retrying("detail", || self.get_detail(session, &link))
            .await?;
        Ok(aggregate(summary, detail.assignments, detail.weight_table))
    }

    async fn retrying<T, F, Fut>(&self, op: &'static str, attempt_fn: F) -> Result<T>
    where
        F: FnMut() -> Fut,
        Fut: Future<Output = Result<T>>,
    {
        let backoff = ExponentialBuilder::default()
            .with_min_delay(self.config.retry_backoff)
            .with_max_times(self.config.max_retries as usize);

        attempt_fn
            .retry(backoff)
            .sleep(tokio::time::sleep)
            .when(ScraperError::is_retryable)
            .notify(|e: &ScraperError, delay: Duration| {
                warn!(op, error = %e, delay_ms = delay.as_millis(), "retrying after network failure");
            })
            .await
    }
}

fn jitter_ms(delay: &DelayConfig) -> u64 {
    let low = delay.min_delay_ms;
    let high = delay.max_delay_ms.max(low);
    rand::rng().random_range(low..=high)
}
