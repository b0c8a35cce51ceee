// tests/common/mod.rs
//
// A tiny stand-in for the TeachAssist portal. It speaks just enough HTTP/1.1
// for reqwest: one request per connection, `Connection: close` on every answer.

#![allow(dead_code)]

use std::sync::{Arc, Mutex};
use std::time::Duration;
use teachassist_core::{ClientConfig, DelayConfig};
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::{TcpListener, TcpStream};

pub const LIST_REPORTS: &str = include_str!("../fixtures/list_reports.html");
pub const VIEW_REPORT: &str = include_str!("../fixtures/view_report.html");
pub const LOGIN_PAGE: &str = include_str!("../fixtures/login.html");
pub const LOGIN_FAILED: &str = include_str!("../fixtures/login_failed.html");

pub const STUDENT: &str = "123456789";
pub const PASSWORD: &str = "hunter2";
pub const SESSION_COOKIE: &str = "session_token=abc123";

#[derive(Debug, Clone)]
pub struct RecordedRequest {
    pub method: String,
    pub path: String,
    pub cookie: Option<String>,
    pub body: String,
}

impl RecordedRequest {
    pub fn has_session(&self) -> bool {
        self.cookie
            .as_deref()
            .is_some_and(|c| c.contains(SESSION_COOKIE))
    }
}

#[derive(Debug, Clone)]
pub struct MockResponse {
    pub status: u16,
    pub body: String,
    pub set_cookie: Option<String>,
}

impl MockResponse {
    pub fn ok(body: &str) -> Self {
        Self {
            status: 200,
            body: body.to_string(),
            set_cookie: None,
        }
    }

    pub fn status(status: u16, body: &str) -> Self {
        Self {
            status,
            body: body.to_string(),
            set_cookie: None,
        }
    }

    pub fn with_cookie(mut self, cookie: &str) -> Self {
        self.set_cookie = Some(cookie.to_string());
        self
    }
}

pub type Handler = Arc<dyn Fn(&RecordedRequest) -> MockResponse + Send + Sync>;

pub struct MockPortal {
    pub base_url: String,
    requests: Arc<Mutex<Vec<RecordedRequest>>>,
}

impl MockPortal {
    pub async fn start(handler: Handler) -> Self {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        let requests = Arc::new(Mutex::new(Vec::new()));

        let log = requests.clone();
        tokio::spawn(async move {
            while let Ok((socket, _)) = listener.accept().await {
                let handler = handler.clone();
                let log = log.clone();
                tokio::spawn(async move {
                    let _ = serve(socket, handler, log).await;
                });
            }
        });

        Self {
            base_url: format!("http://{}/live/", addr),
            requests,
        }
    }

    /// The standard portal: valid login sets a cookie, report pages require it.
    pub async fn teachassist() -> Self {
        Self::start(Arc::new(|req| portal_routes(req, LIST_REPORTS, VIEW_REPORT))).await
    }

    pub fn requests(&self) -> Vec<RecordedRequest> {
        self.requests.lock().unwrap().clone()
    }

    pub fn count(&self, method: &str, path_prefix: &str) -> usize {
        self.requests()
            .iter()
            .filter(|r| r.method == method && r.path.starts_with(path_prefix))
            .count()
    }

    pub fn config(&self) -> ClientConfig {
        ClientConfig {
            delay: DelayConfig::disabled(),
            retry_backoff: Duration::from_millis(10),
            timeout: Duration::from_secs(5),
            ..Default::default()
        }
        .with_base_url(&self.base_url)
    }
}

/// Routes shared by most tests; `listing` and `detail` are served to
/// requests carrying the session cookie.
pub fn portal_routes(req: &RecordedRequest, listing: &str, detail: &str) -> MockResponse {
    let path = req.path.as_str();
    match (req.method.as_str(), path) {
        ("GET", "/live/index.php") => MockResponse::ok(LOGIN_PAGE),
        ("POST", "/live/index.php") => {
            let expected = format!("username={}&password={}", STUDENT, PASSWORD);
            if req.body.starts_with(&expected) {
                MockResponse::ok("<html><body>Welcome</body></html>")
                    .with_cookie(&format!("{}; Path=/", SESSION_COOKIE))
            } else {
                MockResponse::ok(LOGIN_FAILED)
            }
        }
        ("GET", p) if p.starts_with("/live/students/") => {
            if !req.has_session() {
                return MockResponse::ok(LOGIN_PAGE);
            }
            if p.starts_with("/live/students/listReports.php") {
                MockResponse::ok(listing)
            } else if p.starts_with("/live/students/viewReport.php") {
                MockResponse::ok(detail)
            } else {
                MockResponse::status(404, "not found")
            }
        }
        _ => MockResponse::status(404, "not found"),
    }
}

/// Reads exactly one request from the connection and answers it. Bodies are
/// read by `Content-Length` only; chunked uploads and keep-alive are not
/// supported, which is all reqwest needs for form posts and GETs.
async fn serve(
    mut socket: TcpStream,
    handler: Handler,
    log: Arc<Mutex<Vec<RecordedRequest>>>,
) -> std::io::Result<()> {
    let mut buf = Vec::new();
    let mut chunk = [0u8; 4096];

    let header_end = loop {
        let n = socket.read(&mut chunk).await?;
        if n == 0 {
            return Ok(());
        }
        buf.extend_from_slice(&chunk[..n]);
        if let Some(pos) = buf.windows(4).position(|w| w == b"\r\n\r\n") {
            break pos + 4;
        }
    };

    let head = String::from_utf8_lossy(&buf[..header_end]).to_string();
    let mut lines = head.split("\r\n");
    let mut request_line = lines.next().unwrap_or_default().split_whitespace();
    let method = request_line.next().unwrap_or_default().to_string();
    let path = request_line.next().unwrap_or_default().to_string();

    let mut content_length = 0usize;
    let mut cookie = None;
    for line in lines {
        let Some((name, value)) = line.split_once(':') else {
            continue;
        };
        match name.trim().to_ascii_lowercase().as_str() {
            "content-length" => content_length = value.trim().parse().unwrap_or(0),
            "cookie" => cookie = Some(value.trim().to_string()),
            _ => {}
        }
    }

    while buf.len() < header_end + content_length {
        let n = socket.read(&mut chunk).await?;
        if n == 0 {
            break;
        }
        buf.extend_from_slice(&chunk[..n]);
    }
    let body_end = buf.len().min(header_end + content_length);
    let body = String::from_utf8_lossy(&buf[header_end..body_end]).to_string();

    let request = RecordedRequest {
        method,
        path,
        cookie,
        body,
    };
    let response = handler(&request);
    log.lock().unwrap().push(request);

    let mut out = format!(
        "HTTP/1.1 {} {}\r\nContent-Type: text/html; charset=utf-8\r\nContent-Length: {}\r\nConnection: close\r\n",
        response.status,
        reason(response.status),
        response.body.len()
    );
    if let Some(cookie) = &response.set_cookie {
        out.push_str(&format!("Set-Cookie: {}\r\n", cookie));
    }
    out.push_str("\r\n");
    out.push_str(&response.body);

    socket.write_all(out.as_bytes()).await?;
    socket.shutdown().await?;
    Ok(())
}

fn reason(status: u16) -> &'static str {
    match status {
        200 => "OK",
        404 => "Not Found",
        500 => "Internal Server Error",
        503 => "Service Unavailable",
        _ => "Unknown",
    }
}
