#![allow(dead_code)]

use async_trait::async_trait;
use dom_query::{Document, Selection};
use filmgrab_common::observability::{LogConfig, LogFormat, init_logging};
use filmgrab_config::FilmgrabSettings;
use filmgrab_drivers::film_browser::page::{PageError, RenderedPage};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex, OnceLock};
use tokio::io::{AsyncBufReadExt, AsyncReadExt, AsyncWriteExt, BufReader};
use tokio::net::{TcpListener, TcpStream};

static INIT_PATH: OnceLock<Option<std::path::PathBuf>> = OnceLock::new();

pub fn init_test_tracing() {
    let _ = INIT_PATH.get_or_init(|| {
        let config = LogConfig {
            app_name: "filmgrab-tests",
            emit_stderr: true,
            format: if std::env::var("FILMGRAB_LOG_FORMAT")
                .map(|raw| raw.trim().eq_ignore_ascii_case("json"))
                .unwrap_or(false)
            {
                LogFormat::Json
            } else {
                LogFormat::Text
            },
            default_filter: "debug",
            ..LogConfig::default()
        };

        init_logging(config).unwrap_or_default()
    });
}

/// Settings with no settle pause so lazy-load tests run instantly.
pub fn test_settings() -> FilmgrabSettings {
    let mut settings = FilmgrabSettings::default();
    settings.timeouts.settle_ms = 0;
    settings
}

/// In-memory page backed by static HTML.
///
/// `after_scroll` replaces the document once the page is scrolled, which is
/// how lazily loaded posters are modelled.
pub struct FixturePage {
    html: Mutex<String>,
    after_scroll: Option<String>,
    title: String,
    failing: Vec<String>,
    unresponsive: bool,
    scrolls: AtomicUsize,
}

impl FixturePage {
    pub fn new(html: &str) -> Self {
        Self {
            html: Mutex::new(html.to_string()),
            after_scroll: None,
            title: String::new(),
            failing: Vec::new(),
            unresponsive: false,
            scrolls: AtomicUsize::new(0),
        }
    }

    pub fn with_lazy(mut self, html: &str) -> Self {
        self.after_scroll = Some(html.to_string());
        self
    }

    pub fn with_title(mut self, title: &str) -> Self {
        self.title = title.to_string();
        self
    }

    /// Queries for `selector` fail as a single probe would.
    pub fn failing(mut self, selector: &str) -> Self {
        self.failing.push(selector.to_string());
        self
    }

    /// Every query reports the page as gone.
    pub fn unresponsive(mut self) -> Self {
        self.unresponsive = true;
        self
    }

    pub fn scroll_count(&self) -> usize {
        self.scrolls.load(Ordering::SeqCst)
    }

    fn check(&self, selector: &str) -> Result<String, PageError> {
        if self.unresponsive {
            return Err(PageError::Unresponsive("session deleted".into()));
        }
        if self.failing.iter().any(|f| f == selector) {
            return Err(PageError::probe(selector, "stale element reference"));
        }
        Ok(self.html.lock().unwrap().clone())
    }
}

fn select_attrs(html: &str, selector: &str, attribute: &str) -> Vec<String> {
    let doc = Document::from(html);
    doc.select(selector)
        .nodes()
        .iter()
        .filter_map(|node| Selection::from(*node).attr(attribute).map(|v| v.to_string()))
        .collect()
}

fn select_texts(html: &str, selector: &str) -> Vec<String> {
    let doc = Document::from(html);
    doc.select(selector)
        .nodes()
        .iter()
        .map(|node| Selection::from(*node).text().to_string())
        .collect()
}

#[async_trait]
impl RenderedPage for FixturePage {
    async fn attribute_values(
        &self,
        selector: &str,
        attribute: &str,
    ) -> Result<Vec<String>, PageError> {
        let html = self.check(selector)?;
        Ok(select_attrs(&html, selector, attribute))
    }

    async fn texts(&self, selector: &str) -> Result<Vec<String>, PageError> {
        let html = self.check(selector)?;
        Ok(select_texts(&html, selector))
    }

    async fn scroll_to_fraction(&self, _fraction: f64) -> Result<(), PageError> {
        self.check("scroll")?;
        self.scrolls.fetch_add(1, Ordering::SeqCst);
        if let Some(next) = &self.after_scroll {
            *self.html.lock().unwrap() = next.clone();
        }
        Ok(())
    }

    async fn title(&self) -> Result<String, PageError> {
        self.check("title")?;
        Ok(self.title.clone())
    }
}

/// How the stand-in WebDriver behaves once a session exists.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DriverMode {
    /// Creates the session, then never answers another command.
    StallAfterSession,
    /// Answers every command promptly for an empty film page.
    Responsive,
}

const SESSION_CREATED: &str =
    r#"{"value":{"sessionId":"fake","capabilities":{"browserName":"chrome"}}}"#;
const NULL_VALUE: &str = r#"{"value":null}"#;
const EMPTY_LIST: &str = r#"{"value":[]}"#;
const WINDOW_RECT: &str = r#"{"value":{"x":0,"y":0,"width":1920,"height":1080}}"#;
const CURRENT_URL: &str = r#"{"value":"https://letterboxd.com/film/pierrot-le-fou/"}"#;
const PAGE_TITLE: &str = r#"{"value":"Pierrot le Fou (1965) - Letterboxd"}"#;
const NO_SUCH_ELEMENT: &str =
    r#"{"value":{"error":"no such element","message":"no such element","stacktrace":""}}"#;

/// Minimal HTTP WebDriver endpoint on a loopback port.
pub struct FakeDriver {
    pub url: String,
    requests: Arc<Mutex<Vec<String>>>,
}

impl FakeDriver {
    pub async fn start(mode: DriverMode) -> Self {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let url = format!("http://{}", listener.local_addr().unwrap());
        let requests: Arc<Mutex<Vec<String>>> = Arc::default();
        let log = Arc::clone(&requests);

        tokio::spawn(async move {
            while let Ok((stream, _)) = listener.accept().await {
                tokio::spawn(serve(stream, mode, Arc::clone(&log)));
            }
        });

        Self { url, requests }
    }

    /// Request lines received so far, e.g. `DELETE /session/fake`.
    pub fn requests(&self) -> Vec<String> {
        self.requests.lock().unwrap().clone()
    }

    pub fn received(&self, method: &str, path: &str) -> bool {
        let wanted = format!("{method} {path} ");
        self.requests().iter().any(|line| line.starts_with(&wanted))
    }
}

/// Address with nothing listening on it.
pub async fn closed_endpoint() -> String {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    drop(listener);
    format!("http://{addr}")
}

fn reply_for(mode: DriverMode, request_line: &str) -> Option<(u16, &'static str)> {
    let mut parts = request_line.split_whitespace();
    let method = parts.next()?;
    let path = parts.next()?;

    if method == "POST" && path == "/session" {
        return Some((200, SESSION_CREATED));
    }
    if mode == DriverMode::StallAfterSession {
        return None;
    }
    match method {
        "DELETE" => Some((200, NULL_VALUE)),
        "GET" if path.ends_with("/url") => Some((200, CURRENT_URL)),
        "GET" if path.ends_with("/title") => Some((200, PAGE_TITLE)),
        "POST" if path.ends_with("/window/rect") => Some((200, WINDOW_RECT)),
        "POST" if path.ends_with("/elements") => Some((200, EMPTY_LIST)),
        "POST" if path.ends_with("/element") => Some((404, NO_SUCH_ELEMENT)),
        "POST" => Some((200, NULL_VALUE)),
        _ => None,
    }
}

async fn serve(stream: TcpStream, mode: DriverMode, log: Arc<Mutex<Vec<String>>>) {
    let mut reader = BufReader::new(stream);
    loop {
        let mut request_line = String::new();
        if reader.read_line(&mut request_line).await.unwrap_or(0) == 0 {
            return;
        }

        let mut content_length = 0usize;
        loop {
            let mut header = String::new();
            if reader.read_line(&mut header).await.unwrap_or(0) == 0 {
                return;
            }
            let header = header.trim();
            if header.is_empty() {
                break;
            }
            if let Some((name, value)) = header.split_once(':') {
                if name.eq_ignore_ascii_case("content-length") {
                    content_length = value.trim().parse().unwrap_or(0);
                }
            }
        }
        let mut body = vec![0u8; content_length];
        if reader.read_exact(&mut body).await.is_err() {
            return;
        }

        let request_line = request_line.trim().to_string();
        log.lock().unwrap().push(request_line.clone());

        let Some((status, reply)) = reply_for(mode, &request_line) else {
            // hold the connection open without answering
            std::future::pending::<()>().await;
            return;
        };
        let response = format!(
            "HTTP/1.1 {status} {}\r\nContent-Type: application/json; charset=utf-8\r\nContent-Length: {}\r\n\r\n{reply}",
            if status == 200 { "OK" } else { "Not Found" },
            reply.len()
        );
        if reader.get_mut().write_all(response.as_bytes()).await.is_err() {
            return;
        }
    }
}
