//! Transport Layer
//!
//! Abstracts HTTP access to the shard backend for testability. Provides:
//! - Transport trait: single request plus bounded concurrent fan-out
//! - HttpTransport: blocking reqwest client for production
//!
//! The in-process test backend lives in `crate::mock`.

mod http;

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Mutex;
use std::thread;

pub use http::{HttpConfig, HttpTransport};

/// HTTP verb. `Post` is used for every write and every shard operation.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HttpMethod {
    Get,
    Post,
}

/// Everything about a request except its URL.
///
/// A fan-out sends the same template to every URL; per-target bodies would
/// need a wider interface.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RequestTemplate {
    pub method: HttpMethod,
    pub headers: Vec<(String, String)>,
    /// Form fields: the body of a POST, the query string of a GET
    pub form: Vec<(String, String)>,
}

impl RequestTemplate {
    pub fn get(form: Vec<(String, String)>) -> Self {
        Self {
            method: HttpMethod::Get,
            headers: Vec::new(),
            form,
        }
    }

    pub fn post(form: Vec<(String, String)>) -> Self {
        Self {
            method: HttpMethod::Post,
            headers: Vec::new(),
            form,
        }
    }

    pub fn with_header(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.headers.push((name.into(), value.into()));
        self
    }

    /// Attach `Authorization: Bearer <token>`.
    pub fn with_bearer(self, token: &str) -> Self {
        self.with_header("Authorization", format!("Bearer {}", token))
    }

    /// First form field named `name`.
    pub fn form_value(&self, name: &str) -> Option<&str> {
        self.form
            .iter()
            .find(|(k, _)| k == name)
            .map(|(_, v)| v.as_str())
    }

    /// First header named `name` (case-insensitive).
    pub fn header_value(&self, name: &str) -> Option<&str> {
        self.headers
            .iter()
            .find(|(k, _)| k.eq_ignore_ascii_case(name))
            .map(|(_, v)| v.as_str())
    }
}

/// Raw HTTP response.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HttpResponse {
    pub status: u16,
    pub body: String,
}

impl HttpResponse {
    pub fn ok(body: impl Into<String>) -> Self {
        Self {
            status: 200,
            body: body.into(),
        }
    }
}

/// Transport errors
#[derive(Debug, thiserror::Error)]
pub enum TransportError {
    #[error("HTTP client error: {0}")]
    Client(String),

    #[error("request to {url} failed: {message}")]
    Request { url: String, message: String },

    #[error("request to {url} timed out")]
    Timeout { url: String },

    #[error("fan-out produced no response for {url}")]
    Incomplete { url: String },
}

/// Transport trait for backend communication
pub trait Transport: Send + Sync {
    /// Perform one request and wait for its response.
    fn request(&self, url: &str, template: &RequestTemplate) -> Result<HttpResponse, TransportError>;

    /// Send `template` to every URL concurrently and wait for all of them.
    ///
    /// Responses come back in URL order. At most `max_concurrency` requests
    /// are in flight at once. The first transport error fails the call, but
    /// only after every request has finished.
    fn parallel_requests(
        &self,
        urls: &[String],
        max_concurrency: usize,
        template: &RequestTemplate,
    ) -> Result<Vec<HttpResponse>, TransportError> {
        fan_out(self, urls, max_concurrency, template)
    }
}

/// Bounded fan-out over scoped worker threads.
pub fn fan_out<T: Transport + ?Sized>(
    transport: &T,
    urls: &[String],
    max_concurrency: usize,
    template: &RequestTemplate,
) -> Result<Vec<HttpResponse>, TransportError> {
    if urls.is_empty() {
        return Ok(Vec::new());
    }

    let next = AtomicUsize::new(0);
    let slots: Vec<Mutex<Option<Result<HttpResponse, TransportError>>>> =
        urls.iter().map(|_| Mutex::new(None)).collect();
    let workers = max_concurrency.clamp(1, urls.len());

    thread::scope(|scope| {
        for _ in 0..workers {
            scope.spawn(|| loop {
                let index = next.fetch_add(1, Ordering::SeqCst);
                if index >= urls.len() {
                    break;
                }
                let result = transport.request(&urls[index], template);
                if let Ok(mut slot) = slots[index].lock() {
                    *slot = Some(result);
                }
            });
        }
    });

    slots
        .into_iter()
        .zip(urls)
        .map(|(slot, url)| {
            slot.into_inner().ok().flatten().unwrap_or_else(|| {
                Err(TransportError::Incomplete { url: url.clone() })
            })
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    /// Echoes the URL and tracks peak concurrency.
    struct EchoTransport {
        in_flight: AtomicUsize,
        peak: AtomicUsize,
    }

    impl EchoTransport {
        fn new() -> Self {
            Self {
                in_flight: AtomicUsize::new(0),
                peak: AtomicUsize::new(0),
            }
        }
    }

    impl Transport for EchoTransport {
        fn request(&self, url: &str, _template: &RequestTemplate) -> Result<HttpResponse, TransportError> {
            let now = self.in_flight.fetch_add(1, Ordering::SeqCst) + 1;
            self.peak.fetch_max(now, Ordering::SeqCst);
            thread::sleep(Duration::from_millis(20));
            self.in_flight.fetch_sub(1, Ordering::SeqCst);
            if url.ends_with("/fail") {
                return Err(TransportError::Request {
                    url: url.to_string(),
                    message: "refused".to_string(),
                });
            }
            Ok(HttpResponse::ok(url))
        }
    }

    fn urls(n: usize) -> Vec<String> {
        (0..n).map(|i| format!("https://backend/{}", i)).collect()
    }

    #[test]
    fn test_fan_out_preserves_order() {
        let transport = EchoTransport::new();
        let urls = urls(7);

        let responses = transport
            .parallel_requests(&urls, 3, &RequestTemplate::post(Vec::new()))
            .unwrap();

        let bodies: Vec<_> = responses.into_iter().map(|r| r.body).collect();
        assert_eq!(bodies, urls);
    }

    #[test]
    fn test_fan_out_respects_concurrency_bound() {
        let transport = EchoTransport::new();

        transport
            .parallel_requests(&urls(10), 2, &RequestTemplate::post(Vec::new()))
            .unwrap();

        assert!(transport.peak.load(Ordering::SeqCst) <= 2);
    }

    #[test]
    fn test_fan_out_zero_concurrency_still_runs() {
        let transport = EchoTransport::new();
        let responses = transport
            .parallel_requests(&urls(2), 0, &RequestTemplate::post(Vec::new()))
            .unwrap();
        assert_eq!(responses.len(), 2);
    }

    #[test]
    fn test_fan_out_surfaces_transport_error() {
        let transport = EchoTransport::new();
        let mut targets = urls(2);
        targets.push("https://backend/fail".to_string());

        let result = transport.parallel_requests(&targets, 4, &RequestTemplate::post(Vec::new()));

        assert!(matches!(result, Err(TransportError::Request { .. })));
    }

    #[test]
    fn test_template_helpers() {
        let template = RequestTemplate::post(vec![("method".to_string(), "workbook.list".to_string())])
            .with_bearer("tok");

        assert_eq!(template.form_value("method"), Some("workbook.list"));
        assert_eq!(template.header_value("authorization"), Some("Bearer tok"));
        assert_eq!(template.form_value("criteria"), None);
    }
}
