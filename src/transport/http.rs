//! Blocking HTTP transport for production use.

use std::time::Duration;

use reqwest::blocking::Client;
use reqwest::redirect::Policy;
use tracing::debug;

use super::{HttpMethod, HttpResponse, RequestTemplate, Transport, TransportError};

/// HTTP transport configuration
#[derive(Debug, Clone)]
pub struct HttpConfig {
    /// Whole-request timeout
    pub timeout: Duration,
    /// Maximum redirects to follow
    pub max_redirects: usize,
}

impl Default for HttpConfig {
    fn default() -> Self {
        Self {
            timeout: Duration::from_secs(60),
            max_redirects: 10,
        }
    }
}

/// reqwest-backed transport.
///
/// Non-2xx statuses are not errors here: the backend reports failures in
/// the JSON body, which callers interpret.
pub struct HttpTransport {
    client: Client,
}

impl HttpTransport {
    pub fn new(config: &HttpConfig) -> Result<Self, TransportError> {
        let client = Client::builder()
            .timeout(config.timeout)
            .redirect(Policy::limited(config.max_redirects))
            .build()
            .map_err(|e| TransportError::Client(e.to_string()))?;
        Ok(Self { client })
    }
}

impl Transport for HttpTransport {
    fn request(&self, url: &str, template: &RequestTemplate) -> Result<HttpResponse, TransportError> {
        let mut builder = match template.method {
            HttpMethod::Get => self.client.get(url).query(&template.form),
            HttpMethod::Post => self.client.post(url).form(&template.form),
        };
        for (name, value) in &template.headers {
            builder = builder.header(name.as_str(), value.as_str());
        }

        let response = builder.send().map_err(|e| map_error(url, e))?;
        let status = response.status().as_u16();
        let body = response.text().map_err(|e| map_error(url, e))?;
        debug!(url, status, bytes = body.len(), "backend response");

        Ok(HttpResponse { status, body })
    }
}

fn map_error(url: &str, err: reqwest::Error) -> TransportError {
    if err.is_timeout() {
        TransportError::Timeout {
            url: url.to_string(),
        }
    } else {
        TransportError::Request {
            url: url.to_string(),
            message: err.to_string(),
        }
    }
}
