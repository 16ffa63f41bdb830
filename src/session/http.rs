//! HTTP implementation of the session endpoints.

use super::{BackendError, SessionBackend};
use crate::config::MonitorConfig;
use async_trait::async_trait;
use hyper::client::HttpConnector;
use hyper::{header, Body, Client, Method, Request, Uri};
use std::time::Duration;

/// POSTs to the extend and logout endpoints.
#[derive(Debug, Clone)]
pub struct HttpSessionBackend {
    client: Client<HttpConnector>,
    extend_uri: Uri,
    logout_uri: Uri,
    cookie: Option<String>,
    timeout: Duration,
}

impl HttpSessionBackend {
    pub fn new(
        extend_url: &str,
        logout_url: &str,
        cookie: Option<String>,
        timeout: Duration,
    ) -> Result<Self, BackendError> {
        Ok(Self {
            client: Client::new(),
            extend_uri: parse_endpoint(extend_url)?,
            logout_uri: parse_endpoint(logout_url)?,
            cookie,
            timeout,
        })
    }

    pub fn from_config(config: &MonitorConfig) -> Result<Self, BackendError> {
        Self::new(
            &config.extend_endpoint,
            &config.logout_endpoint,
            config.session_cookie.clone(),
            config.request_timeout(),
        )
    }

    async fn post(&self, uri: &Uri) -> Result<(), BackendError> {
        let mut builder = Request::builder()
            .method(Method::POST)
            .uri(uri.clone())
            .header(header::CONTENT_LENGTH, 0)
            .header("X-Requested-With", "XMLHttpRequest");
        if let Some(cookie) = &self.cookie {
            builder = builder.header(header::COOKIE, cookie.as_str());
        }
        let request = builder
            .body(Body::empty())
            .map_err(|e| BackendError::InvalidEndpoint {
                url: uri.to_string(),
                reason: e.to_string(),
            })?;

        let response = tokio::time::timeout(self.timeout, self.client.request(request))
            .await
            .map_err(|_| BackendError::Timeout(self.timeout))??;

        let status = response.status();
        // Drain the body so the connection can be reused
        let _ = hyper::body::to_bytes(response.into_body()).await;

        tracing::debug!(%uri, %status, "Session endpoint responded");
        if status.is_success() {
            Ok(())
        } else {
            Err(BackendError::Status(status))
        }
    }
}

#[async_trait]
impl SessionBackend for HttpSessionBackend {
    async fn extend(&self) -> Result<(), BackendError> {
        self.post(&self.extend_uri).await
    }

    async fn logout(&self) -> Result<(), BackendError> {
        self.post(&self.logout_uri).await
    }
}

fn parse_endpoint(url: &str) -> Result<Uri, BackendError> {
    let uri: Uri = url.parse().map_err(|e: hyper::http::uri::InvalidUri| {
        BackendError::InvalidEndpoint {
            url: url.to_string(),
            reason: e.to_string(),
        }
    })?;

    if uri.scheme_str() != Some("http") || uri.host().is_none() {
        return Err(BackendError::InvalidEndpoint {
            url: url.to_string(),
            reason: "expected an absolute http:// URL".to_string(),
        });
    }
    Ok(uri)
}
