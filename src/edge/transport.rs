use std::{fmt, time::Duration};

use async_trait::async_trait;
use reqwest::{Client, Method};
use url::Url;

use crate::config::EdgeSettings;

use super::EdgeError;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum EdgeVerb {
    Purge,
    Ban,
}

impl EdgeVerb {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Purge => "PURGE",
            Self::Ban => "BAN",
        }
    }
}

impl fmt::Display for EdgeVerb {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One admin request. `path` is relative to the accelerator root.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EdgeRequest {
    pub verb: EdgeVerb,
    pub path: String,
    pub headers: Vec<(&'static str, String)>,
}

impl EdgeRequest {
    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers
            .iter()
            .find(|(key, _)| key.eq_ignore_ascii_case(name))
            .map(|(_, value)| value.as_str())
    }
}

/// Sends admin requests to the accelerator.
#[async_trait]
pub trait EdgeTransport: Send + Sync {
    /// Returns the response status. Transport failures are errors; status
    /// interpretation is left to the caller.
    async fn send(&self, request: &EdgeRequest) -> Result<u16, EdgeError>;
}

/// reqwest transport aimed at `host:admin_port` (or `host:port`).
#[derive(Clone, Debug)]
pub struct HttpEdgeTransport {
    client: Client,
    base: Url,
    public_host: String,
}

impl HttpEdgeTransport {
    pub fn new(base: Url, public_host: impl Into<String>, timeout: Duration) -> Result<Self, EdgeError> {
        let client = Client::builder()
            .user_agent(concat!("folio-cache/", env!("CARGO_PKG_VERSION")))
            .timeout(timeout)
            .build()
            .map_err(|err| EdgeError::Transport(err.to_string()))?;
        Ok(Self {
            client,
            base,
            public_host: public_host.into(),
        })
    }

    pub fn from_settings(settings: &EdgeSettings) -> Result<Self, EdgeError> {
        Self::new(
            admin_base(settings)?,
            settings.public_host.clone(),
            settings.timeout,
        )
    }

    pub fn base(&self) -> &Url {
        &self.base
    }

    /// Edge admin URL for a purge target. Absolute URLs keep only their
    /// path and query; the object is addressed through the `Host` header.
    fn url(&self, path: &str) -> Result<Url, EdgeError> {
        if let Ok(absolute) = Url::parse(path)
            && absolute.has_host()
            && matches!(absolute.scheme(), "http" | "https")
        {
            let mut target = self.base.clone();
            target.set_path(absolute.path());
            target.set_query(absolute.query());
            return Ok(target);
        }

        let path = if path.starts_with('/') {
            path.to_string()
        } else {
            format!("/{path}")
        };
        self.base
            .join(&path)
            .map_err(|err| EdgeError::InvalidTarget(format!("`{path}`: {err}")))
    }
}

/// Admin endpoint: the admin port when configured, else the public port.
pub(crate) fn admin_base(settings: &EdgeSettings) -> Result<Url, EdgeError> {
    let port = settings.admin_port.unwrap_or(settings.port);
    let raw = if settings.host.contains(':') && !settings.host.starts_with('[') {
        format!("http://[{}]:{port}/", settings.host)
    } else {
        format!("http://{}:{port}/", settings.host)
    };
    Url::parse(&raw).map_err(|err| EdgeError::InvalidTarget(format!("`{raw}`: {err}")))
}

#[async_trait]
impl EdgeTransport for HttpEdgeTransport {
    async fn send(&self, request: &EdgeRequest) -> Result<u16, EdgeError> {
        let method = Method::from_bytes(request.verb.as_str().as_bytes())
            .map_err(|err| EdgeError::InvalidTarget(err.to_string()))?;
        let url = self.url(&request.path)?;

        let mut builder = self
            .client
            .request(method, url)
            .header(reqwest::header::HOST, &self.public_host);
        for (name, value) in &request.headers {
            builder = builder.header(*name, value);
        }

        let response = builder
            .send()
            .await
            .map_err(|err| EdgeError::Transport(err.to_string()))?;
        Ok(response.status().as_u16())
    }
}
