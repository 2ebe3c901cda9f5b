//! HTTP fetcher for the remote configuration service.

use std::time::Duration;

use reqwest::header::{ACCEPT, ETAG, IF_NONE_MATCH};
use reqwest::StatusCode;
use thiserror::Error;
use url::Url;
use uuid::Uuid;

use crate::config::ServiceConfig;
use crate::fetch::error::FetchError;
use crate::fetch::wire::{decode_body, parse_etag};
use crate::fetch::{ConfigFetcher, FetchOutcome};
use crate::store::ConfigSnapshot;

#[derive(Debug, Error)]
pub enum BuildError {
    #[error("invalid service URL: {0}")]
    Url(#[from] url::ParseError),

    #[error("failed to build HTTP client: {0}")]
    Client(#[from] reqwest::Error),
}

#[derive(Debug, Clone)]
enum Auth {
    None,
    Basic { username: String, password: String },
    Bearer(String),
}

/// Fetches configuration with a conditional GET.
#[derive(Debug, Clone)]
pub struct HttpFetcher {
    client: reqwest::Client,
    endpoint: Url,
    auth: Auth,
    timeout: Duration,
}

impl HttpFetcher {
    pub fn new(service: &ServiceConfig, timeout: Duration) -> Result<Self, BuildError> {
        let endpoint = build_endpoint(service)?;
        let client = reqwest::Client::builder()
            .timeout(timeout)
            .connect_timeout(timeout)
            .user_agent(concat!("config-client/", env!("CARGO_PKG_VERSION")))
            .build()?;

        let auth = match (&service.token, &service.username, &service.password) {
            (Some(token), _, _) => Auth::Bearer(token.clone()),
            (None, Some(username), Some(password)) => Auth::Basic {
                username: username.clone(),
                password: password.clone(),
            },
            _ => Auth::None,
        };

        Ok(Self {
            client,
            endpoint,
            auth,
            timeout,
        })
    }

    pub fn endpoint(&self) -> &Url {
        &self.endpoint
    }
}

impl ConfigFetcher for HttpFetcher {
    async fn fetch(&self, last_version: Option<&str>) -> Result<FetchOutcome, FetchError> {
        let request_id = Uuid::new_v4();

        let mut request = self
            .client
            .get(self.endpoint.clone())
            .header(ACCEPT, "application/json")
            .header("x-request-id", request_id.to_string());

        if let Some(version) = last_version {
            request = request.header(IF_NONE_MATCH, format!("\"{}\"", version));
        }

        request = match &self.auth {
            Auth::None => request,
            Auth::Basic { username, password } => request.basic_auth(username, Some(password)),
            Auth::Bearer(token) => request.bearer_auth(token),
        };

        let response = request
            .send()
            .await
            .map_err(|e| FetchError::from_reqwest(e, self.timeout))?;

        let status = response.status();
        tracing::debug!(
            request_id = %request_id,
            url = %self.endpoint,
            status = %status,
            "Configuration service responded"
        );

        match status {
            StatusCode::NOT_MODIFIED => return Ok(FetchOutcome::Unchanged),
            StatusCode::UNAUTHORIZED | StatusCode::FORBIDDEN => {
                return Err(FetchError::Unauthorized(status.as_u16()))
            }
            s if !s.is_success() => {
                return Err(FetchError::InvalidResponse(format!("unexpected status {}", s)))
            }
            _ => {}
        }

        let etag = response
            .headers()
            .get(ETAG)
            .and_then(|v| v.to_str().ok())
            .and_then(parse_etag);

        let body = response
            .text()
            .await
            .map_err(|e| FetchError::from_reqwest(e, self.timeout))?;
        let decoded = decode_body(&body)?;

        let snapshot = match decoded.version.or(etag) {
            Some(version) => ConfigSnapshot::new(decoded.values, version),
            None => ConfigSnapshot::from_values(decoded.values),
        };

        if last_version == Some(snapshot.version()) {
            return Ok(FetchOutcome::Unchanged);
        }
        Ok(FetchOutcome::Updated(snapshot))
    }
}

/// Expand the path template for `service`.
///
/// A label containing `/` is encoded as `(_)`, the convention config servers
/// use for branch names.
pub fn expand_path(service: &ServiceConfig) -> String {
    let label = service
        .label
        .as_deref()
        .unwrap_or("")
        .replace('/', "(_)");

    let mut path = service
        .path
        .replace("{application}", &service.application)
        .replace("{profile}", &service.profile);

    if service.path.contains("{label}") {
        path = path.replace("{label}", &label);
    } else if !label.is_empty() {
        path = format!("{}/{}", path.trim_end_matches('/'), label);
    }
    path
}

pub fn build_endpoint(service: &ServiceConfig) -> Result<Url, url::ParseError> {
    let path = expand_path(service);
    let base = service.base_url.trim_end_matches('/');
    if path.starts_with('/') {
        Url::parse(&format!("{}{}", base, path))
    } else {
        Url::parse(&format!("{}/{}", base, path))
    }
}
