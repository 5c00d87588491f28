use crate::BoundingBox;
use crate::error::{NetworkError, PassesError, Result};
use reqwest::StatusCode;
use reqwest::Url;
use reqwest::blocking::Client;
use std::time::Duration;

pub const DEFAULT_HOST: &str = "https://westra.ru";
pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(30);

const PASSES_PATH: &str = "/passes/kml/passes.php";

#[derive(Debug, Clone)]
pub struct CatalogConfig {
    pub host: String,
    pub timeout: Duration,
}

impl Default for CatalogConfig {
    fn default() -> Self {
        CatalogConfig {
            host: DEFAULT_HOST.to_string(),
            timeout: DEFAULT_TIMEOUT,
        }
    }
}

/// Blocking client for the pass catalog's KML endpoint.
pub struct CatalogClient {
    http: Client,
    host: String,
}

impl CatalogClient {
    pub fn new(config: CatalogConfig) -> Result<Self> {
        let host = config.host.trim_end_matches('/').to_string();

        match Url::parse(&host) {
            Ok(url) if matches!(url.scheme(), "http" | "https") && url.has_host() => {}
            _ => {
                return Err(PassesError::InvalidArgument(format!(
                    "catalog host must be an http(s) URL, got '{}'",
                    config.host
                )));
            }
        }

        if config.timeout.is_zero() {
            return Err(PassesError::InvalidArgument(
                "request timeout must be positive".to_string(),
            ));
        }

        let http = Client::builder()
            .timeout(config.timeout)
            .no_proxy()
            .user_agent(concat!(env!("CARGO_PKG_NAME"), "/", env!("CARGO_PKG_VERSION")))
            .build()
            .map_err(|source| NetworkError::Transport {
                url: host.clone(),
                source,
            })?;

        Ok(CatalogClient { http, host })
    }

    /// Request URL for all passes within `bbox`. Each corner is written longitude first.
    pub fn catalog_url(&self, bbox: &BoundingBox) -> String {
        format!(
            "{}{}?BBOX={},{},{},{}",
            self.host, PASSES_PATH, bbox.min_lon, bbox.min_lat, bbox.max_lon, bbox.max_lat
        )
    }

    /// Downloads the KML document for `bbox`. Anything but HTTP 200 is an error.
    pub fn fetch(&self, bbox: &BoundingBox) -> Result<String> {
        let url = self.catalog_url(bbox);
        log::info!("requesting {url}");

        let transport = |source: reqwest::Error| {
            if source.is_timeout() {
                NetworkError::Timeout { url: url.clone() }
            } else {
                NetworkError::Transport {
                    url: url.clone(),
                    source,
                }
            }
        };

        let response = self.http.get(&url).send().map_err(transport)?;

        let status = response.status();
        if status != StatusCode::OK {
            return Err(NetworkError::HttpStatus {
                url: url.clone(),
                status: status.as_u16(),
            }
            .into());
        }

        let body = response.text().map_err(transport)?;
        log::debug!("received {} bytes from {url}", body.len());
        Ok(body)
    }
}
