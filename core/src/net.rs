use std::collections::HashMap;
use std::io::Read;
use std::time::Duration;

use reqwest::blocking::Client;
use reqwest::header::{HeaderMap, HeaderName, HeaderValue, CONTENT_LENGTH};
use reqwest::redirect::Policy;

use crate::config::DownloaderConfig;
use crate::error::{DownloadError, DownloadResult};

/// One resolved asset to fetch: a URL plus the already-merged header set.
#[derive(Debug, Clone)]
pub struct AssetRequest {
    pub url: String,
    pub headers: HashMap<String, String>,
}

impl AssetRequest {
    pub fn new(url: impl Into<String>) -> Self {
        Self {
            url: url.into(),
            headers: HashMap::new(),
        }
    }
}

/// A streaming response. The body is a plain reader so transports can be
/// swapped out in tests.
pub struct NetResponse {
    pub status: u16,
    pub content_length: Option<u64>,
    pub body: Box<dyn Read + Send>,
}

impl NetResponse {
    pub fn is_success(&self) -> bool {
        (200..300).contains(&self.status)
    }
}

pub trait NetClient: Send + Sync {
    fn get_stream(&self, req: &AssetRequest) -> DownloadResult<NetResponse>;
}

pub struct ReqwestNetClient {
    client: Client,
}

impl ReqwestNetClient {
    pub fn new(config: &DownloaderConfig) -> DownloadResult<Self> {
        let mut builder = Client::builder()
            .user_agent(&config.user_agent)
            .connect_timeout(Duration::from_secs(config.connect_timeout_secs))
            .timeout(Duration::from_secs(config.request_timeout_secs))
            .redirect(Policy::limited(10));
        if let Some(proxy_url) = &config.proxy {
            let proxy = reqwest::Proxy::all(proxy_url)
                .map_err(|err| DownloadError::Network(err.to_string()))?;
            builder = builder.proxy(proxy);
        }
        let client = builder
            .build()
            .map_err(|err| DownloadError::Network(err.to_string()))?;
        Ok(Self { client })
    }

    fn request_headers(headers: &HashMap<String, String>) -> DownloadResult<HeaderMap> {
        let mut map = HeaderMap::new();
        for (key, value) in headers {
            let name = HeaderName::from_bytes(key.as_bytes())
                .map_err(|err| DownloadError::Network(err.to_string()))?;
            let value = HeaderValue::from_str(value)
                .map_err(|err| DownloadError::Network(err.to_string()))?;
            map.insert(name, value);
        }
        Ok(map)
    }
}

impl NetClient for ReqwestNetClient {
    fn get_stream(&self, req: &AssetRequest) -> DownloadResult<NetResponse> {
        let response = self
            .client
            .get(&req.url)
            .headers(Self::request_headers(&req.headers)?)
            .send()
            .map_err(|err| DownloadError::Network(err.to_string()))?;
        let status = response.status().as_u16();
        let content_length = response
            .headers()
            .get(CONTENT_LENGTH)
            .and_then(|value| value.to_str().ok())
            .and_then(|value| value.parse::<u64>().ok());
        Ok(NetResponse {
            status,
            content_length,
            body: Box::new(response),
        })
    }
}
