use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{PoisonError, RwLock};

use async_trait::async_trait;
use serde_json::Value;

use crate::error::{Result, SchemaError};

/// Source of schema documents that are not registered locally.
#[async_trait]
pub trait SchemaFetcher: Send + Sync {
    /// Fetch the schema document published at `uri`.
    async fn fetch(&self, uri: &str) -> Result<Value>;
}

/// Fetcher serving documents from memory.
///
/// Useful offline and for exercising remote `$ref` handling without a network.
#[derive(Debug, Default)]
pub struct MemoryFetcher {
    documents: RwLock<HashMap<String, Value>>,
    requests: AtomicUsize,
}

impl MemoryFetcher {
    pub fn new() -> Self {
        Self::default()
    }

    /// Publish `document` under `uri`, replacing any earlier document.
    pub fn insert(&self, uri: impl Into<String>, document: Value) {
        self.documents
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .insert(uri.into(), document);
    }

    /// Number of fetches served or refused so far.
    pub fn requests(&self) -> usize {
        self.requests.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl SchemaFetcher for MemoryFetcher {
    async fn fetch(&self, uri: &str) -> Result<Value> {
        self.requests.fetch_add(1, Ordering::SeqCst);
        self.documents
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .get(uri)
            .cloned()
            .ok_or_else(|| SchemaError::Fetch {
                uri: uri.to_string(),
                message: "not published".to_string(),
            })
    }
}

#[cfg(feature = "http")]
pub use http::HttpFetcher;

#[cfg(feature = "http")]
mod http {
    use std::time::Duration;

    use async_trait::async_trait;
    use serde_json::Value;

    use super::SchemaFetcher;
    use crate::error::{Result, SchemaError};

    /// Fetches schemas with a plain HTTP GET.
    #[derive(Debug, Clone)]
    pub struct HttpFetcher {
        http: reqwest::Client,
    }

    impl HttpFetcher {
        pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(10);

        pub fn new() -> Result<Self> {
            Self::with_timeout(Self::DEFAULT_TIMEOUT)
        }

        pub fn with_timeout(timeout: Duration) -> Result<Self> {
            let http = reqwest::Client::builder()
                .timeout(timeout)
                .build()
                .map_err(|err| SchemaError::Fetch {
                    uri: String::new(),
                    message: format!("failed to build HTTP client: {err}"),
                })?;
            Ok(Self { http })
        }

        pub fn with_client(http: reqwest::Client) -> Self {
            Self { http }
        }
    }

    #[async_trait]
    impl SchemaFetcher for HttpFetcher {
        async fn fetch(&self, uri: &str) -> Result<Value> {
            let fetch_error = |message: String| SchemaError::Fetch {
                uri: uri.to_string(),
                message,
            };

            let resp = self
                .http
                .get(uri)
                .send()
                .await
                .map_err(|err| fetch_error(err.to_string()))?;

            if !resp.status().is_success() {
                return Err(fetch_error(format!("HTTP {}", resp.status().as_u16())));
            }

            resp.json()
                .await
                .map_err(|err| fetch_error(format!("malformed schema document: {err}")))
        }
    }

}
