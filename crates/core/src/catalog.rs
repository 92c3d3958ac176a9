//! The feature catalog: `GET <origin>/features.json`.
//!
//! The catalog is loaded once and shared read-only between whoever fetched it
//! and the feature select.

use serde::{Deserialize, Serialize};
use std::ops::Deref;
use std::rc::Rc;
use std::sync::mpsc::{self, Receiver, RecvTimeoutError, TryRecvError};
use std::time::Duration;

/// One selectable feature. `label` may contain inline markup.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CatalogEntry {
    pub label: String,
    pub value: String,
}

impl CatalogEntry {
    pub fn new(label: &str, value: &str) -> Self {
        Self {
            label: label.to_string(),
            value: value.to_string(),
        }
    }

    /// The label with markup stripped.
    pub fn label_text(&self) -> String {
        crate::dom::fragment_text(&self.label)
    }

    /// Case-insensitive substring match against label or value.
    /// `needle` must already be lowercase.
    pub fn matches(&self, needle: &str) -> bool {
        self.label.to_lowercase().contains(needle) || self.value.to_lowercase().contains(needle)
    }
}

/// Shared, immutable, ordered catalog.
#[derive(Debug, Clone, PartialEq)]
pub struct Catalog(Rc<[CatalogEntry]>);

impl Catalog {
    pub fn empty() -> Self {
        Self(Rc::from(Vec::new()))
    }

    pub fn find(&self, value: &str) -> Option<&CatalogEntry> {
        self.0.iter().find(|e| e.value == value)
    }
}

impl Default for Catalog {
    fn default() -> Self {
        Self::empty()
    }
}

impl Deref for Catalog {
    type Target = [CatalogEntry];

    fn deref(&self) -> &[CatalogEntry] {
        &self.0
    }
}

impl From<Vec<CatalogEntry>> for Catalog {
    fn from(entries: Vec<CatalogEntry>) -> Self {
        Self(entries.into())
    }
}

impl FromIterator<CatalogEntry> for Catalog {
    fn from_iter<I: IntoIterator<Item = CatalogEntry>>(iter: I) -> Self {
        Self(iter.into_iter().collect())
    }
}

/// Parse the body of `features.json`.
pub fn parse_catalog(body: &str) -> Result<Vec<CatalogEntry>, CatalogError> {
    serde_json::from_str(body).map_err(|e| CatalogError::InvalidJson(e.to_string()))
}

/// `<origin>/features.json`, resolved with URL semantics so a trailing slash
/// on the origin does not double up.
pub fn features_url(origin: &str) -> Result<url::Url, CatalogError> {
    let mut base = url::Url::parse(origin).map_err(|e| CatalogError::InvalidUrl(e.to_string()))?;
    if !base.path().ends_with('/') {
        let path = format!("{}/", base.path());
        base.set_path(&path);
    }
    base.join("features.json")
        .map_err(|e| CatalogError::InvalidUrl(e.to_string()))
}

/// The catalog could not be obtained. Callers treat this as an empty catalog.
#[derive(Debug, Clone, PartialEq)]
pub enum CatalogError {
    InvalidUrl(String),
    Network(String),
    HttpError(u16),
    TooLarge(usize),
    InvalidJson(String),
    /// The worker went away without reporting.
    Abandoned,
}

impl std::fmt::Display for CatalogError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "Catalog unavailable: ")?;
        match self {
            CatalogError::InvalidUrl(e) => write!(f, "invalid URL: {}", e),
            CatalogError::Network(e) => write!(f, "network error: {}", e),
            CatalogError::HttpError(code) => write!(f, "HTTP error: {}", code),
            CatalogError::TooLarge(limit) => write!(f, "response exceeds {} bytes", limit),
            CatalogError::InvalidJson(e) => write!(f, "invalid JSON: {}", e),
            CatalogError::Abandoned => write!(f, "loader exited without a result"),
        }
    }
}

impl std::error::Error for CatalogError {}

#[cfg(feature = "fetch")]
pub use client::{CatalogClient, CatalogConfig};

#[cfg(feature = "fetch")]
mod client {
    use super::{features_url, parse_catalog, CatalogEntry, CatalogError, PendingCatalog};
    use reqwest::blocking::Client;
    use std::io::Read;
    use std::sync::mpsc;
    use std::thread;
    use std::time::Duration;

    /// Configuration for catalog fetching.
    #[derive(Debug, Clone)]
    pub struct CatalogConfig {
        /// User-Agent header.
        pub user_agent: String,
        /// Request timeout in seconds.
        pub timeout_secs: u64,
        /// Bodies larger than this are rejected.
        pub max_response_bytes: usize,
    }

    impl Default for CatalogConfig {
        fn default() -> Self {
            Self {
                user_agent: format!("caniuse-embed/{}", env!("CARGO_PKG_VERSION")),
                timeout_secs: 30,
                max_response_bytes: 8 * 1024 * 1024,
            }
        }
    }

    /// Blocking client for `features.json`.
    #[derive(Clone)]
    pub struct CatalogClient {
        client: Client,
        config: CatalogConfig,
    }

    impl CatalogClient {
        pub fn new() -> Result<Self, CatalogError> {
            Self::with_config(CatalogConfig::default())
        }

        pub fn with_config(config: CatalogConfig) -> Result<Self, CatalogError> {
            let client = Client::builder()
                .user_agent(&config.user_agent)
                .timeout(Duration::from_secs(config.timeout_secs))
                .build()
                .map_err(|e| CatalogError::Network(e.to_string()))?;
            Ok(Self { client, config })
        }

        /// Fetch and parse the catalog. Blocks the calling thread.
        pub fn load(&self, origin: &str) -> Result<Vec<CatalogEntry>, CatalogError> {
            let url = features_url(origin)?;
            tracing::debug!(url = %url, "fetching feature catalog");

            let response = self
                .client
                .get(url.as_str())
                .send()
                .map_err(|e| CatalogError::Network(e.to_string()))?;

            let status = response.status();
            if !status.is_success() {
                return Err(CatalogError::HttpError(status.as_u16()));
            }

            let body = read_limited(response, self.config.max_response_bytes)?;
            let entries = parse_catalog(&body)?;
            tracing::debug!(entries = entries.len(), "feature catalog loaded");
            Ok(entries)
        }

        /// Start [`CatalogClient::load`] on a worker thread.
        pub fn spawn(&self, origin: &str) -> PendingCatalog {
            let (tx, rx) = mpsc::channel();
            let client = self.clone();
            let origin = origin.to_string();
            thread::spawn(move || {
                // The receiver may already be gone; nothing to do then.
                let _ = tx.send(client.load(&origin));
            });
            PendingCatalog::from_receiver(rx)
        }
    }

    fn read_limited(response: reqwest::blocking::Response, limit: usize) -> Result<String, CatalogError> {
        if response.content_length().is_some_and(|len| len > limit as u64) {
            return Err(CatalogError::TooLarge(limit));
        }
        let mut buf = Vec::new();
        response
            .take(limit as u64 + 1)
            .read_to_end(&mut buf)
            .map_err(|e| CatalogError::Network(e.to_string()))?;
        if buf.len() > limit {
            return Err(CatalogError::TooLarge(limit));
        }
        String::from_utf8(buf).map_err(|e| CatalogError::InvalidJson(e.to_string()))
    }
}

/// State of an in-flight catalog load.
#[derive(Debug)]
pub enum CatalogPoll {
    Pending,
    Ready(Catalog),
    Failed(CatalogError),
}

/// Handle to a catalog load running on a worker thread.
pub struct PendingCatalog {
    rx: Option<Receiver<Result<Vec<CatalogEntry>, CatalogError>>>,
}

impl PendingCatalog {
    #[cfg(feature = "fetch")]
    pub(crate) fn from_receiver(rx: Receiver<Result<Vec<CatalogEntry>, CatalogError>>) -> Self {
        Self { rx: Some(rx) }
    }

    /// A load that has already finished; handy for tests and offline hosts.
    pub fn resolved(result: Result<Vec<CatalogEntry>, CatalogError>) -> Self {
        let (tx, rx) = mpsc::channel();
        let _ = tx.send(result);
        Self { rx: Some(rx) }
    }

    /// Non-blocking check. Yields `Ready`/`Failed` exactly once, then
    /// `Pending` forever after.
    pub fn poll(&mut self) -> CatalogPoll {
        let Some(rx) = &self.rx else {
            return CatalogPoll::Pending;
        };
        let outcome = match rx.try_recv() {
            Ok(result) => finish(result),
            Err(TryRecvError::Empty) => return CatalogPoll::Pending,
            Err(TryRecvError::Disconnected) => CatalogPoll::Failed(CatalogError::Abandoned),
        };
        self.rx = None;
        outcome
    }

    /// Block for up to `timeout`.
    pub fn wait(&mut self, timeout: Duration) -> CatalogPoll {
        let Some(rx) = &self.rx else {
            return CatalogPoll::Pending;
        };
        let outcome = match rx.recv_timeout(timeout) {
            Ok(result) => finish(result),
            Err(RecvTimeoutError::Timeout) => return CatalogPoll::Pending,
            Err(RecvTimeoutError::Disconnected) => CatalogPoll::Failed(CatalogError::Abandoned),
        };
        self.rx = None;
        outcome
    }

    pub fn is_settled(&self) -> bool {
        self.rx.is_none()
    }
}

fn finish(result: Result<Vec<CatalogEntry>, CatalogError>) -> CatalogPoll {
    match result {
        Ok(entries) => CatalogPoll::Ready(Catalog::from(entries)),
        Err(e) => CatalogPoll::Failed(e),
    }
}
