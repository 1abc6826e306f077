//! Sink connections: connectors and the per-config client cache

use std::collections::HashMap;
use std::sync::{Arc, Mutex};

use bytes::Bytes;
use contracts::{
    DocumentStore, DocumentStoreConfig, ObjectId, ObjectStore, ObjectStoreConfig,
    SpreadsheetClient, SpreadsheetConfig, SubmissionError,
};
use reqwest::Client;
use tracing::{debug, info, instrument};
use url::Url;

use crate::key_lock::{KeyGuard, KeyLocks};
use crate::lock;
use crate::sinks::{
    DocumentBackend, GcsObjectStore, GoogleSheetsClient, MemoryObjectStore, MemoryRegistry,
    MemorySpreadsheet, DEFAULT_SHEETS_BASE_URL, DEFAULT_STORAGE_BASE_URL,
};

/// Builds sink clients from their configuration
///
/// Connecting must not perform I/O beyond resolving the target; failures
/// surface as `Configuration` errors.
pub trait SinkConnector: Send + Sync {
    type Documents: DocumentStore + Send + Sync + 'static;
    type Sheets: SpreadsheetClient + Send + Sync + 'static;
    type Objects: ObjectStore + Send + Sync + 'static;

    fn connect_documents(
        &self,
        config: &DocumentStoreConfig,
    ) -> Result<Self::Documents, SubmissionError>;

    fn connect_sheets(&self, config: &SpreadsheetConfig) -> Result<Self::Sheets, SubmissionError>;

    fn connect_objects(&self, config: &ObjectStoreConfig)
        -> Result<Self::Objects, SubmissionError>;
}

/// Production connector: MongoDB or file document stores, Sheets over HTTP,
/// Cloud Storage through the storage client
#[derive(Debug, Clone)]
pub struct HttpConnector {
    http: Client,
    sheets_base: Url,
    storage_base: Url,
    memory: MemoryRegistry,
}

impl HttpConnector {
    /// Connector against the public Google endpoints
    pub fn new(http: Client) -> Result<Self, SubmissionError> {
        let parse = |field: &str, raw: &str| {
            Url::parse(raw).map_err(|e| SubmissionError::configuration(field, e.to_string()))
        };
        Ok(Self {
            http,
            sheets_base: parse("sheets.base_url", DEFAULT_SHEETS_BASE_URL)?,
            storage_base: parse("storage.base_url", DEFAULT_STORAGE_BASE_URL)?,
            memory: MemoryRegistry::new(),
        })
    }

    pub fn with_sheets_base(mut self, base: Url) -> Self {
        self.sheets_base = base;
        self
    }

    pub fn with_storage_base(mut self, base: Url) -> Self {
        self.storage_base = base;
        self
    }

    /// Registry backing `memory://` document stores
    pub fn memory(&self) -> &MemoryRegistry {
        &self.memory
    }
}

impl SinkConnector for HttpConnector {
    type Documents = DocumentBackend;
    type Sheets = GoogleSheetsClient;
    type Objects = GcsObjectStore;

    fn connect_documents(
        &self,
        config: &DocumentStoreConfig,
    ) -> Result<DocumentBackend, SubmissionError> {
        DocumentBackend::connect(&config.uri, &self.memory)
    }

    fn connect_sheets(&self, _config: &SpreadsheetConfig) -> Result<GoogleSheetsClient, SubmissionError> {
        Ok(GoogleSheetsClient::new(
            self.http.clone(),
            self.sheets_base.clone(),
        ))
    }

    fn connect_objects(&self, config: &ObjectStoreConfig) -> Result<GcsObjectStore, SubmissionError> {
        GcsObjectStore::new(config, self.storage_base.clone())
    }
}

/// Fully in-process connector (dry runs, tests)
#[derive(Debug, Clone, Default)]
pub struct MemoryConnector {
    memory: MemoryRegistry,
    sheets: MemorySpreadsheet,
    buckets: Arc<Mutex<HashMap<String, MemoryObjectStore>>>,
}

impl MemoryConnector {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn memory(&self) -> &MemoryRegistry {
        &self.memory
    }

    pub fn sheets(&self) -> &MemorySpreadsheet {
        &self.sheets
    }

    pub fn bucket(&self, name: &str) -> Option<MemoryObjectStore> {
        lock(&self.buckets).get(name).cloned()
    }
}

impl SinkConnector for MemoryConnector {
    type Documents = DocumentBackend;
    type Sheets = MemorySpreadsheet;
    type Objects = MemoryObjectStore;

    fn connect_documents(
        &self,
        config: &DocumentStoreConfig,
    ) -> Result<DocumentBackend, SubmissionError> {
        DocumentBackend::connect(&config.uri, &self.memory)
    }

    fn connect_sheets(&self, _config: &SpreadsheetConfig) -> Result<MemorySpreadsheet, SubmissionError> {
        Ok(self.sheets.clone())
    }

    fn connect_objects(&self, config: &ObjectStoreConfig) -> Result<MemoryObjectStore, SubmissionError> {
        Ok(lock(&self.buckets)
            .entry(config.bucket.clone())
            .or_insert_with(|| MemoryObjectStore::new(&config.bucket))
            .clone())
    }
}

/// One cached client and the configuration it was built from
struct Cached<K, T> {
    slot: Mutex<Option<(K, Arc<T>)>>,
}

impl<K: PartialEq + Clone, T> Cached<K, T> {
    fn new() -> Self {
        Self {
            slot: Mutex::new(None),
        }
    }

    fn get_or_connect(
        &self,
        sink: &str,
        key: &K,
        connect: impl FnOnce() -> Result<T, SubmissionError>,
    ) -> Result<Arc<T>, SubmissionError> {
        let mut slot = lock(&self.slot);
        if let Some((cached_key, client)) = slot.as_ref() {
            if cached_key == key {
                return Ok(Arc::clone(client));
            }
            debug!(sink, "configuration changed, reconnecting");
        }

        *slot = None;
        let client = Arc::new(connect()?);
        *slot = Some((key.clone(), Arc::clone(&client)));
        info!(sink, "sink client connected");
        Ok(client)
    }

    fn invalidate(&self) -> bool {
        lock(&self.slot).take().is_some()
    }

    fn is_connected(&self) -> bool {
        lock(&self.slot).is_some()
    }
}

/// Lazily created, reused sink clients
///
/// A client is rebuilt only when the configuration it was built from
/// changes. A failed connect leaves no cached client behind.
///
/// The context also owns the uniqueness locks, so every aggregator sharing
/// one context serialises check-then-write for the same store and key.
pub struct SinkContext<C: SinkConnector> {
    connector: C,
    documents: Cached<String, C::Documents>,
    sheets: Cached<(String, Option<String>), C::Sheets>,
    objects: Cached<ObjectStoreConfig, C::Objects>,
    keys: KeyLocks<(String, String)>,
}

impl<C: SinkConnector> SinkContext<C> {
    pub fn new(connector: C) -> Self {
        Self {
            connector,
            documents: Cached::new(),
            sheets: Cached::new(),
            objects: Cached::new(),
            keys: KeyLocks::new(),
        }
    }

    pub fn connector(&self) -> &C {
        &self.connector
    }

    pub fn documents(
        &self,
        config: &DocumentStoreConfig,
    ) -> Result<Arc<C::Documents>, SubmissionError> {
        self.documents
            .get_or_connect("documentStore", &config.uri, || {
                self.connector.connect_documents(config)
            })
    }

    pub fn sheets(&self, config: &SpreadsheetConfig) -> Result<Arc<C::Sheets>, SubmissionError> {
        let credentials = (config.api_key.clone(), config.access_token.clone());
        self.sheets.get_or_connect("spreadsheet", &credentials, || {
            self.connector.connect_sheets(config)
        })
    }

    pub fn objects(&self, config: &ObjectStoreConfig) -> Result<Arc<C::Objects>, SubmissionError> {
        self.objects.get_or_connect("objectStore", config, || {
            self.connector.connect_objects(config)
        })
    }

    /// Exclusive access to `key` within the document store at `config.uri`
    pub async fn lock_key(
        &self,
        config: &DocumentStoreConfig,
        key: &str,
    ) -> KeyGuard<'_, (String, String)> {
        self.keys
            .acquire((config.uri.clone(), key.to_string()))
            .await
    }

    /// Uniqueness keys currently held or awaited
    pub fn locked_keys(&self) -> usize {
        self.keys.len()
    }

    /// Whether any client is currently cached
    pub fn is_connected(&self) -> bool {
        self.documents.is_connected() || self.sheets.is_connected() || self.objects.is_connected()
    }

    /// Drop every cached client; the next call reconnects
    pub fn invalidate_all(&self) {
        let dropped = [
            self.documents.invalidate(),
            self.sheets.invalidate(),
            self.objects.invalidate(),
        ]
        .into_iter()
        .filter(|d| *d)
        .count();
        debug!(dropped, "sink clients invalidated");
    }

    /// Save `bytes` as `name` in the configured bucket
    #[instrument(name = "sink_context_store_object", skip(self, config, bytes), fields(bucket = %config.bucket, size = bytes.len()))]
    pub async fn store_object(
        &self,
        config: &ObjectStoreConfig,
        name: &str,
        bytes: Bytes,
    ) -> Result<ObjectId, SubmissionError> {
        let store = self.objects(config)?;
        let result = store.save(name, bytes).await;
        observability::record_object_stored(result.is_ok());
        result
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};

    /// Counts connects, delegating to the memory connector
    #[derive(Default)]
    struct CountingConnector {
        inner: MemoryConnector,
        object_connects: AtomicUsize,
        document_connects: AtomicUsize,
    }

    impl SinkConnector for CountingConnector {
        type Documents = DocumentBackend;
        type Sheets = MemorySpreadsheet;
        type Objects = MemoryObjectStore;

        fn connect_documents(
            &self,
            config: &DocumentStoreConfig,
        ) -> Result<DocumentBackend, SubmissionError> {
            self.document_connects.fetch_add(1, Ordering::SeqCst);
            self.inner.connect_documents(config)
        }

        fn connect_sheets(
            &self,
            config: &SpreadsheetConfig,
        ) -> Result<MemorySpreadsheet, SubmissionError> {
            self.inner.connect_sheets(config)
        }

        fn connect_objects(
            &self,
            config: &ObjectStoreConfig,
        ) -> Result<MemoryObjectStore, SubmissionError> {
            self.object_connects.fetch_add(1, Ordering::SeqCst);
            self.inner.connect_objects(config)
        }
    }

    fn bucket(name: &str) -> ObjectStoreConfig {
        ObjectStoreConfig {
            bucket: name.to_string(),
            credentials: "secret".to_string(),
        }
    }

    #[tokio::test]
    async fn test_reconnect_only_on_config_change() {
        let context = SinkContext::new(CountingConnector::default());

        context
            .store_object(&bucket("b1"), "a.txt", Bytes::from_static(b"a"))
            .await
            .unwrap();
        context
            .store_object(&bucket("b1"), "b.txt", Bytes::from_static(b"b"))
            .await
            .unwrap();
        assert_eq!(context.connector().object_connects.load(Ordering::SeqCst), 1);

        let id = context
            .store_object(&bucket("b2"), "c.txt", Bytes::from_static(b"c"))
            .await
            .unwrap();
        assert_eq!(id.bucket, "b2");
        assert_eq!(context.connector().object_connects.load(Ordering::SeqCst), 2);

        let b2 = context.connector().inner.bucket("b2").unwrap();
        assert_eq!(b2.names(), vec!["c.txt".to_string()]);
    }

    #[tokio::test]
    async fn test_invalidate_all_forces_reconnect() {
        let context = SinkContext::new(CountingConnector::default());
        let config = DocumentStoreConfig::new("memory://responses");

        context.documents(&config).unwrap();
        context.documents(&config).unwrap();
        assert_eq!(context.connector().document_connects.load(Ordering::SeqCst), 1);
        assert!(context.is_connected());

        context.invalidate_all();
        assert!(!context.is_connected());

        context.documents(&config).unwrap();
        assert_eq!(context.connector().document_connects.load(Ordering::SeqCst), 2);
    }

    #[test]
    fn test_failed_connect_keeps_nothing() {
        let context = SinkContext::new(MemoryConnector::new());
        context
            .documents(&DocumentStoreConfig::new("memory://responses"))
            .unwrap();

        let err = context
            .documents(&DocumentStoreConfig::new("redis://localhost"))
            .unwrap_err();
        assert!(matches!(err, SubmissionError::Configuration { .. }));
        assert!(!context.is_connected());
    }

    #[test]
    fn test_http_connector_rejects_bare_token_credentials() {
        let context = SinkContext::new(HttpConnector::new(Client::new()).unwrap());
        let err = context.objects(&bucket("b1")).unwrap_err();
        assert!(matches!(err, SubmissionError::Configuration { .. }));
        assert!(!context.is_connected());
    }

    #[test]
    fn test_http_connector_base_overrides() {
        let connector = HttpConnector::new(Client::new())
            .unwrap()
            .with_sheets_base(Url::parse("http://127.0.0.1:9000").unwrap());
        assert_eq!(connector.sheets_base.as_str(), "http://127.0.0.1:9000/");
        assert_eq!(connector.storage_base.as_str(), "https://storage.googleapis.com/");
    }
}
