//! GcsObjectStore - Cloud Storage bucket handle

use bytes::Bytes;
use contracts::{ObjectId, ObjectStore, ObjectStoreConfig, SubmissionError};
use google_cloud_storage::client::google_cloud_auth::credentials::CredentialsFile;
use google_cloud_storage::client::{Client, ClientConfig};
use google_cloud_storage::http::objects::upload::{Media, UploadObjectRequest, UploadType};
use serde_json::Value;
use tokio::sync::OnceCell;
use tracing::{debug, info, instrument};
use url::Url;

pub const DEFAULT_STORAGE_BASE_URL: &str = "https://storage.googleapis.com";

const SINK_NAME: &str = "objectStore";

/// Fields a service-account key must carry
const SERVICE_ACCOUNT_FIELDS: &[&str] = &["client_email", "private_key"];

#[derive(Clone)]
enum Auth {
    /// Service-account key JSON
    ServiceAccount(String),
    /// No credentials (emulators)
    Anonymous,
}

/// Bucket handle bound to one bucket and one set of credentials
///
/// The storage client is built on the first save.
pub struct GcsObjectStore {
    endpoint: Url,
    bucket: String,
    auth: Auth,
    client: OnceCell<Client>,
}

impl std::fmt::Debug for GcsObjectStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("GcsObjectStore")
            .field("endpoint", &self.endpoint.as_str())
            .field("bucket", &self.bucket)
            .field("anonymous", &matches!(self.auth, Auth::Anonymous))
            .finish_non_exhaustive()
    }
}

impl GcsObjectStore {
    /// `getBucket(credentials, bucket)`: `credentials` is a service-account key
    ///
    /// # Errors
    /// `Configuration` when the credentials are not a service-account key.
    pub fn new(config: &ObjectStoreConfig, endpoint: Url) -> Result<Self, SubmissionError> {
        check_service_account(&config.credentials)?;
        Ok(Self {
            endpoint,
            bucket: config.bucket.clone(),
            auth: Auth::ServiceAccount(config.credentials.clone()),
            client: OnceCell::new(),
        })
    }

    /// Unauthenticated handle, for storage emulators
    pub fn anonymous(bucket: impl Into<String>, endpoint: Url) -> Self {
        Self {
            endpoint,
            bucket: bucket.into(),
            auth: Auth::Anonymous,
            client: OnceCell::new(),
        }
    }

    async fn client(&self) -> Result<&Client, SubmissionError> {
        self.client
            .get_or_try_init(|| async {
                let mut config = match &self.auth {
                    Auth::ServiceAccount(key) => {
                        let credentials = CredentialsFile::new_from_str(key)
                            .await
                            .map_err(|e| {
                                SubmissionError::configuration("object_store.credentials", e.to_string())
                            })?;
                        ClientConfig::default()
                            .with_credentials(credentials)
                            .await
                            .map_err(|e| SubmissionError::sink_write(SINK_NAME, e.to_string()))?
                    }
                    Auth::Anonymous => ClientConfig::default().anonymous(),
                };
                config.storage_endpoint = self.endpoint.as_str().trim_end_matches('/').to_string();
                info!(bucket = %self.bucket, "storage client created");
                Ok::<_, SubmissionError>(Client::new(config))
            })
            .await
    }
}

fn check_service_account(credentials: &str) -> Result<(), SubmissionError> {
    let key: Value = serde_json::from_str(credentials).map_err(|_| {
        SubmissionError::configuration(
            "object_store.credentials",
            "credentials must be a service-account key (JSON)",
        )
    })?;
    let missing: Vec<&str> = SERVICE_ACCOUNT_FIELDS
        .iter()
        .copied()
        .filter(|field| !key.get(*field).is_some_and(Value::is_string))
        .collect();
    if !missing.is_empty() {
        return Err(SubmissionError::configuration(
            "object_store.credentials",
            format!("service-account key lacks {}", missing.join(", ")),
        ));
    }
    Ok(())
}

impl ObjectStore for GcsObjectStore {
    fn bucket(&self) -> &str {
        &self.bucket
    }

    #[instrument(name = "gcs_save", skip(self, bytes), fields(bucket = %self.bucket, size = bytes.len()))]
    async fn save(&self, name: &str, bytes: Bytes) -> Result<ObjectId, SubmissionError> {
        let client = self.client().await?;
        let request = UploadObjectRequest {
            bucket: self.bucket.clone(),
            ..Default::default()
        };
        let upload_type = UploadType::Simple(Media::new(name.to_string()));

        let object = client
            .upload_object(&request, bytes, &upload_type)
            .await
            .map_err(|e| SubmissionError::sink_write(SINK_NAME, e.to_string()))?;

        debug!(object = %object.name, "object stored");
        Ok(ObjectId {
            bucket: self.bucket.clone(),
            name: object.name,
        })
    }
}
