use gcp_bigquery_client::client_builder::ClientBuilder;
use gcp_bigquery_client::yup_oauth2::{parse_service_account_key, ServiceAccountKey};
use gcp_bigquery_client::Client;
use std::path::PathBuf;
use tracing::info;

use crate::error::{BqLiteError, Result};

#[derive(Debug, Clone)]
pub enum Credentials {
    ServiceAccountKey(ServiceAccountKey),
    KeyFile(PathBuf),
    ApplicationDefault,
}

impl Credentials {
    /// Picks the first credential source present: an explicit key, then a
    /// key file, then application default credentials.
    pub fn resolve(explicit: Option<ServiceAccountKey>, key_file: Option<PathBuf>) -> Self {
        match (explicit, key_file) {
            (Some(key), _) => Credentials::ServiceAccountKey(key),
            (None, Some(path)) => Credentials::KeyFile(path),
            (None, None) => Credentials::ApplicationDefault,
        }
    }

    pub fn from_key_json(json: &str) -> Result<Self> {
        let key = parse_service_account_key(json)
            .map_err(|e| BqLiteError::Credentials(e.to_string()))?;
        Ok(Credentials::ServiceAccountKey(key))
    }

    pub fn describe(&self) -> String {
        match self {
            Credentials::ServiceAccountKey(key) => format!("service account {}", key.client_email),
            Credentials::KeyFile(path) => format!("key file {}", path.display()),
            Credentials::ApplicationDefault => "application default credentials".to_string(),
        }
    }

    pub(crate) async fn connect(&self) -> Result<Client> {
        info!(source = %self.describe(), "Resolving BigQuery credentials");
        let builder = ClientBuilder::new();
        let client = match self {
            Credentials::ServiceAccountKey(key) => {
                builder
                    .build_from_service_account_key(key.clone(), false)
                    .await?
            }
            Credentials::KeyFile(path) => {
                let path = path.to_str().ok_or_else(|| {
                    BqLiteError::Credentials(format!(
                        "key file path is not valid UTF-8: {}",
                        path.display()
                    ))
                })?;
                builder.build_from_service_account_key_file(path).await?
            }
            Credentials::ApplicationDefault => {
                builder.build_from_application_default_credentials().await?
            }
        };
        Ok(client)
    }
}
