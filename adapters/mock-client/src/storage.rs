//! Storage bucket stubs. Only the `documents` bucket has side effects: it
//! mirrors uploads and removals into the `documents` table.

use domain::{Condition, Record, Table};
use mock_auth::pause;
use serde::{Deserialize, Serialize};
use tracing::{info, warn};

use crate::{ClientError, MockClient};

const DOCUMENTS_BUCKET: &str = "documents";

/// Metadata of an uploaded file; the mock never sees the bytes.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct UploadFile {
    pub name: String,
    pub content_type: String,
    pub size: u64,
}

pub struct Storage {
    client: MockClient,
}

impl Storage {
    pub(crate) fn new(client: MockClient) -> Self {
        Self { client }
    }

    pub fn from(&self, bucket: &str) -> Bucket {
        Bucket {
            client: self.client.clone(),
            name: bucket.to_string(),
        }
    }
}

pub struct Bucket {
    client: MockClient,
    name: String,
}

impl Bucket {
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Returns `path`. Uploads to `documents/<folder>/<item>/...` also
    /// create a document row for `<item>`.
    pub async fn upload(&self, path: &str, file: &UploadFile) -> Result<String, ClientError> {
        pause(self.client.config().upload_latency).await;
        info!(bucket = %self.name, path, size = file.size, "mock upload");

        if self.name == DOCUMENTS_BUCKET {
            let item_id = path.split('/').nth(1).unwrap_or("unknown-item");
            let uploaded_by = self
                .client
                .auth()
                .current_user_id()
                .unwrap_or_else(|| "unknown-user".to_string());
            let doc = Record::new()
                .with("name", file.name.as_str())
                .with("file_type", file.content_type.as_str())
                .with("file_url", format!("/mock-docs/{}", path))
                .with("item_id", item_id)
                .with("uploaded_by", uploaded_by);
            self.client.store().insert(Table::Documents, doc)?;
        }
        Ok(path.to_string())
    }

    pub async fn download(&self, path: &str) -> Result<Vec<u8>, ClientError> {
        pause(self.client.config().download_latency).await;
        warn!(bucket = %self.name, path, "download requested in mock mode");
        Err(ClientError::new("Mock download not implemented", 501))
    }

    pub fn get_public_url(&self, path: &str) -> String {
        format!("/mock-storage/{}/{}", self.name, path)
    }

    /// Returns the file names (last path segment) of the removed paths.
    pub async fn remove(&self, paths: &[&str]) -> Result<Vec<String>, ClientError> {
        pause(self.client.config().remove_latency).await;
        info!(bucket = %self.name, count = paths.len(), "mock remove");

        if self.name == DOCUMENTS_BUCKET {
            let store = self.client.store();
            for path in paths {
                let url = format!("/mock-docs/{}", path);
                let matches =
                    store.filter(Table::Documents, &[Condition::eq("file_url", url)])?;
                for doc in matches {
                    if let Some(id) = doc.id() {
                        store.delete(Table::Documents, id)?;
                    }
                }
            }
        }
        Ok(paths
            .iter()
            .map(|p| p.rsplit('/').next().unwrap_or_default().to_string())
            .collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::client;
    use domain::RecordStore;

    fn pdf() -> UploadFile {
        UploadFile {
            name: "manual.pdf".into(),
            content_type: "application/pdf".into(),
            size: 1024,
        }
    }

    #[tokio::test]
    async fn documents_upload_and_remove_mirror_rows() {
        let (store, client) = client();
        client
            .auth()
            .sign_in_with_password("admin@konbase.cfd", mock_auth::DEMO_PASSWORD)
            .await
            .unwrap();
        let bucket = client.storage().from("documents");

        let path = bucket.upload("items/item-2/manual.pdf", &pdf()).await.unwrap();
        assert_eq!(path, "items/item-2/manual.pdf");

        let docs = store
            .filter(Table::Documents, &[Condition::eq("item_id", "item-2")])
            .unwrap();
        assert_eq!(docs.len(), 1);
        assert_eq!(docs[0].str("file_url"), Some("/mock-docs/items/item-2/manual.pdf"));
        assert_eq!(docs[0].str("uploaded_by"), Some("user-admin"));

        let removed = bucket.remove(&["items/item-2/manual.pdf"]).await.unwrap();
        assert_eq!(removed, vec!["manual.pdf"]);
        assert!(store
            .filter(Table::Documents, &[Condition::eq("item_id", "item-2")])
            .unwrap()
            .is_empty());
    }

    #[tokio::test]
    async fn upload_without_session_or_item_segment() {
        let (store, client) = client();
        client.storage().from("documents").upload("loose.pdf", &pdf()).await.unwrap();
        let docs = store
            .filter(Table::Documents, &[Condition::eq("item_id", "unknown-item")])
            .unwrap();
        assert_eq!(docs.len(), 1);
        assert_eq!(docs[0].str("uploaded_by"), Some("unknown-user"));
    }

    #[tokio::test]
    async fn other_buckets_have_no_side_effects() {
        let (store, client) = client();
        let before = store.all(Table::Documents).unwrap().len();
        let avatars = client.storage().from("avatars");
        avatars.upload("u/me.png", &pdf()).await.unwrap();
        assert_eq!(store.all(Table::Documents).unwrap().len(), before);
        assert_eq!(avatars.get_public_url("u/me.png"), "/mock-storage/avatars/u/me.png");
    }

    #[tokio::test]
    async fn download_is_not_implemented() {
        let (_store, client) = client();
        let err = client.storage().from("documents").download("x").await.unwrap_err();
        assert_eq!(err.message, "Mock download not implemented");
        assert_eq!(err.status, Some(501));
    }
}
