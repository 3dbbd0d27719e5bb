//! Panel image storage: upload originals, build view URLs.

use serde::Deserialize;
use tracing::info;

use crate::{BackendClient, StoreError};

/// Bucket holding uploaded panel images.
pub const IMAGE_BUCKET: &str = "defect-images";

pub struct ObjectStore {
    backend: BackendClient,
}

#[derive(Deserialize)]
struct FileMeta {
    id: String,
}

impl ObjectStore {
    pub fn new(backend: BackendClient) -> Self {
        Self { backend }
    }

    /// Upload one image, returning its file id.
    pub async fn upload(
        &self,
        filename: &str,
        mime: &str,
        data: Vec<u8>,
    ) -> Result<String, StoreError> {
        self.backend.require_session()?;
        info!(file = %filename, bytes = data.len(), "uploading image");

        let part = reqwest::multipart::Part::bytes(data)
            .file_name(filename.to_string())
            .mime_str(mime)?;
        let form = reqwest::multipart::Form::new().part("file", part);

        let resp = self
            .backend
            .post(&format!("/buckets/{IMAGE_BUCKET}/files"))
            .multipart(form)
            .send()
            .await?;
        let resp = BackendClient::check(resp).await?;
        let meta: FileMeta = resp.json().await?;
        Ok(meta.id)
    }

    /// View URL for an uploaded image; this is what gets persisted as the
    /// record's image reference.
    pub fn view_url(&self, file_id: &str) -> String {
        self.backend
            .url(&format!("/buckets/{IMAGE_BUCKET}/files/{file_id}/view"))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn view_url_targets_the_image_bucket() {
        let store = ObjectStore::new(BackendClient::new("http://localhost:4000/".into()));
        assert_eq!(
            store.view_url("file-9"),
            "http://localhost:4000/buckets/defect-images/files/file-9/view"
        );
    }
}
