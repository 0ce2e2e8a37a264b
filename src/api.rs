use std::path::Path;

use async_trait::async_trait;
use reqwest::{Response, StatusCode, multipart};

use crate::model::{Block, Collection, CollectionContent, MediaType, Tag};

/// Failure of a backend call. Transport problems and non-2xx statuses
/// are both surfaced to the caller; nothing is retried here.
#[derive(Debug, thiserror::Error)]
pub enum ApiError {
    #[error("request failed: {0}")]
    Transport(#[from] reqwest::Error),
    #[error("server returned {status} while trying to {operation}")]
    Status {
        status: StatusCode,
        operation: String,
    },
    #[error("could not read {path}: {source}")]
    File {
        path: String,
        source: std::io::Error,
    },
}

/// The backend surface the editor talks to.
///
/// Create and replace share a single upsert operation: `put_block` with
/// an `id` replaces that block, without an `id` it creates one (at the
/// `index` carried in the payload).
#[async_trait]
pub trait CollectionApi {
    async fn fetch_collection_content(
        &self,
        collection_id: i64,
    ) -> Result<CollectionContent, ApiError>;

    async fn put_block(&self, collection_id: i64, block: &Block) -> Result<Block, ApiError>;

    async fn delete_block(&self, collection_id: i64, block_id: &str) -> Result<(), ApiError>;

    async fn update_order(&self, collection_id: i64, order: &[String]) -> Result<(), ApiError>;

    async fn upload_file(
        &self,
        collection_id: i64,
        block_id: &str,
        media_type: MediaType,
        path: &Path,
    ) -> Result<Block, ApiError>;

    async fn list_collections(&self) -> Result<Vec<Collection>, ApiError>;

    async fn create_collection(&self, name: &str) -> Result<Collection, ApiError>;

    async fn delete_collection(&self, collection_id: i64) -> Result<(), ApiError>;

    async fn rename_collection(
        &self,
        collection_id: i64,
        name: &str,
    ) -> Result<Collection, ApiError>;

    async fn update_collection_tag(
        &self,
        collection_id: i64,
        tag_id: Option<i64>,
    ) -> Result<Collection, ApiError>;

    async fn list_tags(&self) -> Result<Vec<Tag>, ApiError>;

    async fn create_tag(&self, name: &str) -> Result<Tag, ApiError>;

    async fn delete_tag(&self, tag_id: i64) -> Result<(), ApiError>;
}

/// HTTP implementation of [`CollectionApi`].
#[derive(Clone, Debug)]
pub struct ApiClient {
    base_url: String,
    http: reqwest::Client,
}

impl ApiClient {
    pub fn new(base_url: impl Into<String>) -> Self {
        let mut base_url = base_url.into();
        while base_url.ends_with('/') {
            base_url.pop();
        }
        Self {
            base_url,
            http: reqwest::Client::new(),
        }
    }

    fn url(&self, path: &str) -> String {
        format!("{}{}", self.base_url, path)
    }
}

async fn expect_ok(response: Response, operation: &str) -> Result<Response, ApiError> {
    let status = response.status();
    if status.is_success() {
        Ok(response)
    } else {
        Err(ApiError::Status {
            status,
            operation: operation.to_string(),
        })
    }
}

#[async_trait]
impl CollectionApi for ApiClient {
    async fn fetch_collection_content(
        &self,
        collection_id: i64,
    ) -> Result<CollectionContent, ApiError> {
        let response = self
            .http
            .get(self.url(&format!("/collections/{collection_id}")))
            .send()
            .await?;
        let response = expect_ok(response, "fetch collection content").await?;
        Ok(response.json().await?)
    }

    async fn put_block(&self, collection_id: i64, block: &Block) -> Result<Block, ApiError> {
        let response = self
            .http
            .post(self.url(&format!("/collections/{collection_id}/blocks")))
            .json(block)
            .send()
            .await?;
        let response = expect_ok(response, "save block").await?;
        Ok(response.json().await?)
    }

    async fn delete_block(&self, collection_id: i64, block_id: &str) -> Result<(), ApiError> {
        let response = self
            .http
            .delete(self.url(&format!("/collections/{collection_id}/blocks/{block_id}")))
            .send()
            .await?;
        expect_ok(response, "delete block").await?;
        Ok(())
    }

    async fn update_order(&self, collection_id: i64, order: &[String]) -> Result<(), ApiError> {
        let response = self
            .http
            .put(self.url(&format!("/collections/{collection_id}/order")))
            .json(&order)
            .send()
            .await?;
        expect_ok(response, "update block order").await?;
        Ok(())
    }

    async fn upload_file(
        &self,
        collection_id: i64,
        block_id: &str,
        media_type: MediaType,
        path: &Path,
    ) -> Result<Block, ApiError> {
        let bytes = tokio::fs::read(path).await.map_err(|source| ApiError::File {
            path: path.display().to_string(),
            source,
        })?;
        let file_name = path
            .file_name()
            .map(|name| name.to_string_lossy().into_owned())
            .unwrap_or_else(|| "upload".to_string());
        let form = multipart::Form::new().part(
            "file",
            multipart::Part::bytes(bytes).file_name(file_name),
        );
        let response = self
            .http
            .post(self.url(&format!("/collections/{collection_id}/file")))
            .query(&[("block_id", block_id), ("media_type", media_type.as_str())])
            .multipart(form)
            .send()
            .await?;
        let response = expect_ok(response, "upload file").await?;
        Ok(response.json().await?)
    }

    async fn list_collections(&self) -> Result<Vec<Collection>, ApiError> {
        let response = self.http.get(self.url("/collections")).send().await?;
        let response = expect_ok(response, "list collections").await?;
        Ok(response.json().await?)
    }

    async fn create_collection(&self, name: &str) -> Result<Collection, ApiError> {
        let response = self
            .http
            .post(self.url("/collections"))
            .query(&[("name", name)])
            .send()
            .await?;
        let response = expect_ok(response, "create collection").await?;
        Ok(response.json().await?)
    }

    async fn delete_collection(&self, collection_id: i64) -> Result<(), ApiError> {
        let response = self
            .http
            .delete(self.url(&format!("/collections/{collection_id}")))
            .send()
            .await?;
        expect_ok(response, "delete collection").await?;
        Ok(())
    }

    async fn rename_collection(
        &self,
        collection_id: i64,
        name: &str,
    ) -> Result<Collection, ApiError> {
        let response = self
            .http
            .put(self.url(&format!("/collections/{collection_id}/name")))
            .query(&[("name", name)])
            .send()
            .await?;
        let response = expect_ok(response, "rename collection").await?;
        Ok(response.json().await?)
    }

    async fn update_collection_tag(
        &self,
        collection_id: i64,
        tag_id: Option<i64>,
    ) -> Result<Collection, ApiError> {
        let tag_segment = match tag_id {
            Some(id) => id.to_string(),
            None => "null".to_string(),
        };
        let response = self
            .http
            .put(self.url(&format!("/collections/{collection_id}/tags/{tag_segment}")))
            .send()
            .await?;
        let response = expect_ok(response, "update collection tag").await?;
        Ok(response.json().await?)
    }

    async fn list_tags(&self) -> Result<Vec<Tag>, ApiError> {
        let response = self.http.get(self.url("/tags")).send().await?;
        let response = expect_ok(response, "list tags").await?;
        Ok(response.json().await?)
    }

    async fn create_tag(&self, name: &str) -> Result<Tag, ApiError> {
        let response = self
            .http
            .post(self.url("/tags"))
            .query(&[("name", name)])
            .send()
            .await?;
        let response = expect_ok(response, "create tag").await?;
        Ok(response.json().await?)
    }

    async fn delete_tag(&self, tag_id: i64) -> Result<(), ApiError> {
        let response = self
            .http
            .delete(self.url(&format!("/tags/{tag_id}")))
            .send()
            .await?;
        expect_ok(response, "delete tag").await?;
        Ok(())
    }
}
