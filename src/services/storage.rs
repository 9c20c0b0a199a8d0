use s3::creds::Credentials;
use s3::{Bucket, Region};
use uuid::Uuid;

/// Build the blob key a normalized input image is stored under.
pub fn image_key(task_id: Uuid, extension: &str) -> String {
    format!("images/{task_id}.{extension}")
}

/// Build the blob key a task's result text is stored under.
pub fn result_key(task_id: Uuid) -> String {
    format!("results/{task_id}/result.txt")
}

/// Client for S3-compatible object storage holding input images and result
/// artifacts.
pub struct BlobStore {
    bucket: Box<Bucket>,
}

impl BlobStore {
    pub fn new(
        bucket_name: &str,
        endpoint: &str,
        region: &str,
        access_key: &str,
        secret_key: &str,
    ) -> Result<Self, StorageError> {
        let region = Region::Custom {
            region: region.to_string(),
            endpoint: endpoint.to_string(),
        };

        let credentials = Credentials::new(Some(access_key), Some(secret_key), None, None, None)
            .map_err(|e| StorageError::Config(e.to_string()))?;

        let bucket = Bucket::new(bucket_name, region, credentials)
            .map_err(|e| StorageError::Config(e.to_string()))?;

        Ok(Self { bucket })
    }

    /// Upload bytes under the given key.
    pub async fn upload(
        &self,
        key: &str,
        data: &[u8],
        content_type: &str,
    ) -> Result<(), StorageError> {
        self.bucket
            .put_object_with_content_type(key, data, content_type)
            .await
            .map_err(StorageError::S3)?;
        Ok(())
    }

    /// Download the bytes stored under the given key.
    pub async fn download(&self, key: &str) -> Result<Vec<u8>, StorageError> {
        let response = self.bucket.get_object(key).await.map_err(StorageError::S3)?;
        Ok(response.to_vec())
    }

    /// Delete an object.
    pub async fn delete(&self, key: &str) -> Result<(), StorageError> {
        self.bucket.delete_object(key).await.map_err(StorageError::S3)?;
        Ok(())
    }
}

#[derive(Debug, thiserror::Error)]
pub enum StorageError {
    #[error("S3 operation failed: {0}")]
    S3(#[from] s3::error::S3Error),

    #[error("Storage configuration error: {0}")]
    Config(String),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn blob_keys_follow_the_fixed_layout() {
        let task_id = "2eafcfd1-9001-425b-996a-b9f213a2da71".parse::<Uuid>().unwrap();
        assert_eq!(
            image_key(task_id, "jpg"),
            "images/2eafcfd1-9001-425b-996a-b9f213a2da71.jpg"
        );
        assert_eq!(
            result_key(task_id),
            "results/2eafcfd1-9001-425b-996a-b9f213a2da71/result.txt"
        );
    }
}
