use std::path::{Component, Path, PathBuf};

use anyhow::{Context, bail};
use tokio::fs;

use crate::error::{AppError, AppResult};

pub const PAYMENTS_BUCKET: &str = "payments";
pub const PRODUCTS_BUCKET: &str = "products";

/// Filesystem-backed object store with named buckets, standing in for the
/// managed storage service. Objects are written under
/// `<root>/<bucket>/<path>` and served statically from `public_base`.
#[derive(Debug, Clone)]
pub struct Storage {
    root: PathBuf,
    public_base: String,
}

impl Storage {
    pub fn new(root: impl Into<PathBuf>, public_base: impl Into<String>) -> Self {
        Self {
            root: root.into(),
            public_base: public_base.into(),
        }
    }

    pub async fn upload(&self, bucket: &str, path: &str, bytes: &[u8]) -> AppResult<()> {
        validate_object_path(path)
            .map_err(|e| AppError::BadRequest(e.to_string()))?;
        let target = self.root.join(bucket).join(path);
        if let Some(parent) = target.parent() {
            fs::create_dir_all(parent)
                .await
                .context("creating bucket directory")?;
        }
        fs::write(&target, bytes)
            .await
            .with_context(|| format!("writing object {bucket}/{path}"))?;
        Ok(())
    }

    pub fn public_url(&self, bucket: &str, path: &str) -> String {
        format!("{}/{}/{}", self.public_base.trim_end_matches('/'), bucket, path)
    }

    pub fn root(&self) -> &Path {
        &self.root
    }
}

/// Object paths come from request input; reject anything that could walk
/// outside the bucket directory.
fn validate_object_path(path: &str) -> anyhow::Result<()> {
    if path.is_empty() {
        bail!("object path must not be empty");
    }
    for component in Path::new(path).components() {
        match component {
            Component::Normal(_) => {}
            _ => bail!("object path must be a plain relative path"),
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn rejects_traversal_paths() {
        assert!(validate_object_path("../secrets").is_err());
        assert!(validate_object_path("/etc/passwd").is_err());
        assert!(validate_object_path("").is_err());
        assert!(validate_object_path("order-1/proof.jpg").is_ok());
    }

    #[test]
    fn public_url_joins_bucket_and_path() {
        let storage = Storage::new("/tmp/store", "http://localhost:3000/uploads/");
        assert_eq!(
            storage.public_url(PAYMENTS_BUCKET, "proof.jpg"),
            "http://localhost:3000/uploads/payments/proof.jpg"
        );
    }

    #[tokio::test]
    async fn upload_writes_under_bucket_root() {
        let dir = std::env::temp_dir().join(format!("storage-test-{}", uuid::Uuid::new_v4()));
        let storage = Storage::new(&dir, "http://localhost/uploads");
        storage
            .upload(PRODUCTS_BUCKET, "tea.jpg", b"bytes")
            .await
            .expect("upload");
        let written = tokio::fs::read(dir.join(PRODUCTS_BUCKET).join("tea.jpg"))
            .await
            .expect("read back");
        assert_eq!(written, b"bytes");
        let _ = tokio::fs::remove_dir_all(&dir).await;
    }
}
