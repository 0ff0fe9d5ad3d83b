use anyhow::{Context, Result};
use async_trait::async_trait;
use std::path::{Path, PathBuf};
use tokio::fs;
use tracing::info;

use super::traits::Storage;

/// 本地文件系统存储实现，开发环境使用
pub struct LocalStorage {
    base_path: PathBuf,
    base_url: String,
}

impl LocalStorage {
    pub fn new(base_path: impl AsRef<Path>, base_url: &str) -> Result<Self> {
        let base_path = base_path.as_ref().to_path_buf();

        std::fs::create_dir_all(&base_path).context("Failed to create base directory")?;

        Ok(Self {
            base_path,
            base_url: base_url.trim_end_matches('/').to_string(),
        })
    }

    /// 获取文件的完整路径
    fn get_full_path(&self, key: &str) -> PathBuf {
        self.base_path.join(key.trim_start_matches('/'))
    }
}

#[async_trait]
impl Storage for LocalStorage {
    fn backend(&self) -> &'static str {
        "local"
    }

    async fn put(&self, key: &str, data: &[u8], _content_type: Option<&str>) -> Result<()> {
        let path = self.get_full_path(key);

        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)
                .await
                .context("Failed to create parent directory")?;
        }

        fs::write(&path, data)
            .await
            .with_context(|| format!("Failed to write file: {}", path.display()))?;

        info!("[ok] 本地写入成功: {}, size={}字节", path.display(), data.len());
        Ok(())
    }

    async fn get(&self, key: &str) -> Result<Option<Vec<u8>>> {
        let path = self.get_full_path(key);

        match fs::read(&path).await {
            Ok(data) => Ok(Some(data)),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(None),
            Err(e) => Err(e).context("Failed to read file"),
        }
    }

    async fn exists(&self, key: &str) -> Result<bool> {
        fs::try_exists(self.get_full_path(key))
            .await
            .context("Failed to check file existence")
    }

    async fn get_public_url(&self, key: &str) -> Result<String> {
        Ok(format!("{}/{}", self.base_url, key.trim_start_matches('/')))
    }

    async fn health_check(&self) -> Result<bool> {
        self.base_path
            .try_exists()
            .context("Failed to check base directory")
    }
}
