use anyhow::Result;
use std::sync::Arc;

use super::azblob::{AzblobStorage, ConnectionString};
use super::local::LocalStorage;
use super::traits::Storage;
use crate::util::config::{StorageSettings, StorageType};

/// 根据配置创建存储实例，存储被禁用时返回 `None`
pub fn create_storage(
    settings: &StorageSettings,
    base_url: &str,
) -> Result<Option<Arc<dyn Storage>>> {
    match settings.storage_type {
        StorageType::Local => {
            let base_url = format!("{}/files", base_url.trim_end_matches('/'));
            let storage: Arc<dyn Storage> =
                Arc::new(LocalStorage::new(&settings.local_dir, &base_url)?);
            tracing::info!("Local storage initialized at: {}", settings.local_dir);
            Ok(Some(storage))
        }

        StorageType::Azblob => {
            let connection = ConnectionString::parse(&settings.connection_string)?;
            let storage: Arc<dyn Storage> =
                Arc::new(AzblobStorage::new(&connection, &settings.container)?);
            tracing::info!(
                "Azure Blob storage initialized for container: {}",
                settings.container
            );
            Ok(Some(storage))
        }

        StorageType::Disabled => {
            tracing::info!("Image storage disabled");
            Ok(None)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[tokio::test]
    async fn test_create_local_storage() {
        let dir = TempDir::new().unwrap();
        let settings = StorageSettings {
            storage_type: StorageType::Local,
            local_dir: dir.path().join("images").to_string_lossy().to_string(),
            ..Default::default()
        };

        let storage = create_storage(&settings, "http://127.0.0.1:8000/")
            .unwrap()
            .unwrap();
        assert_eq!(storage.backend(), "local");
        assert!(storage.health_check().await.unwrap());
        assert_eq!(
            storage.get_public_url("x.jpg").await.unwrap(),
            "http://127.0.0.1:8000/files/x.jpg"
        );
    }

    #[test]
    fn test_disabled_storage_is_none() {
        let settings = StorageSettings {
            storage_type: StorageType::Disabled,
            ..Default::default()
        };
        assert!(create_storage(&settings, "http://localhost").unwrap().is_none());
    }

    #[test]
    fn test_azblob_requires_valid_connection_string() {
        let settings = StorageSettings::default();
        assert!(create_storage(&settings, "http://localhost").is_err());
    }
}
