use anyhow::Result;
use async_trait::async_trait;

/// 图片存储trait
#[async_trait]
pub trait Storage: Send + Sync {
    /// 后端名称，用于日志
    fn backend(&self) -> &'static str;

    /// 存储文件，已存在时覆盖
    async fn put(&self, key: &str, data: &[u8], content_type: Option<&str>) -> Result<()>;

    /// 获取文件
    async fn get(&self, key: &str) -> Result<Option<Vec<u8>>>;

    /// 检查文件是否存在
    async fn exists(&self, key: &str) -> Result<bool>;

    /// 获取文件的访问URL
    async fn get_public_url(&self, key: &str) -> Result<String>;

    /// 健康检查
    async fn health_check(&self) -> Result<bool>;

    /// 启动时的准备工作，例如创建容器；默认无需准备
    async fn prepare(&self) -> Result<()> {
        Ok(())
    }
}
