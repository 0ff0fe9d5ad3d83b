use std::sync::Arc;

pub mod api;
pub mod build_info;
pub mod caption;
pub mod model;
pub mod server;
pub mod storage;
pub mod util;
pub mod vision;

use caption::CaptionEnhancer;
use util::config::Config;
use vision::VisionClient;

/// 应用状态结构
#[derive(Clone)]
pub struct AppState {
    pub config: Arc<Config>,
    /// 图片存储；配置为 disabled 时为 `None`
    pub storage: Option<Arc<dyn storage::Storage>>,
    pub vision: Arc<dyn VisionClient>,
    pub enhancer: Arc<CaptionEnhancer>,
}

