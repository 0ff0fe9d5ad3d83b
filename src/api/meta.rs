//! 服务状态接口

use crate::model::analysis::ServiceStatus;
use crate::AppState;
use axum::extract::State;
use axum::Json;

const RUNNING_MESSAGE: &str = "Vision API is running";

/// `GET /`
pub async fn service_status(State(state): State<AppState>) -> Json<ServiceStatus> {
    Json(build_status(&state))
}

pub fn build_status(state: &AppState) -> ServiceStatus {
    ServiceStatus {
        message: RUNNING_MESSAGE,
        vision_endpoint_configured: state.config.vision.endpoint_configured(),
        vision_key_configured: state.config.vision.key_configured(),
        storage_configured: state.storage.is_some(),
        version: crate::build_info::summary(),
    }
}
