pub mod analysis;

pub use analysis::{DenseCaption, ImageAnalysisResponse, ServiceStatus};
