//! Pipeline error types.

use thiserror::Error;

use crate::config::ConfigError;

pub type PipelineResult<T> = Result<T, PipelineError>;

#[derive(Debug, Error)]
pub enum PipelineError {
    #[error("configuration error: {0}")]
    Config(#[from] ConfigError),

    #[error("service error: {0}")]
    Service(#[from] matchcut_services::ServiceError),

    #[error("media error: {0}")]
    Media(#[from] matchcut_media::MediaError),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}
