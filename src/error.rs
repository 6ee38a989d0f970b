use thiserror::Error;

use crate::model::{BodyId, VisualId};

/// Errors surfaced while building or wiring a simulation session.
///
/// Per-frame work never returns these; anything that can go wrong is caught at setup.
#[derive(Debug, Error)]
pub enum TumbleError {
    #[error("no physics body with id {0:?}")]
    UnknownBody(BodyId),

    #[error("no visual entity with id {0:?}")]
    UnknownVisual(VisualId),

    #[error("body {0:?} is already paired with a visual")]
    BodyAlreadyPaired(BodyId),

    #[error("visual {0:?} is already paired with a body")]
    VisualAlreadyPaired(VisualId),

    #[error("invalid body description: {0}")]
    InvalidShape(String),

    #[error("invalid config: {0}")]
    InvalidConfig(String),

    #[error("failed to parse config: {0}")]
    Config(#[from] toml::de::Error),

    #[error(transparent)]
    Io(#[from] std::io::Error),

    #[error("gpu: {0}")]
    Gpu(String),

    #[error("window: {0}")]
    Window(String),
}

pub type Result<T> = std::result::Result<T, TumbleError>;
