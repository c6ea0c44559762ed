use std::path::PathBuf;

use thiserror::Error;

use crate::surface::NodeId;

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum SurfaceError {
    #[error("unknown node {0:?}")]
    UnknownNode(NodeId),
    #[error("appending {0:?} would create a cycle")]
    Cycle(NodeId),
    #[error("the surface root cannot be removed")]
    Root,
}

#[derive(Debug, Error, Clone, Copy, PartialEq, Eq)]
pub enum ModelError {
    #[error("the input model is borrowed elsewhere")]
    Busy,
}

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum GuardError {
    #[error("a submit guard is already installed on this model")]
    AlreadyInstalled,
    #[error(transparent)]
    Model(#[from] ModelError),
}

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum PanelError {
    #[error("panel is already attached")]
    AlreadyAttached,
    #[error("panel has been disposed")]
    Disposed,
    #[error("submit guard: {0}")]
    Guard(#[from] GuardError),
    #[error(transparent)]
    Model(#[from] ModelError),
    #[error("display surface: {0}")]
    Surface(#[from] SurfaceError),
}

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("{name} must be at least {min}")]
    TooSmall { name: &'static str, min: u16 },
    #[error("unknown log level '{0}'")]
    LogLevel(String),
    #[error("failed to read notebook {}: {source}", path.display())]
    NotebookRead {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("notebook {} contains no cells", path.display())]
    EmptyNotebook { path: PathBuf },
}

#[derive(Debug, Error, Clone, PartialEq, Eq)]
#[error("unknown target kind '{0}' (expected Notebook or Cell)")]
pub struct ParseTargetKindError(pub String);
