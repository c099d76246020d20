//! Error type for the face crate.

use thiserror::Error;

/// All possible errors produced by the face.
#[derive(Error, Debug)]
pub enum Error {
    /// Error from the packet model.
    #[error(transparent)]
    Core(#[from] ndn_face_core::Error),

    /// Transport connect/read/write failure.
    #[error("transport error: {0}")]
    Transport(String),

    /// Invalid transport URI or client configuration.
    #[error("configuration error: {0}")]
    Config(String),

    /// NFD management protocol failure.
    #[error("management error: {0}")]
    Management(String),

    /// Broadcast-link misuse in the test harness.
    #[error("face has already been linked to another face")]
    AlreadyLinked,

    /// I/O error.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}
