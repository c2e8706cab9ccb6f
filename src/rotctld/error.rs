use std::time::Duration;

use thiserror::Error;

#[derive(Debug, Error)]
pub enum RotctldError {
    #[error("invalid port {0}")]
    InvalidPort(u16),
    #[error("not connected to rotctld, call connect() first")]
    NotConnected,
    #[error("already connected to rotctld")]
    AlreadyConnected,
    #[error("could not connect to rotctld at {addr}: {source}")]
    Connect {
        addr: String,
        #[source]
        source: std::io::Error,
    },
    #[error("no response from rotctld within {0:?}")]
    Timeout(Duration),
    #[error("rotctld closed the connection")]
    ConnectionClosed,
    #[error("rotctld i/o error: {0}")]
    Io(#[from] std::io::Error),
}
