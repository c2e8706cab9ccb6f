mod client;
mod error;

pub use client::{
    normalize_azimuth, normalize_elevation, CommandReply, ConnectionState, Rotctld, DEFAULT_HOST,
    DEFAULT_PORT, DEFAULT_TIMEOUT,
};
pub use error::RotctldError;

/// The part of a rotator the tracking loop needs.
#[allow(async_fn_in_trait)]
pub trait Rotator {
    async fn get_pos(&mut self) -> Result<Option<(f64, f64)>, RotctldError>;
    async fn set_pos(&mut self, azimuth: f64, elevation: f64) -> Result<CommandReply, RotctldError>;
}

impl Rotator for Rotctld {
    async fn get_pos(&mut self) -> Result<Option<(f64, f64)>, RotctldError> {
        Rotctld::get_pos(self).await
    }

    async fn set_pos(&mut self, azimuth: f64, elevation: f64) -> Result<CommandReply, RotctldError> {
        Rotctld::set_pos(self, azimuth, elevation).await
    }
}
