mod channel;
mod frames;

pub use channel::{ChannelManager, CookieSource};
pub use frames::{ChannelEvent, ChatFrame, ConnectionState, InboundFrame, OutboundFrame};

use crate::error::Result;

/// Somewhere outbound frames can be written without blocking.
pub trait FrameSink: Send + Sync {
    /// Fails with `Error::NotConnected` when the frame cannot be handed to an open connection.
    fn send_frame(&self, frame: &OutboundFrame) -> Result<()>;
}
