//! Media room abstraction used by the call controller.

use crate::error::SessionError;
use async_trait::async_trait;
use tokio::sync::mpsc;
use voxbook_types::TokenResponse;

/// Default capacity for a room's event channel.
pub const ROOM_EVENT_CAPACITY: usize = 64;

/// Track settings requested when joining a room.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct JoinOptions {
    pub audio: bool,
    pub video: bool,
}

impl JoinOptions {
    pub fn audio_only() -> Self {
        Self {
            audio: true,
            video: false,
        }
    }
}

/// Notification pushed by a joined room.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RoomEvent {
    /// Current number of non-local participants.
    RemoteParticipants(usize),
    /// The room connection was closed from the remote side.
    Disconnected,
}

/// Leaves a joined room. Must be safe to call more than once.
pub trait RoomHandle: Send + Sync {
    fn leave(&self);
}

/// A joined room: its event stream plus the handle used to leave it.
pub struct RoomLink {
    pub events: mpsc::Receiver<RoomEvent>,
    pub handle: Box<dyn RoomHandle>,
}

impl std::fmt::Debug for RoomLink {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RoomLink").finish_non_exhaustive()
    }
}

/// Real-time media room service.
#[async_trait]
pub trait MediaRoom: Send + Sync + 'static {
    /// Joins the room `grant` authorizes, at `url`.
    async fn join(
        &self,
        url: &str,
        grant: &TokenResponse,
        options: JoinOptions,
    ) -> Result<RoomLink, SessionError>;
}
