//! Call session client for the voxbook booking assistant.
//!
//! Drives a single voice call at a time: fetches a join credential from the
//! backend, joins the LiveKit room with audio only, watches for the remote
//! agent leaving, tears the call down and retrieves the post-call summary
//! with bounded retry.
//!
//! The backend and the media room are reached through the [`CallBackend`]
//! and [`MediaRoom`] traits so the controller can run against in-memory
//! fakes.

pub mod backend;
pub mod config;
pub mod controller;
pub mod error;
pub mod format;
pub mod livekit;
pub mod presence;
pub mod room;
pub mod summary;

pub use backend::{CallBackend, HttpBackend};
pub use config::{load_config, ClientConfig, ConfigError, LiveKitConfig};
pub use controller::{CallController, CallEvent, CallId, ControllerOptions, EndReason};
pub use error::SessionError;
pub use format::{format_slot, format_timestamp};
pub use livekit::LiveKitRoom;
pub use presence::{AgentPresence, PresenceSignal};
pub use room::{JoinOptions, MediaRoom, RoomEvent, RoomHandle, RoomLink};
pub use summary::{retrieve_summary, RetrievedSummary, RetryPolicy, SummarySource};
