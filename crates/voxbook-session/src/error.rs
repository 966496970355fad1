use thiserror::Error;

#[derive(Error, Debug)]
pub enum SessionError {
    /// Token fetch or room join failed; the call returns to idle.
    #[error("failed to start call: {0}")]
    SessionStart(String),

    /// A summary request failed. Absorbed by the retry policy.
    #[error("failed to fetch summary: {0}")]
    SummaryFetch(String),

    #[error("a call is already in progress")]
    CallInProgress,

    /// The call was ended while its credential was still being fetched.
    #[error("call start was cancelled")]
    Cancelled,

    #[error("media room error: {0}")]
    Room(String),

    #[error("LiveKit error: {0}")]
    LiveKit(#[from] livekit_api::access_token::AccessTokenError),

    #[error("Invalid configuration: {0}")]
    Config(String),
}
