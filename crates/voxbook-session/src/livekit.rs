//! LiveKit-backed media room.
//!
//! Audio transport is handled by the media client; this type tracks room
//! membership through the LiveKit server API. It polls the participant list
//! of the granted room and reports the number of participants other than the
//! local identity. Once the room has been seen, three consecutive failed
//! polls are reported as a disconnect.

use crate::config::LiveKitConfig;
use crate::error::SessionError;
use crate::room::{JoinOptions, MediaRoom, RoomEvent, RoomHandle, RoomLink, ROOM_EVENT_CAPACITY};
use async_trait::async_trait;
use livekit_api::access_token::TokenVerifier;
use livekit_api::services::room::{CreateRoomOptions, RoomClient};
use livekit_protocol::ParticipantInfo;
use std::time::Duration;
use tokio::sync::mpsc;
use tokio::task::AbortHandle;
use tokio::time::MissedTickBehavior;
use tracing::{debug, info, warn};
use voxbook_types::TokenResponse;

const MAX_CONSECUTIVE_POLL_FAILURES: u32 = 3;

#[derive(Debug, Clone)]
pub struct LiveKitRoom {
    config: LiveKitConfig,
}

impl LiveKitRoom {
    pub fn new(config: LiveKitConfig) -> Self {
        Self { config }
    }

    /// Room name and local identity for `grant`, decoding the token when the
    /// backend did not spell them out.
    fn resolve_target(&self, grant: &TokenResponse) -> Result<(String, String), SessionError> {
        if let (Some(room), Some(identity)) = (&grant.room, &grant.identity) {
            return Ok((room.clone(), identity.clone()));
        }

        let verifier = TokenVerifier::with_api_key(&self.config.api_key, &self.config.api_secret);
        let claims = verifier.verify(grant.token.expose())?;
        let room = grant.room.clone().unwrap_or(claims.video.room);
        let identity = grant.identity.clone().unwrap_or(claims.sub);
        if room.is_empty() {
            return Err(SessionError::Room(
                "credential does not name a room".to_string(),
            ));
        }
        Ok((room, identity))
    }
}

#[async_trait]
impl MediaRoom for LiveKitRoom {
    async fn join(
        &self,
        url: &str,
        grant: &TokenResponse,
        options: JoinOptions,
    ) -> Result<RoomLink, SessionError> {
        let (tx, rx) = mpsc::channel(ROOM_EVENT_CAPACITY);

        if !self.config.has_api_credentials() {
            warn!(
                url,
                "LiveKit API credentials not configured; agent departure will not be detected"
            );
            drop(tx);
            return Ok(RoomLink {
                events: rx,
                handle: Box::new(LiveKitRoomHandle { poller: None }),
            });
        }

        let (room, identity) = self.resolve_target(grant)?;
        let host = api_host(url);
        info!(
            room = %room,
            identity = %identity,
            audio = options.audio,
            video = options.video,
            "joining LiveKit room"
        );

        let client =
            RoomClient::with_api_key(&host, &self.config.api_key, &self.config.api_secret);
        if let Err(e) = client.create_room(&room, CreateRoomOptions::default()).await {
            warn!(room = %room, error = %e, "could not ensure room exists");
        }

        let poller = tokio::spawn(poll_membership(
            client,
            room,
            identity,
            self.config.poll_interval(),
            tx,
        ));

        Ok(RoomLink {
            events: rx,
            handle: Box::new(LiveKitRoomHandle {
                poller: Some(poller.abort_handle()),
            }),
        })
    }
}

struct LiveKitRoomHandle {
    poller: Option<AbortHandle>,
}

impl RoomHandle for LiveKitRoomHandle {
    fn leave(&self) {
        if let Some(poller) = &self.poller {
            poller.abort();
        }
    }
}

/// What a poll result means for the call.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum PollOutcome {
    Unchanged,
    RemoteCount(usize),
    Disconnected,
}

/// Turns participant polls into room events.
///
/// Failures before the room is first seen count as an empty room, since the
/// room may not exist until the agent is dispatched. After that,
/// [`MAX_CONSECUTIVE_POLL_FAILURES`] failures in a row mean the room is gone.
/// Counts are only reported when they change.
#[derive(Debug, Default)]
struct MembershipTracker {
    room_seen: bool,
    failures: u32,
    last_count: Option<usize>,
}

impl MembershipTracker {
    fn room_seen(&self) -> bool {
        self.room_seen
    }

    fn succeeded(&mut self, remote: usize) -> PollOutcome {
        self.room_seen = true;
        self.failures = 0;
        self.report(remote)
    }

    fn failed(&mut self) -> PollOutcome {
        if !self.room_seen {
            return self.report(0);
        }
        self.failures += 1;
        if self.failures >= MAX_CONSECUTIVE_POLL_FAILURES {
            PollOutcome::Disconnected
        } else {
            PollOutcome::Unchanged
        }
    }

    fn report(&mut self, remote: usize) -> PollOutcome {
        if self.last_count == Some(remote) {
            PollOutcome::Unchanged
        } else {
            self.last_count = Some(remote);
            PollOutcome::RemoteCount(remote)
        }
    }
}

async fn poll_membership(
    client: RoomClient,
    room: String,
    local_identity: String,
    interval: Duration,
    tx: mpsc::Sender<RoomEvent>,
) {
    let mut ticker = tokio::time::interval(interval);
    ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
    let mut tracker = MembershipTracker::default();

    loop {
        ticker.tick().await;

        let outcome = match client.list_participants(&room).await {
            Ok(participants) => tracker.succeeded(count_remote(&participants, &local_identity)),
            Err(e) if !tracker.room_seen() => {
                debug!(room = %room, error = %e, "room not available yet");
                tracker.failed()
            }
            Err(e) => {
                let outcome = tracker.failed();
                warn!(
                    room = %room,
                    failures = tracker.failures,
                    error = %e,
                    "participant poll failed"
                );
                outcome
            }
        };

        match outcome {
            PollOutcome::Unchanged => {}
            PollOutcome::RemoteCount(remote) => {
                if tx.send(RoomEvent::RemoteParticipants(remote)).await.is_err() {
                    return;
                }
            }
            PollOutcome::Disconnected => {
                let _ = tx.send(RoomEvent::Disconnected).await;
                return;
            }
        }
    }
}

fn count_remote(participants: &[ParticipantInfo], local_identity: &str) -> usize {
    participants
        .iter()
        .filter(|p| p.identity != local_identity)
        .count()
}

/// Maps a signalling URL to the HTTP host the server API listens on.
fn api_host(url: &str) -> String {
    if let Some(rest) = url.strip_prefix("wss://") {
        format!("https://{}", rest)
    } else if let Some(rest) = url.strip_prefix("ws://") {
        format!("http://{}", rest)
    } else {
        url.to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn participant(identity: &str) -> ParticipantInfo {
        ParticipantInfo {
            identity: identity.to_string(),
            ..Default::default()
        }
    }

    #[test]
    fn local_participant_is_not_counted() {
        let participants = vec![participant("user-ab12"), participant("agent-1")];
        assert_eq!(count_remote(&participants, "user-ab12"), 1);
        assert_eq!(count_remote(&[], "user-ab12"), 0);
    }

    #[test]
    fn websocket_urls_map_to_http() {
        assert_eq!(api_host("wss://demo.livekit.cloud"), "https://demo.livekit.cloud");
        assert_eq!(api_host("ws://localhost:7880"), "http://localhost:7880");
        assert_eq!(api_host("http://localhost:7880"), "http://localhost:7880");
    }

    #[test]
    fn explicit_grant_fields_skip_token_decoding() {
        let room = LiveKitRoom::new(LiveKitConfig::new("ws://lk", "key", "secret"));
        let grant = TokenResponse {
            token: voxbook_types::Credential::new("not-a-jwt"),
            room: Some("voice-booking-session-1".to_string()),
            identity: Some("user-1".to_string()),
            url: None,
        };
        let (name, identity) = room.resolve_target(&grant).unwrap();
        assert_eq!(name, "voice-booking-session-1");
        assert_eq!(identity, "user-1");
    }

    #[test]
    fn undecodable_token_is_rejected() {
        let room = LiveKitRoom::new(LiveKitConfig::new("ws://lk", "key", "secret"));
        let grant = TokenResponse {
            token: voxbook_types::Credential::new("not-a-jwt"),
            room: None,
            identity: None,
            url: None,
        };
        assert!(matches!(
            room.resolve_target(&grant),
            Err(SessionError::LiveKit(_))
        ));
    }

    #[test]
    fn three_failures_after_room_seen_disconnect() {
        let mut tracker = MembershipTracker::default();
        assert_eq!(tracker.succeeded(1), PollOutcome::RemoteCount(1));
        assert_eq!(tracker.failed(), PollOutcome::Unchanged);
        assert_eq!(tracker.failed(), PollOutcome::Unchanged);
        assert_eq!(tracker.failed(), PollOutcome::Disconnected);
    }

    #[test]
    fn success_resets_failure_streak() {
        let mut tracker = MembershipTracker::default();
        tracker.succeeded(1);
        tracker.failed();
        tracker.failed();
        assert_eq!(tracker.succeeded(1), PollOutcome::Unchanged);
        assert_eq!(tracker.failed(), PollOutcome::Unchanged);
        assert_eq!(tracker.failed(), PollOutcome::Unchanged);
        assert_eq!(tracker.failed(), PollOutcome::Disconnected);
    }

    #[test]
    fn unseen_room_failures_count_as_empty_and_never_disconnect() {
        let mut tracker = MembershipTracker::default();
        assert_eq!(tracker.failed(), PollOutcome::RemoteCount(0));
        for _ in 0..10 {
            assert_eq!(tracker.failed(), PollOutcome::Unchanged);
        }
        assert!(!tracker.room_seen());
        assert_eq!(tracker.succeeded(1), PollOutcome::RemoteCount(1));
    }

    #[test]
    fn counts_reported_only_on_change() {
        let mut tracker = MembershipTracker::default();
        let outcomes: Vec<_> = [0, 0, 1, 1, 0]
            .into_iter()
            .map(|n| tracker.succeeded(n))
            .collect();
        assert_eq!(
            outcomes,
            vec![
                PollOutcome::RemoteCount(0),
                PollOutcome::Unchanged,
                PollOutcome::RemoteCount(1),
                PollOutcome::Unchanged,
                PollOutcome::RemoteCount(0),
            ]
        );
    }

    #[tokio::test]
    async fn join_without_credentials_yields_silent_room() {
        let room = LiveKitRoom::new(LiveKitConfig::default());
        let grant = TokenResponse {
            token: voxbook_types::Credential::new("jwt"),
            room: None,
            identity: None,
            url: None,
        };
        let mut link = room
            .join("ws://localhost:7880", &grant, JoinOptions::audio_only())
            .await
            .unwrap();
        assert!(link.events.recv().await.is_none());
        link.handle.leave();
    }
}
