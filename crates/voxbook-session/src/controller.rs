//! Call session controller.
//!
//! Owns the lifecycle of one voice call at a time: credential acquisition,
//! room membership, agent departure detection, teardown and summary
//! retrieval. All per-call state lives in a single [`Session`] value behind a
//! synchronous mutex that is never held across an `.await`; every mutation
//! goes through one of its transition methods. Each call gets a fresh
//! [`CallId`], and background work (presence monitor, summary retrieval)
//! carries the id of the call it belongs to, so a late result from an older
//! call can never touch a newer one.

use crate::backend::CallBackend;
use crate::error::SessionError;
use crate::presence::{AgentPresence, PresenceSignal};
use crate::room::{JoinOptions, MediaRoom, RoomEvent, RoomHandle};
use crate::summary::{retrieve_summary, RetrievedSummary, RetryPolicy};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use tokio::runtime::Handle;
use tokio::sync::{broadcast, mpsc};
use tokio::task::AbortHandle;
use tracing::{debug, info, warn};
use voxbook_types::{CallState, CallSummary, Credential};

/// Default capacity for the controller's event broadcast channel.
const DEFAULT_EVENT_BROADCAST_CAPACITY: usize = 64;

/// Identifies one call within a controller. Never reused.
pub type CallId = u64;

/// Why a call ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EndReason {
    /// Explicit request from the local user.
    User,
    /// The agent was seen and then the room emptied.
    AgentLeft,
    /// The media room reported a disconnect.
    RoomDisconnected,
}

/// Lifecycle notification for front-ends.
#[derive(Debug, Clone)]
pub enum CallEvent {
    Connecting { call_id: CallId },
    Active { call_id: CallId },
    StartFailed { call_id: CallId, reason: String },
    AgentJoined { call_id: CallId },
    Ended { call_id: CallId, reason: EndReason },
    SummaryReady { call_id: CallId, summary: CallSummary, fallback: bool },
    Dismissed { call_id: CallId },
}

#[derive(Debug, Clone)]
pub struct ControllerOptions {
    /// Media server URL, used when the token response carries none.
    pub room_url: String,
    pub retry: RetryPolicy,
}

impl ControllerOptions {
    pub fn new(room_url: impl Into<String>) -> Self {
        Self {
            room_url: room_url.into(),
            retry: RetryPolicy::default(),
        }
    }
}

enum Phase {
    Idle,
    Connecting {
        call_id: CallId,
    },
    Active {
        call_id: CallId,
        credential: Credential,
        room: Box<dyn RoomHandle>,
        monitor: AbortHandle,
        /// Runtime the call was started on; teardown spawns retrieval here
        /// so `end()` works from any thread.
        runtime: Handle,
    },
    Ended {
        call_id: CallId,
        summary: Option<CallSummary>,
        retrieval: Option<AbortHandle>,
    },
}

/// What [`Session::end`] did.
enum EndEffect {
    Nothing,
    /// A pending start was abandoned before a room was joined.
    Abandoned(CallId),
    /// An active call was torn down and now awaits its summary.
    Ended(CallId, Handle),
}

/// Per-call state and its transitions.
struct Session {
    phase: Phase,
}

impl Session {
    fn new() -> Self {
        Self { phase: Phase::Idle }
    }

    fn state(&self) -> CallState {
        match self.phase {
            Phase::Idle => CallState::Idle,
            Phase::Connecting { .. } => CallState::Connecting,
            Phase::Active { .. } => CallState::Active,
            Phase::Ended { .. } => CallState::Ended,
        }
    }

    fn call_id(&self) -> Option<CallId> {
        match self.phase {
            Phase::Idle => None,
            Phase::Connecting { call_id }
            | Phase::Active { call_id, .. }
            | Phase::Ended { call_id, .. } => Some(call_id),
        }
    }

    fn is_connecting(&self, id: CallId) -> bool {
        matches!(self.phase, Phase::Connecting { call_id } if call_id == id)
    }

    /// Idle or Ended -> Connecting. Cancels any retrieval left from the
    /// previous call.
    fn begin(&mut self, call_id: CallId) -> Result<(), SessionError> {
        match &self.phase {
            Phase::Connecting { .. } | Phase::Active { .. } => Err(SessionError::CallInProgress),
            Phase::Ended { retrieval, .. } => {
                if let Some(task) = retrieval {
                    task.abort();
                }
                self.phase = Phase::Connecting { call_id };
                Ok(())
            }
            Phase::Idle => {
                self.phase = Phase::Connecting { call_id };
                Ok(())
            }
        }
    }

    /// Connecting(id) -> Idle.
    fn abandon(&mut self, call_id: CallId) -> bool {
        if self.is_connecting(call_id) {
            self.phase = Phase::Idle;
            true
        } else {
            false
        }
    }

    /// Connecting(id) -> Active. Hands the room back if the call was
    /// abandoned in the meantime.
    fn activate(
        &mut self,
        call_id: CallId,
        credential: Credential,
        room: Box<dyn RoomHandle>,
        monitor: AbortHandle,
        runtime: Handle,
    ) -> Result<(), (Box<dyn RoomHandle>, AbortHandle)> {
        if !self.is_connecting(call_id) {
            return Err((room, monitor));
        }
        self.phase = Phase::Active {
            call_id,
            credential,
            room,
            monitor,
            runtime,
        };
        Ok(())
    }

    /// Active -> Ended, or Connecting -> Idle. With `target` set, only the
    /// call with that id is affected.
    ///
    /// Taking the credential out of the session is what makes repeated
    /// calls no-ops.
    fn end(&mut self, target: Option<CallId>) -> EndEffect {
        let current = match self.call_id() {
            Some(id) if target.map_or(true, |t| t == id) => id,
            _ => return EndEffect::Nothing,
        };

        match std::mem::replace(&mut self.phase, Phase::Idle) {
            Phase::Active {
                call_id,
                credential,
                room,
                monitor,
                runtime,
            } => {
                room.leave();
                monitor.abort();
                drop(credential);
                self.phase = Phase::Ended {
                    call_id,
                    summary: None,
                    retrieval: None,
                };
                EndEffect::Ended(call_id, runtime)
            }
            Phase::Connecting { call_id } => EndEffect::Abandoned(call_id),
            other => {
                self.phase = other;
                debug!(call_id = current, "end ignored, call already over");
                EndEffect::Nothing
            }
        }
    }

    fn attach_retrieval(&mut self, id: CallId, task: AbortHandle) {
        match &mut self.phase {
            Phase::Ended {
                call_id,
                summary: None,
                retrieval,
            } if *call_id == id => *retrieval = Some(task),
            _ => task.abort(),
        }
    }

    /// Stores the summary if the session is still waiting for it.
    fn deliver(&mut self, id: CallId, retrieved: &CallSummary) -> bool {
        match &mut self.phase {
            Phase::Ended {
                call_id,
                summary,
                retrieval,
            } if *call_id == id && summary.is_none() => {
                *summary = Some(retrieved.clone());
                *retrieval = None;
                true
            }
            _ => false,
        }
    }

    fn summary(&self) -> Option<&CallSummary> {
        match &self.phase {
            Phase::Ended { summary, .. } => summary.as_ref(),
            _ => None,
        }
    }

    /// Ended with a summary -> Idle.
    fn dismiss(&mut self) -> Option<CallId> {
        match self.phase {
            Phase::Ended {
                call_id,
                summary: Some(_),
                ..
            } => {
                self.phase = Phase::Idle;
                Some(call_id)
            }
            _ => None,
        }
    }
}

struct Inner {
    backend: Arc<dyn CallBackend>,
    room: Arc<dyn MediaRoom>,
    options: ControllerOptions,
    session: Mutex<Session>,
    next_call_id: AtomicU64,
    events: broadcast::Sender<CallEvent>,
}

/// Drives voice calls against a backend and a media room.
///
/// Cheap to clone; clones share the same session.
#[derive(Clone)]
pub struct CallController {
    inner: Arc<Inner>,
}

impl std::fmt::Debug for CallController {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CallController")
            .field("state", &self.state())
            .field("options", &self.inner.options)
            .finish()
    }
}

impl CallController {
    pub fn new(
        backend: Arc<dyn CallBackend>,
        room: Arc<dyn MediaRoom>,
        options: ControllerOptions,
    ) -> Self {
        let (events, _) = broadcast::channel(DEFAULT_EVENT_BROADCAST_CAPACITY);
        Self {
            inner: Arc::new(Inner {
                backend,
                room,
                options,
                session: Mutex::new(Session::new()),
                next_call_id: AtomicU64::new(1),
                events,
            }),
        }
    }

    fn session(&self) -> MutexGuard<'_, Session> {
        self.inner
            .session
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
    }

    fn emit(&self, event: CallEvent) {
        // No subscribers is fine.
        let _ = self.inner.events.send(event);
    }

    pub fn subscribe(&self) -> broadcast::Receiver<CallEvent> {
        self.inner.events.subscribe()
    }

    pub fn state(&self) -> CallState {
        self.session().state()
    }

    /// Id of the current (or last, until dismissed) call.
    pub fn current_call(&self) -> Option<CallId> {
        self.session().call_id()
    }

    /// The post-call summary, once the call has ended and it is ready.
    pub fn summary(&self) -> Option<CallSummary> {
        self.session().summary().cloned()
    }

    /// Starts a call.
    ///
    /// Rejected with [`SessionError::CallInProgress`] while a call is
    /// connecting or active. Starting from `Ended` discards the previous
    /// summary. Token or room failures return the controller to `Idle`
    /// without retrying.
    pub async fn start(&self) -> Result<CallId, SessionError> {
        let call_id = self.inner.next_call_id.fetch_add(1, Ordering::Relaxed);
        self.session().begin(call_id)?;
        info!(call_id, "starting call");
        self.emit(CallEvent::Connecting { call_id });

        let grant = match self.inner.backend.fetch_token().await {
            Ok(grant) => grant,
            Err(e) => return Err(self.fail_start(call_id, e)),
        };

        if !self.session().is_connecting(call_id) {
            info!(call_id, "call ended before credential arrived, discarding it");
            return Err(SessionError::Cancelled);
        }

        let url = grant
            .url
            .clone()
            .unwrap_or_else(|| self.inner.options.room_url.clone());
        let link = match self
            .inner
            .room
            .join(&url, &grant, JoinOptions::audio_only())
            .await
        {
            Ok(link) => link,
            Err(e) => return Err(self.fail_start(call_id, e)),
        };

        // Spawn under the lock so the monitor cannot observe the session
        // before it is active.
        let activated = {
            let mut session = self.session();
            let runtime = Handle::current();
            let monitor = runtime.spawn(monitor_presence(self.clone(), call_id, link.events));
            session.activate(
                call_id,
                grant.token,
                link.handle,
                monitor.abort_handle(),
                runtime,
            )
        };
        if let Err((room, monitor)) = activated {
            room.leave();
            monitor.abort();
            info!(call_id, "call ended while joining room, leaving it");
            return Err(SessionError::Cancelled);
        }

        info!(call_id, "call active");
        self.emit(CallEvent::Active { call_id });
        Ok(call_id)
    }

    fn fail_start(&self, call_id: CallId, error: SessionError) -> SessionError {
        let error = match error {
            SessionError::SessionStart(_) => error,
            other => SessionError::SessionStart(other.to_string()),
        };
        if self.session().abandon(call_id) {
            warn!(call_id, error = %error, "call start failed");
            self.emit(CallEvent::StartFailed {
                call_id,
                reason: error.to_string(),
            });
            error
        } else {
            SessionError::Cancelled
        }
    }

    /// Ends the current call at the user's request.
    ///
    /// Returns `false` when there was nothing to end. Calling it again for
    /// the same call has no further effect. Safe to call from threads
    /// outside the runtime.
    pub fn end(&self) -> bool {
        self.end_call(None, EndReason::User)
    }

    fn end_call(&self, target: Option<CallId>, reason: EndReason) -> bool {
        let mut session = self.session();
        match session.end(target) {
            EndEffect::Nothing => false,
            EndEffect::Abandoned(call_id) => {
                drop(session);
                info!(call_id, ?reason, "call abandoned while connecting");
                self.emit(CallEvent::StartFailed {
                    call_id,
                    reason: "call ended before it connected".to_string(),
                });
                true
            }
            EndEffect::Ended(call_id, runtime) => {
                let retrieval = self.spawn_retrieval(&runtime, call_id);
                session.attach_retrieval(call_id, retrieval);
                drop(session);
                info!(call_id, ?reason, "call ended");
                self.emit(CallEvent::Ended { call_id, reason });
                true
            }
        }
    }

    fn spawn_retrieval(&self, runtime: &Handle, call_id: CallId) -> AbortHandle {
        let controller = self.clone();
        let policy = self.inner.options.retry;
        runtime.spawn(async move {
            let retrieved = retrieve_summary(controller.inner.backend.as_ref(), policy).await;
            controller.deliver_summary(call_id, retrieved);
        })
        .abort_handle()
    }

    fn deliver_summary(&self, call_id: CallId, retrieved: RetrievedSummary) {
        if !self.session().deliver(call_id, &retrieved.summary) {
            debug!(call_id, "discarding summary for a call that is no longer current");
            return;
        }
        self.emit(CallEvent::SummaryReady {
            call_id,
            summary: retrieved.summary.clone(),
            fallback: retrieved.is_fallback(),
        });
    }

    /// Closes the summary and returns to `Idle`.
    ///
    /// Returns `false` if no summary is on display.
    pub fn dismiss_summary(&self) -> bool {
        let dismissed = self.session().dismiss();
        match dismissed {
            Some(call_id) => {
                self.emit(CallEvent::Dismissed { call_id });
                true
            }
            None => false,
        }
    }
}

/// Watches room events for one call and ends it when the agent leaves or
/// the room disconnects.
async fn monitor_presence(
    controller: CallController,
    call_id: CallId,
    mut events: mpsc::Receiver<RoomEvent>,
) {
    let mut presence = AgentPresence::new();

    while let Some(event) = events.recv().await {
        match event {
            RoomEvent::RemoteParticipants(count) => match presence.observe(count) {
                PresenceSignal::AgentJoined => {
                    info!(call_id, count, "agent joined the room");
                    controller.emit(CallEvent::AgentJoined { call_id });
                }
                PresenceSignal::AgentLeft => {
                    info!(call_id, "agent disconnected, ending call");
                    controller.end_call(Some(call_id), EndReason::AgentLeft);
                    return;
                }
                PresenceSignal::Unchanged => {}
            },
            RoomEvent::Disconnected => {
                controller.end_call(Some(call_id), EndReason::RoomDisconnected);
                return;
            }
        }
    }
    debug!(call_id, "room event stream closed");
}
