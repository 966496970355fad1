//! In-memory backend and media room used by the controller tests.

#![allow(dead_code)]

use async_trait::async_trait;
use std::collections::VecDeque;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use tokio::sync::{mpsc, Notify};
use tokio::time::Instant;
use voxbook_session::{
    CallBackend, JoinOptions, MediaRoom, RoomEvent, RoomHandle, RoomLink, SessionError,
};
use voxbook_types::{Appointment, CallSummary, Credential, TokenResponse};

pub fn summary(text: &str) -> CallSummary {
    CallSummary {
        text: text.to_string(),
        appointments: vec![Appointment::new("2026-01-20T10:00:00")],
        preferences: None,
        timestamp: "2026-01-19T09:00:00+00:00".to_string(),
    }
}

/// Backend whose token and summary responses are scripted by the test.
#[derive(Default)]
pub struct FakeBackend {
    pub token_fails: AtomicBool,
    pub token_calls: AtomicUsize,
    /// When set, token requests wait for a notification before answering.
    pub token_gate: Option<Arc<Notify>>,
    /// Consumed front to back; `None` or an empty queue means failure.
    pub summaries: Mutex<VecDeque<Option<CallSummary>>>,
    pub summary_calls: Mutex<Vec<Instant>>,
}

impl FakeBackend {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_summaries(script: Vec<Option<CallSummary>>) -> Self {
        Self {
            summaries: Mutex::new(script.into()),
            ..Self::default()
        }
    }

    pub fn summary_call_count(&self) -> usize {
        self.summary_calls.lock().unwrap().len()
    }

    pub fn summary_call_times(&self) -> Vec<Instant> {
        self.summary_calls.lock().unwrap().clone()
    }
}

#[async_trait]
impl CallBackend for FakeBackend {
    async fn fetch_token(&self) -> Result<TokenResponse, SessionError> {
        self.token_calls.fetch_add(1, Ordering::SeqCst);
        if let Some(gate) = &self.token_gate {
            gate.notified().await;
        }
        if self.token_fails.load(Ordering::SeqCst) {
            return Err(SessionError::SessionStart("/api/token returned 500".to_string()));
        }
        Ok(TokenResponse {
            token: Credential::new("jwt-for-test"),
            room: Some("voice-booking-session-test".to_string()),
            identity: Some("user-test".to_string()),
            url: None,
        })
    }

    async fn fetch_summary(&self) -> Result<CallSummary, SessionError> {
        self.summary_calls.lock().unwrap().push(Instant::now());
        match self.summaries.lock().unwrap().pop_front() {
            Some(Some(summary)) => Ok(summary),
            _ => Err(SessionError::SummaryFetch("/api/summary returned 404".to_string())),
        }
    }
}

/// Media room whose events are pushed by the test.
#[derive(Default)]
pub struct FakeRoom {
    pub joins: AtomicUsize,
    pub leaves: Arc<AtomicUsize>,
    pub fail_join: AtomicBool,
    pub last_options: Mutex<Option<JoinOptions>>,
    sender: Mutex<Option<mpsc::Sender<RoomEvent>>>,
}

impl FakeRoom {
    pub fn new() -> Self {
        Self::default()
    }

    /// Pushes an event into the most recently joined room.
    pub async fn push(&self, event: RoomEvent) {
        let sender = self.sender.lock().unwrap().clone();
        if let Some(sender) = sender {
            let _ = sender.send(event).await;
        }
    }

    pub fn leave_count(&self) -> usize {
        self.leaves.load(Ordering::SeqCst)
    }
}

struct FakeHandle {
    leaves: Arc<AtomicUsize>,
}

impl RoomHandle for FakeHandle {
    fn leave(&self) {
        self.leaves.fetch_add(1, Ordering::SeqCst);
    }
}

#[async_trait]
impl MediaRoom for FakeRoom {
    async fn join(
        &self,
        _url: &str,
        grant: &TokenResponse,
        options: JoinOptions,
    ) -> Result<RoomLink, SessionError> {
        assert!(!grant.token.is_empty());
        self.joins.fetch_add(1, Ordering::SeqCst);
        *self.last_options.lock().unwrap() = Some(options);
        if self.fail_join.load(Ordering::SeqCst) {
            return Err(SessionError::Room("signal connection refused".to_string()));
        }

        let (tx, rx) = mpsc::channel(16);
        *self.sender.lock().unwrap() = Some(tx);
        Ok(RoomLink {
            events: rx,
            handle: Box::new(FakeHandle {
                leaves: self.leaves.clone(),
            }),
        })
    }
}
