//! Agent departure detection from remote-participant counts.
//!
//! The media room has no explicit "agent left" event, so departure is
//! inferred: once at least one remote participant has been seen during the
//! call, a drop back to zero means the agent hung up. Counts of zero before
//! the agent ever joins are ignored.

/// Outcome of a single presence observation.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PresenceSignal {
    Unchanged,
    /// First non-zero count this call.
    AgentJoined,
    /// Count dropped to zero after the agent was seen. Reported once.
    AgentLeft,
}

/// Per-call presence latch. Create a fresh one for every call.
#[derive(Debug, Default, Clone)]
pub struct AgentPresence {
    seen: bool,
    departed: bool,
}

impl AgentPresence {
    pub fn new() -> Self {
        Self::default()
    }

    /// Feeds one observation of the remote-participant count.
    pub fn observe(&mut self, remote_participants: usize) -> PresenceSignal {
        if self.departed {
            return PresenceSignal::Unchanged;
        }

        if remote_participants > 0 {
            if self.seen {
                return PresenceSignal::Unchanged;
            }
            self.seen = true;
            return PresenceSignal::AgentJoined;
        }

        if self.seen {
            self.departed = true;
            return PresenceSignal::AgentLeft;
        }
        PresenceSignal::Unchanged
    }

    pub fn agent_seen(&self) -> bool {
        self.seen
    }
}
