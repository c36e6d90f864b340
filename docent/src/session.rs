//! In-memory per-session conversation state.
//!
//! Each engine owns one [`SessionStore`]. A session holds a tagged
//! [`SessionState`] (the lead-capture machine) and a [`ConversationScratch`]
//! record. Both expire together 600 seconds after the last update; expiry
//! is applied when an entry is read through the accessor.

use std::time::{Duration, Instant};

use parking_lot::Mutex;
use rustc_hash::FxHashMap;

/// How long an idle session's state survives.
pub const SESSION_TTL: Duration = Duration::from_secs(600);

/// Which lead field is being collected next.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum LeadStep {
    Name,
    Phone,
    Email,
}

/// The lead-capture state machine.
///
/// A session holds at most one active machine: `AwaitingName` gates
/// `CollectingLead`, and `Complete` is terminal for the session's lead
/// flow.
#[derive(Clone, Debug, PartialEq, Eq, Default)]
pub enum SessionState {
    #[default]
    Unarmed,
    AwaitingName,
    Named,
    CollectingLead {
        step: LeadStep,
        name: String,
        phone: String,
        original_question: String,
    },
    Complete,
}

/// Free-form conversation memory beside the state machine.
#[derive(Clone, Debug, Default)]
pub struct ConversationScratch {
    pub username: Option<String>,
    pub phone: Option<String>,
    pub email: Option<String>,
    pub original_pricing_question: Option<String>,
    pub lead_collected: bool,
    pub last_question: Option<String>,
    pub last_answer: Option<String>,
    pub last_sources: Vec<String>,
}

#[derive(Debug)]
struct SessionEntry {
    state: SessionState,
    scratch: ConversationScratch,
    updated_at: Instant,
}

impl SessionEntry {
    fn fresh() -> Self {
        Self {
            state: SessionState::Unarmed,
            scratch: ConversationScratch::default(),
            updated_at: Instant::now(),
        }
    }
}

/// Session map for one engine, keyed by session id.
#[derive(Debug, Default)]
pub struct SessionStore {
    entries: Mutex<FxHashMap<String, SessionEntry>>,
}

impl SessionStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Runs `f` against the session's entry, creating or resurrecting an
    /// expired one first, and stamps the entry as touched.
    pub fn with_session<R>(
        &self,
        session_id: &str,
        f: impl FnOnce(&mut SessionState, &mut ConversationScratch) -> R,
    ) -> R {
        let mut entries = self.entries.lock();
        let entry = entries
            .entry(session_id.to_string())
            .or_insert_with(SessionEntry::fresh);
        if entry.updated_at.elapsed() >= SESSION_TTL {
            *entry = SessionEntry::fresh();
        }
        entry.updated_at = Instant::now();
        f(&mut entry.state, &mut entry.scratch)
    }

    /// Reads the session without refreshing its TTL. Expired entries are
    /// removed and read as absent.
    pub fn peek<R>(
        &self,
        session_id: &str,
        f: impl FnOnce(&SessionState, &ConversationScratch) -> R,
    ) -> Option<R> {
        let mut entries = self.entries.lock();
        match entries.get(session_id) {
            Some(entry) if entry.updated_at.elapsed() < SESSION_TTL => {
                Some(f(&entry.state, &entry.scratch))
            }
            Some(_) => {
                entries.remove(session_id);
                None
            }
            None => None,
        }
    }

    pub fn recent_sources(&self, session_id: &str, limit: usize) -> Vec<String> {
        self.peek(session_id, |_, scratch| {
            scratch.last_sources.iter().take(limit).cloned().collect()
        })
        .unwrap_or_default()
    }

    #[cfg(test)]
    pub(crate) fn backdate(&self, session_id: &str, age: Duration) {
        let mut entries = self.entries.lock();
        if let Some(entry) = entries.get_mut(session_id) {
            entry.updated_at = Instant::now() - age;
        }
    }
}
