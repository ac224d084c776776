use std::collections::{BTreeMap, HashMap, VecDeque};

use conflux_types::{ConflictKind, SessionId};

use crate::session::MergeSession;

/// Running totals over every session ever finished, including evicted ones.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub(crate) struct Tally {
    pub finished: u64,
    pub succeeded: u64,
    pub failed: u64,
    pub total_duration_ms: i64,
    pub conflicts_by_kind: BTreeMap<ConflictKind, u64>,
}

/// In-process store of merge sessions.
///
/// Running sessions are kept by id. Finished sessions move to a bounded
/// history; when it is full the oldest entry is evicted.
#[derive(Debug)]
pub struct SessionRepository {
    active: HashMap<SessionId, MergeSession>,
    history: VecDeque<MergeSession>,
    capacity: usize,
    tally: Tally,
}

impl SessionRepository {
    pub fn new(capacity: usize) -> Self {
        Self {
            active: HashMap::new(),
            history: VecDeque::with_capacity(capacity),
            capacity,
            tally: Tally::default(),
        }
    }

    /// Insert or refresh a running session.
    pub fn upsert(&mut self, session: &MergeSession) {
        self.active.insert(session.id, session.clone());
    }

    /// Move a session out of the active set into history.
    pub fn finish(&mut self, session: MergeSession) {
        self.active.remove(&session.id);

        self.tally.finished += 1;
        if session.succeeded() {
            self.tally.succeeded += 1;
        } else {
            self.tally.failed += 1;
        }
        if let Some(d) = session.duration() {
            self.tally.total_duration_ms += d.num_milliseconds();
        }
        for conflict in &session.conflicts {
            *self.tally.conflicts_by_kind.entry(conflict.kind).or_default() += 1;
        }

        if self.capacity == 0 {
            return;
        }
        while self.history.len() >= self.capacity {
            self.history.pop_front();
        }
        self.history.push_back(session);
    }

    /// Look a session up among running and retained finished sessions.
    pub fn get(&self, id: &SessionId) -> Option<&MergeSession> {
        self.active
            .get(id)
            .or_else(|| self.history.iter().rev().find(|s| &s.id == id))
    }

    /// Running sessions, oldest first.
    pub fn active(&self) -> Vec<&MergeSession> {
        let mut sessions: Vec<_> = self.active.values().collect();
        sessions.sort_by_key(|s| (s.started_at, s.id));
        sessions
    }

    /// Retained finished sessions, oldest first.
    pub fn history(&self) -> impl Iterator<Item = &MergeSession> {
        self.history.iter()
    }

    pub fn active_count(&self) -> usize {
        self.active.len()
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    pub(crate) fn tally(&self) -> &Tally {
        &self.tally
    }
}
