//! Per-vehicle session tracking and Entry/Exit classification
//!
//! The SessionTracker walks normalized records in ascending timestamp order
//! and assigns each a direction:
//! - ALLOW records are classified against the plate's running session
//!   (see `rules::ALLOW_RULES`) and update it
//! - ALERT / LOG_ONLY records are classified from text hints only and never
//!   touch session state
//!
//! Session state lives only for one `classify` call. Every run starts from
//! an empty store so repeated runs over the same input agree.

mod rules;

pub use rules::{evaluate_allow, infer_exceptional, DirectionRule, RuleId, RuleInput, ALLOW_RULES};

use crate::domain::types::{ClassifiedRecord, Decision, Direction, NormalizedRecord};
use crate::infra::config::Config;
use crate::infra::error::{EngineError, Result};
use chrono::{DateTime, Duration, Utc};
use rustc_hash::FxHashMap;
use tracing::debug;

/// Running movement counts for one plate
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SessionState {
    pub first_seen: DateTime<Utc>,
    pub last_seen: DateTime<Utc>,
    pub entry_count: u32,
    pub exit_count: u32,
}

impl SessionState {
    #[inline]
    pub fn new(at: DateTime<Utc>) -> Self {
        Self { first_seen: at, last_seen: at, entry_count: 0, exit_count: 0 }
    }

    /// Apply a fired rule's direction to the counters
    fn record(&mut self, rule: &DirectionRule, direction: Direction, at: DateTime<Utc>) {
        match direction {
            Direction::Entry => self.entry_count += 1,
            Direction::Exit => self.exit_count += 1,
        }
        if rule.resets_first_seen {
            self.first_seen = at;
        }
        self.last_seen = at;
    }
}

/// Session store owned by a single classification run
#[derive(Debug, Default)]
pub struct SessionStore {
    sessions: FxHashMap<String, SessionState>,
}

impl SessionStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Session for a plate, created empty on first sighting
    fn session_mut(&mut self, plate: &str, at: DateTime<Utc>) -> &mut SessionState {
        self.sessions.entry(plate.to_string()).or_insert_with(|| SessionState::new(at))
    }

    pub fn get(&self, plate: &str) -> Option<&SessionState> {
        self.sessions.get(plate)
    }

    pub fn len(&self) -> usize {
        self.sessions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.sessions.is_empty()
    }
}

/// Assigns Entry/Exit directions to normalized records
pub struct SessionTracker {
    reentry_gap: Duration,
    recent_entry_window: Duration,
}

impl SessionTracker {
    pub fn new(config: &Config) -> Self {
        Self {
            reentry_gap: config.reentry_gap(),
            recent_entry_window: config.recent_entry_window(),
        }
    }

    /// Classify records that are already in ascending timestamp order
    ///
    /// Returns `EngineError::UnsortedInput` at the first record older than
    /// its predecessor. Output order matches input order.
    pub fn classify(&self, records: Vec<NormalizedRecord>) -> Result<Vec<ClassifiedRecord>> {
        Self::check_ordering(&records)?;
        Ok(self.classify_with_store(records, &mut SessionStore::new()))
    }

    /// Stable-sort by timestamp (ties by id), then classify
    pub fn classify_sorted(&self, mut records: Vec<NormalizedRecord>) -> Vec<ClassifiedRecord> {
        records.sort_by(|a, b| a.timestamp().cmp(&b.timestamp()).then(a.raw.id.cmp(&b.raw.id)));
        self.classify_with_store(records, &mut SessionStore::new())
    }

    fn check_ordering(records: &[NormalizedRecord]) -> Result<()> {
        for (index, pair) in records.windows(2).enumerate() {
            let (previous, current) = (pair[0].timestamp(), pair[1].timestamp());
            if current < previous {
                return Err(EngineError::UnsortedInput { index: index + 1, previous, current });
            }
        }
        Ok(())
    }

    /// Classify using a caller-provided store (exposed for inspection in tests)
    pub fn classify_with_store(
        &self,
        records: Vec<NormalizedRecord>,
        store: &mut SessionStore,
    ) -> Vec<ClassifiedRecord> {
        records
            .into_iter()
            .map(|record| {
                let direction = self.assign(&record, store);
                record.classify(direction)
            })
            .collect()
    }

    fn assign(&self, record: &NormalizedRecord, store: &mut SessionStore) -> Direction {
        let description = record.raw.description.as_deref();

        if record.raw.decision != Decision::Allow {
            let direction = infer_exceptional(record.raw.decision, description);
            debug!(
                id = %record.raw.id,
                plate = %record.plate(),
                decision = %record.raw.decision.as_str(),
                direction = %direction.as_str(),
                "direction_inferred"
            );
            return direction;
        }

        let at = record.timestamp();
        let input = RuleInput {
            timestamp: at,
            description,
            reentry_gap: self.reentry_gap,
            recent_entry_window: self.recent_entry_window,
        };

        let session = store.session_mut(record.plate(), at);
        let (rule, direction) = evaluate_allow(session, &input);
        session.record(rule, direction, at);

        debug!(
            id = %record.raw.id,
            plate = %record.plate(),
            rule = %rule.id.as_str(),
            direction = %direction.as_str(),
            entries = %session.entry_count,
            exits = %session.exit_count,
            "direction_assigned"
        );

        direction
    }
}
