//! Direction rules for the session tracker
//!
//! ALLOW records go through an ordered rule list evaluated top-down; the
//! first rule that returns a direction wins. ALERT and LOG_ONLY records
//! never touch session state and are inferred from text hints alone.

use super::SessionState;
use crate::domain::keywords;
use crate::domain::types::{Decision, Direction};
use chrono::{DateTime, Duration, Utc};

/// Identifies which rule assigned a direction (for logs and tests)
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RuleId {
    FirstSighting,
    GapReentry,
    OpenSession,
    KeywordHint,
    RecentFirstSeen,
    Fallback,
}

impl RuleId {
    pub fn as_str(&self) -> &'static str {
        match self {
            RuleId::FirstSighting => "first_sighting",
            RuleId::GapReentry => "gap_reentry",
            RuleId::OpenSession => "open_session",
            RuleId::KeywordHint => "keyword_hint",
            RuleId::RecentFirstSeen => "recent_first_seen",
            RuleId::Fallback => "fallback",
        }
    }
}

/// Inputs a rule may look at besides the plate's session
#[derive(Debug, Clone, Copy)]
pub struct RuleInput<'a> {
    pub timestamp: DateTime<Utc>,
    pub description: Option<&'a str>,
    pub reentry_gap: Duration,
    pub recent_entry_window: Duration,
}

/// A predicate that may assign a direction
pub struct DirectionRule {
    pub id: RuleId,
    /// Start a new visit (`first_seen = timestamp`) when this rule fires
    pub resets_first_seen: bool,
    pub apply: fn(&SessionState, &RuleInput<'_>) -> Option<Direction>,
}

/// Ordered rules for ALLOW records, first match wins
pub static ALLOW_RULES: [DirectionRule; 6] = [
    DirectionRule { id: RuleId::FirstSighting, resets_first_seen: false, apply: first_sighting },
    DirectionRule { id: RuleId::GapReentry, resets_first_seen: true, apply: gap_reentry },
    DirectionRule { id: RuleId::OpenSession, resets_first_seen: false, apply: open_session },
    DirectionRule { id: RuleId::KeywordHint, resets_first_seen: false, apply: keyword_hint },
    DirectionRule { id: RuleId::RecentFirstSeen, resets_first_seen: false, apply: recent_first_seen },
    DirectionRule { id: RuleId::Fallback, resets_first_seen: false, apply: fallback },
];

fn first_sighting(state: &SessionState, _: &RuleInput<'_>) -> Option<Direction> {
    (state.entry_count == 0 && state.exit_count == 0).then_some(Direction::Entry)
}

fn gap_reentry(state: &SessionState, input: &RuleInput<'_>) -> Option<Direction> {
    (input.timestamp - state.last_seen > input.reentry_gap).then_some(Direction::Entry)
}

fn open_session(state: &SessionState, _: &RuleInput<'_>) -> Option<Direction> {
    (state.entry_count > state.exit_count).then_some(Direction::Exit)
}

fn keyword_hint(_: &SessionState, input: &RuleInput<'_>) -> Option<Direction> {
    keywords::direction_hint(input.description)
}

fn recent_first_seen(state: &SessionState, input: &RuleInput<'_>) -> Option<Direction> {
    (input.timestamp - state.first_seen < input.recent_entry_window).then_some(Direction::Entry)
}

fn fallback(_: &SessionState, _: &RuleInput<'_>) -> Option<Direction> {
    Some(Direction::Entry)
}

/// Evaluate the ALLOW rule list against a session
pub fn evaluate_allow(state: &SessionState, input: &RuleInput<'_>) -> (&'static DirectionRule, Direction) {
    for rule in ALLOW_RULES.iter() {
        if let Some(direction) = (rule.apply)(state, input) {
            return (rule, direction);
        }
    }
    // The fallback rule always matches
    (&ALLOW_RULES[ALLOW_RULES.len() - 1], Direction::Entry)
}

/// Direction for ALERT / LOG_ONLY records, independent of session state
///
/// Text hints win; an unexplained ALERT is treated as a departure and
/// anything else as an arrival.
pub fn infer_exceptional(decision: Decision, description: Option<&str>) -> Direction {
    if let Some(direction) = keywords::direction_hint(description) {
        return direction;
    }
    match decision {
        Decision::Alert => Direction::Exit,
        Decision::Allow | Decision::LogOnly => Direction::Entry,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn t0() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2025, 3, 1, 9, 0, 0).unwrap()
    }

    fn input(offset_min: i64, description: Option<&str>) -> RuleInput<'_> {
        RuleInput {
            timestamp: t0() + Duration::minutes(offset_min),
            description,
            reentry_gap: Duration::hours(2),
            recent_entry_window: Duration::minutes(30),
        }
    }

    fn state(entries: u32, exits: u32, first_min: i64, last_min: i64) -> SessionState {
        SessionState {
            first_seen: t0() + Duration::minutes(first_min),
            last_seen: t0() + Duration::minutes(last_min),
            entry_count: entries,
            exit_count: exits,
        }
    }

    #[test]
    fn test_rule_order() {
        let ids: Vec<RuleId> = ALLOW_RULES.iter().map(|r| r.id).collect();
        assert_eq!(
            ids,
            vec![
                RuleId::FirstSighting,
                RuleId::GapReentry,
                RuleId::OpenSession,
                RuleId::KeywordHint,
                RuleId::RecentFirstSeen,
                RuleId::Fallback,
            ]
        );
        assert!(ALLOW_RULES.iter().filter(|r| r.resets_first_seen).all(|r| r.id == RuleId::GapReentry));
    }

    #[test]
    fn test_first_sighting_only_on_empty_session() {
        assert_eq!(first_sighting(&state(0, 0, 0, 0), &input(0, None)), Some(Direction::Entry));
        assert_eq!(first_sighting(&state(1, 0, 0, 0), &input(0, None)), None);
        assert_eq!(first_sighting(&state(0, 1, 0, 0), &input(0, None)), None);
    }

    #[test]
    fn test_gap_reentry_is_strictly_greater() {
        let s = state(1, 1, 0, 0);
        assert_eq!(gap_reentry(&s, &input(120, None)), None);
        assert_eq!(gap_reentry(&s, &input(121, None)), Some(Direction::Entry));
    }

    #[test]
    fn test_open_session_exits() {
        assert_eq!(open_session(&state(2, 1, 0, 0), &input(5, None)), Some(Direction::Exit));
        assert_eq!(open_session(&state(1, 1, 0, 0), &input(5, None)), None);
    }

    #[test]
    fn test_keyword_hint_rule() {
        let s = state(1, 1, 0, 0);
        assert_eq!(keyword_hint(&s, &input(5, Some("Truck leaving"))), Some(Direction::Exit));
        assert_eq!(keyword_hint(&s, &input(5, Some("Arrival"))), Some(Direction::Entry));
        assert_eq!(keyword_hint(&s, &input(5, Some("allowed"))), None);
    }

    #[test]
    fn test_recent_first_seen_is_strictly_less() {
        let s = state(1, 1, 0, 0);
        assert_eq!(recent_first_seen(&s, &input(29, None)), Some(Direction::Entry));
        assert_eq!(recent_first_seen(&s, &input(30, None)), None);
    }

    #[test]
    fn test_evaluate_allow_balanced_session_no_hint_falls_back() {
        let (rule, direction) = evaluate_allow(&state(1, 1, 0, 10), &input(45, None));
        assert_eq!(rule.id, RuleId::Fallback);
        assert_eq!(direction, Direction::Entry);
    }

    #[test]
    fn test_evaluate_allow_balanced_session_recent() {
        let (rule, direction) = evaluate_allow(&state(1, 1, 0, 10), &input(20, None));
        assert_eq!(rule.id, RuleId::RecentFirstSeen);
        assert_eq!(direction, Direction::Entry);
    }

    #[test]
    fn test_evaluate_allow_balanced_session_exit_hint() {
        let (rule, direction) = evaluate_allow(&state(1, 1, 0, 10), &input(20, Some("departure")));
        assert_eq!(rule.id, RuleId::KeywordHint);
        assert_eq!(direction, Direction::Exit);
    }

    #[test]
    fn test_infer_exceptional() {
        assert_eq!(infer_exceptional(Decision::Alert, Some("leaving site")), Direction::Exit);
        assert_eq!(infer_exceptional(Decision::Alert, Some("entering site")), Direction::Entry);
        assert_eq!(infer_exceptional(Decision::Alert, None), Direction::Exit);
        assert_eq!(infer_exceptional(Decision::LogOnly, Some("noted")), Direction::Entry);
        assert_eq!(infer_exceptional(Decision::LogOnly, Some("exit lane")), Direction::Exit);
    }
}
