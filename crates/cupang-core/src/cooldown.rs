//! ---
//! cupang_section: "07-update-orchestration"
//! cupang_subsection: "module"
//! cupang_type: "source"
//! cupang_scope: "code"
//! cupang_description: "Cooldown gate between unforced update runs."
//! cupang_version: "v0.1.0"
//! cupang_owner: "tbd"
//! ---
use std::time::Duration;

use chrono::{DateTime, TimeDelta, Utc};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CooldownDecision {
    Proceed,
    Wait { remaining: Duration },
}

/// Gate a run on `settings.last_update` and `settings.update_cooldown`.
///
/// A run is held back while `now - last_update <= cooldown`. No timestamp, or
/// `force`, always proceeds.
pub fn evaluate(
    last_update: Option<DateTime<Utc>>,
    cooldown_hours: i64,
    now: DateTime<Utc>,
    force: bool,
) -> CooldownDecision {
    let Some(last_update) = last_update else {
        return CooldownDecision::Proceed;
    };
    if force {
        return CooldownDecision::Proceed;
    }
    let cooldown = TimeDelta::try_hours(cooldown_hours.max(0)).unwrap_or(TimeDelta::MAX);
    let elapsed = now.signed_duration_since(last_update);
    if elapsed > cooldown {
        return CooldownDecision::Proceed;
    }
    let remaining = (cooldown - elapsed).to_std().unwrap_or(Duration::ZERO);
    CooldownDecision::Wait { remaining }
}

/// Whole hours, rounded, for log lines.
pub fn remaining_hours(remaining: Duration) -> u64 {
    (remaining.as_secs() + 1800) / 3600
}

#[cfg(test)]
mod tests {
    use super::*;

    fn at(text: &str) -> DateTime<Utc> {
        DateTime::parse_from_rfc3339(text).unwrap().with_timezone(&Utc)
    }

    #[test]
    fn within_cooldown_waits_with_remaining() {
        let decision = evaluate(
            Some(at("2024-01-01T00:00:00Z")),
            12,
            at("2024-01-01T01:00:00Z"),
            false,
        );
        assert_eq!(
            decision,
            CooldownDecision::Wait {
                remaining: Duration::from_secs(11 * 3600)
            }
        );
    }

    #[test]
    fn boundary_is_still_cooling_down() {
        let decision = evaluate(
            Some(at("2024-01-01T00:00:00Z")),
            12,
            at("2024-01-01T12:00:00Z"),
            false,
        );
        assert_eq!(
            decision,
            CooldownDecision::Wait {
                remaining: Duration::ZERO
            }
        );
    }

    #[test]
    fn force_and_missing_timestamp_proceed() {
        let last = Some(at("2024-01-01T00:00:00Z"));
        let now = at("2024-01-01T01:00:00Z");
        assert_eq!(evaluate(last, 12, now, true), CooldownDecision::Proceed);
        assert_eq!(evaluate(None, 12, now, false), CooldownDecision::Proceed);
        assert_eq!(
            evaluate(last, 0, at("2024-01-01T00:00:01Z"), false),
            CooldownDecision::Proceed
        );
    }

    #[test]
    fn rounds_hours() {
        assert_eq!(remaining_hours(Duration::from_secs(11 * 3600 + 1900)), 12);
        assert_eq!(remaining_hours(Duration::from_secs(600)), 0);
    }
}
