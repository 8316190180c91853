//! ---
//! cupang_section: "03-manifest-store"
//! cupang_subsection: "module"
//! cupang_type: "source"
//! cupang_scope: "code"
//! cupang_description: "Key-path addressable manifest store."
//! cupang_version: "v0.1.0"
//! cupang_owner: "tbd"
//! ---
use chrono::{DateTime, Local, NaiveDateTime, TimeZone, Utc};

const SPACED_WITH_OFFSET: &str = "%Y-%m-%d %H:%M:%S%.f%:z";
const SPACED_NAIVE: &str = "%Y-%m-%d %H:%M:%S%.f";

/// Parse `settings.last_update`.
///
/// RFC 3339 is what gets written. The space-separated form with or without an
/// offset is accepted for manifests written by older releases; a naive value
/// is read as local time.
pub fn parse_timestamp(raw: &str) -> Option<DateTime<Utc>> {
    let raw = raw.trim();
    if raw.is_empty() {
        return None;
    }
    if let Ok(parsed) = DateTime::parse_from_rfc3339(raw) {
        return Some(parsed.with_timezone(&Utc));
    }
    if let Ok(parsed) = DateTime::parse_from_str(raw, SPACED_WITH_OFFSET) {
        return Some(parsed.with_timezone(&Utc));
    }
    let naive = NaiveDateTime::parse_from_str(raw, SPACED_NAIVE).ok()?;
    Local
        .from_local_datetime(&naive)
        .earliest()
        .map(|local| local.with_timezone(&Utc))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn rfc3339_is_accepted() {
        let parsed = parse_timestamp("2024-03-01T10:00:00+02:00").unwrap();
        assert_eq!(parsed, Utc.with_ymd_and_hms(2024, 3, 1, 8, 0, 0).unwrap());
    }

    #[test]
    fn spaced_form_with_offset_is_accepted() {
        let parsed = parse_timestamp("2024-03-01 10:00:00.250000+00:00").unwrap();
        assert_eq!(parsed.timestamp(), Utc.with_ymd_and_hms(2024, 3, 1, 10, 0, 0).unwrap().timestamp());
    }

    #[test]
    fn naive_form_is_accepted() {
        assert!(parse_timestamp("2024-03-01 10:00:00").is_some());
    }

    #[test]
    fn garbage_is_rejected() {
        assert!(parse_timestamp("yesterday").is_none());
        assert!(parse_timestamp("  ").is_none());
    }
}
