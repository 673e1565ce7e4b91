//! Release artifact name parsing.
//!
//! Artifact names encode the version, build timestamp and commit of a release.
//! Two layouts are recognized, checked in order:
//!
//! ```text
//! <major>.<minor>.<patch>[-.]<YYYYMMDDhhmmss>[+.]<commit>    App-1.0.14-20160215154242+ab3d4f1.dmg
//! <major>.<minor>.<patch>-<commit>-<YYYYMMDD[hhmm[ss]]>      app-1.2.0-abc123-20230101.pkg
//! ```
//!
//! Timestamps are UTC.

use chrono::{DateTime, NaiveDate, NaiveDateTime, Utc};
use regex::Regex;
use std::sync::LazyLock;
use thiserror::Error;

static BUILD_LAYOUT: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(\d+\.\d+\.\d+)[-.](\d{14})[+.]([[:alnum:]]+)").expect("valid build layout regex")
});

static COMMIT_LAYOUT: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(\d+\.\d+\.\d+)-([[:alnum:]]+)-(\d{8}(?:\d{4}(?:\d{2})?)?)(?:[^\d]|$)")
        .expect("valid commit layout regex")
});

/// Errors produced when an artifact name does not follow a known layout
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum NameError {
    #[error("no version found in name: {0}")]
    NoVersion(String),

    #[error("invalid timestamp {timestamp} in name: {name}")]
    InvalidTimestamp { name: String, timestamp: String },
}

/// Metadata encoded in an artifact name
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ParsedName {
    /// Semantic version string
    pub version: String,
    /// Build timestamp (UTC)
    pub date: DateTime<Utc>,
    /// Source commit hash
    pub commit: String,
}

/// Parse an artifact name into its version, build date and commit.
pub fn parse_name(name: &str) -> Result<ParsedName, NameError> {
    if let Some(caps) = BUILD_LAYOUT.captures(name) {
        let timestamp = &caps[2];
        let date = parse_timestamp(name, timestamp)?;
        return Ok(ParsedName {
            version: format!("{}-{}+{}", &caps[1], timestamp, &caps[3]),
            date,
            commit: caps[3].to_string(),
        });
    }

    if let Some(caps) = COMMIT_LAYOUT.captures(name) {
        let date = parse_timestamp(name, &caps[3])?;
        return Ok(ParsedName {
            version: caps[1].to_string(),
            date,
            commit: caps[2].to_string(),
        });
    }

    Err(NameError::NoVersion(name.to_string()))
}

/// Parse an 8, 12 or 14 digit UTC timestamp
fn parse_timestamp(name: &str, timestamp: &str) -> Result<DateTime<Utc>, NameError> {
    let invalid = || NameError::InvalidTimestamp {
        name: name.to_string(),
        timestamp: timestamp.to_string(),
    };

    let naive = match timestamp.len() {
        8 => NaiveDate::parse_from_str(timestamp, "%Y%m%d")
            .ok()
            .and_then(|d| d.and_hms_opt(0, 0, 0)),
        12 => NaiveDateTime::parse_from_str(timestamp, "%Y%m%d%H%M").ok(),
        14 => NaiveDateTime::parse_from_str(timestamp, "%Y%m%d%H%M%S").ok(),
        _ => None,
    }
    .ok_or_else(invalid)?;

    Ok(naive.and_utc())
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    #[test]
    fn test_parse_build_layout() {
        let parsed = parse_name("App-1.0.14-20160215154242+ab3d4f1.dmg").unwrap();
        assert_eq!(parsed.version, "1.0.14-20160215154242+ab3d4f1");
        assert_eq!(parsed.commit, "ab3d4f1");
        assert_eq!(
            parsed.date,
            Utc.with_ymd_and_hms(2016, 2, 15, 15, 42, 42).unwrap()
        );
    }

    #[test]
    fn test_parse_build_layout_with_dots() {
        let parsed = parse_name("app_1.0.14.20160215154242.ab3d4f1_amd64.deb").unwrap();
        assert_eq!(parsed.version, "1.0.14-20160215154242+ab3d4f1");
        assert_eq!(parsed.commit, "ab3d4f1");
    }

    #[test]
    fn test_parse_build_layout_version_is_semver() {
        let parsed = parse_name("app-1.0.14-20160215154242+ab3d4f1.386.exe").unwrap();
        assert!(semver::Version::parse(&parsed.version).is_ok());
    }

    #[test]
    fn test_parse_commit_layout() {
        let parsed = parse_name("app-1.2.0-abc123-20230101.pkg").unwrap();
        assert_eq!(parsed.version, "1.2.0");
        assert_eq!(parsed.commit, "abc123");
        assert_eq!(parsed.date, Utc.with_ymd_and_hms(2023, 1, 1, 0, 0, 0).unwrap());
    }

    #[test]
    fn test_parse_commit_layout_with_time() {
        let parsed = parse_name("app-1.3.0-def456-202301051405.pkg").unwrap();
        assert_eq!(parsed.date, Utc.with_ymd_and_hms(2023, 1, 5, 14, 5, 0).unwrap());
    }

    #[test]
    fn test_parse_missing_version() {
        assert_eq!(
            parse_name("README.txt"),
            Err(NameError::NoVersion("README.txt".to_string()))
        );
    }

    #[test]
    fn test_parse_invalid_timestamp() {
        let err = parse_name("App-1.0.0-20161345000000+abc.dmg").unwrap_err();
        assert!(matches!(err, NameError::InvalidTimestamp { .. }));
    }
}
