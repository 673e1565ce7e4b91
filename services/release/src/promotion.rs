//! Promotion decisions.
//!
//! The current update for a platform/environment/channel only ever moves forward:
//! a release is promoted when there is no current update or when its version is
//! strictly greater (semver precedence, build metadata ignored) than the current
//! one. Equal or older candidates are no-ops.

use crate::catalog::Release;
use crate::manifest::UpdateManifest;
use chrono::{DateTime, Timelike, Utc};
use std::cmp::Ordering;
use std::time::Duration;
use thiserror::Error;

/// Only releases built in the first quarter-hour of an hour are eligible
const ELIGIBLE_MINUTES: u32 = 15;

/// Errors that abort a promotion decision
#[derive(Error, Debug)]
pub enum PromotionError {
    #[error("Invalid version {version:?} for release {release}: {source}")]
    InvalidReleaseVersion {
        release: String,
        version: String,
        source: semver::Error,
    },

    #[error("Invalid version {version:?} in current update manifest: {source}")]
    InvalidManifestVersion {
        version: String,
        source: semver::Error,
    },
}

/// Outcome of evaluating a catalog against the current update
#[derive(Debug, Clone, PartialEq)]
pub enum PromotionDecision {
    /// Promote this release
    Promote(Release),
    /// No release passed the eligibility check
    NoCandidate,
    /// The candidate is already the current update
    Unchanged(Release),
    /// The candidate is older than the current update
    Older { candidate: Release, current: String },
}

impl PromotionDecision {
    /// The release to promote, if any
    pub fn promoted(&self) -> Option<&Release> {
        match self {
            PromotionDecision::Promote(release) => Some(release),
            _ => None,
        }
    }

    pub fn into_promoted(self) -> Option<Release> {
        match self {
            PromotionDecision::Promote(release) => Some(release),
            _ => None,
        }
    }
}

/// Age and time-of-day gate a release must pass before promotion
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct EligibilityWindow {
    /// Minimum time since the release was built
    pub min_age: Duration,
    /// Releases must be built before this hour (US Eastern)
    pub cutoff_hour: u32,
}

impl EligibilityWindow {
    pub fn new(min_age: Duration, cutoff_hour: u32) -> Self {
        Self {
            min_age,
            cutoff_hour,
        }
    }

    /// Check a release against the window at time `now`.
    ///
    /// A release qualifies when it is at least `min_age` old, was built before
    /// `cutoff_hour` and within the first 15 minutes of its hour.
    pub fn is_eligible(&self, release: &Release, now: DateTime<Utc>) -> bool {
        let old_enough = now
            .signed_duration_since(release.date)
            .to_std()
            .map(|age| age >= self.min_age)
            .unwrap_or(false);

        old_enough
            && release.date.hour() < self.cutoff_hour
            && release.date.minute() < ELIGIBLE_MINUTES
    }
}

/// The newest release accepted by `eligible`.
///
/// `catalog` must be ordered newest first.
pub fn select_candidate<F>(catalog: &[Release], eligible: F) -> Option<&Release>
where
    F: Fn(&Release) -> bool,
{
    catalog.iter().find(|release| eligible(release))
}

/// Decide whether the newest eligible release supersedes `current`.
pub fn decide_promotion<F>(
    catalog: &[Release],
    current: Option<&UpdateManifest>,
    eligible: F,
) -> Result<PromotionDecision, PromotionError>
where
    F: Fn(&Release) -> bool,
{
    match select_candidate(catalog, eligible) {
        Some(candidate) => compare_with_current(candidate, current),
        None => Ok(PromotionDecision::NoCandidate),
    }
}

/// Compare an already selected candidate against the current update.
///
/// Without a current update the candidate is promoted as is; versions are only
/// parsed when there is something to compare against.
pub fn compare_with_current(
    candidate: &Release,
    current: Option<&UpdateManifest>,
) -> Result<PromotionDecision, PromotionError> {
    let Some(current) = current else {
        return Ok(PromotionDecision::Promote(candidate.clone()));
    };

    let candidate_version =
        candidate
            .semver()
            .map_err(|source| PromotionError::InvalidReleaseVersion {
                release: candidate.name.clone(),
                version: candidate.version.clone(),
                source,
            })?;

    let current_version =
        current
            .semver()
            .map_err(|source| PromotionError::InvalidManifestVersion {
                version: current.version.clone(),
                source,
            })?;

    let decision = match candidate_version.cmp_precedence(&current_version) {
        Ordering::Greater => PromotionDecision::Promote(candidate.clone()),
        Ordering::Equal => PromotionDecision::Unchanged(candidate.clone()),
        Ordering::Less => PromotionDecision::Older {
            candidate: candidate.clone(),
            current: current.version.clone(),
        },
    };

    Ok(decision)
}
