//! Bucket-level release operations: latest-pointer refresh, current update
//! lookup and staged promotion.

use crate::catalog::{build_catalog, Release};
use crate::gateway::{AccessPolicy, StorageError, StorageGateway, WriteCondition};
use crate::manifest::UpdateManifest;
use crate::platform::{update_manifest_key, Platform};
use crate::promotion::{
    compare_with_current, select_candidate, EligibilityWindow, PromotionDecision, PromotionError,
};
use chrono::{DateTime, Utc};
use thiserror::Error;
use tracing::{info, instrument, warn};

/// Errors that abort a pipeline operation
#[derive(Error, Debug)]
pub enum PipelineError {
    #[error("Unsupported platform: {0}")]
    UnsupportedPlatform(String),

    #[error(transparent)]
    Storage(#[from] StorageError),

    #[error("Failed to decode update manifest {key}: {source}")]
    Manifest {
        key: String,
        source: serde_json::Error,
    },

    #[error(transparent)]
    Promotion(#[from] PromotionError),
}

/// A latest-pointer copy that was made
#[derive(Debug, Clone)]
pub struct LatestCopy {
    pub platform: &'static str,
    pub destination: &'static str,
    pub release: Release,
}

/// The manifest currently promoted for a platform/environment/channel
#[derive(Debug, Clone)]
pub struct CurrentUpdate {
    pub key: String,
    pub manifest: UpdateManifest,
    pub etag: Option<String>,
}

/// Parameters of a promotion run
#[derive(Debug, Clone)]
pub struct PromotionRequest {
    pub platform: String,
    pub env: String,
    pub channel: Option<String>,
    pub window: EligibilityWindow,
    /// Write with the gateway's conditional copy
    pub conditional_write: bool,
    /// Decide without writing
    pub dry_run: bool,
}

/// Result of a promotion run
#[derive(Debug, Clone)]
pub struct PromotionOutcome {
    pub decision: PromotionDecision,
    /// Manifest key that was (or would be) overwritten
    pub manifest_key: String,
    /// Versioned manifest copied into place, when promoting
    pub source_key: Option<String>,
    pub written: bool,
}

impl PromotionOutcome {
    pub fn promoted(&self) -> Option<&Release> {
        self.decision.promoted()
    }
}

/// List a platform's artifacts, newest first
pub async fn platform_catalog(
    gateway: &dyn StorageGateway,
    platform: &Platform,
) -> Result<Vec<Release>, StorageError> {
    let blobs = gateway.list(platform.prefix).await?;
    let base_url = format!("{}{}", gateway.public_base_url(), platform.prefix);
    Ok(build_catalog(
        &blobs,
        &base_url,
        platform.prefix,
        platform.suffix,
        0,
    ))
}

/// The newest release of a platform accepted by `predicate`
pub async fn find_release<F>(
    gateway: &dyn StorageGateway,
    platform: &Platform,
    predicate: F,
) -> Result<Option<Release>, StorageError>
where
    F: Fn(&Release) -> bool,
{
    let catalog = platform_catalog(gateway, platform).await?;
    Ok(select_candidate(&catalog, predicate).cloned())
}

/// Copy each platform's newest artifact to its fixed latest name.
///
/// Platforms without releases are skipped. The first gateway failure aborts.
pub async fn copy_latest(gateway: &dyn StorageGateway) -> Result<Vec<LatestCopy>, StorageError> {
    let mut copies = Vec::new();

    for platform in Platform::all() {
        let Some(release) = find_release(gateway, platform, |_| true).await? else {
            info!(platform = platform.name, "No releases found");
            continue;
        };

        info!(
            platform = platform.name,
            destination = platform.latest_name,
            source = %release.key(),
            "Copying latest release"
        );
        gateway
            .put_copy(platform.latest_name, release.key(), AccessPolicy::PublicRead)
            .await?;

        copies.push(LatestCopy {
            platform: platform.name,
            destination: platform.latest_name,
            release,
        });
    }

    Ok(copies)
}

/// Read the current update manifest; a missing manifest is `None`
#[instrument(skip(gateway))]
pub async fn current_update(
    gateway: &dyn StorageGateway,
    platform: &str,
    env: &str,
    channel: Option<&str>,
) -> Result<Option<CurrentUpdate>, PipelineError> {
    let key = update_manifest_key(platform, env, channel);

    let Some(object) = gateway.get(&key).await? else {
        return Ok(None);
    };

    let manifest = UpdateManifest::from_json(&object.data).map_err(|source| {
        PipelineError::Manifest {
            key: key.clone(),
            source,
        }
    })?;

    Ok(Some(CurrentUpdate {
        key,
        manifest,
        etag: object.etag,
    }))
}

/// Promote the newest eligible release of a platform if it supersedes the
/// current update.
///
/// Every check happens before the single manifest write; a failure leaves the
/// bucket untouched.
pub async fn promote_release(
    gateway: &dyn StorageGateway,
    request: &PromotionRequest,
    now: DateTime<Utc>,
) -> Result<PromotionOutcome, PipelineError> {
    let channel = request.channel.as_deref().filter(|c| !c.is_empty());
    match channel {
        Some(channel) => info!(
            channel = %channel,
            delay = ?request.window.min_age,
            "Finding release to promote"
        ),
        None => info!(delay = ?request.window.min_age, "Finding release to promote"),
    }

    let platform = Platform::find(&request.platform)
        .ok_or_else(|| PipelineError::UnsupportedPlatform(request.platform.clone()))?;
    let manifest_key = update_manifest_key(platform.name, &request.env, channel);
    let eligible = |r: &Release| request.window.is_eligible(r, now);

    let catalog = platform_catalog(gateway, platform).await?;

    let Some(candidate) = select_candidate(&catalog, eligible) else {
        info!(platform = platform.name, "No release eligible for promotion");
        return Ok(PromotionOutcome {
            decision: PromotionDecision::NoCandidate,
            manifest_key,
            source_key: None,
            written: false,
        });
    };
    info!(
        release = %candidate.name,
        version = %candidate.version,
        age = %now.signed_duration_since(candidate.date),
        "Found release"
    );

    let current = current_update(gateway, platform.name, &request.env, channel).await?;
    if let Some(ref current) = current {
        info!(key = %current.key, version = %current.manifest.version, "Found current update");
    }

    let decision = compare_with_current(candidate, current.as_ref().map(|c| &c.manifest))?;

    let release = match decision {
        PromotionDecision::Promote(release) => release,
        other => {
            match &other {
                PromotionDecision::Unchanged(_) => info!("Release unchanged"),
                PromotionDecision::Older { current, .. } => {
                    info!(current = %current, "Release older than current update")
                }
                _ => {}
            }
            return Ok(PromotionOutcome {
                decision: other,
                manifest_key,
                source_key: None,
                written: false,
            });
        }
    };

    let source_key = platform.versioned_manifest_key(&request.env, &release.version);

    if request.dry_run {
        info!(destination = %manifest_key, source = %source_key, "Dry run, not promoting");
        return Ok(PromotionOutcome {
            decision: PromotionDecision::Promote(release),
            manifest_key,
            source_key: Some(source_key),
            written: false,
        });
    }

    info!(destination = %manifest_key, source = %source_key, "Promoting");
    if request.conditional_write {
        let condition = match current.as_ref() {
            None => Some(WriteCondition::IfAbsent),
            Some(current) => current.etag.clone().map(WriteCondition::IfMatch),
        };
        match condition {
            Some(condition) => {
                gateway
                    .put_copy_if_match(&manifest_key, &source_key, AccessPolicy::PublicRead, &condition)
                    .await?
            }
            None => {
                warn!(key = %manifest_key, "Current manifest has no ETag, writing unconditionally");
                gateway
                    .put_copy(&manifest_key, &source_key, AccessPolicy::PublicRead)
                    .await?
            }
        }
    } else {
        gateway
            .put_copy(&manifest_key, &source_key, AccessPolicy::PublicRead)
            .await?;
    }

    Ok(PromotionOutcome {
        decision: PromotionDecision::Promote(release),
        manifest_key,
        source_key: Some(source_key),
        written: true,
    })
}
