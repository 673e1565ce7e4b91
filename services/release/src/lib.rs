//! Release Service
//!
//! Release pipeline tooling for an S3 bucket of platform installers. The service
//! lists uploaded artifacts, renders an HTML index of recent releases, copies the
//! newest artifact of each platform to a fixed "latest" name, and promotes vetted
//! releases to the update manifest once they have aged past a delay.
//!
//! ## Features
//!
//! - **Release Catalog**: Artifact names are parsed for version, build time and
//!   commit; releases are ordered newest first in US Eastern time
//! - **Staged Promotion**: Only releases older than the configured delay, built
//!   before a daily cutoff hour, and newer than the current update are promoted
//! - **Latest Pointers**: Fixed download names always track the newest build
//! - **Release Index**: Static HTML page with one section per listing prefix
//!
//! ## Architecture
//!
//! ```text
//! S3 Bucket                                             S3 Bucket
//! ┌──────────────┐   ┌──────────────┐   ┌──────────────┐   ┌──────────────────────┐
//! │ darwin/      │   │ Release      │   │ Promotion    │   │ update-{p}-{env}.json│
//! │ windows/     │──▶│ Catalog      │──▶│ Decision     │──▶│ Keybase.dmg, ...     │
//! │ linux_.../   │   └──────────────┘   └──────────────┘   └──────────────────────┘
//! └──────────────┘          │
//!                           ▼
//!                    ┌──────────────┐
//!                    │ Index Page   │
//!                    └──────────────┘
//! ```

pub mod catalog;
pub mod config;
pub mod gateway;
pub mod index;
pub mod manifest;
pub mod naming;
pub mod pipeline;
pub mod platform;
pub mod promotion;

pub use catalog::{build_catalog, Release, Section};
pub use config::Config;
pub use gateway::{AccessPolicy, BlobDescriptor, S3Gateway, StorageError, StorageGateway};
pub use manifest::UpdateManifest;
pub use pipeline::{PipelineError, PromotionOutcome, PromotionRequest};
pub use platform::Platform;
pub use promotion::{
    compare_with_current, decide_promotion, EligibilityWindow, PromotionDecision, PromotionError,
};
