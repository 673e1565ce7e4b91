//! Release catalog construction.
//!
//! Turns a bucket listing into [`Release`] records: keys are filtered by suffix,
//! names are parsed for version metadata, dates are moved into US Eastern time
//! and the result is ordered newest first.

use crate::gateway::BlobDescriptor;
use crate::naming::parse_name;
use chrono::{DateTime, TimeZone, Utc};
use chrono_tz::America::New_York;
use chrono_tz::Tz;
use tracing::warn;

/// Time zone used for display and for every promotion timing rule
pub const RELEASE_TZ: Tz = New_York;

const DISPLAY_FORMAT: &str = "%a %b %e %H:%M:%S %Z %Y";

/// A release artifact found in the bucket
#[derive(Debug, Clone, PartialEq)]
pub struct Release {
    /// Key with the listing prefix removed
    pub name: String,
    /// Listed object
    pub blob: BlobDescriptor,
    /// Public download URL
    pub url: String,
    /// Version encoded in the name (empty if the name didn't parse)
    pub version: String,
    /// Build date in US Eastern time
    pub date: DateTime<Tz>,
    /// `date` formatted for display
    pub date_string: String,
    /// Source commit encoded in the name
    pub commit: String,
}

impl Release {
    /// Object key of the artifact
    pub fn key(&self) -> &str {
        &self.blob.key
    }

    /// Parsed semantic version
    pub fn semver(&self) -> Result<semver::Version, semver::Error> {
        semver::Version::parse(&self.version)
    }
}

/// A titled group of releases for the index page
#[derive(Debug, Clone)]
pub struct Section {
    pub header: String,
    pub releases: Vec<Release>,
}

/// Convert a timestamp to US Eastern time
pub fn to_eastern<T: TimeZone>(date: &DateTime<T>) -> DateTime<Tz> {
    date.with_timezone(&RELEASE_TZ)
}

/// Public URL of a release name under `base_url`
pub fn release_url(base_url: &str, name: &str) -> String {
    format!("{}{}", base_url, urlencoding::encode(name))
}

/// Build a catalog from listed blobs.
///
/// Only keys ending in `suffix` are kept. Names that don't parse are kept with an
/// empty version and commit and the Unix epoch as date. The result is sorted by
/// date, newest first, keeping listing order among equal dates, and truncated
/// to `limit` entries when `limit > 0`.
pub fn build_catalog(
    blobs: &[BlobDescriptor],
    base_url: &str,
    prefix: &str,
    suffix: &str,
    limit: usize,
) -> Vec<Release> {
    let mut releases: Vec<Release> = blobs
        .iter()
        .filter(|blob| blob.key.ends_with(suffix))
        .map(|blob| load_release(blob, base_url, prefix))
        .collect();

    // sort_by is stable
    releases.sort_by(|a, b| b.date.cmp(&a.date));

    if limit > 0 {
        releases.truncate(limit);
    }

    releases
}

fn load_release(blob: &BlobDescriptor, base_url: &str, prefix: &str) -> Release {
    let name = blob.key.strip_prefix(prefix).unwrap_or(&blob.key).to_string();
    let url = release_url(base_url, &name);

    let (version, date, commit) = match parse_name(&name) {
        Ok(parsed) => (parsed.version, parsed.date, parsed.commit),
        Err(e) => {
            warn!(name = %name, error = %e, "Couldn't get version from name");
            (String::new(), DateTime::<Utc>::default(), String::new())
        }
    };

    let date = to_eastern(&date);

    Release {
        date_string: date.format(DISPLAY_FORMAT).to_string(),
        name,
        blob: blob.clone(),
        url,
        version,
        date,
        commit,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Timelike;

    const BASE: &str = "https://s3.amazonaws.com/prerelease/darwin/";

    fn blobs(keys: &[&str]) -> Vec<BlobDescriptor> {
        keys.iter().map(|k| BlobDescriptor::new(*k)).collect()
    }

    #[test]
    fn test_sorted_newest_first() {
        let listing = blobs(&[
            "darwin/App-1.0.1-20160101120000+aaa.dmg",
            "darwin/App-1.0.3-20160301120000+ccc.dmg",
            "darwin/App-1.0.2-20160201120000+bbb.dmg",
        ]);

        let releases = build_catalog(&listing, BASE, "darwin/", "", 0);

        let commits: Vec<_> = releases.iter().map(|r| r.commit.as_str()).collect();
        assert_eq!(commits, vec!["ccc", "bbb", "aaa"]);
        for pair in releases.windows(2) {
            assert!(pair[0].date >= pair[1].date);
        }
    }

    #[test]
    fn test_suffix_filter() {
        let listing = blobs(&[
            "linux_binaries/deb/app_1.0.1-20160101120000+aaa_amd64.deb",
            "linux_binaries/deb/app_1.0.1-20160101120000+aaa_i386.deb",
            "linux_binaries/deb/app_1.0.1-20160101120000+aaa_AMD64.DEB",
        ]);

        let releases = build_catalog(&listing, BASE, "linux_binaries/deb/", "_amd64.deb", 0);

        assert_eq!(releases.len(), 1);
        assert!(releases[0].name.ends_with("_amd64.deb"));
    }

    #[test]
    fn test_truncate() {
        let listing = blobs(&[
            "darwin/App-1.0.1-20160101120000+aaa.dmg",
            "darwin/App-1.0.2-20160201120000+bbb.dmg",
            "darwin/App-1.0.3-20160301120000+ccc.dmg",
        ]);

        assert_eq!(build_catalog(&listing, BASE, "darwin/", "", 2).len(), 2);
        assert_eq!(build_catalog(&listing, BASE, "darwin/", "", 5).len(), 3);
        assert_eq!(build_catalog(&listing, BASE, "darwin/", "", 0).len(), 3);

        let newest = build_catalog(&listing, BASE, "darwin/", "", 1);
        assert_eq!(newest[0].commit, "ccc");
    }

    #[test]
    fn test_unparseable_name_is_kept() {
        let listing = blobs(&[
            "darwin/App-1.0.1-20160101120000+aaa.dmg",
            "darwin/manual-upload.dmg",
        ]);

        let releases = build_catalog(&listing, BASE, "darwin/", "", 0);

        assert_eq!(releases.len(), 2);
        let manual = releases.iter().find(|r| r.name == "manual-upload.dmg").unwrap();
        assert_eq!(manual.version, "");
        assert_eq!(manual.commit, "");
        assert!(manual.semver().is_err());
    }

    #[test]
    fn test_equal_dates_keep_listing_order() {
        let listing = blobs(&[
            "darwin/App-1.0.1-20160101120000+first.dmg",
            "darwin/App-1.0.1-20160101120000+second.dmg",
        ]);

        let releases = build_catalog(&listing, BASE, "darwin/", "", 0);
        assert_eq!(releases[0].commit, "first");
        assert_eq!(releases[1].commit, "second");
    }

    #[test]
    fn test_dates_in_eastern_time() {
        let listing = blobs(&["darwin/App-1.0.1-20160115150000+aaa.dmg"]);

        let release = &build_catalog(&listing, BASE, "darwin/", "", 0)[0];

        // 15:00 UTC is 10:00 EST in January
        assert_eq!(release.date.hour(), 10);
        assert_eq!(release.date_string, "Fri Jan 15 10:00:00 EST 2016");
    }

    #[test]
    fn test_release_url_and_name() {
        let listing = blobs(&["darwin/App-1.0.1-20160101120000+aaa.dmg"]);

        let release = &build_catalog(&listing, BASE, "darwin/", "", 0)[0];

        assert_eq!(release.name, "App-1.0.1-20160101120000+aaa.dmg");
        assert_eq!(release.key(), "darwin/App-1.0.1-20160101120000+aaa.dmg");
        assert_eq!(
            release.url,
            "https://s3.amazonaws.com/prerelease/darwin/App-1.0.1-20160101120000%2Baaa.dmg"
        );
    }

    #[test]
    fn test_release_keeps_listed_blob() {
        let listing = blobs(&["darwin/App-1.0.1-20160101120000+aaa.dmg", "darwin/notes.txt"]);

        let releases = build_catalog(&listing, BASE, "darwin/", ".dmg", 0);

        assert_eq!(releases.len(), 1);
        assert_eq!(releases[0].blob, listing[0]);
        assert_eq!(releases[0].date_string, "Fri Jan  1 07:00:00 EST 2016");
        assert_eq!(releases[0].commit, "aaa");
    }
}
