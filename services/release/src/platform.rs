/// Per-platform artifact naming conventions
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Platform {
    /// Platform identifier used in manifest keys
    pub name: &'static str,
    /// Bucket prefix holding the platform's artifacts
    pub prefix: &'static str,
    /// Bucket prefix holding versioned update manifests
    pub support_prefix: &'static str,
    /// Artifact suffix filter (empty matches every key)
    pub suffix: &'static str,
    /// Fixed object name the newest artifact is copied to
    pub latest_name: &'static str,
}

const PLATFORMS: [Platform; 4] = [
    Platform {
        name: "darwin",
        prefix: "darwin/",
        support_prefix: "darwin-support/",
        suffix: "",
        latest_name: "Keybase.dmg",
    },
    Platform {
        name: "deb",
        prefix: "linux_binaries/deb/",
        support_prefix: "",
        suffix: "_amd64.deb",
        latest_name: "keybase_amd64.deb",
    },
    Platform {
        name: "rpm",
        prefix: "linux_binaries/rpm/",
        support_prefix: "",
        suffix: ".x86_64.rpm",
        latest_name: "keybase_amd64.rpm",
    },
    Platform {
        name: "windows",
        prefix: "windows/",
        support_prefix: "",
        suffix: ".386.exe",
        latest_name: "keybase_setup_386.exe",
    },
];

impl Platform {
    /// All supported platforms
    pub fn all() -> &'static [Platform] {
        &PLATFORMS
    }

    /// Look up a platform by name
    pub fn find(name: &str) -> Option<&'static Platform> {
        PLATFORMS.iter().find(|p| p.name == name)
    }

    /// Key of the versioned manifest copied into place on promotion.
    /// Format: {support_prefix}update-{platform}-{env}-{version}.json
    pub fn versioned_manifest_key(&self, env: &str, version: &str) -> String {
        format!(
            "{}update-{}-{}-{}.json",
            self.support_prefix, self.name, env, version
        )
    }
}

/// Key of the manifest naming the current update for a platform/environment/channel.
pub fn update_manifest_key(platform: &str, env: &str, channel: Option<&str>) -> String {
    match channel {
        Some(channel) if !channel.is_empty() => {
            format!("update-{}-{}-{}.json", platform, env, channel)
        }
        _ => format!("update-{}-{}.json", platform, env),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_find_platform() {
        let deb = Platform::find("deb").unwrap();
        assert_eq!(deb.prefix, "linux_binaries/deb/");
        assert_eq!(deb.suffix, "_amd64.deb");

        assert!(Platform::find("beos").is_none());
        assert_eq!(Platform::all().len(), 4);
    }

    #[test]
    fn test_update_manifest_key() {
        assert_eq!(update_manifest_key("darwin", "prod", None), "update-darwin-prod.json");
        assert_eq!(
            update_manifest_key("darwin", "prod", Some("beta")),
            "update-darwin-prod-beta.json"
        );
        assert_eq!(update_manifest_key("darwin", "prod", Some("")), "update-darwin-prod.json");
    }

    #[test]
    fn test_versioned_manifest_key() {
        let darwin = Platform::find("darwin").unwrap();
        assert_eq!(
            darwin.versioned_manifest_key("prod", "1.0.14-20160215154242+ab3d4f1"),
            "darwin-support/update-darwin-prod-1.0.14-20160215154242+ab3d4f1.json"
        );
    }
}
