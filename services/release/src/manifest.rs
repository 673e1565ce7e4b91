use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Update manifest naming the release currently offered to clients
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UpdateManifest {
    /// Semantic version of the promoted release
    pub version: String,
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub description: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub instructions: Option<String>,
    #[serde(rename = "type", default)]
    pub update_type: i32,
    /// Publish time in milliseconds since the epoch
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub published_at: Option<i64>,
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub props: BTreeMap<String, String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub asset: Option<UpdateAsset>,
    /// Fields owned by the update protocol that this service doesn't interpret
    #[serde(flatten)]
    pub extra: serde_json::Map<String, serde_json::Value>,
}

/// Downloadable asset referenced by a manifest
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UpdateAsset {
    pub name: String,
    pub url: String,
    #[serde(default)]
    pub digest: String,
    #[serde(default)]
    pub signature: String,
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub local_path: String,
}

impl UpdateManifest {
    /// Decode a manifest from JSON
    pub fn from_json(data: &[u8]) -> Result<Self, serde_json::Error> {
        serde_json::from_slice(data)
    }

    pub fn semver(&self) -> Result<semver::Version, semver::Error> {
        semver::Version::parse(&self.version)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_decode_manifest() {
        let json = br#"{
            "version": "1.0.14-20160215154242+ab3d4f1",
            "name": "v1.0.14",
            "description": "Bug fixes",
            "type": 0,
            "publishedAt": 1455551000000,
            "asset": {
                "name": "App-1.0.14-20160215154242+ab3d4f1.zip",
                "url": "https://example.com/darwin-updates/App-1.0.14.zip",
                "digest": "abc",
                "signature": "sig"
            },
            "channel": "beta"
        }"#;

        let manifest = UpdateManifest::from_json(json).unwrap();
        assert_eq!(manifest.version, "1.0.14-20160215154242+ab3d4f1");
        assert_eq!(manifest.published_at, Some(1455551000000));
        assert_eq!(manifest.asset.as_ref().unwrap().digest, "abc");
        assert_eq!(manifest.extra.get("channel").unwrap(), "beta");
        assert!(manifest.semver().is_ok());
    }

    #[test]
    fn test_decode_minimal_manifest() {
        let manifest = UpdateManifest::from_json(br#"{"version": "2.1.0"}"#).unwrap();
        assert_eq!(manifest.semver().unwrap(), semver::Version::new(2, 1, 0));
        assert!(manifest.asset.is_none());
    }

    #[test]
    fn test_decode_requires_version() {
        assert!(UpdateManifest::from_json(br#"{"name": "v1"}"#).is_err());
    }
}
