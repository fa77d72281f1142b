//! `launcher_profiles.json`, the registry the Forge installer reads and
//! writes next to the versions directory.

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::Path;

pub const EPOCH_TIMESTAMP: &str = "1970-01-01T00:00:00.000Z";

/// Profile id the Forge installer registers its version under
pub const FORGE_PROFILE: &str = "forge";

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LauncherProfiles {
    #[serde(default)]
    pub profiles: BTreeMap<String, LauncherProfile>,

    #[serde(default)]
    pub authentication_database: BTreeMap<String, serde_json::Value>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub client_token: Option<String>,

    #[serde(default)]
    pub launcher_version: LauncherVersion,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub selected_user: Option<SelectedUser>,

    #[serde(default)]
    pub settings: ProfileSettings,

    /// Keys this model does not know about, kept on rewrite
    #[serde(flatten)]
    pub extra: BTreeMap<String, serde_json::Value>,
}

/// Profile id of the stock "latest release" entry
pub const LATEST_RELEASE_PROFILE: &str = "latest-release";

impl Default for LauncherProfiles {
    fn default() -> Self {
        let mut profiles = BTreeMap::new();
        profiles.insert(
            LATEST_RELEASE_PROFILE.to_string(),
            LauncherProfile::latest_release(),
        );
        Self {
            profiles,
            authentication_database: BTreeMap::new(),
            client_token: Some(uuid::Uuid::new_v4().simple().to_string()),
            launcher_version: LauncherVersion::default(),
            selected_user: None,
            settings: ProfileSettings::default(),
            extra: BTreeMap::new(),
        }
    }
}

impl LauncherProfiles {
    pub async fn load(path: &Path) -> Result<Self> {
        let content = tokio::fs::read_to_string(path)
            .await
            .with_context(|| format!("Failed to read profile registry {:?}", path))?;
        serde_json::from_str(&content)
            .with_context(|| format!("Failed to parse profile registry {:?}", path))
    }

    pub async fn save(&self, path: &Path) -> Result<()> {
        if let Some(parent) = path.parent() {
            tokio::fs::create_dir_all(parent).await?;
        }
        let json = serde_json::to_string_pretty(self)?;
        tokio::fs::write(path, json)
            .await
            .with_context(|| format!("Failed to write profile registry {:?}", path))
    }

    /// Version id the Forge installer recorded, if it ran
    pub fn forge_version_id(&self) -> Option<&str> {
        self.profiles
            .get(FORGE_PROFILE)
            .map(|p| p.last_version_id.as_str())
    }
}

/// Write a default registry at `path` unless one exists. Returns true if written.
pub async fn seed_profiles(path: &Path) -> Result<bool> {
    if path.exists() {
        return Ok(false);
    }
    log::debug!("Creating default profile registry at {:?}", path);
    LauncherProfiles::default().save(path).await?;
    Ok(true)
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LauncherProfile {
    pub last_version_id: String,
    #[serde(default)]
    pub name: String,
    #[serde(rename = "type", default = "default_profile_type")]
    pub profile_type: String,
    #[serde(default = "epoch")]
    pub created: String,
    #[serde(default = "epoch")]
    pub last_used: String,
    #[serde(default = "default_icon")]
    pub icon: String,
    #[serde(flatten)]
    pub extra: BTreeMap<String, serde_json::Value>,
}

impl LauncherProfile {
    pub fn new(name: impl Into<String>, last_version_id: impl Into<String>) -> Self {
        let now = chrono::Utc::now()
            .format("%Y-%m-%dT%H:%M:%S%.3fZ")
            .to_string();
        Self {
            last_version_id: last_version_id.into(),
            name: name.into(),
            profile_type: default_profile_type(),
            created: now.clone(),
            last_used: now,
            icon: default_icon(),
            extra: BTreeMap::new(),
        }
    }

    /// The entry a fresh registry carries, following whatever release is newest
    pub fn latest_release() -> Self {
        Self {
            profile_type: LATEST_RELEASE_PROFILE.to_string(),
            ..Self::new("", LATEST_RELEASE_PROFILE)
        }
    }
}

fn epoch() -> String {
    EPOCH_TIMESTAMP.to_string()
}

fn default_icon() -> String {
    "Grass".to_string()
}

fn default_profile_type() -> String {
    "custom".to_string()
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LauncherVersion {
    pub format: u32,
    pub name: String,
    pub profiles_format: u32,
}

impl Default for LauncherVersion {
    fn default() -> Self {
        Self {
            format: 21,
            name: "2.1.131".to_string(),
            profiles_format: 2,
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct SelectedUser {
    #[serde(default)]
    pub account: String,
    #[serde(default)]
    pub profile: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProfileSettings {
    #[serde(default = "default_channel")]
    pub channel: String,

    #[serde(flatten)]
    pub extra: BTreeMap<String, serde_json::Value>,
}

fn default_channel() -> String {
    "release".to_string()
}

impl Default for ProfileSettings {
    fn default() -> Self {
        Self {
            channel: default_channel(),
            extra: BTreeMap::new(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn seeds_once() {
        let tmp = tempfile::tempdir().unwrap();
        let path = tmp.path().join("launcher_profiles.json");

        assert!(seed_profiles(&path).await.unwrap());
        let first = std::fs::read_to_string(&path).unwrap();
        assert!(!seed_profiles(&path).await.unwrap());
        assert_eq!(std::fs::read_to_string(&path).unwrap(), first);

        let parsed = LauncherProfiles::load(&path).await.unwrap();
        assert_eq!(parsed.profiles.len(), 1);
        assert_eq!(parsed.forge_version_id(), None);
        let release = &parsed.profiles[LATEST_RELEASE_PROFILE];
        assert_eq!(release.profile_type, "latest-release");
        assert_ne!(release.created, EPOCH_TIMESTAMP);
        assert_eq!(parsed.launcher_version.format, 21);
    }

    #[test]
    fn reads_installer_output() {
        let json = r#"{
            "profiles": {
                "forge": {
                    "name": "forge",
                    "type": "custom",
                    "lastVersionId": "1.16.5-forge-36.2.0",
                    "icon": "data:image/png;base64,AAAA",
                    "gameDir": "/tmp"
                }
            },
            "selectedProfile": "forge"
        }"#;
        let profiles: LauncherProfiles = serde_json::from_str(json).unwrap();
        assert_eq!(profiles.forge_version_id(), Some("1.16.5-forge-36.2.0"));

        let forge = &profiles.profiles["forge"];
        assert_eq!(forge.created, EPOCH_TIMESTAMP);
        assert!(forge.extra.contains_key("gameDir"));
        assert!(profiles.extra.contains_key("selectedProfile"));

        let rewritten = serde_json::to_value(&profiles).unwrap();
        assert_eq!(rewritten["selectedProfile"], "forge");
        assert_eq!(rewritten["profiles"]["forge"]["gameDir"], "/tmp");
    }

    #[test]
    fn new_profile_has_timestamps() {
        let p = LauncherProfile::new("pack", "1.16.5");
        assert_eq!(p.icon, "Grass");
        assert!(p.created.ends_with('Z'));
        assert_eq!(p.created.len(), EPOCH_TIMESTAMP.len());
    }

    #[test]
    fn settings_without_channel_are_kept() {
        let json = r#"{"profiles": {}, "settings": {"enableSnapshots": true, "keepLauncherOpen": false}}"#;
        let profiles: LauncherProfiles = serde_json::from_str(json).unwrap();
        assert_eq!(profiles.settings.channel, "release");
        assert_eq!(profiles.settings.extra["enableSnapshots"], true);

        let rewritten = serde_json::to_value(&profiles).unwrap();
        assert_eq!(rewritten["settings"]["enableSnapshots"], true);
        assert_eq!(rewritten["settings"]["keepLauncherOpen"], false);
        assert_eq!(rewritten["settings"]["channel"], "release");
    }
}
