use serde::{Deserialize, Deserializer, Serialize, Serializer};
use std::fmt;
use std::path::{Path, PathBuf};

/// Pinned target state of a modpack
#[derive(Debug, Serialize, Deserialize, Clone, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct ModpackManifest {
    /// Engine version id, e.g. "1.16.5"
    pub minecraft: String,

    /// Forge version id, e.g. "1.16.5-36.2.0"
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub forge: Option<String>,

    /// Server address added to the multiplayer list
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub multiplayer: Option<String>,

    /// ServerSync server address
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub serversync: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub serversync_port: Option<u16>,

    /// Compared against the installed marker to detect updates
    #[serde(default = "default_version", deserialize_with = "string_or_number")]
    pub version: String,

    #[serde(default)]
    pub packages: Vec<Package>,
}

fn default_version() -> String {
    "1".to_string()
}

fn string_or_number<'de, D: Deserializer<'de>>(deserializer: D) -> Result<String, D::Error> {
    #[derive(Deserialize)]
    #[serde(untagged)]
    enum Raw {
        Text(String),
        Int(i64),
        Float(f64),
    }

    Ok(match Raw::deserialize(deserializer)? {
        Raw::Text(s) => s,
        Raw::Int(n) => n.to_string(),
        Raw::Float(n) => n.to_string(),
    })
}

/// One managed content unit of a modpack
#[derive(Debug, Serialize, Deserialize, Clone, PartialEq)]
pub struct Package {
    pub id: String,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub url: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub sha1: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub homepage: Option<String>,

    /// Explicit target directory relative to the install root
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub target: Option<String>,

    #[serde(default)]
    pub action: Action,
}

impl Package {
    /// File extension taken from the URL path, lower-cased
    pub fn extension(&self) -> Option<String> {
        let raw = self.url.as_deref()?;
        let path = match url::Url::parse(raw) {
            Ok(u) => u.path().to_string(),
            Err(_) => raw.split(['?', '#']).next().unwrap_or_default().to_string(),
        };
        let file = path.rsplit('/').next()?;
        let (_, ext) = file.rsplit_once('.')?;
        if ext.is_empty() {
            None
        } else {
            Some(ext.to_ascii_lowercase())
        }
    }

    /// Target directory relative to the install root
    pub fn target(&self) -> String {
        if let Some(target) = &self.target {
            return target.clone();
        }
        if self.url.is_none() {
            return ".".to_string();
        }
        match self.extension().as_deref() {
            Some("jar") => "mods".to_string(),
            Some("toml" | "cfg" | "json" | "properties") => "config".to_string(),
            _ => ".".to_string(),
        }
    }

    pub fn file_name(&self) -> String {
        match self.extension() {
            Some(ext) => format!("{}.{}", self.id, ext),
            None => self.id.clone(),
        }
    }

    pub fn target_dir(&self, root: &Path) -> PathBuf {
        let target = self.target();
        if target == "." {
            root.to_path_buf()
        } else {
            root.join(target)
        }
    }

    pub fn file_path(&self, root: &Path) -> PathBuf {
        self.target_dir(root).join(self.file_name())
    }
}

/// What to do with a package during sync
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum Action {
    /// Download, then unpack into the target directory
    #[default]
    Extract,
    /// Delete a previously placed file
    Remove,
    /// Leave the file alone and forget about it
    Ignore,
    /// Download without unpacking
    Download,
}

impl Action {
    pub fn as_str(&self) -> &'static str {
        match self {
            Action::Extract => "extract",
            Action::Remove => "remove",
            Action::Ignore => "ignore",
            Action::Download => "download",
        }
    }
}

impl fmt::Display for Action {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::str::FromStr for Action {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_uppercase().as_str() {
            "EXTRACT" => Ok(Action::Extract),
            "REMOVE" => Ok(Action::Remove),
            "IGNORE" => Ok(Action::Ignore),
            "DOWNLOAD" => Ok(Action::Download),
            other => Err(format!("unknown package action: {}", other)),
        }
    }
}

impl Serialize for Action {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(self.as_str())
    }
}

impl<'de> Deserialize<'de> for Action {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let raw = String::deserialize(deserializer)?;
        raw.parse().map_err(serde::de::Error::custom)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn package(url: Option<&str>) -> Package {
        Package {
            id: "jei".into(),
            url: url.map(str::to_string),
            sha1: None,
            homepage: None,
            target: None,
            action: Action::Extract,
        }
    }

    #[test]
    fn parses_manifest_defaults() {
        let manifest: ModpackManifest = serde_json::from_str(
            r#"{
                "minecraft": "1.16.5",
                "forge": "1.16.5-36.2.0",
                "version": 7,
                "packages": [
                    {"id": "jei", "url": "https://cdn.example/jei-7.7.1.jar", "action": "DOWNLOAD"},
                    {"id": "old", "action": "Remove"},
                    {"id": "cfg", "url": "https://cdn.example/config.zip"}
                ]
            }"#,
        )
        .unwrap();

        assert_eq!(manifest.version, "7");
        assert_eq!(manifest.multiplayer, None);
        assert_eq!(manifest.packages[0].action, Action::Download);
        assert_eq!(manifest.packages[1].action, Action::Remove);
        assert_eq!(manifest.packages[2].action, Action::Extract);

        let manifest: ModpackManifest = serde_json::from_str(r#"{"minecraft": "1.12.2"}"#).unwrap();
        assert_eq!(manifest.version, "1");
        assert!(manifest.packages.is_empty());
    }

    #[test]
    fn action_serializes_lowercase() {
        assert_eq!(serde_json::to_string(&Action::Remove).unwrap(), r#""remove""#);
        assert!(serde_json::from_str::<Action>(r#""explode""#).is_err());
    }

    #[test]
    fn target_by_extension() {
        assert_eq!(package(Some("https://x/a/jei.jar")).target(), "mods");
        assert_eq!(package(Some("https://x/forge-client.toml")).target(), "config");
        assert_eq!(package(Some("https://x/a.CFG?raw=1")).target(), "config");
        assert_eq!(package(Some("https://x/pack.zip")).target(), ".");
        assert_eq!(package(None).target(), ".");

        let mut explicit = package(Some("https://x/a.jar"));
        explicit.target = Some("resourcepacks".into());
        assert_eq!(explicit.target(), "resourcepacks");
    }

    #[test]
    fn file_paths() {
        let root = Path::new("/root");
        assert_eq!(
            package(Some("https://x/files/JEI-1.16.5.jar")).file_path(root),
            PathBuf::from("/root/mods/jei.jar")
        );
        assert_eq!(package(None).file_path(root), PathBuf::from("/root/jei"));
    }
}
