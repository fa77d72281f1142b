/// Version.json, version list and asset index models
use crate::game::launcher::rules::{is_allowed, Environment, OsDescriptor};
use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashMap};
use std::path::Path;

/// Complete version manifest from version.json
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct VersionManifest {
    /// Version ID (e.g., "1.16.5" or "1.16.5-forge-36.2.0")
    pub id: String,

    /// Parent version to inherit from
    #[serde(skip_serializing_if = "Option::is_none")]
    pub inherits_from: Option<String>,

    /// Game and JVM arguments
    #[serde(skip_serializing_if = "Option::is_none")]
    pub arguments: Option<Arguments>,

    /// Legacy arguments (pre-1.13)
    #[serde(skip_serializing_if = "Option::is_none")]
    pub minecraft_arguments: Option<String>,

    /// Named downloads ("client", "server", ...)
    #[serde(default, skip_serializing_if = "HashMap::is_empty")]
    pub downloads: HashMap<String, Download>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub asset_index: Option<AssetIndex>,

    /// Assets version (legacy)
    #[serde(skip_serializing_if = "Option::is_none")]
    pub assets: Option<String>,

    #[serde(default)]
    pub libraries: Vec<Library>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub main_class: Option<String>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub minimum_launcher_version: Option<u32>,

    /// Version type (release, snapshot, old_beta, old_alpha)
    #[serde(skip_serializing_if = "Option::is_none", rename = "type")]
    pub version_type: Option<String>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub release_time: Option<String>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub time: Option<String>,
}

impl VersionManifest {
    /// The client jar download, required to install an engine version
    pub fn client_download(&self) -> Result<&Download> {
        self.downloads.get("client").ok_or_else(|| {
            crate::LauncherError::missing(format!("version {}", self.id), "downloads.client")
                .into()
        })
    }
}

/// Game and JVM arguments
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Arguments {
    #[serde(default)]
    pub game: Vec<Argument>,

    #[serde(default)]
    pub jvm: Vec<Argument>,
}

/// One entry of an argument list, distinguished by JSON shape
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum Argument {
    /// Plain token
    Literal(String),

    /// Several tokens in one entry
    LiteralList(Vec<String>),

    /// Tokens guarded by rules
    Conditional {
        rules: Vec<Rule>,
        value: ArgumentValue,
    },
}

impl Argument {
    pub fn literal(token: impl Into<String>) -> Self {
        Argument::Literal(token.into())
    }

    /// Tokens contributed by this entry in the given environment
    pub fn resolve(&self, env: &Environment) -> Vec<String> {
        match self {
            Argument::Literal(s) => vec![s.clone()],
            Argument::LiteralList(v) => v.clone(),
            Argument::Conditional { rules, value } => {
                if is_allowed(Some(rules), env) {
                    value.tokens()
                } else {
                    Vec::new()
                }
            }
        }
    }
}

/// Argument value can be a single string or array
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum ArgumentValue {
    Single(String),
    Multiple(Vec<String>),
}

impl ArgumentValue {
    pub fn tokens(&self) -> Vec<String> {
        match self {
            ArgumentValue::Single(s) => vec![s.clone()],
            ArgumentValue::Multiple(v) => v.clone(),
        }
    }
}

/// Rule for conditional arguments/libraries
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Rule {
    pub action: RuleAction,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub os: Option<OsRule>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub features: Option<HashMap<String, bool>>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RuleAction {
    Allow,
    Disallow,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OsRule {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub version: Option<String>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub arch: Option<String>,
}

/// Library definition
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Library {
    /// Maven coordinates
    pub name: String,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub downloads: Option<LibraryDownloads>,

    /// Custom Maven repository URL
    #[serde(skip_serializing_if = "Option::is_none")]
    pub url: Option<String>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub rules: Option<Vec<Rule>>,

    /// OS name -> native classifier (may contain `${arch}`)
    #[serde(skip_serializing_if = "Option::is_none")]
    pub natives: Option<HashMap<String, String>>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub extract: Option<ExtractRules>,
}

impl Library {
    pub fn is_allowed(&self, env: &Environment) -> bool {
        is_allowed(self.rules.as_deref(), env)
    }

    pub fn artifact(&self) -> Option<&Artifact> {
        self.downloads.as_ref().and_then(|d| d.artifact.as_ref())
    }

    /// Relative path under `libraries/`
    pub fn path(&self) -> Result<String> {
        match self.artifact().and_then(|a| a.path.clone()) {
            Some(path) => Ok(path),
            None => maven_coords_to_path(&self.name),
        }
    }

    /// Where to fetch the primary artifact from
    pub fn remote_url(&self, default_repository: &str) -> Result<String> {
        if let Some(url) = self.artifact().and_then(|a| a.url.as_deref()) {
            if !url.is_empty() {
                return Ok(url.to_string());
            }
        }
        let base = self.url.as_deref().unwrap_or(default_repository);
        Ok(join_url(base, &self.path()?))
    }

    /// Native classifier for this OS, with `${arch}` expanded
    pub fn native_classifier(&self, os: &OsDescriptor) -> Option<String> {
        self.natives
            .as_ref()
            .and_then(|n| n.get(&os.name))
            .map(|c| c.replace("${arch}", os.arch_bits()))
    }

    pub fn native_artifact(&self, classifier: &str) -> Option<&Artifact> {
        self.downloads
            .as_ref()
            .and_then(|d| d.classifiers.as_ref())
            .and_then(|c| c.get(classifier))
    }

    /// False for natives-only libraries, which have classifiers but no main jar
    pub fn has_primary_artifact(&self) -> bool {
        self.downloads.is_none() || self.artifact().is_some()
    }

    /// Relative path of a native classifier artifact under `libraries/`
    pub fn native_path(&self, classifier: &str) -> Result<String> {
        match self.native_artifact(classifier).and_then(|a| a.path.clone()) {
            Some(path) => Ok(path),
            None => maven_coords_to_path(&format!("{}:{}", self.name, classifier)),
        }
    }

    /// Where to fetch a native classifier artifact from
    pub fn native_url(&self, classifier: &str, default_repository: &str) -> Result<String> {
        if let Some(url) = self.native_artifact(classifier).and_then(|a| a.url.as_deref()) {
            if !url.is_empty() {
                return Ok(url.to_string());
            }
        }
        let base = self.url.as_deref().unwrap_or(default_repository);
        Ok(join_url(base, &self.native_path(classifier)?))
    }

    /// A library with neither artifact nor natives only carries rules
    pub fn is_placeholder(&self) -> bool {
        self.artifact().is_none() && self.natives.is_none() && self.downloads.is_some()
    }

    pub fn extract_excludes(&self) -> &[String] {
        self.extract.as_ref().map(|e| e.exclude.as_slice()).unwrap_or(&[])
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct LibraryDownloads {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub artifact: Option<Artifact>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub classifiers: Option<HashMap<String, Artifact>>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Artifact {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub path: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub url: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub sha1: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub size: Option<u64>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ExtractRules {
    #[serde(default)]
    pub exclude: Vec<String>,
}

/// A named download of a version ("client", "server")
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Download {
    pub url: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub sha1: Option<String>,
    #[serde(default)]
    pub size: u64,
}

/// Asset index information
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AssetIndex {
    pub id: String,
    pub sha1: String,
    #[serde(default)]
    pub size: u64,
    #[serde(default)]
    pub total_size: u64,
    pub url: String,
}

/// Upstream version list (version_manifest.json)
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct VersionList {
    pub latest: LatestVersions,
    pub versions: Vec<VersionListEntry>,
}

impl VersionList {
    pub fn find(&self, id: &str) -> Option<&VersionListEntry> {
        self.versions.iter().find(|v| v.id == id)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LatestVersions {
    pub release: String,
    pub snapshot: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct VersionListEntry {
    pub id: String,
    #[serde(rename = "type")]
    pub version_type: String,
    pub url: String,
    #[serde(default)]
    pub time: Option<String>,
    #[serde(default)]
    pub release_time: Option<String>,
    /// Present in the v2 list only
    #[serde(default)]
    pub sha1: Option<String>,
}

/// Asset index document (assets/indexes/<id>.json)
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct AssetObjects {
    /// Sorted so downloads happen in a stable order
    pub objects: BTreeMap<String, AssetObject>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AssetObject {
    pub hash: String,
    pub size: u64,
}

impl AssetObject {
    /// Sharded object path: `<first two hex chars>/<hash>`
    pub fn path(&self) -> String {
        let prefix = self.hash.get(..2).unwrap_or(&self.hash);
        format!("{}/{}", prefix, self.hash)
    }
}

/// Read and parse a version.json file
pub fn parse_version_file(path: &Path) -> Result<VersionManifest> {
    let content = std::fs::read_to_string(path)
        .with_context(|| format!("Failed to read version.json at {:?}", path))?;

    let manifest: VersionManifest = serde_json::from_str(&content)
        .with_context(|| format!("Failed to parse version.json at {:?}", path))?;

    Ok(manifest)
}

/// Convert Maven coordinates to relative path string
/// Format: group:artifact:version[:classifier][@extension]
/// Example: "com.google.guava:guava:21.0" -> "com/google/guava/guava/21.0/guava-21.0.jar"
pub fn maven_coords_to_path(coords: &str) -> Result<String> {
    let (coords, extension) = match coords.split_once('@') {
        Some((c, ext)) => (c, ext),
        None => (coords, "jar"),
    };
    let parts: Vec<&str> = coords.split(':').collect();

    if parts.len() < 3 {
        anyhow::bail!("Invalid Maven coordinates: {}", coords);
    }

    let group = parts[0].replace('.', "/");
    let artifact = parts[1];
    let version = parts[2];

    let filename = match parts.get(3) {
        Some(classifier) => format!("{}-{}-{}.{}", artifact, version, classifier, extension),
        None => format!("{}-{}.{}", artifact, version, extension),
    };

    Ok(format!("{}/{}/{}/{}", group, artifact, version, filename))
}

/// Join a base URL and a relative path with exactly one slash
pub fn join_url(base: &str, path: &str) -> String {
    format!("{}/{}", base.trim_end_matches('/'), path.trim_start_matches('/'))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::game::launcher::rules::FeatureSet;

    fn linux() -> Environment {
        Environment::new(OsDescriptor::new("linux", "6.1", "x86_64"), FeatureSet::default())
    }

    #[test]
    fn argument_shapes_decode() {
        let json = r#"[
            "--username",
            ["--a", "--b"],
            {"rules": [{"action": "allow", "features": {"is_demo_user": true}}], "value": "--demo"},
            {"rules": [{"action": "allow", "os": {"name": "linux"}}], "value": ["-Xss1M", "-Dx=y"]}
        ]"#;
        let args: Vec<Argument> = serde_json::from_str(json).unwrap();
        assert_eq!(args[0], Argument::literal("--username"));
        assert!(matches!(args[1], Argument::LiteralList(ref v) if v.len() == 2));
        assert!(matches!(args[2], Argument::Conditional { .. }));

        let env = linux();
        let tokens: Vec<String> = args.iter().flat_map(|a| a.resolve(&env)).collect();
        assert_eq!(tokens, vec!["--username", "--a", "--b", "-Xss1M", "-Dx=y"]);
    }

    #[test]
    fn maven_paths() {
        assert_eq!(
            maven_coords_to_path("com.google.guava:guava:21.0").unwrap(),
            "com/google/guava/guava/21.0/guava-21.0.jar"
        );
        assert_eq!(
            maven_coords_to_path("org.lwjgl:lwjgl:3.2.2:natives-linux").unwrap(),
            "org/lwjgl/lwjgl/3.2.2/lwjgl-3.2.2-natives-linux.jar"
        );
        assert_eq!(
            maven_coords_to_path("de.oceanlabs.mcp:mcp_config:1.16.5-20210115.111550@zip").unwrap(),
            "de/oceanlabs/mcp/mcp_config/1.16.5-20210115.111550/mcp_config-1.16.5-20210115.111550.zip"
        );
        assert!(maven_coords_to_path("broken").is_err());
    }

    #[test]
    fn library_urls() {
        let lib: Library = serde_json::from_str(
            r#"{"name": "net.minecraftforge:forge:1.16.5-36.2.0", "url": "https://maven.example/"}"#,
        )
        .unwrap();
        assert_eq!(
            lib.remote_url("https://libraries.minecraft.net/").unwrap(),
            "https://maven.example/net/minecraftforge/forge/1.16.5-36.2.0/forge-1.16.5-36.2.0.jar"
        );

        let lib: Library = serde_json::from_str(
            r#"{"name": "a.b:c:1", "downloads": {"artifact": {"path": "a/b/c/1/c-1.jar", "url": ""}}}"#,
        )
        .unwrap();
        assert_eq!(
            lib.remote_url("https://libraries.minecraft.net/").unwrap(),
            "https://libraries.minecraft.net/a/b/c/1/c-1.jar"
        );
    }

    #[test]
    fn native_classifier_expands_arch() {
        let lib: Library = serde_json::from_str(
            r#"{"name": "tv.twitch:twitch-platform:5.16", "natives": {"windows": "natives-windows-${arch}"}}"#,
        )
        .unwrap();
        let win32 = OsDescriptor::new("windows", "10.0", "x86");
        assert_eq!(
            lib.native_classifier(&win32).as_deref(),
            Some("natives-windows-32")
        );
        assert_eq!(lib.native_classifier(&linux().os), None);
    }

    #[test]
    fn missing_client_download() {
        let manifest = VersionManifest {
            id: "1.16.5".into(),
            ..Default::default()
        };
        let err = manifest.client_download().unwrap_err();
        assert!(matches!(
            err.downcast_ref::<crate::LauncherError>(),
            Some(crate::LauncherError::MissingField { field, .. }) if field == "downloads.client"
        ));
    }

    #[test]
    fn asset_object_path() {
        let obj = AssetObject {
            hash: "bdf48ef6b5d0d23bbb02e17d04865216179f510a".into(),
            size: 10,
        };
        assert_eq!(obj.path(), "bd/bdf48ef6b5d0d23bbb02e17d04865216179f510a");
    }
}
