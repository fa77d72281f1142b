//! Resolution of `inheritsFrom` chains into a single effective manifest.
//!
//! Resolved manifests are memoized by id, so a chain shared by several
//! versions is read from disk once per resolver.

use crate::game::launcher::rules::Environment;
use crate::game::launcher::version_parser::{
    parse_version_file, Argument, ArgumentValue, AssetIndex, Download, Library, Rule, RuleAction,
    VersionManifest,
};
use crate::LauncherError;
use anyhow::{Context, Result};
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::Arc;

/// JVM tokens prepended to manifests that only carry `minecraftArguments`
pub const LEGACY_JVM_PREAMBLE: [&str; 5] = [
    "-Djava.library.path=${natives_directory}",
    "-Dminecraft.launcher.brand=${launcher_name}",
    "-Dminecraft.launcher.version=${launcher_version}",
    "-cp",
    "${classpath}",
];

/// Placeholder for the main class, inserted between jvm and game tokens
pub const MAIN_CLASS_TOKEN: &str = "${main_class}";

/// A version manifest with its whole inheritance chain merged in
#[derive(Debug, Clone, Default)]
pub struct EffectiveManifest {
    pub id: String,
    /// Ids from this version up to the root of the chain
    pub chain: Vec<String>,
    pub main_class: Option<String>,
    pub jvm: Vec<Argument>,
    pub game: Vec<Argument>,
    /// Own libraries first, then inherited ones
    pub libraries: Vec<Library>,
    pub assets: Option<String>,
    pub asset_index: Option<AssetIndex>,
    pub version_type: Option<String>,
    pub downloads: HashMap<String, Download>,
    pub inherited: Option<Arc<EffectiveManifest>>,
}

impl EffectiveManifest {
    fn merge(id: String, manifest: VersionManifest, parent: Option<Arc<EffectiveManifest>>) -> Self {
        let (own_jvm, own_game, legacy) = own_arguments(&manifest);

        let mut chain = vec![id.clone()];
        let (jvm, game, mut libraries) = match &parent {
            Some(p) => {
                chain.extend(p.chain.iter().cloned());
                // a legacy argument string is a complete command line and
                // replaces whatever the parent declared
                let (jvm, game) = if legacy {
                    (own_jvm, own_game)
                } else {
                    (
                        p.jvm.iter().cloned().chain(own_jvm).collect(),
                        p.game.iter().cloned().chain(own_game).collect(),
                    )
                };
                (jvm, game, manifest.libraries.clone())
            }
            None => (own_jvm, own_game, manifest.libraries.clone()),
        };

        if let Some(p) = &parent {
            libraries.extend(p.libraries.iter().cloned());
        }

        let assets = manifest
            .assets
            .filter(|a| !a.trim().is_empty())
            .or_else(|| parent.as_ref().and_then(|p| p.assets.clone()));
        let asset_index = manifest
            .asset_index
            .or_else(|| parent.as_ref().and_then(|p| p.asset_index.clone()));
        let main_class = manifest
            .main_class
            .or_else(|| parent.as_ref().and_then(|p| p.main_class.clone()));
        let version_type = manifest
            .version_type
            .or_else(|| parent.as_ref().and_then(|p| p.version_type.clone()));
        let downloads = if manifest.downloads.is_empty() {
            parent.as_ref().map(|p| p.downloads.clone()).unwrap_or_default()
        } else {
            manifest.downloads
        };

        Self {
            id,
            chain,
            main_class,
            jvm,
            game,
            libraries,
            assets,
            asset_index,
            version_type,
            downloads,
            inherited: parent,
        }
    }

    /// Id of the root of the chain, i.e. the engine version owning the client jar
    pub fn engine_id(&self) -> &str {
        self.chain.last().map(String::as_str).unwrap_or(&self.id)
    }

    /// Asset index name, falling back through the chain when blank
    pub fn assets_index_name(&self) -> Option<String> {
        self.assets
            .clone()
            .or_else(|| self.asset_index.as_ref().map(|a| a.id.clone()))
            .or_else(|| self.inherited.as_ref().and_then(|p| p.assets_index_name()))
    }

    /// Ordered launch tokens, still containing placeholders:
    /// jvm tokens, the main class placeholder, then game tokens.
    pub fn arguments(&self, env: &Environment) -> Vec<String> {
        let mut tokens: Vec<String> = self.jvm.iter().flat_map(|a| a.resolve(env)).collect();
        tokens.push(MAIN_CLASS_TOKEN.to_string());
        tokens.extend(self.game.iter().flat_map(|a| a.resolve(env)));
        tokens
    }

    /// Relative classpath paths of every allowed library, own first
    pub fn library_paths(&self, env: &Environment) -> Result<Vec<String>> {
        let mut paths = Vec::new();
        for lib in &self.libraries {
            if lib.is_placeholder() || !lib.is_allowed(env) {
                continue;
            }
            paths.push(lib.path()?);
        }
        Ok(paths)
    }
}

/// Split a manifest's own arguments into jvm and game lists.
/// The flag is true when they were synthesized from `minecraftArguments`.
fn own_arguments(manifest: &VersionManifest) -> (Vec<Argument>, Vec<Argument>, bool) {
    if let Some(args) = &manifest.arguments {
        return (args.jvm.clone(), args.game.clone(), false);
    }

    match &manifest.minecraft_arguments {
        Some(legacy) => {
            let (jvm, game) = synthesize_legacy_arguments(legacy);
            (jvm, game, true)
        }
        None => (Vec::new(), Vec::new(), false),
    }
}

/// Build structured argument lists from a legacy `minecraftArguments` string
pub fn synthesize_legacy_arguments(legacy: &str) -> (Vec<Argument>, Vec<Argument>) {
    let jvm = LEGACY_JVM_PREAMBLE.iter().map(|t| Argument::literal(*t)).collect();

    let mut features = HashMap::new();
    features.insert("has_custom_resolution".to_string(), true);
    let mut game = vec![Argument::Conditional {
        rules: vec![Rule {
            action: RuleAction::Allow,
            os: None,
            features: Some(features),
        }],
        value: ArgumentValue::Multiple(
            ["--width", "${resolution_width}", "--height", "${resolution_height}"]
                .iter()
                .map(|s| s.to_string())
                .collect(),
        ),
    }];
    game.extend(legacy.split_whitespace().map(Argument::literal));

    (jvm, game)
}

/// Resolves version ids against the on-disk `versions/` directory
pub struct VersionResolver {
    versions_dir: PathBuf,
    resolved: HashMap<String, Arc<EffectiveManifest>>,
}

impl VersionResolver {
    pub fn new(versions_dir: impl Into<PathBuf>) -> Self {
        Self {
            versions_dir: versions_dir.into(),
            resolved: HashMap::new(),
        }
    }

    pub fn versions_dir(&self) -> &Path {
        &self.versions_dir
    }

    pub fn manifest_path(&self, id: &str) -> PathBuf {
        self.versions_dir.join(id).join(format!("{}.json", id))
    }

    /// Resolve a version id, reading each manifest of the chain at most once
    pub fn resolve(&mut self, id: &str) -> Result<Arc<EffectiveManifest>> {
        let mut visited: Vec<String> = Vec::new();
        let mut pending: Vec<(String, VersionManifest)> = Vec::new();
        let mut base: Option<Arc<EffectiveManifest>> = None;
        let mut next = Some(id.to_string());

        while let Some(current) = next.take() {
            if let Some(done) = self.resolved.get(&current) {
                base = Some(done.clone());
                break;
            }
            if visited.contains(&current) {
                visited.push(current);
                return Err(LauncherError::InheritanceCycle(visited).into());
            }
            visited.push(current.clone());

            let path = self.manifest_path(&current);
            log::debug!("Loading version manifest {} from {:?}", current, path);
            let manifest = parse_version_file(&path)
                .with_context(|| format!("Version manifest for {} is not available", current))?;
            next = manifest
                .inherits_from
                .clone()
                .filter(|parent| !parent.is_empty());
            pending.push((current, manifest));
        }

        while let Some((version_id, manifest)) = pending.pop() {
            let effective = Arc::new(EffectiveManifest::merge(
                version_id.clone(),
                manifest,
                base.take(),
            ));
            self.resolved.insert(version_id, effective.clone());
            base = Some(effective);
        }

        base.ok_or_else(|| anyhow::anyhow!("Nothing to resolve for {}", id))
    }

    /// Classpath-relative library paths for a version, own libraries first
    pub fn all_libraries(&mut self, id: &str, env: &Environment) -> Result<Vec<String>> {
        self.resolve(id)?.library_paths(env)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::game::launcher::rules::{FeatureSet, OsDescriptor};
    use serde_json::json;
    use tempfile::tempdir;

    fn write_manifest(dir: &Path, value: serde_json::Value) {
        let id = value["id"].as_str().unwrap().to_string();
        let path = dir.join(&id).join(format!("{}.json", id));
        std::fs::create_dir_all(path.parent().unwrap()).unwrap();
        std::fs::write(path, serde_json::to_vec(&value).unwrap()).unwrap();
    }

    fn env() -> Environment {
        Environment::new(OsDescriptor::new("linux", "6.1", "x86_64"), FeatureSet::default())
    }

    #[test]
    fn inheritance_order_parent_then_child() {
        let tmp = tempdir().unwrap();
        write_manifest(
            tmp.path(),
            json!({
                "id": "parent",
                "mainClass": "net.minecraft.client.main.Main",
                "assets": "1.16",
                "arguments": {"jvm": ["A"], "game": ["B"]},
                "libraries": [{"name": "p:lib:1"}]
            }),
        );
        write_manifest(
            tmp.path(),
            json!({
                "id": "child",
                "inheritsFrom": "parent",
                "mainClass": "cpw.mods.modlauncher.Launcher",
                "arguments": {"jvm": ["C"], "game": ["D"]},
                "libraries": [{"name": "c:lib:1"}]
            }),
        );

        let mut resolver = VersionResolver::new(tmp.path());
        let eff = resolver.resolve("child").unwrap();

        assert_eq!(
            eff.arguments(&env()),
            vec!["A", "C", MAIN_CLASS_TOKEN, "B", "D"]
        );
        assert_eq!(eff.main_class.as_deref(), Some("cpw.mods.modlauncher.Launcher"));
        assert_eq!(eff.assets_index_name().as_deref(), Some("1.16"));
        assert_eq!(eff.engine_id(), "parent");
        assert_eq!(
            eff.library_paths(&env()).unwrap(),
            vec!["c/lib/1/lib-1.jar", "p/lib/1/lib-1.jar"]
        );
    }

    #[test]
    fn legacy_arguments_are_synthesized() {
        let tmp = tempdir().unwrap();
        write_manifest(
            tmp.path(),
            json!({
                "id": "1.7.10",
                "mainClass": "net.minecraft.client.main.Main",
                "minecraftArguments": "--username ${auth_player_name} --version ${version_name}"
            }),
        );

        let mut resolver = VersionResolver::new(tmp.path());
        let tokens = resolver.resolve("1.7.10").unwrap().arguments(&env());

        assert_eq!(&tokens[..5], &LEGACY_JVM_PREAMBLE[..]);
        assert_eq!(tokens[5], MAIN_CLASS_TOKEN);
        assert_eq!(
            &tokens[tokens.len() - 4..],
            &["--username", "${auth_player_name}", "--version", "${version_name}"]
        );
        assert_eq!(tokens.len(), 10);
    }

    #[test]
    fn legacy_resolution_flags_follow_feature() {
        let (jvm, game) = synthesize_legacy_arguments("--demo");
        assert_eq!(jvm.len(), LEGACY_JVM_PREAMBLE.len());

        let mut e = env();
        e.features.has_custom_resolution = true;
        let tokens: Vec<String> = game.iter().flat_map(|a| a.resolve(&e)).collect();
        assert_eq!(
            tokens,
            vec!["--width", "${resolution_width}", "--height", "${resolution_height}", "--demo"]
        );
    }

    #[test]
    fn legacy_child_replaces_parent_arguments() {
        let tmp = tempdir().unwrap();
        write_manifest(
            tmp.path(),
            json!({"id": "1.12.2", "minecraftArguments": "--username ${auth_player_name}"}),
        );
        write_manifest(
            tmp.path(),
            json!({
                "id": "1.12.2-forge",
                "inheritsFrom": "1.12.2",
                "minecraftArguments": "--username ${auth_player_name} --tweakClass net.minecraftforge.fml.common.launcher.FMLTweaker"
            }),
        );

        let mut resolver = VersionResolver::new(tmp.path());
        let tokens = resolver.resolve("1.12.2-forge").unwrap().arguments(&env());
        assert_eq!(tokens.iter().filter(|t| *t == "--username").count(), 1);
        assert!(tokens.contains(&"--tweakClass".to_string()));
    }

    #[test]
    fn cycle_fails_fast() {
        let tmp = tempdir().unwrap();
        write_manifest(tmp.path(), json!({"id": "a", "inheritsFrom": "b"}));
        write_manifest(tmp.path(), json!({"id": "b", "inheritsFrom": "a"}));

        let mut resolver = VersionResolver::new(tmp.path());
        let err = resolver.resolve("a").unwrap_err();
        match err.downcast_ref::<LauncherError>() {
            Some(LauncherError::InheritanceCycle(chain)) => {
                assert_eq!(chain, &vec!["a".to_string(), "b".to_string(), "a".to_string()])
            }
            other => panic!("unexpected error: {:?}", other),
        }
    }

    #[test]
    fn memoized_parent_is_shared() {
        let tmp = tempdir().unwrap();
        write_manifest(tmp.path(), json!({"id": "base", "assets": "legacy"}));
        write_manifest(tmp.path(), json!({"id": "x", "inheritsFrom": "base"}));
        write_manifest(tmp.path(), json!({"id": "y", "inheritsFrom": "base", "assets": " "}));

        let mut resolver = VersionResolver::new(tmp.path());
        let x = resolver.resolve("x").unwrap();
        // once cached, the parent file is no longer needed
        std::fs::remove_dir_all(tmp.path().join("base")).unwrap();
        let y = resolver.resolve("y").unwrap();

        assert!(Arc::ptr_eq(x.inherited.as_ref().unwrap(), y.inherited.as_ref().unwrap()));
        assert_eq!(y.assets_index_name().as_deref(), Some("legacy"));
    }

    #[test]
    fn all_libraries_filters_by_rules() {
        let tmp = tempdir().unwrap();
        write_manifest(
            tmp.path(),
            json!({
                "id": "1.16.5",
                "libraries": [
                    {"name": "a:everywhere:1", "downloads": {"artifact": {"path": "a/everywhere/1/everywhere-1.jar"}}},
                    {"name": "a:mac-only:1", "rules": [{"action": "allow", "os": {"name": "osx"}}]},
                    {"name": "a:natives-only:1", "downloads": {}}
                ]
            }),
        );

        let mut resolver = VersionResolver::new(tmp.path());
        let libs = resolver.all_libraries("1.16.5", &env()).unwrap();
        assert_eq!(libs, vec!["a/everywhere/1/everywhere-1.jar"]);
    }

    #[test]
    fn missing_manifest_names_version() {
        let tmp = tempdir().unwrap();
        let mut resolver = VersionResolver::new(tmp.path());
        let err = resolver.resolve("nope").unwrap_err();
        assert!(err.to_string().contains("nope"));
    }
}
