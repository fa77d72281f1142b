/// Launch argument builder
use crate::auth::Account;
use crate::config::Settings;
use crate::game::installer::types::InstallLayout;
use crate::game::launcher::process::find_java;
use crate::game::launcher::resolver::EffectiveManifest;
use crate::game::launcher::rules::Environment;
use crate::LauncherError;
use anyhow::{anyhow, Result};
use std::collections::HashMap;
use std::path::{Path, PathBuf};

/// Runtime values a launch needs besides the manifest
#[derive(Debug, Clone)]
pub struct LaunchContext {
    pub layout: InstallLayout,
    pub account: Account,
    pub width: u32,
    pub height: u32,
    pub launcher_name: String,
    pub launcher_version: String,
    pub environment: Environment,
}

/// Fully assembled process invocation
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LaunchCommand {
    pub program: PathBuf,
    pub args: Vec<String>,
    pub working_dir: PathBuf,
}

fn path_string(path: &Path) -> String {
    dunce::simplified(path).to_string_lossy().to_string()
}

/// Build the classpath: every allowed library under the shared library
/// root, then the engine's client jar
pub fn build_classpath(effective: &EffectiveManifest, ctx: &LaunchContext) -> Result<String> {
    let libraries = ctx.layout.libraries_dir();
    let mut entries: Vec<String> = effective
        .library_paths(&ctx.environment)?
        .iter()
        .map(|p| path_string(&libraries.join(p)))
        .collect();
    entries.push(path_string(&ctx.layout.version_jar(effective.engine_id())));
    Ok(entries.join(ctx.environment.os.classpath_separator()))
}

/// Placeholder name -> value for one launch
pub fn build_variables(
    effective: &EffectiveManifest,
    ctx: &LaunchContext,
) -> Result<HashMap<&'static str, String>> {
    let main_class = effective
        .main_class
        .clone()
        .ok_or_else(|| LauncherError::missing(format!("version {}", effective.id), "mainClass"))?;
    let assets_index = effective
        .assets_index_name()
        .ok_or_else(|| LauncherError::missing(format!("version {}", effective.id), "assets"))?;
    let account = &ctx.account;
    let layout = &ctx.layout;

    let mut vars = HashMap::new();
    vars.insert("classpath", build_classpath(effective, ctx)?);
    vars.insert("main_class", main_class);
    vars.insert("auth_player_name", account.username.clone());
    vars.insert("version_name", effective.id.clone());
    vars.insert("game_directory", path_string(&layout.install_root));
    vars.insert("assets_root", path_string(&layout.assets_dir()));
    vars.insert("assets_index_name", assets_index);
    vars.insert("auth_uuid", account.uuid.clone());
    vars.insert("user_access_token", account.access_token.clone());
    vars.insert("auth_access_token", account.access_token.clone());
    vars.insert(
        "auth_session",
        format!("token:{}:{}", account.access_token, account.uuid),
    );
    vars.insert("user_type", account.user_type().to_string());
    vars.insert(
        "version_type",
        effective
            .version_type
            .clone()
            .unwrap_or_else(|| "release".to_string()),
    );
    vars.insert("resolution_width", ctx.width.to_string());
    vars.insert("resolution_height", ctx.height.to_string());
    vars.insert("natives_directory", path_string(&layout.natives_dir()));
    vars.insert("launcher_name", ctx.launcher_name.clone());
    vars.insert("launcher_version", ctx.launcher_version.clone());
    vars.insert("library_directory", path_string(&layout.libraries_dir()));
    vars.insert(
        "classpath_separator",
        ctx.environment.os.classpath_separator().to_string(),
    );
    Ok(vars)
}

/// Replace placeholders in one token. A token that is exactly one known
/// placeholder is replaced wholesale; embedded ones are replaced textually.
/// Unknown placeholders are left as they are.
pub fn substitute(token: &str, vars: &HashMap<&'static str, String>) -> String {
    if let Some(name) = token.strip_prefix("${").and_then(|t| t.strip_suffix('}')) {
        if let Some(value) = vars.get(name) {
            return value.clone();
        }
    }

    let mut out = String::with_capacity(token.len());
    let mut rest = token;
    while let Some(start) = rest.find("${") {
        out.push_str(&rest[..start]);
        let after = &rest[start + 2..];
        match after.find('}') {
            Some(end) => {
                let name = &after[..end];
                match vars.get(name) {
                    Some(value) => out.push_str(value),
                    None => {
                        out.push_str("${");
                        out.push_str(name);
                        out.push('}');
                    }
                }
                rest = &after[end + 1..];
            }
            None => {
                out.push_str(&rest[start..]);
                rest = "";
            }
        }
    }
    out.push_str(rest);
    out
}

/// Ordered, substituted token list for `effective`
pub fn build_arguments(effective: &EffectiveManifest, ctx: &LaunchContext) -> Result<Vec<String>> {
    let vars = build_variables(effective, ctx)?;
    let tokens = effective.arguments(&ctx.environment);
    log::debug!("Substituting {} launch tokens for {}", tokens.len(), effective.id);
    Ok(tokens.iter().map(|t| substitute(t, &vars)).collect())
}

/// Prefix the built tokens with the java executable and memory/JVM settings
pub fn build_launch_command(
    settings: &Settings,
    tokens: Vec<String>,
    ctx: &LaunchContext,
) -> Result<LaunchCommand> {
    let java = &settings.java;
    let mut args = vec![
        format!("-Xms{}", java.min_memory),
        format!("-Xmx{}", java.max_memory),
    ];
    if !java.options.trim().is_empty() {
        let extra = shlex::split(&java.options)
            .ok_or_else(|| anyhow!("Invalid JVM options: {}", java.options))?;
        args.extend(extra);
    }
    args.extend(tokens);

    Ok(LaunchCommand {
        program: find_java(java.java_home.as_deref().map(Path::new)),
        args,
        working_dir: ctx.layout.install_root.clone(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::game::launcher::rules::{FeatureSet, OsDescriptor};
    use crate::game::launcher::version_parser::{Argument, Library};

    fn context() -> LaunchContext {
        LaunchContext {
            layout: InstallLayout::new("/data", "pack"),
            account: Account {
                id: "user".into(),
                uuid: "uuid-1".into(),
                email: "steve@example.org".into(),
                username: "Steve".into(),
                access_token: "secret".into(),
            },
            width: 1280,
            height: 720,
            launcher_name: "mcz".into(),
            launcher_version: "0.3.0".into(),
            environment: Environment::new(
                OsDescriptor::new("linux", "6.1", "x86_64"),
                FeatureSet::default(),
            ),
        }
    }

    fn manifest() -> EffectiveManifest {
        EffectiveManifest {
            id: "1.16.5-forge".into(),
            chain: vec!["1.16.5-forge".into(), "1.16.5".into()],
            main_class: Some("cpw.mods.modlauncher.Launcher".into()),
            jvm: vec![
                Argument::literal("-Djava.library.path=${natives_directory}"),
                Argument::literal("-cp"),
                Argument::literal("${classpath}"),
            ],
            game: vec![
                Argument::literal("--username"),
                Argument::literal("${auth_player_name}"),
                Argument::literal("--assetIndex"),
                Argument::literal("${assets_index_name}"),
                Argument::literal("--userType"),
                Argument::literal("${user_type}"),
                Argument::literal("${quickPlayPath}"),
            ],
            libraries: vec![Library {
                name: "org.ow2.asm:asm:9.1".into(),
                ..Default::default()
            }],
            assets: Some("1.16".into()),
            ..Default::default()
        }
    }

    #[test]
    fn substitutes_whole_and_embedded_tokens() {
        let mut vars = HashMap::new();
        vars.insert("a", "1".to_string());
        vars.insert("b", "two".to_string());
        assert_eq!(substitute("${a}", &vars), "1");
        assert_eq!(substitute("x=${a}:${b}", &vars), "x=1:two");
        assert_eq!(substitute("${unknown}", &vars), "${unknown}");
        assert_eq!(substitute("pre${unknown}${a}", &vars), "pre${unknown}1");
        assert_eq!(substitute("broken ${a", &vars), "broken ${a");
    }

    #[test]
    fn builds_ordered_arguments() {
        let ctx = context();
        let args = build_arguments(&manifest(), &ctx).unwrap();

        assert_eq!(args[0], "-Djava.library.path=/data/libraries/natives");
        assert_eq!(args[1], "-cp");
        assert_eq!(
            args[2],
            "/data/libraries/org/ow2/asm/asm/9.1/asm-9.1.jar:/data/versions/1.16.5/1.16.5.jar"
        );
        assert_eq!(args[3], "cpw.mods.modlauncher.Launcher");
        assert_eq!(
            &args[4..],
            &[
                "--username",
                "Steve",
                "--assetIndex",
                "1.16",
                "--userType",
                "mojang",
                "${quickPlayPath}"
            ]
        );
    }

    #[test]
    fn missing_main_class_is_reported() {
        let mut m = manifest();
        m.main_class = None;
        let err = build_arguments(&m, &context()).unwrap_err();
        assert!(matches!(
            err.downcast_ref::<LauncherError>(),
            Some(LauncherError::MissingField { .. })
        ));
    }

    #[test]
    fn launch_command_prefixes_jvm_settings() {
        let ctx = context();
        let mut settings = Settings::default();
        settings.java.java_home = Some("/opt/jdk".into());
        settings.java.options = r#"-XX:+UseG1GC "-Dfoo=a b""#.into();

        let cmd = build_launch_command(&settings, vec!["Main".into()], &ctx).unwrap();
        assert!(cmd.program.starts_with("/opt/jdk/bin"));
        assert_eq!(
            cmd.args,
            vec!["-Xms512M", "-Xmx2G", "-XX:+UseG1GC", "-Dfoo=a b", "Main"]
        );
        assert_eq!(cmd.working_dir, PathBuf::from("/data/pack"));

        settings.java.options = "\"unterminated".into();
        assert!(build_launch_command(&settings, Vec::new(), &ctx).is_err());
    }
}
