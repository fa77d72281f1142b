//! Upstream locations and request settings used by the installer.

pub const REQUEST_TIMEOUT_SECS: u64 = 120;

// URL Constants
pub const VANILLA_MANIFEST_URL: &str =
    "https://piston-meta.mojang.com/mc/game/version_manifest_v2.json";
pub const RESOURCES_URL: &str = "https://resources.download.minecraft.net/";
pub const LIBRARIES_URL: &str = "https://libraries.minecraft.net/";
pub const FORGE_MAVEN_URL: &str = "https://maven.minecraftforge.net/";
pub const FORGE_WRAPPER_BASE_URL: &str = "https://github.com/mcz0ne";
pub const SERVERSYNC_RELEASE_URL: &str =
    "https://api.github.com/repos/superzanti/ServerSync/releases/latest";
pub const AUTH_SERVER_URL: &str = "https://authserver.mojang.com/";

pub fn request_timeout() -> std::time::Duration {
    std::time::Duration::from_secs(REQUEST_TIMEOUT_SECS)
}

/// Base URLs of every upstream service the pipeline talks to
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Endpoints {
    pub version_manifest: String,
    pub resources: String,
    pub libraries: String,
    pub forge_maven: String,
    pub forge_wrapper_base: String,
    pub serversync_release: String,
}

impl Default for Endpoints {
    fn default() -> Self {
        Self {
            version_manifest: VANILLA_MANIFEST_URL.to_string(),
            resources: RESOURCES_URL.to_string(),
            libraries: LIBRARIES_URL.to_string(),
            forge_maven: FORGE_MAVEN_URL.to_string(),
            forge_wrapper_base: FORGE_WRAPPER_BASE_URL.to_string(),
            serversync_release: SERVERSYNC_RELEASE_URL.to_string(),
        }
    }
}

impl Endpoints {
    /// Point every service at one base URL (used against mock servers)
    pub fn with_base(base: &str) -> Self {
        let base = base.trim_end_matches('/');
        Self {
            version_manifest: format!("{}/mc/game/version_manifest_v2.json", base),
            resources: format!("{}/resources/", base),
            libraries: format!("{}/libraries/", base),
            forge_maven: format!("{}/maven/", base),
            forge_wrapper_base: base.to_string(),
            serversync_release: format!("{}/repos/superzanti/ServerSync/releases/latest", base),
        }
    }

    pub fn asset_url(&self, object_path: &str) -> String {
        crate::game::launcher::version_parser::join_url(&self.resources, object_path)
    }

    pub fn forge_installer_url(&self, forge_version: &str) -> String {
        format!(
            "{}/net/minecraftforge/forge/{v}/forge-{v}-installer.jar",
            self.forge_maven.trim_end_matches('/'),
            v = forge_version
        )
    }

    /// Release download of installer wrapper `generation` (1 or 2)
    pub fn forge_wrapper_url(&self, generation: u8) -> String {
        format!(
            "{}/forge{n}installer/releases/latest/download/forge{n}.jar",
            self.forge_wrapper_base.trim_end_matches('/'),
            n = generation
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_urls() {
        let e = Endpoints::default();
        assert_eq!(
            e.forge_installer_url("1.16.5-36.2.0"),
            "https://maven.minecraftforge.net/net/minecraftforge/forge/1.16.5-36.2.0/forge-1.16.5-36.2.0-installer.jar"
        );
        assert_eq!(
            e.forge_wrapper_url(2),
            "https://github.com/mcz0ne/forge2installer/releases/latest/download/forge2.jar"
        );
        assert_eq!(
            e.asset_url("ab/abcdef"),
            "https://resources.download.minecraft.net/ab/abcdef"
        );
    }
}
