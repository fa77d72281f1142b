//! Launcher definition and user settings, persisted as small JSON documents.

use crate::auth::Account;
use anyhow::{Context, Result};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use std::path::Path;

/// Read and parse a JSON document
pub async fn read_json_document<T: DeserializeOwned>(path: &Path) -> Result<T> {
    let data = tokio::fs::read_to_string(path)
        .await
        .with_context(|| format!("Failed to read {:?}", path))?;
    serde_json::from_str(&data).with_context(|| format!("Failed to parse {:?}", path))
}

/// Write `value` as pretty JSON, creating parent directories
pub async fn write_json_document<T: Serialize + ?Sized>(path: &Path, value: &T) -> Result<()> {
    if let Some(parent) = path.parent() {
        tokio::fs::create_dir_all(parent)
            .await
            .with_context(|| format!("Failed to create {:?}", parent))?;
    }
    let data = serde_json::to_string_pretty(value).context("Failed to serialize document")?;
    tokio::fs::write(path, data)
        .await
        .with_context(|| format!("Failed to write {:?}", path))
}

/// Which modpack a launcher build points at
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LauncherConfig {
    pub id: String,
    /// Display name, falls back to `id`
    #[serde(default)]
    pub name: String,
    /// URL of the modpack manifest (`http(s)://` or `file://`)
    pub definition: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub news: Option<String>,
}

impl LauncherConfig {
    pub async fn load(path: &Path) -> Result<Self> {
        let mut config: LauncherConfig = read_json_document(path).await?;
        if config.name.is_empty() {
            config.name = config.id.clone();
        }
        Ok(config)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Settings {
    pub client_token: String,
    #[serde(default)]
    pub accounts: Vec<Account>,
    /// Account id of the active account
    #[serde(default)]
    pub selected_account: Option<String>,
    #[serde(default)]
    pub minecraft: MinecraftSettings,
    #[serde(default)]
    pub java: JavaSettings,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            client_token: uuid::Uuid::new_v4().to_string(),
            accounts: Vec::new(),
            selected_account: None,
            minecraft: MinecraftSettings::default(),
            java: JavaSettings::default(),
        }
    }
}

impl Settings {
    /// Load settings, or create and persist defaults when the file is absent
    pub async fn load_or_default(path: &Path) -> Result<Self> {
        if tokio::fs::try_exists(path).await.unwrap_or(false) {
            return read_json_document(path).await;
        }
        log::info!("No settings at {:?}, writing defaults", path);
        let settings = Settings::default();
        settings.save(path).await?;
        Ok(settings)
    }

    pub async fn save(&self, path: &Path) -> Result<()> {
        write_json_document(path, self).await
    }

    pub fn selected_account(&self) -> Option<&Account> {
        let id = self.selected_account.as_deref()?;
        self.accounts.iter().find(|a| a.id == id)
    }

    /// Insert or replace an account (matched by id) and select it
    pub fn upsert_account(&mut self, account: Account) {
        self.selected_account = Some(account.id.clone());
        match self.accounts.iter_mut().find(|a| a.id == account.id) {
            Some(existing) => *existing = account,
            None => self.accounts.push(account),
        }
    }

    pub fn remove_account(&mut self, id: &str) -> Option<Account> {
        let idx = self.accounts.iter().position(|a| a.id == id)?;
        if self.selected_account.as_deref() == Some(id) {
            self.selected_account = None;
        }
        Some(self.accounts.remove(idx))
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MinecraftSettings {
    pub width: u32,
    pub height: u32,
}

impl Default for MinecraftSettings {
    fn default() -> Self {
        Self {
            width: 854,
            height: 480,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct JavaSettings {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub java_home: Option<String>,
    pub min_memory: String,
    pub max_memory: String,
    /// Extra JVM options, shell quoted
    #[serde(default)]
    pub options: String,
}

impl Default for JavaSettings {
    fn default() -> Self {
        Self {
            java_home: None,
            min_memory: "512M".to_string(),
            max_memory: "2G".to_string(),
            options: String::new(),
        }
    }
}
