//! Identity service authentication
//!
//! Yggdrasil-style username/password login plus token validation and
//! refresh. The launch path only ever borrows an [`Account`] snapshot.

pub mod yggdrasil;

pub use yggdrasil::YggdrasilClient;

use serde::{Deserialize, Serialize};

/// Authenticated user
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Account {
    /// Account (user) id
    pub id: String,
    /// Player profile uuid
    pub uuid: String,
    /// Login identifier: an e-mail for migrated accounts, a name for legacy ones
    pub email: String,
    /// Player display name
    pub username: String,
    pub access_token: String,
}

impl Account {
    /// Value for `${user_type}`
    pub fn user_type(&self) -> &'static str {
        if self.email.contains('@') {
            "mojang"
        } else {
            "legacy"
        }
    }
}
