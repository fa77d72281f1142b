//! Platform and feature rule evaluation.
//!
//! The environment is detected once and passed explicitly to every caller
//! that filters libraries or argument tokens.

use crate::game::launcher::version_parser::{OsRule, Rule, RuleAction};

/// Operating system descriptor matched against `os` rule clauses.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OsDescriptor {
    /// Rule name of the OS: "windows", "osx" or "linux".
    pub name: String,
    pub version: String,
    pub arch: String,
}

impl OsDescriptor {
    pub fn new(name: impl Into<String>, version: impl Into<String>, arch: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            version: version.into(),
            arch: arch.into(),
        }
    }

    /// Detect the host OS
    pub fn current() -> Self {
        let version = sysinfo::System::os_version().unwrap_or_default();
        Self::new(current_os_name(), version, current_arch())
    }

    /// Bitness substituted for `${arch}` in native classifiers
    pub fn arch_bits(&self) -> &'static str {
        match self.arch.as_str() {
            "x86" | "arm" | "arm32" => "32",
            _ => "64",
        }
    }

    pub fn classpath_separator(&self) -> &'static str {
        if self.name == "windows" {
            ";"
        } else {
            ":"
        }
    }
}

fn current_os_name() -> &'static str {
    if cfg!(target_os = "windows") {
        "windows"
    } else if cfg!(target_os = "macos") {
        "osx"
    } else {
        "linux"
    }
}

fn current_arch() -> &'static str {
    match std::env::consts::ARCH {
        "x86" => "x86",
        "aarch64" => "arm64",
        "arm" => "arm32",
        other => other,
    }
}

/// Launcher capabilities referenced by `features` rule clauses.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct FeatureSet {
    pub is_demo_user: bool,
    pub has_custom_resolution: bool,
}

impl FeatureSet {
    /// Unknown feature names are treated as disabled.
    pub fn get(&self, name: &str) -> bool {
        match name {
            "is_demo_user" => self.is_demo_user,
            "has_custom_resolution" => self.has_custom_resolution,
            _ => false,
        }
    }
}

/// Immutable view of the host used for all rule decisions.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Environment {
    pub os: OsDescriptor,
    pub features: FeatureSet,
}

impl Environment {
    pub fn new(os: OsDescriptor, features: FeatureSet) -> Self {
        Self { os, features }
    }

    pub fn current(features: FeatureSet) -> Self {
        Self::new(OsDescriptor::current(), features)
    }
}

/// Evaluate a rule list against the environment.
///
/// An empty or absent list allows. Otherwise every rule must agree: a rule
/// that matches votes for its own action, a rule that does not match votes
/// for the opposite one. For the `[allow, disallow <os>]` shape used by real
/// manifests this is the same as "the last matching rule wins".
pub fn is_allowed(rules: Option<&[Rule]>, env: &Environment) -> bool {
    let rules = match rules {
        Some(r) if !r.is_empty() => r,
        _ => return true,
    };

    rules.iter().all(|rule| {
        let allow = rule.action == RuleAction::Allow;
        if rule_matches(rule, env) {
            allow
        } else {
            !allow
        }
    })
}

/// A rule matches when every field it specifies equals the environment.
pub fn rule_matches(rule: &Rule, env: &Environment) -> bool {
    if let Some(os) = &rule.os {
        if !os_matches(os, &env.os) {
            return false;
        }
    }

    if let Some(features) = &rule.features {
        for (name, expected) in features {
            if env.features.get(name) != *expected {
                return false;
            }
        }
    }

    true
}

fn os_matches(rule: &OsRule, os: &OsDescriptor) -> bool {
    let field = |want: &Option<String>, have: &str| want.as_deref().map_or(true, |w| w == have);
    field(&rule.name, &os.name) && field(&rule.version, &os.version) && field(&rule.arch, &os.arch)
}
