//! Brand and endpoint configuration.
//!
//! Every endpoint URL and API key the pipeline touches comes from a
//! [`BrandProfile`] so nothing is hardcoded at the call sites. Profiles are
//! resolved with the following priority:
//!
//! 1. Environment variables (`MOTORLINK_*`)
//! 2. Config file (`~/.config/motorlink/config.toml`)
//! 3. Built-in brand profile table

use serde::Deserialize;
use std::collections::HashMap;
use std::fs;
use std::path::PathBuf;
use std::time::Duration;

/// Default per-call HTTP timeout. No retries are performed on top of it.
pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(15);

/// Everything needed to talk to one brand's cloud: identity-provider
/// endpoints, the federated credential broker, the data API, and the two
/// API keys the provider expects.
#[derive(Debug, Clone, PartialEq)]
pub struct BrandProfile {
    /// Identity provider base URL (bootstrap, login, token issuance).
    pub login_url: String,
    /// Federated-exchange endpoint (identity token -> federation token).
    pub token_url: String,
    /// Data API base URL (vehicle listing and status).
    pub api_url: String,
    /// Credential broker endpoint for deriving short-lived credentials.
    pub credential_url: String,
    /// API key for the identity provider endpoints.
    pub login_api_key: String,
    /// API key attached to data API and federated-exchange calls.
    pub api_key: String,
    /// Signing region for derived credentials.
    pub region: String,
    /// Locale sent with every data API call.
    pub locale: String,
}

/// Per-client HTTP options.
#[derive(Debug, Clone)]
pub struct ClientOptions {
    /// Fixed per-call timeout applied to every outgoing request.
    pub timeout: Duration,
}

impl Default for ClientOptions {
    fn default() -> Self {
        Self {
            timeout: DEFAULT_TIMEOUT,
        }
    }
}

/// Where a resolved profile came from.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum ConfigSource {
    /// Built-in brand profile table.
    Builtin,
    /// Overridden (fully or partially) by the config file.
    ConfigFile,
    /// Overridden (fully or partially) by environment variables.
    Environment,
}

impl std::fmt::Display for ConfigSource {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ConfigSource::Builtin => write!(f, "built-in"),
            ConfigSource::ConfigFile => write!(f, "config file"),
            ConfigSource::Environment => write!(f, "environment variable"),
        }
    }
}

/// Config file structure: named profiles, each a partial override.
#[derive(Debug, Deserialize, Default)]
struct ConfigFile {
    #[serde(default)]
    profiles: HashMap<String, ProfileOverride>,
}

/// A partial profile as written in the config file. Missing fields fall
/// back to the built-in profile of the same name.
#[derive(Debug, Deserialize, Default, Clone)]
struct ProfileOverride {
    login_url: Option<String>,
    token_url: Option<String>,
    api_url: Option<String>,
    credential_url: Option<String>,
    login_api_key: Option<String>,
    api_key: Option<String>,
    region: Option<String>,
    locale: Option<String>,
}

impl BrandProfile {
    /// Look up a built-in brand profile by name.
    ///
    /// The table carries the publicly shipped client constants for each
    /// supported brand/region; any field can be overridden via the config
    /// file or environment.
    pub fn builtin(name: &str) -> Option<BrandProfile> {
        match name {
            "jeep-eu" => Some(BrandProfile {
                login_url: "https://login.jeep.com".to_string(),
                token_url: "https://authz.sdpr-01.fcagcv.com/v2/cognito/identity/token"
                    .to_string(),
                api_url: "https://channels.sdpr-01.fcagcv.com".to_string(),
                credential_url: "https://cognito-identity.eu-west-1.amazonaws.com/".to_string(),
                login_api_key:
                    "3_ZvJpoiZQ4jT5ACwouBG5D1seGEntHGhlL0JYlZNtj95yERzqpH4fFyIewVMmmK7j"
                        .to_string(),
                api_key: "2wGyL6PHec9o1UeLPYpoYa1SkEWqeBur9bLsi24i".to_string(),
                region: "eu-west-1".to_string(),
                locale: "de_de".to_string(),
            }),
            "fiat-eu" => Some(BrandProfile {
                login_url: "https://loginmyuconnect.fiat.com".to_string(),
                ..BrandProfile::builtin("jeep-eu")?
            }),
            _ => None,
        }
    }

    fn apply(&mut self, over: &ProfileOverride) -> bool {
        let mut touched = false;
        let mut set = |target: &mut String, value: &Option<String>| {
            if let Some(v) = value {
                let v = v.trim().trim_end_matches('/');
                if !v.is_empty() {
                    *target = v.to_string();
                    touched = true;
                }
            }
        };
        set(&mut self.login_url, &over.login_url);
        set(&mut self.token_url, &over.token_url);
        set(&mut self.api_url, &over.api_url);
        set(&mut self.credential_url, &over.credential_url);
        set(&mut self.login_api_key, &over.login_api_key);
        set(&mut self.api_key, &over.api_key);
        set(&mut self.region, &over.region);
        set(&mut self.locale, &over.locale);
        touched
    }
}

/// Get the path to the configuration file.
fn config_file_path() -> Option<PathBuf> {
    dirs::config_dir()
        .or_else(|| dirs::home_dir().map(|h| h.join(".config")))
        .map(|p| p.join("motorlink").join("config.toml"))
}

/// Load the config file, logging (not failing) on parse errors.
fn load_config_file() -> Option<ConfigFile> {
    let path = config_file_path()?;

    if !path.exists() {
        return None;
    }

    match fs::read_to_string(&path) {
        Ok(content) => match toml::from_str(&content) {
            Ok(config) => {
                tracing::debug!("Loaded config from {:?}", path);
                Some(config)
            }
            Err(e) => {
                tracing::warn!("Failed to parse config file {:?}: {}", path, e);
                None
            }
        },
        Err(e) => {
            tracing::warn!("Failed to read config file {:?}: {}", path, e);
            None
        }
    }
}

fn env_override() -> ProfileOverride {
    let var = |name: &str| std::env::var(name).ok().filter(|v| !v.trim().is_empty());
    ProfileOverride {
        login_url: var("MOTORLINK_LOGIN_URL"),
        token_url: var("MOTORLINK_TOKEN_URL"),
        api_url: var("MOTORLINK_API_URL"),
        credential_url: var("MOTORLINK_CREDENTIAL_URL"),
        login_api_key: var("MOTORLINK_LOGIN_API_KEY"),
        api_key: var("MOTORLINK_API_KEY"),
        region: var("MOTORLINK_REGION"),
        locale: var("MOTORLINK_LOCALE"),
    }
}

/// Resolve a brand profile by name with priority:
/// environment variables > config file > built-in table.
///
/// Returns `None` when the name is neither built-in nor fully specified in
/// the config file.
pub fn load_profile(name: &str) -> Option<(BrandProfile, ConfigSource)> {
    let mut profile = BrandProfile::builtin(name).unwrap_or_else(|| BrandProfile {
        login_url: String::new(),
        token_url: String::new(),
        api_url: String::new(),
        credential_url: String::new(),
        login_api_key: String::new(),
        api_key: String::new(),
        region: String::new(),
        locale: String::new(),
    });
    let mut source = if BrandProfile::builtin(name).is_some() {
        Some(ConfigSource::Builtin)
    } else {
        None
    };

    if let Some(config) = load_config_file() {
        if let Some(over) = config.profiles.get(name) {
            if profile.apply(over) {
                source = Some(ConfigSource::ConfigFile);
            }
        }
    }

    if profile.apply(&env_override()) {
        source = Some(ConfigSource::Environment);
    }

    let complete = !profile.login_url.is_empty()
        && !profile.token_url.is_empty()
        && !profile.api_url.is_empty()
        && !profile.credential_url.is_empty()
        && !profile.login_api_key.is_empty()
        && !profile.api_key.is_empty()
        && !profile.region.is_empty();

    if !complete {
        tracing::warn!("Profile '{}' is incomplete after applying overrides", name);
        return None;
    }

    source.map(|s| (profile, s))
}

/// Get the config file path as a display string (for the `config` command).
pub fn config_file_path_string() -> String {
    config_file_path()
        .map(|p| p.display().to_string())
        .unwrap_or_else(|| "~/.config/motorlink/config.toml".to_string())
}

/// Generate example config file content.
pub fn generate_example_config() -> String {
    r#"# Motorlink configuration
# Place this file at: ~/.config/motorlink/config.toml
#
# Each [profiles.<name>] section partially overrides the built-in profile
# of the same name, or defines a new profile when all fields are present.

[profiles.jeep-eu]
# locale = "en_gb"
# api_url = "https://channels.sdpr-01.fcagcv.com"

# [profiles.my-brand]
# login_url = "https://login.example.com"
# token_url = "https://authz.example.com/v2/cognito/identity/token"
# api_url = "https://channels.example.com"
# credential_url = "https://cognito-identity.eu-west-1.amazonaws.com/"
# login_api_key = "..."
# api_key = "..."
# region = "eu-west-1"
# locale = "en_gb"
"#
    .to_string()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn builtin_profile_table_has_jeep_eu() {
        let profile = BrandProfile::builtin("jeep-eu").unwrap();
        assert_eq!(profile.region, "eu-west-1");
        assert!(profile.login_url.starts_with("https://"));
        assert!(!profile.api_key.is_empty());
    }

    #[test]
    fn unknown_builtin_is_none() {
        assert!(BrandProfile::builtin("edsel-us").is_none());
    }

    #[test]
    fn override_replaces_only_present_fields() {
        let mut profile = BrandProfile::builtin("jeep-eu").unwrap();
        let before = profile.clone();
        let touched = profile.apply(&ProfileOverride {
            locale: Some("en_gb".to_string()),
            api_url: Some("https://mirror.example.com/".to_string()),
            ..ProfileOverride::default()
        });
        assert!(touched);
        assert_eq!(profile.locale, "en_gb");
        // Trailing slashes are trimmed off base URLs.
        assert_eq!(profile.api_url, "https://mirror.example.com");
        assert_eq!(profile.login_url, before.login_url);
        assert_eq!(profile.api_key, before.api_key);
    }

    #[test]
    fn blank_override_values_are_ignored() {
        let mut profile = BrandProfile::builtin("jeep-eu").unwrap();
        let touched = profile.apply(&ProfileOverride {
            locale: Some("   ".to_string()),
            ..ProfileOverride::default()
        });
        assert!(!touched);
        assert_eq!(profile.locale, "de_de");
    }

    #[test]
    fn example_config_parses() {
        let parsed: ConfigFile = toml::from_str(&generate_example_config()).unwrap();
        assert!(parsed.profiles.contains_key("jeep-eu"));
    }
}
