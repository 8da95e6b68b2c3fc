use std::env;
use std::path::PathBuf;

use serde::Deserialize;
use thiserror::Error;

use termai_context::DEFAULT_MAX_FILE_SIZE;
use termai_types::{ApiKey, Profile, SamplingParams};

const PLACEHOLDER_KEYS: &[&str] = &["your-openai-api-key", "your-abacus-api-key", "your-api-key"];

// bool::default() is false, so only true needs a fn
const fn default_true() -> bool {
    true
}

const fn default_max_file_size() -> u64 {
    DEFAULT_MAX_FILE_SIZE
}

fn default_provider() -> String {
    "openai".to_string()
}

const fn default_temperature() -> f64 {
    0.7
}

const fn default_max_tokens() -> u32 {
    4096
}

#[derive(Debug, Default, Deserialize)]
pub struct TermaiConfig {
    pub default_profile: Option<String>,
    #[serde(default)]
    pub profiles: Vec<ProfileConfig>,
    #[serde(default)]
    pub ui: UiConfig,
    #[serde(default)]
    pub files: FilesConfig,
    /// Prepended as a system message to every new conversation.
    pub system_context: Option<String>,
    pub conversations_dir: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct ProfileConfig {
    pub name: String,
    #[serde(default = "default_provider")]
    pub provider: String,
    pub endpoint: String,
    #[serde(default)]
    pub api_key: String,
    pub model: String,
    #[serde(default = "default_temperature")]
    pub temperature: f64,
    #[serde(default = "default_max_tokens")]
    pub max_tokens: u32,
    pub top_p: Option<f64>,
}

#[derive(Debug, Deserialize)]
pub struct UiConfig {
    /// Render reasoning deltas while a response streams.
    #[serde(default = "default_true")]
    pub show_thinking: bool,
    #[serde(default)]
    pub ascii_only: bool,
    #[serde(default)]
    pub high_contrast: bool,
}

impl Default for UiConfig {
    fn default() -> Self {
        Self {
            show_thinking: true,
            ascii_only: false,
            high_contrast: false,
        }
    }
}

#[derive(Debug, Deserialize)]
pub struct FilesConfig {
    #[serde(default = "default_max_file_size")]
    pub max_file_size: u64,
    /// Drop ephemeral attachments once a message has been answered.
    #[serde(default = "default_true")]
    pub auto_clear_after_send: bool,
}

impl Default for FilesConfig {
    fn default() -> Self {
        Self {
            max_file_size: DEFAULT_MAX_FILE_SIZE,
            auto_clear_after_send: true,
        }
    }
}

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to read config at {}: {source}", path.display())]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("failed to parse config at {}: {source}", path.display())]
    Parse {
        path: PathBuf,
        #[source]
        source: toml::de::Error,
    },
    #[error("profile '{0}' not found")]
    ProfileNotFound(String),
    #[error("no profiles configured; add a [[profiles]] entry to the config file")]
    NoProfiles,
    #[error("profile '{0}' has no API key configured")]
    PlaceholderKey(String),
}

/// Expand `${VAR}` references from the environment. Unset variables become
/// empty; an unclosed `${` is kept literally.
#[must_use]
pub fn expand_env_vars(value: &str) -> String {
    let mut out = String::with_capacity(value.len());
    let mut rest = value;

    while let Some(start) = rest.find("${") {
        out.push_str(&rest[..start]);
        let after = &rest[start + 2..];
        match after.find('}') {
            Some(end) => {
                let var = &after[..end];
                if !var.is_empty() {
                    out.push_str(&env::var(var).unwrap_or_default());
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

impl TermaiConfig {
    /// Load `~/.termai/config.toml`. A missing file is not an error.
    pub fn load() -> Result<Option<Self>, ConfigError> {
        let Some(path) = config_path() else {
            return Ok(None);
        };
        if !path.exists() {
            return Ok(None);
        }

        let content = match std::fs::read_to_string(&path) {
            Ok(content) => content,
            Err(source) => {
                tracing::warn!("Failed to read config at {:?}: {}", path, source);
                return Err(ConfigError::Read { path, source });
            }
        };

        match toml::from_str(&content) {
            Ok(config) => Ok(Some(config)),
            Err(source) => {
                tracing::warn!("Failed to parse config at {:?}: {}", path, source);
                Err(ConfigError::Parse { path, source })
            }
        }
    }

    #[must_use]
    pub fn path() -> Option<PathBuf> {
        config_path()
    }

    /// Resolve a profile by explicit name, then `default_profile`, then the
    /// first configured profile.
    pub fn resolve_profile(&self, name: Option<&str>) -> Result<Profile, ConfigError> {
        let wanted = name.or(self.default_profile.as_deref());
        let entry = match wanted {
            Some(wanted) => self
                .profiles
                .iter()
                .find(|p| p.name == wanted)
                .ok_or_else(|| ConfigError::ProfileNotFound(wanted.to_string()))?,
            None => self.profiles.first().ok_or(ConfigError::NoProfiles)?,
        };
        entry.to_profile()
    }

    /// Directory holding saved transcripts.
    #[must_use]
    pub fn conversations_dir(&self) -> PathBuf {
        self.conversations_dir
            .as_deref()
            .map(|dir| PathBuf::from(expand_env_vars(dir)))
            .or_else(|| termai_dir().map(|dir| dir.join("conversations")))
            .unwrap_or_else(|| PathBuf::from(".termai").join("conversations"))
    }
}

impl ProfileConfig {
    fn to_profile(&self) -> Result<Profile, ConfigError> {
        let api_key = expand_env_vars(&self.api_key);
        let trimmed = api_key.trim();
        if trimmed.is_empty() || PLACEHOLDER_KEYS.contains(&trimmed) {
            return Err(ConfigError::PlaceholderKey(self.name.clone()));
        }

        Ok(Profile {
            name: self.name.clone(),
            provider: self.provider.clone(),
            endpoint: expand_env_vars(&self.endpoint),
            model: self.model.clone(),
            api_key: ApiKey::new(api_key),
            sampling: SamplingParams {
                temperature: self.temperature,
                max_tokens: self.max_tokens,
                top_p: self.top_p,
            },
        })
    }
}

fn termai_dir() -> Option<PathBuf> {
    dirs::home_dir().map(|home| home.join(".termai"))
}

#[must_use]
pub fn config_path() -> Option<PathBuf> {
    termai_dir().map(|dir| dir.join("config.toml"))
}

/// Directory for the log file; `None` when no home directory is known.
#[must_use]
pub fn log_dir() -> Option<PathBuf> {
    termai_dir().map(|dir| dir.join("logs"))
}

#[cfg(test)]
mod tests {
    use super::*;

    const SAMPLE: &str = r#"
default_profile = "local"
system_context = "Answer tersely."

[[profiles]]
name = "openai"
endpoint = "https://api.openai.com/v1"
api_key = "sk-test"
model = "gpt-4o"

[[profiles]]
name = "local"
provider = "ollama"
endpoint = "http://localhost:11434/v1"
api_key = "ollama"
model = "llama3"
temperature = 0.2
max_tokens = 512
top_p = 0.9

[ui]
ascii_only = true

[files]
max_file_size = 1024
"#;

    // expand_env_vars tests

    #[test]
    fn expand_env_vars_no_vars() {
        assert_eq!(expand_env_vars("hello world"), "hello world");
    }

    #[test]
    fn expand_env_vars_single_and_adjacent() {
        unsafe {
            std::env::set_var("TERMAI_TEST_A", "X");
            std::env::set_var("TERMAI_TEST_B", "Y");
        }
        assert_eq!(expand_env_vars("k=${TERMAI_TEST_A}"), "k=X");
        assert_eq!(expand_env_vars("${TERMAI_TEST_A}${TERMAI_TEST_B}"), "XY");
        unsafe {
            std::env::remove_var("TERMAI_TEST_A");
            std::env::remove_var("TERMAI_TEST_B");
        }
    }

    #[test]
    fn expand_env_vars_missing_var_becomes_empty() {
        unsafe {
            std::env::remove_var("TERMAI_TEST_MISSING");
        }
        assert_eq!(expand_env_vars("a ${TERMAI_TEST_MISSING} b"), "a  b");
    }

    #[test]
    fn expand_env_vars_unclosed_brace_preserved() {
        assert_eq!(expand_env_vars("test ${UNCLOSED"), "test ${UNCLOSED");
        assert_eq!(expand_env_vars("test ${} more"), "test  more");
    }

    // parsing and resolution

    #[test]
    fn parse_empty_config_uses_defaults() {
        let config: TermaiConfig = toml::from_str("").unwrap();
        assert!(config.profiles.is_empty());
        assert!(config.ui.show_thinking);
        assert!(config.files.auto_clear_after_send);
        assert_eq!(config.files.max_file_size, DEFAULT_MAX_FILE_SIZE);
    }

    #[test]
    fn parse_sample_config() {
        let config: TermaiConfig = toml::from_str(SAMPLE).unwrap();
        assert_eq!(config.profiles.len(), 2);
        assert_eq!(config.profiles[0].provider, "openai");
        assert!((config.profiles[0].temperature - 0.7).abs() < f64::EPSILON);
        assert!(config.ui.ascii_only);
        assert!(config.ui.show_thinking);
        assert_eq!(config.files.max_file_size, 1024);
        assert_eq!(config.system_context.as_deref(), Some("Answer tersely."));
    }

    #[test]
    fn resolve_prefers_explicit_then_default() {
        let config: TermaiConfig = toml::from_str(SAMPLE).unwrap();

        let explicit = config.resolve_profile(Some("openai")).unwrap();
        assert_eq!(explicit.model, "gpt-4o");

        let default = config.resolve_profile(None).unwrap();
        assert_eq!(default.name, "local");
        assert_eq!(default.sampling.max_tokens, 512);
        assert_eq!(default.sampling.top_p, Some(0.9));
    }

    #[test]
    fn resolve_falls_back_to_first_profile() {
        let mut config: TermaiConfig = toml::from_str(SAMPLE).unwrap();
        config.default_profile = None;
        assert_eq!(config.resolve_profile(None).unwrap().name, "openai");
    }

    #[test]
    fn resolve_errors() {
        let config: TermaiConfig = toml::from_str(SAMPLE).unwrap();
        assert!(matches!(
            config.resolve_profile(Some("nope")),
            Err(ConfigError::ProfileNotFound(name)) if name == "nope"
        ));

        let empty = TermaiConfig::default();
        assert!(matches!(
            empty.resolve_profile(None),
            Err(ConfigError::NoProfiles)
        ));
    }

    #[test]
    fn placeholder_keys_rejected() {
        let toml_str = r#"
[[profiles]]
name = "abacus"
endpoint = "https://routellm.abacus.ai/v1"
api_key = "your-abacus-api-key"
model = "route-llm"
"#;
        let config: TermaiConfig = toml::from_str(toml_str).unwrap();
        assert!(matches!(
            config.resolve_profile(None),
            Err(ConfigError::PlaceholderKey(_))
        ));
    }

    #[test]
    fn api_key_expands_from_environment() {
        unsafe {
            std::env::set_var("TERMAI_TEST_KEY", "sk-from-env");
        }
        let toml_str = r#"
[[profiles]]
name = "env"
endpoint = "https://api.openai.com/v1"
api_key = "${TERMAI_TEST_KEY}"
model = "gpt-4o"
"#;
        let config: TermaiConfig = toml::from_str(toml_str).unwrap();
        let profile = config.resolve_profile(None).unwrap();
        assert_eq!(profile.api_key.expose_secret(), "sk-from-env");
        unsafe {
            std::env::remove_var("TERMAI_TEST_KEY");
        }
    }

    #[test]
    fn explicit_conversations_dir_wins() {
        let config: TermaiConfig = toml::from_str(r#"conversations_dir = "/tmp/convs""#).unwrap();
        assert_eq!(config.conversations_dir(), PathBuf::from("/tmp/convs"));
    }
}
