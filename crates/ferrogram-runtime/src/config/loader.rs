//! Layered configuration loading with figment.
//!
//! Sources, lowest priority first:
//!
//! 1. Built-in defaults
//! 2. Programmatic overrides ([`ConfigLoader::merge`])
//! 3. `ferrogram.{profile}.{ext}`, when it sits next to the main file
//! 4. The main file: the first of `ferrogram.{ext}` or `config.{ext}` found
//!    in the search directories
//! 5. `FERROGRAM_*` environment variables
//!
//! `{ext}` is `toml` with the `toml-config` feature (default) and `yaml` or
//! `yml` with `yaml-config`. An explicit [`ConfigLoader::file`] replaces
//! steps 3 and 4.
//!
//! Environment variables separate nested keys with `__`:
//!
//! ```text
//! FERROGRAM_BOT__TOKEN=123:abc         bot.token = "123:abc"
//! FERROGRAM_CACHE__USERS=unbounded     cache.users = "unbounded"
//! FERROGRAM_WEBHOOK__ENABLED=true      webhook.enabled = true
//! ```
//!
//! ```rust,ignore
//! use ferrogram_runtime::config::ConfigLoader;
//!
//! let config = ConfigLoader::new()
//!     .profile("prod")
//!     .search_path("/etc/ferrogram")
//!     .load()?;
//! ```

use std::fmt;
use std::path::{Path, PathBuf};

use figment::Figment;
#[cfg(any(feature = "toml-config", feature = "yaml-config"))]
use figment::providers::Format;
use figment::providers::{Env, Serialized};
use tracing::{debug, info, warn};

use super::error::{ConfigError, ConfigResult};
use super::schema::FerrogramConfig;

/// Environment variable prefix.
pub const ENV_PREFIX: &str = "FERROGRAM_";

/// Environment variable selecting the profile.
pub const PROFILE_ENV: &str = "FERROGRAM_PROFILE";

/// File stems searched in each directory, in order.
const BASE_NAMES: &[&str] = &["ferrogram", "config"];

// =============================================================================
// Profile
// =============================================================================

/// Name of the profile-specific file to layer under the main file.
///
/// `prod` and `dev` are accepted for `production` and `development`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Profile(String);

impl Profile {
    pub fn new(name: &str) -> Self {
        let name = name.trim().to_lowercase();
        match name.as_str() {
            "" | "dev" => Self::default(),
            "prod" => Self("production".into()),
            _ => Self(name),
        }
    }

    /// Reads [`PROFILE_ENV`], defaulting to `development`.
    pub fn from_env() -> Self {
        std::env::var(PROFILE_ENV)
            .map(|name| Self::new(&name))
            .unwrap_or_default()
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    pub fn is_production(&self) -> bool {
        self.0 == "production"
    }
}

impl Default for Profile {
    fn default() -> Self {
        Self("development".into())
    }
}

impl fmt::Display for Profile {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

// =============================================================================
// File formats
// =============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum FileFormat {
    #[cfg(feature = "toml-config")]
    Toml,
    #[cfg(feature = "yaml-config")]
    Yaml,
}

/// Enabled formats, in search order.
const FORMATS: &[FileFormat] = &[
    #[cfg(feature = "toml-config")]
    FileFormat::Toml,
    #[cfg(feature = "yaml-config")]
    FileFormat::Yaml,
];

impl FileFormat {
    fn extensions(self) -> &'static [&'static str] {
        match self {
            #[cfg(feature = "toml-config")]
            Self::Toml => &["toml"],
            #[cfg(feature = "yaml-config")]
            Self::Yaml => &["yaml", "yml"],
        }
    }

    fn of(path: &Path) -> Option<Self> {
        let ext = path.extension()?.to_str()?;
        FORMATS
            .iter()
            .copied()
            .find(|format| format.extensions().contains(&ext))
    }

    #[cfg_attr(
        not(any(feature = "toml-config", feature = "yaml-config")),
        allow(unused_variables)
    )]
    fn merge_into(self, figment: Figment, path: &Path) -> Figment {
        match self {
            #[cfg(feature = "toml-config")]
            Self::Toml => figment.merge(figment::providers::Toml::file(path)),
            #[cfg(feature = "yaml-config")]
            Self::Yaml => figment.merge(figment::providers::Yaml::file(path)),
        }
    }
}

// =============================================================================
// ConfigLoader
// =============================================================================

/// Builder collecting the sources of a [`FerrogramConfig`].
pub struct ConfigLoader {
    overrides: Figment,
    profile: Profile,
    search_paths: Vec<PathBuf>,
    file: Option<PathBuf>,
    env: bool,
}

impl Default for ConfigLoader {
    fn default() -> Self {
        Self::new()
    }
}

impl ConfigLoader {
    /// Reads the profile from [`PROFILE_ENV`] and includes the environment.
    pub fn new() -> Self {
        Self {
            overrides: Figment::new(),
            profile: Profile::from_env(),
            search_paths: Vec::new(),
            file: None,
            env: true,
        }
    }

    pub fn profile(mut self, profile: impl AsRef<str>) -> Self {
        self.profile = Profile::new(profile.as_ref());
        self
    }

    /// Adds a directory to search. Without any, the current directory and
    /// `<user config dir>/ferrogram` are searched.
    pub fn search_path<P: AsRef<Path>>(mut self, path: P) -> Self {
        self.search_paths.push(path.as_ref().to_path_buf());
        self
    }

    pub fn with_current_dir(self) -> Self {
        match std::env::current_dir() {
            Ok(cwd) => self.search_path(cwd),
            Err(_) => self,
        }
    }

    pub fn with_user_config_dir(self) -> Self {
        match dirs::config_dir() {
            Some(dir) => self.search_path(dir.join("ferrogram")),
            None => self,
        }
    }

    /// Loads exactly this file instead of searching. It must exist.
    pub fn file<P: AsRef<Path>>(mut self, path: P) -> Self {
        self.file = Some(path.as_ref().to_path_buf());
        self
    }

    pub fn with_env(mut self) -> Self {
        self.env = true;
        self
    }

    pub fn without_env(mut self) -> Self {
        self.env = false;
        self
    }

    /// Layers `config` above the built-in defaults and below every file.
    pub fn merge(mut self, config: FerrogramConfig) -> Self {
        self.overrides = self.overrides.merge(Serialized::defaults(config));
        self
    }

    fn search_dirs(&self) -> Vec<PathBuf> {
        if !self.search_paths.is_empty() {
            return self.search_paths.clone();
        }
        std::env::current_dir()
            .ok()
            .into_iter()
            .chain(dirs::config_dir().map(|dir| dir.join("ferrogram")))
            .collect()
    }

    /// The files [`load`](Self::load) reads, lowest priority first.
    pub fn files(&self) -> ConfigResult<Vec<PathBuf>> {
        if let Some(path) = &self.file {
            if !path.is_file() {
                return Err(ConfigError::FileNotFound(path.clone()));
            }
            if FileFormat::of(path).is_none() {
                return Err(ConfigError::UnsupportedFormat(path.clone()));
            }
            return Ok(vec![path.clone()]);
        }

        for dir in self.search_dirs() {
            for base in BASE_NAMES {
                for ext in FORMATS.iter().flat_map(|format| format.extensions()) {
                    let main = dir.join(format!("{base}.{ext}"));
                    if !main.is_file() {
                        continue;
                    }

                    let profiled = dir.join(format!("{base}.{}.{ext}", self.profile));
                    return Ok(if profiled.is_file() {
                        vec![profiled, main]
                    } else {
                        vec![main]
                    });
                }
            }
        }
        Ok(Vec::new())
    }

    /// The merged sources, before extraction.
    ///
    /// Useful for pulling application sections the schema does not know
    /// about, e.g. `loader.figment()?.extract_inner::<MySettings>("my_bot")`.
    pub fn figment(&self) -> ConfigResult<Figment> {
        let mut figment = Figment::from(Serialized::defaults(FerrogramConfig::default()))
            .merge(self.overrides.clone());

        let files = self.files()?;
        if files.is_empty() {
            warn!(dirs = ?self.search_dirs(), "No configuration file found, using defaults");
        }
        for path in &files {
            if let Some(format) = FileFormat::of(path) {
                info!(path = %path.display(), "Loading configuration file");
                figment = format.merge_into(figment, path);
            }
        }

        if self.env {
            figment = figment.merge(Env::prefixed(ENV_PREFIX).split("__"));
        }
        Ok(figment)
    }

    pub fn load(self) -> ConfigResult<FerrogramConfig> {
        let config: FerrogramConfig = self.figment()?.extract()?;

        debug!(
            profile = %self.profile,
            level = %config.logging.level,
            webhook = config.webhook.enabled,
            "Configuration loaded"
        );
        Ok(config)
    }
}

/// Loads configuration from the default locations and the environment.
pub fn load_config() -> ConfigResult<FerrogramConfig> {
    ConfigLoader::new().load()
}

/// Loads configuration from `path` and the environment.
pub fn load_config_from_file<P: AsRef<Path>>(path: P) -> ConfigResult<FerrogramConfig> {
    ConfigLoader::new().file(path).load()
}

#[cfg(test)]
mod tests {
    use ferrogram_core::Capacity;
    use tokio_test::{assert_err, assert_ok};

    use super::*;
    use crate::config::LogLevel;

    fn scratch_dir(name: &str) -> PathBuf {
        let dir = std::env::temp_dir().join(format!("ferrogram-{name}-{}", std::process::id()));
        std::fs::create_dir_all(&dir).unwrap();
        dir
    }

    #[test]
    fn test_default_config() {
        let dir = std::env::temp_dir().join("ferrogram-loader-empty");
        let config = assert_ok!(ConfigLoader::new().search_path(&dir).without_env().load());

        assert_eq!(config.logging.level, LogLevel::Info);
        assert_eq!(config.commands.prefix, "/");
        assert_eq!(config.cache.users, Capacity::Bounded(1000));
        assert_eq!(config.cache.chats, Capacity::Unbounded);
        assert_eq!(config.polling.interval_ms, 300);
        assert!(!config.webhook.enabled);
    }

    #[test]
    fn test_merge_overrides_defaults() {
        let mut overrides = FerrogramConfig::default();
        overrides.commands.prefix = "!".into();
        overrides.cache.messages = Capacity::Bounded(10);

        let config = assert_ok!(
            ConfigLoader::new()
                .search_path(std::env::temp_dir().join("ferrogram-loader-empty"))
                .without_env()
                .merge(overrides)
                .load()
        );

        assert_eq!(config.commands.prefix, "!");
        assert_eq!(config.cache.messages, Capacity::Bounded(10));
    }

    #[cfg(feature = "toml-config")]
    #[test]
    fn test_load_toml_file() {
        let dir = scratch_dir("loader-file");
        let path = dir.join("ferrogram.toml");
        std::fs::write(
            &path,
            r#"
[bot]
token = "123:abc"

[cache]
users = "unbounded"
messages = -1

[commands]
prefix = "!"

[webhook]
enabled = true
port = 9000
"#,
        )
        .unwrap();

        let config = assert_ok!(ConfigLoader::new().file(&path).without_env().load());
        std::fs::remove_dir_all(&dir).ok();

        assert_eq!(config.bot.token.as_deref(), Some("123:abc"));
        assert_eq!(config.cache.users, Capacity::Unbounded);
        assert_eq!(config.cache.messages, Capacity::Unbounded);
        assert_eq!(config.cache.members, Capacity::Bounded(200));
        assert_eq!(config.commands.prefix, "!");
        assert!(config.webhook.enabled);
        assert_eq!(config.webhook.port, 9000);
        assert_eq!(config.webhook.path, "/");
    }

    #[cfg(feature = "toml-config")]
    #[test]
    fn test_profile_file_sits_below_main_file() {
        let dir = scratch_dir("loader-profile");
        std::fs::write(dir.join("ferrogram.toml"), "[commands]\nprefix = \"!\"\n").unwrap();
        std::fs::write(
            dir.join("ferrogram.production.toml"),
            "[commands]\nprefix = \"?\"\n\n[polling]\ninterval_ms = 50\n",
        )
        .unwrap();

        let loader = ConfigLoader::new()
            .profile("prod")
            .search_path(&dir)
            .without_env();
        let files = assert_ok!(loader.files());
        let config = assert_ok!(loader.load());
        std::fs::remove_dir_all(&dir).ok();

        assert_eq!(files.len(), 2);
        assert!(files[0].ends_with("ferrogram.production.toml"));
        assert_eq!(config.commands.prefix, "!");
        assert_eq!(config.polling.interval_ms, 50);
    }

    #[test]
    fn test_missing_and_unsupported_files() {
        let result = ConfigLoader::new()
            .file("/definitely/not/here/ferrogram.toml")
            .without_env()
            .load();
        assert!(matches!(result, Err(ConfigError::FileNotFound(_))));

        let dir = scratch_dir("loader-format");
        let path = dir.join("ferrogram.ini");
        std::fs::write(&path, "prefix = !").unwrap();
        let err = assert_err!(ConfigLoader::new().file(&path).without_env().load());
        std::fs::remove_dir_all(&dir).ok();
        assert!(matches!(err, ConfigError::UnsupportedFormat(_)));
    }

    #[test]
    fn test_profile_names() {
        assert!(Profile::new("PROD").is_production());
        assert_eq!(Profile::new("dev"), Profile::default());
        assert_eq!(Profile::new(" Staging ").as_str(), "staging");
        assert_eq!(Profile::new("").as_str(), "development");
    }
}
