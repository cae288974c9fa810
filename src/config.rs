//! Configuration management
//!
//! Configuration lives in a JSON file holding the code templates and the
//! default naming patterns. Environment variables (optionally from a `.env`
//! file) may override individual values. The loaded [`Config`] is passed
//! explicitly to whoever needs it.

use std::env;
use std::fs;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::constants::{
    naming, CONFIG_PATH_ENV, DEFAULT_CONFIG_RELATIVE_PATH, DEFAULT_WORKERS, WORKERS_ENV,
};
use crate::runner::Role;

/// Main application configuration
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Code templates, matched against source files by extension
    #[serde(rename = "template")]
    pub templates: Vec<CodeTemplate>,
    /// Naming patterns for solve/brute/generator sources and saved inputs
    pub default_naming: DefaultNaming,
    /// Size of the stress worker pool
    pub workers: usize,
}

/// How to build and run source files of one language
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CodeTemplate {
    pub alias: String,
    #[serde(default)]
    pub lang: String,
    /// File extensions (without the dot) handled by this template
    #[serde(default)]
    pub suffix: Vec<String>,
    /// Run once before testing, usually compilation. May be empty.
    #[serde(default)]
    pub before_script: String,
    /// Runs the program; stdin/stdout carry the test data
    pub script: String,
    /// Run once after testing, usually cleanup. May be empty.
    #[serde(default)]
    pub after_script: String,
}

impl CodeTemplate {
    /// Whether files with extension `ext` belong to this template
    pub fn handles_extension(&self, ext: &str) -> bool {
        self.suffix
            .iter()
            .any(|s| s.trim_start_matches('.').eq_ignore_ascii_case(ext))
    }
}

/// Naming patterns; each may contain `$%task%$`, `test_in` also `$%test%$`
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct DefaultNaming {
    pub solve: String,
    pub brute: String,
    #[serde(rename = "gen")]
    pub generator: String,
    pub test_in: String,
}

impl Default for DefaultNaming {
    fn default() -> Self {
        Self {
            solve: naming::SOLVE.to_string(),
            brute: naming::BRUTE.to_string(),
            generator: naming::GENERATOR.to_string(),
            test_in: naming::TEST_INPUT.to_string(),
        }
    }
}

impl DefaultNaming {
    /// Naming pattern of a role's source file
    pub fn for_role(&self, role: Role) -> &str {
        match role {
            Role::Solve => &self.solve,
            Role::Brute => &self.brute,
            Role::Generator => &self.generator,
        }
    }

    fn validate(&self) -> Result<(), ConfigError> {
        let keys = [
            ("solve", &self.solve),
            ("brute", &self.brute),
            ("gen", &self.generator),
            ("test_in", &self.test_in),
        ];
        match keys.iter().find(|(_, value)| value.trim().is_empty()) {
            Some((key, _)) => Err(ConfigError::MissingNaming(key.to_string())),
            None => Ok(()),
        }
    }
}

impl Default for Config {
    fn default() -> Self {
        Self {
            templates: Vec::new(),
            default_naming: DefaultNaming::default(),
            workers: DEFAULT_WORKERS,
        }
    }
}

impl Config {
    /// Starter configuration written by `config init`
    pub fn starter() -> Self {
        Self {
            templates: vec![
                CodeTemplate {
                    alias: "cpp".to_string(),
                    lang: "GNU C++17".to_string(),
                    suffix: vec!["cpp".to_string(), "cc".to_string()],
                    before_script: "g++ -O2 -std=c++17 $%path%$$%full%$ -o $%path%$$%file%$-$%rand%$"
                        .to_string(),
                    script: "$%path%$$%file%$-$%rand%$".to_string(),
                    after_script: "rm $%path%$$%file%$-$%rand%$".to_string(),
                },
                CodeTemplate {
                    alias: "py".to_string(),
                    lang: "Python 3".to_string(),
                    suffix: vec!["py".to_string()],
                    before_script: String::new(),
                    script: "python3 $%path%$$%full%$".to_string(),
                    after_script: String::new(),
                },
            ],
            ..Self::default()
        }
    }

    /// Resolve the configuration file location.
    ///
    /// An explicit path wins, then `STRESS_CONFIG`, then `~/.st/config.json`.
    pub fn resolve_path(explicit: Option<&Path>) -> Result<PathBuf, ConfigError> {
        dotenvy::dotenv().ok();

        if let Some(path) = explicit {
            return Ok(path.to_path_buf());
        }
        if let Ok(path) = env::var(CONFIG_PATH_ENV) {
            return Ok(PathBuf::from(path));
        }
        let home = env::var("HOME").map_err(|_| ConfigError::Missing("HOME".to_string()))?;
        Ok(PathBuf::from(home).join(DEFAULT_CONFIG_RELATIVE_PATH))
    }

    /// Load configuration from `path` and apply environment overrides.
    ///
    /// A missing file is not an error; defaults are used instead.
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        dotenvy::dotenv().ok();

        let mut config = if path.exists() {
            let data = fs::read_to_string(path).map_err(|e| ConfigError::Read {
                path: path.to_path_buf(),
                reason: e.to_string(),
            })?;
            Self::from_json(&data).map_err(|e| ConfigError::Parse {
                path: path.to_path_buf(),
                reason: e.to_string(),
            })?
        } else {
            tracing::warn!(path = %path.display(), "Configuration file not found, using defaults");
            Self::default()
        };

        if let Some(workers) = parse_workers(env::var(WORKERS_ENV).ok())? {
            config.workers = workers;
        }

        Ok(config)
    }

    /// Parse configuration from JSON text
    pub fn from_json(data: &str) -> Result<Self, serde_json::Error> {
        serde_json::from_str(data)
    }

    /// Write configuration to `path` as pretty-printed JSON
    pub fn save(&self, path: &Path) -> Result<(), ConfigError> {
        let write_err = |e: std::io::Error| ConfigError::Write {
            path: path.to_path_buf(),
            reason: e.to_string(),
        };

        let data = serde_json::to_string_pretty(self).map_err(|e| ConfigError::Write {
            path: path.to_path_buf(),
            reason: e.to_string(),
        })?;
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent).map_err(write_err)?;
        }
        fs::write(path, data + "\n").map_err(write_err)?;

        tracing::info!(path = %path.display(), "Configuration saved");
        Ok(())
    }

    /// Check everything a stress run relies on
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.templates.is_empty() {
            return Err(ConfigError::NoTemplates);
        }
        self.default_naming.validate()?;
        if self.workers == 0 {
            return Err(ConfigError::InvalidValue("workers".to_string()));
        }
        Ok(())
    }
}

fn parse_workers(value: Option<String>) -> Result<Option<usize>, ConfigError> {
    match value {
        None => Ok(None),
        Some(raw) => match raw.trim().parse::<usize>() {
            Ok(n) if n > 0 => Ok(Some(n)),
            _ => Err(ConfigError::InvalidValue(WORKERS_ENV.to_string())),
        },
    }
}

/// Configuration loading errors
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Missing required environment variable: {0}")]
    Missing(String),

    #[error("Invalid value for {0}")]
    InvalidValue(String),

    #[error("Cannot read config {}: {reason}", .path.display())]
    Read { path: PathBuf, reason: String },

    #[error("Cannot parse config {}: {reason}", .path.display())]
    Parse { path: PathBuf, reason: String },

    #[error("Cannot save config to {}: {reason}", .path.display())]
    Write { path: PathBuf, reason: String },

    #[error("You have to add at least one code template to the config")]
    NoTemplates,

    #[error("You have to set the default naming for `{0}` in the config")]
    MissingNaming(String),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_values() {
        let config = Config::default();
        assert_eq!(config.workers, 10);
        assert_eq!(config.default_naming.solve, "$%task%$.cpp");
        assert_eq!(config.default_naming.test_in, "$%task%$GenTest$%test%$.in");
        assert!(matches!(config.validate(), Err(ConfigError::NoTemplates)));
    }

    #[test]
    fn test_parse_with_missing_keys() {
        let config = Config::from_json(
            r#"{
                "template": [{ "alias": "py", "suffix": ["py"], "script": "python3 $%full%$" }],
                "default_naming": { "solve": "$%task%$.py" }
            }"#,
        )
        .unwrap();

        assert_eq!(config.templates.len(), 1);
        assert_eq!(config.templates[0].before_script, "");
        assert_eq!(config.default_naming.solve, "$%task%$.py");
        assert_eq!(config.default_naming.brute, "$%task%$-brute.cpp");
        assert_eq!(config.workers, 10);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_empty_naming_is_rejected() {
        let mut config = Config::starter();
        config.default_naming.generator = String::new();

        match config.validate() {
            Err(ConfigError::MissingNaming(key)) => assert_eq!(key, "gen"),
            other => panic!("unexpected result: {other:?}"),
        }
    }

    #[test]
    fn test_zero_workers_rejected() {
        let mut config = Config::starter();
        config.workers = 0;
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_handles_extension() {
        let template = &Config::starter().templates[0];
        assert!(template.handles_extension("cpp"));
        assert!(template.handles_extension("CC"));
        assert!(!template.handles_extension("py"));
    }

    #[test]
    fn test_parse_workers() {
        assert_eq!(parse_workers(None).unwrap(), None);
        assert_eq!(parse_workers(Some(" 4 ".to_string())).unwrap(), Some(4));
        assert!(parse_workers(Some("0".to_string())).is_err());
        assert!(parse_workers(Some("many".to_string())).is_err());
    }

    #[test]
    fn test_save_and_load() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("nested").join("config.json");

        let config = Config::starter();
        config.save(&path).unwrap();
        let loaded = Config::load(&path).unwrap();

        assert_eq!(loaded.templates, config.templates);
        assert_eq!(loaded.default_naming, config.default_naming);
    }

    #[test]
    fn test_load_missing_file_uses_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let config = Config::load(&dir.path().join("absent.json")).unwrap();
        assert!(config.templates.is_empty());
    }

    #[test]
    fn test_load_invalid_json() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.json");
        fs::write(&path, "{ not json").unwrap();

        assert!(matches!(Config::load(&path), Err(ConfigError::Parse { .. })));
    }
}
