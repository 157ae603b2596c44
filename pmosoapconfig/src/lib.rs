//! # PMOSoap Configuration Module
//!
//! Configuration management for the SOAP fixture:
//! - Loading configuration from a YAML file
//! - Merging with the embedded default configuration
//! - Environment variable overrides (`PMOSOAP_CONFIG__SECTION__KEY=value`)
//! - Typed getters and setters for configuration values
//! - Thread-safe singleton access pattern
//!
//! ## Usage
//!
//! ```no_run
//! use pmosoapconfig::get_config;
//!
//! let config = get_config();
//! let timeout = config.get_timeout_secs()?;
//! let version = config.get_soap_version()?;
//! config.add_namespace("m", "urn:example:stock")?;
//! # Ok::<(), anyhow::Error>(())
//! ```

use anyhow::{anyhow, Context, Result};
use dirs::home_dir;
use lazy_static::lazy_static;
use serde_yaml::{Mapping, Number, Value};
use std::{
    env, fs,
    path::{Path, PathBuf},
    sync::{Arc, Mutex, MutexGuard},
};
use tracing::{info, warn};

// Configuration par défaut intégrée
const DEFAULT_CONFIG: &str = include_str!("pmosoap.yaml");

lazy_static! {
    static ref CONFIG: Arc<Config> = Arc::new(Config::load_config("").unwrap_or_else(|err| {
        warn!(error = %err, "Failed to load PMOSoap configuration, using embedded defaults");
        Config::embedded()
    }));
}

const ENV_CONFIG_DIR: &str = "PMOSOAP_CONFIG";
const ENV_PREFIX: &str = "PMOSOAP_CONFIG__";
const CONFIG_DIR_NAME: &str = ".pmosoap";
const CONFIG_FILE_NAME: &str = "config.yaml";

/// Section dont les clés (préfixes XML) gardent leur casse
const NAMESPACES_KEY: &str = "namespaces";

// Default values for configuration
const DEFAULT_TIMEOUT_SECS: u64 = 30;
const DEFAULT_SOAP_VERSION: &str = "1.1";
const DEFAULT_ENVELOPE_PREFIX: &str = "SOAP-ENV";
const DEFAULT_SOAP_ACTION: &str = "\"\"";
const DEFAULT_XML_DECLARATION: bool = false;
const DEFAULT_LOG_MIN_LEVEL: &str = "INFO";
const DEFAULT_LOG_ENABLE_CONSOLE: bool = true;

/// Macro to generate getter/setter for u64 values with default
macro_rules! impl_u64_config {
    ($getter:ident, $setter:ident, $path:expr, $default:expr) => {
        pub fn $getter(&self) -> Result<u64> {
            match self.get_value($path) {
                Ok(Value::Number(n)) => Ok(n.as_u64().unwrap_or($default)),
                Ok(Value::String(s)) => Ok(s.trim().parse().unwrap_or($default)),
                _ => Ok($default),
            }
        }

        pub fn $setter(&self, value: u64) -> Result<()> {
            self.set_value($path, Value::Number(Number::from(value)))
        }
    };
}

/// Macro to generate getter/setter for bool values with default
macro_rules! impl_bool_config {
    ($getter:ident, $setter:ident, $path:expr, $default:expr) => {
        pub fn $getter(&self) -> Result<bool> {
            match self.get_value($path) {
                Ok(Value::Bool(b)) => Ok(b),
                _ => Ok($default),
            }
        }

        pub fn $setter(&self, value: bool) -> Result<()> {
            self.set_value($path, Value::Bool(value))
        }
    };
}

/// Macro to generate getter/setter for string values with default
macro_rules! impl_string_config {
    ($getter:ident, $setter:ident, $path:expr, $default:expr) => {
        pub fn $getter(&self) -> Result<String> {
            match self.get_value($path) {
                Ok(Value::String(s)) => Ok(s),
                Ok(Value::Number(n)) => Ok(n.to_string()),
                _ => Ok($default.to_string()),
            }
        }

        pub fn $setter(&self, value: String) -> Result<()> {
            self.set_value($path, Value::String(value))
        }
    };
}

/// Configuration manager for the SOAP fixture
///
/// # Examples
///
/// ```no_run
/// use pmosoapconfig::get_config;
///
/// let config = get_config();
/// println!("HTTP timeout: {}s", config.get_timeout_secs()?);
/// # Ok::<(), anyhow::Error>(())
/// ```
#[derive(Debug)]
pub struct Config {
    config_dir: Option<PathBuf>,
    path: Option<PathBuf>,
    data: Mutex<Value>,
}

impl Clone for Config {
    fn clone(&self) -> Self {
        let data = match self.data.lock() {
            Ok(data) => data.clone(),
            Err(poisoned) => poisoned.into_inner().clone(),
        };
        Self {
            config_dir: self.config_dir.clone(),
            path: self.path.clone(),
            data: Mutex::new(data),
        }
    }
}

impl Config {
    /// Finds a config directory by trying different locations in order
    fn find_config_dir(directory: &str) -> Option<PathBuf> {
        // 1. Try provided directory
        if !directory.is_empty() {
            return Some(PathBuf::from(directory));
        }

        // 2. Try environment variable
        if let Ok(env_path) = env::var(ENV_CONFIG_DIR) {
            info!(env_var = ENV_CONFIG_DIR, path = %env_path, "Trying to load config from env");
            return Some(PathBuf::from(env_path));
        }

        // 3. Try current directory
        if Path::new(CONFIG_DIR_NAME).is_dir() {
            return Some(PathBuf::from(CONFIG_DIR_NAME));
        }

        // 4. Try home directory
        home_dir()
            .map(|home| home.join(CONFIG_DIR_NAME))
            .filter(|path| path.is_dir())
    }

    /// Configuration built from the embedded defaults only
    pub fn embedded() -> Self {
        let value = serde_yaml::from_str(DEFAULT_CONFIG).unwrap_or(Value::Mapping(Mapping::new()));
        Self {
            config_dir: None,
            path: None,
            data: Mutex::new(Self::lower_keys_value(value, false)),
        }
    }

    /// Builds a configuration from YAML text merged over the embedded defaults
    ///
    /// Environment overrides are not applied.
    pub fn from_yaml_str(yaml: &str) -> Result<Self> {
        let config = Self::embedded();
        let external: Value = serde_yaml::from_str(yaml).context("Invalid YAML configuration")?;
        {
            let mut data = config.lock()?;
            merge_yaml(&mut data, &Self::lower_keys_value(external, false));
        }
        Ok(config)
    }

    /// Loads the configuration from the specified directory
    ///
    /// This method:
    /// 1. Determines the configuration directory
    /// 2. Loads the default embedded configuration
    /// 3. Merges it with the external config.yaml file if present
    /// 4. Applies environment variable overrides
    ///
    /// The directory is searched in the following order:
    /// 1. The provided `directory` parameter if not empty
    /// 2. The `PMOSOAP_CONFIG` environment variable
    /// 3. `.pmosoap` in the current directory
    /// 4. `.pmosoap` in the user's home directory
    ///
    /// A missing directory or file is not an error: the embedded defaults are used.
    pub fn load_config(directory: &str) -> Result<Self> {
        let config_dir = Self::find_config_dir(directory);
        let path = config_dir.as_ref().map(|dir| dir.join(CONFIG_FILE_NAME));

        let mut config_value = Self::lower_keys_value(serde_yaml::from_str(DEFAULT_CONFIG)?, false);

        match path.as_ref().filter(|p| p.is_file()) {
            Some(file) => {
                let data = fs::read(file)
                    .with_context(|| format!("Failed to read {}", file.display()))?;
                let external: Value = serde_yaml::from_slice(&data)
                    .with_context(|| format!("Invalid YAML in {}", file.display()))?;
                merge_yaml(&mut config_value, &Self::lower_keys_value(external, false));
                info!(config_file = %file.display(), "Loaded config file");
            }
            None => {
                info!("Config file not found, using default embedded config");
            }
        }

        Self::apply_env_overrides(&mut config_value, env::vars());

        Ok(Config {
            config_dir,
            path,
            data: Mutex::new(config_value),
        })
    }

    fn lock(&self) -> Result<MutexGuard<'_, Value>> {
        self.data
            .lock()
            .map_err(|_| anyhow!("Configuration lock poisoned"))
    }

    pub fn config_dir(&self) -> Option<&Path> {
        self.config_dir.as_deref()
    }

    /// Saves the current configuration to the config.yaml file
    pub fn save(&self) -> Result<()> {
        let path = self
            .path
            .as_ref()
            .ok_or_else(|| anyhow!("Configuration has no backing file"))?;
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)?;
        }
        let yaml = serde_yaml::to_string(&*self.lock()?)?;
        fs::write(path, yaml)?;
        info!(config_file = %path.display(), "Saved configuration");
        Ok(())
    }

    /// Saves to `directory/config.yaml` and makes it the backing file
    pub fn save_to(&mut self, directory: &Path) -> Result<()> {
        self.config_dir = Some(directory.to_path_buf());
        self.path = Some(directory.join(CONFIG_FILE_NAME));
        self.save()
    }

    /// Sets a configuration value at the specified path
    ///
    /// # Arguments
    ///
    /// * `path` - Array of keys representing the path (e.g., `&["transport", "timeout_secs"]`)
    /// * `value` - The YAML value to set
    pub fn set_value(&self, path: &[&str], value: Value) -> Result<()> {
        let mut data = self.lock()?;
        Self::set_value_internal(&mut data, path, value, false)
    }

    fn set_value_internal(data: &mut Value, path: &[&str], value: Value, keep_case: bool) -> Result<()> {
        if path.is_empty() {
            *data = value;
            return Ok(());
        }
        if let Value::Mapping(map) = data {
            let key = if keep_case {
                path[0].to_string()
            } else {
                path[0].to_lowercase()
            };
            let children_keep_case = key == NAMESPACES_KEY;
            let key_value = Value::String(key);
            if path.len() == 1 {
                map.insert(key_value, value);
            } else {
                let entry = map
                    .entry(key_value)
                    .or_insert(Value::Mapping(Mapping::new()));
                Self::set_value_internal(entry, &path[1..], value, children_keep_case)?;
            }
            Ok(())
        } else {
            Err(anyhow!("Current node is not a map"))
        }
    }

    /// Gets a configuration value at the specified path
    pub fn get_value(&self, path: &[&str]) -> Result<Value> {
        let data = self.lock()?;
        Self::get_value_internal(&data, path)
    }

    fn get_value_internal(data: &Value, path: &[&str]) -> Result<Value> {
        let mut current = data;
        let mut keep_case = false;
        for (i, key) in path.iter().enumerate() {
            if let Value::Mapping(map) = current {
                let key = if keep_case {
                    key.to_string()
                } else {
                    key.to_lowercase()
                };
                keep_case = key == NAMESPACES_KEY;

                if let Some(next) = map.get(&Value::String(key)) {
                    current = next;
                } else {
                    return Err(anyhow!("Path {} does not exist", path[..=i].join(".")));
                }
            } else {
                return Err(anyhow!("Path {} is not a Config", path[..i].join(".")));
            }
        }
        Ok(current.clone())
    }

    fn apply_env_overrides(config: &mut Value, vars: impl Iterator<Item = (String, String)>) {
        for (key, value) in vars {
            if let Some(stripped) = key.strip_prefix(ENV_PREFIX) {
                let key_path = stripped.split("__").collect::<Vec<_>>();
                let yaml_value = Self::convert_env_value(&value);
                if let Err(err) = Self::set_value_internal(config, &key_path, yaml_value, false) {
                    warn!(env_var = %key, error = %err, "Ignoring environment override");
                }
            }
        }
    }

    fn convert_env_value(value: &str) -> Value {
        if let Ok(parsed) = serde_yaml::from_str::<Value>(value) {
            return parsed;
        }
        Value::String(value.to_string())
    }

    fn lower_keys_value(value: Value, keep_case: bool) -> Value {
        match value {
            Value::Mapping(map) => {
                let mut new_map = Mapping::new();
                for (k, v) in map {
                    if let Value::String(s) = k {
                        let new_key = if keep_case { s } else { s.to_lowercase() };
                        let children_keep_case = new_key == NAMESPACES_KEY;
                        let new_val = Self::lower_keys_value(v, children_keep_case);
                        new_map.insert(Value::String(new_key), new_val);
                    } else {
                        new_map.insert(k, Self::lower_keys_value(v, false));
                    }
                }
                Value::Mapping(new_map)
            }
            Value::Sequence(seq) => Value::Sequence(
                seq.into_iter()
                    .map(|v| Self::lower_keys_value(v, false))
                    .collect(),
            ),
            _ => value,
        }
    }

    impl_u64_config!(
        get_timeout_secs,
        set_timeout_secs,
        &["transport", "timeout_secs"],
        DEFAULT_TIMEOUT_SECS
    );

    impl_string_config!(
        get_content_type,
        set_content_type,
        &["transport", "content_type"],
        ""
    );

    impl_string_config!(
        get_soap_action,
        set_soap_action,
        &["transport", "soap_action"],
        DEFAULT_SOAP_ACTION
    );

    impl_string_config!(
        get_user_agent,
        set_user_agent,
        &["transport", "user_agent"],
        ""
    );

    impl_string_config!(
        get_soap_version,
        set_soap_version,
        &["message", "soap_version"],
        DEFAULT_SOAP_VERSION
    );

    impl_string_config!(
        get_envelope_prefix,
        set_envelope_prefix,
        &["message", "envelope_prefix"],
        DEFAULT_ENVELOPE_PREFIX
    );

    impl_bool_config!(
        get_xml_declaration,
        set_xml_declaration,
        &["message", "xml_declaration"],
        DEFAULT_XML_DECLARATION
    );

    impl_string_config!(
        get_log_min_level,
        set_log_min_level,
        &["log", "min_level"],
        DEFAULT_LOG_MIN_LEVEL
    );

    impl_bool_config!(
        get_log_enable_console,
        set_log_enable_console,
        &["log", "enable_console"],
        DEFAULT_LOG_ENABLE_CONSOLE
    );

    /// Préfixes de namespaces préenregistrés, triés par préfixe
    pub fn get_namespaces(&self) -> Result<Vec<(String, String)>> {
        let mut namespaces = match self.get_value(&[NAMESPACES_KEY]) {
            Ok(Value::Mapping(map)) => map
                .into_iter()
                .filter_map(|(k, v)| match (k, v) {
                    (Value::String(prefix), Value::String(uri)) => Some((prefix, uri)),
                    (prefix, _) => {
                        warn!(?prefix, "Ignoring namespace entry whose URI is not a string");
                        None
                    }
                })
                .collect(),
            _ => Vec::new(),
        };
        namespaces.sort();
        Ok(namespaces)
    }

    /// Ajoute (ou remplace) un préfixe préenregistré
    pub fn add_namespace(&self, prefix: &str, uri: &str) -> Result<()> {
        let mut data = self.lock()?;
        Self::set_value_internal(
            &mut data,
            &[NAMESPACES_KEY, prefix],
            Value::String(uri.to_string()),
            false,
        )
    }
}

/// Returns the global configuration instance
///
/// The instance is lazily loaded on first access; loading problems fall
/// back to the embedded defaults.
pub fn get_config() -> Arc<Config> {
    CONFIG.clone()
}

/// Merges external YAML configuration into default configuration
///
/// Mappings are merged key by key; scalars and sequences from `external`
/// replace the default values.
fn merge_yaml(default: &mut Value, external: &Value) {
    match (default, external) {
        (Value::Mapping(dmap), Value::Mapping(emap)) => {
            for (k, v) in emap {
                match dmap.get_mut(k) {
                    Some(dv) => merge_yaml(dv, v),
                    None => {
                        dmap.insert(k.clone(), v.clone());
                    }
                }
            }
        }
        (d, e) => *d = e.clone(),
    }
}
