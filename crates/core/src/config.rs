//! TOML-based configuration for nbsync.
//!
//! The token is only ever stored as an `_env` field naming an environment
//! variable; the actual value is resolved at runtime via
//! [`AppConfig::resolve_env_vars`]. Without a config file the whole
//! configuration can come from the environment ([`AppConfig::from_env`]).

use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};

use crate::errors::{ConfigError, CoreError};
use crate::git::GitClient;
use crate::models::SyncRoot;

/// Environment variable CI systems use to pass the branch being built.
pub const CI_BRANCH_ENV: &str = "BUILD_SOURCEBRANCHNAME";

const PLACEHOLDERS: [&str; 3] = ["user", "branch", "notebook_folder"];

// ---------------------------------------------------------------------------
// Top-level config
// ---------------------------------------------------------------------------

/// Top-level application configuration.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct AppConfig {
    /// Remote workspace connection.
    #[serde(default)]
    pub workspace: WorkspaceConfig,

    /// Local project layout.
    #[serde(default)]
    pub project: ProjectConfig,

    /// Where the mirror lives in the remote workspace.
    #[serde(default)]
    pub remote: RemoteConfig,

    /// Per-file sync options.
    #[serde(default)]
    pub options: OptionsConfig,

    /// Logging settings.
    #[serde(default)]
    pub logging: LoggingConfig,
}

// ---------------------------------------------------------------------------
// Workspace
// ---------------------------------------------------------------------------

/// Remote workspace connection settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WorkspaceConfig {
    /// Workspace URL (e.g. `https://adb-123.azuredatabricks.net`). When unset
    /// it is read from `host_env`.
    #[serde(default)]
    pub host: Option<String>,

    /// Environment variable holding the workspace URL.
    #[serde(default = "default_host_env")]
    pub host_env: String,

    /// Environment variable holding the access token.
    #[serde(default = "default_token_env")]
    pub token_env: String,

    /// Resolved token (populated by `resolve_env_vars`).
    #[serde(skip)]
    pub token: Option<String>,
}

fn default_host_env() -> String {
    "DATABRICKS_HOST".into()
}
fn default_token_env() -> String {
    "DATABRICKS_TOKEN".into()
}

impl Default for WorkspaceConfig {
    fn default() -> Self {
        Self {
            host: None,
            host_env: default_host_env(),
            token_env: default_token_env(),
            token: None,
        }
    }
}

// ---------------------------------------------------------------------------
// Project
// ---------------------------------------------------------------------------

/// Local project layout.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProjectConfig {
    /// Project root; also where branch discovery starts.
    #[serde(default = "default_project_folder")]
    pub project_folder: PathBuf,

    /// Notebook directory, relative to `project_folder`. Also substituted
    /// into the remote path template.
    #[serde(default = "default_notebook_folder")]
    pub notebook_folder: String,
}

fn default_project_folder() -> PathBuf {
    PathBuf::from(".")
}
fn default_notebook_folder() -> String {
    "notebooks".into()
}

impl Default for ProjectConfig {
    fn default() -> Self {
        Self {
            project_folder: default_project_folder(),
            notebook_folder: default_notebook_folder(),
        }
    }
}

// ---------------------------------------------------------------------------
// Remote
// ---------------------------------------------------------------------------

/// Remote mirror location.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RemoteConfig {
    /// Workspace user; defaults to `$USER`.
    #[serde(default)]
    pub user: Option<String>,

    /// Branch name; defaults to `$BUILD_SOURCEBRANCHNAME`, then the git HEAD.
    #[serde(default)]
    pub branch: Option<String>,

    /// Remote root template. Placeholders: `{user}`, `{branch}`,
    /// `{notebook_folder}`.
    #[serde(default = "default_path_template")]
    pub path_template: String,
}

fn default_path_template() -> String {
    "/Users/{user}/{branch}/{notebook_folder}".into()
}

impl Default for RemoteConfig {
    fn default() -> Self {
        Self {
            user: None,
            branch: None,
            path_template: default_path_template(),
        }
    }
}

// ---------------------------------------------------------------------------
// Options
// ---------------------------------------------------------------------------

/// Per-file sync options.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct OptionsConfig {
    /// Glob patterns (relative to the sync root) to leave out.
    #[serde(default)]
    pub ignore_patterns: Vec<String>,

    /// Skip leaves larger than this (in bytes). 0 = no limit.
    #[serde(default)]
    pub max_file_size: u64,
}

// ---------------------------------------------------------------------------
// Logging
// ---------------------------------------------------------------------------

/// Logging settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoggingConfig {
    /// Minimum tracing level: trace, debug, info, warn, error.
    #[serde(default = "default_log_level")]
    pub level: String,
}

fn default_log_level() -> String {
    "warn".into()
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
        }
    }
}

// ---------------------------------------------------------------------------
// Loading & resolving
// ---------------------------------------------------------------------------

impl AppConfig {
    /// Load an [`AppConfig`] from a TOML file at the given path.
    ///
    /// This does **not** resolve environment variables -- call
    /// [`resolve_env_vars`](Self::resolve_env_vars) afterwards.
    pub fn load_from_file<P: AsRef<Path>>(path: P) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        info!(path = %path.display(), "loading configuration");

        if !path.exists() {
            return Err(ConfigError::FileNotFound(path.display().to_string()));
        }

        let contents = std::fs::read_to_string(path)?;
        let config: AppConfig =
            toml::from_str(&contents).map_err(|e| ConfigError::ParseError(e.to_string()))?;

        debug!("configuration parsed successfully");
        Ok(config)
    }

    /// Build a configuration from `PROJECT_FOLDER` and `NOTEBOOK_FOLDER`,
    /// with defaults for everything else.
    pub fn from_env() -> Self {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Self {
        let mut config = Self::default();
        if let Some(folder) = lookup("PROJECT_FOLDER").filter(|v| !v.is_empty()) {
            config.project.project_folder = PathBuf::from(folder);
        }
        if let Some(folder) = lookup("NOTEBOOK_FOLDER").filter(|v| !v.is_empty()) {
            config.project.notebook_folder = folder;
        }
        config
    }

    /// Load `.env`, then the config file if it exists.
    ///
    /// An explicitly given path must exist; the default path falls back to
    /// [`from_env`](Self::from_env) when absent.
    pub fn discover(path: &Path, explicit: bool) -> Result<Self, ConfigError> {
        load_dotenv();
        if path.exists() || explicit {
            Self::load_from_file(path)
        } else {
            info!(path = %path.display(), "no configuration file, using environment");
            Ok(Self::from_env())
        }
    }

    /// Resolve the host, token and user from environment variables.
    ///
    /// Missing variables log a warning but do not fail here; [`validate`]
    /// reports what is required.
    ///
    /// [`validate`]: Self::validate
    pub fn resolve_env_vars(&mut self) -> Result<(), ConfigError> {
        info!("resolving environment variable references in config");
        self.resolve_with(|key| std::env::var(key).ok());
        debug!("environment variable resolution complete");
        Ok(())
    }

    fn resolve_with(&mut self, lookup: impl Fn(&str) -> Option<String>) {
        if self.workspace.host.is_none() {
            self.workspace.host =
                resolve_optional(&lookup, &self.workspace.host_env, "workspace.host_env");
        }
        self.workspace.token =
            resolve_optional(&lookup, &self.workspace.token_env, "workspace.token_env");
        if self.remote.user.is_none() {
            self.remote.user = resolve_optional(&lookup, "USER", "remote.user");
        }
    }

    /// Validate that all required fields are present and sane.
    pub fn validate(&self) -> Result<(), ConfigError> {
        match self.workspace.host.as_deref() {
            None | Some("") => {
                return Err(ConfigError::EnvVarMissing {
                    var: self.workspace.host_env.clone(),
                    field: "workspace.host".into(),
                })
            }
            Some(host) if !(host.starts_with("https://") || host.starts_with("http://")) => {
                return Err(ConfigError::InvalidValue {
                    field: "workspace.host".into(),
                    detail: format!("'{}' must start with https:// or http://", host),
                })
            }
            Some(_) => {}
        }
        if self.workspace.token.is_none() {
            return Err(ConfigError::EnvVarMissing {
                var: self.workspace.token_env.clone(),
                field: "workspace.token_env".into(),
            });
        }
        if self.remote.user.as_deref().map_or(true, str::is_empty) {
            return Err(ConfigError::InvalidValue {
                field: "remote.user".into(),
                detail: "no user configured and $USER is not set".into(),
            });
        }
        let folder = &self.project.notebook_folder;
        if folder.is_empty() || folder.split('/').any(|seg| seg == "..") {
            return Err(ConfigError::InvalidValue {
                field: "project.notebook_folder".into(),
                detail: format!("'{}' must be a non-empty relative path without '..'", folder),
            });
        }
        validate_template(&self.remote.path_template)?;
        Ok(())
    }

    /// Convenience: discover, resolve, and validate in one call.
    pub fn load_and_resolve(path: &Path, explicit: bool) -> Result<Self, ConfigError> {
        let mut config = Self::discover(path, explicit)?;
        config.resolve_env_vars()?;
        config.validate()?;
        Ok(config)
    }

    /// Local notebook root: `project_folder/notebook_folder`.
    pub fn local_base(&self) -> PathBuf {
        self.project.project_folder.join(&self.project.notebook_folder)
    }

    /// Render the remote root for `branch`.
    pub fn remote_base(&self, branch: &str) -> Result<String, ConfigError> {
        validate_template(&self.remote.path_template)?;
        let user = self.remote.user.as_deref().unwrap_or_default();
        let rendered = self
            .remote
            .path_template
            .replace("{user}", user)
            .replace("{branch}", branch)
            .replace("{notebook_folder}", self.project.notebook_folder.trim_matches('/'));
        if rendered.split('/').skip(1).any(str::is_empty) {
            return Err(ConfigError::InvalidValue {
                field: "remote.path_template".into(),
                detail: format!("rendered path '{}' has an empty segment", rendered),
            });
        }
        Ok(rendered)
    }

    /// Branch used in the remote path: explicit config, then the CI
    /// variable, then the git HEAD of the project.
    pub fn resolve_branch(&self) -> Result<String, CoreError> {
        if let Some(branch) = self.remote.branch.as_deref().filter(|b| !b.is_empty()) {
            return Ok(branch.to_string());
        }
        if let Ok(branch) = std::env::var(CI_BRANCH_ENV) {
            if !branch.is_empty() {
                debug!(branch = %branch, "using branch from {}", CI_BRANCH_ENV);
                return Ok(branch);
            }
        }
        let git = GitClient::discover(&self.project.project_folder)?;
        Ok(git.current_branch()?)
    }

    /// The pair of roots mirrored for `branch`.
    pub fn sync_root(&self, branch: &str) -> Result<SyncRoot, ConfigError> {
        Ok(SyncRoot::new(self.local_base(), self.remote_base(branch)?))
    }
}

/// Load `.env` from the working directory if present.
pub fn load_dotenv() {
    match dotenvy::dotenv() {
        Ok(path) => debug!(path = %path.display(), "loaded .env"),
        Err(e) if e.not_found() => {}
        Err(e) => warn!(error = %e, "failed to load .env"),
    }
}

fn validate_template(template: &str) -> Result<(), ConfigError> {
    let invalid = |detail: String| ConfigError::InvalidValue {
        field: "remote.path_template".into(),
        detail,
    };
    if !template.starts_with('/') {
        return Err(invalid(format!("'{}' must be an absolute path", template)));
    }
    let mut rest = template;
    while let Some(start) = rest.find('{') {
        let after = &rest[start + 1..];
        let end = after
            .find('}')
            .ok_or_else(|| invalid(format!("unclosed placeholder in '{}'", template)))?;
        let name = &after[..end];
        if !PLACEHOLDERS.contains(&name) {
            return Err(invalid(format!("unknown placeholder '{{{}}}'", name)));
        }
        rest = &after[end + 1..];
    }
    Ok(())
}

/// Look up a variable by name. Returns `Some(value)` on success; logs a
/// warning and returns `None` if the variable is unset or empty.
fn resolve_optional(
    lookup: &impl Fn(&str) -> Option<String>,
    env_name: &str,
    field: &str,
) -> Option<String> {
    match lookup(env_name) {
        Some(val) if !val.is_empty() => {
            debug!(field, env_name, "resolved env var");
            Some(val)
        }
        Some(_) => {
            warn!(field, env_name, "env var is set but empty");
            None
        }
        None => {
            warn!(field, env_name, "env var not set");
            None
        }
    }
}
