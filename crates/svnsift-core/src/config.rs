//! Filter configuration.
//!
//! Settings come from, lowest precedence first: the user config file
//! (`<config dir>/svnsift/config.toml`), an explicit `--config FILE`, and
//! command-line flags. [`FilterConfig::validate`] checks the combination
//! before any pass over the dump starts and yields [`FilterOptions`].
//!
//! ```toml
//! include = ["trunk/project", "branches/project-1.x"]
//! drop_empty = true
//! redefine_root = "trunk"
//!
//! [synthetic]
//! author = "repo-admin"
//! ```

use serde::{Deserialize, Serialize};
use std::io::IsTerminal;
use std::path::{Path, PathBuf};

use crate::error::ErrorCode;
use crate::history::path;

/// Configuration errors, all detected before the dump is opened.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("includes and excludes can not be combined")]
    BothIncludeAndExclude,

    #[error("at least one path to include or exclude is required")]
    NothingSelected,

    #[error("the root can only be redefined together with includes")]
    RootWithExclude,

    #[error("include '{path}' is not at or under the redefined root '{root}'")]
    RootNotCovering { root: String, path: String },

    #[error("'{path}' is not a valid repository path")]
    InvalidPath { path: String },

    #[error("failed to read {}: {source}", path.display())]
    Read {
        path: PathBuf,
        source: std::io::Error,
    },

    #[error("failed to parse {}: {source}", path.display())]
    Parse {
        path: PathBuf,
        source: toml::de::Error,
    },
}

impl ConfigError {
    #[must_use]
    pub const fn code(&self) -> ErrorCode {
        match self {
            Self::BothIncludeAndExclude => ErrorCode::ConflictingSelection,
            Self::NothingSelected => ErrorCode::EmptySelection,
            Self::RootWithExclude => ErrorCode::RootRequiresInclude,
            Self::RootNotCovering { .. } => ErrorCode::RootNotCovering,
            Self::InvalidPath { .. } | Self::Read { .. } => ErrorCode::MalformedArgument,
            Self::Parse { .. } => ErrorCode::ConfigParseError,
        }
    }
}

// ---------------------------------------------------------------------------
// File format
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(deny_unknown_fields)]
pub struct FilterConfig {
    #[serde(default)]
    pub include: Vec<String>,
    #[serde(default)]
    pub exclude: Vec<String>,
    #[serde(default)]
    pub drop_empty: bool,
    #[serde(default)]
    pub redefine_root: Option<String>,
    #[serde(default)]
    pub add_delete: bool,
    /// Preferred report format: `pretty`, `text` or `json`.
    #[serde(default)]
    pub output: Option<String>,
    #[serde(default)]
    pub synthetic: SyntheticConfig,
}

/// Revision properties of the appended deletion revision.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SyntheticConfig {
    #[serde(default = "default_author")]
    pub author: String,
    #[serde(default = "default_message")]
    pub message: String,
}

impl Default for SyntheticConfig {
    fn default() -> Self {
        Self {
            author: default_author(),
            message: default_message(),
        }
    }
}

impl FilterConfig {
    /// Load a config file. A missing file is an error here; see
    /// [`Self::load_user`] for the optional user file.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::Read`] or [`ConfigError::Parse`].
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path).map_err(|source| ConfigError::Read {
            path: path.to_path_buf(),
            source,
        })?;
        toml::from_str(&content).map_err(|source| ConfigError::Parse {
            path: path.to_path_buf(),
            source,
        })
    }

    /// Load `<config dir>/svnsift/config.toml`, or defaults if absent.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError`] if the file exists but cannot be read or
    /// parsed.
    pub fn load_user() -> Result<Self, ConfigError> {
        match user_config_path() {
            Some(path) if path.exists() => Self::load(&path),
            _ => Ok(Self::default()),
        }
    }

    /// Layer `over` on top of `self`. A selection in `over` replaces the
    /// whole selection of `self`, set options replace, flags accumulate.
    #[must_use]
    pub fn merge(self, over: Self) -> Self {
        let (include, exclude) = if over.include.is_empty() && over.exclude.is_empty() {
            (self.include, self.exclude)
        } else {
            (over.include, over.exclude)
        };
        Self {
            include,
            exclude,
            drop_empty: self.drop_empty || over.drop_empty,
            redefine_root: over.redefine_root.or(self.redefine_root),
            add_delete: self.add_delete || over.add_delete,
            output: over.output.or(self.output),
            synthetic: if over.synthetic == SyntheticConfig::default() {
                self.synthetic
            } else {
                over.synthetic
            },
        }
    }

    /// Check the combination of settings and normalize every path.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError`] for conflicting or empty selections, a root
    /// redefinition outside include mode, or a root that does not cover
    /// every include.
    pub fn validate(&self) -> Result<FilterOptions, ConfigError> {
        let include = normalize_all(&self.include)?;
        let exclude = normalize_all(&self.exclude)?;

        let selection = match (include.is_empty(), exclude.is_empty()) {
            (false, false) => return Err(ConfigError::BothIncludeAndExclude),
            (true, true) => return Err(ConfigError::NothingSelected),
            (false, true) => Selection::Include(include),
            (true, false) => Selection::Exclude(exclude),
        };

        let redefine_root = match self.redefine_root.as_deref() {
            None => None,
            Some(raw) => {
                let root = normalize_one(raw)?;
                let Selection::Include(paths) = &selection else {
                    return Err(ConfigError::RootWithExclude);
                };
                if let Some(outside) = paths.iter().find(|p| !path::is_within(p, &root)) {
                    return Err(ConfigError::RootNotCovering {
                        root,
                        path: outside.clone(),
                    });
                }
                // Redefining the root to the root changes nothing.
                (!root.is_empty()).then_some(root)
            }
        };

        Ok(FilterOptions {
            selection,
            drop_empty: self.drop_empty,
            redefine_root,
            add_delete: self.add_delete,
            synthetic: self.synthetic.clone(),
        })
    }
}

#[must_use]
pub fn user_config_path() -> Option<PathBuf> {
    dirs::config_dir().map(|dir| dir.join("svnsift/config.toml"))
}

fn normalize_one(raw: &str) -> Result<String, ConfigError> {
    let normalized = path::normalize(raw.trim());
    if path::segments(normalized).any(|s| s == "." || s == "..") || normalized.contains("//") {
        return Err(ConfigError::InvalidPath {
            path: raw.to_string(),
        });
    }
    Ok(normalized.to_string())
}

fn normalize_all(raw: &[String]) -> Result<Vec<String>, ConfigError> {
    let mut out: Vec<String> = Vec::with_capacity(raw.len());
    for path in raw {
        let normalized = normalize_one(path)?;
        if !out.contains(&normalized) {
            out.push(normalized);
        }
    }
    Ok(out)
}

fn default_author() -> String {
    "svnsift".to_string()
}

fn default_message() -> String {
    "Deleted unwanted nodes".to_string()
}

// ---------------------------------------------------------------------------
// Validated options
// ---------------------------------------------------------------------------

/// Which paths the user asked for.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "mode", content = "paths", rename_all = "lowercase")]
pub enum Selection {
    /// Keep these subtrees (and what they depend on). `""` is the whole tree.
    Include(Vec<String>),
    /// Keep everything except these subtrees (and what the rest depends on).
    Exclude(Vec<String>),
}

impl Selection {
    #[must_use]
    pub fn paths(&self) -> &[String] {
        match self {
            Self::Include(paths) | Self::Exclude(paths) => paths,
        }
    }

    #[must_use]
    pub const fn is_include(&self) -> bool {
        matches!(self, Self::Include(_))
    }

    /// Whether the rules select `path` directly.
    #[must_use]
    pub fn selects(&self, candidate: &str) -> bool {
        let listed = self.paths().iter().any(|p| path::is_within(candidate, p));
        match self {
            Self::Include(_) => listed,
            Self::Exclude(_) => !listed,
        }
    }
}

/// Validated settings for one run.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FilterOptions {
    pub selection: Selection,
    pub drop_empty: bool,
    /// Normalized, never the repository root itself.
    pub redefine_root: Option<String>,
    pub add_delete: bool,
    pub synthetic: SyntheticConfig,
}

impl FilterOptions {
    /// Include `paths` with every other option off.
    #[must_use]
    pub fn include<S: AsRef<str>>(paths: &[S]) -> Self {
        Self::plain(Selection::Include(
            paths.iter().map(|p| path::normalize(p.as_ref()).to_string()).collect(),
        ))
    }

    /// Exclude `paths` with every other option off.
    #[must_use]
    pub fn exclude<S: AsRef<str>>(paths: &[S]) -> Self {
        Self::plain(Selection::Exclude(
            paths.iter().map(|p| path::normalize(p.as_ref()).to_string()).collect(),
        ))
    }

    fn plain(selection: Selection) -> Self {
        Self {
            selection,
            drop_empty: false,
            redefine_root: None,
            add_delete: false,
            synthetic: SyntheticConfig::default(),
        }
    }
}

// ---------------------------------------------------------------------------
// Output mode
// ---------------------------------------------------------------------------

/// Pick the report format: `--json`, then `SVNSIFT_FORMAT`, then the config
/// file, then `pretty` on a terminal and `text` otherwise.
#[must_use]
pub fn resolve_output(
    cli_json: bool,
    user_output: Option<&str>,
    env_format: Option<&str>,
) -> &'static str {
    fn normalize_output_mode(raw: &str) -> Option<&'static str> {
        match raw.trim().to_ascii_lowercase().as_str() {
            "pretty" | "human" => Some("pretty"),
            "text" | "plain" => Some("text"),
            "json" => Some("json"),
            _ => None,
        }
    }

    if cli_json {
        return "json";
    }
    if let Some(mode) = env_format.and_then(normalize_output_mode) {
        return mode;
    }
    if let Some(mode) = user_output.and_then(normalize_output_mode) {
        return mode;
    }
    if std::io::stdout().is_terminal() {
        "pretty"
    } else {
        "text"
    }
}
