pub mod completions;
pub mod filter;
pub mod query;
pub mod strip;

use std::path::Path;

use anyhow::Context;
use clap::Args;
use svnsift_core::{FilterConfig, SiftError};

/// Include/exclude flags shared by `filter` and `query`.
#[derive(Args, Debug, Default, Clone)]
pub struct SelectionArgs {
    /// Keep this subtree and everything it depends on. Repeatable.
    #[arg(short, long = "include", value_name = "PATH")]
    pub include: Vec<String>,

    /// Drop this subtree, except what kept paths depend on. Repeatable.
    #[arg(short, long = "exclude", value_name = "PATH")]
    pub exclude: Vec<String>,
}

/// Layer the user config, an explicit `--config` file and command-line
/// flags, lowest precedence first.
///
/// # Errors
///
/// Returns [`SiftError::Config`] when a config file cannot be read or parsed.
pub fn load_config(config: Option<&Path>, flags: FilterConfig) -> anyhow::Result<FilterConfig> {
    let mut merged = FilterConfig::load_user()
        .map_err(SiftError::from)
        .context("loading user config")?;
    if let Some(path) = config {
        let explicit = FilterConfig::load(path)
            .map_err(SiftError::from)
            .with_context(|| format!("loading {}", path.display()))?;
        merged = merged.merge(explicit);
    }
    Ok(merged.merge(flags))
}
