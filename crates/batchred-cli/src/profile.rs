//! Optional TOML profile for reducer options.
//!
//! ```toml
//! [reducer]
//! batch_size = 4
//! max_retries = 8
//! parallel_proving = false
//! ```
//!
//! Precedence, lowest first: defaults, profile, `BATCHRED_*` environment,
//! command-line flags.

use anyhow::{Context, Result};
use batchred_reducer::ReducerOptions;
use serde::Deserialize;
use std::path::Path;

#[derive(Debug, Default, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct Profile {
    pub reducer: ReducerOptions,
}

impl Profile {
    pub fn parse(text: &str) -> Result<Self> {
        toml::from_str(text).context("parsing TOML profile")
    }

    pub fn load(path: &Path) -> Result<Self> {
        let text = std::fs::read_to_string(path)
            .with_context(|| format!("reading profile {}", path.display()))?;
        Self::parse(&text).with_context(|| format!("in {}", path.display()))
    }
}

/// Command-line overrides; `None` keeps the lower layer's value.
#[derive(Debug, Default, Clone, Copy)]
pub struct Overrides {
    pub batch_size: Option<u32>,
    pub max_retries: Option<u32>,
    pub sequential: bool,
}

/// Resolve the effective options from every configuration layer.
pub fn resolve(profile: Option<&Path>, cli: Overrides) -> Result<ReducerOptions> {
    let base = match profile {
        Some(p) => Profile::load(p)?.reducer,
        None => ReducerOptions::default(),
    };
    Ok(apply(base.with_env_overrides(), cli))
}

fn apply(mut opts: ReducerOptions, cli: Overrides) -> ReducerOptions {
    if let Some(n) = cli.batch_size {
        opts.batch_size = n;
    }
    if let Some(n) = cli.max_retries {
        opts.max_retries = n;
    }
    if cli.sequential {
        opts.parallel_proving = false;
    }
    opts
}
