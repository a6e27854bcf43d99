//! Configure command - persist connection settings

use anyhow::Result;
use std::path::Path;

use crate::config::MergedConfig;
use crate::output::OutputContext;

pub fn configure(merged: &MergedConfig, path: &Path, ctx: &OutputContext) -> Result<()> {
    merged.to_config().save_to(path)?;
    ctx.success(&format!("Configuration written to {}", path.display()));
    Ok(())
}
