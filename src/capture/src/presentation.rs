//! One-time legend registration in the analyzer's color-filter file.

use anyhow::{Context, Result};
use ipcsniff_common::constants::{LEGEND_ENTRIES, LEGEND_MARKER};
use std::io::Write;
use std::path::Path;
use tracing::debug;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LegendOutcome {
    Registered,
    AlreadyPresent,
    /// No color-filter file at the configured path.
    FileMissing,
}

pub fn legend_lines() -> String {
    LEGEND_ENTRIES
        .iter()
        .map(|(title, filter, colors)| format!("@{title}@{filter}@{colors}\n"))
        .collect()
}

/// Appends the frame legend unless the file already carries it.
pub fn register_legend(colorfilters_file: &Path) -> Result<LegendOutcome> {
    if !colorfilters_file.is_file() {
        return Ok(LegendOutcome::FileMissing);
    }

    let existing = std::fs::read_to_string(colorfilters_file)
        .with_context(|| format!("Failed to read {}", colorfilters_file.display()))?;
    if existing.contains(LEGEND_MARKER) {
        debug!("legend already present in {}", colorfilters_file.display());
        return Ok(LegendOutcome::AlreadyPresent);
    }

    let mut file = std::fs::OpenOptions::new()
        .append(true)
        .open(colorfilters_file)
        .with_context(|| format!("Failed to open {}", colorfilters_file.display()))?;
    if !existing.is_empty() && !existing.ends_with('\n') {
        file.write_all(b"\n")?;
    }
    file.write_all(legend_lines().as_bytes())
        .with_context(|| format!("Failed to write {}", colorfilters_file.display()))?;

    Ok(LegendOutcome::Registered)
}
