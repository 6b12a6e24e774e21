//! Export and import of the full dataset as JSON

use std::path::Path;

use tracing::info;

use super::CliContext;
use crate::error::{EngineError, EngineResult};

/// Write the dataset to `output`, or stdout when none is given
pub fn handle_export_command(ctx: &CliContext<'_>, output: Option<&Path>) -> EngineResult<()> {
    let json = ctx.storage.export_json()?;
    match output {
        Some(path) => {
            std::fs::write(path, json)
                .map_err(|e| EngineError::Io(format!("Failed to write {}: {}", path.display(), e)))?;
            info!(path = %path.display(), "dataset exported");
            println!("Exported to {}", path.display());
        }
        None => println!("{}", json),
    }
    Ok(())
}

/// Replace the dataset with an export; rejected if it is inconsistent
pub fn handle_import_command(ctx: &CliContext<'_>, input: &Path) -> EngineResult<()> {
    let json = std::fs::read_to_string(input)
        .map_err(|e| EngineError::Io(format!("Failed to read {}: {}", input.display(), e)))?;
    ctx.storage.import_json(&json)?;
    info!(path = %input.display(), "dataset imported");
    println!("Imported {}", input.display());
    Ok(())
}
