//! `validate` command implementation.

use tracing::info;

use crate::cli::ValidateArgs;
use crate::error::{CliError, Result};

/// Execute the `validate` command
pub fn run_validate(args: &ValidateArgs) -> Result<()> {
    if !args.config.exists() {
        return Err(CliError::config_not_found(
            args.config.display().to_string(),
        ));
    }

    let result = config_loader::ConfigLoader::load_from_path(&args.config);

    if args.json {
        let report = match &result {
            Ok(blueprint) => serde_json::json!({
                "valid": true,
                "client_id": blueprint.node.client_id,
                "streams": blueprint.streams.len(),
            }),
            Err(e) => serde_json::json!({
                "valid": false,
                "error": e.to_string(),
            }),
        };
        println!("{}", serde_json::to_string_pretty(&report)?);
        result
            .map(|_| ())
            .map_err(|e| CliError::config_load(args.config.display().to_string(), e))
    } else {
        let blueprint = result
            .map_err(|e| CliError::config_load(args.config.display().to_string(), e))?;
        info!(
            client_id = %blueprint.node.client_id,
            streams = blueprint.streams.len(),
            "Configuration is valid"
        );
        println!("OK: {}", args.config.display());
        Ok(())
    }
}
