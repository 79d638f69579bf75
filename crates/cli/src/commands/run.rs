//! `leader` / `client` command implementation.

use std::time::Duration;
use tracing::info;

use crate::cli::RunArgs;
use crate::error::{CliError, Result};
use crate::pipeline::{Pipeline, PipelineConfig, Role};

/// Execute the `leader` command
pub async fn run_leader(args: &RunArgs) -> Result<()> {
    run_node(args, Role::Leader).await
}

/// Execute the `client` command
pub async fn run_client(args: &RunArgs) -> Result<()> {
    run_node(args, Role::Client).await
}

async fn run_node(args: &RunArgs, role: Role) -> Result<()> {
    info!(config = %args.config.display(), ?role, "Loading configuration");

    // Validate config path
    if !args.config.exists() {
        return Err(CliError::config_not_found(
            args.config.display().to_string(),
        ));
    }

    // Load and parse configuration
    let mut blueprint = config_loader::ConfigLoader::load_from_path(&args.config)
        .map_err(|e| CliError::config_load(args.config.display().to_string(), e))?;

    // Apply CLI overrides
    if let Some(port) = args.port {
        info!(port, "Overriding RPC port from CLI");
        blueprint.rpc.port = port;
    }
    if let Some(ref client_id) = args.client_id {
        info!(client_id = %client_id, "Overriding client id from CLI");
        blueprint.node.client_id = client_id.clone();
    }
    if let Some(leader_addr) = args.leader_addr {
        info!(%leader_addr, "Overriding discovery address from CLI");
        blueprint.rpc.broadcast_addr = Some(leader_addr);
    }
    if let Some(ref output_dir) = args.output_dir {
        blueprint.node.output_dir = output_dir.clone();
    }

    info!(
        client_id = %blueprint.node.client_id,
        port = blueprint.rpc.port,
        streams = blueprint.streams.len(),
        frame_period_ns = blueprint.phase.frame_period_ns,
        "Configuration loaded"
    );

    // Dry run - just validate and exit
    if args.dry_run {
        info!("Dry run mode - configuration is valid, exiting");
        return Ok(());
    }

    let metrics_port = match (args.metrics_port, blueprint.node.metrics_port) {
        (0, 0) => None,
        (0, port) => Some(port),
        (port, _) => Some(port),
    };

    // Build pipeline configuration
    let pipeline_config = PipelineConfig {
        blueprint,
        role,
        max_captures: if args.max_captures == 0 {
            None
        } else {
            Some(args.max_captures)
        },
        timeout: if args.timeout == 0 {
            None
        } else {
            Some(Duration::from_secs(args.timeout))
        },
        buffer_size: args.buffer_size,
        metrics_port,
        log_only: args.log_only,
        auto_trigger: if args.auto_trigger_ms == 0 || role == Role::Client {
            None
        } else {
            Some(Duration::from_millis(args.auto_trigger_ms))
        },
        phase_align_on_start: args.phase_align && role == Role::Leader,
    };

    // Create and run the node
    let pipeline = Pipeline::new(pipeline_config);
    let stats = pipeline.run().await?;

    info!(
        bundles = stats.bundles_matched,
        captures = stats.captures_persisted,
        "Node finished"
    );
    Ok(())
}
