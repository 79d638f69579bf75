//! `info` command implementation.

use crate::cli::InfoArgs;
use crate::error::{CliError, Result};

/// Execute the `info` command
pub fn run_info(args: &InfoArgs) -> Result<()> {
    let blueprint = config_loader::ConfigLoader::load_from_path(&args.config)
        .map_err(|e| CliError::config_load(args.config.display().to_string(), e))?;

    if args.json {
        let json = config_loader::ConfigLoader::to_json(&blueprint)
            .map_err(|e| CliError::config_load(args.config.display().to_string(), e))?;
        println!("{json}");
        return Ok(());
    }

    println!("Node configuration: {}", args.config.display());
    println!("  client_id:        {}", blueprint.node.client_id);
    println!("  output_dir:       {}", blueprint.node.output_dir.display());
    println!("  rpc port:         {}", blueprint.rpc.port);
    println!(
        "  heartbeat:        {} ms (expire after {} periods)",
        blueprint.heartbeat.period_ms, blueprint.heartbeat.expire_periods
    );
    println!(
        "  sntp burst:       {} samples / {} ms spacing / {} ms deadline / {} retries",
        blueprint.sntp.burst_size,
        blueprint.sntp.spacing_ms,
        blueprint.sntp.sample_deadline_ms,
        blueprint.sntp.max_retries
    );
    println!(
        "  frame period:     {} ns (goal phase {} ns, tolerance {} ns)",
        blueprint.phase.frame_period_ns,
        blueprint.phase.goal_phase_ns,
        blueprint.phase.tolerance_ns
    );
    println!("  trigger lead:     {} ms", blueprint.trigger.future_lead_ms);
    println!("  streams:          {}", blueprint.streams.len());
    for (idx, stream) in blueprint.streams.iter().enumerate() {
        println!(
            "    [{}] max_outstanding = {}",
            idx, stream.max_outstanding
        );
    }

    Ok(())
}
