//! 配置校验模块
//!
//! 校验规则：
//! - client_id 非空且不含协议分隔符
//! - 至少一个图像流，且 max_outstanding >= 1
//! - phase 参数自洽 (goal < period, step_gain ∈ (0,1], clamp 范围合法)
//! - sntp 突发参数非零
//! - rpc 端口位于动态端口区间

use contracts::{NodeBlueprint, SyncError};

/// 校验 NodeBlueprint 配置
///
/// 返回第一个遇到的错误，或 Ok(())。
pub fn validate(blueprint: &NodeBlueprint) -> Result<(), SyncError> {
    validate_node(blueprint)?;
    validate_streams(blueprint)?;
    validate_phase(blueprint)?;
    validate_sntp(blueprint)?;
    validate_heartbeat(blueprint)?;
    validate_rpc(blueprint)?;
    Ok(())
}

/// 校验节点标识
fn validate_node(blueprint: &NodeBlueprint) -> Result<(), SyncError> {
    let id = &blueprint.node.client_id;
    if id.is_empty() {
        return Err(SyncError::config_validation(
            "node.client_id",
            "client_id cannot be empty",
        ));
    }
    // The heartbeat payload is comma-separated.
    if id.contains(',') {
        return Err(SyncError::config_validation(
            "node.client_id",
            "client_id cannot contain ','",
        ));
    }
    Ok(())
}

/// 校验图像流定义
fn validate_streams(blueprint: &NodeBlueprint) -> Result<(), SyncError> {
    if blueprint.streams.is_empty() {
        return Err(SyncError::config_validation(
            "streams",
            "at least one image stream is required",
        ));
    }
    for (idx, stream) in blueprint.streams.iter().enumerate() {
        if stream.max_outstanding == 0 {
            return Err(SyncError::config_validation(
                format!("streams[{idx}].max_outstanding"),
                "max_outstanding must be >= 1",
            ));
        }
    }
    Ok(())
}

/// 校验相位对齐参数
fn validate_phase(blueprint: &NodeBlueprint) -> Result<(), SyncError> {
    let phase = &blueprint.phase;

    if phase.frame_period_ns <= 0 {
        return Err(SyncError::config_validation(
            "phase.frame_period_ns",
            format!("frame period must be > 0, got {}", phase.frame_period_ns),
        ));
    }
    if phase.goal_phase_ns < 0 || phase.goal_phase_ns >= phase.frame_period_ns {
        return Err(SyncError::config_validation(
            "phase.goal_phase_ns",
            format!(
                "goal phase {} must lie in [0, {})",
                phase.goal_phase_ns, phase.frame_period_ns
            ),
        ));
    }
    if phase.step_gain <= 0.0 || phase.step_gain > 1.0 {
        return Err(SyncError::config_validation(
            "phase.step_gain",
            format!("step_gain must be in (0, 1], got {}", phase.step_gain),
        ));
    }
    if phase.tolerance_ns < 0 {
        return Err(SyncError::config_validation(
            "phase.tolerance_ns",
            "tolerance cannot be negative",
        ));
    }
    if phase.min_inject_exposure_ns <= 0
        || phase.min_inject_exposure_ns > phase.max_inject_exposure_ns
    {
        return Err(SyncError::config_validation(
            "phase.min_inject_exposure_ns / phase.max_inject_exposure_ns",
            format!(
                "injection exposure bounds [{}, {}] are not a valid positive range",
                phase.min_inject_exposure_ns, phase.max_inject_exposure_ns
            ),
        ));
    }
    Ok(())
}

/// 校验 SNTP 突发参数
fn validate_sntp(blueprint: &NodeBlueprint) -> Result<(), SyncError> {
    let sntp = &blueprint.sntp;
    if sntp.burst_size == 0 {
        return Err(SyncError::config_validation(
            "sntp.burst_size",
            "burst_size must be >= 1",
        ));
    }
    if sntp.sample_deadline_ms == 0 {
        return Err(SyncError::config_validation(
            "sntp.sample_deadline_ms",
            "sample deadline must be >= 1 ms",
        ));
    }
    if sntp.max_retries == 0 {
        return Err(SyncError::config_validation(
            "sntp.max_retries",
            "max_retries must be >= 1",
        ));
    }
    Ok(())
}

/// 校验心跳参数
fn validate_heartbeat(blueprint: &NodeBlueprint) -> Result<(), SyncError> {
    let hb = &blueprint.heartbeat;
    if hb.period_ms == 0 {
        return Err(SyncError::config_validation(
            "heartbeat.period_ms",
            "heartbeat period must be >= 1 ms",
        ));
    }
    if hb.expire_periods == 0 {
        return Err(SyncError::config_validation(
            "heartbeat.expire_periods",
            "expire_periods must be >= 1",
        ));
    }
    Ok(())
}

/// 校验 RPC 端口
fn validate_rpc(blueprint: &NodeBlueprint) -> Result<(), SyncError> {
    if blueprint.rpc.port < 49_152 {
        return Err(SyncError::config_validation(
            "rpc.port",
            format!(
                "port {} must lie in the dynamic range [49152, 65535]",
                blueprint.rpc.port
            ),
        ));
    }
    Ok(())
}
