//! 同步管线指标收集模块
//!
//! 记录匹配、丢弃、时钟协商与相位对齐的运行指标。

use contracts::MatchedBundle;
use metrics::{counter, gauge, histogram};

/// 每产生一个 MatchedBundle 时调用。
pub fn record_bundle_matched(bundle: &MatchedBundle) {
    counter!("shutter_syncer_bundles_total").increment(1);
    gauge!("shutter_syncer_last_sequence_id").set(bundle.metadata.sequence_id as f64);

    let dropped = bundle.dropped_streams.len();
    if dropped > 0 {
        counter!("shutter_syncer_bundle_slots_dropped_total").increment(dropped as u64);
    }
    gauge!("shutter_syncer_bundle_live_images").set(bundle.live_count() as f64);

    if bundle.is_injection() {
        counter!("shutter_syncer_injection_bundles_total").increment(1);
    }
}

/// 记录触发命中的持久化捕获
pub fn record_capture_persisted(leader_ts_ns: i64, goal_leader_ns: i64) {
    counter!("shutter_syncer_captures_total").increment(1);
    // 帧时间超出目标的量：触发粒度诊断
    histogram!("shutter_syncer_capture_slack_ns").record((leader_ts_ns - goal_leader_ns) as f64);
}

/// 记录相位测量
pub fn record_phase_sample(phase_error_ns: i64, aligned: bool) {
    gauge!("shutter_syncer_phase_error_ns").set(phase_error_ns as f64);
    gauge!("shutter_syncer_phase_aligned").set(if aligned { 1.0 } else { 0.0 });
}

/// Online mean/min/max accumulator for summary reporting.
#[derive(Debug, Clone, Default)]
pub struct RunningStats {
    count: u64,
    sum: f64,
    min: Option<f64>,
    max: Option<f64>,
}

impl RunningStats {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn record(&mut self, value: f64) {
        self.count += 1;
        self.sum += value;
        self.min = Some(self.min.map_or(value, |m| m.min(value)));
        self.max = Some(self.max.map_or(value, |m| m.max(value)));
    }

    pub fn count(&self) -> u64 {
        self.count
    }

    pub fn mean(&self) -> Option<f64> {
        (self.count > 0).then(|| self.sum / self.count as f64)
    }

    pub fn min(&self) -> Option<f64> {
        self.min
    }

    pub fn max(&self) -> Option<f64> {
        self.max
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_running_stats() {
        let mut stats = RunningStats::new();
        assert!(stats.mean().is_none());

        stats.record(1.0);
        stats.record(3.0);
        stats.record(2.0);

        assert_eq!(stats.count(), 3);
        assert_eq!(stats.mean(), Some(2.0));
        assert_eq!(stats.min(), Some(1.0));
        assert_eq!(stats.max(), Some(3.0));
    }
}
