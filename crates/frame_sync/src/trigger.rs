//! Scheduled capture triggering.
//!
//! Frames flow continuously and are discarded; once a goal timestamp is
//! armed, the first bundle whose leader-domain timestamp reaches it is
//! handed to persistence and the scheduler disarms.

use std::sync::atomic::{AtomicBool, AtomicI64, Ordering};

use contracts::TriggerTicket;
use metrics::counter;
use tracing::{debug, info};

/// What to do with one bundle.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TriggerDecision {
    /// Hand the bundle to the persistence collaborator
    Persist(TriggerTicket),
    /// Release the bundle
    Discard,
}

/// Arms on `SET_TRIGGER_TIME`, fires on the first qualifying frame.
#[derive(Debug, Default)]
pub struct TriggerScheduler {
    /// Armed goal in the leader domain; 0 means disarmed
    goal_ns: AtomicI64,
    /// Whether the goal was already in the past at arming time
    lead_underflow: AtomicBool,
}

impl TriggerScheduler {
    pub fn new() -> Self {
        Self::default()
    }

    /// Arm for the given leader-domain goal.
    ///
    /// A goal at or before `now_leader_ns` means the broadcast lead was
    /// insufficient; the scheduler arms anyway and the next frame will
    /// match, with the underflow recorded in the ticket.
    ///
    /// Returns the pending delay until the goal (negative on underflow).
    pub fn arm(&self, goal_leader_ns: i64, now_leader_ns: i64) -> i64 {
        let pending_ns = goal_leader_ns - now_leader_ns;
        let underflow = pending_ns <= 0;
        self.lead_underflow.store(underflow, Ordering::Release);
        self.goal_ns.store(goal_leader_ns, Ordering::Release);
        info!(
            goal_leader_ns,
            pending_ms = pending_ns / 1_000_000,
            underflow,
            "trigger armed"
        );
        counter!("shutter_sync_triggers_armed_total").increment(1);
        pending_ns
    }

    /// Drop the armed goal without firing.
    pub fn disarm(&self) {
        if self.goal_ns.swap(0, Ordering::AcqRel) != 0 {
            debug!("trigger disarmed");
        }
    }

    pub fn is_armed(&self) -> bool {
        self.goal_ns.load(Ordering::Acquire) != 0
    }

    /// Decide the fate of one bundle.
    ///
    /// Injection frames never fire the trigger. Exactly one bundle fires
    /// per armed goal even under concurrent evaluation.
    pub fn evaluate(&self, leader_ts_ns: i64, is_injection: bool) -> TriggerDecision {
        let goal = self.goal_ns.load(Ordering::Acquire);
        if goal == 0 || is_injection || leader_ts_ns < goal {
            return TriggerDecision::Discard;
        }

        // First qualifying frame wins; losers of the race discard.
        if self
            .goal_ns
            .compare_exchange(goal, 0, Ordering::AcqRel, Ordering::Acquire)
            .is_err()
        {
            return TriggerDecision::Discard;
        }

        counter!("shutter_sync_triggers_fired_total").increment(1);
        info!(goal_leader_ns = goal, leader_ts_ns, "trigger fired");
        TriggerDecision::Persist(TriggerTicket {
            goal_leader_ns: goal,
            leader_ts_ns,
            lead_underflow: self.lead_underflow.load(Ordering::Acquire),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    /// The first frame at or past the goal fires exactly once; everything
    /// before and after is discarded.
    #[test]
    fn test_first_qualifying_frame_fires() {
        let trigger = TriggerScheduler::new();
        trigger.arm(10_000_000, 9_000_000);

        let timestamps = [9_900_000, 9_970_000, 10_010_000, 10_043_000];
        let mut persisted = Vec::new();
        for ts in timestamps {
            if let TriggerDecision::Persist(ticket) = trigger.evaluate(ts, false) {
                persisted.push(ticket);
            }
        }

        assert_eq!(persisted.len(), 1);
        assert_eq!(persisted[0].leader_ts_ns, 10_010_000);
        assert_eq!(persisted[0].goal_leader_ns, 10_000_000);
        assert!(!persisted[0].lead_underflow);
        assert!(!trigger.is_armed());
    }

    #[test]
    fn test_disarmed_discards_everything() {
        let trigger = TriggerScheduler::new();
        assert_eq!(trigger.evaluate(i64::MAX, false), TriggerDecision::Discard);
    }

    #[test]
    fn test_injection_frames_never_fire() {
        let trigger = TriggerScheduler::new();
        trigger.arm(1_000, 500);
        assert_eq!(trigger.evaluate(2_000, true), TriggerDecision::Discard);
        // Still armed for the next real frame.
        assert!(trigger.is_armed());
        assert!(matches!(
            trigger.evaluate(2_000, false),
            TriggerDecision::Persist(_)
        ));
    }

    #[test]
    fn test_underflow_arms_anyway() {
        let trigger = TriggerScheduler::new();
        let pending = trigger.arm(1_000, 5_000);
        assert!(pending < 0);

        match trigger.evaluate(6_000, false) {
            TriggerDecision::Persist(ticket) => {
                assert!(ticket.lead_underflow);
                assert_eq!(ticket.leader_ts_ns, 6_000);
            }
            TriggerDecision::Discard => panic!("underflow goal must still fire"),
        }
    }

    #[test]
    fn test_rearm_after_fire() {
        let trigger = TriggerScheduler::new();
        trigger.arm(1_000, 0);
        assert!(matches!(
            trigger.evaluate(1_500, false),
            TriggerDecision::Persist(_)
        ));

        trigger.arm(2_000, 1_500);
        assert_eq!(trigger.evaluate(1_900, false), TriggerDecision::Discard);
        assert!(matches!(
            trigger.evaluate(2_100, false),
            TriggerDecision::Persist(_)
        ));
    }
}
