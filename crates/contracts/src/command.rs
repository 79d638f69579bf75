//! Commands relayed from the sync controller into the capture pipeline.

/// A command for the local capture pipeline.
///
/// Produced by the leader controller (local echo of its broadcasts) and
/// by the client controller (on receipt of a leader broadcast); consumed
/// by the pipeline orchestrator.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SyncCommand {
    /// Arm the trigger scheduler for the given leader-domain timestamp
    Trigger { goal_leader_ns: i64 },

    /// Start a phase alignment cycle
    PhaseAlign,

    /// Re-issue the repeating preview with manual 2A values
    Preview2A { exposure_ns: i64, sensitivity: i32 },
}
