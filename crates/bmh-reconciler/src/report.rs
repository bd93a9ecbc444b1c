use bmh_domain::{AllocatedNodeId, ConfigInProgressReason, HostRef, NarId, RequeueHint};
use serde::Serialize;

/// One side-effect the reconcile loop actually performed this cycle. Purely
/// descriptive — callers log or surface these, nothing downstream acts on
/// the `Change` value itself.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "kind")]
pub enum Change {
    HostReserved { nar_id: NarId, node_id: AllocatedNodeId, host: HostRef },
    NodeConfigInProgress { node_id: AllocatedNodeId, reason: ConfigInProgressReason },
    NodeConfigured { node_id: AllocatedNodeId },
    NodeFailed { node_id: AllocatedNodeId, message: String },
    NodeDeallocated { node_id: AllocatedNodeId },
}

/// Result of one reconciliation pass over a NAR: a requeue hint (combined
/// per `RequeueHint::combine`'s "shortest backoff wins" rule across every
/// sub-step that ran) plus the changes applied and any non-fatal per-resource
/// errors — genuine failures surface as `Err(ReconcileError)` from the
/// entry point instead, following the same "accumulate per-resource errors,
/// don't hard-abort" shape as the rest of this plugin's reconcile loops.
#[derive(Debug, Clone, Default, Serialize)]
pub struct ReconcileReport {
    pub requeue: RequeueHint,
    pub changes: Vec<Change>,
    pub errors: Vec<String>,
}

impl ReconcileReport {
    pub fn new() -> Self {
        Self { requeue: RequeueHint::None, changes: Vec::new(), errors: Vec::new() }
    }

    pub fn merge_requeue(&mut self, other: RequeueHint) {
        self.requeue = self.requeue.combine(other);
    }
}
