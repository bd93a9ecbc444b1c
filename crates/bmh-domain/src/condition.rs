use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Condition type vocabulary from spec §3/§6. `Other` keeps the type open for
/// subsystems that add a condition this core doesn't name explicitly.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub enum ConditionType {
    Validated,
    HardwareProvisioned,
    Configured,
    Provisioned,
    Other(String),
}

impl std::fmt::Display for ConditionType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ConditionType::Validated => write!(f, "Validated"),
            ConditionType::HardwareProvisioned => write!(f, "HardwareProvisioned"),
            ConditionType::Configured => write!(f, "Configured"),
            ConditionType::Provisioned => write!(f, "Provisioned"),
            ConditionType::Other(s) => write!(f, "{s}"),
        }
    }
}

/// Reason vocabulary from spec §6.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub enum ConditionReason {
    InProgress,
    Completed,
    Failed,
    InvalidInput,
    ConfigUpdate,
    ConfigApplied,
    AwaitConfig,
    Other(String),
}

impl std::fmt::Display for ConditionReason {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ConditionReason::InProgress => write!(f, "InProgress"),
            ConditionReason::Completed => write!(f, "Completed"),
            ConditionReason::Failed => write!(f, "Failed"),
            ConditionReason::InvalidInput => write!(f, "InvalidInput"),
            ConditionReason::ConfigUpdate => write!(f, "ConfigUpdate"),
            ConditionReason::ConfigApplied => write!(f, "ConfigApplied"),
            ConditionReason::AwaitConfig => write!(f, "AwaitConfig"),
            ConditionReason::Other(s) => write!(f, "{s}"),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ConditionStatus {
    True,
    False,
    Unknown,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Condition {
    #[serde(rename = "type")]
    pub type_: ConditionType,
    pub status: ConditionStatus,
    pub reason: ConditionReason,
    pub message: String,
    pub observed_generation: u64,
    pub last_transition_time: DateTime<Utc>,
}

impl Condition {
    pub fn new(
        type_: ConditionType,
        status: ConditionStatus,
        reason: ConditionReason,
        message: impl Into<String>,
        observed_generation: u64,
        now: DateTime<Utc>,
    ) -> Self {
        Self {
            type_,
            status,
            reason,
            message: message.into(),
            observed_generation,
            last_transition_time: now,
        }
    }
}

/// Set (insert-or-replace-by-type) a condition on a status's condition list.
///
/// Normal operation only ratchets conditions forward (spec §3 invariant);
/// this helper performs the mechanical replace-by-type and leaves the
/// ratchet-direction decision to the caller, since only the caller knows
/// whether a given transition is a legitimate forward move or an allowed
/// clear-on-recovery.
pub fn set_condition(conditions: &mut Vec<Condition>, new: Condition) {
    if let Some(existing) = conditions.iter_mut().find(|c| c.type_ == new.type_) {
        *existing = new;
    } else {
        conditions.push(new);
    }
}

pub fn find_condition<'a>(
    conditions: &'a [Condition],
    type_: &ConditionType,
) -> Option<&'a Condition> {
    conditions.iter().find(|c| &c.type_ == type_)
}
