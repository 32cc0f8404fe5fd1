//! Provider status conditions.

use chrono::Utc;
use crds::{
    Condition, ConditionStatus, MACHINE_CREATED_CONDITION, MACHINE_CREATION_FAILED, MACHINE_CREATION_SUCCEEDED,
};

/// Insert or replace the condition of the same type.
///
/// The transition time moves only when the status flips.
pub fn set_condition(conditions: &mut Vec<Condition>, mut condition: Condition) {
    match conditions
        .iter_mut()
        .find(|c| c.condition_type == condition.condition_type)
    {
        Some(existing) => {
            condition.last_transition_time = if existing.status == condition.status {
                existing.last_transition_time
            } else {
                Some(Utc::now())
            };
            *existing = condition;
        }
        None => {
            condition.last_transition_time = Some(Utc::now());
            conditions.push(condition);
        }
    }
}

pub fn creation_succeeded() -> Condition {
    Condition {
        condition_type: MACHINE_CREATED_CONDITION.to_string(),
        status: ConditionStatus::True,
        reason: MACHINE_CREATION_SUCCEEDED.to_string(),
        message: "machine successfully created".to_string(),
        last_transition_time: None,
    }
}

pub fn creation_failed(message: impl Into<String>) -> Condition {
    Condition {
        condition_type: MACHINE_CREATED_CONDITION.to_string(),
        status: ConditionStatus::False,
        reason: MACHINE_CREATION_FAILED.to_string(),
        message: message.into(),
        last_transition_time: None,
    }
}
