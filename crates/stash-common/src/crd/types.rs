//! Shared status types

use chrono::{DateTime, Utc};
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

/// Condition status following Kubernetes conventions
#[derive(Clone, Debug, Default, Deserialize, Serialize, JsonSchema, PartialEq, Eq)]
pub enum ConditionStatus {
    /// Condition is true
    True,
    /// Condition is false
    False,
    /// Condition status is unknown
    #[default]
    Unknown,
}

impl std::fmt::Display for ConditionStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::True => write!(f, "True"),
            Self::False => write!(f, "False"),
            Self::Unknown => write!(f, "Unknown"),
        }
    }
}

/// Condition types set on maintenance requests
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ConditionType {
    /// The Job for this request exists in the cluster
    Ready,
    /// The Job is running
    Progressing,
    /// The Job has finished
    Completed,
}

impl std::fmt::Display for ConditionType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Ready => write!(f, "Ready"),
            Self::Progressing => write!(f, "Progressing"),
            Self::Completed => write!(f, "Completed"),
        }
    }
}

impl From<ConditionType> for String {
    fn from(t: ConditionType) -> Self {
        t.to_string()
    }
}

/// Machine-readable condition reasons
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ConditionReason {
    /// The Job was created or updated
    Started,
    /// The Job could not be created or updated
    CreationFailed,
    /// The Job completed successfully
    Succeeded,
    /// The Job failed
    Failed,
}

impl std::fmt::Display for ConditionReason {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Started => write!(f, "Started"),
            Self::CreationFailed => write!(f, "CreationFailed"),
            Self::Succeeded => write!(f, "Succeeded"),
            Self::Failed => write!(f, "Failed"),
        }
    }
}

impl From<ConditionReason> for String {
    fn from(r: ConditionReason) -> Self {
        r.to_string()
    }
}

/// Kubernetes-style condition for status reporting
#[derive(Clone, Debug, Deserialize, Serialize, JsonSchema, PartialEq)]
pub struct Condition {
    /// Type of condition (e.g., Ready)
    #[serde(rename = "type")]
    pub type_: String,

    /// Status of the condition (True, False, Unknown)
    pub status: ConditionStatus,

    /// Machine-readable reason for the condition
    pub reason: String,

    /// Human-readable message
    pub message: String,

    /// Last time the condition transitioned
    #[serde(rename = "lastTransitionTime")]
    pub last_transition_time: DateTime<Utc>,
}

impl Condition {
    /// Create a new condition with the current timestamp
    pub fn new(
        type_: impl Into<String>,
        status: ConditionStatus,
        reason: impl Into<String>,
        message: impl Into<String>,
    ) -> Self {
        Self {
            type_: type_.into(),
            status,
            reason: reason.into(),
            message: message.into(),
            last_transition_time: Utc::now(),
        }
    }
}

/// Insert or replace the condition with the same type.
///
/// The previous transition time is kept when the status did not change, so
/// repeated reconciles do not look like flapping.
pub fn set_condition(conditions: &mut Vec<Condition>, mut condition: Condition) {
    match conditions.iter_mut().find(|c| c.type_ == condition.type_) {
        Some(existing) => {
            if existing.status == condition.status {
                condition.last_transition_time = existing.last_transition_time;
            }
            *existing = condition;
        }
        None => conditions.push(condition),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration;

    #[test]
    fn default_status_is_unknown() {
        assert_eq!(ConditionStatus::default(), ConditionStatus::Unknown);
    }

    #[test]
    fn condition_serializes_with_kubernetes_field_names() {
        let condition = Condition::new(
            ConditionType::Ready,
            ConditionStatus::True,
            ConditionReason::Started,
            "the job 'backups/prune-nightly' was created",
        );
        let json = serde_json::to_value(&condition).unwrap();
        assert_eq!(json["type"], "Ready");
        assert_eq!(json["status"], "True");
        assert_eq!(json["reason"], "Started");
        assert!(json.get("lastTransitionTime").is_some());
    }

    #[test]
    fn set_condition_appends_new_types() {
        let mut conditions = vec![];
        set_condition(
            &mut conditions,
            Condition::new("Ready", ConditionStatus::True, "Started", "ok"),
        );
        set_condition(
            &mut conditions,
            Condition::new("Completed", ConditionStatus::Unknown, "Started", "running"),
        );
        assert_eq!(conditions.len(), 2);
    }

    #[test]
    fn set_condition_keeps_transition_time_when_status_unchanged() {
        let mut first = Condition::new("Ready", ConditionStatus::True, "Started", "first");
        first.last_transition_time = Utc::now() - Duration::hours(1);
        let original_time = first.last_transition_time;
        let mut conditions = vec![first];

        set_condition(
            &mut conditions,
            Condition::new("Ready", ConditionStatus::True, "Started", "second"),
        );

        assert_eq!(conditions.len(), 1);
        assert_eq!(conditions[0].message, "second");
        assert_eq!(conditions[0].last_transition_time, original_time);
    }

    #[test]
    fn set_condition_bumps_transition_time_on_status_change() {
        let mut first = Condition::new("Ready", ConditionStatus::True, "Started", "ok");
        first.last_transition_time = Utc::now() - Duration::hours(1);
        let original_time = first.last_transition_time;
        let mut conditions = vec![first];

        set_condition(
            &mut conditions,
            Condition::new(
                "Ready",
                ConditionStatus::False,
                ConditionReason::CreationFailed,
                "could not create job",
            ),
        );

        assert_eq!(conditions[0].status, ConditionStatus::False);
        assert_eq!(conditions[0].reason, "CreationFailed");
        assert!(conditions[0].last_transition_time > original_time);
    }
}
