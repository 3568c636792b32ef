//! # Conditions
//!
//! Set-condition semantics for the `conditions` list of a GeneratedSecret.

use crate::crd::Condition;

/// Insert or update the condition of `type_`
///
/// `lastTransitionTime` only moves when the condition is new or its status
/// flips. Returns whether anything changed.
pub fn set_condition(
    conditions: &mut Vec<Condition>,
    type_: &str,
    status: &str,
    reason: &str,
    message: &str,
    observed_generation: Option<i64>,
) -> bool {
    let now = chrono::Utc::now().to_rfc3339();
    match conditions.iter_mut().find(|c| c.r#type == type_) {
        Some(existing) => {
            let mut changed = false;
            if existing.status != status {
                existing.status = status.to_string();
                existing.last_transition_time = Some(now);
                changed = true;
            }
            if existing.reason.as_deref() != Some(reason) {
                existing.reason = Some(reason.to_string());
                changed = true;
            }
            if existing.message.as_deref() != Some(message) {
                existing.message = Some(message.to_string());
                changed = true;
            }
            if existing.observed_generation != observed_generation {
                existing.observed_generation = observed_generation;
                changed = true;
            }
            changed
        }
        None => {
            conditions.push(Condition {
                r#type: type_.to_string(),
                status: status.to_string(),
                last_transition_time: Some(now),
                reason: Some(reason.to_string()),
                message: Some(message.to_string()),
                observed_generation,
            });
            true
        }
    }
}

/// Drop the condition of `type_`, returning whether one was present
pub fn remove_condition(conditions: &mut Vec<Condition>, type_: &str) -> bool {
    let before = conditions.len();
    conditions.retain(|c| c.r#type != type_);
    conditions.len() != before
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_new_condition_is_added() {
        let mut conditions = Vec::new();
        assert!(set_condition(&mut conditions, "Ready", "True", "SecretsGenerated", "ok", Some(1)));
        assert_eq!(conditions.len(), 1);
        assert_eq!(conditions[0].r#type, "Ready");
        assert_eq!(conditions[0].status, "True");
        assert_eq!(conditions[0].observed_generation, Some(1));
    }

    #[test]
    fn test_transition_time_only_moves_on_status_flip() {
        let mut conditions = Vec::new();
        set_condition(&mut conditions, "Ready", "False", "A", "first", Some(1));
        conditions[0].last_transition_time = Some("2020-01-01T00:00:00+00:00".to_string());

        assert!(set_condition(&mut conditions, "Ready", "False", "B", "second", Some(2)));
        assert_eq!(
            conditions[0].last_transition_time.as_deref(),
            Some("2020-01-01T00:00:00+00:00")
        );
        assert_eq!(conditions[0].reason.as_deref(), Some("B"));

        assert!(set_condition(&mut conditions, "Ready", "True", "B", "second", Some(2)));
        assert_ne!(
            conditions[0].last_transition_time.as_deref(),
            Some("2020-01-01T00:00:00+00:00")
        );
    }

    #[test]
    fn test_identical_condition_is_unchanged() {
        let mut conditions = Vec::new();
        set_condition(&mut conditions, "Error", "True", "R", "m", None);
        assert!(!set_condition(&mut conditions, "Error", "True", "R", "m", None));
    }

    #[test]
    fn test_remove_condition() {
        let mut conditions = Vec::new();
        set_condition(&mut conditions, "Error", "True", "R", "m", None);
        set_condition(&mut conditions, "Ready", "False", "R", "m", None);
        assert!(remove_condition(&mut conditions, "Error"));
        assert!(!remove_condition(&mut conditions, "Error"));
        assert_eq!(conditions.len(), 1);
        assert_eq!(conditions[0].r#type, "Ready");
    }
}
