/// Partial task updates
///
/// Clients send an arbitrary JSON object to update a task. Only `title`,
/// `completed` and `metadata` are recognized; every other key lands in an
/// overflow map and is dropped without error. Metadata is merged into the
/// task's existing map rather than replacing it.
///
/// # Example
///
/// ```
/// use std::collections::HashMap;
/// use serde_json::json;
/// use tasktrack_shared::models::task_update::merge_update;
///
/// let existing = HashMap::from([("a".to_string(), "1".to_string())]);
/// let merged = merge_update(&json!({"metadata": {"b": "2"}, "owner": "x"}), &existing).unwrap();
///
/// let metadata = merged.metadata.unwrap();
/// assert_eq!(metadata["a"], "1");
/// assert_eq!(metadata["b"], "2");
/// ```

use std::collections::HashMap;

use chrono::Utc;
use serde::Serialize;
use serde_json::{Map, Value};

/// Keys a client may set on a task
pub const ALLOWED_FIELDS: [&str; 3] = ["title", "completed", "metadata"];

/// Error type for update payloads
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum MergeError {
    /// The payload itself is not a JSON object
    #[error("Update payload must be a JSON object")]
    NotAnObject,

    /// A recognized field carries the wrong JSON type
    #[error("Field '{field}' must be {expected}")]
    TypeMismatch {
        field: &'static str,
        expected: &'static str,
    },

    /// `title` was supplied but is blank
    #[error("Field 'title' must not be empty")]
    EmptyTitle,
}

/// A recognized, type-checked update field
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TaskField {
    Title(String),
    Completed(bool),
    Metadata(HashMap<String, String>),
}

/// An update payload split into recognized fields and everything else
#[derive(Debug, Clone, Default, PartialEq)]
pub struct TaskUpdatePayload {
    /// Allow-listed fields, already type-checked
    pub fields: Vec<TaskField>,

    /// Keys outside the allow-list, kept only for logging
    pub overflow: Map<String, Value>,
}

impl TaskUpdatePayload {
    /// Filters and type-checks a raw payload
    ///
    /// The allow-list split happens before any field is inspected, so unknown
    /// keys never reach typed access.
    pub fn parse(raw: &Value) -> Result<Self, MergeError> {
        let object = raw.as_object().ok_or(MergeError::NotAnObject)?;

        let (recognized, overflow): (Vec<_>, Vec<_>) = object
            .iter()
            .partition(|(key, _)| ALLOWED_FIELDS.contains(&key.as_str()));

        let mut fields = Vec::with_capacity(recognized.len());
        for (key, value) in recognized {
            fields.push(parse_field(key, value)?);
        }

        Ok(Self {
            fields,
            overflow: overflow
                .into_iter()
                .map(|(k, v)| (k.clone(), v.clone()))
                .collect(),
        })
    }
}

fn parse_field(key: &str, value: &Value) -> Result<TaskField, MergeError> {
    match key {
        "title" => {
            let title = value.as_str().ok_or(MergeError::TypeMismatch {
                field: "title",
                expected: "a string",
            })?;
            if title.trim().is_empty() {
                return Err(MergeError::EmptyTitle);
            }
            Ok(TaskField::Title(title.to_string()))
        }
        "completed" => value
            .as_bool()
            .map(TaskField::Completed)
            .ok_or(MergeError::TypeMismatch {
                field: "completed",
                expected: "a boolean",
            }),
        "metadata" => {
            let mismatch = MergeError::TypeMismatch {
                field: "metadata",
                expected: "an object of string values",
            };
            let object = value.as_object().ok_or_else(|| mismatch.clone())?;

            let mut metadata = HashMap::with_capacity(object.len());
            for (k, v) in object {
                let v = v.as_str().ok_or_else(|| mismatch.clone())?;
                metadata.insert(k.clone(), v.to_string());
            }
            Ok(TaskField::Metadata(metadata))
        }
        // parse is only called with allow-listed keys
        other => unreachable!("unexpected task field '{}'", other),
    }
}

/// The field set to write back to a task
///
/// Serializes to exactly the fields that will change, e.g.
/// `{"title": "x", "updated_at": 1700000000}`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct MergedUpdate {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub title: Option<String>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub completed: Option<bool>,

    /// Full merged metadata map (existing keys plus the update's keys)
    #[serde(skip_serializing_if = "Option::is_none")]
    pub metadata: Option<HashMap<String, String>>,

    /// Only the keys the payload set
    ///
    /// Stores merge these into the metadata they hold at write time, so two
    /// concurrent updates touching different keys both land.
    #[serde(skip)]
    pub metadata_changes: Option<HashMap<String, String>>,

    /// Always set, even if no other field changes
    pub updated_at: i64,
}

/// Merges a raw update payload against a task's existing metadata
///
/// Stamps `updated_at` with the current time. `existing_metadata` is only
/// read; the merge works on a copy.
///
/// # Errors
///
/// Fails before merging anything if the payload is not an object or a
/// recognized field has the wrong type
pub fn merge_update(
    payload: &Value,
    existing_metadata: &HashMap<String, String>,
) -> Result<MergedUpdate, MergeError> {
    merge_update_at(payload, existing_metadata, Utc::now().timestamp())
}

/// [`merge_update`] with an explicit timestamp
pub fn merge_update_at(
    payload: &Value,
    existing_metadata: &HashMap<String, String>,
    now: i64,
) -> Result<MergedUpdate, MergeError> {
    let parsed = TaskUpdatePayload::parse(payload)?;

    if !parsed.overflow.is_empty() {
        tracing::debug!(
            dropped = ?parsed.overflow.keys().collect::<Vec<_>>(),
            "Dropping unrecognized task update fields"
        );
    }

    let mut merged = MergedUpdate {
        title: None,
        completed: None,
        metadata: None,
        metadata_changes: None,
        updated_at: now,
    };

    for field in parsed.fields {
        match field {
            TaskField::Title(title) => merged.title = Some(title),
            TaskField::Completed(completed) => merged.completed = Some(completed),
            TaskField::Metadata(update) => {
                let mut metadata = existing_metadata.clone();
                metadata.extend(update.clone());
                merged.metadata = Some(metadata);
                merged.metadata_changes = Some(update);
            }
        }
    }

    Ok(merged)
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn existing() -> HashMap<String, String> {
        HashMap::from([("a".to_string(), "1".to_string())])
    }

    #[test]
    fn test_unknown_keys_dropped_and_metadata_untouched() {
        let merged = merge_update_at(&json!({"title": "x", "hacker": "y"}), &existing(), 42).unwrap();

        assert_eq!(
            merged,
            MergedUpdate {
                title: Some("x".to_string()),
                completed: None,
                metadata: None,
                metadata_changes: None,
                updated_at: 42,
            }
        );
        assert_eq!(
            serde_json::to_value(&merged).unwrap(),
            json!({"title": "x", "updated_at": 42})
        );
    }

    #[test]
    fn test_metadata_merge_adds_keys() {
        let merged = merge_update_at(&json!({"metadata": {"b": "2"}}), &existing(), 1).unwrap();

        let expected = HashMap::from([
            ("a".to_string(), "1".to_string()),
            ("b".to_string(), "2".to_string()),
        ]);
        assert_eq!(merged.metadata, Some(expected));
    }

    #[test]
    fn test_metadata_changes_carry_only_payload_keys() {
        let merged = merge_update_at(&json!({"metadata": {"b": "2"}}), &existing(), 1).unwrap();

        assert_eq!(
            merged.metadata_changes,
            Some(HashMap::from([("b".to_string(), "2".to_string())]))
        );
        assert_eq!(
            serde_json::to_value(&merged).unwrap(),
            json!({"metadata": {"a": "1", "b": "2"}, "updated_at": 1})
        );
    }

    #[test]
    fn test_metadata_merge_overwrites_conflicting_key() {
        let merged = merge_update_at(&json!({"metadata": {"a": "9"}}), &existing(), 1).unwrap();

        assert_eq!(
            merged.metadata,
            Some(HashMap::from([("a".to_string(), "9".to_string())]))
        );
    }

    #[test]
    fn test_existing_metadata_not_mutated() {
        let before = existing();
        let _ = merge_update_at(&json!({"metadata": {"a": "9", "c": "3"}}), &before, 1).unwrap();

        assert_eq!(before, existing());
    }

    #[test]
    fn test_updated_at_always_stamped() {
        let merged = merge_update_at(&json!({}), &existing(), 1234).unwrap();
        assert_eq!(merged.updated_at, 1234);
        assert_eq!(serde_json::to_value(&merged).unwrap(), json!({"updated_at": 1234}));

        let merged = merge_update_at(&json!({"only": "junk"}), &existing(), 99).unwrap();
        assert_eq!(merged.updated_at, 99);
        assert!(merged.title.is_none() && merged.completed.is_none() && merged.metadata.is_none());
    }

    #[test]
    fn test_merge_update_uses_current_time() {
        let before = Utc::now().timestamp();
        let merged = merge_update(&json!({"completed": true}), &existing()).unwrap();
        let after = Utc::now().timestamp();

        assert_eq!(merged.completed, Some(true));
        assert!(merged.updated_at >= before && merged.updated_at <= after);
    }

    #[test]
    fn test_caller_supplied_updated_at_ignored() {
        let merged = merge_update_at(&json!({"updated_at": 1, "created_at": 2}), &existing(), 500).unwrap();
        assert_eq!(merged.updated_at, 500);
    }

    #[test]
    fn test_metadata_type_mismatch() {
        for bad in [
            json!({"metadata": "a=1"}),
            json!({"metadata": ["a", "1"]}),
            json!({"metadata": {"a": 1}}),
            json!({"metadata": {"a": null}}),
            json!({"metadata": null}),
        ] {
            let err = merge_update_at(&bad, &existing(), 1).unwrap_err();
            assert!(
                matches!(err, MergeError::TypeMismatch { field: "metadata", .. }),
                "payload {} should fail",
                bad
            );
        }
    }

    #[test]
    fn test_metadata_failure_applies_nothing() {
        // Valid title alongside invalid metadata: the whole update is rejected
        let result = merge_update_at(&json!({"title": "ok", "metadata": {"a": 5}}), &existing(), 1);
        assert!(result.is_err());
    }

    #[test]
    fn test_field_type_checks() {
        assert_eq!(
            merge_update_at(&json!({"title": 5}), &existing(), 1).unwrap_err(),
            MergeError::TypeMismatch {
                field: "title",
                expected: "a string"
            }
        );
        assert_eq!(
            merge_update_at(&json!({"title": "   "}), &existing(), 1).unwrap_err(),
            MergeError::EmptyTitle
        );
        assert!(matches!(
            merge_update_at(&json!({"completed": "yes"}), &existing(), 1).unwrap_err(),
            MergeError::TypeMismatch { field: "completed", .. }
        ));
    }

    #[test]
    fn test_non_object_payload() {
        assert_eq!(
            merge_update_at(&json!([1, 2]), &existing(), 1).unwrap_err(),
            MergeError::NotAnObject
        );
    }

    #[test]
    fn test_payload_parse_splits_overflow() {
        let payload = TaskUpdatePayload::parse(&json!({
            "title": "t",
            "completed": false,
            "owner_id": "someone-else",
            "id": "x"
        }))
        .unwrap();

        assert_eq!(payload.fields.len(), 2);
        assert!(payload.fields.contains(&TaskField::Title("t".to_string())));
        assert!(payload.fields.contains(&TaskField::Completed(false)));
        assert_eq!(payload.overflow.len(), 2);
        assert!(payload.overflow.contains_key("owner_id"));
    }
}
