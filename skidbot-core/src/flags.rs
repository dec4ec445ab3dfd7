// ABOUTME: Persisted per-user flags read from a flat JSON file on every query
// ABOUTME: Missing or malformed files behave as an empty mapping and are only logged

use async_trait::async_trait;
use serde_json::{Map, Value};
use std::path::{Path, PathBuf};

use crate::error::PersistenceReadError;
use crate::metrics;
use crate::traits::{GroupId, UserId};

/// Keyed lookup of a flag per (group, user)
#[async_trait]
pub trait FlagStore: Send + Sync {
    /// Raw flag value, `None` when absent
    async fn get(&self, group: GroupId, user: UserId) -> Option<Value>;

    /// Whether a present flag value counts as set
    async fn is_flagged(&self, group: GroupId, user: UserId) -> bool {
        self.get(group, user).await.is_some_and(|v| is_truthy(&v))
    }
}

/// Truthiness of an opaque flag value: `null`, `false`, `0`, and `""` are unset
pub fn is_truthy(value: &Value) -> bool {
    match value {
        Value::Null => false,
        Value::Bool(b) => *b,
        Value::Number(n) => n.as_f64().is_some_and(|f| f != 0.0 && !f.is_nan()),
        Value::String(s) => !s.is_empty(),
        Value::Array(_) | Value::Object(_) => true,
    }
}

/// Process-global flag file: `{ "<user id>": <truthy value>, ... }`.
///
/// The file is shared by every group even though queries carry a group id.
/// It is re-read on each query so external edits apply without a restart.
#[derive(Debug, Clone)]
pub struct JsonFlagFile {
    path: PathBuf,
}

impl JsonFlagFile {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Read the whole mapping. A missing file is an empty mapping.
    pub async fn read_all(&self) -> Result<Map<String, Value>, PersistenceReadError> {
        let content = match tokio::fs::read_to_string(&self.path).await {
            Ok(content) => content,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(Map::new()),
            Err(e) => {
                return Err(PersistenceReadError::Io {
                    path: self.path.clone(),
                    reason: e.to_string(),
                })
            }
        };

        match serde_json::from_str::<Value>(&content) {
            Ok(Value::Object(map)) => Ok(map),
            Ok(other) => Err(PersistenceReadError::Malformed {
                path: self.path.clone(),
                reason: format!("expected an object at the top level, found {}", kind_of(&other)),
            }),
            Err(e) => Err(PersistenceReadError::Malformed {
                path: self.path.clone(),
                reason: e.to_string(),
            }),
        }
    }

    /// Like `read_all`, but failures degrade to an empty mapping
    pub async fn read_or_empty(&self) -> Map<String, Value> {
        match self.read_all().await {
            Ok(map) => map,
            Err(e) => {
                metrics::record_flag_read_failure();
                tracing::warn!(error = %e, "Treating flag file as empty");
                Map::new()
            }
        }
    }
}

fn kind_of(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "a boolean",
        Value::Number(_) => "a number",
        Value::String(_) => "a string",
        Value::Array(_) => "an array",
        Value::Object(_) => "an object",
    }
}

#[async_trait]
impl FlagStore for JsonFlagFile {
    async fn get(&self, group: GroupId, user: UserId) -> Option<Value> {
        let mut flags = self.read_or_empty().await;
        let value = flags.remove(&user.to_string());
        tracing::trace!(
            group_id = %group,
            user_id = %user,
            present = value.is_some(),
            "Flag lookup"
        );
        value
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use tempfile::TempDir;

    fn store_with(content: &str) -> (TempDir, JsonFlagFile) {
        let dir = TempDir::new().expect("Failed to create temp dir");
        let path = dir.path().join("skiders.json");
        std::fs::write(&path, content).expect("Failed to write flag file");
        (dir, JsonFlagFile::new(path))
    }

    #[test]
    fn test_truthiness() {
        assert!(is_truthy(&json!(true)));
        assert!(is_truthy(&json!(1)));
        assert!(is_truthy(&json!("yes")));
        assert!(is_truthy(&json!({})));
        assert!(is_truthy(&json!([])));
        assert!(!is_truthy(&json!(false)));
        assert!(!is_truthy(&json!(0)));
        assert!(!is_truthy(&json!(0.0)));
        assert!(!is_truthy(&json!("")));
        assert!(!is_truthy(&Value::Null));
    }

    #[tokio::test]
    async fn test_present_flag() {
        let (_dir, store) = store_with(r#"{"100": true, "200": "reason"}"#);
        assert_eq!(store.get(GroupId(1), UserId(100)).await, Some(json!(true)));
        assert!(store.is_flagged(GroupId(1), UserId(200)).await);
        assert!(!store.is_flagged(GroupId(1), UserId(300)).await);
    }

    #[tokio::test]
    async fn test_falsy_value_is_not_flagged() {
        let (_dir, store) = store_with(r#"{"100": false, "200": 0}"#);
        assert!(store.get(GroupId(1), UserId(100)).await.is_some());
        assert!(!store.is_flagged(GroupId(1), UserId(100)).await);
        assert!(!store.is_flagged(GroupId(1), UserId(200)).await);
    }

    #[tokio::test]
    async fn test_flags_are_shared_across_groups() {
        let (_dir, store) = store_with(r#"{"100": true}"#);
        assert!(store.is_flagged(GroupId(1), UserId(100)).await);
        assert!(store.is_flagged(GroupId(2), UserId(100)).await);
    }

    #[tokio::test]
    async fn test_missing_file_is_empty() {
        let dir = TempDir::new().unwrap();
        let store = JsonFlagFile::new(dir.path().join("nope.json"));
        assert!(store.read_all().await.unwrap().is_empty());
        assert!(store.get(GroupId(1), UserId(1)).await.is_none());
    }

    #[tokio::test]
    async fn test_malformed_file_is_empty() {
        let (_dir, store) = store_with("{ not json");
        assert!(matches!(
            store.read_all().await,
            Err(PersistenceReadError::Malformed { .. })
        ));
        assert!(store.get(GroupId(1), UserId(1)).await.is_none());
        assert!(!store.is_flagged(GroupId(1), UserId(1)).await);
    }

    #[tokio::test]
    async fn test_non_object_file_is_malformed() {
        let (_dir, store) = store_with(r#"["100"]"#);
        let err = store.read_all().await.unwrap_err();
        assert!(err.to_string().contains("an array"));
        assert!(store.read_or_empty().await.is_empty());
    }

    #[tokio::test]
    async fn test_file_is_reread_on_every_query() {
        let (_dir, store) = store_with("{}");
        assert!(!store.is_flagged(GroupId(1), UserId(100)).await);
        std::fs::write(store.path(), r#"{"100": true}"#).unwrap();
        assert!(store.is_flagged(GroupId(1), UserId(100)).await);
    }
}
