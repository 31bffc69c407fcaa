use chime_core::types::{TaskDescriptor, TaskId};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

/// Registry row category.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TaskKind {
    /// Schedulable unit of work.
    Job,
    /// Infrastructure row, e.g. the scheduler's own throttle state.
    System,
}

impl std::fmt::Display for TaskKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            TaskKind::Job => "job",
            TaskKind::System => "system",
        };
        write!(f, "{s}")
    }
}

impl std::str::FromStr for TaskKind {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s {
            "job" => Ok(TaskKind::Job),
            "system" => Ok(TaskKind::System),
            other => Err(format!("unknown task kind: {other}")),
        }
    }
}

/// Scheduling parameters stored as a JSON blob on the registry row.
///
/// Only `last_run` is ever mutated by the core; every other field belongs
/// to the task's own configuration and is preserved as-is across updates,
/// so the blob is kept as a raw map with typed accessors on top.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct TaskParams {
    raw: Map<String, Value>,
}

impl TaskParams {
    /// Minimal params for a fresh row: `last_run = 0` fires on the first
    /// pass once the interval math allows it.
    pub fn new(last_run: i64, cache_timeout: i64) -> Self {
        let mut raw = Map::new();
        raw.insert("last_run".into(), Value::from(last_run));
        raw.insert("cache_timeout".into(), Value::from(cache_timeout));
        Self { raw }
    }

    pub fn with_unit(mut self, unit: i64) -> Self {
        self.raw.insert("unit".into(), Value::from(unit));
        self
    }

    /// Parse a stored blob. Returns `None` unless it is a JSON object;
    /// rows with malformed params are skipped, not repaired.
    pub fn from_json(json: &str) -> Option<Self> {
        match serde_json::from_str::<Value>(json) {
            Ok(Value::Object(raw)) => Some(Self { raw }),
            _ => None,
        }
    }

    pub fn to_json(&self) -> String {
        Value::Object(self.raw.clone()).to_string()
    }

    pub fn as_value(&self) -> Value {
        Value::Object(self.raw.clone())
    }

    /// Unix timestamp of the most recent run. `None` when missing or
    /// non-numeric.
    pub fn last_run(&self) -> Option<i64> {
        self.raw.get("last_run").and_then(Value::as_i64)
    }

    /// Interval length in units. `None` when missing or non-numeric.
    pub fn cache_timeout(&self) -> Option<i64> {
        self.raw.get("cache_timeout").and_then(Value::as_i64)
    }

    /// Raw field access for keys the core does not own.
    pub fn get(&self, key: &str) -> Option<&Value> {
        self.raw.get(key)
    }

    /// Copy of the params with only `last_run` replaced.
    pub fn with_last_run(&self, last_run: i64) -> Self {
        let mut raw = self.raw.clone();
        raw.insert("last_run".into(), Value::from(last_run));
        Self { raw }
    }
}

/// A registered unit of scheduled work, one registry row.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Task {
    pub id: TaskId,
    pub name: String,
    pub kind: TaskKind,
    pub params: TaskParams,
}

impl Task {
    /// The shape handed to task handlers: identity plus the raw params.
    pub fn descriptor(&self) -> TaskDescriptor {
        TaskDescriptor {
            id: self.id.clone(),
            name: self.name.clone(),
            params: self.params.as_value(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn kind_round_trips_through_str() {
        assert_eq!("job".parse::<TaskKind>().unwrap(), TaskKind::Job);
        assert_eq!("system".parse::<TaskKind>().unwrap(), TaskKind::System);
        assert_eq!(TaskKind::Job.to_string(), "job");
        assert!("cron".parse::<TaskKind>().is_err());
    }

    #[test]
    fn from_json_rejects_non_objects() {
        assert!(TaskParams::from_json("[1,2,3]").is_none());
        assert!(TaskParams::from_json("42").is_none());
        assert!(TaskParams::from_json("not json at all").is_none());
    }

    #[test]
    fn non_numeric_fields_read_as_missing() {
        let params = TaskParams::from_json(r#"{"last_run":"soon","cache_timeout":5}"#).unwrap();
        assert_eq!(params.last_run(), None);
        assert_eq!(params.cache_timeout(), Some(5));
    }

    #[test]
    fn with_last_run_preserves_every_other_field() {
        let params = TaskParams::from_json(
            r#"{"last_run":1000,"cache_timeout":5,"unit":60,"recipient":"ops@example.com","retries":3}"#,
        )
        .unwrap();

        let updated = params.with_last_run(2000);

        assert_eq!(updated.last_run(), Some(2000));
        assert_eq!(updated.cache_timeout(), Some(5));
        assert_eq!(updated.get("unit"), Some(&Value::from(60)));
        assert_eq!(
            updated.get("recipient"),
            Some(&Value::from("ops@example.com"))
        );
        assert_eq!(updated.get("retries"), Some(&Value::from(3)));

        // Round-trip through JSON text keeps the field set identical.
        let reparsed = TaskParams::from_json(&updated.to_json()).unwrap();
        assert_eq!(reparsed, updated);
    }
}
