//! Pure due-time evaluation: no clock, no storage, just the interval math.

use crate::types::TaskParams;

/// Outcome of a due-time check for one task.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Dueness {
    /// The task's interval has elapsed. `clock_skew` is set when `last_run`
    /// sits in the future; the task still fires, but callers should warn.
    Due { clock_skew: bool },
    /// Inside the interval, nothing to do.
    NotYet,
    /// Required scheduling fields are missing or non-numeric. Fail closed:
    /// the task is skipped for the pass rather than defaulting to zero.
    MissingParams,
}

/// A task is due when at least `timeout_secs` have elapsed since
/// `last_run`, in either direction.
///
/// The absolute difference keeps a future-dated `last_run` (clock skew, a
/// restored backup) from wedging a task forever, at the cost of masking
/// genuine future-dated corruption; callers log when `last_run > now`.
pub fn is_due(now: i64, last_run: i64, timeout_secs: i64) -> bool {
    now.saturating_sub(last_run).saturating_abs() >= timeout_secs
}

/// Evaluate a task's params against `now`.
///
/// The timeout is `cache_timeout * unit` seconds. `unit` comes from the
/// params when present; when the task's schema omits it, `default_unit`
/// applies (60 by default, i.e. `cache_timeout` is in minutes). A `unit`
/// key that is present but non-numeric fails closed like any other bad
/// field.
pub fn evaluate(params: &TaskParams, now: i64, default_unit: i64) -> Dueness {
    let Some(last_run) = params.last_run() else {
        return Dueness::MissingParams;
    };
    let Some(cache_timeout) = params.cache_timeout() else {
        return Dueness::MissingParams;
    };
    let unit = match params.get("unit") {
        None => default_unit,
        Some(value) => match value.as_i64() {
            Some(unit) => unit,
            None => return Dueness::MissingParams,
        },
    };

    let timeout_secs = cache_timeout.saturating_mul(unit);
    if is_due(now, last_run, timeout_secs) {
        Dueness::Due {
            clock_skew: last_run > now,
        }
    } else {
        Dueness::NotYet
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn params(json: &str) -> TaskParams {
        TaskParams::from_json(json).unwrap()
    }

    #[test]
    fn boundary_is_inclusive() {
        assert!(!is_due(1299, 1000, 300));
        assert!(is_due(1300, 1000, 300));
        assert!(is_due(1301, 1000, 300));
    }

    #[test]
    fn five_minute_task_scenario() {
        // last_run=1000, cache_timeout=5, unit=60 -> timeout 300s.
        let p = params(r#"{"last_run":1000,"cache_timeout":5,"unit":60}"#);
        assert_eq!(evaluate(&p, 1250, 60), Dueness::NotYet);
        assert_eq!(evaluate(&p, 1301, 60), Dueness::Due { clock_skew: false });
    }

    #[test]
    fn future_last_run_beyond_timeout_is_due_with_skew() {
        let p = params(r#"{"last_run":5000,"cache_timeout":5,"unit":60}"#);
        assert_eq!(evaluate(&p, 1000, 60), Dueness::Due { clock_skew: true });
    }

    #[test]
    fn future_last_run_within_timeout_is_not_due() {
        let p = params(r#"{"last_run":1100,"cache_timeout":5,"unit":60}"#);
        assert_eq!(evaluate(&p, 1000, 60), Dueness::NotYet);
    }

    #[test]
    fn missing_fields_fail_closed() {
        assert_eq!(
            evaluate(&params(r#"{"cache_timeout":5}"#), 1000, 60),
            Dueness::MissingParams
        );
        assert_eq!(
            evaluate(&params(r#"{"last_run":0}"#), 1000, 60),
            Dueness::MissingParams
        );
        assert_eq!(
            evaluate(&params(r#"{"last_run":"0","cache_timeout":5}"#), 1000, 60),
            Dueness::MissingParams
        );
    }

    #[test]
    fn non_numeric_unit_fails_closed() {
        let p = params(r#"{"last_run":0,"cache_timeout":5,"unit":"minutes"}"#);
        assert_eq!(evaluate(&p, 10_000, 60), Dueness::MissingParams);
    }

    #[test]
    fn absent_unit_uses_the_configured_default() {
        let p = params(r#"{"last_run":1000,"cache_timeout":5}"#);
        // default_unit=60 -> 300s window.
        assert_eq!(evaluate(&p, 1250, 60), Dueness::NotYet);
        // default_unit=1 -> 5s window.
        assert_eq!(evaluate(&p, 1250, 1), Dueness::Due { clock_skew: false });
    }
}
