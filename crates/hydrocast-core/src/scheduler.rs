//! Temporal retry scheduler for data-dependent pre-actions.
//!
//! Different feeds become available at different lags, so the scheduler
//! searches backward in time for the newest cycle at which *all* feeds are
//! simultaneously present: any individual failure abandons the pass and
//! retries the whole group at an earlier cycle. The search is bounded in
//! cumulative hours stepped back, not in wall-clock attempts.

use crate::actions::{PreAction, DEFAULT_MAX_RETRY_HOURS, DEFAULT_RETRY_STEP_HOURS};
use crate::cycle::ForecastCycle;
use crate::error::{HydrocastError, Result};

/// Run every pre-action for `cycle`, stepping backward on failure.
///
/// Returns the cycle the whole group succeeded at: `original - k*step` for
/// the smallest such `k`. The bound is the minimum `max_retry_hours` among
/// the actions, the step the maximum `retry_step_hours`, so the strictest
/// deadline wins and the coarsest grid drives the regression.
///
/// An empty group is a no-op success. `Ok(false)` from an action triggers
/// the next regression; `Err` aborts the search immediately.
pub fn run_pre_actions(
    actions: &[Box<dyn PreAction>],
    cycle: ForecastCycle,
) -> Result<ForecastCycle> {
    if actions.is_empty() {
        return Ok(cycle);
    }

    let mut max_hours = DEFAULT_MAX_RETRY_HOURS;
    let mut step_hours = DEFAULT_RETRY_STEP_HOURS;
    for action in actions {
        let policy = action.retry_policy();
        max_hours = max_hours.min(policy.max_retry_hours);
        step_hours = step_hours.max(policy.retry_step_hours);
    }

    let mut current = cycle;
    let mut attempted_hours = 0;
    while attempted_hours < max_hours {
        let mut group_ok = true;
        for action in actions {
            tracing::info!(
                action = action.name(),
                kind = action.type_name(),
                cycle = %current,
                "running pre-action"
            );
            if !action.run(&current)? {
                group_ok = false;
                break;
            }
        }
        if group_ok {
            return Ok(current);
        }
        tracing::info!(step_hours, cycle = %current, "stepping the forecast cycle back");
        attempted_hours += step_hours;
        current = current.step_back(step_hours);
    }

    Err(HydrocastError::RetryExhausted {
        attempted_hours,
        max_hours,
    })
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
