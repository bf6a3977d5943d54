//! Classical deadlock-avoidance predicates.
//!
//! - [`is_safe`]: Banker's safe-state test with a simulated grant
//! - [`wait_die`]: timestamp tiebreak, older waits and younger dies
//!
//! Both are pure functions of the state passed in. Shape validation is the
//! caller's job (the oracle facade does it before calling here).

use std::collections::HashMap;

use super::state::AllocationState;
use crate::errors::{OracleError, Result};

/// Banker's test: would granting `request` to `process` leave a safe state?
///
/// See [`safe_sequence`] for the algorithm.
pub fn is_safe(state: &AllocationState, process: usize, request: &[i64]) -> bool {
    safe_sequence(state, process, request).is_some()
}

/// Finish order witnessing safety, or `None` if the simulated grant is unsafe.
///
/// 1. Copy `available` into work vector `W` and `allocated` into `A`.
/// 2. Reject if any `request[r] > W[r]`, or if a positive `request[r]` would
///    push `A[p][r]` past `max_need[p][r]`. Otherwise apply the grant to `W`/`A`.
/// 3. Repeatedly take the lowest-id unfinished process whose remaining need
///    fits in `W`, return its holdings to `W` and restart the scan.
/// 4. Safe iff every process finished.
///
/// Deterministic: ties always go to the lowest id. O(P²·R). Sums saturate,
/// and a grant whose holding would overflow is rejected.
pub fn safe_sequence(
    state: &AllocationState,
    process: usize,
    request: &[i64],
) -> Option<Vec<usize>> {
    if state.num_processes() == 0 {
        return Some(Vec::new());
    }

    let max_need = state.max_need();
    let mut work = state.available().to_vec();
    let mut alloc = state.allocated().to_vec();

    for (r, &units) in request.iter().enumerate() {
        if units > work[r] {
            return None;
        }
        if units > 0
            && alloc[process][r]
                .checked_add(units)
                .map_or(true, |held| held > max_need[process][r])
        {
            return None;
        }
        work[r] = work[r].saturating_sub(units);
        alloc[process][r] = alloc[process][r].saturating_add(units);
    }

    let num_processes = state.num_processes();
    let mut finished = vec![false; num_processes];
    let mut order = Vec::with_capacity(num_processes);

    while let Some(q) = (0..num_processes).find(|&q| {
        !finished[q]
            && max_need[q]
                .iter()
                .zip(&alloc[q])
                .zip(&work)
                .all(|((max, held), free)| max.saturating_sub(*held) <= *free)
    }) {
        for (w, held) in work.iter_mut().zip(&alloc[q]) {
            *w = w.saturating_add(*held);
        }
        finished[q] = true;
        order.push(q);
    }

    (order.len() == num_processes).then_some(order)
}

/// Wait-Die: true if `requester` should wait, false if it should be aborted.
///
/// A requester with a strictly smaller (older) timestamp than the holder waits.
pub fn wait_die(requester: usize, holder: usize, timestamps: &HashMap<usize, f64>) -> Result<bool> {
    let requester_ts = timestamps
        .get(&requester)
        .ok_or(OracleError::MissingTimestamp(requester))?;
    let holder_ts = timestamps
        .get(&holder)
        .ok_or(OracleError::MissingTimestamp(holder))?;
    Ok(requester_ts < holder_ts)
}
