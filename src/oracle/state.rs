//! Allocation state: free inventory, holdings and maximum claims.
//!
//! Invariants maintained by [`allocate`](AllocationState::allocate) and
//! [`release`](AllocationState::release):
//! - every `available[r] >= 0` and every `allocated[p][r] >= 0`
//! - `available[r] + Σ_p allocated[p][r]` never changes
//! - a successful allocate never pushes `allocated[p][r]` above `max_need[p][r]`
//!
//! Both operations validate the whole vector first and only then mutate, so a
//! rejected call leaves the state untouched.

use serde::{Deserialize, Serialize};

use crate::errors::{OracleError, Result};

/// Matrices and vectors describing who holds what.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AllocationState {
    num_resources: usize,
    num_processes: usize,
    available: Vec<i64>,
    allocated: Vec<Vec<i64>>,
    max_need: Vec<Vec<i64>>,
}

impl AllocationState {
    /// Zeroed inventory, holdings and claims for `R` resources and `P` processes.
    pub fn new(num_resources: usize, num_processes: usize) -> Self {
        Self {
            num_resources,
            num_processes,
            available: vec![0; num_resources],
            allocated: vec![vec![0; num_resources]; num_processes],
            max_need: vec![vec![0; num_resources]; num_processes],
        }
    }

    pub fn num_resources(&self) -> usize {
        self.num_resources
    }

    pub fn num_processes(&self) -> usize {
        self.num_processes
    }

    pub fn available(&self) -> &[i64] {
        &self.available
    }

    pub fn allocated(&self) -> &[Vec<i64>] {
        &self.allocated
    }

    pub fn max_need(&self) -> &[Vec<i64>] {
        &self.max_need
    }

    /// Replace the free inventory. Only the length is checked.
    pub fn set_available(&mut self, available: Vec<i64>) -> Result<()> {
        self.check_vector("available", &available)?;
        self.available = available;
        Ok(())
    }

    /// Replace the maximum-claim matrix. Only the shape is checked.
    pub fn set_max_need(&mut self, max_need: Vec<Vec<i64>>) -> Result<()> {
        self.check_matrix("max_need", &max_need)?;
        self.max_need = max_need;
        Ok(())
    }

    /// Replace the holdings matrix. Only the shape is checked.
    pub fn set_allocated(&mut self, allocated: Vec<Vec<i64>>) -> Result<()> {
        self.check_matrix("allocated", &allocated)?;
        self.allocated = allocated;
        Ok(())
    }

    pub fn check_process(&self, process: usize) -> Result<()> {
        if process >= self.num_processes {
            return Err(OracleError::ProcessOutOfRange {
                process,
                num_processes: self.num_processes,
            });
        }
        Ok(())
    }

    /// Process check for operations that degrade to no-ops on an empty
    /// system: with `P = 0` any id is accepted.
    pub fn check_target(&self, process: usize) -> Result<()> {
        if self.num_processes == 0 {
            return Ok(());
        }
        self.check_process(process)
    }

    pub fn check_vector(&self, what: &'static str, vector: &[i64]) -> Result<()> {
        if vector.len() != self.num_resources {
            return Err(OracleError::InvalidDimensions {
                what,
                expected: self.num_resources,
                actual: vector.len(),
            });
        }
        Ok(())
    }

    fn check_matrix(&self, what: &'static str, matrix: &[Vec<i64>]) -> Result<()> {
        if matrix.len() != self.num_processes {
            return Err(OracleError::InvalidDimensions {
                what,
                expected: self.num_processes,
                actual: matrix.len(),
            });
        }
        matrix.iter().try_for_each(|row| self.check_vector(what, row))
    }

    /// Move `request` units from the free pool to `process`.
    pub fn allocate(&mut self, process: usize, request: &[i64]) -> Result<()> {
        self.check_target(process)?;
        self.check_vector("request", request)?;
        if self.num_processes == 0 {
            return Ok(());
        }

        for (r, &units) in request.iter().enumerate() {
            let reason = if units < 0 {
                Some(format!("negative request {units}"))
            } else if self.available[r] < units {
                Some(format!(
                    "requested {units} but only {} available",
                    self.available[r]
                ))
            } else if units > 0
                && self.allocated[process][r]
                    .checked_add(units)
                    .map_or(true, |held| held > self.max_need[process][r])
            {
                Some(format!(
                    "holding {} + {units} exceeds maximum claim {}",
                    self.allocated[process][r], self.max_need[process][r]
                ))
            } else {
                None
            };
            if let Some(reason) = reason {
                return Err(OracleError::InvalidRequest {
                    process,
                    resource: r,
                    reason,
                });
            }
        }

        for (r, &units) in request.iter().enumerate() {
            self.available[r] -= units;
            self.allocated[process][r] += units;
        }
        Ok(())
    }

    /// Return `release` units held by `process` to the free pool.
    pub fn release(&mut self, process: usize, release: &[i64]) -> Result<()> {
        self.check_target(process)?;
        self.check_vector("release", release)?;
        if self.num_processes == 0 {
            return Ok(());
        }

        for (r, &units) in release.iter().enumerate() {
            let reason = if units < 0 {
                Some(format!("negative release {units}"))
            } else if self.allocated[process][r] < units {
                Some(format!(
                    "releasing {units} but only {} held",
                    self.allocated[process][r]
                ))
            } else if self.available[r].checked_add(units).is_none() {
                Some(format!("releasing {units} overflows the free pool"))
            } else {
                None
            };
            if let Some(reason) = reason {
                return Err(OracleError::InvalidRequest {
                    process,
                    resource: r,
                    reason,
                });
            }
        }

        for (r, &units) in release.iter().enumerate() {
            self.available[r] += units;
            self.allocated[process][r] -= units;
        }
        Ok(())
    }

    /// `available[r] + Σ_p allocated[p][r]` for every resource.
    pub fn total_inventory(&self) -> Vec<i64> {
        let mut total = self.available.clone();
        for row in &self.allocated {
            for (t, &held) in total.iter_mut().zip(row) {
                *t = t.saturating_add(held);
            }
        }
        total
    }

    /// Units `process` may still claim: `max_need[p] - allocated[p]`.
    pub fn remaining_need(&self, process: usize) -> Result<Vec<i64>> {
        self.check_process(process)?;
        Ok(self.max_need[process]
            .iter()
            .zip(&self.allocated[process])
            .map(|(max, held)| max.saturating_sub(*held))
            .collect())
    }

    /// Holdings row-major followed by the free inventory; length `R·P + R`.
    pub fn feature_vector(&self) -> Vec<f64> {
        let mut features = Vec::with_capacity(self.feature_len());
        for row in &self.allocated {
            features.extend(row.iter().map(|&v| v as f64));
        }
        features.extend(self.available.iter().map(|&v| v as f64));
        features
    }

    pub fn feature_len(&self) -> usize {
        feature_len(self.num_resources, self.num_processes)
    }
}

/// Feature-vector length for `R` resources and `P` processes.
pub fn feature_len(num_resources: usize, num_processes: usize) -> usize {
    num_resources * num_processes + num_resources
}

#[cfg(test)]
mod tests {
    use super::*;

    fn make_state() -> AllocationState {
        let mut state = AllocationState::new(3, 2);
        state.set_available(vec![10, 5, 7]).unwrap();
        state
            .set_max_need(vec![vec![7, 5, 3], vec![3, 2, 2]])
            .unwrap();
        state
    }

    #[test]
    fn test_new_is_zeroed() {
        let state = AllocationState::new(3, 5);
        assert_eq!(state.available(), &[0, 0, 0]);
        assert_eq!(state.allocated().len(), 5);
        assert!(state.allocated().iter().all(|row| row == &[0, 0, 0]));
        assert!(state.max_need().iter().all(|row| row == &[0, 0, 0]));
    }

    #[test]
    fn test_allocate_moves_units() {
        let mut state = make_state();
        state.allocate(0, &[1, 0, 2]).unwrap();
        assert_eq!(state.available(), &[9, 5, 5]);
        assert_eq!(state.allocated()[0], vec![1, 0, 2]);
        assert_eq!(state.total_inventory(), vec![10, 5, 7]);
    }

    #[test]
    fn test_allocate_rejects_negative_and_leaves_state() {
        let mut state = make_state();
        let before = state.clone();
        let err = state.allocate(0, &[1, -1, 0]).unwrap_err();
        assert!(matches!(err, OracleError::InvalidRequest { resource: 1, .. }));
        assert_eq!(state, before);
    }

    #[test]
    fn test_allocate_rejects_overdraw() {
        let mut state = make_state();
        state.set_max_need(vec![vec![20, 20, 20], vec![0, 0, 0]]).unwrap();
        let err = state.allocate(0, &[11, 0, 0]).unwrap_err();
        assert!(matches!(err, OracleError::InvalidRequest { resource: 0, .. }));
        assert_eq!(state.available(), &[10, 5, 7]);
    }

    #[test]
    fn test_allocate_rejects_claim_overrun() {
        let mut state = make_state();
        state.allocate(1, &[3, 0, 0]).unwrap();
        let err = state.allocate(1, &[1, 0, 0]).unwrap_err();
        assert!(matches!(err, OracleError::InvalidRequest { process: 1, .. }));
    }

    #[test]
    fn test_release_round_trip() {
        let mut state = make_state();
        state.allocate(0, &[2, 1, 1]).unwrap();
        state.release(0, &[2, 1, 1]).unwrap();
        assert_eq!(state, make_state());
    }

    #[test]
    fn test_release_rejects_more_than_held() {
        let mut state = make_state();
        state.allocate(0, &[1, 0, 0]).unwrap();
        let before = state.clone();
        let err = state.release(0, &[0, 0, 1]).unwrap_err();
        assert!(matches!(err, OracleError::InvalidRequest { resource: 2, .. }));
        assert_eq!(state, before);
    }

    #[test]
    fn test_dimension_errors() {
        let mut state = make_state();
        assert!(state.allocate(0, &[1, 0]).unwrap_err().is_dimension_error());
        assert!(state.allocate(2, &[1, 0, 0]).unwrap_err().is_dimension_error());
        assert!(state.release(0, &[]).unwrap_err().is_dimension_error());
        assert!(state.set_available(vec![1]).unwrap_err().is_dimension_error());
        assert!(state
            .set_max_need(vec![vec![1, 1, 1]])
            .unwrap_err()
            .is_dimension_error());
        assert!(state
            .set_allocated(vec![vec![0, 0, 0], vec![0, 0]])
            .unwrap_err()
            .is_dimension_error());
    }

    #[test]
    fn test_zero_resources_is_noop() {
        let mut state = AllocationState::new(0, 2);
        state.allocate(1, &[]).unwrap();
        state.release(0, &[]).unwrap();
        assert_eq!(state, AllocationState::new(0, 2));
        assert!(state.feature_vector().is_empty());
    }

    #[test]
    fn test_no_processes_is_noop() {
        let mut state = AllocationState::new(2, 0);
        state.set_available(vec![3, 3]).unwrap();
        state.allocate(0, &[1, 2]).unwrap();
        state.release(5, &[1, 0]).unwrap();
        assert_eq!(state.available(), &[3, 3]);
        assert!(state.allocate(0, &[1]).unwrap_err().is_dimension_error());
        // id checks that are not no-ops stay strict
        assert!(state.remaining_need(0).is_err());
    }

    #[test]
    fn test_overflowing_amounts_are_rejected() {
        let mut state = AllocationState::new(1, 1);
        state.set_max_need(vec![vec![i64::MAX]]).unwrap();
        state.set_allocated(vec![vec![i64::MAX - 1]]).unwrap();
        state.set_available(vec![5]).unwrap();
        let before = state.clone();

        let err = state.allocate(0, &[3]).unwrap_err();
        assert!(matches!(err, OracleError::InvalidRequest { process: 0, resource: 0, .. }));
        assert_eq!(state, before);
        assert_eq!(state.total_inventory(), vec![i64::MAX]);

        state.set_allocated(vec![vec![1]]).unwrap();
        state.set_available(vec![i64::MAX]).unwrap();
        assert!(state.release(0, &[1]).is_err());
        assert_eq!(state.allocated()[0], vec![1]);
    }

    #[test]
    fn test_feature_vector_layout() {
        let mut state = make_state();
        state.allocate(0, &[1, 2, 3]).unwrap();
        state.allocate(1, &[1, 1, 0]).unwrap();
        assert_eq!(
            state.feature_vector(),
            vec![1.0, 2.0, 3.0, 1.0, 1.0, 0.0, 8.0, 2.0, 4.0]
        );
        assert_eq!(state.feature_len(), 9);
    }

    #[test]
    fn test_remaining_need() {
        let mut state = make_state();
        state.allocate(0, &[2, 0, 1]).unwrap();
        assert_eq!(state.remaining_need(0).unwrap(), vec![5, 5, 2]);
        assert!(state.remaining_need(9).is_err());
    }
}
