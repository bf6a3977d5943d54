//! Tests for the oracle facade.

use std::collections::HashMap;

use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};

use super::{DeadlockOracle, DenyReason, RequestDecision};
use crate::config::OracleConfig;
use crate::errors::OracleError;
use crate::model::{RiskEstimator, RiskNetwork};

/// R=3, P=5, inventory (10, 5, 7), nothing held.
fn classic_oracle(seed: u64) -> DeadlockOracle {
    let mut oracle = DeadlockOracle::seeded(3, 5, seed);
    oracle.set_available(vec![10, 5, 7]).unwrap();
    oracle
        .set_max_need(vec![
            vec![7, 5, 3],
            vec![3, 2, 2],
            vec![9, 0, 2],
            vec![2, 2, 2],
            vec![4, 3, 3],
        ])
        .unwrap();
    oracle
}

fn oracle_with_thresholds(bankers: f64, wait_die: f64) -> DeadlockOracle {
    let config = OracleConfig {
        bankers_risk_threshold: bankers,
        wait_die_risk_threshold: wait_die,
        ..Default::default()
    };
    let mut rng = StdRng::seed_from_u64(1);
    let mut oracle = DeadlockOracle::with_rng(3, 5, config, &mut rng);
    oracle.set_available(vec![10, 5, 7]).unwrap();
    oracle.set_max_need(classic_oracle(0).max_need().to_vec()).unwrap();
    oracle
}

// =========================================================================
// Safety test
// =========================================================================

#[test]
fn test_classic_small_request_is_safe() {
    let oracle = classic_oracle(1);
    assert!(oracle.is_safe(0, &[1, 0, 2]).unwrap());
}

#[test]
fn test_classic_whole_inventory_is_unsafe() {
    let oracle = classic_oracle(1);
    assert!(!oracle.is_safe(0, &[10, 5, 7]).unwrap());
}

#[test]
fn test_is_safe_does_not_mutate() {
    let oracle = classic_oracle(1);
    let before = oracle.state().clone();
    oracle.is_safe(3, &[2, 2, 2]).unwrap();
    oracle.safe_sequence(3, &[2, 2, 2]).unwrap();
    assert_eq!(oracle.state(), &before);
}

#[test]
fn test_is_safe_rejects_bad_shapes() {
    let oracle = classic_oracle(1);
    let err = oracle.is_safe(0, &[1, 0]).unwrap_err();
    assert!(err.is_dimension_error());
    let err = oracle.is_safe(5, &[0, 0, 0]).unwrap_err();
    assert_eq!(
        err,
        OracleError::ProcessOutOfRange {
            process: 5,
            num_processes: 5
        }
    );
}

// =========================================================================
// Allocation invariants
// =========================================================================

#[test]
fn test_random_operations_conserve_inventory() {
    let mut oracle = classic_oracle(2);
    let total = oracle.state().total_inventory();
    let mut rng = StdRng::seed_from_u64(2);

    for _ in 0..2000 {
        let p = rng.gen_range(0..5);
        let delta: Vec<i64> = (0..3).map(|_| rng.gen_range(0..=4)).collect();
        let before = oracle.state().clone();
        let result = if rng.gen_bool(0.5) {
            oracle.allocate(p, &delta)
        } else {
            oracle.release(p, &delta)
        };
        if result.is_err() {
            assert_eq!(oracle.state(), &before, "rejected operation mutated state");
        }

        assert_eq!(oracle.state().total_inventory(), total);
        assert!(oracle.available().iter().all(|&a| a >= 0));
        for (held, max) in oracle.allocated().iter().zip(oracle.max_need()) {
            for (&h, &m) in held.iter().zip(max) {
                assert!((0..=m).contains(&h));
            }
        }
    }
}

#[test]
fn test_release_more_than_held_is_rejected() {
    let mut oracle = classic_oracle(3);
    oracle.allocate(1, &[1, 1, 1]).unwrap();
    let err = oracle.release(1, &[2, 0, 0]).unwrap_err();
    assert!(matches!(err, OracleError::InvalidRequest { process: 1, resource: 0, .. }));
    assert_eq!(oracle.allocated()[1], vec![1, 1, 1]);
}

#[test]
fn test_feature_vector_layout() {
    let mut oracle = classic_oracle(4);
    oracle.allocate(2, &[3, 0, 1]).unwrap();
    let features = oracle.feature_vector();
    assert_eq!(features.len(), 3 * 5 + 3);
    assert_eq!(&features[6..9], &[3.0, 0.0, 1.0]);
    assert_eq!(&features[15..], &[7.0, 5.0, 6.0]);
}

// =========================================================================
// Empty systems
// =========================================================================

#[test]
fn test_no_resources() {
    let mut oracle = DeadlockOracle::seeded(0, 3, 5);
    oracle.allocate(1, &[]).unwrap();
    oracle.release(1, &[]).unwrap();
    assert!(oracle.is_safe(2, &[]).unwrap());
    assert!(oracle.detect_cycles().is_empty());
    assert!(oracle.feature_vector().is_empty());
    let risk = oracle.predict_deadlock_risk(0, &[]).unwrap();
    assert!(risk > 0.0 && risk < 1.0);
}

#[test]
fn test_no_processes_is_trivially_safe_and_inert() {
    let mut oracle = DeadlockOracle::seeded(2, 0, 6);
    oracle.set_available(vec![4, 4]).unwrap();
    assert_eq!(oracle.feature_vector().len(), 2);
    assert!(oracle.detect_cycles().is_empty());

    assert!(oracle.is_safe(0, &[0, 0]).unwrap());
    assert!(oracle.is_safe(7, &[3, 1]).unwrap());
    assert_eq!(oracle.safe_sequence(0, &[1, 1]).unwrap(), Some(vec![]));

    oracle.allocate(0, &[1, 1]).unwrap();
    oracle.release(3, &[2, 0]).unwrap();
    assert_eq!(oracle.available(), &[4, 4]);

    let risk = oracle.predict_deadlock_risk(0, &[0, 0]).unwrap();
    assert!(risk > 0.0 && risk < 1.0);

    // vector length is still checked
    assert!(oracle.is_safe(0, &[0]).unwrap_err().is_dimension_error());
    assert!(oracle.allocate(0, &[1, 1, 1]).unwrap_err().is_dimension_error());
}

#[test]
fn test_empty_system_accepts_empty_vectors() {
    let mut oracle = DeadlockOracle::seeded(0, 0, 6);
    oracle.allocate(0, &[]).unwrap();
    oracle.release(0, &[]).unwrap();
    assert!(oracle.is_safe(0, &[]).unwrap());
    assert!(oracle.detect_cycles().is_empty());
}

// =========================================================================
// Wait-for graph
// =========================================================================

#[test]
fn test_three_cycle() {
    let mut oracle = classic_oracle(7);
    oracle.update_wait_edge(0, 1).unwrap();
    oracle.update_wait_edge(1, 2).unwrap();
    oracle.update_wait_edge(2, 0).unwrap();

    let cycles = oracle.detect_cycles();
    assert!(!cycles.is_empty());
    for cycle in &cycles {
        let mut vertices = cycle.clone();
        vertices.sort_unstable();
        assert_eq!(vertices, vec![0, 1, 2]);
    }

    oracle.clear_wait_graph();
    assert!(oracle.detect_cycles().is_empty());
}

#[test]
fn test_self_wait_is_a_cycle() {
    let mut oracle = classic_oracle(8);
    oracle.update_wait_edge(4, 4).unwrap();
    assert_eq!(oracle.detect_cycles(), vec![vec![4]]);
}

#[test]
fn test_wait_edge_validates_ids() {
    let mut oracle = classic_oracle(9);
    assert!(oracle.update_wait_edge(0, 9).is_err());
    assert!(oracle.wait_graph().is_empty());
}

// =========================================================================
// Hybrid decisions
// =========================================================================

#[test]
fn test_wait_die_through_oracle() {
    let oracle = classic_oracle(10);
    let timestamps = HashMap::from([(0, 0.0), (1, 1.0), (2, 2.0)]);
    assert!(!oracle.wait_die(1, 0, &timestamps).unwrap());
    assert!(oracle.wait_die(0, 1, &timestamps).unwrap());
}

#[test]
fn test_unsafe_request_denied_whatever_the_risk() {
    let oracle = oracle_with_thresholds(2.0, 2.0);
    let decision = oracle.decide_request(0, &[10, 5, 7]).unwrap();
    assert!(matches!(
        decision,
        RequestDecision::Deny {
            reason: DenyReason::Unsafe,
            ..
        }
    ));
    assert!(!oracle.ml_augmented_bankers(0, &[10, 5, 7]).unwrap());
}

#[test]
fn test_high_risk_vetoes_safe_request() {
    let oracle = oracle_with_thresholds(0.0, 0.0);
    let decision = oracle.decide_request(0, &[1, 0, 2]).unwrap();
    assert!(matches!(
        decision,
        RequestDecision::Deny {
            reason: DenyReason::HighRisk,
            ..
        }
    ));

    let timestamps = HashMap::from([(0, 0.0), (1, 1.0)]);
    assert!(!oracle.ml_augmented_wait_die(0, 1, &timestamps).unwrap());
}

#[test]
fn test_permissive_thresholds_defer_to_classic_verdicts() {
    let oracle = oracle_with_thresholds(2.0, 2.0);
    assert!(oracle.ml_augmented_bankers(0, &[1, 0, 2]).unwrap());

    let timestamps = HashMap::from([(0, 0.0), (1, 1.0)]);
    assert!(oracle.ml_augmented_wait_die(0, 1, &timestamps).unwrap());
    assert!(!oracle.ml_augmented_wait_die(1, 0, &timestamps).unwrap());
}

#[test]
fn test_risk_ignores_the_candidate_request() {
    let oracle = classic_oracle(11);
    let a = oracle.predict_deadlock_risk(0, &[0, 0, 0]).unwrap();
    let b = oracle.predict_deadlock_risk(3, &[5, 5, 5]).unwrap();
    assert_eq!(a, b);
    assert!(a > 0.0 && a < 1.0);
}

#[test]
fn test_wait_die_risk_uses_state_only() {
    let oracle = classic_oracle(12);
    let timestamps = HashMap::from([(0, 0.0), (1, 1.0)]);
    let decision = oracle.decide_conflict(0, 1, &timestamps).unwrap();
    let expected = oracle.predict_deadlock_risk(0, &[0, 0, 0]).unwrap();
    let risk = match decision {
        super::ConflictDecision::Wait { risk } | super::ConflictDecision::Abort { risk } => risk,
    };
    assert_eq!(risk, expected);
}

#[test]
fn test_conflict_missing_timestamp() {
    let oracle = classic_oracle(13);
    let timestamps = HashMap::from([(0, 0.0)]);
    assert_eq!(
        oracle.ml_augmented_wait_die(0, 1, &timestamps).unwrap_err(),
        OracleError::MissingTimestamp(1)
    );
}

// =========================================================================
// Training and persistence
// =========================================================================

#[test]
fn test_training_example_length_checked() {
    let mut oracle = classic_oracle(14);
    let err = oracle.add_training_example(vec![0.0; 4], true).unwrap_err();
    assert!(err.is_dimension_error());
    assert!(oracle.history().is_empty());
}

#[test]
fn test_train_on_empty_history_is_noop() {
    let mut oracle = classic_oracle(15);
    let before = oracle.model().clone();
    oracle.train_risk_model();
    assert_eq!(oracle.model(), &before);
}

#[test]
fn test_training_on_safe_examples_lowers_risk() {
    let mut oracle = classic_oracle(16);
    let features = oracle.feature_vector();
    oracle.add_training_example(features, false).unwrap();
    for _ in 0..1000 {
        oracle.train_risk_model();
    }
    assert!(oracle.predict_deadlock_risk(0, &[0, 0, 0]).unwrap() < 0.5);
}

#[test]
fn test_save_load_round_trip() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("model.dat");

    let mut trained = classic_oracle(17);
    let mut rng = StdRng::seed_from_u64(17);
    for _ in 0..20 {
        let features: Vec<f64> = (0..18).map(|_| rng.gen_range(0.0..10.0)).collect();
        trained.add_training_example(features, rng.gen_bool(0.3)).unwrap();
    }
    trained.train_risk_model();
    trained.save_model(&path).unwrap();

    let mut fresh = classic_oracle(999);
    fresh.load_model(&path).unwrap();
    assert_eq!(fresh.model(), trained.model());

    for _ in 0..50 {
        let features: Vec<f64> = (0..18).map(|_| rng.gen_range(0.0..10.0)).collect();
        assert_eq!(fresh.model().predict(&features), trained.model().predict(&features));
    }
}

#[test]
fn test_load_into_wrong_shape_fails() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("model.dat");
    classic_oracle(18).save_model(&path).unwrap();

    let mut other = DeadlockOracle::seeded(2, 2, 18);
    let before = other.model().clone();
    let err = other.load_model(&path).unwrap_err();
    assert!(matches!(err, OracleError::ModelIo { .. }));
    assert_eq!(other.model(), &before);
}

#[test]
fn test_load_missing_file_fails() {
    let dir = tempfile::tempdir().unwrap();
    let mut oracle = classic_oracle(19);
    assert!(matches!(
        oracle.load_model(dir.path().join("absent.dat")),
        Err(OracleError::ModelIo { .. })
    ));
}

#[test]
fn test_with_model_checks_input_size() {
    let mut rng = StdRng::seed_from_u64(20);
    let wrong = RiskNetwork::new(7, 10, 0.1, 0.1, &mut rng);
    let err = DeadlockOracle::with_model(3, 5, OracleConfig::default(), wrong).unwrap_err();
    assert_eq!(
        err,
        OracleError::InvalidDimensions {
            what: "risk model input",
            expected: 18,
            actual: 7
        }
    );

    let right = RiskNetwork::new(18, 4, 0.1, 0.1, &mut rng);
    assert!(DeadlockOracle::with_model(3, 5, OracleConfig::default(), right).is_ok());
}

#[test]
fn test_seeded_oracles_are_identical() {
    let mut a = classic_oracle(21);
    let mut b = classic_oracle(21);
    for oracle in [&mut a, &mut b] {
        oracle.allocate(0, &[1, 1, 1]).unwrap();
        oracle.update_wait_edge(0, 1).unwrap();
        let features = oracle.feature_vector();
        oracle.add_training_example(features, true).unwrap();
        oracle.train_risk_model();
    }
    assert_eq!(a, b);
}
