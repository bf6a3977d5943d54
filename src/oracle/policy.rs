//! Hybrid decision rule: classical verdict AND learned risk below threshold.
//!
//! ```text
//! allocate  ⇔ is_safe(p, req)         ∧ risk(state) < bankers_risk_threshold
//! wait      ⇔ wait_die(req, holder)   ∧ risk(state) < wait_die_risk_threshold
//! ```
//!
//! Risk is computed from the current state only (holdings row-major, then
//! free inventory). The candidate request is not part of the features.

use serde::{Deserialize, Serialize};

use crate::config::OracleConfig;

/// Why a request was denied.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DenyReason {
    /// Banker's test failed
    Unsafe,
    /// Banker's test passed but the learned risk was too high
    HighRisk,
}

/// Outcome of a resource request.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RequestDecision {
    Allocate { risk: f64 },
    Deny { reason: DenyReason, risk: f64 },
}

impl RequestDecision {
    pub fn is_allocate(&self) -> bool {
        matches!(self, Self::Allocate { .. })
    }

    pub fn risk(&self) -> f64 {
        match *self {
            Self::Allocate { risk } | Self::Deny { risk, .. } => risk,
        }
    }
}

/// Outcome of a contention between a requester and a holder.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ConflictDecision {
    Wait { risk: f64 },
    Abort { risk: f64 },
}

impl ConflictDecision {
    pub fn is_wait(&self) -> bool {
        matches!(self, Self::Wait { .. })
    }
}

/// Fixed thresholds combining classical verdicts with risk scores.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct DecisionPolicy {
    pub bankers_risk_threshold: f64,
    pub wait_die_risk_threshold: f64,
}

impl Default for DecisionPolicy {
    fn default() -> Self {
        Self::from_config(&OracleConfig::default())
    }
}

impl DecisionPolicy {
    pub fn from_config(config: &OracleConfig) -> Self {
        Self {
            bankers_risk_threshold: config.bankers_risk_threshold,
            wait_die_risk_threshold: config.wait_die_risk_threshold,
        }
    }

    pub fn decide_request(&self, safe: bool, risk: f64) -> RequestDecision {
        if !safe {
            RequestDecision::Deny {
                reason: DenyReason::Unsafe,
                risk,
            }
        } else if risk < self.bankers_risk_threshold {
            RequestDecision::Allocate { risk }
        } else {
            RequestDecision::Deny {
                reason: DenyReason::HighRisk,
                risk,
            }
        }
    }

    pub fn decide_conflict(&self, should_wait: bool, risk: f64) -> ConflictDecision {
        if should_wait && risk < self.wait_die_risk_threshold {
            ConflictDecision::Wait { risk }
        } else {
            ConflictDecision::Abort { risk }
        }
    }

    /// Risk-only verdict used by the accuracy probe.
    pub fn risk_says_safe(&self, risk: f64) -> bool {
        risk < self.bankers_risk_threshold
    }
}
