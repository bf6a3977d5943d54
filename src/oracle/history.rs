//! Labeled training examples accumulated from scenario rollouts.
//!
//! Examples are kept in insertion order with no deduplication. By default the
//! history is unbounded and grows by one example per scenario; with a
//! capacity it becomes a ring buffer that drops the oldest example first.

use std::collections::VecDeque;

use serde::{Deserialize, Serialize};

/// A feature vector and whether the rollout from it ended in deadlock.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TrainingExample {
    pub features: Vec<f64>,
    pub led_to_deadlock: bool,
}

impl TrainingExample {
    pub fn target(&self) -> f64 {
        if self.led_to_deadlock {
            1.0
        } else {
            0.0
        }
    }
}

/// Insertion-ordered example buffer.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct TrainingHistory {
    examples: VecDeque<TrainingExample>,
    capacity: Option<usize>,
    /// Examples ever pushed, including evicted ones
    total_pushed: u64,
}

impl TrainingHistory {
    pub fn new(capacity: Option<usize>) -> Self {
        Self {
            examples: VecDeque::new(),
            capacity,
            total_pushed: 0,
        }
    }

    pub fn push(&mut self, example: TrainingExample) {
        if let Some(cap) = self.capacity {
            if cap == 0 {
                self.total_pushed += 1;
                return;
            }
            while self.examples.len() >= cap {
                self.examples.pop_front();
            }
        }
        self.examples.push_back(example);
        self.total_pushed += 1;
    }

    pub fn len(&self) -> usize {
        self.examples.len()
    }

    pub fn is_empty(&self) -> bool {
        self.examples.is_empty()
    }

    pub fn capacity(&self) -> Option<usize> {
        self.capacity
    }

    pub fn total_pushed(&self) -> u64 {
        self.total_pushed
    }

    pub fn positives(&self) -> usize {
        self.examples.iter().filter(|e| e.led_to_deadlock).count()
    }

    pub fn iter(&self) -> impl Iterator<Item = &TrainingExample> {
        self.examples.iter()
    }

    pub fn clear(&mut self) {
        self.examples.clear();
    }

    /// Parallel `(inputs, targets)` batch in insertion order.
    pub fn to_batch(&self) -> (Vec<Vec<f64>>, Vec<f64>) {
        self.examples
            .iter()
            .map(|e| (e.features.clone(), e.target()))
            .unzip()
    }
}
