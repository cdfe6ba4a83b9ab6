use std::cmp::Ordering;
use std::collections::BinaryHeap;

use serde::{Deserialize, Serialize};

/// Change applied to a running model at a scheduled step.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum Intervention {
    SetParameters {
        dawdle_probability: f64,
        entry_rate: f64,
    },
    CloseLane {
        lane: usize,
        duration: u64,
    },
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ScheduledIntervention {
    pub step: u64,
    pub intervention: Intervention,
    seq: u64,
}

impl Eq for ScheduledIntervention {}

impl Ord for ScheduledIntervention {
    fn cmp(&self, other: &Self) -> Ordering {
        // Reverse ordering to make BinaryHeap a min-heap by step, then
        // insertion order.
        other
            .step
            .cmp(&self.step)
            .then_with(|| other.seq.cmp(&self.seq))
    }
}

impl PartialOrd for ScheduledIntervention {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

/// Interventions keyed by the simulated step at which they apply.
#[derive(Debug, Clone, Default)]
pub struct ScenarioClock {
    events: BinaryHeap<ScheduledIntervention>,
    next_seq: u64,
}

impl ScenarioClock {
    pub fn schedule(&mut self, step: u64, intervention: Intervention) {
        self.events.push(ScheduledIntervention {
            step,
            intervention,
            seq: self.next_seq,
        });
        self.next_seq += 1;
    }

    /// Step of the earliest pending intervention.
    pub fn next_step(&self) -> Option<u64> {
        self.events.peek().map(|event| event.step)
    }

    /// Pop every intervention due at or before `step`, earliest first.
    pub fn pop_due(&mut self, step: u64) -> Vec<ScheduledIntervention> {
        let mut due = Vec::new();
        while self.next_step().is_some_and(|next| next <= step) {
            if let Some(event) = self.events.pop() {
                due.push(event);
            }
        }
        due
    }

    pub fn len(&self) -> usize {
        self.events.len()
    }

    pub fn is_empty(&self) -> bool {
        self.events.is_empty()
    }
}
