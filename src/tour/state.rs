use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub enum TourStatus {
    Idle,
    Active,
    Paused,
}

impl Default for TourStatus {
    fn default() -> Self {
        TourStatus::Idle
    }
}

/// Result of moving forward through a tour.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Advance {
    /// Nothing was active.
    Ignored,
    Moved(usize),
    Completed(String),
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase", deny_unknown_fields)]
pub struct TourState {
    pub active_tour_id: Option<String>,
    pub current_step_index: usize,
    pub is_paused: bool,
    pub completed_tours: BTreeSet<String>,
    pub started_at: Option<DateTime<Utc>>,
}

impl TourState {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn status(&self) -> TourStatus {
        match (&self.active_tour_id, self.is_paused) {
            (None, _) => TourStatus::Idle,
            (Some(_), false) => TourStatus::Active,
            (Some(_), true) => TourStatus::Paused,
        }
    }

    pub fn is_active(&self) -> bool {
        self.active_tour_id.is_some()
    }

    pub fn begin(&mut self, tour_id: &str, now: DateTime<Utc>) {
        self.active_tour_id = Some(tour_id.to_string());
        self.current_step_index = 0;
        self.is_paused = false;
        self.started_at = Some(now);
    }

    /// Moves to the next of `total_steps`, completing the tour after the last one.
    /// Ignored while idle or paused.
    pub fn advance(&mut self, total_steps: usize) -> Advance {
        if !self.is_active() || self.is_paused {
            return Advance::Ignored;
        }

        if self.current_step_index + 1 >= total_steps {
            return match self.complete() {
                Some(tour_id) => Advance::Completed(tour_id),
                None => Advance::Ignored,
            };
        }

        self.current_step_index += 1;
        Advance::Moved(self.current_step_index)
    }

    /// Returns true when the index actually moved. Ignored while paused.
    pub fn retreat(&mut self) -> bool {
        if !self.is_active() || self.is_paused || self.current_step_index == 0 {
            return false;
        }
        self.current_step_index -= 1;
        true
    }

    /// Returns true when the paused flag changed.
    pub fn set_paused(&mut self, paused: bool) -> bool {
        if !self.is_active() || self.is_paused == paused {
            return false;
        }
        self.is_paused = paused;
        true
    }

    /// Ends the active tour and records it complete.
    pub fn complete(&mut self) -> Option<String> {
        let tour_id = self.active_tour_id.clone()?;
        self.completed_tours.insert(tour_id.clone());
        self.reset_active();
        Some(tour_id)
    }

    /// Ends the active tour without recording completion.
    pub fn abandon(&mut self) -> Option<String> {
        let tour_id = self.active_tour_id.clone()?;
        self.reset_active();
        Some(tour_id)
    }

    pub fn forget_completion(&mut self, tour_id: &str) -> bool {
        self.completed_tours.remove(tour_id)
    }

    /// Pulls the index back inside `0..total_steps`. Returns true if it moved.
    pub fn clamp_index(&mut self, total_steps: usize) -> bool {
        let max_index = total_steps.saturating_sub(1);
        if self.current_step_index > max_index {
            self.current_step_index = max_index;
            return true;
        }
        false
    }

    /// Restores the idle invariants after rehydration from untrusted storage.
    pub fn normalize(&mut self) {
        if self.active_tour_id.is_none() {
            self.reset_active();
        }
    }

    fn reset_active(&mut self) {
        self.active_tour_id = None;
        self.current_step_index = 0;
        self.is_paused = false;
        self.started_at = None;
    }
}
