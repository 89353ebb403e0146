mod types;

pub use types::{AnalyticsRecord, Feedback, TourSummary};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

const MAX_RECORDS: usize = 200;

/// Per-run walkthrough history. Only the tour controller writes to it.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
#[serde(transparent)]
pub struct AnalyticsRecorder {
    records: Vec<AnalyticsRecord>,
}

impl AnalyticsRecorder {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn records(&self) -> &[AnalyticsRecord] {
        &self.records
    }

    pub fn latest(&self, tour_id: &str) -> Option<&AnalyticsRecord> {
        self.records.iter().rev().find(|r| r.tour_id == tour_id)
    }

    /// Opens a run. An unfinished previous run of the same tour is replaced.
    pub fn start_run(&mut self, tour_id: &str, now: DateTime<Utc>) -> &AnalyticsRecord {
        if let Some(pos) = self.records.iter().rposition(|r| r.tour_id == tour_id) {
            if !self.records[pos].completed {
                self.records.remove(pos);
            }
        }

        self.records.push(AnalyticsRecord::new(tour_id, now));

        if self.records.len() > MAX_RECORDS {
            let overflow = self.records.len() - MAX_RECORDS;
            self.records.drain(..overflow);
        }

        &self.records[self.records.len() - 1]
    }

    pub fn record_visit(&mut self, tour_id: &str, index: usize) {
        if let Some(record) = self.open_run(tour_id) {
            record.steps_visited.push(index);
        }
    }

    pub fn record_skip(&mut self, tour_id: &str, index: usize) {
        if let Some(record) = self.open_run(tour_id) {
            record.skipped_steps.push(index);
        }
    }

    pub fn complete_run(&mut self, tour_id: &str, now: DateTime<Utc>) {
        if let Some(record) = self.open_run(tour_id) {
            record.completed = true;
            record.completed_at = Some(now);
        }
    }

    /// Attaches feedback to the most recent run of `tour_id`.
    pub fn record_feedback(&mut self, tour_id: &str, feedback: Feedback) -> bool {
        match self.records.iter_mut().rev().find(|r| r.tour_id == tour_id) {
            Some(record) => {
                record.feedback = Some(feedback);
                true
            }
            None => false,
        }
    }

    pub fn summary(&self) -> Vec<TourSummary> {
        let mut grouped: BTreeMap<&str, Vec<&AnalyticsRecord>> = BTreeMap::new();
        for record in &self.records {
            grouped.entry(record.tour_id.as_str()).or_default().push(record);
        }

        grouped
            .into_iter()
            .map(|(tour_id, runs)| {
                let skipped: usize = runs.iter().map(|r| r.skipped_steps.len()).sum();
                TourSummary {
                    tour_id: tour_id.to_string(),
                    runs: runs.len(),
                    completions: runs.iter().filter(|r| r.completed).count(),
                    average_skipped: skipped as f64 / runs.len() as f64,
                    positive_feedback: runs
                        .iter()
                        .filter(|r| r.feedback == Some(Feedback::Positive))
                        .count(),
                    negative_feedback: runs
                        .iter()
                        .filter(|r| r.feedback == Some(Feedback::Negative))
                        .count(),
                }
            })
            .collect()
    }

    fn open_run(&mut self, tour_id: &str) -> Option<&mut AnalyticsRecord> {
        self.records
            .iter_mut()
            .rev()
            .find(|r| r.tour_id == tour_id && !r.completed)
    }
}
