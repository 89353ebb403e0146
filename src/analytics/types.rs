use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub enum Feedback {
    Positive,
    Negative,
}

/// Log of one walkthrough of a tour.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct AnalyticsRecord {
    pub run_id: Uuid,
    pub tour_id: String,
    pub started_at: DateTime<Utc>,
    pub completed_at: Option<DateTime<Utc>>,
    pub steps_visited: Vec<usize>,
    pub skipped_steps: Vec<usize>,
    pub feedback: Option<Feedback>,
    pub completed: bool,
}

impl AnalyticsRecord {
    pub fn new(tour_id: &str, started_at: DateTime<Utc>) -> Self {
        Self {
            run_id: Uuid::new_v4(),
            tour_id: tour_id.to_string(),
            started_at,
            completed_at: None,
            steps_visited: vec![0],
            skipped_steps: Vec::new(),
            feedback: None,
            completed: false,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct TourSummary {
    pub tour_id: String,
    pub runs: usize,
    pub completions: usize,
    pub average_skipped: f64,
    pub positive_feedback: usize,
    pub negative_feedback: usize,
}
