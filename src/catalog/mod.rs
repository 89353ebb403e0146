pub mod builtin;
pub mod types;

pub use types::{Layout, LayoutApplicability, Placement, Role, Step, Tour, TourCategory};

use anyhow::{bail, Context, Result};
use std::{collections::HashSet, fs, path::Path};

/// Read-only collection of tours, in declaration order.
#[derive(Debug, Clone, Default)]
pub struct TourCatalog {
    tours: Vec<Tour>,
}

impl TourCatalog {
    pub fn new(tours: Vec<Tour>) -> Result<Self> {
        let mut seen = HashSet::new();
        for tour in &tours {
            if !seen.insert(tour.id.as_str()) {
                bail!("duplicate tour id '{}'", tour.id);
            }

            let mut step_ids = HashSet::new();
            for step in &tour.steps {
                if !step_ids.insert(step.id.as_str()) {
                    bail!("duplicate step id '{}' in tour '{}'", step.id, tour.id);
                }
            }
        }

        Ok(Self { tours })
    }

    pub fn from_json_file(path: &Path) -> Result<Self> {
        let contents = fs::read_to_string(path)
            .with_context(|| format!("Failed to read catalog from {}", path.display()))?;
        let tours: Vec<Tour> = serde_json::from_str(&contents)
            .with_context(|| format!("Failed to parse catalog {}", path.display()))?;
        Self::new(tours)
    }

    pub fn get(&self, tour_id: &str) -> Option<&Tour> {
        self.tours.iter().find(|tour| tour.id == tour_id)
    }

    pub fn tours(&self) -> &[Tour] {
        &self.tours
    }

    pub fn available_for(&self, role: Role) -> Vec<Tour> {
        self.tours
            .iter()
            .filter(|tour| tour.allows(role))
            .cloned()
            .collect()
    }
}
