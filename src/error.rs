use thiserror::Error;

use crate::catalog::{Layout, Role};

/// Reasons a tour cannot be started. None of them are fatal to the host.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum TourError {
    #[error("tour '{0}' does not exist")]
    UnknownTour(String),

    #[error("tour '{tour_id}' is not available for role {role:?}")]
    NotEligible { tour_id: String, role: Option<Role> },

    #[error("tour '{tour_id}' has no steps for {role} on {layout}")]
    NoStepsForLayout {
        tour_id: String,
        role: Role,
        layout: Layout,
    },
}

impl TourError {
    /// Text suitable for a toast.
    pub fn user_message(&self) -> String {
        match self {
            TourError::UnknownTour(_) => "That tour could not be found.".to_string(),
            TourError::NotEligible { .. } => "This tour isn't available for your role.".to_string(),
            TourError::NoStepsForLayout { .. } => {
                "No tour steps are available for this screen size.".to_string()
            }
        }
    }
}
