pub mod controller;
pub mod selector;
pub mod state;

pub use controller::{NotifyFn, OverlayView, TourController, TourProgress, TourSnapshot};
pub use selector::select_steps;
pub use state::{Advance, TourState, TourStatus};
