use serde::{Deserialize, Serialize};
use tokio::sync::mpsc;

use crate::geometry::{Rect, Viewport};

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "camelCase")]
pub enum ChangeSource {
    ElementResized,
    WindowResized,
    WindowScrolled,
}

impl ChangeSource {
    pub const ALL: [ChangeSource; 3] = [
        ChangeSource::ElementResized,
        ChangeSource::WindowResized,
        ChangeSource::WindowScrolled,
    ];
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct WatchId(pub u64);

pub type ChangeNotifier = mpsc::UnboundedSender<ChangeSource>;

/// The rendering surface the tour runs over (a browser document, a webview,
/// or the headless stand-in).
pub trait GeometryHost: Send + Sync {
    /// Bounds of the element matching `selector`, relative to the viewport.
    fn bounding_box(&self, selector: &str) -> Option<Rect>;

    fn viewport(&self) -> Viewport;

    /// Scrolls so the element sits in the middle of the viewport.
    fn scroll_into_view(&self, selector: &str);

    /// Starts forwarding `source` changes to `notify`. Returns `None` when the
    /// host has no native observer for that source.
    fn watch(&self, source: ChangeSource, selector: &str, notify: ChangeNotifier)
        -> Option<WatchId>;

    fn unwatch(&self, id: WatchId);
}
