//! In-memory geometry host.
//!
//! Elements are stored in document coordinates keyed by selector. Used by the
//! interactive host and by tests.

use std::{
    collections::HashMap,
    sync::{
        atomic::{AtomicU64, AtomicUsize, Ordering},
        Mutex,
    },
};

use crate::{
    geometry::{Rect, Viewport},
    storage::lock,
};

use super::host::{ChangeNotifier, ChangeSource, GeometryHost, WatchId};

struct Watcher {
    source: ChangeSource,
    selector: String,
    notify: ChangeNotifier,
}

pub struct HeadlessDocument {
    elements: Mutex<HashMap<String, Rect>>,
    viewport: Mutex<Viewport>,
    watchers: Mutex<HashMap<WatchId, Watcher>>,
    next_watch: AtomicU64,
    scroll_requests: AtomicUsize,
    native_element_observer: bool,
}

impl HeadlessDocument {
    pub fn new(viewport: Viewport) -> Self {
        Self {
            elements: Mutex::new(HashMap::new()),
            viewport: Mutex::new(viewport),
            watchers: Mutex::new(HashMap::new()),
            next_watch: AtomicU64::new(1),
            scroll_requests: AtomicUsize::new(0),
            native_element_observer: true,
        }
    }

    /// A document that cannot observe element resizes, forcing polling.
    pub fn without_element_observer(viewport: Viewport) -> Self {
        Self {
            native_element_observer: false,
            ..Self::new(viewport)
        }
    }

    /// Adds or resizes an element (document coordinates).
    pub fn set_element(&self, selector: &str, rect: Rect) {
        lock(&self.elements).insert(selector.to_string(), rect);
        self.notify(ChangeSource::ElementResized, Some(selector));
    }

    pub fn remove_element(&self, selector: &str) {
        if lock(&self.elements).remove(selector).is_some() {
            self.notify(ChangeSource::ElementResized, Some(selector));
        }
    }

    pub fn resize(&self, width: f64, height: f64) {
        {
            let mut viewport = lock(&self.viewport);
            viewport.width = width;
            viewport.height = height;
        }
        self.notify(ChangeSource::WindowResized, None);
    }

    pub fn scroll_to(&self, x: f64, y: f64) {
        {
            let mut viewport = lock(&self.viewport);
            viewport.scroll_x = x.max(0.0);
            viewport.scroll_y = y.max(0.0);
        }
        self.notify(ChangeSource::WindowScrolled, None);
    }

    /// Document-space bounds of `selector`, if present.
    pub fn element(&self, selector: &str) -> Option<Rect> {
        lock(&self.elements).get(selector).copied()
    }

    pub fn live_watchers(&self) -> usize {
        lock(&self.watchers).len()
    }

    pub fn scroll_requests(&self) -> usize {
        self.scroll_requests.load(Ordering::SeqCst)
    }

    fn notify(&self, source: ChangeSource, selector: Option<&str>) {
        let mut watchers = lock(&self.watchers);
        // Receivers that went away are pruned here.
        watchers.retain(|_, watcher| {
            if watcher.source != source {
                return true;
            }
            if let Some(selector) = selector {
                if watcher.selector != selector {
                    return true;
                }
            }
            watcher.notify.send(source).is_ok()
        });
    }
}

impl Default for HeadlessDocument {
    fn default() -> Self {
        Self::new(Viewport::default())
    }
}

impl GeometryHost for HeadlessDocument {
    fn bounding_box(&self, selector: &str) -> Option<Rect> {
        let rect = *lock(&self.elements).get(selector)?;
        Some(lock(&self.viewport).to_viewport(&rect))
    }

    fn viewport(&self) -> Viewport {
        *lock(&self.viewport)
    }

    fn scroll_into_view(&self, selector: &str) {
        let Some(rect) = lock(&self.elements).get(selector).copied() else {
            return;
        };
        self.scroll_requests.fetch_add(1, Ordering::SeqCst);

        let viewport = self.viewport();
        let x = rect.center_x() - viewport.width / 2.0;
        let y = rect.center_y() - viewport.height / 2.0;
        self.scroll_to(x, y);
    }

    fn watch(
        &self,
        source: ChangeSource,
        selector: &str,
        notify: ChangeNotifier,
    ) -> Option<WatchId> {
        if source == ChangeSource::ElementResized && !self.native_element_observer {
            return None;
        }

        let id = WatchId(self.next_watch.fetch_add(1, Ordering::SeqCst));
        lock(&self.watchers).insert(
            id,
            Watcher {
                source,
                selector: selector.to_string(),
                notify,
            },
        );
        Some(id)
    }

    fn unwatch(&self, id: WatchId) {
        lock(&self.watchers).remove(&id);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tokio::sync::mpsc;

    #[test]
    fn bounding_box_is_viewport_relative() {
        let doc = HeadlessDocument::new(Viewport::new(800.0, 600.0));
        doc.set_element("#a", Rect::new(1000.0, 20.0, 100.0, 40.0));
        doc.scroll_to(0.0, 900.0);
        assert_eq!(doc.bounding_box("#a"), Some(Rect::new(100.0, 20.0, 100.0, 40.0)));
        assert_eq!(doc.bounding_box("#missing"), None);
    }

    #[test]
    fn scroll_into_view_centers_element() {
        let doc = HeadlessDocument::new(Viewport::new(800.0, 600.0));
        doc.set_element("#a", Rect::new(2000.0, 0.0, 100.0, 100.0));
        doc.scroll_into_view("#a");

        let viewport = doc.viewport();
        assert_eq!(viewport.scroll_y, 2050.0 - 300.0);
        assert_eq!(doc.scroll_requests(), 1);
    }

    #[test]
    fn watchers_receive_matching_changes_only() {
        let doc = HeadlessDocument::default();
        let (tx, mut rx) = mpsc::unbounded_channel();
        let element = doc.watch(ChangeSource::ElementResized, "#a", tx.clone()).unwrap();
        doc.watch(ChangeSource::WindowResized, "#a", tx).unwrap();

        doc.set_element("#b", Rect::default());
        assert!(rx.try_recv().is_err());

        doc.set_element("#a", Rect::default());
        assert_eq!(rx.try_recv().unwrap(), ChangeSource::ElementResized);

        doc.resize(400.0, 400.0);
        assert_eq!(rx.try_recv().unwrap(), ChangeSource::WindowResized);

        doc.unwatch(element);
        assert_eq!(doc.live_watchers(), 1);
    }

    #[test]
    fn polling_document_refuses_element_watch() {
        let doc = HeadlessDocument::without_element_observer(Viewport::default());
        let (tx, _rx) = mpsc::unbounded_channel();
        assert!(doc.watch(ChangeSource::ElementResized, "#a", tx.clone()).is_none());
        assert!(doc.watch(ChangeSource::WindowScrolled, "#a", tx).is_some());
    }
}
