//! Highlight geometry for the current tour step.
//!
//! Each tracked step owns one background task. The task waits for the page
//! to settle, measures the target, scrolls it into view once, then
//! re-measures whenever the element, the window size or the scroll position
//! changes. Tracking a new step (or releasing) tears the previous task and
//! its observers down before anything new is registered.

pub mod headless;
pub mod host;

pub use headless::HeadlessDocument;
pub use host::{ChangeNotifier, ChangeSource, GeometryHost, WatchId};

use std::{
    future,
    sync::{Arc, Mutex},
    time::Duration,
};

use serde::Serialize;
use tokio::{
    sync::{mpsc, watch},
    task::JoinHandle,
    time::{self, MissedTickBehavior},
};
use tokio_util::sync::CancellationToken;

use crate::{config::TourConfig, geometry::HighlightRect, storage::lock};

const ENABLE_LOGS: bool = true;

use crate::{log_debug, log_info, log_warn};

#[derive(Debug, Clone, Copy, Serialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub enum SpotlightStatus {
    Idle,
    Settling,
    Located,
    /// The selector matched nothing, or the element went away mid-step.
    TargetNotFound,
}

#[derive(Debug, Clone, Serialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct SpotlightState {
    pub step_key: Option<String>,
    pub status: SpotlightStatus,
    pub highlight: Option<HighlightRect>,
    #[serde(skip)]
    generation: u64,
}

impl SpotlightState {
    fn idle(generation: u64) -> Self {
        Self {
            step_key: None,
            status: SpotlightStatus::Idle,
            highlight: None,
            generation,
        }
    }
}

#[derive(Debug, Clone, Copy)]
pub struct SpotlightSettings {
    pub padding: f64,
    pub settle_delay: Duration,
    pub poll_interval: Duration,
}

impl From<&TourConfig> for SpotlightSettings {
    fn from(config: &TourConfig) -> Self {
        Self {
            padding: config.spotlight_padding,
            settle_delay: config.settle_delay,
            poll_interval: config.poll_interval,
        }
    }
}

struct ActiveSpotlight {
    step_key: String,
    token: CancellationToken,
    handle: JoinHandle<()>,
    watches: Arc<Mutex<Vec<WatchId>>>,
}

struct Tracker {
    active: Option<ActiveSpotlight>,
    generation: u64,
}

#[derive(Clone)]
pub struct SpotlightEngine {
    host: Arc<dyn GeometryHost>,
    settings: SpotlightSettings,
    tracker: Arc<Mutex<Tracker>>,
    state_tx: Arc<watch::Sender<SpotlightState>>,
}

impl SpotlightEngine {
    pub fn new(host: Arc<dyn GeometryHost>, settings: SpotlightSettings) -> Self {
        let (state_tx, _) = watch::channel(SpotlightState::idle(0));
        Self {
            host,
            settings,
            tracker: Arc::new(Mutex::new(Tracker {
                active: None,
                generation: 0,
            })),
            state_tx: Arc::new(state_tx),
        }
    }

    pub fn host(&self) -> &Arc<dyn GeometryHost> {
        &self.host
    }

    pub fn state(&self) -> SpotlightState {
        self.state_tx.borrow().clone()
    }

    pub fn subscribe(&self) -> watch::Receiver<SpotlightState> {
        self.state_tx.subscribe()
    }

    /// Starts tracking `selector` for the step identified by `step_key`.
    /// Re-tracking the step already being tracked is a no-op.
    pub fn track(&self, step_key: &str, selector: &str) {
        let mut tracker = lock(&self.tracker);
        if tracker
            .active
            .as_ref()
            .is_some_and(|active| active.step_key == step_key)
        {
            return;
        }

        self.teardown(&mut tracker);
        tracker.generation += 1;
        let generation = tracker.generation;

        self.state_tx.send_replace(SpotlightState {
            step_key: Some(step_key.to_string()),
            status: SpotlightStatus::Settling,
            highlight: None,
            generation,
        });

        let token = CancellationToken::new();
        let watches = Arc::new(Mutex::new(Vec::new()));
        let job = TrackJob {
            host: self.host.clone(),
            settings: self.settings,
            step_key: step_key.to_string(),
            selector: selector.to_string(),
            generation,
            token: token.clone(),
            watches: watches.clone(),
            state_tx: self.state_tx.clone(),
        };

        log_debug!("Tracking {} for step {}", selector, step_key);
        let handle = tokio::spawn(job.run());

        tracker.active = Some(ActiveSpotlight {
            step_key: step_key.to_string(),
            token,
            handle,
            watches,
        });
    }

    /// Stops tracking. Observers are unregistered before this returns.
    pub fn release(&self) {
        let mut tracker = lock(&self.tracker);
        self.teardown(&mut tracker);
        tracker.generation += 1;
        self.state_tx
            .send_replace(SpotlightState::idle(tracker.generation));
    }

    fn teardown(&self, tracker: &mut Tracker) {
        let Some(active) = tracker.active.take() else {
            return;
        };

        active.token.cancel();
        active.handle.abort();
        for id in lock(&active.watches).drain(..) {
            self.host.unwatch(id);
        }
        log_debug!("Released spotlight for step {}", active.step_key);
    }
}

struct TrackJob {
    host: Arc<dyn GeometryHost>,
    settings: SpotlightSettings,
    step_key: String,
    selector: String,
    generation: u64,
    token: CancellationToken,
    watches: Arc<Mutex<Vec<WatchId>>>,
    state_tx: Arc<watch::Sender<SpotlightState>>,
}

impl TrackJob {
    async fn run(self) {
        tokio::select! {
            _ = time::sleep(self.settings.settle_delay) => {}
            _ = self.token.cancelled() => return,
        }

        // Scroll happens once per step, the first time the target is found.
        let mut scrolled = false;
        let mut highlight = self.locate(&mut scrolled);
        if highlight.is_none() {
            log_warn!("Tour target {} not found for step {}", self.selector, self.step_key);
        }
        self.publish(highlight);

        let (change_tx, mut change_rx) = mpsc::unbounded_channel();
        // Holding `change_tx` keeps the channel open even if the host registers nothing.
        let needs_polling = !self.subscribe(change_tx.clone());

        let mut poller = needs_polling.then(|| {
            let mut interval = time::interval(self.settings.poll_interval);
            interval.set_missed_tick_behavior(MissedTickBehavior::Delay);
            interval
        });

        loop {
            tokio::select! {
                _ = self.token.cancelled() => break,
                change = change_rx.recv() => {
                    if change.is_none() {
                        break;
                    }
                }
                _ = async {
                    match poller.as_mut() {
                        Some(interval) => {
                            interval.tick().await;
                        }
                        None => future::pending::<()>().await,
                    }
                } => {}
            }

            let next = self.locate(&mut scrolled);
            if next != highlight {
                if next.is_none() {
                    log_warn!(
                        "Tour target {} disappeared during step {}",
                        self.selector,
                        self.step_key
                    );
                }
                highlight = next;
                self.publish(highlight);
            }
        }
    }

    /// Registers the three change sources. Returns false when element
    /// resizes have to be polled instead.
    fn subscribe(&self, notify: ChangeNotifier) -> bool {
        let mut watches = lock(&self.watches);
        if self.token.is_cancelled() {
            return true;
        }

        let mut native_element = true;
        for source in ChangeSource::ALL {
            match self.host.watch(source, &self.selector, notify.clone()) {
                Some(id) => watches.push(id),
                None if source == ChangeSource::ElementResized => native_element = false,
                None => log_warn!("Host cannot observe {:?}", source),
            }
        }
        native_element
    }

    /// Measures the target, scrolling it into view on the first sighting.
    fn locate(&self, scrolled: &mut bool) -> Option<HighlightRect> {
        let highlight = self.measure()?;
        if *scrolled {
            return Some(highlight);
        }
        *scrolled = true;
        self.host.scroll_into_view(&self.selector);
        log_info!("Spotlight located {} for step {}", self.selector, self.step_key);
        self.measure()
    }

    fn measure(&self) -> Option<HighlightRect> {
        let rect = self.host.bounding_box(&self.selector)?;
        let viewport = self.host.viewport();
        Some(viewport.to_document(&rect).inflate(self.settings.padding))
    }

    fn publish(&self, highlight: Option<HighlightRect>) {
        let status = if highlight.is_some() {
            SpotlightStatus::Located
        } else {
            SpotlightStatus::TargetNotFound
        };

        self.state_tx.send_if_modified(|state| {
            if state.generation != self.generation {
                return false;
            }
            state.status = status;
            state.highlight = highlight;
            true
        });
    }
}
