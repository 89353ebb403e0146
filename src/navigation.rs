//! Keeps the host's visible screen in step with the tour.
//!
//! Navigation is deferred by a short delay so the view holding the next
//! target can mount first. Only the most recent request may fire.

use std::{
    sync::{Arc, Mutex, RwLock},
    time::Duration,
};

use tokio::{task::JoinHandle, time};
use tokio_util::sync::CancellationToken;

use crate::storage::lock;

const ENABLE_LOGS: bool = true;

use crate::{log_debug, log_info};

/// Host callback receiving the route a step needs.
pub type NavigateFn = Arc<dyn Fn(&str) + Send + Sync>;

struct PendingNavigation {
    route: String,
    token: CancellationToken,
    handle: JoinHandle<()>,
}

#[derive(Clone)]
pub struct NavigationSynchronizer {
    callback: Arc<RwLock<Option<NavigateFn>>>,
    pending: Arc<Mutex<Option<PendingNavigation>>>,
    delay: Duration,
}

impl NavigationSynchronizer {
    pub fn new(delay: Duration) -> Self {
        Self {
            callback: Arc::new(RwLock::new(None)),
            pending: Arc::new(Mutex::new(None)),
            delay,
        }
    }

    /// Replaces the host callback. A pending navigation uses whichever
    /// callback is registered when it fires.
    pub fn set_callback(&self, callback: Option<NavigateFn>) {
        let mut guard = match self.callback.write() {
            Ok(guard) => guard,
            Err(poisoned) => poisoned.into_inner(),
        };
        *guard = callback;
    }

    /// Schedules navigation to `route`, superseding any pending request.
    pub fn schedule(&self, route: &str) {
        let mut pending = lock(&self.pending);
        if let Some(previous) = pending.take() {
            log_debug!("Superseding pending navigation to {}", previous.route);
            previous.token.cancel();
            previous.handle.abort();
        }

        let token = CancellationToken::new();
        let task_token = token.clone();
        let callback = self.callback.clone();
        let route_owned = route.to_string();
        let delay = self.delay;

        let handle = tokio::spawn(async move {
            tokio::select! {
                _ = time::sleep(delay) => {}
                _ = task_token.cancelled() => return,
            }

            let callback = match callback.read() {
                Ok(guard) => guard.clone(),
                Err(poisoned) => poisoned.into_inner().clone(),
            };

            match callback {
                Some(navigate) => {
                    log_info!("Navigating host to {}", route_owned);
                    navigate(&route_owned);
                }
                None => log_debug!("No navigation callback registered for {}", route_owned),
            }
        });

        *pending = Some(PendingNavigation {
            route: route.to_string(),
            token,
            handle,
        });
    }

    pub fn cancel(&self) {
        if let Some(previous) = lock(&self.pending).take() {
            previous.token.cancel();
            previous.handle.abort();
        }
    }

    pub fn has_pending(&self) -> bool {
        lock(&self.pending)
            .as_ref()
            .is_some_and(|pending| !pending.handle.is_finished())
    }
}
