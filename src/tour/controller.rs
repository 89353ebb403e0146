use std::sync::{Arc, RwLock};

use chrono::Utc;
use log::{error, info, warn};
use serde::Serialize;
use tokio::sync::{watch, Mutex};

use crate::{
    analytics::{AnalyticsRecord, AnalyticsRecorder, Feedback, TourSummary},
    catalog::{Layout, Role, Step, Tour, TourCatalog},
    config::TourConfig,
    error::TourError,
    navigation::{NavigateFn, NavigationSynchronizer},
    overlay::{OverlayLayout, OverlayPosition},
    spotlight::{GeometryHost, SpotlightEngine, SpotlightSettings, SpotlightState, SpotlightStatus},
    storage::{self, KeyValueStore, ANALYTICS_KEY, TOUR_STATE_KEY},
};

use super::{select_steps, Advance, TourState, TourStatus};

/// Host callback that shows a short message to the user.
pub type NotifyFn = Arc<dyn Fn(&str) + Send + Sync>;

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct TourSnapshot {
    pub state: TourState,
    pub status: TourStatus,
    pub role: Option<Role>,
    pub layout: Layout,
    pub tour: Option<Tour>,
    pub step: Option<Step>,
    pub total_steps: usize,
}

#[derive(Debug, Clone, Copy, Serialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct TourProgress {
    pub completed: bool,
    pub steps_completed: usize,
    pub total_steps: usize,
}

/// Everything a card renderer needs for the step on screen.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct OverlayView {
    pub step: Step,
    pub step_index: usize,
    pub total_steps: usize,
    pub spotlight: SpotlightState,
    pub position: OverlayPosition,
}

struct Session {
    state: TourState,
    analytics: AnalyticsRecorder,
    role: Option<Role>,
    layout: Layout,
    /// Step last handed to navigation and spotlight; `None` while idle or paused.
    shown_step: Option<String>,
}

/// Single writer of the tour state. Cloning shares the same session.
#[derive(Clone)]
pub struct TourController {
    session: Arc<Mutex<Session>>,
    catalog: Arc<TourCatalog>,
    store: Arc<dyn KeyValueStore>,
    navigation: NavigationSynchronizer,
    spotlight: SpotlightEngine,
    overlay: OverlayLayout,
    mobile_breakpoint: f64,
    notifier: Arc<RwLock<Option<NotifyFn>>>,
    snapshot_tx: Arc<watch::Sender<TourSnapshot>>,
}

impl TourController {
    /// Rehydrates persisted state. Nothing is shown until a role is pushed in.
    pub fn new(
        catalog: Arc<TourCatalog>,
        store: Arc<dyn KeyValueStore>,
        host: Arc<dyn GeometryHost>,
        config: &TourConfig,
    ) -> Self {
        let mut state: TourState = storage::load_or_default(store.as_ref(), TOUR_STATE_KEY);
        state.normalize();
        if let Some(tour_id) = state.active_tour_id.clone() {
            if catalog.get(&tour_id).is_none() {
                warn!("Discarding persisted tour {tour_id}: no longer in catalog");
                state.abandon();
            } else {
                info!(
                    "Rehydrated tour {tour_id} at step {}",
                    state.current_step_index
                );
            }
        }

        let analytics: AnalyticsRecorder = storage::load_or_default(store.as_ref(), ANALYTICS_KEY);
        let layout = Layout::from_viewport_width(host.viewport().width, config.mobile_breakpoint);

        let session = Session {
            state,
            analytics,
            role: None,
            layout,
            shown_step: None,
        };
        let (snapshot_tx, _) = watch::channel(snapshot_of(&catalog, &session));

        Self {
            session: Arc::new(Mutex::new(session)),
            catalog,
            store,
            navigation: NavigationSynchronizer::new(config.navigation_delay),
            spotlight: SpotlightEngine::new(host, SpotlightSettings::from(config)),
            overlay: OverlayLayout::from(config),
            mobile_breakpoint: config.mobile_breakpoint,
            notifier: Arc::new(RwLock::new(None)),
            snapshot_tx: Arc::new(snapshot_tx),
        }
    }

    pub fn set_navigation_callback(&self, callback: Option<NavigateFn>) {
        self.navigation.set_callback(callback);
    }

    pub fn set_notifier(&self, notifier: Option<NotifyFn>) {
        let mut guard = match self.notifier.write() {
            Ok(guard) => guard,
            Err(poisoned) => poisoned.into_inner(),
        };
        *guard = notifier;
    }

    pub fn subscribe(&self) -> watch::Receiver<TourSnapshot> {
        self.snapshot_tx.subscribe()
    }

    pub fn spotlight(&self) -> &SpotlightEngine {
        &self.spotlight
    }

    pub fn catalog(&self) -> &TourCatalog {
        &self.catalog
    }

    pub async fn start_tour(&self, tour_id: &str) -> Result<TourSnapshot, TourError> {
        let mut session = self.session.lock().await;
        self.begin_tour(&mut session, tour_id)
    }

    pub async fn restart_tour(&self, tour_id: &str) -> Result<TourSnapshot, TourError> {
        let mut session = self.session.lock().await;
        if session.state.forget_completion(tour_id) {
            self.persist_state(&session);
        }
        self.begin_tour(&mut session, tour_id)
    }

    pub async fn next_step(&self) -> TourSnapshot {
        let mut session = self.session.lock().await;
        self.step_forward(&mut session, false)
    }

    pub async fn skip_step(&self) -> TourSnapshot {
        let mut session = self.session.lock().await;
        self.step_forward(&mut session, true)
    }

    pub async fn prev_step(&self) -> TourSnapshot {
        let mut session = self.session.lock().await;
        if !session.state.retreat() {
            return self.view(&session);
        }
        self.persist_state(&session);
        self.settle(&mut session)
    }

    pub async fn pause_tour(&self) -> TourSnapshot {
        self.set_paused(true).await
    }

    /// Resuming re-synchronizes navigation, since the host may have moved on.
    pub async fn resume_tour(&self) -> TourSnapshot {
        self.set_paused(false).await
    }

    /// Ends the active tour, recording completion when `completed` is set.
    pub async fn end_tour(&self, completed: bool) -> TourSnapshot {
        let mut session = self.session.lock().await;
        let Some(tour_id) = session.state.active_tour_id.clone() else {
            return self.view(&session);
        };

        if completed {
            session.state.complete();
            session.analytics.complete_run(&tour_id, Utc::now());
            info!("Tour {tour_id} marked complete");
        } else {
            session.state.abandon();
            info!("Tour {tour_id} dismissed");
        }

        self.persist_state(&session);
        self.persist_analytics(&session);
        self.settle(&mut session)
    }

    /// A different role ends any active tour, since step eligibility depends on it.
    /// The first role pushed after startup keeps a rehydrated tour it may see.
    pub async fn set_user_role(&self, role: Role) -> TourSnapshot {
        let mut session = self.session.lock().await;
        let previous = session.role.replace(role);
        if previous == Some(role) {
            return self.view(&session);
        }

        if let Some(tour_id) = session.state.active_tour_id.clone() {
            let keep = previous.is_none()
                && self
                    .catalog
                    .get(&tour_id)
                    .is_some_and(|tour| tour.allows(role));
            if !keep {
                session.state.abandon();
                self.persist_state(&session);
                info!("Role set to {role}; ended tour {tour_id}");
            } else if self.active_steps(&session).is_empty() {
                self.end_without_steps(&mut session, tour_id, role);
            }
        }

        self.settle(&mut session)
    }

    pub async fn set_layout(&self, layout: Layout) -> TourSnapshot {
        let mut session = self.session.lock().await;
        if session.layout == layout {
            return self.view(&session);
        }
        session.layout = layout;
        info!("Layout changed to {layout}");

        if let (Some(tour_id), Some(role)) = (session.state.active_tour_id.clone(), session.role) {
            let total = self.active_steps(&session).len();
            if total == 0 {
                self.end_without_steps(&mut session, tour_id, role);
            } else if session.state.clamp_index(total) {
                self.persist_state(&session);
            }
        }

        self.settle(&mut session)
    }

    /// Derives the layout from the viewport width against the mobile breakpoint.
    pub async fn set_viewport_width(&self, width: f64) -> TourSnapshot {
        self.set_layout(Layout::from_viewport_width(width, self.mobile_breakpoint))
            .await
    }

    /// Attaches feedback to the latest run of `tour_id`.
    pub async fn submit_feedback(&self, tour_id: &str, feedback: Feedback) -> bool {
        let mut session = self.session.lock().await;
        let recorded = session.analytics.record_feedback(tour_id, feedback);
        if recorded {
            self.persist_analytics(&session);
        }
        recorded
    }

    pub async fn snapshot(&self) -> TourSnapshot {
        let session = self.session.lock().await;
        self.view(&session)
    }

    pub async fn state(&self) -> TourState {
        self.session.lock().await.state.clone()
    }

    pub async fn current_tour(&self) -> Option<Tour> {
        self.snapshot().await.tour
    }

    pub async fn current_step(&self) -> Option<Step> {
        self.snapshot().await.step
    }

    pub async fn total_steps(&self) -> usize {
        self.snapshot().await.total_steps
    }

    pub async fn can_access_tour(&self, tour_id: &str) -> bool {
        let session = self.session.lock().await;
        match (self.catalog.get(tour_id), session.role) {
            (Some(tour), Some(role)) => tour.allows(role),
            _ => false,
        }
    }

    pub async fn get_tour_progress(&self, tour_id: &str) -> Option<TourProgress> {
        let session = self.session.lock().await;
        let tour = self.catalog.get(tour_id)?;
        let total_steps = session
            .role
            .map(|role| select_steps(tour, role, session.layout).len())
            .unwrap_or(0);

        let completed = session.state.completed_tours.contains(tour_id);
        let steps_completed = if completed {
            total_steps
        } else if session.state.active_tour_id.as_deref() == Some(tour_id) {
            session.state.current_step_index
        } else {
            0
        };

        Some(TourProgress {
            completed,
            steps_completed,
            total_steps,
        })
    }

    pub async fn get_available_tours(&self) -> Vec<Tour> {
        let session = self.session.lock().await;
        match session.role {
            Some(role) => self.catalog.available_for(role),
            None => Vec::new(),
        }
    }

    pub async fn analytics(&self) -> Vec<AnalyticsRecord> {
        self.session.lock().await.analytics.records().to_vec()
    }

    pub async fn analytics_summary(&self) -> Vec<TourSummary> {
        self.session.lock().await.analytics.summary()
    }

    /// Card placement for the step on screen, from the latest spotlight geometry.
    /// Geometry published for any other step counts as still settling.
    pub async fn overlay(&self) -> Option<OverlayView> {
        let session = self.session.lock().await;
        let snapshot = self.view(&session);
        if snapshot.status != TourStatus::Active {
            return None;
        }
        let step = snapshot.step?;

        let mut spotlight = self.spotlight.state();
        if spotlight.step_key != session.shown_step {
            spotlight.step_key = session.shown_step.clone();
            spotlight.status = SpotlightStatus::Settling;
            spotlight.highlight = None;
        }
        drop(session);

        let highlight = match spotlight.status {
            SpotlightStatus::Located => spotlight.highlight,
            _ => None,
        };
        let viewport = self.spotlight.host().viewport();
        let position = self
            .overlay
            .position(highlight.as_ref(), step.placement, &viewport);

        Some(OverlayView {
            step_index: snapshot.state.current_step_index,
            total_steps: snapshot.total_steps,
            step,
            spotlight,
            position,
        })
    }

    fn begin_tour(&self, session: &mut Session, tour_id: &str) -> Result<TourSnapshot, TourError> {
        let Some(tour) = self.catalog.get(tour_id) else {
            return Err(self.reject(TourError::UnknownTour(tour_id.to_string())));
        };

        let role = match session.role {
            Some(role) if tour.allows(role) => role,
            other => {
                return Err(self.reject(TourError::NotEligible {
                    tour_id: tour_id.to_string(),
                    role: other,
                }))
            }
        };

        if select_steps(tour, role, session.layout).is_empty() {
            return Err(self.reject(TourError::NoStepsForLayout {
                tour_id: tour_id.to_string(),
                role,
                layout: session.layout,
            }));
        }

        if let Some(previous) = session.state.abandon() {
            info!("Leaving tour {previous} to start {tour_id}");
        }
        self.halt(session);

        let now = Utc::now();
        session.state.begin(tour_id, now);
        session.analytics.start_run(tour_id, now);
        self.persist_state(session);
        self.persist_analytics(session);

        info!("Started tour {tour_id} as {role} on {}", session.layout);
        Ok(self.settle(session))
    }

    fn step_forward(&self, session: &mut Session, skipped: bool) -> TourSnapshot {
        let Some(tour_id) = session.state.active_tour_id.clone() else {
            return self.view(session);
        };
        if session.state.is_paused {
            info!("Tour {tour_id} is paused; ignoring step change");
            return self.view(session);
        }

        let total = self.active_steps(session).len();
        if total == 0 {
            let Some(role) = session.role else {
                warn!("Tour {tour_id} has no role to resolve steps for; ignoring step change");
                return self.view(session);
            };
            self.end_without_steps(session, tour_id, role);
            return self.settle(session);
        }

        if skipped {
            let index = session.state.current_step_index;
            session.analytics.record_skip(&tour_id, index);
            info!("Skipped step {index} of tour {tour_id}");
        }

        match session.state.advance(total) {
            Advance::Moved(index) => {
                session.analytics.record_visit(&tour_id, index);
                info!("Tour {tour_id} moved to step {index}/{total}");
            }
            Advance::Completed(_) => {
                session.analytics.complete_run(&tour_id, Utc::now());
                info!("Tour {tour_id} completed");
                if let Some(tour) = self.catalog.get(&tour_id) {
                    self.notify(&format!("You finished the {} tour.", tour.name));
                }
            }
            Advance::Ignored => return self.view(session),
        }

        self.persist_state(session);
        self.persist_analytics(session);
        self.settle(session)
    }

    async fn set_paused(&self, paused: bool) -> TourSnapshot {
        let mut session = self.session.lock().await;
        if !session.state.set_paused(paused) {
            return self.view(&session);
        }
        info!(
            "Tour {} {}",
            session.state.active_tour_id.as_deref().unwrap_or_default(),
            if paused { "paused" } else { "resumed" }
        );
        self.persist_state(&session);
        self.settle(&mut session)
    }

    fn active_steps(&self, session: &Session) -> Vec<Step> {
        active_steps(&self.catalog, session)
    }

    fn view(&self, session: &Session) -> TourSnapshot {
        snapshot_of(&self.catalog, session)
    }

    /// Brings navigation and spotlight in line with the state, then publishes.
    fn settle(&self, session: &mut Session) -> TourSnapshot {
        let steps = self.active_steps(session);
        if !steps.is_empty() && session.state.clamp_index(steps.len()) {
            self.persist_state(session);
        }

        let index = session.state.current_step_index;
        let step = steps.get(index);
        let shown = match (&session.state.active_tour_id, step) {
            (Some(tour_id), Some(step)) if !session.state.is_paused => {
                Some(format!("{tour_id}:{index}:{}", step.id))
            }
            _ => None,
        };

        if shown != session.shown_step {
            match (&shown, step.and_then(|step| step.route.as_deref())) {
                (Some(_), Some(route)) => self.navigation.schedule(route),
                _ => self.navigation.cancel(),
            }
        }

        match (&shown, step) {
            (Some(key), Some(step)) => self.spotlight.track(key, &step.target),
            _ => self.spotlight.release(),
        }
        session.shown_step = shown;

        let snapshot = self.view(session);
        self.snapshot_tx.send_replace(snapshot.clone());
        snapshot
    }

    /// Ends the active tour uncompleted when `role` has nothing to show at the
    /// current layout.
    fn end_without_steps(&self, session: &mut Session, tour_id: String, role: Role) {
        session.state.abandon();
        self.persist_state(session);
        let err = TourError::NoStepsForLayout {
            tour_id,
            role,
            layout: session.layout,
        };
        warn!("{err}; ending tour");
        self.notify(&err.user_message());
    }

    /// Drops pending navigation and spotlight work for the current step.
    fn halt(&self, session: &mut Session) {
        self.navigation.cancel();
        self.spotlight.release();
        session.shown_step = None;
    }

    fn reject(&self, err: TourError) -> TourError {
        warn!("Tour not started: {err}");
        self.notify(&err.user_message());
        err
    }

    fn notify(&self, message: &str) {
        let notifier = match self.notifier.read() {
            Ok(guard) => guard.clone(),
            Err(poisoned) => poisoned.into_inner().clone(),
        };
        if let Some(notify) = notifier {
            notify(message);
        }
    }

    fn persist_state(&self, session: &Session) {
        if let Err(err) = storage::save(self.store.as_ref(), TOUR_STATE_KEY, &session.state) {
            error!("Failed to persist tour state: {err:#}");
        }
    }

    fn persist_analytics(&self, session: &Session) {
        if let Err(err) = storage::save(self.store.as_ref(), ANALYTICS_KEY, &session.analytics) {
            error!("Failed to persist tour analytics: {err:#}");
        }
    }
}

fn active_steps(catalog: &TourCatalog, session: &Session) -> Vec<Step> {
    match (session.state.active_tour_id.as_deref(), session.role) {
        (Some(tour_id), Some(role)) => catalog
            .get(tour_id)
            .map(|tour| select_steps(tour, role, session.layout))
            .unwrap_or_default(),
        _ => Vec::new(),
    }
}

fn snapshot_of(catalog: &TourCatalog, session: &Session) -> TourSnapshot {
    let tour = session
        .state
        .active_tour_id
        .as_deref()
        .and_then(|tour_id| catalog.get(tour_id))
        .cloned();
    let steps = active_steps(catalog, session);

    TourSnapshot {
        status: session.state.status(),
        role: session.role,
        layout: session.layout,
        tour,
        step: steps.get(session.state.current_step_index).cloned(),
        total_steps: steps.len(),
        state: session.state.clone(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{
        catalog::{builtin, LayoutApplicability, Placement, TourCategory},
        geometry::{Rect, Viewport},
        overlay::{CardSize, Offset},
        spotlight::HeadlessDocument,
        storage::MemoryStore,
    };
    use std::{sync::Mutex as StdMutex, time::Duration};
    use tokio::time;

    struct Harness {
        controller: TourController,
        doc: Arc<HeadlessDocument>,
        routes: Arc<StdMutex<Vec<String>>>,
        messages: Arc<StdMutex<Vec<String>>>,
    }

    fn harness_with(catalog: TourCatalog, store: Arc<MemoryStore>) -> Harness {
        harness_on(catalog, store, Viewport::new(1280.0, 800.0))
    }

    fn harness_on(catalog: TourCatalog, store: Arc<MemoryStore>, viewport: Viewport) -> Harness {
        let doc = Arc::new(HeadlessDocument::new(viewport));
        for tour in catalog.tours() {
            for (i, step) in tour.steps.iter().enumerate() {
                if step.target != "#missing" {
                    let top = 120.0 + i as f64 * 40.0;
                    doc.set_element(&step.target, Rect::new(top, 300.0, 200.0, 48.0));
                }
            }
        }

        let controller = TourController::new(
            Arc::new(catalog),
            store,
            doc.clone(),
            &TourConfig::default(),
        );

        let routes = Arc::new(StdMutex::new(Vec::new()));
        let route_sink = routes.clone();
        controller.set_navigation_callback(Some(Arc::new(move |route: &str| {
            route_sink.lock().unwrap().push(route.to_string());
        })));

        let messages = Arc::new(StdMutex::new(Vec::new()));
        let message_sink = messages.clone();
        controller.set_notifier(Some(Arc::new(move |message: &str| {
            message_sink.lock().unwrap().push(message.to_string());
        })));

        Harness {
            controller,
            doc,
            routes,
            messages,
        }
    }

    fn harness() -> Harness {
        harness_with(builtin::catalog(), Arc::new(MemoryStore::new()))
    }

    async fn wait() {
        time::sleep(Duration::from_millis(500)).await;
    }

    #[tokio::test(start_paused = true)]
    async fn welcome_tour_walkthrough_completes() {
        let h = harness();
        h.controller.set_user_role(Role::Admin).await;

        let snapshot = h.controller.start_tour("welcome-tour").await.unwrap();
        assert_eq!(snapshot.state.current_step_index, 0);
        assert_eq!(snapshot.total_steps, 7);
        assert_eq!(snapshot.status, TourStatus::Active);

        for _ in 0..6 {
            h.controller.next_step().await;
        }
        assert_eq!(h.controller.state().await.current_step_index, 6);

        let done = h.controller.next_step().await;
        assert_eq!(done.status, TourStatus::Idle);
        assert!(done.state.active_tour_id.is_none());
        assert!(done.state.completed_tours.contains("welcome-tour"));

        let analytics = h.controller.analytics().await;
        let record = analytics.last().unwrap();
        assert!(record.completed);
        assert!(record.completed_at.is_some());
        assert_eq!(record.steps_visited.len(), 7);
        assert_eq!(h.messages.lock().unwrap().len(), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn ineligible_role_is_rejected_without_state_change() {
        let h = harness();
        h.controller.set_user_role(Role::Viewer).await;
        let before = h.controller.state().await;

        let err = h.controller.start_tour("branding-tour").await.unwrap_err();
        assert!(matches!(err, TourError::NotEligible { role: Some(Role::Viewer), .. }));
        assert_eq!(h.controller.state().await, before);
        assert!(h.controller.analytics().await.is_empty());
        assert_eq!(h.messages.lock().unwrap().len(), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn start_without_role_or_unknown_tour_fails() {
        let h = harness();
        let err = h.controller.start_tour("welcome-tour").await.unwrap_err();
        assert!(matches!(err, TourError::NotEligible { role: None, .. }));

        h.controller.set_user_role(Role::Admin).await;
        let err = h.controller.start_tour("nope").await.unwrap_err();
        assert_eq!(err, TourError::UnknownTour("nope".into()));
    }

    #[tokio::test(start_paused = true)]
    async fn no_steps_for_layout_is_rejected() {
        let h = harness();
        h.controller.set_user_role(Role::Admin).await;
        h.controller.set_layout(Layout::Mobile).await;

        let err = h.controller.start_tour("branding-tour").await.unwrap_err();
        assert!(matches!(err, TourError::NoStepsForLayout { layout: Layout::Mobile, .. }));
        assert!(!h.controller.state().await.is_active());
    }

    #[tokio::test(start_paused = true)]
    async fn retreat_at_first_step_changes_nothing() {
        let h = harness();
        h.controller.set_user_role(Role::Admin).await;
        h.controller.start_tour("welcome-tour").await.unwrap();
        let before = h.controller.state().await;

        h.controller.prev_step().await;
        assert_eq!(h.controller.state().await, before);

        h.controller.next_step().await;
        h.controller.prev_step().await;
        assert_eq!(h.controller.state().await.current_step_index, 0);
    }

    #[tokio::test(start_paused = true)]
    async fn skip_records_index_then_advances() {
        let h = harness();
        h.controller.set_user_role(Role::Admin).await;
        h.controller.start_tour("welcome-tour").await.unwrap();
        h.controller.next_step().await;

        let snapshot = h.controller.skip_step().await;
        assert_eq!(snapshot.state.current_step_index, 2);

        let record = h.controller.analytics().await.pop().unwrap();
        assert_eq!(record.skipped_steps, vec![1]);
        assert_eq!(record.steps_visited, vec![0, 1, 2]);
    }

    #[tokio::test(start_paused = true)]
    async fn skipping_last_step_completes() {
        let h = harness();
        h.controller.set_user_role(Role::Admin).await;
        h.controller.start_tour("branding-tour").await.unwrap();
        h.controller.next_step().await;

        let snapshot = h.controller.skip_step().await;
        assert_eq!(snapshot.status, TourStatus::Idle);
        assert!(snapshot.state.completed_tours.contains("branding-tour"));
        assert_eq!(h.controller.analytics().await[0].skipped_steps, vec![1]);
    }

    #[tokio::test(start_paused = true)]
    async fn role_change_ends_tour_uncompleted() {
        let h = harness();
        h.controller.set_user_role(Role::Admin).await;
        h.controller.start_tour("welcome-tour").await.unwrap();
        h.controller.next_step().await;
        h.controller.next_step().await;

        let snapshot = h.controller.set_user_role(Role::Editor).await;
        assert_eq!(snapshot.status, TourStatus::Idle);
        assert!(snapshot.state.completed_tours.is_empty());
        assert!(!h.controller.analytics().await[0].completed);

        // Re-sending the same role is not a change.
        h.controller.start_tour("welcome-tour").await.unwrap();
        let snapshot = h.controller.set_user_role(Role::Editor).await;
        assert_eq!(snapshot.status, TourStatus::Active);
    }

    #[tokio::test(start_paused = true)]
    async fn navigation_follows_steps_and_resume() {
        let h = harness();
        h.controller.set_user_role(Role::Editor).await;
        let snapshot = h.controller.start_tour("form-builder-tour").await.unwrap();
        assert_eq!(snapshot.total_steps, 5);

        for _ in 0..3 {
            h.controller.next_step().await;
        }
        wait().await;
        // Rapid transitions collapse into one navigation for the final step.
        assert_eq!(*h.routes.lock().unwrap(), vec!["builder".to_string()]);

        let paused = h.controller.pause_tour().await;
        assert_eq!(paused.status, TourStatus::Paused);
        wait().await;
        assert_eq!(h.routes.lock().unwrap().len(), 1);

        let resumed = h.controller.resume_tour().await;
        assert_eq!(resumed.state.current_step_index, 3);
        assert!(!resumed.state.is_paused);
        wait().await;
        assert_eq!(h.routes.lock().unwrap().len(), 2);
    }

    #[tokio::test(start_paused = true)]
    async fn pause_cancels_pending_navigation() {
        let h = harness();
        h.controller.set_user_role(Role::Admin).await;
        h.controller.start_tour("welcome-tour").await.unwrap();
        h.controller.pause_tour().await;
        wait().await;
        assert!(h.routes.lock().unwrap().is_empty());
    }

    #[tokio::test(start_paused = true)]
    async fn missing_target_centers_overlay() {
        let catalog = TourCatalog::new(vec![Tour {
            id: "lost-tour".into(),
            name: "Lost".into(),
            description: String::new(),
            roles: vec![Role::Admin],
            category: TourCategory::GettingStarted,
            steps: vec![Step {
                id: "ghost".into(),
                target: "#missing".into(),
                title: "Ghost".into(),
                content: String::new(),
                route: None,
                placement: Placement::Right,
                roles: vec![Role::Admin],
                layout: LayoutApplicability::Both,
                order: 0,
            }],
        }])
        .unwrap();
        let h = harness_with(catalog, Arc::new(MemoryStore::new()));
        h.controller.set_user_role(Role::Admin).await;
        h.controller.start_tour("lost-tour").await.unwrap();
        wait().await;

        let overlay = h.controller.overlay().await.unwrap();
        assert_eq!(overlay.spotlight.status, SpotlightStatus::TargetNotFound);
        assert_eq!(overlay.spotlight.highlight, None);
        assert_eq!(overlay.position.top, Some(Offset::Percent(50.0)));
        assert_eq!(overlay.position.left, Some(Offset::Percent(50.0)));
        assert!(overlay.position.center_x && overlay.position.center_y);

        // The tour still advances normally.
        let done = h.controller.next_step().await;
        assert!(done.state.completed_tours.contains("lost-tour"));
    }

    #[tokio::test(start_paused = true)]
    async fn located_target_anchors_overlay() {
        let h = harness();
        h.controller.set_user_role(Role::Admin).await;
        h.controller.start_tour("welcome-tour").await.unwrap();
        h.controller.next_step().await;
        wait().await;

        let overlay = h.controller.overlay().await.unwrap();
        assert_eq!(overlay.step.id, "sidebar");
        assert_eq!(overlay.spotlight.status, SpotlightStatus::Located);
        assert!(matches!(overlay.position.left, Some(Offset::Px(_))));
        assert!(overlay.position.center_y);
    }

    #[tokio::test(start_paused = true)]
    async fn ending_tears_down_observers_synchronously() {
        let h = harness();
        h.controller.set_user_role(Role::Admin).await;
        h.controller.start_tour("welcome-tour").await.unwrap();
        wait().await;
        assert_eq!(h.doc.live_watchers(), 3);

        h.controller.end_tour(false).await;
        assert_eq!(h.doc.live_watchers(), 0);
        assert_eq!(h.controller.spotlight().state().status, SpotlightStatus::Idle);
        assert!(h.controller.overlay().await.is_none());
    }

    #[tokio::test(start_paused = true)]
    async fn end_with_completion_marks_tour_done() {
        let h = harness();
        h.controller.set_user_role(Role::Admin).await;
        h.controller.start_tour("welcome-tour").await.unwrap();
        h.controller.next_step().await;

        let snapshot = h.controller.end_tour(true).await;
        assert!(snapshot.state.completed_tours.contains("welcome-tour"));
        assert!(h.controller.analytics().await[0].completed);

        let progress = h.controller.get_tour_progress("welcome-tour").await.unwrap();
        assert_eq!(
            progress,
            TourProgress {
                completed: true,
                steps_completed: 7,
                total_steps: 7
            }
        );
    }

    #[tokio::test(start_paused = true)]
    async fn restart_clears_completion() {
        let h = harness();
        h.controller.set_user_role(Role::Admin).await;
        h.controller.start_tour("welcome-tour").await.unwrap();
        h.controller.end_tour(true).await;

        let snapshot = h.controller.restart_tour("welcome-tour").await.unwrap();
        assert_eq!(snapshot.status, TourStatus::Active);
        assert!(!snapshot.state.completed_tours.contains("welcome-tour"));
        assert_eq!(h.controller.analytics().await.len(), 2);
    }

    #[tokio::test(start_paused = true)]
    async fn layout_shrink_clamps_index() {
        let h = harness();
        h.controller.set_user_role(Role::Admin).await;
        h.controller.start_tour("welcome-tour").await.unwrap();
        for _ in 0..6 {
            h.controller.next_step().await;
        }

        let snapshot = h.controller.set_layout(Layout::Mobile).await;
        assert_eq!(snapshot.total_steps, 4);
        assert_eq!(snapshot.state.current_step_index, 3);
        assert_eq!(snapshot.step.unwrap().id, "help");
    }

    #[tokio::test(start_paused = true)]
    async fn layout_without_steps_ends_tour() {
        let h = harness();
        h.controller.set_user_role(Role::Admin).await;
        h.controller.start_tour("branding-tour").await.unwrap();

        let snapshot = h.controller.set_viewport_width(375.0).await;
        assert_eq!(snapshot.layout, Layout::Mobile);
        assert_eq!(snapshot.status, TourStatus::Idle);
        assert!(snapshot.state.completed_tours.is_empty());
        assert_eq!(h.messages.lock().unwrap().len(), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn state_is_rehydrated_from_store() {
        let store = Arc::new(MemoryStore::new());
        {
            let h = harness_with(builtin::catalog(), store.clone());
            h.controller.set_user_role(Role::Admin).await;
            h.controller.start_tour("welcome-tour").await.unwrap();
            h.controller.next_step().await;
            h.controller.next_step().await;
        }

        let h = harness_with(builtin::catalog(), store.clone());
        let restored = h.controller.state().await;
        assert_eq!(restored.active_tour_id.as_deref(), Some("welcome-tour"));
        assert_eq!(restored.current_step_index, 2);
        assert_eq!(h.controller.analytics().await.len(), 1);

        let snapshot = h.controller.set_user_role(Role::Admin).await;
        assert_eq!(snapshot.status, TourStatus::Active);
        assert_eq!(snapshot.step.unwrap().id, "stats");
    }

    #[tokio::test(start_paused = true)]
    async fn corrupt_store_yields_idle_defaults() {
        let store = Arc::new(MemoryStore::new());
        store.set(TOUR_STATE_KEY, "][").unwrap();
        store.set(ANALYTICS_KEY, "{\"version\":1,\"data\":7}").unwrap();

        let h = harness_with(builtin::catalog(), store);
        assert_eq!(h.controller.state().await, TourState::new());
        assert!(h.controller.analytics().await.is_empty());
    }

    #[tokio::test(start_paused = true)]
    async fn queries_follow_role() {
        let h = harness();
        assert!(h.controller.get_available_tours().await.is_empty());
        assert!(!h.controller.can_access_tour("welcome-tour").await);

        h.controller.set_user_role(Role::Viewer).await;
        let ids: Vec<String> = h
            .controller
            .get_available_tours()
            .await
            .into_iter()
            .map(|tour| tour.id)
            .collect();
        assert_eq!(ids, ["welcome-tour", "reports-tour"]);
        assert!(!h.controller.can_access_tour("branding-tour").await);
        assert!(h.controller.get_tour_progress("nope").await.is_none());

        h.controller.start_tour("welcome-tour").await.unwrap();
        h.controller.next_step().await;
        let progress = h.controller.get_tour_progress("welcome-tour").await.unwrap();
        assert_eq!(progress.steps_completed, 1);
        assert!(!progress.completed);
        assert_eq!(h.controller.total_steps().await, progress.total_steps);
        assert_eq!(h.controller.current_tour().await.unwrap().id, "welcome-tour");
        assert_eq!(h.controller.current_step().await.unwrap().id, "sidebar");
    }

    #[tokio::test(start_paused = true)]
    async fn feedback_is_recorded_and_persisted() {
        let store = Arc::new(MemoryStore::new());
        let h = harness_with(builtin::catalog(), store.clone());
        assert!(!h.controller.submit_feedback("welcome-tour", Feedback::Positive).await);

        h.controller.set_user_role(Role::Admin).await;
        h.controller.start_tour("welcome-tour").await.unwrap();
        h.controller.end_tour(true).await;
        assert!(h.controller.submit_feedback("welcome-tour", Feedback::Positive).await);

        let persisted: AnalyticsRecorder = storage::load_or_default(store.as_ref(), ANALYTICS_KEY);
        assert_eq!(persisted.records()[0].feedback, Some(Feedback::Positive));
        assert_eq!(h.controller.analytics_summary().await[0].positive_feedback, 1);
    }

    #[tokio::test(start_paused = true)]
    async fn subscribers_observe_transitions() {
        let h = harness();
        let mut rx = h.controller.subscribe();
        h.controller.set_user_role(Role::Admin).await;
        h.controller.start_tour("welcome-tour").await.unwrap();
        h.controller.next_step().await;

        assert!(rx.has_changed().unwrap());
        let seen = rx.borrow_and_update().clone();
        assert_eq!(seen.state.current_step_index, 1);
        assert_eq!(seen.step.unwrap().id, "sidebar");
    }

    #[tokio::test(start_paused = true)]
    async fn idle_step_commands_are_noops() {
        let h = harness();
        h.controller.set_user_role(Role::Admin).await;
        let before = h.controller.state().await;
        h.controller.next_step().await;
        h.controller.skip_step().await;
        h.controller.prev_step().await;
        h.controller.pause_tour().await;
        h.controller.end_tour(true).await;
        assert_eq!(h.controller.state().await, before);
        assert!(h.controller.analytics().await.is_empty());
    }

    #[tokio::test(start_paused = true)]
    async fn rehydrated_tour_without_steps_on_phone_ends() {
        let store = Arc::new(MemoryStore::new());
        {
            let h = harness_with(builtin::catalog(), store.clone());
            h.controller.set_user_role(Role::Admin).await;
            h.controller.start_tour("branding-tour").await.unwrap();
        }

        let h = harness_on(builtin::catalog(), store.clone(), Viewport::new(375.0, 812.0));
        assert_eq!(h.controller.snapshot().await.layout, Layout::Mobile);

        // Without a role there is nothing to resolve yet.
        let waiting = h.controller.next_step().await;
        assert_eq!(waiting.state.active_tour_id.as_deref(), Some("branding-tour"));

        let snapshot = h.controller.set_user_role(Role::Admin).await;
        assert_eq!(snapshot.status, TourStatus::Idle);
        assert!(snapshot.state.completed_tours.is_empty());
        assert_eq!(
            *h.messages.lock().unwrap(),
            vec!["No tour steps are available for this screen size.".to_string()]
        );

        let persisted: TourState = storage::load_or_default(store.as_ref(), TOUR_STATE_KEY);
        assert!(!persisted.is_active());
        assert_eq!(h.doc.live_watchers(), 0);
    }

    #[tokio::test(start_paused = true)]
    async fn phone_overlay_stays_on_screen() {
        let h = harness_on(
            builtin::catalog(),
            Arc::new(MemoryStore::new()),
            Viewport::new(375.0, 812.0),
        );
        h.controller.set_user_role(Role::Editor).await;
        let snapshot = h.controller.start_tour("form-builder-tour").await.unwrap();
        assert_eq!(snapshot.step.unwrap().id, "add-field");
        wait().await;

        let overlay = h.controller.overlay().await.unwrap();
        let viewport = h.doc.viewport();
        let card = overlay
            .position
            .resolve(&viewport, CardSize { width: 360.0, height: 220.0 });
        assert!(card.left >= 16.0, "{card:?}");
        assert!(card.right() <= 375.0 - 16.0, "{card:?}");
        assert!(card.top >= 16.0 && card.bottom() <= 812.0 - 16.0, "{card:?}");
    }

    #[tokio::test(start_paused = true)]
    async fn paused_tour_ignores_steps_and_survives_layout_change() {
        let h = harness();
        h.controller.set_user_role(Role::Admin).await;
        h.controller.start_tour("welcome-tour").await.unwrap();
        h.controller.next_step().await;
        h.controller.next_step().await;
        h.controller.pause_tour().await;
        wait().await;
        let routes_before = h.routes.lock().unwrap().len();

        for snapshot in [
            h.controller.next_step().await,
            h.controller.skip_step().await,
            h.controller.prev_step().await,
        ] {
            assert_eq!(snapshot.status, TourStatus::Paused);
            assert_eq!(snapshot.state.current_step_index, 2);
        }
        let record = h.controller.analytics().await.pop().unwrap();
        assert!(record.skipped_steps.is_empty());
        assert_eq!(record.steps_visited, vec![0, 1, 2]);

        let snapshot = h.controller.set_layout(Layout::Mobile).await;
        assert_eq!(snapshot.status, TourStatus::Paused);
        assert_eq!(snapshot.state.current_step_index, 2);
        wait().await;
        assert_eq!(h.routes.lock().unwrap().len(), routes_before);
        assert_eq!(h.doc.live_watchers(), 0);

        let resumed = h.controller.resume_tour().await;
        assert_eq!(resumed.step.unwrap().id, "new-form");
        wait().await;
        assert_eq!(h.routes.lock().unwrap().len(), routes_before + 1);
    }

    #[tokio::test(start_paused = true)]
    async fn overlay_ignores_geometry_from_another_step() {
        let h = harness();
        h.controller.set_user_role(Role::Admin).await;
        h.controller.start_tour("welcome-tour").await.unwrap();
        h.controller.next_step().await;
        wait().await;
        assert_eq!(
            h.controller.overlay().await.unwrap().spotlight.status,
            SpotlightStatus::Located
        );

        h.controller.spotlight().track("elsewhere", "#dashboard-stats");
        wait().await;
        assert_eq!(h.controller.spotlight().state().status, SpotlightStatus::Located);

        let overlay = h.controller.overlay().await.unwrap();
        assert_eq!(overlay.step.id, "sidebar");
        assert_eq!(overlay.spotlight.status, SpotlightStatus::Settling);
        assert_eq!(overlay.spotlight.highlight, None);
        assert_eq!(overlay.position.left, Some(Offset::Percent(50.0)));
    }
}
