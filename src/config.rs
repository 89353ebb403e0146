use log::warn;
use std::{env, path::PathBuf, str::FromStr, time::Duration};

/// Tunable timings and geometry for the tour engine.
#[derive(Debug, Clone, PartialEq)]
pub struct TourConfig {
    /// Delay between a step change and the host navigation callback, so the
    /// current view can unmount first.
    pub navigation_delay: Duration,

    /// Delay before the first target lookup after a step change.
    pub settle_delay: Duration,

    /// Poll interval when the host cannot observe element resizes.
    pub poll_interval: Duration,

    /// Space added around the target on every side.
    pub spotlight_padding: f64,

    /// Gap between the highlight and the instruction card.
    pub overlay_margin: f64,

    /// Minimum distance between the card and any viewport edge.
    pub edge_margin: f64,

    pub card_width: f64,
    pub card_height: f64,

    /// Viewport widths below this are mobile.
    pub mobile_breakpoint: f64,
}

impl Default for TourConfig {
    fn default() -> Self {
        Self {
            navigation_delay: Duration::from_millis(100),
            settle_delay: Duration::from_millis(300),
            poll_interval: Duration::from_millis(250),
            spotlight_padding: 8.0,
            overlay_margin: 16.0,
            edge_margin: 16.0,
            card_width: 360.0,
            card_height: 220.0,
            mobile_breakpoint: 768.0,
        }
    }
}

impl TourConfig {
    /// Defaults overridden by any well-formed `TOURGUIDE_*` variables.
    pub fn from_env() -> Self {
        let mut config = Self::default();

        if let Some(ms) = env_value::<u64>("TOURGUIDE_NAVIGATION_DELAY_MS") {
            config.navigation_delay = Duration::from_millis(ms);
        }
        if let Some(ms) = env_value::<u64>("TOURGUIDE_SETTLE_DELAY_MS") {
            config.settle_delay = Duration::from_millis(ms);
        }
        if let Some(ms) = env_value::<u64>("TOURGUIDE_POLL_INTERVAL_MS") {
            config.poll_interval = Duration::from_millis(ms.max(1));
        }
        if let Some(px) = env_value("TOURGUIDE_SPOTLIGHT_PADDING") {
            config.spotlight_padding = px;
        }
        if let Some(px) = env_value("TOURGUIDE_OVERLAY_MARGIN") {
            config.overlay_margin = px;
        }
        if let Some(px) = env_value("TOURGUIDE_EDGE_MARGIN") {
            config.edge_margin = px;
        }
        if let Some(px) = env_value("TOURGUIDE_CARD_WIDTH") {
            config.card_width = px;
        }
        if let Some(px) = env_value("TOURGUIDE_CARD_HEIGHT") {
            config.card_height = px;
        }
        if let Some(px) = env_value("TOURGUIDE_MOBILE_BREAKPOINT") {
            config.mobile_breakpoint = px;
        }

        config
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StoreKind {
    Json,
    Sqlite,
    Memory,
}

impl FromStr for StoreKind {
    type Err = anyhow::Error;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value.to_ascii_lowercase().as_str() {
            "json" => Ok(StoreKind::Json),
            "sqlite" => Ok(StoreKind::Sqlite),
            "memory" => Ok(StoreKind::Memory),
            other => Err(anyhow::anyhow!("unknown store kind '{other}'")),
        }
    }
}

/// Where the host keeps its data and which catalog it loads.
#[derive(Debug, Clone)]
pub struct HostConfig {
    pub data_dir: PathBuf,
    pub store: StoreKind,
    pub catalog_path: Option<PathBuf>,
}

impl HostConfig {
    pub fn from_env() -> Self {
        Self {
            data_dir: env::var_os("TOURGUIDE_DATA_DIR")
                .map(PathBuf::from)
                .unwrap_or_else(|| PathBuf::from(".tourguide")),
            store: env_value("TOURGUIDE_STORE").unwrap_or(StoreKind::Sqlite),
            catalog_path: env::var_os("TOURGUIDE_CATALOG").map(PathBuf::from),
        }
    }
}

fn env_value<T: FromStr>(name: &str) -> Option<T> {
    let raw = env::var(name).ok()?;
    match raw.trim().parse() {
        Ok(value) => Some(value),
        Err(_) => {
            warn!("Ignoring malformed {name}={raw}");
            None
        }
    }
}
