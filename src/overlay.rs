//! Placement of the instruction card next to the highlight.

use serde::Serialize;

use crate::{
    catalog::Placement,
    config::TourConfig,
    geometry::{HighlightRect, Rect, Viewport},
};

/// A CSS-style offset for one edge of the card.
#[derive(Debug, Clone, Copy, Serialize, PartialEq)]
#[serde(rename_all = "camelCase", tag = "unit", content = "value")]
pub enum Offset {
    Px(f64),
    Percent(f64),
}

impl Offset {
    fn resolve(&self, extent: f64) -> f64 {
        match self {
            Offset::Px(px) => *px,
            Offset::Percent(pct) => extent * pct / 100.0,
        }
    }
}

/// Fixed-position box for the card. At most one of `top`/`bottom` and one of
/// `left`/`right` is set; a centering flag shifts the card back by half its
/// size on that axis. `max_width`/`max_height` shrink the card on viewports
/// too small to hold it between the edge margins.
#[derive(Debug, Clone, Copy, Default, Serialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct OverlayPosition {
    pub top: Option<Offset>,
    pub bottom: Option<Offset>,
    pub left: Option<Offset>,
    pub right: Option<Offset>,
    pub center_x: bool,
    pub center_y: bool,
    pub max_width: Option<f64>,
    pub max_height: Option<f64>,
}

impl OverlayPosition {
    pub fn centered() -> Self {
        Self {
            top: Some(Offset::Percent(50.0)),
            left: Some(Offset::Percent(50.0)),
            center_x: true,
            center_y: true,
            ..Self::default()
        }
    }

    /// The card's box in viewport coordinates.
    pub fn resolve(&self, viewport: &Viewport, card: CardSize) -> Rect {
        let width = self.max_width.map_or(card.width, |max| card.width.min(max));
        let height = self
            .max_height
            .map_or(card.height, |max| card.height.min(max));
        let left = resolve_axis(
            self.left,
            self.right,
            self.center_x,
            viewport.width,
            width,
        );
        let top = resolve_axis(
            self.top,
            self.bottom,
            self.center_y,
            viewport.height,
            height,
        );
        Rect::new(top, left, width, height)
    }
}

fn resolve_axis(
    near: Option<Offset>,
    far: Option<Offset>,
    centered: bool,
    extent: f64,
    size: f64,
) -> f64 {
    let start = match (near, far) {
        (Some(near), _) => near.resolve(extent),
        (None, Some(far)) => extent - far.resolve(extent) - size,
        (None, None) => 0.0,
    };
    if centered {
        start - size / 2.0
    } else {
        start
    }
}

#[derive(Debug, Clone, Copy, Serialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct CardSize {
    pub width: f64,
    pub height: f64,
}

#[derive(Debug, Clone, Copy)]
pub struct OverlayLayout {
    pub card: CardSize,
    pub anchor_margin: f64,
    pub edge_margin: f64,
}

impl From<&TourConfig> for OverlayLayout {
    fn from(config: &TourConfig) -> Self {
        Self {
            card: CardSize {
                width: config.card_width,
                height: config.card_height,
            },
            anchor_margin: config.overlay_margin,
            edge_margin: config.edge_margin,
        }
    }
}

impl OverlayLayout {
    /// Positions the card on `placement`'s side of `highlight`, then keeps it
    /// on screen. With no highlight the card is centered in the viewport.
    pub fn position(
        &self,
        highlight: Option<&HighlightRect>,
        placement: Placement,
        viewport: &Viewport,
    ) -> OverlayPosition {
        let mut position = match highlight {
            Some(highlight) => self.anchor(highlight, placement, viewport),
            None => OverlayPosition::centered(),
        };
        self.clamp(&mut position, viewport);
        position
    }

    fn anchor(
        &self,
        highlight: &HighlightRect,
        placement: Placement,
        viewport: &Viewport,
    ) -> OverlayPosition {
        let rect = viewport.to_viewport(highlight);
        let margin = self.anchor_margin;
        let (vw, vh) = (viewport.width, viewport.height);

        match placement {
            Placement::Center => OverlayPosition::centered(),
            Placement::Top => OverlayPosition {
                bottom: Some(Offset::Px(vh - rect.top + margin)),
                left: Some(Offset::Px(rect.center_x())),
                center_x: true,
                ..OverlayPosition::default()
            },
            Placement::Bottom => OverlayPosition {
                top: Some(Offset::Px(rect.bottom() + margin)),
                left: Some(Offset::Px(rect.center_x())),
                center_x: true,
                ..OverlayPosition::default()
            },
            Placement::Left => OverlayPosition {
                right: Some(Offset::Px(vw - rect.left + margin)),
                top: Some(Offset::Px(rect.center_y())),
                center_y: true,
                ..OverlayPosition::default()
            },
            Placement::Right => OverlayPosition {
                left: Some(Offset::Px(rect.right() + margin)),
                top: Some(Offset::Px(rect.center_y())),
                center_y: true,
                ..OverlayPosition::default()
            },
        }
    }

    /// Each axis is checked on its own: a card crossing the edge margin is
    /// pinned to the margin of the nearest edge and loses its centering. An
    /// axis too short for the card pins it to the near margin and caps its size.
    fn clamp(&self, position: &mut OverlayPosition, viewport: &Viewport) {
        let card = position.resolve(viewport, self.card);
        let edge = self.edge_margin;

        if self.card.width + 2.0 * edge > viewport.width {
            position.left = Some(Offset::Px(edge));
            position.right = None;
            position.center_x = false;
            position.max_width = Some((viewport.width - 2.0 * edge).max(0.0));
        } else if card.left < edge {
            position.left = Some(Offset::Px(edge));
            position.right = None;
            position.center_x = false;
        } else if card.right() > viewport.width - edge {
            position.right = Some(Offset::Px(edge));
            position.left = None;
            position.center_x = false;
        }

        if self.card.height + 2.0 * edge > viewport.height {
            position.top = Some(Offset::Px(edge));
            position.bottom = None;
            position.center_y = false;
            position.max_height = Some((viewport.height - 2.0 * edge).max(0.0));
        } else if card.top < edge {
            position.top = Some(Offset::Px(edge));
            position.bottom = None;
            position.center_y = false;
        } else if card.bottom() > viewport.height - edge {
            position.bottom = Some(Offset::Px(edge));
            position.top = None;
            position.center_y = false;
        }
    }
}
