use serde::{Deserialize, Serialize};

/// Axis-aligned box in CSS pixels.
#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct Rect {
    pub top: f64,
    pub left: f64,
    pub width: f64,
    pub height: f64,
}

impl Rect {
    pub fn new(top: f64, left: f64, width: f64, height: f64) -> Self {
        Self {
            top,
            left,
            width,
            height,
        }
    }

    pub fn right(&self) -> f64 {
        self.left + self.width
    }

    pub fn bottom(&self) -> f64 {
        self.top + self.height
    }

    pub fn center_x(&self) -> f64 {
        self.left + self.width / 2.0
    }

    pub fn center_y(&self) -> f64 {
        self.top + self.height / 2.0
    }

    pub fn inflate(&self, amount: f64) -> Self {
        Self {
            top: self.top - amount,
            left: self.left - amount,
            width: self.width + amount * 2.0,
            height: self.height + amount * 2.0,
        }
    }

    pub fn translate(&self, dx: f64, dy: f64) -> Self {
        Self {
            top: self.top + dy,
            left: self.left + dx,
            ..*self
        }
    }
}

/// Highlight around a step target, in document coordinates, padding included.
pub type HighlightRect = Rect;

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct Viewport {
    pub width: f64,
    pub height: f64,
    pub scroll_x: f64,
    pub scroll_y: f64,
}

impl Viewport {
    pub fn new(width: f64, height: f64) -> Self {
        Self {
            width,
            height,
            scroll_x: 0.0,
            scroll_y: 0.0,
        }
    }

    /// Converts a document-space rect into viewport space.
    pub fn to_viewport(&self, rect: &Rect) -> Rect {
        rect.translate(-self.scroll_x, -self.scroll_y)
    }

    /// Converts a viewport-space rect into document space.
    pub fn to_document(&self, rect: &Rect) -> Rect {
        rect.translate(self.scroll_x, self.scroll_y)
    }
}

impl Default for Viewport {
    fn default() -> Self {
        Self::new(1280.0, 800.0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn inflate_grows_every_side() {
        let rect = Rect::new(100.0, 50.0, 20.0, 10.0).inflate(8.0);
        assert_eq!(rect, Rect::new(92.0, 42.0, 36.0, 26.0));
        assert_eq!(rect.center_x(), 60.0);
        assert_eq!(rect.center_y(), 105.0);
    }

    #[test]
    fn viewport_space_conversion_is_symmetric() {
        let viewport = Viewport {
            scroll_x: 10.0,
            scroll_y: 300.0,
            ..Viewport::default()
        };
        let doc = Rect::new(400.0, 40.0, 10.0, 10.0);
        let view = viewport.to_viewport(&doc);
        assert_eq!(view.top, 100.0);
        assert_eq!(view.left, 30.0);
        assert_eq!(viewport.to_document(&view), doc);
    }
}
