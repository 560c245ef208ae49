//! Pan/zoom view transform between map space and screen space.
//!
//! `screen = logical * zoom + offset`. Zoom is clamped to
//! `[ZOOM_MIN, ZOOM_MAX]` so it is never zero; offset is unconstrained.

use super::config::{ZOOM_IN_FACTOR, ZOOM_MAX, ZOOM_MIN, ZOOM_OUT_FACTOR};
use super::geometry::Point;

/// Current zoom and pan of the editor viewport.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ViewTransform {
    zoom: f64,
    pub offset_x: f64,
    pub offset_y: f64,
}

impl Default for ViewTransform {
    fn default() -> Self {
        Self {
            zoom: 1.0,
            offset_x: 0.0,
            offset_y: 0.0,
        }
    }
}

impl ViewTransform {
    /// Build a transform, clamping `zoom` into range. Non-finite zoom falls
    /// back to 1.0.
    pub fn new(zoom: f64, offset_x: f64, offset_y: f64) -> Self {
        Self {
            zoom: clamp_zoom(zoom),
            offset_x,
            offset_y,
        }
    }

    pub fn zoom(&self) -> f64 {
        self.zoom
    }

    /// Screen coordinates to map space.
    pub fn to_logical(&self, screen: Point) -> Point {
        Point::new(
            (screen.x - self.offset_x) / self.zoom,
            (screen.y - self.offset_y) / self.zoom,
        )
    }

    /// Map space to screen coordinates.
    pub fn to_screen(&self, logical: Point) -> Point {
        Point::new(
            logical.x * self.zoom + self.offset_x,
            logical.y * self.zoom + self.offset_y,
        )
    }

    /// Multiply zoom by `factor`, clamped. Returns the new zoom.
    pub fn zoom_by(&mut self, factor: f64) -> f64 {
        self.zoom = clamp_zoom(self.zoom * factor);
        self.zoom
    }

    pub fn zoom_in(&mut self) -> f64 {
        self.zoom_by(ZOOM_IN_FACTOR)
    }

    pub fn zoom_out(&mut self) -> f64 {
        self.zoom_by(ZOOM_OUT_FACTOR)
    }

    /// Zoom keeping the map point under `anchor` (screen space) fixed.
    pub fn zoom_at(&mut self, anchor: Point, factor: f64) -> f64 {
        let before = self.to_logical(anchor);
        let old_zoom = self.zoom;
        let new_zoom = self.zoom_by(factor);
        if new_zoom != old_zoom {
            self.offset_x = anchor.x - before.x * new_zoom;
            self.offset_y = anchor.y - before.y * new_zoom;
        }
        new_zoom
    }

    /// Shift the offset by a screen-space drag delta. The delta is not
    /// divided by zoom: pan speed is constant in screen pixels.
    pub fn pan(&mut self, dx: f64, dy: f64) {
        self.offset_x += dx;
        self.offset_y += dy;
    }
}

fn clamp_zoom(zoom: f64) -> f64 {
    if zoom.is_finite() {
        zoom.clamp(ZOOM_MIN, ZOOM_MAX)
    } else {
        1.0
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn approx_eq(a: Point, b: Point) -> bool {
        let close = |u: f64, v: f64| (u - v).abs() <= 1e-9 * v.abs().max(1.0);
        close(a.x, b.x) && close(a.y, b.y)
    }

    #[test]
    fn test_to_logical() {
        let t = ViewTransform::new(2.0, 10.0, 20.0);
        assert_eq!(t.to_logical(Point::new(30.0, 40.0)), Point::new(10.0, 10.0));
        assert_eq!(t.to_screen(Point::new(10.0, 10.0)), Point::new(30.0, 40.0));
    }

    #[test]
    fn test_round_trip() {
        let transforms = [
            ViewTransform::default(),
            ViewTransform::new(0.1, -500.0, 250.0),
            ViewTransform::new(5.0, 13.7, -0.25),
            ViewTransform::new(1.337, 1e4, -1e4),
        ];
        let points = [
            Point::new(0.0, 0.0),
            Point::new(123.456, -78.9),
            Point::new(-1e5, 1e5),
        ];
        for t in &transforms {
            for p in &points {
                let back = t.to_logical(t.to_screen(*p));
                assert!(approx_eq(back, *p), "{p:?} -> {back:?} under {t:?}");
            }
        }
    }

    #[test]
    fn test_zoom_clamp_in() {
        let mut t = ViewTransform::default();
        for _ in 0..100 {
            let z = t.zoom_in();
            assert!(z <= ZOOM_MAX);
        }
        assert_eq!(t.zoom(), ZOOM_MAX);
    }

    #[test]
    fn test_zoom_clamp_out() {
        let mut t = ViewTransform::default();
        for _ in 0..100 {
            let z = t.zoom_out();
            assert!(z >= ZOOM_MIN);
        }
        assert_eq!(t.zoom(), ZOOM_MIN);
    }

    #[test]
    fn test_new_clamps() {
        assert_eq!(ViewTransform::new(0.0, 0.0, 0.0).zoom(), ZOOM_MIN);
        assert_eq!(ViewTransform::new(100.0, 0.0, 0.0).zoom(), ZOOM_MAX);
        assert_eq!(ViewTransform::new(f64::NAN, 0.0, 0.0).zoom(), 1.0);
    }

    #[test]
    fn test_pan_not_scaled_by_zoom() {
        let mut t = ViewTransform::new(4.0, 0.0, 0.0);
        t.pan(10.0, -5.0);
        assert_eq!(t.offset_x, 10.0);
        assert_eq!(t.offset_y, -5.0);
    }

    #[test]
    fn test_zoom_at_keeps_anchor() {
        let mut t = ViewTransform::new(1.0, 40.0, -20.0);
        let anchor = Point::new(200.0, 150.0);
        let before = t.to_logical(anchor);
        t.zoom_at(anchor, 2.0);
        assert_eq!(t.zoom(), 2.0);
        assert!(approx_eq(t.to_logical(anchor), before));
    }

    #[test]
    fn test_zoom_at_clamped_leaves_offset() {
        let mut t = ViewTransform::new(ZOOM_MAX, 7.0, 9.0);
        t.zoom_at(Point::new(100.0, 100.0), 2.0);
        assert_eq!(t.offset_x, 7.0);
        assert_eq!(t.offset_y, 9.0);
    }
}
