//! The in-progress polygon being drawn, before it becomes a territory.

use thiserror::Error;

use super::config::{CLOSE_THRESHOLD, MIN_POLYGON_POINTS};
use super::geometry::Point;
use super::territory::{Color, Territory};

/// Recoverable rejections when building a territory.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ValidationError {
    #[error("a territory needs at least {required} points, got {got}")]
    InsufficientPoints { got: usize, required: usize },
    #[error("territory name must not be empty")]
    EmptyName,
    #[error("invalid color '{0}', expected #RRGGBB")]
    InvalidColor(String),
}

/// What a click did to the draft.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AddPointOutcome {
    /// Appended; carries the new vertex count.
    Appended(usize),
    /// Landed on the first vertex of a draft with three or more points.
    CloseRequested,
    /// Drawing mode is off.
    Ignored,
}

/// Draft vertex list plus the drawing-mode flag.
#[derive(Debug, Clone, Default)]
pub struct DraftPolygon {
    points: Vec<Point>,
    drawing: bool,
}

impl DraftPolygon {
    pub fn new() -> Self {
        Self::default()
    }

    /// Start (or resume) drawing. Existing points are kept.
    pub fn enter_drawing_mode(&mut self) {
        self.drawing = true;
    }

    /// Stop drawing and discard the draft.
    pub fn exit_drawing_mode(&mut self) {
        self.drawing = false;
        self.points.clear();
    }

    pub fn is_drawing(&self) -> bool {
        self.drawing
    }

    pub fn points(&self) -> &[Point] {
        &self.points
    }

    pub fn len(&self) -> usize {
        self.points.len()
    }

    pub fn is_empty(&self) -> bool {
        self.points.is_empty()
    }

    /// Add a vertex at `p` (map space). `zoom` scales the close threshold so
    /// the hit radius around the first vertex stays constant on screen.
    pub fn add_point(&mut self, p: Point, zoom: f64) -> AddPointOutcome {
        if !self.drawing {
            return AddPointOutcome::Ignored;
        }
        if self.points.len() >= MIN_POLYGON_POINTS {
            let first = self.points[0];
            if p.distance_to(&first) < CLOSE_THRESHOLD / zoom {
                return AddPointOutcome::CloseRequested;
            }
        }
        self.points.push(p);
        AddPointOutcome::Appended(self.points.len())
    }

    /// Drop the most recent vertex. No-op when empty.
    pub fn undo_last(&mut self) -> Option<Point> {
        self.points.pop()
    }

    pub fn clear(&mut self) {
        self.points.clear();
    }

    /// Turn the draft into a territory. On success the draft is emptied and
    /// drawing mode ends; on failure nothing changes.
    pub fn commit(&mut self, name: &str, color: Color) -> Result<Territory, ValidationError> {
        let territory = Territory::new(name, self.points.clone(), color)?;
        self.points.clear();
        self.drawing = false;
        Ok(territory)
    }
}
