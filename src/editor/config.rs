// Zoom bounds and per-step factors
pub const ZOOM_MIN: f64 = 0.1;
pub const ZOOM_MAX: f64 = 5.0;
pub const ZOOM_IN_FACTOR: f64 = 1.1;
pub const ZOOM_OUT_FACTOR: f64 = 0.9;

// Screen-pixel radius around the first vertex that counts as a close click
pub const CLOSE_THRESHOLD: f64 = 10.0;

// Minimum vertices for a committed territory
pub const MIN_POLYGON_POINTS: usize = 3;

// Background grid spacing in logical units
pub const GRID_SPACING: f64 = 50.0;
/// Upper bound on grid lines per axis; beyond it the grid is skipped.
pub const MAX_GRID_LINES: usize = 4096;

// Stroke widths in screen pixels (divided by zoom when emitted)
pub const GRID_LINE_WIDTH: f64 = 1.0;
pub const BORDER_LINE_WIDTH: f64 = 2.0;
pub const DRAFT_LINE_WIDTH: f64 = 2.0;

// Vertex marker radii in screen pixels
pub const VERTEX_MARKER_RADIUS: f64 = 4.0;
pub const DRAFT_MARKER_RADIUS: f64 = 6.0;

// Label font size in screen pixels
pub const LABEL_FONT_SIZE: f64 = 14.0;

// Opacities
pub const TERRITORY_FILL_ALPHA: f64 = 0.25;
pub const DRAFT_FILL_ALPHA: f64 = 0.2;
pub const GRID_ALPHA: f64 = 0.1;

// Areas below this are treated as degenerate (collinear vertices)
pub const AREA_EPSILON: f64 = 1e-9;
