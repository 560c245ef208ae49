pub mod config;
pub mod draft;
pub mod geometry;
pub mod render;
pub mod session;
pub mod territory;
pub mod transform;

pub use draft::{AddPointOutcome, DraftPolygon, ValidationError};
pub use geometry::Point;
pub use render::{render_frame, DrawCommand, FrameInput, Viewport};
pub use session::EditorSession;
pub use territory::{Color, Territory, TerritoryExport, TerritoryId, TerritorySet, TerritoryStore};
pub use transform::ViewTransform;
