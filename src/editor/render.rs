//! Immediate-mode frame builder.
//!
//! `render_frame` is a pure function of (view, territories, draft) that
//! yields a flat list of draw commands in paint order. Hosts replay the list
//! onto whatever surface they have (canvas, SVG, GPU) and call it again after
//! any state change; there is no incremental diff.

use serde::Serialize;

use super::config::*;
use super::draft::DraftPolygon;
use super::geometry::Point;
use super::territory::{Color, Rgba, TerritoryStore};
use super::transform::ViewTransform;

const GRID_COLOR: Color = Color::rgb(0xFF, 0xFF, 0xFF);
const MARKER_TEXT_COLOR: Color = Color::rgb(0xFF, 0xFF, 0xFF);
const LABEL_COLOR: Color = Color::rgb(0xFF, 0xFF, 0xFF);

/// Size of the drawing surface in screen pixels.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Viewport {
    pub width: f64,
    pub height: f64,
}

/// One paint operation. Coordinates after `SetTransform` are in map space.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "op", rename_all = "snake_case")]
pub enum DrawCommand {
    Clear,
    SetTransform {
        zoom: f64,
        offset_x: f64,
        offset_y: f64,
    },
    Image {
        url: String,
    },
    Line {
        from: Point,
        to: Point,
        width: f64,
        color: Rgba,
    },
    FillPolygon {
        points: Vec<Point>,
        color: Rgba,
    },
    /// `closed` adds the edge from the last point back to the first.
    StrokePath {
        points: Vec<Point>,
        closed: bool,
        width: f64,
        color: Rgba,
    },
    Circle {
        center: Point,
        radius: f64,
        color: Rgba,
    },
    Text {
        position: Point,
        text: String,
        size: f64,
        color: Rgba,
    },
}

/// Everything a frame depends on.
pub struct FrameInput<'a> {
    pub view: &'a ViewTransform,
    pub viewport: Viewport,
    pub territories: &'a TerritoryStore,
    pub draft: &'a DraftPolygon,
    pub draw_color: Color,
    pub background: Option<&'a str>,
}

/// Build the full frame.
pub fn render_frame(input: &FrameInput<'_>) -> Vec<DrawCommand> {
    let zoom = input.view.zoom();
    let mut cmds = vec![
        DrawCommand::Clear,
        DrawCommand::SetTransform {
            zoom,
            offset_x: input.view.offset_x,
            offset_y: input.view.offset_y,
        },
    ];

    if let Some(url) = input.background {
        cmds.push(DrawCommand::Image {
            url: url.to_string(),
        });
    }

    push_grid(&mut cmds, input.view, input.viewport);

    for territory in input.territories.list() {
        let color = territory.color();
        let points = territory.points().to_vec();
        cmds.push(DrawCommand::FillPolygon {
            points: points.clone(),
            color: color.with_alpha(TERRITORY_FILL_ALPHA),
        });
        cmds.push(DrawCommand::StrokePath {
            points,
            closed: true,
            width: BORDER_LINE_WIDTH / zoom,
            color: color.with_alpha(1.0),
        });
        for &p in territory.points() {
            cmds.push(DrawCommand::Circle {
                center: p,
                radius: VERTEX_MARKER_RADIUS / zoom,
                color: color.with_alpha(1.0),
            });
        }
        cmds.push(DrawCommand::Text {
            position: territory.centroid(),
            text: territory.name().to_string(),
            size: LABEL_FONT_SIZE / zoom,
            color: LABEL_COLOR.with_alpha(1.0),
        });
    }

    push_draft(&mut cmds, input.draft, input.draw_color, zoom);
    cmds
}

/// Grid lines every `GRID_SPACING` logical units across the visible area.
fn push_grid(cmds: &mut Vec<DrawCommand>, view: &ViewTransform, viewport: Viewport) {
    let top_left = view.to_logical(Point::new(0.0, 0.0));
    let bottom_right = view.to_logical(Point::new(viewport.width, viewport.height));
    let width = GRID_LINE_WIDTH / view.zoom();
    let color = GRID_COLOR.with_alpha(GRID_ALPHA);

    for x in grid_positions(top_left.x, bottom_right.x) {
        cmds.push(DrawCommand::Line {
            from: Point::new(x, top_left.y),
            to: Point::new(x, bottom_right.y),
            width,
            color,
        });
    }

    for y in grid_positions(top_left.y, bottom_right.y) {
        cmds.push(DrawCommand::Line {
            from: Point::new(top_left.x, y),
            to: Point::new(bottom_right.x, y),
            width,
            color,
        });
    }
}

/// Grid line positions in `[from, to]`. Positions are computed from an
/// integer index so far-off offsets, where adding the spacing no longer
/// changes the value, still terminate. Empty when the count is not finite
/// or above `MAX_GRID_LINES`.
fn grid_positions(from: f64, to: f64) -> impl Iterator<Item = f64> {
    let start = (from / GRID_SPACING).floor() * GRID_SPACING;
    let span = ((to - start) / GRID_SPACING).floor();
    let count = if span.is_finite() && span >= 0.0 && span < MAX_GRID_LINES as f64 {
        span as usize + 1
    } else {
        0
    };
    (0..count).map(move |i| start + i as f64 * GRID_SPACING)
}

/// Open path through the draft, filled once it has three points, with
/// 1-based vertex numbers.
fn push_draft(cmds: &mut Vec<DrawCommand>, draft: &DraftPolygon, color: Color, zoom: f64) {
    let points = draft.points();
    if points.is_empty() {
        return;
    }
    if points.len() >= MIN_POLYGON_POINTS {
        cmds.push(DrawCommand::FillPolygon {
            points: points.to_vec(),
            color: color.with_alpha(DRAFT_FILL_ALPHA),
        });
    }
    cmds.push(DrawCommand::StrokePath {
        points: points.to_vec(),
        closed: false,
        width: DRAFT_LINE_WIDTH / zoom,
        color: color.with_alpha(1.0),
    });
    for (i, &p) in points.iter().enumerate() {
        cmds.push(DrawCommand::Circle {
            center: p,
            radius: DRAFT_MARKER_RADIUS / zoom,
            color: color.with_alpha(1.0),
        });
        cmds.push(DrawCommand::Text {
            position: p,
            text: (i + 1).to_string(),
            size: LABEL_FONT_SIZE / zoom,
            color: MARKER_TEXT_COLOR.with_alpha(1.0),
        });
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::editor::territory::Territory;

    const RED: Color = Color::rgb(0xEF, 0x44, 0x44);
    const VIEWPORT: Viewport = Viewport {
        width: 200.0,
        height: 100.0,
    };

    fn square(offset: f64) -> Vec<Point> {
        vec![
            Point::new(offset, offset),
            Point::new(offset + 10.0, offset),
            Point::new(offset + 10.0, offset + 10.0),
            Point::new(offset, offset + 10.0),
        ]
    }

    fn frame(
        view: &ViewTransform,
        store: &TerritoryStore,
        draft: &DraftPolygon,
    ) -> Vec<DrawCommand> {
        render_frame(&FrameInput {
            view,
            viewport: VIEWPORT,
            territories: store,
            draft,
            draw_color: RED,
            background: None,
        })
    }

    fn count<F: Fn(&DrawCommand) -> bool>(cmds: &[DrawCommand], f: F) -> usize {
        cmds.iter().filter(|c| f(c)).count()
    }

    #[test]
    fn test_empty_frame_starts_with_clear_and_transform() {
        let view = ViewTransform::new(2.0, 5.0, 6.0);
        let cmds = frame(&view, &TerritoryStore::new(), &DraftPolygon::new());
        assert_eq!(cmds[0], DrawCommand::Clear);
        assert_eq!(
            cmds[1],
            DrawCommand::SetTransform {
                zoom: 2.0,
                offset_x: 5.0,
                offset_y: 6.0
            }
        );
        assert!(cmds[2..]
            .iter()
            .all(|c| matches!(c, DrawCommand::Line { .. })));
    }

    #[test]
    fn test_grid_covers_viewport() {
        let view = ViewTransform::default();
        let cmds = frame(&view, &TerritoryStore::new(), &DraftPolygon::new());
        // x = 0, 50, 100, 150, 200 and y = 0, 50, 100
        assert_eq!(count(&cmds, |c| matches!(c, DrawCommand::Line { .. })), 8);
    }

    #[test]
    fn test_grid_width_scales_with_zoom() {
        let view = ViewTransform::new(4.0, 0.0, 0.0);
        let cmds = frame(&view, &TerritoryStore::new(), &DraftPolygon::new());
        let widths: Vec<f64> = cmds
            .iter()
            .filter_map(|c| match c {
                DrawCommand::Line { width, .. } => Some(*width),
                _ => None,
            })
            .collect();
        assert!(!widths.is_empty());
        assert!(widths.iter().all(|w| *w == GRID_LINE_WIDTH / 4.0));
    }

    #[test]
    fn test_grid_terminates_far_from_origin() {
        let mut view = ViewTransform::default();
        view.pan(1e18, 0.0);
        let cmds = frame(&view, &TerritoryStore::new(), &DraftPolygon::new());
        let lines = count(&cmds, |c| matches!(c, DrawCommand::Line { .. }));
        assert!(lines <= 2 * MAX_GRID_LINES);
        // Horizontal lines are unaffected by a horizontal pan
        assert!(lines >= 3);
    }

    #[test]
    fn test_grid_skipped_for_non_finite_range() {
        assert_eq!(grid_positions(0.0, f64::INFINITY).count(), 0);
        assert_eq!(grid_positions(f64::NAN, 10.0).count(), 0);
        assert_eq!(grid_positions(10.0, -10.0).count(), 0);
        let xs: Vec<f64> = grid_positions(-20.0, 60.0).collect();
        assert_eq!(xs, [-50.0, 0.0, 50.0]);
    }

    #[test]
    fn test_territories_in_store_order() {
        let mut store = TerritoryStore::new();
        store.add(Territory::new("first", square(0.0), RED).unwrap());
        store.add(Territory::new("second", square(20.0), RED).unwrap());
        let cmds = frame(&ViewTransform::default(), &store, &DraftPolygon::new());

        let labels: Vec<&str> = cmds
            .iter()
            .filter_map(|c| match c {
                DrawCommand::Text { text, .. } => Some(text.as_str()),
                _ => None,
            })
            .collect();
        assert_eq!(labels, ["first", "second"]);

        let label_pos = cmds.iter().find_map(|c| match c {
            DrawCommand::Text { position, .. } => Some(*position),
            _ => None,
        });
        assert_eq!(label_pos, Some(Point::new(5.0, 5.0)));
        assert_eq!(count(&cmds, |c| matches!(c, DrawCommand::Circle { .. })), 8);
        assert_eq!(
            count(&cmds, |c| matches!(c, DrawCommand::StrokePath { closed: true, .. })),
            2
        );
    }

    #[test]
    fn test_territory_fill_is_translucent() {
        let mut store = TerritoryStore::new();
        store.add(Territory::new("t", square(0.0), RED).unwrap());
        let cmds = frame(&ViewTransform::default(), &store, &DraftPolygon::new());
        let fill = cmds.iter().find_map(|c| match c {
            DrawCommand::FillPolygon { color, .. } => Some(*color),
            _ => None,
        });
        assert_eq!(fill, Some(RED.with_alpha(TERRITORY_FILL_ALPHA)));
    }

    #[test]
    fn test_draft_two_points_open_without_fill() {
        let mut draft = DraftPolygon::new();
        draft.enter_drawing_mode();
        draft.add_point(Point::new(0.0, 0.0), 1.0);
        draft.add_point(Point::new(10.0, 0.0), 1.0);
        let cmds = frame(&ViewTransform::default(), &TerritoryStore::new(), &draft);

        assert_eq!(count(&cmds, |c| matches!(c, DrawCommand::FillPolygon { .. })), 0);
        assert_eq!(
            count(&cmds, |c| matches!(c, DrawCommand::StrokePath { closed: false, .. })),
            1
        );
        let numbers: Vec<&str> = cmds
            .iter()
            .filter_map(|c| match c {
                DrawCommand::Text { text, .. } => Some(text.as_str()),
                _ => None,
            })
            .collect();
        assert_eq!(numbers, ["1", "2"]);
    }

    #[test]
    fn test_draft_three_points_filled() {
        let mut draft = DraftPolygon::new();
        draft.enter_drawing_mode();
        for p in &square(0.0)[..3] {
            draft.add_point(*p, 1.0);
        }
        let cmds = frame(&ViewTransform::default(), &TerritoryStore::new(), &draft);
        let fill = cmds.iter().find_map(|c| match c {
            DrawCommand::FillPolygon { color, points } => Some((*color, points.len())),
            _ => None,
        });
        assert_eq!(fill, Some((RED.with_alpha(DRAFT_FILL_ALPHA), 3)));
    }

    #[test]
    fn test_render_is_deterministic() {
        let mut store = TerritoryStore::new();
        store.add(Territory::new("t", square(0.0), RED).unwrap());
        let view = ViewTransform::new(1.5, -12.0, 30.0);
        let draft = DraftPolygon::new();
        assert_eq!(frame(&view, &store, &draft), frame(&view, &store, &draft));
    }

    #[test]
    fn test_background_image_before_grid() {
        let view = ViewTransform::default();
        let store = TerritoryStore::new();
        let draft = DraftPolygon::new();
        let cmds = render_frame(&FrameInput {
            view: &view,
            viewport: VIEWPORT,
            territories: &store,
            draft: &draft,
            draw_color: RED,
            background: Some("https://cdn.example/map.png"),
        });
        assert_eq!(
            cmds[2],
            DrawCommand::Image {
                url: "https://cdn.example/map.png".into()
            }
        );
    }
}
