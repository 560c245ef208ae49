//! Editor session: the single-threaded owner of all editing state.
//!
//! Input events come in as screen coordinates; the session converts them,
//! mutates the draft/store/view and hands back a fresh frame on request.

use super::config::{ZOOM_IN_FACTOR, ZOOM_OUT_FACTOR};
use super::draft::{AddPointOutcome, DraftPolygon, ValidationError};
use super::geometry::Point;
use super::render::{render_frame, DrawCommand, FrameInput, Viewport};
use super::territory::{Color, TerritoryId, TerritorySet, TerritoryStore};
use super::transform::ViewTransform;

pub struct EditorSession {
    view: ViewTransform,
    viewport: Viewport,
    draft: DraftPolygon,
    store: TerritoryStore,
    draw_color: Color,
    selected: Option<TerritoryId>,
    /// Set by a click on the first vertex; the host should prompt for a name.
    close_pending: bool,
    background: Option<String>,
}

impl EditorSession {
    pub fn new(viewport: Viewport) -> Self {
        Self {
            view: ViewTransform::default(),
            viewport,
            draft: DraftPolygon::new(),
            store: TerritoryStore::new(),
            draw_color: Color::default(),
            selected: None,
            close_pending: false,
            background: None,
        }
    }

    pub fn view(&self) -> &ViewTransform {
        &self.view
    }

    /// Direct access for hosts restoring a saved viewpoint.
    pub fn view_mut(&mut self) -> &mut ViewTransform {
        &mut self.view
    }

    pub fn draft(&self) -> &DraftPolygon {
        &self.draft
    }

    pub fn store(&self) -> &TerritoryStore {
        &self.store
    }

    pub fn selected(&self) -> Option<TerritoryId> {
        self.selected
    }

    pub fn close_pending(&self) -> bool {
        self.close_pending
    }

    pub fn draw_color(&self) -> Color {
        self.draw_color
    }

    pub fn set_draw_color(&mut self, color: Color) {
        self.draw_color = color;
    }

    pub fn set_viewport(&mut self, viewport: Viewport) {
        self.viewport = viewport;
    }

    pub fn set_background(&mut self, url: Option<String>) {
        self.background = url;
    }

    pub fn start_drawing(&mut self) {
        self.selected = None;
        self.draft.enter_drawing_mode();
    }

    /// Leave drawing mode, discarding the draft.
    pub fn stop_drawing(&mut self) {
        self.draft.exit_drawing_mode();
        self.close_pending = false;
    }

    /// Primary click at a screen position. While drawing it adds a vertex;
    /// otherwise it selects the topmost territory under the cursor.
    pub fn click(&mut self, screen: Point) -> AddPointOutcome {
        let logical = self.view.to_logical(screen);
        if !self.draft.is_drawing() {
            self.selected = self.store.hit_test(&logical);
            return AddPointOutcome::Ignored;
        }
        let outcome = self.draft.add_point(logical, self.view.zoom());
        if outcome == AddPointOutcome::CloseRequested {
            tracing::debug!(points = self.draft.len(), "Close requested on draft polygon");
            self.close_pending = true;
        }
        outcome
    }

    /// Pan by a screen-space drag delta.
    pub fn drag(&mut self, dx: f64, dy: f64) {
        self.view.pan(dx, dy);
    }

    /// Wheel step anchored at the cursor: negative delta zooms in.
    pub fn wheel(&mut self, delta_y: f64, anchor: Point) -> f64 {
        if delta_y < 0.0 {
            self.view.zoom_at(anchor, ZOOM_IN_FACTOR)
        } else if delta_y > 0.0 {
            self.view.zoom_at(anchor, ZOOM_OUT_FACTOR)
        } else {
            self.view.zoom()
        }
    }

    pub fn undo(&mut self) {
        self.draft.undo_last();
        self.close_pending = false;
    }

    pub fn clear_draft(&mut self) {
        self.draft.clear();
        self.close_pending = false;
    }

    /// Commit the draft under `name` with the current draw color.
    pub fn commit(&mut self, name: &str) -> Result<TerritoryId, ValidationError> {
        let territory = self.draft.commit(name, self.draw_color)?;
        let id = territory.id();
        tracing::info!(
            territory_id = %id,
            name = territory.name(),
            points = territory.points().len(),
            "Committed territory"
        );
        self.store.add(territory);
        self.close_pending = false;
        Ok(id)
    }

    /// Delete the selected territory, if any. Returns whether one was removed.
    pub fn delete_selected(&mut self) -> bool {
        match self.selected.take() {
            Some(id) => self.store.remove(id),
            None => false,
        }
    }

    pub fn delete(&mut self, id: TerritoryId) -> bool {
        if self.selected == Some(id) {
            self.selected = None;
        }
        self.store.remove(id)
    }

    pub fn export(&self) -> TerritorySet {
        self.store.export_all()
    }

    /// Replace territories with a persisted set. Selection is dropped; the
    /// draft is left alone.
    pub fn load(&mut self, set: TerritorySet) -> Result<(), ValidationError> {
        self.store.replace_all(set)?;
        self.selected = None;
        Ok(())
    }

    pub fn frame(&self) -> Vec<DrawCommand> {
        render_frame(&FrameInput {
            view: &self.view,
            viewport: self.viewport,
            territories: &self.store,
            draft: &self.draft,
            draw_color: self.draw_color,
            background: self.background.as_deref(),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn session() -> EditorSession {
        EditorSession::new(Viewport {
            width: 800.0,
            height: 600.0,
        })
    }

    fn draw_square(s: &mut EditorSession) {
        s.start_drawing();
        for (x, y) in [(0.0, 0.0), (100.0, 0.0), (100.0, 100.0), (0.0, 100.0)] {
            s.click(Point::new(x, y));
        }
    }

    #[test]
    fn test_default_color() {
        assert_eq!(session().draw_color().to_string(), "#3B82F6");
    }

    #[test]
    fn test_click_uses_view_transform() {
        let mut s = session();
        *s.view_mut() = ViewTransform::new(2.0, 100.0, 50.0);
        s.start_drawing();
        s.click(Point::new(120.0, 70.0));
        assert_eq!(s.draft().points(), &[Point::new(10.0, 10.0)]);
    }

    #[test]
    fn test_close_click_sets_pending() {
        let mut s = session();
        draw_square(&mut s);
        assert_eq!(s.click(Point::new(2.0, 2.0)), AddPointOutcome::CloseRequested);
        assert!(s.close_pending());
        assert_eq!(s.draft().len(), 4);

        s.undo();
        assert!(!s.close_pending());
        assert_eq!(s.draft().len(), 3);
    }

    #[test]
    fn test_commit_then_select_and_delete() {
        let mut s = session();
        draw_square(&mut s);
        let id = s.commit("Base").unwrap();
        assert!(s.draft().is_empty());
        assert!(!s.draft().is_drawing());
        assert_eq!(s.store().len(), 1);

        s.click(Point::new(50.0, 50.0));
        assert_eq!(s.selected(), Some(id));
        assert!(s.delete_selected());
        assert!(s.store().is_empty());
        assert!(!s.delete_selected());
    }

    #[test]
    fn test_click_outside_clears_selection() {
        let mut s = session();
        draw_square(&mut s);
        s.commit("Base").unwrap();
        s.click(Point::new(50.0, 50.0));
        assert!(s.selected().is_some());
        s.click(Point::new(500.0, 500.0));
        assert!(s.selected().is_none());
    }

    #[test]
    fn test_wheel_zoom_direction() {
        let mut s = session();
        let anchor = Point::new(400.0, 300.0);
        assert!(s.wheel(-120.0, anchor) > 1.0);

        let mut s = session();
        let zoomed_out = s.wheel(120.0, anchor);
        assert!(zoomed_out < 1.0);
        // Zero delta leaves the zoom alone
        assert_eq!(s.wheel(0.0, anchor), zoomed_out);
        assert_eq!(session().wheel(0.0, anchor), 1.0);
    }

    #[test]
    fn test_drag_pans() {
        let mut s = session();
        s.drag(15.0, -4.0);
        assert_eq!(s.view().offset_x, 15.0);
        assert_eq!(s.view().offset_y, -4.0);
    }

    #[test]
    fn test_export_load_round_trip() {
        let mut s = session();
        draw_square(&mut s);
        s.commit("Base").unwrap();
        let set = s.export();

        let mut other = session();
        other.load(set.clone()).unwrap();
        assert_eq!(other.export(), set);
        // Fresh ids on import
        let a = s.store().list().next().unwrap().id();
        let b = other.store().list().next().unwrap().id();
        assert_ne!(a, b);
    }

    #[test]
    fn test_stop_drawing_discards_draft() {
        let mut s = session();
        draw_square(&mut s);
        s.stop_drawing();
        assert!(s.draft().is_empty());
        assert_eq!(s.click(Point::new(1.0, 1.0)), AddPointOutcome::Ignored);
    }
}
