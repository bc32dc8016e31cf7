use super::mapper::{DragUpdate, PreviewRect, drag_update, is_inside};

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum DragState {
    #[default]
    Idle,
    Dragging,
}

/// Pointer state machine for repositioning a watermark in the preview.
///
/// A press inside the hit box starts a drag; every move while dragging yields
/// new anchors, and release returns to idle. There is no commit step. A
/// double-click recentres the watermark from either state.
#[derive(Debug, Clone, Default)]
pub struct DragController {
    state: DragState,
}

impl DragController {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn state(&self) -> DragState {
        self.state
    }

    pub fn is_dragging(&self) -> bool {
        self.state == DragState::Dragging
    }

    /// Start dragging when `point` hits `hit_box`. Returns whether a drag started.
    pub fn pointer_down(&mut self, point: (f32, f32), hit_box: &PreviewRect) -> bool {
        if is_inside(point, hit_box) {
            self.state = DragState::Dragging;
            true
        } else {
            false
        }
    }

    /// New anchors for a move while dragging; `point` is relative to the preview image.
    pub fn pointer_move(&mut self, point: (f32, f32), preview_size: (u32, u32)) -> Option<DragUpdate> {
        match self.state {
            DragState::Dragging => Some(drag_update(point, preview_size)),
            DragState::Idle => None,
        }
    }

    pub fn pointer_up(&mut self) {
        self.state = DragState::Idle;
    }

    pub fn double_click(&mut self) -> DragUpdate {
        DragUpdate::centered()
    }
}
