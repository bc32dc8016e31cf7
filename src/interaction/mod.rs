pub mod drag;
pub mod mapper;
pub mod session;

pub use drag::{DragController, DragState};
pub use mapper::{
    DragUpdate, PreviewGeometry, PreviewRect, drag_update, estimate_box, is_inside,
    to_canvas_space, to_preview_space,
};
pub use session::PreviewSession;
