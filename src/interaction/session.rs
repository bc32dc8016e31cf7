//! Preview state owned by one displayed image.
//!
//! The session keeps the edited (`draft`) and applied descriptors apart and
//! owns the most recent render. Hit-testing reads that render's box only while
//! it still matches the applied descriptor; otherwise it falls back to the
//! estimated box so a drag can start before the next render lands.

use image::DynamicImage;
use std::sync::Arc;
use tracing::debug;

use super::drag::DragController;
use super::mapper::{
    DragUpdate, PreviewGeometry, PreviewRect, estimate_box, is_inside, to_preview_space,
};
use crate::export::thumbnail;
use crate::watermark::{DynWatermarkRenderer, RenderResult, StyleDescriptor};

#[derive(Debug, Clone)]
struct RenderedPreview {
    style: StyleDescriptor,
    result: RenderResult,
}

pub struct PreviewSession {
    renderer: DynWatermarkRenderer,
    source: Arc<DynamicImage>,
    geometry: PreviewGeometry,
    draft: StyleDescriptor,
    applied: StyleDescriptor,
    last_render: Option<RenderedPreview>,
    drag: DragController,
}

impl PreviewSession {
    /// Session for `source` shown letterboxed in a `widget`-sized preview.
    pub fn new(
        renderer: DynWatermarkRenderer,
        source: DynamicImage,
        widget: (u32, u32),
        initial: StyleDescriptor,
    ) -> Self {
        let geometry = PreviewGeometry::fit((source.width(), source.height()), widget);
        Self {
            renderer,
            source: Arc::new(source),
            geometry,
            draft: initial.clone(),
            applied: initial,
            last_render: None,
            drag: DragController::new(),
        }
    }

    pub fn geometry(&self) -> &PreviewGeometry {
        &self.geometry
    }

    pub fn draft(&self) -> &StyleDescriptor {
        &self.draft
    }

    pub fn applied(&self) -> &StyleDescriptor {
        &self.applied
    }

    pub fn drag(&self) -> &DragController {
        &self.drag
    }

    /// Replace the edited descriptor without affecting what is rendered.
    pub fn edit(&mut self, draft: StyleDescriptor) {
        self.draft = draft;
    }

    /// Promote the draft to the applied descriptor.
    pub fn apply(&mut self) -> &StyleDescriptor {
        self.applied = self.draft.clone();
        &self.applied
    }

    /// The latest render, if any.
    pub fn last_render(&self) -> Option<&RenderResult> {
        self.last_render.as_ref().map(|r| &r.result)
    }

    /// Whether the latest render reflects the applied descriptor.
    pub fn is_current(&self) -> bool {
        self.last_render
            .as_ref()
            .is_some_and(|r| r.style == self.applied)
    }

    /// Render the applied descriptor on the calling thread.
    pub fn render(&mut self) -> &RenderResult {
        let result = self.renderer.render(&self.source, &self.applied);
        self.install(self.applied.clone(), result)
    }

    /// Render the applied descriptor on the blocking pool.
    pub async fn render_in_background(&mut self) -> Result<&RenderResult, tokio::task::JoinError> {
        let renderer = Arc::clone(&self.renderer);
        let source = Arc::clone(&self.source);
        let style = self.applied.clone();

        let result = tokio::task::spawn_blocking({
            let style = style.clone();
            move || renderer.render(&source, &style)
        })
        .await?;

        Ok(self.install(style, result))
    }

    fn install(&mut self, style: StyleDescriptor, result: RenderResult) -> &RenderResult {
        debug!("Installed preview render, box {:?}", result.bounding_box);
        &self.last_render.insert(RenderedPreview { style, result }).result
    }

    /// The latest render scaled down to the preview size, for display.
    pub fn preview_image(&self) -> Option<DynamicImage> {
        let (width, height) = self.geometry.preview;
        self.last_render()
            .map(|result| thumbnail(&result.image, width, height))
    }

    /// Hit box in widget coordinates: the rendered box when current, else an estimate.
    pub fn hit_box(&self) -> PreviewRect {
        let rendered = self
            .last_render
            .as_ref()
            .filter(|r| r.style == self.applied)
            .and_then(|r| r.result.bounding_box);

        match rendered {
            Some(bounding_box) => to_preview_space(&bounding_box, &self.geometry),
            None => estimate_box(&self.applied, self.geometry.preview).translated(self.geometry.offset),
        }
    }

    pub fn hit_test(&self, point: (f32, f32)) -> bool {
        is_inside(point, &self.hit_box())
    }

    pub fn pointer_down(&mut self, point: (f32, f32)) -> bool {
        let hit_box = self.hit_box();
        self.drag.pointer_down(point, &hit_box)
    }

    /// Move while dragging; the new anchors are applied immediately.
    pub fn pointer_move(&mut self, point: (f32, f32)) -> Option<DragUpdate> {
        let image_point = self.geometry.to_image_point(point);
        let update = self.drag.pointer_move(image_point, self.geometry.preview)?;
        self.set_anchors(update);
        Some(update)
    }

    pub fn pointer_up(&mut self) {
        self.drag.pointer_up();
    }

    pub fn double_click(&mut self) -> DragUpdate {
        let update = self.drag.double_click();
        self.set_anchors(update);
        update
    }

    fn set_anchors(&mut self, update: DragUpdate) {
        for style in [&mut self.draft, &mut self.applied] {
            style.horizontal_anchor = update.horizontal_anchor;
            style.vertical_anchor = update.vertical_anchor;
        }
    }
}
