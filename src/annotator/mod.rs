//! Photo canvas that paints annotations and turns pointer input into
//! annotation events.
//!
//! The widget owns only the texture and the in-flight gesture. Annotations,
//! the active tool and the selection come in through [`CanvasProps`] every
//! frame, and every change goes back out as an [`AnnotatorEvent`]; the caller
//! decides what to persist.

mod hit_testing;
mod interaction;
mod paint;

pub use hit_testing::ScreenShape;
pub use interaction::Interaction;

use egui::{Color32, Key, Pos2, Sense, Stroke};
use image::DynamicImage;

use crate::drawing::DrawingTool;
use crate::geometry::{Annotation, AnnotationGeometry};
use crate::viewport::{Viewport, MAX_RENDER_WIDTH};

/// What the embedding page hands the canvas each frame.
#[derive(Clone, Debug)]
pub struct CanvasProps<'a> {
    pub annotations: &'a [Annotation],
    pub tool: DrawingTool,
    pub selected: Option<i64>,
    pub readonly: bool,
    pub enable_move: bool,
}

#[derive(Clone, Debug, PartialEq)]
pub enum AnnotatorEvent {
    Created(AnnotationGeometry),
    /// `None` when the selection was cleared by clicking empty canvas.
    Selected(Option<i64>),
    Updated {
        id: i64,
        geometry: AnnotationGeometry,
    },
    Deleted(i64),
}

pub struct ImageAnnotator {
    texture: Option<egui::TextureHandle>,
    image_size: Option<[usize; 2]>,
    max_width: f32,
    interaction: Interaction,
}

impl Default for ImageAnnotator {
    fn default() -> Self {
        Self::new(MAX_RENDER_WIDTH)
    }
}

impl ImageAnnotator {
    pub fn new(max_width: f32) -> Self {
        Self {
            texture: None,
            image_size: None,
            max_width,
            interaction: Interaction::default(),
        }
    }

    pub fn set_image(&mut self, ctx: &egui::Context, image: &DynamicImage) {
        let rgba = image.to_rgba8();
        let size = [rgba.width() as usize, rgba.height() as usize];
        let pixels = rgba.as_flat_samples();
        let color_image = egui::ColorImage::from_rgba_unmultiplied(size, pixels.as_slice());
        self.texture = Some(ctx.load_texture("photo", color_image, egui::TextureOptions::LINEAR));
        self.image_size = Some(size);
    }

    /// Drop the photo; the canvas falls back to an empty 800×600 surface.
    pub fn clear_image(&mut self) {
        self.texture = None;
        self.image_size = None;
    }

    fn viewport(&self, available_width: f32) -> Viewport {
        match self.image_size {
            Some(size) => Viewport::fit_image(available_width, size, self.max_width),
            None => Viewport::default(),
        }
    }

    pub fn show(&mut self, ui: &mut egui::Ui, props: &CanvasProps<'_>) -> Vec<AnnotatorEvent> {
        let viewport = self.viewport(ui.available_width());
        let (response, painter) = ui.allocate_painter(viewport.size(), Sense::click_and_drag());
        let canvas_rect = response.rect;
        let origin = canvas_rect.min;
        let local = |p: Pos2| Pos2::new(p.x - origin.x, p.y - origin.y);
        let mut events = Vec::new();

        // Background and photo
        painter.rect_filled(canvas_rect, 0.0, Color32::from_gray(40));
        if let Some(ref tex) = self.texture {
            painter.image(
                tex.id(),
                canvas_rect,
                egui::Rect::from_min_max(egui::pos2(0.0, 0.0), egui::pos2(1.0, 1.0)),
                Color32::WHITE,
            );
        }
        painter.rect_stroke(
            canvas_rect,
            4.0,
            Stroke::new(1.0, Color32::from_gray(160)),
            egui::StrokeKind::Outside,
        );

        // Pointer input
        let (pressed, released, moving, pointer_pos) = ui.input(|i| {
            (
                i.pointer.primary_pressed(),
                i.pointer.primary_released(),
                i.pointer.is_moving(),
                i.pointer.interact_pos(),
            )
        });
        if pressed && response.contains_pointer() {
            if let Some(pos) = pointer_pos {
                events.extend(self.interaction.pointer_down(local(pos), &viewport, props));
            }
        }
        if moving && self.interaction.is_active() {
            if let Some(pos) = pointer_pos {
                self.interaction.pointer_move(local(pos), &viewport);
            }
        }
        if released && self.interaction.is_active() {
            events.extend(self.interaction.pointer_up(&viewport, props));
        }

        // Keyboard
        let delete_pressed = !ui.ctx().wants_keyboard_input()
            && ui.input(|i| i.key_pressed(Key::Delete) || i.key_pressed(Key::Backspace));
        if delete_pressed {
            events.extend(self.interaction.delete_pressed(props));
        }

        // Cursor
        if response.hovered() || self.interaction.is_active() {
            let hover = response.hover_pos().map(local);
            ui.ctx()
                .set_cursor_icon(self.interaction.cursor(hover, &viewport, props));
        }

        self.paint_annotations(&painter, origin, &viewport, props);
        self.paint_draft(&painter, origin, &viewport);

        if let Some(selected) = props.selected.filter(|_| !props.readonly) {
            ui.horizontal(|ui| {
                if props.enable_move {
                    ui.colored_label(Color32::from_rgb(21, 128, 61), "✓ Selected - Drag to reposition");
                } else {
                    let annotation = props.annotations.iter().find(|a| a.id == selected);
                    let kind = annotation.map(|a| a.geometry.kind_name()).unwrap_or("Unknown");
                    if annotation.is_some_and(Annotation::is_draft) {
                        ui.label(format!("Selected annotation - {kind} (unsaved)"));
                    } else {
                        ui.label(format!("Selected annotation - {kind}"));
                    }
                }
                if ui.button("Delete").clicked() {
                    events.push(AnnotatorEvent::Deleted(selected));
                }
            });
        }

        events
    }

    fn paint_annotations(
        &self,
        painter: &egui::Painter,
        origin: Pos2,
        viewport: &Viewport,
        props: &CanvasProps<'_>,
    ) {
        for annotation in props.annotations {
            if !annotation.geometry.is_renderable() {
                continue;
            }
            let is_selected = props.selected == Some(annotation.id);
            let color = if is_selected {
                paint::selected_color()
            } else {
                paint::annotation_color(annotation.color.as_deref())
            };
            let stroke = Stroke::new(interaction::stroke_width(is_selected), color);

            let mut shape = ScreenShape::project(&annotation.geometry, viewport, origin);
            if let Some((offset, scale)) = self.interaction.node_transform(annotation.id) {
                shape = shape.transformed(offset, scale);
            }
            paint::paint_shape(painter, &shape, stroke);

            if is_selected && props.enable_move && !props.readonly {
                if let Some(handle) = shape.resize_handle() {
                    paint::paint_resize_handle(painter, handle);
                }
            }
        }
    }

    fn paint_draft(&self, painter: &egui::Painter, origin: Pos2, viewport: &Viewport) {
        let Some(geometry) = self.interaction.draw_state().preview() else {
            return;
        };
        let shape = ScreenShape::project(&geometry, viewport, origin);
        paint::paint_preview(painter, &shape, Stroke::new(2.0, paint::selected_color()));
    }
}
