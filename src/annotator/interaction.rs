use egui::{CursorIcon, Pos2, Vec2};
use tracing::debug;

use super::hit_testing::ScreenShape;
use super::{AnnotatorEvent, CanvasProps};
use crate::drawing::DrawState;
use crate::geometry::{Annotation, DragTransform};
use crate::viewport::Viewport;

/// Minimum hit tolerance around a stroke, in pixels (half of a 20px hit stroke).
const HIT_STROKE_WIDTH: f32 = 20.0;

#[derive(Clone, Copy, Debug, PartialEq)]
enum DragMode {
    Move,
    Resize,
}

/// A committed annotation being dragged. The offset and scale live on the
/// node until release, when they are baked into the geometry.
#[derive(Clone, Debug, PartialEq)]
struct NodeDrag {
    id: i64,
    mode: DragMode,
    anchor: Pos2,
    shape: ScreenShape,
    offset: Vec2,
    scale: Vec2,
}

#[derive(Clone, Debug, Default)]
pub struct Interaction {
    draw: DrawState,
    drag: Option<NodeDrag>,
}

pub fn stroke_width(selected: bool) -> f32 {
    if selected {
        3.0
    } else {
        2.0
    }
}

fn hit_tolerance(selected: bool) -> f32 {
    stroke_width(selected).max(HIT_STROKE_WIDTH) / 2.0
}

impl Interaction {
    pub fn is_active(&self) -> bool {
        self.draw.is_drawing() || self.drag.is_some()
    }

    pub fn draw_state(&self) -> &DrawState {
        &self.draw
    }

    pub fn node_transform(&self, id: i64) -> Option<(Vec2, Vec2)> {
        self.drag
            .as_ref()
            .filter(|d| d.id == id)
            .map(|d| (d.offset, d.scale))
    }

    /// Topmost annotation whose outline is under `pos`.
    pub fn pick<'a>(
        &self,
        pos: Pos2,
        viewport: &Viewport,
        props: &'a CanvasProps<'_>,
    ) -> Option<&'a Annotation> {
        props.annotations.iter().rev().find(|a| {
            ScreenShape::project(&a.geometry, viewport, Pos2::ZERO)
                .hit(pos, hit_tolerance(props.selected == Some(a.id)))
        })
    }

    fn selected_handle_hit(
        &self,
        pos: Pos2,
        viewport: &Viewport,
        props: &CanvasProps<'_>,
    ) -> Option<(i64, ScreenShape)> {
        let selected = props.selected?;
        let annotation = props
            .annotations
            .iter()
            .find(|a| a.id == selected)
            .filter(|a| a.geometry.is_resizable())?;
        let shape = ScreenShape::project(&annotation.geometry, viewport, Pos2::ZERO);
        shape
            .hits_resize_handle(pos)
            .then_some((annotation.id, shape))
    }

    pub fn pointer_down(
        &mut self,
        pos: Pos2,
        viewport: &Viewport,
        props: &CanvasProps<'_>,
    ) -> Vec<AnnotatorEvent> {
        if props.readonly {
            return Vec::new();
        }

        if self
            .draw
            .begin(props.tool, viewport.to_normalized(pos), props.readonly)
        {
            return Vec::new();
        }

        if props.enable_move {
            if let Some((id, shape)) = self.selected_handle_hit(pos, viewport, props) {
                self.drag = Some(NodeDrag {
                    id,
                    mode: DragMode::Resize,
                    anchor: pos,
                    shape,
                    offset: Vec2::ZERO,
                    scale: Vec2::splat(1.0),
                });
                return Vec::new();
            }
        }

        match self.pick(pos, viewport, props) {
            Some(annotation) => {
                if props.enable_move {
                    self.drag = Some(NodeDrag {
                        id: annotation.id,
                        mode: DragMode::Move,
                        anchor: pos,
                        shape: ScreenShape::project(&annotation.geometry, viewport, Pos2::ZERO),
                        offset: Vec2::ZERO,
                        scale: Vec2::splat(1.0),
                    });
                }
                vec![AnnotatorEvent::Selected(Some(annotation.id))]
            }
            None if props.selected.is_some() => vec![AnnotatorEvent::Selected(None)],
            None => Vec::new(),
        }
    }

    pub fn pointer_move(&mut self, pos: Pos2, viewport: &Viewport) {
        if self.draw.is_drawing() {
            self.draw.extend(viewport.to_normalized(pos));
            return;
        }
        if let Some(drag) = &mut self.drag {
            match drag.mode {
                DragMode::Move => drag.offset = pos - drag.anchor,
                DragMode::Resize => drag.scale = drag.shape.scale_for_handle(pos),
            }
        }
    }

    pub fn pointer_up(
        &mut self,
        viewport: &Viewport,
        props: &CanvasProps<'_>,
    ) -> Vec<AnnotatorEvent> {
        if self.draw.is_drawing() {
            return match self.draw.finish() {
                Some(geometry) => {
                    debug!("Committed {} annotation", geometry.kind_name());
                    vec![AnnotatorEvent::Created(geometry)]
                }
                None => {
                    debug!("Discarded gesture too small to form a shape");
                    Vec::new()
                }
            };
        }

        // Taking the drag resets the node to the identity transform.
        let Some(drag) = self.drag.take() else {
            return Vec::new();
        };
        let (dx, dy) = viewport.delta_to_normalized(drag.offset);
        let transform = DragTransform {
            sx: drag.scale.x,
            sy: drag.scale.y,
            ..DragTransform::translation(dx, dy)
        };
        if transform.is_identity() {
            return Vec::new();
        }
        let Some(annotation) = props.annotations.iter().find(|a| a.id == drag.id) else {
            return Vec::new();
        };
        vec![AnnotatorEvent::Updated {
            id: annotation.id,
            geometry: annotation.geometry.baked(transform),
        }]
    }

    pub fn delete_pressed(&self, props: &CanvasProps<'_>) -> Option<AnnotatorEvent> {
        if props.readonly {
            return None;
        }
        props.selected.map(AnnotatorEvent::Deleted)
    }

    pub fn cursor(
        &self,
        hover: Option<Pos2>,
        viewport: &Viewport,
        props: &CanvasProps<'_>,
    ) -> CursorIcon {
        if let Some(drag) = &self.drag {
            return match drag.mode {
                DragMode::Move => CursorIcon::Move,
                DragMode::Resize => CursorIcon::ResizeSouthEast,
            };
        }
        if let Some(pos) = hover {
            if !props.readonly && props.enable_move && !self.draw.is_drawing() {
                if self.selected_handle_hit(pos, viewport, props).is_some() {
                    return CursorIcon::ResizeSouthEast;
                }
                if self.pick(pos, viewport, props).is_some() {
                    return CursorIcon::Move;
                }
            }
        }
        if props.tool.creates_shapes() {
            CursorIcon::Crosshair
        } else {
            CursorIcon::Default
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::drawing::DrawingTool;
    use crate::geometry::{AnnotationGeometry, Point};
    use assert_matches::assert_matches;

    const EPS: f32 = 1e-4;

    fn viewport() -> Viewport {
        Viewport::new(1000.0, 500.0)
    }

    fn annotation(id: i64, geometry: AnnotationGeometry) -> Annotation {
        Annotation {
            id,
            defect_id: 1,
            category_id: 1,
            geometry,
            color: None,
            created_at: None,
        }
    }

    fn rect_annotation(id: i64) -> Annotation {
        annotation(
            id,
            AnnotationGeometry::Rect {
                x: 0.1,
                y: 0.2,
                width: 0.2,
                height: 0.2,
            },
        )
    }

    fn props(annotations: &[Annotation], tool: DrawingTool) -> CanvasProps<'_> {
        CanvasProps {
            annotations,
            tool,
            selected: None,
            readonly: false,
            enable_move: false,
        }
    }

    /// Press at `from`, move through `path`, release.
    fn gesture(
        interaction: &mut Interaction,
        props: &CanvasProps<'_>,
        from: (f32, f32),
        path: &[(f32, f32)],
    ) -> Vec<AnnotatorEvent> {
        let vp = viewport();
        let mut events = interaction.pointer_down(Pos2::new(from.0, from.1), &vp, props);
        for &(x, y) in path {
            interaction.pointer_move(Pos2::new(x, y), &vp);
        }
        events.extend(interaction.pointer_up(&vp, props));
        events
    }

    #[test]
    fn test_rect_gesture_emits_normalized_rect() {
        let mut interaction = Interaction::default();
        let p = props(&[], DrawingTool::Rect);
        let events = gesture(&mut interaction, &p, (100.0, 50.0), &[(250.0, 100.0), (400.0, 150.0)]);
        assert_matches!(events.as_slice(), [AnnotatorEvent::Created(AnnotationGeometry::Rect { x, y, width, height })] => {
            assert!((x - 0.1).abs() < EPS && (y - 0.1).abs() < EPS);
            assert!((width - 0.3).abs() < EPS && (height - 0.2).abs() < EPS);
        });
        assert!(!interaction.is_active());
    }

    #[test]
    fn test_circle_gesture() {
        let mut interaction = Interaction::default();
        let p = props(&[], DrawingTool::Circle);
        let events = gesture(&mut interaction, &p, (500.0, 250.0), &[(600.0, 250.0)]);
        assert_matches!(events.as_slice(), [AnnotatorEvent::Created(AnnotationGeometry::Circle { center, radius })] => {
            assert_eq!(*center, Point::new(0.5, 0.5));
            assert!((radius - 0.1).abs() < EPS);
        });
    }

    #[test]
    fn test_two_point_freehand_emits_nothing() {
        let mut interaction = Interaction::default();
        let p = props(&[], DrawingTool::Freehand);
        let events = gesture(&mut interaction, &p, (10.0, 10.0), &[(20.0, 20.0)]);
        assert!(events.is_empty());
        assert!(!interaction.is_active());
    }

    #[test]
    fn test_readonly_never_creates() {
        let mut interaction = Interaction::default();
        let mut p = props(&[], DrawingTool::Rect);
        p.readonly = true;
        let events = gesture(&mut interaction, &p, (10.0, 10.0), &[(200.0, 200.0)]);
        assert!(events.is_empty());
    }

    #[test]
    fn test_click_selects_topmost_and_empty_click_clears() {
        let annotations = [rect_annotation(1), rect_annotation(2)];
        let mut interaction = Interaction::default();
        let mut p = props(&annotations, DrawingTool::Select);

        // Top edge of the rect: y = 0.2 * 500 = 100.
        let events = gesture(&mut interaction, &p, (150.0, 100.0), &[]);
        assert_eq!(events, vec![AnnotatorEvent::Selected(Some(2))]);

        p.selected = Some(2);
        let events = gesture(&mut interaction, &p, (900.0, 450.0), &[]);
        assert_eq!(events, vec![AnnotatorEvent::Selected(None)]);
    }

    #[test]
    fn test_drag_bakes_translation() {
        let annotations = [rect_annotation(7)];
        let mut interaction = Interaction::default();
        let mut p = props(&annotations, DrawingTool::Select);
        p.enable_move = true;

        let vp = viewport();
        interaction.pointer_down(Pos2::new(150.0, 100.0), &vp, &p);
        interaction.pointer_move(Pos2::new(200.0, 125.0), &vp);
        assert_eq!(
            interaction.node_transform(7),
            Some((Vec2::new(50.0, 25.0), Vec2::splat(1.0)))
        );
        let events = interaction.pointer_up(&vp, &p);

        assert_matches!(events.as_slice(), [AnnotatorEvent::Updated { id: 7, geometry: AnnotationGeometry::Rect { x, y, width, height } }] => {
            assert!((x - 0.15).abs() < EPS && (y - 0.25).abs() < EPS);
            assert!((width - 0.2).abs() < EPS && (height - 0.2).abs() < EPS);
        });
        assert_eq!(interaction.node_transform(7), None);
    }

    #[test]
    fn test_click_without_move_does_not_update() {
        let annotations = [rect_annotation(7)];
        let mut interaction = Interaction::default();
        let mut p = props(&annotations, DrawingTool::Select);
        p.enable_move = true;
        let events = gesture(&mut interaction, &p, (150.0, 100.0), &[]);
        assert_eq!(events, vec![AnnotatorEvent::Selected(Some(7))]);
    }

    #[test]
    fn test_no_drag_without_move_enabled() {
        let annotations = [rect_annotation(7)];
        let mut interaction = Interaction::default();
        let p = props(&annotations, DrawingTool::Select);
        let events = gesture(&mut interaction, &p, (150.0, 100.0), &[(300.0, 300.0)]);
        assert_eq!(events, vec![AnnotatorEvent::Selected(Some(7))]);
    }

    #[test]
    fn test_resize_handle_scales_rect() {
        let annotations = [rect_annotation(3)];
        let mut interaction = Interaction::default();
        let mut p = props(&annotations, DrawingTool::Select);
        p.enable_move = true;
        p.selected = Some(3);

        // Rect spans (100,100)..(300,200); handle at bottom-right.
        let events = gesture(&mut interaction, &p, (300.0, 200.0), &[(500.0, 150.0)]);
        assert_matches!(events.as_slice(), [AnnotatorEvent::Updated { id: 3, geometry: AnnotationGeometry::Rect { x, y, width, height } }] => {
            assert!((x - 0.1).abs() < EPS && (y - 0.2).abs() < EPS);
            assert!((width - 0.4).abs() < EPS);
            assert!((height - 0.1).abs() < EPS);
        });
    }

    #[test]
    fn test_arrow_drag_moves_both_endpoints() {
        let annotations = [annotation(
            4,
            AnnotationGeometry::Arrow {
                from: Point::new(0.1, 0.1),
                to: Point::new(0.5, 0.1),
            },
        )];
        let mut interaction = Interaction::default();
        let mut p = props(&annotations, DrawingTool::Select);
        p.enable_move = true;

        let events = gesture(&mut interaction, &p, (300.0, 50.0), &[(400.0, 100.0)]);
        assert_matches!(events.as_slice(), [AnnotatorEvent::Selected(Some(4)), AnnotatorEvent::Updated { id: 4, geometry: AnnotationGeometry::Arrow { from, to } }] => {
            assert!((from.x - 0.2).abs() < EPS && (from.y - 0.2).abs() < EPS);
            assert!((to.x - 0.6).abs() < EPS && (to.y - 0.2).abs() < EPS);
        });
    }

    #[test]
    fn test_delete_key_with_selection() {
        let annotations = [rect_annotation(5)];
        let interaction = Interaction::default();
        let mut p = props(&annotations, DrawingTool::Select);
        assert_eq!(interaction.delete_pressed(&p), None);

        p.selected = Some(5);
        assert_eq!(interaction.delete_pressed(&p), Some(AnnotatorEvent::Deleted(5)));

        p.readonly = true;
        assert_eq!(interaction.delete_pressed(&p), None);
    }

    #[test]
    fn test_cursor_affordance() {
        let annotations = [rect_annotation(1)];
        let interaction = Interaction::default();
        let vp = viewport();

        let p = props(&annotations, DrawingTool::Select);
        assert_eq!(interaction.cursor(None, &vp, &p), CursorIcon::Default);

        let p = props(&annotations, DrawingTool::Arrow);
        assert_eq!(interaction.cursor(None, &vp, &p), CursorIcon::Crosshair);

        let mut p = props(&annotations, DrawingTool::Select);
        p.enable_move = true;
        assert_eq!(
            interaction.cursor(Some(Pos2::new(150.0, 100.0)), &vp, &p),
            CursorIcon::Move
        );
        assert_eq!(
            interaction.cursor(Some(Pos2::new(900.0, 400.0)), &vp, &p),
            CursorIcon::Default
        );
    }
}
