use serde::{Deserialize, Serialize};

use crate::geometry::{AnnotationGeometry, Point};

// ── Tool ────────────────────────────────────────────────────────────────────

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DrawingTool {
    #[default]
    Select,
    Circle,
    Rect,
    Arrow,
    Freehand,
    Polygon,
}

impl DrawingTool {
    pub const TOOLBAR: [DrawingTool; 5] = [
        DrawingTool::Select,
        DrawingTool::Circle,
        DrawingTool::Rect,
        DrawingTool::Arrow,
        DrawingTool::Freehand,
    ];

    pub fn label(&self) -> &'static str {
        match self {
            DrawingTool::Select => "Select",
            DrawingTool::Circle => "Circle",
            DrawingTool::Rect => "Rectangle",
            DrawingTool::Arrow => "Arrow",
            DrawingTool::Freehand => "Freehand",
            DrawingTool::Polygon => "Polygon",
        }
    }

    pub fn creates_shapes(&self) -> bool {
        *self != DrawingTool::Select
    }

    /// Tools that keep every pointer sample instead of only the latest one.
    fn accumulates_points(&self) -> bool {
        matches!(self, DrawingTool::Freehand | DrawingTool::Polygon)
    }
}

// ── Gesture ─────────────────────────────────────────────────────────────────

#[derive(Clone, Debug, PartialEq)]
pub struct Gesture {
    pub tool: DrawingTool,
    pub start: Point,
    pub points: Vec<Point>,
}

impl Gesture {
    fn end(&self) -> Point {
        self.points.last().copied().unwrap_or(self.start)
    }
}

#[derive(Clone, Debug, Default, PartialEq)]
pub enum DrawState {
    #[default]
    Idle,
    Drawing(Gesture),
}

impl DrawState {
    pub fn is_drawing(&self) -> bool {
        matches!(self, DrawState::Drawing(_))
    }

    /// Pointer down. Returns whether a gesture was started.
    ///
    /// The select tool and readonly canvases never start one.
    pub fn begin(&mut self, tool: DrawingTool, at: Point, readonly: bool) -> bool {
        if readonly || !tool.creates_shapes() {
            return false;
        }
        *self = DrawState::Drawing(Gesture {
            tool,
            start: at,
            points: vec![at],
        });
        true
    }

    pub fn extend(&mut self, at: Point) {
        let DrawState::Drawing(gesture) = self else {
            return;
        };
        if gesture.tool.accumulates_points() {
            gesture.points.push(at);
        } else {
            gesture.points = vec![gesture.start, at];
        }
    }

    /// Pointer up. Always returns to idle; yields the committed shape if the
    /// gesture produced one.
    pub fn finish(&mut self) -> Option<AnnotationGeometry> {
        match std::mem::take(self) {
            DrawState::Idle => None,
            DrawState::Drawing(gesture) => finalize(&gesture),
        }
    }

    pub fn preview(&self) -> Option<AnnotationGeometry> {
        let DrawState::Drawing(gesture) = self else {
            return None;
        };
        let end = gesture.end();
        match gesture.tool {
            DrawingTool::Select => None,
            DrawingTool::Circle => Some(AnnotationGeometry::circle_through(gesture.start, end)),
            DrawingTool::Rect => Some(AnnotationGeometry::rect_from_corners(gesture.start, end)),
            DrawingTool::Arrow => Some(AnnotationGeometry::Arrow {
                from: gesture.start,
                to: end,
            }),
            // Polygons preview as the open stroke captured so far.
            DrawingTool::Freehand | DrawingTool::Polygon => Some(AnnotationGeometry::Freehand {
                points: gesture.points.clone(),
            }),
        }
    }
}

/// Final shape for a completed gesture, or `None` when the gesture is too
/// small to mean anything (a click without a drag, a two-sample stroke).
pub fn finalize(gesture: &Gesture) -> Option<AnnotationGeometry> {
    if gesture.points.len() < 2 && gesture.tool != DrawingTool::Circle {
        return None;
    }
    let end = gesture.end();
    match gesture.tool {
        DrawingTool::Select => None,
        DrawingTool::Circle => Some(AnnotationGeometry::circle_through(gesture.start, end)),
        DrawingTool::Rect => Some(AnnotationGeometry::rect_from_corners(gesture.start, end)),
        DrawingTool::Arrow => Some(AnnotationGeometry::Arrow {
            from: gesture.start,
            to: end,
        }),
        DrawingTool::Freehand => (gesture.points.len() > 2).then(|| AnnotationGeometry::Freehand {
            points: gesture.points.clone(),
        }),
        DrawingTool::Polygon => (gesture.points.len() > 2).then(|| AnnotationGeometry::Polygon {
            points: gesture.points.clone(),
        }),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use assert_matches::assert_matches;

    const EPS: f32 = 1e-5;

    fn drag(tool: DrawingTool, path: &[(f32, f32)]) -> Option<AnnotationGeometry> {
        let mut state = DrawState::default();
        let (first, rest) = path.split_first().expect("path needs a start point");
        assert!(state.begin(tool, Point::new(first.0, first.1), false));
        for &(x, y) in rest {
            state.extend(Point::new(x, y));
        }
        let geometry = state.finish();
        assert_eq!(state, DrawState::Idle);
        geometry
    }

    #[test]
    fn test_rect_drag() {
        let geometry = drag(DrawingTool::Rect, &[(0.1, 0.1), (0.25, 0.2), (0.4, 0.3)]);
        assert_matches!(geometry, Some(AnnotationGeometry::Rect { x, y, width, height }) => {
            assert!((x - 0.1).abs() < EPS);
            assert!((y - 0.1).abs() < EPS);
            assert!((width - 0.3).abs() < EPS);
            assert!((height - 0.2).abs() < EPS);
        });
    }

    #[test]
    fn test_rect_drag_up_left() {
        let geometry = drag(DrawingTool::Rect, &[(0.4, 0.3), (0.1, 0.1)]);
        assert_matches!(geometry, Some(AnnotationGeometry::Rect { x, y, width, height }) => {
            assert!((x - 0.1).abs() < EPS && (y - 0.1).abs() < EPS);
            assert!(width >= 0.0 && height >= 0.0);
        });
    }

    #[test]
    fn test_circle_drag() {
        let geometry = drag(DrawingTool::Circle, &[(0.5, 0.5), (0.6, 0.5)]);
        assert_matches!(geometry, Some(AnnotationGeometry::Circle { center, radius }) => {
            assert_eq!(center, Point::new(0.5, 0.5));
            assert!((radius - 0.1).abs() < EPS);
        });
    }

    #[test]
    fn test_circle_click_emits_zero_radius() {
        let geometry = drag(DrawingTool::Circle, &[(0.3, 0.3)]);
        assert_eq!(
            geometry,
            Some(AnnotationGeometry::Circle {
                center: Point::new(0.3, 0.3),
                radius: 0.0,
            })
        );
    }

    #[test]
    fn test_click_without_drag_is_discarded() {
        assert_eq!(drag(DrawingTool::Rect, &[(0.2, 0.2)]), None);
        assert_eq!(drag(DrawingTool::Arrow, &[(0.2, 0.2)]), None);
        assert_eq!(drag(DrawingTool::Freehand, &[(0.2, 0.2)]), None);
    }

    #[test]
    fn test_arrow_keeps_direction() {
        let geometry = drag(DrawingTool::Arrow, &[(0.8, 0.8), (0.5, 0.1), (0.2, 0.3)]);
        assert_eq!(
            geometry,
            Some(AnnotationGeometry::Arrow {
                from: Point::new(0.8, 0.8),
                to: Point::new(0.2, 0.3),
            })
        );
    }

    #[test]
    fn test_freehand_needs_more_than_two_points() {
        assert_eq!(drag(DrawingTool::Freehand, &[(0.1, 0.1), (0.2, 0.2)]), None);

        let geometry = drag(DrawingTool::Freehand, &[(0.1, 0.1), (0.2, 0.2), (0.3, 0.1)]);
        assert_matches!(geometry, Some(AnnotationGeometry::Freehand { points }) => {
            assert_eq!(points.len(), 3);
            assert_eq!(points[0], Point::new(0.1, 0.1));
        });
    }

    #[test]
    fn test_polygon_captures_like_freehand() {
        assert_eq!(drag(DrawingTool::Polygon, &[(0.1, 0.1), (0.2, 0.2)]), None);

        let geometry = drag(
            DrawingTool::Polygon,
            &[(0.1, 0.1), (0.2, 0.2), (0.3, 0.1), (0.2, 0.0)],
        );
        assert_matches!(geometry, Some(AnnotationGeometry::Polygon { points }) => {
            assert_eq!(points.len(), 4);
        });
    }

    #[test]
    fn test_non_accumulating_tools_keep_start_and_latest() {
        let mut state = DrawState::default();
        state.begin(DrawingTool::Rect, Point::new(0.1, 0.1), false);
        for i in 0..10 {
            state.extend(Point::new(0.2 + i as f32 * 0.01, 0.2));
        }
        assert_matches!(&state, DrawState::Drawing(gesture) => {
            assert_eq!(gesture.points.len(), 2);
            assert_eq!(gesture.points[0], Point::new(0.1, 0.1));
        });
    }

    #[test]
    fn test_select_and_readonly_never_start() {
        let mut state = DrawState::default();
        assert!(!state.begin(DrawingTool::Select, Point::new(0.5, 0.5), false));
        assert!(!state.begin(DrawingTool::Rect, Point::new(0.5, 0.5), true));
        assert!(!state.is_drawing());
        state.extend(Point::new(0.9, 0.9));
        assert_eq!(state.finish(), None);
    }

    #[test]
    fn test_preview_follows_pointer() {
        let mut state = DrawState::default();
        assert_eq!(state.preview(), None);
        state.begin(DrawingTool::Arrow, Point::new(0.1, 0.1), false);
        state.extend(Point::new(0.3, 0.4));
        assert_eq!(
            state.preview(),
            Some(AnnotationGeometry::Arrow {
                from: Point::new(0.1, 0.1),
                to: Point::new(0.3, 0.4),
            })
        );
    }

    #[test]
    fn test_tool_serializes_lowercase() {
        assert_eq!(serde_json::to_string(&DrawingTool::Freehand).unwrap(), "\"freehand\"");
        assert_eq!(
            serde_json::from_str::<DrawingTool>("\"rect\"").unwrap(),
            DrawingTool::Rect
        );
    }
}
