use egui::{Pos2, Rect, Vec2};

use crate::geometry::AnnotationGeometry;
use crate::viewport::Viewport;

pub const HANDLE_SIZE: f32 = 10.0;

#[derive(Clone, Debug, PartialEq)]
pub enum ScreenShape {
    Circle { center: Pos2, radius: f32 },
    Rect(Rect),
    Arrow { from: Pos2, to: Pos2 },
    Polyline { points: Vec<Pos2>, closed: bool },
}

impl ScreenShape {
    pub fn project(geometry: &AnnotationGeometry, viewport: &Viewport, origin: Pos2) -> Self {
        let at = |p| origin + viewport.to_pixel(p).to_vec2();
        match geometry {
            AnnotationGeometry::Circle { center, radius } => ScreenShape::Circle {
                center: at(*center),
                // Radius is relative to width on both axes.
                radius: radius * viewport.width,
            },
            AnnotationGeometry::Rect {
                x,
                y,
                width,
                height,
            } => ScreenShape::Rect(Rect::from_min_size(
                origin + Vec2::new(x * viewport.width, y * viewport.height),
                Vec2::new(width * viewport.width, height * viewport.height),
            )),
            AnnotationGeometry::Arrow { from, to } => ScreenShape::Arrow {
                from: at(*from),
                to: at(*to),
            },
            AnnotationGeometry::Polygon { points } => ScreenShape::Polyline {
                points: points.iter().map(|p| at(*p)).collect(),
                closed: true,
            },
            AnnotationGeometry::Freehand { points } => ScreenShape::Polyline {
                points: points.iter().map(|p| at(*p)).collect(),
                closed: false,
            },
        }
    }

    /// Shape as displayed while its node carries a drag transform.
    ///
    /// Circles scale about their center, rectangles about their top-left
    /// corner; point-defined shapes only translate.
    pub fn transformed(&self, offset: Vec2, scale: Vec2) -> Self {
        match self {
            ScreenShape::Circle { center, radius } => ScreenShape::Circle {
                center: *center + offset,
                radius: radius * scale.x,
            },
            ScreenShape::Rect(rect) => ScreenShape::Rect(Rect::from_min_size(
                rect.min + offset,
                rect.size() * scale,
            )),
            ScreenShape::Arrow { from, to } => ScreenShape::Arrow {
                from: *from + offset,
                to: *to + offset,
            },
            ScreenShape::Polyline { points, closed } => ScreenShape::Polyline {
                points: points.iter().map(|p| *p + offset).collect(),
                closed: *closed,
            },
        }
    }

    /// Whether `pos` lies within `tolerance` pixels of the outline.
    ///
    /// Shapes are unfilled, so the inside of a circle or rectangle does not
    /// count as a hit.
    pub fn hit(&self, pos: Pos2, tolerance: f32) -> bool {
        match self {
            ScreenShape::Circle { center, radius } => {
                (center.distance(pos) - radius).abs() <= tolerance
            }
            ScreenShape::Rect(rect) => rect_outline_dist(pos, *rect) <= tolerance,
            ScreenShape::Arrow { from, to } => point_to_segment_dist(pos, *from, *to) <= tolerance,
            ScreenShape::Polyline { points, closed } => {
                if let [only] = points.as_slice() {
                    return only.distance(pos) <= tolerance;
                }
                let near_segment = points
                    .windows(2)
                    .any(|w| point_to_segment_dist(pos, w[0], w[1]) <= tolerance);
                let near_closing = *closed
                    && points.len() > 2
                    && point_to_segment_dist(pos, points[points.len() - 1], points[0])
                        <= tolerance;
                near_segment || near_closing
            }
        }
    }

    pub fn resize_handle(&self) -> Option<Pos2> {
        match self {
            ScreenShape::Circle { center, radius } => Some(*center + Vec2::new(*radius, 0.0)),
            ScreenShape::Rect(rect) => Some(rect.max),
            ScreenShape::Arrow { .. } | ScreenShape::Polyline { .. } => None,
        }
    }

    pub fn hits_resize_handle(&self, pos: Pos2) -> bool {
        self.resize_handle()
            .map(|h| Rect::from_center_size(h, Vec2::splat(HANDLE_SIZE * 1.5)).contains(pos))
            .unwrap_or(false)
    }

    pub fn scale_for_handle(&self, pos: Pos2) -> Vec2 {
        match self {
            ScreenShape::Circle { center, radius } if *radius > 0.0 => {
                Vec2::splat(center.distance(pos) / radius)
            }
            ScreenShape::Rect(rect) => {
                let sx = if rect.width() > 0.0 {
                    ((pos.x - rect.min.x) / rect.width()).max(0.0)
                } else {
                    1.0
                };
                let sy = if rect.height() > 0.0 {
                    ((pos.y - rect.min.y) / rect.height()).max(0.0)
                } else {
                    1.0
                };
                Vec2::new(sx, sy)
            }
            _ => Vec2::splat(1.0),
        }
    }
}

/// Distance from `p` to the nearest edge of `rect`, inside or outside.
fn rect_outline_dist(p: Pos2, rect: Rect) -> f32 {
    let corners = [
        rect.left_top(),
        rect.right_top(),
        rect.right_bottom(),
        rect.left_bottom(),
    ];
    (0..4)
        .map(|i| point_to_segment_dist(p, corners[i], corners[(i + 1) % 4]))
        .fold(f32::INFINITY, f32::min)
}

pub fn point_to_segment_dist(p: Pos2, a: Pos2, b: Pos2) -> f32 {
    let ab = b - a;
    let len_sq = ab.length_sq();
    if len_sq < 1e-6 {
        return p.distance(a);
    }
    let t = ((p - a).dot(ab) / len_sq).clamp(0.0, 1.0);
    let closest = a + ab * t;
    (p - closest).length()
}
