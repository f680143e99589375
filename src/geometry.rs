//! Annotation geometry in normalized image space.
//!
//! Every coordinate stored here lies in `[0, 1]` relative to the photo's
//! width (x) and height (y). Pixel values only exist transiently while a
//! shape is being drawn or painted at a particular viewport size.

use serde::{Deserialize, Serialize};

// ── Coordinate conversions ──────────────────────────────────────────────────

pub fn normalized_to_pixel(normalized: f32, dimension: f32) -> f32 {
    normalized * dimension
}

pub fn pixel_to_normalized(pixel: f32, dimension: f32) -> f32 {
    pixel / dimension
}

/// Scale a normalized point to pixels. x follows width, y follows height.
pub fn point_to_pixel(point: Point, width: f32, height: f32) -> (f32, f32) {
    (
        normalized_to_pixel(point.x, width),
        normalized_to_pixel(point.y, height),
    )
}

pub fn point_to_normalized(x: f32, y: f32, width: f32, height: f32) -> Point {
    Point {
        x: pixel_to_normalized(x, width),
        y: pixel_to_normalized(y, height),
    }
}

// ── Data Model ──────────────────────────────────────────────────────────────

#[derive(Clone, Copy, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct Point {
    pub x: f32,
    pub y: f32,
}

impl Point {
    pub fn new(x: f32, y: f32) -> Self {
        Self { x, y }
    }

    pub fn distance_to(&self, other: Point) -> f32 {
        let dx = other.x - self.x;
        let dy = other.y - self.y;
        (dx * dx + dy * dy).sqrt()
    }

    pub fn offset(&self, dx: f32, dy: f32) -> Self {
        Self {
            x: self.x + dx,
            y: self.y + dy,
        }
    }
}

/// Shape data of a single annotation.
///
/// Serializes as a flat object discriminated by `type`, e.g.
/// `{"type":"rect","x":0.1,"y":0.1,"width":0.3,"height":0.2}`.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "lowercase")]
pub enum AnnotationGeometry {
    /// `radius` is relative to the image width.
    Circle { center: Point, radius: f32 },
    /// `(x, y)` is the top-left corner.
    Rect {
        x: f32,
        y: f32,
        width: f32,
        height: f32,
    },
    Polygon { points: Vec<Point> },
    Arrow { from: Point, to: Point },
    Freehand { points: Vec<Point> },
}

impl AnnotationGeometry {
    /// Rectangle spanned by two opposite corners, whatever the drag direction.
    pub fn rect_from_corners(a: Point, b: Point) -> Self {
        AnnotationGeometry::Rect {
            x: a.x.min(b.x),
            y: a.y.min(b.y),
            width: (b.x - a.x).abs(),
            height: (b.y - a.y).abs(),
        }
    }

    pub fn circle_through(center: Point, edge: Point) -> Self {
        AnnotationGeometry::Circle {
            center,
            radius: center.distance_to(edge),
        }
    }

    pub fn kind_name(&self) -> &'static str {
        match self {
            AnnotationGeometry::Circle { .. } => "circle",
            AnnotationGeometry::Rect { .. } => "rect",
            AnnotationGeometry::Polygon { .. } => "polygon",
            AnnotationGeometry::Arrow { .. } => "arrow",
            AnnotationGeometry::Freehand { .. } => "freehand",
        }
    }

    pub fn is_renderable(&self) -> bool {
        match self {
            AnnotationGeometry::Circle { radius, .. } => *radius >= 0.0,
            AnnotationGeometry::Rect { width, height, .. } => *width >= 0.0 && *height >= 0.0,
            AnnotationGeometry::Polygon { points } => points.len() >= 3,
            AnnotationGeometry::Arrow { .. } => true,
            AnnotationGeometry::Freehand { points } => points.len() >= 2,
        }
    }

    pub fn is_resizable(&self) -> bool {
        matches!(
            self,
            AnnotationGeometry::Circle { .. } | AnnotationGeometry::Rect { .. }
        )
    }

    /// Fold a drag transform into the shape's own fields.
    ///
    /// The returned geometry already contains the offset and scale, so the
    /// node that displayed the drag goes back to the identity transform.
    pub fn baked(&self, transform: DragTransform) -> Self {
        let DragTransform { dx, dy, sx, sy } = transform;
        match self {
            AnnotationGeometry::Circle { center, radius } => AnnotationGeometry::Circle {
                center: center.offset(dx, dy),
                radius: radius * sx,
            },
            AnnotationGeometry::Rect {
                x,
                y,
                width,
                height,
            } => AnnotationGeometry::Rect {
                x: x + dx,
                y: y + dy,
                width: width * sx,
                height: height * sy,
            },
            AnnotationGeometry::Arrow { from, to } => AnnotationGeometry::Arrow {
                from: from.offset(dx, dy),
                to: to.offset(dx, dy),
            },
            AnnotationGeometry::Polygon { points } => AnnotationGeometry::Polygon {
                points: points.iter().map(|p| p.offset(dx, dy)).collect(),
            },
            AnnotationGeometry::Freehand { points } => AnnotationGeometry::Freehand {
                points: points.iter().map(|p| p.offset(dx, dy)).collect(),
            },
        }
    }
}

#[derive(Clone, Copy, Debug, PartialEq)]
pub struct DragTransform {
    pub dx: f32,
    pub dy: f32,
    pub sx: f32,
    pub sy: f32,
}

impl DragTransform {
    pub const IDENTITY: Self = Self {
        dx: 0.0,
        dy: 0.0,
        sx: 1.0,
        sy: 1.0,
    };

    pub fn translation(dx: f32, dy: f32) -> Self {
        Self {
            dx,
            dy,
            ..Self::IDENTITY
        }
    }

    pub fn is_identity(&self) -> bool {
        *self == Self::IDENTITY
    }
}

impl Default for DragTransform {
    fn default() -> Self {
        Self::IDENTITY
    }
}

/// One drawn shape linked to a defect.
///
/// Persisted annotations carry server ids. Drafts that only exist in the
/// editing form use negative ids (`-1`, `-2`, ...) and have no `created_at`.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Annotation {
    pub id: i64,
    pub defect_id: i64,
    pub category_id: i64,
    pub geometry: AnnotationGeometry,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub color: Option<String>,
    #[serde(default)]
    pub created_at: Option<String>,
}

impl Annotation {
    pub fn is_draft(&self) -> bool {
        self.id < 0
    }
}

pub fn draft_id(index: usize) -> i64 {
    -(index as i64) - 1
}

/// Inverse of [`draft_id`]; `None` for persisted ids.
pub fn draft_index(id: i64) -> Option<usize> {
    if id < 0 {
        Some((-id - 1) as usize)
    } else {
        None
    }
}
