use egui::{Color32, Painter, Pos2, Rect, Shape, Stroke, StrokeKind, Vec2};

use super::hit_testing::{ScreenShape, HANDLE_SIZE};
use crate::catalog::{parse_hex_color, DEFAULT_STROKE_HEX, SELECTED_STROKE_HEX};

const ARROW_POINTER_LENGTH: f32 = 10.0;
const ARROW_POINTER_WIDTH: f32 = 10.0;
const DASH: f32 = 5.0;
const CIRCLE_SEGMENTS: usize = 64;

pub fn selected_color() -> Color32 {
    parse_hex_color(SELECTED_STROKE_HEX).unwrap_or(Color32::from_rgb(59, 130, 246))
}

pub fn annotation_color(color: Option<&str>) -> Color32 {
    color
        .and_then(parse_hex_color)
        .or_else(|| parse_hex_color(DEFAULT_STROKE_HEX))
        .unwrap_or(Color32::from_rgb(239, 68, 68))
}

pub fn paint_shape(painter: &Painter, shape: &ScreenShape, stroke: Stroke) {
    match shape {
        ScreenShape::Circle { center, radius } => {
            painter.circle_stroke(*center, *radius, stroke);
        }
        ScreenShape::Rect(rect) => {
            painter.rect_stroke(*rect, 0.0, stroke, StrokeKind::Middle);
        }
        ScreenShape::Arrow { from, to } => {
            painter.line_segment([*from, *to], stroke);
            paint_arrowhead(painter, *from, *to, stroke.color);
        }
        ScreenShape::Polyline { points, closed } => {
            if points.len() < 2 {
                return;
            }
            if *closed {
                painter.add(Shape::closed_line(points.clone(), stroke));
            } else {
                painter.add(Shape::line(points.clone(), stroke));
            }
        }
    }
}

pub fn paint_preview(painter: &Painter, shape: &ScreenShape, stroke: Stroke) {
    let outline: Vec<Pos2> = match shape {
        ScreenShape::Circle { center, radius } => (0..=CIRCLE_SEGMENTS)
            .map(|i| {
                let angle = i as f32 / CIRCLE_SEGMENTS as f32 * std::f32::consts::TAU;
                *center + Vec2::angled(angle) * *radius
            })
            .collect(),
        ScreenShape::Rect(rect) => vec![
            rect.left_top(),
            rect.right_top(),
            rect.right_bottom(),
            rect.left_bottom(),
            rect.left_top(),
        ],
        ScreenShape::Arrow { from, to } => {
            paint_arrowhead(painter, *from, *to, stroke.color);
            vec![*from, *to]
        }
        ScreenShape::Polyline { points, closed } => {
            let mut points = points.clone();
            if *closed {
                if let Some(first) = points.first().copied() {
                    points.push(first);
                }
            }
            points
        }
    };
    if outline.len() < 2 {
        return;
    }
    painter.extend(Shape::dashed_line(&outline, stroke, DASH, DASH));
}

fn paint_arrowhead(painter: &Painter, from: Pos2, to: Pos2, color: Color32) {
    let along = to - from;
    if along.length_sq() < 1e-6 {
        return;
    }
    let dir = along.normalized();
    let perp = Vec2::new(-dir.y, dir.x);
    let base = to - dir * ARROW_POINTER_LENGTH;
    let half = ARROW_POINTER_WIDTH / 2.0;
    painter.add(Shape::convex_polygon(
        vec![to, base + perp * half, base - perp * half],
        color,
        Stroke::NONE,
    ));
}

pub fn paint_resize_handle(painter: &Painter, at: Pos2) {
    let rect = Rect::from_center_size(at, Vec2::splat(HANDLE_SIZE));
    painter.rect_filled(rect, 1.0, Color32::WHITE);
    painter.rect_stroke(rect, 1.0, Stroke::new(1.5, selected_color()), StrokeKind::Middle);
}
