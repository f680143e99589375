use std::path::{Path, PathBuf};

use image::{DynamicImage, Rgba, RgbaImage};
use tracing::info;

use crate::catalog::{parse_hex_color, DEFAULT_STROKE_HEX};
use crate::geometry::{point_to_pixel, Annotation, AnnotationGeometry, Point};

const CIRCLE_SEGMENTS: usize = 64;

pub fn default_file_name(photo_id: i64) -> String {
    format!("photo_{}_annotated.png", photo_id)
}

/// Stroke thickness at source resolution, about 2 px at the on-screen size.
fn thickness_for(width: u32) -> f32 {
    (width as f32 / 600.0).max(2.0)
}

fn rgba(color: Option<&str>) -> [u8; 4] {
    let c = color
        .and_then(parse_hex_color)
        .or_else(|| parse_hex_color(DEFAULT_STROKE_HEX))
        .unwrap_or(egui::Color32::RED);
    [c.r(), c.g(), c.b(), 255]
}

pub fn render_annotations(photo: &DynamicImage, annotations: &[Annotation]) -> RgbaImage {
    let mut img = photo.to_rgba8();
    let (w, h) = (img.width() as f32, img.height() as f32);
    let thickness = thickness_for(img.width());
    let px = |p: &Point| point_to_pixel(*p, w, h);

    for annotation in annotations {
        if !annotation.geometry.is_renderable() {
            continue;
        }
        let color = rgba(annotation.color.as_deref());
        match &annotation.geometry {
            AnnotationGeometry::Rect {
                x,
                y,
                width,
                height,
            } => {
                let (x0, y0) = px(&Point::new(*x, *y));
                let (x1, y1) = px(&Point::new(x + width, y + height));
                let corners = [(x0, y0), (x1, y0), (x1, y1), (x0, y1)];
                draw_polyline(&mut img, &corners, true, thickness, color);
            }
            AnnotationGeometry::Circle { center, radius } => {
                let (cx, cy) = px(center);
                let r = radius * w;
                let outline: Vec<(f32, f32)> = (0..CIRCLE_SEGMENTS)
                    .map(|i| {
                        let angle = i as f32 / CIRCLE_SEGMENTS as f32 * std::f32::consts::TAU;
                        (cx + r * angle.cos(), cy + r * angle.sin())
                    })
                    .collect();
                draw_polyline(&mut img, &outline, true, thickness, color);
            }
            AnnotationGeometry::Arrow { from, to } => {
                let start = px(from);
                let end = px(to);
                draw_line_on_image(&mut img, start, end, thickness, color);
                let (dx, dy) = (end.0 - start.0, end.1 - start.1);
                let len = (dx * dx + dy * dy).sqrt();
                if len > 0.0 {
                    let dir = (dx / len, dy / len);
                    let perp = (-dir.1, dir.0);
                    let head_len = (thickness * 4.0).max(10.0);
                    let p1 = (
                        end.0 - dir.0 * head_len + perp.0 * head_len * 0.5,
                        end.1 - dir.1 * head_len + perp.1 * head_len * 0.5,
                    );
                    let p2 = (
                        end.0 - dir.0 * head_len - perp.0 * head_len * 0.5,
                        end.1 - dir.1 * head_len - perp.1 * head_len * 0.5,
                    );
                    draw_polyline(&mut img, &[end, p1, p2], true, thickness, color);
                }
            }
            AnnotationGeometry::Polygon { points } => {
                let pts: Vec<_> = points.iter().map(px).collect();
                draw_polyline(&mut img, &pts, true, thickness, color);
            }
            AnnotationGeometry::Freehand { points } => {
                let pts: Vec<_> = points.iter().map(px).collect();
                draw_polyline(&mut img, &pts, false, thickness, color);
            }
        }
    }
    img
}

pub fn save(
    photo: &DynamicImage,
    annotations: &[Annotation],
    path: &Path,
) -> Result<(), image::ImageError> {
    render_annotations(photo, annotations).save(path)?;
    info!("Exported {} annotation(s) to {}", annotations.len(), path.display());
    Ok(())
}

/// Ask for a destination and save. `Ok(None)` when the dialog was cancelled.
pub fn save_with_dialog(
    photo: &DynamicImage,
    annotations: &[Annotation],
    photo_id: i64,
) -> Result<Option<PathBuf>, image::ImageError> {
    let Some(path) = rfd::FileDialog::new()
        .set_file_name(default_file_name(photo_id))
        .add_filter("PNG image", &["png"])
        .save_file()
    else {
        return Ok(None);
    };
    save(photo, annotations, &path)?;
    Ok(Some(path))
}

fn draw_polyline(
    img: &mut RgbaImage,
    points: &[(f32, f32)],
    closed: bool,
    thickness: f32,
    color: [u8; 4],
) {
    for pair in points.windows(2) {
        draw_line_on_image(img, pair[0], pair[1], thickness, color);
    }
    if closed && points.len() > 2 {
        if let (Some(last), Some(first)) = (points.last(), points.first()) {
            draw_line_on_image(img, *last, *first, thickness, color);
        }
    }
}

fn draw_line_on_image(
    img: &mut RgbaImage,
    (x0, y0): (f32, f32),
    (x1, y1): (f32, f32),
    thickness: f32,
    color: [u8; 4],
) {
    let radius = (thickness / 2.0).max(0.5) as i32;
    let steps = (x1 - x0).abs().max((y1 - y0).abs()).ceil().max(1.0) as i32;
    for i in 0..=steps {
        let t = i as f32 / steps as f32;
        let x = (x0 + (x1 - x0) * t).round() as i32;
        let y = (y0 + (y1 - y0) * t).round() as i32;
        stamp(img, x, y, radius, Rgba(color));
    }
}

/// Square brush clamped to the image bounds.
fn stamp(img: &mut RgbaImage, cx: i32, cy: i32, radius: i32, color: Rgba<u8>) {
    let max_x = img.width() as i32 - 1;
    let max_y = img.height() as i32 - 1;
    for y in (cy - radius).max(0)..=(cy + radius).min(max_y) {
        for x in (cx - radius).max(0)..=(cx + radius).min(max_x) {
            img.put_pixel(x as u32, y as u32, color);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn blank(w: u32, h: u32) -> DynamicImage {
        DynamicImage::ImageRgba8(RgbaImage::from_pixel(w, h, Rgba([0, 0, 0, 255])))
    }

    fn annotation(geometry: AnnotationGeometry, color: Option<&str>) -> Annotation {
        Annotation {
            id: 1,
            defect_id: 1,
            category_id: 1,
            geometry,
            color: color.map(str::to_string),
            created_at: None,
        }
    }

    #[test]
    fn test_rect_outline_is_burned_in() {
        let rect = AnnotationGeometry::Rect {
            x: 0.2,
            y: 0.2,
            width: 0.6,
            height: 0.6,
        };
        let out = render_annotations(&blank(100, 100), &[annotation(rect, Some("#22c55e"))]);
        assert_eq!(out.get_pixel(20, 50).0, [0x22, 0xc5, 0x5e, 255]);
        assert_eq!(out.get_pixel(50, 80).0, [0x22, 0xc5, 0x5e, 255]);
        // Interior untouched
        assert_eq!(out.get_pixel(50, 50).0, [0, 0, 0, 255]);
    }

    #[test]
    fn test_missing_color_uses_default_red() {
        let arrow = AnnotationGeometry::Arrow {
            from: Point::new(0.1, 0.5),
            to: Point::new(0.9, 0.5),
        };
        let out = render_annotations(&blank(200, 100), &[annotation(arrow, None)]);
        assert_eq!(out.get_pixel(100, 50).0, [0xef, 0x44, 0x44, 255]);
    }

    #[test]
    fn test_circle_radius_follows_width() {
        let circle = AnnotationGeometry::Circle {
            center: Point::new(0.5, 0.5),
            radius: 0.25,
        };
        let out = render_annotations(&blank(200, 100), &[annotation(circle, None)]);
        // 0.25 of 200 px wide lands 50 px right of center.
        assert_ne!(out.get_pixel(150, 50).0, [0, 0, 0, 255]);
        assert_eq!(out.get_pixel(100, 50).0, [0, 0, 0, 255]);
    }

    #[test]
    fn test_degenerate_shapes_are_skipped() {
        let freehand = AnnotationGeometry::Freehand {
            points: vec![Point::new(0.5, 0.5)],
        };
        let photo = blank(50, 50);
        let out = render_annotations(&photo, &[annotation(freehand, None)]);
        assert_eq!(out, photo.to_rgba8());
    }

    #[test]
    fn test_lines_are_clipped_to_the_image() {
        let mut img = RgbaImage::new(10, 10);
        draw_line_on_image(&mut img, (-20.0, -20.0), (30.0, 30.0), 4.0, [1, 2, 3, 255]);
        assert_eq!(img.get_pixel(5, 5).0, [1, 2, 3, 255]);
    }

    #[test]
    fn test_default_file_name() {
        assert_eq!(default_file_name(42), "photo_42_annotated.png");
    }
}
