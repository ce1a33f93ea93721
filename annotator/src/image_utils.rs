/// Image utilities for drawing detection overlays and preparing display rasters
use crate::config::OverlayStyle;
use crate::types::Detection;
use image::imageops::FilterType;
use image::{Rgb, RgbImage};

/// Draw a thick rectangle on an image
///
/// # Arguments
/// * `img` - The image to draw on
/// * `x` - X coordinate of top-left corner
/// * `y` - Y coordinate of top-left corner
/// * `width` - Width of the rectangle
/// * `height` - Height of the rectangle
/// * `color` - Color of the rectangle
/// * `thickness` - Thickness of the border (in pixels), grown outwards
pub fn draw_rect(
    img: &mut RgbImage,
    x: i32,
    y: i32,
    width: u32,
    height: u32,
    color: Rgb<u8>,
    thickness: i32,
) {
    use imageproc::drawing::draw_hollow_rect_mut;
    use imageproc::rect::Rect;

    if width == 0 || height == 0 {
        log::warn!(
            "Cannot draw rect with zero dimensions - width: {}, height: {}",
            width,
            height
        );
        return;
    }

    // Draw thick border by drawing multiple rectangles
    for offset in 0..thickness.max(1) {
        let grow = (offset as u32).saturating_mul(2);
        let expanded = Rect::at(x.saturating_sub(offset), y.saturating_sub(offset)).of_size(
            width.saturating_add(grow),
            height.saturating_add(grow),
        );
        draw_hollow_rect_mut(img, expanded, color);
    }
}

/// Bake a frame's detections onto a copy of the frame
pub fn draw_detections(frame: &RgbImage, detections: &[Detection], style: &OverlayStyle) -> RgbImage {
    let mut annotated = frame.clone();
    let color = Rgb(style.color);
    let (frame_w, frame_h) = frame.dimensions();
    // Anything further out than the border thickness is invisible anyway
    let margin = style.thickness.max(1) as f32;
    let clamp_x = |v: f32| v.clamp(-margin, frame_w as f32 + margin);
    let clamp_y = |v: f32| v.clamp(-margin, frame_h as f32 + margin);

    for det in detections {
        let (x1, x2) = (clamp_x(det.x1), clamp_x(det.x2));
        let (y1, y2) = (clamp_y(det.y1), clamp_y(det.y2));
        let x = x1.round() as i32;
        let y = y1.round() as i32;
        let width = ((x2 - x1).round() as u32).max(1);
        let height = ((y2 - y1).round() as u32).max(1);
        draw_rect(&mut annotated, x, y, width, height, color, style.thickness);
    }

    annotated
}

/// Scale a frame to the fixed display raster with nearest-neighbour sampling
pub fn resize_for_display(img: &RgbImage, display_size: (u32, u32)) -> RgbImage {
    let (width, height) = display_size;
    if img.dimensions() == display_size {
        return img.clone();
    }
    image::imageops::resize(img, width, height, FilterType::Nearest)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_draw_detections_outlines_box() {
        let frame = RgbImage::new(100, 100);
        let det = Detection::from_corners(0, (20.0, 30.0), (60.0, 70.0), 0.9).unwrap();
        let style = OverlayStyle {
            color: [255, 0, 0],
            thickness: 3,
        };

        let annotated = draw_detections(&frame, &[det], &style);

        // Edges and the outward thickness are painted, interior untouched
        assert_eq!(annotated.get_pixel(20, 30), &Rgb([255, 0, 0]));
        assert_eq!(annotated.get_pixel(40, 30), &Rgb([255, 0, 0]));
        assert_eq!(annotated.get_pixel(18, 50), &Rgb([255, 0, 0]));
        assert_eq!(annotated.get_pixel(40, 50), &Rgb([0, 0, 0]));
        // Source frame is never modified
        assert_eq!(frame.get_pixel(20, 30), &Rgb([0, 0, 0]));
    }

    #[test]
    fn test_boxes_past_the_edge_are_clipped() {
        let frame = RgbImage::new(32, 32);
        let det = Detection::from_corners(0, (-10.0, -10.0), (50.0, 50.0), 0.9).unwrap();
        let annotated = draw_detections(&frame, &[det], &OverlayStyle::default());
        assert_eq!(annotated.dimensions(), (32, 32));
    }

    #[test]
    fn test_oversized_boxes_are_clamped_to_frame() {
        let frame = RgbImage::new(32, 32);
        let huge = Detection::from_corners(0, (0.0, 0.0), (1e10, 20.0), 0.9).unwrap();
        let negative = Detection::from_corners(0, (-1e10, -1e10), (5.0, 5.0), 0.9).unwrap();
        let style = OverlayStyle::default();

        let annotated = draw_detections(&frame, &[huge, negative], &style);

        assert_eq!(annotated.dimensions(), (32, 32));
        // Top and left edges of the wide box are still drawn
        assert_eq!(annotated.get_pixel(10, 0), &Rgb(style.color));
        assert_eq!(annotated.get_pixel(0, 10), &Rgb(style.color));
        // Bottom-right corner of the box reaching in from far negative
        assert_eq!(annotated.get_pixel(5, 5), &Rgb(style.color));
    }

    #[test]
    fn test_resize_for_display_nearest() {
        let mut img = RgbImage::new(2, 1);
        img.put_pixel(0, 0, Rgb([10, 10, 10]));
        img.put_pixel(1, 0, Rgb([200, 200, 200]));

        let display = resize_for_display(&img, (4, 2));
        assert_eq!(display.dimensions(), (4, 2));
        // Nearest-neighbour never blends source pixels
        for pixel in display.pixels() {
            assert!(pixel == &Rgb([10, 10, 10]) || pixel == &Rgb([200, 200, 200]));
        }
        assert_eq!(display.get_pixel(0, 0), &Rgb([10, 10, 10]));
        assert_eq!(display.get_pixel(3, 1), &Rgb([200, 200, 200]));
    }
}
