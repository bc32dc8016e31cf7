//! Anchor to pixel placement.

use super::metrics::TextSize;

/// Top-left of a `text` box placed at normalized anchors inside `canvas`.
///
/// Anchors 0.0, 0.5 and 1.0 align the box to the left/centre/right (top/middle/
/// bottom) of the canvas. A box larger than the canvas is placed at 0.
pub fn place(canvas: (u32, u32), text: TextSize, h_anchor: f32, v_anchor: f32) -> (u32, u32) {
    (
        place_axis(canvas.0, text.width, h_anchor),
        place_axis(canvas.1, text.height, v_anchor),
    )
}

fn place_axis(canvas: u32, text: u32, anchor: f32) -> u32 {
    let free = canvas.saturating_sub(text);
    if free == 0 {
        return 0;
    }
    let anchor = if anchor.is_finite() { anchor } else { 0.0 };
    // f32::round rounds half away from zero
    let offset = (free as f32 * anchor).round();
    offset.clamp(0.0, free as f32) as u32
}

/// Axis-aligned extent of a `width` x `height` box rotated by `degrees`.
pub fn rotated_extent(width: u32, height: u32, degrees: f32) -> (u32, u32) {
    let theta = degrees.to_radians();
    let (sin, cos) = (theta.sin().abs(), theta.cos().abs());
    let (w, h) = (width as f32, height as f32);

    // Absorbs float noise such as cos(90deg) ~ 6e-17 before rounding up.
    const EPSILON: f32 = 1e-3;
    let rotated_w = (w * cos + h * sin - EPSILON).ceil().max(0.0) as u32;
    let rotated_h = (w * sin + h * cos - EPSILON).ceil().max(0.0) as u32;
    (rotated_w, rotated_h)
}

/// Top-left of a `size` box centred on `center`, pulled inside `canvas`.
///
/// Never negative: a box larger than the canvas sits at 0.
pub fn clamp_origin(center: (f32, f32), size: (u32, u32), canvas: (u32, u32)) -> (u32, u32) {
    let axis = |center: f32, size: u32, canvas: u32| -> u32 {
        let origin = (center - size as f32 / 2.0).round();
        let max = canvas.saturating_sub(size) as f32;
        origin.min(max).max(0.0) as u32
    };
    (
        axis(center.0, size.0, canvas.0),
        axis(center.1, size.1, canvas.1),
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_place_nine_anchor_grid() {
        let canvas = (1000, 800);
        let text = TextSize::new(200, 100);
        let expected_x = [(0.0, 0), (0.5, 400), (1.0, 800)];
        let expected_y = [(0.0, 0), (0.5, 350), (1.0, 700)];

        for (h, x) in expected_x {
            for (v, y) in expected_y {
                assert_eq!(place(canvas, text, h, v), (x, y), "anchors ({}, {})", h, v);
            }
        }
    }

    #[test]
    fn test_place_rounds_half_away_from_zero() {
        assert_eq!(place((1000, 800), TextSize::new(115, 40), 0.5, 0.5), (443, 380));
    }

    #[test]
    fn test_place_text_larger_than_canvas() {
        let canvas = (100, 50);
        let text = TextSize::new(300, 80);
        for anchor in [0.0, 0.5, 1.0] {
            assert_eq!(place(canvas, text, anchor, anchor), (0, 0));
        }
    }

    #[test]
    fn test_place_clamps_out_of_range_anchor() {
        assert_eq!(place((500, 500), TextSize::new(100, 100), 1.5, -0.5), (400, 0));
    }

    #[test]
    fn test_rotated_extent_quarter_turn_swaps() {
        assert_eq!(rotated_extent(120, 40, 90.0), (40, 120));
        assert_eq!(rotated_extent(120, 40, -90.0), (40, 120));
        assert_eq!(rotated_extent(120, 40, 180.0), (120, 40));
        assert_eq!(rotated_extent(120, 40, 0.0), (120, 40));
    }

    #[test]
    fn test_rotated_extent_diagonal_grows() {
        let (w, h) = rotated_extent(100, 100, 45.0);
        assert_eq!((w, h), (142, 142));
    }

    #[test]
    fn test_clamp_origin_never_negative() {
        assert_eq!(clamp_origin((10.0, 10.0), (60, 60), (500, 500)), (0, 0));
        assert_eq!(clamp_origin((495.0, 250.0), (60, 60), (500, 500)), (440, 220));
        assert_eq!(clamp_origin((50.0, 50.0), (600, 600), (500, 500)), (0, 0));
    }
}
