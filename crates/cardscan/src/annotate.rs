//! Quad overlays for visual inspection.
//!
//! Consumer convenience only; the recognition contract is the card list.

use nalgebra::Point2;

use cardscan_core::{RgbBuffer, RgbImageView};

use crate::detector::CardCandidate;

/// Outline colors cycled per card.
const PALETTE: [[u8; 3]; 4] = [
    [46, 204, 113],
    [241, 196, 15],
    [52, 152, 219],
    [231, 76, 60],
];

const LINE_THICKNESS: i32 = 2;

/// Copy the original image and outline each recognized card's quad.
pub fn annotate(original: &RgbImageView<'_>, cards: &[CardCandidate]) -> RgbBuffer {
    let mut out = RgbBuffer {
        width: original.width,
        height: original.height,
        data: original.data.to_vec(),
    };
    for (i, card) in cards.iter().enumerate() {
        let color = PALETTE[i % PALETTE.len()];
        let quad = &card.bounding_quad;
        for k in 0..4 {
            draw_segment(&mut out, quad[k], quad[(k + 1) % 4], color);
        }
    }
    out
}

fn draw_segment(img: &mut RgbBuffer, a: Point2<f32>, b: Point2<f32>, color: [u8; 3]) {
    let steps = (b - a).norm().ceil().max(1.0) as usize;
    for s in 0..=steps {
        let t = s as f32 / steps as f32;
        let x = (a.x + t * (b.x - a.x)).round() as i32;
        let y = (a.y + t * (b.y - a.y)).round() as i32;
        for dy in -LINE_THICKNESS / 2..=LINE_THICKNESS / 2 {
            for dx in -LINE_THICKNESS / 2..=LINE_THICKNESS / 2 {
                let (px, py) = (x + dx, y + dy);
                if px >= 0 && py >= 0 && (px as usize) < img.width && (py as usize) < img.height {
                    img.set_pixel(px as usize, py as usize, color);
                }
            }
        }
    }
}
