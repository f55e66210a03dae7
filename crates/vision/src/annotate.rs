use crate::detection::{BlockClass, BoundingBox, Detection};
use image::{Rgb, RgbImage};
use imageproc::drawing::draw_hollow_rect_mut;
use imageproc::rect::Rect;

const BACK_COLOR: Rgb<u8> = Rgb([230, 40, 40]);
const FRONT_COLOR: Rgb<u8> = Rgb([60, 220, 60]);
/// Fill opacity of the translucent box, matching the 0.7/0.3 blend the
/// operators are used to.
const FILL_ALPHA: f32 = 0.3;
const BORDER_PX: i32 = 2;

fn class_color(class: BlockClass) -> Rgb<u8> {
    match class {
        BlockClass::Back => BACK_COLOR,
        BlockClass::Front => FRONT_COLOR,
    }
}

fn clamp_box(bbox: &BoundingBox, width: u32, height: u32) -> (u32, u32, u32, u32) {
    let x1 = (bbox.x1.max(0.0) as u32).min(width.saturating_sub(1));
    let y1 = (bbox.y1.max(0.0) as u32).min(height.saturating_sub(1));
    let x2 = (bbox.x2.max(0.0) as u32).min(width.saturating_sub(1));
    let y2 = (bbox.y2.max(0.0) as u32).min(height.saturating_sub(1));
    (x1, y1, x2.max(x1), y2.max(y1))
}

fn blend_fill(frame: &mut RgbImage, bbox: &BoundingBox, color: Rgb<u8>) {
    let (x1, y1, x2, y2) = clamp_box(bbox, frame.width(), frame.height());
    for y in y1..=y2 {
        for x in x1..=x2 {
            let px = frame.get_pixel_mut(x, y);
            for c in 0..3 {
                let blended =
                    f32::from(px.0[c]) * (1.0 - FILL_ALPHA) + f32::from(color.0[c]) * FILL_ALPHA;
                px.0[c] = blended.round() as u8;
            }
        }
    }
}

/// Draw every detection onto a copy of the crop: translucent fill plus a
/// 2px border, red for back-facing blocks and green for pickable ones.
#[must_use]
pub fn annotate(frame: &RgbImage, detections: &[Detection]) -> RgbImage {
    let mut out = frame.clone();
    for det in detections {
        let color = class_color(det.class);
        blend_fill(&mut out, &det.bbox, color);

        let (x1, y1, x2, y2) = clamp_box(&det.bbox, out.width(), out.height());
        let w = x2 - x1 + 1;
        let h = y2 - y1 + 1;
        for i in 0..BORDER_PX {
            if w > 2 * i as u32 && h > 2 * i as u32 {
                let rect = Rect::at(x1 as i32 + i, y1 as i32 + i)
                    .of_size(w - 2 * i as u32, h - 2 * i as u32);
                draw_hollow_rect_mut(&mut out, rect, color);
            }
        }
    }
    out
}
