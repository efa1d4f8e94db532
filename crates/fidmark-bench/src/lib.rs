//! Synthetic frame builders shared by the benchmarks.

use fidmark::core::GrayImage;
use fidmark::dict::Dictionary;

/// Rasterize a codeword as a bordered marker patch.
pub fn rasterize_marker(dict: &Dictionary, id: u32, cell_px: usize, border: usize) -> GrayImage {
    let bits = dict.marker_bits();
    let code = dict.code(id).expect("id within dictionary");
    let cells = bits + 2 * border;
    let side = cells * cell_px;
    let mut data = vec![255u8; side * side];

    for cy in 0..cells {
        for cx in 0..cells {
            let on_border =
                cx < border || cy < border || cx >= border + bits || cy >= border + bits;
            let is_black = if on_border {
                true
            } else {
                let idx = (cy - border) * bits + (cx - border);
                (code >> idx) & 1 == 1
            };
            if is_black {
                for y in 0..cell_px {
                    for x in 0..cell_px {
                        data[(cy * cell_px + y) * side + cx * cell_px + x] = 0;
                    }
                }
            }
        }
    }

    GrayImage {
        width: side,
        height: side,
        data,
    }
}

/// A 640x480 white frame with several markers scattered over it.
pub fn synthetic_frame(dict: &Dictionary, placements: &[(u32, usize, usize)]) -> GrayImage {
    let width = 640;
    let height = 480;
    let mut data = vec![255u8; width * height];

    for &(id, x0, y0) in placements {
        let patch = rasterize_marker(dict, id, 12, 1);
        for y in 0..patch.height {
            for x in 0..patch.width {
                data[(y0 + y) * width + x0 + x] = patch.data[y * patch.width + x];
            }
        }
    }

    GrayImage {
        width,
        height,
        data,
    }
}
