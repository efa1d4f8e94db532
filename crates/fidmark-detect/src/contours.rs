//! Contour extraction on binarized frames (Suzuki border following).

use fidmark_core::GrayImageView;
use nalgebra::Point2;

/// One traced boundary.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Contour {
    /// Boundary pixels in trace order.
    pub points: Vec<Point2<i32>>,
    /// True when this boundary encloses a hole inside another region.
    pub hole: bool,
}

/// Offsets of the 8-connected neighborhood, counter-clockwise from east.
const NEIGHBORHOOD: [[i32; 2]; 8] = [
    [1, 0],
    [1, -1],
    [0, -1],
    [-1, -1],
    [-1, 0],
    [-1, 1],
    [0, 1],
    [1, 1],
];

/// Flat-index offsets for the neighborhood, duplicated so a sweep can run
/// past index 7 without modular arithmetic in the inner loop.
fn neighborhood_deltas(row_stride: i32) -> [i32; 16] {
    let mut deltas = [0i32; 16];
    for i in 0..8 {
        let d = NEIGHBORHOOD[i][0] + NEIGHBORHOOD[i][1] * row_stride;
        deltas[i] = d;
        deltas[i + 8] = d;
    }
    deltas
}

/// Copy the binary frame into an `i32` working buffer with a one-pixel zero
/// border, compressing pixels to 0/1. The border guarantees every trace
/// stays inside the buffer.
fn pad_binary(src: &GrayImageView<'_>, dst: &mut [i32]) {
    let w = src.width;
    let h = src.height;
    let pw = w + 2;

    for v in dst[..pw].iter_mut() {
        *v = 0;
    }
    for y in 0..h {
        let row = (y + 1) * pw;
        dst[row] = 0;
        for x in 0..w {
            dst[row + 1 + x] = i32::from(src.data[y * w + x] != 0);
        }
        dst[row + 1 + w] = 0;
    }
    for v in dst[(h + 1) * pw..].iter_mut() {
        *v = 0;
    }
}

/// Trace one border starting at `pos`, marking visited pixels with `nbd`.
fn trace_border(
    buf: &mut [i32],
    pos: usize,
    nbd: i32,
    mut point: Point2<i32>,
    hole: bool,
    deltas: &[i32; 16],
) -> Contour {
    let mut contour = Contour {
        points: Vec::new(),
        hole,
    };

    let mut s: usize = if hole { 0 } else { 4 };
    let mut s_end = s;
    let pos1;

    // Find the first nonzero neighbor sweeping clockwise.
    loop {
        s = s.wrapping_sub(1) & 7;
        let p = (pos as isize + deltas[s] as isize) as usize;
        if buf[p] != 0 {
            pos1 = p;
            break;
        }
        if s == s_end {
            // Isolated pixel.
            buf[pos] = -nbd;
            contour.points.push(point);
            return contour;
        }
    }

    let mut pos3 = pos;
    loop {
        s_end = s;

        // Sweep counter-clockwise to the next nonzero neighbor.
        let mut pos4;
        loop {
            s = (s + 1) & 15;
            pos4 = (pos3 as isize + deltas[s] as isize) as usize;
            if buf[pos4] != 0 {
                break;
            }
        }
        s &= 7;

        // Right-side-of-trace marking distinguishes outer borders from the
        // pixels shared with an already-traced hole border.
        if s > 0 && s - 1 < s_end {
            buf[pos3] = -nbd;
        } else if buf[pos3] == 1 {
            buf[pos3] = nbd;
        }

        contour.points.push(point);
        point.x += NEIGHBORHOOD[s][0];
        point.y += NEIGHBORHOOD[s][1];

        if pos4 == pos && pos3 == pos1 {
            break;
        }

        pos3 = pos4;
        s = (s + 4) & 7;
    }

    contour
}

/// Trace every region boundary in a binarized frame.
///
/// Boundaries are discovered in raster order of their starting pixel
/// (top-to-bottom, then left-to-right), so identical pixel data always
/// yields identical contour ordering.
pub fn find_contours(src: &GrayImageView<'_>) -> Vec<Contour> {
    let w = src.width;
    let h = src.height;
    if w == 0 || h == 0 {
        return Vec::new();
    }

    let pw = w + 2;
    let mut buf = vec![0i32; pw * (h + 2)];
    pad_binary(src, &mut buf);

    let deltas = neighborhood_deltas(pw as i32);
    let mut contours = Vec::new();
    let mut nbd = 1;

    let mut pos = pw + 1;
    for y in 0..h {
        for x in 0..w {
            let pix = buf[pos];
            if pix != 0 {
                let outer = pix == 1 && buf[pos - 1] == 0;
                let hole = !outer && pix >= 1 && buf[pos + 1] == 0;

                if outer || hole {
                    nbd += 1;
                    let start = Point2::new(x as i32, y as i32);
                    contours.push(trace_border(&mut buf, pos, nbd, start, hole, &deltas));
                }
            }
            pos += 1;
        }
        pos += 2;
    }

    contours
}

#[cfg(test)]
mod tests {
    use super::*;
    use fidmark_core::GrayImage;

    fn image_from_rows(rows: &[&[u8]]) -> GrayImage {
        let height = rows.len();
        let width = rows[0].len();
        let mut data = Vec::with_capacity(width * height);
        for row in rows {
            data.extend(row.iter().map(|&v| v * 255));
        }
        GrayImage {
            width,
            height,
            data,
        }
    }

    #[test]
    fn square_ring_yields_outer_and_hole_borders() {
        let img = image_from_rows(&[
            &[0, 0, 0, 0, 0],
            &[0, 1, 1, 1, 0],
            &[0, 1, 0, 1, 0],
            &[0, 1, 1, 1, 0],
            &[0, 0, 0, 0, 0],
        ]);

        let contours = find_contours(&img.view());
        assert_eq!(contours.len(), 2);
        assert!(!contours[0].hole);
        assert!(contours[1].hole);
    }

    #[test]
    fn discovery_order_is_raster_order() {
        let img = image_from_rows(&[
            &[0, 0, 0, 0, 0, 0, 0],
            &[0, 1, 0, 0, 0, 1, 0],
            &[0, 0, 0, 0, 0, 0, 0],
            &[0, 0, 0, 1, 0, 0, 0],
            &[0, 0, 0, 0, 0, 0, 0],
        ]);

        let contours = find_contours(&img.view());
        assert_eq!(contours.len(), 3);
        assert_eq!(contours[0].points[0], Point2::new(1, 1));
        assert_eq!(contours[1].points[0], Point2::new(5, 1));
        assert_eq!(contours[2].points[0], Point2::new(3, 3));
    }

    #[test]
    fn filled_block_boundary_touches_extremes() {
        let img = image_from_rows(&[
            &[0, 0, 0, 0, 0, 0],
            &[0, 1, 1, 1, 1, 0],
            &[0, 1, 1, 1, 1, 0],
            &[0, 1, 1, 1, 1, 0],
            &[0, 0, 0, 0, 0, 0],
        ]);

        let contours = find_contours(&img.view());
        assert_eq!(contours.len(), 1);
        let xs: Vec<i32> = contours[0].points.iter().map(|p| p.x).collect();
        let ys: Vec<i32> = contours[0].points.iter().map(|p| p.y).collect();
        assert_eq!(*xs.iter().min().unwrap(), 1);
        assert_eq!(*xs.iter().max().unwrap(), 4);
        assert_eq!(*ys.iter().min().unwrap(), 1);
        assert_eq!(*ys.iter().max().unwrap(), 3);
    }

    #[test]
    fn empty_frame_has_no_contours() {
        let img = GrayImage {
            width: 8,
            height: 8,
            data: vec![0u8; 64],
        };
        assert!(find_contours(&img.view()).is_empty());
    }
}
