//! Thresholding: adaptive local binarization and Otsu on sampled patches.

use fidmark_core::{GrayImage, GrayImageView};

/// Binarize under uneven illumination: a pixel becomes foreground (255)
/// when it is darker than the mean of its `window x window` neighborhood
/// by more than `offset`. Marker borders are black, so foreground here
/// means "candidate marker ink".
///
/// The neighborhood mean comes from an integral image, so the cost is
/// independent of the window size. Even window sizes are rounded up to the
/// next odd value; the window is clamped at the frame edges.
pub fn adaptive_threshold(src: &GrayImageView<'_>, window: usize, offset: i32) -> GrayImage {
    let w = src.width;
    let h = src.height;
    let window = window | 1;
    let r = (window / 2) as i32;

    // integral[y][x] = sum of src[0..y][0..x], dimensions (h+1) x (w+1)
    let iw = w + 1;
    let mut integral = vec![0u64; iw * (h + 1)];
    for y in 0..h {
        let mut row_sum = 0u64;
        for x in 0..w {
            row_sum += src.data[y * w + x] as u64;
            integral[(y + 1) * iw + (x + 1)] = integral[y * iw + (x + 1)] + row_sum;
        }
    }

    let mut out = vec![0u8; w * h];
    for y in 0..h {
        let y0 = (y as i32 - r).max(0) as usize;
        let y1 = ((y as i32 + r + 1) as usize).min(h);
        for x in 0..w {
            let x0 = (x as i32 - r).max(0) as usize;
            let x1 = ((x as i32 + r + 1) as usize).min(w);

            let area = ((y1 - y0) * (x1 - x0)) as u64;
            let sum = integral[y1 * iw + x1] + integral[y0 * iw + x0]
                - integral[y1 * iw + x0]
                - integral[y0 * iw + x1];
            let mean = (sum / area) as i32;

            let v = src.data[y * w + x] as i32;
            out[y * w + x] = if v < mean - offset { 255 } else { 0 };
        }
    }

    GrayImage {
        width: w,
        height: h,
        data: out,
    }
}

/// Otsu threshold over a small set of sampled intensities.
pub fn otsu_threshold_from_samples(samples: &[u8]) -> u8 {
    if samples.is_empty() {
        return 127;
    }

    let mut min_v = 255u8;
    let mut max_v = 0u8;
    for &v in samples {
        min_v = min_v.min(v);
        max_v = max_v.max(v);
    }
    if min_v == max_v {
        return min_v;
    }

    let mut hist = [0u32; 256];
    for &v in samples {
        hist[v as usize] += 1;
    }
    let nonzero_bins = hist.iter().filter(|&&h| h > 0).count();
    if nonzero_bins <= 2 {
        return ((min_v as u16 + max_v as u16) / 2) as u8;
    }

    let total = samples.len() as f64;
    let mut sum_total = 0f64;
    for (i, &h) in hist.iter().enumerate() {
        sum_total += (i as f64) * (h as f64);
    }

    let mut sum_b = 0f64;
    let mut w_b = 0f64;
    let mut best_var = -1f64;
    let mut best_t = 127u8;

    for (t, &h) in hist.iter().enumerate() {
        w_b += h as f64;
        if w_b < 1.0 {
            continue;
        }
        let w_f = total - w_b;
        if w_f < 1.0 {
            break;
        }

        sum_b += (t as f64) * (h as f64);
        let m_b = sum_b / w_b;
        let m_f = (sum_total - sum_b) / w_f;

        let var_between = w_b * w_f * (m_b - m_f) * (m_b - m_f);
        if var_between > best_var {
            best_var = var_between;
            best_t = t as u8;
        }
    }

    best_t
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn dark_square_on_bright_field_becomes_foreground() {
        let w = 32;
        let h = 32;
        let mut data = vec![200u8; w * h];
        for y in 10..22 {
            for x in 10..22 {
                data[y * w + x] = 20;
            }
        }
        let img = GrayImage {
            width: w,
            height: h,
            data,
        };

        let bin = adaptive_threshold(&img.view(), 15, 7);
        assert_eq!(bin.data[16 * w + 10], 255, "square edge is foreground");
        assert_eq!(bin.data[2 * w + 2], 0, "far background stays off");
    }

    #[test]
    fn uniform_image_has_no_foreground() {
        let img = GrayImage {
            width: 16,
            height: 16,
            data: vec![128u8; 256],
        };
        let bin = adaptive_threshold(&img.view(), 7, 7);
        assert!(bin.data.iter().all(|&v| v == 0));
    }

    #[test]
    fn otsu_separates_bimodal_samples() {
        let mut samples = vec![10u8; 40];
        samples.extend(std::iter::repeat(240u8).take(40));
        samples.push(12);
        samples.push(238);
        samples.push(50);
        samples.push(200);
        let t = otsu_threshold_from_samples(&samples);
        assert!(t > 40 && t < 220, "threshold {t} should split the modes");
    }

    #[test]
    fn otsu_degenerate_inputs() {
        assert_eq!(otsu_threshold_from_samples(&[]), 127);
        assert_eq!(otsu_threshold_from_samples(&[42, 42, 42]), 42);
        assert_eq!(otsu_threshold_from_samples(&[10, 200]), 105);
    }
}
