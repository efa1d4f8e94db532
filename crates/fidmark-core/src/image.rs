/// Borrowed single-channel image, row-major, `data.len() == width * height`.
#[derive(Clone, Copy, Debug)]
pub struct GrayImageView<'a> {
    pub width: usize,
    pub height: usize,
    pub data: &'a [u8],
}

/// Owned single-channel image.
#[derive(Clone, Debug)]
pub struct GrayImage {
    pub width: usize,
    pub height: usize,
    pub data: Vec<u8>,
}

impl GrayImage {
    /// Borrow the pixel buffer as a view.
    #[inline]
    pub fn view(&self) -> GrayImageView<'_> {
        GrayImageView {
            width: self.width,
            height: self.height,
            data: &self.data,
        }
    }
}

impl<'a> GrayImageView<'a> {
    /// Pixel value with zero fill outside the image.
    #[inline]
    pub fn get(&self, x: i32, y: i32) -> u8 {
        if x < 0 || y < 0 || x >= self.width as i32 || y >= self.height as i32 {
            return 0;
        }
        self.data[y as usize * self.width + x as usize]
    }
}

/// Bilinear sample at a sub-pixel position.
#[inline]
pub fn sample_bilinear(src: &GrayImageView<'_>, x: f32, y: f32) -> f32 {
    let x0 = x.floor() as i32;
    let y0 = y.floor() as i32;
    let fx = x - x0 as f32;
    let fy = y - y0 as f32;

    let p00 = src.get(x0, y0) as f32;
    let p10 = src.get(x0 + 1, y0) as f32;
    let p01 = src.get(x0, y0 + 1) as f32;
    let p11 = src.get(x0 + 1, y0 + 1) as f32;

    let a = p00 + fx * (p10 - p00);
    let b = p01 + fx * (p11 - p01);
    a + fy * (b - a)
}

#[inline]
pub fn sample_bilinear_u8(src: &GrayImageView<'_>, x: f32, y: f32) -> u8 {
    sample_bilinear(src, x, y).clamp(0.0, 255.0) as u8
}

/// Mean of the 3x3 neighborhood around the containing pixel.
///
/// Returns `None` when the neighborhood leaves the image, so callers can
/// treat samples near the frame edge as unreliable rather than zero-padded.
#[inline]
pub fn sample_mean_3x3(src: &GrayImageView<'_>, x: f32, y: f32) -> Option<u8> {
    let ix = x.floor() as i32;
    let iy = y.floor() as i32;
    if ix - 1 < 0 || iy - 1 < 0 || ix + 1 >= src.width as i32 || iy + 1 >= src.height as i32 {
        return None;
    }

    let mut sum = 0u32;
    for dy in -1..=1 {
        for dx in -1..=1 {
            sum += src.get(ix + dx, iy + dy) as u32;
        }
    }
    Some((sum / 9) as u8)
}

/// Intensity gradient `(gx, gy)` at a sub-pixel position, via central
/// differences of bilinear samples.
#[inline]
pub fn sample_gradient(src: &GrayImageView<'_>, x: f32, y: f32) -> (f32, f32) {
    let gx = (sample_bilinear(src, x + 1.0, y) - sample_bilinear(src, x - 1.0, y)) * 0.5;
    let gy = (sample_bilinear(src, x, y + 1.0) - sample_bilinear(src, x, y - 1.0)) * 0.5;
    (gx, gy)
}
