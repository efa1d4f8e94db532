//! Helpers bridging `image::GrayImage` into the core view types.

use fidmark_core::GrayImageView;

use crate::DetectorSession;

/// Borrow an `image::GrayImage` as the lightweight core view type.
pub fn gray_view(img: &::image::GrayImage) -> GrayImageView<'_> {
    GrayImageView {
        width: img.width() as usize,
        height: img.height() as usize,
        data: img.as_raw(),
    }
}

/// Run detection on an `image::GrayImage`.
pub fn detect_in_image(session: &mut DetectorSession, img: &::image::GrayImage) -> bool {
    session.detect(&gray_view(img))
}
