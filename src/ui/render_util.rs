use super::{Arc, DisplayFormat, DisplayImage, ImageBuffer, ImageFrame, RenderImage, Rgba};

/// Packs a display image into the BGRA texture GPUI draws.
pub(super) fn display_to_image(image: DisplayImage) -> Option<Arc<RenderImage>> {
    let DisplayImage {
        pixels,
        width,
        height,
        stride,
        format,
    } = image;

    let row_len = width as usize * 4;
    let mut bgra = if stride as usize == row_len {
        pixels
    } else {
        // Drop any row padding.
        pixels
            .chunks(stride as usize)
            .take(height as usize)
            .flat_map(|row| row.get(..row_len).unwrap_or(row).iter().copied())
            .collect()
    };

    // GPUI expects BGRA; convert in place to avoid the async asset pipeline and flicker.
    if format == DisplayFormat::Rgba32 {
        for px in bgra.chunks_exact_mut(4) {
            px.swap(0, 2);
        }
    }

    let buffer = ImageBuffer::<Rgba<u8>, Vec<u8>>::from_raw(width, height, bgra)?;
    let frame = ImageFrame::new(buffer);

    Some(Arc::new(RenderImage::new(vec![frame])))
}
