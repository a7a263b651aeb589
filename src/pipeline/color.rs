use rayon::prelude::*;
use yuv::{
    YuvBiPlanarImage, YuvConversionMode, YuvPackedImage, YuvRange, YuvStandardMatrix,
    yuv_nv12_to_rgba, yuyv422_to_rgba,
};

use super::FrameError;
use crate::types::{ColorImageFormat, ColorImageFrame, DisplayFormat, DisplayImage, StreamKind};

impl ColorImageFrame {
    /// Byte length the declared format and dimensions call for.
    pub fn pixel_data_len(&self) -> Result<usize, FrameError> {
        self.format
            .frame_len(self.width, self.height)
            .ok_or_else(|| FrameError::InvalidDimensions {
                stream: StreamKind::Color,
                width: self.width,
                height: self.height,
                detail: format!("{:?}", self.format),
            })
    }

    pub fn copy_pixel_data_to(&self, dst: &mut [u8]) -> Result<(), FrameError> {
        let expected = self.validate()?;
        if dst.len() != expected {
            return Err(self.length_mismatch(expected, dst.len()));
        }
        dst.copy_from_slice(&self.pixels);
        Ok(())
    }

    fn validate(&self) -> Result<usize, FrameError> {
        let expected = self.pixel_data_len()?;
        if self.pixels.len() != expected {
            return Err(self.length_mismatch(expected, self.pixels.len()));
        }
        Ok(expected)
    }

    fn length_mismatch(&self, expected: usize, actual: usize) -> FrameError {
        FrameError::LengthMismatch {
            stream: StreamKind::Color,
            width: self.width,
            height: self.height,
            expected,
            actual,
        }
    }
}

/// Converts a color frame into a displayable 32-bit image. BGR32 frames
/// stay in BGRA order; every other format is expanded to RGBA.
pub fn convert_color_frame(frame: &ColorImageFrame) -> Result<DisplayImage, FrameError> {
    frame.validate()?;

    let (width, height) = (frame.width, frame.height);
    let data = frame.pixels.as_slice();

    let (pixels, format) = match frame.format {
        ColorImageFormat::Bgr32 => (bgr32_to_bgra(frame)?, DisplayFormat::Bgra32),
        ColorImageFormat::Rgb24 => (rgb_like_to_rgba(data, false), DisplayFormat::Rgba32),
        ColorImageFormat::Bgr24 => (rgb_like_to_rgba(data, true), DisplayFormat::Rgba32),
        ColorImageFormat::Gray8 => (gray_to_rgba(data), DisplayFormat::Rgba32),
        ColorImageFormat::Yuyv => (yuyv_to_rgba(data, width, height)?, DisplayFormat::Rgba32),
        ColorImageFormat::Nv12 => (nv12_to_rgba(data, width, height)?, DisplayFormat::Rgba32),
    };

    Ok(DisplayImage {
        pixels,
        width,
        height,
        stride: width * 4,
        format,
    })
}

fn bgr32_to_bgra(frame: &ColorImageFrame) -> Result<Vec<u8>, FrameError> {
    let mut bgra = vec![0u8; frame.pixels.len()];
    frame.copy_pixel_data_to(&mut bgra)?;
    // The fourth byte of BGR32 is padding.
    bgra.par_chunks_mut(4).for_each(|px| px[3] = 255);
    Ok(bgra)
}

fn nv12_to_rgba(data: &[u8], width: u32, height: u32) -> Result<Vec<u8>, FrameError> {
    let y_plane_len = width as usize * height as usize;
    let uv_plane_len = y_plane_len / 2;

    let y_plane = &data[..y_plane_len];
    let uv_plane = &data[y_plane_len..y_plane_len + uv_plane_len];
    let mut rgba = vec![0u8; y_plane_len * 4];

    let image = YuvBiPlanarImage {
        y_plane,
        y_stride: width,
        uv_plane,
        uv_stride: width,
        width,
        height,
    };

    yuv_nv12_to_rgba(
        &image,
        &mut rgba,
        width * 4,
        YuvRange::Full,
        YuvStandardMatrix::Bt709,
        YuvConversionMode::Balanced,
    )
    .map_err(|err| FrameError::Conversion(format!("NV12→RGBA failed: {err:?}")))?;

    Ok(rgba)
}

fn yuyv_to_rgba(data: &[u8], width: u32, height: u32) -> Result<Vec<u8>, FrameError> {
    let mut rgba = vec![0u8; (width as usize * height as usize) * 4];
    let packed = YuvPackedImage {
        yuy: data,
        yuy_stride: width * 2,
        width,
        height,
    };

    yuyv422_to_rgba(
        &packed,
        &mut rgba,
        width * 4,
        YuvRange::Full,
        YuvStandardMatrix::Bt709,
    )
    .map_err(|err| FrameError::Conversion(format!("YUYV422→RGBA failed: {err:?}")))?;

    Ok(rgba)
}

fn rgb_like_to_rgba(data: &[u8], swap_rb: bool) -> Vec<u8> {
    let mut rgba = vec![0u8; data.len() / 3 * 4];
    rgba.par_chunks_mut(4)
        .zip(data.par_chunks_exact(3))
        .for_each(|(dst, src)| {
            if swap_rb {
                dst[0] = src[2];
                dst[1] = src[1];
                dst[2] = src[0];
            } else {
                dst[0] = src[0];
                dst[1] = src[1];
                dst[2] = src[2];
            }
            dst[3] = 255;
        });
    rgba
}

fn gray_to_rgba(data: &[u8]) -> Vec<u8> {
    let mut rgba = vec![0u8; data.len() * 4];
    rgba.par_chunks_mut(4)
        .zip(data.par_iter().copied())
        .for_each(|(dst, value)| {
            dst[0] = value;
            dst[1] = value;
            dst[2] = value;
            dst[3] = 255;
        });
    rgba
}
