use rayon::prelude::*;

use super::FrameError;
use crate::types::{
    DepthImageFrame, DepthRange, DisplayFormat, DisplayImage, PLAYER_INDEX_BITMASK_WIDTH,
    StreamKind,
};

const BGRA_BYTES_PER_PIXEL: usize = 4;

// BGR triples.
const UNKNOWN_COLOR: [u8; 3] = [0, 0, 255];
const TOO_NEAR_COLOR: [u8; 3] = [0, 255, 0];
const TOO_FAR_COLOR: [u8; 3] = [255, 0, 0];

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum DepthBand {
    Unknown,
    TooNear,
    TooFar,
    Valid,
}

/// Distance in millimetres with the player index bits shifted off.
pub fn depth_distance(raw: u16) -> u16 {
    raw >> PLAYER_INDEX_BITMASK_WIDTH
}

pub fn classify_depth(distance: u16, range: &DepthRange) -> DepthBand {
    if range.unknown == Some(distance) {
        DepthBand::Unknown
    } else if distance == range.too_near {
        DepthBand::TooNear
    } else if distance == range.too_far {
        DepthBand::TooFar
    } else {
        DepthBand::Valid
    }
}

pub fn map_depth_sample(raw: u16, range: &DepthRange) -> [u8; 3] {
    map_depth_distance(depth_distance(raw), range)
}

/// BGR color for one distance. Valid distances become a gray level in the
/// green and red channels; distances past `too_far` wrap around instead of
/// saturating.
pub fn map_depth_distance(distance: u16, range: &DepthRange) -> [u8; 3] {
    match classify_depth(distance, range) {
        DepthBand::Unknown => UNKNOWN_COLOR,
        DepthBand::TooNear => TOO_NEAR_COLOR,
        DepthBand::TooFar => TOO_FAR_COLOR,
        DepthBand::Valid => {
            let level = depth_level(distance, range.too_far);
            [0, level, level]
        }
    }
}

fn depth_level(distance: u16, too_far: u16) -> u8 {
    // 255 * u16::MAX fits in u32; a zero range yields black.
    (255 * u32::from(distance))
        .checked_div(u32::from(too_far))
        .unwrap_or(0) as u8
}

impl DepthImageFrame {
    /// Number of samples the declared dimensions call for.
    pub fn pixel_data_len(&self) -> usize {
        self.width as usize * self.height as usize
    }

    pub fn copy_pixel_data_to(&self, dst: &mut [u16]) -> Result<(), FrameError> {
        let expected = self.pixel_data_len();
        if self.pixels.len() != expected {
            return Err(FrameError::LengthMismatch {
                stream: StreamKind::Depth,
                width: self.width,
                height: self.height,
                expected,
                actual: self.pixels.len(),
            });
        }
        if dst.len() != expected {
            return Err(FrameError::LengthMismatch {
                stream: StreamKind::Depth,
                width: self.width,
                height: self.height,
                expected,
                actual: dst.len(),
            });
        }

        dst.copy_from_slice(&self.pixels);
        Ok(())
    }
}

/// Converts raw depth samples into a BGRA image, one pixel per sample.
pub fn colorize_depth(
    samples: &[u16],
    width: u32,
    height: u32,
    range: &DepthRange,
) -> Result<DisplayImage, FrameError> {
    let expected = width as usize * height as usize;
    if samples.len() != expected {
        return Err(FrameError::LengthMismatch {
            stream: StreamKind::Depth,
            width,
            height,
            expected,
            actual: samples.len(),
        });
    }

    let mut bgra = vec![0u8; expected * BGRA_BYTES_PER_PIXEL];
    bgra.par_chunks_mut(BGRA_BYTES_PER_PIXEL)
        .zip(samples.par_iter().copied())
        .for_each(|(dst, raw)| {
            let [b, g, r] = map_depth_sample(raw, range);
            dst.copy_from_slice(&[b, g, r, 255]);
        });

    Ok(DisplayImage {
        pixels: bgra,
        width,
        height,
        stride: width * BGRA_BYTES_PER_PIXEL as u32,
        format: DisplayFormat::Bgra32,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Instant;

    const KINECT: DepthRange = DepthRange {
        unknown: Some(0x1FFF),
        too_near: 0,
        too_far: 4095,
    };

    fn raw(distance: u16, player: u16) -> u16 {
        (distance << PLAYER_INDEX_BITMASK_WIDTH) | player
    }

    #[test]
    fn sentinels_map_to_band_colors() {
        assert_eq!(map_depth_distance(0x1FFF, &KINECT), [0, 0, 255]);
        assert_eq!(map_depth_distance(0, &KINECT), [0, 255, 0]);
        assert_eq!(map_depth_distance(4095, &KINECT), [255, 0, 0]);
    }

    #[test]
    fn player_index_bits_are_ignored() {
        for player in 0..8 {
            assert_eq!(map_depth_sample(raw(4095, player), &KINECT), [255, 0, 0]);
            assert_eq!(
                map_depth_sample(raw(2000, player), &KINECT),
                map_depth_distance(2000, &KINECT)
            );
        }
    }

    #[test]
    fn low_bits_only_sample_is_too_near() {
        let range = DepthRange {
            unknown: None,
            too_near: 0,
            too_far: 4000,
        };
        assert_eq!(map_depth_sample(0x0007, &range), [0, 255, 0]);
    }

    #[test]
    fn valid_distances_scale_to_gray() {
        let range = DepthRange {
            unknown: None,
            too_near: 0,
            too_far: 4000,
        };
        assert_eq!(map_depth_distance(2000, &range), [0, 127, 127]);
        assert_eq!(map_depth_distance(3999, &range), [0, 254, 254]);
        assert_eq!(map_depth_distance(1, &range), [0, 0, 0]);
    }

    #[test]
    fn distances_past_too_far_wrap_instead_of_clamping() {
        let range = DepthRange {
            unknown: None,
            too_near: 0,
            too_far: 4000,
        };
        // 255 * 8000 / 4000 = 510, truncated to 8 bits.
        assert_eq!(map_depth_distance(8000, &range), [0, 254, 254]);
        // 255 * 4016 / 4000 = 256 wraps to 0.
        assert_eq!(map_depth_distance(4016, &range), [0, 0, 0]);
    }

    #[test]
    fn unknown_takes_precedence_over_other_sentinels() {
        let range = DepthRange {
            unknown: Some(0),
            too_near: 0,
            too_far: 0,
        };
        assert_eq!(classify_depth(0, &range), DepthBand::Unknown);
    }

    #[test]
    fn mapper_is_total_over_u16() {
        let degenerate = DepthRange {
            unknown: None,
            too_near: 1,
            too_far: 0,
        };
        for value in 0..=u16::MAX {
            let [b, g, r] = map_depth_sample(value, &KINECT);
            assert!(b == 0 || (g == 0 && r == 0));
            let _ = map_depth_distance(value, &degenerate);
        }
        assert_eq!(map_depth_distance(500, &degenerate), [0, 0, 0]);
    }

    #[test]
    fn colorize_writes_bgra_in_raster_order() {
        let samples = [raw(0, 1), raw(4095, 0), raw(0x1FFF, 0), raw(2000, 2)];
        let image = colorize_depth(&samples, 2, 2, &KINECT).expect("valid frame");

        assert_eq!(image.format, DisplayFormat::Bgra32);
        assert_eq!(image.stride, 8);
        assert_eq!(&image.pixels[0..4], &[0, 255, 0, 255]);
        assert_eq!(&image.pixels[4..8], &[255, 0, 0, 255]);
        assert_eq!(&image.pixels[8..12], &[0, 0, 255, 255]);
        assert_eq!(&image.pixels[12..16], &[0, 124, 124, 255]);
    }

    #[test]
    fn short_depth_frame_is_rejected() {
        let frame = DepthImageFrame {
            pixels: vec![0; 5],
            width: 2,
            height: 3,
            frame_number: 0,
            timestamp: Instant::now(),
        };

        let err = colorize_depth(&frame.pixels, frame.width, frame.height, &KINECT).unwrap_err();
        assert!(matches!(
            err,
            FrameError::LengthMismatch {
                expected: 6,
                actual: 5,
                ..
            }
        ));

        let mut dst = vec![0u16; 6];
        assert!(frame.copy_pixel_data_to(&mut dst).is_err());
    }

    #[test]
    fn copy_checks_destination_length() {
        let frame = DepthImageFrame {
            pixels: vec![1, 2, 3, 4],
            width: 2,
            height: 2,
            frame_number: 0,
            timestamp: Instant::now(),
        };

        let mut short = vec![0u16; 3];
        assert!(frame.copy_pixel_data_to(&mut short).is_err());

        let mut dst = vec![0u16; 4];
        frame.copy_pixel_data_to(&mut dst).expect("copy");
        assert_eq!(dst, vec![1, 2, 3, 4]);
    }
}
