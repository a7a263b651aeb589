use std::time::Instant;

/// Maximum number of bodies a skeleton frame carries.
pub const SKELETON_COUNT: usize = 6;

/// Number of low bits in a raw depth sample holding the player index.
pub const PLAYER_INDEX_BITMASK_WIDTH: u16 = 3;

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum StreamKind {
    Color,
    Depth,
    Skeleton,
}

impl StreamKind {
    pub fn label(&self) -> &'static str {
        match self {
            StreamKind::Color => "color",
            StreamKind::Depth => "depth",
            StreamKind::Skeleton => "skeleton",
        }
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ColorImageFormat {
    Bgr32,
    Rgb24,
    Bgr24,
    Gray8,
    Yuyv,
    Nv12,
}

impl ColorImageFormat {
    /// Byte length of one frame in this format, or `None` when the
    /// dimensions cannot be expressed (odd widths for packed YUV, overflow).
    pub fn frame_len(&self, width: u32, height: u32) -> Option<usize> {
        let pixels = (width as usize).checked_mul(height as usize)?;
        match self {
            ColorImageFormat::Bgr32 => pixels.checked_mul(4),
            ColorImageFormat::Rgb24 | ColorImageFormat::Bgr24 => pixels.checked_mul(3),
            ColorImageFormat::Gray8 => Some(pixels),
            ColorImageFormat::Yuyv => {
                if width % 2 != 0 {
                    return None;
                }
                pixels.checked_mul(2)
            }
            ColorImageFormat::Nv12 => {
                if width % 2 != 0 || height % 2 != 0 {
                    return None;
                }
                pixels.checked_add(pixels / 2)
            }
        }
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct Resolution {
    pub width: u32,
    pub height: u32,
}

impl Resolution {
    pub const VGA: Resolution = Resolution {
        width: 640,
        height: 480,
    };
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct ColorStreamFormat {
    pub pixel_format: ColorImageFormat,
    pub resolution: Resolution,
    pub fps: u32,
}

impl ColorStreamFormat {
    pub const RGB_640X480_FPS30: ColorStreamFormat = ColorStreamFormat {
        pixel_format: ColorImageFormat::Bgr32,
        resolution: Resolution::VGA,
        fps: 30,
    };
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct DepthStreamFormat {
    pub resolution: Resolution,
    pub fps: u32,
}

impl DepthStreamFormat {
    pub const RESOLUTION_640X480_FPS30: DepthStreamFormat = DepthStreamFormat {
        resolution: Resolution::VGA,
        fps: 30,
    };
}

/// Sentinel distances (millimetres) of a depth stream.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct DepthRange {
    pub unknown: Option<u16>,
    pub too_near: u16,
    pub too_far: u16,
}

impl Default for DepthRange {
    fn default() -> Self {
        Self {
            unknown: Some(0x1FFF),
            too_near: 0,
            too_far: 4095,
        }
    }
}

#[derive(Debug)]
pub struct ColorImageFrame {
    pub pixels: Vec<u8>,
    pub width: u32,
    pub height: u32,
    pub format: ColorImageFormat,
    pub frame_number: u64,
    #[allow(dead_code)]
    pub timestamp: Instant,
}

#[derive(Debug)]
pub struct DepthImageFrame {
    pub pixels: Vec<u16>,
    pub width: u32,
    pub height: u32,
    pub frame_number: u64,
    #[allow(dead_code)]
    pub timestamp: Instant,
}

#[derive(Clone, Debug)]
pub struct SkeletonFrame {
    pub skeletons: Vec<Skeleton>,
    pub frame_number: u64,
    #[allow(dead_code)]
    pub timestamp: Instant,
}

#[derive(Clone, Copy, Debug, Default, PartialEq)]
pub struct SkeletonPoint {
    pub x: f32,
    pub y: f32,
    pub z: f32,
}

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct ColorImagePoint {
    pub x: i32,
    pub y: i32,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum SkeletonTrackingState {
    NotTracked,
    PositionOnly,
    Tracked,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum JointTrackingState {
    NotTracked,
    Inferred,
    Tracked,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum JointType {
    HipCenter,
    Spine,
    ShoulderCenter,
    Head,
    ShoulderLeft,
    ElbowLeft,
    WristLeft,
    HandLeft,
    ShoulderRight,
    ElbowRight,
    WristRight,
    HandRight,
    HipLeft,
    KneeLeft,
    AnkleLeft,
    FootLeft,
    HipRight,
    KneeRight,
    AnkleRight,
    FootRight,
}

impl JointType {
    pub const ALL: [JointType; 20] = [
        JointType::HipCenter,
        JointType::Spine,
        JointType::ShoulderCenter,
        JointType::Head,
        JointType::ShoulderLeft,
        JointType::ElbowLeft,
        JointType::WristLeft,
        JointType::HandLeft,
        JointType::ShoulderRight,
        JointType::ElbowRight,
        JointType::WristRight,
        JointType::HandRight,
        JointType::HipLeft,
        JointType::KneeLeft,
        JointType::AnkleLeft,
        JointType::FootLeft,
        JointType::HipRight,
        JointType::KneeRight,
        JointType::AnkleRight,
        JointType::FootRight,
    ];

    pub fn index(&self) -> usize {
        *self as usize
    }
}

#[derive(Clone, Copy, Debug, PartialEq)]
pub struct Joint {
    pub joint_type: JointType,
    pub position: SkeletonPoint,
    pub tracking_state: JointTrackingState,
}

#[derive(Clone, Debug, PartialEq)]
pub struct Skeleton {
    #[allow(dead_code)]
    pub tracking_id: u32,
    pub tracking_state: SkeletonTrackingState,
    #[allow(dead_code)]
    pub position: SkeletonPoint,
    /// Indexed by [`JointType::index`].
    pub joints: Vec<Joint>,
}

impl Skeleton {
    pub fn untracked() -> Self {
        Self {
            tracking_id: 0,
            tracking_state: SkeletonTrackingState::NotTracked,
            position: SkeletonPoint::default(),
            joints: JointType::ALL
                .iter()
                .map(|&joint_type| Joint {
                    joint_type,
                    position: SkeletonPoint::default(),
                    tracking_state: JointTrackingState::NotTracked,
                })
                .collect(),
        }
    }

    pub fn joint(&self, joint_type: JointType) -> Option<&Joint> {
        self.joints
            .get(joint_type.index())
            .filter(|joint| joint.joint_type == joint_type)
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum DisplayFormat {
    Bgra32,
    Rgba32,
}

#[derive(Clone, Debug)]
pub struct DisplayImage {
    pub pixels: Vec<u8>,
    pub width: u32,
    pub height: u32,
    pub stride: u32,
    pub format: DisplayFormat,
}

impl DisplayImage {
    pub fn blank(width: u32, height: u32) -> Self {
        Self {
            pixels: [0u8, 0, 0, 255].repeat(width as usize * height as usize),
            width,
            height,
            stride: width * 4,
            format: DisplayFormat::Bgra32,
        }
    }
}

#[derive(Clone, Copy, Debug, PartialEq)]
pub struct JointMarker {
    #[allow(dead_code)]
    pub joint_type: JointType,
    pub center: (f32, f32),
    pub radius: i32,
    pub inferred: bool,
}

#[derive(Clone, Debug, Default, PartialEq)]
pub struct SkeletonOverlay {
    pub markers: Vec<JointMarker>,
    pub bones: Vec<((f32, f32), (f32, f32))>,
}

impl SkeletonOverlay {
    pub fn is_empty(&self) -> bool {
        self.markers.is_empty() && self.bones.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn frame_len_matches_packed_formats() {
        assert_eq!(ColorImageFormat::Bgr32.frame_len(640, 480), Some(640 * 480 * 4));
        assert_eq!(ColorImageFormat::Rgb24.frame_len(2, 2), Some(12));
        assert_eq!(ColorImageFormat::Gray8.frame_len(3, 3), Some(9));
        assert_eq!(ColorImageFormat::Yuyv.frame_len(4, 2), Some(16));
        assert_eq!(ColorImageFormat::Nv12.frame_len(4, 2), Some(12));
    }

    #[test]
    fn frame_len_rejects_odd_yuv_dimensions() {
        assert_eq!(ColorImageFormat::Yuyv.frame_len(3, 2), None);
        assert_eq!(ColorImageFormat::Nv12.frame_len(4, 3), None);
    }

    #[test]
    fn untracked_skeleton_has_all_joints_in_order() {
        let skeleton = Skeleton::untracked();
        assert_eq!(skeleton.joints.len(), JointType::ALL.len());
        let head = skeleton.joint(JointType::Head).map(|joint| joint.joint_type);
        assert_eq!(head, Some(JointType::Head));
    }
}
