use crate::{
    sensor::CoordinateMapper,
    types::{
        ColorStreamFormat, DisplayFormat, DisplayImage, Joint, JointMarker, JointTrackingState,
        JointType, Skeleton, SkeletonOverlay, SkeletonTrackingState,
    },
};

pub const JOINT_MARKER_RADIUS: i32 = 5;
pub const BONE_THICKNESS: i32 = 3;

/// Bones of the 20-joint body.
pub const CONNECTIONS: &[(JointType, JointType)] = &[
    (JointType::HipCenter, JointType::Spine),
    (JointType::Spine, JointType::ShoulderCenter),
    (JointType::ShoulderCenter, JointType::Head),
    (JointType::ShoulderCenter, JointType::ShoulderLeft),
    (JointType::ShoulderLeft, JointType::ElbowLeft),
    (JointType::ElbowLeft, JointType::WristLeft),
    (JointType::WristLeft, JointType::HandLeft),
    (JointType::ShoulderCenter, JointType::ShoulderRight),
    (JointType::ShoulderRight, JointType::ElbowRight),
    (JointType::ElbowRight, JointType::WristRight),
    (JointType::WristRight, JointType::HandRight),
    (JointType::HipCenter, JointType::HipLeft),
    (JointType::HipLeft, JointType::KneeLeft),
    (JointType::KneeLeft, JointType::AnkleLeft),
    (JointType::AnkleLeft, JointType::FootLeft),
    (JointType::HipCenter, JointType::HipRight),
    (JointType::HipRight, JointType::KneeRight),
    (JointType::KneeRight, JointType::AnkleRight),
    (JointType::AnkleRight, JointType::FootRight),
];

// RGB
const MARKER_COLOR: [u8; 3] = [255, 0, 0];
const INFERRED_MARKER_COLOR: [u8; 3] = [250, 204, 21];
const BONE_COLOR: [u8; 3] = [96, 165, 250];

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct SkeletonOptions {
    pub marker_radius: i32,
    pub draw_bones: bool,
}

impl Default for SkeletonOptions {
    fn default() -> Self {
        Self {
            marker_radius: JOINT_MARKER_RADIUS,
            draw_bones: false,
        }
    }
}

/// Builds the overlay for one skeleton frame. Only tracked bodies count,
/// and within them every joint that is not `NotTracked`.
pub fn skeleton_overlay(
    skeletons: &[Skeleton],
    mapper: &dyn CoordinateMapper,
    color_format: ColorStreamFormat,
    options: &SkeletonOptions,
) -> SkeletonOverlay {
    let mut overlay = SkeletonOverlay::default();
    let project = |joint: &Joint| {
        let point = mapper.map_skeleton_point_to_color(joint.position, color_format);
        (point.x as f32, point.y as f32)
    };

    for skeleton in skeletons
        .iter()
        .filter(|s| s.tracking_state == SkeletonTrackingState::Tracked)
    {
        if options.draw_bones {
            for &(a, b) in CONNECTIONS {
                if let (Some(ja), Some(jb)) = (visible_joint(skeleton, a), visible_joint(skeleton, b))
                {
                    overlay.bones.push((project(ja), project(jb)));
                }
            }
        }

        for joint in skeleton
            .joints
            .iter()
            .filter(|j| j.tracking_state != JointTrackingState::NotTracked)
        {
            overlay.markers.push(JointMarker {
                joint_type: joint.joint_type,
                center: project(joint),
                radius: options.marker_radius,
                inferred: joint.tracking_state == JointTrackingState::Inferred,
            });
        }
    }

    overlay
}

fn visible_joint(skeleton: &Skeleton, joint_type: JointType) -> Option<&Joint> {
    skeleton
        .joint(joint_type)
        .filter(|j| j.tracking_state != JointTrackingState::NotTracked)
}

/// Draws the overlay on a copy of `base`.
pub fn compose_overlay(base: &DisplayImage, overlay: &SkeletonOverlay) -> DisplayImage {
    let mut image = base.clone();
    let (width, height, stride) = (image.width, image.height, image.stride);
    let format = image.format;
    let buffer = image.pixels.as_mut_slice();

    for &(from, to) in &overlay.bones {
        draw_line(
            buffer,
            width,
            height,
            stride,
            &from,
            &to,
            pixel(BONE_COLOR, format),
            BONE_THICKNESS,
        );
    }

    for marker in &overlay.markers {
        let color = if marker.inferred {
            INFERRED_MARKER_COLOR
        } else {
            MARKER_COLOR
        };
        draw_circle(
            buffer,
            width,
            height,
            stride,
            (marker.center.0 as i32, marker.center.1 as i32),
            marker.radius,
            pixel(color, format),
        );
    }

    image
}

fn pixel([r, g, b]: [u8; 3], format: DisplayFormat) -> [u8; 4] {
    match format {
        DisplayFormat::Bgra32 => [b, g, r, 255],
        DisplayFormat::Rgba32 => [r, g, b, 255],
    }
}

#[allow(clippy::too_many_arguments)]
fn draw_line(
    buffer: &mut [u8],
    width: u32,
    height: u32,
    stride: u32,
    p0: &(f32, f32),
    p1: &(f32, f32),
    color: [u8; 4],
    thickness: i32,
) {
    let (mut x0, mut y0) = (p0.0 as i32, p0.1 as i32);
    let (x1, y1) = (p1.0 as i32, p1.1 as i32);
    let dx = (x1 - x0).abs();
    let sx = if x0 < x1 { 1 } else { -1 };
    let dy = -(y1 - y0).abs();
    let sy = if y0 < y1 { 1 } else { -1 };
    let mut err = dx + dy;
    let radius = (thickness.max(1) - 1) / 2;

    loop {
        put_pixel_safe(buffer, width, height, stride, x0, y0, color);
        if radius > 0 {
            for ox in -radius..=radius {
                for oy in -radius..=radius {
                    if (ox != 0 || oy != 0) && ox.abs() + oy.abs() <= radius {
                        put_pixel_safe(buffer, width, height, stride, x0 + ox, y0 + oy, color);
                    }
                }
            }
        }
        if x0 == x1 && y0 == y1 {
            break;
        }
        let e2 = 2 * err;
        if e2 >= dy {
            err += dy;
            x0 += sx;
        }
        if e2 <= dx {
            err += dx;
            y0 += sy;
        }
    }
}

fn draw_circle(
    buffer: &mut [u8],
    width: u32,
    height: u32,
    stride: u32,
    center: (i32, i32),
    radius: i32,
    color: [u8; 4],
) {
    let (cx, cy) = center;
    for dy in -radius..=radius {
        for dx in -radius..=radius {
            if dx * dx + dy * dy <= radius * radius {
                put_pixel_safe(
                    buffer,
                    width,
                    height,
                    stride,
                    cx.saturating_add(dx),
                    cy.saturating_add(dy),
                    color,
                );
            }
        }
    }
}

fn put_pixel_safe(
    buffer: &mut [u8],
    width: u32,
    height: u32,
    stride: u32,
    x: i32,
    y: i32,
    color: [u8; 4],
) {
    if x < 0 || y < 0 {
        return;
    }
    let (ux, uy) = (x as u32, y as u32);
    if ux >= width || uy >= height {
        return;
    }
    let idx = uy as usize * stride as usize + ux as usize * 4;
    if idx + 3 < buffer.len() {
        buffer[idx..idx + 4].copy_from_slice(&color);
    }
}
