//! Kinect skeletons

use super::Dispatcher;
use crate::protocol::{ExtraData, RawEvent};
use crate::sink::{Joint, Skeleton};
use tracing::debug;

/// Joint order of a skeleton payload
pub const JOINT_NAMES: [&str; 29] = [
    "hip_center",
    "head",
    "neck",
    "torso",
    "waist",
    "left_collar",
    "left_shoulder",
    "left_elbow",
    "left_wrist",
    "left_hand",
    "left_fingertip",
    "right_collar",
    "right_shoulder",
    "right_elbow",
    "right_wrist",
    "right_hand",
    "right_fingertip",
    "left_hip",
    "left_knee",
    "left_ankle",
    "left_foot",
    "right_hip",
    "right_knee",
    "right_ankle",
    "right_foot",
    "spine",
    "shoulder_center",
    "left_thumb",
    "right_thumb",
];

/// Build a skeleton from a Vector3 payload or a flat float payload
///
/// Returns None for single-marker payloads (fewer than 29 joints).
pub fn skeleton_from_extra(source_id: u32, extra: &ExtraData) -> Option<Skeleton> {
    let positions: Vec<[f32; 3]> = match extra {
        ExtraData::Vectors3(v) if v.len() >= JOINT_NAMES.len() => v.clone(),
        ExtraData::Floats(f) if f.len() >= JOINT_NAMES.len() * 3 => {
            f.chunks_exact(3).map(|c| [c[0], c[1], c[2]]).collect()
        }
        _ => return None,
    };

    let joints = JOINT_NAMES
        .iter()
        .zip(positions)
        .map(|(name, position)| Joint {
            name: name.to_string(),
            position,
        })
        .collect();

    Some(Skeleton { source_id, joints })
}

impl Dispatcher {
    pub(super) fn handle_mocap(&mut self, source_id: u32, event: &RawEvent) -> bool {
        match skeleton_from_extra(source_id, &event.extra) {
            Some(skeleton) => {
                gesture_log!(self, "🧍 Skeleton {} ({} joints)", source_id, skeleton.joints.len());
                self.sink.kinect_input(source_id, skeleton);
            }
            None => {
                debug!(
                    "Mocap marker {} at ({:?}, {:?}, {:?})",
                    source_id, event.posx, event.posy, event.posz
                );
            }
        }
        true
    }
}
