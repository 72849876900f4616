//! Kinematic snapshots of a walker.
//!
//! A snapshot records everything needed to rebuild a physically equivalent
//! walker: body poses, the motor targets in force and the measured joint
//! speeds (from which limb angular velocities are recovered). It deliberately
//! does not record linear velocities; a rebuilt walker starts with its bodies
//! at rest translationally.

use crate::chromosome::Joint;
use crate::config::ShapeConfig;
use serde::{Deserialize, Serialize};

#[derive(Clone, Copy, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct Vec2 {
    pub x: f32,
    pub y: f32,
}

impl Vec2 {
    pub const fn new(x: f32, y: f32) -> Self {
        Self { x, y }
    }

    pub fn is_finite(&self) -> bool {
        self.x.is_finite() && self.y.is_finite()
    }
}

/// A body's world-space center and angle.
#[derive(Clone, Copy, Debug, Default, PartialEq)]
pub struct Pose {
    pub center: Vec2,
    pub angle: f32,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct AgentSnapshot {
    pub shape: ShapeConfig,
    pub head_center: Vec2,
    pub head_angle: f32,
    pub limb_centers: [Vec2; Joint::COUNT],
    pub limb_angles: [f32; Joint::COUNT],
    /// Motor target speeds set on each joint.
    pub motor_setpoints: [f32; Joint::COUNT],
    /// Measured angular speed of each joint's distal body relative to its
    /// proximal body.
    pub joint_speeds: [f32; Joint::COUNT],
    pub joint_angles: [f32; Joint::COUNT],
    /// Position of this snapshot in its lineage.
    pub index: usize,
}

/// Snapshot history of one walker and its ancestors, oldest first.
pub type Lineage = Vec<AgentSnapshot>;

impl AgentSnapshot {
    pub fn head_pose(&self) -> Pose {
        Pose {
            center: self.head_center,
            angle: self.head_angle,
        }
    }

    pub fn limb_pose(&self, joint: Joint) -> Pose {
        Pose {
            center: self.limb_centers[joint.index()],
            angle: self.limb_angles[joint.index()],
        }
    }

    pub fn is_finite(&self) -> bool {
        self.head_center.is_finite()
            && self.head_angle.is_finite()
            && self.limb_centers.iter().all(Vec2::is_finite)
            && [
                &self.limb_angles,
                &self.motor_setpoints,
                &self.joint_speeds,
                &self.joint_angles,
            ]
            .iter()
            .all(|values| values.iter().all(|v| v.is_finite()))
    }

    /// Field-wise absolute differences against `other`.
    pub fn diff(&self, other: &AgentSnapshot) -> SnapshotDiff {
        let abs = |a: f32, b: f32| (a - b).abs();
        let abs4 = |a: &[f32; Joint::COUNT], b: &[f32; Joint::COUNT]| {
            std::array::from_fn(|i| abs(a[i], b[i]))
        };
        SnapshotDiff {
            head_center: Vec2::new(
                abs(self.head_center.x, other.head_center.x),
                abs(self.head_center.y, other.head_center.y),
            ),
            head_angle: abs(self.head_angle, other.head_angle),
            limb_centers: std::array::from_fn(|i| {
                Vec2::new(
                    abs(self.limb_centers[i].x, other.limb_centers[i].x),
                    abs(self.limb_centers[i].y, other.limb_centers[i].y),
                )
            }),
            limb_angles: abs4(&self.limb_angles, &other.limb_angles),
            motor_setpoints: abs4(&self.motor_setpoints, &other.motor_setpoints),
            joint_speeds: abs4(&self.joint_speeds, &other.joint_speeds),
            joint_angles: abs4(&self.joint_angles, &other.joint_angles),
        }
    }
}

/// Absolute per-field differences between two snapshots.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct SnapshotDiff {
    pub head_center: Vec2,
    pub head_angle: f32,
    pub limb_centers: [Vec2; Joint::COUNT],
    pub limb_angles: [f32; Joint::COUNT],
    pub motor_setpoints: [f32; Joint::COUNT],
    pub joint_speeds: [f32; Joint::COUNT],
    pub joint_angles: [f32; Joint::COUNT],
}

impl SnapshotDiff {
    /// Largest coordinate or angle difference over the head and all limbs.
    pub fn max_pose_error(&self) -> f32 {
        let centers = std::iter::once(&self.head_center)
            .chain(self.limb_centers.iter())
            .flat_map(|c| [c.x, c.y]);
        let angles = std::iter::once(self.head_angle).chain(self.limb_angles);
        centers.chain(angles).fold(0.0, f32::max)
    }

    /// Largest difference over joint speeds, joint angles and motor setpoints.
    pub fn max_joint_error(&self) -> f32 {
        self.joint_speeds
            .iter()
            .chain(&self.joint_angles)
            .chain(&self.motor_setpoints)
            .copied()
            .fold(0.0, f32::max)
    }
}
