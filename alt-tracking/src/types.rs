//! Value types exchanged with the tracking network

use std::fmt;

/// Transport-level node identifier.
///
/// Nodes are addressable endpoints on the device network. A physical
/// tracker usually exposes its tracking node as a child of a device node
/// that carries the hardware serial number.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct NodeHandle(pub u32);

impl NodeHandle {
    /// Reserved handle that never refers to a live node
    pub const INVALID: NodeHandle = NodeHandle(0);

    pub fn new(raw: u32) -> Self {
        Self(raw)
    }

    pub fn as_u32(&self) -> u32 {
        self.0
    }

    pub fn is_valid(&self) -> bool {
        *self != Self::INVALID
    }
}

impl fmt::Display for NodeHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "node-{}", self.0)
    }
}

/// Generation counter of the visible node set.
///
/// Incremented by the network whenever a node appears or disappears.
pub type UpdateId = u32;

/// 3-component vector in meters (positions) or meters/second (velocities)
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct Vector3 {
    pub x: f32,
    pub y: f32,
    pub z: f32,
}

impl Vector3 {
    pub const ZERO: Vector3 = Vector3 {
        x: 0.0,
        y: 0.0,
        z: 0.0,
    };

    pub fn new(x: f32, y: f32, z: f32) -> Self {
        Self { x, y, z }
    }

    /// True only when every component is exactly zero
    pub fn is_zero(&self) -> bool {
        self.x == 0.0 && self.y == 0.0 && self.z == 0.0
    }
}

/// Orientation quaternion
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Quaternion {
    pub x: f32,
    pub y: f32,
    pub z: f32,
    pub w: f32,
}

impl Quaternion {
    pub const IDENTITY: Quaternion = Quaternion {
        x: 0.0,
        y: 0.0,
        z: 0.0,
        w: 1.0,
    };
}

impl Default for Quaternion {
    fn default() -> Self {
        Self::IDENTITY
    }
}

/// Position and rotation of a tracker
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct Pose {
    pub position: Vector3,
    pub rotation: Quaternion,
}

/// Stability stage reported by a tracking task
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum Stage {
    /// IMU is still warming up
    #[default]
    InertialDataInitialization,
    /// Orientation only
    Tracking3Dof,
    /// Full position and orientation lock
    Tracking6Dof,
    /// Position extrapolated without optical markers in view
    TrackingBlind6Dof,
}

impl Stage {
    /// True for the full 6-DoF lock, the only stage whose pose is trusted
    pub fn is_locked(&self) -> bool {
        matches!(self, Stage::Tracking6Dof)
    }
}

impl fmt::Display for Stage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Stage::InertialDataInitialization => "InertialDataInitialization",
            Stage::Tracking3Dof => "Tracking3Dof",
            Stage::Tracking6Dof => "Tracking6Dof",
            Stage::TrackingBlind6Dof => "TrackingBlind6Dof",
        };
        f.write_str(name)
    }
}

/// Tracking quality of a single state
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct Stability {
    pub stage: Stage,
    /// Stage-specific quality value in `[0, 1]`
    pub value: f32,
}

/// One pose estimate retrieved from a tracking task
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct TrackingState {
    pub pose: Pose,
    pub velocity: Vector3,
    pub local_angular_velocity: Vector3,
    pub stability: Stability,
}

impl TrackingState {
    /// Convenience constructor used by simulators and tests
    pub fn at(stage: Stage, position: Vector3) -> Self {
        Self {
            pose: Pose {
                position,
                rotation: Quaternion::IDENTITY,
            },
            stability: Stability { stage, value: 1.0 },
            ..Self::default()
        }
    }

    pub fn stage(&self) -> Stage {
        self.stability.stage
    }

    pub fn position(&self) -> Vector3 {
        self.pose.position
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_state_is_unlocked_and_zero() {
        let state = TrackingState::default();
        assert_eq!(state.stage(), Stage::InertialDataInitialization);
        assert!(state.position().is_zero());
        assert!(!state.stage().is_locked());
    }

    #[test]
    fn test_is_zero_requires_every_component() {
        assert!(Vector3::ZERO.is_zero());
        assert!(!Vector3::new(0.0, 0.0, 0.001).is_zero());
        assert!(!Vector3::new(-1.0, 0.0, 0.0).is_zero());
    }

    #[test]
    fn test_only_6dof_is_locked() {
        assert!(Stage::Tracking6Dof.is_locked());
        assert!(!Stage::TrackingBlind6Dof.is_locked());
        assert!(!Stage::Tracking3Dof.is_locked());
    }

    #[test]
    fn test_node_handle_validity() {
        assert!(!NodeHandle::INVALID.is_valid());
        assert!(NodeHandle::new(7).is_valid());
        assert_eq!(NodeHandle::new(7).to_string(), "node-7");
    }
}
