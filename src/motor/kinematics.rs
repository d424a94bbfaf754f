// Differential-drive kinematics for a two-wheeled base
// Converts body-frame velocities (linear, angular) to wheel rotation rates.

use std::f32::consts::PI;

/// Default geometry of the JetAcker base
pub const WHEEL_DIAMETER: f32 = 0.067; // meters
pub const TRACK_WIDTH: f32 = 0.133; // meters (distance between wheel contact points)

/// Wheel rotation rates in rotations per second (positive = forward)
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct WheelSpeeds {
    pub right: f32,
    pub left: f32,
}

impl WheelSpeeds {
    pub fn new(right: f32, left: f32) -> Self {
        Self { right, left }
    }

    pub fn zero() -> Self {
        Self::default()
    }
}

/// Convert linear speed (m/s) to wheel rotations per second
pub fn mps_to_rps(speed_mps: f32, wheel_diameter: f32) -> f32 {
    speed_mps / (PI * wheel_diameter)
}

/// Convert wheel rotations per second to linear speed (m/s)
pub fn rps_to_mps(rps: f32, wheel_diameter: f32) -> f32 {
    rps * PI * wheel_diameter
}

/// Convert body velocities to wheel rotation rates
///
/// # Arguments
/// * `linear` - Forward velocity in m/s (positive = forward)
/// * `angular` - Rotational velocity in rad/s (positive = counter-clockwise)
/// * `track_width` - Distance between the wheels in meters
/// * `wheel_diameter` - Wheel diameter in meters
pub fn body_to_wheel_rps(
    linear: f32,
    angular: f32,
    track_width: f32,
    wheel_diameter: f32,
) -> WheelSpeeds {
    let half_track = track_width / 2.0;
    let v_left = linear - angular * half_track;
    let v_right = linear + angular * half_track;

    WheelSpeeds {
        right: mps_to_rps(v_right, wheel_diameter),
        left: mps_to_rps(v_left, wheel_diameter),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_zero_velocity() {
        let wheels = body_to_wheel_rps(0.0, 0.0, TRACK_WIDTH, WHEEL_DIAMETER);
        assert_eq!(wheels, WheelSpeeds::zero());
    }

    #[test]
    fn test_straight_line() {
        let wheels = body_to_wheel_rps(0.2, 0.0, TRACK_WIDTH, WHEEL_DIAMETER);
        assert_eq!(wheels.left, wheels.right);
        // 0.2 / (pi * 0.067) ~= 0.950 rps
        assert!((wheels.right - 0.9502).abs() < 1e-3, "got {}", wheels.right);
    }

    #[test]
    fn test_rotation_only() {
        // Counter-clockwise spin: right wheel forward, left wheel backward
        let wheels = body_to_wheel_rps(0.0, 1.5, TRACK_WIDTH, WHEEL_DIAMETER);
        assert!(wheels.right > 0.0);
        assert_eq!(wheels.left, -wheels.right);
    }

    #[test]
    fn test_arc_turn() {
        let wheels = body_to_wheel_rps(0.1, 0.5, TRACK_WIDTH, WHEEL_DIAMETER);
        assert!(wheels.right > wheels.left);
        assert!(wheels.left > 0.0, "slow arc keeps both wheels forward");
    }

    #[test]
    fn test_unit_conversion_inverse() {
        let rps = mps_to_rps(0.35, WHEEL_DIAMETER);
        assert!((rps_to_mps(rps, WHEEL_DIAMETER) - 0.35).abs() < 1e-6);
    }
}
