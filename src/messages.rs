// Define message types for the runtime

use serde::{Deserialize, Serialize};

use crate::motor::WheelSpeeds;

// Command from teleop/scripts -> runtime
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BaseCommand {
    pub linear_vel: f32,  // m/s
    pub angular_vel: f32, // rad/s, counter-clockwise
}

// Actuation output from runtime -> telemetry
// Default is a stopped base, used whenever the watchdog has no fresh command
#[derive(Debug, Clone, Copy, Serialize, Deserialize, Default, PartialEq)]
pub struct BaseActuation {
    pub linear_vel: f32,
    pub angular_vel: f32,
}

impl BaseActuation {
    pub fn is_stop(&self) -> bool {
        self.linear_vel == 0.0 && self.angular_vel == 0.0
    }
}

impl From<&BaseCommand> for BaseActuation {
    fn from(cmd: &BaseCommand) -> Self {
        Self {
            linear_vel: cmd.linear_vel,
            angular_vel: cmd.angular_vel,
        }
    }
}

/// Wheel speeds actually sent to the board, published for logging
#[derive(Debug, Clone, Copy, Serialize, Deserialize, Default, PartialEq)]
pub struct WheelTelemetry {
    pub right_rps: f32,
    pub left_rps: f32,
    pub active: bool,
}

impl WheelTelemetry {
    pub fn new(speeds: WheelSpeeds, active: bool) -> Self {
        Self {
            right_rps: speeds.right,
            left_rps: speeds.left,
            active,
        }
    }
}

/// Health status published by runtime
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "snake_case")]
pub enum RuntimeHealth {
    Ok,
    CmdStale,
    MotorFault,
}
