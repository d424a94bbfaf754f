// Timeouts, topics, motor configuration
use serde::{Deserialize, Serialize};
use std::path::Path;
use std::time::Duration;

use crate::motor::kinematics::{TRACK_WIDTH, WHEEL_DIAMETER};
use crate::motor::rrc::{MOTOR_CHANNELS, Result, RrcError};

// Runtime loop frequency
pub const LOOP_HZ: u64 = 50;

// Command timeout for watchdog
pub const CMD_TIMEOUT: Duration = Duration::from_millis(250);

// Zenoh topics
pub const TOPIC_CMD_BASE: &str = "jetacker/cmd/base"; // commands
pub const TOPIC_RT_BASE: &str = "jetacker/rt/base"; // commanded wheel speeds
pub const TOPIC_HEALTH: &str = "jetacker/state/health"; // health status

// Serial port for the RRC controller board
pub const MOTOR_PORT: &str = "/dev/ttyACM0";

/// Wiring and tuning of one differential-drive base
///
/// Every field has a default matching the JetAcker hardware, so a JSON file
/// only needs the keys that differ.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct DriveConfig {
    /// Board motor port of the right wheel (1-4)
    pub right_channel: u8,
    /// Board motor port of the left wheel (1-4)
    pub left_channel: u8,
    pub right_inverted: bool,
    pub left_inverted: bool,

    /// Requests above this (rps) from idle get a wake pulse first
    pub activation_threshold: f32,
    /// Magnitude of the wake pulse (rps)
    pub wake_speed: f32,
    pub settle_delay_ms: u64,
    /// Both wheels at or below this (rps) count as stopped
    pub idle_epsilon: f32,

    pub warm_up_speed: f32,
    pub warm_up_pulse_ms: u64,
    pub warm_up_settle_ms: u64,

    /// Wait after opening the port before the first frame
    pub connect_settle_ms: u64,

    pub track_width: f32,
    pub wheel_diameter: f32,
}

impl Default for DriveConfig {
    fn default() -> Self {
        Self {
            right_channel: 2,
            left_channel: 4,
            right_inverted: false,
            left_inverted: true,
            activation_threshold: 0.1,
            wake_speed: 0.01,
            settle_delay_ms: 100,
            idle_epsilon: 0.001,
            warm_up_speed: 0.01,
            warm_up_pulse_ms: 300,
            warm_up_settle_ms: 200,
            connect_settle_ms: 500,
            track_width: TRACK_WIDTH,
            wheel_diameter: WHEEL_DIAMETER,
        }
    }
}

impl DriveConfig {
    /// Load from a JSON file and validate
    pub fn from_json_file(path: impl AsRef<Path>) -> Result<Self> {
        let text = std::fs::read_to_string(path)?;
        Self::from_json(&text)
    }

    pub fn from_json(text: &str) -> Result<Self> {
        let config: Self = serde_json::from_str(text)?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<()> {
        for id in [self.right_channel, self.left_channel] {
            if !MOTOR_CHANNELS.contains(&id) {
                return Err(RrcError::ChannelOutOfRange { id });
            }
        }
        if self.right_channel == self.left_channel {
            return Err(RrcError::InvalidConfig(format!(
                "both wheels wired to channel {}",
                self.right_channel
            )));
        }
        if !(self.track_width > 0.0 && self.wheel_diameter > 0.0) {
            return Err(RrcError::InvalidConfig(
                "track_width and wheel_diameter must be positive".to_string(),
            ));
        }
        if !(self.idle_epsilon >= 0.0 && self.activation_threshold >= self.idle_epsilon) {
            return Err(RrcError::InvalidConfig(
                "activation_threshold must be at least idle_epsilon".to_string(),
            ));
        }
        if !(self.wake_speed > 0.0 && self.wake_speed <= self.activation_threshold) {
            return Err(RrcError::InvalidConfig(format!(
                "wake_speed {} must be positive and at most activation_threshold {}",
                self.wake_speed, self.activation_threshold
            )));
        }
        if !(self.warm_up_speed > 0.0) {
            return Err(RrcError::InvalidConfig(format!(
                "warm_up_speed {} must be positive",
                self.warm_up_speed
            )));
        }
        Ok(())
    }

    pub fn settle_delay(&self) -> Duration {
        Duration::from_millis(self.settle_delay_ms)
    }

    pub fn warm_up_pulse(&self) -> Duration {
        Duration::from_millis(self.warm_up_pulse_ms)
    }

    pub fn warm_up_settle(&self) -> Duration {
        Duration::from_millis(self.warm_up_settle_ms)
    }

    pub fn connect_settle(&self) -> Duration {
        Duration::from_millis(self.connect_settle_ms)
    }
}
