// High-level motor driver for the differential-drive base
//
// Combines kinematics and the RRC protocol, and keeps just enough state to
// know when the motors are cold. The board starts one wheel noticeably later
// than the other on the first command after idling; a tiny synchronized wake
// pulse sent to both wheels first makes the real command start them together.

use std::ops::{Deref, DerefMut};
use tracing::{debug, info, warn};

use super::kinematics::{WheelSpeeds, body_to_wheel_rps};
use super::rrc::{Result, RrcError, motor_command};
use super::transport::{Delay, SerialTransport, ThreadDelay, Transport};
use crate::config::DriveConfig;

/// Whether the motors have been commanded to move since they last stopped
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Phase {
    #[default]
    Idle,
    Driving,
}

/// Last command as sent on the wire (after inversion)
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct ActuatorState {
    pub last_right_rps: f32,
    pub last_left_rps: f32,
    pub phase: Phase,
}

impl ActuatorState {
    pub fn is_active(&self) -> bool {
        self.phase == Phase::Driving
    }
}

/// Stateful controller for a two-wheeled base on the RRC board
///
/// Not internally synchronized: callers serialize access.
pub struct MotorController<T: Transport, D: Delay = ThreadDelay> {
    transport: Option<T>,
    delay: D,
    config: DriveConfig,
    state: ActuatorState,
    warmed_up: bool,
}

impl<T: Transport> MotorController<T, ThreadDelay> {
    pub fn new(config: DriveConfig) -> Self {
        Self::with_delay(config, ThreadDelay)
    }
}

impl<T: Transport, D: Delay> MotorController<T, D> {
    /// Create with a custom delay source
    pub fn with_delay(config: DriveConfig, delay: D) -> Self {
        Self {
            transport: None,
            delay,
            config,
            state: ActuatorState::default(),
            warmed_up: false,
        }
    }

    /// Attach an opened transport
    ///
    /// A transport that is already attached is stopped and closed first. The
    /// new transport is only attached if that release succeeds and the
    /// configuration is valid.
    pub fn connect(&mut self, transport: T) -> Result<()> {
        self.config.validate()?;
        if self.is_connected() {
            warn!("Replacing a live motor connection");
            self.disconnect()?;
        }
        self.transport = Some(transport);
        self.state = ActuatorState::default();
        self.warmed_up = false;
        self.delay.sleep(self.config.connect_settle());
        Ok(())
    }

    pub fn is_connected(&self) -> bool {
        self.transport.is_some()
    }

    /// Stop the motors and close the transport
    ///
    /// The transport is closed even when the stop frame cannot be written;
    /// the stop error wins if both fail.
    pub fn disconnect(&mut self) -> Result<()> {
        let Some(mut transport) = self.transport.take() else {
            return Ok(());
        };

        let stopped = Self::write_frame(&mut transport, &self.config, 0.0, 0.0);
        self.state = ActuatorState::default();
        let closed = transport.close();

        info!("Motor controller disconnected");
        stopped.and(closed)
    }

    /// One-time synchronized forward/reverse pulse to overcome static friction
    ///
    /// Runs once per connection; later calls return immediately. Leaves the
    /// controller idle so the first real command still gets its wake pulse.
    pub fn warm_up(&mut self) -> Result<()> {
        if !self.is_connected() {
            return Err(RrcError::NotConnected);
        }
        if self.warmed_up {
            debug!("Motors already warmed up on this connection");
            return Ok(());
        }

        info!("Warming up motors...");
        let speed = self.config.warm_up_speed;
        let right = self.invert_right(speed);
        let left = self.invert_left(speed);

        // Forward pulse
        self.send(right, left)?;
        self.delay.sleep(self.config.warm_up_pulse());

        // Reverse pulse
        self.send(-right, -left)?;
        self.delay.sleep(self.config.warm_up_pulse());

        self.stop()?;
        self.delay.sleep(self.config.warm_up_settle());

        self.warmed_up = true;
        info!("Motors warmed up and ready");
        Ok(())
    }

    /// Set wheel speeds in rotations per second (positive = forward for both)
    pub fn set_wheel_speeds(&mut self, right_rps: f32, left_rps: f32) -> Result<()> {
        if !self.is_connected() {
            return Err(RrcError::NotConnected);
        }

        let right = self.invert_right(right_rps);
        let left = self.invert_left(left_rps);

        let threshold = self.config.activation_threshold;
        let crosses_threshold = right.abs() > threshold || left.abs() > threshold;

        if self.state.phase == Phase::Idle && crosses_threshold {
            self.wake(right, left)?;
        }

        debug!("Setting wheel speeds: right={}, left={}", right, left);
        self.send(right, left)?;

        let epsilon = self.config.idle_epsilon;
        let phase = match self.state.phase {
            Phase::Idle if crosses_threshold => Phase::Driving,
            Phase::Driving if right.abs() <= epsilon && left.abs() <= epsilon => Phase::Idle,
            phase => phase,
        };
        self.state = ActuatorState {
            last_right_rps: right,
            last_left_rps: left,
            phase,
        };
        Ok(())
    }

    /// Set wheel speeds from a [`WheelSpeeds`] pair
    pub fn set_wheels(&mut self, speeds: WheelSpeeds) -> Result<()> {
        self.set_wheel_speeds(speeds.right, speeds.left)
    }

    /// Send body velocity command using explicit geometry
    ///
    /// # Arguments
    /// * `linear` - Forward velocity in m/s (positive = forward)
    /// * `angular` - Rotational velocity in rad/s (positive = counter-clockwise)
    /// * `track_width` - Distance between the wheels in meters
    /// * `wheel_diameter` - Wheel diameter in meters
    pub fn set_velocity(
        &mut self,
        linear: f32,
        angular: f32,
        track_width: f32,
        wheel_diameter: f32,
    ) -> Result<()> {
        let wheels = body_to_wheel_rps(linear, angular, track_width, wheel_diameter);
        self.set_wheels(wheels)
    }

    /// Send body velocity command using the configured geometry
    pub fn drive(&mut self, linear: f32, angular: f32) -> Result<()> {
        let (track_width, wheel_diameter) = (self.config.track_width, self.config.wheel_diameter);
        self.set_velocity(linear, angular, track_width, wheel_diameter)
    }

    /// Stop both motors
    ///
    /// Always writes a zero frame, even when already idle, in case an earlier
    /// command was lost on the wire.
    pub fn stop(&mut self) -> Result<()> {
        debug!("Stopping all motors");
        self.send(0.0, 0.0)?;
        self.state = ActuatorState::default();
        Ok(())
    }

    /// Write an auxiliary frame (buzzer, LED, servo) built by the codec
    ///
    /// Motor frames should go through the speed methods so the state stays in sync.
    pub fn send_frame(&mut self, frame: &[u8]) -> Result<()> {
        let transport = self.transport.as_mut().ok_or(RrcError::NotConnected)?;
        transport.write(frame)
    }

    pub fn state(&self) -> ActuatorState {
        self.state
    }

    /// Last commanded speeds in the caller's sign convention
    pub fn commanded_speeds(&self) -> WheelSpeeds {
        WheelSpeeds::new(
            self.invert_right(self.state.last_right_rps),
            self.invert_left(self.state.last_left_rps),
        )
    }

    /// Tiny same-direction pulse to both wheels, then settle
    ///
    /// A wheel whose target is exactly zero gets zero while the other wakes.
    fn wake(&mut self, right: f32, left: f32) -> Result<()> {
        let wake_right = wake_component(right, self.config.wake_speed);
        let wake_left = wake_component(left, self.config.wake_speed);

        debug!(
            "Pre-activating motors: right={}, left={}",
            wake_right, wake_left
        );
        self.send(wake_right, wake_left)?;
        self.delay.sleep(self.config.settle_delay());
        Ok(())
    }

    /// Write one two-channel frame with wire-convention speeds
    fn send(&mut self, right: f32, left: f32) -> Result<()> {
        let transport = self.transport.as_mut().ok_or(RrcError::NotConnected)?;
        Self::write_frame(transport, &self.config, right, left)
    }

    fn write_frame(transport: &mut T, config: &DriveConfig, right: f32, left: f32) -> Result<()> {
        let frame = motor_command(&[(config.right_channel, right), (config.left_channel, left)])?;
        transport.write(&frame)
    }

    fn invert_right(&self, rps: f32) -> f32 {
        if self.config.right_inverted { -rps } else { rps }
    }

    fn invert_left(&self, rps: f32) -> f32 {
        if self.config.left_inverted { -rps } else { rps }
    }
}

fn wake_component(target: f32, wake_speed: f32) -> f32 {
    if target > 0.0 {
        wake_speed
    } else if target < 0.0 {
        -wake_speed
    } else {
        0.0
    }
}

/// Connected, warmed-up controller that stops and closes itself when dropped
pub struct DriveSession<T: Transport, D: Delay = ThreadDelay> {
    controller: MotorController<T, D>,
}

impl DriveSession<SerialTransport, ThreadDelay> {
    /// Open the serial port, connect and warm up
    pub fn open_serial(port: &str, baudrate: u32, config: DriveConfig) -> Result<Self> {
        config.validate()?;
        info!("Opening motor board on {}", port);
        let transport = SerialTransport::open_with_baudrate(port, baudrate)?;
        Self::open(MotorController::new(config), transport)
    }
}

impl<T: Transport, D: Delay> DriveSession<T, D> {
    /// Connect `controller` to `transport` and run the warm-up
    ///
    /// If the warm-up fails the motors are stopped and the transport closed
    /// before the error is returned.
    pub fn open(mut controller: MotorController<T, D>, transport: T) -> Result<Self> {
        controller.connect(transport)?;
        // Dropping the session on error stops and closes
        let mut session = Self { controller };
        session.controller.warm_up()?;
        Ok(session)
    }

    /// Stop and close, reporting failures
    pub fn close(mut self) -> Result<()> {
        self.controller.disconnect()
    }
}

impl<T: Transport, D: Delay> Deref for DriveSession<T, D> {
    type Target = MotorController<T, D>;

    fn deref(&self) -> &Self::Target {
        &self.controller
    }
}

impl<T: Transport, D: Delay> DerefMut for DriveSession<T, D> {
    fn deref_mut(&mut self) -> &mut Self::Target {
        &mut self.controller
    }
}

impl<T: Transport, D: Delay> Drop for DriveSession<T, D> {
    fn drop(&mut self) {
        // Stop motors however the session ends (safety measure)
        if let Err(e) = self.controller.disconnect() {
            warn!("Failed to stop motors on drop: {}", e);
        }
    }
}
