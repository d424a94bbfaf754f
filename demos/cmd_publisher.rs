// Differential-drive teleop: publish BaseCommand JSON for the runtime
//
// Hold W/S (or Up/Down) to drive, A/D (or Left/Right) to turn, Space to brake,
// +/- to change the top speed, Q to quit. Releasing a key lets the base coast
// back to zero through the same ramp it accelerates with, so the runtime sees
// a smooth profile instead of a step.

use crossterm::event::{self, Event, KeyCode, KeyEvent, KeyEventKind};
use crossterm::terminal::{disable_raw_mode, enable_raw_mode};
use rrc_drive_runtime::config::{DriveConfig, LOOP_HZ, TOPIC_CMD_BASE};
use rrc_drive_runtime::messages::BaseCommand;
use rrc_drive_runtime::motor::body_to_wheel_rps;
use std::time::{Duration, Instant};
use tracing::info;

const MAX_LINEAR: f32 = 0.5; // m/s
const MAX_ANGULAR: f32 = 2.5; // rad/s
const LINEAR_ACCEL: f32 = 0.6; // m/s^2
const ANGULAR_ACCEL: f32 = 4.0; // rad/s^2
const SPEED_STEP: f32 = 0.1; // fraction of max per +/- press
const HOLD_WINDOW: Duration = Duration::from_millis(120); // key-repeat gap tolerated

/// Which way the operator is pushing each axis (-1, 0, 1)
#[derive(Default)]
struct Intent {
    drive: f32,
    turn: f32,
    drive_seen: Option<Instant>,
    turn_seen: Option<Instant>,
}

impl Intent {
    /// Forget an axis whose key has not repeated recently
    fn expire(&mut self, now: Instant) {
        if self.drive_seen.is_some_and(|t| now - t > HOLD_WINDOW) {
            self.drive = 0.0;
            self.drive_seen = None;
        }
        if self.turn_seen.is_some_and(|t| now - t > HOLD_WINDOW) {
            self.turn = 0.0;
            self.turn_seen = None;
        }
    }
}

/// Move `current` toward `target` by at most `step`
fn ramp(current: f32, target: f32, step: f32) -> f32 {
    current + (target - current).clamp(-step, step)
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error + Send + Sync>> {
    tracing_subscriber::fmt().with_env_filter("info").init();

    let session = zenoh::open(zenoh::Config::default()).await?;
    let publisher = session.declare_publisher(TOPIC_CMD_BASE).await?;
    info!("Publishing on {}", TOPIC_CMD_BASE);
    info!("W/S drive, A/D turn, Space brake, +/- top speed, Q quit");

    enable_raw_mode()?;
    let result = teleop(&publisher).await;
    disable_raw_mode()?;

    result
}

async fn teleop(
    publisher: &zenoh::pubsub::Publisher<'_>,
) -> Result<(), Box<dyn std::error::Error + Send + Sync>> {
    let drive = DriveConfig::default();
    let period = Duration::from_millis(1000 / LOOP_HZ);
    let dt = period.as_secs_f32();

    let mut scale: f32 = 0.4;
    let mut intent = Intent::default();
    let mut cmd = BaseCommand {
        linear_vel: 0.0,
        angular_vel: 0.0,
    };
    let mut last_report = Instant::now();

    loop {
        let now = Instant::now();
        if event::poll(period)? {
            if let Event::Key(KeyEvent { code, kind, .. }) = event::read()? {
                if kind != KeyEventKind::Release {
                    match code {
                        KeyCode::Char('w') | KeyCode::Up => {
                            intent.drive = 1.0;
                            intent.drive_seen = Some(now);
                        }
                        KeyCode::Char('s') | KeyCode::Down => {
                            intent.drive = -1.0;
                            intent.drive_seen = Some(now);
                        }
                        KeyCode::Char('a') | KeyCode::Left => {
                            intent.turn = 1.0;
                            intent.turn_seen = Some(now);
                        }
                        KeyCode::Char('d') | KeyCode::Right => {
                            intent.turn = -1.0;
                            intent.turn_seen = Some(now);
                        }
                        KeyCode::Char(' ') => {
                            intent = Intent::default();
                            cmd.linear_vel = 0.0;
                            cmd.angular_vel = 0.0;
                        }
                        KeyCode::Char('+') | KeyCode::Char('=') => {
                            scale = (scale + SPEED_STEP).min(1.0);
                            info!("Top speed {:.2} m/s", scale * MAX_LINEAR);
                        }
                        KeyCode::Char('-') => {
                            scale = (scale - SPEED_STEP).max(SPEED_STEP);
                            info!("Top speed {:.2} m/s", scale * MAX_LINEAR);
                        }
                        KeyCode::Char('q') | KeyCode::Esc => break,
                        _ => {}
                    }
                }
            }
        }
        intent.expire(Instant::now());

        cmd.linear_vel = ramp(
            cmd.linear_vel,
            intent.drive * scale * MAX_LINEAR,
            LINEAR_ACCEL * dt,
        );
        cmd.angular_vel = ramp(
            cmd.angular_vel,
            intent.turn * scale * MAX_ANGULAR,
            ANGULAR_ACCEL * dt,
        );

        // Published every tick so the runtime watchdog stays fed
        publisher.put(serde_json::to_string(&cmd)?).await?;

        if last_report.elapsed() > Duration::from_millis(500)
            && (cmd.linear_vel != 0.0 || cmd.angular_vel != 0.0)
        {
            let wheels = body_to_wheel_rps(
                cmd.linear_vel,
                cmd.angular_vel,
                drive.track_width,
                drive.wheel_diameter,
            );
            info!(
                "v={:+.2} m/s w={:+.2} rad/s -> right {:+.2} rps, left {:+.2} rps",
                cmd.linear_vel, cmd.angular_vel, wheels.right, wheels.left
            );
            last_report = Instant::now();
        }
    }

    // Leave the base stopped rather than waiting for the watchdog
    cmd.linear_vel = 0.0;
    cmd.angular_vel = 0.0;
    publisher.put(serde_json::to_string(&cmd)?).await?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_ramp_limits_each_step() {
        assert_eq!(ramp(0.0, 0.5, 0.125), 0.125);
        assert_eq!(ramp(0.4375, 0.5, 0.125), 0.5);
        assert_eq!(ramp(0.25, 0.0, 0.125), 0.125);
        assert_eq!(ramp(-0.0625, 0.0, 0.125), 0.0);
    }

    #[test]
    fn test_released_key_expires() {
        let start = Instant::now();
        let mut intent = Intent {
            drive: 1.0,
            turn: -1.0,
            drive_seen: Some(start),
            turn_seen: Some(start + HOLD_WINDOW),
        };
        intent.expire(start + HOLD_WINDOW + Duration::from_millis(1));
        assert_eq!(intent.drive, 0.0);
        assert_eq!(intent.turn, -1.0, "turn key repeated recently");
    }
}
