// 50 Hz loop with watchdog
// Note: the watchdog stops the base if the teleop side goes quiet, so a crashed
// publisher never leaves the wheels turning at the last commanded speed.

use std::time::{Duration, Instant};
use tokio::time::interval;
use tracing::{error, info, warn};

use crate::config::{
    CMD_TIMEOUT, DriveConfig, LOOP_HZ, TOPIC_CMD_BASE, TOPIC_HEALTH, TOPIC_RT_BASE,
};
use crate::messages::{BaseActuation, BaseCommand, RuntimeHealth, WheelTelemetry};
use crate::motor::rrc::Result as MotorResult;
use crate::motor::{Delay, DriveSession, MotorController, Transport, body_to_wheel_rps};

/// How the runtime reaches the hardware
#[derive(Debug, Clone)]
pub struct RunOptions {
    pub port: String,
    pub baudrate: u32,
    pub drive: DriveConfig,
    /// Skip the serial board and only publish what would be commanded
    pub simulate: bool,
}

pub struct Runtime {
    latest_cmd: Option<BaseCommand>,
    cmd_received_at: Instant,
    health: RuntimeHealth,
}

impl Default for Runtime {
    fn default() -> Self {
        Self::new()
    }
}

impl Runtime {
    pub fn new() -> Self {
        Self {
            latest_cmd: None,
            cmd_received_at: Instant::now(),
            health: RuntimeHealth::CmdStale, // Start stale until first cmd
        }
    }

    /// Process incoming command
    fn on_command(&mut self, cmd: BaseCommand) {
        info!("Received command: {:?}", &cmd);
        self.latest_cmd = Some(cmd);
        self.cmd_received_at = Instant::now();
    }

    /// Compute actuation based on watchdog state
    fn compute_actuation(&mut self) -> BaseActuation {
        let cmd_age = self.cmd_received_at.elapsed();

        if cmd_age > CMD_TIMEOUT {
            // Watchdog triggered - stop the robot
            if self.health != RuntimeHealth::CmdStale {
                warn!("Command stale ({:?} old), stopping robot", cmd_age);
            }
            self.health = RuntimeHealth::CmdStale;
            BaseActuation::default()
        } else if let Some(ref cmd) = self.latest_cmd {
            self.health = RuntimeHealth::Ok;
            BaseActuation::from(cmd)
        } else {
            self.health = RuntimeHealth::CmdStale;
            BaseActuation::default()
        }
    }
}

/// Send one actuation to the motors and report what went on the wire
///
/// A zero actuation is sent as an explicit stop every tick.
fn apply_actuation<T: Transport, D: Delay>(
    motors: &mut MotorController<T, D>,
    actuation: &BaseActuation,
) -> MotorResult<WheelTelemetry> {
    if actuation.is_stop() {
        motors.stop()?;
    } else {
        motors.drive(actuation.linear_vel, actuation.angular_vel)?;
    }
    Ok(WheelTelemetry::new(
        motors.commanded_speeds(),
        motors.state().is_active(),
    ))
}

/// What the motors would receive, without touching hardware
fn simulate_actuation(drive: &DriveConfig, actuation: &BaseActuation) -> WheelTelemetry {
    let speeds = body_to_wheel_rps(
        actuation.linear_vel,
        actuation.angular_vel,
        drive.track_width,
        drive.wheel_diameter,
    );
    WheelTelemetry::new(speeds, !actuation.is_stop())
}

pub async fn run(options: RunOptions) -> Result<(), Box<dyn std::error::Error + Send + Sync>> {
    let mut motors = if options.simulate {
        info!("Simulation mode: motor board disabled");
        None
    } else {
        let port = options.port.clone();
        let baudrate = options.baudrate;
        let drive = options.drive.clone();
        // Warm-up blocks for about a second
        let session = tokio::task::spawn_blocking(move || {
            DriveSession::open_serial(&port, baudrate, drive)
        })
        .await??;
        Some(session)
    };

    info!("Opening Zenoh session...");
    let session = zenoh::open(zenoh::Config::default()).await?;

    info!("Setting up publishers and subscribers...");
    let subscriber = session.declare_subscriber(TOPIC_CMD_BASE).await?;
    let pub_actuation = session.declare_publisher(TOPIC_RT_BASE).await?;
    let pub_health = session.declare_publisher(TOPIC_HEALTH).await?;

    let mut runtime = Runtime::new();
    let mut tick = interval(Duration::from_millis(1000 / LOOP_HZ));

    info!(
        "Runtime started: {}Hz loop, {}ms watchdog timeout",
        LOOP_HZ,
        CMD_TIMEOUT.as_millis()
    );
    info!("Subscribed to: {}", TOPIC_CMD_BASE);
    info!("Publishing to: {}, {}", TOPIC_RT_BASE, TOPIC_HEALTH);

    loop {
        tokio::select! {
            _ = tick.tick() => {}
            _ = tokio::signal::ctrl_c() => {
                info!("Shutdown requested");
                break;
            }
        }

        // 1. Drain all pending commands (non-blocking), keep latest
        while let Ok(Some(sample)) = subscriber.try_recv() {
            let payload = sample.payload().to_bytes();
            match serde_json::from_slice::<BaseCommand>(&payload) {
                Ok(cmd) => runtime.on_command(cmd),
                Err(e) => warn!("Failed to parse command: {}", e),
            }
        }

        // 2. Compute actuation (includes watchdog logic)
        let actuation = runtime.compute_actuation();

        // 3. Drive the motors; a wake pulse blocks this thread briefly
        let applied = match motors.as_mut() {
            Some(motors) => tokio::task::block_in_place(|| apply_actuation(motors, &actuation)),
            None => Ok(simulate_actuation(&options.drive, &actuation)),
        };
        let telemetry = match applied {
            Ok(telemetry) => telemetry,
            Err(e) => {
                error!("Motor command failed: {}", e);
                if let Some(motors) = motors.take() {
                    if let Err(release_err) = release_motors(motors) {
                        warn!("Failed to stop motors after fault: {}", release_err);
                    }
                }
                runtime.health = RuntimeHealth::MotorFault;
                pub_health.put(serde_json::to_string(&runtime.health)?).await?;
                return Err(e.into());
            }
        };

        // 4. Publish commanded wheel speeds
        let telemetry_json = serde_json::to_string(&telemetry)?;
        pub_actuation.put(telemetry_json).await?;

        // 5. Publish health
        let health_json = serde_json::to_string(&runtime.health)?;
        pub_health.put(health_json).await?;
    }

    if let Some(motors) = motors {
        release_motors(motors)?;
    }
    Ok(())
}

/// Stop and close the board from async context
///
/// Must run on a multi-threaded runtime: the stop write blocks.
fn release_motors<T: Transport, D: Delay>(motors: DriveSession<T, D>) -> MotorResult<()> {
    tokio::task::block_in_place(|| motors.close())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::motor::transport::testing::{
        Event, EventLog, RecordingDelay, RecordingTransport, motor_speeds, writes,
    };
    use std::sync::{Arc, Mutex};

    fn motors() -> (MotorController<RecordingTransport, RecordingDelay>, EventLog) {
        let log: EventLog = Arc::new(Mutex::new(Vec::new()));
        let mut mc = MotorController::with_delay(
            DriveConfig::default(),
            RecordingDelay { log: log.clone() },
        );
        mc.connect(RecordingTransport::new(log.clone())).unwrap();
        (mc, log)
    }

    #[test]
    fn test_no_command_is_stale_stop() {
        let mut runtime = Runtime::new();
        assert!(runtime.compute_actuation().is_stop());
        assert_eq!(runtime.health, RuntimeHealth::CmdStale);
    }

    #[test]
    fn test_fresh_command_passes_through() {
        let mut runtime = Runtime::new();
        runtime.on_command(BaseCommand {
            linear_vel: 0.2,
            angular_vel: -0.5,
        });
        let actuation = runtime.compute_actuation();
        assert_eq!(actuation.linear_vel, 0.2);
        assert_eq!(actuation.angular_vel, -0.5);
        assert_eq!(runtime.health, RuntimeHealth::Ok);
    }

    #[test]
    fn test_watchdog_stops_old_command() {
        let mut runtime = Runtime::new();
        runtime.on_command(BaseCommand {
            linear_vel: 0.2,
            angular_vel: 0.0,
        });
        runtime.cmd_received_at = Instant::now() - CMD_TIMEOUT - Duration::from_millis(10);
        assert!(runtime.compute_actuation().is_stop());
        assert_eq!(runtime.health, RuntimeHealth::CmdStale);
    }

    #[test]
    fn test_apply_actuation_drives_then_stops() {
        let (mut mc, log) = motors();
        let telemetry = apply_actuation(
            &mut mc,
            &BaseActuation {
                linear_vel: 0.2,
                angular_vel: 0.0,
            },
        )
        .unwrap();
        assert!(telemetry.active);
        assert_eq!(telemetry.left_rps, telemetry.right_rps);
        assert_eq!(writes(&log).len(), 2, "wake + command from cold");

        let telemetry = apply_actuation(&mut mc, &BaseActuation::default()).unwrap();
        assert_eq!(telemetry, WheelTelemetry::default());
        let sent = writes(&log);
        assert_eq!(motor_speeds(sent.last().unwrap()), vec![(1, 0.0), (3, 0.0)]);
    }

    #[test]
    fn test_simulated_actuation_matches_kinematics() {
        let drive = DriveConfig::default();
        let telemetry = simulate_actuation(
            &drive,
            &BaseActuation {
                linear_vel: 0.0,
                angular_vel: 1.0,
            },
        );
        assert!(telemetry.active);
        assert_eq!(telemetry.left_rps, -telemetry.right_rps);
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn test_release_motors_stops_then_closes() {
        let log: EventLog = Arc::new(Mutex::new(Vec::new()));
        let mc = MotorController::with_delay(
            DriveConfig::default(),
            RecordingDelay { log: log.clone() },
        );
        let mut session = DriveSession::open(mc, RecordingTransport::new(log.clone())).unwrap();
        session.set_wheel_speeds(1.0, 1.0).unwrap();
        log.lock().unwrap().clear();

        release_motors(session).unwrap();

        let events = log.lock().unwrap().clone();
        assert_eq!(events.len(), 2);
        let Event::Write(stop) = &events[0] else {
            panic!("expected stop frame before close, got {:?}", events[0]);
        };
        assert_eq!(motor_speeds(stop), vec![(1, 0.0), (3, 0.0)]);
        assert_eq!(events[1], Event::Close);
    }
}
