// Motor control module for the JetAcker differential-drive base
//
// Provides:
// - RRC board frame codec (CRC-8 framed commands)
// - Serial transport and timing collaborators
// - Differential-drive kinematics (body velocity -> wheel rps)
// - Stateful motor controller with wake pulse and warm-up

mod driver;
pub mod kinematics;
pub mod rrc;
pub mod transport;

pub use driver::{ActuatorState, DriveSession, MotorController, Phase};
pub use kinematics::{WheelSpeeds, body_to_wheel_rps};
pub use rrc::{FunctionCode, RrcError};
pub use transport::{Delay, SerialTransport, ThreadDelay, Transport};
