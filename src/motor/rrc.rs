// RRC controller board serial protocol
//
// Frame format: [0xAA, 0x55, Function, Length, Payload..., CRC8]
// The CRC covers function, length and payload (everything after the header).

/// Frame header bytes
pub const HEADER: [u8; 2] = [0xAA, 0x55];

/// Header (2) + function (1) + length (1) + checksum (1)
pub const FRAME_OVERHEAD: usize = 5;

/// Largest payload the single-byte length field can describe
pub const MAX_PAYLOAD_LEN: usize = u8::MAX as usize;

/// Sub-command tag for motor speed payloads
const MOTOR_SUBCMD_SPEED: u8 = 0x01;

/// Sub-command tag for PWM servo position payloads
const PWM_SERVO_SUBCMD_POSITION: u8 = 0x01;

/// Valid motor ports on the board (one-indexed, as printed on the PCB)
pub const MOTOR_CHANNELS: std::ops::RangeInclusive<u8> = 1..=4;

/// CRC-8 lookup table used by the board firmware (Dallas/Maxim, reflected 0x31)
const CRC8_TABLE: [u8; 256] = [
    0, 94, 188, 226, 97, 63, 221, 131, 194, 156, 126, 32, 163, 253, 31, 65, //
    157, 195, 33, 127, 252, 162, 64, 30, 95, 1, 227, 189, 62, 96, 130, 220, //
    35, 125, 159, 193, 66, 28, 254, 160, 225, 191, 93, 3, 128, 222, 60, 98, //
    190, 224, 2, 92, 223, 129, 99, 61, 124, 34, 192, 158, 29, 67, 161, 255, //
    70, 24, 250, 164, 39, 121, 155, 197, 132, 218, 56, 102, 229, 187, 89, 7, //
    219, 133, 103, 57, 186, 228, 6, 88, 25, 71, 165, 251, 120, 38, 196, 154, //
    101, 59, 217, 135, 4, 90, 184, 230, 167, 249, 27, 69, 198, 152, 122, 36, //
    248, 166, 68, 26, 153, 199, 37, 123, 58, 100, 134, 216, 91, 5, 231, 185, //
    140, 210, 48, 110, 237, 179, 81, 15, 78, 16, 242, 172, 47, 113, 147, 205, //
    17, 79, 173, 243, 112, 46, 204, 146, 211, 141, 111, 49, 178, 236, 14, 80, //
    175, 241, 19, 77, 206, 144, 114, 44, 109, 51, 209, 143, 12, 82, 176, 238, //
    50, 108, 142, 208, 83, 13, 239, 177, 240, 174, 76, 18, 145, 207, 45, 115, //
    202, 148, 118, 40, 171, 245, 23, 73, 8, 86, 180, 234, 105, 55, 213, 139, //
    87, 9, 235, 181, 54, 104, 138, 212, 149, 203, 41, 119, 244, 170, 72, 22, //
    233, 183, 85, 11, 136, 214, 52, 106, 43, 117, 151, 201, 74, 20, 246, 168, //
    116, 42, 200, 150, 21, 75, 169, 247, 182, 232, 10, 84, 215, 137, 107, 53, //
];

/// Board subsystems addressed by the function byte
#[repr(u8)]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FunctionCode {
    System = 0,
    Led = 1,
    Buzzer = 2,
    Motor = 3,
    PwmServo = 4,
    BusServo = 5,
    Key = 6,
    Imu = 7,
    Gamepad = 8,
    Sbus = 9,
    Oled = 10,
    Rgb = 11,
}

impl TryFrom<u8> for FunctionCode {
    type Error = RrcError;

    fn try_from(code: u8) -> Result<Self> {
        Ok(match code {
            0 => Self::System,
            1 => Self::Led,
            2 => Self::Buzzer,
            3 => Self::Motor,
            4 => Self::PwmServo,
            5 => Self::BusServo,
            6 => Self::Key,
            7 => Self::Imu,
            8 => Self::Gamepad,
            9 => Self::Sbus,
            10 => Self::Oled,
            11 => Self::Rgb,
            other => return Err(RrcError::InvalidFunctionCode { code: other }),
        })
    }
}

/// Error types for RRC board communication
#[derive(Debug, thiserror::Error)]
pub enum RrcError {
    #[error("Invalid function code: {code}")]
    InvalidFunctionCode { code: u8 },

    #[error("Payload of {len} bytes exceeds the 255-byte frame limit")]
    PayloadTooLarge { len: usize },

    #[error("Motor channel {id} out of range (expected 1-4)")]
    ChannelOutOfRange { id: u8 },

    #[error("Field {field} value {value} does not fit in 16 bits")]
    FieldOutOfRange { field: &'static str, value: f64 },

    #[error("Serial port error: {0}")]
    Serial(#[from] serialport::Error),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Motor controller is not connected")]
    NotConnected,

    #[error("Invalid drive configuration: {0}")]
    InvalidConfig(String),

    #[error("Failed to parse drive configuration: {0}")]
    ConfigParse(#[from] serde_json::Error),
}

pub type Result<T> = std::result::Result<T, RrcError>;

/// Calculate the CRC-8 of `data` as the board firmware does
pub fn checksum(data: &[u8]) -> u8 {
    data.iter().fold(0u8, |crc, &b| CRC8_TABLE[(crc ^ b) as usize])
}

/// Build a complete frame with header, length and checksum
pub fn build_frame(function: FunctionCode, payload: &[u8]) -> Result<Vec<u8>> {
    if payload.len() > MAX_PAYLOAD_LEN {
        return Err(RrcError::PayloadTooLarge { len: payload.len() });
    }

    let mut frame = Vec::with_capacity(FRAME_OVERHEAD + payload.len());
    frame.extend_from_slice(&HEADER);
    frame.push(function as u8);
    frame.push(payload.len() as u8);
    frame.extend_from_slice(payload);

    // Checksum over function, length, payload
    let crc = checksum(&frame[HEADER.len()..]);
    frame.push(crc);

    Ok(frame)
}

/// Motor speed command
///
/// `pairs` are `(channel, rps)` with one-indexed channels (1-4) and signed
/// rotations per second (positive = forward).
pub fn motor_command(pairs: &[(u8, f32)]) -> Result<Vec<u8>> {
    let count =
        u8::try_from(pairs.len()).map_err(|_| RrcError::PayloadTooLarge { len: pairs.len() })?;

    let mut payload = Vec::with_capacity(2 + pairs.len() * 5);
    payload.push(MOTOR_SUBCMD_SPEED);
    payload.push(count);

    for &(id, rps) in pairs {
        if !MOTOR_CHANNELS.contains(&id) {
            return Err(RrcError::ChannelOutOfRange { id });
        }
        payload.push(id - 1); // wire is zero-indexed
        payload.extend_from_slice(&rps.to_le_bytes());
    }

    build_frame(FunctionCode::Motor, &payload)
}

/// LED blink command
///
/// Times are given in seconds and truncated (not rounded) to whole
/// milliseconds, so 0.0999 s is sent as 99 ms.
pub fn led_command(led_id: u8, on_secs: f64, off_secs: f64, repeat: u16) -> Result<Vec<u8>> {
    let on_ms = secs_to_millis("on_time", on_secs)?;
    let off_ms = secs_to_millis("off_time", off_secs)?;

    let mut payload = Vec::with_capacity(7);
    payload.push(led_id);
    payload.extend_from_slice(&on_ms.to_le_bytes());
    payload.extend_from_slice(&off_ms.to_le_bytes());
    payload.extend_from_slice(&repeat.to_le_bytes());

    build_frame(FunctionCode::Led, &payload)
}

/// Buzzer tone command. Times truncate to milliseconds like [`led_command`].
pub fn buzzer_command(freq_hz: u16, on_secs: f64, off_secs: f64, repeat: u16) -> Result<Vec<u8>> {
    let on_ms = secs_to_millis("on_time", on_secs)?;
    let off_ms = secs_to_millis("off_time", off_secs)?;

    let mut payload = Vec::with_capacity(8);
    payload.extend_from_slice(&freq_hz.to_le_bytes());
    payload.extend_from_slice(&on_ms.to_le_bytes());
    payload.extend_from_slice(&off_ms.to_le_bytes());
    payload.extend_from_slice(&repeat.to_le_bytes());

    build_frame(FunctionCode::Buzzer, &payload)
}

/// PWM servo move command
///
/// `positions` are `(servo_id, pulse)` pairs; pulse is typically 500-2500.
/// Servo ids are sent as given.
pub fn pwm_servo_command(duration_secs: f64, positions: &[(u8, u16)]) -> Result<Vec<u8>> {
    let duration_ms = secs_to_millis("duration", duration_secs)?;
    let count = u8::try_from(positions.len())
        .map_err(|_| RrcError::PayloadTooLarge { len: positions.len() })?;

    let [dur_lo, dur_hi] = duration_ms.to_le_bytes();
    let mut payload = vec![PWM_SERVO_SUBCMD_POSITION, dur_lo, dur_hi, count];
    for &(id, position) in positions {
        payload.push(id);
        payload.extend_from_slice(&position.to_le_bytes());
    }

    build_frame(FunctionCode::PwmServo, &payload)
}

/// Seconds to whole milliseconds, truncating toward zero
fn secs_to_millis(field: &'static str, secs: f64) -> Result<u16> {
    let ms = (secs * 1000.0).trunc();
    if !(0.0..=u16::MAX as f64).contains(&ms) {
        return Err(RrcError::FieldOutOfRange { field, value: secs });
    }
    Ok(ms as u16)
}

#[cfg(test)]
mod tests {
    use super::*;

    /// Split a frame back into function code and payload, checking framing
    fn decode_frame(frame: &[u8]) -> Option<(FunctionCode, Vec<u8>)> {
        if frame.len() < FRAME_OVERHEAD || frame[..2] != HEADER {
            return None;
        }
        let len = frame[3] as usize;
        if frame.len() != FRAME_OVERHEAD + len {
            return None;
        }
        let crc = frame[frame.len() - 1];
        if checksum(&frame[2..frame.len() - 1]) != crc {
            return None;
        }
        let function = FunctionCode::try_from(frame[2]).ok()?;
        Some((function, frame[4..4 + len].to_vec()))
    }

    #[test]
    fn test_checksum_empty_is_zero() {
        assert_eq!(checksum(&[]), 0);
    }

    #[test]
    fn test_checksum_known_values() {
        // Single byte lands directly on the table entry
        assert_eq!(checksum(&[1]), 94);
        assert_eq!(checksum(&[0xFF]), 53);
        // Standard CRC-8/MAXIM check value for "123456789"
        assert_eq!(checksum(b"123456789"), 0xA1);
        assert_eq!(checksum(b"123456789"), checksum(b"123456789"));
    }

    #[test]
    fn test_build_frame_layout() {
        let payload = [0x10, 0x20, 0x30];
        let frame = build_frame(FunctionCode::Buzzer, &payload).unwrap();

        assert_eq!(frame.len(), FRAME_OVERHEAD + payload.len());
        assert_eq!(&frame[..2], &[0xAA, 0x55]);
        assert_eq!(frame[2], 2); // Buzzer
        assert_eq!(frame[3], 3); // Length excludes header, function and crc
        assert_eq!(&frame[4..7], &payload);
        assert_eq!(frame[7], checksum(&frame[2..7]));
    }

    #[test]
    fn test_build_frame_limits() {
        let empty = build_frame(FunctionCode::System, &[]).unwrap();
        assert_eq!(empty, vec![0xAA, 0x55, 0, 0, 0]);

        let max = build_frame(FunctionCode::Oled, &[0x5A; MAX_PAYLOAD_LEN]).unwrap();
        assert_eq!(max.len(), FRAME_OVERHEAD + MAX_PAYLOAD_LEN);
        assert_eq!(max[3], 255);

        let err = build_frame(FunctionCode::Oled, &[0; 256]).unwrap_err();
        assert!(matches!(err, RrcError::PayloadTooLarge { len: 256 }));
    }

    #[test]
    fn test_function_code_conversion() {
        assert_eq!(FunctionCode::try_from(3).unwrap(), FunctionCode::Motor);
        assert_eq!(FunctionCode::try_from(11).unwrap(), FunctionCode::Rgb);
        assert!(matches!(
            FunctionCode::try_from(12),
            Err(RrcError::InvalidFunctionCode { code: 12 })
        ));
    }

    #[test]
    fn test_decode_recovers_frame_contents() {
        for (function, payload) in [
            (FunctionCode::System, vec![]),
            (FunctionCode::Imu, vec![0x00, 0xFF, 0x7F]),
            (FunctionCode::Rgb, (0..=254).collect::<Vec<u8>>()),
        ] {
            let frame = build_frame(function, &payload).unwrap();
            assert_eq!(decode_frame(&frame), Some((function, payload)));
        }
    }

    #[test]
    fn test_decode_rejects_corrupted_byte() {
        let mut frame = motor_command(&[(2, 0.5), (4, -0.5)]).unwrap();
        frame[6] ^= 0x01;
        assert_eq!(decode_frame(&frame), None);
    }

    #[test]
    fn test_motor_command_zero_speeds() {
        let frame = motor_command(&[(1, 0.0), (2, 0.0)]).unwrap();
        let (function, payload) = decode_frame(&frame).unwrap();

        assert_eq!(function, FunctionCode::Motor);
        assert_eq!(
            payload,
            vec![0x01, 2, 0, 0, 0, 0, 0, 1, 0, 0, 0, 0],
            "sub-command, count, then zero-indexed channels with 0.0f32"
        );
    }

    #[test]
    fn test_motor_command_float_encoding() {
        let frame = motor_command(&[(2, 0.5), (4, -1.0)]).unwrap();
        let (_, payload) = decode_frame(&frame).unwrap();

        assert_eq!(payload[2], 1);
        assert_eq!(&payload[3..7], &0.5f32.to_le_bytes());
        assert_eq!(payload[7], 3);
        assert_eq!(&payload[8..12], &[0x00, 0x00, 0x80, 0xBF]); // -1.0f32 LE
    }

    #[test]
    fn test_motor_command_rejects_bad_channel() {
        assert!(matches!(
            motor_command(&[(0, 1.0)]),
            Err(RrcError::ChannelOutOfRange { id: 0 })
        ));
        assert!(matches!(
            motor_command(&[(1, 1.0), (5, 1.0)]),
            Err(RrcError::ChannelOutOfRange { id: 5 })
        ));
    }

    #[test]
    fn test_motor_command_too_many_pairs() {
        let pairs = vec![(1u8, 0.0f32); 51]; // 2 + 51*5 = 257 bytes
        assert!(matches!(
            motor_command(&pairs),
            Err(RrcError::PayloadTooLarge { len: 257 })
        ));
    }

    #[test]
    fn test_led_command_truncates_time() {
        let frame = led_command(1, 0.0999, 1.5, 3).unwrap();
        let (function, payload) = decode_frame(&frame).unwrap();

        assert_eq!(function, FunctionCode::Led);
        // 0.0999 s -> 99 ms (truncated), 1.5 s -> 1500 ms
        assert_eq!(payload, vec![1, 99, 0, 0xDC, 0x05, 3, 0]);
    }

    #[test]
    fn test_buzzer_command_layout() {
        let frame = buzzer_command(1900, 0.1, 0.9, 1).unwrap();
        let (function, payload) = decode_frame(&frame).unwrap();

        assert_eq!(function, FunctionCode::Buzzer);
        assert_eq!(payload.len(), 8);
        assert_eq!(u16::from_le_bytes([payload[0], payload[1]]), 1900);
        assert_eq!(u16::from_le_bytes([payload[6], payload[7]]), 1);
        let off_ms = u16::from_le_bytes([payload[4], payload[5]]);
        assert!(off_ms == 899 || off_ms == 900, "off time was {off_ms}");
    }

    #[test]
    fn test_time_fields_out_of_range() {
        assert!(matches!(
            buzzer_command(1000, -0.5, 0.0, 1),
            Err(RrcError::FieldOutOfRange { field: "on_time", .. })
        ));
        assert!(matches!(
            led_command(1, 0.1, 70.0, 1),
            Err(RrcError::FieldOutOfRange { field: "off_time", .. })
        ));
        assert!(matches!(
            pwm_servo_command(f64::NAN, &[]),
            Err(RrcError::FieldOutOfRange { field: "duration", .. })
        ));
    }

    #[test]
    fn test_pwm_servo_command_layout() {
        let frame = pwm_servo_command(1.0, &[(1, 1500), (2, 2500)]).unwrap();
        let (function, payload) = decode_frame(&frame).unwrap();

        assert_eq!(function, FunctionCode::PwmServo);
        // 1000 ms = 0x03E8
        assert_eq!(
            payload,
            vec![0x01, 0xE8, 0x03, 2, 1, 0xDC, 0x05, 2, 0xC4, 0x09]
        );
    }
}
