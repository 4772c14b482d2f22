/*!
    shared data model of the link: frame markers, command codes, decoded
    command records and the protocol status codes.
*/

/// command code for a motor-values datagram
pub const MOTOR_VALUES: u32 = 0x01;
/// command code for a PID/angle datagram
pub const PID_ANGLE: u32 = 0x02;

/// control bytes delimiting a datagram, assigned once per link
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub struct FrameMarks {
    /// start of a datagram
    pub start: u8,
    /// boundary between two hex fields
    pub separator: u8,
    /// end of a datagram
    pub end: u8,
}
impl Default for FrameMarks {
    /// the conventional framing set: STX, US, ETX
    fn default() -> Self {
        Self {
            start: 0x02,
            separator: 0x1f,
            end: 0x03,
        }
    }
}

/// one fully decoded, checksum-valid command
#[derive(Copy, Clone, Debug, PartialEq)]
pub enum CommandRecord {
    MotorValues(MotorValues),
    PidAngle(PidAngle),
}

/// throttle setpoints for the four motors
#[derive(Copy, Clone, Debug, Default, PartialEq, Eq)]
pub struct MotorValues {
    pub motor1: u8,
    pub motor2: u8,
    pub motor3: u8,
    pub motor4: u8,
}

/**
    a triple of controller parameters

    what the triple means depends on [target](Self::target):

    - [PidTarget::RollPitch]: P, I, D gains of the pitch/roll controller
    - [PidTarget::Yaw]: P, I, D gains of the yaw controller
    - [PidTarget::Angle]: target angles for roll, pitch, yaw
*/
#[derive(Copy, Clone, Debug, PartialEq)]
pub struct PidAngle {
    pub target: PidTarget,
    pub values: [f64; 3],
}

/// sub-command selecting which physical triple a [PidAngle] carries
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum PidTarget {
    RollPitch = 0x04,
    Yaw = 0x06,
    Angle = 0x07,
}
impl PidTarget {
    /// decode the sub-command field of a PID/angle datagram
    pub fn from_code(code: u32) -> Option<Self> {
        match code {
            0x04 => Some(Self::RollPitch),
            0x06 => Some(Self::Yaw),
            0x07 => Some(Self::Angle),
            _ => None,
        }
    }
    /// the sub-command field value for this target
    pub fn code(self) -> u32 {
        self as u32
    }
}

/// link status, set by the parser and readable at any time
#[derive(Copy, Clone, Debug, Default, PartialEq, Eq)]
pub enum Status {
    /// last datagram was accepted and handed to the consumer
    #[default]
    Ok,
    /// a datagram is being reassembled
    InProgress,
    /// a non-hex byte arrived where a data byte was expected
    InvalidSign,
    /// command or sub-command code not recognized
    UnknownCommand,
    /// datagram was well formed but its checksum did not match
    ChecksumError,
    /// a handle referred to no live instance
    InvalidInstance,
    /// field counter left its valid range, should not happen
    InternalError,
}
