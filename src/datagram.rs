/*!
    builders for outbound command datagrams

    field values are rendered as variable-length uppercase hex with no
    leading-zero padding; field boundaries are the separator byte alone.
*/
use crate::{
    command::{self, PidTarget},
    crc16::{Crc16, OutOfSpace, put, put_hex},
};

/// generous bound for the largest command datagram this protocol can produce
pub const MAX_DATAGRAM: usize = 48;

/// build a motor-values datagram into `out` and return its length
pub fn motor_values(crc: &mut Crc16, out: &mut [u8], motors: [u8; 4]) -> Result<usize, OutOfSpace> {
    let separator = crc.marks().separator;
    let mut payload = [0u8; MAX_DATAGRAM];
    let mut len = 0;
    put_hex(&mut payload, &mut len, command::MOTOR_VALUES)?;
    for motor in motors {
        put(&mut payload, &mut len, separator)?;
        put_hex(&mut payload, &mut len, u32::from(motor))?;
    }
    crc.frame(&payload[..len], out)
}

/// build a PID/angle datagram for the given sub-command into `out` and return its length
pub fn pid_angle(
    crc: &mut Crc16,
    out: &mut [u8],
    target: PidTarget,
    values: [u32; 3],
) -> Result<usize, OutOfSpace> {
    let separator = crc.marks().separator;
    let mut payload = [0u8; MAX_DATAGRAM];
    let mut len = 0;
    put_hex(&mut payload, &mut len, command::PID_ANGLE)?;
    put(&mut payload, &mut len, separator)?;
    put_hex(&mut payload, &mut len, target.code())?;
    for value in values {
        put(&mut payload, &mut len, separator)?;
        put_hex(&mut payload, &mut len, value)?;
    }
    crc.frame(&payload[..len], out)
}
