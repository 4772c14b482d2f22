/*!
    CRC-16/CCITT checksum engine bound to a set of frame markers.

    The accumulator is independent of the command semantics: it folds arbitrary
    bytes and can both produce a check value for an outbound datagram
    ([Crc16::frame]) and verify a complete inbound one ([Crc16::validate]).
    Every operation is allocation-free and bounded, so it can run in an
    interrupt context.
*/
use crate::command::{FrameMarks, Status};

/// CRC-16/CCITT-FALSE generator polynomial
const POLYNOMIAL: u16 = 0x1021;
/// accumulator value at the start of every datagram
const INITIAL: u16 = 0xffff;

/// running 16-bit CRC over a byte stream
///
/// the value is only meaningful between a [reset](Crc16::reset) and the next
/// one; a fresh instance starts already reset.
#[derive(Clone, Debug)]
pub struct Crc16 {
    marks: FrameMarks,
    sum: u16,
}
impl Crc16 {
    /// create an accumulator using the given frame markers for datagram building
    pub fn new(marks: FrameMarks) -> Self {
        Self {
            marks,
            sum: INITIAL,
        }
    }
    /// restart the running value for a new datagram
    pub fn reset(&mut self) {
        self.sum = INITIAL;
    }
    /// fold one byte into the running value, MSB first, no reflection
    pub fn update(&mut self, byte: u8) {
        let mut crc = self.sum ^ (u16::from(byte) << 8);
        for _ in 0..8 {
            if crc & 0x8000 != 0 {
                crc = (crc << 1) ^ POLYNOMIAL;
            } else {
                crc <<= 1;
            }
        }
        self.sum = crc;
    }
    /// current running value, no final xor
    pub fn value(&self) -> u16 {
        self.sum
    }
    /// frame markers this accumulator was bound to at creation
    pub fn marks(&self) -> FrameMarks {
        self.marks
    }

    /**
        build a complete datagram around `payload` into `out` and return its length

        the result is `start || payload || separator || hex(checksum) || end`.
        the checksum covers the payload and the separator that follows it,
        matching what the parser folds on the receiving side. `payload` is a
        bounded slice and must not contain any of the three frame markers.

        fails with [OutOfSpace] when `out` cannot hold the whole datagram,
        rather than truncating silently.
    */
    pub fn frame(&mut self, payload: &[u8], out: &mut [u8]) -> Result<usize, OutOfSpace> {
        self.reset();
        for &byte in payload {
            self.update(byte);
        }
        self.update(self.marks.separator);
        let sum = self.value();

        let mut len = 0;
        put(out, &mut len, self.marks.start)?;
        for &byte in payload {
            put(out, &mut len, byte)?;
        }
        put(out, &mut len, self.marks.separator)?;
        put_hex(out, &mut len, u32::from(sum))?;
        put(out, &mut len, self.marks.end)?;
        Ok(len)
    }

    /**
        check the framing and checksum of a complete datagram and return its payload

        the payload is everything between the start marker and the separator
        preceding the checksum field; it is not command-decoded. malformed
        framing reports [Status::InvalidSign], a checksum mismatch
        [Status::ChecksumError].
    */
    pub fn validate<'d>(&mut self, datagram: &'d [u8]) -> Result<&'d [u8], Status> {
        let Some((&first, rest)) = datagram.split_first() else {
            return Err(Status::InvalidSign);
        };
        let Some((&last, body)) = rest.split_last() else {
            return Err(Status::InvalidSign);
        };
        if first != self.marks.start || last != self.marks.end {
            return Err(Status::InvalidSign);
        }
        let Some(boundary) = body.iter().rposition(|&byte| byte == self.marks.separator) else {
            return Err(Status::InvalidSign);
        };
        let (payload, field) = (&body[..boundary], &body[boundary + 1..]);
        if field.is_empty() {
            return Err(Status::InvalidSign);
        }
        let mut sent = 0u32;
        for &byte in field {
            let Some(digit) = hex_digit(byte) else {
                return Err(Status::InvalidSign);
            };
            sent = sent.wrapping_mul(16).wrapping_add(u32::from(digit));
        }

        self.reset();
        for &byte in payload {
            self.update(byte);
        }
        self.update(self.marks.separator);
        if self.value() == sent as u16 {
            Ok(payload)
        } else {
            Err(Status::ChecksumError)
        }
    }
}

/// an outbound datagram does not fit the provided buffer
#[derive(Copy, Clone, Debug, Default, PartialEq, Eq)]
pub struct OutOfSpace;

impl core::fmt::Display for OutOfSpace {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        write!(f, "datagram exceeds the output buffer capacity")
    }
}
impl core::error::Error for OutOfSpace {}

/// value of an ASCII hex digit, upper or lower case
pub(crate) fn hex_digit(byte: u8) -> Option<u8> {
    match byte {
        b'0'..=b'9' => Some(byte - b'0'),
        b'A'..=b'F' => Some(byte - b'A' + 0xa),
        b'a'..=b'f' => Some(byte - b'a' + 0xa),
        _ => None,
    }
}

/// append one byte, refusing to overrun
pub(crate) fn put(out: &mut [u8], len: &mut usize, byte: u8) -> Result<(), OutOfSpace> {
    let slot = out.get_mut(*len).ok_or(OutOfSpace)?;
    *slot = byte;
    *len += 1;
    Ok(())
}

/// append a value as variable-length uppercase hex, no leading zeros
pub(crate) fn put_hex(out: &mut [u8], len: &mut usize, value: u32) -> Result<(), OutOfSpace> {
    const DIGITS: &[u8; 16] = b"0123456789ABCDEF";
    let nibbles = match value {
        0 => 1,
        _ => (32 - value.leading_zeros() as usize).div_ceil(4),
    };
    for rank in (0..nibbles).rev() {
        let nibble = (value >> (rank * 4)) & 0xf;
        put(out, len, DIGITS[nibble as usize])?;
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn engine() -> Crc16 {
        Crc16::new(FrameMarks::default())
    }

    #[test]
    fn ccitt_false_vector() {
        // standard check value for CRC-16/CCITT-FALSE
        let mut crc = engine();
        crc.reset();
        for &byte in b"123456789" {
            crc.update(byte);
        }
        assert_eq!(crc.value(), 0x29b1);
    }

    #[test]
    fn reset_is_idempotent() {
        let mut crc = engine();
        crc.update(0x42);
        crc.reset();
        let once = crc.value();
        crc.reset();
        assert_eq!(crc.value(), once);
        assert_eq!(once, 0xffff);
    }

    #[test]
    fn frame_then_validate_round_trip() {
        let mut crc = engine();
        let payload = b"2\x1f4\x1f64\x1f64\x1f64";
        let mut out = [0u8; 64];
        let len = crc.frame(payload, &mut out).unwrap();
        assert_eq!(crc.validate(&out[..len]).unwrap(), payload);
    }

    #[test]
    fn frame_refuses_short_buffer() {
        let mut crc = engine();
        let mut out = [0u8; 4];
        assert_eq!(crc.frame(b"1\x1f0A", &mut out), Err(OutOfSpace));
    }

    #[test]
    fn validate_detects_corruption() {
        let mut crc = engine();
        let mut out = [0u8; 64];
        let len = crc.frame(b"1\x1f0A\x1f14\x1f1E\x1f28", &mut out).unwrap();
        // flip one payload bit
        out[2] ^= 0x01;
        assert_eq!(crc.validate(&out[..len]), Err(Status::ChecksumError));
    }

    #[test]
    fn validate_rejects_malformed() {
        let mut crc = engine();
        assert_eq!(crc.validate(b""), Err(Status::InvalidSign));
        assert_eq!(crc.validate(b"\x02"), Err(Status::InvalidSign));
        // no separator at all
        assert_eq!(crc.validate(b"\x0212AB\x03"), Err(Status::InvalidSign));
        // empty checksum field
        assert_eq!(crc.validate(b"\x0212\x1f\x03"), Err(Status::InvalidSign));
        // non-hex checksum field
        assert_eq!(crc.validate(b"\x0212\x1fZZ\x03"), Err(Status::InvalidSign));
    }

    #[test]
    fn hex_rendering() {
        let mut out = [0u8; 8];
        let mut len = 0;
        put_hex(&mut out, &mut len, 0).unwrap();
        put_hex(&mut out, &mut len, 0x29b1).unwrap();
        assert_eq!(&out[..len], b"029B1");
    }
}
