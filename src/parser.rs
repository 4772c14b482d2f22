/*!
    per-link datagram parser

    A [Parser] consumes the receive stream one byte at a time and reassembles
    command datagrams of the form

    `start <hex command> sep <hex fields separated by sep> sep <hex checksum> end`

    folding everything between the markers (separators included, the checksum
    field excluded) into its [Crc16] accumulator. A checksum-valid datagram
    comes out as a [CommandRecord]; anything else degrades to dropping bytes
    until the next start marker, which is the designed resynchronization point.
    One invocation per byte, no allocation, no blocking: the parser is meant to
    be driven from the receive interrupt of the link.
*/
use log::debug;

use crate::{
    command::{self, CommandRecord, FrameMarks, MotorValues, PidAngle, PidTarget, Status},
    crc16::{Crc16, hex_digit},
};

#[derive(Copy, Clone, Debug, PartialEq, Eq)]
enum Phase {
    Idle,
    ReadCommand,
    ReadMotorValues,
    ReadPidAngle,
    ValidateChecksum,
}

/// payload fields committed so far, reused across datagrams
#[derive(Copy, Clone, Debug, Default)]
struct Scratch {
    motors: [u8; 4],
    target: Option<PidTarget>,
    values: [f64; 3],
}

/// state machine reassembling command datagrams from a byte stream
///
/// allocated once per link and never resized; every field is reset when a
/// start marker re-arms the machine.
#[derive(Debug)]
pub struct Parser {
    marks: FrameMarks,
    crc: Crc16,
    phase: Phase,
    status: Status,
    /// rank of the field being read within the current payload phase
    field_index: u8,
    /// value assembled from the hex digits of the current field
    accumulator: u32,
    scratch: Scratch,
    /// record decoded from the payload, pending checksum approval
    pending: Option<CommandRecord>,
}

impl Parser {
    pub fn new(marks: FrameMarks) -> Self {
        Self {
            marks,
            crc: Crc16::new(marks),
            phase: Phase::Idle,
            status: Status::Ok,
            field_index: 0,
            accumulator: 0,
            scratch: Scratch::default(),
            pending: None,
        }
    }

    /// status of the link, valid whether or not a datagram is in flight
    pub fn status(&self) -> Status {
        self.status
    }
    pub fn marks(&self) -> FrameMarks {
        self.marks
    }

    /**
        advance the machine by exactly one received byte

        returns a decoded record when this byte completed a checksum-valid
        datagram. bytes must arrive in strict receipt order; a start marker
        unconditionally cancels any datagram in flight.
    */
    pub fn push(&mut self, byte: u8) -> Option<CommandRecord> {
        match self.phase {
            // also the inert state after an error: everything except the
            // start marker is dropped until the link resynchronizes
            Phase::Idle => {
                if byte == self.marks.start {
                    self.begin();
                }
                None
            }
            Phase::ReadCommand => {
                self.read_command(byte);
                None
            }
            Phase::ReadMotorValues => {
                self.read_motor_values(byte);
                None
            }
            Phase::ReadPidAngle => {
                self.read_pid_angle(byte);
                None
            }
            Phase::ValidateChecksum => self.validate_checksum(byte),
        }
    }

    /// re-arm for a new datagram
    fn begin(&mut self) {
        self.crc.reset();
        self.accumulator = 0;
        self.field_index = 0;
        self.scratch = Scratch::default();
        self.pending = None;
        self.status = Status::InProgress;
        self.phase = Phase::ReadCommand;
    }

    /// drop the datagram in flight and go inert until the next start marker
    fn fail(&mut self, status: Status) {
        debug!("datagram dropped: {:?}", status);
        self.status = status;
        self.phase = Phase::Idle;
        self.pending = None;
    }

    /// fold one hex digit into the accumulator and the checksum
    fn consume_digit(&mut self, byte: u8) {
        match hex_digit(byte) {
            Some(digit) => {
                self.accumulator = self
                    .accumulator
                    .wrapping_mul(16)
                    .wrapping_add(u32::from(digit));
                self.crc.update(byte);
            }
            None => self.fail(Status::InvalidSign),
        }
    }

    fn read_command(&mut self, byte: u8) {
        if byte == self.marks.separator {
            self.crc.update(byte);
            match self.accumulator {
                command::MOTOR_VALUES => self.phase = Phase::ReadMotorValues,
                command::PID_ANGLE => self.phase = Phase::ReadPidAngle,
                _ => return self.fail(Status::UnknownCommand),
            }
            self.accumulator = 0;
        } else {
            self.consume_digit(byte);
        }
    }

    fn read_motor_values(&mut self, byte: u8) {
        if byte == self.marks.separator {
            self.crc.update(byte);
            match self.scratch.motors.get_mut(usize::from(self.field_index)) {
                Some(slot) => *slot = self.accumulator as u8,
                // unreachable with typed phases, kept as a hard guard
                None => return self.fail(Status::InternalError),
            }
            self.accumulator = 0;
            self.field_index += 1;
            if self.field_index > 3 {
                self.field_index = 0;
                let [motor1, motor2, motor3, motor4] = self.scratch.motors;
                self.pending = Some(CommandRecord::MotorValues(MotorValues {
                    motor1,
                    motor2,
                    motor3,
                    motor4,
                }));
                self.phase = Phase::ValidateChecksum;
            }
        } else {
            self.consume_digit(byte);
        }
    }

    fn read_pid_angle(&mut self, byte: u8) {
        if byte == self.marks.separator {
            self.crc.update(byte);
            match self.scratch.target {
                // the first field is the sub-command selector
                None => {
                    match PidTarget::from_code(self.accumulator) {
                        Some(target) => self.scratch.target = Some(target),
                        None => return self.fail(Status::UnknownCommand),
                    }
                    self.field_index = 0;
                }
                Some(target) => {
                    match self.scratch.values.get_mut(usize::from(self.field_index)) {
                        Some(slot) => *slot = f64::from(self.accumulator),
                        None => return self.fail(Status::InternalError),
                    }
                    self.field_index += 1;
                    if self.field_index > 2 {
                        self.field_index = 0;
                        self.pending = Some(CommandRecord::PidAngle(PidAngle {
                            target,
                            values: self.scratch.values,
                        }));
                        self.phase = Phase::ValidateChecksum;
                    }
                }
            }
            self.accumulator = 0;
        } else {
            self.consume_digit(byte);
        }
    }

    fn validate_checksum(&mut self, byte: u8) -> Option<CommandRecord> {
        if byte == self.marks.end {
            let sent = self.accumulator as u16;
            let record = if self.crc.value() == sent {
                self.status = Status::Ok;
                self.pending.take()
            } else {
                self.fail(Status::ChecksumError);
                None
            };
            self.accumulator = 0;
            self.field_index = 0;
            self.phase = Phase::Idle;
            if let Some(record) = &record {
                debug!("datagram accepted: {:?}", record);
            }
            record
        } else {
            // the trailing checksum field is excluded from its own computation
            match hex_digit(byte) {
                Some(digit) => {
                    self.accumulator = self
                        .accumulator
                        .wrapping_mul(16)
                        .wrapping_add(u32::from(digit));
                }
                None => self.fail(Status::InvalidSign),
            }
            None
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::datagram;
    use std::vec::Vec;

    fn parser() -> Parser {
        Parser::new(FrameMarks::default())
    }

    fn motor_frame(motors: [u8; 4]) -> Vec<u8> {
        let mut crc = Crc16::new(FrameMarks::default());
        let mut out = [0u8; datagram::MAX_DATAGRAM];
        let len = datagram::motor_values(&mut crc, &mut out, motors).unwrap();
        out[..len].to_vec()
    }

    fn pid_frame(target: PidTarget, values: [u32; 3]) -> Vec<u8> {
        let mut crc = Crc16::new(FrameMarks::default());
        let mut out = [0u8; datagram::MAX_DATAGRAM];
        let len = datagram::pid_angle(&mut crc, &mut out, target, values).unwrap();
        out[..len].to_vec()
    }

    fn feed(parser: &mut Parser, bytes: &[u8]) -> Vec<CommandRecord> {
        bytes.iter().filter_map(|&byte| parser.push(byte)).collect()
    }

    #[test]
    fn motor_fields_commit_in_order() {
        let mut parser = parser();
        // fields A 14 1E 28
        let records = feed(&mut parser, &motor_frame([10, 20, 30, 40]));
        assert_eq!(
            records,
            [CommandRecord::MotorValues(MotorValues {
                motor1: 10,
                motor2: 20,
                motor3: 30,
                motor4: 40,
            })]
        );
        assert_eq!(parser.status(), Status::Ok);
    }

    #[test]
    fn pid_angle_decodes_for_each_target() {
        for target in [PidTarget::RollPitch, PidTarget::Yaw, PidTarget::Angle] {
            let mut parser = parser();
            let records = feed(&mut parser, &pid_frame(target, [1, 2, 3]));
            assert_eq!(
                records,
                [CommandRecord::PidAngle(PidAngle {
                    target,
                    values: [1.0, 2.0, 3.0],
                })]
            );
            assert_eq!(parser.status(), Status::Ok);
        }
    }

    #[test]
    fn lower_and_upper_case_hex_are_equivalent() {
        let frame = motor_frame([0xab, 0xcd, 0xef, 0x0f]);
        let lowered: Vec<u8> = frame.iter().map(|byte| byte.to_ascii_lowercase()).collect();
        let mut parser = parser();
        assert_eq!(feed(&mut parser, &frame), feed(&mut parser, &lowered));
    }

    #[test]
    fn resynchronizes_on_next_start_marker() {
        let mut parser = parser();
        // a start marker, then garbage, then a complete valid frame
        let mut stream = std::vec![0x02, 0xff];
        stream.extend_from_slice(&motor_frame([10, 20, 30, 40]));
        let records = feed(&mut parser, &stream);
        assert_eq!(records.len(), 1);
        assert_eq!(parser.status(), Status::Ok);
    }

    #[test]
    fn stray_start_marker_inside_a_payload_discards_both_frames() {
        let mut parser = parser();
        // the start marker arriving mid-field is consumed as a bad data byte,
        // so the frame it opened is lost along with the one in flight; this
        // ambiguity is inherent to single-byte framing
        let mut stream = std::vec![0x02, b'1', 0x1f, b'0', b'A'];
        stream.extend_from_slice(&motor_frame([1, 2, 3, 4]));
        assert!(feed(&mut parser, &stream).is_empty());
        assert_eq!(parser.status(), Status::InvalidSign);
        // the next start marker heals the link
        assert_eq!(feed(&mut parser, &motor_frame([1, 2, 3, 4])).len(), 1);
        assert_eq!(parser.status(), Status::Ok);
    }

    #[test]
    fn checksum_mismatch_drops_the_frame() {
        let mut frame = motor_frame([10, 20, 30, 40]);
        // alter one digit of the trailing checksum field
        let digit = frame.len() - 2;
        frame[digit] = if frame[digit] == b'0' { b'1' } else { b'0' };
        let mut parser = parser();
        assert!(feed(&mut parser, &frame).is_empty());
        assert_eq!(parser.status(), Status::ChecksumError);
    }

    #[test]
    fn checksum_error_is_not_fatal_to_the_link() {
        let good = motor_frame([10, 20, 30, 40]);
        let mut bad = good.clone();
        let digit = bad.len() - 2;
        bad[digit] = if bad[digit] == b'0' { b'1' } else { b'0' };

        let mut parser = parser();
        assert!(feed(&mut parser, &bad).is_empty());
        assert_eq!(feed(&mut parser, &good).len(), 1);
        assert_eq!(parser.status(), Status::Ok);
    }

    #[test]
    fn unknown_command_goes_inert_until_next_start() {
        let mut parser = parser();
        feed(&mut parser, b"\x023\x1f");
        assert_eq!(parser.status(), Status::UnknownCommand);
        // everything but a start marker is now ignored
        feed(&mut parser, b"0A\x1f\x03");
        assert_eq!(parser.status(), Status::UnknownCommand);
        assert_eq!(feed(&mut parser, &motor_frame([1, 2, 3, 4])).len(), 1);
    }

    #[test]
    fn unknown_pid_subcommand_is_rejected() {
        let mut parser = parser();
        // 0x05 is not one of the recognized sub-commands
        feed(&mut parser, b"\x022\x1f5\x1f");
        assert_eq!(parser.status(), Status::UnknownCommand);
    }

    #[test]
    fn non_hex_byte_in_a_field_is_an_invalid_sign() {
        let mut parser = parser();
        feed(&mut parser, b"\x021\x1fG");
        assert_eq!(parser.status(), Status::InvalidSign);
    }

    #[test]
    fn status_reports_in_progress_mid_frame() {
        let mut parser = parser();
        feed(&mut parser, b"\x021\x1f0A");
        assert_eq!(parser.status(), Status::InProgress);
    }

    #[test]
    fn idle_noise_does_not_disturb_the_status() {
        let mut parser = parser();
        assert!(feed(&mut parser, b"hello\xffworld").is_empty());
        assert_eq!(parser.status(), Status::Ok);
    }

    #[test]
    fn consecutive_frames_decode_independently() {
        let mut parser = parser();
        let mut stream = motor_frame([1, 2, 3, 4]);
        stream.extend_from_slice(&pid_frame(PidTarget::Yaw, [7, 8, 9]));
        let records = feed(&mut parser, &stream);
        assert_eq!(records.len(), 2);
        assert!(matches!(records[0], CommandRecord::MotorValues(_)));
        assert!(matches!(records[1], CommandRecord::PidAngle(_)));
    }

    #[test]
    fn chunked_delivery_is_equivalent_to_byte_at_a_time() {
        let frame = motor_frame([10, 20, 30, 40]);
        let mut reference = parser();
        let expected = feed(&mut reference, &frame);
        // splitting the stream at any point changes nothing
        for split in 0..frame.len() {
            let mut parser = parser();
            let mut records = feed(&mut parser, &frame[..split]);
            records.extend(feed(&mut parser, &frame[split..]));
            assert_eq!(records, expected);
            assert_eq!(parser.status(), reference.status());
        }
    }

    #[test]
    fn custom_frame_marks() {
        let marks = FrameMarks {
            start: b'<',
            separator: b'|',
            end: b'>',
        };
        let mut crc = Crc16::new(marks);
        let mut out = [0u8; datagram::MAX_DATAGRAM];
        let len = datagram::motor_values(&mut crc, &mut out, [1, 2, 3, 4]).unwrap();
        let mut parser = Parser::new(marks);
        let records = feed(&mut parser, &out[..len]);
        assert_eq!(records.len(), 1);
    }
}
