/*!
    implement the host end of the link in a `std` environment.

    The central resource is the [Host] struct, which encodes and transmits
    command datagrams and validates inbound telemetry datagrams. It works over
    any tokio byte stream; [Host::open] is a convenience for real serial
    ports.
*/
use log::*;
use serial2_tokio::{CharSize, Parity, SerialPort, StopBits};
use std::{io, path::Path, vec::Vec};
use thiserror::Error;
use tokio::io::{AsyncRead, AsyncReadExt, AsyncWrite, AsyncWriteExt, ReadHalf, WriteHalf};

use crate::{
    command::{FrameMarks, PidTarget},
    crc16::{Crc16, OutOfSpace},
    datagram::{self, MAX_DATAGRAM},
    mutex::*,
};

/// inbound datagrams longer than this are noise, not telemetry
const MAX_INBOUND: usize = 1024;

/// error regarding host-side link communication
#[derive(Error, Debug)]
pub enum Error {
    #[error("problem with the serial link")]
    Bus(#[from] io::Error),
    #[error("datagram does not fit the transmit buffer")]
    Truncated(#[from] OutOfSpace),
}

/// host endpoint sending commands to and receiving telemetry from a device
pub struct Host<S> {
    receive: BusyMutex<Inbound<S>>,
    transmit: BusyMutex<Outbound<S>>,
}
struct Inbound<S> {
    bus: ReadHalf<S>,
    crc: Crc16,
}
struct Outbound<S> {
    bus: WriteHalf<S>,
    crc: Crc16,
    scratch: [u8; MAX_DATAGRAM],
}

impl Host<SerialPort> {
    /// initialize a host on the given serial port file and baud rate
    pub fn open(path: impl AsRef<Path>, rate: u32) -> Result<Self, io::Error> {
        let port = SerialPort::open(path, |mut settings: serial2_tokio::Settings| {
            settings.set_raw();
            settings.set_baud_rate(rate)?;
            settings.set_char_size(CharSize::Bits8);
            settings.set_stop_bits(StopBits::One);
            settings.set_parity(Parity::Even);
            Ok(settings)
        })?;
        Ok(Self::new(FrameMarks::default(), port))
    }
}

impl<S: AsyncRead + AsyncWrite> Host<S> {
    pub fn new(marks: FrameMarks, bus: S) -> Self {
        let (rx, tx) = tokio::io::split(bus);
        Self {
            receive: BusyMutex::from(Inbound {
                bus: rx,
                crc: Crc16::new(marks),
            }),
            transmit: BusyMutex::from(Outbound {
                bus: tx,
                crc: Crc16::new(marks),
                scratch: [0; MAX_DATAGRAM],
            }),
        }
    }

    /// send throttle setpoints for the four motors
    pub async fn send_motor_values(&self, motors: [u8; 4]) -> Result<(), Error> {
        let mut outbound = self.transmit.lock().await;
        let outbound = &mut *outbound;
        let len = datagram::motor_values(&mut outbound.crc, &mut outbound.scratch, motors)?;
        outbound.bus.write_all(&outbound.scratch[..len]).await?;
        debug!("sent motor values {:?}", motors);
        Ok(())
    }

    /// send a PID gain or target-angle triple for the given sub-command
    pub async fn send_pid_angle(&self, target: PidTarget, values: [u32; 3]) -> Result<(), Error> {
        let mut outbound = self.transmit.lock().await;
        let outbound = &mut *outbound;
        let len = datagram::pid_angle(&mut outbound.crc, &mut outbound.scratch, target, values)?;
        outbound.bus.write_all(&outbound.scratch[..len]).await?;
        debug!("sent {:?} values {:?}", target, values);
        Ok(())
    }

    /// frame and send a raw payload, for commands not covered by the helpers
    pub async fn send_payload(&self, payload: &[u8]) -> Result<(), Error> {
        let mut outbound = self.transmit.lock().await;
        let outbound = &mut *outbound;
        let len = outbound.crc.frame(payload, &mut outbound.scratch)?;
        outbound.bus.write_all(&outbound.scratch[..len]).await?;
        Ok(())
    }

    /**
        coroutine receiving telemetry datagrams from the device

        it **must** be running in order to receive anything. each datagram is
        reassembled up to the end marker, validated against its checksum and
        handed to `consumer` as a raw payload; rejected datagrams are logged
        and dropped, the link keeps going. returns cleanly at end of stream.
    */
    pub async fn run(&self, mut consumer: impl FnMut(&[u8])) -> Result<(), Error> {
        let mut inbound = self.receive.try_lock().expect("run function called twice");
        let inbound = &mut *inbound;
        let marks = inbound.crc.marks();
        let mut buffer = Vec::with_capacity(MAX_DATAGRAM);
        let mut byte = [0u8; 1];
        loop {
            if inbound.bus.read(&mut byte).await? == 0 {
                return Ok(());
            }
            let byte = byte[0];
            if byte == marks.start {
                // a start marker unconditionally cancels the datagram in flight
                buffer.clear();
            }
            buffer.push(byte);
            if byte == marks.end {
                match inbound.crc.validate(&buffer) {
                    Ok(payload) => consumer(payload),
                    Err(status) => warn!("inbound datagram rejected: {:?}", status),
                }
                buffer.clear();
            } else if buffer.len() > MAX_INBOUND {
                warn!("inbound stream has no end marker, dropping");
                buffer.clear();
            }
        }
    }
}
