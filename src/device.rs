/*!
    device side of the link, for `embedded-io-async` buses.

    The central resource is the [Link] struct coupling one [Parser] with the
    receive half of a bus and one [Crc16] with the transmit half. [Link::run]
    pumps received bytes into the parser and hands every checksum-valid
    [CommandRecord] to the registered consumer, synchronously, in receive
    order. The consumer must not block or re-enter the link.
*/
use embedded_io_async::{Read, ReadExactError, Write};
use log::*;

use crate::{
    command::{CommandRecord, FrameMarks, Status},
    crc16::{Crc16, OutOfSpace},
    datagram::MAX_DATAGRAM,
    mutex::*,
    parser::Parser,
};

/// one byte-stream endpoint with its own parser and checksum context
pub struct Link<R, W, C> {
    receive: BusyMutex<Receiver<R, C>>,
    transmit: BusyMutex<Transmitter<W>>,
    status: BusyMutex<Status>,
}
struct Receiver<R, C> {
    bus: R,
    parser: Parser,
    consumer: Option<C>,
}
struct Transmitter<W> {
    bus: W,
    crc: Crc16,
    scratch: [u8; MAX_DATAGRAM],
}

/// error transmitting a device datagram
#[derive(Debug)]
pub enum SendError<E> {
    /// bus write failure
    Bus(E),
    /// datagram does not fit the transmit buffer
    Truncated(OutOfSpace),
}

impl<R, W, C> Link<R, W, C>
where
    R: Read,
    W: Write,
    C: FnMut(&CommandRecord),
{
    pub fn new(marks: FrameMarks, rx: R, tx: W) -> Self {
        Self {
            receive: BusyMutex::from(Receiver {
                bus: rx,
                parser: Parser::new(marks),
                consumer: None,
            }),
            transmit: BusyMutex::from(Transmitter {
                bus: tx,
                crc: Crc16::new(marks),
                scratch: [0; MAX_DATAGRAM],
            }),
            status: BusyMutex::from(Status::Ok),
        }
    }

    /// install the handler invoked with every accepted record
    ///
    /// must be called before [run](Self::run) starts consuming the bus
    pub async fn register_consumer(&self, consumer: C) {
        self.receive.lock().await.consumer = Some(consumer);
    }

    /// current parser status, valid with or without a datagram in flight
    pub async fn status(&self) -> Status {
        *self.status.lock().await
    }

    /**
        coroutine feeding the parser from the bus, one byte at a time

        it **must** be running for the link to decode anything. returns
        cleanly when the bus reports end of stream (link teardown); bus
        errors propagate.
    */
    pub async fn run(&self) -> Result<(), R::Error> {
        let Some(mut receive) = self.receive.try_lock() else {
            warn!("link is already running");
            return Ok(());
        };
        let receive = &mut *receive;
        info!("link running");
        let mut byte = [0u8; 1];
        loop {
            match receive.bus.read_exact(&mut byte).await {
                Ok(()) => {}
                Err(ReadExactError::UnexpectedEof) => return Ok(()),
                Err(ReadExactError::Other(error)) => return Err(error),
            }
            if let Some(record) = receive.parser.push(byte[0]) {
                if let Some(consumer) = &mut receive.consumer {
                    consumer(&record);
                }
            }
            *self.status.lock().await = receive.parser.status();
        }
    }

    /// frame `payload` into a checksummed datagram and transmit it
    pub async fn send(&self, payload: &[u8]) -> Result<(), SendError<W::Error>> {
        let mut transmit = self.transmit.lock().await;
        let transmit = &mut *transmit;
        let len = transmit
            .crc
            .frame(payload, &mut transmit.scratch)
            .map_err(SendError::Truncated)?;
        transmit
            .bus
            .write_all(&transmit.scratch[..len])
            .await
            .map_err(SendError::Bus)?;
        debug!("sent datagram of {} bytes", len);
        Ok(())
    }
}
