//! Register channel — synchronous Modbus-RTU master for the drive.
//!
//! One [`RegisterChannel`] owns the RS-485 link to the variable-frequency
//! drive.  Every call is a complete, blocking transaction:
//!
//! ```text
//!   delay 20 ms ─▶ drain RX ─▶ DE/RE high ─▶ write + flush ─▶ DE/RE low ─▶ read reply
//! ```
//!
//! Replies carry no register address, so a stale byte left in the receive
//! buffer (a late reply, another slave's frame, the tail of a rejected
//! frame) would be decoded as the next answer.  The receive side is
//! drained before every request and after every failed exchange.
//!
//! The 20 ms silence before each request is far longer than the 3.5
//! character times RTU requires.  The drive drops requests that follow a
//! reply any sooner, so it must stay.
//!
//! Each outcome updates [`ConnectionStatus`].  Only transport-level
//! failures (timeout, device failure, wrong slave id) count against the
//! link; a rejected request from a responsive drive still means
//! "connected".

pub mod frame;

use core::convert::Infallible;
use core::fmt;

use embedded_hal::delay::DelayNs;
use embedded_hal::digital::{ErrorType, OutputPin};
use embedded_io::{Read, ReadReady, Write};
use log::{debug, info};

use crate::app::ports::RegisterPort;
use frame::{Header, HEADER_LEN, REQUEST_LEN};

/// Minimum bus silence before every transaction, in milliseconds.
pub const MIN_SILENT_INTERVAL_MS: u32 = 20;

/// Largest reply frame accepted (the 0x06 echo).
const MAX_REPLY_LEN: usize = REQUEST_LEN;

/// Upper bound on bytes discarded per drain, so a babbling line cannot
/// hold the loop.
const MAX_DRAIN_BYTES: usize = 256;

// ───────────────────────────────────────────────────────────────
// Register address
// ───────────────────────────────────────────────────────────────

/// Address of a 16-bit holding register on the drive.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub struct RegisterAddress(pub u16);

impl fmt::Display for RegisterAddress {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "0x{:04X}", self.0)
    }
}

// ───────────────────────────────────────────────────────────────
// Errors and connection status
// ───────────────────────────────────────────────────────────────

/// Protocol-layer outcome of a failed transaction.
///
/// Discriminants are the raw result codes (exception codes for the first
/// four, master-side codes from 0xE0).  Success (0x00) is `Ok`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[repr(u8)]
pub enum ModbusError {
    IllegalFunction = 0x01,
    IllegalDataAddress = 0x02,
    IllegalDataValue = 0x03,
    SlaveDeviceFailure = 0x04,
    InvalidSlaveId = 0xE0,
    InvalidFunction = 0xE1,
    ResponseTimeout = 0xE2,
    InvalidCrc = 0xE3,
}

impl ModbusError {
    pub const fn code(self) -> u8 {
        self as u8
    }

    /// Map an exception code from the drive.  Codes beyond the four
    /// standard ones are reported as a device failure.
    pub const fn from_exception_code(code: u8) -> Self {
        match code {
            0x01 => Self::IllegalFunction,
            0x02 => Self::IllegalDataAddress,
            0x03 => Self::IllegalDataValue,
            _ => Self::SlaveDeviceFailure,
        }
    }

    pub const fn message(self) -> &'static str {
        match self {
            Self::IllegalFunction => "modbus error: illegal function",
            Self::IllegalDataAddress => "modbus error: illegal data address",
            Self::IllegalDataValue => "modbus error: illegal data value",
            Self::SlaveDeviceFailure => "modbus error: slave device failure",
            Self::InvalidSlaveId => "modbus error: invalid slave id",
            Self::InvalidFunction => "modbus error: invalid function",
            Self::ResponseTimeout => "modbus error: response timeout",
            Self::InvalidCrc => "modbus error: invalid crc",
        }
    }

    /// True for errors that say the drive itself is unhealthy or unreachable.
    pub const fn is_device_fault(self) -> bool {
        matches!(self, Self::SlaveDeviceFailure | Self::InvalidSlaveId)
    }
}

impl fmt::Display for ModbusError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.message())
    }
}

/// Health of the link, derived from the last transaction.  Observability
/// only; the control logic never reads it.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConnectionStatus {
    Disconnected,
    Connected,
    ResponseTimeout,
    SlaveDeviceFailure,
    InvalidSlaveId,
}

impl ConnectionStatus {
    /// Status after a transaction finished with `outcome`.
    pub const fn after(outcome: Result<(), ModbusError>) -> Self {
        match outcome {
            Err(ModbusError::SlaveDeviceFailure) => Self::SlaveDeviceFailure,
            Err(ModbusError::InvalidSlaveId) => Self::InvalidSlaveId,
            Err(ModbusError::ResponseTimeout) => Self::ResponseTimeout,
            _ => Self::Connected,
        }
    }
}

// ───────────────────────────────────────────────────────────────
// Direction pins
// ───────────────────────────────────────────────────────────────

/// Placeholder pin type for transceivers without direction control.
#[derive(Debug, Clone, Copy, Default)]
pub struct NoPin;

impl ErrorType for NoPin {
    type Error = Infallible;
}

impl OutputPin for NoPin {
    fn set_low(&mut self) -> Result<(), Infallible> {
        Ok(())
    }

    fn set_high(&mut self) -> Result<(), Infallible> {
        Ok(())
    }
}

/// Everything [`RegisterChannel::connect`] binds.
pub struct ConnectionArgs<S, P = NoPin> {
    pub slave_id: u8,
    pub serial: S,
    /// Driver-enable line, high while transmitting.
    pub data_enable: Option<P>,
    /// Receiver-enable line, high while transmitting.
    pub receiver_enable: Option<P>,
}

struct Link<S, P> {
    slave_id: u8,
    serial: S,
    data_enable: Option<P>,
    receiver_enable: Option<P>,
}

impl<S: Read + ReadReady + Write, P: OutputPin> Link<S, P> {
    fn set_transmitting(&mut self, transmitting: bool) {
        for pin in [&mut self.data_enable, &mut self.receiver_enable]
            .into_iter()
            .flatten()
        {
            let _ = if transmitting {
                pin.set_high()
            } else {
                pin.set_low()
            };
        }
    }

    fn transmit(&mut self, request: &[u8]) -> Result<(), ModbusError> {
        self.set_transmitting(true);
        let sent = match self.serial.write_all(request) {
            Ok(()) => self.serial.flush(),
            Err(e) => Err(e),
        };
        self.set_transmitting(false);
        sent.map_err(|_| ModbusError::ResponseTimeout)
    }

    /// Discard whatever is already waiting on the receive side.
    fn drain_rx(&mut self) {
        let mut scratch = [0u8; 16];
        let mut dropped = 0;
        while dropped < MAX_DRAIN_BYTES && matches!(self.serial.read_ready(), Ok(true)) {
            match self.serial.read(&mut scratch) {
                Ok(0) | Err(_) => break,
                Ok(n) => dropped += n,
            }
        }
        if dropped > 0 {
            debug!("RegisterChannel: discarded {} stale bytes", dropped);
        }
    }

    fn receive(&mut self, buf: &mut [u8]) -> Result<(), ModbusError> {
        self.serial
            .read_exact(buf)
            .map_err(|_| ModbusError::ResponseTimeout)
    }

    /// Send `request` and collect the reply into `reply`, returning its length.
    fn exchange(
        &mut self,
        request: &[u8; REQUEST_LEN],
        reply: &mut [u8; MAX_REPLY_LEN],
    ) -> Result<usize, ModbusError> {
        self.drain_rx();
        self.transmit(request)?;
        let result = self.collect(request, reply);
        if result.is_err() {
            self.drain_rx();
        }
        result
    }

    fn collect(
        &mut self,
        request: &[u8; REQUEST_LEN],
        reply: &mut [u8; MAX_REPLY_LEN],
    ) -> Result<usize, ModbusError> {
        let mut header = [0u8; HEADER_LEN];
        self.receive(&mut header)?;
        reply[..HEADER_LEN].copy_from_slice(&header);

        match frame::parse_header(&header, self.slave_id, request[1])? {
            Header::Exception => {
                self.receive(&mut reply[HEADER_LEN..frame::EXCEPTION_LEN])?;
                Err(frame::decode_exception(&reply[..frame::EXCEPTION_LEN]))
            }
            Header::Reply { total } if total > MAX_REPLY_LEN || total < HEADER_LEN + 2 => {
                Err(ModbusError::InvalidFunction)
            }
            Header::Reply { total } => {
                self.receive(&mut reply[HEADER_LEN..total])?;
                Ok(total)
            }
        }
    }
}

// ───────────────────────────────────────────────────────────────
// Channel
// ───────────────────────────────────────────────────────────────

/// Blocking Modbus-RTU master bound to one drive.
pub struct RegisterChannel<S, D, P = NoPin> {
    link: Option<Link<S, P>>,
    delay: D,
    status: ConnectionStatus,
}

impl<S, D, P> RegisterChannel<S, D, P>
where
    S: Read + ReadReady + Write,
    D: DelayNs,
    P: OutputPin,
{
    /// An unbound channel.  Transactions fail with
    /// [`ModbusError::ResponseTimeout`] until [`connect`](Self::connect).
    pub fn new(delay: D) -> Self {
        Self {
            link: None,
            delay,
            status: ConnectionStatus::Disconnected,
        }
    }

    /// Bind the serial transport and direction pins.  Calling it again
    /// replaces the previous binding.
    pub fn connect(&mut self, args: ConnectionArgs<S, P>) {
        let mut link = Link {
            slave_id: args.slave_id,
            serial: args.serial,
            data_enable: args.data_enable,
            receiver_enable: args.receiver_enable,
        };
        link.set_transmitting(false);
        info!("RegisterChannel: bound to slave {}", link.slave_id);
        self.link = Some(link);
        self.status = ConnectionStatus::Connected;
    }

    /// Drop the binding and hand the transport back.
    pub fn disconnect(&mut self) -> Option<S> {
        self.status = ConnectionStatus::Disconnected;
        self.link.take().map(|link| link.serial)
    }

    pub fn connection_status(&self) -> ConnectionStatus {
        self.status
    }

    pub fn slave_id(&self) -> Option<u8> {
        self.link.as_ref().map(|l| l.slave_id)
    }

    /// Read one holding register (function 0x03).
    pub fn read_holding_register(&mut self, reg: RegisterAddress) -> Result<u16, ModbusError> {
        let result = self.transaction(|slave| frame::encode_read_holding(slave, reg.0), |reply, _| {
            frame::decode_read_response(reply)
        });
        debug!("RegisterChannel: read {} -> {:?}", reg, result);
        result
    }

    /// Write one register (function 0x06).
    pub fn write_register(&mut self, reg: RegisterAddress, value: u16) -> Result<(), ModbusError> {
        let result = self.transaction(
            |slave| frame::encode_write_single(slave, reg.0, value),
            frame::decode_write_response,
        );
        debug!("RegisterChannel: write {} = {} -> {:?}", reg, value, result);
        result
    }

    fn transaction<T>(
        &mut self,
        encode: impl FnOnce(u8) -> [u8; REQUEST_LEN],
        decode: impl FnOnce(&[u8], &[u8; REQUEST_LEN]) -> Result<T, ModbusError>,
    ) -> Result<T, ModbusError> {
        let Self { link, delay, status } = self;
        let Some(link) = link.as_mut() else {
            return Err(ModbusError::ResponseTimeout);
        };

        delay.delay_ms(MIN_SILENT_INTERVAL_MS);

        let request = encode(link.slave_id);
        let mut reply = [0u8; MAX_REPLY_LEN];
        let result = link
            .exchange(&request, &mut reply)
            .and_then(|len| decode(&reply[..len], &request));

        *status = ConnectionStatus::after(result.as_ref().map(|_| ()).map_err(|e| *e));
        result
    }
}

impl<S, D, P> RegisterPort for RegisterChannel<S, D, P>
where
    S: Read + ReadReady + Write,
    D: DelayNs,
    P: OutputPin,
{
    fn read_holding_register(&mut self, reg: RegisterAddress) -> Result<u16, ModbusError> {
        RegisterChannel::read_holding_register(self, reg)
    }

    fn write_register(&mut self, reg: RegisterAddress, value: u16) -> Result<(), ModbusError> {
        RegisterChannel::write_register(self, reg, value)
    }
}
