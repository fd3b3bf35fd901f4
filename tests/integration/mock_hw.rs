//! Mock hardware for integration tests.
//!
//! Records every register write and event so tests can assert on the
//! full command history without a drive on the bus.

use std::cell::{Cell, RefCell};
use std::collections::{HashMap, VecDeque};
use std::rc::Rc;

use pumpctl::app::events::AppEvent;
use pumpctl::app::ports::{AnalogPort, EventSink, RegisterPort};
use pumpctl::clock::TickSource;
use pumpctl::config::AnalogChannel;
use pumpctl::modbus::frame::{self, FN_READ_HOLDING_REGISTERS, FN_WRITE_SINGLE_REGISTER};
use pumpctl::modbus::{ModbusError, RegisterAddress};

pub const RUN_REG: u16 = 0x2501;
pub const FREQ_REG: u16 = 0x2502;
pub const PRESSURE_REG: u16 = 0x0C1A;
pub const FLOOD_REG: u16 = 0x0C19;

// ── MockDrive ─────────────────────────────────────────────────

/// A drive whose registers live in a map.  Reads of a register with
/// scripted results consume those first.
#[derive(Default)]
pub struct MockDrive {
    pub registers: HashMap<u16, u16>,
    pub scripted: HashMap<u16, VecDeque<Result<u16, ModbusError>>>,
    pub analog: HashMap<u8, u16>,
    pub writes: Vec<(u16, u16)>,
    pub fail_writes: Option<ModbusError>,
}

#[allow(dead_code)]
impl MockDrive {
    pub fn new() -> Self {
        Self::default()
    }

    /// A drive with the default register map populated: stopped, dry.
    pub fn idle() -> Self {
        let mut d = Self::new();
        d.registers.insert(RUN_REG, 0);
        d.registers.insert(FREQ_REG, 0);
        d.registers.insert(PRESSURE_REG, 800);
        d.registers.insert(FLOOD_REG, 1000);
        d
    }

    pub fn set(&mut self, reg: u16, value: u16) {
        self.registers.insert(reg, value);
    }

    pub fn script(&mut self, reg: u16, results: impl IntoIterator<Item = Result<u16, ModbusError>>) {
        self.scripted.entry(reg).or_default().extend(results);
    }

    pub fn writes_to(&self, reg: u16) -> Vec<u16> {
        self.writes
            .iter()
            .filter(|(r, _)| *r == reg)
            .map(|(_, v)| *v)
            .collect()
    }

    pub fn value(&self, reg: u16) -> Option<u16> {
        self.registers.get(&reg).copied()
    }
}

impl RegisterPort for MockDrive {
    fn read_holding_register(&mut self, reg: RegisterAddress) -> Result<u16, ModbusError> {
        if let Some(next) = self.scripted.get_mut(&reg.0).and_then(VecDeque::pop_front) {
            return next;
        }
        self.registers
            .get(&reg.0)
            .copied()
            .ok_or(ModbusError::IllegalDataAddress)
    }

    fn write_register(&mut self, reg: RegisterAddress, value: u16) -> Result<(), ModbusError> {
        self.writes.push((reg.0, value));
        if let Some(e) = self.fail_writes {
            return Err(e);
        }
        self.registers.insert(reg.0, value);
        Ok(())
    }
}

impl AnalogPort for MockDrive {
    fn read_analog(&mut self, channel: AnalogChannel) -> Option<u16> {
        self.analog.get(&channel.0).copied()
    }
}

// ── RecordingSink ─────────────────────────────────────────────

#[derive(Default)]
pub struct RecordingSink {
    pub events: Vec<AppEvent>,
}

#[allow(dead_code)]
impl RecordingSink {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn modbus_errors(&self) -> Vec<ModbusError> {
        self.events
            .iter()
            .filter_map(|e| match e {
                AppEvent::ModbusError(err) => Some(*err),
                _ => None,
            })
            .collect()
    }

    /// Every value reported under `label`, oldest first.
    pub fn values(&self, wanted: &str) -> Vec<u16> {
        self.events
            .iter()
            .filter_map(|e| match e {
                AppEvent::Value { label, value, .. } if *label == wanted => Some(*value),
                _ => None,
            })
            .collect()
    }

    pub fn clear(&mut self) {
        self.events.clear();
    }
}

impl EventSink for RecordingSink {
    fn emit(&mut self, event: &AppEvent) {
        self.events.push(event.clone());
    }
}

// ── ManualTicks ───────────────────────────────────────────────

/// Raw millisecond counter the test sets by hand.
pub struct ManualTicks(pub Rc<Cell<u32>>);

impl TickSource for ManualTicks {
    fn millis(&mut self) -> u32 {
        self.0.get()
    }
}

/// A tick source and the handle that drives it.
pub fn manual_ticks(start: u32) -> (ManualTicks, Rc<Cell<u32>>) {
    let handle = Rc::new(Cell::new(start));
    (ManualTicks(handle.clone()), handle)
}

// ── Simulated Modbus slave on a serial line ───────────────────

/// Shared, ordered log of bus activity: pin edges and frames.
pub type BusLog = Rc<RefCell<Vec<BusEvent>>>;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum BusEvent {
    Pin(&'static str, bool),
    Sent(Vec<u8>),
}

/// Serial endpoint backed by an in-memory Modbus slave.  Requests are
/// answered when the master flushes.
pub struct SimSlave {
    pub slave_id: u8,
    pub registers: HashMap<u16, u16>,
    /// When set, requests get no reply at all.
    pub silent: bool,
    /// When set, the next reply goes out under this slave id instead.
    pub reply_as: Option<u8>,
    tx: Vec<u8>,
    rx: VecDeque<u8>,
    log: BusLog,
}

#[allow(dead_code)]
impl SimSlave {
    pub fn new(slave_id: u8, log: BusLog) -> Self {
        Self {
            slave_id,
            registers: HashMap::new(),
            silent: false,
            reply_as: None,
            tx: Vec::new(),
            rx: VecDeque::new(),
            log,
        }
    }

    /// Put bytes on the line as if they arrived late from an earlier exchange.
    pub fn push_stale(&mut self, bytes: &[u8]) {
        self.rx.extend(bytes.iter().copied());
    }

    fn answer(&mut self, request: &[u8]) {
        if self.silent || request.len() != frame::REQUEST_LEN || request[0] != self.slave_id {
            return;
        }
        let id = self.reply_as.take().unwrap_or(self.slave_id);
        let addr = u16::from_be_bytes([request[2], request[3]]);
        let mut body: Vec<u8> = match request[1] {
            FN_READ_HOLDING_REGISTERS => match self.registers.get(&addr) {
                Some(v) => {
                    let [hi, lo] = v.to_be_bytes();
                    vec![id, FN_READ_HOLDING_REGISTERS, 2, hi, lo]
                }
                None => vec![id, FN_READ_HOLDING_REGISTERS | 0x80, 0x02],
            },
            FN_WRITE_SINGLE_REGISTER => {
                let value = u16::from_be_bytes([request[4], request[5]]);
                self.registers.insert(addr, value);
                request[..6].to_vec()
            }
            f => vec![id, f | 0x80, 0x01],
        };
        body[0] = id;
        let crc = frame::crc16(&body).to_le_bytes();
        self.rx.extend(body);
        self.rx.extend(crc);
    }
}

#[derive(Debug)]
pub struct LineIdle;

impl embedded_io::Error for LineIdle {
    fn kind(&self) -> embedded_io::ErrorKind {
        embedded_io::ErrorKind::TimedOut
    }
}

impl embedded_io::ErrorType for SimSlave {
    type Error = LineIdle;
}

impl embedded_io::Read for SimSlave {
    fn read(&mut self, buf: &mut [u8]) -> Result<usize, LineIdle> {
        let mut n = 0;
        while n < buf.len() {
            match self.rx.pop_front() {
                Some(b) => {
                    buf[n] = b;
                    n += 1;
                }
                None => break,
            }
        }
        if n == 0 { Err(LineIdle) } else { Ok(n) }
    }
}

impl embedded_io::ReadReady for SimSlave {
    fn read_ready(&mut self) -> Result<bool, LineIdle> {
        Ok(!self.rx.is_empty())
    }
}

impl embedded_io::Write for SimSlave {
    fn write(&mut self, buf: &[u8]) -> Result<usize, LineIdle> {
        self.tx.extend_from_slice(buf);
        Ok(buf.len())
    }

    fn flush(&mut self) -> Result<(), LineIdle> {
        let request = std::mem::take(&mut self.tx);
        self.log.borrow_mut().push(BusEvent::Sent(request.clone()));
        self.answer(&request);
        Ok(())
    }
}

/// Direction pin that records its edges into the bus log.
pub struct LoggedPin {
    pub name: &'static str,
    pub log: BusLog,
}

impl embedded_hal::digital::ErrorType for LoggedPin {
    type Error = core::convert::Infallible;
}

impl embedded_hal::digital::OutputPin for LoggedPin {
    fn set_low(&mut self) -> Result<(), Self::Error> {
        self.log.borrow_mut().push(BusEvent::Pin(self.name, false));
        Ok(())
    }

    fn set_high(&mut self) -> Result<(), Self::Error> {
        self.log.borrow_mut().push(BusEvent::Pin(self.name, true));
        Ok(())
    }
}

/// Delay that only adds up what it was asked to wait.
#[derive(Default)]
pub struct NoDelay {
    pub total_ms: u64,
}

impl embedded_hal::delay::DelayNs for NoDelay {
    fn delay_ns(&mut self, ns: u32) {
        self.total_ms += u64::from(ns / 1_000_000);
    }

    fn delay_ms(&mut self, ms: u32) {
        self.total_ms += u64::from(ms);
    }
}
