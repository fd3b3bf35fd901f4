//! Register channel tests against a simulated RS-485 slave.
//!
//! The slave answers real RTU frames, so these cover framing, CRC,
//! direction-pin sequencing and inter-frame delay together.

use std::cell::RefCell;
use std::rc::Rc;

use super::mock_hw::{
    BusEvent, BusLog, FLOOD_REG, FREQ_REG, LoggedPin, MockDrive, NoDelay, PRESSURE_REG, RUN_REG,
    RecordingSink, SimSlave,
};

use pumpctl::adapters::hardware::HardwareAdapter;
use pumpctl::clock::Instant;
use pumpctl::config::ControllerConfig;
use pumpctl::control::pump::PumpController;
use pumpctl::modbus::frame;
use pumpctl::modbus::{
    ConnectionArgs, ConnectionStatus, MIN_SILENT_INTERVAL_MS, ModbusError, RegisterAddress,
    RegisterChannel,
};
use pumpctl::scheduler::EventQueue;

const SLAVE: u8 = 1;

fn bus() -> BusLog {
    Rc::new(RefCell::new(Vec::new()))
}

fn pins(log: &BusLog) -> (Option<LoggedPin>, Option<LoggedPin>) {
    (
        Some(LoggedPin { name: "DE", log: log.clone() }),
        Some(LoggedPin { name: "RE", log: log.clone() }),
    )
}

fn slave_with_drive(log: &BusLog) -> SimSlave {
    let mut slave = SimSlave::new(SLAVE, log.clone());
    slave.registers.insert(RUN_REG, 0);
    slave.registers.insert(FREQ_REG, 0);
    slave.registers.insert(PRESSURE_REG, 700);
    slave.registers.insert(FLOOD_REG, 1000);
    slave
}

fn bare(slave: SimSlave) -> RegisterChannel<SimSlave, NoDelay> {
    let mut channel: RegisterChannel<SimSlave, NoDelay> = RegisterChannel::new(NoDelay::default());
    channel.connect(ConnectionArgs {
        slave_id: SLAVE,
        serial: slave,
        data_enable: None,
        receiver_enable: None,
    });
    channel
}

// ── Binding ───────────────────────────────────────────────────

#[test]
fn unbound_channel_times_out_without_touching_the_bus() {
    let mut delay = NoDelay::default();
    {
        let mut channel: RegisterChannel<SimSlave, &mut NoDelay> = RegisterChannel::new(&mut delay);
        assert_eq!(
            channel.read_holding_register(RegisterAddress(RUN_REG)),
            Err(ModbusError::ResponseTimeout)
        );
        assert_eq!(
            channel.write_register(RegisterAddress(RUN_REG), 1),
            Err(ModbusError::ResponseTimeout)
        );
        assert_eq!(channel.connection_status(), ConnectionStatus::Disconnected);
        assert_eq!(channel.slave_id(), None);
    }
    assert_eq!(delay.total_ms, 0);
}

#[test]
fn connect_parks_direction_pins_in_receive() {
    let log = bus();
    let (de, re) = pins(&log);
    let mut channel: RegisterChannel<SimSlave, NoDelay, LoggedPin> =
        RegisterChannel::new(NoDelay::default());
    channel.connect(ConnectionArgs {
        slave_id: SLAVE,
        serial: SimSlave::new(SLAVE, log.clone()),
        data_enable: de,
        receiver_enable: re,
    });
    assert_eq!(
        *log.borrow(),
        vec![BusEvent::Pin("DE", false), BusEvent::Pin("RE", false)]
    );
    assert_eq!(channel.connection_status(), ConnectionStatus::Connected);
    assert_eq!(channel.slave_id(), Some(SLAVE));
}

// ── Transactions ──────────────────────────────────────────────

#[test]
fn read_frames_request_between_pin_edges() {
    let log = bus();
    let (de, re) = pins(&log);
    let mut channel: RegisterChannel<SimSlave, NoDelay, LoggedPin> =
        RegisterChannel::new(NoDelay::default());
    channel.connect(ConnectionArgs {
        slave_id: SLAVE,
        serial: slave_with_drive(&log),
        data_enable: de,
        receiver_enable: re,
    });
    log.borrow_mut().clear();

    assert_eq!(channel.read_holding_register(RegisterAddress(PRESSURE_REG)), Ok(700));
    assert_eq!(
        *log.borrow(),
        vec![
            BusEvent::Pin("DE", true),
            BusEvent::Pin("RE", true),
            BusEvent::Sent(frame::encode_read_holding(SLAVE, PRESSURE_REG).to_vec()),
            BusEvent::Pin("DE", false),
            BusEvent::Pin("RE", false),
        ]
    );
}

#[test]
fn every_transaction_waits_the_silent_interval() {
    let log = bus();
    let mut delay = NoDelay::default();
    {
        let mut channel: RegisterChannel<SimSlave, &mut NoDelay> = RegisterChannel::new(&mut delay);
        channel.connect(ConnectionArgs {
            slave_id: SLAVE,
            serial: slave_with_drive(&log),
            data_enable: None,
            receiver_enable: None,
        });
        channel.read_holding_register(RegisterAddress(RUN_REG)).unwrap();
        channel.write_register(RegisterAddress(RUN_REG), 1).unwrap();
        let _ = channel.read_holding_register(RegisterAddress(0x7777));
    }
    assert_eq!(delay.total_ms, 3 * u64::from(MIN_SILENT_INTERVAL_MS));
}

#[test]
fn write_updates_slave_register() {
    let log = bus();
    let mut channel = bare(slave_with_drive(&log));
    assert_eq!(channel.write_register(RegisterAddress(FREQ_REG), 5400), Ok(()));
    assert_eq!(channel.read_holding_register(RegisterAddress(FREQ_REG)), Ok(5400));

    let slave = channel.disconnect().unwrap();
    assert_eq!(slave.registers.get(&FREQ_REG), Some(&5400));
    assert_eq!(channel.connection_status(), ConnectionStatus::Disconnected);
}

#[test]
fn exception_reply_maps_to_error_and_link_stays_up() {
    let log = bus();
    let mut channel = bare(slave_with_drive(&log));
    assert_eq!(
        channel.read_holding_register(RegisterAddress(0x7777)),
        Err(ModbusError::IllegalDataAddress)
    );
    assert_eq!(channel.connection_status(), ConnectionStatus::Connected);
}

#[test]
fn silent_slave_reports_timeout_then_recovers() {
    let log = bus();
    let mut slave = slave_with_drive(&log);
    slave.silent = true;
    let mut channel = bare(slave);

    assert_eq!(
        channel.read_holding_register(RegisterAddress(RUN_REG)),
        Err(ModbusError::ResponseTimeout)
    );
    assert_eq!(channel.connection_status(), ConnectionStatus::ResponseTimeout);

    let mut slave = channel.disconnect().unwrap();
    slave.silent = false;
    channel.connect(ConnectionArgs {
        slave_id: SLAVE,
        serial: slave,
        data_enable: None,
        receiver_enable: None,
    });
    assert_eq!(channel.read_holding_register(RegisterAddress(RUN_REG)), Ok(0));
    assert_eq!(channel.connection_status(), ConnectionStatus::Connected);
}

#[test]
fn request_for_another_slave_times_out() {
    let log = bus();
    let slave = SimSlave::new(SLAVE + 1, log.clone());
    let mut channel = bare(slave);
    assert_eq!(
        channel.read_holding_register(RegisterAddress(RUN_REG)),
        Err(ModbusError::ResponseTimeout)
    );
}

#[test]
fn late_reply_is_not_taken_for_the_next_answer() {
    let log = bus();
    let mut slave = slave_with_drive(&log);
    slave.silent = true;
    let mut channel = bare(slave);
    assert_eq!(
        channel.read_holding_register(RegisterAddress(RUN_REG)),
        Err(ModbusError::ResponseTimeout)
    );

    // The run-register answer (value 1) turns up after the timeout.
    let mut slave = channel.disconnect().unwrap();
    slave.silent = false;
    let [hi, lo] = 1u16.to_be_bytes();
    let body = [SLAVE, frame::FN_READ_HOLDING_REGISTERS, 2, hi, lo];
    slave.push_stale(&body);
    slave.push_stale(&frame::crc16(&body).to_le_bytes());
    channel.connect(ConnectionArgs {
        slave_id: SLAVE,
        serial: slave,
        data_enable: None,
        receiver_enable: None,
    });

    assert_eq!(channel.read_holding_register(RegisterAddress(PRESSURE_REG)), Ok(700));
}

#[test]
fn foreign_frame_does_not_desync_the_next_read() {
    let log = bus();
    let mut slave = slave_with_drive(&log);
    slave.reply_as = Some(9);
    let mut channel = bare(slave);

    assert_eq!(
        channel.read_holding_register(RegisterAddress(PRESSURE_REG)),
        Err(ModbusError::InvalidSlaveId)
    );
    assert_eq!(channel.connection_status(), ConnectionStatus::InvalidSlaveId);

    assert_eq!(channel.read_holding_register(RegisterAddress(PRESSURE_REG)), Ok(700));
    assert_eq!(channel.connection_status(), ConnectionStatus::Connected);
}

// ── End to end ────────────────────────────────────────────────

#[test]
fn pump_controller_drives_slave_over_the_bus() {
    let log = bus();
    let mut hw = HardwareAdapter::new(bare(slave_with_drive(&log)), MockDrive::new());
    let mut sink = RecordingSink::new();
    let mut timers: EventQueue = EventQueue::new();

    let mut pump = PumpController::new(ControllerConfig::default());
    pump.begin(&mut hw, &mut sink);
    pump.update(&mut hw, &mut timers, Instant::EPOCH, &mut sink);

    assert!(sink.modbus_errors().is_empty());
    assert_eq!(sink.values("pressure"), vec![700]);

    let sent = log
        .borrow()
        .iter()
        .filter(|e| matches!(e, BusEvent::Sent(_)))
        .count();
    // begin: 2 writes + 2 reads; update: 2 pulls + 2 reads + 2 writes.
    assert_eq!(sent, 10);

    let slave = hw.registers_mut().disconnect().unwrap();
    assert_eq!(slave.registers.get(&RUN_REG), Some(&1));
    assert_eq!(slave.registers.get(&FREQ_REG), Some(&6000));
}
