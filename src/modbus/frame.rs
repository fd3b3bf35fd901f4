//! Modbus-RTU frame codec.
//!
//! Only the two transactions the pump controller needs are supported:
//! read one holding register (function 0x03) and write one register
//! (function 0x06).  Multi-byte fields are big-endian except the trailing
//! CRC, which is sent low byte first.
//!
//! ```text
//!  0x03 request   [id][03][addr hi][addr lo][00][01][crc lo][crc hi]
//!  0x03 response  [id][03][02][val hi][val lo][crc lo][crc hi]
//!  0x06 request   [id][06][addr hi][addr lo][val hi][val lo][crc lo][crc hi]
//!  0x06 response  echo of the request
//!  exception      [id][fn | 0x80][code][crc lo][crc hi]
//! ```

use super::ModbusError;

pub const FN_READ_HOLDING_REGISTERS: u8 = 0x03;
pub const FN_WRITE_SINGLE_REGISTER: u8 = 0x06;

/// Set on the function byte of an exception response.
pub const EXCEPTION_FLAG: u8 = 0x80;

/// Length of both request kinds and of the 0x06 echo.
pub const REQUEST_LEN: usize = 8;
/// Length of a single-register 0x03 response.
pub const READ_RESPONSE_LEN: usize = 7;
/// Length of an exception response.
pub const EXCEPTION_LEN: usize = 5;
/// Bytes read before the response kind is known.
pub const HEADER_LEN: usize = 3;

/// CRC-16/MODBUS (reflected polynomial 0xA001, initial value 0xFFFF).
pub fn crc16(data: &[u8]) -> u16 {
    let mut crc = 0xFFFFu16;
    for &byte in data {
        crc ^= u16::from(byte);
        for _ in 0..8 {
            if crc & 0x0001 != 0 {
                crc = (crc >> 1) ^ 0xA001;
            } else {
                crc >>= 1;
            }
        }
    }
    crc
}

fn append_crc(frame: &mut [u8; REQUEST_LEN]) {
    let crc = crc16(&frame[..REQUEST_LEN - 2]);
    frame[REQUEST_LEN - 2..].copy_from_slice(&crc.to_le_bytes());
}

fn crc_ok(frame: &[u8]) -> bool {
    let (body, tail) = frame.split_at(frame.len() - 2);
    crc16(body).to_le_bytes() == [tail[0], tail[1]]
}

/// Build a request reading one holding register.
pub fn encode_read_holding(slave: u8, address: u16) -> [u8; REQUEST_LEN] {
    let [hi, lo] = address.to_be_bytes();
    let mut frame = [slave, FN_READ_HOLDING_REGISTERS, hi, lo, 0x00, 0x01, 0, 0];
    append_crc(&mut frame);
    frame
}

/// Build a request writing one register.
pub fn encode_write_single(slave: u8, address: u16, value: u16) -> [u8; REQUEST_LEN] {
    let [ahi, alo] = address.to_be_bytes();
    let [vhi, vlo] = value.to_be_bytes();
    let mut frame = [slave, FN_WRITE_SINGLE_REGISTER, ahi, alo, vhi, vlo, 0, 0];
    append_crc(&mut frame);
    frame
}

/// What the three header bytes of a response announce.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Header {
    /// A normal reply; `total` is the full frame length including CRC.
    Reply { total: usize },
    /// An exception reply; always [`EXCEPTION_LEN`] bytes.
    Exception,
}

/// Validate the first [`HEADER_LEN`] response bytes against the request.
pub fn parse_header(header: &[u8; HEADER_LEN], slave: u8, function: u8) -> Result<Header, ModbusError> {
    if header[0] != slave {
        return Err(ModbusError::InvalidSlaveId);
    }
    if header[1] == function | EXCEPTION_FLAG {
        return Ok(Header::Exception);
    }
    if header[1] != function {
        return Err(ModbusError::InvalidFunction);
    }
    let total = match function {
        // [id][fn][byte count] + data + crc
        FN_READ_HOLDING_REGISTERS => HEADER_LEN + header[2] as usize + 2,
        _ => REQUEST_LEN,
    };
    Ok(Header::Reply { total })
}

/// Decode a complete exception frame into the error it reports.
pub fn decode_exception(frame: &[u8]) -> ModbusError {
    if frame.len() != EXCEPTION_LEN || !crc_ok(frame) {
        return ModbusError::InvalidCrc;
    }
    ModbusError::from_exception_code(frame[2])
}

/// Decode a complete 0x03 reply carrying one register.
pub fn decode_read_response(frame: &[u8]) -> Result<u16, ModbusError> {
    if frame.len() < HEADER_LEN + 2 || !crc_ok(frame) {
        return Err(ModbusError::InvalidCrc);
    }
    if frame[2] != 2 || frame.len() != READ_RESPONSE_LEN {
        return Err(ModbusError::InvalidFunction);
    }
    Ok(u16::from_be_bytes([frame[3], frame[4]]))
}

/// Check a complete 0x06 reply echoes the request.
pub fn decode_write_response(frame: &[u8], request: &[u8; REQUEST_LEN]) -> Result<(), ModbusError> {
    if frame.len() != REQUEST_LEN || !crc_ok(frame) {
        return Err(ModbusError::InvalidCrc);
    }
    if frame[2..6] != request[2..6] {
        return Err(ModbusError::InvalidFunction);
    }
    Ok(())
}
