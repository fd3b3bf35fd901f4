//! Adapters — concrete implementations of the hexagonal port traits.
//!
//! | Adapter        | Implements         | Connects to                 |
//! |----------------|--------------------|-----------------------------|
//! | `config_file`  | ConfigPort         | JSON file on SPIFFS / host  |
//! | `hardware`     | RegisterPort       | Modbus register channel     |
//! |                | AnalogPort         | ESP32 ADC1                  |
//! | `log_sink`     | EventSink          | Serial log output           |
//! | `serial`       | embedded_io        | ESP-IDF UART (RS-485)       |
//! | `time`         | TickSource         | ESP32 system timer          |
//! |                | DelayNs            | FreeRTOS delay              |

pub mod config_file;
pub mod hardware;
pub mod log_sink;
pub mod serial;
pub mod time;
