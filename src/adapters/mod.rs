//! Adapters — concrete implementations of the hexagonal port traits.
//!
//! | Adapter         | Implements        | Connects to                   |
//! |-----------------|-------------------|-------------------------------|
//! | `console`       | ConsolePort       | UART0 / stdin + stdout        |
//! | `flash_store`   | LogStorePort      | SPIFFS VFS / host directory   |
//! | `log_sink`      | EventSink         | Serial log output             |
//! | `power`         | PowerPort         | ESP32 sleep + touch sensor    |
//! | `retained`      | RetainedFlag      | RTC slow memory               |
//! | `tcp_transport` | ListenerPort      | lwIP / host TCP socket        |
//! | `time`          | ClockPort         | System clock (RTC-backed)     |
//! | `wifi_ap`       | AccessPointPort   | ESP-IDF WiFi soft AP          |

pub mod console;
pub mod flash_store;
pub mod log_sink;
pub mod power;
pub mod retained;
pub mod tcp_transport;
pub mod time;
pub(super) mod utils;
pub mod wifi_ap;
