//! Nunchuk subsystem: I2C polling, frame decoding and event delivery
//!
//! # Architecture
//!
//! ```text
//! I2cTransport ──► PollEngine ──► EventSink ──► consumer
//!                  (decode)        (axis/button/sync)
//!                      ▲
//!                  Session (worker thread) ◄── InputDevice open/close
//! ```
//!
//! One cycle takes roughly 16 ms: handshake every tenth cycle, 1 ms settle,
//! poll request, 1 ms settle, six byte read, report, 14 ms pause.

pub mod error;
pub mod event_sink;
pub mod frame;
pub mod input_device;
pub mod poll_engine;
pub mod session;
pub mod transport;

pub use error::{CycleFault, NunchukError, TransportError};
pub use event_sink::{
    report_sample, Axis, Button, ChannelSink, EventPacket, EventSink, InputEvent, EVENTS_PER_SAMPLE,
};
pub use frame::{decode, deobfuscate, unpack, RawFrame, Sample, FRAME_LEN};
pub use input_device::{AxisInfo, DeviceDescriptor, InputDevice};
pub use poll_engine::{CycleReport, PollEngine, ProtocolTiming};
pub use session::{Session, SessionState};
pub use transport::{I2cTransport, Transport, NUNCHUK_ADDRESS};
