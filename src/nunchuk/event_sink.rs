//! Event sink contract and the channel-backed sink used by the bridge
//!
//! A sink receives each sample as a burst of axis and button reports closed by
//! a `sync`. [`report_sample`] fixes the order of that burst.

use chrono::{DateTime, Local};
use serde::{Deserialize, Serialize};
use tokio::sync::mpsc;
use tracing::{debug, warn};

use super::frame::{Sample, ACCEL_MAX};

/// Absolute axes exposed by the nunchuk
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Axis {
    /// Stick, horizontal
    X,
    /// Stick, vertical
    Y,
    /// Accelerometer, vertical
    Z,
    /// Accelerometer, horizontal tilt
    TiltX,
    /// Accelerometer, forward tilt
    TiltY,
}

impl Axis {
    pub const ALL: [Axis; 5] = [Axis::X, Axis::Y, Axis::Z, Axis::TiltX, Axis::TiltY];

    /// Inclusive value range a sink must accept for this axis
    pub fn range(self) -> (u16, u16) {
        match self {
            Axis::X | Axis::Y => (0, u16::from(u8::MAX)),
            Axis::Z | Axis::TiltX | Axis::TiltY => (0, ACCEL_MAX),
        }
    }
}

/// Events [`report_sample`] emits per sample, not counting the sync
pub const EVENTS_PER_SAMPLE: usize = Axis::ALL.len() + Button::ALL.len();

/// Buttons exposed by the nunchuk
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Button {
    C,
    Z,
}

impl Button {
    pub const ALL: [Button; 2] = [Button::C, Button::Z];
}

/// Consumer of decoded input events
///
/// Only the poll worker calls into a sink, one sample at a time.
pub trait EventSink: Send {
    fn report_axis(&mut self, axis: Axis, value: u16);

    fn report_button(&mut self, button: Button, pressed: bool);

    /// Marks the end of one sample
    fn sync(&mut self);
}

impl<S: EventSink + ?Sized> EventSink for Box<S> {
    fn report_axis(&mut self, axis: Axis, value: u16) {
        (**self).report_axis(axis, value)
    }

    fn report_button(&mut self, button: Button, pressed: bool) {
        (**self).report_button(button, pressed)
    }

    fn sync(&mut self) {
        (**self).sync()
    }
}

/// Forward one sample to `sink` in the fixed event order
pub fn report_sample<S: EventSink + ?Sized>(sink: &mut S, sample: Sample) {
    sink.report_axis(Axis::X, u16::from(sample.stick_x));
    sink.report_axis(Axis::Y, u16::from(sample.stick_y));
    sink.report_axis(Axis::TiltX, sample.accel_x);
    sink.report_axis(Axis::TiltY, sample.accel_y);
    sink.report_axis(Axis::Z, sample.accel_z);
    sink.report_button(Button::C, sample.button_c);
    sink.report_button(Button::Z, sample.button_z);
    sink.sync();
}

/// A single input event as delivered to consumers
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum InputEvent {
    Axis { axis: Axis, value: u16 },
    Button { button: Button, pressed: bool },
}

/// All events belonging to one sample
#[derive(Debug, Clone)]
pub struct EventPacket {
    pub events: Vec<InputEvent>,
    pub timestamp: DateTime<Local>,
}

/// Sink that batches events until `sync` and ships them over a tokio channel
///
/// Sending never blocks the poll worker: when the consumer falls behind or
/// goes away the packet is dropped.
#[derive(Debug)]
pub struct ChannelSink {
    pending: Vec<InputEvent>,
    sender: mpsc::Sender<EventPacket>,
    dropped: u64,
}

impl ChannelSink {
    pub fn new(capacity: usize) -> (Self, mpsc::Receiver<EventPacket>) {
        let (sender, receiver) = mpsc::channel(capacity.max(1));
        debug!("Created event channel with buffer capacity {}", capacity);
        (
            Self {
                pending: Vec::with_capacity(EVENTS_PER_SAMPLE),
                sender,
                dropped: 0,
            },
            receiver,
        )
    }

    /// Number of packets dropped because the channel was full or closed
    pub fn dropped(&self) -> u64 {
        self.dropped
    }
}

impl EventSink for ChannelSink {
    fn report_axis(&mut self, axis: Axis, value: u16) {
        self.pending.push(InputEvent::Axis { axis, value });
    }

    fn report_button(&mut self, button: Button, pressed: bool) {
        self.pending.push(InputEvent::Button { button, pressed });
    }

    fn sync(&mut self) {
        let events = std::mem::replace(
            &mut self.pending,
            Vec::with_capacity(EVENTS_PER_SAMPLE),
        );
        let packet = EventPacket {
            events,
            timestamp: Local::now(),
        };

        if let Err(e) = self.sender.try_send(packet) {
            self.dropped += 1;
            warn!("Dropping event packet: {}", e);
        }
    }
}
