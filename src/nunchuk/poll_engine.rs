//! Poll engine driving the nunchuk's handshake/request/read cycle
//!
//! The nunchuk has no interrupt line, so data is fetched by polling. Every
//! cycle optionally re-sends the handshake (the device drops into sleep if it
//! is not refreshed), asks for a report, reads six bytes and forwards the
//! decoded sample to the sink.
//!
//! # State Machine
//!
//! ```text
//! Idle ──begin()──► Polling ──run_until_stopped() / finish()──► Idle
//! ```
//!
//! An idle engine owns its transport and sink but never touches them, so a
//! session can hand it to a fresh worker thread on every start.

use chrono::Local;
use statum::{machine, state};
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;
use tracing::{debug, info, warn};

use super::error::CycleFault;
use super::event_sink::{report_sample, EventSink};
use super::frame::{deobfuscate, unpack, RawFrame, Sample, FRAME_LEN};
use super::transport::Transport;
use crate::config::PartialFramePolicy;

/// Keep-alive written every [`HANDSHAKE_INTERVAL`] cycles
pub const HANDSHAKE: [u8; 2] = [0x40, 0x00];

/// Command byte asking the device to prepare a report
pub const POLL_REQUEST: u8 = 0x00;

/// Cycles between two handshakes
pub const HANDSHAKE_INTERVAL: u16 = 10;

/// Time the device needs between two bus operations
pub const SETTLE_DELAY: Duration = Duration::from_millis(1);

/// Pause after each report; sets the sample rate to roughly 60 Hz
pub const POLL_INTERVAL: Duration = Duration::from_millis(14);

const STATS_INTERVAL_SECS: i64 = 10;

/// Whether a handshake is due on the cycle carrying `counter`
#[inline]
pub fn handshake_due(counter: u16) -> bool {
    counter % HANDSHAKE_INTERVAL == 0
}

/// Fixed delays of one cycle
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct ProtocolTiming {
    /// Slept after the handshake and again after the poll request
    pub settle: Duration,
    /// Slept after the sample has been forwarded
    pub poll_interval: Duration,
}

impl Default for ProtocolTiming {
    fn default() -> Self {
        Self {
            settle: SETTLE_DELAY,
            poll_interval: POLL_INTERVAL,
        }
    }
}

impl ProtocolTiming {
    /// Upper bound on how long a stop request waits for the current cycle
    pub fn cycle_budget(&self) -> Duration {
        self.settle * 2 + self.poll_interval
    }
}

/// Outcome of a single cycle
#[derive(Debug, Default)]
pub struct CycleReport {
    /// Counter value the cycle ran with, before incrementing
    pub cycle: u16,
    pub handshake_sent: bool,
    /// Sample forwarded to the sink, if any
    pub sample: Option<Sample>,
    pub faults: Vec<CycleFault>,
}

#[derive(Debug)]
struct PollStats {
    cycles: u64,
    samples: u64,
    faults: u64,
    window_start: chrono::DateTime<Local>,
}

impl Default for PollStats {
    fn default() -> Self {
        Self {
            cycles: 0,
            samples: 0,
            faults: 0,
            window_start: Local::now(),
        }
    }
}

impl PollStats {
    fn record(&mut self, report: &CycleReport) {
        self.cycles += 1;
        self.samples += u64::from(report.sample.is_some());
        self.faults += report.faults.len() as u64;

        let now = Local::now();
        let elapsed = now - self.window_start;
        if elapsed > chrono::Duration::seconds(STATS_INTERVAL_SECS) {
            let secs = elapsed.num_milliseconds() as f64 / 1000.0;
            info!(
                "Poll stats: {} cycles, {} samples, {} faults in {:.1}s ({:.1} samples/sec)",
                self.cycles,
                self.samples,
                self.faults,
                secs,
                self.samples as f64 / secs
            );
            *self = Self {
                window_start: now,
                ..Self::default()
            };
        }
    }
}

#[state]
#[derive(Debug, Clone)]
pub enum PollState {
    Idle,
    Polling,
}

#[machine]
pub struct PollEngine<S: PollState> {
    transport: Box<dyn Transport>,
    sink: Box<dyn EventSink>,
    timing: ProtocolTiming,
    partial_frame: PartialFramePolicy,
    cycle_counter: u16,
    // Holds the last frame de-obfuscated; a short read leaves its tail here.
    buffer: RawFrame,
    stats: PollStats,
}

impl<S: PollState> PollEngine<S> {
    pub fn cycle_counter(&self) -> u16 {
        self.cycle_counter
    }
}

impl PollEngine<Idle> {
    pub fn create(
        transport: Box<dyn Transport>,
        sink: Box<dyn EventSink>,
        timing: ProtocolTiming,
        partial_frame: PartialFramePolicy,
    ) -> Self {
        debug!(
            "Creating poll engine with timing {:?}, partial frames: {:?}",
            timing, partial_frame
        );
        Self::new(
            transport,
            sink,
            timing,
            partial_frame,
            0,              // cycle_counter
            [0; FRAME_LEN], // buffer
            PollStats::default(),
        )
    }

    /// Every run counts from zero, so its first cycle carries a handshake
    pub fn begin(mut self) -> PollEngine<Polling> {
        info!("Poll engine starting");
        self.cycle_counter = 0;
        self.stats = PollStats::default();
        self.transition()
    }
}

impl PollEngine<Polling> {
    /// Run one full handshake/request/read/report cycle, delays included
    pub fn run_cycle(&mut self) -> CycleReport {
        let mut report = CycleReport {
            cycle: self.cycle_counter,
            ..CycleReport::default()
        };

        if handshake_due(self.cycle_counter) {
            report.handshake_sent = true;
            match self.transport.write(&HANDSHAKE) {
                Ok(written) if written < HANDSHAKE.len() => {
                    report.faults.push(CycleFault::HandshakeIncomplete {
                        written,
                        expected: HANDSHAKE.len(),
                    });
                }
                Ok(_) => debug!("Handshake sent on cycle {}", self.cycle_counter),
                Err(e) => report.faults.push(CycleFault::HandshakeFailed(e)),
            }
        }
        self.cycle_counter = self.cycle_counter.wrapping_add(1);

        std::thread::sleep(self.timing.settle);
        if let Err(e) = self.transport.write_byte(POLL_REQUEST) {
            report.faults.push(CycleFault::PollRequestFailed(e));
        }

        std::thread::sleep(self.timing.settle);
        let complete = match self.transport.read(&mut self.buffer) {
            Ok(received) if received < FRAME_LEN => {
                report.faults.push(CycleFault::FrameIncomplete {
                    received,
                    expected: FRAME_LEN,
                });
                false
            }
            Ok(_) => true,
            Err(e) => {
                report.faults.push(CycleFault::FrameReadFailed(e));
                false
            }
        };

        if complete || self.partial_frame == PartialFramePolicy::DecodeStale {
            // De-obfuscated in place: whatever the read did not overwrite is
            // the previous frame's plain bytes, and gets scrambled once more.
            for byte in self.buffer.iter_mut() {
                *byte = deobfuscate(*byte);
            }
            report.sample = Some(unpack(&self.buffer));
        }

        if let Some(sample) = report.sample {
            debug!("Sample on cycle {}: {:?}", report.cycle, sample);
            report_sample(&mut self.sink, sample);
        }

        for fault in &report.faults {
            warn!("Cycle {}: {}", report.cycle, fault);
        }

        std::thread::sleep(self.timing.poll_interval);
        report
    }

    /// Poll until `stop` is set, then hand the engine back idle
    ///
    /// The flag is checked once per cycle, so a stop request waits at most
    /// for the rest of the current cycle.
    pub fn run_until_stopped(mut self, stop: &AtomicBool) -> PollEngine<Idle> {
        info!("Entering poll loop");
        while !stop.load(Ordering::Acquire) {
            let report = self.run_cycle();
            self.stats.record(&report);
        }
        info!("Stop requested, leaving poll loop at cycle {}", self.cycle_counter);
        self.finish()
    }

    pub fn finish(self) -> PollEngine<Idle> {
        debug!("Poll engine idle");
        self.transition()
    }
}
