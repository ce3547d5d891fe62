//! Error definitions for the nunchuk subsystem

use thiserror::Error;

/// Hard failure of a single bus operation
#[derive(Debug, Error)]
pub enum TransportError {
    /// Error reported by the Linux I2C driver
    #[error("I2C bus error: {0}")]
    I2c(#[from] rppal::i2c::Error),

    /// Transfer failed for a reason outside the I2C driver
    #[error("Transfer failed: {0}")]
    Transfer(String),
}

/// Non-fatal anomalies observed during one poll cycle
///
/// None of these stop polling. The device is expected to miss the odd beat
/// and recover on a later cycle through the periodic handshake.
#[derive(Debug, Error)]
pub enum CycleFault {
    #[error("Handshake incomplete: wrote {written} of {expected} bytes")]
    HandshakeIncomplete { written: usize, expected: usize },

    #[error("Handshake failed: {0}")]
    HandshakeFailed(TransportError),

    #[error("Request for data failed: {0}")]
    PollRequestFailed(TransportError),

    #[error("Data incomplete: received {received} of {expected} bytes")]
    FrameIncomplete { received: usize, expected: usize },

    #[error("Frame read failed: {0}")]
    FrameReadFailed(TransportError),
}

/// Errors surfaced by lifecycle operations (binding, start, stop)
#[derive(Debug, Error)]
pub enum NunchukError {
    /// The nunchuk only ever answers on 0x52
    #[error("Invalid bus address 0x{0:02x}: address must be 0x52")]
    InvalidBusAddress(u16),

    #[error("Transport error: {0}")]
    Transport(#[from] TransportError),

    #[error("Unable to spawn poll worker: {0}")]
    WorkerSpawnFailed(String),

    #[error("Poll session is already running")]
    AlreadyRunning,

    /// The engine was lost, e.g. because the worker thread panicked
    #[error("Poll engine unavailable: {0}")]
    EngineUnavailable(String),
}
