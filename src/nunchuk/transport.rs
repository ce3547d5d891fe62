//! Bus transport used by the poll engine
//!
//! The engine only needs three blocking primitives against a single, already
//! addressed peripheral. [`I2cTransport`] provides them on top of the Linux
//! I2C character device through `rppal`.

use rppal::i2c::I2c;
use tracing::{debug, error, info};

use super::error::{NunchukError, TransportError};
use crate::config::NunchukConfig;

/// The nunchuk always answers on this address
pub const NUNCHUK_ADDRESS: u16 = 0x52;

/// Blocking request/response channel to one fixed bus address
///
/// Implementations must not retry on their own. A short count without an
/// error is reported back as-is so the caller can tell it apart from a hard
/// failure.
pub trait Transport: Send {
    /// Write `bytes` in one transfer, returning how many were accepted
    fn write(&mut self, bytes: &[u8]) -> Result<usize, TransportError>;

    /// Send a single command byte
    fn write_byte(&mut self, byte: u8) -> Result<(), TransportError>;

    /// Read up to `buffer.len()` bytes, returning how many were filled
    fn read(&mut self, buffer: &mut [u8]) -> Result<usize, TransportError>;
}

impl<T: Transport + ?Sized> Transport for Box<T> {
    fn write(&mut self, bytes: &[u8]) -> Result<usize, TransportError> {
        (**self).write(bytes)
    }

    fn write_byte(&mut self, byte: u8) -> Result<(), TransportError> {
        (**self).write_byte(byte)
    }

    fn read(&mut self, buffer: &mut [u8]) -> Result<usize, TransportError> {
        (**self).read(buffer)
    }
}

/// Reject every address except the nunchuk's
pub fn check_address(address: u16) -> Result<(), NunchukError> {
    if address != NUNCHUK_ADDRESS {
        error!(
            "Address must be 0x{:02x}, got 0x{:02x}",
            NUNCHUK_ADDRESS, address
        );
        return Err(NunchukError::InvalidBusAddress(address));
    }
    Ok(())
}

/// I2C master bound to the nunchuk
pub struct I2cTransport {
    i2c: I2c,
}

impl I2cTransport {
    /// Open the configured bus and address the nunchuk on it
    pub fn bind(config: &NunchukConfig) -> Result<Self, NunchukError> {
        check_address(config.address)?;

        info!("Opening I2C bus {}", config.bus);
        let mut i2c = I2c::with_bus(config.bus).map_err(TransportError::from)?;
        i2c.set_slave_address(config.address)
            .map_err(TransportError::from)?;

        // No timeout unless asked for; a stuck bus stalls the worker just like
        // the kernel driver does.
        if let Some(timeout_ms) = config.bus_timeout_ms {
            debug!("Setting I2C timeout to {} ms", timeout_ms);
            i2c.set_timeout(timeout_ms).map_err(TransportError::from)?;
        }

        info!(
            "Bound nunchuk at 0x{:02x} on bus {}",
            config.address, config.bus
        );
        Ok(Self { i2c })
    }
}

impl Transport for I2cTransport {
    fn write(&mut self, bytes: &[u8]) -> Result<usize, TransportError> {
        Ok(self.i2c.write(bytes)?)
    }

    fn write_byte(&mut self, byte: u8) -> Result<(), TransportError> {
        Ok(self.i2c.smbus_send_byte(byte)?)
    }

    fn read(&mut self, buffer: &mut [u8]) -> Result<usize, TransportError> {
        Ok(self.i2c.read(buffer)?)
    }
}
