//! Consumer-facing input device
//!
//! Describes the nunchuk to consumers (name, axes, buttons) and ties polling
//! to the number of open readers: the first `open` starts the session, the
//! last `close` stops it.

use serde::{Deserialize, Serialize};
use tracing::{debug, info};

use super::error::NunchukError;
use super::event_sink::{Axis, Button, EVENTS_PER_SAMPLE};
use super::session::Session;

/// Range and noise filtering of one absolute axis
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct AxisInfo {
    pub axis: Axis,
    pub min: u16,
    pub max: u16,
    pub fuzz: u16,
    pub flat: u16,
}

impl AxisInfo {
    const FUZZ: u16 = 4;
    const FLAT: u16 = 8;

    pub fn for_axis(axis: Axis) -> Self {
        let (min, max) = axis.range();
        Self {
            axis,
            min,
            max,
            fuzz: Self::FUZZ,
            flat: Self::FLAT,
        }
    }
}

/// Static description of the device as presented to consumers
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DeviceDescriptor {
    pub name: String,
    pub axes: Vec<AxisInfo>,
    pub buttons: Vec<Button>,
    pub events_per_packet: usize,
}

impl Default for DeviceDescriptor {
    fn default() -> Self {
        Self {
            name: "Wii Nunchuk".to_string(),
            axes: Axis::ALL.into_iter().map(AxisInfo::for_axis).collect(),
            buttons: Button::ALL.to_vec(),
            events_per_packet: EVENTS_PER_SAMPLE,
        }
    }
}

pub struct InputDevice {
    descriptor: DeviceDescriptor,
    session: Session,
    readers: usize,
}

impl InputDevice {
    pub fn new(session: Session) -> Self {
        Self::with_descriptor(DeviceDescriptor::default(), session)
    }

    pub fn with_descriptor(descriptor: DeviceDescriptor, session: Session) -> Self {
        info!("Registering input device: {}", descriptor.name);
        Self {
            descriptor,
            session,
            readers: 0,
        }
    }

    pub fn descriptor(&self) -> &DeviceDescriptor {
        &self.descriptor
    }

    pub fn readers(&self) -> usize {
        self.readers
    }

    pub fn session(&self) -> &Session {
        &self.session
    }

    /// Attach a reader, starting the poll session for the first one
    pub fn open(&mut self) -> Result<(), NunchukError> {
        if self.readers == 0 {
            info!("First reader attached to {}, starting poll session", self.descriptor.name);
            self.session.start()?;
        }
        self.readers += 1;
        debug!("{} reader(s) attached", self.readers);
        Ok(())
    }

    /// Detach a reader, stopping the poll session after the last one
    pub fn close(&mut self) -> Result<(), NunchukError> {
        match self.readers {
            0 => {
                debug!("Close without open readers ignored");
                Ok(())
            }
            1 => {
                self.readers = 0;
                info!("Last reader detached from {}, stopping poll session", self.descriptor.name);
                self.session.stop()
            }
            _ => {
                self.readers -= 1;
                debug!("{} reader(s) attached", self.readers);
                Ok(())
            }
        }
    }
}
