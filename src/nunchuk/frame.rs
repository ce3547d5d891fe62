//! Frame decoding for the six byte nunchuk report
//!
//! Every report arrives scrambled. Each byte is de-obfuscated first, then the
//! three accelerometer axes are reassembled from their high byte and the two
//! low bits packed into byte 5.
//!
//! ```text
//! byte:   0        1        2        3        4        5
//!         stick_x  stick_y  accel_x  accel_y  accel_z  zz yy xx c z
//!                           [9:2]    [9:2]    [9:2]    (low bits, buttons)
//! ```

use serde::{Deserialize, Serialize};

/// Number of bytes in one report
pub const FRAME_LEN: usize = 6;

/// Key used by the device to scramble each report byte
pub const XOR_KEY: u8 = 0x17;

/// Report bytes exactly as read from the bus
pub type RawFrame = [u8; FRAME_LEN];

/// Largest value a 10 bit accelerometer axis can take
pub const ACCEL_MAX: u16 = 0x03FF;

const ACCEL_X_SHIFT: u8 = 2;
const ACCEL_Y_SHIFT: u8 = 4;
const ACCEL_Z_SHIFT: u8 = 6;

const BUTTON_C_MASK: u8 = 0x02;
const BUTTON_Z_MASK: u8 = 0x01;

/// One decoded reading
///
/// Button fields hold the raw bit: `true` means the bit was set, which the
/// device uses to signal a released button.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Sample {
    pub stick_x: u8,
    pub stick_y: u8,
    pub accel_x: u16,
    pub accel_y: u16,
    pub accel_z: u16,
    pub button_c: bool,
    pub button_z: bool,
}

/// Undo the device scramble for a single byte
#[inline]
pub fn deobfuscate(byte: u8) -> u8 {
    (byte ^ XOR_KEY).wrapping_add(XOR_KEY)
}

/// Decode a raw report into a [`Sample`]
pub fn decode(raw: &RawFrame) -> Sample {
    unpack(&raw.map(deobfuscate))
}

/// Split an already de-obfuscated report into its fields
pub fn unpack(plain: &RawFrame) -> Sample {
    let low_bits = plain[5];

    Sample {
        stick_x: plain[0],
        stick_y: plain[1],
        accel_x: unpack_axis(plain[2], low_bits, ACCEL_X_SHIFT),
        accel_y: unpack_axis(plain[3], low_bits, ACCEL_Y_SHIFT),
        accel_z: unpack_axis(plain[4], low_bits, ACCEL_Z_SHIFT),
        button_c: low_bits & BUTTON_C_MASK != 0,
        button_z: low_bits & BUTTON_Z_MASK != 0,
    }
}

fn unpack_axis(high: u8, low_bits: u8, shift: u8) -> u16 {
    (u16::from(high) << 2) | u16::from((low_bits >> shift) & 0x03)
}
