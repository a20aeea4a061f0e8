/*
    Copyright 2021, Andrew C. Young <andrew@vaelen.org>

    This file is part of the Trinity library.

    The Trinity library is free software: you can redistribute it and/or modify
    it under the terms of the GNU General Public License as published by
    the Free Software Foundation, either version 3 of the License, or
    (at your option) any later version.

    The Trinity library is distributed in the hope that it will be useful,
    but WITHOUT ANY WARRANTY; without even the implied warranty of
    MERCHANTABILITY or FITNESS FOR A PARTICULAR PURPOSE.  See the
    GNU General Public License for more details.

    You should have received a copy of the GNU General Public License
    along with the Trinity library.  If not, see <https://www.gnu.org/licenses/>.
 */

//! Writes into the device's memory map through the Micronas "set memory"
//! vendor request.

use crate::error::TrinityError;
use crate::usb::ControlPipe;
use log::trace;
use rusb::{Direction, Recipient, RequestType};
use std::time::Duration;

pub const MICRONAS_SET_MEM_REQUEST: u8 = 0x04;

/// Staging slot for coefficient frames. Firmware moves each frame to the
/// XDFP address carried in its last two bytes.
pub const V8_WRITE_START_ADDR: u16 = 0x2000;
/// Plugin control byte, followed by the plugin code.
pub const V8_PLUGIN_START_ADDR: u16 = 0x2100;
pub const XDFP_STARTING_EQ_ADDR: u16 = 0x0200;

pub const TRANSFER_TIMEOUT: Duration = Duration::from_millis(1000);

pub const FRAME_LEN: usize = 5;

/// Added to negative values to fold them into the unsigned 18 bit field.
const NEGATIVE_OFFSET: i32 = 0x40000;

/** Write a buffer to device memory at the given address */
pub fn set_mem<P: ControlPipe + ?Sized>(handle: &P, address: u16, data: &[u8]) -> Result<(), TrinityError> {
    trace!("set_mem 0x{:04x} {:02x?}", address, data);
    let written = handle
        .write_control(
            rusb::request_type(Direction::Out, RequestType::Vendor, Recipient::Device),
            MICRONAS_SET_MEM_REQUEST,
            0,
            address,
            data,
            TRANSFER_TIMEOUT,
        )
        .map_err(|source| TrinityError::Io { address, source })?;
    if written != data.len() {
        return Err(TrinityError::ShortWrite {
            address,
            written,
            expected: data.len(),
        });
    }
    Ok(())
}

/** Encode an 18 bit fixed point value and its XDFP address into a frame */
pub fn encode(address: u16, value: i32) -> [u8; FRAME_LEN] {
    let value = if value < 0 { value + NEGATIVE_OFFSET } else { value };
    [
        ((value >> 10) & 0xff) as u8,
        ((value >> 2) & 0xff) as u8,
        (value & 0x03) as u8,
        ((address >> 8) & 0x03) as u8,
        (address & 0xff) as u8,
    ]
}

/** Write a value to an XDFP address, via the staging slot */
pub fn write<P: ControlPipe + ?Sized>(handle: &P, address: u16, value: i32) -> Result<(), TrinityError> {
    set_mem(handle, V8_WRITE_START_ADDR, &encode(address, value))
}
