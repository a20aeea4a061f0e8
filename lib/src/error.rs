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

use simple_error::SimpleError;

#[derive(thiserror::Error, Debug)]
pub enum TrinityError {
    #[error("Trinity audio device not found")]
    DeviceNotFound,

    #[error("Found {count} Trinity audio devices, only one can be configured at a time")]
    AmbiguousDevice { count: usize },

    #[error("Could not open device: {0}")]
    DeviceOpenFailed(rusb::Error),

    #[error("Couldn't claim interface {interface}: {source}")]
    InterfaceClaimFailed {
        interface: u8,
        #[source]
        source: rusb::Error,
    },

    #[error("Control transfer to 0x{address:04x} failed: {source}")]
    Io {
        address: u16,
        #[source]
        source: rusb::Error,
    },

    #[error("Short control transfer to 0x{address:04x}: wrote {written} of {expected} bytes")]
    ShortWrite {
        address: u16,
        written: usize,
        expected: usize,
    },

    #[error("USB subsystem unavailable: {0}")]
    UsbUnavailable(rusb::Error),

    #[error("Bad plugin image: {0}")]
    PluginImage(#[from] SimpleError),
}

impl TrinityError {
    /** Returns true for failures of a memory write on an open device */
    pub fn is_io(&self) -> bool {
        matches!(self, TrinityError::Io { .. } | TrinityError::ShortWrite { .. })
    }
}
