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

use crate::error::TrinityError;
use crate::usb::ControlPipe;
use crate::xdfp::{set_mem, V8_PLUGIN_START_ADDR};
use simple_error::SimpleError;
use std::str;

const PLUGIN_HEX: &str = include_str!("plugin.hex");

/// Written to the plugin control byte to switch the plugin off.
pub const DISABLE_PLUGIN_VALUE: u8 = 0xba;

/** DSP plugin firmware. Byte 0 enables the plugin, the rest is code. */
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PluginImage {
    bytes: Vec<u8>,
}

impl PluginImage {
    /** The plugin compiled into this library */
    pub fn builtin() -> Result<PluginImage, TrinityError> {
        Ok(PluginImage::from_hex(PLUGIN_HEX)?)
    }

    pub fn from_bytes(bytes: Vec<u8>) -> Result<PluginImage, SimpleError> {
        if bytes.len() < 2 {
            return Err(SimpleError::new("Plugin image needs a control byte and code"));
        }
        if bytes.len() - 1 > u16::MAX as usize {
            return Err(SimpleError::new(format!(
                "Plugin code too large: {} bytes", bytes.len() - 1)));
        }
        Ok(PluginImage { bytes })
    }

    /** Parse an image from Intel hex. Data records must be contiguous from 0. */
    pub fn from_hex(hex: &str) -> Result<PluginImage, SimpleError> {
        let mut bytes: Vec<u8> = Vec::new();
        for (number, line) in hex.lines().enumerate() {
            let line = line.trim();
            if !line.starts_with(':') {
                continue;
            }
            let number = number + 1;
            if line.len() < 11 {
                return Err(SimpleError::new(format!("Line {}: record too short", number)));
            }
            let record = match parse_hex(&line[1..]) {
                Some(record) => record,
                None => return Err(SimpleError::new(format!("Line {}: invalid hex", number))),
            };
            let num_bytes = record[0] as usize;
            if record.len() != num_bytes + 5 {
                return Err(SimpleError::new(format!(
                    "Line {}: bad data length. Expected: {}, Received: {}",
                    number, num_bytes, record.len().saturating_sub(5))));
            }
            if record.iter().fold(0u8, |sum, b| sum.wrapping_add(*b)) != 0 {
                return Err(SimpleError::new(format!("Line {}: bad checksum", number)));
            }
            let address = ((record[1] as usize) << 8) | record[2] as usize;
            match record[3] {
                0 => {
                    // Data
                    if address != bytes.len() {
                        return Err(SimpleError::new(format!(
                            "Line {}: data at 0x{:04x}, expected 0x{:04x}",
                            number, address, bytes.len())));
                    }
                    bytes.extend_from_slice(&record[4..4 + num_bytes]);
                },
                1 => {
                    // EOF
                    return PluginImage::from_bytes(bytes);
                },
                typ => {
                    return Err(SimpleError::new(format!(
                        "Line {}: unsupported record type {}", number, typ)));
                }
            }
        }
        Err(SimpleError::new("Missing end of file record"))
    }

    /** The enable control byte, as a one byte buffer */
    pub fn control(&self) -> &[u8] {
        &self.bytes[..1]
    }

    /** Plugin code, written after the control byte */
    pub fn body(&self) -> &[u8] {
        &self.bytes[1..]
    }

    pub fn len(&self) -> usize {
        self.bytes.len()
    }
}

/** Parse a hex string into a byte vector */
fn parse_hex(data: &str) -> Option<Vec<u8>> {
    if data.len() % 2 != 0 {
        return None;
    }
    data
        .as_bytes()
        .chunks(2)
        .map(|x| match str::from_utf8(x) {
            Ok(s) => u8::from_str_radix(s, 16).ok(),
            Err(_) => None
        })
        .collect()
}

/** Switch the plugin off */
pub fn disable_plugin<P: ControlPipe + ?Sized>(handle: &P) -> Result<(), TrinityError> {
    set_mem(handle, V8_PLUGIN_START_ADDR, &[DISABLE_PLUGIN_VALUE])
}

/** Write the plugin code, leaving the control byte alone */
pub fn download_plugin<P: ControlPipe + ?Sized>(handle: &P, image: &PluginImage) -> Result<(), TrinityError> {
    set_mem(handle, V8_PLUGIN_START_ADDR + 1, image.body())
}

/** Switch the plugin on */
pub fn enable_plugin<P: ControlPipe + ?Sized>(handle: &P, image: &PluginImage) -> Result<(), TrinityError> {
    set_mem(handle, V8_PLUGIN_START_ADDR, image.control())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::usb::mock::MockTransport;

    const SMALL_HEX: &str = ":0300000001AABB97\n:00000001FF\n";

    #[test]
    fn builtin_image_parses() {
        let image = PluginImage::builtin().unwrap();
        assert_eq!(image.len(), 96);
        assert_eq!(image.control(), &[0x01]);
        assert_eq!(image.body().len(), 95);
        assert_eq!(&image.body()[..3], &[0xae, 0xe8, 0xf2]);
    }

    #[test]
    fn parses_small_image() {
        let image = PluginImage::from_hex(SMALL_HEX).unwrap();
        assert_eq!(image.control(), &[0x01]);
        assert_eq!(image.body(), &[0xaa, 0xbb]);
    }

    #[test]
    fn rejects_bad_checksum() {
        let err = PluginImage::from_hex(":0300000001AABB98\n:00000001FF\n").unwrap_err();
        assert!(err.as_str().contains("checksum"));
    }

    #[test]
    fn rejects_gaps() {
        let err = PluginImage::from_hex(":0100000001FE\n:01000500AA50\n:00000001FF\n").unwrap_err();
        assert!(err.as_str().contains("expected 0x0001"));
    }

    #[test]
    fn rejects_missing_eof() {
        assert!(PluginImage::from_hex(":0300000001AABB97\n").is_err());
    }

    #[test]
    fn rejects_control_byte_only() {
        assert!(PluginImage::from_hex(":0100000001FE\n:00000001FF\n").is_err());
    }

    #[test]
    fn disable_then_enable() {
        let image = PluginImage::from_hex(SMALL_HEX).unwrap();
        let transport = MockTransport::single();
        let handle = transport.handle();
        disable_plugin(&handle).unwrap();
        enable_plugin(&handle, &image).unwrap();

        let log = transport.log.borrow();
        let writes = log.writes_to(V8_PLUGIN_START_ADDR);
        assert_eq!(writes.len(), 2);
        assert_eq!(writes[0].data, vec![DISABLE_PLUGIN_VALUE]);
        assert_eq!(writes[1].data, vec![0x01]);
    }

    #[test]
    fn download_skips_control_byte() {
        let image = PluginImage::from_hex(SMALL_HEX).unwrap();
        let transport = MockTransport::single();
        download_plugin(&transport.handle(), &image).unwrap();

        let log = transport.log.borrow();
        assert_eq!(log.writes.len(), 1);
        assert_eq!(log.writes[0].index, V8_PLUGIN_START_ADDR + 1);
        assert_eq!(log.writes[0].data, vec![0xaa, 0xbb]);
    }
}
