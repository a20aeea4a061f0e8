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

use crate::eq::download_eq;
use crate::error::TrinityError;
use crate::plugin::{disable_plugin, download_plugin, enable_plugin, PluginImage};
use crate::power::PowerBudget;
use crate::usb::{self, ControlPipe, Transport, CONTROL_INTERFACE, TRINITY_PRODUCT_ID, TRINITY_VENDOR_ID};
use log::{debug, info, warn};
use std::fmt;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Stage {
    Locate,
    Open,
    DisablePlugin,
    DownloadEq,
    DownloadPlugin,
    EnablePlugin,
}

impl fmt::Display for Stage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Stage::Locate => "locating Trinity audio device",
            Stage::Open => "opening Trinity audio device",
            Stage::DisablePlugin => "disabling plugin",
            Stage::DownloadEq => "downloading EQ to Trinity audio device",
            Stage::DownloadPlugin => "downloading plugin to Trinity audio device",
            Stage::EnablePlugin => "enabling plugin",
        };
        f.write_str(s)
    }
}

/** The first failure of a configuration run, and where it happened */
#[derive(thiserror::Error, Debug)]
#[error("Error while {stage}: {source}")]
pub struct SessionError {
    pub stage: Stage,
    #[source]
    pub source: TrinityError,
}

impl SessionError {
    fn at(stage: Stage) -> impl FnOnce(TrinityError) -> SessionError {
        move |source| SessionError { stage, source }
    }
}

// Owns the open device. Dropping it releases the interface and closes the
// device, on success and on every error path.
struct Session<H: ControlPipe> {
    handle: H,
}

impl<H: ControlPipe> Session<H> {
    fn step<F>(&self, stage: Stage, f: F) -> Result<(), SessionError>
        where F: FnOnce(&H) -> Result<(), TrinityError> {
        info!("{}", capitalize(&stage.to_string()));
        f(&self.handle).map_err(SessionError::at(stage))
    }

    fn close(self) {
        drop(self);
    }
}

impl<H: ControlPipe> Drop for Session<H> {
    fn drop(&mut self) {
        if let Err(e) = self.handle.release_interface(CONTROL_INTERFACE) {
            warn!("Couldn't release interface {}: {}", CONTROL_INTERFACE, e);
        }
        debug!("Device closed");
    }
}

fn capitalize(s: &str) -> String {
    let mut chars = s.chars();
    match chars.next() {
        Some(first) => first.to_uppercase().chain(chars).collect(),
        None => String::new(),
    }
}

/** Configure the Trinity device: disable plugin, EQ, plugin code, enable plugin */
pub fn run<T: Transport>(transport: &T, power: PowerBudget, image: &PluginImage)
    -> Result<(), SessionError> {
    let device = usb::locate(transport, TRINITY_VENDOR_ID, TRINITY_PRODUCT_ID)
        .map_err(SessionError::at(Stage::Locate))?;
    let handle = usb::open(transport, &device).map_err(SessionError::at(Stage::Open))?;
    let session = Session { handle };

    session.step(Stage::DisablePlugin, |h| disable_plugin(h))?;
    session.step(Stage::DownloadEq, |h| download_eq(h, power))?;
    session.step(Stage::DownloadPlugin, |h| download_plugin(h, image))?;
    session.step(Stage::EnablePlugin, |h| enable_plugin(h, image))?;

    session.close();
    info!("Trinity audio device configured for {}", power);
    Ok(())
}
