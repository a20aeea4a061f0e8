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

use std::error::Error;

pub use rusb;

pub mod eq;
pub mod error;
pub mod plugin;
pub mod power;
pub mod session;
pub mod usb;
pub mod xdfp;

pub use error::TrinityError;
pub use plugin::PluginImage;
pub use power::PowerBudget;
pub use session::{SessionError, Stage};
pub use usb::{LibusbTransport, Transport};

/** Configure the attached Trinity device with the built in plugin. */
pub fn configure<T: Transport>(transport: &T, power: PowerBudget) -> Result<(), Box<dyn Error>> {
    let image = PluginImage::builtin()?;
    session::run(transport, power, &image)?;
    Ok(())
}
