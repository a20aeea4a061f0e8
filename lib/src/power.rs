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

use std::fmt;

/** USB power allocation granted to the device by the host */
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PowerBudget {
    /// No budget chosen. Never handed to the device sequence by the CLI.
    Unset,
    Ma500,
    Ma1500,
    Ma3000,
    Ma4000,
}

impl Default for PowerBudget {
    fn default() -> Self {
        PowerBudget::Unset
    }
}

impl PowerBudget {
    pub fn milliamps(&self) -> Option<u16> {
        match self {
            PowerBudget::Unset => None,
            PowerBudget::Ma500 => Some(500),
            PowerBudget::Ma1500 => Some(1500),
            PowerBudget::Ma3000 => Some(3000),
            PowerBudget::Ma4000 => Some(4000),
        }
    }

    pub fn is_set(&self) -> bool {
        self.milliamps().is_some()
    }
}

impl fmt::Display for PowerBudget {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.milliamps() {
            Some(ma) => write!(f, "{}mA", ma),
            None => write!(f, "unset"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_is_unset() {
        assert_eq!(PowerBudget::default(), PowerBudget::Unset);
        assert!(!PowerBudget::Unset.is_set());
    }

    #[test]
    fn display_uses_milliamps() {
        assert_eq!(PowerBudget::Ma500.to_string(), "500mA");
        assert_eq!(PowerBudget::Ma4000.to_string(), "4000mA");
        assert_eq!(PowerBudget::Unset.to_string(), "unset");
    }
}
