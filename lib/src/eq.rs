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
use crate::power::PowerBudget;
use crate::usb::ControlPipe;
use crate::xdfp::{self, XDFP_STARTING_EQ_ADDR};
use log::{debug, warn};
use std::thread::sleep;
use std::time::Duration;

mod tables;

pub const EQ_TABLE_SIZE: usize = 35;

/// Settling time the device needs after each coefficient write.
pub const EQ_WRITE_DELAY: Duration = Duration::from_millis(3);

/** Coefficient table for a power budget */
pub fn eq_table(power: PowerBudget) -> &'static [i32; EQ_TABLE_SIZE] {
    match power {
        PowerBudget::Ma4000 => &tables::POWER_4000MA,
        PowerBudget::Ma3000 => &tables::POWER_3000MA,
        PowerBudget::Ma1500 => &tables::POWER_1500MA,
        // Unset can't reach here from the CLI, it is kept as the 500mA fallback.
        PowerBudget::Ma500 | PowerBudget::Unset => &tables::POWER_500MA,
    }
}

/** Download the EQ table for the given power budget */
pub fn download_eq<P: ControlPipe + ?Sized>(handle: &P, power: PowerBudget) -> Result<(), TrinityError> {
    if !power.is_set() {
        warn!("No power budget set, using the {} EQ", PowerBudget::Ma500);
    }
    for (index, &coefficient) in eq_table(power).iter().enumerate() {
        let address = XDFP_STARTING_EQ_ADDR + index as u16;
        xdfp::write(handle, address, coefficient)?;
        sleep(EQ_WRITE_DELAY);
    }
    debug!("Wrote {} EQ coefficients for {}", EQ_TABLE_SIZE, power);
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::usb::mock::MockTransport;
    use crate::xdfp::V8_WRITE_START_ADDR;

    const BUDGETS: [PowerBudget; 4] = [
        PowerBudget::Ma500,
        PowerBudget::Ma1500,
        PowerBudget::Ma3000,
        PowerBudget::Ma4000,
    ];

    #[test]
    fn tables_fit_in_18_bits() {
        for &power in BUDGETS.iter() {
            for &c in eq_table(power).iter() {
                assert!((-0x20000..=0x1ffff).contains(&c), "{} out of range for {}", c, power);
            }
        }
    }

    #[test]
    fn each_budget_has_its_own_table() {
        for (i, &a) in BUDGETS.iter().enumerate() {
            for &b in BUDGETS[i + 1..].iter() {
                assert_ne!(eq_table(a), eq_table(b), "{} and {}", a, b);
            }
        }
    }

    #[test]
    fn unset_falls_back_to_500ma() {
        assert_eq!(eq_table(PowerBudget::Unset), eq_table(PowerBudget::Ma500));
    }

    #[test]
    fn writes_whole_table_in_address_order() {
        for &power in BUDGETS.iter() {
            let transport = MockTransport::single();
            download_eq(&transport.handle(), power).unwrap();

            let log = transport.log.borrow();
            assert_eq!(log.writes.len(), EQ_TABLE_SIZE);
            for (index, w) in log.writes.iter().enumerate() {
                let target = ((w.data[3] as u16) << 8) | w.data[4] as u16;
                assert_eq!(w.index, V8_WRITE_START_ADDR);
                assert_eq!(target, XDFP_STARTING_EQ_ADDR + index as u16);
                assert_eq!(w.data, xdfp::encode(target, eq_table(power)[index]).to_vec());
            }
        }
    }

    #[test]
    fn stops_at_first_failure() {
        let mut transport = MockTransport::single();
        transport.fail_write = Some((4, rusb::Error::Pipe));
        let result = download_eq(&transport.handle(), PowerBudget::Ma3000);

        assert!(matches!(result, Err(TrinityError::Io { source: rusb::Error::Pipe, .. })));
        assert_eq!(transport.log.borrow().writes.len(), 5);
    }
}
