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

//! Equalizer coefficients, one table per power budget.
//!
//! Seven biquad sections of five coefficients each (b0, b1, b2, -a1, -a2) in
//! 18 bit fixed point with 16 fractional bits. The last section is a
//! pass-through.

use super::EQ_TABLE_SIZE;

pub static POWER_500MA: [i32; EQ_TABLE_SIZE] = [
    64453, -128906, 64453, 128888, -63388,
    65012, -127492, 62529, 127468, -62029,
    64959, -126944, 62160, 126944, -61583,
    64846, -121319, 57520, 121319, -56830,
    63154, -99692, 44752, 99692, -42370,
    53698, -11184, 9625, 26553, -13156,
    65536, 0, 0, 0, 0,
];

pub static POWER_1500MA: [i32; EQ_TABLE_SIZE] = [
    64812, -129624, 64812, 129616, -64096,
    65274, -127778, 62561, 127766, -62312,
    65152, -127159, 62182, 127159, -61797,
    65075, -121548, 57522, 121548, -57061,
    64335, -100687, 44648, 100687, -43447,
    57384, -13860, 10438, 24435, -12862,
    65536, 0, 0, 0, 0,
];

pub static POWER_3000MA: [i32; EQ_TABLE_SIZE] = [
    64992, -129984, 64992, 129980, -64453,
    65405, -127912, 62569, 127906, -62444,
    65344, -127362, 62193, 127362, -62001,
    65305, -121771, 57517, 121771, -57286,
    64933, -101171, 44574, 101171, -43971,
    61325, -16842, 11341, 22303, -12591,
    65536, 0, 0, 0, 0,
];

pub static POWER_4000MA: [i32; EQ_TABLE_SIZE] = [
    65113, -130225, 65113, 130223, -64692,
    65536, -128040, 62572, 128040, -62572,
    65440, -127460, 62195, 127460, -62099,
    65536, -121989, 57506, 121989, -57506,
    65536, -101646, 44484, 101646, -44484,
    63395, -18456, 11829, 21231, -12464,
    65536, 0, 0, 0, 0,
];
