/*
    Copyright 2021, Andrew C. Young <andrew@vaelen.org>

    This file is part of the Trinity CLI.

    The Trinity CLI is free software: you can redistribute it and/or modify
    it under the terms of the GNU General Public License as published by
    the Free Software Foundation, either version 3 of the License, or
    (at your option) any later version.

    The Trinity CLI is distributed in the hope that it will be useful,
    but WITHOUT ANY WARRANTY; without even the implied warranty of
    MERCHANTABILITY or FITNESS FOR A PARTICULAR PURPOSE.  See the
    GNU General Public License for more details.

    You should have received a copy of the GNU General Public License
    along with the Trinity CLI.  If not, see <https://www.gnu.org/licenses/>.
 */

use simplelog::{ColorChoice, CombinedLogger, Config, TermLogger, TerminalMode};
use std::env;
use std::io;
use std::process::ExitCode;
use trinity::LibusbTransport;

mod cli;

use cli::Invocation;

fn main() -> ExitCode {
    let invocation = cli::parse(env::args_os());

    if let Invocation::Run(settings) = &invocation {
        if let Err(e) = CombinedLogger::init(vec![TermLogger::new(
            settings.log_level.into(),
            Config::default(),
            TerminalMode::Mixed,
            ColorChoice::Auto,
        )]) {
            eprintln!("Could not configure the logger: {}", e);
        }
    }

    match cli::execute(&invocation, LibusbTransport::new, &mut io::stdout()) {
        Ok(_) => ExitCode::SUCCESS,
        Err(e) => {
            eprintln!("{}", e);
            ExitCode::FAILURE
        }
    }
}
