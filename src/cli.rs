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

use clap::error::ErrorKind;
use clap::{Arg, ArgAction, ArgMatches, Command, CommandFactory, FromArgMatches, Parser, ValueEnum, ValueSource};
use log::warn;
use std::error::Error;
use std::ffi::OsString;
use std::io::Write;
use trinity::{PowerBudget, SessionError, Stage, Transport, TrinityError};

pub const USAGE: &str = "Available power settings :
\t--power-500\t500mA
\t--power-1500\t1500mA
\t--power-3000\t3000mA
\t--power-4000\t4000mA
";

// Id, flag, help, budget.
const POWER_FLAGS: [(&str, &str, &str, PowerBudget); 4] = [
    ("power_500", "power-500", "500mA", PowerBudget::Ma500),
    ("power_1500", "power-1500", "1500mA", PowerBudget::Ma1500),
    ("power_3000", "power-3000", "3000mA", PowerBudget::Ma3000),
    ("power_4000", "power-4000", "4000mA", PowerBudget::Ma4000),
];

/// Long options followed by a separate value.
const VALUE_FLAGS: [&str; 1] = ["log-level"];

#[derive(Parser, Debug)]
#[clap(name = "trinity", version)]
#[clap(about = "Loads the EQ and DSP plugin into a Trinity USB audio device")]
pub struct Cli {
    /// Minimum log level to print out
    #[clap(long, value_enum, action = ArgAction::Set, default_value = "info")]
    pub log_level: LevelFilter,
}

#[derive(ValueEnum, Copy, Clone, Eq, PartialEq, Debug)]
pub enum LevelFilter {
    Off,
    Error,
    Warn,
    Info,
    Debug,
    Trace,
}

impl From<LevelFilter> for log::LevelFilter {
    fn from(level: LevelFilter) -> Self {
        match level {
            LevelFilter::Off => log::LevelFilter::Off,
            LevelFilter::Error => log::LevelFilter::Error,
            LevelFilter::Warn => log::LevelFilter::Warn,
            LevelFilter::Info => log::LevelFilter::Info,
            LevelFilter::Debug => log::LevelFilter::Debug,
            LevelFilter::Trace => log::LevelFilter::Trace,
        }
    }
}

#[derive(Debug)]
pub struct Settings {
    pub power: PowerBudget,
    pub log_level: LevelFilter,
    /// Arguments that were skipped over.
    pub ignored: Vec<OsString>,
}

#[derive(Debug)]
pub enum Invocation {
    Run(Settings),
    Usage,
    Help(String),
}

fn command() -> Command<'static> {
    // The power flags may repeat; the last one given wins.
    POWER_FLAGS.iter().fold(Cli::command(), |cmd, &(id, long, help, _)| {
        cmd.arg(Arg::new(id).long(long).help(help).action(ArgAction::Count))
    })
}

// Unrecognised arguments are set aside rather than rejected.
fn split_known<I>(mut args: I, command: &Command) -> (Vec<OsString>, Vec<OsString>)
    where I: Iterator<Item = OsString> {
    let mut known: Vec<OsString> = args.next().into_iter().collect();
    let mut ignored = Vec::new();
    while let Some(arg) = args.next() {
        let text = arg.to_string_lossy().into_owned();
        if matches!(text.as_str(), "-h" | "--help" | "-V" | "--version") {
            known.push(arg);
            continue;
        }
        let name = text.strip_prefix("--").map(|s| match s.find('=') {
            Some(end) => &s[..end],
            None => s,
        });
        let is_known = match name {
            Some(name) => command.get_arguments().any(|a| a.get_long() == Some(name)),
            None => false,
        };
        if !is_known {
            ignored.push(arg);
            continue;
        }
        let takes_value = name.map_or(false, |n| VALUE_FLAGS.contains(&n)) && !text.contains('=');
        known.push(arg);
        if takes_value {
            if let Some(value) = args.next() {
                known.push(value);
            }
        }
    }
    (known, ignored)
}

fn last_power_flag(matches: &ArgMatches) -> PowerBudget {
    POWER_FLAGS
        .iter()
        .filter(|&&(id, ..)| matches.value_source(id) == Some(ValueSource::CommandLine))
        .filter_map(|&(id, _, _, power)| {
            matches.indices_of(id).and_then(|i| i.max()).map(|index| (index, power))
        })
        .max_by_key(|&(index, _)| index)
        .map_or(PowerBudget::Unset, |(_, power)| power)
}

/** Without a power flag the run ends at the usage summary. */
pub fn parse<I, T>(args: I) -> Invocation
    where I: IntoIterator<Item = T>, T: Into<OsString> {
    let command = command();
    let (known, ignored) = split_known(args.into_iter().map(Into::into), &command);
    let matches = match command.try_get_matches_from(known) {
        Ok(matches) => matches,
        Err(e) => {
            return match e.kind() {
                ErrorKind::DisplayHelp | ErrorKind::DisplayVersion => Invocation::Help(e.to_string()),
                _ => Invocation::Usage,
            }
        }
    };
    let cli = match Cli::from_arg_matches(&matches) {
        Ok(cli) => cli,
        Err(_) => return Invocation::Usage,
    };
    match last_power_flag(&matches) {
        PowerBudget::Unset => Invocation::Usage,
        power => Invocation::Run(Settings {
            power,
            log_level: cli.log_level,
            ignored,
        }),
    }
}

/** Print usage, or connect to USB and configure the device. */
pub fn execute<T, F, W>(invocation: &Invocation, connect: F, out: &mut W) -> Result<(), Box<dyn Error>>
    where T: Transport, F: FnOnce() -> Result<T, TrinityError>, W: Write {
    match invocation {
        Invocation::Usage => out.write_all(USAGE.as_bytes())?,
        Invocation::Help(text) => write!(out, "{}", text)?,
        Invocation::Run(settings) => {
            for arg in &settings.ignored {
                warn!("Ignoring unrecognised argument {:?}", arg);
            }
            writeln!(out, "Audio device set to {}", settings.power)?;
            let transport = connect().map_err(|source| SessionError { stage: Stage::Locate, source })?;
            trinity::configure(&transport, settings.power)?;
        }
    }
    Ok(())
}
