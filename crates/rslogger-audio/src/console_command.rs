use crate::{AppError, AppResult};

use std::{path::PathBuf, str::FromStr};

use rslogger_audio_core::{AudioSettingsPatch, ModuleId};

/// Console help text.
pub(crate) const HELP: &str = "\
Commands:
  status                          list known modules
  start-all [secs]                start every idle module under one recording id
  stop-all                        stop every recording module
  start <id> [secs]               start one module
  stop <id>                       stop one module
  config <id> key=value... [--save]
                                  update samplerate, channels, device, dtype or recording_dir
  ping <id>                       request a status from one module
  shutdown <id>                   shut one module down
  help                            show this text
  quit                            shut every module down and exit";

/// One line typed at the fleet console.
#[derive(Debug, Clone, PartialEq)]
pub(crate) enum ConsoleCommand {
    /// List registry contents.
    Status,
    /// Start every idle module.
    StartAll {
        /// Seconds to record; `None` records until stopped.
        duration: Option<f64>,
    },
    /// Stop every recording module.
    StopAll,
    /// Start one module.
    Start {
        /// Target module.
        module_id: ModuleId,
        /// Seconds to record; `None` records until stopped.
        duration: Option<f64>,
    },
    /// Stop one module.
    Stop {
        /// Target module.
        module_id: ModuleId,
    },
    /// Patch one module's settings.
    Config {
        /// Target module.
        module_id: ModuleId,
        /// Fields to change.
        patch: AudioSettingsPatch,
        /// Persist the merged settings.
        save: bool,
    },
    /// Ask one module for its status.
    Ping {
        /// Target module.
        module_id: ModuleId,
    },
    /// Shut one module down.
    Shutdown {
        /// Target module.
        module_id: ModuleId,
    },
    /// Print the help text.
    Help,
    /// Leave the console.
    Quit,
}

impl ConsoleCommand {
    /// Parse a console line; `Ok(None)` for a blank line.
    #[track_caller]
    pub(crate) fn parse(line: &str) -> AppResult<Option<Self>> {
        let mut words = line.split_whitespace();
        let Some(verb) = words.next() else {
            return Ok(None);
        };
        let args: Vec<&str> = words.collect();

        let command = match verb {
            "status" => {
                no_args(verb, &args)?;
                ConsoleCommand::Status
            }
            "start-all" => ConsoleCommand::StartAll {
                duration: optional_duration(verb, &args)?,
            },
            "stop-all" => {
                no_args(verb, &args)?;
                ConsoleCommand::StopAll
            }
            "start" => {
                let (module_id, rest) = target(verb, &args)?;
                ConsoleCommand::Start {
                    module_id,
                    duration: optional_duration(verb, rest)?,
                }
            }
            "stop" => ConsoleCommand::Stop {
                module_id: only_target(verb, &args)?,
            },
            "config" => {
                let (module_id, rest) = target(verb, &args)?;
                let (patch, save) = parse_patch(rest)?;
                ConsoleCommand::Config {
                    module_id,
                    patch,
                    save,
                }
            }
            "ping" => ConsoleCommand::Ping {
                module_id: only_target(verb, &args)?,
            },
            "shutdown" => ConsoleCommand::Shutdown {
                module_id: only_target(verb, &args)?,
            },
            "help" | "?" => ConsoleCommand::Help,
            "quit" | "exit" => ConsoleCommand::Quit,
            other => {
                return Err(AppError::console(format!(
                    "unknown command '{other}', type 'help'"
                )));
            }
        };

        Ok(Some(command))
    }
}

#[track_caller]
fn no_args(verb: &str, args: &[&str]) -> AppResult<()> {
    if args.is_empty() {
        Ok(())
    } else {
        Err(AppError::console(format!("'{verb}' takes no arguments")))
    }
}

#[track_caller]
fn target<'a>(verb: &str, args: &'a [&'a str]) -> AppResult<(ModuleId, &'a [&'a str])> {
    let (first, rest) = args
        .split_first()
        .ok_or_else(|| AppError::console(format!("'{verb}' needs a module id")))?;
    let module_id = ModuleId::new(*first).map_err(|e| AppError::console(e.to_string()))?;
    Ok((module_id, rest))
}

#[track_caller]
fn only_target(verb: &str, args: &[&str]) -> AppResult<ModuleId> {
    let (module_id, rest) = target(verb, args)?;
    no_args(verb, rest)?;
    Ok(module_id)
}

#[track_caller]
fn optional_duration(verb: &str, args: &[&str]) -> AppResult<Option<f64>> {
    match args {
        [] => Ok(None),
        [secs] => {
            let secs = secs
                .parse::<f64>()
                .map_err(|_| AppError::console(format!("invalid duration '{secs}'")))?;
            if secs.is_finite() && secs > 0.0 {
                Ok(Some(secs))
            } else {
                Err(AppError::console(format!(
                    "duration must be a positive number of seconds, got {secs}"
                )))
            }
        }
        _ => Err(AppError::console(format!(
            "'{verb}' takes at most one duration"
        ))),
    }
}

#[track_caller]
fn parse_number<T: FromStr>(key: &str, value: &str) -> AppResult<T> {
    value
        .parse()
        .map_err(|_| AppError::console(format!("invalid value for {key}: '{value}'")))
}

#[track_caller]
fn parse_patch(args: &[&str]) -> AppResult<(AudioSettingsPatch, bool)> {
    let mut patch = AudioSettingsPatch::default();
    let mut save = false;

    for arg in args {
        if *arg == "--save" {
            save = true;
            continue;
        }

        let (key, value) = arg
            .split_once('=')
            .ok_or_else(|| AppError::console(format!("expected key=value, got '{arg}'")))?;

        match key {
            "samplerate" => patch.samplerate = Some(parse_number(key, value)?),
            "channels" => patch.channels = Some(parse_number(key, value)?),
            "device" => {
                patch.device = Some(match value {
                    "" | "default" => None,
                    name => Some(name.to_string()),
                })
            }
            "dtype" => patch.dtype = Some(value.to_string()),
            "recording_dir" => patch.recording_dir = Some(PathBuf::from(value)),
            other => {
                return Err(AppError::console(format!("unknown setting '{other}'")));
            }
        }
    }

    if patch.is_empty() && !save {
        return Err(AppError::console("'config' needs at least one key=value"));
    }

    Ok((patch, save))
}
