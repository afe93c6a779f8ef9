//! Initialisation of the program's logging system.
//!
//! Messages are written to the console, with optional colours when the output is a terminal, and
//! optionally to log files. The log level can be set with an environment variable or in the
//! settings file.
use anyhow::{Context, Result, bail};
use chrono::Local;
use fern::colors::{Color, ColoredLevelConfig};
use fern::{Dispatch, FormatCallback};
use log::{LevelFilter, Record};
use std::env;
use std::fmt::{Arguments, Display};
use std::fs::OpenOptions;
use std::io::IsTerminal;
use std::path::Path;
use std::sync::OnceLock;

/// A flag indicating whether the logger has been initialised
static LOGGER_INIT: OnceLock<()> = OnceLock::new();

/// The environment variable which overrides the log level from the settings file
pub const LOG_LEVEL_ENV_VAR: &str = "OSVERSION_LOG_LEVEL";

/// The default log level for the program.
///
/// Used if the user hasn't specified something else with the `OSVERSION_LOG_LEVEL` environment
/// variable or the `settings.toml` file.
pub const DEFAULT_LOG_LEVEL: &str = "info";

/// The file name for the log file containing messages about ordinary operation
const LOG_INFO_FILE_NAME: &str = "osversion_info.log";

/// The file name for the log file containing warnings and error messages
const LOG_ERROR_FILE_NAME: &str = "osversion_error.log";

/// Whether the program logger has been initialised
pub fn is_logger_initialised() -> bool {
    LOGGER_INIT.get().is_some()
}

/// Convert a log level name (case-insensitive) into a [`LevelFilter`]
pub fn parse_log_level(log_level: &str) -> Result<LevelFilter> {
    let level = match log_level.to_lowercase().as_str() {
        "off" => LevelFilter::Off,
        "error" => LevelFilter::Error,
        "warn" => LevelFilter::Warn,
        "info" => LevelFilter::Info,
        "debug" => LevelFilter::Debug,
        "trace" => LevelFilter::Trace,
        unknown => bail!("Unknown log level: {unknown}"),
    };

    Ok(level)
}

/// Choose the log level from the environment variable's value, if set, or from the settings
fn resolve_log_level(from_env: Option<&str>, from_settings: Option<&str>) -> Result<LevelFilter> {
    parse_log_level(from_env.or(from_settings).unwrap_or(DEFAULT_LOG_LEVEL))
}

/// Messages for the console: warnings and errors go to stderr, everything else to stdout
fn console_dispatch(log_level: LevelFilter) -> Dispatch {
    let colours = ColoredLevelConfig::new()
        .error(Color::Red)
        .warn(Color::Yellow)
        .info(Color::Green)
        .debug(Color::Blue)
        .trace(Color::Magenta);
    let stream = move |use_colour: bool| {
        Dispatch::new().format(move |out, message, record| {
            write_log_colour(out, message, record, use_colour, &colours);
        })
    };

    Dispatch::new()
        .chain(
            stream(std::io::stdout().is_terminal())
                .filter(|metadata| metadata.level() > LevelFilter::Warn)
                .level(log_level)
                .chain(std::io::stdout()),
        )
        .chain(
            stream(std::io::stderr().is_terminal())
                .level(log_level.min(LevelFilter::Warn))
                .chain(std::io::stderr()),
        )
}

/// Messages for the log files in `log_dir`, which are replaced if they exist.
///
/// The info file gets everything down to `info` even when the console is quieter.
fn file_dispatch(log_dir: &Path, log_level: LevelFilter) -> Result<Dispatch> {
    let open = |file_name: &str| {
        let path = log_dir.join(file_name);
        OpenOptions::new()
            .write(true)
            .create(true)
            .truncate(true)
            .open(&path)
            .with_context(|| format!("Failed to create log file {}", path.display()))
    };

    Ok(Dispatch::new()
        .format(write_log_plain)
        .chain(
            Dispatch::new()
                .filter(|metadata| metadata.level() > LevelFilter::Warn)
                .level(log_level.max(LevelFilter::Info))
                .chain(open(LOG_INFO_FILE_NAME)?),
        )
        .chain(
            Dispatch::new()
                .level(LevelFilter::Warn)
                .chain(open(LOG_ERROR_FILE_NAME)?),
        ))
}

/// Initialise the program logger.
///
/// The level comes from the `OSVERSION_LOG_LEVEL` environment variable if set, then from
/// `settings.toml`, and is `info` otherwise. It is one of `off`, `error`, `warn`, `info`,
/// `debug` or `trace`.
///
/// # Arguments
///
/// * `log_level_from_settings`: The log level specified in `settings.toml`
/// * `log_dir`: Folder for `osversion_info.log` and `osversion_error.log`, if they are wanted
pub fn init(log_level_from_settings: Option<&str>, log_dir: Option<&Path>) -> Result<()> {
    let from_env = env::var(LOG_LEVEL_ENV_VAR).ok();
    let log_level = resolve_log_level(from_env.as_deref(), log_level_from_settings)?;

    let mut dispatch = Dispatch::new().chain(console_dispatch(log_level));
    if let Some(log_dir) = log_dir {
        dispatch = dispatch.chain(file_dispatch(log_dir, log_level)?);
    }

    // Another thread may have set up the logger since the caller checked
    if dispatch.apply().is_ok() {
        LOGGER_INIT.set(()).unwrap();
    }

    Ok(())
}

/// Write a log message in the program's format
fn write_log<T: Display>(out: FormatCallback, level: T, target: &str, message: &Arguments) {
    let timestamp = Local::now().format("%H:%M:%S");

    out.finish(format_args!("[{timestamp} {level} {target}] {message}"));
}

/// Write to the log with no colours
fn write_log_plain(out: FormatCallback, message: &Arguments, record: &Record) {
    write_log(out, record.level(), record.target(), message);
}

/// Write to the log with optional colours
fn write_log_colour(
    out: FormatCallback,
    message: &Arguments,
    record: &Record,
    use_colour: bool,
    colours: &ColoredLevelConfig,
) {
    if use_colour {
        write_log(out, colours.color(record.level()), record.target(), message);
    } else {
        write_log_plain(out, message, record);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;
    use std::fs;
    use tempfile::tempdir;

    #[rstest]
    #[case("off", LevelFilter::Off)]
    #[case("error", LevelFilter::Error)]
    #[case("WARN", LevelFilter::Warn)]
    #[case("Info", LevelFilter::Info)]
    #[case("debug", LevelFilter::Debug)]
    #[case("trace", LevelFilter::Trace)]
    fn test_parse_log_level(#[case] name: &str, #[case] expected: LevelFilter) {
        assert_eq!(parse_log_level(name).unwrap(), expected);
    }

    #[test]
    fn test_parse_log_level_unknown() {
        assert!(parse_log_level("verbose").is_err());
    }

    #[rstest]
    #[case(Some("debug"), Some("warn"), LevelFilter::Debug)]
    #[case(None, Some("warn"), LevelFilter::Warn)]
    #[case(None, None, LevelFilter::Info)]
    fn test_resolve_log_level(
        #[case] from_env: Option<&str>,
        #[case] from_settings: Option<&str>,
        #[case] expected: LevelFilter,
    ) {
        assert_eq!(resolve_log_level(from_env, from_settings).unwrap(), expected);
    }

    #[test]
    fn test_file_dispatch() {
        let dir = tempdir().unwrap();
        fs::write(dir.path().join(LOG_INFO_FILE_NAME), "old contents").unwrap();

        file_dispatch(dir.path(), LevelFilter::Warn).unwrap();
        assert!(dir.path().join(LOG_ERROR_FILE_NAME).is_file());
        let info = fs::read_to_string(dir.path().join(LOG_INFO_FILE_NAME)).unwrap();
        assert!(info.is_empty());

        assert!(file_dispatch(&dir.path().join("missing"), LevelFilter::Info).is_err());
    }
}
