//! This module contains everything needed for parsing the CLI arguments for l0c.

use std::path::PathBuf;

use clap::{Parser, ValueEnum};

/// Struct containing the CLI configuration for l0c.
#[derive(Parser, Debug)]
#[command(author, version, about)]
pub struct Cli {
    /// Source files to compile. Each one is lexed and parsed independently,
    /// then all of them are checked and generated together.
    #[arg(required = true)]
    pub files: Vec<PathBuf>,

    /// Specify the log level of the compiler.
    #[arg(value_enum, short, long, default_value_t = LogLevel::default())]
    pub verbosity: LogLevel,
}

impl Cli {
    pub fn init() -> Self {
        Cli::parse()
    }
}

/// Enum for specifying the log level of l0c.
#[derive(ValueEnum, Clone, Default, Debug)]
pub enum LogLevel {
    /// The default log level. Only critical errors will be logged.
    #[default]
    #[value(alias("0"))]
    Error,

    /// A log level, where also warnings are logged.
    #[value(alias("1"))]
    Warn,

    /// Also log information about the general state of the compiler, e.g.
    /// which module is currently being processed.
    #[value(alias("2"))]
    Info,

    /// Log everything which happens internally in the compiler.
    #[value(alias("3"))]
    Debug,

    /// Log extra information, even beyond `Debug`.
    #[value(alias("4"))]
    Trace,
}

impl From<&LogLevel> for log::Level {
    fn from(value: &LogLevel) -> Self {
        match value {
            LogLevel::Error => log::Level::Error,
            LogLevel::Warn => log::Level::Warn,
            LogLevel::Info => log::Level::Info,
            LogLevel::Debug => log::Level::Debug,
            LogLevel::Trace => log::Level::Trace,
        }
    }
}
