use chrono::Local;
use colored::Colorize;
use log::{Level, LevelFilter, Log, Metadata, Record};
use parking_lot::Mutex;
use std::fs::{File, OpenOptions};
use std::io::{self, Write};
use std::path::Path;

/// Log files are created under this directory.
pub const LOG_DIR: &str = "logs";

/// Backend for the `log` facade: colored level tags on stderr and, when a
/// file is given, timestamped lines appended to `logs/<file>`.
pub struct Logger {
    level: LevelFilter,
    console: bool,
    file: Option<Mutex<File>>,
}

impl Logger {
    pub fn new(level: LevelFilter) -> Self {
        Self {
            level,
            console: true,
            file: None,
        }
    }

    pub fn quiet(mut self) -> Self {
        self.console = false;
        self
    }

    /// Appends to `<dir>/<filename>`, creating the directory if needed.
    pub fn with_file_in<P: AsRef<Path>>(mut self, dir: P, filename: &str) -> io::Result<Self> {
        let dir = dir.as_ref();
        if !dir.exists() {
            std::fs::create_dir_all(dir)?;
        }
        let file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(dir.join(filename))?;
        self.file = Some(Mutex::new(file));
        Ok(self)
    }

    pub fn with_file(self, filename: &str) -> io::Result<Self> {
        self.with_file_in(LOG_DIR, filename)
    }

    /// Installs this logger for the whole process. Only the first call wins.
    pub fn install(self) -> Result<(), log::SetLoggerError> {
        let level = self.level;
        log::set_boxed_logger(Box::new(self))?;
        log::set_max_level(level);
        Ok(())
    }
}

fn tag(level: Level) -> colored::ColoredString {
    match level {
        Level::Error => "ERROR".red().bold(),
        Level::Warn => "WARN ".yellow().bold(),
        Level::Info => "INFO ".green(),
        Level::Debug => "DEBUG".blue(),
        Level::Trace => "TRACE".dimmed(),
    }
}

impl Log for Logger {
    fn enabled(&self, metadata: &Metadata) -> bool {
        metadata.level() <= self.level
    }

    fn log(&self, record: &Record) {
        if !self.enabled(record.metadata()) {
            return;
        }

        if self.console {
            eprintln!("{} {}", tag(record.level()), record.args());
        }

        if let Some(file) = &self.file {
            let timestamp = Local::now().format("%Y-%m-%d %H:%M:%S%.3f");
            // a failed log write has nowhere to be reported
            let _ = writeln!(
                file.lock(),
                "{} [{:<5}] {}: {}",
                timestamp,
                record.level(),
                record.target(),
                record.args()
            );
        }
    }

    fn flush(&self) {
        if let Some(file) = &self.file {
            let _ = file.lock().flush();
        }
    }
}

/// Level from a config string, `info` when unrecognised.
pub fn parse_level(name: &str) -> LevelFilter {
    name.parse().unwrap_or(LevelFilter::Info)
}
