use chrono::Local;
use log::{LevelFilter, Metadata, Record};

/// Installs a stderr logger. Only used without the TUI, which owns the
/// terminal and shows the station's own log pane instead.
pub fn init(level: LevelFilter) -> anyhow::Result<()> {
    static LOGGER: Logger = Logger;
    log::set_logger(&LOGGER).map_err(|e| anyhow::anyhow!("{e}"))?;
    log::set_max_level(level);
    Ok(())
}

/// Maps `-v` occurrences to a level: warn, info, debug, trace.
pub fn level_from_verbosity(verbose: u8) -> LevelFilter {
    match verbose {
        0 => LevelFilter::Warn,
        1 => LevelFilter::Info,
        2 => LevelFilter::Debug,
        _ => LevelFilter::Trace,
    }
}

struct Logger;

impl log::Log for Logger {
    fn enabled(&self, metadata: &Metadata) -> bool {
        metadata.level() <= log::max_level()
    }

    fn log(&self, record: &Record) {
        if !self.enabled(record.metadata()) {
            return;
        }
        let thread = std::thread::current();
        eprintln!(
            "{} [{:>5}] {} ({}): {}",
            Local::now().format("%H:%M:%S%.3f"),
            record.level(),
            record.target(),
            thread.name().unwrap_or("-"),
            record.args()
        );
    }

    fn flush(&self) {}
}
