use std::{
    fs::File,
    io,
    path::{Path, PathBuf},
    sync::Mutex,
};

use anyhow::{Context, Result};
use chrono::Local;
use tracing::{Event, Subscriber, warn};
use tracing_subscriber::{
    EnvFilter,
    fmt::{
        FmtContext,
        format::{FormatEvent, FormatFields, Writer},
    },
    layer::SubscriberExt,
    registry::LookupSpan,
    util::SubscriberInitExt,
};

pub const DEFAULT_LEVEL: &str = "info";

/// What the command line asked of logging.
#[derive(Debug, Clone, Default)]
pub struct LogSettings {
    /// Level or filter directive. Ignored while `RUST_LOG` is set.
    pub level: Option<String>,
    /// Also append log output here.
    pub file: Option<PathBuf>,
    /// No log output on stderr.
    pub quiet: bool,
}

// `<time> <LEVEL> [analytics] fields`; the tag only appears on usage events.
struct LocalFmt;

impl<S, N> FormatEvent<S, N> for LocalFmt
where
    S: Subscriber + for<'a> LookupSpan<'a>,
    N: for<'a> FormatFields<'a> + 'static,
{
    fn format_event(
        &self,
        ctx: &FmtContext<'_, S, N>,
        mut writer: Writer<'_>,
        event: &Event<'_>,
    ) -> std::fmt::Result {
        let meta = event.metadata();
        write!(
            writer,
            "{} {:>5} ",
            Local::now().format("%Y-%m-%dT%H:%M:%S%.3f%:z"),
            meta.level()
        )?;
        if meta.target() == "analytics" {
            write!(writer, "[analytics] ")?;
        }
        ctx.field_format().format_fields(writer.by_ref(), event)?;
        writeln!(writer)
    }
}

fn env_filter_set() -> bool {
    std::env::var_os(EnvFilter::DEFAULT_ENV).is_some()
}

/// Picks the filter: `RUST_LOG`, then the configured level, then
/// [`DEFAULT_LEVEL`]. Returns the rejected directive alongside when the
/// configured one does not parse.
fn make_filter(level: Option<&str>) -> (EnvFilter, Option<String>) {
    if env_filter_set() {
        if let Ok(filter) = EnvFilter::try_from_default_env() {
            return (filter, None);
        }
    }
    match level {
        Some(level) => match EnvFilter::try_new(level) {
            Ok(filter) => (filter, None),
            Err(_) => (EnvFilter::new(DEFAULT_LEVEL), Some(level.to_string())),
        },
        None => (EnvFilter::new(DEFAULT_LEVEL), None),
    }
}

fn open_log_file(path: &Path) -> Result<File> {
    if let Some(dir) = path.parent().filter(|d| !d.as_os_str().is_empty()) {
        std::fs::create_dir_all(dir)
            .with_context(|| format!("cannot create log directory '{}'", dir.display()))?;
    }
    File::options()
        .create(true)
        .append(true)
        .open(path)
        .with_context(|| format!("cannot open log file '{}'", path.display()))
}

/// Initializes logging. Call once, after the command line is parsed.
///
/// Console output goes to stderr so command output on stdout stays clean.
/// A log file that cannot be opened is reported and skipped.
pub fn init_logging(settings: &LogSettings) {
    let (filter, rejected_level) = make_filter(settings.level.as_deref());

    let (file, file_error) = match settings.file.as_deref().map(open_log_file) {
        Some(Ok(file)) => (Some(file), None),
        Some(Err(e)) => (None, Some(e)),
        None => (None, None),
    };

    let console_layer = (!settings.quiet).then(|| {
        tracing_subscriber::fmt::layer()
            .event_format(LocalFmt)
            .with_writer(io::stderr)
    });
    let file_layer = file.map(|file| {
        tracing_subscriber::fmt::layer()
            .event_format(LocalFmt)
            .with_ansi(false)
            .with_writer(Mutex::new(file))
    });

    let _ = tracing_subscriber::registry()
        .with(filter)
        .with(console_layer)
        .with(file_layer)
        .try_init();

    if let Some(level) = rejected_level {
        warn!(level = %level, "invalid log level, using {DEFAULT_LEVEL}");
    }
    if let Some(e) = file_error {
        warn!(error = %format!("{e:#}"), "file logging disabled");
    }
}
