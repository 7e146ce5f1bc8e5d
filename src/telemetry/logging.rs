use std::fmt::Write as _;
use std::path::Path;

use eyre::Result;
use tracing::subscriber::set_global_default;
use tracing::{Level, Subscriber};
use tracing_appender::non_blocking::WorkerGuard;
use tracing_appender::rolling::{RollingFileAppender, Rotation};
use tracing_log::LogTracer;
use tracing_subscriber::registry::LookupSpan;
use tracing_subscriber::Layer;
use tracing_subscriber::{layer::SubscriberExt, EnvFilter, Registry};

use ansi_term::Colour::{Blue, Cyan, Purple, Red, Yellow};

/// Prefix of the rolling log files written under `--log-dir`
pub const LOG_FILE_NAME_PREFIX: &str = "nodestate-exporter.log";

/// Log files roll over once a day
pub const DEFAULT_ROTATION: Rotation = Rotation::DAILY;

/// Configure logging telemetry
///
/// When `log_dir` is set, events are also written to a daily rolling file
/// in that directory. The returned guard flushes that file on drop and must
/// be held for as long as the process logs.
pub fn init(verbose: bool, log_dir: Option<&Path>) -> Result<Option<WorkerGuard>> {
    let env_filter = match verbose {
        true => "nodestate_exporter=debug",
        false => "nodestate_exporter=info",
    };

    match log_dir {
        Some(dir) => {
            let appender = get_rolling_file_appender(dir, DEFAULT_ROTATION);
            let (writer, guard) = tracing_appender::non_blocking(appender);
            let file_layer = tracing_subscriber::fmt::layer()
                .with_ansi(false)
                .with_writer(writer);
            let subscriber = build_subscriber(env_filter.into()).with(file_layer);
            init_subscriber(subscriber)?;
            Ok(Some(guard))
        }
        None => {
            init_subscriber(build_subscriber(env_filter.into()))?;
            Ok(None)
        }
    }
}

/// Subscriber Composer
///
/// Builds a subscriber with an env filter and the [AnsiTermLayer]. `RUST_LOG`
/// takes precedence over the given default directive.
pub fn build_subscriber(
    env_filter: String,
) -> impl Subscriber + Sync + Send + for<'a> LookupSpan<'a> {
    let env_filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(env_filter));
    Registry::default().with(env_filter).with(AnsiTermLayer)
}

/// Globally registers a subscriber.
/// This will error if a subscriber has already been registered.
pub fn init_subscriber(subscriber: impl Subscriber + Send + Sync) -> Result<()> {
    LogTracer::init().map_err(|_| eyre::eyre!("Failed to set logger"))?;
    set_global_default(subscriber).map_err(|_| eyre::eyre!("Failed to set subscriber"))
}

/// Creates a rolling file appender writing into `dir`
pub fn get_rolling_file_appender(dir: &Path, rotation: Rotation) -> RollingFileAppender {
    RollingFileAppender::new(rotation, dir, LOG_FILE_NAME_PREFIX)
}

/// Collects the fields of an event into a single line
#[derive(Debug, Default)]
pub struct AnsiVisitor {
    message: String,
    fields: String,
}

impl AnsiVisitor {
    fn push_field(&mut self, name: &str, value: impl std::fmt::Display) {
        if name == "message" {
            let _ = write!(self.message, "{value}");
        } else {
            let _ = write!(self.fields, " {}={}", Cyan.paint(name), value);
        }
    }

    /// The rendered message followed by any structured fields
    pub fn line(&self) -> String {
        format!("{}{}", self.message, self.fields)
    }
}

impl tracing::field::Visit for AnsiVisitor {
    fn record_f64(&mut self, field: &tracing::field::Field, value: f64) {
        self.push_field(field.name(), value)
    }

    fn record_i64(&mut self, field: &tracing::field::Field, value: i64) {
        self.push_field(field.name(), value)
    }

    fn record_u64(&mut self, field: &tracing::field::Field, value: u64) {
        self.push_field(field.name(), value)
    }

    fn record_bool(&mut self, field: &tracing::field::Field, value: bool) {
        self.push_field(field.name(), value)
    }

    fn record_str(&mut self, field: &tracing::field::Field, value: &str) {
        self.push_field(field.name(), value)
    }

    fn record_error(
        &mut self,
        field: &tracing::field::Field,
        value: &(dyn std::error::Error + 'static),
    ) {
        self.push_field(field.name(), value)
    }

    fn record_debug(&mut self, field: &tracing::field::Field, value: &dyn std::fmt::Debug) {
        self.push_field(field.name(), format_args!("{value:?}"))
    }
}

/// An Ansi Term layer for tracing
#[derive(Debug)]
pub struct AnsiTermLayer;

impl<S> Layer<S> for AnsiTermLayer
where
    S: tracing::Subscriber,
{
    fn on_event(
        &self,
        event: &tracing::Event<'_>,
        _ctx: tracing_subscriber::layer::Context<'_, S>,
    ) {
        let utc: chrono::DateTime<chrono::Utc> = chrono::Utc::now();
        let level = match *event.metadata().level() {
            Level::ERROR => Red.paint("ERROR").to_string(),
            Level::WARN => Yellow.paint("WARN").to_string(),
            Level::INFO => Blue.paint("INFO").to_string(),
            Level::DEBUG => "DEBUG".to_string(),
            _ => Purple.paint("TRACE").to_string(),
        };

        let mut visitor = AnsiVisitor::default();
        event.record(&mut visitor);

        let line = format!(
            "[{}] {}: {} {}",
            Cyan.paint(utc.to_rfc2822()),
            level,
            Purple.paint(event.metadata().target()),
            visitor.line()
        );

        match *event.metadata().level() {
            Level::ERROR => eprintln!("{line}"),
            _ => println!("{line}"),
        }
    }
}
