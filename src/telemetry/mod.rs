//! Telemetry module
//!
//! This module encompasses telemetry and logging.
//!
//! ### Logging
//!
//! Logging is constructed using the [tracing](https://crates.io/crates/tracing) crate.
//! [crate::telemetry::init] installs a global subscriber printing through the
//! [AnsiTermLayer], optionally mirrored to a daily rolling file. It returns an
//! error if a logger has already been initialized.
//!
//! ### Metrics
//!
//! The exported gauges are held by [ExportedMetrics], which owns its own
//! [prometheus](https://crates.io/crates/prometheus) registry rather than
//! using the process-wide default one.

pub mod logging;
pub use logging::{
    build_subscriber, get_rolling_file_appender, init, AnsiTermLayer, AnsiVisitor,
    DEFAULT_ROTATION, LOG_FILE_NAME_PREFIX,
};

pub mod metrics;
pub use metrics::{ExportedMetrics, TEXT_CONTENT_TYPE};

pub mod shutdown;
pub use shutdown::register_shutdown;
