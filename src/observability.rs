//! Observability hooks for arena growth, ring finalization and the wire codec.
//!
//! All output goes through the `log` facade so the host process decides where it
//! lands. `log_metric!` is the structured entry point: it renders its key/value
//! pairs as a single `RINGWIRE_METRIC` line at debug level, and the formatting
//! work is skipped entirely when debug logging is disabled.

use std::sync::Once;

use log::LevelFilter;

/// Logs a structured key-value metric line at debug level.
///
/// # Example
/// ```
/// use ringwire::log_metric;
/// let groups = 4;
/// log_metric!("event" = "ring_grow", "groups" = groups);
/// ```
#[macro_export]
macro_rules! log_metric {
    ($($key:literal = $value:expr),+ $(,)?) => {
        if $crate::__log::log_enabled!($crate::__log::Level::Debug) {
            let mut parts = Vec::new();
            $(
                parts.push(format!("\"{}\": \"{}\"", $key, $value));
            )+
            $crate::__log::debug!("RINGWIRE_METRIC: {{ {} }}", parts.join(", "));
        }
    };
}

static INIT_LOGGER: Once = Once::new();

/// Installs an `env_logger` backend once per process. Later calls are no-ops.
pub fn init_logging(level: LevelFilter) {
    INIT_LOGGER.call_once(|| {
        let mut builder = env_logger::Builder::new();

        builder.is_test(cfg!(test));
        builder.filter_level(level);

        builder.format(|buf, record| {
            use std::io::Write;
            writeln!(buf, "[{}] {}", record.level(), record.args())
        });

        let _ = builder.try_init();
    });
}
