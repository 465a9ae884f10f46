//! Structured logging for `World`.
//!
//! Two distinct channels share the `slog` ecosystem the rest of this codebase uses for
//! per-subsystem diagnostic trails:
//!
//! - A *tracing* channel: every register/put/get/send/sync call emits a trace- or debug-level
//!   structured record carrying the processor id, the registration id involved, and the call's
//!   logical phase, so a multi-processor run can be reconstructed from merged log output.
//! - The *deferred user log* (`World::log`): buffered until the next barrier completes, then
//!   flushed with processor attribution preserved, per the sync protocol's logging contract. See
//!   [`LogBuffer`].

use slog::Drain;

/// A logger that discards everything, used when a `World` is built without an explicit parent
/// logger.
pub fn discard_logger() -> slog::Logger {
    slog::Logger::root(slog::Discard, slog::o!())
}

/// A terminal logger at the given level, configured the same way the rest of this workspace
/// builds its loggers: a `sloggers` `LoggerConfig` parsed from a small TOML snippet rather than
/// hand-assembling a drain chain.
pub fn terminal_logger(level: slog::Level) -> slog::Logger {
    use sloggers::{Config, LoggerConfig};

    let level_name = match level {
        slog::Level::Critical => "critical",
        slog::Level::Error => "error",
        slog::Level::Warning => "warning",
        slog::Level::Info => "info",
        slog::Level::Debug => "debug",
        slog::Level::Trace => "trace",
    };
    let toml = format!(
        "type = \"terminal\"\nlevel = \"{}\"\ndestination = \"stderr\"\n",
        level_name
    );

    let config: LoggerConfig =
        serdeconv::from_toml_str(&toml).expect("built-in terminal logger config is valid TOML");
    config
        .build_logger()
        .expect("terminal logger backend is always constructible")
}

/// Buffers `World::log` messages for one superstep, so they can be flushed after the barrier that
/// follows them with per-processor attribution and interleaving order preserved, rather than
/// interleaving arbitrarily with output from other processors mid-superstep.
#[derive(Debug, Default)]
pub struct LogBuffer {
    processor: usize,
    entries: Vec<String>,
}

impl LogBuffer {
    pub fn new(processor: usize) -> Self {
        LogBuffer {
            processor,
            entries: Vec::new(),
        }
    }

    #[inline]
    pub fn push(&mut self, message: String) {
        self.entries.push(message);
    }

    /// Drain the buffered messages, handing each to `logger` tagged with this processor's id, and
    /// leave the buffer empty for the next superstep. Returns the drained messages so the caller
    /// can also hand them to the `Transport`'s own `log` sink, which is the channel a non-local
    /// backend (a cluster transport shipping logs back to a coordinator, say) actually owns.
    pub fn flush(&mut self, logger: &slog::Logger) -> Vec<String> {
        let messages: Vec<String> = self.entries.drain(..).collect();
        for message in &messages {
            slog::info!(logger, "{}", message; "processor" => self.processor);
        }
        messages
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn flush_drains_the_buffer() {
        let logger = discard_logger();
        let mut buffer = LogBuffer::new(0);
        buffer.push("hello".to_string());
        buffer.push("world".to_string());
        assert!(!buffer.is_empty());

        buffer.flush(&logger);

        assert!(buffer.is_empty());
    }
}
