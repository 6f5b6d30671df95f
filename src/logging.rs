//! Logging setup and log fan-out
//!
//! Formatted log lines go to stdout and to every sink registered with the
//! [`LogBroadcast`]. Sinks can be added and removed while the process runs,
//! which lets a control surface follow the log without owning the subscriber.

use std::io::{self, Write};
use std::sync::{Arc, RwLock};
use tokio::sync::mpsc::UnboundedSender;
use tracing_subscriber::fmt::MakeWriter;
use tracing_subscriber::EnvFilter;

/// Receives formatted log output
pub trait LogSink: Send + Sync {
    fn write_log(&self, line: &str);
}

/// Forwards log output over a channel; closed channels are ignored
pub struct ChannelSink {
    tx: UnboundedSender<String>,
}

impl ChannelSink {
    pub fn new(tx: UnboundedSender<String>) -> Self {
        Self { tx }
    }
}

impl LogSink for ChannelSink {
    fn write_log(&self, line: &str) {
        let _ = self.tx.send(line.to_string());
    }
}

type Sinks = Vec<(String, Arc<dyn LogSink>)>;

/// Named set of log sinks behind a tracing writer
#[derive(Clone, Default)]
pub struct LogBroadcast {
    sinks: Arc<RwLock<Sinks>>,
    quiet_stdout: bool,
}

impl LogBroadcast {
    pub fn new() -> Self {
        Self::default()
    }

    /// A broadcast that only feeds registered sinks
    pub fn without_stdout() -> Self {
        Self {
            quiet_stdout: true,
            ..Self::default()
        }
    }

    /// Adds a sink, replacing any sink registered under the same name
    pub fn register(&self, name: &str, sink: Arc<dyn LogSink>) {
        let mut sinks = self.sinks.write().unwrap_or_else(|e| e.into_inner());
        sinks.retain(|(n, _)| n != name);
        sinks.push((name.to_string(), sink));
    }

    /// Removes a sink; returns whether it was registered
    pub fn unregister(&self, name: &str) -> bool {
        let mut sinks = self.sinks.write().unwrap_or_else(|e| e.into_inner());
        let before = sinks.len();
        sinks.retain(|(n, _)| n != name);
        sinks.len() != before
    }

    pub fn sink_names(&self) -> Vec<String> {
        self.sinks
            .read()
            .unwrap_or_else(|e| e.into_inner())
            .iter()
            .map(|(n, _)| n.clone())
            .collect()
    }

    fn publish(&self, buf: &[u8]) -> io::Result<()> {
        if !self.quiet_stdout {
            io::stdout().write_all(buf)?;
        }
        let line = String::from_utf8_lossy(buf);
        for (_, sink) in self.sinks.read().unwrap_or_else(|e| e.into_inner()).iter() {
            sink.write_log(&line);
        }
        Ok(())
    }
}

/// Writer handed out per log event
pub struct BroadcastWriter {
    broadcast: LogBroadcast,
}

impl Write for BroadcastWriter {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        self.broadcast.publish(buf)?;
        Ok(buf.len())
    }

    fn flush(&mut self) -> io::Result<()> {
        if !self.broadcast.quiet_stdout {
            io::stdout().flush()?;
        }
        Ok(())
    }
}

impl<'a> MakeWriter<'a> for LogBroadcast {
    type Writer = BroadcastWriter;

    fn make_writer(&'a self) -> Self::Writer {
        BroadcastWriter {
            broadcast: self.clone(),
        }
    }
}

/// Builds the tracing filter
///
/// `-q` shows errors only and each `-v` raises verbosity. Without flags the
/// configured level applies, falling back to info for this crate.
pub fn build_filter(verbose: u8, quiet: bool, level: Option<&str>) -> EnvFilter {
    if quiet {
        return EnvFilter::new("error");
    }
    match verbose {
        0 => match level {
            Some(level) if !level.is_empty() => EnvFilter::new(level),
            _ => EnvFilter::new("web2feed=info,warn"),
        },
        1 => EnvFilter::new("web2feed=debug,info"),
        2 => EnvFilter::new("web2feed=trace,debug"),
        _ => EnvFilter::new("trace"),
    }
}

/// Sets up the logging/tracing subscriber
pub fn setup_logging(verbose: u8, quiet: bool, level: Option<&str>, broadcast: LogBroadcast) {
    tracing_subscriber::fmt()
        .with_env_filter(build_filter(verbose, quiet, level))
        .with_writer(broadcast)
        .with_ansi(false)
        .with_target(false)
        .with_thread_ids(false)
        .with_file(false)
        .init();
}
