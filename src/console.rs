//! Colored console output
//!
//! Every line a stress run prints goes through a [`Console`]. The console
//! is owned by the run state and only touched while its mutex is held, so
//! reports from different workers never interleave.

use std::io::{self, IsTerminal, Write};
use std::sync::{Arc, Mutex};

const RED: &str = "\x1b[31m";
const GREEN: &str = "\x1b[32m";
const BLUE: &str = "\x1b[34m";
const RESET: &str = "\x1b[0m";

/// Line-oriented output sink with optional ANSI coloring
pub struct Console {
    sink: Box<dyn Write + Send>,
    colored: bool,
}

impl Console {
    /// Create a console over an arbitrary sink
    pub fn new(sink: Box<dyn Write + Send>, colored: bool) -> Self {
        Self { sink, colored }
    }

    /// Console on stdout, colored unless `NO_COLOR` is set or stdout is not a terminal
    pub fn stdout() -> Self {
        let colored = std::env::var_os("NO_COLOR").is_none() && io::stdout().is_terminal();
        Self::new(Box::new(io::stdout()), colored)
    }

    /// Console writing uncolored text into a shared in-memory buffer
    pub fn memory(buffer: MemorySink) -> Self {
        Self::new(Box::new(buffer), false)
    }

    pub fn plain(&mut self, text: &str) -> io::Result<()> {
        self.line(None, text)
    }

    pub fn green(&mut self, text: &str) -> io::Result<()> {
        self.line(Some(GREEN), text)
    }

    pub fn red(&mut self, text: &str) -> io::Result<()> {
        self.line(Some(RED), text)
    }

    pub fn blue(&mut self, text: &str) -> io::Result<()> {
        self.line(Some(BLUE), text)
    }

    fn line(&mut self, color: Option<&str>, text: &str) -> io::Result<()> {
        let text = text.trim_end_matches('\n');
        match color {
            Some(color) if self.colored => writeln!(self.sink, "{color}{text}{RESET}")?,
            _ => writeln!(self.sink, "{text}")?,
        }
        self.sink.flush()
    }
}

/// Cloneable in-memory sink; all clones share one buffer
#[derive(Debug, Clone, Default)]
pub struct MemorySink {
    buffer: Arc<Mutex<Vec<u8>>>,
}

impl MemorySink {
    pub fn new() -> Self {
        Self::default()
    }

    /// Everything written so far, lossily decoded
    pub fn contents(&self) -> String {
        match self.buffer.lock() {
            Ok(buffer) => String::from_utf8_lossy(&buffer).into_owned(),
            Err(poisoned) => String::from_utf8_lossy(&poisoned.into_inner()).into_owned(),
        }
    }
}

impl Write for MemorySink {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        let mut buffer = self
            .buffer
            .lock()
            .map_err(|_| io::Error::other("memory sink poisoned"))?;
        buffer.extend_from_slice(buf);
        Ok(buf.len())
    }

    fn flush(&mut self) -> io::Result<()> {
        Ok(())
    }
}
