//! Tracing output for the demo host.
//!
//! The alternate screen owns the terminal, so log lines go either to a file
//! or to an in-memory ring the status bar reads from.

use std::collections::VecDeque;
use std::fs::{File, OpenOptions};
use std::io::{self, Write};
use std::path::Path;
use std::sync::{Arc, Mutex, OnceLock};

use tracing::Level;
use tracing_subscriber::fmt::MakeWriter;

const DEFAULT_MAX_LINES: usize = 500;

static GLOBAL_LOG: OnceLock<LogBuffer> = OnceLock::new();

/// Bounded ring of formatted log lines.
#[derive(Debug, Clone)]
pub struct LogBuffer {
    inner: Arc<Mutex<Ring>>,
}

#[derive(Debug)]
struct Ring {
    lines: VecDeque<String>,
    max_lines: usize,
}

impl LogBuffer {
    pub fn new(max_lines: usize) -> Self {
        Self {
            inner: Arc::new(Mutex::new(Ring {
                lines: VecDeque::new(),
                max_lines: max_lines.max(1),
            })),
        }
    }

    pub fn push(&self, line: impl Into<String>) {
        if let Ok(mut ring) = self.inner.lock() {
            ring.lines.push_back(line.into());
            while ring.lines.len() > ring.max_lines {
                ring.lines.pop_front();
            }
        }
    }

    pub fn last(&self) -> Option<String> {
        self.inner.lock().ok()?.lines.back().cloned()
    }

    pub fn lines(&self) -> Vec<String> {
        self.inner
            .lock()
            .map(|ring| ring.lines.iter().cloned().collect())
            .unwrap_or_default()
    }

    pub fn len(&self) -> usize {
        self.inner.lock().map(|ring| ring.lines.len()).unwrap_or(0)
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn writer(&self) -> LineWriter {
        LineWriter {
            buffer: self.clone(),
            pending: Vec::new(),
        }
    }
}

/// The process-wide ring.
pub fn global_log() -> &'static LogBuffer {
    GLOBAL_LOG.get_or_init(|| LogBuffer::new(DEFAULT_MAX_LINES))
}

/// Most recent line in the process-wide ring.
pub fn last_line() -> Option<String> {
    global_log().last()
}

/// Splits written bytes into lines and pushes complete lines to a buffer.
#[derive(Debug)]
pub struct LineWriter {
    buffer: LogBuffer,
    pending: Vec<u8>,
}

impl LineWriter {
    fn push_complete(&mut self) {
        let Some(end) = self.pending.iter().rposition(|b| *b == b'\n') else {
            return;
        };
        let drained: Vec<u8> = self.pending.drain(..=end).collect();
        for line in String::from_utf8_lossy(&drained).split('\n') {
            let line = line.trim_end_matches('\r');
            if !line.is_empty() {
                self.buffer.push(line);
            }
        }
    }
}

impl Write for LineWriter {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        self.pending.extend_from_slice(buf);
        self.push_complete();
        Ok(buf.len())
    }

    fn flush(&mut self) -> io::Result<()> {
        if !self.pending.is_empty() {
            let rest = String::from_utf8_lossy(&self.pending).into_owned();
            self.pending.clear();
            self.buffer.push(rest);
        }
        Ok(())
    }
}

impl Drop for LineWriter {
    fn drop(&mut self) {
        let _ = self.flush();
    }
}

#[derive(Debug, Clone)]
enum Sink {
    Ring(LogBuffer),
    File(Arc<Mutex<File>>),
}

/// `MakeWriter` handing out writers for the configured sink.
#[derive(Debug, Clone)]
pub struct SinkMakeWriter {
    sink: Sink,
}

impl SinkMakeWriter {
    pub fn ring(buffer: LogBuffer) -> Self {
        Self {
            sink: Sink::Ring(buffer),
        }
    }

    pub fn file(file: File) -> Self {
        Self {
            sink: Sink::File(Arc::new(Mutex::new(file))),
        }
    }
}

pub enum SinkWriter {
    Ring(LineWriter),
    File(Arc<Mutex<File>>),
}

impl Write for SinkWriter {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        match self {
            SinkWriter::Ring(w) => w.write(buf),
            SinkWriter::File(file) => file
                .lock()
                .map_err(|_| io::Error::other("log file lock poisoned"))?
                .write(buf),
        }
    }

    fn flush(&mut self) -> io::Result<()> {
        match self {
            SinkWriter::Ring(w) => w.flush(),
            SinkWriter::File(file) => file
                .lock()
                .map_err(|_| io::Error::other("log file lock poisoned"))?
                .flush(),
        }
    }
}

impl<'a> MakeWriter<'a> for SinkMakeWriter {
    type Writer = SinkWriter;

    fn make_writer(&'a self) -> Self::Writer {
        match &self.sink {
            Sink::Ring(buffer) => SinkWriter::Ring(buffer.writer()),
            Sink::File(file) => SinkWriter::File(Arc::clone(file)),
        }
    }
}

/// Install the global subscriber. Returns `Ok(false)` when one was already
/// installed; later calls never replace the first.
pub fn init(level: Level, log_file: Option<&Path>) -> io::Result<bool> {
    let writer = match log_file {
        Some(path) => SinkMakeWriter::file(
            OpenOptions::new().create(true).append(true).open(path)?,
        ),
        None => SinkMakeWriter::ring(global_log().clone()),
    };
    let installed = tracing_subscriber::fmt()
        .with_max_level(level)
        .with_writer(writer)
        .with_ansi(false)
        .with_target(false)
        .with_thread_names(false)
        .without_time()
        .try_init()
        .is_ok();
    Ok(installed)
}
