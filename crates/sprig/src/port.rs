//! I/O ports: the byte/character streams the reader and printer run over.
//!
//! Ports are heap values (a `PortHeap` cell whose cdr indexes the heap's
//! port slab). The three current-port designations made at setup are GC
//! roots; a port cell that becomes unreachable is closed exactly once when
//! the collector sweeps it. Closing is idempotent.

use std::{
    any::Any,
    fmt,
    fs::File,
    io::{self, BufRead, BufReader, Read, Write},
    path::Path,
};

/// A character stream usable by the reader and/or printer.
///
/// Implementations buffer one char of lookahead for `peek_char`. Errors
/// surface as `io::Error` and are mapped to `io-error` at the native
/// boundary. Short reads on interactive streams are retried by the
/// implementation, not surfaced.
pub trait Port: fmt::Debug {
    /// Reads one character, or `None` at end of input.
    fn read_char(&mut self) -> io::Result<Option<char>>;

    /// Returns the next character without consuming it.
    fn peek_char(&mut self) -> io::Result<Option<char>>;

    /// Writes a string to the port.
    fn write_str(&mut self, s: &str) -> io::Result<()>;

    fn flush(&mut self) -> io::Result<()> {
        Ok(())
    }

    /// Closes the port. Idempotent; reads and writes after close fail.
    fn close(&mut self);

    fn is_input(&self) -> bool;

    fn is_output(&self) -> bool;

    /// Downcast support (e.g. `get-output-string`).
    fn as_any_mut(&mut self) -> &mut dyn Any;
}

fn closed_err() -> io::Error {
    io::Error::new(io::ErrorKind::BrokenPipe, "port is closed")
}

/// Reads characters from an in-memory string.
#[derive(Debug)]
pub struct StringInputPort {
    chars: Vec<char>,
    pos: usize,
    closed: bool,
}

impl StringInputPort {
    #[must_use]
    pub fn new(text: &str) -> Self {
        Self { chars: text.chars().collect(), pos: 0, closed: false }
    }
}

impl Port for StringInputPort {
    fn read_char(&mut self) -> io::Result<Option<char>> {
        if self.closed {
            return Err(closed_err());
        }
        let c = self.chars.get(self.pos).copied();
        if c.is_some() {
            self.pos += 1;
        }
        Ok(c)
    }

    fn peek_char(&mut self) -> io::Result<Option<char>> {
        if self.closed {
            return Err(closed_err());
        }
        Ok(self.chars.get(self.pos).copied())
    }

    fn write_str(&mut self, _s: &str) -> io::Result<()> {
        Err(io::Error::new(io::ErrorKind::Unsupported, "input port is not writable"))
    }

    fn close(&mut self) {
        self.closed = true;
    }

    fn is_input(&self) -> bool {
        true
    }

    fn is_output(&self) -> bool {
        false
    }

    fn as_any_mut(&mut self) -> &mut dyn Any {
        self
    }
}

/// Accumulates written text in memory; drained by `get-output-string`.
#[derive(Debug, Default)]
pub struct StringOutputPort {
    buf: String,
    closed: bool,
}

impl StringOutputPort {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// The accumulated text so far.
    #[must_use]
    pub fn contents(&self) -> &str {
        &self.buf
    }

    /// Takes the accumulated text, leaving the port empty.
    pub fn take(&mut self) -> String {
        std::mem::take(&mut self.buf)
    }
}

impl Port for StringOutputPort {
    fn read_char(&mut self) -> io::Result<Option<char>> {
        Err(io::Error::new(io::ErrorKind::Unsupported, "output port is not readable"))
    }

    fn peek_char(&mut self) -> io::Result<Option<char>> {
        Err(io::Error::new(io::ErrorKind::Unsupported, "output port is not readable"))
    }

    fn write_str(&mut self, s: &str) -> io::Result<()> {
        if self.closed {
            return Err(closed_err());
        }
        self.buf.push_str(s);
        Ok(())
    }

    fn close(&mut self) {
        self.closed = true;
    }

    fn is_input(&self) -> bool {
        false
    }

    fn is_output(&self) -> bool {
        true
    }

    fn as_any_mut(&mut self) -> &mut dyn Any {
        self
    }
}

/// Line-buffered standard input.
pub struct StdinPort {
    reader: BufReader<io::Stdin>,
    pending: Vec<char>,
    pos: usize,
    closed: bool,
}

impl StdinPort {
    #[must_use]
    pub fn new() -> Self {
        Self { reader: BufReader::new(io::stdin()), pending: Vec::new(), pos: 0, closed: false }
    }

    fn fill(&mut self) -> io::Result<()> {
        if self.pos < self.pending.len() {
            return Ok(());
        }
        let mut line = String::new();
        let n = self.reader.read_line(&mut line)?;
        if n == 0 {
            return Ok(()); // genuine end of input
        }
        self.pending = line.chars().collect();
        self.pos = 0;
        Ok(())
    }
}

impl Default for StdinPort {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Debug for StdinPort {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("StdinPort").field("closed", &self.closed).finish_non_exhaustive()
    }
}

impl Port for StdinPort {
    fn read_char(&mut self) -> io::Result<Option<char>> {
        if self.closed {
            return Err(closed_err());
        }
        self.fill()?;
        let c = self.pending.get(self.pos).copied();
        if c.is_some() {
            self.pos += 1;
        }
        Ok(c)
    }

    fn peek_char(&mut self) -> io::Result<Option<char>> {
        if self.closed {
            return Err(closed_err());
        }
        self.fill()?;
        Ok(self.pending.get(self.pos).copied())
    }

    fn write_str(&mut self, _s: &str) -> io::Result<()> {
        Err(io::Error::new(io::ErrorKind::Unsupported, "input port is not writable"))
    }

    fn close(&mut self) {
        self.closed = true;
    }

    fn is_input(&self) -> bool {
        true
    }

    fn is_output(&self) -> bool {
        false
    }

    fn as_any_mut(&mut self) -> &mut dyn Any {
        self
    }
}

/// Standard output or standard error.
#[derive(Debug)]
pub struct StdOutputPort {
    stderr: bool,
    closed: bool,
}

impl StdOutputPort {
    #[must_use]
    pub fn stdout() -> Self {
        Self { stderr: false, closed: false }
    }

    #[must_use]
    pub fn stderr() -> Self {
        Self { stderr: true, closed: false }
    }
}

impl Port for StdOutputPort {
    fn read_char(&mut self) -> io::Result<Option<char>> {
        Err(io::Error::new(io::ErrorKind::Unsupported, "output port is not readable"))
    }

    fn peek_char(&mut self) -> io::Result<Option<char>> {
        Err(io::Error::new(io::ErrorKind::Unsupported, "output port is not readable"))
    }

    fn write_str(&mut self, s: &str) -> io::Result<()> {
        if self.closed {
            return Err(closed_err());
        }
        if self.stderr {
            io::stderr().write_all(s.as_bytes())
        } else {
            io::stdout().write_all(s.as_bytes())
        }
    }

    fn flush(&mut self) -> io::Result<()> {
        if self.stderr {
            io::stderr().flush()
        } else {
            io::stdout().flush()
        }
    }

    fn close(&mut self) {
        // std streams stay open for the process; close only gates the port
        self.closed = true;
    }

    fn is_input(&self) -> bool {
        false
    }

    fn is_output(&self) -> bool {
        true
    }

    fn as_any_mut(&mut self) -> &mut dyn Any {
        self
    }
}

/// A file opened for reading.
#[derive(Debug)]
pub struct FileInputPort {
    reader: Option<BufReader<File>>,
    pending: Vec<char>,
    pos: usize,
}

impl FileInputPort {
    pub fn open(path: &Path) -> io::Result<Self> {
        let file = File::open(path)?;
        Ok(Self { reader: Some(BufReader::new(file)), pending: Vec::new(), pos: 0 })
    }

    fn fill(&mut self) -> io::Result<()> {
        if self.pos < self.pending.len() {
            return Ok(());
        }
        let Some(reader) = self.reader.as_mut() else {
            return Err(closed_err());
        };
        let mut buf = [0_u8; 4096];
        let n = reader.read(&mut buf)?;
        if n == 0 {
            return Ok(());
        }
        // Tolerate invalid UTF-8 the way the printer does: replace.
        self.pending = String::from_utf8_lossy(&buf[..n]).chars().collect();
        self.pos = 0;
        Ok(())
    }
}

impl Port for FileInputPort {
    fn read_char(&mut self) -> io::Result<Option<char>> {
        self.fill()?;
        let c = self.pending.get(self.pos).copied();
        if c.is_some() {
            self.pos += 1;
        }
        Ok(c)
    }

    fn peek_char(&mut self) -> io::Result<Option<char>> {
        self.fill()?;
        Ok(self.pending.get(self.pos).copied())
    }

    fn write_str(&mut self, _s: &str) -> io::Result<()> {
        Err(io::Error::new(io::ErrorKind::Unsupported, "input port is not writable"))
    }

    fn close(&mut self) {
        self.reader = None;
    }

    fn is_input(&self) -> bool {
        true
    }

    fn is_output(&self) -> bool {
        false
    }

    fn as_any_mut(&mut self) -> &mut dyn Any {
        self
    }
}

/// A file opened for writing (truncating).
#[derive(Debug)]
pub struct FileOutputPort {
    file: Option<File>,
}

impl FileOutputPort {
    pub fn create(path: &Path) -> io::Result<Self> {
        Ok(Self { file: Some(File::create(path)?) })
    }
}

impl Port for FileOutputPort {
    fn read_char(&mut self) -> io::Result<Option<char>> {
        Err(io::Error::new(io::ErrorKind::Unsupported, "output port is not readable"))
    }

    fn peek_char(&mut self) -> io::Result<Option<char>> {
        Err(io::Error::new(io::ErrorKind::Unsupported, "output port is not readable"))
    }

    fn write_str(&mut self, s: &str) -> io::Result<()> {
        match self.file.as_mut() {
            Some(file) => file.write_all(s.as_bytes()),
            None => Err(closed_err()),
        }
    }

    fn flush(&mut self) -> io::Result<()> {
        match self.file.as_mut() {
            Some(file) => file.flush(),
            None => Ok(()),
        }
    }

    fn close(&mut self) {
        self.file = None;
    }

    fn is_input(&self) -> bool {
        false
    }

    fn is_output(&self) -> bool {
        true
    }

    fn as_any_mut(&mut self) -> &mut dyn Any {
        self
    }
}
