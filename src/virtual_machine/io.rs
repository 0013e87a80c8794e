//! Host I/O seen by the machine.
//!
//! The [`Io`] trait is the only channel between a running program and the
//! outside world: `SIO WRITE` hands a value to [`Io::write`] and `SIO READ`
//! takes one from [`Io::read`]. Failures surface as [`VMError::IoError`] or,
//! for a token that is not an integer, [`VMError::InvalidInput`], and fault
//! the run.

use crate::virtual_machine::errors::VMError;
use crate::virtual_machine::isa::Word;
use std::collections::VecDeque;
use std::io::{BufRead, Stdout, Write};

/// Integer I/O interface for `SIO` instructions.
pub trait Io {
    /// Emits a value. Values are emitted in program order.
    fn write(&mut self, value: Word) -> Result<(), VMError>;
    /// Returns the next input value, blocking until one is available.
    fn read(&mut self) -> Result<Word, VMError>;
}

impl<T: Io + ?Sized> Io for &mut T {
    fn write(&mut self, value: Word) -> Result<(), VMError> {
        (**self).write(value)
    }

    fn read(&mut self) -> Result<Word, VMError> {
        (**self).read()
    }
}

/// Text I/O over a reader and a writer.
///
/// Input is a sequence of whitespace-separated decimal integers spread over
/// any number of lines; output is one value per line, flushed immediately.
pub struct StreamIo<R, W> {
    reader: R,
    writer: W,
    pending: VecDeque<String>,
}

impl<R: BufRead, W: Write> StreamIo<R, W> {
    pub fn new(reader: R, writer: W) -> Self {
        Self {
            reader,
            writer,
            pending: VecDeque::new(),
        }
    }

    /// Returns the reader and writer, dropping any buffered input tokens.
    pub fn into_inner(self) -> (R, W) {
        (self.reader, self.writer)
    }
}

impl<R: BufRead, W: Write> Io for StreamIo<R, W> {
    fn write(&mut self, value: Word) -> Result<(), VMError> {
        writeln!(self.writer, "{value}").map_err(|e| VMError::IoError(e.to_string()))?;
        self.writer
            .flush()
            .map_err(|e| VMError::IoError(e.to_string()))
    }

    fn read(&mut self) -> Result<Word, VMError> {
        loop {
            if let Some(token) = self.pending.pop_front() {
                return Ok(token.parse::<Word>()?);
            }
            let mut line = String::new();
            let read = self
                .reader
                .read_line(&mut line)
                .map_err(|e| VMError::IoError(e.to_string()))?;
            if read == 0 {
                return Err(VMError::IoError("unexpected end of input".to_string()));
            }
            self.pending
                .extend(line.split_whitespace().map(str::to_string));
        }
    }
}

/// [`StreamIo`] over the process's standard input and output.
pub type StdIo = StreamIo<std::io::StdinLock<'static>, Stdout>;

impl StdIo {
    pub fn stdio() -> Self {
        StreamIo::new(std::io::stdin().lock(), std::io::stdout())
    }
}

/// In-memory I/O with scripted input and captured output.
#[derive(Clone, Debug, Default)]
pub struct BufferedIo {
    input: VecDeque<Word>,
    output: Vec<Word>,
}

impl BufferedIo {
    pub fn new() -> Self {
        Self::default()
    }

    /// Creates an adapter whose reads return `input` in order.
    pub fn with_input<I: IntoIterator<Item = Word>>(input: I) -> Self {
        Self {
            input: input.into_iter().collect(),
            output: Vec::new(),
        }
    }

    /// Queues another input value.
    pub fn push_input(&mut self, value: Word) {
        self.input.push_back(value);
    }

    /// Values written so far, in order.
    pub fn output(&self) -> &[Word] {
        &self.output
    }

    /// Input values not yet read.
    pub fn remaining_input(&self) -> usize {
        self.input.len()
    }

    pub fn into_output(self) -> Vec<Word> {
        self.output
    }
}

impl Io for BufferedIo {
    fn write(&mut self, value: Word) -> Result<(), VMError> {
        self.output.push(value);
        Ok(())
    }

    fn read(&mut self) -> Result<Word, VMError> {
        self.input
            .pop_front()
            .ok_or_else(|| VMError::IoError("input exhausted".to_string()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::virtual_machine::errors::ErrorKind;

    #[test]
    fn buffered_io_replays_input_and_captures_output() {
        let mut io = BufferedIo::with_input([4, -2]);
        assert_eq!(io.read().unwrap(), 4);
        io.write(10).unwrap();
        io.push_input(9);
        assert_eq!(io.remaining_input(), 2);
        assert_eq!(io.read().unwrap(), -2);
        assert_eq!(io.read().unwrap(), 9);
        assert_eq!(
            io.read(),
            Err(VMError::IoError("input exhausted".to_string()))
        );
        assert_eq!(io.output(), &[10]);
    }

    #[test]
    fn stream_io_reads_tokens_across_lines() {
        let input = "3 -7\n\n  12\n";
        let mut io = StreamIo::new(input.as_bytes(), Vec::new());
        assert_eq!(io.read().unwrap(), 3);
        assert_eq!(io.read().unwrap(), -7);
        assert_eq!(io.read().unwrap(), 12);
        assert!(matches!(io.read(), Err(VMError::IoError(_))));
    }

    #[test]
    fn stream_io_rejects_malformed_tokens() {
        let mut io = StreamIo::new("4x 5\n".as_bytes(), Vec::new());
        let error = io.read().unwrap_err();
        assert!(matches!(error, VMError::InvalidInput(_)));
        assert_eq!(error.kind(), ErrorKind::IOError);
        assert_eq!(io.read().unwrap(), 5);
    }

    #[test]
    fn stream_io_writes_one_value_per_line() {
        let mut io = StreamIo::new(&b""[..], Vec::new());
        io.write(8).unwrap();
        io.write(-1).unwrap();
        let (_, out) = io.into_inner();
        assert_eq!(String::from_utf8(out).unwrap(), "8\n-1\n");
    }

    #[test]
    fn io_is_usable_through_mutable_reference() {
        fn emit<I: Io>(mut io: I) {
            io.write(1).unwrap();
        }
        let mut io = BufferedIo::new();
        emit(&mut io);
        assert_eq!(io.output(), &[1]);
    }
}
