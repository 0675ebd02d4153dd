//! In-memory [`Stdin`]/[`Stdout`] adapters.
//!
//! Used by tests to run builtins without touching the real standard
//! streams. They deliberately degrade to `Stdio::null()` when handed to a
//! child process: a memory buffer has no file descriptor to inherit.

use crate::command::{Stdin, Stdout};
use std::cell::RefCell;
use std::io::{Cursor, Read, Result as IoResult, Write};
use std::process::Stdio;
use std::rc::Rc;

/// Reader over a fixed byte buffer.
pub struct MemReader {
    cursor: Cursor<Vec<u8>>,
}

impl MemReader {
    pub fn new(buf: Vec<u8>) -> Self {
        Self {
            cursor: Cursor::new(buf),
        }
    }
}

impl Read for MemReader {
    fn read(&mut self, out: &mut [u8]) -> IoResult<usize> {
        self.cursor.read(out)
    }
}

impl Stdin for MemReader {
    fn stdio(self: Box<Self>) -> Stdio {
        Stdio::null()
    }
}

/// Writer that collects bytes into a shared buffer the caller keeps a
/// handle to, so output survives the writer being consumed by `execute`.
pub struct MemWriter {
    buf: Rc<RefCell<Vec<u8>>>,
}

impl MemWriter {
    /// Create a writer and the handle for reading back what it collected.
    pub fn with_handle() -> (Self, Rc<RefCell<Vec<u8>>>) {
        let buf = Rc::new(RefCell::new(Vec::new()));
        let handle = Rc::clone(&buf);
        (Self { buf }, handle)
    }
}

impl Write for MemWriter {
    fn write(&mut self, data: &[u8]) -> IoResult<usize> {
        self.buf.borrow_mut().extend_from_slice(data);
        Ok(data.len())
    }

    fn flush(&mut self) -> IoResult<()> {
        Ok(())
    }
}

impl Stdout for MemWriter {
    fn stdio(self: Box<Self>) -> Stdio {
        Stdio::null()
    }
}
