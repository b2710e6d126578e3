//! Character I/O primitives the core VM treats as an external collaborator.
//!
//! The VM never touches stdin/stdout directly; it goes through this trait
//! so the memory gateway and trap handlers can be driven by a fake console
//! in tests instead of the real terminal.

use std::io::{self, Read, Write};
use termios::{tcsetattr, Termios};
use termios::{BRKINT, ECHO, ICANON, ICRNL, IGNBRK, IGNCR, INLCR, ISTRIP, IXON, PARMRK, TCSANOW};

pub trait Console {
    /// True if at least one byte is ready on the input without blocking.
    fn poll_key(&mut self) -> bool;
    /// Block until one byte arrives; return it without echoing.
    fn read_key(&mut self) -> u8;
    /// Write one byte; buffering is allowed but `flush` makes it visible.
    fn write_byte(&mut self, byte: u8);
    fn flush(&mut self);
}

/// Drives the real terminal: disables canonical mode and echo on
/// construction, restores the original settings on drop so a fatal error
/// or an early return never leaves the user's shell in raw mode.
pub struct TermiosConsole {
    original: Termios,
}

impl TermiosConsole {
    pub fn new() -> io::Result<Self> {
        let original = Termios::from_fd(libc::STDIN_FILENO)?;

        let mut raw = original;
        raw.c_iflag &= IGNBRK | BRKINT | PARMRK | ISTRIP | INLCR | IGNCR | ICRNL | IXON;
        raw.c_lflag &= !(ICANON | ECHO);
        tcsetattr(libc::STDIN_FILENO, TCSANOW, &raw)?;

        Ok(Self { original })
    }

    /// Zero-timeout `select` on stdin; the textbook way to ask "is a byte
    /// ready?" without blocking or spawning a reader thread.
    fn stdin_ready(&self) -> bool {
        unsafe {
            let mut read_fds: libc::fd_set = std::mem::zeroed();
            libc::FD_ZERO(&mut read_fds);
            libc::FD_SET(libc::STDIN_FILENO, &mut read_fds);

            let mut timeout = libc::timeval {
                tv_sec: 0,
                tv_usec: 0,
            };

            let ready = libc::select(
                libc::STDIN_FILENO + 1,
                &mut read_fds,
                std::ptr::null_mut(),
                std::ptr::null_mut(),
                &mut timeout,
            );

            ready > 0
        }
    }
}

impl Console for TermiosConsole {
    fn poll_key(&mut self) -> bool {
        self.stdin_ready()
    }

    fn read_key(&mut self) -> u8 {
        let mut byte = [0u8; 1];
        match io::stdin().read_exact(&mut byte) {
            Ok(()) => byte[0],
            // EOF on redirected/finite input: hand the program a null byte
            // rather than aborting the interpreter mid-trap.
            Err(_) => 0,
        }
    }

    fn write_byte(&mut self, byte: u8) {
        let _ = io::stdout().write_all(&[byte]);
    }

    fn flush(&mut self) {
        let _ = io::stdout().flush();
    }
}

impl Drop for TermiosConsole {
    fn drop(&mut self) {
        let _ = tcsetattr(libc::STDIN_FILENO, TCSANOW, &self.original);
    }
}

/// An in-memory stand-in for the terminal, used by unit tests: bytes are
/// queued up front and `write_byte` just records what was written.
#[cfg(test)]
pub struct FakeConsole {
    input: std::collections::VecDeque<u8>,
    pub output: Vec<u8>,
}

#[cfg(test)]
impl FakeConsole {
    pub fn new(input: &[u8]) -> Self {
        Self {
            input: input.iter().copied().collect(),
            output: Vec::new(),
        }
    }
}

#[cfg(test)]
impl Console for FakeConsole {
    fn poll_key(&mut self) -> bool {
        !self.input.is_empty()
    }

    fn read_key(&mut self) -> u8 {
        self.input.pop_front().unwrap_or(0)
    }

    fn write_byte(&mut self, byte: u8) {
        self.output.push(byte);
    }

    fn flush(&mut self) {}
}
