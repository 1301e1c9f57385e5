//! Console device with asynchronous reader and writer threads.
//!
//! The device occupies 8 bytes:
//!
//! - offset 0, read: the pending input byte when one is ready, else 0.
//! - offset 1, read: bit 0 set when input is ready; bit 1 set when input is
//!   ready and the input stream hit end-of-file.
//! - offset 4, read: bit 0 set when the last output byte finished writing.
//! - offset 4, write: latches a byte for the writer thread when it is idle;
//!   ignored otherwise.
//!
//! A word read whose window covers offset 0 consumes the pending input byte
//! and wakes the reader. Reads compose all four bytes against one sample of
//! the ready flag, so the guest sees a consistent snapshot. The two threads
//! are detached and terminate with the process.

use std::io::{self, IsTerminal, Read, Write};
use std::sync::atomic::{AtomicBool, AtomicU8, Ordering};
use std::sync::{Arc, Condvar, Mutex, PoisonError};
use std::thread;

use crate::device::Device;

/// One half-duplex handshake: an atomic flag plus a wait/notify pair.
#[derive(Debug, Default)]
struct Gate {
    lock: Mutex<()>,
    cond: Condvar,
}

impl Gate {
    /// Blocks while `condition` holds. The check runs under the gate lock so
    /// a notify between check and sleep cannot be missed.
    fn wait_while(&self, condition: impl Fn() -> bool) {
        let mut guard = self.lock.lock().unwrap_or_else(PoisonError::into_inner);
        while condition() {
            guard = self
                .cond
                .wait(guard)
                .unwrap_or_else(PoisonError::into_inner);
        }
    }

    fn notify(&self) {
        drop(self.lock.lock().unwrap_or_else(PoisonError::into_inner));
        self.cond.notify_one();
    }
}

#[derive(Debug, Default)]
struct Shared {
    input_ready: AtomicBool,
    output_finished: AtomicBool,
    input: AtomicU8,
    output: AtomicU8,
    eof: AtomicBool,
    input_gate: Gate,
    output_gate: Gate,
}

/// The memory-mapped console; see the module docs for the register map.
#[derive(Debug)]
pub struct StdioDevice {
    base: u32,
    shared: Arc<Shared>,
}

/// Size of the managed region minus one.
const STDIO_LIMIT: u32 = 7;

impl StdioDevice {
    /// Creates a console device over the process stdin/stdout, switching the
    /// terminal into raw mode when stdin is a tty.
    #[must_use]
    pub fn new(base: u32) -> Self {
        if io::stdin().is_terminal() {
            match crossterm::terminal::enable_raw_mode() {
                Ok(()) => tracing::debug!("stdin is a terminal, raw mode enabled"),
                Err(error) => tracing::warn!(%error, "cannot enable raw mode"),
            }
        }
        Self::with_streams(base, io::stdin(), io::stdout())
    }

    /// Creates a console device over arbitrary streams. No terminal setup is
    /// performed; tests drive the device through this constructor.
    pub fn with_streams<R, W>(base: u32, input: R, output: W) -> Self
    where
        R: Read + Send + 'static,
        W: Write + Send + 'static,
    {
        let shared = Arc::new(Shared {
            output_finished: AtomicBool::new(true),
            ..Shared::default()
        });
        let reader_shared = Arc::clone(&shared);
        thread::spawn(move || reader_loop(&reader_shared, input));
        let writer_shared = Arc::clone(&shared);
        thread::spawn(move || writer_loop(&writer_shared, output));
        Self { base, shared }
    }

    /// Reads one status byte against a previously sampled ready flag, so a
    /// word read composed of several calls sees one consistent state.
    fn status_byte(&self, off: u32, input_ready: bool) -> u8 {
        match off {
            0 => {
                if input_ready {
                    self.shared.input.load(Ordering::Acquire)
                } else {
                    0
                }
            }
            1 => {
                if input_ready {
                    u8::from(self.shared.eof.load(Ordering::Acquire)) << 1 | 1
                } else {
                    0
                }
            }
            4 => u8::from(self.shared.output_finished.load(Ordering::Acquire)),
            _ => 0,
        }
    }
}

fn reader_loop(shared: &Shared, mut input: impl Read) {
    loop {
        let mut byte = [0_u8; 1];
        match input.read(&mut byte) {
            Ok(1..) => shared.input.store(byte[0], Ordering::Release),
            Ok(0) | Err(_) => {
                shared.eof.store(true, Ordering::Release);
                shared.input.store(0xFF, Ordering::Release);
            }
        }
        shared.input_ready.store(true, Ordering::Release);
        shared
            .input_gate
            .wait_while(|| shared.input_ready.load(Ordering::Acquire));
    }
}

fn writer_loop(shared: &Shared, mut output: impl Write) {
    loop {
        shared
            .output_gate
            .wait_while(|| shared.output_finished.load(Ordering::Acquire));
        let byte = shared.output.load(Ordering::Acquire);
        let _ = output.write_all(&[byte]);
        let _ = output.flush();
        shared.output_finished.store(true, Ordering::Release);
    }
}

impl Device for StdioDevice {
    fn base(&self) -> u32 {
        self.base
    }

    fn limit(&self) -> u32 {
        STDIO_LIMIT
    }

    fn read_byte_at(&self, off: u32) -> u8 {
        self.status_byte(off, self.shared.input_ready.load(Ordering::Acquire))
    }

    fn write_byte_at(&mut self, off: u32, byte: u8) {
        if off == 4 && self.shared.output_finished.load(Ordering::Acquire) {
            self.shared.output.store(byte, Ordering::Release);
            self.shared.output_finished.store(false, Ordering::Release);
            self.shared.output_gate.notify();
        }
    }

    fn read_word_at(&self, off: u32) -> u32 {
        let ready = self.shared.input_ready.load(Ordering::Acquire);
        let word = u32::from(self.status_byte(off, ready))
            | u32::from(self.status_byte(off.wrapping_add(1), ready)) << 8
            | u32::from(self.status_byte(off.wrapping_add(2), ready)) << 16
            | u32::from(self.status_byte(off.wrapping_add(3), ready)) << 24;
        // Consume the input byte when the window covers offset 0.
        if (off == 0 || off >= 0xFFFF_FFFD) && ready {
            self.shared.input_ready.store(false, Ordering::Release);
            self.shared.input_gate.notify();
        }
        word
    }
}
