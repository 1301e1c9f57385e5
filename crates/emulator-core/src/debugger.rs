//! Interactive single-step debugger shell.
//!
//! The shell activates when a breakpoint requests single-step mode. It
//! prints the current program counter and disassembly, then reads one
//! command per line:
//!
//! - `r0` .. `r7`: print a register as `0x<hex> (<dec>)`.
//! - `byte <addr>` / `hword <addr>` / `word <addr>`: print the addressed
//!   value masked to 8/16/32 bits.
//! - `b` / `break <addr>`: add a numbered breakpoint.
//! - `d` / `delete <id>`: remove the first breakpoint with that id.
//! - `s` / `step`: execute one instruction and re-enter the shell.
//! - `n` / `next`: install a one-shot breakpoint at `pc + 4` and resume.
//! - `c` / `continue`: resume execution.
//!
//! Numbers accept C integer literal forms: decimal, `0x` hexadecimal, and
//! leading-zero octal. When standard input is a terminal the shell edits the
//! line in raw mode (visual backspace, TAB ignored, 511-character cap);
//! otherwise lines are read verbatim. End-of-file on the command input stops
//! the run.

use std::io::{self, BufRead, IsTerminal, Write};

use crate::cpu::{Cpu, ExecState};
use crate::disasm::format_inst;
use crate::world::World;

/// Longest accepted command line, excluding the terminator.
const LINE_CAP: usize = 511;

/// What the interpreter should do after a shell session.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ShellOutcome {
    /// Execute one instruction, then re-enter the shell.
    Step,
    /// Resume free execution.
    Resume,
    /// The command input hit end-of-file; stop the run.
    Quit,
}

/// The debugger shell over a command input and a diagnostic output.
///
/// Production use wires it to stdin/stderr via [`Shell::interactive`]; tests
/// drive it with in-memory streams.
#[derive(Debug)]
pub struct Shell<R, W> {
    input: R,
    output: W,
    raw_tty: bool,
}

impl Shell<io::StdinLock<'static>, io::Stderr> {
    /// Builds the interactive shell over stdin/stderr, with raw-mode line
    /// editing when stdin is a terminal.
    #[must_use]
    pub fn interactive() -> Self {
        let raw_tty = io::stdin().is_terminal();
        Self {
            input: io::stdin().lock(),
            output: io::stderr(),
            raw_tty,
        }
    }
}

impl<R: BufRead, W: Write> Shell<R, W> {
    /// Builds a shell over arbitrary streams, reading lines verbatim.
    pub fn new(input: R, output: W) -> Self {
        Self {
            input,
            output,
            raw_tty: false,
        }
    }

    /// The diagnostic output; breakpoint announcements print here too.
    pub fn output_mut(&mut self) -> &mut W {
        &mut self.output
    }

    /// Runs the command loop for one suspension at `state.pc`.
    pub fn interact(
        &mut self,
        cpu: &mut Cpu,
        world: &World,
        state: &ExecState,
        inst: u32,
    ) -> ShellOutcome {
        let _ = writeln!(self.output, "0x{:x}: {}", state.pc, format_inst(inst));
        loop {
            let _ = write!(self.output, "> ");
            let _ = self.output.flush();
            let Some(line) = self.read_line() else {
                return ShellOutcome::Quit;
            };
            let tokens: Vec<&str> = line.split_whitespace().collect();
            let Some(&command) = tokens.first() else {
                continue;
            };

            if let Some(index) = register_index(command) {
                self.print_num(state.regs[index]);
                continue;
            }

            match command {
                "byte" | "hword" | "word" => {
                    let Some(addr) = self.expect_number(&tokens, 0) else {
                        continue;
                    };
                    let value = match command {
                        "byte" => u32::from(world.get_byte(addr)),
                        "hword" => world.get_word(addr) & 0xFFFF,
                        _ => world.get_word(addr),
                    };
                    self.print_num(value);
                }
                "b" | "break" => {
                    let Some(addr) = self.expect_number(&tokens, 0) else {
                        continue;
                    };
                    cpu.add_breakpoint(addr);
                }
                "d" | "delete" => {
                    let Some(id) = self.expect_number(&tokens, 0) else {
                        continue;
                    };
                    cpu.remove_breakpoint(id as i32);
                }
                "s" | "step" => return ShellOutcome::Step,
                "n" | "next" => {
                    cpu.add_one_shot(state.pc.wrapping_add(4));
                    return ShellOutcome::Resume;
                }
                "c" | "continue" => return ShellOutcome::Resume,
                unknown => {
                    let _ = writeln!(self.output, "unknown debugger command: {unknown}");
                }
            }
        }
    }

    fn print_num(&mut self, value: u32) {
        let _ = writeln!(self.output, "0x{value:x} ({value})");
    }

    /// Parses argument `index` (zero-based, after the command token),
    /// reporting missing or malformed arguments on the output.
    fn expect_number(&mut self, tokens: &[&str], index: usize) -> Option<u32> {
        let Some(token) = tokens.get(index + 1) else {
            let _ = writeln!(self.output, "not enough arguments");
            return None;
        };
        match parse_number(token) {
            Some(value) => Some(value),
            None => {
                let _ = writeln!(self.output, "bad number: {token}");
                None
            }
        }
    }

    /// Reads one command line, or `None` at end-of-file.
    fn read_line(&mut self) -> Option<String> {
        if self.raw_tty {
            self.read_line_raw()
        } else {
            let mut line = String::new();
            match self.input.read_line(&mut line) {
                Ok(0) | Err(_) => None,
                Ok(_) => Some(line),
            }
        }
    }

    /// Visual line editor for a terminal in raw mode: echoes input, renders
    /// backspace/DEL destructively, ignores TAB, and caps the line length.
    fn read_line_raw(&mut self) -> Option<String> {
        let mut line = Vec::new();
        loop {
            let mut byte = [0_u8; 1];
            match self.input.read(&mut byte) {
                Ok(0) | Err(_) => {
                    if line.is_empty() {
                        return None;
                    }
                    break;
                }
                Ok(_) => {}
            }
            match byte[0] {
                0x08 | 0x7F => {
                    let _ = write!(self.output, "\x08 \x08");
                    let _ = self.output.flush();
                    line.pop();
                }
                b'\n' | b'\r' => {
                    let _ = writeln!(self.output);
                    break;
                }
                b'\t' => {}
                byte => {
                    if line.len() >= LINE_CAP {
                        continue;
                    }
                    let _ = self.output.write_all(&[byte]);
                    let _ = self.output.flush();
                    line.push(byte);
                }
            }
        }
        Some(String::from_utf8_lossy(&line).into_owned())
    }
}

/// Recognizes `r0`..`r7` and returns the register index.
fn register_index(command: &str) -> Option<usize> {
    let bytes = command.as_bytes();
    if bytes.len() == 2 && bytes[0] == b'r' && bytes[1].is_ascii_digit() {
        let index = usize::from(bytes[1] - b'0');
        if index < 8 {
            return Some(index);
        }
    }
    None
}

/// Parses a C integer literal: `0x`/`0X` hexadecimal, leading-zero octal,
/// else decimal.
fn parse_number(token: &str) -> Option<u32> {
    if let Some(hex) = token.strip_prefix("0x").or_else(|| token.strip_prefix("0X")) {
        u32::from_str_radix(hex, 16).ok()
    } else if token.len() > 1 && token.starts_with('0') {
        u32::from_str_radix(&token[1..], 8).ok()
    } else {
        token.parse().ok()
    }
}
