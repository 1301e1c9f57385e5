//! Core emulator crate for the Halcyon-32 virtual machine.
//!
//! The machine is a 32-bit RISC core with eight general-purpose registers,
//! a flat 32-bit physical address space, and memory-mapped peripherals.
//! Execution starts at address 0 with every register zero and runs until
//! the program reaches an instruction that does not decode.

/// Instruction word codec: opcode table, field extraction, builders.
pub mod encoding;
pub use encoding::{
    imm17, imm23, layout_word, opcode_bits, pack, pack_loadi, rd_index, rs1_index, rs2_index,
    word_from_layout, Opcode,
};

/// Textual disassembly of instruction words.
pub mod disasm;
pub use disasm::format_inst;

/// Raw little-endian word accessors over backing buffers.
pub mod memory;
pub use memory::{load_aligned, load_word_raw, store_aligned, store_word_raw};

/// Device trait, boundary masking, and concrete backing-store devices.
pub mod device;
pub use device::{
    clean_word, word_in_range, ArrayDevice, Device, DeviceKind, ReadOnly, ZeroDevice, PAGE_SIZE,
};

/// Memory-mapped peripherals: console and tick counter.
pub mod peripherals;
pub use peripherals::{StdioDevice, TicksDevice};

/// Three-level sparse address dispatch table.
pub mod dispatch;
pub use dispatch::{DeviceId, DeviceTable};

/// Device registry and memory bus.
pub mod world;
pub use world::{HotRegion, SetupError, World, MEMORY_LIMIT_MAX};

/// Fetch/decode/execute interpreter and breakpoint engine.
pub mod cpu;
pub use cpu::{Breakpoint, Cpu, ExecState, StopReason, ONE_SHOT_ID};

/// Interactive single-step debugger shell.
pub mod debugger;
pub use debugger::{Shell, ShellOutcome};

#[cfg(test)]
use proptest as _;
#[cfg(test)]
use rstest as _;
#[cfg(test)]
use tempfile as _;
