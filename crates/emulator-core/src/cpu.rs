//! The fetch/decode/execute interpreter.
//!
//! Registers, program counter, and condition flags live in an [`ExecState`]
//! local to [`Cpu::run`]; the `Cpu` itself only carries the breakpoint list
//! across runs. Every register starts at zero and execution starts at
//! address 0.
//!
//! Instruction fetches whose window lies entirely inside the largest
//! array-backed device bypass the dispatcher and read the backing buffer
//! directly; stores do the same against the largest memory device. All other
//! accesses take the dispatcher path with full boundary and wrap handling.

use std::io::{BufRead, Write};

use crate::debugger::{Shell, ShellOutcome};
use crate::device::word_in_range;
use crate::encoding::{imm17, imm23, rd_index, rs1_index, rs2_index, Opcode};
use crate::memory::{load_word_raw, store_word_raw};
use crate::world::{HotRegion, World};

/// Breakpoint id used by the debugger's one-shot `next` entries. Such an
/// entry is removed the first time it fires.
pub const ONE_SHOT_ID: i32 = -1;

/// A breakpoint: a numbered entry or a one-shot with id [`ONE_SHOT_ID`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Deserialize, serde::Serialize))]
pub struct Breakpoint {
    /// Positive assigned number, or [`ONE_SHOT_ID`].
    pub id: i32,
    /// Address the breakpoint fires at.
    pub addr: u32,
}

/// Register file and condition flags of one execution.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
#[cfg_attr(feature = "serde", derive(serde::Deserialize, serde::Serialize))]
pub struct ExecState {
    /// General-purpose registers `r0..r7`.
    pub regs: [u32; 8],
    /// Program counter.
    pub pc: u32,
    /// Zero flag, meaningful once `compared` is set.
    pub zero: bool,
    /// Negative flag, meaningful once `compared` is set.
    pub negative: bool,
    /// Whether any `CMP` has executed since the start of the run. The
    /// conditional branches test flags once this is set and fall back to
    /// testing their register operand before that.
    pub compared: bool,
}

/// Why [`Cpu::run`] stopped.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Deserialize, serde::Serialize))]
pub enum StopReason {
    /// The program reached an instruction word that does not decode, or a
    /// `CALL` with non-zero source or immediate fields.
    InvalidOpcode {
        /// Program counter of the offending instruction.
        pc: u32,
        /// The raw instruction word.
        inst: u32,
    },
    /// The debugger shell's command input reached end-of-file.
    DebuggerEof,
}

/// The interpreter: breakpoint list plus the execution loop.
#[derive(Debug, Default)]
pub struct Cpu {
    breakpoints: Vec<Breakpoint>,
    next_breakpoint: i32,
}

impl Cpu {
    /// Creates an interpreter with no breakpoints configured.
    #[must_use]
    pub fn new() -> Self {
        Self {
            breakpoints: Vec::new(),
            next_breakpoint: 1,
        }
    }

    /// Adds a numbered breakpoint at `addr` and returns its id.
    pub fn add_breakpoint(&mut self, addr: u32) -> i32 {
        let id = self.next_breakpoint;
        self.next_breakpoint += 1;
        self.breakpoints.push(Breakpoint { id, addr });
        id
    }

    /// Installs a one-shot breakpoint at `addr` (the debugger's `next`).
    pub fn add_one_shot(&mut self, addr: u32) {
        self.breakpoints.push(Breakpoint {
            id: ONE_SHOT_ID,
            addr,
        });
    }

    /// Removes the first breakpoint whose id equals `id`; no-op when there
    /// is none.
    pub fn remove_breakpoint(&mut self, id: i32) {
        if let Some(pos) = self.breakpoints.iter().position(|bp| bp.id == id) {
            self.breakpoints.remove(pos);
        }
    }

    /// The current breakpoint list.
    #[must_use]
    pub fn breakpoints(&self) -> &[Breakpoint] {
        &self.breakpoints
    }

    /// Walks the breakpoint list at `pc`. Any hit requests single-step mode;
    /// one-shot entries are removed on their first hit, numbered entries
    /// announce themselves on `out` and persist.
    fn poll_breakpoints(&mut self, pc: u32, single_step: &mut bool, out: &mut impl Write) {
        let mut index = 0;
        while index < self.breakpoints.len() {
            let bp = self.breakpoints[index];
            if bp.addr == pc {
                *single_step = true;
                if bp.id == ONE_SHOT_ID {
                    self.breakpoints.remove(index);
                    continue;
                }
                let _ = writeln!(out, "breakpoint {} at 0x{:x}", bp.id, bp.addr);
            }
            index += 1;
        }
    }

    /// Runs the machine from address 0 with all registers zero until the
    /// program hits an undecodable instruction or the debugger input ends.
    pub fn run<R: BufRead, W: Write>(
        &mut self,
        world: &mut World,
        shell: &mut Shell<R, W>,
    ) -> (StopReason, ExecState) {
        let fetch_region = world.largest_readable();
        let store_region = world.largest_memory();
        tracing::debug!(
            breakpoints = self.breakpoints.len(),
            fast_fetch = fetch_region.is_some(),
            fast_store = store_region.is_some(),
            "starting execution"
        );

        let mut state = ExecState::default();
        let mut single_step = false;

        loop {
            let inst = fetch_word(world, fetch_region, state.pc);

            self.poll_breakpoints(state.pc, &mut single_step, shell.output_mut());
            if single_step {
                match shell.interact(self, world, &state, inst) {
                    ShellOutcome::Step => {}
                    ShellOutcome::Resume => single_step = false,
                    ShellOutcome::Quit => return (StopReason::DebuggerEof, state),
                }
            }

            let Some(op) = Opcode::decode(inst) else {
                return (StopReason::InvalidOpcode { pc: state.pc, inst }, state);
            };

            let rd = rd_index(inst);
            let rs1 = rs1_index(inst);
            let rs2 = rs2_index(inst);
            let imm = imm17(inst);

            match op {
                Opcode::Add => state.regs[rd] = state.regs[rs1].wrapping_add(state.regs[rs2]),
                Opcode::Sub => state.regs[rd] = state.regs[rs1].wrapping_sub(state.regs[rs2]),
                Opcode::And => state.regs[rd] = state.regs[rs1] & state.regs[rs2],
                Opcode::Or => state.regs[rd] = state.regs[rs1] | state.regs[rs2],
                Opcode::Xor => state.regs[rd] = state.regs[rs1] ^ state.regs[rs2],
                Opcode::Not => state.regs[rd] = !state.regs[rs1],
                Opcode::Load => {
                    let addr = state.regs[rs2].wrapping_add(imm);
                    state.regs[rd] = fetch_word(world, fetch_region, addr);
                }
                Opcode::Store => {
                    let addr = state.regs[rs2].wrapping_add(imm);
                    store_word(world, store_region, addr, state.regs[rd]);
                }
                Opcode::Jump => state.pc = state.pc.wrapping_add(imm),
                Opcode::Branch => {
                    if state.regs[rs2] == 0 {
                        state.pc = state.pc.wrapping_add(imm);
                    }
                }
                Opcode::Cmp => {
                    state.zero = state.regs[rs1] == state.regs[rs2];
                    state.negative = (state.regs[rs1] as i32) < (state.regs[rs2] as i32);
                    state.compared = true;
                }
                Opcode::Beq => {
                    let taken = if state.compared {
                        state.zero
                    } else {
                        state.regs[rs2] == 0
                    };
                    if taken {
                        state.pc = state.pc.wrapping_add(imm);
                    }
                }
                Opcode::Bne => {
                    let taken = if state.compared {
                        !state.zero
                    } else {
                        state.regs[rs2] != 0
                    };
                    if taken {
                        state.pc = state.pc.wrapping_add(imm);
                    }
                }
                Opcode::Blt => {
                    let taken = if state.compared {
                        state.negative
                    } else {
                        state.regs[rs2] & 0x8000_0000 != 0
                    };
                    if taken {
                        state.pc = state.pc.wrapping_add(imm);
                    }
                }
                Opcode::Bgt => {
                    let taken = if state.compared {
                        !state.negative && !state.zero
                    } else {
                        state.regs[rs2] & 0x8000_0000 == 0
                    };
                    if taken {
                        state.pc = state.pc.wrapping_add(imm);
                    }
                }
                Opcode::Loadi => state.regs[rd] = imm23(inst),
                Opcode::Call => {
                    if rs1 != 0 || rs2 != 0 || imm != 0 {
                        return (StopReason::InvalidOpcode { pc: state.pc, inst }, state);
                    }
                    state.pc = state.regs[rd].wrapping_sub(4);
                }
                Opcode::Loadi16 => {
                    state.regs[rd] = (state.regs[rd] & 0xFFFF_0000) | (imm & 0xFFFF);
                }
                Opcode::Loadi16h => {
                    state.regs[rd] = (state.regs[rd] & 0xFFFF) | imm << 16;
                }
            }

            state.pc = state.pc.wrapping_add(4);
        }
    }
}

/// Word fetch with the dispatcher bypassed when the whole window lies inside
/// the hot readable region.
fn fetch_word(world: &World, hot: Option<HotRegion>, addr: u32) -> u32 {
    if let Some(region) = hot {
        if word_in_range(addr, region.base, region.limit) {
            if let Some(buf) = world.device(region.id).array_contents() {
                return load_word_raw(buf, region.limit, addr - region.base);
            }
        }
    }
    world.get_word(addr)
}

/// Word store with the dispatcher bypassed when the whole window lies inside
/// the hot memory region.
fn store_word(world: &mut World, hot: Option<HotRegion>, addr: u32, word: u32) {
    if let Some(region) = hot {
        if word_in_range(addr, region.base, region.limit) {
            if let Some(memory) = world.device_mut(region.id).as_memory_mut() {
                store_word_raw(memory.contents_mut(), region.limit, addr - region.base, word);
                return;
            }
        }
    }
    world.set_word(addr, word);
}
