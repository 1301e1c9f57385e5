//! Textual disassembly for the Halcyon-32 ISA.
//!
//! Formatting is a pure function over the instruction word; the debugger
//! shell and the standalone `disasm` binary both render through it.

use crate::encoding::{imm17, imm23, rd_index, rs1_index, rs2_index, Opcode};

/// Formats one instruction word as a line of assembly (without a trailing
/// newline).
///
/// Unknown opcodes, the reserved opcode 11, and `CALL` words with non-zero
/// source or immediate fields all render as `invalid`.
#[must_use]
pub fn format_inst(inst: u32) -> String {
    let rd = rd_index(inst);
    let rs1 = rs1_index(inst);
    let rs2 = rs2_index(inst);
    let imm = imm17(inst) as i32;

    let Some(op) = Opcode::decode(inst) else {
        return String::from("invalid");
    };

    match op {
        Opcode::Add | Opcode::Sub | Opcode::And | Opcode::Or | Opcode::Xor => {
            format!("{} r{rd}, r{rs1}, r{rs2}", mnemonic(op))
        }
        Opcode::Not => format!("not r{rd}, r{rs1}"),
        Opcode::Load | Opcode::Store => format!("{} r{rd}, r{rs2}, {imm}", mnemonic(op)),
        Opcode::Jump => format!("jump {imm}"),
        Opcode::Cmp => format!("cmp r{rs1}, r{rs2}"),
        Opcode::Branch | Opcode::Beq | Opcode::Bne | Opcode::Blt | Opcode::Bgt => {
            format!("{} r{rs2}, {imm}", mnemonic(op))
        }
        Opcode::Loadi => format!("loadi r{rd}, {}", imm23(inst) as i32),
        Opcode::Call => {
            if rs1 != 0 || rs2 != 0 || imm != 0 {
                String::from("invalid")
            } else {
                format!("call r{rd}")
            }
        }
        Opcode::Loadi16 | Opcode::Loadi16h => format!("{} r{rd}, {imm}", mnemonic(op)),
    }
}

const fn mnemonic(op: Opcode) -> &'static str {
    match op {
        Opcode::Add => "add",
        Opcode::Sub => "sub",
        Opcode::And => "and",
        Opcode::Or => "or",
        Opcode::Xor => "xor",
        Opcode::Not => "not",
        Opcode::Load => "load",
        Opcode::Store => "store",
        Opcode::Jump => "jump",
        Opcode::Branch => "branch",
        Opcode::Cmp => "cmp",
        Opcode::Beq => "beq",
        Opcode::Bne => "bne",
        Opcode::Blt => "blt",
        Opcode::Bgt => "bgt",
        Opcode::Loadi => "loadi",
        Opcode::Call => "call",
        Opcode::Loadi16 => "loadi16",
        Opcode::Loadi16h => "loadi16h",
    }
}
