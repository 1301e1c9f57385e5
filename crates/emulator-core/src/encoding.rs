//! Instruction word codec for the Halcyon-32 ISA.
//!
//! An instruction is a single 32-bit word laid out as:
//!
//! ```text
//! 31      26 25  23 22  20 19  17 16               0
//! +--------+------+------+------+------------------+
//! | opcode |  rd  | rs1  | rs2  |      imm17       |
//! +--------+------+------+------+------------------+
//! ```
//!
//! `imm17` is a 17-bit two's-complement immediate (bit 16 is the sign).
//! `LOADI` reuses bits 22..0 as a 23-bit signed immediate instead of the
//! register source fields. Words are stored little-endian in memory and ROM
//! backings regardless of host byte order.

/// Assigned opcode values (`inst >> 26`).
///
/// Value 11 is reserved and decodes as illegal, as does anything above
/// [`Opcode::Loadi16h`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[repr(u8)]
#[allow(missing_docs)]
pub enum Opcode {
    Add = 0,
    Sub = 1,
    And = 2,
    Or = 3,
    Xor = 4,
    Not = 5,
    Load = 6,
    Store = 7,
    Jump = 8,
    Branch = 9,
    Cmp = 10,
    Beq = 12,
    Bne = 13,
    Blt = 14,
    Bgt = 15,
    Loadi = 16,
    Call = 17,
    Loadi16 = 18,
    Loadi16h = 19,
}

impl Opcode {
    /// Converts a 6-bit opcode field value into an assigned opcode.
    #[must_use]
    pub const fn from_u6(bits: u8) -> Option<Self> {
        match bits {
            0 => Some(Self::Add),
            1 => Some(Self::Sub),
            2 => Some(Self::And),
            3 => Some(Self::Or),
            4 => Some(Self::Xor),
            5 => Some(Self::Not),
            6 => Some(Self::Load),
            7 => Some(Self::Store),
            8 => Some(Self::Jump),
            9 => Some(Self::Branch),
            10 => Some(Self::Cmp),
            12 => Some(Self::Beq),
            13 => Some(Self::Bne),
            14 => Some(Self::Blt),
            15 => Some(Self::Bgt),
            16 => Some(Self::Loadi),
            17 => Some(Self::Call),
            18 => Some(Self::Loadi16),
            19 => Some(Self::Loadi16h),
            _ => None,
        }
    }

    /// Decodes the opcode field of an instruction word.
    #[must_use]
    pub const fn decode(inst: u32) -> Option<Self> {
        Self::from_u6(opcode_bits(inst))
    }
}

/// Returns the raw 6-bit opcode field.
#[must_use]
pub const fn opcode_bits(inst: u32) -> u8 {
    (inst >> 26) as u8
}

/// Returns the destination register index (`0..8`).
#[must_use]
pub const fn rd_index(inst: u32) -> usize {
    (inst >> 23 & 0x7) as usize
}

/// Returns the first source register index (`0..8`).
#[must_use]
pub const fn rs1_index(inst: u32) -> usize {
    (inst >> 20 & 0x7) as usize
}

/// Returns the second source register index (`0..8`).
#[must_use]
pub const fn rs2_index(inst: u32) -> usize {
    (inst >> 17 & 0x7) as usize
}

/// Returns the 17-bit immediate, sign-extended to 32 bits.
#[must_use]
pub const fn imm17(inst: u32) -> u32 {
    let res = inst & 0xFFFF;
    if inst & 0x1_0000 != 0 {
        res | 0xFFFF_0000
    } else {
        res
    }
}

/// Returns the 23-bit `LOADI` immediate, sign-extended to 32 bits.
#[must_use]
pub const fn imm23(inst: u32) -> u32 {
    let res = inst & 0x3F_FFFF;
    if inst & 0x40_0000 != 0 {
        res | 0xFFC0_0000
    } else {
        res
    }
}

/// Builds an instruction word from its fields.
///
/// `imm` is truncated to 17 bits; register indices are truncated to 3 bits.
#[must_use]
pub const fn pack(op: Opcode, rd: u32, rs1: u32, rs2: u32, imm: u32) -> u32 {
    (op as u32) << 26 | (rd & 0x7) << 23 | (rs1 & 0x7) << 20 | (rs2 & 0x7) << 17 | (imm & 0x1_FFFF)
}

/// Builds a `LOADI` instruction word; `imm` is truncated to 23 bits.
#[must_use]
pub const fn pack_loadi(rd: u32, imm: u32) -> u32 {
    (Opcode::Loadi as u32) << 26 | (rd & 0x7) << 23 | (imm & 0x7F_FFFF)
}

/// Serializes an instruction word to its little-endian byte layout.
#[must_use]
pub const fn layout_word(inst: u32) -> [u8; 4] {
    inst.to_le_bytes()
}

/// Reassembles an instruction word from its little-endian byte layout.
#[must_use]
pub const fn word_from_layout(bytes: [u8; 4]) -> u32 {
    u32::from_le_bytes(bytes)
}
