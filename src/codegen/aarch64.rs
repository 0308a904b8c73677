//! Minimal AArch64 encodings, fixed-width 4-byte instructions over X0/X1.
//! Stack pushes and pops have no single-instruction form here and degrade
//! to `nop` along with every other unencoded opcode.

use crate::ir::{Instruction, Opcode};

fn word(bytes: &mut Vec<u8>, instruction: u32) {
    bytes.extend_from_slice(&instruction.to_le_bytes());
}

pub fn encode(instruction: &Instruction) -> Vec<u8> {
    let mut bytes = Vec::new();

    match instruction.opcode {
        Opcode::Mov => {
            if let Some(immediate) = instruction.immediate {
                // mov x0, #imm16
                let imm = (immediate as u32) & 0xffff;
                word(&mut bytes, 0xd280_0000 | (imm << 5));
            } else {
                // mov x0, x1
                word(&mut bytes, 0xaa01_03e0);
            }
        }
        Opcode::Add => {
            if let Some(immediate) = instruction.immediate {
                // add x0, x0, #imm12
                let imm = (immediate as u32) & 0xfff;
                word(&mut bytes, 0x9100_0000 | (imm << 10));
            } else {
                // add x0, x0, x1
                word(&mut bytes, 0x8b01_0000);
            }
        }
        Opcode::Sub => {
            if let Some(immediate) = instruction.immediate {
                // sub x0, x0, #imm12
                let imm = (immediate as u32) & 0xfff;
                word(&mut bytes, 0xd100_0000 | (imm << 10));
            } else {
                // sub x0, x0, x1
                word(&mut bytes, 0xcb01_0000);
            }
        }
        Opcode::Call => word(&mut bytes, 0x9400_0000), // bl #0
        Opcode::Ret => word(&mut bytes, 0xd65f_03c0),
        _ => word(&mut bytes, 0xd503_201f), // nop
    }

    bytes
}
