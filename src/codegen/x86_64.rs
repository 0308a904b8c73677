//! Minimal x86-64 encodings. Operand selection is fixed to RAX, which is
//! sufficient for the placeholder programs the emitter produces; opcodes
//! without an encoding degrade to `nop`.

use crate::ir::{Instruction, Opcode};

fn push_imm32(bytes: &mut Vec<u8>, immediate: i64) {
    let imm = immediate as u32;
    bytes.extend_from_slice(&imm.to_le_bytes());
}

pub fn encode(instruction: &Instruction) -> Vec<u8> {
    let mut bytes = Vec::new();

    match instruction.opcode {
        Opcode::Mov => {
            if let Some(immediate) = instruction.immediate {
                // mov rax, imm32
                bytes.extend_from_slice(&[0x48, 0xc7, 0xc0]);
                push_imm32(&mut bytes, immediate);
            } else {
                // mov rax, rax
                bytes.extend_from_slice(&[0x48, 0x89, 0xc0]);
            }
        }
        Opcode::Add => {
            if let Some(immediate) = instruction.immediate {
                // add rax, imm32
                bytes.extend_from_slice(&[0x48, 0x81, 0xc0]);
                push_imm32(&mut bytes, immediate);
            } else {
                // add rax, rax
                bytes.extend_from_slice(&[0x48, 0x01, 0xc0]);
            }
        }
        Opcode::Sub => {
            if let Some(immediate) = instruction.immediate {
                // sub rax, imm32
                bytes.extend_from_slice(&[0x48, 0x81, 0xe8]);
                push_imm32(&mut bytes, immediate);
            } else {
                // sub rax, rax
                bytes.extend_from_slice(&[0x48, 0x29, 0xc0]);
            }
        }
        Opcode::Call => {
            // call rel32 with an unresolved displacement
            bytes.extend_from_slice(&[0xe8, 0x00, 0x00, 0x00, 0x00]);
        }
        Opcode::Ret => bytes.push(0xc3),
        Opcode::Push => bytes.push(0x50), // push rax
        Opcode::Pop => bytes.push(0x58),  // pop rax
        _ => bytes.push(0x90),            // nop
    }

    bytes
}
