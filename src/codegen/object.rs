//! Synthetic `GDOBJ` object format: magic, function count, then one record
//! per function holding its name and raw opcode ids.

use crate::ir::Function;

use super::buffer::ByteBuffer;

pub const MAGIC: &[u8; 5] = b"GDOBJ";

pub fn write(functions: &[Function]) -> Vec<u8> {
    let mut buffer = ByteBuffer::new();
    buffer.put_bytes(MAGIC);
    buffer.put_u32(functions.len() as u32);

    for function in functions {
        buffer.put_u32(function.name.len() as u32);
        buffer.put_bytes(function.name.as_bytes());
        buffer.put_u32(function.instruction_count() as u32);
        for block in &function.blocks {
            for instruction in &block.instructions {
                buffer.put_u32(instruction.opcode as u32);
            }
        }
    }

    buffer.into_bytes()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ir::{Instruction, Opcode};

    #[test]
    fn blob_starts_with_magic_and_function_count() {
        let mut function = Function::new("main");
        function.blocks[0].instructions.push(Instruction::new(Opcode::Ret));

        let bytes = write(&[function]);
        assert_eq!(&bytes[..5], MAGIC);
        assert_eq!(u32::from_le_bytes([bytes[5], bytes[6], bytes[7], bytes[8]]), 1);
    }

    #[test]
    fn function_records_carry_name_and_opcodes() {
        let mut function = Function::new("f");
        let mut mov = Instruction::new(Opcode::Mov);
        mov.immediate = Some(0);
        function.blocks[0].instructions.push(mov);
        function.blocks[0].instructions.push(Instruction::new(Opcode::Ret));

        let bytes = write(&[function]);
        let mut at = 9;
        let name_len = u32::from_le_bytes(bytes[at..at + 4].try_into().unwrap()) as usize;
        at += 4;
        assert_eq!(&bytes[at..at + name_len], b"f");
        at += name_len;
        let instr_count = u32::from_le_bytes(bytes[at..at + 4].try_into().unwrap());
        at += 4;
        assert_eq!(instr_count, 2);
        let first = u32::from_le_bytes(bytes[at..at + 4].try_into().unwrap());
        assert_eq!(first, Opcode::Mov as u32);
    }
}
