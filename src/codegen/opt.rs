use crate::ir::{Function, Opcode};

/// Runs the optimization pipeline before emission.
pub fn optimize(functions: &mut [Function]) {
    dead_code_elimination(functions);
    constant_folding(functions);
}

/// Strips `nop` instructions from every block.
pub fn dead_code_elimination(functions: &mut [Function]) {
    for function in functions {
        for block in &mut function.blocks {
            block
                .instructions
                .retain(|instruction| instruction.opcode != Opcode::Nop);
        }
    }
}

/// Reserved hook; folding happens here once the lowerer tracks constant
/// registers.
pub fn constant_folding(_functions: &mut [Function]) {}
