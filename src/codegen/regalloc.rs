use crate::ir::{Function, RegId, RegKind, Register};

const GENERAL_COUNT: usize = 8;
const FLOAT_COUNT: usize = 8;

/// Arena of IR registers. The first sixteen entries are the physical pool
/// (8 general `r0..r7`, 8 float `xmm0..xmm7`); exhaustion mints virtual
/// registers that the finalization pass later rebinds.
#[derive(Debug)]
pub struct RegisterPool {
    registers: Vec<Register>,
    next_virtual: u32,
}

impl RegisterPool {
    pub fn new() -> Self {
        let mut registers = Vec::with_capacity(GENERAL_COUNT + FLOAT_COUNT);
        for i in 0..GENERAL_COUNT {
            registers.push(Register {
                id: i as u32,
                kind: RegKind::General,
                name: format!("r{i}"),
                allocated: false,
            });
        }
        for i in 0..FLOAT_COUNT {
            registers.push(Register {
                id: (i + 100) as u32,
                kind: RegKind::Float,
                name: format!("xmm{i}"),
                allocated: false,
            });
        }
        Self {
            registers,
            next_virtual: 0,
        }
    }

    /// First free physical register of the requested kind, or a fresh
    /// virtual register when the pool is exhausted.
    pub fn allocate(&mut self, kind: RegKind) -> RegId {
        let physical = self
            .registers
            .iter()
            .position(|reg| !reg.allocated && reg.kind == kind && reg.id < 200);
        if let Some(index) = physical {
            self.registers[index].allocated = true;
            return RegId(index);
        }

        let n = self.next_virtual;
        self.next_virtual += 1;
        self.registers.push(Register {
            id: 200 + n,
            kind: RegKind::Virtual,
            name: format!("v{n}"),
            allocated: false,
        });
        RegId(self.registers.len() - 1)
    }

    pub fn free(&mut self, id: RegId) {
        if let Some(reg) = self.registers.get_mut(id.0) {
            reg.allocated = false;
        }
    }

    pub fn get(&self, id: RegId) -> &Register {
        &self.registers[id.0]
    }

    pub fn name(&self, id: RegId) -> &str {
        &self.registers[id.0].name
    }

    /// Variable registers take their symbol's name.
    pub fn set_name(&mut self, id: RegId, name: &str) {
        if let Some(reg) = self.registers.get_mut(id.0) {
            reg.name = name.to_string();
        }
    }

    pub fn first_free_physical(&self, kind: RegKind) -> Option<RegId> {
        self.registers
            .iter()
            .position(|reg| !reg.allocated && reg.kind == kind && reg.id < 200)
            .map(RegId)
    }
}

impl Default for RegisterPool {
    fn default() -> Self {
        Self::new()
    }
}

/// Rebinds every virtual-register operand to the first free physical
/// register. Virtual registers carry no float/general class of their own,
/// so they rebind into the general pool; with nothing free they stay
/// virtual and print under their `vN` names.
pub fn finalize(functions: &mut [Function], pool: &RegisterPool) {
    let Some(target) = pool.first_free_physical(RegKind::General) else {
        return;
    };

    for function in functions {
        for block in &mut function.blocks {
            for instruction in &mut block.instructions {
                for operand in &mut instruction.operands {
                    if pool.get(*operand).kind == RegKind::Virtual {
                        *operand = target;
                    }
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ir::{Instruction, Opcode};

    #[test]
    fn allocates_physical_registers_first() {
        let mut pool = RegisterPool::new();
        let first = pool.allocate(RegKind::General);
        assert_eq!(pool.name(first), "r0");
        let second = pool.allocate(RegKind::General);
        assert_eq!(pool.name(second), "r1");
        let float = pool.allocate(RegKind::Float);
        assert_eq!(pool.name(float), "xmm0");
    }

    #[test]
    fn freeing_returns_a_register_to_the_pool() {
        let mut pool = RegisterPool::new();
        let first = pool.allocate(RegKind::General);
        pool.free(first);
        let again = pool.allocate(RegKind::General);
        assert_eq!(pool.name(again), "r0");
    }

    #[test]
    fn exhaustion_mints_virtual_registers() {
        let mut pool = RegisterPool::new();
        for _ in 0..8 {
            pool.allocate(RegKind::General);
        }
        let overflow = pool.allocate(RegKind::General);
        assert_eq!(pool.get(overflow).kind, RegKind::Virtual);
        assert_eq!(pool.name(overflow), "v0");
        let next = pool.allocate(RegKind::General);
        assert_eq!(pool.name(next), "v1");
    }

    #[test]
    fn finalize_rebinds_virtual_operands_to_a_free_physical_register() {
        let mut pool = RegisterPool::new();
        for _ in 0..8 {
            pool.allocate(RegKind::General);
        }
        let virtual_reg = pool.allocate(RegKind::General);
        // Release one physical register so finalization has a home for it.
        pool.free(RegId(3));

        let mut function = Function::new("f");
        let mut mov = Instruction::new(Opcode::Mov);
        mov.operands.push(virtual_reg);
        mov.immediate = Some(1);
        function.blocks[0].instructions.push(mov);

        let mut functions = vec![function];
        finalize(&mut functions, &pool);

        let rebound = functions[0].blocks[0].instructions[0].operands[0];
        assert_eq!(pool.name(rebound), "r3");
    }
}
