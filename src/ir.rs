//! Three-address intermediate representation: functions of basic blocks of
//! instructions over arena-allocated registers.

/// Handle into the code generator's register arena.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct RegId(pub usize);

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RegKind {
    General,
    Float,
    /// Minted when the physical pool is exhausted; rebound to a physical
    /// register by the finalization pass.
    Virtual,
}

#[derive(Debug, Clone)]
pub struct Register {
    pub id: u32,
    pub kind: RegKind,
    pub name: String,
    pub allocated: bool,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u32)]
pub enum Opcode {
    // Data movement
    Mov,
    Load,
    Store,
    // Arithmetic
    Add,
    Sub,
    Mul,
    Div,
    Mod,
    Fadd,
    Fsub,
    Fmul,
    Fdiv,
    // Logical
    And,
    Or,
    Xor,
    Not,
    // Comparison
    Cmp,
    Fcmp,
    // Branching
    Jmp,
    Je,
    Jne,
    Jl,
    Jle,
    Jg,
    Jge,
    // Function calls
    Call,
    Ret,
    // Stack operations
    Push,
    Pop,
    // Special
    Nop,
    Label,
}

impl Opcode {
    pub fn mnemonic(self) -> &'static str {
        match self {
            Opcode::Mov => "mov",
            Opcode::Load => "load",
            Opcode::Store => "store",
            Opcode::Add => "add",
            Opcode::Sub => "sub",
            Opcode::Mul => "mul",
            Opcode::Div => "div",
            Opcode::Mod => "mod",
            Opcode::Fadd => "fadd",
            Opcode::Fsub => "fsub",
            Opcode::Fmul => "fmul",
            Opcode::Fdiv => "fdiv",
            Opcode::And => "and",
            Opcode::Or => "or",
            Opcode::Xor => "xor",
            Opcode::Not => "not",
            Opcode::Cmp => "cmp",
            Opcode::Fcmp => "fcmp",
            Opcode::Jmp => "jmp",
            Opcode::Je => "je",
            Opcode::Jne => "jne",
            Opcode::Jl => "jl",
            Opcode::Jle => "jle",
            Opcode::Jg => "jg",
            Opcode::Jge => "jge",
            Opcode::Call => "call",
            Opcode::Ret => "ret",
            Opcode::Push => "push",
            Opcode::Pop => "pop",
            Opcode::Nop => "nop",
            Opcode::Label => "label",
        }
    }

    pub fn is_branch(self) -> bool {
        matches!(
            self,
            Opcode::Jmp
                | Opcode::Je
                | Opcode::Jne
                | Opcode::Jl
                | Opcode::Jle
                | Opcode::Jg
                | Opcode::Jge
        )
    }
}

/// One three-address instruction. `label` names a branch or call target;
/// `immediate` carries an inline constant operand.
#[derive(Debug, Clone)]
pub struct Instruction {
    pub opcode: Opcode,
    pub operands: Vec<RegId>,
    pub label: Option<String>,
    pub immediate: Option<i64>,
}

impl Instruction {
    pub fn new(opcode: Opcode) -> Self {
        Self {
            opcode,
            operands: Vec::new(),
            label: None,
            immediate: None,
        }
    }

    pub fn with_label(opcode: Opcode, label: impl Into<String>) -> Self {
        let mut instruction = Self::new(opcode);
        instruction.label = Some(label.into());
        instruction
    }

    /// Textual form used by the assembly listing. Register names resolve
    /// through `names`, indexed by `RegId`.
    pub fn format(&self, names: &dyn Fn(RegId) -> String) -> String {
        if self.opcode == Opcode::Label {
            return format!("{}:", self.label.as_deref().unwrap_or(""));
        }

        let mut out = self.opcode.mnemonic().to_string();
        if let Some(label) = &self.label {
            out.push(' ');
            out.push_str(label);
            return out;
        }

        for (i, operand) in self.operands.iter().enumerate() {
            out.push_str(if i == 0 { " " } else { ", " });
            out.push_str(&names(*operand));
        }
        if let Some(immediate) = self.immediate {
            out.push_str(if self.operands.is_empty() { " " } else { ", " });
            out.push('#');
            out.push_str(&immediate.to_string());
        }
        out
    }
}

/// Maximal straight-line run of instructions. Successor/predecessor edges
/// are indices into the owning function's block list, recorded for branch
/// targets and fall-through.
#[derive(Debug, Clone)]
pub struct BasicBlock {
    pub label: String,
    pub instructions: Vec<Instruction>,
    pub successors: Vec<usize>,
    pub predecessors: Vec<usize>,
}

impl BasicBlock {
    pub fn new(label: impl Into<String>) -> Self {
        Self {
            label: label.into(),
            instructions: Vec::new(),
            successors: Vec::new(),
            predecessors: Vec::new(),
        }
    }

    /// True when control cannot fall through to the following block.
    pub fn ends_in_transfer(&self) -> bool {
        self.instructions
            .last()
            .is_some_and(|i| matches!(i.opcode, Opcode::Jmp | Opcode::Ret))
    }
}

#[derive(Debug, Clone)]
pub struct Function {
    pub name: String,
    pub blocks: Vec<BasicBlock>,
    pub parameters: Vec<RegId>,
    pub return_register: Option<RegId>,
    pub stack_size: i32,
}

impl Function {
    /// Creates the function with its entry block already in place.
    pub fn new(name: impl Into<String>) -> Self {
        let name = name.into();
        let entry = BasicBlock::new(format!("{name}_entry"));
        Self {
            name,
            blocks: vec![entry],
            parameters: Vec::new(),
            return_register: None,
            stack_size: 0,
        }
    }

    pub fn create_block(&mut self, label: impl Into<String>) -> usize {
        self.blocks.push(BasicBlock::new(label));
        self.blocks.len() - 1
    }

    pub fn block_index(&self, label: &str) -> Option<usize> {
        self.blocks.iter().position(|block| block.label == label)
    }

    pub fn add_edge(&mut self, from: usize, to: usize) {
        if let Some(block) = self.blocks.get_mut(from) {
            block.successors.push(to);
        }
        if let Some(block) = self.blocks.get_mut(to) {
            block.predecessors.push(from);
        }
    }

    pub fn instruction_count(&self) -> usize {
        self.blocks.iter().map(|block| block.instructions.len()).sum()
    }

    pub fn last_instruction(&self) -> Option<&Instruction> {
        self.blocks.last().and_then(|block| block.instructions.last())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn name_of(id: RegId) -> String {
        format!("r{}", id.0)
    }

    #[test]
    fn formats_register_and_immediate_operands() {
        let mut mov = Instruction::new(Opcode::Mov);
        mov.operands.push(RegId(0));
        mov.immediate = Some(42);
        assert_eq!(mov.format(&name_of), "mov r0, #42");

        let mut add = Instruction::new(Opcode::Add);
        add.operands = vec![RegId(2), RegId(0), RegId(1)];
        assert_eq!(add.format(&name_of), "add r2, r0, r1");

        let jump = Instruction::with_label(Opcode::Je, "else_0");
        assert_eq!(jump.format(&name_of), "je else_0");

        let label = Instruction::with_label(Opcode::Label, "loop_1");
        assert_eq!(label.format(&name_of), "loop_1:");

        assert_eq!(Instruction::new(Opcode::Ret).format(&name_of), "ret");
    }

    #[test]
    fn function_starts_with_an_entry_block() {
        let function = Function::new("main");
        assert_eq!(function.blocks.len(), 1);
        assert_eq!(function.blocks[0].label, "main_entry");
    }

    #[test]
    fn edges_update_both_directions() {
        let mut function = Function::new("f");
        let target = function.create_block("end_0");
        function.add_edge(0, target);
        assert_eq!(function.blocks[0].successors, vec![target]);
        assert_eq!(function.blocks[target].predecessors, vec![0]);
    }

    #[test]
    fn transfer_detection_checks_the_final_instruction() {
        let mut block = BasicBlock::new("b");
        assert!(!block.ends_in_transfer());
        block.instructions.push(Instruction::new(Opcode::Mov));
        assert!(!block.ends_in_transfer());
        block
            .instructions
            .push(Instruction::with_label(Opcode::Jmp, "b"));
        assert!(block.ends_in_transfer());
    }
}
