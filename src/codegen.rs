pub mod aarch64;
pub mod buffer;
pub mod elf;
pub mod lower;
pub mod macho;
pub mod object;
pub mod opt;
pub mod pe;
pub mod regalloc;
pub mod x86_64;

use std::fs;

use anyhow::{Context, Result};

use crate::analyzer::Analysis;
use crate::ast::Program;
use crate::diagnostics::Diagnostics;
use crate::ir::{Function, RegId};

use self::lower::Lowerer;
use self::regalloc::RegisterPool;

/// (OS, CPU architecture) pair selecting instruction encodings and the
/// container format.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Target {
    WindowsX64,
    MacosX64,
    MacosArm64,
    LinuxX64,
    LinuxArm64,
}

impl Target {
    pub fn parse(value: &str) -> Option<Self> {
        match value {
            "windows" | "win64" => Some(Self::WindowsX64),
            "macos" | "mac64" => Some(Self::MacosX64),
            "macos-arm" | "mac-arm" => Some(Self::MacosArm64),
            "linux" | "linux64" => Some(Self::LinuxX64),
            "linux-arm" | "linux-arm64" => Some(Self::LinuxArm64),
            _ => None,
        }
    }

    pub fn name(self) -> &'static str {
        match self {
            Self::WindowsX64 => "Windows x64",
            Self::MacosX64 => "macOS x64",
            Self::MacosArm64 => "macOS ARM64",
            Self::LinuxX64 => "Linux x64",
            Self::LinuxArm64 => "Linux ARM64",
        }
    }

    pub fn executable_extension(self) -> &'static str {
        match self {
            Self::WindowsX64 => ".exe",
            Self::MacosX64 | Self::MacosArm64 => ".app",
            Self::LinuxX64 | Self::LinuxArm64 => "",
        }
    }

    pub fn is_aarch64(self) -> bool {
        matches!(self, Self::MacosArm64 | Self::LinuxArm64)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OutputFormat {
    Assembly,
    Object,
    Executable,
}

impl OutputFormat {
    pub fn parse(value: &str) -> Option<Self> {
        match value {
            "assembly" | "asm" => Some(Self::Assembly),
            "object" | "obj" => Some(Self::Object),
            "executable" | "exe" => Some(Self::Executable),
            _ => None,
        }
    }
}

/// Drives lowering, optimization, register finalization, and emission for
/// one compilation. Every format writes the assembly listing; object and
/// executable formats add their artifacts on top.
pub struct CodeGenerator<'a> {
    analysis: &'a Analysis,
    target: Target,
    format: OutputFormat,
}

impl<'a> CodeGenerator<'a> {
    pub fn new(analysis: &'a Analysis, target: Target, format: OutputFormat) -> Self {
        Self {
            analysis,
            target,
            format,
        }
    }

    /// Returns the pass diagnostics; I/O failures surface as errors with
    /// path context. Emission is skipped when lowering reported errors.
    pub fn generate(&self, program: &Program, output: &str) -> Result<Diagnostics> {
        let mut lowerer = Lowerer::new(self.analysis);
        lowerer.lower_program(program);
        let (mut functions, pool, diagnostics) = lowerer.into_parts();
        if diagnostics.has_errors() {
            return Ok(diagnostics);
        }

        opt::optimize(&mut functions);
        regalloc::finalize(&mut functions, &pool);

        let asm_path = format!("{output}.s");
        fs::write(&asm_path, assembly_listing(&functions, &pool))
            .with_context(|| format!("Writing {asm_path}"))?;

        if matches!(self.format, OutputFormat::Object | OutputFormat::Executable) {
            let object_path = format!("{output}.o");
            fs::write(&object_path, object::write(&functions))
                .with_context(|| format!("Writing {object_path}"))?;
        }

        if self.format == OutputFormat::Executable {
            let exe_path = format!("{output}{}", self.target.executable_extension());
            let code = machine_code(&functions, self.target);
            fs::write(&exe_path, executable_image(self.target, &code))
                .with_context(|| format!("Writing {exe_path}"))?;
        }

        Ok(diagnostics)
    }
}

/// Textual listing: one label per function, non-entry block labels, one
/// instruction per line.
pub fn assembly_listing(functions: &[Function], pool: &RegisterPool) -> String {
    let names = |id: RegId| pool.name(id).to_string();
    let mut out = String::from(".section .text\n.global _start\n\n");

    for function in functions {
        out.push_str(&function.name);
        out.push_str(":\n");
        for (i, block) in function.blocks.iter().enumerate() {
            if i > 0 {
                out.push_str(&block.label);
                out.push_str(":\n");
            }
            for instruction in &block.instructions {
                out.push_str("    ");
                out.push_str(&instruction.format(&names));
                out.push('\n');
            }
        }
        out.push('\n');
    }

    out
}

/// Serializes every instruction of every function with the target's
/// encoder, in function order.
pub fn machine_code(functions: &[Function], target: Target) -> Vec<u8> {
    let mut code = Vec::new();
    for function in functions {
        for block in &function.blocks {
            for instruction in &block.instructions {
                let bytes = if target.is_aarch64() {
                    aarch64::encode(instruction)
                } else {
                    x86_64::encode(instruction)
                };
                code.extend_from_slice(&bytes);
            }
        }
    }
    code
}

pub fn executable_image(target: Target, code: &[u8]) -> Vec<u8> {
    match target {
        Target::WindowsX64 => pe::write(code),
        Target::MacosX64 => macho::write(code, false),
        Target::MacosArm64 => macho::write(code, true),
        Target::LinuxX64 => elf::write(code, false),
        Target::LinuxArm64 => elf::write(code, true),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ir::{Instruction, Opcode, RegKind};

    #[test]
    fn parses_platform_aliases() {
        assert_eq!(Target::parse("windows"), Some(Target::WindowsX64));
        assert_eq!(Target::parse("win64"), Some(Target::WindowsX64));
        assert_eq!(Target::parse("mac-arm"), Some(Target::MacosArm64));
        assert_eq!(Target::parse("linux-arm64"), Some(Target::LinuxArm64));
        assert_eq!(Target::parse("amiga"), None);
    }

    #[test]
    fn parses_format_aliases() {
        assert_eq!(OutputFormat::parse("asm"), Some(OutputFormat::Assembly));
        assert_eq!(OutputFormat::parse("object"), Some(OutputFormat::Object));
        assert_eq!(OutputFormat::parse("exe"), Some(OutputFormat::Executable));
        assert_eq!(OutputFormat::parse("tape"), None);
    }

    #[test]
    fn executable_extensions_follow_the_platform() {
        assert_eq!(Target::WindowsX64.executable_extension(), ".exe");
        assert_eq!(Target::MacosArm64.executable_extension(), ".app");
        assert_eq!(Target::LinuxX64.executable_extension(), "");
    }

    #[test]
    fn assembly_listing_prints_functions_and_block_labels() {
        let mut pool = RegisterPool::new();
        let reg = pool.allocate(RegKind::General);

        let mut function = Function::new("f");
        let mut mov = Instruction::new(Opcode::Mov);
        mov.operands.push(reg);
        mov.immediate = Some(0);
        function.blocks[0].instructions.push(mov);
        function.create_block("end_0");
        function.blocks[1].instructions.push(Instruction::new(Opcode::Ret));

        let listing = assembly_listing(&[function], &pool);
        assert!(listing.starts_with(".section .text\n.global _start\n"));
        assert!(listing.contains("f:\n    mov r0, #0\n"));
        assert!(listing.contains("end_0:\n    ret\n"));
    }

    #[test]
    fn machine_code_concatenates_per_instruction_encodings() {
        let mut function = Function::new("f");
        function.blocks[0].instructions.push(Instruction::new(Opcode::Ret));

        let x86 = machine_code(&[function.clone()], Target::LinuxX64);
        assert_eq!(x86, vec![0xc3]);

        let arm = machine_code(&[function], Target::LinuxArm64);
        assert_eq!(arm, vec![0xc0, 0x03, 0x5f, 0xd6]);
    }

    #[test]
    fn executable_images_start_with_their_magic() {
        let code = vec![0xc3];
        assert_eq!(&executable_image(Target::WindowsX64, &code)[..2], b"MZ");
        assert_eq!(
            &executable_image(Target::MacosX64, &code)[..4],
            &0xfeed_facf_u32.to_le_bytes()
        );
        assert_eq!(&executable_image(Target::LinuxX64, &code)[..4], b"\x7fELF");
        assert_eq!(&executable_image(Target::LinuxArm64, &code)[..4], b"\x7fELF");
        assert_eq!(
            &executable_image(Target::MacosArm64, &code)[..4],
            &0xfeed_facf_u32.to_le_bytes()
        );
    }
}
