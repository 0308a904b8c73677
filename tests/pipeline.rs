use std::fs;
use std::path::PathBuf;

use anyhow::{ensure, Context, Result};

use gdscript_compiler::analyzer::{Analysis, Analyzer};
use gdscript_compiler::ast::Program;
use gdscript_compiler::codegen::{CodeGenerator, OutputFormat, Target};
use gdscript_compiler::{lexer, parser};

fn frontend(source: &str) -> Result<(Program, Analysis)> {
    let (tokens, lex_diagnostics) = lexer::tokenize(source);
    ensure!(!lex_diagnostics.has_errors(), "lexing failed");

    let (program, parse_diagnostics) = parser::parse_tokens(tokens);
    ensure!(!parse_diagnostics.has_errors(), "parsing failed");

    let (analysis, semantic_diagnostics) = Analyzer::new().analyze(&program);
    ensure!(
        !semantic_diagnostics.has_errors(),
        "semantic analysis failed: {:?}",
        semantic_diagnostics.iter().collect::<Vec<_>>()
    );
    Ok((program, analysis))
}

fn output_stem(label: &str) -> Result<String> {
    let mut dir = std::env::temp_dir();
    dir.push(format!("gdscript-compiler-test-{}", std::process::id()));
    fs::create_dir_all(&dir).with_context(|| format!("Creating {}", dir.display()))?;
    let mut stem = dir;
    stem.push(label);
    Ok(stem.to_string_lossy().into_owned())
}

fn compile(source: &str, label: &str, target: Target, format: OutputFormat) -> Result<String> {
    let (program, analysis) = frontend(source)?;
    let stem = output_stem(label)?;
    let generator = CodeGenerator::new(&analysis, target, format);
    let diagnostics = generator.generate(&program, &stem)?;
    ensure!(!diagnostics.has_errors(), "code generation failed");
    Ok(stem)
}

#[test]
fn assembly_output_contains_function_label_and_return() -> Result<()> {
    let stem = compile(
        "func f():\n    return 0\n",
        "asm",
        Target::MacosX64,
        OutputFormat::Assembly,
    )?;
    let listing = fs::read_to_string(format!("{stem}.s"))?;

    let f_at = listing.find("f:").context("missing function label")?;
    let tail = &listing[f_at..];
    ensure!(tail.contains("mov"), "missing mov in {tail}");
    ensure!(tail.contains("#0"), "missing zero immediate in {tail}");
    ensure!(tail.contains("ret"), "missing ret in {tail}");
    Ok(())
}

#[test]
fn object_format_writes_assembly_and_gdobj_blob() -> Result<()> {
    let stem = compile(
        "func f():\n    return 1 + 2\n",
        "obj",
        Target::LinuxX64,
        OutputFormat::Object,
    )?;

    ensure!(PathBuf::from(format!("{stem}.s")).exists());
    let blob = fs::read(format!("{stem}.o"))?;
    ensure!(&blob[..5] == b"GDOBJ", "bad magic: {:?}", &blob[..5]);
    let function_count = u32::from_le_bytes(blob[5..9].try_into()?);
    ensure!(function_count >= 1);
    Ok(())
}

#[test]
fn windows_executable_starts_with_mz() -> Result<()> {
    let stem = compile(
        "func main():\n    return 0\n",
        "win",
        Target::WindowsX64,
        OutputFormat::Executable,
    )?;
    let image = fs::read(format!("{stem}.exe"))?;
    ensure!(&image[..2] == b"MZ");
    Ok(())
}

#[test]
fn macos_executable_starts_with_feedfacf() -> Result<()> {
    let stem = compile(
        "func main():\n    return 0\n",
        "mac",
        Target::MacosArm64,
        OutputFormat::Executable,
    )?;
    let image = fs::read(format!("{stem}.app"))?;
    ensure!(image[..4] == 0xfeed_facf_u32.to_le_bytes());
    // ARM64 CPU type
    ensure!(u32::from_le_bytes(image[4..8].try_into()?) == 0x0100_000c);
    Ok(())
}

#[test]
fn linux_executable_starts_with_elf_magic() -> Result<()> {
    let stem = compile(
        "func main():\n    return 0\n",
        "linux",
        Target::LinuxArm64,
        OutputFormat::Executable,
    )?;
    let image = fs::read(stem)?;
    ensure!(&image[..4] == b"\x7fELF");
    ensure!(u16::from_le_bytes([image[18], image[19]]) == 183); // EM_AARCH64
    Ok(())
}

#[test]
fn semantic_errors_stop_before_code_generation() -> Result<()> {
    let (tokens, lex_diagnostics) = lexer::tokenize("print(q)\n");
    ensure!(!lex_diagnostics.has_errors());
    let (program, parse_diagnostics) = parser::parse_tokens(tokens);
    ensure!(!parse_diagnostics.has_errors());

    let (_, semantic_diagnostics) = Analyzer::new().analyze(&program);
    ensure!(semantic_diagnostics.has_errors());
    let rendered: Vec<String> = semantic_diagnostics.iter().map(|d| d.to_string()).collect();
    ensure!(
        rendered
            .iter()
            .any(|line| line.contains("Undefined variable 'q'") && line.contains("line 1")),
        "unexpected diagnostics: {rendered:?}"
    );
    Ok(())
}

#[test]
fn match_warning_does_not_block_compilation() -> Result<()> {
    let source = "match 3:\n    \"x\":\n        pass\n";
    let (tokens, _) = lexer::tokenize(source);
    let (program, parse_diagnostics) = parser::parse_tokens(tokens);
    ensure!(!parse_diagnostics.has_errors());

    let (analysis, semantic_diagnostics) = Analyzer::new().analyze(&program);
    ensure!(!semantic_diagnostics.has_errors());
    ensure!(semantic_diagnostics
        .iter()
        .any(|d| d.message.contains("may not match expression type int")));

    let stem = output_stem("match-warning")?;
    let generator = CodeGenerator::new(&analysis, Target::LinuxX64, OutputFormat::Object);
    let codegen_diagnostics = generator.generate(&program, &stem)?;
    ensure!(!codegen_diagnostics.has_errors());
    Ok(())
}

#[test]
fn a_small_program_compiles_end_to_end() -> Result<()> {
    let source = r#"class_name Demo

const GREETING = "hello"

func classify(n: int) -> String:
    if n < 0:
        return "negative"
    elif n == 0:
        return "zero"
    return "positive"

func main():
    total := 0
    for n in range(10):
        total += n
    print(GREETING, classify(total))
    return 0
"#;
    let stem = compile(source, "demo", Target::LinuxX64, OutputFormat::Executable)?;
    let listing = fs::read_to_string(format!("{stem}.s"))?;
    ensure!(listing.contains("classify:"));
    ensure!(listing.contains("main:"));
    ensure!(listing.contains("call _builtin_print"));

    let image = fs::read(stem)?;
    ensure!(&image[..4] == b"\x7fELF");
    Ok(())
}