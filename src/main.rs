use std::fs;

use anyhow::{bail, Context, Result};
use gdscript_compiler::analyzer::Analyzer;
use gdscript_compiler::codegen::{CodeGenerator, OutputFormat, Target};
use gdscript_compiler::diagnostics::CompileError;
use gdscript_compiler::{lexer, parser};

fn print_usage(program_name: &str) {
    println!("Usage: {program_name} <input.gd> <output> [options]");
    println!();
    println!("Options:");
    println!("  --platform <target>    windows, macos, macos-arm, linux, linux-arm");
    println!("  --format <format>      assembly, object, executable");
    println!("  --help                 Show this help message");
}

fn main() -> Result<()> {
    let mut args = std::env::args();
    let program_name = args.next().unwrap_or_else(|| "gdscript-compiler".to_string());

    let mut positional = Vec::new();
    let mut target = Target::MacosX64;
    let mut format = OutputFormat::Object;

    while let Some(arg) = args.next() {
        match arg.as_str() {
            "--help" | "-h" => {
                print_usage(&program_name);
                return Ok(());
            }
            "--platform" => {
                let value = args
                    .next()
                    .with_context(|| "Missing platform after --platform")?;
                target = Target::parse(&value)
                    .with_context(|| format!("Unknown platform '{value}'"))?;
            }
            "--format" => {
                let value = args.next().with_context(|| "Missing format after --format")?;
                format = OutputFormat::parse(&value)
                    .with_context(|| format!("Unknown format '{value}'"))?;
            }
            _ if arg.starts_with("--") => {
                print_usage(&program_name);
                bail!("Unknown argument: {arg}");
            }
            _ => positional.push(arg),
        }
    }

    if positional.len() != 2 {
        print_usage(&program_name);
        bail!("Expected an input file and an output path");
    }
    let input = &positional[0];
    let output = &positional[1];

    let source = fs::read_to_string(input).with_context(|| format!("Reading {input}"))?;

    let (tokens, lex_diagnostics) = lexer::tokenize(&source);
    lex_diagnostics.eprint_all();
    if lex_diagnostics.has_errors() {
        return Err(CompileError::Lex(lex_diagnostics.error_count()).into());
    }

    let (program, parse_diagnostics) = parser::parse_tokens(tokens);
    parse_diagnostics.eprint_all();
    if parse_diagnostics.has_errors() {
        return Err(CompileError::Parse(parse_diagnostics.error_count()).into());
    }

    let (analysis, semantic_diagnostics) = Analyzer::new().analyze(&program);
    semantic_diagnostics.eprint_all();
    if semantic_diagnostics.has_errors() {
        return Err(CompileError::Semantic(semantic_diagnostics.error_count()).into());
    }

    let generator = CodeGenerator::new(&analysis, target, format);
    let codegen_diagnostics = generator.generate(&program, output)?;
    codegen_diagnostics.eprint_all();
    if codegen_diagnostics.has_errors() {
        return Err(CompileError::Codegen(codegen_diagnostics.error_count()).into());
    }

    println!("Compilation successful: {output} ({})", target.name());
    Ok(())
}
