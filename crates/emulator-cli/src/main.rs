//! CLI entry point for the `emulate` binary.
//!
//! ```text
//! emulate [-s BASE | --stdio BASE]
//!         [-m BASE,LIMIT | --memory BASE,LIMIT]...
//!         [-r BASE,PATH  | --rom BASE,PATH]...
//!         [-t BASE | --ticks BASE]
//!         [-b ADDR | --break ADDR]...
//! ```
//!
//! Numeric arguments are hexadecimal with an optional `0x` prefix. `LIMIT`
//! is the offset of the region's last byte relative to `BASE`, inclusive.
//! Later `--memory`/`--rom` options override earlier ones where they
//! overlap, and a ROM entirely inside one memory device is loaded into that
//! memory instead of being mapped separately.
//!
//! Exit codes: 0 normal, -1 bad option, -2 invalid opcode during execution,
//! -3 ROM file failure.

use std::env;
use std::path::PathBuf;
use std::process;

use emulator_core::{Cpu, SetupError, Shell, StopReason, World};
use tracing_subscriber::EnvFilter;

const HELP_TEXT: &str = "Usage: emulate [-s BASE] [-m BASE,LIMIT]... [-r BASE,PATH]... \
                         [-t BASE] [-b ADDR]...";

#[derive(Debug, Default, PartialEq, Eq)]
struct CliArgs {
    stdio_base: Option<u32>,
    ticks_base: Option<u32>,
    memories: Vec<(u32, u32)>,
    roms: Vec<(u32, PathBuf)>,
    breakpoints: Vec<u32>,
}

#[derive(Debug)]
enum ParseResult {
    Args(CliArgs),
    Help,
}

/// Parses a hexadecimal number with an optional `0x` prefix.
fn parse_hex(text: &str, option: &str) -> Result<u32, String> {
    let digits = text
        .strip_prefix("0x")
        .or_else(|| text.strip_prefix("0X"))
        .unwrap_or(text);
    u32::from_str_radix(digits, 16)
        .map_err(|_| format!("bad number supplied to option {option}"))
}

/// Splits a `NUMBER,REST` option value at its first comma.
fn parse_comma<'a>(text: &'a str, option: &str) -> Result<(u32, &'a str), String> {
    let Some((number, rest)) = text.split_once(',') else {
        return Err(format!(
            "no comma in argument supplied to option {option}"
        ));
    };
    Ok((parse_hex(number, option)?, rest))
}

fn parse_args(mut args: impl Iterator<Item = String>) -> Result<ParseResult, String> {
    let mut parsed = CliArgs::default();

    while let Some(arg) = args.next() {
        if arg == "--help" {
            return Ok(ParseResult::Help);
        }

        let option = arg.clone();
        let value = |args: &mut dyn Iterator<Item = String>| {
            args.next()
                .ok_or_else(|| format!("missing value for option {option}"))
        };

        match arg.as_str() {
            "-s" | "--stdio" => {
                let text = value(&mut args)?;
                parsed.stdio_base = Some(parse_hex(&text, &arg)?);
            }
            "-t" | "--ticks" => {
                let text = value(&mut args)?;
                parsed.ticks_base = Some(parse_hex(&text, &arg)?);
            }
            "-m" | "--memory" => {
                let text = value(&mut args)?;
                let (base, rest) = parse_comma(&text, &arg)?;
                parsed.memories.push((base, parse_hex(rest, &arg)?));
            }
            "-r" | "--rom" => {
                let text = value(&mut args)?;
                let (base, rest) = parse_comma(&text, &arg)?;
                parsed.roms.push((base, PathBuf::from(rest)));
            }
            "-b" | "--break" => {
                let text = value(&mut args)?;
                parsed.breakpoints.push(parse_hex(&text, &arg)?);
            }
            other => return Err(format!("unknown option: {other}")),
        }
    }

    Ok(ParseResult::Args(parsed))
}

/// Builds the device world in registration order: memories first, then ROMs
/// (shadowed where possible), then peripherals.
fn build_world(args: &CliArgs) -> Result<World, SetupError> {
    let mut world = World::new();
    for &(base, limit) in &args.memories {
        world.add_memory(base, limit)?;
    }
    for (base, path) in &args.roms {
        world.add_rom(*base, path)?;
    }
    if let Some(base) = args.stdio_base {
        world.add_stdio(base)?;
    }
    if let Some(base) = args.ticks_base {
        world.add_ticks(base)?;
    }
    Ok(world)
}

fn setup_exit_code(error: &SetupError) -> i32 {
    match error {
        SetupError::RomIo { .. } | SetupError::RomEmpty { .. } => -3,
        SetupError::MemoryTooLarge { .. } | SetupError::RangeOverflow { .. } => -1,
    }
}

fn main() {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .with_writer(std::io::stderr)
        .init();

    let args = match parse_args(env::args().skip(1)) {
        Ok(ParseResult::Help) => {
            println!("{HELP_TEXT}");
            return;
        }
        Ok(ParseResult::Args(args)) => args,
        Err(error) => {
            eprintln!("{error}");
            eprintln!("{HELP_TEXT}");
            process::exit(-1);
        }
    };

    let mut world = match build_world(&args) {
        Ok(world) => world,
        Err(error) => {
            eprintln!("{error}");
            process::exit(setup_exit_code(&error));
        }
    };
    tracing::debug!(
        memories = args.memories.len(),
        roms = args.roms.len(),
        breakpoints = args.breakpoints.len(),
        "world configured"
    );

    let mut cpu = Cpu::new();
    for &addr in &args.breakpoints {
        cpu.add_breakpoint(addr);
    }

    let mut shell = Shell::interactive();
    match cpu.run(&mut world, &mut shell) {
        (StopReason::InvalidOpcode { .. }, _) => {
            eprintln!("invalid opcode");
            process::exit(-2);
        }
        (StopReason::DebuggerEof, _) => {}
    }
}
