//! Standalone disassembler: reads a file of little-endian instruction words
//! and prints one textual instruction per line.

use std::env;
use std::fs::File;
use std::io::{BufWriter, Read, Write};
use std::process;

use emulator_core::{format_inst, word_from_layout};

/// Prints every whole instruction word in `input`; a trailing partial word
/// is ignored, as is anything after a read error.
fn disassemble(mut input: impl Read, output: &mut impl Write) -> std::io::Result<()> {
    let mut bytes = Vec::new();
    input.read_to_end(&mut bytes)?;
    for chunk in bytes.chunks_exact(4) {
        let word = word_from_layout([chunk[0], chunk[1], chunk[2], chunk[3]]);
        writeln!(output, "{}", format_inst(word))?;
    }
    Ok(())
}

fn main() {
    let Some(path) = env::args().nth(1) else {
        eprintln!("not enough arguments");
        process::exit(-1);
    };

    let file = match File::open(&path) {
        Ok(file) => file,
        Err(error) => {
            eprintln!("cannot open {path}: {error}");
            process::exit(-2);
        }
    };

    let stdout = std::io::stdout();
    let mut output = BufWriter::new(stdout.lock());
    if let Err(error) = disassemble(file, &mut output) {
        eprintln!("cannot read {path}: {error}");
        process::exit(-2);
    }
    if output.flush().is_err() {
        process::exit(-2);
    }
}
