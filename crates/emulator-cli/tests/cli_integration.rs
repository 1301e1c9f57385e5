//! Integration tests driving the emulate and disasm binaries end to end.

use std::fs;
use std::path::PathBuf;
use std::process::Command;

use emulator_core::{layout_word, pack, pack_loadi, Opcode};

fn binary_path(name: &str) -> PathBuf {
    let mut path = std::env::current_exe().unwrap();
    path.pop();
    path.pop();
    path.join(name)
}

fn write_image(dir: &std::path::Path, name: &str, program: &[u32]) -> PathBuf {
    let path = dir.join(name);
    let mut bytes = Vec::new();
    for &inst in program {
        bytes.extend_from_slice(&layout_word(inst));
    }
    fs::write(&path, bytes).unwrap();
    path
}

/// Unix exit codes are the low 8 bits of the status.
fn exit_byte(code: i32) -> i32 {
    code & 0xFF
}

#[test]
fn program_runs_until_invalid_opcode() {
    let dir = tempfile::tempdir().unwrap();
    let rom = write_image(
        dir.path(),
        "add.bin",
        &[
            pack_loadi(1, 3),
            pack_loadi(2, 4),
            pack(Opcode::Add, 0, 1, 2, 0),
            0xFFFF_FFFF,
        ],
    );

    let output = Command::new(binary_path("emulate"))
        .args(["-r", &format!("0,{}", rom.display())])
        .output()
        .expect("failed to run emulate");

    assert_eq!(output.status.code(), Some(exit_byte(-2)));
    let stderr = String::from_utf8_lossy(&output.stderr);
    assert!(stderr.contains("invalid opcode"), "got: {stderr}");
}

#[test]
fn rom_is_shadowed_into_covering_memory() {
    let dir = tempfile::tempdir().unwrap();
    // The program stores a word into its own memory, proving the ROM bytes
    // landed in a writable memory device.
    let rom = write_image(
        dir.path(),
        "shadow.bin",
        &[
            pack_loadi(0, 0x77),
            pack_loadi(2, 0x80),
            pack(Opcode::Store, 0, 0, 2, 0),
            pack(Opcode::Load, 1, 0, 2, 0),
            0xFFFF_FFFF,
        ],
    );

    let output = Command::new(binary_path("emulate"))
        .args(["-m", "0,FFF", "-r", &format!("0,{}", rom.display())])
        .output()
        .expect("failed to run emulate");

    assert_eq!(output.status.code(), Some(exit_byte(-2)));
}

#[test]
fn breakpoint_enters_shell_and_continue_resumes() {
    let dir = tempfile::tempdir().unwrap();
    let rom = write_image(
        dir.path(),
        "bp.bin",
        &[
            pack_loadi(0, 1),
            pack_loadi(1, 2),
            pack_loadi(2, 3),
            0xFFFF_FFFF,
        ],
    );

    let output = Command::new(binary_path("emulate"))
        .args(["-r", &format!("0,{}", rom.display()), "-b", "4"])
        .env("RUST_LOG", "")
        .output_with_stdin(b"r0\nc\n")
        .expect("failed to run emulate");

    assert_eq!(output.status.code(), Some(exit_byte(-2)));
    let stderr = String::from_utf8_lossy(&output.stderr);
    assert!(stderr.contains("breakpoint 1 at 0x4"), "got: {stderr}");
    assert!(stderr.contains("0x4: loadi r1, 2"), "got: {stderr}");
    assert!(stderr.contains("0x1 (1)"), "got: {stderr}");
}

#[test]
fn shell_end_of_file_exits_cleanly() {
    let dir = tempfile::tempdir().unwrap();
    let rom = write_image(dir.path(), "eof.bin", &[pack_loadi(0, 1), 0xFFFF_FFFF]);

    let output = Command::new(binary_path("emulate"))
        .args(["-r", &format!("0,{}", rom.display()), "-b", "0"])
        .output_with_stdin(b"")
        .expect("failed to run emulate");

    assert_eq!(output.status.code(), Some(0));
}

#[test]
fn bad_option_exits_with_minus_one() {
    let output = Command::new(binary_path("emulate"))
        .args(["--frob"])
        .output()
        .expect("failed to run emulate");
    assert_eq!(output.status.code(), Some(exit_byte(-1)));
}

#[test]
fn missing_rom_exits_with_minus_three() {
    let output = Command::new(binary_path("emulate"))
        .args(["-r", "0,/nonexistent/rom.bin"])
        .output()
        .expect("failed to run emulate");
    assert_eq!(output.status.code(), Some(exit_byte(-3)));
    let stderr = String::from_utf8_lossy(&output.stderr);
    assert!(stderr.contains("cannot read ROM"), "got: {stderr}");
}

#[test]
fn disasm_prints_one_line_per_word() {
    let dir = tempfile::tempdir().unwrap();
    let image = write_image(
        dir.path(),
        "listing.bin",
        &[
            pack_loadi(1, 3),
            pack(Opcode::Add, 0, 1, 2, 0),
            pack(Opcode::Call, 5, 0, 0, 0),
            0xFFFF_FFFF,
        ],
    );

    let output = Command::new(binary_path("disasm"))
        .arg(image.to_str().unwrap())
        .output()
        .expect("failed to run disasm");

    assert!(output.status.success());
    let stdout = String::from_utf8_lossy(&output.stdout);
    assert_eq!(stdout, "loadi r1, 3\nadd r0, r1, r2\ncall r5\ninvalid\n");
}

#[test]
fn disasm_without_arguments_reports_and_fails() {
    let output = Command::new(binary_path("disasm"))
        .output()
        .expect("failed to run disasm");
    assert_eq!(output.status.code(), Some(exit_byte(-1)));
    let stderr = String::from_utf8_lossy(&output.stderr);
    assert!(stderr.contains("not enough arguments"), "got: {stderr}");
}

#[test]
fn disasm_with_unreadable_file_fails() {
    let output = Command::new(binary_path("disasm"))
        .arg("/nonexistent/listing.bin")
        .output()
        .expect("failed to run disasm");
    assert_eq!(output.status.code(), Some(exit_byte(-2)));
}

/// Helper extending `Command` with a piped-stdin variant of `output()`.
trait CommandExt {
    fn output_with_stdin(&mut self, input: &[u8]) -> std::io::Result<std::process::Output>;
}

impl CommandExt for Command {
    fn output_with_stdin(&mut self, input: &[u8]) -> std::io::Result<std::process::Output> {
        use std::io::Write;
        use std::process::Stdio;

        let mut child = self
            .stdin(Stdio::piped())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .spawn()?;
        if let Some(stdin) = child.stdin.take() {
            let mut stdin = stdin;
            stdin.write_all(input)?;
        }
        child.wait_with_output()
    }
}
