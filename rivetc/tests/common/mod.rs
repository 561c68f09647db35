//! End-to-end harness: compile source to assembly, assemble and link it
//! against the built `librivetc_runtime.a`, run the resulting binary,
//! and capture its stdout. Exercises the whole pipeline the way a user
//! invoking the CLI would, rather than any single pass in isolation.

use std::path::PathBuf;
use std::process::Command;

/// Locate `librivetc_runtime.a` near the test binary. Integration test
/// binaries live at `target/<profile>/deps/<name>-<hash>`; the
/// workspace's staticlib artifacts land one directory up, directly
/// under `target/<profile>/`.
fn runtime_archive() -> PathBuf {
    let exe = std::env::current_exe().expect("current_exe");
    let deps_dir = exe.parent().expect("deps dir");
    let profile_dir = deps_dir.parent().expect("profile dir");
    let archive = profile_dir.join("librivetc_runtime.a");
    assert!(
        archive.exists(),
        "expected {} to exist; run the workspace build first",
        archive.display()
    );
    archive
}

/// Compile `src`, link it, run it, and return what it printed on
/// stdout.
pub fn run_program(src: &str) -> String {
    let asm = rivetc::compile_source(src).expect("compilation should succeed");

    let dir = tempfile::tempdir().expect("tempdir");
    let asm_path = dir.path().join("program.s");
    std::fs::write(&asm_path, asm).expect("write assembly");

    let bin_path = dir.path().join("program");
    let status = Command::new("cc")
        .arg(&asm_path)
        .arg(runtime_archive())
        .arg("-o")
        .arg(&bin_path)
        .status()
        .expect("invoke cc");
    assert!(status.success(), "assembling/linking the generated program failed");

    let output = Command::new(&bin_path).output().expect("run compiled program");
    assert!(output.status.success(), "compiled program exited non-zero");
    String::from_utf8(output.stdout).expect("program stdout should be utf-8")
}
