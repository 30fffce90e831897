// ─────────────────────────────────────────────────────────────────────────────
//  ruyi :: mux
//
//  The shim multiplexer. When the ruyi executable is invoked under any
//  other name (through a venv's bin/ symlinks), it locates the enclosing
//  venv, looks the basename up in the cached command metadata, splices the
//  target's toolchain flags in right after argv[0] for compiler / linker
//  drivers, and replaces itself with the real binary.
//
//  Every failure on this path exits 127, like a shell's command-not-found.
// ─────────────────────────────────────────────────────────────────────────────

use std::collections::BTreeMap;
use std::path::Path;
use std::process::Command;

use crate::config::GlobalMode;
use crate::error::{Error, Result};
use crate::venv::cfg::RuyiVenvConfig;

pub const MUX_FAILURE_EXIT: i32 = 127;

/// Command names that receive the profile's toolchain flags.
const CC_LD_DRIVERS: &[&str] = &[
    "gcc", "g++", "cc", "c++", "cpp", "clang", "clang++", "clang-cpp", "ld", "ld.bfd", "ld.lld",
    "ld.mold",
];

fn is_cc_or_ld_driver(basename: &str) -> bool {
    CC_LD_DRIVERS
        .iter()
        .any(|d| basename == *d || basename.ends_with(&format!("-{d}")))
}

/// Build the final argv: program, then spliced flags (drivers only), then
/// the user's arguments unchanged.
pub fn build_argv(
    dest: &str,
    basename: &str,
    toolchain_flags: &str,
    user_args: &[String],
) -> Result<Vec<String>> {
    let mut argv = vec![dest.to_owned()];
    if is_cc_or_ld_driver(basename) && !toolchain_flags.is_empty() {
        let flags = shell_words::split(toolchain_flags)
            .map_err(|e| Error::Other(format!("bad toolchain flags: {e}")))?;
        argv.extend(flags);
    }
    argv.extend(user_args.iter().cloned());
    Ok(argv)
}

/// Entry point for shim-mode invocations. Only returns on failure.
pub fn mux_main(mode: &GlobalMode, args: &[String]) -> i32 {
    let basename = Path::new(&mode.argv0)
        .file_name()
        .map(|n| n.to_string_lossy().to_string())
        .unwrap_or_default();

    match run_shim(mode, &basename, args) {
        Ok(code) => code,
        Err(e) => {
            eprintln!("ruyi: {e}");
            MUX_FAILURE_EXIT
        }
    }
}

fn run_shim(mode: &GlobalMode, basename: &str, args: &[String]) -> Result<i32> {
    let vcfg = RuyiVenvConfig::load_from_venv(mode)?.ok_or(Error::MuxNotInVenv)?;

    // the qemu wrapper resolves through the cached emulator facts
    if basename == "ruyi-qemu" {
        let qemu = vcfg
            .cache
            .qemu_bin
            .clone()
            .ok_or_else(|| Error::Other("this venv has no emulator configured".to_owned()))?;
        let mut argv = vec![qemu];
        argv.extend(args.iter().cloned());
        return exec(&argv, vcfg.cache.profile_emu_env.as_ref());
    }

    let entry = vcfg.resolve_cmd(basename).ok_or_else(|| {
        Error::Other(format!(
            "command '{basename}' is not provided by the venv at {}",
            vcfg.venv_root.display()
        ))
    })?;

    let flags = if entry.target_tuple.is_empty() {
        ""
    } else {
        vcfg.cache
            .targets
            .get(&entry.target_tuple)
            .map(|t| t.toolchain_flags.as_str())
            .unwrap_or("")
    };

    let argv = build_argv(&entry.dest, basename, flags, args)?;
    exec(&argv, None)
}

#[cfg(unix)]
fn exec(argv: &[String], env: Option<&BTreeMap<String, String>>) -> Result<i32> {
    use std::os::unix::process::CommandExt;

    let mut cmd = Command::new(&argv[0]);
    cmd.args(&argv[1..]);
    if let Some(env) = env {
        cmd.envs(env);
    }
    // only returns on error
    let err = cmd.exec();
    Err(Error::Other(format!("failed to exec {}: {err}", argv[0])))
}

#[cfg(not(unix))]
fn exec(argv: &[String], env: Option<&BTreeMap<String, String>>) -> Result<i32> {
    let mut cmd = Command::new(&argv[0]);
    cmd.args(&argv[1..]);
    if let Some(env) = env {
        cmd.envs(env);
    }
    let status = cmd.status()?;
    Ok(status.code().unwrap_or(MUX_FAILURE_EXIT))
}

// ─────────────────────────────────────────────────────────────────────────────
//  Tests
// ─────────────────────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn driver_detection() {
        assert!(is_cc_or_ld_driver("gcc"));
        assert!(is_cc_or_ld_driver("riscv64-unknown-linux-gnu-gcc"));
        assert!(is_cc_or_ld_driver("riscv64-unknown-linux-gnu-g++"));
        assert!(is_cc_or_ld_driver("clang++"));
        assert!(is_cc_or_ld_driver("ld.lld"));
        assert!(!is_cc_or_ld_driver("objdump"));
        assert!(!is_cc_or_ld_driver("riscv64-unknown-linux-gnu-ar"));
    }

    #[test]
    fn flags_splice_between_program_and_user_args() {
        let argv = build_argv(
            "/tc/bin/riscv64-unknown-linux-gnu-gcc",
            "riscv64-unknown-linux-gnu-gcc",
            "-march=rv64gc -mabi=lp64d",
            &["-O2".to_owned(), "foo.c".to_owned(), "-o".to_owned(), "foo".to_owned()],
        )
        .unwrap();
        assert_eq!(
            argv,
            vec![
                "/tc/bin/riscv64-unknown-linux-gnu-gcc",
                "-march=rv64gc",
                "-mabi=lp64d",
                "-O2",
                "foo.c",
                "-o",
                "foo",
            ]
        );
    }

    #[test]
    fn non_drivers_get_no_flags() {
        let argv = build_argv(
            "/tc/bin/riscv64-unknown-linux-gnu-objdump",
            "riscv64-unknown-linux-gnu-objdump",
            "-march=rv64gc -mabi=lp64d",
            &["-d".to_owned(), "foo".to_owned()],
        )
        .unwrap();
        assert_eq!(
            argv,
            vec!["/tc/bin/riscv64-unknown-linux-gnu-objdump", "-d", "foo"]
        );
    }
}
