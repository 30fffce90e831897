// ─────────────────────────────────────────────────────────────────────────────
//  ruyi  —  standalone binary
//
//  Invoked as `ruyi`, this is the package-manager CLI. Invoked under any
//  other basename (through a venv's bin/ shim symlinks), it becomes the
//  shim multiplexer and replaces itself with the real toolchain binary.
// ─────────────────────────────────────────────────────────────────────────────

use std::path::Path;

use ruyi::cli;
use ruyi::config::GlobalMode;

fn main() {
    let mut args = std::env::args();
    let argv0 = args.next().unwrap_or_else(|| "ruyi".to_owned());
    let rest: Vec<String> = args.collect();

    let basename = Path::new(&argv0)
        .file_name()
        .map(|n| n.to_string_lossy().to_string())
        .unwrap_or_else(|| "ruyi".to_owned());

    let code = if basename == "ruyi" {
        cli::cli_main(argv0, rest)
    } else {
        // shim mode: argv[0] decides which venv command is meant
        let mode = GlobalMode::from_env(argv0, false);
        cli::mux_main(&mode, &rest)
    };

    std::process::exit(code);
}
