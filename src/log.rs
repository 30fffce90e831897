// ─────────────────────────────────────────────────────────────────────────────
//  ruyi :: log
//
//  Console output helpers. Human mode renders colored glyph-prefixed lines;
//  porcelain mode replaces all human output with one JSON object per line,
//  each tagged with a stable "ty" discriminator. Debug lines only show up
//  when RUYI_DEBUG is truthy, and never in porcelain mode's stdout.
// ─────────────────────────────────────────────────────────────────────────────

use colored::Colorize;
use serde::Serialize;

#[derive(Debug, Clone)]
pub struct Console {
    porcelain: bool,
    debug: bool,
}

#[derive(Serialize)]
struct PorcelainLogV1<'a> {
    ty: &'static str,
    lvl: &'static str,
    msg: &'a str,
}

impl Console {
    pub fn new(porcelain: bool, debug: bool) -> Self {
        Self { porcelain, debug }
    }

    pub fn is_porcelain(&self) -> bool {
        self.porcelain
    }

    pub fn is_debug(&self) -> bool {
        self.debug
    }

    pub fn info(&self, msg: &str) {
        if self.porcelain {
            self.emit_log("info", msg);
            return;
        }
        println!("{} {}", "→".cyan(), msg);
    }

    pub fn ok(&self, msg: &str) {
        if self.porcelain {
            self.emit_log("info", msg);
            return;
        }
        println!("{} {}", "✓".green().bold(), msg);
    }

    pub fn warn(&self, msg: &str) {
        if self.porcelain {
            self.emit_log("warn", msg);
            return;
        }
        eprintln!("{} {}", "!".yellow().bold(), msg);
    }

    pub fn error(&self, msg: &str) {
        if self.porcelain {
            self.emit_log("error", msg);
            return;
        }
        eprintln!("{} {}", "✗".red().bold(), msg);
    }

    pub fn debug(&self, msg: &str) {
        if !self.debug {
            return;
        }
        if self.porcelain {
            self.emit_log("debug", msg);
            return;
        }
        eprintln!("  {} {}", "[debug]".dimmed(), msg.dimmed());
    }

    /// Emit one machine-readable record on stdout. The value must carry its
    /// own `ty` tag.
    pub fn porcelain_record<T: Serialize>(&self, record: &T) {
        if let Ok(line) = serde_json::to_string(record) {
            println!("{line}");
        }
    }

    fn emit_log(&self, lvl: &'static str, msg: &str) {
        let rec = PorcelainLogV1 {
            ty: "log-v1",
            lvl,
            msg,
        };
        if let Ok(line) = serde_json::to_string(&rec) {
            eprintln!("{line}");
        }
    }
}
