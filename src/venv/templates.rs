// ─────────────────────────────────────────────────────────────────────────────
//  ruyi :: venv :: templates
//
//  Embedded templates for the files a venv materializes: the CMake
//  toolchain file, the Meson cross file, and the shell activation script.
//  Rendered with tinytemplate; the contexts are plain serde structs.
// ─────────────────────────────────────────────────────────────────────────────

use serde::Serialize;
use tinytemplate::TinyTemplate;

use crate::error::{Error, Result};

const TOOLCHAIN_CMAKE: &str = r#"set(CMAKE_SYSTEM_NAME Linux)
set(CMAKE_SYSTEM_PROCESSOR {processor})

{{ if sysroot }}set(CMAKE_SYSROOT "{sysroot}")
{{ endif }}set(CMAKE_C_COMPILER "{cc}")
set(CMAKE_CXX_COMPILER "{cxx}")

set(CMAKE_FIND_ROOT_PATH "{venv_root}")
set(CMAKE_FIND_ROOT_PATH_MODE_PROGRAM NEVER)
set(CMAKE_FIND_ROOT_PATH_MODE_LIBRARY ONLY)
set(CMAKE_FIND_ROOT_PATH_MODE_INCLUDE ONLY)
set(CMAKE_FIND_ROOT_PATH_MODE_PACKAGE ONLY)
"#;

const MESON_CROSS_INI: &str = r#"[binaries]
c = '{cc}'
cpp = '{cxx}'
{{ for b in binaries }}{b.name} = '{b.path}'
{{ endfor }}
[host_machine]
system = 'linux'
cpu_family = '{processor}'
cpu = '{processor}'
endian = 'little'

[properties]
{{ if sysroot }}sys_root = '{sysroot}'
{{ endif }}needs_exe_wrapper = true
"#;

// The script avoids brace-parameter expansions so the template engine's
// brace syntax stays unambiguous.
const RUYI_ACTIVATE: &str = r#"# This file must be used with "source bin/ruyi-activate" from your shell.

ruyi_deactivate () \{
    if [ -n "$_RUYI_OLD_PATH" ] ; then
        PATH="$_RUYI_OLD_PATH"
        export PATH
        unset _RUYI_OLD_PATH
    fi
    if [ -n "$_RUYI_OLD_PS1" ] ; then
        PS1="$_RUYI_OLD_PS1"
        export PS1
        unset _RUYI_OLD_PS1
    fi
    unset RUYI_VENV
    unset RUYI_VENV_NAME
    unset -f ruyi_deactivate
}

RUYI_VENV="{venv_root}"
export RUYI_VENV

_RUYI_OLD_PATH="$PATH"
PATH="$RUYI_VENV/bin:$PATH"
export PATH

RUYI_VENV_NAME="{venv_name}"
export RUYI_VENV_NAME

if [ -z "$RUYI_VENV_PROMPT_DISABLE" ] ; then
    _RUYI_OLD_PS1="$PS1"
    PS1="($RUYI_VENV_NAME) $PS1"
    export PS1
fi
"#;

#[derive(Serialize)]
pub struct MesonBinary {
    pub name: String,
    pub path: String,
}

#[derive(Serialize)]
pub struct ToolchainFileContext {
    pub processor: String,
    pub cc: String,
    pub cxx: String,
    pub sysroot: Option<String>,
    pub venv_root: String,
    pub binaries: Vec<MesonBinary>,
}

#[derive(Serialize)]
pub struct ActivateContext {
    pub venv_root: String,
    pub venv_name: String,
}

fn render<C: Serialize>(name: &str, template: &str, ctx: &C) -> Result<String> {
    let mut tt = TinyTemplate::new();
    tt.add_template(name, template)
        .map_err(|e| Error::Other(format!("bad template {name}: {e}")))?;
    tt.render(name, ctx)
        .map_err(|e| Error::Other(format!("failed to render {name}: {e}")))
}

pub fn render_toolchain_cmake(ctx: &ToolchainFileContext) -> Result<String> {
    render("toolchain.cmake", TOOLCHAIN_CMAKE, ctx)
}

pub fn render_meson_cross(ctx: &ToolchainFileContext) -> Result<String> {
    render("meson-cross.ini", MESON_CROSS_INI, ctx)
}

pub fn render_activate(ctx: &ActivateContext) -> Result<String> {
    render("ruyi-activate", RUYI_ACTIVATE, ctx)
}

// ─────────────────────────────────────────────────────────────────────────────
//  Tests
// ─────────────────────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;

    fn ctx() -> ToolchainFileContext {
        ToolchainFileContext {
            processor: "riscv64".to_owned(),
            cc: "/v/bin/riscv64-unknown-linux-gnu-gcc".to_owned(),
            cxx: "/v/bin/riscv64-unknown-linux-gnu-g++".to_owned(),
            sysroot: Some("/v/sysroot.riscv64-unknown-linux-gnu".to_owned()),
            venv_root: "/v".to_owned(),
            binaries: vec![MesonBinary {
                name: "ar".to_owned(),
                path: "/v/bin/riscv64-unknown-linux-gnu-ar".to_owned(),
            }],
        }
    }

    #[test]
    fn cmake_file_mentions_compiler_and_sysroot() {
        let text = render_toolchain_cmake(&ctx()).unwrap();
        assert!(text.contains("set(CMAKE_SYSTEM_PROCESSOR riscv64)"));
        assert!(text.contains("set(CMAKE_SYSROOT \"/v/sysroot.riscv64-unknown-linux-gnu\")"));
        assert!(text.contains("riscv64-unknown-linux-gnu-gcc"));
    }

    #[test]
    fn cmake_file_omits_sysroot_when_absent() {
        let mut c = ctx();
        c.sysroot = None;
        let text = render_toolchain_cmake(&c).unwrap();
        assert!(!text.contains("CMAKE_SYSROOT"));
    }

    #[test]
    fn meson_file_lists_additional_binaries() {
        let text = render_meson_cross(&ctx()).unwrap();
        assert!(text.contains("ar = '/v/bin/riscv64-unknown-linux-gnu-ar'"));
        assert!(text.contains("cpu_family = 'riscv64'"));
    }

    #[test]
    fn activate_script_exports_the_venv() {
        let text = render_activate(&ActivateContext {
            venv_root: "/v".to_owned(),
            venv_name: "sdk".to_owned(),
        })
        .unwrap();
        assert!(text.contains("RUYI_VENV=\"/v\""));
        assert!(text.contains("ruyi_deactivate"));
        assert!(text.contains("($RUYI_VENV_NAME) "));
    }
}
