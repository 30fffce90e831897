// ─────────────────────────────────────────────────────────────────────────────
//  ruyi :: pkg :: canonical
//
//  Canonical TOML dump of package manifests, used by `admin format-manifest`
//  and everywhere the system writes a manifest back out. The output has a
//  fixed key order per table, an inline table for the vendor, sorted
//  checksum keys, and multiline URL arrays, so semantically equal inputs
//  produce byte-identical output:
//
//      parse(dump(parse(input))) == parse(input)
// ─────────────────────────────────────────────────────────────────────────────

use std::collections::BTreeMap;
use std::fmt::Write;

use super::manifest::{
    BinaryHostDecl, BlobDecl, DistfileDecl, EmulatorDecl, PackageKind, PackageManifestData,
    PackageMetadataDecl, ProvisionableDecl, SourceDecl, ToolchainDecl,
};

/// Render one string as a quoted TOML literal.
fn toml_str(s: &str) -> String {
    toml::Value::String(s.to_owned()).to_string()
}

fn inline_str_array(items: &[String]) -> String {
    let quoted: Vec<String> = items.iter().map(|s| toml_str(s)).collect();
    format!("[{}]", quoted.join(", "))
}

fn multiline_str_array(items: &[String]) -> String {
    if items.is_empty() {
        return "[]".to_owned();
    }
    let mut out = String::from("[\n");
    for item in items {
        let _ = writeln!(out, "  {},", toml_str(item));
    }
    out.push(']');
    out
}

fn kind_str(k: PackageKind) -> &'static str {
    match k {
        PackageKind::Binary => "binary",
        PackageKind::Blob => "blob",
        PackageKind::Source => "source",
        PackageKind::Toolchain => "toolchain",
        PackageKind::Emulator => "emulator",
    }
}

fn sorted_kv_lines(out: &mut String, map: &BTreeMap<String, String>) {
    // BTreeMap iteration is already key-sorted
    for (k, v) in map {
        let _ = writeln!(out, "{k} = {}", toml_str(v));
    }
}

/// Produce the canonical TOML text for a manifest body.
pub fn dump_canonical(data: &PackageManifestData) -> String {
    let mut out = String::new();

    let _ = writeln!(out, "format = {}", toml_str(&data.format));
    if !data.kind.is_empty() {
        let kinds: Vec<String> = data.kind.iter().map(|k| kind_str(*k).to_owned()).collect();
        let _ = writeln!(out, "kind = {}", inline_str_array(&kinds));
    }

    dump_metadata(&mut out, &data.metadata);

    for df in &data.distfiles {
        dump_distfile(&mut out, df);
    }

    if let Some(binary) = &data.binary {
        for hd in binary {
            dump_binary_host(&mut out, hd);
        }
    }
    if let Some(blob) = &data.blob {
        dump_blob(&mut out, blob);
    }
    if let Some(source) = &data.source {
        dump_source(&mut out, source);
    }
    if let Some(tc) = &data.toolchain {
        dump_toolchain(&mut out, tc);
    }
    if let Some(emu) = &data.emulator {
        dump_emulator(&mut out, emu);
    }
    if let Some(prov) = &data.provisionable {
        dump_provisionable(&mut out, prov);
    }

    out
}

fn dump_metadata(out: &mut String, md: &PackageMetadataDecl) {
    out.push('\n');
    out.push_str("[metadata]\n");
    let _ = writeln!(out, "desc = {}", toml_str(&md.desc));

    let vendor = match &md.vendor.eula {
        Some(eula) => format!(
            "{{ name = {}, eula = {} }}",
            toml_str(&md.vendor.name),
            toml_str(eula)
        ),
        None => format!("{{ name = {} }}", toml_str(&md.vendor.name)),
    };
    let _ = writeln!(out, "vendor = {vendor}");

    if let Some(slug) = &md.slug {
        let _ = writeln!(out, "slug = {}", toml_str(slug));
    }
    if let Some(sl) = &md.service_level {
        if sl.known_issues.is_empty() {
            let _ = writeln!(out, "service_level = {{ level = {} }}", toml_str(&sl.level));
        } else {
            let _ = writeln!(
                out,
                "service_level = {{ level = {}, known_issues = {} }}",
                toml_str(&sl.level),
                inline_str_array(&sl.known_issues)
            );
        }
    }
}

fn dump_distfile(out: &mut String, df: &DistfileDecl) {
    out.push('\n');
    out.push_str("[[distfiles]]\n");
    let _ = writeln!(out, "name = {}", toml_str(&df.name));
    if let Some(unpack) = df.unpack {
        // serde renders the enum as its wire string
        if let Ok(toml::Value::String(s)) = toml::Value::try_from(unpack) {
            let _ = writeln!(out, "unpack = {}", toml_str(&s));
        }
    }
    let _ = writeln!(out, "size = {}", df.size);
    if df.strip_components != 1 {
        let _ = writeln!(out, "strip_components = {}", df.strip_components);
    }
    if let Some(urls) = &df.urls {
        let _ = writeln!(out, "urls = {}", multiline_str_array(urls));
    }
    if let Some(restrict) = &df.restrict {
        let kinds: Vec<String> = restrict
            .iter()
            .map(|r| {
                match r {
                    super::manifest::RestrictKind::Fetch => "fetch",
                    super::manifest::RestrictKind::Mirror => "mirror",
                }
                .to_owned()
            })
            .collect();
        let _ = writeln!(out, "restrict = {}", inline_str_array(&kinds));
    }
    if let Some(fr) = &df.fetch_restriction {
        if fr.params.is_empty() {
            let _ = writeln!(
                out,
                "fetch_restriction = {{ msgid = {} }}",
                toml_str(&fr.msgid)
            );
        } else {
            let params: Vec<String> = fr
                .params
                .iter()
                .map(|(k, v)| format!("{k} = {}", toml_str(v)))
                .collect();
            let _ = writeln!(
                out,
                "fetch_restriction = {{ msgid = {}, params = {{ {} }} }}",
                toml_str(&fr.msgid),
                params.join(", ")
            );
        }
    }
    out.push_str("[distfiles.checksums]\n");
    sorted_kv_lines(out, &df.checksums);
}

fn dump_binary_host(out: &mut String, hd: &BinaryHostDecl) {
    out.push('\n');
    out.push_str("[[binary]]\n");
    let _ = writeln!(out, "host = {}", toml_str(&hd.host));
    let _ = writeln!(out, "distfiles = {}", multiline_str_array(&hd.distfiles));
    if !hd.commands.is_empty() {
        out.push_str("[binary.commands]\n");
        sorted_kv_lines(out, &hd.commands);
    }
}

fn dump_blob(out: &mut String, blob: &BlobDecl) {
    out.push('\n');
    out.push_str("[blob]\n");
    let _ = writeln!(out, "distfiles = {}", multiline_str_array(&blob.distfiles));
}

fn dump_source(out: &mut String, source: &SourceDecl) {
    out.push('\n');
    out.push_str("[source]\n");
    let _ = writeln!(out, "distfiles = {}", multiline_str_array(&source.distfiles));
}

fn dump_toolchain(out: &mut String, tc: &ToolchainDecl) {
    out.push('\n');
    out.push_str("[toolchain]\n");
    let _ = writeln!(out, "target = {}", toml_str(&tc.target));
    let _ = writeln!(out, "quirks = {}", inline_str_array(&tc.quirks));
    if tc.components.is_empty() {
        out.push_str("components = []\n");
    } else {
        out.push_str("components = [\n");
        for c in &tc.components {
            let _ = writeln!(
                out,
                "  {{ name = {}, version = {} }},",
                toml_str(&c.name),
                toml_str(&c.version)
            );
        }
        out.push_str("]\n");
    }
    if let Some(sysroot) = &tc.included_sysroot {
        let _ = writeln!(out, "included_sysroot = {}", toml_str(sysroot));
    }
}

fn dump_emulator(out: &mut String, emu: &EmulatorDecl) {
    for fl in &emu.flavors {
        out.push('\n');
        out.push_str("[[emulator.flavors]]\n");
        let _ = writeln!(out, "name = {}", toml_str(&fl.name));
        if !fl.quirks.is_empty() {
            let _ = writeln!(out, "quirks = {}", inline_str_array(&fl.quirks));
        }
        let _ = writeln!(
            out,
            "supported_arches = {}",
            inline_str_array(&fl.supported_arches)
        );
    }
    for prog in &emu.program {
        out.push('\n');
        out.push_str("[[emulator.program]]\n");
        let _ = writeln!(out, "path = {}", toml_str(&prog.path));
        let _ = writeln!(out, "flavor = {}", toml_str(&prog.flavor));
        let _ = writeln!(
            out,
            "supported_arches = {}",
            inline_str_array(&prog.supported_arches)
        );
        if let Some(binfmt) = &prog.binfmt_misc {
            let _ = writeln!(out, "binfmt_misc = {}", toml_str(binfmt));
        }
    }
}

fn dump_provisionable(out: &mut String, prov: &ProvisionableDecl) {
    out.push('\n');
    out.push_str("[provisionable]\n");
    let _ = writeln!(out, "strategy = {}", toml_str(&prov.strategy));
    out.push_str("[provisionable.partition_map]\n");
    sorted_kv_lines(out, &prov.partition_map);
}

// ─────────────────────────────────────────────────────────────────────────────
//  Tests
// ─────────────────────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    const FULL_MANIFEST: &str = r#"
kind = ["binary", "toolchain", "emulator"]
format = "v1"

[metadata]
vendor = { eula = "plct-eula", name = "PLCT" }
slug = "plct-gcc"
desc = "Toolchain with everything"
service_level = { level = "known-issue", known_issues = ["issue-a"] }

[[distfiles]]
size = 100
name = "tc.tar.zst"
strip_components = 2
urls = ["https://mirror.example/tc.tar.zst"]
[distfiles.checksums]
sha512 = "9b71d224bd62f3785d96d46ad3ea3d73319bfbc2890caadae2dff72519673ca72323c3d99ba5c11d7c7acc6e14b8c5da0c4663475c2e5c3adef46f73bcdec043"
sha256 = "2cf24dba5fb0a30e26e83b2ac5b9e29e1b161e5c1fa7425e73043362938b9824"

[[binary]]
host = "linux/x86_64"
distfiles = ["tc.tar.zst"]
[binary.commands]
mytool = "bin/mytool"

[toolchain]
target = "riscv64-unknown-linux-gnu"
quirks = ["rv64"]
components = [{ name = "gcc", version = "13.1.0" }]
included_sysroot = "sysroot"

[[emulator.flavors]]
name = "qemu-linux-user"
quirks = ["rv64"]
supported_arches = ["riscv64"]

[[emulator.program]]
path = "bin/qemu-riscv64"
flavor = "qemu-linux-user"
supported_arches = ["riscv64"]
binfmt_misc = ":qemu-riscv64:M::x:$BIN:"

[provisionable]
strategy = "dd-img"
[provisionable.partition_map]
boot = "boot.img"
root = "root.img"
"#;

    fn parse(text: &str) -> PackageManifestData {
        toml::from_str(text).unwrap()
    }

    #[test]
    fn round_trip_preserves_semantics() {
        let parsed = parse(FULL_MANIFEST);
        let dumped = dump_canonical(&parsed);
        let reparsed = parse(&dumped);
        assert_eq!(parsed, reparsed);
    }

    #[test]
    fn dump_is_a_fixed_point() {
        let parsed = parse(FULL_MANIFEST);
        let once = dump_canonical(&parsed);
        let twice = dump_canonical(&parse(&once));
        assert_eq!(once, twice);
    }

    #[test]
    fn key_order_is_canonical_regardless_of_input_order() {
        let dumped = dump_canonical(&parse(FULL_MANIFEST));
        let fmt_pos = dumped.find("format = ").unwrap();
        let kind_pos = dumped.find("kind = ").unwrap();
        let desc_pos = dumped.find("desc = ").unwrap();
        let vendor_pos = dumped.find("vendor = {").unwrap();
        assert!(fmt_pos < kind_pos);
        assert!(kind_pos < desc_pos);
        assert!(desc_pos < vendor_pos);
    }

    #[test]
    fn checksums_are_key_sorted() {
        let dumped = dump_canonical(&parse(FULL_MANIFEST));
        let p256 = dumped.find("sha256 = ").unwrap();
        let p512 = dumped.find("sha512 = ").unwrap();
        assert!(p256 < p512);
    }

    #[test]
    fn default_strip_components_is_omitted() {
        let mut data = parse(FULL_MANIFEST);
        data.distfiles[0].strip_components = 1;
        let dumped = dump_canonical(&data);
        assert!(!dumped.contains("strip_components"));
    }
}
