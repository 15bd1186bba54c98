//! Generates `$OUT_DIR/pkg_info.rs` with the package name, version and
//! description read from `Cargo.toml`.

use std::{env, fs, path::Path};

const FIELDS: [(&str, &str, &str); 3] = [
    ("PKG_NAME", "name", "taskdesk"),
    ("PKG_VERSION", "version", "0.0.0"),
    ("PKG_DESCRIPTION", "description", ""),
];

fn main() {
    let manifest_dir = env::var("CARGO_MANIFEST_DIR").expect("CARGO_MANIFEST_DIR not set");
    let manifest = Path::new(&manifest_dir).join("Cargo.toml");
    println!("cargo:rerun-if-changed={}", manifest.display());

    let text = fs::read_to_string(&manifest)
        .unwrap_or_else(|e| panic!("reading {}: {e}", manifest.display()));
    let parsed: toml::Table =
        toml::from_str(&text).unwrap_or_else(|e| panic!("parsing {}: {e}", manifest.display()));
    let package = parsed
        .get("package")
        .and_then(toml::Value::as_table)
        .expect("Cargo.toml has no [package] table");

    // `{:?}` quotes and escapes the value as a Rust string literal.
    let generated: String = FIELDS
        .iter()
        .map(|(constant, key, fallback)| {
            let value = package.get(*key).and_then(toml::Value::as_str).unwrap_or(fallback);
            format!("pub const {constant}: &str = {value:?};\n")
        })
        .collect();

    let out_dir = env::var("OUT_DIR").expect("OUT_DIR not set");
    fs::write(Path::new(&out_dir).join("pkg_info.rs"), generated)
        .expect("writing pkg_info.rs");
}
