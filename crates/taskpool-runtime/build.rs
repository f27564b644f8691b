//! Build script for taskpool-runtime
//!
//! Produces the compile-time pool defaults:
//! 1. Start with library defaults
//! 2. If TP_CONFIG_RS names a file, read its `pub const` overrides
//! 3. Merge overrides over defaults (user wins, unknown names warn)
//! 4. Write OUT_DIR/tp_merged_config.rs
//!
//! Runtime environment variables still override these (see config/mod.rs).

use std::collections::BTreeMap;
use std::env;
use std::fs;
use std::path::Path;

/// (name, type, default)
const CONFIG_PARAMS: &[(&str, &str, &str)] = &[
    ("NUM_WORKERS", "usize", "4"),
    ("RECOLLECTOR_CAPACITY", "usize", "64"),
    ("PREWARM_RESULTS", "usize", "0"),
    ("WORKER_STACK_SIZE", "usize", "2 * 1024 * 1024"),
    ("DEBUG_LOGGING", "bool", "false"),
];

fn main() {
    let out_dir = env::var("OUT_DIR").expect("OUT_DIR not set");
    let dest_path = Path::new(&out_dir).join("tp_merged_config.rs");

    let mut config: BTreeMap<&str, String> = CONFIG_PARAMS
        .iter()
        .map(|(name, _, default)| (*name, default.to_string()))
        .collect();

    let user_path = env::var("TP_CONFIG_RS").ok();
    if let Some(path) = &user_path {
        println!("cargo:rerun-if-changed={}", path);
        match fs::read_to_string(path) {
            Ok(content) => {
                for unknown in merge_overrides(&content, &mut config) {
                    println!("cargo:warning=Unknown config parameter: {}", unknown);
                }
                println!("cargo:warning=Using custom config: {}", path);
            }
            Err(e) => println!("cargo:warning=Failed to read TP_CONFIG_RS ({}): {}", path, e),
        }
    }
    println!("cargo:rerun-if-env-changed=TP_CONFIG_RS");

    fs::write(&dest_path, render(&config, user_path.is_some()))
        .expect("Failed to write merged config");
}

/// Apply `pub const NAME: TYPE = VALUE;` lines from `content`.
///
/// Returns the names that are not known parameters.
fn merge_overrides(content: &str, config: &mut BTreeMap<&str, String>) -> Vec<String> {
    let mut unknown = Vec::new();
    for line in content.lines().map(str::trim) {
        let Some((name, value)) = parse_const_line(line) else {
            continue;
        };
        match CONFIG_PARAMS.iter().find(|(known, _, _)| *known == name) {
            Some((known, _, _)) => {
                config.insert(known, value);
            }
            None => unknown.push(name),
        }
    }
    unknown
}

/// Parse `pub const NAME: TYPE = VALUE;` into (NAME, VALUE)
fn parse_const_line(line: &str) -> Option<(String, String)> {
    let rest = line.strip_prefix("pub const ")?.trim();
    let (name, rest) = rest.split_once(':')?;
    let (_, value) = rest.split_once('=')?;
    let value = value.trim().trim_end_matches(';').trim();
    if value.is_empty() {
        return None;
    }
    Some((name.trim().to_string(), value.to_string()))
}

fn render(config: &BTreeMap<&str, String>, custom: bool) -> String {
    let mut output = String::from("// Auto-generated by build.rs - do not edit\n");
    if custom {
        output.push_str("// Library defaults merged with TP_CONFIG_RS\n");
    }
    output.push('\n');
    for (name, ty, _) in CONFIG_PARAMS {
        output.push_str(&format!("pub const {}: {} = {};\n", name, ty, config[name]));
    }
    output
}
