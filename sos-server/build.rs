//! Captures the compiler version at build time so `sos version --verbose`
//! can report the toolchain the binary was produced with.

use std::process::Command;

fn main() {
    println!("cargo:rerun-if-changed=build.rs");

    let rustc = std::env::var("RUSTC").unwrap_or_else(|_| "rustc".to_string());
    let version = Command::new(rustc)
        .arg("--version")
        .output()
        .ok()
        .and_then(|output| String::from_utf8(output.stdout).ok())
        .map(|line| line.trim().to_string())
        .filter(|line| !line.is_empty())
        .unwrap_or_else(|| "rustc (version unknown)".to_string());

    println!("cargo:rustc-env=SOS_BUILD_RUSTC={}", version);
}
