//! Embeds the gadget chart version this crate is built against.
//!
//! `IG_CHART_VERSION` (with or without a leading `v`) is read from the build
//! environment and exposed to the crate under the same name.

const DEV_CHART_VERSION: &str = "1.0.0-dev";

fn main() {
    println!("cargo:rerun-if-env-changed=IG_CHART_VERSION");

    let version = std::env::var("IG_CHART_VERSION").unwrap_or_default();
    let version = version.trim().trim_start_matches('v');
    let version = if version.is_empty() {
        DEV_CHART_VERSION
    } else {
        version
    };
    println!("cargo:rustc-env=IG_CHART_VERSION={version}");
}
