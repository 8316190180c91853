//! ---
//! cupang_section: "02-versioning"
//! cupang_subsection: "build"
//! cupang_type: "source"
//! cupang_scope: "build"
//! cupang_description: "Emits git and cargo metadata for the version banner."
//! cupang_version: "v0.1.0"
//! cupang_owner: "tbd"
//! ---
use vergen::EmitBuilder;

// No `fail_on_error`: builds from a source tarball have no git metadata.
fn main() -> Result<(), Box<dyn std::error::Error>> {
    EmitBuilder::builder()
        .all_build()
        .all_cargo()
        .all_git()
        .emit()?;
    println!("cargo:rerun-if-changed=build.rs");
    Ok(())
}
