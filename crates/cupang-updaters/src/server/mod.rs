//! ---
//! cupang_section: "08-release-sources"
//! cupang_subsection: "module"
//! cupang_type: "source"
//! cupang_scope: "code"
//! cupang_description: "Server binary updaters."
//! cupang_version: "v0.1.0"
//! cupang_owner: "tbd"
//! ---
pub mod paper;
pub mod purpur;
pub mod serverjars;

pub use paper::PaperUpdater;
pub use purpur::PurpurUpdater;
pub use serverjars::ServerjarsUpdater;
