//! ---
//! cupang_section: "03-manifest-store"
//! cupang_subsection: "module"
//! cupang_type: "source"
//! cupang_scope: "code"
//! cupang_description: "Key-path addressable manifest store."
//! cupang_version: "v0.1.0"
//! cupang_owner: "tbd"
//! ---
use crate::section::Section;
use crate::Result;

/// Document written when no manifest exists yet.
pub const DEFAULT_MANIFEST: &str = "\
# cupang-updater manifest
#
# `plugins` is filled in by the scanner. Each plugin record gets one block per
# registered updater; fill in the ones that apply and leave the rest empty.

settings:
  last_update:
  server_folder:
  update_cooldown: 12 # in hour
  keep_removed_plugins: true # false if you want to remove \"removed\" plugins in config
  update_order: # top to bottom
server:
  enable: false # true if you want to auto update the server
  file: server.jar
  type: purpur
  version: 1.19.4 # a version number like 1.20.4
  build_number: # if you change server.version, empty this
  custom_download_url:
  hashes:
    md5:
    sha1:
    sha256:
    sha512:
updater_settings:
plugins:
";

/// Base record for a plugin before updater sections are added.
pub const PLUGIN_RECORD: &str = "\
exclude: false # exclude plugin from update checker
file:
version:
authors:
hashes: # auto generated
  md5:
  sha1:
  sha256:
  sha512:
";

pub fn default_manifest() -> Result<Section> {
    Section::parse(DEFAULT_MANIFEST)
}

pub fn plugin_record() -> Result<Section> {
    Section::parse(PLUGIN_RECORD)
}
