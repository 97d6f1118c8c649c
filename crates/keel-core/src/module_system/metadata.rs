//! Executing-nothing inspection of module binaries.
//!
//! Module binaries follow a small export convention so the host can
//! corroborate manifest claims before any module code runs:
//!
//! - every entry-point constructor is exported under the
//!   `module_entry_` prefix (the manifest's `entryPoint` names one of
//!   them);
//! - the binary declares its own version through a marker symbol
//!   `module_version_<version>`, with `.`, `-` and `+` mapped to `_`
//!   (`1.2.0-rc.1` becomes `module_version_1_2_0_rc_1`).
//!
//! Both facts live in the dynamic export table, so reading them is a pure
//! file parse.

use std::collections::HashSet;
use std::path::Path;

use object::{Object, ObjectSymbol};
use semver::Version;

use crate::module_system::error::ModuleSystemError;

pub const ENTRY_SYMBOL_PREFIX: &str = "module_entry_";
pub const VERSION_SYMBOL_PREFIX: &str = "module_version_";

/// What the export table of a module binary declares.
#[derive(Debug, Clone)]
pub struct BinaryMetadata {
    pub file_name: String,
    /// Version decoded from the `module_version_` marker, when present
    pub declared_version: Option<Version>,
    /// Exported constructor symbols (`module_entry_*`)
    pub entry_points: Vec<String>,
    pub exported_symbols: HashSet<String>,
}

impl BinaryMetadata {
    pub fn has_entry_point(&self, symbol: &str) -> bool {
        self.exported_symbols.contains(symbol)
    }
}

/// Encode a version the way module binaries export it.
pub fn version_marker_symbol(version: &Version) -> String {
    let encoded: String = version
        .to_string()
        .chars()
        .map(|c| match c {
            '.' | '-' | '+' => '_',
            other => other,
        })
        .collect();
    format!("{}{}", VERSION_SYMBOL_PREFIX, encoded)
}

/// Decode a `module_version_*` marker back into a version. The first three
/// `_`-separated fields are the numeric triple; anything after becomes the
/// pre-release, so build metadata does not round-trip.
fn decode_version_marker(symbol: &str) -> Option<Version> {
    let encoded = symbol.strip_prefix(VERSION_SYMBOL_PREFIX)?;
    let parts: Vec<&str> = encoded.split('_').collect();
    if parts.len() < 3 {
        return None;
    }
    let mut rendered = format!("{}.{}.{}", parts[0], parts[1], parts[2]);
    if parts.len() > 3 {
        rendered.push('-');
        rendered.push_str(&parts[3..].join("."));
    }
    Version::parse(&rendered).ok()
}

/// Read the export table of the binary at `path`.
///
/// This never maps or executes the binary; it parses the file contents
/// with the `object` crate and collects defined dynamic symbols (falling
/// back to the full symbol table for object formats without one).
pub fn read_binary_metadata(path: &Path) -> Result<BinaryMetadata, ModuleSystemError> {
    let module_id = path
        .file_stem()
        .map(|s| s.to_string_lossy().into_owned())
        .unwrap_or_default();

    let data = std::fs::read(path).map_err(|e| {
        if e.kind() == std::io::ErrorKind::NotFound {
            ModuleSystemError::BinaryMissing {
                module_id: module_id.clone(),
                path: path.to_path_buf(),
            }
        } else {
            ModuleSystemError::BinaryIncoherent {
                module_id: module_id.clone(),
                path: path.to_path_buf(),
                message: format!("unreadable binary: {}", e),
            }
        }
    })?;

    let file = object::File::parse(&*data).map_err(|e| ModuleSystemError::BinaryIncoherent {
        module_id: module_id.clone(),
        path: path.to_path_buf(),
        message: format!("not a recognized binary format: {}", e),
    })?;

    let mut exported_symbols = HashSet::new();
    for symbol in file.dynamic_symbols() {
        if symbol.is_definition() {
            if let Ok(name) = symbol.name() {
                exported_symbols.insert(name.to_string());
            }
        }
    }
    if exported_symbols.is_empty() {
        for symbol in file.symbols() {
            if symbol.is_definition() && symbol.is_global() {
                if let Ok(name) = symbol.name() {
                    exported_symbols.insert(name.to_string());
                }
            }
        }
    }

    let mut entry_points: Vec<String> = exported_symbols
        .iter()
        .filter(|name| name.starts_with(ENTRY_SYMBOL_PREFIX))
        .cloned()
        .collect();
    entry_points.sort();

    let declared_version = exported_symbols
        .iter()
        .filter(|name| name.starts_with(VERSION_SYMBOL_PREFIX))
        .filter_map(|name| decode_version_marker(name))
        .next();

    let file_name = path
        .file_name()
        .map(|s| s.to_string_lossy().into_owned())
        .unwrap_or_default();

    Ok(BinaryMetadata {
        file_name,
        declared_version,
        entry_points,
        exported_symbols,
    })
}
