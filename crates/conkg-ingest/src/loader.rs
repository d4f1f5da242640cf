use std::path::Path;

use conkg_core::error::{ConkgError, Result};

use crate::inventory::file_type;

pub const SUPPORTED_EXTENSIONS: [&str; 7] = ["txt", "md", "csv", "tsv", "log", "json", "eml"];

pub fn is_supported(path: &Path) -> bool {
    let name = path.file_name().map(|n| n.to_string_lossy()).unwrap_or_default();
    SUPPORTED_EXTENSIONS.contains(&file_type(&name).as_str())
}

/// Read a text-like file. Invalid UTF-8 is replaced rather than rejected.
pub fn load_text(path: &Path) -> Result<String> {
    if !is_supported(path) {
        return Err(ConkgError::Unsupported(format!(
            "{} is not a supported text file",
            path.display()
        )));
    }
    let bytes = std::fs::read(path)?;
    Ok(String::from_utf8_lossy(&bytes).into_owned())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_load_text_variants() {
        let dir = tempfile::tempdir().unwrap();
        let notes = dir.path().join("Notes.MD");
        std::fs::write(&notes, "# Site notes").unwrap();
        assert_eq!(load_text(&notes).unwrap(), "# Site notes");

        let latin = dir.path().join("old.txt");
        std::fs::write(&latin, [b'c', b'a', b'f', 0xE9]).unwrap();
        assert_eq!(load_text(&latin).unwrap(), "caf\u{FFFD}");

        let pdf = dir.path().join("plan.pdf");
        std::fs::write(&pdf, "%PDF").unwrap();
        assert!(matches!(load_text(&pdf), Err(ConkgError::Unsupported(_))));
    }
}
