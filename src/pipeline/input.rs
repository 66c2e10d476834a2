//! Input resolution: validate the user-supplied source directory.
//!
//! Problems with the root itself are fatal and reported before anything
//! else happens. Problems deeper in the tree are the scanner's business and
//! only ever produce warnings.

use crate::error::Tex2ImgError;
use std::path::{Path, PathBuf};
use tracing::debug;

/// Check that `input` is a readable directory and return it unchanged.
///
/// The path is returned as given rather than canonicalised, so warnings and
/// the manifest show source files relative to what the user typed.
pub fn resolve_input_dir(input: &Path) -> Result<PathBuf, Tex2ImgError> {
    let path = input.to_path_buf();

    let meta = match std::fs::metadata(&path) {
        Ok(m) => m,
        Err(e) if e.kind() == std::io::ErrorKind::PermissionDenied => {
            return Err(Tex2ImgError::PermissionDenied { path });
        }
        Err(_) => return Err(Tex2ImgError::InputNotFound { path }),
    };

    if !meta.is_dir() {
        return Err(Tex2ImgError::NotADirectory { path });
    }

    // Listing is what the walk needs, so try it now.
    match std::fs::read_dir(&path) {
        Ok(_) => {}
        Err(e) if e.kind() == std::io::ErrorKind::PermissionDenied => {
            return Err(Tex2ImgError::PermissionDenied { path });
        }
        Err(_) => return Err(Tex2ImgError::InputNotFound { path }),
    }

    debug!("Resolved input directory: {}", path.display());
    Ok(path)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn accepts_directory() {
        let dir = tempfile::tempdir().unwrap();
        let resolved = resolve_input_dir(dir.path()).unwrap();
        assert_eq!(resolved, dir.path());
    }

    #[test]
    fn missing_path_is_not_found() {
        let dir = tempfile::tempdir().unwrap();
        let err = resolve_input_dir(&dir.path().join("nope")).unwrap_err();
        assert!(matches!(err, Tex2ImgError::InputNotFound { .. }), "got: {err:?}");
    }

    #[test]
    fn regular_file_is_rejected() {
        let dir = tempfile::tempdir().unwrap();
        let file = dir.path().join("paper.tex");
        std::fs::write(&file, "$x$").unwrap();
        let err = resolve_input_dir(&file).unwrap_err();
        assert!(matches!(err, Tex2ImgError::NotADirectory { .. }), "got: {err:?}");
    }
}
