//! Output placement: the output directory, the PNGs in it, and the manifest.

use crate::config::EquationKind;
use crate::error::Tex2ImgError;
use crate::output::ManifestEntry;
use std::path::{Path, PathBuf};
use tracing::debug;

/// File name of the manifest written next to the images.
pub const MANIFEST_FILE: &str = "manifest.json";

/// Create `dir` if needed and prove it is writable.
///
/// Existing contents are left alone. Writability is probed by creating
/// (and immediately dropping) a temp file inside the directory.
pub fn prepare_output_dir(dir: &Path) -> Result<(), Tex2ImgError> {
    let unwritable = |source| Tex2ImgError::OutputDirUnwritable {
        path: dir.to_path_buf(),
        source,
    };

    std::fs::create_dir_all(dir).map_err(unwritable)?;
    tempfile::Builder::new()
        .prefix(".tex2img-probe")
        .tempfile_in(dir)
        .map_err(unwritable)?;

    debug!("Output directory ready: {}", dir.display());
    Ok(())
}

/// `block_3.png`, `inline_1.png`, …
pub fn image_file_name(kind: EquationKind, ordinal: usize) -> String {
    format!("{kind}_{ordinal}.png")
}

/// Move a rendered image to `dest`, overwriting any previous file there.
///
/// The scratch directory may sit on another filesystem, in which case the
/// rename fails; the image is then copied to a sibling temp name and
/// renamed into place so `dest` never holds a partial PNG.
pub fn place_image(rendered: &Path, dest: &Path) -> std::io::Result<()> {
    if std::fs::rename(rendered, dest).is_ok() {
        return Ok(());
    }

    let tmp_path = dest.with_extension("png.tmp");
    std::fs::copy(rendered, &tmp_path)
        .and_then(|_| std::fs::rename(&tmp_path, dest))
        .inspect_err(|_| {
            let _ = std::fs::remove_file(&tmp_path);
        })
}

/// Atomically write `manifest.json` into `dir`.
pub async fn write_manifest(dir: &Path, entries: &[ManifestEntry]) -> Result<PathBuf, Tex2ImgError> {
    let path = dir.join(MANIFEST_FILE);
    let failed = |source| Tex2ImgError::ManifestWriteFailed {
        path: path.clone(),
        source,
    };

    let json = serde_json::to_vec_pretty(entries)
        .map_err(|e| failed(std::io::Error::other(e)))?;

    // Atomic write: write to temp, then rename
    let tmp_path = path.with_extension("json.tmp");
    let written = match tokio::fs::write(&tmp_path, &json).await {
        Ok(()) => tokio::fs::rename(&tmp_path, &path).await,
        Err(e) => Err(e),
    };
    if let Err(e) = written {
        let _ = tokio::fs::remove_file(&tmp_path).await;
        return Err(failed(e));
    }

    debug!("Wrote manifest with {} entries", entries.len());
    Ok(path)
}
