// Zip extraction to disk

use super::Result;
use std::fs::File;
use std::io::BufReader;
use std::path::{Path, PathBuf};
use tracing::{debug, warn};

/// Extract every file entry of a zip archive into `output_dir`
///
/// Entries keep their relative paths. Entries whose names would escape
/// `output_dir` are skipped. Returns the paths written.
pub fn extract_zip(zip_path: &Path, output_dir: &Path) -> Result<Vec<PathBuf>> {
    let reader = BufReader::new(File::open(zip_path)?);
    let mut archive = zip::ZipArchive::new(reader)?;
    let mut extracted = Vec::with_capacity(archive.len());

    for i in 0..archive.len() {
        let mut entry = archive.by_index(i)?;

        let Some(relative) = entry.enclosed_name() else {
            warn!(entry = entry.name(), "Skipping zip entry with unsafe path");
            continue;
        };
        let target = output_dir.join(relative);

        if entry.is_dir() {
            std::fs::create_dir_all(&target)?;
            continue;
        }
        if let Some(parent) = target.parent() {
            std::fs::create_dir_all(parent)?;
        }

        let mut out = File::create(&target)?;
        let bytes = std::io::copy(&mut entry, &mut out)?;
        debug!("Extracted {} ({} bytes)", target.display(), bytes);
        extracted.push(target);
    }

    Ok(extracted)
}
