use anyhow::{Context, Result};
use std::fs::File;
use std::path::Path;

/// Extract a zip archive into `dest`, skipping entries under any of the
/// `excludes` prefixes. Existing files are overwritten.
pub fn extract_archive(archive_path: &Path, dest: &Path, excludes: &[String]) -> Result<usize> {
    log::debug!("Extracting {:?} to {:?}", archive_path, dest);

    let file = File::open(archive_path)
        .with_context(|| format!("Failed to open archive {:?}", archive_path))?;
    let mut archive = zip::ZipArchive::new(file)
        .with_context(|| format!("Failed to read archive {:?}", archive_path))?;

    let excluded: Vec<&str> = excludes
        .iter()
        .map(|e| e.trim_start_matches(['/', '\\']))
        .filter(|e| !e.is_empty())
        .collect();

    std::fs::create_dir_all(dest)?;
    let mut written = 0;

    for i in 0..archive.len() {
        let mut entry = archive.by_index(i)?;
        let name = entry.name().trim_start_matches(['/', '\\']).to_string();

        // Skip excluded paths (usually META-INF/)
        if excluded.iter().any(|e| name.starts_with(e)) {
            continue;
        }

        let relative = match entry.enclosed_name() {
            Some(p) => p,
            None => {
                log::warn!("Skipping unsafe archive entry {:?} in {:?}", entry.name(), archive_path);
                continue;
            }
        };
        let outpath = dest.join(relative);

        if entry.is_dir() {
            std::fs::create_dir_all(&outpath)?;
            continue;
        }

        if let Some(p) = outpath.parent() {
            std::fs::create_dir_all(p)?;
        }
        let mut outfile = File::create(&outpath)
            .with_context(|| format!("Failed to create {:?}", outpath))?;
        std::io::copy(&mut entry, &mut outfile)?;
        written += 1;
    }

    log::debug!("Extracted {} files from {:?}", written, archive_path);
    Ok(written)
}
