use std::collections::HashSet;
use std::io::Write;
use std::path::Path;

use anyhow::{Context, Result};
use futures::TryStreamExt;
use tagdrive_core::models::FileInfo;
use tagdrive_storage::{ObjectVariant, Storage};

/// Sanitize filename for archive entry to prevent path traversal.
/// Extracts only the base name (strips path components like `../`).
fn sanitize_archive_filename(filename: &str, fallback: &str) -> String {
    Path::new(filename)
        .file_name()
        .and_then(|n| n.to_str())
        .filter(|s| !s.is_empty() && *s != "." && *s != "..")
        .unwrap_or(fallback)
        .to_string()
}

/// Entry name unique within the archive; repeats get the file id appended.
fn unique_entry_name(file: &FileInfo, used: &mut HashSet<String>) -> String {
    let name = sanitize_archive_filename(&file.filename, &format!("unnamed_{}", file.id));
    if used.insert(name.clone()) {
        return name;
    }

    let path = Path::new(&name);
    let stem = path.file_stem().and_then(|s| s.to_str()).unwrap_or(&name);
    let candidate = match path.extension().and_then(|e| e.to_str()) {
        Some(ext) => format!("{} ({}).{}", stem, file.id, ext),
        None => format!("{} ({})", name, file.id),
    };
    used.insert(candidate.clone());
    candidate
}

async fn read_original(storage: &dyn Storage, file: &FileInfo) -> Result<Vec<u8>> {
    storage
        .get(file.id, ObjectVariant::Original)
        .await
        .with_context(|| format!("Failed to open file {}", file.id))?
        .try_fold(Vec::with_capacity(file.size as usize), |mut acc, chunk| async move {
            acc.extend_from_slice(&chunk);
            Ok(acc)
        })
        .await
        .with_context(|| format!("Failed to read file {}", file.id))
}

/// Create a ZIP archive with the original bytes of `files`, named by their filenames.
/// Objects that can't be read are logged and left out.
pub async fn create_zip_archive(storage: &dyn Storage, files: &[FileInfo]) -> Result<Vec<u8>> {
    use zip::write::{FileOptions, ZipWriter};
    use zip::CompressionMethod;

    let mut buffer = Vec::new();
    {
        let mut zip = ZipWriter::new(std::io::Cursor::new(&mut buffer));
        let options = FileOptions::default()
            .compression_method(CompressionMethod::Deflated)
            .unix_permissions(0o644);
        let mut used = HashSet::new();

        for file in files {
            let file_data = match read_original(storage, file).await {
                Ok(data) => data,
                Err(e) => {
                    tracing::warn!(error = %e, file_id = file.id, "Skipping file in archive");
                    continue;
                }
            };

            let entry_name = unique_entry_name(file, &mut used);

            zip.start_file(&entry_name, options)
                .with_context(|| format!("Failed to add file to ZIP: {}", entry_name))?;
            zip.write_all(&file_data)
                .with_context(|| format!("Failed to write file data to ZIP: {}", entry_name))?;
        }

        zip.finish().context("Failed to finalize ZIP archive")?;
    }

    tracing::debug!(files = files.len(), size_bytes = buffer.len(), "ZIP archive built");
    Ok(buffer)
}
