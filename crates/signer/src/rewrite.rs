//! The two signing strategies: in-memory rewrite and
//! extract-then-recompress

use crate::manifest::{find_manifest_entry, sinf_target_path, METADATA_ENTRY};
use crate::SignRequest;
use ipaforge_errors::{Error, SigningError};
use std::fs::File;
use std::io::{Cursor, Read, Seek, Write};
use std::path::Path;
use walkdir::WalkDir;
use zip::write::SimpleFileOptions;
use zip::{ZipArchive, ZipWriter};

fn zip_err(e: zip::result::ZipError) -> Error {
    SigningError::MalformedArchive(e.to_string()).into()
}

/// Rewrite the archive through a memory buffer.
///
/// Entries are raw-copied without recompression; only the sinf target
/// and the root metadata document are (re)written.
pub(crate) fn sign_in_memory(request: &SignRequest) -> Result<(), Error> {
    let bytes =
        std::fs::read(&request.archive).map_err(|e| Error::io_with_path(&e, &request.archive))?;
    let mut archive = ZipArchive::new(Cursor::new(bytes)).map_err(zip_err)?;

    let names: Vec<String> = archive.file_names().map(str::to_owned).collect();
    let manifest_entry = find_manifest_entry(names.iter().map(String::as_str))
        .ok_or(SigningError::ManifestMissing)?;
    let manifest_bytes = read_entry(&mut archive, &manifest_entry)?;
    let sinf_target = sinf_target_path(&manifest_entry, &manifest_bytes)?;

    let mut out = ZipWriter::new(Cursor::new(Vec::new()));
    let options = SimpleFileOptions::default();

    for i in 0..archive.len() {
        let entry = archive.by_index_raw(i).map_err(zip_err)?;
        let name = entry.name().to_string();
        if name == sinf_target || name == METADATA_ENTRY {
            continue; // replaced below
        }
        out.raw_copy_file(entry).map_err(zip_err)?;
    }

    out.start_file(sinf_target.as_str(), options).map_err(zip_err)?;
    out.write_all(&request.sinf)?;
    out.start_file(METADATA_ENTRY, options).map_err(zip_err)?;
    out.write_all(&request.metadata_doc)?;

    let cursor = out.finish().map_err(zip_err)?;
    std::fs::write(&request.output, cursor.into_inner())
        .map_err(|e| Error::io_with_path(&e, &request.output))?;
    Ok(())
}

/// Extract to a scratch directory, patch on disk, recompress.
///
/// Bounds peak memory for large archives at the cost of a full
/// recompression pass.
pub(crate) fn sign_extracted(request: &SignRequest) -> Result<(), Error> {
    let scratch = tempfile::tempdir()?;
    extract_archive(&request.archive, scratch.path())?;

    let names = relative_file_names(scratch.path());
    let manifest_entry = find_manifest_entry(names.iter().map(String::as_str))
        .ok_or(SigningError::ManifestMissing)?;
    let manifest_path = scratch.path().join(&manifest_entry);
    let manifest_bytes =
        std::fs::read(&manifest_path).map_err(|e| Error::io_with_path(&e, manifest_path))?;
    let sinf_target = sinf_target_path(&manifest_entry, &manifest_bytes)?;

    let sinf_path = scratch.path().join(&sinf_target);
    if let Some(parent) = sinf_path.parent() {
        std::fs::create_dir_all(parent).map_err(|e| Error::io_with_path(&e, parent))?;
    }
    std::fs::write(&sinf_path, &request.sinf)
        .map_err(|e| Error::io_with_path(&e, sinf_path.clone()))?;
    std::fs::write(scratch.path().join(METADATA_ENTRY), &request.metadata_doc)?;

    compress_dir(scratch.path(), &request.output)
}

fn read_entry<R: Read + Seek>(archive: &mut ZipArchive<R>, name: &str) -> Result<Vec<u8>, Error> {
    let mut entry = archive.by_name(name).map_err(zip_err)?;
    let mut buf = Vec::with_capacity(usize::try_from(entry.size()).unwrap_or(0));
    entry.read_to_end(&mut buf)?;
    Ok(buf)
}

fn extract_archive(archive_path: &Path, dest: &Path) -> Result<(), Error> {
    let file = File::open(archive_path).map_err(|e| Error::io_with_path(&e, archive_path))?;
    let mut archive = ZipArchive::new(file).map_err(zip_err)?;

    for i in 0..archive.len() {
        let mut entry = archive.by_index(i).map_err(zip_err)?;
        let Some(relative) = entry.enclosed_name() else {
            continue;
        };
        let outpath = dest.join(relative);

        if entry.name().ends_with('/') {
            std::fs::create_dir_all(&outpath).map_err(|e| Error::io_with_path(&e, outpath))?;
        } else {
            if let Some(parent) = outpath.parent() {
                std::fs::create_dir_all(parent).map_err(|e| Error::io_with_path(&e, parent))?;
            }
            let mut outfile =
                File::create(&outpath).map_err(|e| Error::io_with_path(&e, outpath.clone()))?;
            std::io::copy(&mut entry, &mut outfile)
                .map_err(|e| Error::io_with_path(&e, outpath.clone()))?;

            #[cfg(unix)]
            {
                use std::os::unix::fs::PermissionsExt;
                if let Some(mode) = entry.unix_mode() {
                    let _ = std::fs::set_permissions(
                        &outpath,
                        std::fs::Permissions::from_mode(mode),
                    );
                }
            }
        }
    }
    Ok(())
}

/// Relative file paths under `root`, forward-slashed like zip entries.
fn relative_file_names(root: &Path) -> Vec<String> {
    WalkDir::new(root)
        .sort_by_file_name()
        .into_iter()
        .filter_map(Result::ok)
        .filter(|e| e.file_type().is_file())
        .filter_map(|e| {
            e.path()
                .strip_prefix(root)
                .ok()
                .map(|p| p.to_string_lossy().replace('\\', "/"))
        })
        .collect()
}

fn compress_dir(root: &Path, output: &Path) -> Result<(), Error> {
    let out_file = File::create(output).map_err(|e| Error::io_with_path(&e, output))?;
    let mut out = ZipWriter::new(out_file);

    for entry in WalkDir::new(root).sort_by_file_name() {
        let entry = entry.map_err(|e| Error::internal(format!("scratch walk failed: {e}")))?;
        if entry.path() == root {
            continue;
        }
        let relative = entry
            .path()
            .strip_prefix(root)
            .map_err(|e| Error::internal(format!("scratch path escape: {e}")))?
            .to_string_lossy()
            .replace('\\', "/");

        let mut options = SimpleFileOptions::default();
        #[cfg(unix)]
        {
            use std::os::unix::fs::PermissionsExt;
            if let Ok(meta) = entry.metadata() {
                options = options.unix_permissions(meta.permissions().mode());
            }
        }

        if entry.file_type().is_dir() {
            out.add_directory(relative, options).map_err(zip_err)?;
        } else {
            out.start_file(relative, options).map_err(zip_err)?;
            let mut file = File::open(entry.path())
                .map_err(|e| Error::io_with_path(&e, entry.path()))?;
            std::io::copy(&mut file, &mut out)
                .map_err(|e| Error::io_with_path(&e, entry.path()))?;
        }
    }

    out.finish().map_err(zip_err)?;
    Ok(())
}
