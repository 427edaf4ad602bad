// ─── Native Binaries ───
// Canonicalizes library files once downloaded and extracts native binaries into
// a directory keyed by the library set.

use std::ffi::OsStr;
use std::path::{Path, PathBuf};

use tracing::{debug, info};
use uuid::Uuid;

use crate::core::error::{InstallError, InstallResult};

use super::hooks::HookSet;
use super::selector::LibraryFiles;

const BIN_NAMESPACE: Uuid = Uuid::from_u128(0x8df5a464_38de_11ec_aa66_3fd636ee2ed7);

const NATIVE_EXTENSIONS: [&str; 3] = ["so", "dll", "dylib"];

/// Canonicalize every library file in place and populate the natives
/// directory `<bin_dir>/<version>-<uuid>`, returning it.
///
/// The uuid is derived from the canonical paths, so an unchanged library set
/// reuses the same directory.
pub async fn finalize_libraries(
    bin_dir: &Path,
    version: &str,
    files: &mut LibraryFiles,
    hooks: &mut HookSet<'_>,
) -> InstallResult<PathBuf> {
    let mut key = Vec::new();
    for file in files.class_files.iter_mut().chain(files.natives_files.iter_mut()) {
        let canonical = tokio::fs::canonicalize(&*file)
            .await
            .map_err(|e| InstallError::io(&*file, e))?;
        *file = canonical;
        key.extend_from_slice(file.as_os_str().as_encoded_bytes());
    }

    let uuid = Uuid::new_v5(&BIN_NAMESPACE, &key);
    let dir = bin_dir.join(format!("{version}-{}", uuid.hyphenated()));
    tokio::fs::create_dir_all(&dir)
        .await
        .map_err(|e| InstallError::io(&dir, e))?;
    let dir = tokio::fs::canonicalize(&dir)
        .await
        .map_err(|e| InstallError::io(&dir, e))?;

    for file in &files.natives_files {
        match file.extension().and_then(OsStr::to_str) {
            Some("zip" | "jar") => extract_archive(file, &dir).await?,
            _ => {
                let Some(name) = file.file_name().and_then(OsStr::to_str) else {
                    continue;
                };
                let dst = dir.join(strip_so_version(name));
                link_or_copy(file, &dst).await?;
            }
        }
    }

    info!(
        "Natives of {} ready in {:?} ({} archives)",
        version,
        dir,
        files.natives_files.len()
    );
    hooks.extracted_binaries(&dir);
    Ok(dir)
}

/// Extract the shared libraries of an archive, flattened into `dir`.
async fn extract_archive(file: &Path, dir: &Path) -> InstallResult<()> {
    let bytes = tokio::fs::read(file)
        .await
        .map_err(|e| InstallError::io(file, e))?;

    let dir = dir.to_path_buf();
    let archive_file = file.to_path_buf();
    tokio::task::spawn_blocking(move || -> InstallResult<()> {
        let mut archive = zip::ZipArchive::new(std::io::Cursor::new(bytes))?;
        for i in 0..archive.len() {
            let mut entry = archive.by_index(i)?;
            let Some(path) = entry.enclosed_name() else {
                continue;
            };
            let is_native = path
                .extension()
                .and_then(OsStr::to_str)
                .is_some_and(|ext| NATIVE_EXTENSIONS.contains(&ext));
            let Some(name) = path.file_name().filter(|_| is_native) else {
                continue;
            };

            let dst = dir.join(name);
            let mut out = std::fs::File::create(&dst).map_err(|e| InstallError::io(&dst, e))?;
            std::io::copy(&mut entry, &mut out).map_err(|e| InstallError::io(&dst, e))?;
            debug!("Extracted {:?} from {:?}", name, archive_file);
        }
        Ok(())
    })
    .await
    .map_err(|e| InstallError::io(file, std::io::Error::other(e)))?
}

/// `libfoo.so.1.2.3` becomes `libfoo.so`, other names are kept.
fn strip_so_version(name: &str) -> &str {
    match name.find(".so.") {
        Some(pos) if pos > 0 => &name[..pos + 3],
        _ => name,
    }
}

async fn link_or_copy(src: &Path, dst: &Path) -> InstallResult<()> {
    match tokio::fs::symlink_metadata(dst).await {
        Ok(_) => tokio::fs::remove_file(dst)
            .await
            .map_err(|e| InstallError::io(dst, e))?,
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => {}
        Err(e) => return Err(InstallError::io(dst, e)),
    }

    #[cfg(unix)]
    {
        if tokio::fs::symlink(src, dst).await.is_ok() {
            return Ok(());
        }
    }

    tokio::fs::copy(src, dst)
        .await
        .map(|_| ())
        .map_err(|e| InstallError::io(dst, e))
}
