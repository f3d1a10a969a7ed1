// sprig-aio/src/extract.rs
// Unpacks fetched artifacts into a staging directory.

use std::fs::{self, File};
use std::io::{BufReader, Read};
use std::path::{Path, PathBuf};

use bzip2::read::BzDecoder;
use flate2::read::GzDecoder;
use sprig_common::error::{Result, SprigError};
use tracing::{debug, error, warn};
use xz2::read::XzDecoder;
use zip::ZipArchive;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ArchiveKind {
    TarGz,
    TarBz2,
    TarXz,
    Tar,
    Zip,
    /// Not an archive: the artifact is the installable file itself.
    Plain,
}

impl ArchiveKind {
    /// Infers the kind from the file name, then from the leading bytes.
    pub fn detect(path: &Path) -> Self {
        let name = path
            .file_name()
            .map(|n| n.to_string_lossy().to_lowercase())
            .unwrap_or_default();
        if let Some(kind) = Self::from_file_name(&name) {
            return kind;
        }
        match infer::get_from_path(path) {
            Ok(Some(t)) => {
                debug!("Sniffed {} as {}", path.display(), t.mime_type());
                match t.mime_type() {
                    "application/gzip" => ArchiveKind::TarGz,
                    "application/x-bzip2" => ArchiveKind::TarBz2,
                    "application/x-xz" => ArchiveKind::TarXz,
                    "application/x-tar" => ArchiveKind::Tar,
                    "application/zip" => ArchiveKind::Zip,
                    _ => ArchiveKind::Plain,
                }
            }
            Ok(None) => ArchiveKind::Plain,
            Err(e) => {
                warn!("Could not sniff {}: {}", path.display(), e);
                ArchiveKind::Plain
            }
        }
    }

    fn from_file_name(name: &str) -> Option<Self> {
        const SUFFIXES: &[(&str, ArchiveKind)] = &[
            (".tar.gz", ArchiveKind::TarGz),
            (".tgz", ArchiveKind::TarGz),
            (".tar.bz2", ArchiveKind::TarBz2),
            (".tbz2", ArchiveKind::TarBz2),
            (".tbz", ArchiveKind::TarBz2),
            (".tar.xz", ArchiveKind::TarXz),
            (".txz", ArchiveKind::TarXz),
            (".tar", ArchiveKind::Tar),
            (".zip", ArchiveKind::Zip),
        ];
        SUFFIXES
            .iter()
            .find(|(suffix, _)| name.ends_with(suffix))
            .map(|(_, kind)| *kind)
    }
}

/// Extracts `archive` into `target_dir` and returns the artifact root.
///
/// The root is the single top-level directory when the archive has exactly
/// one (GitHub tarballs unpack to `tool-1.0.0/`), otherwise `target_dir`.
/// A non-archive artifact is copied to `target_dir/<plain_name>`.
pub fn extract_artifact(archive: &Path, target_dir: &Path, plain_name: &str) -> Result<PathBuf> {
    let kind = ArchiveKind::detect(archive);
    debug!(
        "Extracting {} ({:?}) into {}",
        archive.display(),
        kind,
        target_dir.display()
    );
    fs::create_dir_all(target_dir)?;

    match kind {
        ArchiveKind::TarGz => unpack_tar(GzDecoder::new(open(archive)?), archive, target_dir)?,
        ArchiveKind::TarBz2 => unpack_tar(BzDecoder::new(open(archive)?), archive, target_dir)?,
        ArchiveKind::TarXz => unpack_tar(XzDecoder::new(open(archive)?), archive, target_dir)?,
        ArchiveKind::Tar => unpack_tar(open(archive)?, archive, target_dir)?,
        ArchiveKind::Zip => unpack_zip(archive, target_dir)?,
        ArchiveKind::Plain => {
            let dest = crate::fs::contained_join(target_dir, Path::new(plain_name))?;
            fs::copy(archive, &dest)?;
            return Ok(target_dir.to_path_buf());
        }
    }
    artifact_root(target_dir)
}

/// [`extract_artifact`] on the blocking pool.
pub async fn extract_artifact_async(
    archive: &Path,
    target_dir: &Path,
    plain_name: &str,
) -> Result<PathBuf> {
    let archive = archive.to_path_buf();
    let target_dir = target_dir.to_path_buf();
    let plain_name = plain_name.to_string();
    tokio::task::spawn_blocking(move || extract_artifact(&archive, &target_dir, &plain_name))
        .await
        .map_err(|e| SprigError::Extract(format!("extraction task failed: {e}")))?
}

fn open(path: &Path) -> Result<BufReader<File>> {
    Ok(BufReader::new(File::open(path)?))
}

fn unpack_tar<R: Read>(reader: R, archive_path: &Path, target_dir: &Path) -> Result<()> {
    let mut archive = tar::Archive::new(reader);
    archive.set_preserve_permissions(true);
    archive.set_overwrite(true);
    let entries = archive.entries().map_err(|e| {
        SprigError::Extract(format!("{} is not a tar archive: {e}", archive_path.display()))
    })?;
    for entry in entries {
        let mut entry = entry.map_err(|e| {
            SprigError::Extract(format!(
                "Error reading TAR entry from {}: {e}",
                archive_path.display()
            ))
        })?;
        let entry_path = entry
            .path()
            .map(|p| p.display().to_string())
            .unwrap_or_else(|_| "<invalid>".to_string());
        let unpacked = entry.unpack_in(target_dir).map_err(|e| {
            SprigError::Extract(format!("Failed to unpack '{entry_path}': {e}"))
        })?;
        if !unpacked {
            error!(
                "Entry '{}' in {} escapes the extraction directory",
                entry_path,
                archive_path.display()
            );
            return Err(SprigError::Extract(format!(
                "Unsafe path '{entry_path}' in {}",
                archive_path.display()
            )));
        }
    }
    Ok(())
}

fn unpack_zip(archive_path: &Path, target_dir: &Path) -> Result<()> {
    let mut archive = ZipArchive::new(open(archive_path)?)
        .map_err(|e| SprigError::Extract(format!("Failed to open ZIP: {e}")))?;
    for i in 0..archive.len() {
        let mut file = archive
            .by_index(i)
            .map_err(|e| SprigError::Extract(format!("Failed to access ZIP entry: {e}")))?;
        let relative = file.enclosed_name().ok_or_else(|| {
            SprigError::Extract(format!("Unsafe path '{}' in ZIP", file.name()))
        })?;
        let outpath = target_dir.join(relative);
        if file.is_dir() {
            fs::create_dir_all(&outpath)?;
            continue;
        }
        if let Some(parent) = outpath.parent() {
            fs::create_dir_all(parent)?;
        }
        let mut outfile = File::create(&outpath)?;
        std::io::copy(&mut file, &mut outfile)
            .map_err(|e| SprigError::Extract(format!("Failed to write ZIP entry: {e}")))?;
        #[cfg(unix)]
        if let Some(mode) = file.unix_mode() {
            crate::fs::set_permissions(&outpath, mode & 0o7777)?;
        }
    }
    Ok(())
}

fn artifact_root(target_dir: &Path) -> Result<PathBuf> {
    let mut entries = fs::read_dir(target_dir)?
        .filter_map(|e| e.ok())
        .map(|e| e.path())
        .collect::<Vec<_>>();
    if entries.len() == 1 && entries[0].is_dir() {
        if let Some(root) = entries.pop() {
            debug!("Artifact root is {}", root.display());
            return Ok(root);
        }
    }
    Ok(target_dir.to_path_buf())
}
