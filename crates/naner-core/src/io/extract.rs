//! Archive extraction module
//!
//! Dispatches on file extension to a format-specific strategy, then
//! normalizes the result by removing a single redundant top-level folder.

use std::fs::{self, File};
use std::io::{self, BufReader, Read};
use std::path::{Path, PathBuf};
use std::process::{Command, Stdio};
use std::time::Duration;

use naner_schema::VendorName;
use thiserror::Error;
use wait_timeout::ChildExt;
use zip::ZipArchive;

use crate::config::{TarBackend, ToolConfig};

/// Wrapper directories an administrative install may nest its payload under.
const INSTALLER_WRAPPERS: &[&str] = &["Files", "PFiles", "PFiles64", "Program Files"];

#[derive(Error, Debug)]
pub enum ExtractError {
    #[error("IO error: {0}")]
    Io(#[from] io::Error),

    #[error("Unsupported archive format: {0}")]
    UnsupportedFormat(String),

    #[error("Archive error: {0}")]
    Archive(String),

    #[error("Missing archive tool: {} not found", path.display())]
    MissingTool { path: PathBuf },

    #[error("{tool} exited with code {code:?}: {stderr}")]
    ToolFailed {
        tool: String,
        code: Option<i32>,
        stderr: String,
    },

    #[error("{tool} timed out after {secs}s")]
    ToolTimeout { tool: String, secs: u64 },
}

/// Outer compression layer of a compressed tarball.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Compression {
    Gzip,
    Xz,
    Zstd,
    Bzip2,
}

/// Container formats recognized by extension.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ArchiveFormat {
    Zip,
    /// Installer package unpacked through an administrative install.
    Installer,
    CompressedTar(Compression),
    Tar,
    SevenZip,
    /// Anything else is copied into place as-is.
    Binary,
}

/// Detect archive format from a file name, including compound extensions.
#[allow(clippy::case_sensitive_file_extension_comparisons)]
pub fn detect_format(file_name: &str) -> ArchiveFormat {
    let name = file_name.to_lowercase();

    if name.ends_with(".zip") {
        ArchiveFormat::Zip
    } else if name.ends_with(".msi") {
        ArchiveFormat::Installer
    } else if name.ends_with(".tar.gz") || name.ends_with(".tgz") {
        ArchiveFormat::CompressedTar(Compression::Gzip)
    } else if name.ends_with(".tar.xz") || name.ends_with(".txz") {
        ArchiveFormat::CompressedTar(Compression::Xz)
    } else if name.ends_with(".tar.zst") || name.ends_with(".tzst") {
        ArchiveFormat::CompressedTar(Compression::Zstd)
    } else if name.ends_with(".tar.bz2") || name.ends_with(".tbz2") || name.ends_with(".tbz") {
        ArchiveFormat::CompressedTar(Compression::Bzip2)
    } else if name.ends_with(".tar") {
        ArchiveFormat::Tar
    } else if name.ends_with(".7z") {
        ArchiveFormat::SevenZip
    } else {
        ArchiveFormat::Binary
    }
}

/// Format-dispatching extractor.
///
/// Holds no per-invocation state, so one instance is shared across a batch.
#[derive(Debug, Clone)]
pub struct Extractor {
    tar_backend: TarBackend,
    archive_tool: PathBuf,
    installer: String,
    tool_timeout: Duration,
}

impl Extractor {
    /// `archive_tool` is the full path of the archive-utility executable,
    /// which normally lives inside another vendor's directory.
    pub fn new(tools: &ToolConfig, archive_tool: PathBuf) -> Self {
        Self {
            tar_backend: tools.tar_backend,
            archive_tool,
            installer: tools.installer.clone(),
            tool_timeout: Duration::from_secs(tools.timeout_secs),
        }
    }

    pub fn archive_tool(&self) -> &Path {
        &self.archive_tool
    }

    /// Unpack `archive` into `dest` and flatten a single top-level folder.
    ///
    /// `dest` is created if needed. Nothing is cleaned up on failure.
    ///
    /// # Errors
    ///
    /// Returns [`ExtractError`] for corrupt archives, missing or failing
    /// external tools, and filesystem errors during relocation.
    pub fn extract(
        &self,
        archive: &Path,
        dest: &Path,
        vendor: &VendorName,
        installer_args: Option<&[String]>,
    ) -> Result<(), ExtractError> {
        let file_name = archive
            .file_name()
            .and_then(|n| n.to_str())
            .ok_or_else(|| ExtractError::Archive("Invalid archive filename".to_string()))?;
        let format = detect_format(file_name);
        tracing::debug!("Extracting {vendor} ({format:?}) into {}", dest.display());

        fs::create_dir_all(dest)?;
        match format {
            ArchiveFormat::Zip => extract_zip(archive, dest)?,
            ArchiveFormat::Installer => self.extract_installer(archive, dest, installer_args)?,
            ArchiveFormat::CompressedTar(compression) => match self.tar_backend {
                TarBackend::Native => extract_compressed_tar_native(archive, dest, compression)?,
                TarBackend::External => self.extract_compressed_tar_external(archive, dest)?,
            },
            ArchiveFormat::Tar => extract_tar(BufReader::new(File::open(archive)?), dest)?,
            ArchiveFormat::SevenZip => {
                self.require_archive_tool()?;
                self.run_archive_tool(archive, dest)?;
            }
            ArchiveFormat::Binary => {
                fs::copy(archive, dest.join(file_name))?;
            }
        }

        if flatten_single_root(dest)? {
            tracing::debug!("Flattened single top-level folder for {vendor}");
        }
        Ok(())
    }

    fn require_archive_tool(&self) -> Result<(), ExtractError> {
        if self.archive_tool.is_file() {
            Ok(())
        } else {
            Err(ExtractError::MissingTool {
                path: self.archive_tool.clone(),
            })
        }
    }

    /// Two sequential tool invocations: strip the compression layer, then
    /// un-tar. The intermediate tarball is removed whatever the outcome.
    fn extract_compressed_tar_external(&self, archive: &Path, dest: &Path) -> Result<(), ExtractError> {
        self.require_archive_tool()?;

        let mut intermediate_name = archive.file_name().unwrap_or_default().to_os_string();
        intermediate_name.push(".unpacked");
        let intermediate = archive.with_file_name(intermediate_name);

        let result = (|| -> Result<(), ExtractError> {
            fs::create_dir_all(&intermediate)?;
            self.run_archive_tool(archive, &intermediate)?;
            let tarball = fs::read_dir(&intermediate)?
                .filter_map(Result::ok)
                .map(|e| e.path())
                .find(|p| p.is_file())
                .ok_or_else(|| {
                    ExtractError::Archive("decompression produced no tarball".to_string())
                })?;
            self.run_archive_tool(&tarball, dest)
        })();

        if let Err(e) = fs::remove_dir_all(&intermediate) {
            if e.kind() != io::ErrorKind::NotFound {
                tracing::warn!("Failed to remove {}: {e}", intermediate.display());
            }
        }
        result
    }

    fn run_archive_tool(&self, archive: &Path, out_dir: &Path) -> Result<(), ExtractError> {
        let mut command = Command::new(&self.archive_tool);
        command
            .arg("x")
            .arg(archive)
            .arg(format!("-o{}", out_dir.display()))
            .arg("-y");
        self.run_tool(command, "archive tool")
    }

    fn extract_installer(
        &self,
        archive: &Path,
        dest: &Path,
        installer_args: Option<&[String]>,
    ) -> Result<(), ExtractError> {
        let installer = which::which(&self.installer).map_err(|_| ExtractError::MissingTool {
            path: PathBuf::from(&self.installer),
        })?;
        let archive = std::path::absolute(archive)?;
        let target = std::path::absolute(dest)?;

        let mut command = Command::new(installer);
        command
            .arg("/a")
            .arg(&archive)
            .arg("/qn")
            .arg(format!("TARGETDIR={}", target.display()));
        if let Some(args) = installer_args {
            command.args(args);
        }
        self.run_tool(command, &self.installer)?;

        relocate_installer_payload(&target)?;
        Ok(())
    }

    fn run_tool(&self, mut command: Command, tool: &str) -> Result<(), ExtractError> {
        tracing::debug!("Running {command:?}");
        let mut child = command
            .stdin(Stdio::null())
            .stdout(Stdio::null())
            .stderr(Stdio::piped())
            .spawn()
            .map_err(|e| match e.kind() {
                io::ErrorKind::NotFound => ExtractError::MissingTool {
                    path: PathBuf::from(command.get_program()),
                },
                _ => ExtractError::Io(e),
            })?;

        match child.wait_timeout(self.tool_timeout)? {
            Some(status) if status.success() => Ok(()),
            Some(status) => {
                let mut stderr = String::new();
                if let Some(mut pipe) = child.stderr.take() {
                    let _ = pipe.read_to_string(&mut stderr);
                }
                Err(ExtractError::ToolFailed {
                    tool: tool.to_string(),
                    code: status.code(),
                    stderr: stderr.trim().to_string(),
                })
            }
            None => {
                let _ = child.kill();
                let _ = child.wait();
                Err(ExtractError::ToolTimeout {
                    tool: tool.to_string(),
                    secs: self.tool_timeout.as_secs(),
                })
            }
        }
    }
}

fn extract_compressed_tar_native(
    archive: &Path,
    dest: &Path,
    compression: Compression,
) -> Result<(), ExtractError> {
    let reader = BufReader::new(File::open(archive)?);
    match compression {
        Compression::Gzip => extract_tar(flate2::read::GzDecoder::new(reader), dest),
        Compression::Zstd => extract_tar(zstd::stream::read::Decoder::new(reader)?, dest),
        Compression::Xz | Compression::Bzip2 => Err(ExtractError::UnsupportedFormat(format!(
            "{compression:?} tarballs need the external archive tool (tools.tar_backend = \"external\")"
        ))),
    }
}

/// Extract a tar stream. The `tar` crate refuses entries that escape `dest`.
fn extract_tar<R: Read>(reader: R, dest: &Path) -> Result<(), ExtractError> {
    let mut archive = tar::Archive::new(reader);
    archive.unpack(dest)?;
    Ok(())
}

/// Extract a zip archive
fn extract_zip(archive_path: &Path, dest_dir: &Path) -> Result<(), ExtractError> {
    let file = File::open(archive_path)?;
    let mut archive = ZipArchive::new(file).map_err(|e| ExtractError::Archive(e.to_string()))?;

    for i in 0..archive.len() {
        let mut file = archive
            .by_index(i)
            .map_err(|e| ExtractError::Archive(e.to_string()))?;
        // Sanitize path to prevent Zip Slip
        let Some(relative_path) = file.enclosed_name() else {
            continue;
        };
        let absolute_path = dest_dir.join(&relative_path);

        if file.is_dir() {
            fs::create_dir_all(&absolute_path)?;
            continue;
        }
        if let Some(parent) = absolute_path.parent() {
            fs::create_dir_all(parent)?;
        }

        let mut outfile = File::create(&absolute_path)?;
        io::copy(&mut file, &mut outfile)?;

        #[cfg(unix)]
        if let Some(mode) = file.unix_mode() {
            use std::os::unix::fs::PermissionsExt;
            fs::set_permissions(&absolute_path, fs::Permissions::from_mode(mode))?;
        }
    }

    Ok(())
}

/// If `dir` holds exactly one entry and it is a directory, move that
/// directory's contents up and remove it. Returns whether it flattened.
///
/// Only one level is removed; deeper single-folder nesting is left alone.
pub fn flatten_single_root(dir: &Path) -> io::Result<bool> {
    let entries: Vec<_> = fs::read_dir(dir)?.collect::<Result<_, _>>()?;
    if entries.len() != 1 || !entries[0].file_type()?.is_dir() {
        return Ok(false);
    }

    // Rename first so a child with the wrapper's own name cannot collide.
    let wrapper = dir.join(format!(".flatten-{}", entries[0].file_name().to_string_lossy()));
    fs::rename(entries[0].path(), &wrapper)?;
    merge_tree(&wrapper, dir)?;
    fs::remove_dir(&wrapper)?;
    Ok(true)
}

/// Move everything under `from` into `to`, replacing files that already exist
/// and merging directories that exist on both sides. `from` is left empty.
pub fn merge_tree(from: &Path, to: &Path) -> io::Result<()> {
    fs::create_dir_all(to)?;
    for entry in fs::read_dir(from)? {
        let entry = entry?;
        let source = entry.path();
        let target = to.join(entry.file_name());

        match fs::symlink_metadata(&target) {
            Ok(existing) if existing.is_dir() && entry.file_type()?.is_dir() => {
                merge_tree(&source, &target)?;
                fs::remove_dir(&source)?;
            }
            Ok(existing) => {
                if existing.is_dir() {
                    fs::remove_dir_all(&target)?;
                } else {
                    fs::remove_file(&target)?;
                }
                fs::rename(&source, &target)?;
            }
            Err(e) if e.kind() == io::ErrorKind::NotFound => fs::rename(&source, &target)?,
            Err(e) => return Err(e),
        }
    }
    Ok(())
}

/// Move the payload of an administrative install out of its
/// `Files/<ProductName>` nesting up to `dest`, and drop the package copy
/// the installer leaves at the root.
pub fn relocate_installer_payload(dest: &Path) -> io::Result<()> {
    for entry in fs::read_dir(dest)? {
        let path = entry?.path();
        let is_package = path
            .extension()
            .is_some_and(|ext| ext.eq_ignore_ascii_case("msi"));
        if is_package && path.is_file() {
            fs::remove_file(&path)?;
        }
    }

    let Some(wrapper_name) = INSTALLER_WRAPPERS
        .iter()
        .find(|name| dest.join(name).is_dir())
    else {
        return Ok(());
    };

    let staged = dest.join(".installer-payload");
    fs::rename(dest.join(wrapper_name), &staged)?;

    // A lone product folder inside the wrapper is the real payload root.
    let children: Vec<_> = fs::read_dir(&staged)?.collect::<Result<_, _>>()?;
    let payload = match children.as_slice() {
        [only] if only.file_type()?.is_dir() => only.path(),
        _ => staged.clone(),
    };

    merge_tree(&payload, dest)?;
    fs::remove_dir_all(&staged)?;
    Ok(())
}
