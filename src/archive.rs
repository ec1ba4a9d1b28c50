//! High-level API: the operations the command line exposes.
//!
//! ```no_run
//! use bizrepack::archive::{self, PackOptions};
//!
//! // Spread `data.bin` over `_data.bin/`.
//! archive::unpack_file("data.bin")?;
//! // ... edit the extracted files, then rebuild `data.bin` in place.
//! archive::pack("_data.bin", &PackOptions::default())?;
//! # Ok::<(), Box<dyn std::error::Error>>(())
//! ```

use std::fs;
use std::path::{Path, PathBuf};

use serde::Serialize;
use tracing::{debug, info};

use crate::codec::{compress_aligned, decompress, CompressOptions, BLOCK_ALIGN};
use crate::container::{
    pack_directory, unpack_dir_for, unpack_into, ContainerError, Ipum, Momo, Ptx,
};
use crate::sniff::{identify, FileType, Identified};

/// Files shorter than this are not worth classifying.
pub const MIN_FILE_LEN: usize = 16;

// ── PackOptions ───────────────────────────────────────────────────────────────

/// Configuration for [`pack`].
#[derive(Debug, Clone)]
pub struct PackOptions {
    /// Encoder parameters used when a container was stored compressed.
    pub compression:       CompressOptions,
    /// Copy every overwritten file to `<file>.bak` once.
    pub backup:            bool,
    /// Also dump the uncompressed MOMO assembly to `<file>.bin`.
    pub keep_uncompressed: bool,
}

impl Default for PackOptions {
    fn default() -> Self {
        Self {
            compression:       CompressOptions::default(),
            backup:            true,
            keep_uncompressed: false,
        }
    }
}

// ── FileInfo ──────────────────────────────────────────────────────────────────

/// Summary returned by [`inspect`].
#[derive(Debug, Clone, Serialize)]
pub struct FileInfo {
    pub path:      PathBuf,
    pub file_type: FileType,
    /// Compression layers wrapped around the container.
    pub layers:    usize,
    /// Size on disk.
    pub raw_size:  usize,
    /// Size after removing every compression layer.
    pub size:      usize,
    /// Children listed in the container header, when it parses.
    pub entries:   Option<usize>,
}

impl FileInfo {
    fn from_identified(path: &Path, raw_size: usize, id: &Identified) -> Self {
        let entries = match id.file_type {
            FileType::Momo => Momo::entries(&id.data).ok().map(|(_, e)| e.len()),
            FileType::Ptx  => Ptx::block_counts(&id.data).ok().map(|b| b.len()),
            FileType::Ipu  => Ipum::frames(&id.data).ok().map(|(_, f)| f.len()),
            FileType::Tim2 => Some(1),
            _              => None,
        };
        FileInfo {
            path: path.to_owned(),
            file_type: id.file_type,
            layers: id.layers,
            raw_size,
            size: id.data.len(),
            entries,
        }
    }
}

// ── Operations ────────────────────────────────────────────────────────────────

fn read_checked(path: &Path) -> Result<Vec<u8>, ContainerError> {
    let data = fs::read(path)?;
    if data.len() < MIN_FILE_LEN {
        return Err(ContainerError::TooSmall(data.len()));
    }
    Ok(data)
}

/// Unpack `path` into `_<name>` next to it.
///
/// Returns the directory written, or `None` when the file is not a
/// container (nothing is written then).
pub fn unpack_file<P: AsRef<Path>>(path: P) -> Result<Option<PathBuf>, ContainerError> {
    let path = path.as_ref();
    let data = read_checked(path)?;
    let id = identify(data)?;
    info!("{}: {} ({} compression layers)", path.display(), id.file_type, id.layers);

    let basename = path
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_default();
    let dir = unpack_dir_for(path);
    if unpack_into(&id, &basename, &dir)? {
        Ok(Some(dir))
    } else {
        info!("{}: not a container, nothing to unpack", path.display());
        Ok(None)
    }
}

/// Rebuild a file from its unpack directory.
///
/// `path` may be the `_<name>` directory itself or the file it was unpacked
/// from.  Returns the path of the rebuilt file, or `None` when that file is
/// not a container (it is left untouched then).
pub fn pack<P: AsRef<Path>>(path: P, opts: &PackOptions) -> Result<Option<PathBuf>, ContainerError> {
    let path = path.as_ref();
    let dir = if path.is_dir() { path.to_owned() } else { unpack_dir_for(path) };
    pack_directory(&dir, opts)
}

/// Identify `path` without writing anything.
pub fn inspect<P: AsRef<Path>>(path: P) -> Result<FileInfo, ContainerError> {
    let path = path.as_ref();
    let data = fs::read(path)?;
    let raw_size = data.len();
    let id = identify(data)?;
    Ok(FileInfo::from_identified(path, raw_size, &id))
}

/// Decode one raw compressed stream from `input` into `output`.
pub fn decompress_file(input: &Path, output: &Path) -> Result<usize, ContainerError> {
    let data = fs::read(input)?;
    let out = decompress(&data)?;
    debug!("decompressed {} -> {} bytes", data.len(), out.len());
    fs::write(output, &out)?;
    Ok(out.len())
}

/// Encode `input` as one block-aligned stream into `output`.
pub fn compress_file(input: &Path, output: &Path, opts: &CompressOptions) -> Result<usize, ContainerError> {
    let data = fs::read(input)?;
    let out = compress_aligned(&data, opts, BLOCK_ALIGN);
    debug!("compressed {} -> {} bytes", data.len(), out.len());
    fs::write(output, &out)?;
    Ok(out.len())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_back_up_and_use_full_window() {
        let opts = PackOptions::default();
        assert!(opts.backup);
        assert!(!opts.keep_uncompressed);
        assert_eq!(opts.compression, CompressOptions::default());
    }

    #[test]
    fn tiny_file_is_rejected() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("tiny.bin");
        fs::write(&path, b"MOMO").unwrap();
        assert!(matches!(unpack_file(&path), Err(ContainerError::TooSmall(4))));
    }

    #[test]
    fn unknown_file_is_left_alone() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("blob.dat");
        fs::write(&path, vec![0x42; 64]).unwrap();
        assert_eq!(unpack_file(&path).unwrap(), None);
        assert!(!dir.path().join("_blob.dat").exists());
    }

    #[test]
    fn raw_codec_files() {
        let dir = tempfile::tempdir().unwrap();
        let plain = dir.path().join("plain");
        let packed = dir.path().join("plain.biz");
        let back = dir.path().join("plain.dec");
        let data: Vec<u8> = (0..5000u32).map(|i| (i % 251) as u8).collect();
        fs::write(&plain, &data).unwrap();

        let n = compress_file(&plain, &packed, &CompressOptions::default()).unwrap();
        assert_eq!(n % BLOCK_ALIGN, 0);
        decompress_file(&packed, &back).unwrap();

        let restored = fs::read(&back).unwrap();
        assert_eq!(&restored[..data.len()], &data[..]);
        assert!(restored[data.len()..].iter().all(|&b| b == 0));
    }

    #[test]
    fn inspect_reports_sizes() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("t.tm2");
        let mut data = b"TIM2".to_vec();
        data.resize(40, 0);
        fs::write(&path, &data).unwrap();

        let info = inspect(&path).unwrap();
        assert_eq!(info.file_type, FileType::Tim2);
        assert_eq!(info.layers, 0);
        assert_eq!(info.raw_size, 40);
        assert_eq!(info.size, 40);
        let json = serde_json::to_value(&info).unwrap();
        assert_eq!(json["file_type"], "tim2");
    }
}
