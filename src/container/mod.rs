//! Container walker.
//!
//! Every recognised container format implements [`Container`]: `unpack`
//! spreads a decompressed buffer over a directory (children, sidecars and a
//! [`Manifest`]), `pack` reassembles the buffer from that directory.
//! [`get_container`] maps a [`FileType`] to its handler, mirroring the codec
//! registry.
//!
//! On disk an unpacked container `name` lives in the sibling directory
//! `_name`; children that are containers themselves get their own `_child`
//! directory inside it, so the tree mirrors the nesting.

pub mod ipum;
pub mod momo;
pub mod ptx;
pub mod tim2;

use std::ffi::OsString;
use std::fs;
use std::io;
use std::path::{Path, PathBuf};

use thiserror::Error;
use tracing::{debug, info};

use crate::archive::PackOptions;
use crate::codec::{compress_aligned, CodecError, BLOCK_ALIGN};
use crate::layout::{pad_to, SECTOR};
use crate::manifest::{Manifest, ManifestError};
use crate::sniff::{identify, FileType, Identified};

pub use ipum::Ipum;
pub use momo::Momo;
pub use ptx::Ptx;
pub use tim2::Tim2;

// ── Errors ───────────────────────────────────────────────────────────────────

#[derive(Debug, Error)]
pub enum ContainerError {
    #[error("I/O error: {0}")]
    Io(#[from] io::Error),
    #[error("codec error: {0}")]
    Codec(#[from] CodecError),
    #[error("manifest error: {0}")]
    Manifest(#[from] ManifestError),
    #[error("{container} entry {index} ({offset:#x}+{size:#x}) exceeds buffer of {len} bytes")]
    OutOfBounds { container: &'static str, index: usize, offset: u64, size: u64, len: usize },
    #[error("{what} truncated: need {need} bytes, have {have}")]
    Truncated { what: &'static str, need: usize, have: usize },
    #[error("unsupported texture: {0}")]
    UnsupportedTexture(String),
    #[error("file too small: {0} bytes")]
    TooSmall(usize),
}

// ── Container trait ──────────────────────────────────────────────────────────

pub trait Container {
    /// Name used in diagnostics and errors.
    fn name(&self) -> &'static str;

    /// Spread `data` over `dir`, recording child names in `manifest`.
    fn unpack(&self, data: &[u8], dir: &Path, manifest: &mut Manifest) -> Result<(), ContainerError>;

    /// Reassemble the uncompressed container from `dir`.
    ///
    /// `source` is the decompressed buffer the directory was unpacked from;
    /// handlers read header flavour from it.
    fn pack(
        &self,
        dir: &Path,
        manifest: &Manifest,
        source: &[u8],
        opts: &PackOptions,
    ) -> Result<Vec<u8>, ContainerError>;
}

pub fn get_container(file_type: FileType) -> Option<Box<dyn Container>> {
    match file_type {
        FileType::Momo => Some(Box::new(Momo)),
        FileType::Ptx  => Some(Box::new(Ptx)),
        FileType::Tim2 => Some(Box::new(Tim2)),
        FileType::Ipu  => Some(Box::new(Ipum)),
        FileType::IconSys | FileType::Ps2Icon | FileType::Unknown => None,
    }
}

// ── Unpack ───────────────────────────────────────────────────────────────────

/// Directory an unpacked `path` lives in: `_<file name>` next to it.
pub fn unpack_dir_for(path: &Path) -> PathBuf {
    let mut name = OsString::from("_");
    if let Some(file_name) = path.file_name() {
        name.push(file_name);
    }
    path.with_file_name(name)
}

/// Unpack an identified buffer into `dir` and write its manifest.
///
/// Returns `false` without touching the filesystem when the type has no
/// container handler.
pub fn unpack_into(id: &Identified, basename: &str, dir: &Path) -> Result<bool, ContainerError> {
    let Some(container) = get_container(id.file_type) else {
        return Ok(false);
    };

    fs::create_dir_all(dir)?;
    info!("unpacking {basename} ({}) into {}", container.name(), dir.display());

    let mut manifest = Manifest::new(basename);
    manifest.compressed = id.is_compressed();
    container.unpack(&id.data, dir, &mut manifest)?;
    manifest.write(dir)?;
    Ok(true)
}

/// Write child `index` verbatim as `id{index}.{ext}` and unpack it when it is
/// a container.
pub(crate) fn unpack_child(
    raw: &[u8],
    index: usize,
    dir: &Path,
    manifest: &mut Manifest,
) -> Result<(), ContainerError> {
    let id = identify(raw.to_vec())?;
    let name = format!("id{index}.{}", id.file_type.extension());
    let path = dir.join(&name);
    debug!("writing {} ({} bytes)", path.display(), raw.len());
    fs::write(&path, raw)?;
    unpack_into(&id, &name, &unpack_dir_for(&path))?;
    manifest.push(name);
    Ok(())
}

// ── Pack ─────────────────────────────────────────────────────────────────────

/// Rebuild the file `dir` was unpacked from and overwrite it in place.
///
/// Nested `_child` directories are packed first so their parents pick up
/// the rebuilt children.  Returns the path of the written file, or `None`
/// when the source no longer identifies as a container (nothing is written
/// then).
pub fn pack_directory(dir: &Path, opts: &PackOptions) -> Result<Option<PathBuf>, ContainerError> {
    let manifest = Manifest::read(dir)?;
    let parent = dir.parent().unwrap_or_else(|| Path::new("."));
    let target = parent.join(&manifest.basename);

    let raw = fs::read(&target)?;
    let raw_len = raw.len();
    let original = identify(raw)?;
    let Some(container) = get_container(original.file_type) else {
        info!("{}: not a container ({}), nothing to pack", target.display(), original.file_type);
        return Ok(None);
    };

    info!("packing {} ({}) from {}", target.display(), container.name(), dir.display());
    let assembled = container.pack(dir, &manifest, &original.data, opts)?;

    if opts.keep_uncompressed && original.file_type == FileType::Momo {
        let dump = with_suffix(&target, ".bin");
        debug!("writing uncompressed copy {}", dump.display());
        fs::write(&dump, &assembled)?;
    }

    let mut out = if manifest.compressed {
        let packed = compress_aligned(&assembled, &opts.compression, BLOCK_ALIGN);
        debug!("compressed {} -> {} bytes", assembled.len(), packed.len());
        packed
    } else {
        assembled
    };
    if original.file_type == FileType::Tim2 && raw_len % SECTOR == 0 {
        pad_to(&mut out, SECTOR);
    }

    if opts.backup {
        backup(&target)?;
    }
    fs::write(&target, &out)?;
    info!("wrote {} ({} bytes)", target.display(), out.len());
    Ok(Some(target))
}

/// Contents of child `name`, repacking `_name` first when it exists.
pub(crate) fn read_entry(dir: &Path, name: &str, opts: &PackOptions) -> Result<Vec<u8>, ContainerError> {
    let path = dir.join(name);
    let nested = unpack_dir_for(&path);
    if nested.is_dir() && pack_directory(&nested, opts)?.is_none() {
        debug!("{} left as is", path.display());
    }
    Ok(fs::read(&path)?)
}

/// Copy `path` to `<path>.bak` unless a backup already exists.
pub fn backup(path: &Path) -> io::Result<Option<PathBuf>> {
    let bak = with_suffix(path, ".bak");
    if bak.exists() {
        return Ok(None);
    }
    fs::copy(path, &bak)?;
    debug!("backed up {} to {}", path.display(), bak.display());
    Ok(Some(bak))
}

fn with_suffix(path: &Path, suffix: &str) -> PathBuf {
    let mut s = path.as_os_str().to_owned();
    s.push(suffix);
    PathBuf::from(s)
}

/// The first `need` bytes of `data`, or [`ContainerError::Truncated`].
pub(crate) fn prefix<'a>(data: &'a [u8], need: usize, what: &'static str) -> Result<&'a [u8], ContainerError> {
    data.get(..need).ok_or(ContainerError::Truncated { what, need, have: data.len() })
}

/// Basename of a sidecar-carrying container, taken from its manifest.
pub(crate) fn sidecar_name(manifest: &Manifest) -> String {
    format!(".meta.{}", manifest.basename)
}
