//! File type detection.
//!
//! [`identify`] matches the leading magic of a buffer.  Containers that the
//! game stores compressed are recognised by their magic showing through the
//! stream two bytes in (the first literal words follow the initial flag
//! word); those are decompressed and identified again, so the result always
//! describes the innermost buffer.
//!
//! When nothing matches at offset 0, two fallbacks apply to buffers larger
//! than a sector plus a little payload:
//! - `TIM2` at offset 2048 marks a PTX texture index;
//! - `TIM2` anywhere else marks a compressed container whose first words got
//!   folded into back-references.  A buffer that fails to decode in this
//!   last-resort path is simply unknown.

use std::fmt;

use serde::Serialize;
use tracing::{debug, trace};

use crate::codec::{decompress, CodecError};
use crate::layout::SECTOR;

pub const MAGIC_MOMO:     &[u8; 4] = b"MOMO";
pub const MAGIC_TIM2:     &[u8; 4] = b"TIM2";
pub const MAGIC_IPUM:     &[u8; 4] = b"ipum";
pub const MAGIC_ICON_SYS: &[u8; 4] = b"PS2D";
pub const MAGIC_PS2_ICON: &[u8; 4] = &[0x00, 0x00, 0x01, 0x00];

/// Compression layers peeled before giving up.
pub const MAX_LAYERS: usize = 8;

const PTX_MIN_LEN: usize = SECTOR + 512;

// ── FileType ─────────────────────────────────────────────────────────────────

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum FileType {
    /// MOMO block archive.
    Momo,
    /// TIM2 texture container.
    Tim2,
    /// PTX texture index (sector-aligned TIM2 list).
    Ptx,
    /// IPUM frame container.
    Ipu,
    /// Memory card `icon.sys`.
    IconSys,
    /// PS2 icon model.
    Ps2Icon,
    Unknown,
}

impl FileType {
    /// Extension used when writing a child of this type to disk.
    pub fn extension(self) -> &'static str {
        match self {
            FileType::Momo    => "bin",
            FileType::Tim2    => "tm2",
            FileType::Ptx     => "ptx",
            FileType::Ipu     => "ipu",
            FileType::IconSys => "icon.sys",
            FileType::Ps2Icon => "icn",
            FileType::Unknown => "unk",
        }
    }

    /// Whether a container handler exists for this type.
    pub fn is_container(self) -> bool {
        matches!(self, FileType::Momo | FileType::Tim2 | FileType::Ptx | FileType::Ipu)
    }
}

impl fmt::Display for FileType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.extension())
    }
}

// ── Identified ───────────────────────────────────────────────────────────────

/// Result of [`identify`]: the innermost buffer and what it is.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Identified {
    pub file_type: FileType,
    /// Fully decompressed contents (the input itself when `layers == 0`).
    pub data:      Vec<u8>,
    /// Compression layers removed to reach `data`.
    pub layers:    usize,
}

impl Identified {
    pub fn is_compressed(&self) -> bool {
        self.layers > 0
    }
}

/// Classify `data`, decompressing wrapped containers on the way.
///
/// Only a stream whose shifted magic announces a container can fail: a
/// corrupt back-reference there is reported as [`CodecError`].
pub fn identify(data: Vec<u8>) -> Result<Identified, CodecError> {
    identify_layer(data, 0)
}

fn identify_layer(data: Vec<u8>, layers: usize) -> Result<Identified, CodecError> {
    if data.len() < 4 {
        return Ok(unknown(data, layers));
    }

    if shows_shifted_magic(&data) {
        let inner = &data[2..data.len().min(6)];
        if inner == MAGIC_TIM2 || inner == MAGIC_MOMO {
            trace!("compressed {} container", String::from_utf8_lossy(inner));
            if layers >= MAX_LAYERS {
                return Ok(unknown(data, layers));
            }
            let decompressed = decompress(&data)?;
            return peel(data, decompressed, layers);
        }
        return Ok(unknown(data, layers));
    }

    let magic: &[u8] = &data[..4];
    let file_type = if magic == MAGIC_MOMO {
        Some(FileType::Momo)
    } else if magic == MAGIC_TIM2 {
        Some(FileType::Tim2)
    } else if magic == MAGIC_IPUM {
        Some(FileType::Ipu)
    } else if magic == MAGIC_ICON_SYS {
        Some(FileType::IconSys)
    } else if magic == MAGIC_PS2_ICON {
        Some(FileType::Ps2Icon)
    } else {
        None
    };
    if let Some(file_type) = file_type {
        return Ok(Identified { file_type, data, layers });
    }

    if data.len() > PTX_MIN_LEN {
        if &data[SECTOR..SECTOR + 4] == MAGIC_TIM2 {
            return Ok(Identified { file_type: FileType::Ptx, data, layers });
        }
        if layers < MAX_LAYERS && data.windows(4).any(|w| w == MAGIC_TIM2) {
            match decompress(&data) {
                Ok(decompressed) => return peel(data, decompressed, layers),
                Err(e) => debug!("embedded TIM2 magic but not a compressed stream: {e}"),
            }
        }
    }

    debug!("unrecognised magic {}", hex::encode(magic));
    Ok(unknown(data, layers))
}

/// Byte 2..4 look like the start of `MOMO` or `TIM2`.
fn shows_shifted_magic(data: &[u8]) -> bool {
    (data[2] == b'M' && data[3] == b'O' && data[0] != b'M')
        || (data[2] == b'T' && data[3] == b'I')
}

fn peel(original: Vec<u8>, decompressed: Vec<u8>, layers: usize) -> Result<Identified, CodecError> {
    if decompressed.is_empty() {
        return Ok(unknown(original, layers));
    }
    debug!(
        "layer {}: {} bytes -> {} bytes",
        layers + 1,
        original.len(),
        decompressed.len()
    );
    identify_layer(decompressed, layers + 1)
}

fn unknown(data: Vec<u8>, layers: usize) -> Identified {
    Identified { file_type: FileType::Unknown, data, layers }
}
