//! PTX texture index: a sector of block counts followed by sector-aligned
//! TIM2 images.
//!
//! ```text
//! 0x000  count:u32  blocks:u32 × count  (zero-filled to 0x800)
//! 0x800  entry 0 (blocks[0] × 2048 bytes), entry 1, ...
//! ```

use std::io::Cursor;
use std::path::Path;

use byteorder::{LittleEndian, ReadBytesExt, WriteBytesExt};
use tracing::debug;

use super::{prefix, read_entry, unpack_child, Container, ContainerError};
use crate::archive::PackOptions;
use crate::layout::{checked_range, pad_to, SECTOR};
use crate::manifest::Manifest;

pub struct Ptx;

impl Ptx {
    /// Block count of every entry.
    pub fn block_counts(data: &[u8]) -> Result<Vec<u32>, ContainerError> {
        let mut rdr = Cursor::new(prefix(data, 4, "PTX header")?);
        let count = rdr.read_u32::<LittleEndian>()? as usize;

        let need = count.saturating_mul(4).saturating_add(4);
        if need > SECTOR {
            return Err(ContainerError::Truncated { what: "PTX table", need, have: SECTOR });
        }
        let mut rdr = Cursor::new(prefix(data, need, "PTX table")?);
        rdr.set_position(4);
        (0..count)
            .map(|_| Ok(rdr.read_u32::<LittleEndian>()?))
            .collect()
    }

    pub fn assemble(children: &[Vec<u8>]) -> Result<Vec<u8>, ContainerError> {
        let mut out = Vec::with_capacity(SECTOR + children.iter().map(Vec::len).sum::<usize>());
        out.write_u32::<LittleEndian>(children.len() as u32)?;
        for child in children {
            out.write_u32::<LittleEndian>(child.len().div_ceil(SECTOR) as u32)?;
        }
        if out.len() > SECTOR {
            return Err(ContainerError::Truncated { what: "PTX table", need: out.len(), have: SECTOR });
        }
        out.resize(SECTOR, 0);

        for child in children {
            out.extend_from_slice(child);
            pad_to(&mut out, SECTOR);
        }
        Ok(out)
    }
}

impl Container for Ptx {
    fn name(&self) -> &'static str { "PTX" }

    fn unpack(&self, data: &[u8], dir: &Path, manifest: &mut Manifest) -> Result<(), ContainerError> {
        let blocks = Self::block_counts(data)?;
        debug!("PTX: {} entries", blocks.len());

        let mut offset = SECTOR as u64;
        for (index, &count) in blocks.iter().enumerate() {
            let size = count as u64 * SECTOR as u64;
            let range = checked_range(offset, size, data.len()).ok_or(ContainerError::OutOfBounds {
                container: "PTX",
                index,
                offset,
                size,
                len: data.len(),
            })?;
            unpack_child(&data[range], index, dir, manifest)?;
            offset += size;
        }
        Ok(())
    }

    fn pack(
        &self,
        dir: &Path,
        manifest: &Manifest,
        _source: &[u8],
        opts: &PackOptions,
    ) -> Result<Vec<u8>, ContainerError> {
        let children = manifest
            .entries
            .iter()
            .map(|name| read_entry(dir, name, opts))
            .collect::<Result<Vec<_>, _>>()?;
        Self::assemble(&children)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn assemble_rounds_entries_up_to_whole_blocks() {
        let buf = Ptx::assemble(&[vec![1; 100], vec![2; SECTOR], vec![3; SECTOR + 1]]).unwrap();
        assert_eq!(Ptx::block_counts(&buf).unwrap(), vec![1, 1, 2]);
        assert_eq!(buf.len(), SECTOR * 5);
        assert_eq!(buf[SECTOR], 1);
        assert_eq!(buf[SECTOR + 100], 0);
        assert_eq!(buf[SECTOR * 2], 2);
        assert_eq!(buf[SECTOR * 3], 3);
    }

    #[test]
    fn unpack_splits_on_block_boundaries() {
        let buf = Ptx::assemble(&[vec![7; SECTOR], vec![8; SECTOR * 2]]).unwrap();
        let dir = tempfile::tempdir().unwrap();
        let mut manifest = Manifest::new("t.ptx");
        Ptx.unpack(&buf, dir.path(), &mut manifest).unwrap();

        assert_eq!(manifest.entries, vec!["id0.unk", "id1.unk"]);
        assert_eq!(std::fs::read(dir.path().join("id1.unk")).unwrap(), vec![8; SECTOR * 2]);
    }

    #[test]
    fn block_count_past_end_is_out_of_bounds() {
        let mut buf = Ptx::assemble(&[vec![7; SECTOR]]).unwrap();
        buf[4] = 3;
        let dir = tempfile::tempdir().unwrap();
        let err = Ptx.unpack(&buf, dir.path(), &mut Manifest::new("t.ptx")).unwrap_err();
        assert!(matches!(err, ContainerError::OutOfBounds { container: "PTX", index: 0, .. }));
    }

    #[test]
    fn oversized_count_is_rejected() {
        let mut buf = vec![0u8; SECTOR * 2];
        buf[..4].copy_from_slice(&1000u32.to_le_bytes());
        assert!(matches!(Ptx::block_counts(&buf), Err(ContainerError::Truncated { .. })));
    }
}
