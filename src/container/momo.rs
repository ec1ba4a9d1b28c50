//! MOMO block archive.
//!
//! ```text
//! compact:  "MOMO" count:u32          { offset:u32 size:u32 } × count
//! legacy:   "MOMO" 0:u32  count:u64   { offset:u64 size:u64 } × count
//! ```
//!
//! The flavour is told apart by the u32 at offset 4, which is zero only in
//! the legacy form.
//! The table is zero-padded to 64 bytes and every entry starts on a 64-byte
//! boundary; recorded sizes exclude the padding.

use std::io::Cursor;
use std::path::Path;

use byteorder::{ByteOrder, LittleEndian, ReadBytesExt, WriteBytesExt};
use tracing::debug;

use super::{prefix, read_entry, unpack_child, Container, ContainerError};
use crate::archive::PackOptions;
use crate::layout::{checked_range, pad_to, ENTRY_ALIGN};
use crate::manifest::Manifest;
use crate::sniff::MAGIC_MOMO;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Layout {
    Compact,
    Legacy,
}

impl Layout {
    pub fn detect(data: &[u8]) -> Layout {
        match data.get(4..8) {
            Some(word) if LittleEndian::read_u32(word) != 0 => Layout::Compact,
            _ => Layout::Legacy,
        }
    }

    /// Width of the count and of each table field.
    fn field(self) -> usize {
        match self {
            Layout::Compact => 4,
            Layout::Legacy  => 8,
        }
    }

    fn table_start(self) -> usize {
        self.field() * 2
    }
}

pub struct Momo;

impl Momo {
    /// `(offset, size)` of every entry, straight from the table.
    pub fn entries(data: &[u8]) -> Result<(Layout, Vec<(u64, u64)>), ContainerError> {
        let layout = Layout::detect(data);
        let start = layout.table_start();
        let mut rdr = Cursor::new(prefix(data, start, "MOMO header")?);
        rdr.set_position(4);
        let count = match layout {
            Layout::Compact => rdr.read_u32::<LittleEndian>()? as usize,
            Layout::Legacy  => {
                rdr.set_position(8);
                rdr.read_u64::<LittleEndian>()? as usize
            }
        };

        let table_len = count.saturating_mul(layout.field() * 2).saturating_add(start);
        let mut rdr = Cursor::new(prefix(data, table_len, "MOMO table")?);
        rdr.set_position(start as u64);

        let mut entries = Vec::with_capacity(count.min(4096));
        for _ in 0..count {
            let entry = match layout {
                Layout::Compact => (
                    rdr.read_u32::<LittleEndian>()? as u64,
                    rdr.read_u32::<LittleEndian>()? as u64,
                ),
                Layout::Legacy => (rdr.read_u64::<LittleEndian>()?, rdr.read_u64::<LittleEndian>()?),
            };
            entries.push(entry);
        }
        Ok((layout, entries))
    }

    /// Lay `children` out behind a `layout` table.
    pub fn assemble(layout: Layout, children: &[Vec<u8>]) -> Result<Vec<u8>, ContainerError> {
        let field = layout.field();
        let mut out = Vec::new();
        out.extend_from_slice(MAGIC_MOMO);
        match layout {
            Layout::Compact => out.write_u32::<LittleEndian>(children.len() as u32)?,
            Layout::Legacy  => {
                out.write_u32::<LittleEndian>(0)?;
                out.write_u64::<LittleEndian>(children.len() as u64)?;
            }
        }
        let table_at = out.len();
        out.resize(table_at + children.len() * field * 2, 0);
        pad_to(&mut out, ENTRY_ALIGN);

        let mut table = Vec::with_capacity(children.len() * field * 2);
        for child in children {
            let offset = out.len() as u64;
            out.extend_from_slice(child);
            pad_to(&mut out, ENTRY_ALIGN);
            match layout {
                Layout::Compact => {
                    table.write_u32::<LittleEndian>(offset as u32)?;
                    table.write_u32::<LittleEndian>(child.len() as u32)?;
                }
                Layout::Legacy => {
                    table.write_u64::<LittleEndian>(offset)?;
                    table.write_u64::<LittleEndian>(child.len() as u64)?;
                }
            }
        }
        out[table_at..table_at + table.len()].copy_from_slice(&table);
        Ok(out)
    }
}

impl Container for Momo {
    fn name(&self) -> &'static str { "MOMO" }

    fn unpack(&self, data: &[u8], dir: &Path, manifest: &mut Manifest) -> Result<(), ContainerError> {
        let (layout, entries) = Self::entries(data)?;
        debug!("MOMO {:?}: {} entries", layout, entries.len());

        for (index, &(offset, size)) in entries.iter().enumerate() {
            let range = checked_range(offset, size, data.len()).ok_or(ContainerError::OutOfBounds {
                container: "MOMO",
                index,
                offset,
                size,
                len: data.len(),
            })?;
            debug!("entry {index}: offset {offset:#x} size {size}");
            unpack_child(&data[range], index, dir, manifest)?;
        }
        Ok(())
    }

    fn pack(
        &self,
        dir: &Path,
        manifest: &Manifest,
        source: &[u8],
        opts: &PackOptions,
    ) -> Result<Vec<u8>, ContainerError> {
        let children = manifest
            .entries
            .iter()
            .map(|name| read_entry(dir, name, opts))
            .collect::<Result<Vec<_>, _>>()?;
        Self::assemble(Layout::detect(source), &children)
    }
}
