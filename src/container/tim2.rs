//! TIM2 textures carrying a single DDS image.
//!
//! Everything before the image (file header, optional padding to 0x80,
//! picture header and any extended header) is kept verbatim in the
//! `.meta.<name>` sidecar; the image itself is extracted as `<name>.dds`.

use std::fs;
use std::io::{self, Cursor, Read, Write};
use std::path::Path;

use byteorder::{LittleEndian, ReadBytesExt, WriteBytesExt};
use tracing::{debug, warn};

use super::{prefix, sidecar_name, Container, ContainerError};
use crate::archive::PackOptions;
use crate::layout::checked_range;
use crate::manifest::Manifest;

pub const FILE_HEADER_LEN:    usize = 16;
pub const PICTURE_HEADER_LEN: usize = 48;
/// Picture header offset when the file header's format id is nonzero.
pub const EXTENDED_PICTURE_OFFSET: usize = 0x80;
pub const DDS_MAGIC: &[u8; 4] = b"DDS ";

// ── PictureHeader ────────────────────────────────────────────────────────────

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct PictureHeader {
    pub total_size:       u32,
    pub clut_size:        u32,
    pub img_size:         u32,
    pub header_size:      u16,
    pub clut_colors:      u16,
    pub pic_format:       u8,
    pub mipmaps:          u8,
    pub clut_type:        u8,
    pub image_type:       u8,
    pub width:            u16,
    pub height:           u16,
    pub gs_tex0:          u64,
    pub gs_tex1:          u64,
    pub gs_texa_fba_pabe: u32,
    pub gs_tex_clut:      u32,
}

impl PictureHeader {
    pub fn read<R: Read>(r: &mut R) -> io::Result<Self> {
        Ok(Self {
            total_size:       r.read_u32::<LittleEndian>()?,
            clut_size:        r.read_u32::<LittleEndian>()?,
            img_size:         r.read_u32::<LittleEndian>()?,
            header_size:      r.read_u16::<LittleEndian>()?,
            clut_colors:      r.read_u16::<LittleEndian>()?,
            pic_format:       r.read_u8()?,
            mipmaps:          r.read_u8()?,
            clut_type:        r.read_u8()?,
            image_type:       r.read_u8()?,
            width:            r.read_u16::<LittleEndian>()?,
            height:           r.read_u16::<LittleEndian>()?,
            gs_tex0:          r.read_u64::<LittleEndian>()?,
            gs_tex1:          r.read_u64::<LittleEndian>()?,
            gs_texa_fba_pabe: r.read_u32::<LittleEndian>()?,
            gs_tex_clut:      r.read_u32::<LittleEndian>()?,
        })
    }

    pub fn write<W: Write>(&self, w: &mut W) -> io::Result<()> {
        w.write_u32::<LittleEndian>(self.total_size)?;
        w.write_u32::<LittleEndian>(self.clut_size)?;
        w.write_u32::<LittleEndian>(self.img_size)?;
        w.write_u16::<LittleEndian>(self.header_size)?;
        w.write_u16::<LittleEndian>(self.clut_colors)?;
        w.write_u8(self.pic_format)?;
        w.write_u8(self.mipmaps)?;
        w.write_u8(self.clut_type)?;
        w.write_u8(self.image_type)?;
        w.write_u16::<LittleEndian>(self.width)?;
        w.write_u16::<LittleEndian>(self.height)?;
        w.write_u64::<LittleEndian>(self.gs_tex0)?;
        w.write_u64::<LittleEndian>(self.gs_tex1)?;
        w.write_u32::<LittleEndian>(self.gs_texa_fba_pabe)?;
        w.write_u32::<LittleEndian>(self.gs_tex_clut)?;
        Ok(())
    }
}

/// Offset of the picture header and the header itself.
pub fn picture_header(data: &[u8]) -> Result<(usize, PictureHeader), ContainerError> {
    let file_header = prefix(data, FILE_HEADER_LEN, "TIM2 file header")?;
    let offset = if file_header[5] != 0 { EXTENDED_PICTURE_OFFSET } else { FILE_HEADER_LEN };
    let bytes = prefix(data, offset + PICTURE_HEADER_LEN, "TIM2 picture header")?;
    let header = PictureHeader::read(&mut Cursor::new(&bytes[offset..]))?;
    Ok((offset, header))
}

// ── Container ────────────────────────────────────────────────────────────────

pub struct Tim2;

impl Container for Tim2 {
    fn name(&self) -> &'static str { "TIM2" }

    fn unpack(&self, data: &[u8], dir: &Path, manifest: &mut Manifest) -> Result<(), ContainerError> {
        let (offset, pic) = picture_header(data)?;
        if (pic.header_size as usize) < PICTURE_HEADER_LEN {
            return Err(ContainerError::UnsupportedTexture(format!(
                "picture header size {} is below {PICTURE_HEADER_LEN}",
                pic.header_size
            )));
        }
        debug!(
            "TIM2 {}x{} format {} image {} bytes at {:#x}",
            pic.width, pic.height, pic.pic_format, pic.img_size, offset
        );

        let image_at = (offset + pic.header_size as usize) as u64;
        let range = checked_range(image_at, pic.img_size as u64, data.len()).ok_or(
            ContainerError::OutOfBounds {
                container: "TIM2",
                index:     0,
                offset:    image_at,
                size:      pic.img_size as u64,
                len:       data.len(),
            },
        )?;
        let image = &data[range.clone()];
        if !image.starts_with(DDS_MAGIC) {
            return Err(ContainerError::UnsupportedTexture(format!(
                "{}: image is not DDS (magic {})",
                manifest.basename,
                hex::encode(&image[..image.len().min(4)])
            )));
        }

        let dds_name = format!("{}.dds", manifest.basename);
        debug!("writing {} ({} bytes)", dds_name, image.len());
        fs::write(dir.join(&dds_name), image)?;
        fs::write(dir.join(sidecar_name(manifest)), &data[..range.start])?;
        manifest.push(dds_name);
        Ok(())
    }

    fn pack(
        &self,
        dir: &Path,
        manifest: &Manifest,
        _source: &[u8],
        _opts: &PackOptions,
    ) -> Result<Vec<u8>, ContainerError> {
        let mut out = fs::read(dir.join(sidecar_name(manifest)))?;
        let dds = fs::read(dir.join(format!("{}.dds", manifest.basename)))?;
        if !dds.starts_with(DDS_MAGIC) {
            warn!("{}.dds does not start with a DDS magic", manifest.basename);
        }

        let (offset, mut pic) = picture_header(&out)?;
        pic.img_size = dds.len() as u32;
        pic.total_size = (dds.len() + out.len()).saturating_sub(pic.header_size as usize) as u32;
        let mut patched = Vec::with_capacity(PICTURE_HEADER_LEN);
        pic.write(&mut patched)?;
        out[offset..offset + PICTURE_HEADER_LEN].copy_from_slice(&patched);

        out.extend_from_slice(&dds);
        Ok(out)
    }
}
