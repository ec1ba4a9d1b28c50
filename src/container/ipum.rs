//! IPUM frame sequences.
//!
//! ```text
//! "ipum" unk1:u32 unk2:u32 frame_count:u32 framerate:u32
//! { "frmj" size:u32 payload[size - 4] trailer[4] } × frame_count
//! ```
//!
//! Each payload is extracted as `frame{i}.dds` with its trailer in
//! `frame{i}.meta`; the 20-byte header goes to `.meta.<name>`.

use std::fs;
use std::io::Cursor;
use std::path::Path;

use byteorder::{ByteOrder, LittleEndian, ReadBytesExt, WriteBytesExt};
use tracing::debug;

use super::{prefix, sidecar_name, Container, ContainerError};
use crate::archive::PackOptions;
use crate::layout::checked_range;
use crate::manifest::Manifest;

pub const HEADER_LEN: usize = 20;
pub const FRAME_TAG: &[u8; 4] = b"frmj";
const TRAILER_LEN: usize = 4;
const FRAME_COUNT_AT: usize = 12;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct IpumHeader {
    pub unk1:        u32,
    pub unk2:        u32,
    pub frame_count: u32,
    pub framerate:   u32,
}

impl IpumHeader {
    pub fn parse(data: &[u8]) -> Result<Self, ContainerError> {
        let mut rdr = Cursor::new(prefix(data, HEADER_LEN, "IPUM header")?);
        rdr.set_position(4);
        Ok(Self {
            unk1:        rdr.read_u32::<LittleEndian>()?,
            unk2:        rdr.read_u32::<LittleEndian>()?,
            frame_count: rdr.read_u32::<LittleEndian>()?,
            framerate:   rdr.read_u32::<LittleEndian>()?,
        })
    }
}

/// One frame record as stored in the container.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Frame<'a> {
    pub payload: &'a [u8],
    pub trailer: &'a [u8],
}

pub struct Ipum;

impl Ipum {
    pub fn frames(data: &[u8]) -> Result<(IpumHeader, Vec<Frame<'_>>), ContainerError> {
        let header = IpumHeader::parse(data)?;
        let mut frames = Vec::with_capacity(header.frame_count.min(4096) as usize);
        let mut pos = HEADER_LEN;

        for index in 0..header.frame_count as usize {
            let record = data.get(pos..pos + 8).ok_or(ContainerError::Truncated {
                what: "IPUM frame header",
                need: pos + 8,
                have: data.len(),
            })?;
            if &record[..4] != FRAME_TAG {
                return Err(ContainerError::UnsupportedTexture(format!(
                    "IPUM frame {index} has tag {}",
                    hex::encode(&record[..4])
                )));
            }
            let size = LittleEndian::read_u32(&record[4..8]) as u64;
            if size < TRAILER_LEN as u64 {
                return Err(ContainerError::UnsupportedTexture(format!(
                    "IPUM frame {index} size {size} is shorter than its trailer"
                )));
            }

            let body_at = (pos + 8) as u64;
            let range = checked_range(body_at, size, data.len()).ok_or(
                ContainerError::OutOfBounds { container: "IPUM", index, offset: body_at, size, len: data.len() },
            )?;
            let body = &data[range.clone()];
            let (payload, trailer) = body.split_at(body.len() - TRAILER_LEN);
            frames.push(Frame { payload, trailer });
            pos = range.end;
        }
        Ok((header, frames))
    }
}

fn trailer_name(frame_name: &str) -> String {
    Path::new(frame_name).with_extension("meta").to_string_lossy().into_owned()
}

impl Container for Ipum {
    fn name(&self) -> &'static str { "IPUM" }

    fn unpack(&self, data: &[u8], dir: &Path, manifest: &mut Manifest) -> Result<(), ContainerError> {
        let (header, frames) = Self::frames(data)?;
        debug!("IPUM: {} frames at {} fps", header.frame_count, header.framerate);

        fs::write(dir.join(sidecar_name(manifest)), &data[..HEADER_LEN])?;
        for (i, frame) in frames.iter().enumerate() {
            let name = format!("frame{i}.dds");
            debug!("writing {name} ({} bytes)", frame.payload.len());
            fs::write(dir.join(&name), frame.payload)?;
            fs::write(dir.join(trailer_name(&name)), frame.trailer)?;
            manifest.push(name);
        }
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
        prefix(&out, HEADER_LEN, "IPUM header sidecar")?;
        let count = (manifest.entries.len() as u32).to_le_bytes();
        out[FRAME_COUNT_AT..FRAME_COUNT_AT + 4].copy_from_slice(&count);

        for name in &manifest.entries {
            let payload = fs::read(dir.join(name))?;
            let trailer = fs::read(dir.join(trailer_name(name)))?;
            out.extend_from_slice(FRAME_TAG);
            out.write_u32::<LittleEndian>((payload.len() + TRAILER_LEN) as u32)?;
            out.extend_from_slice(&payload);
            out.extend_from_slice(&trailer);
        }
        Ok(out)
    }
}
