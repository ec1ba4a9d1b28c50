//! `.metadata` sidecar written into every unpack directory.
//!
//! Text layout, one item per line:
//!
//! ```text
//! <basename of the unpacked file>
//! _compressed            (only when the source was compressed)
//! <child name>
//! ...
//! ```
//!
//! Parsing stops at the first empty line.

use std::fs;
use std::io;
use std::path::Path;

use serde::Serialize;
use thiserror::Error;

pub const MANIFEST_NAME: &str = ".metadata";
const COMPRESSED_MARKER: &str = "_compressed";

#[derive(Debug, Error)]
pub enum ManifestError {
    #[error("I/O error: {0}")]
    Io(#[from] io::Error),
    #[error("manifest has no basename line")]
    MissingBasename,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct Manifest {
    /// File name of the container this directory was unpacked from.
    pub basename:   String,
    /// The container was stored compressed and must be recompressed on pack.
    pub compressed: bool,
    /// Child names in container order.
    pub entries:    Vec<String>,
}

impl Manifest {
    pub fn new(basename: impl Into<String>) -> Self {
        Self { basename: basename.into(), ..Self::default() }
    }

    pub fn push(&mut self, name: impl Into<String>) {
        self.entries.push(name.into());
    }

    pub fn parse(text: &str) -> Result<Self, ManifestError> {
        let mut lines = text.lines().map(|l| l.trim_end_matches('\r'));
        let basename = match lines.next() {
            Some(b) if !b.is_empty() => b.to_owned(),
            _ => return Err(ManifestError::MissingBasename),
        };

        let mut manifest = Self::new(basename);
        for line in lines.take_while(|l| !l.is_empty()) {
            if line == COMPRESSED_MARKER && manifest.entries.is_empty() && !manifest.compressed {
                manifest.compressed = true;
            } else {
                manifest.entries.push(line.to_owned());
            }
        }
        Ok(manifest)
    }

    pub fn render(&self) -> String {
        let mut out = String::with_capacity(self.basename.len() + 16 * (self.entries.len() + 1));
        out.push_str(&self.basename);
        out.push('\n');
        if self.compressed {
            out.push_str(COMPRESSED_MARKER);
            out.push('\n');
        }
        for entry in &self.entries {
            out.push_str(entry);
            out.push('\n');
        }
        out
    }

    /// Load `<dir>/.metadata`.
    pub fn read(dir: &Path) -> Result<Self, ManifestError> {
        let text = fs::read_to_string(dir.join(MANIFEST_NAME))?;
        Self::parse(&text)
    }

    /// Write `<dir>/.metadata`, replacing any previous manifest.
    pub fn write(&self, dir: &Path) -> Result<(), ManifestError> {
        fs::write(dir.join(MANIFEST_NAME), self.render())?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parse_plain_list() {
        let m = Manifest::parse("data.bin\nid0.tm2\nid1.unk\n").unwrap();
        assert_eq!(m.basename, "data.bin");
        assert!(!m.compressed);
        assert_eq!(m.entries, vec!["id0.tm2", "id1.unk"]);
    }

    #[test]
    fn parse_compressed_marker() {
        let m = Manifest::parse("tex.tm2\n_compressed\ntex.tm2.dds\n").unwrap();
        assert!(m.compressed);
        assert_eq!(m.entries, vec!["tex.tm2.dds"]);
    }

    #[test]
    fn empty_line_ends_list() {
        let m = Manifest::parse("a.bin\nid0.bin\n\nstray\n").unwrap();
        assert_eq!(m.entries, vec!["id0.bin"]);
    }

    #[test]
    fn crlf_is_tolerated() {
        let m = Manifest::parse("a.bin\r\n_compressed\r\nid0.bin\r\n").unwrap();
        assert!(m.compressed);
        assert_eq!(m.entries, vec!["id0.bin"]);
    }

    #[test]
    fn missing_basename() {
        assert!(matches!(Manifest::parse(""), Err(ManifestError::MissingBasename)));
        assert!(matches!(Manifest::parse("\nid0.bin"), Err(ManifestError::MissingBasename)));
    }

    #[test]
    fn render_then_parse() {
        let mut m = Manifest::new("movie.ipu");
        m.compressed = true;
        m.push("frame0.dds");
        m.push("frame0.meta");
        assert_eq!(m.render(), "movie.ipu\n_compressed\nframe0.dds\nframe0.meta\n");
        assert_eq!(Manifest::parse(&m.render()).unwrap(), m);
    }

    #[test]
    fn read_write_directory() {
        let dir = tempfile::tempdir().unwrap();
        let mut m = Manifest::new("x.bin");
        m.push("id0.unk");
        m.write(dir.path()).unwrap();
        assert!(dir.path().join(MANIFEST_NAME).exists());
        assert_eq!(Manifest::read(dir.path()).unwrap(), m);
    }

    #[test]
    fn serialises_to_json() {
        let m = Manifest::new("x.bin");
        let json = serde_json::to_string(&m).unwrap();
        assert_eq!(json, r#"{"basename":"x.bin","compressed":false,"entries":[]}"#);
    }
}
