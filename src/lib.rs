pub mod archive;
pub mod codec;
pub mod container;
pub mod layout;
pub mod manifest;
pub mod sniff;

pub use archive::{FileInfo, PackOptions};
pub use codec::{compress, compress_aligned, decompress, CodecError, CompressOptions};
pub use container::{get_container, Container, ContainerError};
pub use manifest::{Manifest, ManifestError};
pub use sniff::{identify, FileType, Identified};
