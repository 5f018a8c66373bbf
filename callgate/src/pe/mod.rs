//! PE image access: byte sources and the export-directory parser.

pub mod parser;
pub mod source;

pub use parser::{Export, PeFile, Section};
pub use source::{DiskImage, ImageSource, MemoryImage};
