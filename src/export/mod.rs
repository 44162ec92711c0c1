//! Document export.
//!
//! The [`Assembler`] walks the procedure and drives a [`DocumentSink`], the
//! seam to whatever writes the actual file:
//! - [`DocxSink`] produces a Word document through `docx-rs`
//! - [`OutlineSink`] records blocks in memory and renders them as Markdown

mod assembler;
mod docx;
mod labels;
mod markdown;
mod outline;

use std::io;
use std::path::{Path, PathBuf};

use thiserror::Error;

pub use assembler::{
    display_size_inches, display_width_inches, Assembler, AssemblyReport, SectionOutcome,
};
pub use docx::DocxSink;
pub use labels::Labels;
pub use outline::{Block, OutlineSink};

/// Errors raised while assembling or serializing a document
#[derive(Error, Debug)]
pub enum ExportError {
    #[error("nothing to export: add at least one step first")]
    NoSteps,

    #[error("image could not be decoded: {0}")]
    DecodeImage(#[source] image::ImageError),

    #[error("failed to write image {}: {source}", path.display())]
    WriteImage {
        path: PathBuf,
        source: image::ImageError,
    },

    #[error("failed to read image {}: {source}", path.display())]
    ReadImage { path: PathBuf, source: io::Error },

    #[error("label template '{name}' is invalid: {message}")]
    Template { name: &'static str, message: String },

    #[error("document writer failed: {0}")]
    Sink(String),
}

/// Horizontal alignment of a block
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Align {
    Left,
    Center,
    Right,
}

/// Black-box document writer.
///
/// Heading level 0 is the document title; 1 and 2 are section headings.
pub trait DocumentSink {
    /// File extension of the serialized output, without the dot
    fn extension(&self) -> &'static str;

    fn add_heading(&mut self, text: &str, level: u8, align: Align) -> Result<(), ExportError>;

    /// An empty `text` adds a blank paragraph
    fn add_paragraph(&mut self, text: &str, align: Align) -> Result<(), ExportError>;

    /// Embed the image file at `path`, scaled to the given size
    fn add_image(
        &mut self,
        path: &Path,
        width_inches: f64,
        height_inches: f64,
        align: Align,
    ) -> Result<(), ExportError>;

    /// Serialize the document
    fn finish(self) -> Result<Vec<u8>, ExportError>
    where
        Self: Sized;
}

/// Output formats offered by `export`
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, clap::ValueEnum)]
pub enum ExportFormat {
    #[default]
    Docx,
    Markdown,
}

/// A serialized document ready to be written out
#[derive(Debug)]
pub struct Export {
    /// `<title>.<extension>`
    pub file_name: String,
    pub bytes: Vec<u8>,
    pub report: AssemblyReport,
}

/// Download name for a document: the title with path separators replaced
pub fn export_file_name(title: &str, extension: &str) -> String {
    let stem: String = title
        .trim()
        .chars()
        .map(|c| if matches!(c, '/' | '\\') { '_' } else { c })
        .collect();
    format!("{stem}.{extension}")
}
