//! In-memory sink that records blocks and renders them as Markdown.
//!
//! Used for `show` previews and `export --format markdown`. Images cannot be
//! embedded in Markdown text, so they are rendered as a short italic note.

use std::fs;
use std::path::Path;

use super::markdown;
use super::{Align, DocumentSink, ExportError};

/// One recorded document block
#[derive(Debug, Clone, PartialEq)]
pub enum Block {
    Heading {
        level: u8,
        text: String,
        align: Align,
    },
    Paragraph {
        text: String,
        align: Align,
    },
    Image {
        file_name: String,
        width_inches: f64,
        height_inches: f64,
        align: Align,
    },
}

#[derive(Debug, Default)]
pub struct OutlineSink {
    blocks: Vec<Block>,
}

impl OutlineSink {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn blocks(&self) -> &[Block] {
        &self.blocks
    }

    /// Render the recorded blocks as Markdown
    pub fn to_markdown(&self) -> String {
        let mut output = String::new();
        for block in &self.blocks {
            match block {
                Block::Heading { level, text, .. } => {
                    // The title is level 0, so shift everything down one
                    output.push_str(&markdown::heading(level + 1, &markdown::escape(text)));
                }
                Block::Paragraph { text, .. } if text.is_empty() => {}
                Block::Paragraph { text, .. } => {
                    output.push_str(&markdown::paragraph(&markdown::escape(text)));
                }
                Block::Image {
                    width_inches,
                    height_inches,
                    ..
                } => {
                    let note = format!("image, {width_inches:.2} in × {height_inches:.2} in");
                    output.push_str(&markdown::paragraph(&markdown::italic(&note)));
                }
            }
        }
        output
    }
}

impl DocumentSink for OutlineSink {
    fn extension(&self) -> &'static str {
        "md"
    }

    fn add_heading(&mut self, text: &str, level: u8, align: Align) -> Result<(), ExportError> {
        self.blocks.push(Block::Heading {
            level,
            text: text.to_string(),
            align,
        });
        Ok(())
    }

    fn add_paragraph(&mut self, text: &str, align: Align) -> Result<(), ExportError> {
        self.blocks.push(Block::Paragraph {
            text: text.to_string(),
            align,
        });
        Ok(())
    }

    fn add_image(
        &mut self,
        path: &Path,
        width_inches: f64,
        height_inches: f64,
        align: Align,
    ) -> Result<(), ExportError> {
        // Same contract as the docx writer: the file has to be there
        fs::metadata(path).map_err(|source| ExportError::ReadImage {
            path: path.to_path_buf(),
            source,
        })?;
        let file_name = path
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_default();
        self.blocks.push(Block::Image {
            file_name,
            width_inches,
            height_inches,
            align,
        });
        Ok(())
    }

    fn finish(self) -> Result<Vec<u8>, ExportError> {
        Ok(self.to_markdown().into_bytes())
    }
}
