//! Word (.docx) output through `docx-rs`

use std::fs;
use std::io::Cursor;
use std::path::Path;

use docx_rs::{AlignmentType, Docx, Paragraph, Pic, Run, Style, StyleType};

use super::{Align, DocumentSink, ExportError};

const EMU_PER_INCH: f64 = 914_400.0;

/// Paragraph styles referenced by headings: (style id, display name, half-point size)
const HEADING_STYLES: [(&str, &str, usize); 3] = [
    ("Title", "Title", 52),
    ("Heading1", "Heading 1", 32),
    ("Heading2", "Heading 2", 26),
];

fn to_emu(inches: f64) -> u32 {
    (inches * EMU_PER_INCH).round() as u32
}

fn alignment(align: Align) -> AlignmentType {
    match align {
        Align::Left => AlignmentType::Left,
        Align::Center => AlignmentType::Center,
        Align::Right => AlignmentType::Right,
    }
}

fn heading_style(level: u8) -> &'static str {
    match level {
        0 => "Title",
        1 => "Heading1",
        _ => "Heading2",
    }
}

/// Collects paragraphs and packs them into a .docx archive on `finish`
#[derive(Default)]
pub struct DocxSink {
    paragraphs: Vec<Paragraph>,
}

impl DocxSink {
    pub fn new() -> Self {
        Self::default()
    }
}

impl DocumentSink for DocxSink {
    fn extension(&self) -> &'static str {
        "docx"
    }

    fn add_heading(&mut self, text: &str, level: u8, align: Align) -> Result<(), ExportError> {
        self.paragraphs.push(
            Paragraph::new()
                .add_run(Run::new().add_text(text))
                .style(heading_style(level))
                .align(alignment(align)),
        );
        Ok(())
    }

    fn add_paragraph(&mut self, text: &str, align: Align) -> Result<(), ExportError> {
        let paragraph = if text.is_empty() {
            Paragraph::new()
        } else {
            Paragraph::new().add_run(Run::new().add_text(text))
        };
        self.paragraphs.push(paragraph.align(alignment(align)));
        Ok(())
    }

    fn add_image(
        &mut self,
        path: &Path,
        width_inches: f64,
        height_inches: f64,
        align: Align,
    ) -> Result<(), ExportError> {
        let bytes = fs::read(path).map_err(|source| ExportError::ReadImage {
            path: path.to_path_buf(),
            source,
        })?;
        let pic = Pic::new(&bytes).size(to_emu(width_inches), to_emu(height_inches));
        self.paragraphs.push(
            Paragraph::new()
                .add_run(Run::new().add_image(pic))
                .align(alignment(align)),
        );
        Ok(())
    }

    fn finish(self) -> Result<Vec<u8>, ExportError> {
        let mut docx = Docx::new();
        for (id, name, size) in HEADING_STYLES {
            docx = docx.add_style(
                Style::new(id, StyleType::Paragraph)
                    .name(name)
                    .size(size)
                    .bold(),
            );
        }
        for paragraph in self.paragraphs {
            docx = docx.add_paragraph(paragraph);
        }

        let mut buf = Cursor::new(Vec::new());
        docx.build()
            .pack(&mut buf)
            .map_err(|e| ExportError::Sink(e.to_string()))?;
        Ok(buf.into_inner())
    }
}
