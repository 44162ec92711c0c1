//! Turns metadata and steps into calls on a [`DocumentSink`]

use std::fs;
use std::path::{Path, PathBuf};

use chrono::Utc;
use image::{GenericImageView, ImageFormat};
use tracing::{debug, info, warn};

use super::{Align, DocumentSink, ExportError, Labels};
use crate::config::Config;
use crate::types::{in_display_order, Metadata, Step, StepImage, DATE_FORMAT};

/// Width in inches for an image `pixel_width` pixels wide, capped at `max_inches`
pub fn display_width_inches(pixel_width: u32, pixels_per_inch: f64, max_inches: f64) -> f64 {
    (f64::from(pixel_width) / pixels_per_inch).min(max_inches)
}

/// Embedded size in inches. Width follows [`display_width_inches`] and height
/// keeps the aspect ratio; an image taller than `max_height` is shrunk as a
/// whole to fit.
pub fn display_size_inches(
    (width_px, height_px): (u32, u32),
    pixels_per_inch: f64,
    max_width: f64,
    max_height: f64,
) -> (f64, f64) {
    if width_px == 0 {
        return (0.0, 0.0);
    }
    let width = display_width_inches(width_px, pixels_per_inch, max_width);
    let height = width * f64::from(height_px) / f64::from(width_px);
    if height > max_height {
        (width * max_height / height, max_height)
    } else {
        (width, height)
    }
}

/// What happened to one step during assembly
#[derive(Debug, Clone, PartialEq)]
pub enum SectionOutcome {
    /// The step section was written. `image_error` is set when the image was
    /// replaced by a placeholder.
    Rendered {
        step_number: u32,
        image_error: Option<String>,
    },
    /// The step failed part-way and an error section was written instead
    Failed { step_number: u32, message: String },
}

impl SectionOutcome {
    pub fn step_number(&self) -> u32 {
        match self {
            SectionOutcome::Rendered { step_number, .. }
            | SectionOutcome::Failed { step_number, .. } => *step_number,
        }
    }

    pub fn is_clean(&self) -> bool {
        matches!(
            self,
            SectionOutcome::Rendered {
                image_error: None,
                ..
            }
        )
    }
}

/// Per-step outcomes, in document order
#[derive(Debug, Clone, Default, PartialEq)]
pub struct AssemblyReport {
    pub sections: Vec<SectionOutcome>,
}

impl AssemblyReport {
    pub fn problems(&self) -> impl Iterator<Item = &SectionOutcome> {
        self.sections.iter().filter(|s| !s.is_clean())
    }
}

/// Scratch files handed to the sink.
///
/// The directory is only created when the first image needs a file. On drop
/// every file is removed, then every directory level this run created, deepest
/// first, as long as it ended up empty.
struct TransientImages {
    target: PathBuf,
    dir: Option<PathBuf>,
    created_dirs: Vec<PathBuf>,
    files: Vec<PathBuf>,
}

impl TransientImages {
    fn new(target: &Path) -> Self {
        Self {
            target: target.to_path_buf(),
            dir: None,
            created_dirs: Vec::new(),
            files: Vec::new(),
        }
    }

    fn dir(&mut self) -> PathBuf {
        if let Some(dir) = &self.dir {
            return dir.clone();
        }

        let missing: Vec<PathBuf> = self
            .target
            .ancestors()
            .take_while(|p| !p.as_os_str().is_empty() && !p.exists())
            .map(Path::to_path_buf)
            .collect();

        let dir = match fs::create_dir_all(&self.target) {
            Ok(()) => {
                self.created_dirs = missing;
                self.target.clone()
            }
            Err(err) => {
                let fallback = std::env::temp_dir();
                warn!(
                    dir = %self.target.display(),
                    fallback = %fallback.display(),
                    error = %err,
                    "Cannot create image directory, using fallback"
                );
                fallback
            }
        };
        self.dir = Some(dir.clone());
        dir
    }

    /// Reserve a fresh path for a step image: `step_<n>_<millis>.png`
    fn allocate(&mut self, step_number: u32) -> PathBuf {
        let dir = self.dir();
        let millis = Utc::now().timestamp_millis();
        let mut path = dir.join(format!("step_{step_number}_{millis}.png"));
        let mut suffix = 1;
        while path.exists() || self.files.contains(&path) {
            path = dir.join(format!("step_{step_number}_{millis}_{suffix}.png"));
            suffix += 1;
        }
        self.files.push(path.clone());
        path
    }
}

impl Drop for TransientImages {
    fn drop(&mut self) {
        for file in &self.files {
            if let Err(err) = fs::remove_file(file) {
                debug!(file = %file.display(), error = %err, "Transient image not removed");
            }
        }
        for dir in &self.created_dirs {
            // Fails when something else still lives there; that is fine
            if let Err(err) = fs::remove_dir(dir) {
                debug!(dir = %dir.display(), error = %err, "Transient directory kept");
                break;
            }
        }
    }
}

/// Lays out a procedure document
pub struct Assembler {
    labels: Labels,
    pixels_per_inch: f64,
    max_image_width_inches: f64,
    max_image_height_inches: f64,
    temp_dir: PathBuf,
}

impl Assembler {
    pub fn new(config: &Config) -> Result<Self, ExportError> {
        Ok(Self {
            labels: Labels::new(&config.document.labels)?,
            pixels_per_inch: config.document.pixels_per_inch,
            max_image_width_inches: config.document.max_image_width_inches,
            max_image_height_inches: config.document.max_image_height_inches,
            temp_dir: config.temp_images_path(),
        })
    }

    /// Use a different scratch directory for step images
    pub fn with_temp_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.temp_dir = dir.into();
        self
    }

    /// Write the whole document into `sink`.
    ///
    /// Only failures in the title and metadata block abort. Each step is
    /// isolated: a failing step gets an error section and the next one is
    /// processed as usual.
    pub fn assemble<S: DocumentSink>(
        &self,
        sink: &mut S,
        title: &str,
        metadata: &Metadata,
        steps: &[Step],
    ) -> Result<AssemblyReport, ExportError> {
        sink.add_heading(title, 0, Align::Center)?;
        let date = metadata.creation_date.format(DATE_FORMAT).to_string();
        sink.add_paragraph(&self.labels.created_on(&date)?, Align::Right)?;
        sink.add_paragraph(&self.labels.created_by(&metadata.author)?, Align::Right)?;

        if !metadata.purpose.is_empty() {
            sink.add_heading(&self.labels.purpose, 1, Align::Left)?;
            sink.add_paragraph(&metadata.purpose, Align::Left)?;
        }
        if !metadata.scope.is_empty() {
            sink.add_heading(&self.labels.scope, 1, Align::Left)?;
            sink.add_paragraph(&metadata.scope, Align::Left)?;
        }

        sink.add_heading(&self.labels.steps, 1, Align::Left)?;

        let mut transient = TransientImages::new(&self.temp_dir);
        let sections = in_display_order(steps)
            .into_iter()
            .fold(Vec::with_capacity(steps.len()), |mut sections, step| {
                sections.push(self.assemble_step(sink, step, &mut transient));
                sections
            });
        drop(transient);

        let report = AssemblyReport { sections };
        info!(
            steps = report.sections.len(),
            problems = report.problems().count(),
            "Assembled document"
        );
        Ok(report)
    }

    fn assemble_step<S: DocumentSink>(
        &self,
        sink: &mut S,
        step: &Step,
        transient: &mut TransientImages,
    ) -> SectionOutcome {
        match self.render_step(sink, step, transient) {
            Ok(image_error) => SectionOutcome::Rendered {
                step_number: step.step_number,
                image_error,
            },
            Err(err) => {
                warn!(step = step.step_number, error = %err, "Step could not be rendered");
                let message = err.to_string();
                if let Err(err) = self.render_failure(sink, step, &message) {
                    warn!(step = step.step_number, error = %err, "Error section incomplete");
                }
                SectionOutcome::Failed {
                    step_number: step.step_number,
                    message,
                }
            }
        }
    }

    /// Returns the image error message when the image had to be replaced
    fn render_step<S: DocumentSink>(
        &self,
        sink: &mut S,
        step: &Step,
        transient: &mut TransientImages,
    ) -> Result<Option<String>, ExportError> {
        sink.add_heading(&self.labels.step(step.step_number)?, 2, Align::Left)?;

        let mut image_error = None;
        if let Some(image) = &step.image {
            if let Err(err) = self.embed_image(sink, step.step_number, image, transient) {
                warn!(step = step.step_number, error = %err, "Image replaced by placeholder");
                let message = err.to_string();
                sink.add_paragraph(&self.labels.image_error(&message)?, Align::Center)?;
                image_error = Some(message);
            }
        }

        if step.has_description() {
            sink.add_paragraph(&step.description, Align::Left)?;
        }
        sink.add_paragraph("", Align::Left)?;

        Ok(image_error)
    }

    fn embed_image<S: DocumentSink>(
        &self,
        sink: &mut S,
        step_number: u32,
        image: &StepImage,
        transient: &mut TransientImages,
    ) -> Result<(), ExportError> {
        let bitmap = image.to_bitmap().map_err(ExportError::DecodeImage)?;
        let path = transient.allocate(step_number);
        bitmap
            .save_with_format(&path, ImageFormat::Png)
            .map_err(|source| ExportError::WriteImage {
                path: path.clone(),
                source,
            })?;

        let (width, height) = display_size_inches(
            bitmap.dimensions(),
            self.pixels_per_inch,
            self.max_image_width_inches,
            self.max_image_height_inches,
        );
        debug!(step = step_number, path = %path.display(), width, height, "Embedding image");
        sink.add_image(&path, width, height, Align::Center)
    }

    fn render_failure<S: DocumentSink>(
        &self,
        sink: &mut S,
        step: &Step,
        message: &str,
    ) -> Result<(), ExportError> {
        sink.add_heading(&self.labels.step_failed(step.step_number)?, 2, Align::Left)?;
        sink.add_paragraph(&self.labels.step_error(message)?, Align::Left)?;
        if step.has_description() {
            sink.add_paragraph(&step.description, Align::Left)?;
        }
        sink.add_paragraph("", Align::Left)
    }
}
