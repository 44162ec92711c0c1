//! Application state for one run of sopgen.
//!
//! A [`Session`] is built at startup from the autosave artifacts, mutated by
//! handlers, and saved again after each handler when it became dirty.

use chrono::NaiveDate;
use thiserror::Error;
use tracing::{debug, info, warn};

use crate::config::Config;
use crate::export::{
    export_file_name, Assembler, DocumentSink, DocxSink, Export, ExportError, ExportFormat,
    OutlineSink,
};
use crate::persistence::AutosaveStore;
use crate::types::{in_display_order, next_step_number, Metadata, Step, StepImage};

/// Why a user action was rejected before touching any state
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ValidationError {
    #[error("please upload an image and fill in the step description")]
    IncompleteStep,

    #[error("step number must be at least 1")]
    InvalidStepNumber,

    #[error("there is no step at position {position} (have {count})")]
    NoSuchPosition { position: usize, count: usize },
}

/// A message for the user about something that happened in the background
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Notice {
    Info(String),
    Warning(String),
}

/// Input for a new step
#[derive(Debug, Clone, Default)]
pub struct StepDraft {
    /// Defaults to the session's next step number
    pub step_number: Option<u32>,
    pub image: Option<StepImage>,
    pub description: String,
}

pub struct Session {
    store: AutosaveStore,
    config: Config,
    metadata: Metadata,
    steps: Vec<Step>,
    next_step_number: u32,
    dirty: bool,
    notices: Vec<Notice>,
}

impl Session {
    /// Empty session; nothing is read from disk
    pub fn new(config: &Config) -> Self {
        Self {
            store: AutosaveStore::new(config),
            config: config.clone(),
            metadata: Metadata::new(config.document.default_title.clone()),
            steps: Vec::new(),
            next_step_number: 1,
            dirty: false,
            notices: Vec::new(),
        }
    }

    /// Session restored from the autosave artifacts, when there are any
    pub fn open(config: &Config) -> Self {
        let mut session = Self::new(config);
        session.restore();
        session
    }

    fn restore(&mut self) {
        let restored = self.store.load();

        if let Some(steps) = restored.steps {
            self.next_step_number = next_step_number(&steps);
            self.steps = steps;
        }
        if let Some(mut metadata) = restored.metadata {
            if metadata.title.trim().is_empty() {
                metadata.title.clone_from(&self.config.document.default_title);
            }
            self.metadata = metadata;
        }
        if !self.steps.is_empty() {
            let last_saved = self
                .metadata
                .last_saved_display()
                .unwrap_or_else(|| "unknown".to_string());
            self.notices.push(Notice::Info(format!(
                "Restored previous progress (last saved: {last_saved})"
            )));
        }
        if let Some(err) = restored.error {
            self.notices
                .push(Notice::Warning(format!("Could not read saved data: {err}")));
        }
    }

    pub fn config(&self) -> &Config {
        &self.config
    }

    pub fn store(&self) -> &AutosaveStore {
        &self.store
    }

    pub fn metadata(&self) -> &Metadata {
        &self.metadata
    }

    /// Document title, or the configured default when it is blank
    pub fn title(&self) -> &str {
        if self.metadata.title.trim().is_empty() {
            &self.config.document.default_title
        } else {
            &self.metadata.title
        }
    }

    /// Steps in insertion order
    pub fn steps(&self) -> &[Step] {
        &self.steps
    }

    /// Steps in display order
    pub fn sorted_steps(&self) -> Vec<&Step> {
        in_display_order(&self.steps)
    }

    pub fn next_step_number(&self) -> u32 {
        self.next_step_number
    }

    pub fn is_dirty(&self) -> bool {
        self.dirty
    }

    /// Drain pending notices
    pub fn take_notices(&mut self) -> Vec<Notice> {
        std::mem::take(&mut self.notices)
    }

    fn update(field: &mut String, value: &str) -> bool {
        if field == value {
            return false;
        }
        value.clone_into(field);
        true
    }

    pub fn set_title(&mut self, title: &str) {
        self.dirty |= Self::update(&mut self.metadata.title, title);
    }

    pub fn set_author(&mut self, author: &str) {
        self.dirty |= Self::update(&mut self.metadata.author, author);
    }

    pub fn set_purpose(&mut self, purpose: &str) {
        self.dirty |= Self::update(&mut self.metadata.purpose, purpose);
    }

    pub fn set_scope(&mut self, scope: &str) {
        self.dirty |= Self::update(&mut self.metadata.scope, scope);
    }

    pub fn set_creation_date(&mut self, date: NaiveDate) {
        if self.metadata.creation_date != date {
            self.metadata.creation_date = date;
            self.dirty = true;
        }
    }

    /// Append a step. Returns the number it was given.
    pub fn add_step(&mut self, draft: StepDraft) -> Result<u32, ValidationError> {
        let Some(image) = draft.image else {
            return Err(ValidationError::IncompleteStep);
        };
        if draft.description.trim().is_empty() {
            return Err(ValidationError::IncompleteStep);
        }
        let step_number = draft.step_number.unwrap_or(self.next_step_number);
        if step_number == 0 {
            return Err(ValidationError::InvalidStepNumber);
        }

        self.steps.push(Step {
            step_number,
            image: Some(image),
            description: draft.description,
        });
        self.next_step_number = step_number.saturating_add(1);
        self.dirty = true;
        info!(step = step_number, total = self.steps.len(), "Added step");
        Ok(step_number)
    }

    /// Remove the step at a 1-based position in insertion order
    pub fn delete_step(&mut self, position: usize) -> Result<Step, ValidationError> {
        if position == 0 || position > self.steps.len() {
            return Err(ValidationError::NoSuchPosition {
                position,
                count: self.steps.len(),
            });
        }
        let step = self.steps.remove(position - 1);
        self.dirty = true;
        info!(step = step.step_number, position, "Deleted step");
        Ok(step)
    }

    /// Drop every step; metadata stays
    pub fn clear_steps(&mut self) {
        if !self.steps.is_empty() {
            self.steps.clear();
            self.dirty = true;
        }
        self.next_step_number = 1;
    }

    /// Delete the autosave artifacts and forget the steps.
    ///
    /// Returns false (with a warning notice) when the files could not be deleted.
    pub fn clear_saved(&mut self) -> bool {
        match self.store.clear() {
            Ok(()) => {
                self.steps.clear();
                self.next_step_number = 1;
                self.metadata.last_saved = None;
                // Nothing left to write until the next change
                self.dirty = false;
                true
            }
            Err(err) => {
                warn!(error = %err, "Clearing saved data failed");
                self.notices
                    .push(Notice::Warning(format!("Could not clear saved data: {err}")));
                false
            }
        }
    }

    /// Save if anything changed since the last save
    pub fn autosave(&mut self) -> bool {
        if !self.dirty {
            debug!("Nothing to save");
            return true;
        }
        self.save_now()
    }

    /// Save unconditionally
    pub fn save_now(&mut self) -> bool {
        match self.store.save(&self.steps, &self.metadata) {
            Ok(saved_at) => {
                self.metadata.last_saved = Some(saved_at);
                self.dirty = false;
                true
            }
            Err(err) => {
                warn!(error = %err, "Autosave failed");
                self.notices
                    .push(Notice::Warning(format!("Autosave failed: {err}")));
                false
            }
        }
    }

    /// `last_saved` as recorded in the metadata artifact
    pub fn last_saved(&self) -> Option<String> {
        self.store.last_saved()
    }

    /// Assemble the document in the requested format
    pub fn export(&self, format: ExportFormat) -> Result<Export, ExportError> {
        if self.steps.is_empty() {
            return Err(ExportError::NoSteps);
        }
        match format {
            ExportFormat::Docx => self.export_with(DocxSink::new()),
            ExportFormat::Markdown => self.export_with(OutlineSink::new()),
        }
    }

    /// Markdown preview; works with no steps too
    pub fn preview(&self) -> Result<String, ExportError> {
        let mut sink = OutlineSink::new();
        Assembler::new(&self.config)?.assemble(
            &mut sink,
            self.title(),
            &self.metadata,
            &self.steps,
        )?;
        Ok(sink.to_markdown())
    }

    fn export_with<S: DocumentSink>(&self, mut sink: S) -> Result<Export, ExportError> {
        let assembler = Assembler::new(&self.config)?;
        let report = assembler.assemble(&mut sink, self.title(), &self.metadata, &self.steps)?;
        let file_name = export_file_name(self.title(), sink.extension());
        let bytes = sink.finish()?;
        info!(file = %file_name, bytes = bytes.len(), "Exported document");
        Ok(Export {
            file_name,
            bytes,
            report,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::{DynamicImage, ImageFormat, RgbImage};
    use std::io::Cursor;
    use tempfile::TempDir;

    fn test_config(temp_dir: &TempDir) -> Config {
        let mut config = Config::default();
        config.paths.state_dir = temp_dir.path().join("state").to_string_lossy().to_string();
        config
    }

    fn image(width: u32, height: u32) -> StepImage {
        let mut buf = Vec::new();
        DynamicImage::ImageRgb8(RgbImage::new(width, height))
            .write_to(&mut Cursor::new(&mut buf), ImageFormat::Png)
            .unwrap();
        StepImage::from_bytes(buf).unwrap()
    }

    fn draft(number: Option<u32>, text: &str) -> StepDraft {
        StepDraft {
            step_number: number,
            image: Some(image(8, 8)),
            description: text.to_string(),
        }
    }

    #[test]
    fn test_new_session_defaults() {
        let temp_dir = TempDir::new().unwrap();
        let session = Session::open(&test_config(&temp_dir));
        assert_eq!(session.metadata().title, "Standard Operating Procedure");
        assert_eq!(session.next_step_number(), 1);
        assert!(session.steps().is_empty());
        assert!(!session.is_dirty());
    }

    #[test]
    fn test_add_step_advances_number() {
        let temp_dir = TempDir::new().unwrap();
        let mut session = Session::new(&test_config(&temp_dir));

        assert_eq!(session.add_step(draft(None, "first")).unwrap(), 1);
        assert_eq!(session.add_step(draft(Some(5), "jump")).unwrap(), 5);
        assert_eq!(session.next_step_number(), 6);
        assert_eq!(session.add_step(draft(None, "after")).unwrap(), 6);
        assert!(session.is_dirty());
    }

    #[test]
    fn test_add_step_rejects_incomplete_drafts() {
        let temp_dir = TempDir::new().unwrap();
        let mut session = Session::new(&test_config(&temp_dir));

        let empty = StepDraft::default();
        assert_eq!(
            session.add_step(empty).unwrap_err(),
            ValidationError::IncompleteStep
        );

        let no_text = StepDraft {
            description: "   ".to_string(),
            ..draft(None, "")
        };
        assert_eq!(
            session.add_step(no_text).unwrap_err(),
            ValidationError::IncompleteStep
        );

        let no_image = StepDraft {
            image: None,
            ..draft(None, "text")
        };
        assert!(session.add_step(no_image).is_err());

        assert_eq!(
            session.add_step(draft(Some(0), "zero")).unwrap_err(),
            ValidationError::InvalidStepNumber
        );

        assert!(session.steps().is_empty());
        assert!(!session.is_dirty());
        assert_eq!(session.next_step_number(), 1);
    }

    #[test]
    fn test_setters_only_dirty_on_change() {
        let temp_dir = TempDir::new().unwrap();
        let mut session = Session::new(&test_config(&temp_dir));

        session.set_title("Standard Operating Procedure");
        session.set_author("");
        session.set_creation_date(session.metadata().creation_date);
        assert!(!session.is_dirty());

        session.set_scope("Plant B");
        assert!(session.is_dirty());
        assert_eq!(session.metadata().scope, "Plant B");
    }

    #[test]
    fn test_autosave_then_reopen() {
        let temp_dir = TempDir::new().unwrap();
        let config = test_config(&temp_dir);

        let mut session = Session::new(&config);
        session.set_title("Forklift inspection");
        session.add_step(draft(Some(2), "Check forks")).unwrap();
        session.add_step(draft(Some(1), "Walk around")).unwrap();
        assert!(session.autosave());
        assert!(!session.is_dirty());
        assert!(session.metadata().last_saved.is_some());

        let mut reopened = Session::open(&config);
        assert_eq!(reopened.metadata().title, "Forklift inspection");
        assert_eq!(reopened.steps().len(), 2);
        assert_eq!(reopened.next_step_number(), 3);
        let sorted: Vec<u32> = reopened.sorted_steps().iter().map(|s| s.step_number).collect();
        assert_eq!(sorted, vec![1, 2]);

        let notices = reopened.take_notices();
        assert!(matches!(
            notices.as_slice(),
            [Notice::Info(msg)] if msg.starts_with("Restored previous progress (last saved: ")
        ));
        assert!(reopened.take_notices().is_empty());
    }

    #[test]
    fn test_autosave_skips_clean_session() {
        let temp_dir = TempDir::new().unwrap();
        let mut session = Session::new(&test_config(&temp_dir));
        assert!(session.autosave());
        assert!(!session.store().has_saved_data());
    }

    #[test]
    fn test_blank_saved_title_gets_default() {
        let temp_dir = TempDir::new().unwrap();
        let config = test_config(&temp_dir);
        let mut session = Session::new(&config);
        session.set_title("");
        session.save_now();

        let reopened = Session::open(&config);
        assert_eq!(reopened.metadata().title, "Standard Operating Procedure");
    }

    #[test]
    fn test_delete_step_by_position() {
        let temp_dir = TempDir::new().unwrap();
        let mut session = Session::new(&test_config(&temp_dir));
        session.add_step(draft(Some(1), "a")).unwrap();
        session.add_step(draft(Some(2), "b")).unwrap();

        let removed = session.delete_step(1).unwrap();
        assert_eq!(removed.description, "a");
        assert_eq!(session.steps().len(), 1);
        assert_eq!(
            session.delete_step(3).unwrap_err(),
            ValidationError::NoSuchPosition {
                position: 3,
                count: 1
            }
        );
        assert!(session.delete_step(0).is_err());
    }

    #[test]
    fn test_clear_saved_resets_everything() {
        let temp_dir = TempDir::new().unwrap();
        let config = test_config(&temp_dir);
        let mut session = Session::new(&config);
        session.add_step(draft(None, "a")).unwrap();
        session.autosave();

        assert!(session.clear_saved());
        assert!(session.clear_saved());
        assert!(session.steps().is_empty());
        assert_eq!(session.next_step_number(), 1);
        assert!(!session.store().has_saved_data());

        let reopened = Session::open(&config);
        assert!(reopened.steps().is_empty());
    }

    #[test]
    fn test_clear_steps_is_saved() {
        let temp_dir = TempDir::new().unwrap();
        let config = test_config(&temp_dir);
        let mut session = Session::new(&config);
        session.add_step(draft(None, "a")).unwrap();
        session.autosave();

        session.clear_steps();
        assert!(session.is_dirty());
        session.autosave();

        assert!(Session::open(&config).steps().is_empty());
    }

    #[test]
    fn test_corrupt_autosave_becomes_warning() {
        let temp_dir = TempDir::new().unwrap();
        let config = test_config(&temp_dir);
        std::fs::create_dir_all(config.state_path()).unwrap();
        std::fs::write(config.steps_file_path(), b"junk").unwrap();

        let mut session = Session::open(&config);
        assert!(session.steps().is_empty());
        let notices = session.take_notices();
        assert!(matches!(
            notices.as_slice(),
            [Notice::Warning(msg)] if msg.starts_with("Could not read saved data")
        ));
    }

    #[test]
    fn test_export_requires_steps() {
        let temp_dir = TempDir::new().unwrap();
        let session = Session::new(&test_config(&temp_dir));
        assert!(matches!(
            session.export(ExportFormat::Docx),
            Err(ExportError::NoSteps)
        ));
        // preview still renders the header
        assert!(session.preview().unwrap().starts_with("# Standard Operating Procedure"));
    }

    #[test]
    fn test_export_names_file_after_title() {
        let temp_dir = TempDir::new().unwrap();
        let mut session = Session::new(&test_config(&temp_dir));
        session.set_title("Boiler start");
        session.add_step(draft(None, "Open gas")).unwrap();

        let docx = session.export(ExportFormat::Docx).unwrap();
        assert_eq!(docx.file_name, "Boiler start.docx");
        assert!(docx.bytes.starts_with(b"PK"));
        assert_eq!(docx.report.sections.len(), 1);

        let md = session.export(ExportFormat::Markdown).unwrap();
        assert_eq!(md.file_name, "Boiler start.md");
        let text = String::from_utf8(md.bytes).unwrap();
        assert!(text.contains("### Step 1"));
        assert!(text.contains("Open gas"));
    }

    #[test]
    fn test_empty_preview_leaves_no_state_dir() {
        let temp_dir = TempDir::new().unwrap();
        let config = test_config(&temp_dir);
        let session = Session::open(&config);

        session.preview().unwrap();
        assert!(!config.state_path().exists());
    }

    #[test]
    fn test_blank_title_exports_under_default_name() {
        let temp_dir = TempDir::new().unwrap();
        let mut session = Session::new(&test_config(&temp_dir));
        session.set_title("  ");
        session.add_step(draft(None, "Open gas")).unwrap();

        assert_eq!(session.title(), "Standard Operating Procedure");
        let docx = session.export(ExportFormat::Docx).unwrap();
        assert_eq!(docx.file_name, "Standard Operating Procedure.docx");
    }
}
