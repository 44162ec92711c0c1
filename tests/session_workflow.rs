//! Session Workflow Integration Tests
//!
//! Drives the library the way the CLI does across separate runs:
//! - add steps, autosave, reopen
//! - export a document with a broken image in the middle
//! - clear saved progress

use std::io::Cursor;

use image::{DynamicImage, ImageFormat, RgbImage};
use sopgen::config::Config;
use sopgen::export::{ExportFormat, SectionOutcome};
use sopgen::session::{Session, StepDraft};
use sopgen::types::StepImage;
use tempfile::TempDir;

fn config_in(temp_dir: &TempDir) -> Config {
    let mut config = Config::default();
    config.paths.state_dir = temp_dir
        .path()
        .join(".sopgen")
        .to_string_lossy()
        .to_string();
    config.paths.output_dir = temp_dir.path().join("out").to_string_lossy().to_string();
    config
}

fn png(width: u32, height: u32) -> Vec<u8> {
    let mut buf = Vec::new();
    DynamicImage::ImageRgb8(RgbImage::new(width, height))
        .write_to(&mut Cursor::new(&mut buf), ImageFormat::Png)
        .unwrap();
    buf
}

fn step(number: u32, width: u32, text: &str) -> StepDraft {
    StepDraft {
        step_number: Some(number),
        image: Some(StepImage::from_bytes(png(width, width / 2)).unwrap()),
        description: text.to_string(),
    }
}

#[test]
fn test_progress_survives_restart() {
    let temp_dir = TempDir::new().unwrap();
    let config = config_in(&temp_dir);

    {
        let mut session = Session::open(&config);
        session.set_title("Line 3 changeover");
        session.set_author("Shift lead");
        session.add_step(step(3, 40, "Restart conveyor")).unwrap();
        session.add_step(step(1, 20, "Stop conveyor")).unwrap();
        session.add_step(step(2, 30, "Swap molds")).unwrap();
        assert!(session.autosave());
    }

    let mut session = Session::open(&config);
    assert_eq!(session.take_notices().len(), 1);
    assert_eq!(session.metadata().title, "Line 3 changeover");
    assert_eq!(session.metadata().author, "Shift lead");

    let restored: Vec<(u32, &str, u32)> = session
        .steps()
        .iter()
        .map(|s| {
            (
                s.step_number,
                s.description.as_str(),
                s.image.as_ref().unwrap().width,
            )
        })
        .collect();
    assert_eq!(
        restored,
        vec![
            (3, "Restart conveyor", 40),
            (1, "Stop conveyor", 20),
            (2, "Swap molds", 30)
        ]
    );
    assert_eq!(session.next_step_number(), 4);
    assert!(session.last_saved().is_some());
}

#[test]
fn test_export_isolates_broken_step() {
    let temp_dir = TempDir::new().unwrap();
    let config = config_in(&temp_dir);

    let mut session = Session::open(&config);
    session.set_title("Valve check");
    session.add_step(step(1, 200, "Close valve A")).unwrap();
    session.add_step(step(3, 300, "Open valve C")).unwrap();
    session
        .add_step(StepDraft {
            step_number: Some(2),
            image: Some(StepImage {
                width: 10,
                height: 10,
                bytes: b"not an image".to_vec(),
            }),
            description: "Inspect valve B".to_string(),
        })
        .unwrap();

    let export = session.export(ExportFormat::Markdown).unwrap();
    let numbers: Vec<u32> = export
        .report
        .sections
        .iter()
        .map(SectionOutcome::step_number)
        .collect();
    assert_eq!(numbers, vec![1, 2, 3]);
    assert_eq!(export.report.problems().count(), 1);

    let text = String::from_utf8(export.bytes).unwrap();
    let first = text.find("Close valve A").unwrap();
    let second = text.find("Inspect valve B").unwrap();
    let third = text.find("Open valve C").unwrap();
    assert!(first < second && second < third);
    assert!(text.contains("\\[Image error: "));

    let docx = session.export(ExportFormat::Docx).unwrap();
    assert_eq!(docx.file_name, "Valve check.docx");
    assert!(docx_rs::read_docx(&docx.bytes).is_ok());

    // Scratch images are gone once assembly finishes
    assert!(!config.temp_images_path().exists());
}

#[test]
fn test_clear_twice_then_restart_empty() {
    let temp_dir = TempDir::new().unwrap();
    let config = config_in(&temp_dir);

    let mut session = Session::open(&config);
    session.add_step(step(1, 20, "Only step")).unwrap();
    session.autosave();
    assert!(config.steps_file_path().exists());
    assert!(config.metadata_file_path().exists());

    assert!(session.clear_saved());
    assert!(session.clear_saved());
    assert!(!config.steps_file_path().exists());
    assert!(!config.metadata_file_path().exists());

    let mut session = Session::open(&config);
    assert!(session.steps().is_empty());
    assert!(session.take_notices().is_empty());
    assert_eq!(session.next_step_number(), 1);
}

#[test]
fn test_legacy_metadata_file_is_read() {
    let temp_dir = TempDir::new().unwrap();
    let config = config_in(&temp_dir);
    std::fs::create_dir_all(config.state_path()).unwrap();
    std::fs::write(
        config.metadata_file_path(),
        r#"{"sop_title": "Old procedure", "author": "QA", "creation_date": "garbage"}"#,
    )
    .unwrap();

    let session = Session::open(&config);
    assert_eq!(session.metadata().title, "Old procedure");
    assert_eq!(session.metadata().creation_date, sopgen::types::today());
    assert!(session.steps().is_empty());
}
