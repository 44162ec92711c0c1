use anyhow::{Context, Result};
use chrono::NaiveDate;
use clap::{Parser, Subcommand};
use std::fs;
use std::path::{Path, PathBuf};

use sopgen::config::Config;
use sopgen::export::{ExportFormat, SectionOutcome};
use sopgen::logging;
use sopgen::session::{Notice, Session, StepDraft};
use sopgen::types::{StepImage, DATE_FORMAT};

#[derive(Parser)]
#[command(name = "sopgen")]
#[command(about = "Build Standard Operating Procedure documents step by step")]
#[command(version)]
pub struct Cli {
    #[command(subcommand)]
    command: Option<Commands>,

    /// Config file path
    #[arg(short, long)]
    config: Option<String>,

    /// Enable debug logging
    #[arg(short, long)]
    debug: bool,
}

#[derive(Subcommand)]
enum Commands {
    /// Preview the procedure as Markdown
    Show,

    /// Edit document metadata
    Meta {
        #[arg(long)]
        title: Option<String>,

        #[arg(long)]
        author: Option<String>,

        /// Creation date (YYYY-MM-DD)
        #[arg(long)]
        date: Option<String>,

        #[arg(long)]
        purpose: Option<String>,

        #[arg(long)]
        scope: Option<String>,
    },

    /// Add a step from a screenshot and its instructions
    Add {
        /// Image file (png, jpeg or gif)
        #[arg(short, long)]
        image: Option<PathBuf>,

        /// Step instructions
        #[arg(short = 't', long, default_value = "")]
        description: String,

        /// Step number (default: one past the last step added)
        #[arg(short, long)]
        number: Option<u32>,
    },

    /// List steps in the order they were added
    List,

    /// Delete the step at a position shown by `list`
    Delete {
        /// 1-based position
        position: usize,
    },

    /// Remove all steps, keeping the metadata
    ResetSteps,

    /// Save progress now
    Save,

    /// Delete saved progress
    Clear,

    /// Show where progress is saved and when
    Status,

    /// Write the finished document
    Export {
        /// Output directory (default: paths.output_dir)
        #[arg(short, long)]
        output: Option<PathBuf>,

        #[arg(short, long, value_enum, default_value_t)]
        format: ExportFormat,
    },

    /// Write the default configuration to .sopgen/config.toml
    InitConfig,
}

fn main() -> Result<()> {
    let cli = Cli::parse();

    // Logging takes its level and destination from the config
    let config = Config::load(cli.config.as_deref())?;
    let logging_handle = logging::init_logging(&config, cli.debug)?;

    if let Some(Commands::InitConfig) = cli.command {
        return cmd_init_config(&config);
    }

    let mut session = Session::open(&config);
    print_notices(&mut session);

    match cli.command {
        None | Some(Commands::Show) => cmd_show(&session),
        Some(Commands::Meta {
            title,
            author,
            date,
            purpose,
            scope,
        }) => cmd_meta(&mut session, title, author, date, purpose, scope),
        Some(Commands::Add {
            image,
            description,
            number,
        }) => cmd_add(&mut session, image, description, number),
        Some(Commands::List) => cmd_list(&session),
        Some(Commands::Delete { position }) => cmd_delete(&mut session, position),
        Some(Commands::ResetSteps) => cmd_reset_steps(&mut session),
        Some(Commands::Save) => cmd_save(&mut session),
        Some(Commands::Clear) => cmd_clear(&mut session),
        Some(Commands::Status) => cmd_status(&session),
        Some(Commands::Export { output, format }) => cmd_export(&session, output, format)?,
        Some(Commands::InitConfig) => {}
    }

    session.autosave();
    print_notices(&mut session);

    if let Some(log_path) = logging_handle.finish() {
        eprintln!("Session log: {}", log_path.display());
    }

    Ok(())
}

fn print_notices(session: &mut Session) {
    for notice in session.take_notices() {
        match notice {
            Notice::Info(message) => println!("{message}"),
            Notice::Warning(message) => eprintln!("Warning: {message}"),
        }
    }
}

fn cmd_show(session: &Session) {
    match session.preview() {
        Ok(markdown) => print!("{markdown}"),
        Err(err) => eprintln!("Error: {err}"),
    }
}

fn cmd_meta(
    session: &mut Session,
    title: Option<String>,
    author: Option<String>,
    date: Option<String>,
    purpose: Option<String>,
    scope: Option<String>,
) {
    if let Some(title) = title {
        session.set_title(&title);
    }
    if let Some(author) = author {
        session.set_author(&author);
    }
    if let Some(date) = date {
        match NaiveDate::parse_from_str(date.trim(), DATE_FORMAT) {
            Ok(date) => session.set_creation_date(date),
            Err(_) => eprintln!("Error: '{date}' is not a date in YYYY-MM-DD form"),
        }
    }
    if let Some(purpose) = purpose {
        session.set_purpose(&purpose);
    }
    if let Some(scope) = scope {
        session.set_scope(&scope);
    }

    let metadata = session.metadata();
    println!("Title:   {}", metadata.title);
    println!("Author:  {}", metadata.author);
    println!("Date:    {}", metadata.creation_date.format(DATE_FORMAT));
    println!("Purpose: {}", metadata.purpose);
    println!("Scope:   {}", metadata.scope);
}

fn cmd_add(
    session: &mut Session,
    image: Option<PathBuf>,
    description: String,
    number: Option<u32>,
) {
    let image = match image.map(|path| read_image(&path)).transpose() {
        Ok(image) => image,
        Err(err) => {
            eprintln!("Error: {err:#}");
            return;
        }
    };

    let draft = StepDraft {
        step_number: number,
        image,
        description,
    };
    match session.add_step(draft) {
        Ok(step_number) => println!(
            "Added step {step_number} ({} steps total)",
            session.steps().len()
        ),
        Err(err) => eprintln!("Error: {err}"),
    }
}

fn read_image(path: &Path) -> Result<StepImage> {
    let bytes = fs::read(path).with_context(|| format!("Failed to read {}", path.display()))?;
    StepImage::from_bytes(bytes)
        .with_context(|| format!("{} is not a supported image", path.display()))
}

fn cmd_list(session: &Session) {
    let steps = session.steps();
    if steps.is_empty() {
        println!("No steps yet");
        return;
    }

    println!("Steps ({})", steps.len());
    println!("{}", "─".repeat(60));
    for (index, step) in steps.iter().enumerate() {
        let size = step
            .image
            .as_ref()
            .map(|img| format!("{}x{}", img.width, img.height))
            .unwrap_or_else(|| "no image".to_string());
        let summary = step.description.lines().next().unwrap_or_default();
        println!(
            "{:>3}. Step {} [{}] {}",
            index + 1,
            step.step_number,
            size,
            summary
        );
    }
    println!("Next step number: {}", session.next_step_number());
}

fn cmd_delete(session: &mut Session, position: usize) {
    match session.delete_step(position) {
        Ok(step) => println!("Deleted step {}", step.step_number),
        Err(err) => eprintln!("Error: {err}"),
    }
}

fn cmd_reset_steps(session: &mut Session) {
    session.clear_steps();
    println!("All steps removed");
}

fn cmd_save(session: &mut Session) {
    if session.save_now() {
        let last_saved = session.last_saved().unwrap_or_else(|| "unknown".to_string());
        println!("Saved (last saved: {last_saved})");
    }
}

fn cmd_clear(session: &mut Session) {
    if session.clear_saved() {
        println!("Saved data cleared");
    }
}

fn cmd_status(session: &Session) {
    let store = session.store();
    println!("State directory: {}", store.state_dir().display());
    println!("Steps file:      {}", store.steps_path().display());
    println!("Metadata file:   {}", store.metadata_path().display());
    if store.has_saved_data() {
        let last_saved = session.last_saved().unwrap_or_else(|| "unknown".to_string());
        println!("Last saved:      {last_saved}");
    } else {
        println!("Last saved:      never");
    }
    println!("Steps:           {}", session.steps().len());
}

fn cmd_export(session: &Session, output: Option<PathBuf>, format: ExportFormat) -> Result<()> {
    let export = match session.export(format) {
        Ok(export) => export,
        Err(err) => {
            eprintln!("Error: {err}");
            return Ok(());
        }
    };

    for problem in export.report.problems() {
        match problem {
            SectionOutcome::Rendered {
                step_number,
                image_error: Some(message),
            } => eprintln!("Warning: step {step_number} image skipped: {message}"),
            SectionOutcome::Failed {
                step_number,
                message,
            } => eprintln!("Warning: step {step_number} could not be processed: {message}"),
            SectionOutcome::Rendered { .. } => {}
        }
    }

    let dir = output.unwrap_or_else(|| session.config().output_path());
    fs::create_dir_all(&dir)
        .with_context(|| format!("Failed to create output directory {}", dir.display()))?;
    let path = dir.join(&export.file_name);
    fs::write(&path, &export.bytes)
        .with_context(|| format!("Failed to write {}", path.display()))?;

    println!("Exported {}", path.display());
    Ok(())
}

fn cmd_init_config(config: &Config) -> Result<()> {
    let path = config.save()?;
    println!("Wrote {}", path.display());
    Ok(())
}
