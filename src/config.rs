use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::path::PathBuf;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    pub paths: PathsConfig,
    #[serde(default)]
    pub document: DocumentConfig,
    #[serde(default)]
    pub logging: LoggingConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PathsConfig {
    /// Directory holding the autosave artifacts (relative to cwd unless absolute)
    pub state_dir: String,
    /// Binary step artifact, relative to `state_dir`
    pub steps_file: String,
    /// JSON metadata artifact, relative to `state_dir`
    pub metadata_file: String,
    /// Scratch directory for images handed to the document writer, relative to `state_dir`
    pub temp_images_dir: String,
    /// Where `export` writes documents when no --output is given
    pub output_dir: String,
}

/// Document layout and wording
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DocumentConfig {
    /// Title used until the user sets one
    #[serde(default = "default_title")]
    pub default_title: String,
    /// Upper bound for embedded image width
    #[serde(default = "default_max_image_width")]
    pub max_image_width_inches: f64,
    /// Upper bound for embedded image height; taller images shrink as a whole
    #[serde(default = "default_max_image_height")]
    pub max_image_height_inches: f64,
    /// Pixel density assumed when converting image width to inches
    #[serde(default = "default_pixels_per_inch")]
    pub pixels_per_inch: f64,
    #[serde(default)]
    pub labels: LabelsConfig,
}

fn default_title() -> String {
    "Standard Operating Procedure".to_string()
}

fn default_max_image_width() -> f64 {
    6.0
}

fn default_max_image_height() -> f64 {
    20.0
}

fn default_pixels_per_inch() -> f64 {
    100.0
}

impl Default for DocumentConfig {
    fn default() -> Self {
        Self {
            default_title: default_title(),
            max_image_width_inches: default_max_image_width(),
            max_image_height_inches: default_max_image_height(),
            pixels_per_inch: default_pixels_per_inch(),
            labels: LabelsConfig::default(),
        }
    }
}

/// Handlebars templates for every fixed string the assembler emits.
///
/// Available variables: `{{date}}` and `{{author}}` in the metadata lines,
/// `{{number}}` in step headings, `{{message}}` in error texts.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LabelsConfig {
    pub created_on: String,
    pub created_by: String,
    pub not_set: String,
    pub purpose: String,
    pub scope: String,
    pub steps: String,
    pub step: String,
    pub step_failed: String,
    pub step_error: String,
    pub image_error: String,
}

impl Default for LabelsConfig {
    fn default() -> Self {
        Self {
            created_on: "Created on: {{date}}".to_string(),
            created_by: "Created by: {{author}}".to_string(),
            not_set: "Not set".to_string(),
            purpose: "Purpose".to_string(),
            scope: "Scope".to_string(),
            steps: "Operating Steps".to_string(),
            step: "Step {{number}}".to_string(),
            step_failed: "Step {{number}} (processing error)".to_string(),
            step_error: "Step processing error: {{message}}".to_string(),
            image_error: "[Image error: {{message}}]".to_string(),
        }
    }
}

/// Logging configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoggingConfig {
    /// Log level filter (trace, debug, info, warn, error)
    #[serde(default = "default_log_level")]
    pub level: String,

    /// Write logs to `<state_dir>/logs/` instead of stderr
    #[serde(default)]
    pub to_file: bool,
}

fn default_log_level() -> String {
    "warn".to_string()
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
            to_file: false,
        }
    }
}

impl Config {
    /// Path to the project-local config file
    pub fn local_config_path() -> PathBuf {
        PathBuf::from(".sopgen/config.toml")
    }

    pub fn load(config_path: Option<&str>) -> Result<Self> {
        // Start with embedded defaults so sopgen works without config files
        let defaults = Config::default();
        let defaults_json =
            serde_json::to_string(&defaults).context("Failed to serialize default config")?;

        let mut builder = config::Config::builder().add_source(config::File::from_str(
            &defaults_json,
            config::FileFormat::Json,
        ));

        let local_config = Self::local_config_path();
        if local_config.exists() {
            builder = builder.add_source(config::File::from(local_config));
        }

        // User config in ~/.config/sopgen/ (optional global overrides)
        if let Some(config_dir) = dirs::config_dir() {
            let user_config = config_dir.join("sopgen").join("config.toml");
            if user_config.exists() {
                builder = builder.add_source(config::File::from(user_config));
            }
        }

        // Explicit config file (CLI override)
        if let Some(path) = config_path {
            builder = builder.add_source(config::File::with_name(path));
        }

        builder = builder.add_source(
            config::Environment::with_prefix("SOPGEN")
                .separator("__")
                .try_parsing(true),
        );

        let config: Self = builder
            .build()
            .context("Failed to load configuration")?
            .try_deserialize()
            .context("Failed to deserialize configuration")?;
        config.validate()?;
        Ok(config)
    }

    /// Reject image sizing values that would produce empty or unbounded images
    pub fn validate(&self) -> Result<()> {
        let doc = &self.document;
        for (key, value) in [
            ("document.pixels_per_inch", doc.pixels_per_inch),
            ("document.max_image_width_inches", doc.max_image_width_inches),
            ("document.max_image_height_inches", doc.max_image_height_inches),
        ] {
            anyhow::ensure!(
                value.is_finite() && value > 0.0,
                "{key} must be a positive number, got {value}"
            );
        }
        Ok(())
    }

    /// Write this config to `.sopgen/config.toml`, returning the path written
    pub fn save(&self) -> Result<PathBuf> {
        let config_path = Self::local_config_path();

        if let Some(parent) = config_path.parent() {
            std::fs::create_dir_all(parent).context("Failed to create config directory")?;
        }

        let toml_str =
            toml::to_string_pretty(self).context("Failed to serialize config to TOML")?;
        std::fs::write(&config_path, toml_str).context("Failed to write config file")?;

        Ok(config_path)
    }

    /// Get absolute path to the state directory
    pub fn state_path(&self) -> PathBuf {
        absolutize(&self.paths.state_dir)
    }

    pub fn steps_file_path(&self) -> PathBuf {
        self.state_path().join(&self.paths.steps_file)
    }

    pub fn metadata_file_path(&self) -> PathBuf {
        self.state_path().join(&self.paths.metadata_file)
    }

    pub fn temp_images_path(&self) -> PathBuf {
        self.state_path().join(&self.paths.temp_images_dir)
    }

    pub fn output_path(&self) -> PathBuf {
        absolutize(&self.paths.output_dir)
    }

    /// Get absolute path to logs directory
    pub fn logs_path(&self) -> PathBuf {
        self.state_path().join("logs")
    }
}

fn absolutize(raw: &str) -> PathBuf {
    let path = PathBuf::from(raw);
    if path.is_absolute() {
        path
    } else {
        std::env::current_dir().unwrap_or_default().join(path)
    }
}

impl Default for Config {
    fn default() -> Self {
        Self {
            paths: PathsConfig {
                state_dir: ".sopgen".to_string(),
                steps_file: "autosave_data.bin".to_string(),
                metadata_file: "sop_config.json".to_string(),
                temp_images_dir: "temp_images".to_string(),
                output_dir: ".".to_string(),
            },
            document: DocumentConfig::default(),
            logging: LoggingConfig::default(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_default_paths_live_under_state_dir() {
        let temp_dir = TempDir::new().unwrap();
        let mut config = Config::default();
        config.paths.state_dir = temp_dir.path().to_string_lossy().to_string();

        assert_eq!(
            config.steps_file_path(),
            temp_dir.path().join("autosave_data.bin")
        );
        assert_eq!(
            config.metadata_file_path(),
            temp_dir.path().join("sop_config.json")
        );
        assert!(config.temp_images_path().starts_with(temp_dir.path()));
        assert!(config.logs_path().ends_with("logs"));
    }

    #[test]
    fn test_relative_state_dir_is_resolved_against_cwd() {
        let config = Config::default();
        let state = config.state_path();
        assert!(state.is_absolute());
        assert!(state.ends_with(".sopgen"));
    }

    #[test]
    fn test_document_defaults() {
        let doc = DocumentConfig::default();
        assert_eq!(doc.default_title, "Standard Operating Procedure");
        assert!((doc.max_image_width_inches - 6.0).abs() < f64::EPSILON);
        assert!((doc.pixels_per_inch - 100.0).abs() < f64::EPSILON);
        assert!(doc.labels.step.contains("{{number}}"));
    }

    #[test]
    fn test_partial_document_section_fills_defaults() {
        let toml_src = r#"
            [paths]
            state_dir = "state"
            steps_file = "steps.bin"
            metadata_file = "meta.json"
            temp_images_dir = "tmp"
            output_dir = "out"

            [document.labels]
            purpose = "Zweck"
        "#;
        let config: Config = toml::from_str(toml_src).unwrap();
        assert_eq!(config.document.labels.purpose, "Zweck");
        assert_eq!(config.document.labels.scope, "Scope");
        assert_eq!(config.document.default_title, "Standard Operating Procedure");
        assert_eq!(config.logging.level, "warn");
    }

    #[test]
    fn test_validate_rejects_non_positive_image_sizing() {
        assert!(Config::default().validate().is_ok());

        let mut config = Config::default();
        config.document.pixels_per_inch = 0.0;
        let err = config.validate().unwrap_err();
        assert!(err.to_string().contains("document.pixels_per_inch"));

        let mut config = Config::default();
        config.document.max_image_height_inches = -1.0;
        assert!(config.validate().is_err());

        let mut config = Config::default();
        config.document.max_image_width_inches = f64::INFINITY;
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_default_config_roundtrips_through_toml() {
        let config = Config::default();
        let text = toml::to_string_pretty(&config).unwrap();
        let parsed: Config = toml::from_str(&text).unwrap();
        assert_eq!(parsed.paths.steps_file, config.paths.steps_file);
        assert_eq!(parsed.document.labels.step, config.document.labels.step);
    }
}
