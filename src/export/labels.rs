//! Handlebars rendering of the fixed strings in an exported document

use handlebars::Handlebars;
use serde_json::{json, Value};

use super::ExportError;
use crate::config::LabelsConfig;

const CREATED_ON: &str = "created_on";
const CREATED_BY: &str = "created_by";
const STEP: &str = "step";
const STEP_FAILED: &str = "step_failed";
const STEP_ERROR: &str = "step_error";
const IMAGE_ERROR: &str = "image_error";

/// Compiled label templates
pub struct Labels {
    handlebars: Handlebars<'static>,
    pub not_set: String,
    pub purpose: String,
    pub scope: String,
    pub steps: String,
}

impl Labels {
    /// Compile every template up front so a typo surfaces before export starts
    pub fn new(config: &LabelsConfig) -> Result<Self, ExportError> {
        let mut handlebars = Handlebars::new();
        // Plain text output, no HTML escaping
        handlebars.register_escape_fn(handlebars::no_escape);

        let templates = [
            (CREATED_ON, &config.created_on),
            (CREATED_BY, &config.created_by),
            (STEP, &config.step),
            (STEP_FAILED, &config.step_failed),
            (STEP_ERROR, &config.step_error),
            (IMAGE_ERROR, &config.image_error),
        ];
        for (name, template) in templates {
            handlebars
                .register_template_string(name, template)
                .map_err(|e| ExportError::Template {
                    name,
                    message: e.to_string(),
                })?;
        }

        Ok(Self {
            handlebars,
            not_set: config.not_set.clone(),
            purpose: config.purpose.clone(),
            scope: config.scope.clone(),
            steps: config.steps.clone(),
        })
    }

    fn render(&self, name: &'static str, data: &Value) -> Result<String, ExportError> {
        self.handlebars
            .render(name, data)
            .map_err(|e| ExportError::Template {
                name,
                message: e.to_string(),
            })
    }

    /// Falls back to the "not set" placeholder for an empty value
    fn or_not_set<'a>(&'a self, value: &'a str) -> &'a str {
        if value.trim().is_empty() {
            &self.not_set
        } else {
            value
        }
    }

    pub fn created_on(&self, date: &str) -> Result<String, ExportError> {
        self.render(CREATED_ON, &json!({ "date": self.or_not_set(date) }))
    }

    pub fn created_by(&self, author: &str) -> Result<String, ExportError> {
        self.render(CREATED_BY, &json!({ "author": self.or_not_set(author) }))
    }

    pub fn step(&self, number: u32) -> Result<String, ExportError> {
        self.render(STEP, &json!({ "number": number }))
    }

    pub fn step_failed(&self, number: u32) -> Result<String, ExportError> {
        self.render(STEP_FAILED, &json!({ "number": number }))
    }

    pub fn step_error(&self, message: &str) -> Result<String, ExportError> {
        self.render(STEP_ERROR, &json!({ "message": message }))
    }

    pub fn image_error(&self, message: &str) -> Result<String, ExportError> {
        self.render(IMAGE_ERROR, &json!({ "message": message }))
    }
}
