//! Apparatus settings: defaults, JSON settings file, and the render parameters built from them.

use serde::{Deserialize, Serialize};
use std::fs;
use std::path::Path;
use thiserror::Error;

use crate::models::{InterlinearMode, RenderFormat, RenderParams};
use crate::provider::Provider;

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
    #[error("Settings parse error: {0}")]
    Json(#[from] serde_json::Error),
    #[error("Invalid setting {field}: {message}")]
    Invalid { field: &'static str, message: String },
}

/// Caller-supplied settings. Every field is optional in the settings file.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ApparatusSettings {
    pub format: RenderFormat,
    pub interlinear_ignores_case: bool,
    pub interlinear_ignores_diacritics: bool,
    pub interlinear_ignores_punctuation: bool,
    pub occurrence_marker: String,
    pub omission_marker: String,
    pub render_neighbour_for_addition: bool,
    /// Provider of the base text.
    pub primary_provider: Option<Provider>,
    pub primary_translation: String,
    /// Provider of the comparison texts; the primary provider when unset.
    pub secondary_provider: Option<Provider>,
    pub secondary_translations: Vec<String>,
    pub font_family: String,
    pub font_size: f32,
}

impl Default for ApparatusSettings {
    fn default() -> Self {
        let render = RenderParams::default();
        Self {
            format: render.format,
            interlinear_ignores_case: false,
            interlinear_ignores_diacritics: false,
            interlinear_ignores_punctuation: false,
            occurrence_marker: render.occurrence_marker,
            omission_marker: render.omission_marker,
            render_neighbour_for_addition: render.render_neighbour_for_addition,
            primary_provider: None,
            primary_translation: String::new(),
            secondary_provider: None,
            secondary_translations: Vec::new(),
            font_family: render.font_family,
            font_size: render.font_size,
        }
    }
}

impl ApparatusSettings {
    pub fn interlinear_mode(&self) -> InterlinearMode {
        InterlinearMode::from_flags(
            self.interlinear_ignores_case,
            self.interlinear_ignores_diacritics,
            self.interlinear_ignores_punctuation,
        )
    }

    /// Build the render parameters for one render call.
    pub fn render_params(&self) -> RenderParams {
        RenderParams {
            format: self.format,
            interlinear_mode: self.interlinear_mode(),
            occurrence_marker: self.occurrence_marker.clone(),
            omission_marker: self.omission_marker.clone(),
            render_neighbour_for_addition: self.render_neighbour_for_addition,
            font_family: self.font_family.clone(),
            font_size: self.font_size,
        }
    }

    /// Provider of the comparison texts.
    pub fn comparison_provider(&self) -> Option<&Provider> {
        self.secondary_provider.as_ref().or(self.primary_provider.as_ref())
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if !(self.font_size.is_finite() && self.font_size > 0.0) {
            return Err(ConfigError::Invalid {
                field: "font_size",
                message: format!("must be a positive number, got {}", self.font_size),
            });
        }
        if self.font_family.contains(['<', '>', '{', '}', ';']) {
            return Err(ConfigError::Invalid {
                field: "font_family",
                message: format!("{:?} is not a CSS font list", self.font_family),
            });
        }
        Ok(())
    }
}

/// Load settings from a JSON file. Missing fields take their defaults.
pub fn load_settings(path: &Path) -> Result<ApparatusSettings, ConfigError> {
    let text = fs::read_to_string(path)?;
    let settings: ApparatusSettings = serde_json::from_str(&text)?;
    settings.validate()?;
    Ok(settings)
}
