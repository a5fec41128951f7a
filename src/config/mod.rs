//! Configuration module for Tipster.
//!
//! Handles loading and managing application settings and prompt templates.

mod prompts;
mod settings;

pub use prompts::{ExtractionPrompts, Prompts};
pub use settings::{
    ExtractionSettings, GeneralSettings, PromptSettings, ServerSettings, Settings, StoreSettings,
    TranscriptSettings, UsageSettings, YoutubeSettings,
};
