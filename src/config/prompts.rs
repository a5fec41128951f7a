//! Prompt templates for Tipster.
//!
//! Prompts can be customized by placing TOML files in the custom prompts directory.

use regex::{Captures, Regex};
use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use std::sync::LazyLock;

static VARIABLE_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\{\{(\w+)\}\}").expect("valid template variable regex"));

/// Collection of all prompt templates.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
#[derive(Default)]
pub struct Prompts {
    pub extraction: ExtractionPrompts,
    /// Custom variables from config, available in all prompts.
    #[serde(skip)]
    pub variables: std::collections::HashMap<String, String>,
}

/// Prompts for extracting stock recommendations from a transcript.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ExtractionPrompts {
    pub system: String,
    pub user: String,
}

impl Default for ExtractionPrompts {
    fn default() -> Self {
        Self {
            system: r#"You are a financial analysis assistant. You will be given the transcript of a YouTube video in which a financial YouTuber discusses various stocks. Not every stock mentioned is a recommendation; some are examples of poor performance.

Your task:
Identify only the stocks explicitly recommended by the speaker.
For each recommendation, provide:
- company_name: The correct, full company name (even if the speaker or transcript spells it incorrectly).
- ticker: The valid stock ticker with its exchange in the format EXCHANGE:SYMBOL, such as NASDAQ:AAPL or NYSE:DIS.
- timestamp: The time (in seconds) when the company is first mentioned.
- reason: A brief explanation of the speaker's justification or context for recommending that stock.

Return the results as a valid JSON object with the following structure:

{
  "recommendations": [
    {
      "company_name": "<company_name>",
      "ticker": "<EXCHANGE:SYMBOL>",
      "timestamp": <timestamp_in_seconds>,
      "reason": "<brief_reason>"
    }
  ]
}

If the speaker recommends no stocks, return {"recommendations": []}."#
                .to_string(),

            user: r#"Analyze the transcript below. Each line starts with its timestamp in seconds.

{{transcript}}

Return the recommendations."#
                .to_string(),
        }
    }
}

impl Prompts {
    /// Load prompts from the default location, with optional custom directory and variables.
    pub fn load(
        custom_dir: Option<&str>,
        custom_variables: Option<&std::collections::HashMap<String, String>>,
    ) -> crate::error::Result<Self> {
        let mut prompts = Prompts::default();

        if let Some(vars) = custom_variables {
            prompts.variables = vars.clone();
        }

        if let Some(dir) = custom_dir {
            let custom_path = PathBuf::from(shellexpand::tilde(dir).to_string());

            let extraction_path = custom_path.join("extraction.toml");
            if extraction_path.exists() {
                let content = std::fs::read_to_string(&extraction_path)?;
                prompts.extraction = toml::from_str(&content)?;
            }
        }

        Ok(prompts)
    }

    /// Render a prompt template with the given variables.
    ///
    /// Substitution is a single pass over the template, so substituted values
    /// are never scanned for placeholders. Unknown placeholders are kept as is.
    pub fn render(template: &str, vars: &std::collections::HashMap<String, String>) -> String {
        VARIABLE_RE
            .replace_all(template, |caps: &Captures| match vars.get(&caps[1]) {
                Some(value) => value.clone(),
                None => caps[0].to_string(),
            })
            .into_owned()
    }

    /// Render a prompt template with both provided variables and custom config variables.
    /// Provided variables take precedence over custom config variables.
    pub fn render_with_custom(
        &self,
        template: &str,
        vars: &std::collections::HashMap<String, String>,
    ) -> String {
        let mut merged = self.variables.clone();
        for (key, value) in vars {
            merged.insert(key.clone(), value.clone());
        }
        Self::render(template, &merged)
    }
}
