//! OpenAI chat-completion extractor.

use super::{parse_recommendations, RecommendationExtractor};
use crate::config::{ExtractionSettings, Prompts};
use crate::error::{Result, TipsterError};
use crate::openai::create_client;
use crate::store::RecommendationEntry;
use crate::transcript::Transcript;
use async_openai::types::{
    ChatCompletionRequestMessage, ChatCompletionRequestSystemMessageArgs,
    ChatCompletionRequestUserMessageArgs, CreateChatCompletionRequestArgs, ResponseFormat,
};
use async_trait::async_trait;
use std::collections::HashMap;
use tracing::{debug, info, instrument};

/// Extracts recommendations with an OpenAI chat model in JSON mode.
pub struct OpenAIExtractor {
    client: async_openai::Client<async_openai::config::OpenAIConfig>,
    model: String,
    temperature: f32,
    max_completion_tokens: u32,
    prompts: Prompts,
}

impl OpenAIExtractor {
    pub fn with_config(settings: &ExtractionSettings) -> Result<Self> {
        Ok(Self {
            client: create_client(settings)?,
            model: settings.model.clone(),
            temperature: settings.temperature,
            max_completion_tokens: settings.max_completion_tokens,
            prompts: Prompts::default(),
        })
    }

    /// Set custom prompts (with user-defined variables).
    pub fn with_prompts(mut self, prompts: Prompts) -> Self {
        self.prompts = prompts;
        self
    }

    fn user_prompt(&self, transcript: &Transcript) -> String {
        let mut vars = HashMap::new();
        vars.insert("transcript".to_string(), transcript.format_with_timestamps());
        vars.insert("video_id".to_string(), transcript.video_id.clone());
        self.prompts.render_with_custom(&self.prompts.extraction.user, &vars)
    }
}

#[async_trait]
impl RecommendationExtractor for OpenAIExtractor {
    #[instrument(skip(self, transcript), fields(video_id = %transcript.video_id))]
    async fn extract(&self, transcript: &Transcript) -> Result<Vec<RecommendationEntry>> {
        info!("Extracting recommendations with {}", self.model);

        let messages: Vec<ChatCompletionRequestMessage> = vec![
            ChatCompletionRequestSystemMessageArgs::default()
                .content(self.prompts.extraction.system.clone())
                .build()
                .map_err(|e| TipsterError::ExtractionFailed(e.to_string()))?
                .into(),
            ChatCompletionRequestUserMessageArgs::default()
                .content(self.user_prompt(transcript))
                .build()
                .map_err(|e| TipsterError::ExtractionFailed(e.to_string()))?
                .into(),
        ];

        let request = CreateChatCompletionRequestArgs::default()
            .model(&self.model)
            .messages(messages)
            .temperature(self.temperature)
            .max_completion_tokens(self.max_completion_tokens)
            .response_format(ResponseFormat::JsonObject)
            .build()
            .map_err(|e| TipsterError::ExtractionFailed(e.to_string()))?;

        let response = self
            .client
            .chat()
            .create(request)
            .await
            .map_err(|e| TipsterError::ExtractionFailed(format!("OpenAI API error: {}", e)))?;

        let content = response
            .choices
            .first()
            .and_then(|c| c.message.content.as_ref())
            .ok_or_else(|| TipsterError::ExtractionFailed("Empty response from model".to_string()))?;

        let recommendations = parse_recommendations(content)?;
        debug!("Model returned {} recommendations", recommendations.len());
        Ok(recommendations)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::transcript::TranscriptSegment;

    #[test]
    fn test_user_prompt_embeds_timed_transcript() {
        let mut prompts = Prompts::default();
        prompts.extraction.user = "Video {{video_id}}:\n{{transcript}}".to_string();

        let extractor = OpenAIExtractor::with_config(&ExtractionSettings::default())
            .unwrap()
            .with_prompts(prompts);

        let transcript = Transcript::new(
            "abc123".to_string(),
            vec![TranscriptSegment::new(75.0, 2.0, "I like Costco".to_string())],
        );

        assert_eq!(extractor.user_prompt(&transcript), "Video abc123:\n[75s] I like Costco");
    }
}
