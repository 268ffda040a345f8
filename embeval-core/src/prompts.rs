//! Instruction prompts prepended to sentences for instruction-tuned encoders

use std::collections::HashMap;

use crate::encoder::EncoderInput;
use crate::error::{Error, Result};

/// Models that ship with built-in classification instructions
pub const INSTRUCTOR_MODELS: [&str; 2] = ["hku-nlp/instructor-large", "hku-nlp/instructor-xl"];

const MASSIVE_INTENT: &str = "Represent the purpose for classifying the purpose as one of qa_maths, takeaway_order, weather_query, \
audio_volume_other, recommendation_movies, iot_cleaning, qa_stock, \
iot_hue_lighton, iot_hue_lightchange, alarm_remove, play_radio, \
transport_taxi, datetime_query, lists_remove, lists_createoradd, \
datetime_convert, play_music, iot_hue_lightdim, email_querycontact, qa_factoid, \
cooking_query, music_query, qa_currency, calendar_query, music_settings, \
music_dislikeness, audio_volume_mute, cooking_recipe, general_joke, play_game, \
news_query, recommendation_events, music_likeness, audio_volume_down, \
calendar_remove, iot_coffee, transport_traffic, iot_wemo_off, email_sendemail, \
iot_hue_lightup, social_query, social_post, iot_hue_lightoff, transport_query, \
general_greet, play_podcasts, alarm_query, calendar_set, alarm_set, \
transport_ticket, general_quirky, audio_volume_up, iot_wemo_on, qa_definition, \
recommendation_locations, play_audiobook, email_addcontact, takeaway_query, \
lists_query or email_query; Input: ";

/// Task name to instruction, shared by every instructor model
const INSTRUCTOR_TASKS: [(&str, &str); 12] = [
    (
        "Banking77Classification",
        "Represent banking purpose for retrieving duplicate purposes; Input: ",
    ),
    (
        "EmotionClassification",
        "Represent an emotion sentence for classifying the emotion as one of \
         love, sadness, joy, fear, surprise or anger; Input: ",
    ),
    (
        "TweetSentimentExtractionClassification",
        "Represent the sentence for classification; Input: ",
    ),
    (
        "AmazonCounterfactualClassification",
        "Represent the counter-factual sentence for classification; Input: ",
    ),
    (
        "ImdbClassification",
        "Represent the review sentence for classifying emotion as positive or negative; Input: ",
    ),
    ("MassiveIntentClassification", MASSIVE_INTENT),
    (
        "MassiveScenarioClassification",
        "Represent the scene for classifying its scene as one of calendar, \
         play, general, alarm, music, iot, audio, takeaway, datetime, recommendation, \
         social, lists, email, transport, cooking, weather, news or qa; Input: ",
    ),
    ("MTOPDomainClassification", "Represent a domain:\n"),
    ("MTOPIntentClassification", "Represent the intent:\n"),
    (
        "ToxicConversationsClassification",
        "Represent the toxiticy comment for classifying its toxiticy as toxic or non-toxic; Input: ",
    ),
    (
        "AmazonPolarityClassification",
        "Represent the sentiment comment for retrieving a duplicate sentence; Input: ",
    ),
    (
        "AmazonReviewsClassification",
        "Represent the review sentence for classifying the emotion as positive or negative; Input: ",
    ),
];

/// Lookup table of `(model, task) -> instruction`
#[derive(Debug, Clone)]
pub struct PromptRegistry {
    prompts: HashMap<String, HashMap<String, String>>,
}

impl PromptRegistry {
    /// Registry with no entries
    pub fn empty() -> Self {
        Self {
            prompts: HashMap::new(),
        }
    }

    /// Registry preloaded with the instructor model prompts
    pub fn builtin() -> Self {
        let mut registry = Self::empty();
        for model in INSTRUCTOR_MODELS {
            for (task, instruction) in INSTRUCTOR_TASKS {
                registry.insert(model, task, instruction);
            }
        }
        registry
    }

    /// Add or replace one instruction
    pub fn insert(
        &mut self,
        model: impl Into<String>,
        task: impl Into<String>,
        instruction: impl Into<String>,
    ) {
        self.prompts
            .entry(model.into())
            .or_default()
            .insert(task.into(), instruction.into());
    }

    /// Merge `model -> task -> instruction` entries, replacing existing ones
    pub fn extend(&mut self, extra: &HashMap<String, HashMap<String, String>>) {
        for (model, tasks) in extra {
            for (task, instruction) in tasks {
                self.insert(model.clone(), task.clone(), instruction.clone());
            }
        }
    }

    pub fn lookup(&self, model: &str, task: &str) -> Result<&str> {
        self.prompts
            .get(model)
            .and_then(|tasks| tasks.get(task))
            .map(String::as_str)
            .ok_or_else(|| Error::Prompt {
                model: model.to_string(),
                task: task.to_string(),
            })
    }
}

impl Default for PromptRegistry {
    fn default() -> Self {
        Self::builtin()
    }
}

/// Pair every sentence with `instruction`
pub fn apply_prompt(sentences: &[String], instruction: &str) -> Vec<EncoderInput> {
    sentences
        .iter()
        .map(|s| EncoderInput::Instructed {
            instruction: instruction.to_string(),
            text: s.clone(),
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_builtin_covers_both_models() {
        let registry = PromptRegistry::builtin();
        for model in INSTRUCTOR_MODELS {
            assert_eq!(
                registry.lookup(model, "MTOPIntentClassification").unwrap(),
                "Represent the intent:\n"
            );
            assert!(
                registry
                    .lookup(model, "MassiveIntentClassification")
                    .unwrap()
                    .ends_with("lists_query or email_query; Input: ")
            );
        }
    }

    #[test]
    fn test_continuation_lines_keep_single_spaces() {
        let registry = PromptRegistry::builtin();
        let emotion = registry
            .lookup("hku-nlp/instructor-xl", "EmotionClassification")
            .unwrap();
        assert!(emotion.contains("one of love, sadness"));
        assert!(!emotion.contains("  "));
    }

    #[test]
    fn test_missing_prompt() {
        let registry = PromptRegistry::builtin();
        let err = registry
            .lookup("hku-nlp/instructor-large", "NoSuchTask")
            .unwrap_err();
        assert!(matches!(err, Error::Prompt { .. }));
        assert!(err.to_string().contains("NoSuchTask"));
    }

    #[test]
    fn test_extend_overrides() {
        let mut registry = PromptRegistry::builtin();
        let mut extra = HashMap::new();
        extra.insert(
            "my-model".to_string(),
            HashMap::from([("ImdbClassification".to_string(), "Review: ".to_string())]),
        );
        registry.extend(&extra);
        assert_eq!(registry.lookup("my-model", "ImdbClassification").unwrap(), "Review: ");
    }

    #[test]
    fn test_apply_prompt() {
        let inputs = apply_prompt(&["hello".to_string()], "Represent: ");
        assert_eq!(inputs[0].render(), "Represent: hello");
    }
}
