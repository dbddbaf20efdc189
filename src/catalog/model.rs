use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use thiserror::Error;
use url::Url;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum InputKind {
    Image,
    Text,
    None,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Difficulty {
    Easy,
    Medium,
    Hard,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PromptInput {
    pub key: String,
    #[serde(rename = "type")]
    pub kind: InputKind,
    pub description: String,
    pub required: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub placeholder: Option<String>,
}

/// One catalog entry. `prompt` may contain bracketed `[...]` spans the end
/// user substitutes by hand; they are opaque to the server.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PromptTemplate {
    pub id: String,
    pub title: String,
    pub description: String,
    pub category: String,
    pub prompt: String,
    pub inputs: Vec<PromptInput>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub output_type: Option<String>,
    pub difficulty: Difficulty,
    pub tags: Vec<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub author: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub source_url: Option<String>,
    pub image_url: String,
}

#[derive(Debug, Error)]
pub enum CatalogError {
    #[error("invalid catalog document: {0}")]
    Parse(#[from] serde_json::Error),

    #[error("duplicate template id: {0}")]
    DuplicateId(String),

    #[error("duplicate input key {key} in template {template}")]
    DuplicateInputKey { template: String, key: String },

    #[error("template {template} has an invalid image url: {url}")]
    InvalidImageUrl { template: String, url: String },
}

/// Immutable snapshot of all prompt templates, validated once at load.
#[derive(Debug, Clone)]
pub struct Catalog {
    templates: Vec<PromptTemplate>,
}

const SEED_JSON: &str = include_str!("../../data/prompts.json");

impl Catalog {
    pub fn from_json(raw: &str) -> Result<Self, CatalogError> {
        let templates: Vec<PromptTemplate> = serde_json::from_str(raw)?;
        let mut seen_ids = HashSet::new();
        for template in &templates {
            if !seen_ids.insert(template.id.as_str()) {
                return Err(CatalogError::DuplicateId(template.id.clone()));
            }
            let mut seen_keys = HashSet::new();
            for input in &template.inputs {
                if !seen_keys.insert(input.key.as_str()) {
                    return Err(CatalogError::DuplicateInputKey {
                        template: template.id.clone(),
                        key: input.key.clone(),
                    });
                }
            }
            if Url::parse(&template.image_url).is_err() {
                return Err(CatalogError::InvalidImageUrl {
                    template: template.id.clone(),
                    url: template.image_url.clone(),
                });
            }
        }
        Ok(Self { templates })
    }

    pub fn load_embedded() -> Result<Self, CatalogError> {
        Self::from_json(SEED_JSON)
    }

    pub fn templates(&self) -> &[PromptTemplate] {
        &self.templates
    }

    pub fn get(&self, id: &str) -> Option<&PromptTemplate> {
        self.templates.iter().find(|template| template.id == id)
    }

    pub fn len(&self) -> usize {
        self.templates.len()
    }

    pub fn is_empty(&self) -> bool {
        self.templates.is_empty()
    }
}
