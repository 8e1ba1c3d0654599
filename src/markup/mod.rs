//! Generation of the documents loaded into frames.

mod assets;
mod document;

use thiserror::Error;

use crate::config::Configuration;
use crate::protocol::ProtocolId;

pub use assets::{fill_template, AssetPaths, ASSET_VERSION};
pub use document::{info_bar, language_hue, word_value, PrismMarkup};

#[derive(Debug, Error)]
pub enum MarkupError {
    #[error("asset template {0:?} has no [[path]] placeholder")]
    Template(String),
    #[error("failed to encode frame manifest: {0}")]
    Manifest(#[from] serde_json::Error),
    #[error(transparent)]
    Other(#[from] anyhow::Error),
}

/// Everything a generator needs for one frame. `code` is already unindented
/// and escaped.
#[derive(Debug, Clone, Copy)]
pub struct MarkupRequest<'a> {
    pub config: &'a Configuration,
    pub language: &'a str,
    pub code: &'a str,
    pub identifier: &'a ProtocolId,
}

pub trait MarkupGenerator {
    fn generate(&self, request: &MarkupRequest<'_>) -> Result<String, MarkupError>;
}
