//! Detection entry point for editor features.

use tracing::{debug, trace};
use url::Url;

use crate::client::LanguageDetectionWorkerClient;
use crate::error::DetectionResult;

/// Wraps a [`LanguageDetectionWorkerClient`] and honors the `enabled` switch:
/// while detection is disabled no worker is ever spawned.
#[derive(Debug)]
pub struct LanguageDetectionService {
    client: LanguageDetectionWorkerClient,
}

impl LanguageDetectionService {
    pub fn new(client: LanguageDetectionWorkerClient) -> Self {
        Self { client }
    }

    pub fn is_enabled(&self) -> bool {
        self.client.config().detection.enabled
    }

    pub fn client(&self) -> &LanguageDetectionWorkerClient {
        &self.client
    }

    pub async fn detect_language(&self, resource: &Url) -> DetectionResult<Option<String>> {
        if !self.is_enabled() {
            trace!("Language detection disabled, skipping {}", resource);
            return Ok(None);
        }
        let language = self.client.detect_language(resource).await?;
        debug!("Detected language for {}: {:?}", resource, language);
        Ok(language)
    }

    pub async fn detect_languages(&self, resource: &Url) -> DetectionResult<Vec<String>> {
        if !self.is_enabled() {
            trace!("Language detection disabled, skipping {}", resource);
            return Ok(Vec::new());
        }
        let languages = self.client.detect_languages(resource).await?;
        debug!("Ranked languages for {}: {:?}", resource, languages);
        Ok(languages)
    }

    pub async fn dispose(&self) {
        self.client.dispose().await;
    }
}
