//! Tarball extraction via the system `tar`.

use std::path::Path;
use std::time::Duration;

use async_trait::async_trait;

use super::process::ToolCommand;
use super::Extractor;
use crate::core::error::FetchError;

#[derive(Debug, Clone)]
pub struct TarExtractor {
    binary_path: String,
    timeout: Option<Duration>,
}

impl Default for TarExtractor {
    fn default() -> Self {
        Self::new()
    }
}

impl TarExtractor {
    pub fn new() -> Self {
        Self::with_binary_path("tar")
    }

    pub fn with_binary_path(binary_path: impl Into<String>) -> Self {
        Self {
            binary_path: binary_path.into(),
            timeout: None,
        }
    }

    pub fn with_timeout(mut self, timeout: Option<Duration>) -> Self {
        self.timeout = timeout;
        self
    }
}

#[async_trait]
impl Extractor for TarExtractor {
    async fn extract(&self, archive: &Path, into: &Path) -> Result<(), FetchError> {
        ToolCommand::new(&self.binary_path)
            .arg("-xf")
            .arg(archive)
            .arg("-C")
            .arg(into)
            .timeout(self.timeout)
            .run_checked()
            .await?;
        Ok(())
    }
}
