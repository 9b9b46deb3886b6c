//! Media index notifier that records announcements in the log
//!
//! Desktop shells have no central media index; hosts with one provide their
//! own [`MediaIndexPort`].

use std::path::{Path, PathBuf};
use std::sync::Mutex;

use async_trait::async_trait;
use tracing::info;

use crate::error::SmartSplitResult;
use crate::ports::MediaIndexPort;

#[derive(Default)]
pub struct LogMediaIndex {
    announced: Mutex<Vec<PathBuf>>,
}

impl LogMediaIndex {
    pub fn new() -> Self {
        Self::default()
    }

    /// Files announced so far, in announcement order
    pub fn announced(&self) -> Vec<PathBuf> {
        match self.announced.lock() {
            Ok(guard) => guard.clone(),
            Err(poisoned) => poisoned.into_inner().clone(),
        }
    }
}

#[async_trait]
impl MediaIndexPort for LogMediaIndex {
    async fn notify(&self, path: &Path, mime_type: &str) -> SmartSplitResult<()> {
        info!(mime = mime_type, "Media index notified of {}", path.display());
        match self.announced.lock() {
            Ok(mut guard) => guard.push(path.to_path_buf()),
            Err(poisoned) => poisoned.into_inner().push(path.to_path_buf()),
        }
        Ok(())
    }
}
