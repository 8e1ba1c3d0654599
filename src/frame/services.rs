use std::cell::RefCell;
use std::fs;
use std::io;
use std::path::{Path, PathBuf};
use std::rc::Rc;

use chrono::{DateTime, SecondsFormat, Utc};
use futures_util::future::{FutureExt, LocalBoxFuture};
use thiserror::Error;
use tracing::info;

use super::listeners::ActionListeners;
use crate::config::Configuration;
use crate::text::encode_uri_component;

#[derive(Debug, Error)]
pub enum ClipboardError {
    #[error("clipboard unavailable: {0}")]
    Unavailable(String),
    #[error("clipboard write rejected: {0}")]
    Rejected(String),
}

/// Asynchronous text clipboard.
pub trait Clipboard {
    fn write_text(&self, text: String) -> LocalBoxFuture<'static, Result<(), ClipboardError>>;
}

/// Clipboard that keeps the last written text in memory.
#[derive(Debug, Clone, Default)]
pub struct MemoryClipboard {
    contents: Rc<RefCell<Option<String>>>,
}

impl MemoryClipboard {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn contents(&self) -> Option<String> {
        self.contents.borrow().clone()
    }
}

impl Clipboard for MemoryClipboard {
    fn write_text(&self, text: String) -> LocalBoxFuture<'static, Result<(), ClipboardError>> {
        let contents = Rc::clone(&self.contents);
        async move {
            *contents.borrow_mut() = Some(text);
            Ok(())
        }
        .boxed_local()
    }
}

/// A code block packaged for saving.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DownloadArtifact {
    pub file_name: String,
    pub href: String,
    pub contents: String,
}

impl DownloadArtifact {
    /// Names the file after `download_name`, or after the language and the
    /// time of the click.
    pub fn for_code(config: &Configuration, code: &str, now: DateTime<Utc>) -> Self {
        let file_name = config.download_name.clone().unwrap_or_else(|| {
            format!(
                "{} ({}).txt",
                config.language.as_deref().unwrap_or("code"),
                now.to_rfc3339_opts(SecondsFormat::Millis, true)
            )
        });
        Self {
            file_name,
            href: format!("data:text/plain;charset=utf-8,{}", encode_uri_component(code)),
            contents: code.to_string(),
        }
    }
}

#[derive(Debug, Error)]
pub enum DownloadError {
    #[error("failed to write download: {0}")]
    Io(#[from] io::Error),
    #[error("downloads unavailable: {0}")]
    Unavailable(String),
}

pub trait DownloadSink {
    fn save(&self, artifact: &DownloadArtifact) -> Result<(), DownloadError>;
}

/// Collects downloads in memory.
#[derive(Debug, Clone, Default)]
pub struct MemoryDownloads {
    saved: Rc<RefCell<Vec<DownloadArtifact>>>,
}

impl MemoryDownloads {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn saved(&self) -> Vec<DownloadArtifact> {
        self.saved.borrow().clone()
    }
}

impl DownloadSink for MemoryDownloads {
    fn save(&self, artifact: &DownloadArtifact) -> Result<(), DownloadError> {
        self.saved.borrow_mut().push(artifact.clone());
        Ok(())
    }
}

/// Writes downloads as files into a directory.
#[derive(Debug, Clone)]
pub struct DirectoryDownloads {
    dir: PathBuf,
}

impl DirectoryDownloads {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }
}

impl DownloadSink for DirectoryDownloads {
    fn save(&self, artifact: &DownloadArtifact) -> Result<(), DownloadError> {
        let file_name: String = artifact
            .file_name
            .chars()
            .map(|c| match c {
                '/' | '\\' | ':' | '\0' => '_',
                c => c,
            })
            .collect();
        let path = self.dir.join(file_name);
        fs::write(&path, &artifact.contents)?;
        info!(target: "frame", path = %path.display(), "saved download");
        Ok(())
    }
}

/// Side-effect services shared by every frame of a page.
#[derive(Clone)]
pub struct HostServices {
    pub clipboard: Rc<dyn Clipboard>,
    pub downloads: Rc<dyn DownloadSink>,
    pub listeners: ActionListeners,
}

impl Default for HostServices {
    fn default() -> Self {
        Self {
            clipboard: Rc::new(MemoryClipboard::new()),
            downloads: Rc::new(MemoryDownloads::new()),
            listeners: ActionListeners::new(),
        }
    }
}

impl std::fmt::Debug for HostServices {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("HostServices")
            .field("listeners", &self.listeners)
            .finish_non_exhaustive()
    }
}
