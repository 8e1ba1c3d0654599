//! Frame lifecycle on the host page.

mod handle;
mod host;
mod listeners;
mod placement;
mod services;

use thiserror::Error;

use crate::markup::MarkupError;

pub use handle::{frame_style, FrameHandle};
pub use host::{Content, HostPage, Layout, NoLayout, ReadyState, TRIGGER_SELECTOR};
pub use listeners::{ActionListeners, ListenerId};
pub use services::{
    Clipboard, ClipboardError, DirectoryDownloads, DownloadArtifact, DownloadError, DownloadSink,
    HostServices, MemoryClipboard, MemoryDownloads,
};

#[derive(Debug, Error)]
pub enum EmbedError {
    #[error("failed to generate frame markup: {0}")]
    Markup(#[from] MarkupError),
    #[error("placeholder has no parent to place the frame next to")]
    DetachedPlaceholder,
    #[error("document has no body")]
    MissingBody,
    #[error("invalid selector {0}")]
    Selector(&'static str),
}
