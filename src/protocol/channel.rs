use std::cell::RefCell;
use std::collections::HashMap;
use std::fmt;
use std::rc::Rc;
use std::sync::atomic::{AtomicU64, Ordering};

use serde_json::Value as JsonValue;
use thiserror::Error;
use tokio::sync::mpsc;
use tracing::trace;

static NEXT_WINDOW_ID: AtomicU64 = AtomicU64::new(1);

/// A browsing context that can send and receive messages.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct WindowId(u64);

impl WindowId {
    fn next() -> Self {
        Self(NEXT_WINDOW_ID.fetch_add(1, Ordering::SeqCst))
    }
}

impl fmt::Display for WindowId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "window-{}", self.0)
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct MessageEvent {
    pub source: WindowId,
    pub data: JsonValue,
}

pub type MessageReceiver = mpsc::UnboundedReceiver<MessageEvent>;

#[derive(Debug, Error, PartialEq, Eq)]
pub enum ChannelError {
    #[error("{0} is closed")]
    SourceClosed(WindowId),
    #[error("{0} is not reachable")]
    TargetClosed(WindowId),
}

/// Routes messages between open windows. Delivery is queued; receivers see
/// messages the next time they drain their inbox. No origin is checked on
/// delivery.
#[derive(Debug, Clone, Default)]
pub struct MessageChannel {
    routes: Rc<RefCell<HashMap<WindowId, mpsc::UnboundedSender<MessageEvent>>>>,
}

impl MessageChannel {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn open_window(&self) -> (WindowId, MessageReceiver) {
        let window = WindowId::next();
        let (tx, rx) = mpsc::unbounded_channel();
        self.routes.borrow_mut().insert(window, tx);
        trace!(target: "protocol", %window, "opened window");
        (window, rx)
    }

    /// Returns false when the window was already closed.
    pub fn close_window(&self, window: WindowId) -> bool {
        let closed = self.routes.borrow_mut().remove(&window).is_some();
        if closed {
            trace!(target: "protocol", %window, "closed window");
        }
        closed
    }

    pub fn is_open(&self, window: WindowId) -> bool {
        self.routes.borrow().contains_key(&window)
    }

    pub fn post_message(
        &self,
        source: WindowId,
        target: WindowId,
        data: JsonValue,
    ) -> Result<(), ChannelError> {
        let routes = self.routes.borrow();
        if !routes.contains_key(&source) {
            return Err(ChannelError::SourceClosed(source));
        }
        let route = routes
            .get(&target)
            .ok_or(ChannelError::TargetClosed(target))?;
        route
            .send(MessageEvent { source, data })
            .map_err(|_| ChannelError::TargetClosed(target))
    }
}
