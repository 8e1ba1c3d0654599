use std::cell::{Cell, RefCell};
use std::fmt;
use std::rc::Rc;

use kuchiki::NodeRef;
use tracing::debug;

use crate::coerce::js_number_string;
use crate::config::Configuration;
use crate::protocol::{MessageChannel, MessageReceiver, ProtocolId, WindowId};

/// Inline style of a frame element at the given height.
pub fn frame_style(height: f64, width: &str) -> String {
    format!(
        "height: {}px; width: {}; border: none; display: block;",
        js_number_string(height),
        width
    )
}

struct FrameState {
    element: NodeRef,
    identifier: ProtocolId,
    content_window: Cell<Option<WindowId>>,
    inbox: RefCell<Option<MessageReceiver>>,
    document: String,
    config: Rc<Configuration>,
    height: Cell<f64>,
    channel: MessageChannel,
}

/// A frame embedded in a host page.
#[derive(Clone)]
pub struct FrameHandle {
    state: Rc<FrameState>,
}

impl FrameHandle {
    pub(crate) fn new(
        element: NodeRef,
        identifier: ProtocolId,
        content_window: (WindowId, MessageReceiver),
        document: String,
        config: Rc<Configuration>,
        channel: MessageChannel,
    ) -> Self {
        let (window, inbox) = content_window;
        let height = config.starting_height;
        Self {
            state: Rc::new(FrameState {
                element,
                identifier,
                content_window: Cell::new(Some(window)),
                inbox: RefCell::new(Some(inbox)),
                document,
                config,
                height: Cell::new(height),
                channel,
            }),
        }
    }

    pub fn element(&self) -> &NodeRef {
        &self.state.element
    }

    pub fn identifier(&self) -> &ProtocolId {
        &self.state.identifier
    }

    /// The window of the embedded document, until the frame is detached.
    pub fn content_window(&self) -> Option<WindowId> {
        self.state.content_window.get()
    }

    /// The generated frame document, before URL encoding.
    pub fn document_html(&self) -> &str {
        &self.state.document
    }

    pub fn config(&self) -> &Configuration {
        &self.state.config
    }

    pub fn height(&self) -> f64 {
        self.state.height.get()
    }

    pub fn is_attached(&self) -> bool {
        self.content_window().is_some()
    }

    pub(crate) fn take_inbox(&self) -> Option<MessageReceiver> {
        self.state.inbox.borrow_mut().take()
    }

    /// Clamps a reported height to `max_height` and writes it to the
    /// element style.
    pub(crate) fn apply_height(&self, reported: f64) -> f64 {
        let height = self
            .state
            .config
            .max_height
            .map_or(reported, |max| reported.min(max));
        self.state.height.set(height);
        if let Some(element) = self.state.element.as_element() {
            element.attributes.borrow_mut().insert(
                "style",
                frame_style(height, &self.state.config.width),
            );
        }
        height
    }

    /// Removes the frame from the page and closes its window. Returns false
    /// when it was already detached.
    pub fn detach(&self) -> bool {
        let Some(window) = self.state.content_window.take() else {
            return false;
        };
        self.state.channel.close_window(window);
        self.state.inbox.borrow_mut().take();
        self.state.element.detach();
        debug!(target: "frame", id = %self.state.identifier, "detached frame");
        true
    }
}

impl fmt::Debug for FrameHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("FrameHandle")
            .field("identifier", &self.state.identifier)
            .field("content_window", &self.content_window())
            .field("height", &self.height())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn formats_style() {
        assert_eq!(
            frame_style(120.0, "100%"),
            "height: 120px; width: 100%; border: none; display: block;"
        );
        assert_eq!(
            frame_style(80.5, "40em"),
            "height: 80.5px; width: 40em; border: none; display: block;"
        );
    }
}
