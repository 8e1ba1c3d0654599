use std::cell::{Cell, RefCell};
use std::future::poll_fn;
use std::rc::Rc;
use std::sync::Arc;

use html5ever::{LocalName, Namespace, QualName};
use kuchiki::traits::*;
use kuchiki::{Attribute, ExpandedName, NodeRef};
use tracing::{debug, info};

use super::handle::{frame_style, FrameHandle};
use super::listeners::{ActionListeners, ListenerId};
use super::placement::{check_placement, insert_frame};
use super::services::{Clipboard, DownloadSink, HostServices};
use super::EmbedError;
use crate::config::{
    activated_class_list, resolve, ActionInvocation, Configuration, Options, PageDefaults,
    Placement, SourceElement, ACTIVATED_MARKER,
};
use crate::markup::{MarkupGenerator, MarkupRequest, PrismMarkup};
use crate::protocol::{
    Dispatch, EmbeddedContent, FrameReceiver, MessageChannel, MessageEvent, MessageReceiver,
    ProtocolId, SenderError, WindowId,
};
use crate::text::{element_code_text, encode_uri_component, escape_for_markup, unindent_to_minimum};

/// Elements picked up by [`HostPage::prismize_all`].
pub const TRIGGER_SELECTOR: &str = "[data-prismize], .prismize";

const HTML_NAMESPACE: &str = "http://www.w3.org/1999/xhtml";

/// Document loading phases, as seen by the bulk trigger.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReadyState {
    Loading,
    Interactive,
    Complete,
}

/// Measures rendered elements.
pub trait Layout {
    fn client_height(&self, node: &NodeRef) -> f64;
}

impl<F> Layout for F
where
    F: Fn(&NodeRef) -> f64,
{
    fn client_height(&self, node: &NodeRef) -> f64 {
        self(node)
    }
}

/// Layout for documents that are never rendered: everything is 0 high.
#[derive(Debug, Clone, Copy, Default)]
pub struct NoLayout;

impl Layout for NoLayout {
    fn client_height(&self, _node: &NodeRef) -> f64 {
        0.0
    }
}

/// The code to embed: raw text, or an element whose text and attributes
/// seed the configuration.
#[derive(Debug, Clone)]
pub enum Content {
    Text(String),
    Element(NodeRef),
}

impl From<&str> for Content {
    fn from(text: &str) -> Self {
        Content::Text(text.to_string())
    }
}

impl From<String> for Content {
    fn from(text: String) -> Self {
        Content::Text(text)
    }
}

impl From<NodeRef> for Content {
    fn from(node: NodeRef) -> Self {
        Content::Element(node)
    }
}

/// A page that embeds code frames and answers their messages.
pub struct HostPage {
    document: NodeRef,
    window: WindowId,
    channel: MessageChannel,
    inbox: RefCell<MessageReceiver>,
    defaults: Arc<PageDefaults>,
    markup: Box<dyn MarkupGenerator>,
    layout: Box<dyn Layout>,
    services: HostServices,
    receivers: RefCell<Vec<Rc<FrameReceiver>>>,
    ready_state: Cell<ReadyState>,
    bulk_pending: Cell<bool>,
}

impl HostPage {
    pub fn new(document: NodeRef, defaults: Arc<PageDefaults>) -> Self {
        let channel = MessageChannel::new();
        let (window, inbox) = channel.open_window();
        Self {
            document,
            window,
            channel,
            inbox: RefCell::new(inbox),
            defaults,
            markup: Box::new(PrismMarkup),
            layout: Box::new(NoLayout),
            services: HostServices::default(),
            receivers: RefCell::new(Vec::new()),
            ready_state: Cell::new(ReadyState::Complete),
            bulk_pending: Cell::new(false),
        }
    }

    pub fn parse(html: &str, defaults: Arc<PageDefaults>) -> Self {
        Self::new(kuchiki::parse_html().one(html), defaults)
    }

    pub fn with_clipboard(mut self, clipboard: impl Clipboard + 'static) -> Self {
        self.services.clipboard = Rc::new(clipboard);
        self
    }

    pub fn with_downloads(mut self, downloads: impl DownloadSink + 'static) -> Self {
        self.services.downloads = Rc::new(downloads);
        self
    }

    pub fn with_layout(mut self, layout: impl Layout + 'static) -> Self {
        self.layout = Box::new(layout);
        self
    }

    pub fn with_markup(mut self, markup: impl MarkupGenerator + 'static) -> Self {
        self.markup = Box::new(markup);
        self
    }

    pub fn with_ready_state(self, state: ReadyState) -> Self {
        self.ready_state.set(state);
        self
    }

    pub fn document(&self) -> &NodeRef {
        &self.document
    }

    pub fn window(&self) -> WindowId {
        self.window
    }

    pub fn channel(&self) -> &MessageChannel {
        &self.channel
    }

    pub fn defaults(&self) -> &PageDefaults {
        &self.defaults
    }

    pub fn action_listeners(&self) -> &ActionListeners {
        &self.services.listeners
    }

    /// Subscribes to every custom action of every frame on this page.
    pub fn listen_to_actions(
        &self,
        listener: impl Fn(&ActionInvocation<'_>) -> anyhow::Result<()> + 'static,
    ) -> ListenerId {
        self.services.listeners.add(listener)
    }

    pub fn frames(&self) -> Vec<FrameHandle> {
        self.receivers
            .borrow()
            .iter()
            .map(|receiver| receiver.frame().clone())
            .collect()
    }

    pub fn ready_state(&self) -> ReadyState {
        self.ready_state.get()
    }

    /// Updates the ready state and runs a deferred bulk trigger once the
    /// document is no longer loading.
    pub fn set_ready_state(&self, state: ReadyState) -> Result<Vec<FrameHandle>, EmbedError> {
        self.ready_state.set(state);
        if state != ReadyState::Loading && self.bulk_pending.replace(false) {
            return self.embed_triggers();
        }
        Ok(Vec::new())
    }

    /// Embeds `content` as a frame and starts listening to it.
    pub fn prismize(
        &self,
        content: impl Into<Content>,
        language: Option<&str>,
        options: Options,
    ) -> Result<FrameHandle, EmbedError> {
        let options = match language {
            Some(language) => options.language(language),
            None => options,
        };
        let (code, source_node) = match content.into() {
            Content::Text(code) => (code, None),
            Content::Element(node) => (element_code_text(&node), Some(node)),
        };
        let source = source_node.as_ref().map(|node| SourceElement {
            node,
            client_height: self.layout.client_height(node),
        });
        let config = Rc::new(resolve(&options, source, &self.defaults));

        let (placeholder, placement) = self.insertion_point(&config)?;

        let identifier = ProtocolId::generate();
        let code = escape_for_markup(&unindent_to_minimum(&code, config.tab_size, true));
        let document = self.markup.generate(&MarkupRequest {
            config: &config,
            language: config.language_or_default(),
            code: &code,
            identifier: &identifier,
        })?;

        let element = frame_element(&config, &document);
        let frame = FrameHandle::new(
            element.clone(),
            identifier,
            self.channel.open_window(),
            document,
            Rc::clone(&config),
            self.channel.clone(),
        );
        self.receivers.borrow_mut().push(Rc::new(FrameReceiver::new(
            frame.clone(),
            self.window,
            self.channel.clone(),
            self.services.clone(),
        )));

        insert_frame(&element, &placeholder, placement);
        if let Some(node) = &source_node {
            mark_activated(node);
        }
        info!(
            target: "frame",
            id = %frame.identifier(),
            language = %config.language_or_default(),
            ?placement,
            "embedded frame"
        );

        if let Some(on_load) = &config.callbacks.on_load {
            on_load(&element, config.as_ref());
        }
        Ok(frame)
    }

    /// Embeds every declarative trigger that has not been embedded yet.
    /// While the document is loading this is deferred until
    /// [`HostPage::set_ready_state`] moves past `Loading`.
    pub fn prismize_all(&self) -> Result<Vec<FrameHandle>, EmbedError> {
        if self.ready_state.get() == ReadyState::Loading {
            debug!(target: "frame", "document still loading, deferring bulk trigger");
            self.bulk_pending.set(true);
            return Ok(Vec::new());
        }
        self.embed_triggers()
    }

    fn embed_triggers(&self) -> Result<Vec<FrameHandle>, EmbedError> {
        let pending: Vec<NodeRef> = self
            .document
            .select(TRIGGER_SELECTOR)
            .map_err(|_| EmbedError::Selector(TRIGGER_SELECTOR))?
            .map(|element| element.as_node().clone())
            .filter(|node| !is_activated(node))
            .collect();

        debug!(target: "frame", count = pending.len(), "running bulk trigger");
        pending
            .into_iter()
            .map(|node| self.prismize(node, None, Options::new()))
            .collect()
    }

    fn insertion_point(&self, config: &Configuration) -> Result<(NodeRef, Placement), EmbedError> {
        let (placeholder, default) = match &config.placeholder {
            Some(node) => (node.clone(), Placement::Replace),
            None => (self.body()?, Placement::End),
        };
        let placement = config.placement.unwrap_or(default);
        check_placement(&placeholder, placement)?;
        Ok((placeholder, placement))
    }

    fn body(&self) -> Result<NodeRef, EmbedError> {
        self.document
            .select_first("body")
            .map(|body| body.as_node().clone())
            .map_err(|_| EmbedError::MissingBody)
    }

    /// Loads the embedded side of `frame` so it can report and click.
    pub fn load_frame(&self, frame: &FrameHandle) -> Result<EmbeddedContent, SenderError> {
        let window = frame.content_window().ok_or(SenderError::Detached)?;
        let inbox = frame.take_inbox().ok_or(SenderError::AlreadyLoaded)?;
        EmbeddedContent::load(
            frame.document_html(),
            window,
            inbox,
            self.window,
            self.channel.clone(),
        )
    }

    /// Hands one message to every frame listener.
    pub fn dispatch(&self, event: &MessageEvent) -> Vec<Dispatch> {
        let receivers: Vec<Rc<FrameReceiver>> = self.receivers.borrow().clone();
        receivers
            .iter()
            .map(|receiver| receiver.handle(event))
            .filter(|dispatch| *dispatch != Dispatch::Ignored)
            .collect()
    }

    /// Handles every queued message. Copy actions need a `LocalSet`.
    pub fn pump(&self) -> Vec<Dispatch> {
        let mut handled = Vec::new();
        loop {
            let event = match self.inbox.borrow_mut().try_recv() {
                Ok(event) => event,
                Err(_) => break,
            };
            handled.extend(self.dispatch(&event));
        }
        handled
    }

    /// Handles messages as they arrive. Must run inside a `LocalSet`.
    pub async fn run(&self) {
        while let Some(event) = poll_fn(|cx| self.inbox.borrow_mut().poll_recv(cx)).await {
            self.dispatch(&event);
        }
    }

    pub fn to_html(&self) -> String {
        self.document.to_string()
    }
}

impl std::fmt::Debug for HostPage {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("HostPage")
            .field("window", &self.window)
            .field("frames", &self.receivers.borrow().len())
            .field("ready_state", &self.ready_state.get())
            .finish_non_exhaustive()
    }
}

fn frame_element(config: &Configuration, document: &str) -> NodeRef {
    let name = QualName::new(None, Namespace::from(HTML_NAMESPACE), LocalName::from("iframe"));
    let element = NodeRef::new_element(name, Vec::<(ExpandedName, Attribute)>::new());
    if let Some(data) = element.as_element() {
        let mut attributes = data.attributes.borrow_mut();
        if let Some(id) = &config.id {
            attributes.insert("id", id.clone());
        }
        if let Some(class) = &config.class_name {
            attributes.insert("class", class.clone());
        }
        attributes.insert("style", frame_style(config.starting_height, &config.width));
        attributes.insert(
            "src",
            format!("data:text/html;charset=UTF-8,{}", encode_uri_component(document)),
        );
    }
    element
}

fn class_attribute(node: &NodeRef) -> Option<String> {
    let element = node.as_element()?;
    let attributes = element.attributes.borrow();
    attributes.get("class").map(str::to_string)
}

fn is_activated(node: &NodeRef) -> bool {
    class_attribute(node)
        .map_or(false, |class| class.split_whitespace().any(|token| token == ACTIVATED_MARKER))
}

/// Renames the pending marker, adding the activated one if the element
/// was triggered by attribute alone.
fn mark_activated(node: &NodeRef) {
    let Some(element) = node.as_element() else {
        return;
    };
    let mut class = activated_class_list(&class_attribute(node).unwrap_or_default());
    if !class.split_whitespace().any(|token| token == ACTIVATED_MARKER) {
        if !class.is_empty() {
            class.push(' ');
        }
        class.push_str(ACTIVATED_MARKER);
    }
    element.attributes.borrow_mut().insert("class", class);
}
