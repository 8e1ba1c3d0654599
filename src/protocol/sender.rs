use std::cell::{Cell, RefCell};
use std::future::poll_fn;
use std::rc::Rc;
use std::time::Duration;

use kuchiki::traits::*;
use thiserror::Error;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tracing::{debug, trace};

use super::channel::{ChannelError, MessageChannel, MessageEvent, MessageReceiver, WindowId};
use super::message::{ActionReply, FrameManifest, FrameMessage, MANIFEST_ELEMENT_ID};

/// How long a control shows its success or failure state.
pub const FEEDBACK_WINDOW: Duration = Duration::from_millis(1000);

#[derive(Debug, Error)]
pub enum SenderError {
    #[error("frame document has no manifest")]
    MissingManifest,
    #[error("invalid frame manifest: {0}")]
    Manifest(#[from] serde_json::Error),
    #[error("frame document has no code block")]
    MissingCode,
    #[error("no control for action {0:?}")]
    UnknownAction(String),
    #[error("frame is detached")]
    Detached,
    #[error("frame content is already loaded")]
    AlreadyLoaded,
    #[error(transparent)]
    Channel(#[from] ChannelError),
}

/// Measures the rendered height of the embedded document.
pub trait ContentMeasure {
    fn content_height(&self) -> f64;
}

impl<F> ContentMeasure for F
where
    F: Fn() -> f64,
{
    fn content_height(&self) -> f64 {
        self()
    }
}

/// Visual state of one info bar control.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ControlState {
    Idle,
    Dispatched,
    Succeeded,
    Failed,
}

#[derive(Debug)]
struct Control {
    action: String,
    state: ControlState,
    generation: u64,
}

/// Posts height changes for one frame.
#[derive(Debug)]
struct ResizeReporter {
    channel: MessageChannel,
    window: WindowId,
    parent: WindowId,
    id: String,
    last_height: Cell<Option<f64>>,
}

impl ResizeReporter {
    fn report(&self, height: f64) -> Result<bool, ChannelError> {
        if self.last_height.get() == Some(height) {
            return Ok(false);
        }
        let message = FrameMessage::Resize {
            height,
            id: self.id.clone(),
        };
        self.channel
            .post_message(self.window, self.parent, message.to_value())?;
        self.last_height.set(Some(height));
        Ok(true)
    }
}

/// A running height poll. Dropping the handle stops polling.
#[derive(Debug)]
pub struct PollHandle {
    cancel_tx: mpsc::UnboundedSender<()>,
    task: JoinHandle<()>,
}

impl PollHandle {
    fn spawn(
        period: Duration,
        reporter: Rc<ResizeReporter>,
        measure: Rc<dyn ContentMeasure>,
    ) -> Self {
        let (cancel_tx, mut cancel_rx) = mpsc::unbounded_channel::<()>();

        let task = tokio::task::spawn_local(async move {
            let mut interval = tokio::time::interval(period);
            interval.tick().await;
            loop {
                tokio::select! {
                    _ = interval.tick() => {
                        if let Err(err) = reporter.report(measure.content_height()) {
                            debug!(target: "protocol", error = %err, "stopping height poll");
                            break;
                        }
                    }
                    _ = cancel_rx.recv() => {
                        break;
                    }
                }
            }
        });

        Self { cancel_tx, task }
    }

    pub fn cancel(&self) {
        let _ = self.cancel_tx.send(());
    }

    pub fn is_finished(&self) -> bool {
        self.task.is_finished()
    }
}

/// The runtime inside a frame document: reports its height and sends
/// action clicks to the host, then shows the host's verdict on the control.
pub struct EmbeddedContent {
    manifest: FrameManifest,
    code: String,
    reporter: Rc<ResizeReporter>,
    controls: Rc<RefCell<Vec<Control>>>,
    inbox: RefCell<MessageReceiver>,
}

impl EmbeddedContent {
    pub fn load(
        document: &str,
        window: WindowId,
        inbox: MessageReceiver,
        parent: WindowId,
        channel: MessageChannel,
    ) -> Result<Self, SenderError> {
        let parsed = kuchiki::parse_html().one(document);

        let manifest_node = parsed
            .select_first(&format!("#{MANIFEST_ELEMENT_ID}"))
            .map_err(|_| SenderError::MissingManifest)?;
        let manifest: FrameManifest =
            serde_json::from_str(&manifest_node.as_node().text_contents())?;

        let code = parsed
            .select_first("pre")
            .map_err(|_| SenderError::MissingCode)?
            .as_node()
            .text_contents();

        let controls = parsed
            .select("[data-action]")
            .map(|anchors| {
                anchors
                    .filter_map(|anchor| {
                        anchor.attributes.borrow().get("data-action").map(|action| Control {
                            action: action.to_string(),
                            state: ControlState::Idle,
                            generation: 0,
                        })
                    })
                    .collect()
            })
            .unwrap_or_default();

        let reporter = Rc::new(ResizeReporter {
            channel,
            window,
            parent,
            id: manifest.id.to_string(),
            last_height: Cell::new(None),
        });

        Ok(Self {
            manifest,
            code,
            reporter,
            controls: Rc::new(RefCell::new(controls)),
            inbox: RefCell::new(inbox),
        })
    }

    pub fn manifest(&self) -> &FrameManifest {
        &self.manifest
    }

    pub fn code(&self) -> &str {
        &self.code
    }

    pub fn window(&self) -> WindowId {
        self.reporter.window
    }

    /// Actions of the rendered controls, in document order.
    pub fn actions(&self) -> Vec<String> {
        self.controls
            .borrow()
            .iter()
            .map(|control| control.action.clone())
            .collect()
    }

    pub fn control_state(&self, action: &str) -> Option<ControlState> {
        self.controls
            .borrow()
            .iter()
            .find(|control| control.action == action)
            .map(|control| control.state)
    }

    /// Height limit for the code area: the frame limit minus the vertical
    /// space taken by everything around the code block.
    pub fn code_max_height(&self, vertical_margin: f64) -> Option<f64> {
        self.manifest
            .max_height
            .map(|max| (max - vertical_margin).max(0.0))
    }

    /// Posts the height if it differs from the last one posted.
    pub fn report_height(&self, height: f64) -> Result<bool, ChannelError> {
        self.reporter.report(height)
    }

    /// Starts polling `measure` at the manifest's resize rate. Returns
    /// `None` when polling is disabled. Must run inside a `LocalSet`.
    pub fn start_polling(&self, measure: impl ContentMeasure + 'static) -> Option<PollHandle> {
        let period = self.manifest.resize_rate().interval()?;
        Some(PollHandle::spawn(
            period,
            Rc::clone(&self.reporter),
            Rc::new(measure),
        ))
    }

    /// Sends the code block and the action to the host.
    pub fn click(&self, action: &str) -> Result<(), SenderError> {
        let mut controls = self.controls.borrow_mut();
        if !controls.iter().any(|control| control.action == action) {
            return Err(SenderError::UnknownAction(action.to_string()));
        }

        let message = FrameMessage::Action {
            action: action.to_string(),
            code: self.code.clone(),
            id: self.manifest.id.to_string(),
        };
        self.reporter.channel.post_message(
            self.reporter.window,
            self.reporter.parent,
            message.to_value(),
        )?;

        for control in controls.iter_mut().filter(|control| control.action == action) {
            control.state = ControlState::Dispatched;
            control.generation += 1;
        }
        Ok(())
    }

    /// Applies every queued reply. Returns how many were applied.
    pub fn pump(&self) -> usize {
        let mut applied = 0;
        loop {
            let event = match self.inbox.borrow_mut().try_recv() {
                Ok(event) => event,
                Err(_) => break,
            };
            if self.handle_event(event) {
                applied += 1;
            }
        }
        applied
    }

    /// Applies replies as they arrive until the frame's window closes.
    pub async fn run(&self) {
        while let Some(event) = poll_fn(|cx| self.inbox.borrow_mut().poll_recv(cx)).await {
            self.handle_event(event);
        }
    }

    fn handle_event(&self, event: MessageEvent) -> bool {
        if event.source != self.reporter.parent {
            trace!(target: "protocol", source = %event.source, "ignoring message from non-parent");
            return false;
        }
        match ActionReply::parse(&event.data) {
            Some(reply) => {
                self.apply_reply(reply);
                true
            }
            None => {
                trace!(target: "protocol", "ignoring unrecognized message");
                false
            }
        }
    }

    fn apply_reply(&self, reply: ActionReply) {
        let state = if reply.success {
            ControlState::Succeeded
        } else {
            ControlState::Failed
        };

        let mut generations = Vec::new();
        for (index, control) in self
            .controls
            .borrow_mut()
            .iter_mut()
            .enumerate()
            .filter(|(_, control)| control.action == reply.action)
        {
            control.state = state;
            generations.push((index, control.generation));
        }
        if generations.is_empty() {
            debug!(target: "protocol", action = %reply.action, "reply for unknown control");
            return;
        }

        let controls = Rc::clone(&self.controls);
        tokio::task::spawn_local(async move {
            tokio::time::sleep(FEEDBACK_WINDOW).await;
            let mut controls = controls.borrow_mut();
            for (index, generation) in generations {
                if let Some(control) = controls.get_mut(index) {
                    let settled = matches!(
                        control.state,
                        ControlState::Succeeded | ControlState::Failed
                    );
                    if settled && control.generation == generation {
                        control.state = ControlState::Idle;
                    }
                }
            }
        });
    }
}

impl std::fmt::Debug for EmbeddedContent {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("EmbeddedContent")
            .field("id", &self.manifest.id)
            .field("window", &self.reporter.window)
            .field("actions", &self.actions())
            .finish()
    }
}
