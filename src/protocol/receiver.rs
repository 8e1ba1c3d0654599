use std::rc::Rc;

use chrono::Utc;
use tracing::{debug, error, trace};

use super::channel::{MessageChannel, MessageEvent, WindowId};
use super::message::{ActionReply, FrameMessage};
use crate::config::{ActionInvocation, COPY_ACTION, DOWNLOAD_ACTION};
use crate::frame::{DownloadArtifact, FrameHandle, HostServices};

/// What the host did with one message.
#[derive(Debug, Clone, PartialEq)]
pub enum Dispatch {
    Ignored,
    Resized { height: f64 },
    Action { action: String, outcome: ActionOutcome },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ActionOutcome {
    Succeeded,
    Failed,
    /// The reply is sent once the clipboard settles.
    Pending,
}

/// The host-side listener of a single frame.
pub struct FrameReceiver {
    frame: FrameHandle,
    host_window: WindowId,
    channel: MessageChannel,
    services: HostServices,
}

impl FrameReceiver {
    pub fn new(
        frame: FrameHandle,
        host_window: WindowId,
        channel: MessageChannel,
        services: HostServices,
    ) -> Self {
        Self {
            frame,
            host_window,
            channel,
            services,
        }
    }

    pub fn frame(&self) -> &FrameHandle {
        &self.frame
    }

    pub fn handle(&self, event: &MessageEvent) -> Dispatch {
        if self.frame.content_window() != Some(event.source) {
            return Dispatch::Ignored;
        }
        let Some(message) = FrameMessage::parse(&event.data) else {
            trace!(target: "protocol", source = %event.source, "ignoring unrecognized message");
            return Dispatch::Ignored;
        };
        if message.id() != self.frame.identifier().as_str() {
            debug!(
                target: "protocol",
                expected = %self.frame.identifier(),
                received = %message.id(),
                "ignoring message with foreign id"
            );
            return Dispatch::Ignored;
        }

        match message {
            FrameMessage::Resize { height, .. } => {
                let height = self.frame.apply_height(height);
                let config = self.frame.config();
                if let Some(on_resize) = &config.callbacks.on_resize {
                    on_resize(self.frame.element(), config);
                }
                Dispatch::Resized { height }
            }
            FrameMessage::Action { action, .. } if action.is_empty() => Dispatch::Ignored,
            FrameMessage::Action { action, code, .. } => {
                self.dispatch_action(event.source, action, code)
            }
        }
    }

    fn dispatch_action(&self, source: WindowId, action: String, code: String) -> Dispatch {
        let result = match action.as_str() {
            COPY_ACTION => {
                self.copy(source, action.clone(), code);
                return Dispatch::Action {
                    action,
                    outcome: ActionOutcome::Pending,
                };
            }
            DOWNLOAD_ACTION => self.download(&code),
            _ => self.custom(&action, &code),
        };

        let success = match result {
            Ok(()) => true,
            Err(err) => {
                error!(target: "protocol", action = %action, error = %err, "action failed");
                false
            }
        };
        send_reply(&self.channel, self.host_window, source, &action, success);

        Dispatch::Action {
            action,
            outcome: if success {
                ActionOutcome::Succeeded
            } else {
                ActionOutcome::Failed
            },
        }
    }

    fn download(&self, code: &str) -> anyhow::Result<()> {
        let artifact = DownloadArtifact::for_code(self.frame.config(), code, Utc::now());
        debug!(target: "protocol", file_name = %artifact.file_name, "saving download");
        self.services.downloads.save(&artifact)?;
        Ok(())
    }

    fn copy(&self, source: WindowId, action: String, code: String) {
        let clipboard = Rc::clone(&self.services.clipboard);
        let channel = self.channel.clone();
        let host_window = self.host_window;

        tokio::task::spawn_local(async move {
            let success = match clipboard.write_text(code).await {
                Ok(()) => true,
                Err(err) => {
                    error!(target: "protocol", error = %err, "copy failed");
                    false
                }
            };
            send_reply(&channel, host_window, source, &action, success);
        });
    }

    fn custom(&self, action: &str, code: &str) -> anyhow::Result<()> {
        let config = self.frame.config();
        let invocation = ActionInvocation {
            action,
            code,
            frame: self.frame.element(),
            config,
        };
        if let Some(on_action) = &config.callbacks.on_action {
            on_action(&invocation)?;
        }
        self.services.listeners.notify(&invocation)
    }
}

fn send_reply(
    channel: &MessageChannel,
    host_window: WindowId,
    target: WindowId,
    action: &str,
    success: bool,
) {
    let reply = ActionReply {
        action: action.to_string(),
        success,
    };
    if let Err(err) = channel.post_message(host_window, target, reply.to_value()) {
        debug!(target: "protocol", error = %err, "reply not delivered");
    }
}
