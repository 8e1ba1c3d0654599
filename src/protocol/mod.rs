//! The message protocol between a host page and its embedded frames.

mod channel;
mod message;
mod receiver;
mod sender;

pub use channel::{ChannelError, MessageChannel, MessageEvent, MessageReceiver, WindowId};
pub use message::{ActionReply, FrameManifest, FrameMessage, ProtocolId, MANIFEST_ELEMENT_ID};
pub use receiver::{ActionOutcome, Dispatch, FrameReceiver};
pub use sender::{
    ContentMeasure, ControlState, EmbeddedContent, PollHandle, SenderError, FEEDBACK_WINDOW,
};
