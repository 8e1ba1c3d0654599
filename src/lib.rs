// Library exports for the CLI and tests

pub mod coerce;
pub mod config;
pub mod frame;
pub mod input;
pub mod markup;
pub mod protocol;
pub mod text;

// Re-export the types most callers need
pub use config::{Configuration, OptionKey, Options, PageDefaults};
pub use frame::{Content, EmbedError, FrameHandle, HostPage, ReadyState};
pub use protocol::{EmbeddedContent, MessageChannel, ProtocolId, WindowId};
