mod defaults;
mod options;
mod resolver;
mod types;

pub use defaults::{
    DefaultsError, PageDefaults, DEFAULTS_PATH_ENV, DEFAULT_TEMPLATE_PATH, SCRIPT_SRC_ENV,
};
pub use options::{merge_layers, OptionKey, OptionLayer, OptionValue, Options};
pub use resolver::{
    activated_class_list, discover_actions, resolve, SourceElement, ACTIVATED_MARKER,
    PENDING_MARKER,
};
pub use types::{
    camel_case_identifier, Action, ActionCallback, ActionInvocation, Callbacks, Configuration,
    FrameCallback, Placement, ResizeRate, ToolbarButton, UnknownPlacement, ACTION_ATTRIBUTE_PREFIX,
    COPY_ACTION, DEFAULT_RESIZE_RATE, DEFAULT_TAB_SIZE, DEFAULT_THEME, DEFAULT_WIDTH,
    DOWNLOAD_ACTION,
};
