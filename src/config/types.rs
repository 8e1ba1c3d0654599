use std::fmt;
use std::rc::Rc;
use std::str::FromStr;
use std::time::Duration;

use kuchiki::NodeRef;
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::coerce::{BoolOrLabel, LineNumbering};

pub const DEFAULT_RESIZE_RATE: Duration = Duration::from_millis(100);
pub const DEFAULT_TAB_SIZE: usize = 4;
/// Larger tab sizes fall back to [`DEFAULT_TAB_SIZE`].
pub const MAX_TAB_SIZE: usize = 32;
pub const DEFAULT_WIDTH: &str = "100%";
pub const DEFAULT_THEME: &str = "default";

pub const COPY_ACTION: &str = "copy";
pub const DOWNLOAD_ACTION: &str = "download";
pub const ACTION_ATTRIBUTE_PREFIX: &str = "data-action-";

pub type FrameCallback = Rc<dyn Fn(&NodeRef, &Configuration)>;
pub type ActionCallback = Rc<dyn Fn(&ActionInvocation<'_>) -> anyhow::Result<()>>;

/// What an action handler gets to see about the click it is handling.
pub struct ActionInvocation<'a> {
    pub action: &'a str,
    pub code: &'a str,
    pub frame: &'a NodeRef,
    pub config: &'a Configuration,
}

#[derive(Clone, Default)]
pub struct Callbacks {
    pub on_load: Option<FrameCallback>,
    pub on_resize: Option<FrameCallback>,
    pub on_action: Option<ActionCallback>,
}

impl fmt::Debug for Callbacks {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Callbacks")
            .field("on_load", &self.on_load.is_some())
            .field("on_resize", &self.on_resize.is_some())
            .field("on_action", &self.on_action.is_some())
            .finish()
    }
}

/// Where the frame goes relative to its placeholder.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Placement {
    Before,
    After,
    Replace,
    Start,
    End,
}

#[derive(Debug, Error)]
#[error("unknown placement: {0}")]
pub struct UnknownPlacement(pub String);

impl FromStr for Placement {
    type Err = UnknownPlacement;

    fn from_str(raw: &str) -> Result<Self, Self::Err> {
        match raw.trim().to_ascii_lowercase().as_str() {
            "before" => Ok(Placement::Before),
            "after" => Ok(Placement::After),
            "replace" => Ok(Placement::Replace),
            "start" => Ok(Placement::Start),
            "end" => Ok(Placement::End),
            _ => Err(UnknownPlacement(raw.to_string())),
        }
    }
}

/// How often the embedded content reports its height.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ResizeRate {
    Every(Duration),
    Disabled,
}

impl ResizeRate {
    /// `Infinity` disables polling; missing, malformed and sub-millisecond
    /// rates fall back to the default.
    pub fn from_millis(value: Option<f64>) -> Self {
        match value {
            Some(ms) if ms == f64::INFINITY => ResizeRate::Disabled,
            Some(ms) if ms.is_finite() && ms >= 1.0 => {
                ResizeRate::Every(Duration::from_millis(ms.trunc() as u64))
            }
            _ => ResizeRate::default(),
        }
    }

    pub fn interval(&self) -> Option<Duration> {
        match self {
            ResizeRate::Every(period) => Some(*period),
            ResizeRate::Disabled => None,
        }
    }

    pub fn as_millis(&self) -> Option<u64> {
        self.interval().map(|period| period.as_millis() as u64)
    }
}

impl Default for ResizeRate {
    fn default() -> Self {
        ResizeRate::Every(DEFAULT_RESIZE_RATE)
    }
}

/// A custom control in the info bar. `name` is what travels over the wire.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Action {
    pub id: String,
    pub name: String,
    pub label: String,
}

impl Action {
    pub fn new(id: impl Into<String>, label: impl Into<String>) -> Self {
        let id = id.into();
        Self {
            name: camel_case_identifier(&id),
            id,
            label: label.into(),
        }
    }

    /// `data-action-run-tests="Run"` becomes `{id: "run-tests", name: "runTests", label: "Run"}`.
    pub fn from_attribute(attribute: &str, value: &str) -> Option<Self> {
        let id = attribute.strip_prefix(ACTION_ATTRIBUTE_PREFIX)?;
        if id.is_empty() {
            return None;
        }
        Some(Self::new(id, value))
    }
}

pub fn camel_case_identifier(id: &str) -> String {
    let mut name = String::with_capacity(id.len());
    let mut chars = id.chars().peekable();
    while let Some(c) = chars.next() {
        match chars.peek() {
            Some(&next) if c == '-' && next != '-' => {
                name.extend(next.to_uppercase());
                chars.next();
            }
            _ => name.push(c),
        }
    }
    name
}

/// One rendered info bar control.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ToolbarButton {
    pub name: String,
    pub label: String,
}

/// The fully typed option set for one embedding.
#[derive(Debug, Clone)]
pub struct Configuration {
    pub language: Option<String>,

    pub max_height: Option<f64>,
    pub remove_margins: bool,
    pub placement: Option<Placement>,
    pub placeholder: Option<NodeRef>,
    pub class_name: Option<String>,
    pub id: Option<String>,
    pub width: String,
    pub starting_height: f64,

    pub number_lines: LineNumbering,
    pub match_braces: bool,
    pub preview_colors: bool,
    pub show_language: BoolOrLabel,
    pub copyable: BoolOrLabel,
    pub downloadable: BoolOrLabel,
    pub end_with_info_bar: bool,

    pub download_name: Option<String>,
    pub info_text: Option<String>,
    pub info_html: Option<String>,
    pub theme: String,
    pub template_path: String,

    pub actions: Vec<Action>,
    pub callbacks: Callbacks,

    pub resize_rate: ResizeRate,
    pub tab_size: usize,
}

impl Configuration {
    pub fn language_or_default(&self) -> &str {
        self.language.as_deref().unwrap_or("none")
    }

    pub fn info_bar_visible(&self) -> bool {
        self.copyable.is_enabled()
            || self.downloadable.is_enabled()
            || self.show_language.is_enabled()
            || self.info_text.is_some()
            || self.info_html.is_some()
            || !self.actions.is_empty()
    }

    /// Custom actions first, in resolved order, then the enabled built-ins.
    pub fn toolbar_buttons(&self) -> Vec<ToolbarButton> {
        let mut buttons: Vec<ToolbarButton> = self
            .actions
            .iter()
            .map(|action| ToolbarButton {
                name: action.name.clone(),
                label: action.label.clone(),
            })
            .collect();

        if self.copyable.is_enabled() {
            buttons.push(ToolbarButton {
                name: COPY_ACTION.to_string(),
                label: self.copyable.label_or("Copy").to_string(),
            });
        }
        if self.downloadable.is_enabled() {
            buttons.push(ToolbarButton {
                name: DOWNLOAD_ACTION.to_string(),
                label: self.downloadable.label_or("Download").to_string(),
            });
        }
        buttons
    }

    /// The caption of the language tag, when one is shown.
    pub fn language_label(&self) -> Option<&str> {
        match &self.show_language {
            BoolOrLabel::Bool(true) => Some(self.language_or_default()),
            BoolOrLabel::Label(label) => Some(label),
            BoolOrLabel::Bool(false) => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn camel_cases_action_ids() {
        assert_eq!(camel_case_identifier("run-tests"), "runTests");
        assert_eq!(camel_case_identifier("zebra"), "zebra");
        assert_eq!(camel_case_identifier("a--b"), "a-B");
        assert_eq!(camel_case_identifier("trailing-"), "trailing-");
    }

    #[test]
    fn action_from_attribute() {
        let action = Action::from_attribute("data-action-open-in-editor", "Open").unwrap();
        assert_eq!(action.id, "open-in-editor");
        assert_eq!(action.name, "openInEditor");
        assert_eq!(action.label, "Open");
        assert!(Action::from_attribute("data-action-", "x").is_none());
        assert!(Action::from_attribute("data-theme", "x").is_none());
    }

    #[test]
    fn resize_rates() {
        assert_eq!(ResizeRate::from_millis(None), ResizeRate::default());
        assert_eq!(ResizeRate::from_millis(Some(f64::INFINITY)), ResizeRate::Disabled);
        assert_eq!(ResizeRate::from_millis(Some(0.0)), ResizeRate::default());
        assert_eq!(ResizeRate::from_millis(Some(-5.0)), ResizeRate::default());
        assert_eq!(ResizeRate::from_millis(Some(250.7)).as_millis(), Some(250));
    }

    #[test]
    fn placements_parse() {
        assert_eq!("after".parse::<Placement>().unwrap(), Placement::After);
        assert_eq!(" Start ".parse::<Placement>().unwrap(), Placement::Start);
        assert!("beside".parse::<Placement>().is_err());
    }
}
