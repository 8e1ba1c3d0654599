use std::collections::BTreeMap;
use std::rc::Rc;

use kuchiki::NodeRef;
use serde::{Deserialize, Serialize};
use serde_json::Value as JsonValue;
use tracing::debug;

use super::types::{Action, ActionInvocation, Callbacks, Configuration};
use crate::coerce::js_number_string;

/// Every option that can be supplied loosely typed, in a fixed order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum OptionKey {
    ClassName,
    Copyable,
    DownloadName,
    Downloadable,
    EndWithInfoBar,
    Id,
    InfoHtml,
    InfoText,
    MatchBraces,
    MaxHeight,
    NumberLines,
    Placement,
    PreviewColors,
    RemoveMargins,
    ResizeRate,
    ShowLanguage,
    TabSize,
    TemplatePath,
    Theme,
    Width,
}

impl OptionKey {
    pub const ALL: [OptionKey; 20] = [
        OptionKey::ClassName,
        OptionKey::Copyable,
        OptionKey::DownloadName,
        OptionKey::Downloadable,
        OptionKey::EndWithInfoBar,
        OptionKey::Id,
        OptionKey::InfoHtml,
        OptionKey::InfoText,
        OptionKey::MatchBraces,
        OptionKey::MaxHeight,
        OptionKey::NumberLines,
        OptionKey::Placement,
        OptionKey::PreviewColors,
        OptionKey::RemoveMargins,
        OptionKey::ResizeRate,
        OptionKey::ShowLanguage,
        OptionKey::TabSize,
        OptionKey::TemplatePath,
        OptionKey::Theme,
        OptionKey::Width,
    ];

    pub fn camel_name(self) -> &'static str {
        match self {
            OptionKey::ClassName => "className",
            OptionKey::Copyable => "copyable",
            OptionKey::DownloadName => "downloadName",
            OptionKey::Downloadable => "downloadable",
            OptionKey::EndWithInfoBar => "endWithInfoBar",
            OptionKey::Id => "id",
            OptionKey::InfoHtml => "infoHTML",
            OptionKey::InfoText => "infoText",
            OptionKey::MatchBraces => "matchBraces",
            OptionKey::MaxHeight => "maxHeight",
            OptionKey::NumberLines => "numberLines",
            OptionKey::Placement => "placement",
            OptionKey::PreviewColors => "previewColors",
            OptionKey::RemoveMargins => "removeMargins",
            OptionKey::ResizeRate => "resizeRate",
            OptionKey::ShowLanguage => "showLanguage",
            OptionKey::TabSize => "tabSize",
            OptionKey::TemplatePath => "templatePath",
            OptionKey::Theme => "theme",
            OptionKey::Width => "width",
        }
    }

    /// The declarative attribute for this option. `className` and `id` come
    /// from the source element itself, so they have none.
    pub fn attribute_name(self) -> Option<&'static str> {
        let name = match self {
            OptionKey::ClassName | OptionKey::Id => return None,
            OptionKey::Copyable => "data-copyable",
            OptionKey::DownloadName => "data-download-name",
            OptionKey::Downloadable => "data-downloadable",
            OptionKey::EndWithInfoBar => "data-end-with-info-bar",
            OptionKey::InfoHtml => "data-info-html",
            OptionKey::InfoText => "data-info-text",
            OptionKey::MatchBraces => "data-match-braces",
            OptionKey::MaxHeight => "data-max-height",
            OptionKey::NumberLines => "data-number-lines",
            OptionKey::Placement => "data-placement",
            OptionKey::PreviewColors => "data-preview-colors",
            OptionKey::RemoveMargins => "data-remove-margins",
            OptionKey::ResizeRate => "data-resize-rate",
            OptionKey::ShowLanguage => "data-show-language",
            OptionKey::TabSize => "data-tab-size",
            OptionKey::TemplatePath => "data-template-path",
            OptionKey::Theme => "data-theme",
            OptionKey::Width => "data-width",
        };
        Some(name)
    }

    pub fn is_declarative(self) -> bool {
        self.attribute_name().is_some()
    }

    pub fn from_camel_name(name: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|key| key.camel_name() == name)
    }
}

/// A loosely typed option value as it arrives from any source.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum OptionValue {
    Bool(bool),
    Number(f64),
    Text(String),
}

impl OptionValue {
    /// The string form the coercion grammar operates on.
    pub fn to_loose_string(&self) -> String {
        match self {
            OptionValue::Bool(flag) => flag.to_string(),
            OptionValue::Number(value) => js_number_string(*value),
            OptionValue::Text(text) => text.clone(),
        }
    }

    pub fn from_json(value: &JsonValue) -> Option<Self> {
        match value {
            JsonValue::Bool(flag) => Some(OptionValue::Bool(*flag)),
            JsonValue::Number(number) => number.as_f64().map(OptionValue::Number),
            JsonValue::String(text) => Some(OptionValue::Text(text.clone())),
            _ => None,
        }
    }
}

impl From<bool> for OptionValue {
    fn from(value: bool) -> Self {
        OptionValue::Bool(value)
    }
}

impl From<i32> for OptionValue {
    fn from(value: i32) -> Self {
        OptionValue::Number(f64::from(value))
    }
}

impl From<f64> for OptionValue {
    fn from(value: f64) -> Self {
        OptionValue::Number(value)
    }
}

impl From<&str> for OptionValue {
    fn from(value: &str) -> Self {
        OptionValue::Text(value.to_string())
    }
}

impl From<String> for OptionValue {
    fn from(value: String) -> Self {
        OptionValue::Text(value)
    }
}

/// One named source of option values.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct OptionLayer {
    values: BTreeMap<OptionKey, OptionValue>,
}

impl OptionLayer {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get(&self, key: OptionKey) -> Option<&OptionValue> {
        self.values.get(&key)
    }

    pub fn contains(&self, key: OptionKey) -> bool {
        self.values.contains_key(&key)
    }

    pub fn set(&mut self, key: OptionKey, value: impl Into<OptionValue>) -> Option<OptionValue> {
        self.values.insert(key, value.into())
    }

    pub fn remove(&mut self, key: OptionKey) -> Option<OptionValue> {
        self.values.remove(&key)
    }

    pub fn len(&self) -> usize {
        self.values.len()
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (OptionKey, &OptionValue)> {
        self.values.iter().map(|(key, value)| (*key, value))
    }

    /// Reads the declarative `data-*` attributes of a source element.
    pub fn from_attributes(node: &NodeRef) -> Self {
        let mut layer = Self::new();
        let Some(element) = node.as_element() else {
            return layer;
        };
        let attributes = element.attributes.borrow();
        for key in OptionKey::ALL {
            if let Some(value) = key.attribute_name().and_then(|name| attributes.get(name)) {
                layer.set(key, value);
            }
        }
        layer
    }
}

/// First-defined-wins over the fixed key list: a value in an earlier layer is
/// never replaced by a later one.
pub fn merge_layers(layers: &[&OptionLayer]) -> OptionLayer {
    let mut merged = OptionLayer::new();
    for key in OptionKey::ALL {
        if let Some(value) = layers.iter().find_map(|layer| layer.get(key)) {
            merged.set(key, value.clone());
        }
    }
    merged
}

/// Options passed explicitly at the call site.
#[derive(Debug, Clone, Default)]
pub struct Options {
    pub(crate) values: OptionLayer,
    pub(crate) language: Option<String>,
    pub(crate) actions: Vec<Action>,
    pub(crate) placeholder: Option<NodeRef>,
    pub(crate) callbacks: Callbacks,
}

impl Options {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn set(mut self, key: OptionKey, value: impl Into<OptionValue>) -> Self {
        self.values.set(key, value);
        self
    }

    pub fn language(mut self, language: impl Into<String>) -> Self {
        self.language = Some(language.into());
        self
    }

    pub fn action(mut self, action: Action) -> Self {
        self.actions.push(action);
        self
    }

    pub fn placeholder(mut self, node: NodeRef) -> Self {
        self.placeholder = Some(node);
        self
    }

    pub fn on_load(mut self, callback: impl Fn(&NodeRef, &Configuration) + 'static) -> Self {
        self.callbacks.on_load = Some(Rc::new(callback));
        self
    }

    pub fn on_resize(mut self, callback: impl Fn(&NodeRef, &Configuration) + 'static) -> Self {
        self.callbacks.on_resize = Some(Rc::new(callback));
        self
    }

    pub fn on_action(
        mut self,
        callback: impl Fn(&ActionInvocation<'_>) -> anyhow::Result<()> + 'static,
    ) -> Self {
        self.callbacks.on_action = Some(Rc::new(callback));
        self
    }

    pub fn values(&self) -> &OptionLayer {
        &self.values
    }

    /// Builds options from a JSON object keyed by camelCase option names.
    /// `language` and `actions` are recognized as well; anything else is
    /// ignored.
    pub fn from_json(value: &JsonValue) -> Self {
        let mut options = Self::new();
        let Some(object) = value.as_object() else {
            return options;
        };

        for (name, raw) in object {
            match name.as_str() {
                "language" => {
                    if let Some(language) = raw.as_str() {
                        options.language = Some(language.to_string());
                    }
                }
                "actions" => {
                    let actions = raw.as_array().into_iter().flatten().filter_map(|entry| {
                        let id = entry.get("id").or_else(|| entry.get("name"))?.as_str()?;
                        let label = entry.get("label").and_then(JsonValue::as_str).unwrap_or(id);
                        Some(Action::new(id, label))
                    });
                    options.actions.extend(actions);
                }
                other => match (OptionKey::from_camel_name(other), OptionValue::from_json(raw)) {
                    (Some(key), Some(value)) => {
                        options.values.set(key, value);
                    }
                    _ => debug!(target: "config", option = %other, "ignoring unrecognized option"),
                },
            }
        }
        options
    }
}
