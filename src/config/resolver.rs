use kuchiki::NodeRef;
use tracing::warn;

use super::defaults::{PageDefaults, DEFAULT_TEMPLATE_PATH};
use super::options::{merge_layers, OptionKey, OptionLayer, OptionValue, Options};
use super::types::{
    Action, Configuration, Placement, ResizeRate, ACTION_ATTRIBUTE_PREFIX, DEFAULT_TAB_SIZE,
    DEFAULT_THEME, DEFAULT_WIDTH, MAX_TAB_SIZE,
};
use crate::coerce::{
    parse_js_number, resolve_bool_or_label, resolve_number_or_bool, resolve_tri_boolean,
    BoolOrLabel, LineNumbering,
};

/// Class token marking an element that still waits to be embedded.
pub const PENDING_MARKER: &str = "prismize";
/// Class token marking an element that has been embedded.
pub const ACTIVATED_MARKER: &str = "prismized";

/// The markup node seeding an invocation, with its measured height.
#[derive(Debug, Clone, Copy)]
pub struct SourceElement<'a> {
    pub node: &'a NodeRef,
    pub client_height: f64,
}

/// Merges explicit options, the source element's attributes and the page
/// defaults (in that order of precedence) and coerces the result.
pub fn resolve(
    explicit: &Options,
    source: Option<SourceElement<'_>>,
    defaults: &PageDefaults,
) -> Configuration {
    let element_layer = source
        .map(|source| OptionLayer::from_attributes(source.node))
        .unwrap_or_default();
    let merged = merge_layers(&[&explicit.values, &element_layer, defaults.layer()]);

    let text = |key: OptionKey| {
        merged
            .get(key)
            .map(OptionValue::to_loose_string)
            .filter(|value| !value.is_empty())
    };

    // A zero limit means no limit at all.
    let max_height = number(merged.get(OptionKey::MaxHeight)).filter(|max| *max != 0.0);
    let starting_height = source.map_or(0.0, |source| match max_height {
        Some(max) => source.client_height.min(max),
        None => source.client_height,
    });

    let placement = text(OptionKey::Placement).and_then(|raw| match raw.parse::<Placement>() {
        Ok(placement) => Some(placement),
        Err(err) => {
            warn!(target: "config", error = %err, "falling back to the default placement");
            None
        }
    });

    let tab_size = number(merged.get(OptionKey::TabSize))
        .filter(|size| size.is_finite() && *size >= 1.0)
        .map_or(DEFAULT_TAB_SIZE, |size| {
            if size > MAX_TAB_SIZE as f64 {
                warn!(target: "config", tab_size = size, "tab size too large, using the default");
                DEFAULT_TAB_SIZE
            } else {
                size.trunc() as usize
            }
        });

    let source_attribute = |name: &str| {
        source
            .and_then(|source| attribute(source.node, name))
            .filter(|value| !value.is_empty())
    };

    let language = explicit
        .language
        .clone()
        .filter(|language| !language.is_empty())
        .or_else(|| source_attribute("data-prismize"))
        .or_else(|| source_attribute("data-language"));

    let id = text(OptionKey::Id).or_else(|| source_attribute("id"));
    let class_name = text(OptionKey::ClassName).or_else(|| {
        source_attribute("class")
            .map(|class| activated_class_list(&class))
            .filter(|class| !class.is_empty())
    });

    let mut actions = source.map_or_else(Vec::new, |source| discover_actions(source.node));
    actions.extend(explicit.actions.iter().cloned());

    Configuration {
        language,
        max_height,
        remove_margins: flag(merged.get(OptionKey::RemoveMargins)),
        placement,
        placeholder: source
            .map(|source| source.node.clone())
            .or_else(|| explicit.placeholder.clone()),
        class_name,
        id,
        width: text(OptionKey::Width).unwrap_or_else(|| DEFAULT_WIDTH.to_string()),
        starting_height,
        number_lines: line_numbering(merged.get(OptionKey::NumberLines)),
        match_braces: flag(merged.get(OptionKey::MatchBraces)),
        preview_colors: flag(merged.get(OptionKey::PreviewColors)),
        show_language: bool_or_label(merged.get(OptionKey::ShowLanguage)),
        copyable: bool_or_label(merged.get(OptionKey::Copyable)),
        downloadable: bool_or_label(merged.get(OptionKey::Downloadable)),
        end_with_info_bar: flag(merged.get(OptionKey::EndWithInfoBar)),
        download_name: text(OptionKey::DownloadName),
        info_text: text(OptionKey::InfoText),
        info_html: text(OptionKey::InfoHtml),
        theme: text(OptionKey::Theme).unwrap_or_else(|| DEFAULT_THEME.to_string()),
        template_path: text(OptionKey::TemplatePath)
            .unwrap_or_else(|| DEFAULT_TEMPLATE_PATH.to_string()),
        actions,
        callbacks: explicit.callbacks.clone(),
        resize_rate: ResizeRate::from_millis(number(merged.get(OptionKey::ResizeRate))),
        tab_size,
    }
}

/// Renames the pending marker token to the activated one.
pub fn activated_class_list(class: &str) -> String {
    class
        .split_whitespace()
        .map(|token| {
            if token == PENDING_MARKER {
                ACTIVATED_MARKER
            } else {
                token
            }
        })
        .collect::<Vec<_>>()
        .join(" ")
}

/// Custom actions declared with `data-action-*`, sorted by id.
pub fn discover_actions(node: &NodeRef) -> Vec<Action> {
    let Some(element) = node.as_element() else {
        return Vec::new();
    };
    let attributes = element.attributes.borrow();
    let mut actions: Vec<Action> = attributes
        .map
        .iter()
        .filter(|(name, _)| name.local.starts_with(ACTION_ATTRIBUTE_PREFIX))
        .filter_map(|(name, attribute)| Action::from_attribute(&name.local, &attribute.value))
        .collect();
    actions.sort_by(|a, b| a.id.cmp(&b.id));
    actions
}

fn attribute(node: &NodeRef, name: &str) -> Option<String> {
    let element = node.as_element()?;
    let attributes = element.attributes.borrow();
    attributes.get(name).map(str::to_string)
}

fn number(value: Option<&OptionValue>) -> Option<f64> {
    match value? {
        OptionValue::Number(value) if value.is_nan() => None,
        OptionValue::Number(value) => Some(*value),
        OptionValue::Bool(flag) => Some(if *flag { 1.0 } else { 0.0 }),
        OptionValue::Text(text) => parse_js_number(text),
    }
}

fn flag(value: Option<&OptionValue>) -> bool {
    match value {
        Some(OptionValue::Bool(flag)) => *flag,
        Some(other) => resolve_tri_boolean(Some(&other.to_loose_string()), false),
        None => false,
    }
}

fn bool_or_label(value: Option<&OptionValue>) -> BoolOrLabel {
    match value {
        Some(OptionValue::Bool(flag)) => BoolOrLabel::Bool(*flag),
        Some(other) => resolve_bool_or_label(Some(&other.to_loose_string()), BoolOrLabel::default()),
        None => BoolOrLabel::default(),
    }
}

fn line_numbering(value: Option<&OptionValue>) -> LineNumbering {
    match value {
        Some(OptionValue::Bool(flag)) => LineNumbering::Bool(*flag),
        Some(other) => {
            resolve_number_or_bool(Some(&other.to_loose_string()), LineNumbering::default())
        }
        None => LineNumbering::default(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use kuchiki::traits::*;

    fn source_node(html: &str) -> NodeRef {
        let document = kuchiki::parse_html().one(html);
        let node = document.select_first("#src").unwrap().as_node().clone();
        node
    }

    fn element(node: &NodeRef, client_height: f64) -> Option<SourceElement<'_>> {
        Some(SourceElement {
            node,
            client_height,
        })
    }

    #[test]
    fn explicit_beats_element_beats_page_default() {
        let node = source_node("<pre id=\"src\" data-theme=\"coy\"></pre>");
        let defaults = PageDefaults::from_query("theme=okaidia");

        let explicit = Options::new().set(OptionKey::Theme, "tomorrow");
        assert_eq!(resolve(&explicit, element(&node, 0.0), &defaults).theme, "tomorrow");

        assert_eq!(resolve(&Options::new(), element(&node, 0.0), &defaults).theme, "coy");

        let bare = source_node("<pre id=\"src\"></pre>");
        assert_eq!(resolve(&Options::new(), element(&bare, 0.0), &defaults).theme, "okaidia");
        assert_eq!(
            resolve(&Options::new(), element(&bare, 0.0), &PageDefaults::empty()).theme,
            DEFAULT_THEME
        );
    }

    #[test]
    fn coercion_runs_after_merge() {
        let node = source_node("<pre id=\"src\" data-copyable=\"off\" data-downloadable=\"Save\"></pre>");
        let defaults = PageDefaults::from_query("copyable=yes&downloadable=no&showLanguage=");
        let explicit = Options::new().set(OptionKey::Copyable, "Grab it");

        let config = resolve(&explicit, element(&node, 0.0), &defaults);
        assert_eq!(config.copyable, BoolOrLabel::Label("Grab it".into()));
        assert_eq!(config.downloadable, BoolOrLabel::Label("Save".into()));
        assert_eq!(config.show_language, BoolOrLabel::Bool(true));
    }

    #[test]
    fn booleans_use_the_markup_grammar() {
        let node = source_node(
            "<pre id=\"src\" data-match-braces data-remove-margins=\"NO\" data-preview-colors=\"On\"></pre>",
        );
        let config = resolve(&Options::new(), element(&node, 0.0), &PageDefaults::empty());
        assert!(config.match_braces);
        assert!(!config.remove_margins);
        assert!(config.preview_colors);
        assert!(!config.end_with_info_bar);

        let explicit = Options::new().set(OptionKey::EndWithInfoBar, true);
        assert!(resolve(&explicit, None, &PageDefaults::empty()).end_with_info_bar);
    }

    #[test]
    fn malformed_numbers_are_unset() {
        let node = source_node(
            "<pre id=\"src\" data-max-height=\"tall\" data-tab-size=\"wide\" data-resize-rate=\"soon\" data-number-lines=\"lots\"></pre>",
        );
        let config = resolve(&Options::new(), element(&node, 80.0), &PageDefaults::empty());
        assert_eq!(config.max_height, None);
        assert_eq!(config.starting_height, 80.0);
        assert_eq!(config.tab_size, DEFAULT_TAB_SIZE);
        assert_eq!(config.resize_rate, ResizeRate::default());
        assert_eq!(config.number_lines, LineNumbering::Bool(false));
    }

    #[test]
    fn oversized_tab_size_falls_back_to_default() {
        let node = source_node("<pre id=\"src\" data-tab-size=\"1e300\"></pre>");
        let config = resolve(&Options::new(), element(&node, 0.0), &PageDefaults::empty());
        assert_eq!(config.tab_size, DEFAULT_TAB_SIZE);

        let explicit = Options::new().set(OptionKey::TabSize, MAX_TAB_SIZE as f64);
        assert_eq!(resolve(&explicit, None, &PageDefaults::empty()).tab_size, MAX_TAB_SIZE);
        let explicit = Options::new().set(OptionKey::TabSize, 1e10);
        assert_eq!(resolve(&explicit, None, &PageDefaults::empty()).tab_size, DEFAULT_TAB_SIZE);
    }

    #[test]
    fn zero_max_height_means_no_limit() {
        let node = source_node("<pre id=\"src\" data-max-height=\"0\"></pre>");
        let config = resolve(&Options::new(), element(&node, 300.0), &PageDefaults::empty());
        assert_eq!(config.max_height, None);
        assert_eq!(config.starting_height, 300.0);
    }

    #[test]
    fn infinite_resize_rate_disables_polling() {
        let explicit = Options::new().set(OptionKey::ResizeRate, "Infinity");
        let config = resolve(&explicit, None, &PageDefaults::empty());
        assert_eq!(config.resize_rate, ResizeRate::Disabled);
    }

    #[test]
    fn starting_height_is_clamped() {
        let node = source_node("<pre id=\"src\" data-max-height=\"120\"></pre>");
        let config = resolve(&Options::new(), element(&node, 300.0), &PageDefaults::empty());
        assert_eq!(config.max_height, Some(120.0));
        assert_eq!(config.starting_height, 120.0);

        let config = resolve(&Options::new(), None, &PageDefaults::empty());
        assert_eq!(config.starting_height, 0.0);
    }

    #[test]
    fn derives_identity_from_source_element() {
        let node = source_node("<pre id=\"src\" class=\"prismize wide\" data-prismize=\"rust\"></pre>");
        let config = resolve(&Options::new(), element(&node, 0.0), &PageDefaults::empty());
        assert_eq!(config.id.as_deref(), Some("src"));
        assert_eq!(config.class_name.as_deref(), Some("prismized wide"));
        assert_eq!(config.language.as_deref(), Some("rust"));
        assert_eq!(config.placeholder.as_ref(), Some(&node));

        let explicit = Options::new()
            .set(OptionKey::Id, "mine")
            .set(OptionKey::ClassName, "custom")
            .language("python");
        let config = resolve(&explicit, element(&node, 0.0), &PageDefaults::empty());
        assert_eq!(config.id.as_deref(), Some("mine"));
        assert_eq!(config.class_name.as_deref(), Some("custom"));
        assert_eq!(config.language.as_deref(), Some("python"));
    }

    #[test]
    fn empty_trigger_attribute_falls_back_to_data_language() {
        let node = source_node("<pre id=\"src\" data-prismize data-language=\"js\"></pre>");
        let config = resolve(&Options::new(), element(&node, 0.0), &PageDefaults::empty());
        assert_eq!(config.language.as_deref(), Some("js"));
    }

    #[test]
    fn custom_actions_sort_by_id_before_explicit_ones() {
        let node = source_node(
            "<pre id=\"src\" data-action-zebra=\"Z\" data-action-alpha=\"A\" data-action-mid-way=\"M\"></pre>",
        );
        let explicit = Options::new().action(Action::new("explicit", "E"));
        let config = resolve(&explicit, element(&node, 0.0), &PageDefaults::empty());
        let ids: Vec<&str> = config.actions.iter().map(|a| a.id.as_str()).collect();
        assert_eq!(ids, ["alpha", "mid-way", "zebra", "explicit"]);
        assert_eq!(config.actions[1].name, "midWay");
    }

    #[test]
    fn marks_class_list() {
        assert_eq!(activated_class_list("a prismize b"), "a prismized b");
        assert_eq!(activated_class_list("prismizer"), "prismizer");
        assert_eq!(activated_class_list(""), "");
    }
}
