use super::assets::AssetPaths;
use super::{MarkupError, MarkupGenerator, MarkupRequest};
use crate::coerce::js_number_string;
use crate::config::Configuration;
use crate::protocol::{FrameManifest, MANIFEST_ELEMENT_ID};
use crate::text::{escape_attribute, escape_for_markup};

const INFO_BAR_CSS: &str = "#infoBar .content{flex:1;text-overflow:ellipsis;white-space:nowrap;overflow:hidden;}\
#infoBar>a,#infoBar .content{padding:0.4em 0.8em;}\
#infoBar>a{text-decoration:none;box-shadow:0 0 1px #000;background-color:rgba(0,0,0,0.5);color:#FFF;text-shadow:0 0 1px #000;cursor:pointer;transition:0.25s ease all;}\
#infoBar>a:hover{background-color:rgba(0,0,0,0.7);color:#FFF;}\
#infoBar .success{background-color:rgba(0,127,0,0.7)!important;}\
#infoBar .failure{background-color:rgba(127,0,0,0.7)!important;}\
#infoBar .tag{filter:grayscale(1);display:inline-block;background-color:hsla(0,100%,50%,0.7);color:#FFF;text-shadow:0 0 0.1em #000;padding:0.2em 0.5em;box-shadow:0 0 1px #000,inset 0 0 0 1px #fff;margin:0 0.5em;font-size:0.85em;font-weight:bold;letter-spacing:0.05em;text-transform:uppercase;}\
#infoBar :first-child{margin-left:0;}";

/// Frame documents that load Prism from a CDN template.
#[derive(Debug, Clone, Copy, Default)]
pub struct PrismMarkup;

impl MarkupGenerator for PrismMarkup {
    fn generate(&self, request: &MarkupRequest<'_>) -> Result<String, MarkupError> {
        let config = request.config;
        let assets = AssetPaths::for_config(config)?;
        let manifest = serde_json::to_string(&FrameManifest::from_config(request.identifier, config))?;

        let mut head = String::from("<meta charset=\"utf-8\"><base target=\"_parent\">");
        for (index, href) in assets.stylesheets.iter().enumerate() {
            head.push_str(&format!(
                "<link rel=\"stylesheet\" href=\"{}\" crossorigin=\"anonymous\">",
                escape_attribute(href)
            ));
            if index == 0 {
                head.push_str(&format!("<style>{}</style>", css_rules(config)));
            }
        }

        let info_bar = info_bar(config);
        let (leading, trailing) = if config.end_with_info_bar {
            ("", info_bar.as_str())
        } else {
            (info_bar.as_str(), "")
        };

        let scripts: String = assets
            .scripts
            .iter()
            .map(|src| {
                format!(
                    "<script src=\"{}\" crossorigin=\"anonymous\"></script>",
                    escape_attribute(src)
                )
            })
            .collect();

        Ok(format!(
            "<!DOCTYPE html><html><head>{head}</head><body><div id=\"wrapper\">{leading}{pre}{trailing}</div>\
<script type=\"application/json\" id=\"{MANIFEST_ELEMENT_ID}\">{manifest}</script>{scripts}</body></html>",
            pre = code_block(config, request.language, request.code),
        ))
    }
}

fn css_rules(config: &Configuration) -> String {
    let (shadow, margin) = if config.end_with_info_bar {
        ("-", "0.4em 2px 2px")
    } else {
        ("", "2px 2px 0.4em")
    };
    let mut css = format!(
        "body{{margin:0;overflow:hidden;}}#wrapper{{overflow:hidden;}}\
#infoBar{{font-size:0.85em;color:#333;background-color:#EEE;border-radius:0.3em;overflow:hidden;\
box-shadow:0 0 1px 1px #000,0 {shadow}0.4em 0.4em -0.2em;margin:{margin};\
background-image:linear-gradient(to bottom,rgba(255,255,255,0.2),rgba(255,255,255,0.05) 50%,rgba(0,0,0,0.05) 50%,rgba(0,0,0,0.2));\
font-family:Tahoma;text-shadow:0.1em 0.1em 0.1em #fff;display:flex;user-select:none;}}"
    );
    css.push_str(INFO_BAR_CSS);
    if config.remove_margins {
        css.push_str("pre[class*=language-]{margin:0;}");
    }
    if config.max_height.is_some() {
        css.push_str("pre[class*=language-]>code{overflow-y:auto;}");
    }
    css
}

fn code_block(config: &Configuration, language: &str, escaped_code: &str) -> String {
    let mut classes = vec![format!("language-{language}")];
    if config.number_lines.is_enabled() {
        classes.push("line-numbers".to_string());
    }
    if config.match_braces {
        classes.push("match-braces".to_string());
    }
    format!(
        "<pre class=\"{}\" data-start=\"{}\"><code>{}</code></pre>",
        escape_attribute(&classes.join(" ")),
        config.number_lines.start_line(),
        escaped_code
    )
}

/// The bar above or below the code, empty when nothing would be in it.
pub fn info_bar(config: &Configuration) -> String {
    if !config.info_bar_visible() {
        return String::new();
    }

    let buttons: String = config
        .toolbar_buttons()
        .iter()
        .map(|button| {
            format!(
                "<a href=\"javascript:;\" data-action=\"{}\">{}</a>",
                escape_attribute(&button.name),
                escape_for_markup(&button.label)
            )
        })
        .collect();

    let content = match (&config.info_html, &config.info_text) {
        (Some(html), _) => html.clone(),
        (None, Some(text)) => escape_for_markup(text),
        (None, None) => String::new(),
    };

    let tag = config
        .language_label()
        .map(|label| {
            format!(
                "<div class=\"language tag\" style=\"filter: grayscale(0) hue-rotate({}deg);\">{}</div>",
                js_number_string(language_hue(label)),
                escape_for_markup(label)
            )
        })
        .unwrap_or_default();

    format!("<div id=\"infoBar\"><div class=\"content\">{tag}{content}</div>{buttons}</div>")
}

/// Reads the letters of a word as a base-26 fraction in `[0, 1]`.
pub fn word_value(word: &str) -> f64 {
    let digits: Vec<u32> = word
        .chars()
        .map(|c| c.to_ascii_uppercase())
        .filter(char::is_ascii_uppercase)
        .map(|c| c as u32 - 'A' as u32)
        .collect();
    if digits.is_empty() {
        return 0.0;
    }
    let value = digits
        .iter()
        .fold(0.0, |acc, digit| acc * 26.0 + f64::from(*digit));
    value / (26f64.powi(digits.len() as i32) - 1.0)
}

/// A stable hue for a language tag, in whole degrees.
pub fn language_hue(label: &str) -> f64 {
    (word_value(label) * 360_000.0).round() % 360.0
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::{resolve, Action, OptionKey, Options, PageDefaults};
    use crate::protocol::ProtocolId;
    use pretty_assertions::assert_eq;

    fn config(options: Options) -> Configuration {
        resolve(&options, None, &PageDefaults::empty())
    }

    #[test]
    fn word_values() {
        assert_eq!(word_value(""), 0.0);
        assert_eq!(word_value("aaa"), 0.0);
        assert_eq!(word_value("ZZ"), 1.0);
        assert_eq!(word_value("b-a"), 26.0 / 675.0);
        assert!(language_hue("javascript") >= 0.0 && language_hue("javascript") < 360.0);
    }

    #[test]
    fn no_info_bar_by_default() {
        assert_eq!(info_bar(&config(Options::new())), "");
    }

    #[test]
    fn info_bar_orders_custom_actions_before_built_ins() {
        let options = Options::new()
            .set(OptionKey::Copyable, true)
            .set(OptionKey::Downloadable, "Save")
            .set(OptionKey::InfoText, "a < b")
            .action(Action::new("run-tests", "Run"));
        assert_eq!(
            info_bar(&config(options)),
            "<div id=\"infoBar\"><div class=\"content\">a &lt; b</div>\
<a href=\"javascript:;\" data-action=\"runTests\">Run</a>\
<a href=\"javascript:;\" data-action=\"copy\">Copy</a>\
<a href=\"javascript:;\" data-action=\"download\">Save</a></div>"
        );
    }

    #[test]
    fn info_html_is_not_escaped_and_wins_over_text() {
        let options = Options::new()
            .set(OptionKey::InfoHtml, "<b>bold</b>")
            .set(OptionKey::InfoText, "plain");
        assert!(info_bar(&config(options)).contains("<div class=\"content\"><b>bold</b></div>"));
    }

    #[test]
    fn language_tag_uses_label_or_language() {
        let shown = config(Options::new().language("rust").set(OptionKey::ShowLanguage, true));
        assert!(info_bar(&shown).contains(">rust</div>"));
        let labeled = config(Options::new().language("rust").set(OptionKey::ShowLanguage, "Rust 2021"));
        assert!(info_bar(&labeled).contains(">Rust 2021</div>"));
    }

    #[test]
    fn document_layout() {
        let options = Options::new()
            .language("js")
            .set(OptionKey::NumberLines, 7)
            .set(OptionKey::MatchBraces, true)
            .set(OptionKey::Copyable, true)
            .set(OptionKey::EndWithInfoBar, true)
            .set(OptionKey::RemoveMargins, true);
        let config = config(options);
        let id = ProtocolId::from("_frame");
        let html = PrismMarkup
            .generate(&MarkupRequest {
                config: &config,
                language: "js",
                code: "a &lt; b",
                identifier: &id,
            })
            .unwrap();

        assert!(html.contains("<base target=\"_parent\">"));
        assert!(html.contains(
            "<pre class=\"language-js line-numbers match-braces\" data-start=\"7\"><code>a &lt; b</code></pre><div id=\"infoBar\">"
        ));
        assert!(html.contains("pre[class*=language-]{margin:0;}"));
        assert!(html.contains(
            "<script type=\"application/json\" id=\"prismize-frame\">{\"id\":\"_frame\",\"resizeRate\":100,\"maxHeight\":null}</script>"
        ));

        let theme = html.find("themes/prism.min.css").unwrap();
        let style = html.find("<style>").unwrap();
        let plugin = html.find("prism-line-numbers.min.css").unwrap();
        assert!(theme < style && style < plugin);
    }
}
