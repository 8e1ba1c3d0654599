use super::MarkupError;
use crate::config::Configuration;

/// Version substituted for `[[version]]` in asset templates.
pub const ASSET_VERSION: &str = "1.X.X";

/// Replaces `[[key]]` placeholders with their values. Unknown keys stay as
/// written.
pub fn fill_template(template: &str, values: &[(&str, &str)]) -> String {
    let mut filled = String::with_capacity(template.len());
    let mut rest = template;

    while let Some(start) = rest.find("[[") {
        filled.push_str(&rest[..start]);
        let after = &rest[start + 2..];
        let replacement = after.find("]]").and_then(|end| {
            values
                .iter()
                .find(|(key, _)| *key == &after[..end])
                .map(|(_, value)| (*value, end))
        });
        match replacement {
            Some((value, end)) => {
                filled.push_str(value);
                rest = &after[end + 2..];
            }
            None => {
                filled.push('[');
                rest = &rest[start + 1..];
            }
        }
    }
    filled.push_str(rest);
    filled
}

/// Stylesheet and script URLs a frame document loads.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct AssetPaths {
    pub stylesheets: Vec<String>,
    pub scripts: Vec<String>,
}

impl AssetPaths {
    pub fn for_config(config: &Configuration) -> Result<Self, MarkupError> {
        let template = config.template_path.as_str();
        if !template.contains("[[path]]") {
            return Err(MarkupError::Template(template.to_string()));
        }
        let fill = |path: &str| fill_template(template, &[("version", ASSET_VERSION), ("path", path)]);

        let theme = if is_theme_name(&config.theme) {
            match config.theme.as_str() {
                "default" => fill("themes/prism.min.css"),
                name => fill(&format!("themes/prism-{name}.min.css")),
            }
        } else {
            config.theme.clone()
        };

        let mut paths = Self {
            stylesheets: vec![theme],
            scripts: vec![
                fill("prism.min.js"),
                fill("plugins/autoloader/prism-autoloader.min.js"),
            ],
        };

        let mut plugin = |base: &str| {
            paths
                .stylesheets
                .push(fill(&format!("plugins/{base}.min.css")));
            paths.scripts.push(fill(&format!("plugins/{base}.min.js")));
        };
        if config.number_lines.is_enabled() {
            plugin("line-numbers/prism-line-numbers");
        }
        if config.match_braces {
            plugin("match-braces/prism-match-braces");
        }
        if config.preview_colors {
            plugin("inline-color/prism-inline-color");
            paths
                .scripts
                .push(fill("components/prism-css-extras.min.js"));
        }
        Ok(paths)
    }
}

/// A bare theme name rather than a stylesheet URL.
fn is_theme_name(theme: &str) -> bool {
    theme
        .chars()
        .all(|c| c.is_ascii_alphanumeric() || c == '_' || c == '-')
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::{resolve, OptionKey, Options, PageDefaults};

    fn paths(options: Options) -> Result<AssetPaths, MarkupError> {
        AssetPaths::for_config(&resolve(&options, None, &PageDefaults::empty()))
    }

    #[test]
    fn fills_known_placeholders() {
        assert_eq!(
            fill_template("/p@[[version]]/[[path]]", &[("version", "1"), ("path", "a.js")]),
            "/p@1/a.js"
        );
        assert_eq!(fill_template("[[other]]/[[path]]", &[("path", "x")]), "[[other]]/x");
        assert_eq!(fill_template("[[[path]]", &[("path", "x")]), "[x");
        assert_eq!(fill_template("[[path", &[("path", "x")]), "[[path");
    }

    #[test]
    fn core_assets_and_default_theme() {
        let paths = paths(Options::new()).unwrap();
        assert_eq!(
            paths.stylesheets,
            vec!["https://cdn.jsdelivr.net/npm/prismjs@1.X.X/themes/prism.min.css"]
        );
        assert_eq!(
            paths.scripts,
            vec![
                "https://cdn.jsdelivr.net/npm/prismjs@1.X.X/prism.min.js",
                "https://cdn.jsdelivr.net/npm/prismjs@1.X.X/plugins/autoloader/prism-autoloader.min.js",
            ]
        );
    }

    #[test]
    fn plugins_follow_toggles() {
        let options = Options::new()
            .set(OptionKey::TemplatePath, "/prism/[[path]]")
            .set(OptionKey::Theme, "okaidia")
            .set(OptionKey::NumberLines, true)
            .set(OptionKey::PreviewColors, true);
        let paths = paths(options).unwrap();
        assert_eq!(
            paths.stylesheets,
            vec![
                "/prism/themes/prism-okaidia.min.css",
                "/prism/plugins/line-numbers/prism-line-numbers.min.css",
                "/prism/plugins/inline-color/prism-inline-color.min.css",
            ]
        );
        assert_eq!(
            paths.scripts.last().map(String::as_str),
            Some("/prism/components/prism-css-extras.min.js")
        );
    }

    #[test]
    fn theme_urls_are_used_verbatim() {
        let options = Options::new().set(OptionKey::Theme, "https://example.com/theme.css");
        assert_eq!(
            paths(options).unwrap().stylesheets[0],
            "https://example.com/theme.css"
        );
    }

    #[test]
    fn template_without_path_is_rejected() {
        let options = Options::new().set(OptionKey::TemplatePath, "/prism/[[version]]");
        assert!(matches!(paths(options), Err(MarkupError::Template(_))));
    }
}
