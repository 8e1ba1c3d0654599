use kuchiki::NodeRef;
use percent_encoding::{utf8_percent_encode, AsciiSet, NON_ALPHANUMERIC};

/// Characters left alone by `encodeURIComponent`.
const URI_COMPONENT: &AsciiSet = &NON_ALPHANUMERIC
    .remove(b'-')
    .remove(b'_')
    .remove(b'.')
    .remove(b'!')
    .remove(b'~')
    .remove(b'*')
    .remove(b'\'')
    .remove(b'(')
    .remove(b')');

fn is_line_break(c: char) -> bool {
    c == '\r' || c == '\n'
}

fn is_indent(c: char) -> bool {
    c.is_whitespace() && !is_line_break(c)
}

/// Expands tabs and strips the indentation shared by every non-blank line.
///
/// Nothing is stripped when any line starts at column zero. With `trim`,
/// leading blank lines and trailing whitespace are removed too.
pub fn unindent_to_minimum(text: &str, tab_size: usize, trim: bool) -> String {
    let text = if text.contains('\t') {
        text.replace('\t', &" ".repeat(tab_size))
    } else {
        text.to_string()
    };
    let lines: Vec<&str> = text.split_inclusive(is_line_break).collect();

    let flush_left = lines
        .iter()
        .any(|line| line.chars().next().map_or(false, |c| !c.is_whitespace()));

    let unindented = if flush_left {
        text.clone()
    } else {
        let min = lines
            .iter()
            .filter_map(|line| {
                let indent = line.chars().take_while(|c| is_indent(*c)).count();
                let rest = line.chars().nth(indent);
                match rest {
                    Some(c) if indent > 0 && !c.is_whitespace() => Some(indent),
                    _ => None,
                }
            })
            .min();

        lines
            .iter()
            .map(|line| {
                let indent = line.chars().take_while(|c| is_indent(*c)).count();
                let strip = min.map_or(indent, |min| min.min(indent));
                let offset = line
                    .char_indices()
                    .nth(strip)
                    .map_or(line.len(), |(offset, _)| offset);
                &line[offset..]
            })
            .collect::<String>()
    };

    if trim {
        trim_blank_edges(&unindented).to_string()
    } else {
        unindented
    }
}

fn trim_blank_edges(text: &str) -> &str {
    let leading_ws = text
        .char_indices()
        .find(|(_, c)| !c.is_whitespace())
        .map_or(text.len(), |(offset, _)| offset);
    let start = text[..leading_ws]
        .rfind(is_line_break)
        .map_or(0, |offset| offset + 1);
    text[start..].trim_end()
}

/// Escapes text so it displays unchanged inside element content.
pub fn escape_for_markup(text: &str) -> String {
    html_escape::encode_text(text).into_owned()
}

/// Escapes text for use inside a double-quoted attribute value.
pub fn escape_attribute(text: &str) -> String {
    html_escape::encode_double_quoted_attribute(text).into_owned()
}

/// Percent-encodes text for a URL component such as a `data:` payload.
pub fn encode_uri_component(text: &str) -> String {
    utf8_percent_encode(text, URI_COMPONENT).to_string()
}

/// Text content of a source element, with `<br>` elements read as newlines.
pub fn element_code_text(node: &NodeRef) -> String {
    let mut text = String::new();
    for descendant in node.descendants() {
        if let Some(chunk) = descendant.as_text() {
            text.push_str(&chunk.borrow());
        } else if let Some(element) = descendant.as_element() {
            if &*element.name.local == "br" {
                text.push('\n');
            }
        }
    }
    text
}
