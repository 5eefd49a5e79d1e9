#![forbid(unsafe_code)]

//! Markup inspection helpers.
//!
//! Small scanners over the exact shape the woframe elements emit:
//! double quoted `name="value"` attributes escaped with `v_htmlescape`.
//! Not an HTML parser.

/// Reverse the entity escaping applied to content and attribute values.
pub fn unescape_html(text: &str) -> String {
    text.replace("&#x2f;", "/")
        .replace("&#x27;", "'")
        .replace("&quot;", "\"")
        .replace("&lt;", "<")
        .replace("&gt;", ">")
        .replace("&amp;", "&")
}

/// Values of `attr` on every `<tag ...>` in `markup`, unescaped, in
/// document order.
pub fn attribute_values(markup: &str, tag: &str, attr: &str) -> Vec<String> {
    let open = format!("<{tag}");
    let needle = format!(" {attr}=\"");
    let mut out = Vec::new();
    let mut rest = markup;
    while let Some(start) = rest.find(&open) {
        let after = &rest[start + open.len()..];
        // `<a` must not match `<abbr`
        if !after.starts_with([' ', '>', '/']) {
            rest = after;
            continue;
        }
        let end = after.find('>').unwrap_or(after.len());
        let tag_text = &after[..end];
        if let Some(pos) = tag_text.find(&needle) {
            let value = &tag_text[pos + needle.len()..];
            let value = value.split('"').next().unwrap_or_default();
            out.push(unescape_html(value));
        }
        rest = &after[end..];
    }
    out
}

pub fn hrefs(markup: &str) -> Vec<String> {
    attribute_values(markup, "a", "href")
}

pub fn form_actions(markup: &str) -> Vec<String> {
    attribute_values(markup, "form", "action")
}

pub fn input_names(markup: &str) -> Vec<String> {
    attribute_values(markup, "input", "name")
}

/// The parts of a component action URL:
/// `.../{key}/{session id}/{context id}[/{element id}]`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ComponentActionUrl {
    pub session_id: String,
    pub context_id: String,
    pub element_id: Option<String>,
}

impl ComponentActionUrl {
    /// Parse `url` using request handler key `key`. The query string and
    /// fragment are ignored.
    pub fn parse(url: &str, key: &str) -> Option<Self> {
        let path = url.split(['?', '#']).next()?;
        let mut segments = path.split('/').filter(|s| !s.is_empty());
        segments.by_ref().find(|s| *s == key)?;
        let session_id = segments.next()?.to_owned();
        let context_id = segments.next()?.to_owned();
        let element_id = segments.next().map(str::to_owned);
        Some(Self {
            session_id,
            context_id,
            element_id,
        })
    }
}
