#![forbid(unsafe_code)]

//! Request/response envelope.
//!
//! The framework does not speak HTTP itself. A transport adapter builds a
//! [`Request`] from whatever it received and writes the returned
//! [`Response`] back out. Both types are plain owned data.
//!
//! # URL layout
//!
//! ```text
//! {path_prefix}/{request handler key}/{request handler path...}?{query}
//! ```
//!
//! The path prefix (adaptor prefix plus application name, possibly empty)
//! is installed by the application before dispatch so that
//! [`Request::request_handler_key`] sees the handler segment first.

use std::borrow::Cow;
use std::fmt;

use crate::locale;

/// Reserved form/cookie key carrying the session ID.
pub const SESSION_ID_KEY: &str = "wosid";

/// Session ID spellings that mean "no session".
const SESSION_ID_SENTINELS: &[&str] = &["", "-", "nil"];

/// HTTP status codes the framework emits.
pub mod status {
    pub const OK: u16 = 200;
    pub const FOUND: u16 = 302;
    pub const BAD_REQUEST: u16 = 400;
    pub const FORBIDDEN: u16 = 403;
    pub const NOT_FOUND: u16 = 404;
    pub const INTERNAL_ERROR: u16 = 500;
}

// ---------------------------------------------------------------------------
// URL encoding
// ---------------------------------------------------------------------------

/// Decode `%XX` escapes and `+` (as space) in a form component.
///
/// Invalid escapes are kept literally; invalid UTF-8 is replaced.
pub fn url_decode(raw: &str) -> String {
    let bytes = raw.as_bytes();
    let mut out = Vec::with_capacity(bytes.len());
    let mut idx = 0;
    while idx < bytes.len() {
        match bytes[idx] {
            b'+' => out.push(b' '),
            b'%' if idx + 2 < bytes.len() => {
                match (hex_value(bytes[idx + 1]), hex_value(bytes[idx + 2])) {
                    (Some(hi), Some(lo)) => {
                        out.push((hi << 4) | lo);
                        idx += 2;
                    }
                    _ => out.push(b'%'),
                }
            }
            other => out.push(other),
        }
        idx += 1;
    }
    String::from_utf8_lossy(&out).into_owned()
}

fn hex_value(byte: u8) -> Option<u8> {
    match byte {
        b'0'..=b'9' => Some(byte - b'0'),
        b'a'..=b'f' => Some(byte - b'a' + 10),
        b'A'..=b'F' => Some(byte - b'A' + 10),
        _ => None,
    }
}

/// Percent-encode a query component (unreserved characters pass through).
pub fn url_encode(raw: &str) -> String {
    let mut out = String::with_capacity(raw.len());
    for byte in raw.bytes() {
        match byte {
            b'A'..=b'Z' | b'a'..=b'z' | b'0'..=b'9' | b'-' | b'_' | b'.' | b'~' => {
                out.push(char::from(byte));
            }
            _ => {
                out.push('%');
                out.push_str(&format!("{byte:02X}"));
            }
        }
    }
    out
}

/// Parse `a=1&b=2&a=3` into ordered, multi-valued pairs.
pub fn parse_query(query: &str) -> Vec<(String, String)> {
    query
        .split('&')
        .filter(|pair| !pair.is_empty())
        .map(|pair| {
            let (key, value) = pair.split_once('=').unwrap_or((pair, ""));
            (url_decode(key), url_decode(value))
        })
        .collect()
}

/// Build a query string from ordered pairs.
pub fn encode_query<'a>(pairs: impl IntoIterator<Item = (&'a str, &'a str)>) -> String {
    pairs
        .into_iter()
        .map(|(k, v)| format!("{}={}", url_encode(k), url_encode(v)))
        .collect::<Vec<_>>()
        .join("&")
}

/// Parse a `Cookie:` header value.
fn parse_cookie_header(raw: &str) -> Vec<(String, String)> {
    raw.split(';')
        .filter_map(|part| {
            let trimmed = part.trim();
            if trimmed.is_empty() {
                return None;
            }
            let (name, value) = trimmed
                .split_once('=')
                .map(|(n, v)| (n.trim(), v.trim()))
                .unwrap_or((trimmed, ""));
            (!name.is_empty()).then(|| (name.to_owned(), value.to_owned()))
        })
        .collect()
}

// ---------------------------------------------------------------------------
// Request
// ---------------------------------------------------------------------------

/// An inbound request.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Request {
    method: String,
    uri: String,
    headers: Vec<(String, String)>,
    cookies: Vec<(String, String)>,
    form: Vec<(String, String)>,
    body: Vec<u8>,
    path_prefix: String,
}

impl Request {
    /// Create a request; the query string of `uri` becomes form values.
    pub fn new(method: impl Into<String>, uri: impl Into<String>) -> Self {
        let uri = uri.into();
        let form = uri
            .split_once('?')
            .map(|(_, query)| parse_query(query))
            .unwrap_or_default();
        Self {
            method: method.into().to_ascii_uppercase(),
            uri,
            form,
            ..Self::default()
        }
    }

    pub fn get(uri: impl Into<String>) -> Self {
        Self::new("GET", uri)
    }

    pub fn post(uri: impl Into<String>) -> Self {
        Self::new("POST", uri)
    }

    /// Add a header. `Cookie` headers are also parsed into cookies.
    #[must_use]
    pub fn with_header(mut self, name: &str, value: &str) -> Self {
        if name.eq_ignore_ascii_case("cookie") {
            self.cookies.extend(parse_cookie_header(value));
        }
        self.headers.push((name.to_owned(), value.to_owned()));
        self
    }

    #[must_use]
    pub fn with_cookie(mut self, name: &str, value: &str) -> Self {
        self.cookies.push((name.to_owned(), value.to_owned()));
        self
    }

    #[must_use]
    pub fn with_form_value(mut self, name: &str, value: &str) -> Self {
        self.form.push((name.to_owned(), value.to_owned()));
        self
    }

    /// Attach a body; urlencoded bodies are parsed into form values.
    #[must_use]
    pub fn with_body(mut self, body: impl Into<Vec<u8>>) -> Self {
        self.body = body.into();
        let urlencoded = self
            .content_type()
            .is_some_and(|ct| ct.starts_with("application/x-www-form-urlencoded"));
        if urlencoded {
            let text = String::from_utf8_lossy(&self.body).into_owned();
            self.form.extend(parse_query(&text));
        }
        self
    }

    /// Attach a urlencoded form body built from `pairs`.
    #[must_use]
    pub fn with_form_body<'a>(self, pairs: impl IntoIterator<Item = (&'a str, &'a str)>) -> Self {
        self.with_header("Content-Type", "application/x-www-form-urlencoded")
            .with_body(encode_query(pairs))
    }

    /// Install the URL prefix that precedes the request handler key.
    pub fn set_path_prefix(&mut self, prefix: &str) {
        self.path_prefix = prefix.trim_end_matches('/').to_owned();
    }

    // --- accessors ---

    #[inline]
    pub fn method(&self) -> &str {
        &self.method
    }

    #[inline]
    pub fn uri(&self) -> &str {
        &self.uri
    }

    pub fn is_post(&self) -> bool {
        self.method == "POST"
    }

    pub fn is_get(&self) -> bool {
        self.method == "GET"
    }

    /// The URI without its query string.
    pub fn path(&self) -> &str {
        self.uri.split_once('?').map_or(self.uri.as_str(), |(p, _)| p)
    }

    pub fn query(&self) -> Option<&str> {
        self.uri.split_once('?').map(|(_, q)| q)
    }

    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers
            .iter()
            .find(|(k, _)| k.eq_ignore_ascii_case(name))
            .map(|(_, v)| v.as_str())
    }

    pub fn content_type(&self) -> Option<&str> {
        self.header("content-type")
    }

    #[inline]
    pub fn body(&self) -> &[u8] {
        &self.body
    }

    pub fn cookie_value(&self, name: &str) -> Option<&str> {
        self.cookie_values(name).into_iter().next()
    }

    pub fn cookie_values(&self, name: &str) -> Vec<&str> {
        self.cookies
            .iter()
            .filter(|(k, _)| k == name)
            .map(|(_, v)| v.as_str())
            .collect()
    }

    pub fn form_value(&self, name: &str) -> Option<&str> {
        self.form
            .iter()
            .find(|(k, _)| k == name)
            .map(|(_, v)| v.as_str())
    }

    pub fn form_values(&self, name: &str) -> Vec<&str> {
        self.form
            .iter()
            .filter(|(k, _)| k == name)
            .map(|(_, v)| v.as_str())
            .collect()
    }

    /// Distinct form keys in first-seen order.
    pub fn form_value_keys(&self) -> Vec<&str> {
        let mut keys: Vec<&str> = Vec::new();
        for (k, _) in &self.form {
            if !keys.contains(&k.as_str()) {
                keys.push(k);
            }
        }
        keys
    }

    #[inline]
    pub fn has_form_values(&self) -> bool {
        !self.form.is_empty()
    }

    fn handler_segments(&self) -> impl Iterator<Item = &str> {
        let path = self.path();
        let path = path.strip_prefix(self.path_prefix.as_str()).unwrap_or(path);
        path.split('/').filter(|s| !s.is_empty())
    }

    /// The first path segment after the prefix (`wo`, `wa`, ...).
    pub fn request_handler_key(&self) -> Option<&str> {
        self.handler_segments().next()
    }

    /// The path segments following the request handler key.
    pub fn request_handler_path_array(&self) -> Vec<&str> {
        self.handler_segments().skip(1).collect()
    }

    pub fn request_handler_path(&self) -> String {
        self.request_handler_path_array().join("/")
    }

    /// Session ID from the form values, falling back to the first usable
    /// cookie. Sentinel values count as absent.
    pub fn session_id(&self) -> Option<String> {
        self.session_id_candidates().into_iter().next()
    }

    /// Every usable session ID in the request: the form value first, then
    /// each `wosid` cookie in order, without duplicates.
    pub fn session_id_candidates(&self) -> Vec<String> {
        let mut out: Vec<String> = Vec::new();
        let form = self.form_value(SESSION_ID_KEY).map(str::trim);
        for candidate in form
            .into_iter()
            .chain(self.cookie_values(SESSION_ID_KEY).into_iter().map(str::trim))
        {
            if SESSION_ID_SENTINELS.contains(&candidate) {
                continue;
            }
            if !out.iter().any(|seen| seen == candidate) {
                out.push(candidate.to_owned());
            }
        }
        out
    }

    pub fn is_session_id_in_request(&self) -> bool {
        self.session_id().is_some()
    }

    /// Zope-style `:action` form keys.
    ///
    /// `name:action` yields `name`; a bare `:action` key yields its value;
    /// image submits (`name:action.x`) yield `name`.
    pub fn form_action(&self) -> Option<String> {
        for key in self.form_value_keys() {
            if key == ":action" {
                return self.form_value(key).map(str::to_owned);
            }
            if let Some(name) = key.strip_suffix(":action") {
                return Some(name.to_owned());
            }
            if let Some(name) = key.strip_suffix(":action.x").filter(|n| !n.is_empty()) {
                return Some(name.to_owned());
            }
        }
        None
    }

    /// Languages from `Accept-Language`, best first.
    pub fn accept_languages(&self) -> Vec<String> {
        self.header("accept-language")
            .map(locale::parse_accept_language)
            .unwrap_or_default()
    }
}

// ---------------------------------------------------------------------------
// Cookie
// ---------------------------------------------------------------------------

/// An outbound cookie.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Cookie {
    pub name: String,
    pub value: String,
    pub path: Option<String>,
    pub domain: Option<String>,
    pub max_age: Option<i64>,
    pub secure: bool,
    pub http_only: bool,
}

impl Cookie {
    pub fn new(name: impl Into<String>, value: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            value: value.into(),
            ..Self::default()
        }
    }

    #[must_use]
    pub fn with_path(mut self, path: impl Into<String>) -> Self {
        self.path = Some(path.into());
        self
    }

    #[must_use]
    pub fn with_max_age(mut self, secs: i64) -> Self {
        self.max_age = Some(secs);
        self
    }

    /// The `Set-Cookie` header value.
    pub fn header_value(&self) -> String {
        self.to_string()
    }
}

impl fmt::Display for Cookie {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}={}", self.name, self.value)?;
        if let Some(path) = &self.path {
            write!(f, "; Path={path}")?;
        }
        if let Some(domain) = &self.domain {
            write!(f, "; Domain={domain}")?;
        }
        if let Some(max_age) = self.max_age {
            write!(f, "; Max-Age={max_age}")?;
        }
        if self.secure {
            f.write_str("; Secure")?;
        }
        if self.http_only {
            f.write_str("; HttpOnly")?;
        }
        Ok(())
    }
}

// ---------------------------------------------------------------------------
// Response
// ---------------------------------------------------------------------------

/// An outbound response with an in-memory body.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Response {
    status: u16,
    headers: Vec<(String, String)>,
    cookies: Vec<Cookie>,
    body: Vec<u8>,
}

impl Default for Response {
    fn default() -> Self {
        Self::new()
    }
}

impl Response {
    /// An empty `200` HTML response.
    pub fn new() -> Self {
        Self {
            status: status::OK,
            headers: vec![(
                "Content-Type".to_owned(),
                "text/html; charset=utf-8".to_owned(),
            )],
            cookies: Vec::new(),
            body: Vec::new(),
        }
    }

    pub fn with_status(status: u16) -> Self {
        let mut response = Self::new();
        response.status = status;
        response
    }

    /// A `302` pointing at `location`.
    pub fn redirect(location: &str) -> Self {
        let mut response = Self::with_status(status::FOUND);
        response.set_header("Location", location);
        response
    }

    #[inline]
    pub fn status(&self) -> u16 {
        self.status
    }

    pub fn set_status(&mut self, status: u16) {
        self.status = status;
    }

    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers
            .iter()
            .find(|(k, _)| k.eq_ignore_ascii_case(name))
            .map(|(_, v)| v.as_str())
    }

    pub fn headers(&self) -> &[(String, String)] {
        &self.headers
    }

    /// Replace every header called `name`.
    pub fn set_header(&mut self, name: &str, value: &str) {
        self.headers.retain(|(k, _)| !k.eq_ignore_ascii_case(name));
        self.headers.push((name.to_owned(), value.to_owned()));
    }

    pub fn add_header(&mut self, name: &str, value: &str) {
        self.headers.push((name.to_owned(), value.to_owned()));
    }

    pub fn content_type(&self) -> Option<&str> {
        self.header("content-type")
    }

    pub fn set_content_type(&mut self, content_type: &str) {
        self.set_header("Content-Type", content_type);
    }

    pub fn is_html(&self) -> bool {
        self.content_type()
            .is_some_and(|ct| ct.trim_start().starts_with("text/html"))
    }

    pub fn add_cookie(&mut self, cookie: Cookie) {
        self.cookies.retain(|c| c.name != cookie.name);
        self.cookies.push(cookie);
    }

    pub fn cookies(&self) -> &[Cookie] {
        &self.cookies
    }

    pub fn cookie(&self, name: &str) -> Option<&Cookie> {
        self.cookies.iter().find(|c| c.name == name)
    }

    /// Ask clients and proxies not to cache the response.
    pub fn disable_client_caching(&mut self) {
        self.set_header("Cache-Control", "no-cache, no-store, must-revalidate, max-age=0");
        self.set_header("Pragma", "no-cache");
        self.set_header("Expires", "0");
    }

    // --- body ---

    #[inline]
    pub fn content(&self) -> &[u8] {
        &self.body
    }

    pub fn content_string(&self) -> Cow<'_, str> {
        String::from_utf8_lossy(&self.body)
    }

    pub fn clear_content(&mut self) {
        self.body.clear();
    }

    pub fn append_content_bytes(&mut self, bytes: &[u8]) {
        self.body.extend_from_slice(bytes);
    }

    pub fn append_content_string(&mut self, s: &str) {
        self.body.extend_from_slice(s.as_bytes());
    }

    /// Append `s` with HTML special characters escaped.
    pub fn append_content_html_string(&mut self, s: &str) {
        let escaped = v_htmlescape::escape(s).to_string();
        self.body.extend_from_slice(escaped.as_bytes());
    }

    /// `<name`
    pub fn append_begin_tag(&mut self, name: &str) {
        self.append_content_string("<");
        self.append_content_string(name);
    }

    /// ` name="value"` with the value escaped.
    pub fn append_attribute(&mut self, name: &str, value: &str) {
        self.append_content_string(" ");
        self.append_content_string(name);
        self.append_content_string("=\"");
        self.append_content_html_string(value);
        self.append_content_string("\"");
    }

    /// `>`
    pub fn append_begin_tag_end(&mut self) {
        self.append_content_string(">");
    }

    /// ` />`
    pub fn append_begin_tag_close(&mut self) {
        self.append_content_string(" />");
    }

    /// `</name>`
    pub fn append_end_tag(&mut self, name: &str) {
        self.append_content_string("</");
        self.append_content_string(name);
        self.append_content_string(">");
    }
}

#[cfg(test)]
mod tests {
    use pretty_assertions::assert_eq;

    use super::*;

    #[test]
    fn query_values_are_decoded_and_multi_valued() {
        let rq = Request::get("/wa/Main/search?q=a+b%21&tag=x&tag=y&flag");
        assert_eq!(rq.form_value("q"), Some("a b!"));
        assert_eq!(rq.form_values("tag"), vec!["x", "y"]);
        assert_eq!(rq.form_value("flag"), Some(""));
        assert_eq!(rq.form_value_keys(), vec!["q", "tag", "flag"]);
        assert_eq!(rq.path(), "/wa/Main/search");
    }

    #[test]
    fn url_decode_keeps_broken_escapes() {
        assert_eq!(url_decode("100%"), "100%");
        assert_eq!(url_decode("%zz"), "%zz");
        assert_eq!(url_decode("%41%42"), "AB");
        assert_eq!(url_encode("a b/é"), "a%20b%2F%C3%A9");
    }

    #[test]
    fn urlencoded_body_becomes_form_values() {
        let rq = Request::post("/wo/s/c/0.1").with_form_body([("title", "hello"), ("name:action", "submit")]);
        assert!(rq.is_post());
        assert_eq!(rq.form_value("title"), Some("hello"));
        assert_eq!(rq.form_value("name:action"), Some("submit"));
    }

    #[test]
    fn handler_key_and_path_respect_prefix() {
        let mut rq = Request::get("/App/wo/sid/ctx/0.1?x=1");
        rq.set_path_prefix("/App");
        assert_eq!(rq.request_handler_key(), Some("wo"));
        assert_eq!(rq.request_handler_path_array(), vec!["sid", "ctx", "0.1"]);
        assert_eq!(rq.request_handler_path(), "sid/ctx/0.1");

        let bare = Request::get("/");
        assert_eq!(bare.request_handler_key(), None);
        assert!(bare.request_handler_path_array().is_empty());
    }

    #[test]
    fn session_id_prefers_form_and_skips_sentinels() {
        let rq = Request::get("/wa?wosid=nil")
            .with_header("Cookie", "wosid=-; wosid=abc; other=1; wosid=def");
        assert_eq!(rq.session_id().as_deref(), Some("abc"));
        assert_eq!(rq.session_id_candidates(), vec!["abc", "def"]);

        let form = Request::get("/wa?wosid=xyz").with_cookie("wosid", "abc");
        assert_eq!(form.session_id().as_deref(), Some("xyz"));

        let none = Request::get("/wa?wosid=").with_cookie("wosid", "nil");
        assert_eq!(none.session_id(), None);
        assert!(!none.is_session_id_in_request());
    }

    #[test]
    fn form_action_variants() {
        assert_eq!(
            Request::get("/wa?save:action=Save").form_action().as_deref(),
            Some("save")
        );
        assert_eq!(
            Request::get("/wa?%3Aaction=doIt").form_action().as_deref(),
            Some("doIt")
        );
        assert_eq!(
            Request::get("/wa?img:action.x=3&img:action.y=4")
                .form_action()
                .as_deref(),
            Some("img")
        );
        assert_eq!(Request::get("/wa?a=1").form_action(), None);
    }

    #[test]
    fn response_tag_helpers_escape_attributes() {
        let mut r = Response::new();
        r.append_begin_tag("input");
        r.append_attribute("value", "a\"<b>");
        r.append_begin_tag_close();
        r.append_content_html_string("x & y");
        assert_eq!(
            r.content_string(),
            "<input value=\"a&quot;&lt;b&gt;\" />x &amp; y"
        );
        assert!(r.is_html());
    }

    #[test]
    fn cookie_serialization() {
        let cookie = Cookie::new("wosid", "abc").with_path("/App").with_max_age(3600);
        assert_eq!(cookie.header_value(), "wosid=abc; Path=/App; Max-Age=3600");
        let mut r = Response::new();
        r.add_cookie(cookie);
        r.add_cookie(Cookie::new("wosid", "").with_max_age(0));
        assert_eq!(r.cookies().len(), 1);
        assert_eq!(r.cookie("wosid").map(|c| c.value.as_str()), Some(""));
    }

    #[test]
    fn redirect_and_caching_headers() {
        let mut r = Response::redirect("/wa/Main");
        assert_eq!(r.status(), status::FOUND);
        assert_eq!(r.header("location"), Some("/wa/Main"));
        r.disable_client_caching();
        assert_eq!(r.header("pragma"), Some("no-cache"));
    }
}
