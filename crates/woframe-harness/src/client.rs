#![forbid(unsafe_code)]

//! A browser stand-in: remembers cookies and the last page it saw.

use ahash::AHashMap;
use woframe_core::{Request, Response};

use crate::app::TestApp;
use crate::html;

/// Sends requests to a [`TestApp`], replaying cookies the way a browser
/// would. A cookie with `max_age == 0` deletes the stored value.
#[derive(Debug)]
pub struct Client<'a> {
    app: &'a TestApp,
    cookies: AHashMap<String, String>,
    last_page: Option<String>,
}

impl<'a> Client<'a> {
    pub fn new(app: &'a TestApp) -> Self {
        Self {
            app,
            cookies: AHashMap::new(),
            last_page: None,
        }
    }

    pub fn cookie(&self, name: &str) -> Option<&str> {
        self.cookies.get(name).map(String::as_str)
    }

    pub fn set_cookie(&mut self, name: &str, value: &str) {
        self.cookies.insert(name.to_owned(), value.to_owned());
    }

    pub fn clear_cookies(&mut self) {
        self.cookies.clear();
    }

    /// Unescaped markup of the last response.
    pub fn last_page(&self) -> Option<&str> {
        self.last_page.as_deref()
    }

    pub fn get(&mut self, uri: &str) -> Response {
        self.send(Request::get(uri))
    }

    pub fn post_form(&mut self, uri: &str, pairs: &[(&str, &str)]) -> Response {
        self.send(Request::post(uri).with_form_body(pairs.iter().copied()))
    }

    /// Follow the first link of the last page whose URL contains
    /// `fragment`. `None` when no such link exists.
    pub fn follow_link(&mut self, fragment: &str) -> Option<Response> {
        let href = self
            .last_page
            .as_deref()
            .and_then(|page| html::hrefs(page).into_iter().find(|h| h.contains(fragment)))?;
        Some(self.get(&href))
    }

    pub fn send(&mut self, mut request: Request) -> Response {
        let mut names: Vec<&String> = self.cookies.keys().collect();
        names.sort_unstable();
        for name in names {
            request = request.with_cookie(name, &self.cookies[name]);
        }
        let response = self.app.dispatch(request);
        for cookie in response.cookies() {
            if cookie.max_age == Some(0) || cookie.value.is_empty() {
                self.cookies.remove(&cookie.name);
            } else {
                self.cookies.insert(cookie.name.clone(), cookie.value.clone());
            }
        }
        self.last_page = Some(html::unescape_html(&response.content_string()));
        response
    }
}
