//! Cookie records.
//!
//! Cookies reach a job from two places: `Set-Cookie` header lines seen on a
//! response, and the browser cookie jar read at the end of the job. Both end
//! up as a `CookieRecord` with string-valued attributes.

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

/// A single cookie with its optional attributes.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct CookieRecord {
    pub name: Option<String>,
    pub value: Option<String>,
    pub samesite: Option<String>,
    pub path: Option<String>,
    pub maxage: Option<String>,
    pub expires: Option<String>,
    pub domain: Option<String>,
    pub secure: Option<String>,
    pub httponly: Option<String>,
    pub size: Option<String>,
    pub priority: Option<String>,
}

/// Normalizes an attribute name: drops `-` and `|`, lowercases the rest.
///
/// `Max-Age` becomes `maxage`, `HttpOnly` and `httpOnly` both become `httponly`.
fn clean_field_name(name: &str) -> String {
    name.chars()
        .filter(|c| *c != '-' && *c != '|')
        .flat_map(char::to_lowercase)
        .collect()
}

fn value_to_string(value: &Value) -> Option<String> {
    match value {
        Value::Null => None,
        Value::String(s) => Some(s.clone()),
        other => Some(other.to_string()),
    }
}

impl CookieRecord {
    /// Mutable slot for a known attribute, `None` for anything else.
    fn attribute_mut(&mut self, cleaned: &str) -> Option<&mut Option<String>> {
        match cleaned {
            "samesite" => Some(&mut self.samesite),
            "path" => Some(&mut self.path),
            "maxage" => Some(&mut self.maxage),
            "expires" => Some(&mut self.expires),
            "domain" => Some(&mut self.domain),
            "secure" => Some(&mut self.secure),
            "httponly" => Some(&mut self.httponly),
            "size" => Some(&mut self.size),
            "priority" => Some(&mut self.priority),
            _ => None,
        }
    }

    /// Parses one `Set-Cookie` line such as `sid=abc123; Path=/; HttpOnly`.
    ///
    /// The leading field is the cookie's name and value. Later fields whose
    /// normalized name is a known attribute fill that attribute; flag
    /// attributes without `=` keep their literal token as the value
    /// (`HttpOnly` → `httponly = "HttpOnly"`). Unknown later fields are ignored.
    pub fn parse(raw: &str) -> Self {
        let mut cookie = CookieRecord::default();
        let mut fields = raw.split(';').map(str::trim).filter(|f| !f.is_empty());

        if let Some(first) = fields.next() {
            let (name, value) = first.split_once('=').unwrap_or((first, ""));
            cookie.name = Some(name.trim().to_string());
            cookie.value = Some(value.trim().to_string());
        }

        for field in fields {
            let (key, value) = match field.split_once('=') {
                Some((key, value)) => (key.trim(), value.trim()),
                None => (field, field),
            };
            let cleaned = clean_field_name(key);
            match cookie.attribute_mut(&cleaned) {
                Some(slot) => *slot = Some(value.to_string()),
                None => log::debug!("Ignoring unknown cookie attribute: {key}"),
            }
        }

        cookie
    }

    /// Parses a multi-line `Set-Cookie` header value, one cookie per line.
    pub fn parse_header(header: &str) -> Vec<Self> {
        header
            .split('\n')
            .map(str::trim)
            .filter(|line| !line.is_empty())
            .map(Self::parse)
            .collect()
    }

    /// Builds a record field by field from a structured source (the browser
    /// cookie jar). Keys are normalized like header attributes, so
    /// `httpOnly` and `sameSite` land in `httponly` and `samesite`.
    pub fn from_fields(fields: &Map<String, Value>) -> Self {
        let mut cookie = CookieRecord::default();
        for (key, value) in fields {
            let cleaned = clean_field_name(key);
            let value = value_to_string(value);
            match cleaned.as_str() {
                "name" => cookie.name = value,
                "value" => cookie.value = value,
                other => {
                    if let Some(slot) = cookie.attribute_mut(other) {
                        *slot = value;
                    }
                }
            }
        }
        cookie
    }
}
