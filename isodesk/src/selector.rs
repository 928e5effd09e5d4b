use crate::element::UIElement;
use std::fmt;

/// Parsed element query built from the `key:value;key:value` mini-language.
///
/// Recognised keys are `name`, `automationid` (or `aid`), `class`, `type` and
/// `contains`. A token without a recognised key is a `contains` term. Empty
/// input and `*` produce the empty query, which addresses the tree root.
#[derive(Debug, Clone, Default, PartialEq, Eq, Hash)]
pub struct Query {
    pub name: Option<String>,
    pub automation_id: Option<String>,
    pub class_name: Option<String>,
    pub control_type: Option<String>,
    pub contains: Option<String>,
}

impl Query {
    pub fn parse(s: &str) -> Self {
        let mut query = Query::default();
        let trimmed = s.trim();
        if trimmed.is_empty() || trimmed == "*" {
            return query;
        }

        for token in trimmed.split(';').map(str::trim).filter(|t| !t.is_empty()) {
            let (key, value) = match token.split_once(':') {
                Some((k, v)) => (k.trim().to_ascii_lowercase(), v.trim()),
                None => (String::new(), token),
            };
            let slot = match key.as_str() {
                "name" => &mut query.name,
                "automationid" | "aid" => &mut query.automation_id,
                "class" | "classname" => &mut query.class_name,
                "type" | "controltype" => &mut query.control_type,
                "contains" => &mut query.contains,
                // Unknown prefixes (e.g. a URL) are searched for verbatim.
                _ => {
                    query.contains = Some(token.to_string());
                    continue;
                }
            };
            if !value.is_empty() {
                *slot = Some(value.to_string());
            }
        }
        query
    }

    /// True when no key is set: the query resolves to the root itself.
    pub fn is_root(&self) -> bool {
        !self.has_structured() && self.contains.is_none()
    }

    pub fn has_structured(&self) -> bool {
        self.name.is_some()
            || self.automation_id.is_some()
            || self.class_name.is_some()
            || self.control_type.is_some()
    }

    /// Conjunctive exact match on the structured keys. Control types compare
    /// ignoring ASCII case so `type:button` matches `Button`.
    pub fn matches_structured(&self, element: &UIElement) -> bool {
        if let Some(name) = &self.name {
            if element.name().as_deref() != Some(name.as_str()) {
                return false;
            }
        }
        if let Some(aid) = &self.automation_id {
            if element.automation_id().as_deref() != Some(aid.as_str()) {
                return false;
            }
        }
        if let Some(class) = &self.class_name {
            if element.class_name().as_deref() != Some(class.as_str()) {
                return false;
            }
        }
        if let Some(control_type) = &self.control_type {
            if !element.control_type().eq_ignore_ascii_case(control_type) {
                return false;
            }
        }
        true
    }

    /// Case-insensitive substring test against name, automation id and class name.
    pub fn matches_contains(&self, element: &UIElement) -> bool {
        let Some(needle) = &self.contains else {
            return true;
        };
        let needle = needle.to_lowercase();
        [element.name(), element.automation_id(), element.class_name()]
            .into_iter()
            .flatten()
            .any(|hay| hay.to_lowercase().contains(&needle))
    }
}

impl From<&str> for Query {
    fn from(s: &str) -> Self {
        Query::parse(s)
    }
}

impl fmt::Display for Query {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.is_root() {
            return write!(f, "*");
        }
        let parts: Vec<String> = [
            ("name", &self.name),
            ("aid", &self.automation_id),
            ("class", &self.class_name),
            ("type", &self.control_type),
            ("contains", &self.contains),
        ]
        .iter()
        .filter_map(|(k, v)| v.as_ref().map(|v| format!("{k}:{v}")))
        .collect();
        write!(f, "{}", parts.join(";"))
    }
}
