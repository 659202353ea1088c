//! Namespace scopes and qualified names.

use xbind_model::Model;

use crate::error::ContentError;

/// Namespace of `xsi:type`.
pub const XSI_URI: &str = "http://www.w3.org/2001/XMLSchema-instance";

/// Namespace implicitly bound to the `xml` prefix.
pub const XML_URI: &str = "http://www.w3.org/XML/1998/namespace";

/// A raw `prefix:local` name.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct QName<'a> {
    pub prefix: Option<&'a str>,
    pub local: &'a str,
}

impl<'a> QName<'a> {
    pub fn parse(raw: &'a str) -> Self {
        match raw.split_once(':') {
            Some((prefix, local)) => QName {
                prefix: Some(prefix),
                local,
            },
            None => QName {
                prefix: None,
                local: raw,
            },
        }
    }
}

/// A name resolved against the active scope.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResolvedName {
    /// Namespace URI, `None` when the name is in no namespace.
    pub uri: Option<String>,
    pub local: String,
    /// Prefix used in the document.
    pub prefix: Option<String>,
}

/// Returns the declared prefix if `attr` is a namespace declaration.
///
/// `xmlns` declares the default namespace (empty prefix).
pub fn declared_prefix(attr: &str) -> Option<&str> {
    if attr == "xmlns" {
        Some("")
    } else {
        attr.strip_prefix("xmlns:")
    }
}

/// Stack of prefix bindings, one frame per open element.
#[derive(Debug, Default, Clone)]
pub struct NamespaceScope {
    frames: Vec<Vec<(String, String)>>,
}

impl NamespaceScope {
    pub fn new() -> Self {
        Self::default()
    }

    /// Opens a frame with the declarations of one start tag.
    pub fn push(&mut self, declarations: Vec<(String, String)>) {
        self.frames.push(declarations);
    }

    pub fn pop(&mut self) {
        self.frames.pop();
    }

    /// URI bound to `prefix`, innermost declaration first.
    ///
    /// An empty URI (`xmlns=""`) unbinds.
    pub fn lookup(&self, prefix: &str) -> Option<&str> {
        if prefix == "xml" {
            return Some(XML_URI);
        }
        self.frames
            .iter()
            .rev()
            .flat_map(|frame| frame.iter().rev())
            .find(|(p, _)| p == prefix)
            .map(|(_, uri)| uri.as_str())
            .filter(|uri| !uri.is_empty())
    }

    /// Resolves an element name; unprefixed names take the default namespace.
    pub fn resolve_element(&self, raw: &str) -> Result<ResolvedName, ContentError> {
        self.resolve(raw, true)
    }

    /// Resolves an attribute name; unprefixed names have no namespace.
    pub fn resolve_attribute(&self, raw: &str) -> Result<ResolvedName, ContentError> {
        self.resolve(raw, false)
    }

    fn resolve(&self, raw: &str, use_default: bool) -> Result<ResolvedName, ContentError> {
        let qname = QName::parse(raw);
        match qname.prefix {
            Some(prefix) => {
                let uri = self
                    .lookup(prefix)
                    .ok_or_else(|| ContentError::UnknownPrefix(prefix.to_string()))?;
                Ok(ResolvedName {
                    uri: Some(uri.to_string()),
                    local: qname.local.to_string(),
                    prefix: Some(prefix.to_string()),
                })
            }
            None => Ok(ResolvedName {
                uri: if use_default {
                    self.lookup("").map(str::to_string)
                } else {
                    None
                },
                local: qname.local.to_string(),
                prefix: None,
            }),
        }
    }
}

/// Display prefixes for resolved names.
///
/// Known namespaces use the model prefix, unknown prefixed namespaces keep
/// the document prefix, and each unknown default namespace gets a
/// synthesized `ns0`, `ns1`, ... in order of first use.
#[derive(Debug, Default)]
pub struct DisplayNames {
    anonymous: Vec<String>,
}

impl DisplayNames {
    pub fn new() -> Self {
        Self::default()
    }

    /// Display prefix of `name`; empty when it is in no namespace.
    pub fn prefix(&mut self, model: &Model, name: &ResolvedName) -> String {
        let Some(uri) = name.uri.as_deref() else {
            return String::new();
        };
        if let Some(package) = model.package_by_uri(uri) {
            return package.prefix.clone();
        }
        if let Some(prefix) = name.prefix.as_deref() {
            return prefix.to_string();
        }
        let idx = match self.anonymous.iter().position(|known| known == uri) {
            Some(idx) => idx,
            None => {
                self.anonymous.push(uri.to_string());
                self.anonymous.len() - 1
            }
        };
        format!("ns{idx}")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn decl(prefix: &str, uri: &str) -> (String, String) {
        (prefix.to_string(), uri.to_string())
    }

    #[test]
    fn test_qname_parse() {
        assert_eq!(
            QName::parse("props:root"),
            QName {
                prefix: Some("props"),
                local: "root"
            }
        );
        assert_eq!(QName::parse("root").prefix, None);
    }

    #[test]
    fn test_declared_prefix() {
        assert_eq!(declared_prefix("xmlns"), Some(""));
        assert_eq!(declared_prefix("xmlns:a"), Some("a"));
        assert_eq!(declared_prefix("xmlnsfoo"), None);
        assert_eq!(declared_prefix("a:xmlns"), None);
    }

    #[test]
    fn test_innermost_binding_wins() {
        let mut scope = NamespaceScope::new();
        scope.push(vec![decl("a", "http://outer"), decl("", "http://default")]);
        scope.push(vec![decl("a", "http://inner")]);

        assert_eq!(scope.lookup("a"), Some("http://inner"));
        assert_eq!(scope.lookup(""), Some("http://default"));

        scope.pop();
        assert_eq!(scope.lookup("a"), Some("http://outer"));
    }

    #[test]
    fn test_default_namespace_skips_attributes() -> Result<(), ContentError> {
        let mut scope = NamespaceScope::new();
        scope.push(vec![decl("", "http://default")]);

        assert_eq!(
            scope.resolve_element("root")?.uri.as_deref(),
            Some("http://default")
        );
        assert_eq!(scope.resolve_attribute("id")?.uri, None);

        Ok(())
    }

    #[test]
    fn test_unbinding_default() {
        let mut scope = NamespaceScope::new();
        scope.push(vec![decl("", "http://default")]);
        scope.push(vec![decl("", "")]);
        assert_eq!(scope.lookup(""), None);
    }

    #[test]
    fn test_unknown_prefix() {
        let scope = NamespaceScope::new();
        assert_eq!(
            scope.resolve_element("p:root"),
            Err(ContentError::UnknownPrefix("p".to_string()))
        );
        assert_eq!(scope.lookup("xml"), Some(XML_URI));
    }

    #[test]
    fn test_anonymous_prefixes() {
        let model = Model::default();
        let mut names = DisplayNames::new();
        let anonymous = |uri: &str| ResolvedName {
            uri: Some(uri.to_string()),
            local: "foo".to_string(),
            prefix: None,
        };

        assert_eq!(names.prefix(&model, &anonymous("http://foo")), "ns0");
        assert_eq!(names.prefix(&model, &anonymous("http://bar")), "ns1");
        assert_eq!(names.prefix(&model, &anonymous("http://foo")), "ns0");
    }
}
