//! Namespace-aware XML element tree
//!
//! Sign-in responses are small documents that are walked several times (envelope
//! lookup, lifetime extraction, validator matching, validator processing), so
//! the response is parsed once into an owned tree. Every element keeps its
//! exact source span: signature verification in a validator has to run over
//! the bytes the identity provider signed, not over a re-serialization.
//!
//! DOCTYPE declarations are refused outright. Only the predefined XML entities
//! and character references are expanded.

use std::ops::Range;
use std::sync::Arc;

use quick_xml::NsReader;
use quick_xml::events::{BytesStart, Event};
use quick_xml::name::ResolveResult;
use thiserror::Error;

/// XML parsing errors
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum XmlError {
    /// Input is not valid UTF-8
    #[error("Invalid UTF-8 in XML input: {0}")]
    Encoding(String),

    /// Syntax error reported by the parser
    #[error("XML syntax error: {0}")]
    Syntax(String),

    /// Document declares a DTD
    #[error("DOCTYPE declarations are not allowed")]
    DoctypeForbidden,

    /// Element or attribute uses a prefix with no namespace binding
    #[error("Unbound namespace prefix: {0}")]
    UnboundPrefix(String),

    /// Document has no root element
    #[error("Document has no root element")]
    NoRootElement,

    /// Document ended inside an element
    #[error("Element {0} is not closed")]
    Unclosed(String),
}

/// Namespace-resolved attribute
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct XmlAttribute {
    /// Namespace URI (unprefixed attributes have none)
    pub namespace: Option<String>,
    /// Local name
    pub local_name: String,
    /// Unescaped value
    pub value: String,
}

/// Child node of an element
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum XmlNode {
    /// Nested element
    Element(XmlElement),
    /// Character data (text and CDATA sections)
    Text(String),
}

/// Owned XML element with resolved namespaces
#[derive(Clone, PartialEq, Eq)]
pub struct XmlElement {
    namespace: Option<String>,
    prefix: Option<String>,
    local_name: String,
    attributes: Vec<XmlAttribute>,
    children: Vec<XmlNode>,
    source: Arc<str>,
    span: Range<usize>,
}

impl std::fmt::Debug for XmlElement {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("XmlElement")
            .field("namespace", &self.namespace)
            .field("local_name", &self.local_name)
            .field("attributes", &self.attributes.len())
            .field("children", &self.children.len())
            .field("span", &self.span)
            .finish()
    }
}

impl XmlElement {
    /// Namespace URI of the element
    pub fn namespace(&self) -> Option<&str> {
        self.namespace.as_deref()
    }

    /// Prefix used in the source document
    pub fn prefix(&self) -> Option<&str> {
        self.prefix.as_deref()
    }

    /// Local name of the element
    pub fn local_name(&self) -> &str {
        &self.local_name
    }

    /// Whether this element has the given namespace and local name
    pub fn is(&self, namespace: &str, local_name: &str) -> bool {
        self.namespace.as_deref() == Some(namespace) && self.local_name == local_name
    }

    /// All attributes, `xmlns` declarations excluded
    pub fn attributes(&self) -> &[XmlAttribute] {
        &self.attributes
    }

    /// Value of the unqualified attribute `local_name`
    pub fn attribute(&self, local_name: &str) -> Option<&str> {
        self.attributes
            .iter()
            .find(|a| a.namespace.is_none() && a.local_name == local_name)
            .map(|a| a.value.as_str())
    }

    /// Value of the attribute `local_name` in `namespace`
    pub fn attribute_ns(&self, namespace: &str, local_name: &str) -> Option<&str> {
        self.attributes
            .iter()
            .find(|a| a.namespace.as_deref() == Some(namespace) && a.local_name == local_name)
            .map(|a| a.value.as_str())
    }

    /// Child nodes in document order
    pub fn children(&self) -> &[XmlNode] {
        &self.children
    }

    /// Child elements in document order
    pub fn child_elements(&self) -> impl Iterator<Item = &XmlElement> {
        self.children.iter().filter_map(|node| match node {
            XmlNode::Element(element) => Some(element),
            XmlNode::Text(_) => None,
        })
    }

    /// First child element, skipping text
    pub fn first_child_element(&self) -> Option<&XmlElement> {
        self.child_elements().next()
    }

    /// First child element with the given namespace and local name
    pub fn first_child_with_name(&self, namespace: &str, local_name: &str) -> Option<&XmlElement> {
        self.child_elements().find(|e| e.is(namespace, local_name))
    }

    /// Concatenated text of the direct text children
    pub fn text_content(&self) -> String {
        self.children
            .iter()
            .filter_map(|node| match node {
                XmlNode::Text(text) => Some(text.as_str()),
                XmlNode::Element(_) => None,
            })
            .collect()
    }

    /// Exact source text of this element, start tag to end tag
    pub fn outer_xml(&self) -> &str {
        self.source.get(self.span.clone()).unwrap_or_default()
    }

    /// Byte range of this element in the parsed document
    pub fn span(&self) -> Range<usize> {
        self.span.clone()
    }
}

/// Parse a complete document and return its root element.
///
/// # Errors
///
/// Returns [`XmlError`] if the input is not UTF-8, is not well-formed,
/// declares a DOCTYPE, or uses an unbound namespace prefix.
pub fn parse_document(input: &[u8]) -> Result<XmlElement, XmlError> {
    let text = std::str::from_utf8(input).map_err(|e| XmlError::Encoding(e.to_string()))?;
    let text = text.strip_prefix('\u{feff}').unwrap_or(text);
    let source: Arc<str> = Arc::from(text);

    let mut reader = NsReader::from_str(&source);
    let mut open: Vec<XmlElement> = Vec::new();
    let mut root: Option<XmlElement> = None;

    loop {
        let offset = reader.buffer_position() as usize;
        let (resolved, event) = reader
            .read_resolved_event()
            .map_err(|e| XmlError::Syntax(e.to_string()))?;
        let namespace = owned_namespace(resolved)?;

        match event {
            Event::Start(start) => {
                let element = open_element(&reader, &source, namespace, &start, offset)?;
                open.push(element);
            }
            Event::Empty(start) => {
                let mut element = open_element(&reader, &source, namespace, &start, offset)?;
                element.span.end = reader.buffer_position() as usize;
                attach(&mut open, &mut root, element)?;
            }
            Event::End(_) => {
                let mut element = open
                    .pop()
                    .ok_or_else(|| XmlError::Syntax("closing tag without element".to_string()))?;
                element.span.end = reader.buffer_position() as usize;
                attach(&mut open, &mut root, element)?;
            }
            Event::Text(text) => {
                let value = text.unescape().map_err(|e| XmlError::Syntax(e.to_string()))?;
                push_text(&mut open, &value)?;
            }
            Event::CData(data) => {
                let value = String::from_utf8(data.into_inner().into_owned())
                    .map_err(|e| XmlError::Encoding(e.to_string()))?;
                push_text(&mut open, &value)?;
            }
            Event::DocType(_) => return Err(XmlError::DoctypeForbidden),
            Event::Eof => break,
            _ => {}
        }
    }

    if let Some(unclosed) = open.last() {
        return Err(XmlError::Unclosed(unclosed.local_name.clone()));
    }
    root.ok_or(XmlError::NoRootElement)
}

fn decode(bytes: &[u8]) -> Result<String, XmlError> {
    std::str::from_utf8(bytes)
        .map(str::to_owned)
        .map_err(|e| XmlError::Encoding(e.to_string()))
}

fn owned_namespace(resolved: ResolveResult<'_>) -> Result<Option<String>, XmlError> {
    match resolved {
        ResolveResult::Bound(ns) => decode(ns.into_inner()).map(Some),
        ResolveResult::Unbound => Ok(None),
        ResolveResult::Unknown(prefix) => Err(XmlError::UnboundPrefix(
            String::from_utf8_lossy(&prefix).into_owned(),
        )),
    }
}

fn open_element(
    reader: &NsReader<&[u8]>,
    source: &Arc<str>,
    namespace: Option<String>,
    start: &BytesStart<'_>,
    offset: usize,
) -> Result<XmlElement, XmlError> {
    let local_name = decode(start.local_name().as_ref())?;
    let prefix = start
        .name()
        .prefix()
        .map(|p| decode(p.as_ref()))
        .transpose()?;

    let mut attributes = Vec::new();
    for attr in start.attributes() {
        let attr = attr.map_err(|e| XmlError::Syntax(e.to_string()))?;
        if attr.key.as_namespace_binding().is_some() {
            continue;
        }
        let (resolved, local) = reader.resolve_attribute(attr.key);
        let namespace = owned_namespace(resolved)?;
        let local_name = decode(local.as_ref())?;
        let value = attr
            .unescape_value()
            .map_err(|e| XmlError::Syntax(e.to_string()))?
            .into_owned();
        attributes.push(XmlAttribute {
            namespace,
            local_name,
            value,
        });
    }

    Ok(XmlElement {
        namespace,
        prefix,
        local_name,
        attributes,
        children: Vec::new(),
        source: Arc::clone(source),
        span: offset..offset,
    })
}

fn attach(
    open: &mut [XmlElement],
    root: &mut Option<XmlElement>,
    element: XmlElement,
) -> Result<(), XmlError> {
    match open.last_mut() {
        Some(parent) => {
            parent.children.push(XmlNode::Element(element));
            Ok(())
        }
        None if root.is_none() => {
            *root = Some(element);
            Ok(())
        }
        None => Err(XmlError::Syntax(format!(
            "second root element {}",
            element.local_name
        ))),
    }
}

fn push_text(open: &mut [XmlElement], value: &str) -> Result<(), XmlError> {
    let Some(parent) = open.last_mut() else {
        if value.trim().is_empty() {
            return Ok(());
        }
        return Err(XmlError::Syntax("text outside the root element".to_string()));
    };
    match parent.children.last_mut() {
        Some(XmlNode::Text(existing)) => existing.push_str(value),
        _ => parent.children.push(XmlNode::Text(value.to_owned())),
    }
    Ok(())
}
