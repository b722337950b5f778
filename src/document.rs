// Namespace-aware XML tree with path queries
use crate::error::ImportError;
use quick_xml::escape::{resolve_predefined_entity, unescape_with};
use quick_xml::events::{BytesStart, Event};
use quick_xml::name::ResolveResult;
use quick_xml::reader::NsReader;
use regex::Regex;
use std::borrow::Cow;
use std::collections::{HashMap, HashSet};
use std::fmt::Display;

pub const TASK_PREFIX: &str = "p";
pub const FEEDBACK_PREFIX: &str = "c";
pub const XSI_NAMESPACE: &str = "http://www.w3.org/2001/XMLSchema-instance";
const TEST_CONFIGURATION: &str = "test-configuration";
const FEEDBACK_MESSAGE: &str = "feedback-message";
// Internal general entities only; parameter and external entities are skipped
const ENTITY_DECLARATION: &str = r#"<!ENTITY\s+([^\s%"'>]+)\s+(?:"([^"]*)"|'([^']*)')\s*>"#;

fn malformed(err: impl Display) -> ImportError {
    ImportError::MalformedDocument(err.to_string())
}

#[derive(Debug, Clone, PartialEq)]
pub struct XmlAttribute {
    pub prefix: Option<String>,
    pub local_name: String,
    pub value: String,
}

#[derive(Debug, Clone, PartialEq)]
pub enum XmlNode {
    Element(XmlElement),
    Text(String),
}

#[derive(Debug, Clone, PartialEq)]
pub struct XmlElement {
    pub namespace: Option<String>,
    pub local_name: String,
    pub attributes: Vec<XmlAttribute>,
    pub children: Vec<XmlNode>,
    // xmlns declarations made on this element; "" is the default namespace
    pub declarations: Vec<(String, String)>,
}

impl XmlElement {
    // Unprefixed attribute lookup
    pub fn attribute(&self, name: &str) -> Option<&str> {
        self.attributes
            .iter()
            .find(|a| a.prefix.is_none() && a.local_name == name)
            .map(|a| a.value.as_str())
    }

    pub fn child_elements(&self) -> impl Iterator<Item = &XmlElement> {
        self.children.iter().filter_map(|c| match c {
            XmlNode::Element(e) => Some(e),
            XmlNode::Text(_) => None,
        })
    }

    // All descendant text, untrimmed, in document order
    pub fn text(&self) -> String {
        let mut out = String::new();
        self.collect_text(&mut out);
        out
    }

    fn collect_text(&self, out: &mut String) {
        for child in &self.children {
            match child {
                XmlNode::Text(t) => out.push_str(t),
                XmlNode::Element(e) => e.collect_text(out),
            }
        }
    }

    fn collect_descendants<'a>(&'a self, out: &mut Vec<&'a XmlElement>) {
        for child in self.child_elements() {
            out.push(child);
            child.collect_descendants(out);
        }
    }

    fn push_text(&mut self, text: &str) {
        if let Some(XmlNode::Text(last)) = self.children.last_mut() {
            last.push_str(text);
        } else {
            self.children.push(XmlNode::Text(text.to_string()));
        }
    }
}

// Namespace URIs the query prefixes resolve to
#[derive(Debug, Clone, Default, PartialEq)]
pub struct NamespaceBindings {
    pub task: Option<String>,
    pub feedback: Option<String>,
    declared: Vec<(String, String)>,
}

impl NamespaceBindings {
    // `p` is whatever namespace the root element lives in. `c` is the URI
    // declared under that prefix, else the namespace of the feedback-message
    // inside the first test-configuration, else the only other declared namespace.
    fn discover(root: &XmlElement) -> Self {
        let mut declared: Vec<(String, String)> = Vec::new();
        let mut elements = vec![root];
        root.collect_descendants(&mut elements);
        for element in &elements {
            for (prefix, uri) in &element.declarations {
                if !declared.iter().any(|(p, _)| p == prefix) {
                    declared.push((prefix.clone(), uri.clone()));
                }
            }
        }

        let task = root.namespace.clone();
        let feedback = declared
            .iter()
            .find(|(p, _)| p == FEEDBACK_PREFIX)
            .map(|(_, uri)| uri.clone())
            .or_else(|| feedback_namespace_in_use(&elements, task.as_deref()))
            .or_else(|| {
                let mut others: Vec<&String> = declared
                    .iter()
                    .map(|(_, uri)| uri)
                    .filter(|uri| {
                        Some(uri.as_str()) != task.as_deref() && *uri != XSI_NAMESPACE
                    })
                    .collect();
                others.sort();
                others.dedup();
                match others.as_slice() {
                    [only] => Some((*only).clone()),
                    _ => None,
                }
            });

        Self {
            task,
            feedback,
            declared,
        }
    }

    // None means the prefix is unknown and the step matches nothing
    fn resolve(&self, prefix: Option<&str>) -> Option<Option<&str>> {
        match prefix {
            None => Some(None),
            Some(TASK_PREFIX) => Some(self.task.as_deref()),
            Some(FEEDBACK_PREFIX) => self.feedback.as_deref().map(Some),
            Some(other) => self
                .declared
                .iter()
                .find(|(p, _)| p == other)
                .map(|(_, uri)| Some(uri.as_str())),
        }
    }
}

fn feedback_namespace_in_use(elements: &[&XmlElement], task: Option<&str>) -> Option<String> {
    elements
        .iter()
        .filter(|e| e.local_name == TEST_CONFIGURATION && e.namespace.as_deref() == task)
        .find_map(|config| {
            config
                .child_elements()
                .find(|c| c.local_name == FEEDBACK_MESSAGE && c.namespace.as_deref() != task)
        })
        .and_then(|message| message.namespace.clone())
}

#[derive(Debug, Clone, Copy, PartialEq)]
enum Axis {
    Child,
    Descendant,
}

#[derive(Debug, Clone, PartialEq)]
struct Step {
    axis: Axis,
    prefix: Option<String>,
    local_name: String,
}

// Parsed form of "/p:a/p:b", "//p:b/c:d", "p:b/@attr"
#[derive(Debug, Clone, PartialEq)]
pub struct XmlPath {
    absolute: bool,
    steps: Vec<Step>,
    attribute: Option<String>,
}

impl XmlPath {
    pub fn parse(path: &str) -> Self {
        let absolute = path.starts_with('/');
        let mut steps = Vec::new();
        let mut attribute = None;
        let mut axis = Axis::Child;

        let body = path.strip_prefix('/').unwrap_or(path);
        for segment in body.split('/') {
            if segment.is_empty() {
                axis = Axis::Descendant;
                continue;
            }
            if let Some(name) = segment.strip_prefix('@') {
                attribute = Some(name.to_string());
                break;
            }
            let (prefix, local_name) = match segment.split_once(':') {
                Some((p, l)) => (Some(p.to_string()), l.to_string()),
                None => (None, segment.to_string()),
            };
            steps.push(Step {
                axis,
                prefix,
                local_name,
            });
            axis = Axis::Child;
        }

        Self {
            absolute,
            steps,
            attribute,
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct XmlDocument {
    root: XmlElement,
    bindings: NamespaceBindings,
}

pub fn load(xml: &str) -> Result<XmlDocument, ImportError> {
    XmlDocument::parse(xml)
}

pub fn load_bytes(xml: &[u8]) -> Result<XmlDocument, ImportError> {
    let text = std::str::from_utf8(xml).map_err(malformed)?;
    XmlDocument::parse(text)
}

impl XmlDocument {
    pub fn parse(xml: &str) -> Result<Self, ImportError> {
        let mut reader = NsReader::from_str(xml);
        let mut stack: Vec<XmlElement> = Vec::new();
        let mut root: Option<XmlElement> = None;
        let mut entities: HashMap<String, String> = HashMap::new();

        loop {
            let (resolved, event) = reader.read_resolved_event().map_err(malformed)?;
            let namespace = match resolved {
                ResolveResult::Bound(ns) => Some(String::from_utf8_lossy(ns.as_ref()).into_owned()),
                ResolveResult::Unbound => None,
                ResolveResult::Unknown(prefix) => {
                    return Err(malformed(format!(
                        "unbound namespace prefix '{}' at position {}",
                        String::from_utf8_lossy(&prefix),
                        reader.buffer_position()
                    )))
                }
            };

            match event {
                Event::Start(start) => stack.push(open_element(namespace, &start)?),
                Event::Empty(start) => {
                    let element = open_element(namespace, &start)?;
                    close_element(&mut stack, &mut root, element)?;
                }
                Event::End(_) => {
                    let element = stack
                        .pop()
                        .ok_or_else(|| malformed("closing tag without matching opening tag"))?;
                    close_element(&mut stack, &mut root, element)?;
                }
                Event::Text(text) => {
                    let text = reader.decoder().decode(&text).map_err(malformed)?;
                    append_text(&mut stack, &text)?;
                }
                Event::CData(data) => {
                    let text = reader.decoder().decode(&data).map_err(malformed)?;
                    append_text(&mut stack, &text)?;
                }
                Event::GeneralRef(reference) => {
                    let text = match reference.resolve_char_ref().map_err(malformed)? {
                        Some(ch) => ch.to_string(),
                        None => {
                            let name = reader.decoder().decode(&reference).map_err(malformed)?;
                            resolve_entity(&name, &entities)?
                        }
                    };
                    append_text(&mut stack, &text)?;
                }
                Event::DocType(doctype) => {
                    let doctype = reader.decoder().decode(&doctype).map_err(malformed)?;
                    collect_entities(&doctype, &mut entities)?;
                }
                Event::Eof => break,
                _ => (),
            }
        }

        if let Some(open) = stack.last() {
            return Err(malformed(format!("unclosed element <{}>", open.local_name)));
        }
        let root = root.ok_or_else(|| malformed("document has no root element"))?;
        let bindings = NamespaceBindings::discover(&root);

        Ok(Self { root, bindings })
    }

    pub fn root(&self) -> &XmlElement {
        &self.root
    }

    pub fn bindings(&self) -> &NamespaceBindings {
        &self.bindings
    }

    // Relative queries against one element of this document
    pub fn within<'a>(&'a self, element: &'a XmlElement) -> Scope<'a> {
        Scope {
            document: self,
            element,
        }
    }

    fn evaluate<'a>(
        &'a self,
        context: Option<&'a XmlElement>,
        path: &XmlPath,
    ) -> Vec<&'a XmlElement> {
        let mut current: Vec<&'a XmlElement> = Vec::new();
        for (index, step) in path.steps.iter().enumerate() {
            let pool: Vec<&'a XmlElement> = if index == 0 && (path.absolute || context.is_none()) {
                match step.axis {
                    Axis::Child => vec![&self.root],
                    Axis::Descendant => {
                        let mut all = vec![&self.root];
                        self.root.collect_descendants(&mut all);
                        all
                    }
                }
            } else {
                let parents = if index == 0 {
                    context.into_iter().collect()
                } else {
                    std::mem::take(&mut current)
                };
                let mut pool = Vec::new();
                for parent in parents {
                    match step.axis {
                        Axis::Child => pool.extend(parent.child_elements()),
                        Axis::Descendant => parent.collect_descendants(&mut pool),
                    }
                }
                pool
            };

            let Some(namespace) = self.bindings.resolve(step.prefix.as_deref()) else {
                return Vec::new();
            };
            let mut seen = HashSet::new();
            current = pool
                .into_iter()
                .filter(|e| e.local_name == step.local_name && e.namespace.as_deref() == namespace)
                .filter(|e| seen.insert(*e as *const XmlElement))
                .collect();
        }

        if path.steps.is_empty() {
            return context.into_iter().collect();
        }
        current
    }
}

// First declaration of an entity wins
fn collect_entities(
    doctype: &str,
    entities: &mut HashMap<String, String>,
) -> Result<(), ImportError> {
    let declaration = Regex::new(ENTITY_DECLARATION).map_err(malformed)?;
    for captures in declaration.captures_iter(doctype) {
        let value = captures.get(2).or_else(|| captures.get(3)).map_or("", |m| m.as_str());
        entities
            .entry(captures[1].to_string())
            .or_insert_with(|| value.to_string());
    }
    Ok(())
}

// Entity values are expanded one level; markup inside them is kept as text
fn resolve_entity(name: &str, entities: &HashMap<String, String>) -> Result<String, ImportError> {
    if let Some(text) = resolve_predefined_entity(name) {
        return Ok(text.to_string());
    }
    let value = entities
        .get(name)
        .ok_or_else(|| malformed(format!("unknown entity '&{};'", name)))?;
    unescape_with(value, |inner| {
        entities
            .get(inner)
            .map(String::as_str)
            .or_else(|| resolve_predefined_entity(inner))
    })
    .map(Cow::into_owned)
    .map_err(malformed)
}

fn open_element(namespace: Option<String>, start: &BytesStart) -> Result<XmlElement, ImportError> {
    let mut attributes = Vec::new();
    let mut declarations = Vec::new();

    for attr in start.attributes() {
        let attr = attr.map_err(malformed)?;
        let value = attr.unescape_value().map_err(malformed)?.into_owned();
        let key = String::from_utf8_lossy(attr.key.as_ref()).into_owned();

        if key == "xmlns" {
            declarations.push((String::new(), value));
        } else if let Some(prefix) = key.strip_prefix("xmlns:") {
            declarations.push((prefix.to_string(), value));
        } else {
            attributes.push(XmlAttribute {
                prefix: attr
                    .key
                    .prefix()
                    .map(|p| String::from_utf8_lossy(p.as_ref()).into_owned()),
                local_name: String::from_utf8_lossy(attr.key.local_name().as_ref()).into_owned(),
                value,
            });
        }
    }

    Ok(XmlElement {
        namespace,
        local_name: String::from_utf8_lossy(start.local_name().as_ref()).into_owned(),
        attributes,
        children: Vec::new(),
        declarations,
    })
}

fn close_element(
    stack: &mut [XmlElement],
    root: &mut Option<XmlElement>,
    element: XmlElement,
) -> Result<(), ImportError> {
    match stack.last_mut() {
        Some(parent) => parent.children.push(XmlNode::Element(element)),
        None if root.is_some() => return Err(malformed("document has more than one root element")),
        None => *root = Some(element),
    }
    Ok(())
}

fn append_text(stack: &mut [XmlElement], text: &str) -> Result<(), ImportError> {
    match stack.last_mut() {
        Some(parent) => parent.push_text(text),
        None if text.trim().is_empty() => (),
        None => return Err(malformed("text content outside the root element")),
    }
    Ok(())
}

/// Path queries over a loaded document.
///
/// Absolute paths (`/p:task/...`, `//p:test`) always start at the document;
/// relative paths start at the scope's element. Missing paths produce empty
/// results instead of errors.
pub trait XmlQuery<'a>: Copy {
    fn document(self) -> &'a XmlDocument;

    fn context(self) -> Option<&'a XmlElement>;

    fn query_nodes(self, path: &str) -> Vec<&'a XmlElement> {
        let path = XmlPath::parse(path);
        self.document().evaluate(self.context(), &path)
    }

    fn query_text(self, path: &str) -> String {
        let parsed = XmlPath::parse(path);
        if parsed.attribute.is_some() {
            return self.query_attr(path).unwrap_or_default();
        }
        self.document()
            .evaluate(self.context(), &parsed)
            .iter()
            .map(|e| e.text())
            .collect()
    }

    fn query_attr(self, path: &str) -> Option<String> {
        let path = XmlPath::parse(path);
        let name = path.attribute.as_deref()?;
        self.document()
            .evaluate(self.context(), &path)
            .into_iter()
            .find_map(|e| e.attribute(name))
            .map(str::to_string)
    }
}

impl<'a> XmlQuery<'a> for &'a XmlDocument {
    fn document(self) -> &'a XmlDocument {
        self
    }

    fn context(self) -> Option<&'a XmlElement> {
        None
    }
}

#[derive(Debug, Clone, Copy)]
pub struct Scope<'a> {
    document: &'a XmlDocument,
    element: &'a XmlElement,
}

impl<'a> XmlQuery<'a> for Scope<'a> {
    fn document(self) -> &'a XmlDocument {
        self.document
    }

    fn context(self) -> Option<&'a XmlElement> {
        Some(self.element)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const NAMESPACED: &str = r#"<?xml version="1.0" encoding="UTF-8"?>
<task xmlns="urn:proforma:task:v1.0.1" xmlns:cmt="urn:custom:comments" lang="de">
  <meta-data><title>Hello &amp; welcome</title></meta-data>
  <proglang version="3">python</proglang>
  <files>
    <file id="1" class="template"><![CDATA[print("<hi>")]]></file>
    <file id="2" class="internal"/>
  </files>
  <tests>
    <test id="t1">
      <test-configuration>
        <filerefs><fileref refid="2"/></filerefs>
        <cmt:feedback-message>Well done</cmt:feedback-message>
      </test-configuration>
    </test>
  </tests>
</task>"#;

    #[test]
    fn test_prefixes_resolve_from_document_declarations() {
        let doc = load(NAMESPACED).unwrap();
        assert_eq!(doc.bindings().task.as_deref(), Some("urn:proforma:task:v1.0.1"));
        assert_eq!(doc.bindings().feedback.as_deref(), Some("urn:custom:comments"));

        assert_eq!(doc.query_text("/p:task/p:meta-data/p:title"), "Hello & welcome");
        assert_eq!(
            doc.query_text("//p:test/p:test-configuration/c:feedback-message"),
            "Well done"
        );
    }

    #[test]
    fn test_query_attr_and_nodes() {
        let doc = load(NAMESPACED).unwrap();
        assert_eq!(doc.query_attr("/p:task/p:proglang/@version").as_deref(), Some("3"));
        assert_eq!(doc.query_attr("/p:task/p:proglang/@missing"), None);

        let files = doc.query_nodes("/p:task/p:files/p:file");
        assert_eq!(files.len(), 2);
        assert_eq!(files[0].attribute("id"), Some("1"));
        assert_eq!(files[0].text(), "print(\"<hi>\")");
        assert_eq!(files[1].text(), "");
    }

    #[test]
    fn test_relative_queries_from_scope() {
        let doc = load(NAMESPACED).unwrap();
        let configs = doc.query_nodes("//p:test/p:test-configuration");
        assert_eq!(configs.len(), 1);

        let scope = doc.within(configs[0]);
        let refs = scope.query_nodes("p:filerefs/p:fileref");
        assert_eq!(refs.len(), 1);
        assert_eq!(scope.query_attr("p:filerefs/p:fileref/@refid").as_deref(), Some("2"));
        assert_eq!(scope.query_text("c:feedback-message"), "Well done");
    }

    #[test]
    fn test_missing_paths_are_empty() {
        let doc = load(NAMESPACED).unwrap();
        assert_eq!(doc.query_text("/p:task/p:description"), "");
        assert!(doc.query_nodes("/p:task/p:model-solutions/p:model-solution").is_empty());
        // unprefixed steps only match elements outside any namespace
        assert!(doc.query_nodes("/task").is_empty());
        assert!(doc.query_nodes("/x:task").is_empty());
    }

    #[test]
    fn test_document_without_namespace() {
        let doc = load("<task><description>plain</description></task>").unwrap();
        assert_eq!(doc.bindings().task, None);
        assert_eq!(doc.query_text("/p:task/p:description"), "plain");
        assert_eq!(doc.query_text("/task/description"), "plain");
    }

    #[test]
    fn test_unresolvable_feedback_prefix_matches_nothing() {
        let xml = r#"<p:task xmlns:p="urn:a" xmlns:x="urn:b" xmlns:y="urn:c">
  <y:note>n</y:note>
</p:task>"#;
        let doc = load(xml).unwrap();
        assert_eq!(doc.bindings().feedback, None);
        assert_eq!(doc.query_text("/p:task/c:note"), "");
        assert_eq!(doc.query_text("/p:task/y:note"), "n");
    }

    #[test]
    fn test_feedback_prefix_bound_from_feedback_message_element() {
        let xml = r#"<p:task xmlns:p="urn:proforma:task:v1.0.1" xmlns:ch="codeharbor"
    xmlns:unit="urn:proforma:tests:unittest:v1.1">
  <p:tests>
    <p:test id="t1">
      <p:test-configuration>
        <unit:unittest framework="JUnit"/>
        <ch:feedback-message>Check bounds</ch:feedback-message>
      </p:test-configuration>
    </p:test>
  </p:tests>
</p:task>"#;
        let doc = load(xml).unwrap();
        assert_eq!(doc.bindings().feedback.as_deref(), Some("codeharbor"));
        assert_eq!(
            doc.query_text("//p:test/p:test-configuration/c:feedback-message"),
            "Check bounds"
        );
    }

    #[test]
    fn test_declared_c_prefix_wins_over_feedback_message_element() {
        let xml = r#"<p:task xmlns:p="urn:a" xmlns:c="urn:c" xmlns:ch="urn:ch">
  <p:test>
    <p:test-configuration><ch:feedback-message>m</ch:feedback-message></p:test-configuration>
  </p:test>
</p:task>"#;
        let doc = load(xml).unwrap();
        assert_eq!(doc.bindings().feedback.as_deref(), Some("urn:c"));
    }

    #[test]
    fn test_internal_entities_resolve() {
        let xml = r#"<!DOCTYPE task [
  <!ENTITY who "world">
  <!ENTITY greeting 'hello &who; &amp; more'>
  <!ENTITY who "ignored">
]>
<task lang="en">&greeting;! bye &who;</task>"#;
        let doc = load(xml).unwrap();
        assert_eq!(doc.root().text(), "hello world & more! bye world");
    }

    #[test]
    fn test_undeclared_entity_is_rejected() {
        for xml in [
            "<task>&who;</task>",
            r#"<!DOCTYPE task [<!ENTITY other "x">]><task>&who;</task>"#,
        ] {
            assert!(matches!(load(xml), Err(ImportError::MalformedDocument(_))), "{}", xml);
        }
    }

    #[test]
    fn test_character_references_resolve() {
        let doc = load("<a>x &#65;&#x42; &lt;y&gt;</a>").unwrap();
        assert_eq!(doc.root().text(), "x AB <y>");
    }

    #[test]
    fn test_malformed_documents_are_rejected() {
        for xml in [
            "<task><files></task>",
            "<task>",
            "",
            "<a/><b/>",
            "<a/>stray",
            "<p:task/>",
        ] {
            let result = load(xml);
            assert!(
                matches!(result, Err(ImportError::MalformedDocument(_))),
                "expected malformed for {:?}, got {:?}",
                xml,
                result
            );
        }
    }

    #[test]
    fn test_load_bytes_rejects_invalid_utf8() {
        assert!(matches!(
            load_bytes(&[b'<', b'a', 0xff, b'/', b'>']),
            Err(ImportError::MalformedDocument(_))
        ));
        assert!(load_bytes(b"<a/>").is_ok());
    }
}
