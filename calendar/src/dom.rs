use std::fmt;

use roxmltree::{Document, ParsingOptions};

use crate::error::TemplateError;

const XML_NAMESPACE: &str = "http://www.w3.org/XML/1998/namespace";
pub const SVG_NAMESPACE: &str = "http://www.w3.org/2000/svg";
pub const XLINK_NAMESPACE: &str = "http://www.w3.org/1999/xlink";

#[derive(Debug, Clone, PartialEq)]
pub enum Node {
    Element(Element),
    Text(String),
}

#[derive(Debug, Clone, PartialEq, Default)]
pub struct Element {
    name: String,
    attrs: Vec<(String, String)>,
    children: Vec<Node>,
}

impl Element {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            ..Self::default()
        }
    }

    pub fn parse(text: &str) -> Result<Self, TemplateError> {
        let mut options = ParsingOptions::default();
        options.allow_dtd = true;
        let doc = Document::parse_with_options(text, options)?;
        Ok(build_element(doc.root_element(), &[]))
    }

    pub fn with_attr(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.set_attr(name, value);
        self
    }

    pub fn with_child(mut self, child: Element) -> Self {
        self.push(child);
        self
    }

    pub fn with_text(mut self, text: impl Into<String>) -> Self {
        self.children.push(Node::Text(text.into()));
        self
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn local_name(&self) -> &str {
        local_part(&self.name)
    }

    pub fn attr(&self, name: &str) -> Option<&str> {
        self.attrs
            .iter()
            .find(|(key, _)| key == name)
            .map(|(_, value)| value.as_str())
    }

    pub fn attrs(&self) -> impl Iterator<Item = (&str, &str)> {
        self.attrs.iter().map(|(k, v)| (k.as_str(), v.as_str()))
    }

    pub fn set_attr(&mut self, name: impl Into<String>, value: impl Into<String>) {
        let name = name.into();
        let value = value.into();
        match self.attrs.iter_mut().find(|(key, _)| *key == name) {
            Some((_, existing)) => *existing = value,
            None => self.attrs.push((name, value)),
        }
    }

    pub fn remove_attr(&mut self, name: &str) -> Option<String> {
        let index = self.attrs.iter().position(|(key, _)| key == name)?;
        Some(self.attrs.remove(index).1)
    }

    /// The identifying label of a template element: `inkscape:label`, or any `*:label`.
    pub fn label(&self) -> Option<&str> {
        self.attr("inkscape:label").or_else(|| {
            self.attrs
                .iter()
                .find(|(key, _)| local_part(key) == "label")
                .map(|(_, value)| value.as_str())
        })
    }

    /// A numeric attribute in user units; a trailing `px` is accepted.
    pub fn number_attr(&self, name: &str) -> Option<f64> {
        let raw = self.attr(name)?.trim();
        let raw = raw.strip_suffix("px").unwrap_or(raw);
        raw.trim().parse::<f64>().ok().filter(|v| v.is_finite())
    }

    pub fn style_property(&self, property: &str) -> Option<&str> {
        self.attr("style").and_then(|style| {
            style_declarations(style)
                .find(|(name, _)| *name == property)
                .map(|(_, value)| value)
        })
    }

    pub fn set_style_property(&mut self, property: &str, value: &str) {
        let mut declarations: Vec<(String, String)> = self
            .attr("style")
            .map(|style| {
                style_declarations(style)
                    .map(|(n, v)| (n.to_string(), v.to_string()))
                    .collect()
            })
            .unwrap_or_default();
        match declarations.iter_mut().find(|(name, _)| name == property) {
            Some((_, existing)) => *existing = value.to_string(),
            None => declarations.push((property.to_string(), value.to_string())),
        }
        let style = declarations
            .iter()
            .map(|(name, value)| format!("{}:{}", name, value))
            .collect::<Vec<_>>()
            .join(";");
        self.set_attr("style", style);
    }

    pub fn children(&self) -> &[Node] {
        &self.children
    }

    pub fn children_mut(&mut self) -> &mut Vec<Node> {
        &mut self.children
    }

    pub fn push(&mut self, child: Element) {
        self.children.push(Node::Element(child));
    }

    pub fn text_content(&self) -> String {
        let mut out = String::new();
        collect_text(self, &mut out);
        out
    }

    /// Follows child indices from this element; every step must land on an element.
    pub fn element_at(&self, path: &[usize]) -> Option<&Element> {
        path.iter().try_fold(self, |element, &index| match element.children.get(index)? {
            Node::Element(child) => Some(child),
            Node::Text(_) => None,
        })
    }

    pub fn element_at_mut(&mut self, path: &[usize]) -> Option<&mut Element> {
        let mut element = self;
        for &index in path {
            element = match element.children.get_mut(index)? {
                Node::Element(child) => child,
                Node::Text(_) => return None,
            };
        }
        Some(element)
    }

    /// Visits this element and its descendants in document order with their paths.
    pub fn walk<F>(&self, mut visit: F)
    where
        F: FnMut(&[usize], &Element),
    {
        let mut path = Vec::new();
        walk_inner(self, &mut path, &mut visit);
    }

    pub fn find_path<P>(&self, mut predicate: P) -> Option<Vec<usize>>
    where
        P: FnMut(&Element) -> bool,
    {
        let mut found = None;
        self.walk(|path, element| {
            if found.is_none() && predicate(element) {
                found = Some(path.to_vec());
            }
        });
        found
    }

    pub fn to_xml(&self) -> String {
        let mut out = String::new();
        self.write_xml(&mut out);
        out
    }

    pub fn write_xml(&self, out: &mut String) {
        out.push('<');
        out.push_str(&self.name);
        for (name, value) in &self.attrs {
            out.push(' ');
            out.push_str(name);
            out.push_str("=\"");
            escape_into(value, true, out);
            out.push('"');
        }
        if self.children.is_empty() {
            out.push_str("/>");
            return;
        }
        out.push('>');
        for child in &self.children {
            match child {
                Node::Element(element) => element.write_xml(out),
                Node::Text(text) => escape_into(text, false, out),
            }
        }
        out.push_str("</");
        out.push_str(&self.name);
        out.push('>');
    }
}

impl fmt::Display for Element {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.to_xml())
    }
}

fn local_part(name: &str) -> &str {
    name.rsplit_once(':').map_or(name, |(_, local)| local)
}

fn style_declarations(style: &str) -> impl Iterator<Item = (&str, &str)> {
    style.split(';').filter_map(|declaration| {
        let (name, value) = declaration.split_once(':')?;
        let name = name.trim();
        (!name.is_empty()).then(|| (name, value.trim()))
    })
}

fn collect_text(element: &Element, out: &mut String) {
    for child in &element.children {
        match child {
            Node::Element(child) => collect_text(child, out),
            Node::Text(text) => out.push_str(text),
        }
    }
}

fn walk_inner<F>(element: &Element, path: &mut Vec<usize>, visit: &mut F)
where
    F: FnMut(&[usize], &Element),
{
    visit(path, element);
    for (index, child) in element.children.iter().enumerate() {
        if let Node::Element(child) = child {
            path.push(index);
            walk_inner(child, path, visit);
            path.pop();
        }
    }
}

fn escape_into(raw: &str, attribute: bool, out: &mut String) {
    for ch in raw.chars() {
        match ch {
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            '"' if attribute => out.push_str("&quot;"),
            _ => out.push(ch),
        }
    }
}

type NamespaceDecl = (Option<String>, String);

fn build_element(node: roxmltree::Node<'_, '_>, inherited: &[NamespaceDecl]) -> Element {
    let tag = node.tag_name();
    let mut element = Element::new(qualify(node, tag.namespace(), tag.name(), true));

    let in_scope: Vec<NamespaceDecl> = node
        .namespaces()
        .filter(|ns| ns.name() != Some("xml"))
        .map(|ns| (ns.name().map(str::to_string), ns.uri().to_string()))
        .collect();
    for (prefix, uri) in in_scope.iter().filter(|decl| !inherited.contains(decl)) {
        let name = match prefix {
            Some(prefix) => format!("xmlns:{}", prefix),
            None => "xmlns".to_string(),
        };
        element.attrs.push((name, uri.clone()));
    }

    for attr in node.attributes() {
        let name = qualify(node, attr.namespace(), attr.name(), false);
        element.attrs.push((name, attr.value().to_string()));
    }

    for child in node.children() {
        if child.is_element() {
            element.push(build_element(child, &in_scope));
        } else if child.is_text() {
            if let Some(text) = child.text() {
                element.children.push(Node::Text(text.to_string()));
            }
        }
    }
    element
}

fn qualify(node: roxmltree::Node<'_, '_>, namespace: Option<&str>, local: &str, element: bool) -> String {
    let Some(uri) = namespace else {
        return local.to_string();
    };
    if uri == XML_NAMESPACE {
        return format!("xml:{}", local);
    }
    if element && node.namespaces().any(|ns| ns.name().is_none() && ns.uri() == uri) {
        return local.to_string();
    }
    match node
        .namespaces()
        .find(|ns| ns.uri() == uri && ns.name().is_some())
        .and_then(|ns| ns.name())
    {
        Some(prefix) => format!("{}:{}", prefix, local),
        None => local.to_string(),
    }
}
