use html5ever::parse_document;
use html5ever::tendril::TendrilSink;
use html5ever::tree_builder::TreeBuilderOpts;
use html5ever::ParseOpts;
use markup5ever_rcdom::{Handle, NodeData, RcDom};

/// A node in the rendered tree. Components build these instead of
/// writing markup strings directly.
#[derive(Debug, Clone, PartialEq)]
pub struct DomNode {
    pub tag: String,
    /// Attributes in insertion order, so serialization is stable.
    pub attributes: Vec<(String, String)>,
    pub text: String,
    pub children: Vec<DomNode>,
    pub node_type: NodeType,
}

#[derive(Debug, Clone, PartialEq)]
pub enum NodeType {
    Element,
    Text,
    Document,
}

/// Elements that never have a closing tag.
const VOID_TAGS: &[&str] = &["br", "hr", "img", "input", "link", "meta", "source", "wbr"];

impl DomNode {
    pub fn new_element(tag: &str) -> Self {
        Self {
            tag: tag.to_string(),
            attributes: Vec::new(),
            text: String::new(),
            children: Vec::new(),
            node_type: NodeType::Element,
        }
    }

    pub fn new_text(text: &str) -> Self {
        Self {
            tag: String::new(),
            attributes: Vec::new(),
            text: text.to_string(),
            children: Vec::new(),
            node_type: NodeType::Text,
        }
    }

    pub fn new_document() -> Self {
        Self {
            tag: String::new(),
            attributes: Vec::new(),
            text: String::new(),
            children: Vec::new(),
            node_type: NodeType::Document,
        }
    }

    /// Builder form of [`DomNode::set_attr`].
    pub fn attr(mut self, name: &str, value: impl Into<String>) -> Self {
        self.set_attr(name, value);
        self
    }

    /// Builder form of pushing a child.
    pub fn child(mut self, node: DomNode) -> Self {
        self.children.push(node);
        self
    }

    pub fn children(mut self, nodes: impl IntoIterator<Item = DomNode>) -> Self {
        self.children.extend(nodes);
        self
    }

    /// Append a text child.
    pub fn text(self, text: &str) -> Self {
        self.child(DomNode::new_text(text))
    }

    pub fn set_attr(&mut self, name: &str, value: impl Into<String>) {
        let value = value.into();
        match self.attributes.iter_mut().find(|(k, _)| k == name) {
            Some((_, existing)) => *existing = value,
            None => self.attributes.push((name.to_string(), value)),
        }
    }

    pub fn get_attr(&self, name: &str) -> Option<&str> {
        self.attributes
            .iter()
            .find(|(k, _)| k == name)
            .map(|(_, v)| v.as_str())
    }

    pub fn has_class(&self, class: &str) -> bool {
        self.get_attr("class")
            .map(|c| c.split_whitespace().any(|c| c == class))
            .unwrap_or(false)
    }

    /// Depth-first search for the first element carrying `class`.
    pub fn find_by_class(&self, class: &str) -> Option<&DomNode> {
        if self.node_type == NodeType::Element && self.has_class(class) {
            return Some(self);
        }
        self.children.iter().find_map(|c| c.find_by_class(class))
    }

    /// All elements carrying `class`, in document order.
    pub fn find_all_by_class<'a>(&'a self, class: &str) -> Vec<&'a DomNode> {
        let mut out = Vec::new();
        self.collect_by_class(class, &mut out);
        out
    }

    fn collect_by_class<'a>(&'a self, class: &str, out: &mut Vec<&'a DomNode>) {
        if self.node_type == NodeType::Element && self.has_class(class) {
            out.push(self);
        }
        for child in &self.children {
            child.collect_by_class(class, out);
        }
    }

    pub fn find_by_tag(&self, tag: &str) -> Option<&DomNode> {
        if self.node_type == NodeType::Element && self.tag == tag {
            return Some(self);
        }
        self.children.iter().find_map(|c| c.find_by_tag(tag))
    }

    /// Get the visible text content of this node and all children.
    pub fn text_content(&self) -> String {
        let mut result = String::new();
        self.collect_text(&mut result);
        result.trim().to_string()
    }

    fn collect_text(&self, out: &mut String) {
        match self.node_type {
            NodeType::Text => {
                let trimmed = self.text.trim();
                if !trimmed.is_empty() {
                    if !out.is_empty() && !out.ends_with(' ') {
                        out.push(' ');
                    }
                    out.push_str(trimmed);
                }
            }
            _ => {
                for child in &self.children {
                    child.collect_text(out);
                }
            }
        }
    }

    /// Serialize this node and its subtree as HTML.
    pub fn to_html(&self) -> String {
        let mut out = String::new();
        self.write_html(&mut out);
        out
    }

    fn write_html(&self, out: &mut String) {
        match self.node_type {
            NodeType::Text => escape_into(&self.text, false, out),
            NodeType::Document => {
                for child in &self.children {
                    child.write_html(out);
                }
            }
            NodeType::Element => {
                out.push('<');
                out.push_str(&self.tag);
                for (name, value) in &self.attributes {
                    out.push(' ');
                    out.push_str(name);
                    // Boolean attributes serialize bare.
                    if !value.is_empty() {
                        out.push_str("=\"");
                        escape_into(value, true, out);
                        out.push('"');
                    }
                }
                out.push('>');
                if VOID_TAGS.contains(&self.tag.as_str()) {
                    return;
                }
                for child in &self.children {
                    child.write_html(out);
                }
                out.push_str("</");
                out.push_str(&self.tag);
                out.push('>');
            }
        }
    }
}

fn escape_into(text: &str, attribute: bool, out: &mut String) {
    for ch in text.chars() {
        match ch {
            '&' => out.push_str("&amp;"),
            '<' if !attribute => out.push_str("&lt;"),
            '>' if !attribute => out.push_str("&gt;"),
            '"' if attribute => out.push_str("&quot;"),
            c => out.push(c),
        }
    }
}

/// Parse an HTML string into a DomNode tree.
pub fn parse_html(html: &str) -> DomNode {
    let opts = ParseOpts {
        tree_builder: TreeBuilderOpts {
            drop_doctype: true,
            ..Default::default()
        },
        ..Default::default()
    };

    match parse_document(RcDom::default(), opts)
        .from_utf8()
        .read_from(&mut html.as_bytes())
    {
        Ok(dom) => convert_node(&dom.document),
        Err(_) => DomNode::new_document(),
    }
}

/// Parse a markup snippet (e.g. a catalog label such as `<code>:has()</code> selector`)
/// into the nodes that would appear inside `<body>`.
pub fn parse_fragment(markup: &str) -> Vec<DomNode> {
    let doc = parse_html(markup);
    doc.find_by_tag("body")
        .map(|body| body.children.clone())
        .unwrap_or_default()
}

/// Plain-text rendition of a markup snippet.
pub fn fragment_text(markup: &str) -> String {
    let mut holder = DomNode::new_document();
    holder.children = parse_fragment(markup);
    holder.text_content()
}

fn convert_node(handle: &Handle) -> DomNode {
    match &handle.data {
        NodeData::Document => {
            let mut doc = DomNode::new_document();
            for child in handle.children.borrow().iter() {
                doc.children.push(convert_node(child));
            }
            doc
        }
        NodeData::Element { name, attrs, .. } => {
            let tag = name.local.to_string();
            let mut node = DomNode::new_element(&tag);
            for attr in attrs.borrow().iter() {
                node.set_attr(&attr.name.local, attr.value.to_string());
            }

            // Labels are display-only; scripts never make it into the tree.
            if tag == "script" || tag == "style" {
                return node;
            }

            for child in handle.children.borrow().iter() {
                node.children.push(convert_node(child));
            }
            node
        }
        NodeData::Text { contents } => {
            let text = contents.borrow().to_string();
            DomNode::new_text(&text)
        }
        _ => DomNode::new_document(), // Comments, PIs, doctypes → ignored
    }
}
