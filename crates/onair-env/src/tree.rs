//! Generic hierarchical property tree parsed from an XML document.
//!
//! The OnAir configuration file is a single XML document.  Rather than mapping
//! it onto fixed structs, the whole document is retained as a generic tree so
//! that components other than the environment store can look up their own
//! settings later without this crate having to know about them.
//!
//! # What is a property tree? (for beginners)
//!
//! A property tree is an ordered tree of named nodes where every node can
//! carry a text value, a list of attributes, and any number of children –
//! including several children with the same name.  The XML fragment
//!
//! ```text
//! <configuration>
//!   <paths>
//!     <media-path>/srv/media</media-path>
//!   </paths>
//! </configuration>
//! ```
//!
//! becomes a tree whose value at the dotted path
//! `configuration.paths.media-path` is `/srv/media`.  Lookups descend one
//! name per segment and pick the *first* child with a matching name, so
//! repeated elements stay addressable through [`PropertyTree::children`].

use quick_xml::events::attributes::AttrError;
use quick_xml::events::{BytesStart, Event};
use quick_xml::Reader;
use thiserror::Error;

/// Node name used for retained comments when [`ReadOptions::strip_comments`]
/// is disabled.
pub const COMMENT_NODE_NAME: &str = "<xmlcomment>";

/// Errors produced while reading an XML document into a [`PropertyTree`].
#[derive(Debug, Error)]
pub enum ParseError {
    /// The underlying XML reader rejected the document.
    #[error("malformed XML: {0}")]
    Xml(#[from] quick_xml::Error),

    /// An attribute was malformed (unquoted value, duplicate name, etc.).
    #[error("malformed attribute: {0}")]
    Attr(#[from] AttrError),

    /// Text or an attribute value contained an invalid escape sequence.
    #[error("invalid escape sequence: {0}")]
    Escape(#[from] quick_xml::escape::EscapeError),

    /// A closing tag appeared with no element open.
    #[error("closing tag with no matching opening tag")]
    UnexpectedClose,

    /// The document ended while elements were still open.
    #[error("document ended with unclosed elements")]
    Truncated,

    /// More than one root element was found.
    #[error("document has more than one root element")]
    MultipleRoots,

    /// The document contains no elements at all.
    #[error("document contains no root element")]
    EmptyDocument,
}

/// Options controlling how a document is read, mirroring what the
/// environment store asks of its parser: whitespace-trimmed text and no
/// comment nodes.
#[derive(Debug, Clone, Copy)]
pub struct ReadOptions {
    /// Trim leading/trailing whitespace from text content and drop
    /// whitespace-only text entirely.
    pub trim_whitespace: bool,
    /// Drop comments instead of retaining them as [`COMMENT_NODE_NAME`]
    /// nodes.
    pub strip_comments: bool,
}

impl Default for ReadOptions {
    fn default() -> Self {
        Self {
            trim_whitespace: true,
            strip_comments: true,
        }
    }
}

/// An ordered tree of named nodes with text values and attributes.
///
/// The tree returned by [`PropertyTree::from_xml_str`] is an anonymous
/// super-root whose single element child is the document root, so dotted
/// lookups start with the root element's name
/// (e.g. `configuration.paths.media-path`).
#[derive(Debug, Clone, PartialEq, Default)]
pub struct PropertyTree {
    name: String,
    value: String,
    attributes: Vec<(String, String)>,
    children: Vec<PropertyTree>,
}

impl PropertyTree {
    fn new(name: String) -> Self {
        Self {
            name,
            ..Self::default()
        }
    }

    /// Reads an XML document into a property tree.
    ///
    /// # Errors
    ///
    /// Returns [`ParseError`] when the document is not well formed: reader
    /// errors, mismatched or stray closing tags, a truncated document,
    /// multiple root elements, or no root element at all.
    pub fn from_xml_str(text: &str, options: ReadOptions) -> Result<Self, ParseError> {
        let mut reader = Reader::from_str(text);
        reader.config_mut().trim_text(options.trim_whitespace);

        let mut root = PropertyTree::default();
        // Elements currently open, innermost last.
        let mut open: Vec<PropertyTree> = Vec::new();
        let mut saw_root = false;

        loop {
            match reader.read_event()? {
                Event::Start(start) => {
                    if open.is_empty() && saw_root {
                        return Err(ParseError::MultipleRoots);
                    }
                    open.push(Self::element(&start)?);
                }
                Event::Empty(start) => {
                    let node = Self::element(&start)?;
                    Self::close(&mut root, &mut open, &mut saw_root, node)?;
                }
                Event::End(_) => {
                    let node = open.pop().ok_or(ParseError::UnexpectedClose)?;
                    Self::close(&mut root, &mut open, &mut saw_root, node)?;
                }
                Event::Text(text) => {
                    if let Some(parent) = open.last_mut() {
                        parent.value.push_str(&text.unescape()?);
                    }
                }
                Event::CData(data) => {
                    if let Some(parent) = open.last_mut() {
                        parent
                            .value
                            .push_str(&String::from_utf8_lossy(&data.into_inner()));
                    }
                }
                Event::Comment(text) => {
                    if !options.strip_comments {
                        let mut node = PropertyTree::new(COMMENT_NODE_NAME.to_string());
                        node.value = String::from_utf8_lossy(&text.into_inner()).into_owned();
                        open.last_mut().unwrap_or(&mut root).children.push(node);
                    }
                }
                Event::Eof => break,
                // XML declaration, processing instructions, doctype: not
                // part of the retained tree.
                _ => {}
            }
        }

        if !open.is_empty() {
            return Err(ParseError::Truncated);
        }
        if !saw_root {
            return Err(ParseError::EmptyDocument);
        }
        Ok(root)
    }

    /// Builds a node from an opening tag, capturing its attributes.
    fn element(start: &BytesStart<'_>) -> Result<Self, ParseError> {
        let mut node = PropertyTree::new(String::from_utf8_lossy(start.name().as_ref()).into_owned());
        for attribute in start.attributes() {
            let attribute = attribute?;
            let key = String::from_utf8_lossy(attribute.key.as_ref()).into_owned();
            let value = attribute.unescape_value()?.into_owned();
            node.attributes.push((key, value));
        }
        Ok(node)
    }

    /// Attaches a completed node to its parent, or to the super-root when it
    /// is the document root element.
    fn close(
        root: &mut PropertyTree,
        open: &mut Vec<PropertyTree>,
        saw_root: &mut bool,
        node: PropertyTree,
    ) -> Result<(), ParseError> {
        match open.last_mut() {
            Some(parent) => parent.children.push(node),
            None => {
                if *saw_root {
                    return Err(ParseError::MultipleRoots);
                }
                *saw_root = true;
                root.children.push(node);
            }
        }
        Ok(())
    }

    /// The node's element name.  Empty for the super-root.
    pub fn name(&self) -> &str {
        &self.name
    }

    /// The node's text content, with chunks concatenated in document order.
    pub fn value(&self) -> &str {
        &self.value
    }

    /// All attributes in document order.
    pub fn attributes(&self) -> &[(String, String)] {
        &self.attributes
    }

    /// The value of the named attribute, if present.
    pub fn attribute(&self, name: &str) -> Option<&str> {
        self.attributes
            .iter()
            .find(|(key, _)| key == name)
            .map(|(_, value)| value.as_str())
    }

    /// All child nodes in document order, repeated names included.
    pub fn children(&self) -> &[PropertyTree] {
        &self.children
    }

    /// Descends a dotted path (`configuration.paths`), taking the first
    /// child with a matching name at each level.
    pub fn get_child(&self, path: &str) -> Option<&PropertyTree> {
        let mut node = self;
        for segment in path.split('.') {
            node = node.children.iter().find(|child| child.name == segment)?;
        }
        Some(node)
    }

    /// The text value at a dotted path, if the node exists.
    pub fn get(&self, path: &str) -> Option<&str> {
        self.get_child(path).map(PropertyTree::value)
    }

    /// The text value at a dotted path, or `default` when the node is
    /// missing or its value is empty or whitespace-only.
    pub fn get_or(&self, path: &str, default: &str) -> String {
        match self.get(path) {
            Some(value) if !value.trim().is_empty() => value.to_string(),
            _ => default.to_string(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn parse(text: &str) -> PropertyTree {
        PropertyTree::from_xml_str(text, ReadOptions::default()).expect("document must parse")
    }

    #[test]
    fn test_simple_document_is_retained() {
        let tree = parse(
            r#"<configuration>
                 <paths>
                   <media-path>/srv/media/</media-path>
                 </paths>
               </configuration>"#,
        );

        assert_eq!(tree.get("configuration.paths.media-path"), Some("/srv/media/"));
    }

    #[test]
    fn test_text_is_whitespace_trimmed() {
        let tree = parse("<configuration><name>\n    playout-1\n  </name></configuration>");

        assert_eq!(tree.get("configuration.name"), Some("playout-1"));
    }

    #[test]
    fn test_missing_node_returns_none() {
        let tree = parse("<configuration><paths/></configuration>");

        assert_eq!(tree.get("configuration.paths.media-path"), None);
        assert!(tree.get_child("configuration.channels").is_none());
    }

    #[test]
    fn test_get_or_falls_back_for_missing_and_blank_values() {
        let tree = parse(
            "<configuration><paths><log-path>   </log-path></paths></configuration>",
        );

        // Missing node and whitespace-only value both take the default.
        assert_eq!(tree.get_or("configuration.paths.media-path", "fallback"), "fallback");
        assert_eq!(tree.get_or("configuration.paths.log-path", "fallback"), "fallback");
        // A real value wins.
        let tree = parse("<configuration><paths><log-path>log</log-path></paths></configuration>");
        assert_eq!(tree.get_or("configuration.paths.log-path", "fallback"), "log");
    }

    #[test]
    fn test_attributes_are_retained() {
        let tree = parse(r#"<configuration><channel id="1" format="1080i50"/></configuration>"#);

        let channel = tree.get_child("configuration.channel").expect("channel node");
        assert_eq!(channel.attribute("id"), Some("1"));
        assert_eq!(channel.attribute("format"), Some("1080i50"));
        assert_eq!(channel.attribute("missing"), None);
        assert_eq!(channel.attributes().len(), 2);
    }

    #[test]
    fn test_repeated_elements_stay_addressable() {
        let tree = parse(
            "<configuration><channel>a</channel><channel>b</channel></configuration>",
        );

        // Dotted lookup picks the first match...
        assert_eq!(tree.get("configuration.channel"), Some("a"));

        // ...while children() exposes every repeat in order.
        let channels: Vec<&str> = tree
            .get_child("configuration")
            .expect("configuration node")
            .children()
            .iter()
            .filter(|child| child.name() == "channel")
            .map(PropertyTree::value)
            .collect();
        assert_eq!(channels, vec!["a", "b"]);
    }

    #[test]
    fn test_comments_are_stripped_by_default() {
        let tree = parse("<configuration><!-- ignored --><paths/></configuration>");

        let configuration = tree.get_child("configuration").expect("configuration node");
        assert_eq!(configuration.children().len(), 1);
        assert_eq!(configuration.children()[0].name(), "paths");
    }

    #[test]
    fn test_comments_can_be_retained() {
        let options = ReadOptions {
            strip_comments: false,
            ..ReadOptions::default()
        };
        let tree = PropertyTree::from_xml_str(
            "<configuration><!-- keep me --><paths/></configuration>",
            options,
        )
        .expect("document must parse");

        let configuration = tree.get_child("configuration").expect("configuration node");
        let comment = &configuration.children()[0];
        assert_eq!(comment.name(), COMMENT_NODE_NAME);
        assert_eq!(comment.value().trim(), "keep me");
    }

    #[test]
    fn test_entities_are_unescaped() {
        let tree = parse(
            r#"<configuration><data-path base="c &amp; d">a &amp; b</data-path></configuration>"#,
        );

        let node = tree.get_child("configuration.data-path").expect("data-path node");
        assert_eq!(node.value(), "a & b");
        assert_eq!(node.attribute("base"), Some("c & d"));
    }

    #[test]
    fn test_cdata_is_kept_verbatim() {
        let tree = parse("<configuration><note><![CDATA[a < b]]></note></configuration>");

        assert_eq!(tree.get("configuration.note"), Some("a < b"));
    }

    #[test]
    fn test_malformed_document_is_rejected() {
        let result = PropertyTree::from_xml_str("<configuration><a></b></configuration>", ReadOptions::default());

        assert!(result.is_err(), "mismatched closing tag must be rejected");
    }

    #[test]
    fn test_truncated_document_is_rejected() {
        let result = PropertyTree::from_xml_str("<configuration><paths>", ReadOptions::default());

        assert!(
            matches!(result, Err(ParseError::Truncated) | Err(ParseError::Xml(_))),
            "unclosed elements must be rejected"
        );
    }

    #[test]
    fn test_empty_document_is_rejected() {
        let result = PropertyTree::from_xml_str("  ", ReadOptions::default());

        assert!(matches!(result, Err(ParseError::EmptyDocument)));
    }

    #[test]
    fn test_second_root_element_is_rejected() {
        let result = PropertyTree::from_xml_str("<a/><b/>", ReadOptions::default());

        assert!(
            matches!(result, Err(ParseError::MultipleRoots) | Err(ParseError::Xml(_))),
            "a second root element must be rejected"
        );
    }

    #[test]
    fn test_xml_declaration_is_ignored() {
        let tree = parse("<?xml version=\"1.0\" encoding=\"utf-8\"?><configuration/>");

        assert!(tree.get_child("configuration").is_some());
    }
}
