//! Document object model shared by the normalizer, serializer and splitter.
//!
//! Two parsers feed the same arena: [`ArenaSink`] for tolerant tag-soup
//! parsing through html5ever, and [`XmlDocument::parse`] for strict XML.

mod arena;
mod tree_sink;
mod xml_reader;

pub use arena::{Attribute, ChildrenIter, Descendants, Node, NodeData, NodeId, XmlDocument};
pub use tree_sink::{ArenaSink, LINE_MARKER_PREFIX, NodeHandle};
