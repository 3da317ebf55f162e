//! Attribute codec and diff: decodes the wire attribute map into a plain value tree and
//! computes a path-addressable diff between two such trees.

pub mod diff;
pub mod path;
pub mod tree;

pub use diff::{AttributeDiff, DiffTag};
pub use path::{Path, PathSegment};
pub use tree::{AttributeTree, NumberValue, Scalar};
