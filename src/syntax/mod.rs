//! Outline syntax for ActionScript, MXML and resource bundles.
//!
//! This is the parser collaborator of the semantic core: it recovers just
//! enough structure (declarations, signatures, metadata, referenced names)
//! for definition discovery and dependency tracking.

pub mod ast;
pub mod lexer;
pub mod mxml;
pub mod parser;
pub mod properties;
pub mod provider;

pub use ast::FileNode;
pub use mxml::Manifests;
pub use parser::{parse_actionscript, Parse, SyntaxError};
pub use provider::{
    OutlineSyntaxProvider, ParseInput, SourceLanguage, SyntaxProvider, DEFAULT_BUNDLE_BASE,
};
