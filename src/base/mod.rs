//! Foundation types for the compiler core.
//!
//! This module provides fundamental types used throughout the crate:
//! - [`QName`] - Package-qualified definition names
//! - [`TextRange`], [`TextSize`] - Source positions
//! - [`LineCol`], [`LineIndex`] - Line/column conversion
//!
//! This module has NO dependencies on other crate modules.

mod qname;
mod span;

pub use qname::{is_identifier, QName, QNameError};
pub use span::{LineCol, LineIndex, TextRange, TextSize};

// Re-export text-size types for convenience
pub use text_size;
