//! Package-qualified names.

use std::fmt;

use smol_str::SmolStr;

/// Error returned when a dotted string is not a valid qualified name.
#[derive(Clone, Debug, PartialEq, Eq, thiserror::Error)]
#[error("invalid qualified name '{0}'")]
pub struct QNameError(pub SmolStr);

/// A fully qualified definition name: a (possibly empty) package plus a base name.
///
/// `pkg.sub.Widget` has package `pkg.sub` and base name `Widget`. Top-level
/// definitions have an empty package. The colon form used by bytecode
/// (`pkg.sub:Widget`) is accepted by [`QName::parse`] as well.
#[derive(Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct QName {
    package: SmolStr,
    name: SmolStr,
}

impl QName {
    pub fn new(package: impl Into<SmolStr>, name: impl Into<SmolStr>) -> Self {
        Self {
            package: package.into(),
            name: name.into(),
        }
    }

    /// A name in the top-level (unnamed) package.
    pub fn top_level(name: impl Into<SmolStr>) -> Self {
        Self::new(SmolStr::default(), name)
    }

    /// Parse a dotted or colon-separated qualified name.
    pub fn parse(text: &str) -> Result<Self, QNameError> {
        let text = text.trim();
        let (package, name) = match text.rfind(':') {
            Some(pos) => (&text[..pos], &text[pos + 1..]),
            None => match text.rfind('.') {
                Some(pos) => (&text[..pos], &text[pos + 1..]),
                None => ("", text),
            },
        };

        if !is_identifier(name) {
            return Err(QNameError(text.into()));
        }
        if !package.is_empty() && !package.split('.').all(is_identifier) {
            return Err(QNameError(text.into()));
        }

        Ok(Self::new(package, name))
    }

    pub fn package(&self) -> &str {
        &self.package
    }

    /// The last segment of the name.
    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn is_top_level(&self) -> bool {
        self.package.is_empty()
    }

    /// The dotted display form, e.g. `pkg.sub.Widget`.
    pub fn to_dotted(&self) -> SmolStr {
        if self.package.is_empty() {
            self.name.clone()
        } else {
            smol_str::format_smolstr!("{}.{}", self.package, self.name)
        }
    }
}

impl fmt::Debug for QName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "QName({})", self.to_dotted())
    }
}

impl fmt::Display for QName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.package.is_empty() {
            f.write_str(&self.name)
        } else {
            write!(f, "{}.{}", self.package, self.name)
        }
    }
}

/// Whether `text` is a single ActionScript identifier.
///
/// `$` and `_` are allowed anywhere, which resource bundle class names
/// (`en_US$core_properties`) rely on.
pub fn is_identifier(text: &str) -> bool {
    let mut chars = text.chars();
    match chars.next() {
        Some(c) if c == '$' || c == '_' || unicode_ident::is_xid_start(c) => {}
        _ => return false,
    }
    chars.all(|c| c == '$' || unicode_ident::is_xid_continue(c))
}
