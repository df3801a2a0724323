//! Resource bundle outline for `.properties` files.
//!
//! A bundle compiles to a single top-level class `<locale>$<bundle>_properties`
//! extending the configured bundle base class. Values written as
//! `ClassReference("pkg.Name")` reference classes.

use smol_str::{format_smolstr, SmolStr};

use super::ast::*;
use super::parser::{Parse, SyntaxError};
use crate::base::{TextRange, TextSize};

/// One `key=value` entry.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Property {
    pub key: SmolStr,
    pub value: String,
    /// Range of the value in the source text.
    pub value_range: TextRange,
}

/// Name of the class generated for `bundle` in `locale`.
pub fn bundle_class_name(locale: &str, bundle: &str) -> SmolStr {
    format_smolstr!("{locale}${bundle}_properties")
}

/// Split a properties file into entries.
///
/// Supports `=`, `:` and whitespace separators, `#`/`!` comments and trailing
/// backslash continuations.
pub fn read_properties(text: &str) -> (Vec<Property>, Vec<SyntaxError>) {
    let mut properties = Vec::new();
    let mut errors = Vec::new();

    let mut lines = logical_lines(text).into_iter();
    while let Some((start, line)) = lines.next() {
        let trimmed = line.trim_start();
        if trimmed.is_empty() || trimmed.starts_with('#') || trimmed.starts_with('!') {
            continue;
        }
        let lead = line.len() - trimmed.len();

        let key_end = trimmed
            .find(['=', ':', ' ', '\t'])
            .unwrap_or(trimmed.len());
        let key = trimmed[..key_end].trim_end();
        if key.is_empty() {
            errors.push(SyntaxError {
                message: "property without a key".into(),
                range: TextRange::at(
                    TextSize::from((start + lead) as u32),
                    TextSize::from(trimmed.len() as u32),
                ),
            });
            continue;
        }

        let rest = &trimmed[key_end..];
        let rest_trimmed = rest.trim_start_matches([' ', '\t']);
        let rest_trimmed = rest_trimmed
            .strip_prefix(['=', ':'])
            .unwrap_or(rest_trimmed)
            .trim_start_matches([' ', '\t']);
        let value_start = start + lead + key_end + (rest.len() - rest_trimmed.len());

        properties.push(Property {
            key: key.into(),
            value: rest_trimmed.to_string(),
            value_range: TextRange::at(
                TextSize::from(value_start as u32),
                TextSize::from(rest_trimmed.len() as u32),
            ),
        });
    }

    (properties, errors)
}

/// Join continuation lines. Each logical line keeps the offset of its first
/// physical line; continuation text is appended without the backslash.
fn logical_lines(text: &str) -> Vec<(usize, String)> {
    let mut out: Vec<(usize, String)> = Vec::new();
    let mut pending: Option<(usize, String)> = None;
    let mut offset = 0;

    for raw in text.split_inclusive('\n') {
        let line = raw.trim_end_matches(['\n', '\r']);
        let line_offset = offset;
        offset += raw.len();

        let (start, mut buffer) = match pending.take() {
            Some((start, mut buffer)) => {
                buffer.push_str(line.trim_start());
                (start, buffer)
            }
            None => (line_offset, line.to_string()),
        };

        let backslashes = buffer.chars().rev().take_while(|&c| c == '\\').count();
        if backslashes % 2 == 1 {
            buffer.pop();
            pending = Some((start, buffer));
        } else {
            out.push((start, buffer));
        }
    }
    if let Some(last) = pending {
        out.push(last);
    }
    out
}

/// Extract the class name from `ClassReference("pkg.Name")`.
fn class_reference(value: &str) -> Option<(usize, &str)> {
    let inner = value.trim().strip_prefix("ClassReference(")?.strip_suffix(')')?;
    let lead = value.len() - value.trim_start().len() + "ClassReference(".len();
    let quoted = inner.trim();
    let quote_lead = inner.len() - inner.trim_start().len();
    let name = quoted
        .strip_prefix('"')
        .and_then(|s| s.strip_suffix('"'))
        .or_else(|| quoted.strip_prefix('\'').and_then(|s| s.strip_suffix('\'')))?;
    Some((lead + quote_lead + 1, name.trim()))
}

/// Parse a resource bundle into its class outline.
pub(crate) fn parse_properties(text: &str, locale: &str, bundle: &str, base: &str) -> Parse {
    let (properties, errors) = read_properties(text);
    let end = TextSize::from(text.len() as u32);
    let whole = TextRange::new(TextSize::from(0), end);

    let mut references = BodyNode {
        range: whole,
        ..BodyNode::default()
    };
    for property in &properties {
        if let Some((offset, name)) = class_reference(&property.value) {
            if name.is_empty() {
                continue;
            }
            let start = property.value_range.start() + TextSize::from(offset as u32);
            references.references.push(ExprRefNode {
                chain: name.into(),
                is_call: false,
                range: TextRange::at(start, TextSize::from(name.len() as u32)),
            });
        }
    }

    let mut members = Vec::new();
    if !references.references.is_empty() {
        members.push(Item::Statements(references));
    }

    let class = ClassNode {
        name: bundle_class_name(locale, bundle),
        name_range: TextRange::empty(TextSize::from(0)),
        attributes: Attributes {
            namespace: NamespaceAttr::Public,
            ..Attributes::default()
        },
        meta: Vec::new(),
        extends: Some(TypeRefNode::new(base, TextRange::empty(TextSize::from(0)))),
        implements: Vec::new(),
        members,
        range: whole,
    };

    Parse {
        file: FileNode::new(vec![Item::Package(PackageNode {
            name: SmolStr::default(),
            items: vec![Item::Class(class)],
            range: whole,
        })]),
        errors,
    }
}
