//! MXML outline.
//!
//! An MXML document declares one class named after the file. The root tag names
//! the base class, `<fx:Script>` blocks contribute ActionScript members, and
//! child component tags become references (and typed public variables when
//! they carry an `id`).

use indexmap::IndexMap;
use quick_xml::events::{BytesStart, Event};
use quick_xml::reader::Reader;
use rustc_hash::FxHashMap;
use smol_str::{format_smolstr, SmolStr};

use super::ast::*;
use super::parser::{parse_members, Parse, SyntaxError};
use crate::base::{QName, TextRange, TextSize};

/// The MXML 2009 language namespace.
pub const MXML_2009: &str = "http://ns.adobe.com/mxml/2009";
/// The MXML 2006 language namespace.
pub const MXML_2006: &str = "http://www.adobe.com/2006/mxml";

/// Component manifests: namespace URI to (tag name to qualified class name).
pub type Manifests = IndexMap<SmolStr, IndexMap<SmolStr, SmolStr>>;

/// Language tags that are not component instances.
const LANGUAGE_TAGS: &[&str] = &[
    "Script",
    "Declarations",
    "Style",
    "Metadata",
    "Binding",
    "Library",
    "Definition",
    "Private",
    "Component",
    "Reparent",
];

/// Language tags whose content is opaque to the outline.
const OPAQUE_TAGS: &[&str] = &["Style", "Metadata", "Library", "Private", "Component"];

/// Parse an MXML document declaring `class`.
pub(crate) fn parse_mxml(text: &str, class: &QName, manifests: &Manifests) -> Parse {
    let mut outline = Outline::new(text, manifests);
    outline.run();

    let end = TextSize::from(text.len() as u32);
    let class_node = ClassNode {
        name: class.name().into(),
        name_range: outline.root_name_range,
        attributes: Attributes {
            namespace: NamespaceAttr::Public,
            ..Attributes::default()
        },
        meta: Vec::new(),
        extends: outline.base,
        implements: outline.implements,
        members: outline.members,
        range: TextRange::new(TextSize::from(0), end),
    };
    let package = PackageNode {
        name: class.package().into(),
        items: vec![Item::Class(class_node)],
        range: TextRange::new(TextSize::from(0), end),
    };

    Parse {
        file: FileNode::new(vec![Item::Package(package)]),
        errors: outline.errors,
    }
}

#[derive(Debug, Default)]
struct Frame {
    script: bool,
    opaque: bool,
}

struct Outline<'a> {
    text: &'a str,
    manifests: &'a Manifests,
    namespaces: FxHashMap<SmolStr, SmolStr>,
    stack: Vec<Frame>,
    base: Option<TypeRefNode>,
    implements: Vec<TypeRefNode>,
    root_name_range: TextRange,
    members: Vec<Item>,
    components: BodyNode,
    errors: Vec<SyntaxError>,
}

impl<'a> Outline<'a> {
    fn new(text: &'a str, manifests: &'a Manifests) -> Self {
        Self {
            text,
            manifests,
            namespaces: FxHashMap::default(),
            stack: Vec::new(),
            base: None,
            implements: Vec::new(),
            root_name_range: TextRange::empty(TextSize::from(0)),
            members: Vec::new(),
            components: BodyNode::default(),
            errors: Vec::new(),
        }
    }

    fn run(&mut self) {
        let mut reader = Reader::from_str(self.text);
        reader.config_mut().trim_text(false);

        loop {
            let before = reader.buffer_position() as usize;
            let event = reader.read_event();
            let after = reader.buffer_position() as usize;
            match event {
                Ok(Event::Start(start)) => {
                    let frame = self.element(&start, before);
                    self.stack.push(frame);
                }
                Ok(Event::Empty(start)) => {
                    self.element(&start, before);
                }
                Ok(Event::End(_)) => {
                    self.stack.pop();
                }
                Ok(Event::CData(cdata)) => {
                    if self.in_script() {
                        let content = cdata.into_inner();
                        let offset = after.saturating_sub(3 + content.len());
                        self.script(offset, after.saturating_sub(3));
                    }
                }
                Ok(Event::Text(raw)) => {
                    if self.in_script() && !raw.iter().all(u8::is_ascii_whitespace) {
                        self.script(before, after);
                    }
                }
                Ok(Event::Eof) => break,
                Ok(_) => {}
                Err(err) => {
                    let at = TextSize::from(reader.error_position() as u32);
                    self.errors.push(SyntaxError {
                        message: format!("malformed MXML: {err}"),
                        range: TextRange::empty(at.min(TextSize::from(self.text.len() as u32))),
                    });
                    break;
                }
            }
        }

        if self.base.is_none() && self.errors.is_empty() {
            self.errors.push(SyntaxError {
                message: "MXML document has no root element".into(),
                range: TextRange::empty(TextSize::from(0)),
            });
        }
        if !self.components.references.is_empty() {
            self.components.range = TextRange::new(
                TextSize::from(0),
                TextSize::from(self.text.len() as u32),
            );
            self.members
                .push(Item::Statements(std::mem::take(&mut self.components)));
        }
    }

    fn in_script(&self) -> bool {
        self.stack.last().is_some_and(|frame| frame.script)
    }

    fn in_opaque(&self) -> bool {
        self.stack.iter().any(|frame| frame.opaque)
    }

    fn script(&mut self, start: usize, end: usize) {
        let Some(source) = self.text.get(start..end) else {
            return;
        };
        let parse = parse_members(source, TextSize::from(start as u32));
        self.members.extend(parse.file.items);
        self.errors.extend(parse.errors);
    }

    fn element(&mut self, start: &BytesStart<'_>, offset: usize) -> Frame {
        let is_root = self.stack.is_empty() && self.base.is_none();
        if self.in_opaque() {
            return Frame {
                script: false,
                opaque: true,
            };
        }

        let raw_name = String::from_utf8_lossy(start.name().as_ref()).into_owned();
        let name_start = TextSize::from(offset as u32 + 1);
        let name_range = TextRange::at(name_start, TextSize::from(raw_name.len() as u32));
        let (prefix, local) = match raw_name.split_once(':') {
            Some((prefix, local)) => (prefix, local),
            None => ("", raw_name.as_str()),
        };

        let mut id = None;
        let mut implements = None;
        for attribute in start.attributes().flatten() {
            let key = String::from_utf8_lossy(attribute.key.as_ref()).into_owned();
            let Ok(value) = attribute.unescape_value() else {
                continue;
            };
            if key == "xmlns" {
                self.namespaces.insert(SmolStr::default(), value.as_ref().into());
            } else if let Some(ns_prefix) = key.strip_prefix("xmlns:") {
                self.namespaces.insert(ns_prefix.into(), value.as_ref().into());
            } else if key == "id" {
                id = Some(SmolStr::from(value.as_ref()));
            } else if key == "implements" && is_root {
                implements = Some(value.into_owned());
            }
        }

        let uri = self.namespaces.get(prefix).cloned();
        let is_language = uri.as_deref().is_some_and(|uri| {
            (uri == MXML_2009 || uri == MXML_2006) && LANGUAGE_TAGS.contains(&local)
        });

        if is_language {
            if is_root {
                self.error(name_range, format!("'{raw_name}' cannot be the root of a component"));
            }
            return Frame {
                script: local == "Script",
                opaque: OPAQUE_TAGS.contains(&local),
            };
        }

        // Lowercase tags set properties of the parent, e.g. `<s:layout>`.
        if !is_root && local.starts_with(|c: char| c.is_ascii_lowercase()) {
            return Frame::default();
        }

        let Some(type_name) = self.resolve_tag(uri.as_deref(), local) else {
            self.error(name_range, format!("cannot resolve component tag '{raw_name}'"));
            return Frame::default();
        };

        if is_root {
            self.root_name_range = name_range;
            self.base = Some(TypeRefNode::new(type_name, name_range));
            if let Some(list) = implements {
                self.implements = list
                    .split(',')
                    .map(str::trim)
                    .filter(|name| !name.is_empty())
                    .map(|name| TypeRefNode::new(name, name_range))
                    .collect();
            }
        } else {
            if let Some(id) = id {
                self.members.push(Item::Variable(VariableNode {
                    name: id,
                    name_range,
                    is_const: false,
                    attributes: Attributes {
                        namespace: NamespaceAttr::Public,
                        ..Attributes::default()
                    },
                    meta: vec![MetaTagNode {
                        name: "Bindable".into(),
                        attributes: Vec::new(),
                        range: name_range,
                    }],
                    type_ref: Some(TypeRefNode::new(type_name.clone(), name_range)),
                    initializer: None,
                    range: name_range,
                }));
            }
            self.components.references.push(ExprRefNode {
                chain: type_name,
                is_call: true,
                range: name_range,
            });
        }
        Frame::default()
    }

    /// Map a tag to a class name through its namespace URI.
    fn resolve_tag(&self, uri: Option<&str>, local: &str) -> Option<SmolStr> {
        let uri = uri?;
        if uri == "*" {
            return Some(local.into());
        }
        if let Some(package) = uri.strip_suffix(".*") {
            return Some(format_smolstr!("{package}.{local}"));
        }
        if let Some(entry) = self.manifests.get(uri).and_then(|m| m.get(local)) {
            return Some(entry.clone());
        }
        // fx:Object, fx:String and friends are top-level classes.
        if uri == MXML_2009 {
            return Some(local.into());
        }
        None
    }

    fn error(&mut self, range: TextRange, message: String) {
        self.errors.push(SyntaxError { message, range });
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn manifests() -> Manifests {
        let mut spark = IndexMap::new();
        spark.insert(SmolStr::new("Group"), SmolStr::new("spark.components.Group"));
        spark.insert(SmolStr::new("Button"), SmolStr::new("spark.components.Button"));
        let mut manifests = Manifests::new();
        manifests.insert("library://ns.adobe.com/flex/spark".into(), spark);
        manifests
    }

    fn class_of(parse: &Parse) -> &ClassNode {
        let package = parse.file.packages().next().unwrap();
        match &package.items[0] {
            Item::Class(class) => class,
            other => panic!("expected class, got {other:?}"),
        }
    }

    #[test]
    fn test_root_tag_names_base_class() {
        let text = r#"<?xml version="1.0"?>
<s:Group xmlns:fx="http://ns.adobe.com/mxml/2009"
         xmlns:s="library://ns.adobe.com/flex/spark"
         xmlns:local="views.*">
    <s:layout><s:VerticalLayout/></s:layout>
    <s:Button id="okButton"/>
    <local:Badge/>
</s:Group>"#;
        let parse = parse_mxml(text, &QName::new("views", "Panel"), &manifests());
        let class = class_of(&parse);

        assert_eq!(class.name, "Panel");
        assert_eq!(class.extends.as_ref().unwrap().name, "spark.components.Group");

        let Item::Variable(button) = &class.members[0] else {
            panic!("expected id variable");
        };
        assert_eq!(button.name, "okButton");
        assert_eq!(button.type_ref.as_ref().unwrap().name, "spark.components.Button");

        let Item::Statements(refs) = class.members.last().unwrap() else {
            panic!("expected component references");
        };
        let chains: Vec<&str> = refs.references.iter().map(|r| r.chain.as_str()).collect();
        assert_eq!(chains, vec!["spark.components.Button", "views.Badge"]);
    }

    #[test]
    fn test_script_block_contributes_members() {
        let text = r#"<local:Base xmlns:fx="http://ns.adobe.com/mxml/2009" xmlns:local="*">
    <fx:Script>
        <![CDATA[
            import pkg.Helper;
            public function get label():String { return Helper.describe(this); }
        ]]>
    </fx:Script>
</local:Base>"#;
        let parse = parse_mxml(text, &QName::top_level("Main"), &Manifests::new());
        assert!(parse.errors.is_empty(), "{:?}", parse.errors);
        let class = class_of(&parse);
        assert_eq!(class.extends.as_ref().unwrap().name, "Base");

        assert!(matches!(&class.members[0], Item::Import(i) if i.target == "pkg.Helper"));
        let Item::Function(label) = &class.members[1] else {
            panic!("expected getter");
        };
        assert_eq!(label.accessor, Some(AccessorKind::Getter));
        let start = usize::from(label.name_range.start());
        assert_eq!(&text[start..start + 5], "label");
    }

    #[test]
    fn test_unknown_namespace_is_reported() {
        let text = r#"<x:Thing xmlns:x="urn:unknown"/>"#;
        let parse = parse_mxml(text, &QName::top_level("Main"), &Manifests::new());
        assert!(!parse.errors.is_empty());
        assert!(class_of(&parse).extends.is_none());
    }
}
