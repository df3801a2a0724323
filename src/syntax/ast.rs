//! Outline syntax tree.
//!
//! The tree only carries what the semantic core needs: top-level and member
//! declarations, their attributes and metadata, the type references of their
//! signatures, and the identifier chains referenced from bodies and
//! initializers. Every node kind is a variant of a closed enum so that walkers
//! match exhaustively.

use smol_str::SmolStr;

use crate::base::{QName, TextRange};

/// The root of a parsed file.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct FileNode {
    pub items: Vec<Item>,
}

impl FileNode {
    pub fn new(items: Vec<Item>) -> Self {
        Self { items }
    }

    /// Iterate over every package block in the file.
    pub fn packages(&self) -> impl Iterator<Item = &PackageNode> {
        self.items.iter().filter_map(|item| match item {
            Item::Package(package) => Some(package),
            _ => None,
        })
    }

    /// Qualified names of the declarations directly inside package blocks.
    pub fn declared_qnames(&self) -> Vec<QName> {
        let mut out: Vec<QName> = Vec::new();
        for package in self.packages() {
            for name in package.items.iter().filter_map(Item::declared_name) {
                let qname = QName::new(package.name.clone(), name.clone());
                if !out.contains(&qname) {
                    out.push(qname);
                }
            }
        }
        out
    }
}

/// A declaration-level node.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Item {
    Package(PackageNode),
    Import(ImportNode),
    UseNamespace(UseNamespaceNode),
    Class(ClassNode),
    Interface(InterfaceNode),
    Function(FunctionNode),
    Variable(VariableNode),
    Namespace(NamespaceNode),
    /// Loose statements (class initializers, file-level code) reduced to the
    /// identifier chains they reference.
    Statements(BodyNode),
}

impl Item {
    pub fn range(&self) -> TextRange {
        match self {
            Item::Package(node) => node.range,
            Item::Import(node) => node.range,
            Item::UseNamespace(node) => node.range,
            Item::Class(node) => node.range,
            Item::Interface(node) => node.range,
            Item::Function(node) => node.range,
            Item::Variable(node) => node.range,
            Item::Namespace(node) => node.range,
            Item::Statements(node) => node.range,
        }
    }

    /// Name of a class, interface, function, variable or namespace.
    pub fn declared_name(&self) -> Option<&SmolStr> {
        match self {
            Item::Class(node) => Some(&node.name),
            Item::Interface(node) => Some(&node.name),
            Item::Function(node) => Some(&node.name),
            Item::Variable(node) => Some(&node.name),
            Item::Namespace(node) => Some(&node.name),
            Item::Package(_) | Item::Import(_) | Item::UseNamespace(_) | Item::Statements(_) => None,
        }
    }
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct PackageNode {
    /// Dotted package name; empty for the unnamed package.
    pub name: SmolStr,
    pub items: Vec<Item>,
    pub range: TextRange,
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ImportNode {
    /// Dotted name without the trailing `.*`.
    pub target: SmolStr,
    pub wildcard: bool,
    pub range: TextRange,
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct UseNamespaceNode {
    pub namespace: SmolStr,
    pub range: TextRange,
}

/// The namespace attribute written on a declaration.
#[derive(Clone, Debug, Default, PartialEq, Eq, Hash)]
pub enum NamespaceAttr {
    /// No namespace attribute was written.
    #[default]
    Default,
    Public,
    Internal,
    Protected,
    Private,
    /// A user-defined namespace such as `mx_internal`.
    Custom(SmolStr),
}

/// Declaration attributes.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct Attributes {
    pub namespace: NamespaceAttr,
    pub is_static: bool,
    pub is_override: bool,
    pub is_final: bool,
    pub is_dynamic: bool,
    pub is_native: bool,
}

/// `[Name(key="value", "bare")]`
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct MetaTagNode {
    pub name: SmolStr,
    pub attributes: Vec<MetaAttributeNode>,
    pub range: TextRange,
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct MetaAttributeNode {
    pub key: Option<SmolStr>,
    pub value: SmolStr,
}

/// A type annotation or a name written in `extends`/`implements`.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct TypeRefNode {
    /// The name as written, possibly dotted. `*` and `void` are kept verbatim.
    pub name: SmolStr,
    /// Type argument of `Vector.<T>`.
    pub argument: Option<Box<TypeRefNode>>,
    pub range: TextRange,
}

impl TypeRefNode {
    pub fn new(name: impl Into<SmolStr>, range: TextRange) -> Self {
        Self {
            name: name.into(),
            argument: None,
            range,
        }
    }
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ClassNode {
    pub name: SmolStr,
    pub name_range: TextRange,
    pub attributes: Attributes,
    pub meta: Vec<MetaTagNode>,
    pub extends: Option<TypeRefNode>,
    pub implements: Vec<TypeRefNode>,
    pub members: Vec<Item>,
    pub range: TextRange,
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct InterfaceNode {
    pub name: SmolStr,
    pub name_range: TextRange,
    pub attributes: Attributes,
    pub meta: Vec<MetaTagNode>,
    pub extends: Vec<TypeRefNode>,
    pub members: Vec<Item>,
    pub range: TextRange,
}

#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash)]
pub enum AccessorKind {
    Getter,
    Setter,
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ParameterNode {
    pub name: SmolStr,
    pub type_ref: Option<TypeRefNode>,
    pub has_default: bool,
    pub is_rest: bool,
    pub range: TextRange,
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct FunctionNode {
    pub name: SmolStr,
    pub name_range: TextRange,
    pub accessor: Option<AccessorKind>,
    pub attributes: Attributes,
    pub meta: Vec<MetaTagNode>,
    pub parameters: Vec<ParameterNode>,
    pub return_type: Option<TypeRefNode>,
    /// `None` for interface methods and native functions.
    pub body: Option<BodyNode>,
    pub range: TextRange,
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct VariableNode {
    pub name: SmolStr,
    pub name_range: TextRange,
    pub is_const: bool,
    pub attributes: Attributes,
    pub meta: Vec<MetaTagNode>,
    pub type_ref: Option<TypeRefNode>,
    pub initializer: Option<BodyNode>,
    pub range: TextRange,
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct NamespaceNode {
    pub name: SmolStr,
    pub name_range: TextRange,
    pub attributes: Attributes,
    /// Explicit URI from `namespace ns = "uri"`.
    pub uri: Option<SmolStr>,
    pub range: TextRange,
}

/// A function body, initializer or loose statement list.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct BodyNode {
    /// Local variables declared with `var`/`const`.
    pub locals: Vec<VariableNode>,
    /// Identifier chains referenced from expressions, in source order.
    pub references: Vec<ExprRefNode>,
    pub range: TextRange,
}

/// An identifier chain such as `flash.events.Event` or `helper` in an expression.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ExprRefNode {
    pub chain: SmolStr,
    /// Whether the chain is immediately invoked, e.g. `trace(...)`.
    pub is_call: bool,
    pub range: TextRange,
}
