//! Recursive-descent outline parser for ActionScript 3.
//!
//! Declarations are parsed structurally; statement and expression regions are
//! scanned for local declarations and identifier chains only. The parser never
//! fails: unexpected input is reported as a [`SyntaxError`] and skipped.

use smol_str::SmolStr;

use super::ast::*;
use super::lexer::{lex, Token, TokenKind};
use crate::base::{TextRange, TextSize};

/// A syntax error with its location.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct SyntaxError {
    pub message: String,
    pub range: TextRange,
}

/// Output of parsing one file.
#[derive(Clone, Debug, Default)]
pub struct Parse {
    pub file: FileNode,
    pub errors: Vec<SyntaxError>,
}

/// Parse ActionScript source text into an outline tree.
pub fn parse_actionscript(text: &str) -> Parse {
    let lexed = lex(text);
    let mut parser = Parser::new(text, lexed.tokens);
    for range in lexed.errors {
        parser.error_at("unexpected character", range);
    }
    let items = parser.items(Context::File);
    Parse {
        file: FileNode::new(items),
        errors: parser.errors,
    }
}

/// Parse a sequence of class members, as found in an MXML `<fx:Script>` block.
///
/// `offset` is added to every range so that locations point into the
/// enclosing document.
pub(crate) fn parse_members(text: &str, offset: TextSize) -> Parse {
    let lexed = lex(text);
    let tokens = lexed
        .tokens
        .into_iter()
        .map(|t| Token {
            kind: t.kind,
            range: t.range + offset,
        })
        .collect();
    let mut parser = Parser::with_offset(text, tokens, offset);
    for range in lexed.errors {
        parser.error_at("unexpected character", range + offset);
    }
    let items = parser.items(Context::Class);
    Parse {
        file: FileNode::new(items),
        errors: parser.errors,
    }
}

#[derive(Copy, Clone, Debug, PartialEq, Eq)]
enum Context {
    File,
    Package,
    Class,
    Interface,
}

struct Parser<'a> {
    text: &'a str,
    offset: TextSize,
    tokens: Vec<Token>,
    pos: usize,
    errors: Vec<SyntaxError>,
}

impl<'a> Parser<'a> {
    fn new(text: &'a str, tokens: Vec<Token>) -> Self {
        Self::with_offset(text, tokens, TextSize::from(0))
    }

    fn with_offset(text: &'a str, tokens: Vec<Token>, offset: TextSize) -> Self {
        Self {
            text,
            offset,
            tokens,
            pos: 0,
            errors: Vec::new(),
        }
    }

    // ------------------------------------------------------------------
    // Cursor
    // ------------------------------------------------------------------

    fn peek(&self) -> Option<TokenKind> {
        self.peek_at(0)
    }

    fn peek_at(&self, n: usize) -> Option<TokenKind> {
        self.tokens.get(self.pos + n).map(|t| t.kind)
    }

    fn at(&self, kind: TokenKind) -> bool {
        self.peek() == Some(kind)
    }

    fn bump(&mut self) -> Option<Token> {
        let token = self.tokens.get(self.pos).copied();
        if token.is_some() {
            self.pos += 1;
        }
        token
    }

    fn eat(&mut self, kind: TokenKind) -> Option<Token> {
        if self.at(kind) { self.bump() } else { None }
    }

    fn slice(&self, range: TextRange) -> &'a str {
        let start = usize::from(range.start() - self.offset);
        let end = usize::from(range.end() - self.offset);
        &self.text[start..end]
    }

    fn current_range(&self) -> TextRange {
        match self.tokens.get(self.pos) {
            Some(token) => token.range,
            None => TextRange::empty(self.end_offset()),
        }
    }

    fn end_offset(&self) -> TextSize {
        self.offset + TextSize::from(self.text.len() as u32)
    }

    /// End of the most recently consumed token.
    fn prev_end(&self) -> TextSize {
        match self.pos.checked_sub(1).and_then(|i| self.tokens.get(i)) {
            Some(token) => token.range.end(),
            None => self.offset,
        }
    }

    fn prev_kind(&self) -> Option<TokenKind> {
        self.pos
            .checked_sub(1)
            .and_then(|i| self.tokens.get(i))
            .map(|t| t.kind)
    }

    fn range_from(&self, start: TextSize) -> TextRange {
        let end = self.prev_end().max(start);
        TextRange::new(start, end)
    }

    fn error_at(&mut self, message: impl Into<String>, range: TextRange) {
        self.errors.push(SyntaxError {
            message: message.into(),
            range,
        });
    }

    fn error_here(&mut self, message: impl Into<String>) {
        let range = self.current_range();
        self.error_at(message, range);
    }

    fn expect(&mut self, kind: TokenKind, what: &str) -> Option<Token> {
        let token = self.eat(kind);
        if token.is_none() {
            self.error_here(format!("expected {what}"));
        }
        token
    }

    fn ident(&mut self, what: &str) -> Option<(SmolStr, TextRange)> {
        match self.expect(TokenKind::Ident, what) {
            Some(token) => Some((self.slice(token.range).into(), token.range)),
            None => None,
        }
    }

    /// `a.b.c`, stopping before `.<` and `.*`.
    fn dotted_name(&mut self) -> Option<(SmolStr, TextRange)> {
        let first = self.eat(TokenKind::Ident)?;
        let mut name = String::from(self.slice(first.range));
        while self.at(TokenKind::Dot) && self.peek_at(1) == Some(TokenKind::Ident) {
            self.bump();
            if let Some(token) = self.bump() {
                name.push('.');
                name.push_str(self.slice(token.range));
            }
        }
        Some((name.into(), self.range_from(first.range.start())))
    }

    // ------------------------------------------------------------------
    // Declarations
    // ------------------------------------------------------------------

    fn items(&mut self, context: Context) -> Vec<Item> {
        let nested = matches!(
            context,
            Context::Package | Context::Class | Context::Interface
        ) && self.prev_kind() == Some(TokenKind::LBrace);
        let mut items = Vec::new();

        loop {
            let Some(kind) = self.peek() else {
                if nested {
                    self.error_here("expected '}'");
                }
                break;
            };

            if kind == TokenKind::RBrace {
                if nested {
                    self.bump();
                    break;
                }
                self.error_here("unexpected '}'");
                self.bump();
                continue;
            }

            let before = self.pos;
            self.item(context, &mut items);
            if self.pos == before {
                self.error_here("unexpected token");
                self.bump();
            }
        }

        items
    }

    fn item(&mut self, context: Context, items: &mut Vec<Item>) {
        let start = self.current_range().start();
        let meta = self.meta_tags();
        let attributes = self.attributes();
        let decorated = !meta.is_empty() || attributes != Attributes::default();

        match self.peek() {
            Some(TokenKind::Package) => items.push(Item::Package(self.package(start))),
            Some(TokenKind::Import) => {
                if let Some(import) = self.import(start) {
                    items.push(Item::Import(import));
                }
            }
            Some(TokenKind::Use) => {
                if let Some(node) = self.use_namespace(start) {
                    items.push(Item::UseNamespace(node));
                }
            }
            Some(TokenKind::Class) => {
                if let Some(class) = self.class(start, attributes, meta) {
                    items.push(Item::Class(class));
                }
            }
            Some(TokenKind::Interface) => {
                if let Some(interface) = self.interface(start, attributes, meta) {
                    items.push(Item::Interface(interface));
                }
            }
            Some(TokenKind::Function) => {
                if let Some(function) = self.function(start, context, attributes, meta) {
                    items.push(Item::Function(function));
                }
            }
            Some(TokenKind::Var) | Some(TokenKind::Const) => {
                for variable in self.variables(start, attributes, meta) {
                    items.push(Item::Variable(variable));
                }
            }
            Some(TokenKind::Namespace) => {
                if let Some(namespace) = self.namespace_decl(start, attributes) {
                    items.push(Item::Namespace(namespace));
                }
            }
            Some(TokenKind::Semi) => {
                self.bump();
            }
            _ => {
                if decorated {
                    self.error_here("expected a declaration");
                }
                let body = self.region(start, RegionEnd::Statements);
                if !body.references.is_empty() || !body.locals.is_empty() {
                    items.push(Item::Statements(body));
                }
            }
        }
    }

    fn meta_tags(&mut self) -> Vec<MetaTagNode> {
        let mut tags = Vec::new();
        while self.at(TokenKind::LBracket)
            && self.peek_at(1) == Some(TokenKind::Ident)
            && matches!(
                self.peek_at(2),
                Some(TokenKind::LParen) | Some(TokenKind::RBracket)
            )
        {
            let start = self.current_range().start();
            self.bump();
            let Some((name, _)) = self.ident("metadata name") else {
                break;
            };
            let mut attributes = Vec::new();
            if self.eat(TokenKind::LParen).is_some() {
                while !self.at(TokenKind::RParen) && self.peek().is_some() {
                    if let Some(attribute) = self.meta_attribute() {
                        attributes.push(attribute);
                    } else {
                        self.error_here("malformed metadata attribute");
                        self.bump();
                    }
                    if self.eat(TokenKind::Comma).is_none() {
                        break;
                    }
                }
                self.expect(TokenKind::RParen, "')'");
            }
            self.expect(TokenKind::RBracket, "']'");
            tags.push(MetaTagNode {
                name,
                attributes,
                range: self.range_from(start),
            });
        }
        tags
    }

    fn meta_attribute(&mut self) -> Option<MetaAttributeNode> {
        let key = if self.at(TokenKind::Ident) && self.peek_at(1) == Some(TokenKind::Eq) {
            let token = self.bump()?;
            self.bump();
            Some(SmolStr::from(self.slice(token.range)))
        } else {
            None
        };
        let token = self.bump()?;
        let value = match token.kind {
            TokenKind::String => unquote(self.slice(token.range)),
            TokenKind::Ident | TokenKind::Number | TokenKind::Keyword => {
                SmolStr::from(self.slice(token.range))
            }
            _ => return None,
        };
        Some(MetaAttributeNode { key, value })
    }

    fn attributes(&mut self) -> Attributes {
        let mut attributes = Attributes::default();
        loop {
            match self.peek() {
                Some(TokenKind::Public) => attributes.namespace = NamespaceAttr::Public,
                Some(TokenKind::Private) => attributes.namespace = NamespaceAttr::Private,
                Some(TokenKind::Protected) => attributes.namespace = NamespaceAttr::Protected,
                Some(TokenKind::Internal) => attributes.namespace = NamespaceAttr::Internal,
                Some(TokenKind::Static) => attributes.is_static = true,
                Some(TokenKind::Override) => attributes.is_override = true,
                Some(TokenKind::Final) => attributes.is_final = true,
                Some(TokenKind::Dynamic) => attributes.is_dynamic = true,
                Some(TokenKind::Native) => attributes.is_native = true,
                // `mx_internal function foo()`
                Some(TokenKind::Ident)
                    if self.peek_at(1).is_some_and(|next| {
                        next.starts_declaration()
                            && !matches!(next, TokenKind::Import | TokenKind::Package | TokenKind::Use)
                    }) =>
                {
                    let range = self.current_range();
                    attributes.namespace = NamespaceAttr::Custom(self.slice(range).into());
                }
                _ => return attributes,
            }
            self.bump();
        }
    }

    fn package(&mut self, start: TextSize) -> PackageNode {
        self.bump();
        let name = self
            .dotted_name()
            .map(|(name, _)| name)
            .unwrap_or_default();
        let items = if self.expect(TokenKind::LBrace, "'{' after package name").is_some() {
            self.items(Context::Package)
        } else {
            Vec::new()
        };
        PackageNode {
            name,
            items,
            range: self.range_from(start),
        }
    }

    fn import(&mut self, start: TextSize) -> Option<ImportNode> {
        self.bump();
        let Some((target, _)) = self.dotted_name() else {
            self.error_here("expected an import name");
            return None;
        };
        let mut wildcard = false;
        if self.at(TokenKind::Dot) && self.peek_at(1) == Some(TokenKind::Star) {
            self.bump();
            self.bump();
            wildcard = true;
        }
        self.eat(TokenKind::Semi);
        Some(ImportNode {
            target,
            wildcard,
            range: self.range_from(start),
        })
    }

    fn use_namespace(&mut self, start: TextSize) -> Option<UseNamespaceNode> {
        self.bump();
        self.expect(TokenKind::Namespace, "'namespace' after 'use'")?;
        let (namespace, _) = self.dotted_name().or_else(|| {
            self.error_here("expected a namespace name");
            None
        })?;
        self.eat(TokenKind::Semi);
        Some(UseNamespaceNode {
            namespace,
            range: self.range_from(start),
        })
    }

    fn class(
        &mut self,
        start: TextSize,
        attributes: Attributes,
        meta: Vec<MetaTagNode>,
    ) -> Option<ClassNode> {
        self.bump();
        let (name, name_range) = self.ident("class name")?;
        let extends = if self.eat(TokenKind::Extends).is_some() {
            self.type_ref()
        } else {
            None
        };
        let mut implements = Vec::new();
        if self.eat(TokenKind::Implements).is_some() {
            implements = self.type_ref_list();
        }
        let members = if self.expect(TokenKind::LBrace, "'{' to open the class body").is_some() {
            self.items(Context::Class)
        } else {
            Vec::new()
        };
        Some(ClassNode {
            name,
            name_range,
            attributes,
            meta,
            extends,
            implements,
            members,
            range: self.range_from(start),
        })
    }

    fn interface(
        &mut self,
        start: TextSize,
        attributes: Attributes,
        meta: Vec<MetaTagNode>,
    ) -> Option<InterfaceNode> {
        self.bump();
        let (name, name_range) = self.ident("interface name")?;
        let extends = if self.eat(TokenKind::Extends).is_some() {
            self.type_ref_list()
        } else {
            Vec::new()
        };
        let members =
            if self.expect(TokenKind::LBrace, "'{' to open the interface body").is_some() {
                self.items(Context::Interface)
            } else {
                Vec::new()
            };
        Some(InterfaceNode {
            name,
            name_range,
            attributes,
            meta,
            extends,
            members,
            range: self.range_from(start),
        })
    }

    fn function(
        &mut self,
        start: TextSize,
        context: Context,
        attributes: Attributes,
        meta: Vec<MetaTagNode>,
    ) -> Option<FunctionNode> {
        self.bump();
        let mut accessor = None;
        if self.at(TokenKind::Ident) && self.peek_at(1) == Some(TokenKind::Ident) {
            let range = self.current_range();
            accessor = match self.slice(range) {
                "get" => Some(AccessorKind::Getter),
                "set" => Some(AccessorKind::Setter),
                _ => None,
            };
            if accessor.is_some() {
                self.bump();
            }
        }
        let (name, name_range) = self.ident("function name")?;
        let parameters = self.parameters();
        let return_type = if self.eat(TokenKind::Colon).is_some() {
            self.type_ref()
        } else {
            None
        };

        let body = if self.at(TokenKind::LBrace) {
            let body_start = self.current_range().start();
            self.bump();
            Some(self.region(body_start, RegionEnd::Block))
        } else {
            self.eat(TokenKind::Semi);
            if context != Context::Interface && !attributes.is_native {
                tracing::trace!(function = %name, "function without a body");
            }
            None
        };

        Some(FunctionNode {
            name,
            name_range,
            accessor,
            attributes,
            meta,
            parameters,
            return_type,
            body,
            range: self.range_from(start),
        })
    }

    fn parameters(&mut self) -> Vec<ParameterNode> {
        let mut parameters = Vec::new();
        if self.expect(TokenKind::LParen, "'(' to open the parameter list").is_none() {
            return parameters;
        }
        while !self.at(TokenKind::RParen) && self.peek().is_some() {
            let start = self.current_range().start();
            let mut is_rest = false;
            while self.eat(TokenKind::Dot).is_some() {
                is_rest = true;
            }
            let Some((name, _)) = self.ident("parameter name") else {
                self.skip_until(&[TokenKind::Comma, TokenKind::RParen]);
                if self.eat(TokenKind::Comma).is_none() {
                    break;
                }
                continue;
            };
            let type_ref = if self.eat(TokenKind::Colon).is_some() {
                self.type_ref()
            } else {
                None
            };
            let has_default = if self.eat(TokenKind::Eq).is_some() {
                self.skip_until(&[TokenKind::Comma, TokenKind::RParen]);
                true
            } else {
                false
            };
            parameters.push(ParameterNode {
                name,
                type_ref,
                has_default,
                is_rest,
                range: self.range_from(start),
            });
            if self.eat(TokenKind::Comma).is_none() {
                break;
            }
        }
        self.expect(TokenKind::RParen, "')' to close the parameter list");
        parameters
    }

    fn variables(
        &mut self,
        start: TextSize,
        attributes: Attributes,
        meta: Vec<MetaTagNode>,
    ) -> Vec<VariableNode> {
        let is_const = self.bump().is_some_and(|t| t.kind == TokenKind::Const);
        let mut variables = Vec::new();
        loop {
            let Some((name, name_range)) = self.ident("variable name") else {
                break;
            };
            let type_ref = if self.eat(TokenKind::Colon).is_some() {
                self.type_ref()
            } else {
                None
            };
            let initializer = if self.eat(TokenKind::Eq).is_some() {
                let init_start = self.current_range().start();
                Some(self.region(init_start, RegionEnd::Initializer))
            } else {
                None
            };
            variables.push(VariableNode {
                name,
                name_range,
                is_const,
                attributes: attributes.clone(),
                meta: meta.clone(),
                type_ref,
                initializer,
                range: self.range_from(start),
            });
            if self.eat(TokenKind::Comma).is_none() {
                break;
            }
        }
        self.eat(TokenKind::Semi);
        variables
    }

    fn namespace_decl(&mut self, start: TextSize, attributes: Attributes) -> Option<NamespaceNode> {
        self.bump();
        let (name, name_range) = self.ident("namespace name")?;
        let uri = if self.eat(TokenKind::Eq).is_some() {
            match self.eat(TokenKind::String) {
                Some(token) => Some(unquote(self.slice(token.range))),
                None => {
                    self.error_here("expected a namespace URI string");
                    None
                }
            }
        } else {
            None
        };
        self.eat(TokenKind::Semi);
        Some(NamespaceNode {
            name,
            name_range,
            attributes,
            uri,
            range: self.range_from(start),
        })
    }

    fn type_ref_list(&mut self) -> Vec<TypeRefNode> {
        let mut refs = Vec::new();
        while let Some(type_ref) = self.type_ref() {
            refs.push(type_ref);
            if self.eat(TokenKind::Comma).is_none() {
                break;
            }
        }
        refs
    }

    fn type_ref(&mut self) -> Option<TypeRefNode> {
        let start = self.current_range().start();
        match self.peek() {
            Some(TokenKind::Star) => {
                let token = self.bump()?;
                Some(TypeRefNode::new("*", token.range))
            }
            Some(TokenKind::Void) => {
                let token = self.bump()?;
                Some(TypeRefNode::new("void", token.range))
            }
            Some(TokenKind::Ident) => {
                let (name, _) = self.dotted_name()?;
                let mut argument = None;
                if self.at(TokenKind::Dot) && self.peek_at(1) == Some(TokenKind::Lt) {
                    self.bump();
                    self.bump();
                    argument = self.type_ref().map(Box::new);
                    self.expect(TokenKind::Gt, "'>' to close the type argument");
                }
                Some(TypeRefNode {
                    name,
                    argument,
                    range: self.range_from(start),
                })
            }
            _ => {
                self.error_here("expected a type name");
                None
            }
        }
    }

    fn skip_until(&mut self, stops: &[TokenKind]) {
        let mut depth = 0usize;
        while let Some(kind) = self.peek() {
            if depth == 0 && stops.contains(&kind) {
                return;
            }
            match kind {
                TokenKind::LParen | TokenKind::LBracket | TokenKind::LBrace => depth += 1,
                TokenKind::RParen | TokenKind::RBracket | TokenKind::RBrace => {
                    if depth == 0 {
                        return;
                    }
                    depth -= 1;
                }
                _ => {}
            }
            self.bump();
        }
    }

    // ------------------------------------------------------------------
    // Statement and expression regions
    // ------------------------------------------------------------------

    /// Scan a region, collecting local declarations and identifier chains.
    fn region(&mut self, start: TextSize, end: RegionEnd) -> BodyNode {
        let mut body = BodyNode::default();
        let mut depth = 0usize;

        while let Some(kind) = self.peek() {
            if depth == 0 && end.stops_at(kind, self.prev_kind()) {
                break;
            }
            match kind {
                TokenKind::LParen | TokenKind::LBracket | TokenKind::LBrace => {
                    depth += 1;
                    self.bump();
                }
                TokenKind::RParen | TokenKind::RBracket | TokenKind::RBrace => {
                    if depth == 0 {
                        if end == RegionEnd::Block && kind == TokenKind::RBrace {
                            self.bump();
                            body.range = self.range_from(start);
                            return body;
                        }
                        break;
                    }
                    depth -= 1;
                    self.bump();
                }
                TokenKind::Var | TokenKind::Const => {
                    let local_start = self.current_range().start();
                    self.bump();
                    self.local_variables(local_start, kind == TokenKind::Const, &mut body);
                }
                TokenKind::Function => {
                    self.bump();
                    self.nested_function(&mut body);
                }
                TokenKind::Ident => {
                    let after_member_access = self.prev_kind() == Some(TokenKind::Dot);
                    let Some((chain, range)) = self.dotted_name() else {
                        self.bump();
                        continue;
                    };
                    if !after_member_access {
                        body.references.push(ExprRefNode {
                            chain,
                            is_call: self.at(TokenKind::LParen),
                            range,
                        });
                    }
                }
                _ => {
                    self.bump();
                }
            }
        }

        if end == RegionEnd::Block {
            self.error_here("expected '}' to close the block");
        }
        body.range = self.range_from(start);
        body
    }

    fn local_variables(&mut self, start: TextSize, is_const: bool, body: &mut BodyNode) {
        loop {
            let Some(name) = self.eat(TokenKind::Ident) else {
                return;
            };
            let name_range = name.range;
            let type_ref = if self.eat(TokenKind::Colon).is_some() {
                self.type_ref()
            } else {
                None
            };
            body.locals.push(VariableNode {
                name: self.slice(name_range).into(),
                name_range,
                is_const,
                attributes: Attributes::default(),
                meta: Vec::new(),
                type_ref,
                initializer: None,
                range: self.range_from(start),
            });
            // The initializer is scanned by the enclosing region.
            if !(self.at(TokenKind::Comma) && self.peek_at(1) == Some(TokenKind::Ident)) {
                return;
            }
            self.bump();
        }
    }

    /// A function expression or nested function declaration inside a body.
    /// Parameters become locals; the body is scanned by the enclosing region.
    fn nested_function(&mut self, body: &mut BodyNode) {
        if let Some(name) = self.eat(TokenKind::Ident) {
            body.locals.push(VariableNode {
                name: self.slice(name.range).into(),
                name_range: name.range,
                is_const: false,
                attributes: Attributes::default(),
                meta: Vec::new(),
                type_ref: None,
                initializer: None,
                range: name.range,
            });
        }
        if !self.at(TokenKind::LParen) {
            return;
        }
        for parameter in self.parameters() {
            body.locals.push(VariableNode {
                name: parameter.name,
                name_range: parameter.range,
                is_const: false,
                attributes: Attributes::default(),
                meta: Vec::new(),
                type_ref: parameter.type_ref,
                initializer: None,
                range: parameter.range,
            });
        }
        if self.eat(TokenKind::Colon).is_some() {
            if let Some(return_type) = self.type_ref() {
                if return_type.name != "*" && return_type.name != "void" {
                    body.references.push(ExprRefNode {
                        chain: return_type.name,
                        is_call: false,
                        range: return_type.range,
                    });
                }
            }
        }
    }
}

/// How a scanned region terminates.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
enum RegionEnd {
    /// A `{ ... }` block whose opening brace was consumed.
    Block,
    /// A variable initializer.
    Initializer,
    /// Loose statements between declarations.
    Statements,
}

impl RegionEnd {
    fn stops_at(self, kind: TokenKind, prev: Option<TokenKind>) -> bool {
        match self {
            RegionEnd::Block => false,
            RegionEnd::Initializer => {
                matches!(kind, TokenKind::Comma | TokenKind::Semi)
                    || (kind.starts_declaration() && !continues_expression(kind, prev))
            }
            RegionEnd::Statements => {
                kind.starts_declaration() && !continues_expression(kind, prev)
            }
        }
    }
}

/// Whether a declaration keyword is really part of the expression being scanned,
/// as in `var f = function() {}`.
fn continues_expression(kind: TokenKind, prev: Option<TokenKind>) -> bool {
    kind == TokenKind::Function
        && matches!(
            prev,
            None | Some(TokenKind::Eq)
                | Some(TokenKind::LParen)
                | Some(TokenKind::Comma)
                | Some(TokenKind::Colon)
                | Some(TokenKind::Operator)
                | Some(TokenKind::Return)
                | Some(TokenKind::LBracket)
        )
}

/// Strip quotes from a string literal and resolve simple escapes.
fn unquote(literal: &str) -> SmolStr {
    let inner = literal
        .get(1..literal.len().saturating_sub(1))
        .unwrap_or_default();
    if !inner.contains('\\') {
        return inner.into();
    }
    let mut out = String::with_capacity(inner.len());
    let mut chars = inner.chars();
    while let Some(c) = chars.next() {
        if c == '\\' {
            match chars.next() {
                Some('n') => out.push('\n'),
                Some('t') => out.push('\t'),
                Some(other) => out.push(other),
                None => {}
            }
        } else {
            out.push(c);
        }
    }
    out.into()
}
