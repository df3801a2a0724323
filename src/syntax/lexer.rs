//! Token stream for the ActionScript outline parser.

use logos::Logos;

use crate::base::{TextRange, TextSize};

/// Token kinds recognised by the outline lexer.
///
/// Contextual words (`get`, `set`, `each`, `namespace` in some positions) are
/// lexed as identifiers or keywords and disambiguated by the parser.
#[derive(Logos, Copy, Clone, Debug, PartialEq, Eq, Hash)]
#[logos(skip r"[ \t\r\n\f\u{feff}]+")]
#[logos(skip(r"//[^\r\n]*", allow_greedy = true))]
#[logos(skip r"/\*([^*]|\*+[^*/])*\*+/")]
pub enum TokenKind {
    #[token("package")]
    Package,
    #[token("import")]
    Import,
    #[token("class")]
    Class,
    #[token("interface")]
    Interface,
    #[token("extends")]
    Extends,
    #[token("implements")]
    Implements,
    #[token("function")]
    Function,
    #[token("var")]
    Var,
    #[token("const")]
    Const,
    #[token("namespace")]
    Namespace,
    #[token("use")]
    Use,
    #[token("public")]
    Public,
    #[token("private")]
    Private,
    #[token("protected")]
    Protected,
    #[token("internal")]
    Internal,
    #[token("static")]
    Static,
    #[token("override")]
    Override,
    #[token("final")]
    Final,
    #[token("dynamic")]
    Dynamic,
    #[token("native")]
    Native,
    #[token("void")]
    Void,
    #[token("new")]
    New,
    #[token("this")]
    This,
    #[token("super")]
    Super,
    #[token("return")]
    Return,
    /// Statement keywords that never start a reference.
    #[token("if")]
    #[token("else")]
    #[token("for")]
    #[token("while")]
    #[token("do")]
    #[token("switch")]
    #[token("case")]
    #[token("default")]
    #[token("break")]
    #[token("continue")]
    #[token("try")]
    #[token("catch")]
    #[token("finally")]
    #[token("throw")]
    #[token("typeof")]
    #[token("instanceof")]
    #[token("delete")]
    #[token("in")]
    #[token("is")]
    #[token("as")]
    #[token("true")]
    #[token("false")]
    #[token("null")]
    #[token("undefined")]
    Keyword,

    #[regex(r"[A-Za-z_$][A-Za-z0-9_$]*")]
    Ident,
    #[regex(r#""([^"\\\r\n]|\\.)*""#)]
    #[regex(r"'([^'\\\r\n]|\\.)*'")]
    String,
    #[regex(r"[0-9][0-9A-Za-z_.]*")]
    Number,

    #[token("{")]
    LBrace,
    #[token("}")]
    RBrace,
    #[token("(")]
    LParen,
    #[token(")")]
    RParen,
    #[token("[")]
    LBracket,
    #[token("]")]
    RBracket,
    #[token(";")]
    Semi,
    #[token(",")]
    Comma,
    #[token(":")]
    Colon,
    #[token(".")]
    Dot,
    #[token("=")]
    Eq,
    #[token("<")]
    Lt,
    #[token(">")]
    Gt,
    #[token("*")]
    Star,
    #[regex(r"[-+/%&|^!~?@#\\]")]
    Operator,
}

impl TokenKind {
    /// Keywords that may only appear as attributes of a declaration.
    pub fn is_attribute(self) -> bool {
        matches!(
            self,
            TokenKind::Public
                | TokenKind::Private
                | TokenKind::Protected
                | TokenKind::Internal
                | TokenKind::Static
                | TokenKind::Override
                | TokenKind::Final
                | TokenKind::Dynamic
                | TokenKind::Native
        )
    }

    /// Tokens that begin a declaration.
    pub fn starts_declaration(self) -> bool {
        self.is_attribute()
            || matches!(
                self,
                TokenKind::Package
                    | TokenKind::Import
                    | TokenKind::Class
                    | TokenKind::Interface
                    | TokenKind::Function
                    | TokenKind::Var
                    | TokenKind::Const
                    | TokenKind::Namespace
                    | TokenKind::Use
            )
    }
}

/// A lexed token with its source range.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub struct Token {
    pub kind: TokenKind,
    pub range: TextRange,
}

/// Result of lexing a whole file.
#[derive(Clone, Debug, Default)]
pub struct Lexed {
    pub tokens: Vec<Token>,
    /// Ranges of characters the lexer could not classify.
    pub errors: Vec<TextRange>,
}

/// Lex `text` into tokens.
pub fn lex(text: &str) -> Lexed {
    let mut lexed = Lexed::default();
    let mut lexer = TokenKind::lexer(text);

    while let Some(result) = lexer.next() {
        let span = lexer.span();
        let range = TextRange::new(
            TextSize::from(span.start as u32),
            TextSize::from(span.end as u32),
        );
        match result {
            Ok(kind) => lexed.tokens.push(Token { kind, range }),
            Err(()) => lexed.errors.push(range),
        }
    }

    lexed
}

#[cfg(test)]
mod tests {
    use super::*;

    fn kinds(text: &str) -> Vec<TokenKind> {
        lex(text).tokens.into_iter().map(|t| t.kind).collect()
    }

    #[test]
    fn test_keywords_beat_identifiers() {
        assert_eq!(
            kinds("package classes class"),
            vec![TokenKind::Package, TokenKind::Ident, TokenKind::Class]
        );
    }

    #[test]
    fn test_comments_are_skipped() {
        assert_eq!(
            kinds("var /* block\n comment */ x // trailing\n;"),
            vec![TokenKind::Var, TokenKind::Ident, TokenKind::Semi]
        );
    }

    #[test]
    fn test_vector_type_tokens() {
        assert_eq!(
            kinds("Vector.<int>"),
            vec![
                TokenKind::Ident,
                TokenKind::Dot,
                TokenKind::Lt,
                TokenKind::Ident,
                TokenKind::Gt
            ]
        );
    }

    #[test]
    fn test_strings_and_ranges() {
        let lexed = lex(r#"x = "a\"b";"#);
        assert!(lexed.errors.is_empty());
        assert_eq!(lexed.tokens[2].kind, TokenKind::String);
        assert_eq!(u32::from(lexed.tokens[2].range.start()), 4);
        assert_eq!(u32::from(lexed.tokens[2].range.end()), 10);
    }
}
