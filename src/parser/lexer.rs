//! Lexer for export templates using logos
//!
//! A template is opaque target-language text with `{{Name}}` placeholders
//! sprinkled through it. The lexer only separates placeholders from the
//! surrounding literal text; it never looks inside the literal parts.

use logos::Logos;

/// Byte range in template text
pub type Span = std::ops::Range<usize>;

/// Opening placeholder delimiter
pub const OPEN_DELIMITER: &str = "{{";
/// Closing placeholder delimiter
pub const CLOSE_DELIMITER: &str = "}}";
/// Suffix marking the opening marker of a block pair
pub const START_SUFFIX: &str = "_Start";
/// Suffix marking the closing marker of a block pair
pub const END_SUFFIX: &str = "_End";

#[derive(Logos, Debug, Clone, PartialEq)]
enum RawToken {
    // Placeholders never span lines
    #[regex(r"\{\{[^{}\r\n]+\}\}")]
    Placeholder,

    #[regex(r"[^{]+")]
    Text,

    // A lone brace that does not open a complete placeholder
    #[token("{")]
    Brace,
}

/// Classification of a template token
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TokenKind {
    /// Plain text copied to the output as-is
    Literal,
    /// `{{Name}}`
    Scalar,
    /// `{{Name_Start}}`
    BlockStart,
    /// `{{Name_End}}`
    BlockEnd,
}

/// A single token with its source span
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Token {
    pub kind: TokenKind,
    /// Placeholder name without delimiters (empty for literals)
    pub name: String,
    /// Span covering the whole token, delimiters included
    pub span: Span,
}

impl Token {
    fn literal(span: Span) -> Self {
        Self {
            kind: TokenKind::Literal,
            name: String::new(),
            span,
        }
    }

    fn placeholder(name: &str, span: Span) -> Self {
        let name = name.trim();
        let kind = if name.ends_with(START_SUFFIX) {
            TokenKind::BlockStart
        } else if name.ends_with(END_SUFFIX) {
            TokenKind::BlockEnd
        } else {
            TokenKind::Scalar
        };
        Self {
            kind,
            name: name.to_string(),
            span,
        }
    }

    /// Check if this token is any kind of placeholder
    pub fn is_placeholder(&self) -> bool {
        self.kind != TokenKind::Literal
    }

    /// Name with the `_Start` / `_End` suffix removed
    pub fn stem(&self) -> &str {
        match self.kind {
            TokenKind::BlockStart => self.name.strip_suffix(START_SUFFIX).unwrap_or(&self.name),
            TokenKind::BlockEnd => self.name.strip_suffix(END_SUFFIX).unwrap_or(&self.name),
            _ => &self.name,
        }
    }
}

/// Tokenize template text into a flat token sequence
///
/// Adjacent literal fragments are merged, so literals and placeholders
/// always alternate with at most one literal between two placeholders.
pub fn tokenize(input: &str) -> Vec<Token> {
    let mut tokens: Vec<Token> = Vec::new();

    for (raw, span) in RawToken::lexer(input).spanned() {
        if let Ok(RawToken::Placeholder) = raw {
            let inner = &input[span.start + OPEN_DELIMITER.len()..span.end - CLOSE_DELIMITER.len()];
            tokens.push(Token::placeholder(inner, span));
            continue;
        }

        match tokens.last_mut() {
            Some(last) if last.kind == TokenKind::Literal => last.span.end = span.end,
            _ => tokens.push(Token::literal(span)),
        }
    }

    tokens
}

#[cfg(test)]
mod tests {
    use super::*;

    fn kinds(input: &str) -> Vec<(TokenKind, String)> {
        tokenize(input)
            .into_iter()
            .map(|t| (t.kind, t.name))
            .collect()
    }

    #[test]
    fn test_plain_text_is_single_literal() {
        let tokens = tokenize("local x = 1\nreturn x");
        assert_eq!(tokens.len(), 1);
        assert_eq!(tokens[0].kind, TokenKind::Literal);
        assert_eq!(tokens[0].span, 0..20);
    }

    #[test]
    fn test_placeholder_classification() {
        assert_eq!(
            kinds("{{Npc_Name}}{{Fields_Start}}{{Fields_End}}"),
            vec![
                (TokenKind::Scalar, "Npc_Name".to_string()),
                (TokenKind::BlockStart, "Fields_Start".to_string()),
                (TokenKind::BlockEnd, "Fields_End".to_string()),
            ]
        );
    }

    #[test]
    fn test_whitespace_inside_delimiters_is_trimmed() {
        let tokens = tokenize("a {{ Npc_Name }} b");
        assert_eq!(tokens[1].name, "Npc_Name");
        assert_eq!(tokens[1].span, 2..16);
    }

    #[test]
    fn test_lone_braces_stay_literal() {
        let tokens = tokenize("function f() { return {x = 1} }");
        assert_eq!(tokens.len(), 1);
        assert_eq!(tokens[0].kind, TokenKind::Literal);
    }

    #[test]
    fn test_unterminated_placeholder_is_literal() {
        let tokens = tokenize("a {{Npc_Name b\nc");
        assert_eq!(tokens.len(), 1);
        assert_eq!(tokens[0].kind, TokenKind::Literal);
    }

    #[test]
    fn test_placeholder_does_not_cross_lines() {
        let tokens = tokenize("{{Npc\n_Name}}");
        assert!(tokens.iter().all(|t| t.kind == TokenKind::Literal));
    }

    #[test]
    fn test_triple_brace_keeps_outer_brace_literal() {
        let tokens = tokenize("{{{Npc_Name}}}");
        assert_eq!(
            tokens.iter().map(|t| t.kind).collect::<Vec<_>>(),
            vec![TokenKind::Literal, TokenKind::Scalar, TokenKind::Literal]
        );
        assert_eq!(tokens[1].span, 1..13);
    }

    #[test]
    fn test_stem_strips_block_suffix() {
        let tokens = tokenize("{{Inventory_Start}}{{Inventory_End}}");
        assert_eq!(tokens[0].stem(), "Inventory");
        assert_eq!(tokens[1].stem(), "Inventory");
    }

    #[test]
    fn test_spans_cover_input() {
        let input = "a{{X}}b{{Y_Start}}c";
        let tokens = tokenize(input);
        let rebuilt: String = tokens.iter().map(|t| &input[t.span.clone()]).collect();
        assert_eq!(rebuilt, input);
    }
}
