//! Placeholder grammar for export templates

pub mod lexer;
pub mod pattern;
pub mod rewrite;
pub mod validate;

pub use lexer::{tokenize, Span, Token, TokenKind};
pub use pattern::Pattern;
pub use rewrite::{
    join_list_items, render_conditional, render_list, replace_scalar, rewrite_prefix,
    trim_blank_lines, BlockCursor, Indent, ListPosition, ScalarCursor,
};
pub use validate::{validate, BlockFamily, ValidationReport};
