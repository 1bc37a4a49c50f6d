//! Template rewriting: scalar substitution, conditional blocks, list blocks
//!
//! Every operation works on a freshly tokenized view of the text, so
//! replacements are never re-scanned as part of the surrounding template.
//! The cursors expose each match one at a time, which lets async callers
//! await lookups between finding a placeholder and replacing it.

use super::lexer::{tokenize, Span, Token, TokenKind, CLOSE_DELIMITER, OPEN_DELIMITER};
use super::pattern::Pattern;

/// How a scalar replacement treats the line it lands on
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Indent {
    /// Insert the value verbatim
    Inline,
    /// Trim blank edge lines and re-indent continuation lines
    Capture,
}

/// Position of an item inside a list block
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ListPosition {
    pub index: usize,
    pub is_first: bool,
    pub is_last: bool,
}

impl ListPosition {
    pub fn new(index: usize, len: usize) -> Self {
        Self {
            index,
            is_first: index == 0,
            is_last: index + 1 == len,
        }
    }
}

fn line_start(text: &str, pos: usize) -> usize {
    text[..pos].rfind('\n').map_or(0, |i| i + 1)
}

/// Position just past the newline ending the line containing `pos`
fn line_end(text: &str, pos: usize) -> usize {
    text[pos..].find('\n').map_or(text.len(), |i| pos + i + 1)
}

fn is_blank(s: &str) -> bool {
    s.chars().all(|c| c == ' ' || c == '\t' || c == '\r')
}

/// Leading whitespace of the line containing `pos`
fn leading_indent(text: &str, pos: usize) -> &str {
    let line = &text[line_start(text, pos)..pos];
    let len = line
        .find(|c: char| c != ' ' && c != '\t')
        .unwrap_or(line.len());
    &line[..len]
}

/// Extent removed together with a marker: its whole line when it stands alone
fn marker_extent(text: &str, span: &Span) -> Span {
    let start = line_start(text, span.start);
    let end = line_end(text, span.end);
    let standalone =
        is_blank(&text[start..span.start]) && is_blank(text[span.end..end].trim_end_matches('\n'));
    if standalone {
        start..end
    } else {
        span.clone()
    }
}

fn shifted(span: &Span, offset: usize) -> Span {
    span.start + offset..span.end + offset
}

/// Remove leading and trailing whitespace-only lines
pub fn trim_blank_lines(text: &str) -> String {
    let lines: Vec<&str> = text.split('\n').collect();
    let Some(first) = lines.iter().position(|l| !l.trim().is_empty()) else {
        return String::new();
    };
    let last = lines
        .iter()
        .rposition(|l| !l.trim().is_empty())
        .unwrap_or(first);
    lines[first..=last].join("\n")
}

/// Prefix every line after the first with `indent`; empty lines stay empty
pub fn apply_indent(text: &str, indent: &str) -> String {
    if indent.is_empty() {
        return text.to_string();
    }
    let mut out = String::with_capacity(text.len());
    for (i, line) in text.split('\n').enumerate() {
        if i > 0 {
            out.push('\n');
            if !line.trim().is_empty() {
                out.push_str(indent);
            }
        }
        out.push_str(line);
    }
    out
}

/// Concatenate rendered list items, trimming blank lines at both ends
///
/// A trailing newline survives the trim when the items end with one, so
/// list bodies written on their own lines keep their line structure.
pub fn join_list_items(items: &[String]) -> String {
    let joined = items.concat();
    let mut trimmed = trim_blank_lines(&joined);
    if !trimmed.is_empty() && joined.ends_with('\n') {
        trimmed.push('\n');
    }
    trimmed
}

/// Walks scalar placeholders matching one pattern, left to right
pub struct ScalarCursor<'p> {
    text: String,
    pattern: &'p Pattern,
    indent: Indent,
    search_from: usize,
    current: Option<Span>,
}

impl<'p> ScalarCursor<'p> {
    pub fn new(text: impl Into<String>, pattern: &'p Pattern, indent: Indent) -> Self {
        Self {
            text: text.into(),
            pattern,
            indent,
            search_from: 0,
            current: None,
        }
    }

    /// Advance to the next matching placeholder and return its captures
    pub fn next_match(&mut self) -> Option<Vec<String>> {
        let offset = self.search_from;
        let pattern = self.pattern;
        let found = tokenize(&self.text[offset..])
            .into_iter()
            .filter(|token| token.kind == TokenKind::Scalar)
            .find_map(|token| {
                let captures = pattern.captures(&token.name)?;
                Some((shifted(&token.span, offset), captures))
            });

        match found {
            Some((span, captures)) => {
                self.current = Some(span);
                Some(captures)
            }
            None => {
                self.current = None;
                None
            }
        }
    }

    /// Replace the current placeholder with `value`
    pub fn replace(&mut self, value: &str) {
        let Some(span) = self.current.take() else {
            return;
        };

        if self.indent == Indent::Inline {
            self.text.replace_range(span.clone(), value);
            self.search_from = span.start + value.len();
            return;
        }

        let trimmed = trim_blank_lines(value);
        if trimmed.is_empty() {
            let extent = marker_extent(&self.text, &span);
            self.text.replace_range(extent.clone(), "");
            self.search_from = extent.start;
        } else {
            let indented = apply_indent(&trimmed, leading_indent(&self.text, span.start));
            self.text.replace_range(span.clone(), &indented);
            self.search_from = span.start + indented.len();
        }
    }

    pub fn finish(self) -> String {
        self.text
    }
}

#[derive(Debug, Clone)]
struct BlockMatch {
    outer: Span,
    inner: Span,
}

/// Walks `Start ... End` blocks of one family, left to right
///
/// The matching end marker is the nearest one at the same nesting depth.
/// Start markers without a matching end are skipped and left in place.
pub struct BlockCursor<'p> {
    text: String,
    start: &'p Pattern,
    end: &'p Pattern,
    search_from: usize,
    current: Option<BlockMatch>,
}

impl<'p> BlockCursor<'p> {
    pub fn new(text: impl Into<String>, start: &'p Pattern, end: &'p Pattern) -> Self {
        Self {
            text: text.into(),
            start,
            end,
            search_from: 0,
            current: None,
        }
    }

    fn find_close<'t>(&self, tokens: &'t [Token]) -> Option<&'t Token> {
        let mut depth = 0usize;
        for token in tokens {
            match token.kind {
                TokenKind::BlockStart if self.start.matches(&token.name) => depth += 1,
                TokenKind::BlockEnd if self.end.matches(&token.name) => {
                    if depth == 0 {
                        return Some(token);
                    }
                    depth -= 1;
                }
                _ => {}
            }
        }
        None
    }

    /// Advance to the next complete block and return the start marker's captures
    pub fn next_block(&mut self) -> Option<Vec<String>> {
        self.current = None;
        let offset = self.search_from;
        let tokens = tokenize(&self.text[offset..]);

        for (i, token) in tokens.iter().enumerate() {
            if token.kind != TokenKind::BlockStart {
                continue;
            }
            let Some(captures) = self.start.captures(&token.name) else {
                continue;
            };
            let Some(close) = self.find_close(&tokens[i + 1..]) else {
                continue;
            };

            let open_span = shifted(&token.span, offset);
            let close_span = shifted(&close.span, offset);
            let mut open = marker_extent(&self.text, &open_span);
            let mut close = marker_extent(&self.text, &close_span);
            if open.end > close.start {
                open = open_span;
                close = close_span;
            }

            self.current = Some(BlockMatch {
                outer: open.start..close.end,
                inner: open.end..close.start,
            });
            return Some(captures);
        }

        None
    }

    /// Text between the current block's markers
    pub fn inner(&self) -> &str {
        self.current
            .as_ref()
            .map_or("", |m| &self.text[m.inner.clone()])
    }

    /// Resolve the current block as a conditional
    ///
    /// Kept content is scanned again, so nested blocks of the same family
    /// are evaluated by subsequent `next_block` calls.
    pub fn keep(&mut self, keep: bool) {
        let Some(m) = self.current.take() else {
            return;
        };
        let replacement = if keep {
            self.text[m.inner.clone()].to_string()
        } else {
            String::new()
        };
        self.text.replace_range(m.outer.clone(), &replacement);
        self.search_from = m.outer.start;
    }

    /// Replace the whole current block, markers included, with rendered text
    pub fn replace(&mut self, rendered: &str) {
        let Some(m) = self.current.take() else {
            return;
        };
        self.text.replace_range(m.outer.clone(), rendered);
        self.search_from = m.outer.start + rendered.len();
    }

    pub fn finish(self) -> String {
        self.text
    }
}

/// Replace every scalar placeholder matching `pattern`
pub fn replace_scalar<F>(text: &str, pattern: &Pattern, indent: Indent, mut compute: F) -> String
where
    F: FnMut(&[String]) -> String,
{
    let mut cursor = ScalarCursor::new(text, pattern, indent);
    while let Some(captures) = cursor.next_match() {
        let value = compute(&captures);
        cursor.replace(&value);
    }
    cursor.finish()
}

/// Keep or drop every `start ... end` block according to `predicate`
pub fn render_conditional<F>(text: &str, start: &Pattern, end: &Pattern, mut predicate: F) -> String
where
    F: FnMut(&[String]) -> bool,
{
    let mut cursor = BlockCursor::new(text, start, end);
    while let Some(captures) = cursor.next_block() {
        let keep = predicate(&captures);
        cursor.keep(keep);
    }
    cursor.finish()
}

/// Expand every `start ... end` block once per item
///
/// The renderer receives the item, its position and the block's inner
/// template; outputs are concatenated in item order.
pub fn render_list<T, F>(
    text: &str,
    start: &Pattern,
    end: &Pattern,
    items: &[T],
    mut render_item: F,
) -> String
where
    F: FnMut(&T, ListPosition, &str) -> String,
{
    let mut cursor = BlockCursor::new(text, start, end);
    while cursor.next_block().is_some() {
        let template = cursor.inner().to_string();
        let rendered: Vec<String> = items
            .iter()
            .enumerate()
            .map(|(i, item)| render_item(item, ListPosition::new(i, items.len()), &template))
            .collect();
        cursor.replace(&join_list_items(&rendered));
    }
    cursor.finish()
}

fn strip_name_prefix<'a>(name: &'a str, prefix: &str) -> Option<&'a str> {
    let rest = name.strip_prefix(prefix)?;
    (rest.is_empty() || rest.starts_with('_')).then_some(rest)
}

/// Move placeholders from one namespace into another
///
/// `{{Item_Name}}` becomes `{{Inventory_Item_Name}}` when rewriting
/// `Item` to `Inventory_Item`. Literal text is never touched.
pub fn rewrite_prefix(text: &str, default_prefix: &str, target_prefix: &str) -> String {
    let mut out = String::with_capacity(text.len());
    for token in tokenize(text) {
        if token.is_placeholder() {
            if let Some(rest) = strip_name_prefix(&token.name, default_prefix) {
                out.push_str(OPEN_DELIMITER);
                out.push_str(target_prefix);
                out.push_str(rest);
                out.push_str(CLOSE_DELIMITER);
                continue;
            }
        }
        out.push_str(&text[token.span.clone()]);
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    fn lit(name: &str) -> Pattern {
        Pattern::literal(name).unwrap()
    }

    #[test]
    fn test_indent_preservation() {
        let out = replace_scalar("  {{X}}\n", &lit("X"), Indent::Capture, |_| "a\nb".to_string());
        assert_eq!(out, "  a\n  b\n");
    }

    #[test]
    fn test_indent_uses_leading_whitespace_only() {
        let out = replace_scalar("    local t = {{X}}\n", &lit("X"), Indent::Capture, |_| {
            "{\n  1\n}".to_string()
        });
        assert_eq!(out, "    local t = {\n      1\n    }\n");
    }

    #[test]
    fn test_indent_trims_blank_edge_lines() {
        let out = replace_scalar("\t{{X}};", &lit("X"), Indent::Capture, |_| {
            "\n\n a\n\nb\n  \n".to_string()
        });
        assert_eq!(out, "\t a\n\n\tb;");
    }

    #[test]
    fn test_empty_standalone_scalar_removes_line() {
        let out = replace_scalar("a\n    {{X}}\nb\n", &lit("X"), Indent::Capture, |_| String::new());
        assert_eq!(out, "a\nb\n");
    }

    #[test]
    fn test_inline_scalar_keeps_value_verbatim() {
        let out = replace_scalar("  {{X}}\n", &lit("X"), Indent::Inline, |_| "a\nb\n".to_string());
        assert_eq!(out, "  a\nb\n\n");
    }

    #[test]
    fn test_scalar_replacements_are_not_rescanned() {
        let out = replace_scalar("{{X}} {{X}}", &lit("X"), Indent::Inline, |_| "{{X}}".to_string());
        assert_eq!(out, "{{X}} {{X}}");
    }

    #[test]
    fn test_scalar_captures_are_passed_per_occurrence() {
        let p = Pattern::new("Value_(.*)").unwrap();
        let out = replace_scalar("{{Value_A}}-{{Value_B}}", &p, Indent::Inline, |caps| {
            caps[0].to_lowercase()
        });
        assert_eq!(out, "a-b");
    }

    #[test]
    fn test_scalar_ignores_block_markers() {
        let p = Pattern::new("X.*").unwrap();
        let out = replace_scalar("{{X_Start}}{{Xy}}{{X_End}}", &p, Indent::Inline, |_| "v".to_string());
        assert_eq!(out, "{{X_Start}}v{{X_End}}");
    }

    #[test]
    fn test_conditional_gating() {
        let (start, end) = (lit("Cond_Start"), lit("Cond_End"));
        let text = "[[pre]]{{Cond_Start}}KEEP{{Cond_End}}";
        assert_eq!(render_conditional(text, &start, &end, |_| false), "[[pre]]");
        assert_eq!(render_conditional(text, &start, &end, |_| true), "[[pre]]KEEP");
        assert_eq!(
            render_conditional("{{Cond_Start}}KEEP{{Cond_End}}", &start, &end, |_| false),
            ""
        );
    }

    #[test]
    fn test_conditional_standalone_markers_remove_lines() {
        let (start, end) = (lit("C_Start"), lit("C_End"));
        let text = "a\n  {{C_Start}}\n  KEEP\n  {{C_End}}\nb\n";
        assert_eq!(render_conditional(text, &start, &end, |_| true), "a\n  KEEP\nb\n");
        assert_eq!(render_conditional(text, &start, &end, |_| false), "a\nb\n");
    }

    #[test]
    fn test_conditional_nested_same_family() {
        let start = Pattern::new("Has_(.*)_Start").unwrap();
        let end = lit("Has_End");
        let text = "{{Has_A_Start}}a{{Has_B_Start}}b{{Has_End}}c{{Has_End}}d";
        let out = render_conditional(text, &start, &end, |caps| caps[0] == "A");
        assert_eq!(out, "acd");
        let out = render_conditional(text, &start, &end, |caps| caps[0] == "B");
        assert_eq!(out, "d");
    }

    #[test]
    fn test_conditional_predicate_sees_captures_in_order() {
        let start = Pattern::new("V_(.*)_Equals_(.*)_Start").unwrap();
        let end = lit("V_Equals_End");
        let mut seen = Vec::new();
        render_conditional(
            "{{V_a_Equals_1_Start}}x{{V_Equals_End}}{{V_b_Equals_2_Start}}y{{V_Equals_End}}",
            &start,
            &end,
            |caps| {
                seen.push(caps.to_vec());
                true
            },
        );
        assert_eq!(
            seen,
            vec![
                vec!["a".to_string(), "1".to_string()],
                vec!["b".to_string(), "2".to_string()]
            ]
        );
    }

    #[test]
    fn test_unmatched_start_is_left_verbatim() {
        let (start, end) = (lit("C_Start"), lit("C_End"));
        let out = render_conditional("{{C_Start}}x", &start, &end, |_| false);
        assert_eq!(out, "{{C_Start}}x");
    }

    #[test]
    fn test_unmatched_start_does_not_block_later_blocks() {
        let start = Pattern::new("C_(.*)_Start").unwrap();
        let end = lit("C_End");
        // The first start pairs with the only end; the second stays dangling
        let out = render_conditional("{{C_a_Start}}x{{C_End}}{{C_b_Start}}y", &start, &end, |_| false);
        assert_eq!(out, "{{C_b_Start}}y");
    }

    #[test]
    fn test_list_expansion_order() {
        let (start, end) = (lit("L_Start"), lit("L_End"));
        let out = render_list("{{L_Start}}{{I}}:{{N}} {{L_End}}", &start, &end, &["A", "B", "C"], |item, pos, tpl| {
            tpl.replace("{{I}}", &pos.index.to_string()).replace("{{N}}", item)
        });
        assert_eq!(out, "0:A 1:B 2:C ");
    }

    #[test]
    fn test_list_positions() {
        let (start, end) = (lit("L_Start"), lit("L_End"));
        let mut positions = Vec::new();
        render_list("{{L_Start}}x{{L_End}}", &start, &end, &[1, 2, 3], |_, pos, _| {
            positions.push((pos.is_first, pos.is_last));
            String::new()
        });
        assert_eq!(positions, vec![(true, false), (false, false), (false, true)]);
    }

    #[test]
    fn test_list_on_own_lines() {
        let (start, end) = (lit("L_Start"), lit("L_End"));
        let text = "items = {\n{{L_Start}}\n  \"{{N}}\",\n{{L_End}}\n}\n";
        let out = render_list(text, &start, &end, &["a", "b"], |item, _, tpl| tpl.replace("{{N}}", item));
        assert_eq!(out, "items = {\n  \"a\",\n  \"b\",\n}\n");
    }

    #[test]
    fn test_empty_list_removes_block_lines() {
        let (start, end) = (lit("L_Start"), lit("L_End"));
        let text = "a\n{{L_Start}}\nx\n{{L_End}}\nb";
        let out = render_list::<&str, _>(text, &start, &end, &[], |_, _, tpl| tpl.to_string());
        assert_eq!(out, "a\nb");
    }

    #[test]
    fn test_block_cursor_supports_deferred_decisions() {
        let start = Pattern::new("C_(.*)_Start").unwrap();
        let end = lit("C_End");
        let mut cursor = BlockCursor::new("{{C_a_Start}}A{{C_End}}{{C_b_Start}}B{{C_End}}", &start, &end);
        let mut captured = Vec::new();
        while let Some(caps) = cursor.next_block() {
            captured.push(caps[0].clone());
            let keep = caps[0] == "b";
            cursor.keep(keep);
        }
        assert_eq!(captured, vec!["a", "b"]);
        assert_eq!(cursor.finish(), "B");
    }

    #[test]
    fn test_rewrite_prefix() {
        let out = rewrite_prefix(
            "{{Item_Name}} {{Item_Value_Price}} {{ItemCount}} {{Item}} Item_Name",
            "Item",
            "Inventory_Item",
        );
        assert_eq!(
            out,
            "{{Inventory_Item_Name}} {{Inventory_Item_Value_Price}} {{ItemCount}} {{Inventory_Item}} Item_Name"
        );
    }

    #[test]
    fn test_trim_blank_lines() {
        assert_eq!(trim_blank_lines("\n \na\n\nb\n\t\n"), "a\n\nb");
        assert_eq!(trim_blank_lines(" \n\n"), "");
    }

    #[test]
    fn test_join_list_items_keeps_final_newline() {
        let items = vec!["\n  a\n".to_string(), "  b\n".to_string()];
        assert_eq!(join_list_items(&items), "  a\n  b\n");
    }
}
