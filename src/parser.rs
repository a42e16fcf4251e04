use crate::ast::*;
use crate::error::SyntaxError;
use crate::grammar::{self, GrammarError};
use winnow::error::{ContextError, ErrMode};
use winnow::Parser;

const TAB_WIDTH: usize = 8;

/// A non-blank, non-comment source line.
#[derive(Debug, Clone, Copy)]
struct Line<'a> {
    no: usize,
    indent: usize,
    raw: &'a str,
    text: &'a str, // raw without surrounding whitespace
    start: usize,  // byte offset of `text` in `raw`
}

impl<'a> Line<'a> {
    /// 1-based column of a byte offset into `text`.
    fn column(&self, offset: usize) -> usize {
        let end = (self.start + offset).min(self.raw.len());
        self.raw.get(..end).map_or(end, |prefix| prefix.chars().count()) + 1
    }

    fn error(&self, offset: usize, expected: impl Into<String>) -> SyntaxError {
        let found = grammar::describe_found(self.text.get(offset..).unwrap_or_default());
        SyntaxError::new(self.no, self.column(offset), expected, found)
    }

    fn grammar_error(&self, offset: usize, err: GrammarError) -> SyntaxError {
        SyntaxError::new(
            self.no,
            self.column(offset + err.offset),
            err.expected,
            err.found,
        )
    }

    fn parse<O>(
        &self,
        offset: usize,
        parser: impl Parser<&'a str, O, ErrMode<ContextError>>,
    ) -> Result<O, SyntaxError> {
        let fragment = self.text.get(offset..).unwrap_or_default();
        grammar::run(parser, fragment).map_err(|err| self.grammar_error(offset, err))
    }
}

fn scan_lines(input: &str) -> Vec<Line<'_>> {
    let mut lines = Vec::new();

    for (idx, line) in input.lines().enumerate() {
        let mut raw = line;
        if idx == 0 {
            raw = raw.trim_start_matches('\u{feff}');
        }

        let text = raw.trim();
        if text.is_empty() || text.starts_with("//") {
            continue;
        }

        let start = raw.len() - raw.trim_start().len();
        let indent = raw[..start].chars().fold(0, |col, c| {
            if c == '\t' {
                (col / TAB_WIDTH + 1) * TAB_WIDTH
            } else {
                col + 1
            }
        });

        lines.push(Line {
            no: idx + 1,
            indent,
            raw,
            text,
            start,
        });
    }

    lines
}

struct Cursor<'a> {
    lines: Vec<Line<'a>>,
    pos: usize,
}

impl<'a> Cursor<'a> {
    fn peek(&self) -> Option<Line<'a>> {
        self.lines.get(self.pos).copied()
    }

    fn advance(&mut self) {
        self.pos += 1;
    }

    fn next_line(&mut self) -> Result<Line<'a>, SyntaxError> {
        let line = self.peek().ok_or_else(|| self.end_of_input("another line"))?;
        self.advance();
        Ok(line)
    }

    fn end_of_input(&self, expected: impl Into<String>) -> SyntaxError {
        let (line, column) = self
            .lines
            .last()
            .map_or((1, 1), |last| (last.no, last.column(last.text.len())));
        SyntaxError::new(line, column, expected, "end of input")
    }
}

/// Columns of the blocks currently open, innermost last. Starts with the
/// sentinel column 0 that top-level dialogs sit on.
#[derive(Debug)]
struct IndentStack(Vec<usize>);

impl IndentStack {
    fn new() -> Self {
        Self(vec![0])
    }

    fn current(&self) -> usize {
        self.0.last().copied().unwrap_or(0)
    }

    fn push(&mut self, level: usize) {
        self.0.push(level);
    }

    fn pop(&mut self) {
        self.0.pop();
    }
}

type BlockItem<'a> = fn(&mut Cursor<'a>, &mut IndentStack) -> Result<Node, SyntaxError>;

pub fn parse(input: &str) -> Result<Vec<Dialog>, SyntaxError> {
    let mut cursor = Cursor {
        lines: scan_lines(input),
        pos: 0,
    };
    let mut indents = IndentStack::new();
    let mut dialogs = Vec::new();

    while let Some(line) = cursor.peek() {
        if line.indent != indents.current() {
            return Err(line.error(0, "`begin` at the start of the line"));
        }
        dialogs.push(parse_dialog(&mut cursor, &mut indents)?);
    }

    Ok(dialogs)
}

/// Parses the lines nested under the construct that owns the current
/// indentation level. The block opens only if the next line is strictly
/// deeper; its first line fixes the level every item must sit on.
fn indented_block<'a>(
    cursor: &mut Cursor<'a>,
    indents: &mut IndentStack,
    item: BlockItem<'a>,
) -> Result<Vec<Node>, SyntaxError> {
    let level = match cursor.peek() {
        Some(line) if line.indent > indents.current() => line.indent,
        _ => return Ok(Vec::new()),
    };

    indents.push(level);
    let mut items = Vec::new();
    while let Some(line) = cursor.peek() {
        if line.indent < level {
            break;
        }
        if line.indent > level {
            return Err(line.error(
                0,
                format!("a line indented to column {} or less", level + 1),
            ));
        }
        items.push(item(cursor, indents)?);
    }
    indents.pop();

    Ok(items)
}

fn parse_dialog(cursor: &mut Cursor<'_>, indents: &mut IndentStack) -> Result<Dialog, SyntaxError> {
    let header = cursor.next_line()?;
    let (name, extends) = header.parse(0, grammar::dialog_header)?;

    let children = indented_block(cursor, indents, parse_response)?;

    let expected = format!("`end` closing dialog `{}`", name);
    match cursor.peek() {
        Some(line) if line.indent == header.indent && line.text == "end" => cursor.advance(),
        Some(line) => return Err(line.error(0, expected)),
        None => return Err(cursor.end_of_input(expected)),
    }

    Ok(Dialog {
        name,
        extends,
        line_no: header.no,
        children,
    })
}

fn parse_response(cursor: &mut Cursor<'_>, indents: &mut IndentStack) -> Result<Node, SyntaxError> {
    let line = cursor.next_line()?;
    if line.text.starts_with('~') {
        return Err(line.error(
            0,
            "response text (options must be indented deeper than their response)",
        ));
    }

    let condition = match cursor.peek() {
        Some(next) if grammar::is_condition_line(next.text) => {
            match next.parse(0, grammar::if_statement) {
                Ok(statement) => {
                    cursor.advance();
                    Some(Box::new(Node::IfStatement(statement)))
                }
                // Not nested under this response: free text for the enclosing block.
                Err(_) if next.indent <= line.indent => None,
                Err(err) => return Err(err),
            }
        }
        _ => None,
    };

    let children = indented_block(cursor, indents, parse_option)?;

    Ok(Node::Response(Response {
        text: line.text.to_string(),
        condition,
        line_no: line.no,
        children,
    }))
}

fn parse_option(cursor: &mut Cursor<'_>, indents: &mut IndentStack) -> Result<Node, SyntaxError> {
    let line = cursor.next_line()?;
    let Some(body) = line.text.strip_prefix('~') else {
        return Err(line.error(0, "an option starting with `~`"));
    };

    // Clauses after the first `->` are events only if they parse; otherwise
    // the arrow is part of the label.
    let mut text = body.trim();
    let mut events = Vec::new();
    let mut continued_from = None;
    if let Some(at) = body.find("->") {
        // `line.text` has the `~` at 0.
        if let Ok((parsed, continues)) = line.parse(at + 1, grammar::event_line) {
            text = body[..at].trim();
            events.extend(parsed);
            continued_from = continues.then_some(line);
        }
    }
    if text.is_empty() {
        return Err(line.error(1, "option text after `~`"));
    }

    while let Some(next) = cursor.peek() {
        if !next.text.starts_with("->") {
            break;
        }
        let (parsed, continues) = match next.parse(0, grammar::event_line) {
            Ok(clauses) => clauses,
            // Not nested under this option: free text for the enclosing block.
            Err(_) if next.indent <= line.indent && continued_from.is_none() => break,
            Err(err) => return Err(err),
        };
        if !events.is_empty() && continued_from.is_none() {
            return Err(next.error(0, "a `,` after the previous event clause"));
        }
        cursor.advance();
        events.extend(parsed);
        continued_from = continues.then_some(next);
    }

    if let Some(last) = continued_from {
        return Err(last.error(last.text.len(), "another event clause after `,`"));
    }

    let children = indented_block(cursor, indents, parse_response)?;

    Ok(Node::Option(DialogOption {
        text: text.to_string(),
        events: events.into_iter().map(Node::Event).collect(),
        line_no: line.no,
        children,
    }))
}
