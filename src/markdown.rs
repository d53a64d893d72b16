//! Structural parse of a Docusaurus markdown document.
//!
//! The document becomes a tree of front matter, blocks and inline nodes.
//! Fenced code is located with the tree-sitter Markdown grammar and kept
//! verbatim; everything else is split into admonition containers, comment
//! blocks, link definitions and lines of inline nodes. Nothing here rewrites
//! content: see `transform` for that.

use std::sync::LazyLock;

use regex::Regex;
use tree_sitter::{Language, Node, Parser};

use crate::types::Issue;

/// Matches a link reference definition: `[label]: target rest`.
static DEFINITION: LazyLock<Regex> = LazyLock::new(|| {
    return Regex::new(r"^(\s{0,3}\[)([^\]^][^\]]*)(\]:\s*)(<[^>]*>|\S+)(.*)$").expect("valid regex");
});

/// A parsed document.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Document {
    /// Top-level blocks of the body.
    pub blocks: Vec<Block>,
    /// Front matter between `---` delimiters, if present and terminated.
    pub front_matter: Option<FrontMatter>,
    /// Whether the source ended with a newline.
    pub trailing_newline: bool,
}

/// Raw front matter lines, delimiters excluded.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FrontMatter {
    /// Lines between the opening and closing `---`.
    pub lines: Vec<String>,
}

/// Admonition kinds understood by the target renderer.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AdmonitionKind {
    /// `:::caution`
    Caution,
    /// `:::danger`
    Danger,
    /// `:::info`
    Info,
    /// `:::note`
    Note,
    /// `:::tip`
    Tip,
    /// Anything else, kept for diagnostics.
    Unknown(String),
    /// `:::warning`
    Warning,
}

impl AdmonitionKind {
    /// Parse an admonition tag, case-insensitively.
    pub fn parse(tag: &str) -> Self {
        return match tag.to_ascii_lowercase().as_str() {
            "caution" => Self::Caution,
            "danger" => Self::Danger,
            "info" => Self::Info,
            "note" => Self::Note,
            "tip" => Self::Tip,
            "warning" => Self::Warning,
            _ => Self::Unknown(tag.to_string()),
        };
    }
}

/// A block-level node.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Block {
    /// `:::kind` container.
    Admonition {
        /// Child blocks between the opener and closer.
        children: Vec<Block>,
        /// Whether a closing `:::` was found.
        closed: bool,
        /// Leading whitespace of the opener line.
        indent: String,
        /// Parsed kind.
        kind: AdmonitionKind,
        /// One-based line of the opener.
        line: u32,
        /// Optional title after the kind.
        title: Option<String>,
    },
    /// Multi-line `<!-- ... -->` comment. `lines` runs from `<!--` through
    /// `-->`; text sharing the opener or closer line sits in `lead`/`tail`.
    Comment {
        /// Inline nodes before `<!--` on the opener line.
        lead: Vec<Inline>,
        /// One-based line of the opener.
        line: u32,
        /// Raw comment lines, delimiters included.
        lines: Vec<String>,
        /// Inline nodes after `-->` on the closer line.
        tail: Vec<Inline>,
        /// Whether the closing `-->` was found.
        terminated: bool,
    },
    /// Link reference definition `[label]: target`.
    Definition {
        /// Whether the target was wrapped in `<>`.
        angle: bool,
        /// Text before the target, e.g. `[label]: `.
        head: String,
        /// One-based line number.
        line: u32,
        /// Text after the target (title).
        tail: String,
        /// Target as written, angle brackets stripped.
        target: String,
    },
    /// Fenced code, kept verbatim.
    Fence {
        /// Raw lines including the fence delimiters.
        lines: Vec<String>,
    },
    /// Any other line, split into inline nodes.
    Line {
        /// Inline nodes of the line.
        inlines: Vec<Inline>,
        /// One-based line number.
        line: u32,
        /// The line as written.
        raw: String,
    },
}

/// An inline node within a line.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Inline {
    /// Inline code span including its backticks.
    Code(String),
    /// `<!-- ... -->` on one line; holds the text between the delimiters.
    Comment(String),
    /// `[text](target)` or `![alt](src)`.
    Link(Link),
    /// An HTML or JSX tag on one line, raw.
    Tag(String),
    /// Plain text.
    Text(String),
}

/// An inline link or image.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Link {
    /// Whether the target was wrapped in `<>`.
    pub angle: bool,
    /// Inline nodes of the link text.
    pub children: Vec<Inline>,
    /// Whether written with image syntax.
    pub image: bool,
    /// One-based line number.
    pub line: u32,
    /// Target as written, angle brackets stripped.
    pub target: String,
    /// Raw text between the target and the closing parenthesis.
    pub title: String,
}

/// Contiguous rows covered by one fenced code block.
struct FenceSpan {
    /// Zero-based first row.
    first: usize,
    /// Zero-based last row, inclusive.
    last: usize,
    /// Whether a closing delimiter was found.
    terminated: bool,
}

/// A multi-line comment being collected.
struct OpenComment {
    /// Inline nodes before `<!--`.
    lead: Vec<Inline>,
    /// One-based opener line.
    line: u32,
    /// Raw lines from `<!--` on.
    lines: Vec<String>,
}

/// An admonition being collected.
struct Frame {
    /// Blocks collected so far.
    children: Vec<Block>,
    /// Leading whitespace of the opener.
    indent: String,
    /// Parsed kind.
    kind: AdmonitionKind,
    /// One-based opener line.
    line: u32,
    /// Optional title.
    title: Option<String>,
}

/// Parse a whole document. Never fails: structural problems become issues
/// and the best-effort tree is returned.
pub fn parse(source: &str) -> (Document, Vec<Issue>) {
    let mut issues = Vec::new();
    let lines: Vec<&str> = source.lines().collect();

    let (front_matter, body_start) = split_front_matter(&lines, &mut issues);
    let body_lines = lines.get(body_start..).unwrap_or_default();
    let body = body_lines.join("\n");

    let fences = fence_spans(&body).unwrap_or_else(|reason| {
        issues.push(Issue::error(1, format!("markdown parse failed: {reason}")));
        return Vec::new();
    });

    let offset = u32::try_from(body_start).unwrap_or(u32::MAX);
    let blocks = build_blocks(body_lines, &fences, offset, &mut issues);

    let document = Document {
        blocks,
        front_matter,
        trailing_newline: source.ends_with('\n'),
    };
    return (document, issues);
}

/// Split off a `---` delimited front matter block. Returns the block and the
/// index of the first body line.
fn split_front_matter(lines: &[&str], issues: &mut Vec<Issue>) -> (Option<FrontMatter>, usize) {
    if lines.first().map(|l| return l.trim_end()) != Some("---") {
        return (None, 0);
    }
    let close = lines
        .iter()
        .enumerate()
        .skip(1)
        .find(|(_, l)| return l.trim_end() == "---")
        .map(|(i, _)| return i);
    let Some(close) = close else {
        issues.push(
            Issue::error(1, "front matter is never closed")
                .with_suggestion("add a closing `---` line after the metadata"),
        );
        return (None, 0);
    };
    let inner = lines
        .get(1..close)
        .unwrap_or_default()
        .iter()
        .map(|l| return (*l).to_string())
        .collect();
    return (Some(FrontMatter { lines: inner }), close.saturating_add(1));
}

/// Locate fenced code blocks with the tree-sitter Markdown block grammar.
fn fence_spans(body: &str) -> Result<Vec<FenceSpan>, String> {
    let language: Language = tree_sitter_md::LANGUAGE.into();
    let mut parser = Parser::new();
    parser.set_language(&language).map_err(|e| return e.to_string())?;
    let tree = parser
        .parse(body, None)
        .ok_or_else(|| return "tree-sitter returned None".to_string())?;

    let mut spans = Vec::new();
    collect_fences(tree.root_node(), &mut spans);
    spans.sort_by_key(|s| return s.first);
    return Ok(spans);
}

/// Recursively collect `fenced_code_block` nodes.
fn collect_fences(node: Node<'_>, spans: &mut Vec<FenceSpan>) {
    if node.kind() == "fenced_code_block" {
        let start = node.start_position();
        let end = node.end_position();
        // A block that swallowed its trailing newline ends at column 0 of the next row.
        let last = if end.column == 0 && end.row > start.row { end.row.saturating_sub(1) } else { end.row };
        let mut cursor = node.walk();
        let delimiters = node
            .children(&mut cursor)
            .filter(|c| return c.kind() == "fenced_code_block_delimiter")
            .count();
        spans.push(FenceSpan { first: start.row, last, terminated: delimiters >= 2 });
        return;
    }

    let mut cursor = node.walk();
    for child in node.children(&mut cursor) {
        collect_fences(child, spans);
    }
}

/// Build the block tree from body lines.
fn build_blocks(lines: &[&str], fences: &[FenceSpan], offset: u32, issues: &mut Vec<Issue>) -> Vec<Block> {
    let mut root: Vec<Block> = Vec::new();
    let mut stack: Vec<Frame> = Vec::new();
    let mut comment: Option<OpenComment> = None;
    let mut row = 0_usize;

    while let Some(&text) = lines.get(row) {
        let line = line_number(offset, row);

        if let Some(span) = fences.iter().find(|s| return s.first == row) {
            if !span.terminated {
                issues.push(
                    Issue::error(line, "code fence is never closed")
                        .with_suggestion("close the fence with a matching ``` line"),
                );
            }
            let last = span.last.min(lines.len().saturating_sub(1)).max(row);
            let fence_lines = lines
                .get(row..=last)
                .unwrap_or_default()
                .iter()
                .map(|l| return (*l).to_string())
                .collect();
            push_block(&mut stack, &mut root, Block::Fence { lines: fence_lines });
            row = last.saturating_add(1);
            continue;
        }

        if let Some(mut open) = comment.take() {
            if let Some(end) = text.find("-->") {
                let close = end.saturating_add(3);
                open.lines.push(text.get(..close).unwrap_or(text).to_string());
                let tail = parse_inlines(text.get(close..).unwrap_or_default(), line, issues);
                push_block(&mut stack, &mut root, Block::Comment {
                    lead: open.lead,
                    line: open.line,
                    lines: open.lines,
                    tail,
                    terminated: true,
                });
            } else {
                open.lines.push(text.to_string());
                comment = Some(open);
            }
        } else if let Some((indent, kind, title)) = parse_admonition_open(text) {
            stack.push(Frame { children: Vec::new(), indent, kind, line, title });
        } else if is_admonition_close(text) {
            if let Some(frame) = stack.pop() {
                push_block(&mut stack, &mut root, close_frame(frame, true));
            } else {
                issues.push(
                    Issue::error(line, "closing `:::` without an open admonition")
                        .with_suggestion("remove the stray `:::` or add the missing opener"),
                );
                push_block(&mut stack, &mut root, plain_line(text, line, issues));
            }
        } else if let Some(start) = block_comment_start(text) {
            let (before, opener) = text.split_at(start);
            comment = Some(OpenComment {
                lead: parse_inlines(before, line, issues),
                line,
                lines: vec![opener.to_string()],
            });
        } else if let Some(definition) = parse_definition(text, line) {
            push_block(&mut stack, &mut root, definition);
        } else {
            push_block(&mut stack, &mut root, plain_line(text, line, issues));
        }

        row = row.saturating_add(1);
    }

    if let Some(open) = comment {
        issues.push(
            Issue::error(open.line, "HTML comment is never closed")
                .with_suggestion("add the closing `-->`"),
        );
        push_block(&mut stack, &mut root, Block::Comment {
            lead: open.lead,
            line: open.line,
            lines: open.lines,
            tail: Vec::new(),
            terminated: false,
        });
    }

    while let Some(frame) = stack.pop() {
        issues.push(
            Issue::error(frame.line, "admonition is never closed")
                .with_suggestion("add a closing `:::` line"),
        );
        let block = close_frame(frame, false);
        push_block(&mut stack, &mut root, block);
    }

    return root;
}

/// One-based line number of a body row.
fn line_number(offset: u32, row: usize) -> u32 {
    return offset
        .saturating_add(u32::try_from(row).unwrap_or(u32::MAX))
        .saturating_add(1);
}

/// Append to the innermost open admonition, or to the root.
fn push_block(stack: &mut [Frame], root: &mut Vec<Block>, block: Block) {
    if let Some(frame) = stack.last_mut() {
        frame.children.push(block);
        return;
    }
    root.push(block);
}

/// Turn a finished frame into a block.
fn close_frame(frame: Frame, closed: bool) -> Block {
    return Block::Admonition {
        children: frame.children,
        closed,
        indent: frame.indent,
        kind: frame.kind,
        line: frame.line,
        title: frame.title,
    };
}

/// A line of inline content.
fn plain_line(text: &str, line: u32, issues: &mut Vec<Issue>) -> Block {
    return Block::Line {
        inlines: parse_inlines(text, line, issues),
        line,
        raw: text.to_string(),
    };
}

/// Parse `:::kind`, `:::kind Title` or `:::kind[Title]`.
fn parse_admonition_open(text: &str) -> Option<(String, AdmonitionKind, Option<String>)> {
    let trimmed = text.trim_start();
    let indent = text.get(..text.len().saturating_sub(trimmed.len())).unwrap_or_default();
    let colons = trimmed.bytes().take_while(|b| return *b == b':').count();
    if colons < 3 {
        return None;
    }
    let rest = trimmed.get(colons..)?;
    let tag_len = rest
        .bytes()
        .take_while(|b| return b.is_ascii_alphanumeric() || *b == b'-' || *b == b'_')
        .count();
    if tag_len == 0 {
        return None;
    }
    let (tag, after) = rest.split_at(tag_len);
    let after = after.trim();
    let title = if let Some(bracketed) = after.strip_prefix('[').and_then(|a| return a.strip_suffix(']')) {
        Some(bracketed.trim().to_string())
    } else if after.is_empty() {
        None
    } else {
        Some(after.to_string())
    };
    return Some((indent.to_string(), AdmonitionKind::parse(tag), title.filter(|t| return !t.is_empty())));
}

/// A line made only of three or more colons.
fn is_admonition_close(text: &str) -> bool {
    let trimmed = text.trim();
    return trimmed.len() >= 3 && trimmed.bytes().all(|b| return b == b':');
}

/// Byte index of a `<!--` outside code spans that is not closed on the
/// same line.
fn block_comment_start(text: &str) -> Option<usize> {
    let mut pos = 0_usize;
    while let Some(rest) = text.get(pos..) {
        let ch = rest.chars().next()?;
        if ch == '`' {
            let run = rest.bytes().take_while(|b| return *b == b'`').count();
            pos = pos.saturating_add(code_span_len(rest).unwrap_or(run));
            continue;
        }
        if let Some(after) = rest.strip_prefix("<!--") {
            let Some(end) = after.find("-->") else {
                return Some(pos);
            };
            pos = pos.saturating_add(end).saturating_add(7);
            continue;
        }
        pos = pos.saturating_add(ch.len_utf8());
    }
    return None;
}

/// Parse a link reference definition line.
fn parse_definition(text: &str, line: u32) -> Option<Block> {
    let caps = DEFINITION.captures(text)?;
    let head = format!("{}{}{}", caps.get(1)?.as_str(), caps.get(2)?.as_str(), caps.get(3)?.as_str());
    let raw_target = caps.get(4)?.as_str();
    // `[Note]: some prose` is text, not a definition.
    if !raw_target.starts_with('<') && !raw_target.contains(['/', '.', '#']) {
        return None;
    }
    let (target, angle) = raw_target
        .strip_prefix('<')
        .and_then(|t| return t.strip_suffix('>'))
        .map_or_else(|| return (raw_target.to_string(), false), |inner| return (inner.to_string(), true));
    return Some(Block::Definition {
        angle,
        head,
        line,
        tail: caps.get(5).map_or("", |m| return m.as_str()).to_string(),
        target,
    });
}

/// Split a line of text into inline nodes.
pub fn parse_inlines(text: &str, line: u32, issues: &mut Vec<Issue>) -> Vec<Inline> {
    let mut out = Vec::new();
    let mut plain = String::new();
    let mut pos = 0_usize;

    while let Some(rest) = text.get(pos..) {
        let Some(ch) = rest.chars().next() else {
            break;
        };

        if ch == '\\' {
            let escaped_len = rest.chars().take(2).map(char::len_utf8).sum::<usize>();
            plain.push_str(rest.get(..escaped_len).unwrap_or(rest));
            pos = pos.saturating_add(escaped_len);
            continue;
        }

        if ch == '`' {
            let run = rest.bytes().take_while(|b| return *b == b'`').count();
            match code_span_len(rest) {
                Some(len) => {
                    flush_text(&mut plain, &mut out);
                    out.push(Inline::Code(rest.get(..len).unwrap_or(rest).to_string()));
                    pos = pos.saturating_add(len);
                },
                None => {
                    plain.push_str(rest.get(..run).unwrap_or(rest));
                    pos = pos.saturating_add(run);
                },
            }
            continue;
        }

        if let Some((node, len)) = scan_special(rest, line, issues) {
            flush_text(&mut plain, &mut out);
            out.push(node);
            pos = pos.saturating_add(len);
            continue;
        }

        plain.push(ch);
        pos = pos.saturating_add(ch.len_utf8());
    }

    flush_text(&mut plain, &mut out);
    return out;
}

/// Move accumulated plain text into the output.
fn flush_text(plain: &mut String, out: &mut Vec<Inline>) {
    if !plain.is_empty() {
        out.push(Inline::Text(std::mem::take(plain)));
    }
}

/// Try comments, tags and links at the start of `rest`.
fn scan_special(rest: &str, line: u32, issues: &mut Vec<Issue>) -> Option<(Inline, usize)> {
    if let Some(after) = rest.strip_prefix("<!--") {
        if let Some(end) = after.find("-->") {
            return Some((Inline::Comment(after.get(..end)?.to_string()), end.saturating_add(7)));
        }
        issues.push(
            Issue::error(line, "HTML comment is never closed")
                .with_suggestion("add the closing `-->`"),
        );
        return Some((Inline::Text(rest.to_string()), rest.len()));
    }
    if rest.starts_with('<') {
        return tag_len(rest).map(|len| return (Inline::Tag(rest.get(..len).unwrap_or(rest).to_string()), len));
    }
    if let Some(after_bang) = rest.strip_prefix('!')
        && after_bang.starts_with('[')
    {
        let (link, len) = parse_link(after_bang, true, line, issues)?;
        return Some((Inline::Link(link), len.saturating_add(1)));
    }
    if rest.starts_with('[') {
        let (link, len) = parse_link(rest, false, line, issues)?;
        return Some((Inline::Link(link), len));
    }
    return None;
}

/// Length of a code span starting at `rest`, if it is closed on this line.
fn code_span_len(rest: &str) -> Option<usize> {
    let run = rest.bytes().take_while(|b| return *b == b'`').count();
    let bytes = rest.as_bytes();
    let mut idx = run;
    while idx < bytes.len() {
        if bytes.get(idx) == Some(&b'`') {
            let close = bytes.get(idx..)?.iter().take_while(|b| return **b == b'`').count();
            if close == run {
                return Some(idx.saturating_add(close));
            }
            idx = idx.saturating_add(close);
        } else {
            idx = idx.saturating_add(1);
        }
    }
    return None;
}

/// Length of an HTML/JSX tag starting at `rest`, if it closes on this line.
/// Quoted attribute values and `{...}` expressions may contain `>`.
fn tag_len(rest: &str) -> Option<usize> {
    let after_lt = rest.get(1..)?;
    let name_start = after_lt.strip_prefix('/').unwrap_or(after_lt);
    let mut name_chars = name_start.chars();
    if !name_chars.next().is_some_and(|c| return c.is_ascii_alphabetic()) {
        return None;
    }
    let name_len = name_start
        .bytes()
        .take_while(|b| return b.is_ascii_alphanumeric() || matches!(b, b'-' | b'.' | b'_'))
        .count();
    let boundary = name_start.as_bytes().get(name_len).copied();
    if !matches!(boundary, Some(b' ' | b'\t' | b'/' | b'>')) {
        return None;
    }

    let mut quote: Option<u8> = None;
    let mut braces = 0_usize;
    for (idx, b) in rest.bytes().enumerate().skip(1) {
        match (quote, b) {
            (Some(q), _) if b == q => quote = None,
            (Some(_), _) => {},
            (None, b'"' | b'\'') => quote = Some(b),
            (None, b'{') => braces = braces.saturating_add(1),
            (None, b'}') => braces = braces.saturating_sub(1),
            (None, b'>') if braces == 0 => return Some(idx.saturating_add(1)),
            (None, _) => {},
        }
    }
    return None;
}

/// Byte index of the `]` matching the `[` at the start of `text`.
fn bracket_end(text: &str) -> Option<usize> {
    let bytes = text.as_bytes();
    let mut depth = 0_usize;
    let mut idx = 0_usize;
    while let Some(&b) = bytes.get(idx) {
        match b {
            b'\\' => idx = idx.saturating_add(1),
            b'`' => {
                let rest = text.get(idx..)?;
                if let Some(len) = code_span_len(rest) {
                    idx = idx.saturating_add(len);
                    continue;
                }
            },
            b'[' => depth = depth.saturating_add(1),
            b']' => {
                depth = depth.saturating_sub(1);
                if depth == 0 {
                    return Some(idx);
                }
            },
            _ => {},
        }
        idx = idx.saturating_add(1);
    }
    return None;
}

/// Parse `[text](target "title")` at the start of `text`. Returns the link
/// and the number of bytes consumed.
fn parse_link(text: &str, image: bool, line: u32, issues: &mut Vec<Issue>) -> Option<(Link, usize)> {
    let close = bracket_end(text)?;
    let inner = text.get(1..close)?;
    let after = text.get(close.saturating_add(1)..)?;
    let destination = after.strip_prefix('(')?;

    let leading_ws = destination.len().saturating_sub(destination.trim_start().len());
    let dest = destination.get(leading_ws..)?;
    let (target, angle, target_len) = if let Some(angled) = dest.strip_prefix('<') {
        let end = angled.find('>')?;
        (angled.get(..end)?.to_string(), true, end.saturating_add(2))
    } else {
        let len = destination_len(dest);
        (dest.get(..len)?.to_string(), false, len)
    };

    let after_target = dest.get(target_len..)?;
    let title_len = title_len(after_target)?;
    let title = after_target.get(..title_len)?.to_string();

    let consumed = close
        .saturating_add(2)
        .saturating_add(leading_ws)
        .saturating_add(target_len)
        .saturating_add(title_len)
        .saturating_add(1);

    let link = Link {
        angle,
        children: parse_inlines(inner, line, issues),
        image,
        line,
        target,
        title,
    };
    return Some((link, consumed));
}

/// Length of an unbracketed link destination: up to whitespace or the
/// unbalanced `)`.
fn destination_len(dest: &str) -> usize {
    let mut depth = 0_usize;
    for (idx, ch) in dest.char_indices() {
        match ch {
            '(' => depth = depth.saturating_add(1),
            ')' if depth == 0 => return idx,
            ')' => depth = depth.saturating_sub(1),
            c if c.is_whitespace() => return idx,
            _ => {},
        }
    }
    return dest.len();
}

/// Length of the optional title before the closing `)`.
fn title_len(after_target: &str) -> Option<usize> {
    let mut quote: Option<char> = None;
    for (idx, ch) in after_target.char_indices() {
        match (quote, ch) {
            (Some(q), c) if c == q => quote = None,
            (Some(_), _) => {},
            (None, '"' | '\'') => quote = Some(ch),
            (None, ')') => return Some(idx),
            (None, _) => {},
        }
    }
    return None;
}
