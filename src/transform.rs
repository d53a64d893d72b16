//! Docusaurus → Mintlify transformation over the parsed document tree.
//!
//! Work is split in two phases so content-addressed caching stays correct:
//!
//! - [`prepare`] depends only on the document bytes and run-wide options. It
//!   parses, validates admonitions, cleans link text and rewrites front
//!   matter. Its result is what the cache stores.
//! - [`render`] depends on the document path, version and product. It
//!   resolves links and serializes the target dialect. It is never cached.

use std::sync::LazyLock;

use regex::{Captures, Regex};

use crate::config::FrontMatterField;
use crate::markdown::{self, AdmonitionKind, Block, Document, FrontMatter, Inline, Link};
use crate::resolver::{self, LinkContext, Resolution};
use crate::types::{Issue, LinkKind, RenderedLink};

/// `class=` attribute in a tag.
static CLASS_ATTR: LazyLock<Regex> =
    LazyLock::new(|| return Regex::new(r"(\s)class=").expect("valid regex"));

/// `href="..."` attribute in a tag.
static HREF_ATTR: LazyLock<Regex> =
    LazyLock::new(|| return Regex::new(r#"(\shref=)(["'])([^"']*)(["'])"#).expect("valid regex"));

/// `src="..."` attribute in a tag.
static SRC_ATTR: LazyLock<Regex> =
    LazyLock::new(|| return Regex::new(r#"(\ssrc=)(["'])([^"']*)(["'])"#).expect("valid regex"));

/// `src={require('...').default}` in a JSX tag.
static SRC_REQUIRE: LazyLock<Regex> = LazyLock::new(|| {
    return Regex::new(r#"(\ssrc=)\{\s*require\(\s*["']([^"']+)["']\s*\)(?:\.default)?\s*\}"#).expect("valid regex");
});

/// HTML elements that must be self-closed in MDX.
const VOID_ELEMENTS: &[&str] = &[
    "area", "br", "col", "embed", "hr", "img", "input", "link", "meta", "source", "wbr",
];

/// Import sources that only exist inside a Docusaurus site.
const DOCUSAURUS_IMPORTS: &[&str] = &["@theme/", "@site/", "@docusaurus/", "@theme-original/"];

/// Content-dependent result of a document, as stored in the cache.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Prepared {
    /// The rewritten tree.
    pub document: Document,
    /// Issues raised while parsing and rewriting.
    pub issues: Vec<Issue>,
}

/// Final output of one document.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Rendered {
    /// Content and resolution issues, ordered by line.
    pub issues: Vec<Issue>,
    /// Internal document links, for link checking.
    pub links: Vec<RenderedLink>,
    /// Serialized target-dialect text.
    pub text: String,
}

// ── Serialization ─────────────────────────────────────────────────────

/// Serializes a prepared tree for one document location.
struct Renderer<'a, 'c> {
    /// Where the document lives, for link resolution.
    ctx: &'c LinkContext<'a>,
    /// Issues so far: prepared issues plus resolution warnings.
    issues: Vec<Issue>,
    /// Internal document links encountered.
    links: Vec<RenderedLink>,
    /// Output lines.
    out: Vec<String>,
}

impl Renderer<'_, '_> {
    /// Serialize a block list.
    fn blocks(&mut self, blocks: &[Block]) {
        for block in blocks {
            self.block(block);
        }
    }

    /// Serialize one block.
    fn block(&mut self, block: &Block) {
        match block {
            Block::Admonition { children, indent, kind, title, .. } => {
                let component = component_name(kind);
                self.out.push(format!("{indent}<{component}>"));
                if let Some(title) = title {
                    self.out.push(format!("{indent}**{title}**"));
                }
                self.blocks(children);
                self.out.push(format!("{indent}</{component}>"));
            },
            Block::Comment { lead, line, lines, tail, terminated } => {
                self.comment(lead, lines, tail, *terminated, *line);
            },
            Block::Definition { angle, head, line, tail, target } => {
                let resolved = self.resolve(target, false, *line);
                let resolved = if *angle { format!("<{resolved}>") } else { resolved };
                self.out.push(format!("{head}{resolved}{tail}"));
            },
            Block::Fence { lines } => self.out.extend(lines.iter().cloned()),
            Block::Line { inlines, line, .. } => {
                let mut text = String::new();
                self.inlines(inlines, *line, &mut text);
                self.out.push(text);
            },
        }
    }

    /// `<!--` … `-->` → `{/*` … `*/}` across lines. Text before the opener
    /// and after the closer is serialized as inline content.
    fn comment(&mut self, lead: &[Inline], lines: &[String], tail: &[Inline], terminated: bool, line: u32) {
        let last = lines.len().saturating_sub(1);
        for (idx, raw) in lines.iter().enumerate() {
            let mut text = String::new();
            if idx == 0 {
                self.inlines(lead, line, &mut text);
                text.push_str(&raw.replacen("<!--", "{/*", 1));
            } else {
                text.push_str(raw);
            }
            if idx == last {
                if terminated {
                    if let Some(pos) = text.rfind("-->") {
                        text.replace_range(pos..pos.saturating_add(3), "*/}");
                    }
                    self.inlines(tail, closer_line(line, lines), &mut text);
                } else {
                    text.push_str(" */}");
                }
            }
            self.out.push(text);
        }
    }

    /// Serialize inline nodes into `buf`.
    fn inlines(&mut self, inlines: &[Inline], line: u32, buf: &mut String) {
        for inline in inlines {
            match inline {
                Inline::Code(raw) | Inline::Text(raw) => buf.push_str(raw),
                Inline::Comment(inner) => {
                    buf.push_str("{/*");
                    buf.push_str(inner);
                    buf.push_str("*/}");
                },
                Inline::Link(link) => self.link(link, buf),
                Inline::Tag(raw) => {
                    let tag = self.tag(raw, line);
                    buf.push_str(&tag);
                },
            }
        }
    }

    /// Serialize a link with its target resolved.
    fn link(&mut self, link: &Link, buf: &mut String) {
        if link.image {
            buf.push('!');
        }
        buf.push('[');
        self.inlines(&link.children, link.line, buf);
        buf.push_str("](");
        let target = self.resolve(&link.target, link.image, link.line);
        if link.angle {
            buf.push('<');
            buf.push_str(&target);
            buf.push('>');
        } else {
            buf.push_str(&target);
        }
        buf.push_str(&link.title);
        buf.push(')');
    }

    /// Rewrite an HTML-ish tag for MDX.
    fn tag(&mut self, raw: &str, line: u32) -> String {
        let name: String = raw
            .trim_start_matches('<')
            .chars()
            .take_while(|c| return c.is_ascii_alphanumeric() || *c == '-')
            .collect::<String>()
            .to_ascii_lowercase();

        let mut tag = CLASS_ATTR.replace_all(raw, "${1}className=").into_owned();

        if name == "img" {
            tag = SRC_REQUIRE
                .replace_all(&tag, |caps: &Captures<'_>| {
                    let target = self.resolve(caps.get(2).map_or("", |m| return m.as_str()), true, line);
                    return format!("{}\"{target}\"", caps.get(1).map_or("", |m| return m.as_str()));
                })
                .into_owned();
            tag = SRC_ATTR
                .replace_all(&tag, |caps: &Captures<'_>| {
                    let target = self.resolve(caps.get(3).map_or("", |m| return m.as_str()), true, line);
                    let quote = caps.get(2).map_or("\"", |m| return m.as_str());
                    return format!("{}{quote}{target}{quote}", caps.get(1).map_or("", |m| return m.as_str()));
                })
                .into_owned();
        }

        if name == "a" {
            tag = HREF_ATTR
                .replace_all(&tag, |caps: &Captures<'_>| {
                    let target = self.resolve(caps.get(3).map_or("", |m| return m.as_str()), false, line);
                    let quote = caps.get(2).map_or("\"", |m| return m.as_str());
                    return format!("{}{quote}{target}{quote}", caps.get(1).map_or("", |m| return m.as_str()));
                })
                .into_owned();
        }

        let is_closing = raw.starts_with("</");
        if VOID_ELEMENTS.contains(&name.as_str()) && !is_closing && !tag.ends_with("/>") {
            let body = tag.strip_suffix('>').unwrap_or(&tag).trim_end();
            tag = format!("{body} />");
        }
        return tag;
    }

    /// Resolve a target, recording escapes and internal links.
    fn resolve(&mut self, target: &str, image: bool, line: u32) -> String {
        let kind = resolver::classify(target, image, self.ctx);
        let resolved = match resolver::resolve(target, image, self.ctx) {
            Resolution::Unchanged => target.to_string(),
            Resolution::Rewritten { escaped_root, target: rewritten } => {
                if escaped_root {
                    self.issues.push(
                        Issue::warning(line, format!("link `{target}` escapes the version root"))
                            .with_suggestion("check the number of `../` segments"),
                    );
                }
                rewritten
            },
        };
        if kind == LinkKind::Document {
            self.links.push(RenderedLink { line, target: resolved.clone() });
        }
        return resolved;
    }
}

/// Parse and apply the path-independent rewrites.
pub fn prepare(source: &str, front_matter: &[FrontMatterField]) -> Prepared {
    let (mut document, mut issues) = markdown::parse(source);

    check_blocks(&document.blocks, &mut issues);
    for_each_inline_mut(&mut document.blocks, &mut unwrap_code_link_text);
    if !front_matter.is_empty() {
        rewrite_front_matter(&mut document, front_matter, &mut issues);
    }

    issues.sort_by_key(|i| return i.line);
    return Prepared { document, issues };
}

/// Resolve links and serialize the target dialect.
pub fn render(prepared: &Prepared, ctx: &LinkContext<'_>) -> Rendered {
    let mut renderer = Renderer {
        ctx,
        issues: prepared.issues.clone(),
        links: Vec::new(),
        out: Vec::new(),
    };

    if let Some(front_matter) = &prepared.document.front_matter {
        renderer.out.push("---".to_string());
        renderer.out.extend(front_matter.lines.iter().cloned());
        renderer.out.push("---".to_string());
    }
    renderer.blocks(&prepared.document.blocks);

    let mut text = renderer.out.join("\n");
    if prepared.document.trailing_newline {
        text.push('\n');
    }
    let mut issues = renderer.issues;
    issues.sort_by_key(|i| return i.line);
    return Rendered { issues, links: renderer.links, text };
}

// ── Content checks ────────────────────────────────────────────────────

/// Walk blocks raising issues for constructs that need attention.
fn check_blocks(blocks: &[Block], issues: &mut Vec<Issue>) {
    for block in blocks {
        match block {
            Block::Admonition { children, kind, line, .. } => {
                if let AdmonitionKind::Unknown(tag) = kind {
                    issues.push(
                        Issue::warning(*line, format!("unknown admonition kind `{tag}`, emitted as <Callout>"))
                            .with_suggestion("use one of note, tip, info, warning, danger, caution"),
                    );
                }
                check_blocks(children, issues);
            },
            Block::Comment { lead, line, lines, tail, .. } => {
                if lines.iter().any(|l| return l.contains("*/")) {
                    issues.push(comment_terminator_issue(*line));
                }
                check_inlines(lead, *line, issues);
                check_inlines(tail, closer_line(*line, lines), issues);
            },
            Block::Line { inlines, line, raw } => {
                check_import(raw, *line, issues);
                check_inlines(inlines, *line, issues);
            },
            Block::Definition { .. } | Block::Fence { .. } => {},
        }
    }
}

/// Flag comments whose text would terminate the target comment early.
fn check_inlines(inlines: &[Inline], line: u32, issues: &mut Vec<Issue>) {
    for inline in inlines {
        match inline {
            Inline::Comment(inner) if inner.contains("*/") => issues.push(comment_terminator_issue(line)),
            Inline::Link(link) => check_inlines(&link.children, line, issues),
            _ => {},
        }
    }
}

/// A comment containing `*/` cannot be expressed as `{/* */}`.
fn comment_terminator_issue(line: u32) -> Issue {
    return Issue::error(line, "comment contains `*/` and cannot be converted")
        .with_suggestion("remove or reword the `*/` inside the comment");
}

/// Flag imports that only resolve inside a Docusaurus site.
fn check_import(raw: &str, line: u32, issues: &mut Vec<Issue>) {
    let trimmed = raw.trim_start();
    if !trimmed.starts_with("import ") {
        return;
    }
    if let Some(source) = DOCUSAURUS_IMPORTS.iter().find(|s| return trimmed.contains(**s)) {
        issues.push(
            Issue::error(line, format!("import from `{source}` is not available after migration"))
                .with_suggestion("replace the component with a target-renderer equivalent"),
        );
    }
}

// ── Tree rewrites ─────────────────────────────────────────────────────

/// Apply `f` to every inline node, links' children included.
fn for_each_inline_mut(blocks: &mut [Block], f: &mut impl FnMut(&mut Inline)) {
    for block in blocks {
        match block {
            Block::Admonition { children, .. } => for_each_inline_mut(children, f),
            Block::Comment { lead, tail, .. } => {
                visit_inlines_mut(lead, f);
                visit_inlines_mut(tail, f);
            },
            Block::Line { inlines, .. } => visit_inlines_mut(inlines, f),
            Block::Definition { .. } | Block::Fence { .. } => {},
        }
    }
}

/// Depth-first over inline nodes; children before their link.
fn visit_inlines_mut(inlines: &mut [Inline], f: &mut impl FnMut(&mut Inline)) {
    for inline in inlines {
        if let Inline::Link(link) = inline {
            visit_inlines_mut(&mut link.children, f);
        }
        f(inline);
    }
}

/// `` [`code`](url) `` → `[code](url)`.
fn unwrap_code_link_text(inline: &mut Inline) {
    let Inline::Link(link) = inline else {
        return;
    };
    if link.image {
        return;
    }
    let [Inline::Code(code)] = link.children.as_slice() else {
        return;
    };
    let inner = code.trim_matches('`');
    let inner = if inner.len() > 2 && inner.starts_with(' ') && inner.ends_with(' ') {
        inner.get(1..inner.len().saturating_sub(1)).unwrap_or(inner)
    } else {
        inner
    };
    let text = inner.to_string();
    link.children = vec![Inline::Text(text)];
}

/// Normalize requested front-matter fields to double-quoted strings, and
/// derive a missing title from the first `# ` heading.
fn rewrite_front_matter(document: &mut Document, fields: &[FrontMatterField], issues: &mut Vec<Issue>) {
    for field in fields {
        let key = match field {
            FrontMatterField::Description => "description",
            FrontMatterField::Title => "title",
        };
        let prefix = format!("{key}:");

        let existing = document
            .front_matter
            .as_mut()
            .and_then(|fm| return fm.lines.iter_mut().find(|l| return l.starts_with(&prefix)));
        if let Some(line) = existing {
            let value = line.get(prefix.len()..).unwrap_or_default().trim();
            if !value.is_empty() && !value.starts_with(['"', '\'', '|', '>']) {
                *line = format!("{key}: {}", quote_yaml(value));
            }
            continue;
        }

        if *field != FrontMatterField::Title {
            continue;
        }
        match first_heading(&document.blocks) {
            Some(heading) => {
                let title_line = format!("title: {}", quote_yaml(&heading));
                match document.front_matter.as_mut() {
                    Some(fm) => fm.lines.insert(0, title_line),
                    None => document.front_matter = Some(FrontMatter { lines: vec![title_line] }),
                }
            },
            None => issues.push(
                Issue::warning(1, "no `title` in front matter and no heading to derive one from")
                    .with_suggestion("add `title:` to the front matter"),
            ),
        }
    }
}

/// Text of the first top-level `# ` heading.
fn first_heading(blocks: &[Block]) -> Option<String> {
    return blocks.iter().find_map(|b| {
        let Block::Line { raw, .. } = b else {
            return None;
        };
        return raw.strip_prefix("# ").map(|h| return h.trim().to_string());
    });
}

/// Double-quote a YAML scalar.
fn quote_yaml(value: &str) -> String {
    let escaped = value.replace('\\', "\\\\").replace('"', "\\\"");
    return format!("\"{escaped}\"");
}

/// Line number of the last line of a comment opened on `line`.
fn closer_line(line: u32, lines: &[String]) -> u32 {
    let extra = u32::try_from(lines.len().saturating_sub(1)).unwrap_or(u32::MAX);
    return line.saturating_add(extra);
}

/// Target component for an admonition kind.
fn component_name(kind: &AdmonitionKind) -> &'static str {
    return match kind {
        AdmonitionKind::Caution => "Caution",
        AdmonitionKind::Danger => "Danger",
        AdmonitionKind::Info => "Info",
        AdmonitionKind::Note => "Note",
        AdmonitionKind::Tip => "Tip",
        AdmonitionKind::Unknown(_) => "Callout",
        AdmonitionKind::Warning => "Warning",
    };
}
