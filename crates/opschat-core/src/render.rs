//! Agent reply rendering
//!
//! Turns the plain-text replies of the agent into structured markup. The
//! rewrite happens as a fixed sequence of pure steps:
//!
//! 1. `1) Title` lines become section headers
//! 2. `-`/`•` lines become list items, contiguous items share one list
//! 3. `` `code` `` spans
//! 4. `**bold**` spans
//! 5. bare `http(s)://` links
//! 6. line breaks between the remaining lines
//!
//! Inline steps only ever split [`Inline::Text`] segments, so the content of
//! a code span is never rescanned. Bold is the one container: it may enclose
//! code spans found earlier, and links are still found inside it.

use regex::{Captures, Regex};
use std::iter::Peekable;
use std::ops::Range;
use std::sync::OnceLock;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Inline {
    Text(String),
    Code(String),
    Bold(Vec<Inline>),
    /// Opens in a new browser context when emitted as HTML.
    Link(String),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Block {
    Header(Vec<Inline>),
    List(Vec<Vec<Inline>>),
    Line(Vec<Inline>),
    Break,
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Markup {
    pub blocks: Vec<Block>,
}

/// Line classification before list grouping.
#[derive(Debug, PartialEq, Eq)]
enum Segment {
    Header(String),
    Item(String),
    Line(String),
}

type InlineStep = fn(Vec<Inline>) -> Vec<Inline>;

const INLINE_STEPS: [InlineStep; 3] = [code_spans, bold_spans, links];

/// Stand-in for a non-text inline while bold markers are matched. Anything
/// but `*` works, since bold content may not contain one.
const OPAQUE: char = '\u{FFFC}';

fn header_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"^(\d+\))\s+(.+)$").expect("valid header pattern"))
}

fn item_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"^[-•]\s+(.+)$").expect("valid list item pattern"))
}

fn code_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"`([^`]+)`").expect("valid code pattern"))
}

fn bold_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"\*\*([^*]+)\*\*").expect("valid bold pattern"))
}

fn link_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"https?://\S+").expect("valid link pattern"))
}

/// Render a reply. Never fails: text that matches no rule comes through as-is.
pub fn render(text: &str) -> Markup {
    let mut blocks = group_list_items(classify_lines(text));
    for step in INLINE_STEPS {
        blocks = map_inlines(blocks, step);
    }
    Markup {
        blocks: insert_line_breaks(blocks),
    }
}

fn classify_lines(text: &str) -> Vec<Segment> {
    text.split('\n')
        .map(|line| line.strip_suffix('\r').unwrap_or(line))
        .map(|line| {
            if let Some(caps) = header_re().captures(line) {
                Segment::Header(format!("{} {}", &caps[1], &caps[2]))
            } else if let Some(caps) = item_re().captures(line) {
                Segment::Item(caps[1].to_string())
            } else {
                Segment::Line(line.to_string())
            }
        })
        .collect()
}

fn group_list_items(segments: Vec<Segment>) -> Vec<Block> {
    let mut blocks = Vec::new();

    for segment in segments {
        match segment {
            Segment::Header(text) => blocks.push(Block::Header(vec![Inline::Text(text)])),
            Segment::Line(text) => blocks.push(Block::Line(vec![Inline::Text(text)])),
            Segment::Item(text) => {
                let item = vec![Inline::Text(text)];
                match blocks.last_mut() {
                    Some(Block::List(items)) => items.push(item),
                    _ => blocks.push(Block::List(vec![item])),
                }
            }
        }
    }

    blocks
}

fn map_inlines(blocks: Vec<Block>, step: InlineStep) -> Vec<Block> {
    blocks
        .into_iter()
        .map(|block| match block {
            Block::Header(inlines) => Block::Header(step(inlines)),
            Block::Line(inlines) => Block::Line(step(inlines)),
            Block::List(items) => Block::List(items.into_iter().map(step).collect()),
            Block::Break => Block::Break,
        })
        .collect()
}

/// Split every plain-text segment around matches of `re`, turning each match
/// into the inline produced by `make`.
fn split_text(inlines: Vec<Inline>, re: &Regex, make: fn(&Captures) -> Inline) -> Vec<Inline> {
    let mut out = Vec::with_capacity(inlines.len());

    for inline in inlines {
        let text = match inline {
            Inline::Text(text) => text,
            Inline::Bold(children) => {
                out.push(Inline::Bold(split_text(children, re, make)));
                continue;
            }
            other => {
                out.push(other);
                continue;
            }
        };

        let mut last = 0;
        for caps in re.captures_iter(&text) {
            let Some(whole) = caps.get(0) else { continue };
            if whole.start() > last {
                out.push(Inline::Text(text[last..whole.start()].to_string()));
            }
            out.push(make(&caps));
            last = whole.end();
        }
        if last < text.len() || (last == 0 && text.is_empty()) {
            out.push(Inline::Text(text[last..].to_string()));
        }
    }

    out
}

fn code_spans(inlines: Vec<Inline>) -> Vec<Inline> {
    split_text(inlines, code_re(), |caps| Inline::Code(caps[1].to_string()))
}

/// Bold markers may sit in different text segments with code spans between
/// them, so the line is matched as one string with each non-text inline
/// standing in as a single [`OPAQUE`] char, then rebuilt around the matches.
fn bold_spans(inlines: Vec<Inline>) -> Vec<Inline> {
    let has_marker = inlines
        .iter()
        .any(|inline| matches!(inline, Inline::Text(text) if text.contains("**")));
    if !has_marker {
        return inlines;
    }

    let mut flat = String::new();
    let mut slots = Vec::new();
    for inline in inlines {
        match inline {
            Inline::Text(text) => flat.push_str(&text),
            other => {
                slots.push((flat.len(), other));
                flat.push(OPAQUE);
            }
        }
    }

    let mut slots = slots.into_iter().peekable();
    let mut out = Vec::new();
    let mut last = 0;
    for caps in bold_re().captures_iter(&flat) {
        let (Some(whole), Some(inner)) = (caps.get(0), caps.get(1)) else {
            continue;
        };
        unflatten(&flat, last..whole.start(), &mut slots, &mut out);
        let mut children = Vec::new();
        unflatten(&flat, inner.range(), &mut slots, &mut children);
        out.push(Inline::Bold(children));
        last = whole.end();
    }
    unflatten(&flat, last..flat.len(), &mut slots, &mut out);

    out
}

/// Rebuild the inlines covering `range` of a flattened line.
fn unflatten<I>(flat: &str, range: Range<usize>, slots: &mut Peekable<I>, out: &mut Vec<Inline>)
where
    I: Iterator<Item = (usize, Inline)>,
{
    let mut pos = range.start;
    while let Some((offset, inline)) = slots.next_if(|(offset, _)| *offset < range.end) {
        if offset > pos {
            out.push(Inline::Text(flat[pos..offset].to_string()));
        }
        out.push(inline);
        pos = offset + OPAQUE.len_utf8();
    }
    if pos < range.end {
        out.push(Inline::Text(flat[pos..range.end].to_string()));
    }
}

fn links(inlines: Vec<Inline>) -> Vec<Inline> {
    split_text(inlines, link_re(), |caps| Inline::Link(caps[0].to_string()))
}

/// Separate consecutive blocks with explicit breaks. List items are never
/// separated, the list container already puts them on their own lines.
fn insert_line_breaks(blocks: Vec<Block>) -> Vec<Block> {
    let mut out = Vec::with_capacity(blocks.len() * 2);
    for block in blocks {
        if !out.is_empty() {
            out.push(Block::Break);
        }
        out.push(block);
    }
    out
}

fn escape_html(text: &str) -> String {
    let mut escaped = String::with_capacity(text.len());
    for c in text.chars() {
        match c {
            '&' => escaped.push_str("&amp;"),
            '<' => escaped.push_str("&lt;"),
            '>' => escaped.push_str("&gt;"),
            '"' => escaped.push_str("&quot;"),
            _ => escaped.push(c),
        }
    }
    escaped
}

fn inlines_html(inlines: &[Inline], out: &mut String) {
    for inline in inlines {
        match inline {
            Inline::Text(text) => out.push_str(&escape_html(text)),
            Inline::Code(code) => {
                out.push_str("<code>");
                out.push_str(&escape_html(code));
                out.push_str("</code>");
            }
            Inline::Bold(children) => {
                out.push_str("<strong>");
                inlines_html(children, out);
                out.push_str("</strong>");
            }
            Inline::Link(url) => {
                let url = escape_html(url);
                out.push_str(&format!(
                    "<a href=\"{url}\" target=\"_blank\" rel=\"noopener noreferrer\">{url}</a>"
                ));
            }
        }
    }
}

fn inlines_plain(inlines: &[Inline], out: &mut String) {
    for inline in inlines {
        match inline {
            Inline::Text(text) | Inline::Code(text) | Inline::Link(text) => out.push_str(text),
            Inline::Bold(children) => inlines_plain(children, out),
        }
    }
}

impl Markup {
    /// HTML rendition. All text is escaped; the only tags are the ones the
    /// renderer itself inserts.
    pub fn to_html(&self) -> String {
        let mut out = String::new();
        for block in &self.blocks {
            match block {
                Block::Header(inlines) => {
                    out.push_str("<strong class=\"section-header\">");
                    inlines_html(inlines, &mut out);
                    out.push_str("</strong>");
                }
                Block::List(items) => {
                    out.push_str("<ul>");
                    for item in items {
                        out.push_str("<li>");
                        inlines_html(item, &mut out);
                        out.push_str("</li>");
                    }
                    out.push_str("</ul>");
                }
                Block::Line(inlines) => inlines_html(inlines, &mut out),
                Block::Break => out.push_str("<br>"),
            }
        }
        out
    }

    /// Plain-text rendition, one output line per rendered line. List items
    /// are bulleted with `•`.
    pub fn to_plain(&self) -> String {
        let mut out = String::new();

        for block in &self.blocks {
            match block {
                Block::Header(inlines) | Block::Line(inlines) => inlines_plain(inlines, &mut out),
                Block::List(items) => {
                    if !out.is_empty() && !out.ends_with('\n') {
                        out.push('\n');
                    }
                    let rendered: Vec<String> = items
                        .iter()
                        .map(|item| {
                            let mut line = String::from("• ");
                            inlines_plain(item, &mut line);
                            line
                        })
                        .collect();
                    out.push_str(&rendered.join("\n"));
                }
                Block::Break => out.push('\n'),
            }
        }
        out
    }
}
