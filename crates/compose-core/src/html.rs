//! Markup codec for the controlled value.
//!
//! Serialization is canonical: the parser accepts everything the serializer
//! writes and re-serializing a parsed value reproduces it byte for byte. The
//! parser also takes the looser markup browsers emit for editable regions.

use std::io::Cursor;

use quick_xml::Reader;
use quick_xml::Writer;
use quick_xml::escape::partial_escape;
use quick_xml::events::attributes::AttrError;
use quick_xml::events::{BytesEnd, BytesStart, BytesText, Event};

use crate::commands::{Alignment, ListKind};
use crate::core::{
    Attrs, Document, ElementNode, IMAGE, LINE_BREAK, LIST_ITEM, Marks, Node, PARAGRAPH,
};
use crate::palette::{FontSize, TextColor};

const ZERO_WIDTH_SPACE: char = '\u{200b}';

#[derive(Debug, thiserror::Error)]
pub enum CodecError {
    #[error("Markup parse error at byte {position}: {source}")]
    Parse {
        position: usize,
        #[source]
        source: quick_xml::Error,
    },
    #[error("Markup write error: {0}")]
    Xml(#[from] quick_xml::Error),
    #[error("Invalid attribute: {0}")]
    Attribute(#[from] AttrError),
    #[error("Serialized markup is not UTF-8: {0}")]
    Utf8(#[from] std::string::FromUtf8Error),
}

type MarkupWriter = Writer<Cursor<Vec<u8>>>;

/// Serializes a document. A blank document serializes to `""`.
pub fn to_html(doc: &Document) -> Result<String, CodecError> {
    if doc.is_blank() {
        return Ok(String::new());
    }

    let mut writer = Writer::new(Cursor::new(Vec::new()));
    let mut open_list: Option<ListKind> = None;

    for node in &doc.children {
        match node {
            Node::Element(el) => {
                let list = ListKind::of(el);
                if list != open_list {
                    close_list(&mut writer, open_list)?;
                    if let Some(kind) = list {
                        writer.write_event(Event::Start(BytesStart::new(list_tag(kind))))?;
                    }
                    open_list = list;
                }
                write_block(&mut writer, el, list.is_some())?;
            }
            Node::Void(v) if v.kind == IMAGE => {
                close_list(&mut writer, open_list.take())?;
                let mut img = BytesStart::new("img");
                if let Some(src) = v.attr_str("src") {
                    img.push_attribute(("src", src));
                }
                if let Some(alt) = v.attr_str("alt") {
                    img.push_attribute(("alt", alt));
                }
                writer.write_event(Event::Empty(img))?;
            }
            other => tracing::debug!(?other, "skipping node with no markup form"),
        }
    }
    close_list(&mut writer, open_list)?;

    Ok(String::from_utf8(writer.into_inner().into_inner())?)
}

fn list_tag(kind: ListKind) -> &'static str {
    match kind {
        ListKind::Bulleted => "ul",
        ListKind::Ordered => "ol",
    }
}

fn close_list(writer: &mut MarkupWriter, list: Option<ListKind>) -> Result<(), CodecError> {
    if let Some(kind) = list {
        writer.write_event(Event::End(BytesEnd::new(list_tag(kind))))?;
    }
    Ok(())
}

fn write_block(
    writer: &mut MarkupWriter,
    el: &ElementNode,
    in_list: bool,
) -> Result<(), CodecError> {
    let tag = if in_list { "li" } else { "p" };
    let mut start = BytesStart::new(tag);
    if let Some(align) = Alignment::from_attr(el.attr_str("align")).attr() {
        let style = format!("text-align: {align}");
        start.push_attribute(("style", style.as_str()));
    }
    writer.write_event(Event::Start(start))?;

    for child in &el.children {
        match child {
            Node::Text(t) => write_run(writer, &t.text, &t.marks)?,
            Node::Void(v) if v.kind == LINE_BREAK => write_line_break(writer)?,
            _ => {}
        }
    }
    if needs_placeholder_break(&el.children) {
        write_line_break(writer)?;
    }

    writer.write_event(Event::End(BytesEnd::new(tag)))?;
    Ok(())
}

/// An empty block, or one ending in a line break, needs a trailing `<br/>`
/// to keep its last line.
fn needs_placeholder_break(children: &[Node]) -> bool {
    let last = children.iter().rev().find(|child| match child {
        Node::Text(t) => !(t.text.is_empty() && t.marks.is_plain()),
        _ => true,
    });
    match last {
        None => true,
        Some(Node::Void(v)) => v.kind == LINE_BREAK,
        Some(Node::Text(t)) => run_text(&t.text).ends_with('\n'),
        Some(Node::Element(_)) => false,
    }
}

fn write_line_break(writer: &mut MarkupWriter) -> Result<(), CodecError> {
    writer.write_event(Event::Empty(BytesStart::new("br")))?;
    Ok(())
}

/// Writes one run. Mark tags are closed around every `<br/>` so a break
/// never sits inside formatting, which is where the parser puts it back.
fn write_run(writer: &mut MarkupWriter, text: &str, marks: &Marks) -> Result<(), CodecError> {
    let text = run_text(text);
    if text.is_empty() {
        if !marks.is_plain() {
            let tags = open_marks(writer, marks)?;
            let marker = ZERO_WIDTH_SPACE.to_string();
            writer.write_event(Event::Text(BytesText::from_escaped(marker)))?;
            close_marks(writer, tags)?;
        }
        return Ok(());
    }

    for (ix, line) in text.split('\n').enumerate() {
        if ix > 0 {
            write_line_break(writer)?;
        }
        if !line.is_empty() {
            let tags = open_marks(writer, marks)?;
            writer.write_event(Event::Text(BytesText::from_escaped(partial_escape(line))))?;
            close_marks(writer, tags)?;
        }
    }
    Ok(())
}

/// Run text as written: markers stripped, line terminators folded to `\n`.
fn run_text(text: &str) -> String {
    text.replace("\r\n", "\n")
        .replace('\r', "\n")
        .replace(ZERO_WIDTH_SPACE, "")
}

fn open_marks(writer: &mut MarkupWriter, marks: &Marks) -> Result<Vec<&'static str>, CodecError> {
    let mut tags: Vec<&'static str> = Vec::new();
    if let Some(href) = &marks.link {
        let mut a = BytesStart::new("a");
        a.push_attribute(("href", href.as_str()));
        writer.write_event(Event::Start(a))?;
        tags.push("a");
    }
    let mut style: Vec<String> = Vec::new();
    if let Some(size) = marks.font_size {
        style.push(format!("font-size: {}", size.css()));
    }
    if let Some(color) = marks.text_color {
        style.push(format!("color: {}", color.hex()));
    }
    if !style.is_empty() {
        let mut span = BytesStart::new("span");
        span.push_attribute(("style", style.join("; ").as_str()));
        writer.write_event(Event::Start(span))?;
        tags.push("span");
    }
    for (on, tag) in [
        (marks.bold, "strong"),
        (marks.italic, "em"),
        (marks.underline, "u"),
        (marks.strikethrough, "s"),
    ] {
        if on {
            writer.write_event(Event::Start(BytesStart::new(tag)))?;
            tags.push(tag);
        }
    }
    Ok(tags)
}

fn close_marks(writer: &mut MarkupWriter, tags: Vec<&'static str>) -> Result<(), CodecError> {
    for tag in tags.into_iter().rev() {
        writer.write_event(Event::End(BytesEnd::new(tag)))?;
    }
    Ok(())
}

/// Parses markup into a document. The result is not normalized.
pub fn from_html(markup: &str) -> Result<Document, CodecError> {
    let mut reader = Reader::from_str(markup);
    reader.trim_text(false);
    reader.check_end_names(false);

    let mut builder = Builder::default();
    loop {
        let event = reader.read_event().map_err(|source| CodecError::Parse {
            position: reader.buffer_position(),
            source,
        })?;
        match event {
            Event::Start(e) => {
                let name = tag_name(&e);
                let attrs = TagAttrs::read(&e)?;
                builder.start(&name, &attrs);
            }
            Event::Empty(e) => {
                let name = tag_name(&e);
                let attrs = TagAttrs::read(&e)?;
                builder.start(&name, &attrs);
                builder.end(&name);
            }
            Event::End(e) => {
                let name = String::from_utf8_lossy(e.name().as_ref()).to_ascii_lowercase();
                builder.end(&name);
            }
            Event::Text(e) => {
                let text = match e.unescape_with(resolve_entity) {
                    Ok(text) => text.into_owned(),
                    Err(err) => {
                        tracing::debug!(%err, "keeping undecodable text verbatim");
                        String::from_utf8_lossy(&e).into_owned()
                    }
                };
                builder.text(&text);
            }
            Event::CData(e) => builder.text(&String::from_utf8_lossy(&e)),
            Event::Eof => break,
            Event::Comment(_) | Event::Decl(_) | Event::PI(_) | Event::DocType(_) => {}
        }
    }
    Ok(builder.finish())
}

fn tag_name(e: &BytesStart<'_>) -> String {
    String::from_utf8_lossy(e.name().as_ref()).to_ascii_lowercase()
}

fn resolve_entity(entity: &str) -> Option<&'static str> {
    let resolved = match entity {
        "nbsp" => "\u{a0}",
        "ensp" => "\u{2002}",
        "emsp" => "\u{2003}",
        "thinsp" => "\u{2009}",
        "zwsp" => "\u{200b}",
        "shy" => "\u{ad}",
        "copy" => "©",
        "reg" => "®",
        "trade" => "™",
        "hellip" => "…",
        "mdash" => "—",
        "ndash" => "–",
        "lsquo" => "‘",
        "rsquo" => "’",
        "ldquo" => "“",
        "rdquo" => "”",
        "laquo" => "«",
        "raquo" => "»",
        "middot" => "·",
        "bull" => "•",
        "euro" => "€",
        "pound" => "£",
        "deg" => "°",
        "times" => "×",
        _ => return None,
    };
    Some(resolved)
}

/// The attributes the parser cares about, decoded once per tag.
#[derive(Debug, Default)]
struct TagAttrs {
    style: Option<String>,
    href: Option<String>,
    src: Option<String>,
    alt: Option<String>,
    align: Option<String>,
    size: Option<String>,
    color: Option<String>,
}

impl TagAttrs {
    fn read(e: &BytesStart<'_>) -> Result<Self, CodecError> {
        let mut attrs = Self::default();
        for attr in e.html_attributes().with_checks(false) {
            let attr = attr?;
            let key = String::from_utf8_lossy(attr.key.as_ref()).to_ascii_lowercase();
            let slot = match key.as_str() {
                "style" => &mut attrs.style,
                "href" => &mut attrs.href,
                "src" => &mut attrs.src,
                "alt" => &mut attrs.alt,
                "align" => &mut attrs.align,
                "size" => &mut attrs.size,
                "color" => &mut attrs.color,
                _ => continue,
            };
            let value = match attr.unescape_value_with(resolve_entity) {
                Ok(value) => value.into_owned(),
                Err(_) => String::from_utf8_lossy(&attr.value).into_owned(),
            };
            *slot = Some(value);
        }
        Ok(attrs)
    }

    fn style_declarations(&self) -> Vec<(String, String)> {
        let Some(style) = &self.style else {
            return Vec::new();
        };
        style
            .split(';')
            .filter_map(|decl| {
                let (prop, value) = decl.split_once(':')?;
                Some((
                    prop.trim().to_ascii_lowercase(),
                    value.trim().to_ascii_lowercase(),
                ))
            })
            .collect()
    }

    fn alignment(&self) -> Option<Alignment> {
        self.style_declarations()
            .into_iter()
            .find(|(prop, _)| prop == "text-align")
            .and_then(|(_, value)| Alignment::parse(&value))
            .or_else(|| self.align.as_deref().and_then(Alignment::parse))
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum TagRole {
    Block,
    List(ListKind),
    ListItem,
    LineBreak,
    Image,
    Void,
    Skip,
    Inline,
}

fn tag_role(name: &str) -> TagRole {
    match name {
        "p" | "div" | "h1" | "h2" | "h3" | "h4" | "h5" | "h6" | "blockquote" | "pre" => {
            TagRole::Block
        }
        "ul" => TagRole::List(ListKind::Bulleted),
        "ol" => TagRole::List(ListKind::Ordered),
        "li" => TagRole::ListItem,
        "br" => TagRole::LineBreak,
        "img" => TagRole::Image,
        "hr" | "input" | "meta" | "link" | "area" | "base" | "col" | "embed" | "source"
        | "track" | "wbr" => TagRole::Void,
        "script" | "style" | "head" | "title" => TagRole::Skip,
        _ => TagRole::Inline,
    }
}

/// Applies a tag's formatting semantics on top of the inherited marks.
fn marks_for(name: &str, attrs: &TagAttrs, inherited: &Marks) -> Marks {
    let mut marks = inherited.clone();
    match name {
        "strong" | "b" => marks.bold = true,
        "em" | "i" => marks.italic = true,
        "u" | "ins" => marks.underline = true,
        "s" | "strike" | "del" => marks.strikethrough = true,
        "a" => {
            if let Some(href) = attrs.href.as_deref().map(str::trim).filter(|h| !h.is_empty()) {
                marks.link = Some(href.to_string());
            }
        }
        "font" => {
            if let Some(size) = &attrs.size {
                match size.trim().parse::<u8>().ok().and_then(FontSize::from_level) {
                    Some(size) => marks.font_size = Some(size),
                    None => tracing::debug!(size = %size, "dropping off-palette font size"),
                }
            }
            if let Some(color) = &attrs.color {
                match TextColor::from_css(color) {
                    Some(color) => marks.text_color = Some(color),
                    None => tracing::debug!(color = %color, "dropping off-palette color"),
                }
            }
        }
        _ => {}
    }

    for (prop, value) in attrs.style_declarations() {
        match prop.as_str() {
            "font-weight" => {
                marks.bold = match value.as_str() {
                    "bold" | "bolder" => true,
                    "normal" | "lighter" => false,
                    numeric => numeric.parse::<u16>().map(|w| w >= 600).unwrap_or(marks.bold),
                }
            }
            "font-style" => marks.italic = value == "italic" || value == "oblique",
            "text-decoration" | "text-decoration-line" => {
                if value.contains("underline") {
                    marks.underline = true;
                }
                if value.contains("line-through") {
                    marks.strikethrough = true;
                }
                if value == "none" {
                    marks.underline = false;
                    marks.strikethrough = false;
                }
            }
            "font-size" => match FontSize::from_css(&value) {
                Some(size) => marks.font_size = Some(size),
                None => tracing::debug!(%value, "dropping off-palette font size"),
            },
            "color" => match TextColor::from_css(&value) {
                Some(color) => marks.text_color = Some(color),
                None => tracing::debug!(%value, "dropping off-palette color"),
            },
            _ => {}
        }
    }
    marks
}

struct OpenBlock {
    kind: &'static str,
    attrs: Attrs,
    children: Vec<Node>,
    explicit: bool,
}

struct Frame {
    tag: String,
    marks: Marks,
}

#[derive(Default)]
struct Builder {
    blocks: Vec<Node>,
    current: Option<OpenBlock>,
    lists: Vec<ListKind>,
    frames: Vec<Frame>,
    skip_depth: usize,
}

impl Builder {
    fn marks(&self) -> Marks {
        self.frames
            .last()
            .map(|frame| frame.marks.clone())
            .unwrap_or_default()
    }

    fn start(&mut self, name: &str, attrs: &TagAttrs) {
        let role = tag_role(name);
        if self.skip_depth > 0 || role == TagRole::Skip {
            if role == TagRole::Skip {
                self.skip_depth += 1;
            }
            return;
        }

        match role {
            TagRole::Block => self.open_block(PARAGRAPH, attrs),
            TagRole::ListItem => self.open_block(LIST_ITEM, attrs),
            TagRole::List(kind) => {
                self.close_block();
                self.lists.push(kind);
            }
            TagRole::LineBreak => {
                self.block().children.push(Node::line_break());
                return;
            }
            TagRole::Image => {
                if let Some(src) = attrs.src.as_deref().filter(|s| !s.trim().is_empty()) {
                    self.close_block();
                    self.blocks.push(Node::image(src, attrs.alt.clone()));
                }
                return;
            }
            TagRole::Void => return,
            TagRole::Skip | TagRole::Inline => {}
        }

        let marks = marks_for(name, attrs, &self.marks());
        self.frames.push(Frame {
            tag: name.to_string(),
            marks,
        });
    }

    fn end(&mut self, name: &str) {
        let role = tag_role(name);
        if role == TagRole::Skip {
            self.skip_depth = self.skip_depth.saturating_sub(1);
            return;
        }
        if self.skip_depth > 0 {
            return;
        }

        match role {
            TagRole::LineBreak | TagRole::Image | TagRole::Void => return,
            TagRole::Block | TagRole::ListItem => self.finish_block(),
            TagRole::List(_) => {
                self.finish_block();
                self.lists.pop();
            }
            TagRole::Skip | TagRole::Inline => {}
        }

        if let Some(ix) = self.frames.iter().rposition(|frame| frame.tag == name) {
            self.frames.truncate(ix);
        }
    }

    fn text(&mut self, raw: &str) {
        if self.skip_depth > 0 {
            return;
        }

        let stripped: String = raw.chars().filter(|&c| c != ZERO_WIDTH_SPACE).collect();
        if stripped.is_empty() {
            if !raw.is_empty() {
                // A lone marker keeps its formatting as an empty run.
                let marks = self.marks();
                self.block().children.push(Node::text("", marks));
            }
            return;
        }

        let is_whitespace = stripped.chars().all(|c| c.is_ascii_whitespace());
        let block_started = self
            .current
            .as_ref()
            .is_some_and(|block| !block.children.is_empty());
        let leading_newline = !block_started && stripped.contains(['\n', '\r']);
        if is_whitespace && (self.current.is_none() || leading_newline) {
            return;
        }
        let text = collapse_newline_whitespace(&stripped);
        let marks = self.marks();
        self.block().children.push(Node::text(text, marks));
    }

    /// The block receiving inline content, opened implicitly when needed.
    fn block(&mut self) -> &mut OpenBlock {
        self.current.get_or_insert_with(|| OpenBlock {
            kind: PARAGRAPH,
            attrs: Attrs::default(),
            children: Vec::new(),
            explicit: false,
        })
    }

    fn open_block(&mut self, kind: &'static str, attrs: &TagAttrs) {
        let align = attrs.alignment().and_then(Alignment::attr);

        // An empty enclosing block absorbs the nested one.
        if let Some(current) = self.current.as_mut().filter(|c| c.children.is_empty()) {
            if let Some(align) = align {
                current
                    .attrs
                    .insert("align".to_string(), serde_json::Value::String(align.to_string()));
            }
            current.explicit = true;
            return;
        }

        self.close_block();
        let mut block_attrs = Attrs::default();
        if let Some(align) = align {
            block_attrs.insert("align".to_string(), serde_json::Value::String(align.to_string()));
        }
        if kind == LIST_ITEM {
            let list = self.lists.last().copied().unwrap_or(ListKind::Bulleted);
            block_attrs.insert(
                "list_type".to_string(),
                serde_json::Value::String(list.as_str().to_string()),
            );
        }
        self.current = Some(OpenBlock {
            kind,
            attrs: block_attrs,
            children: Vec::new(),
            explicit: true,
        });
    }

    /// Ends the current block when a non-inline boundary interrupts it.
    /// Empty blocks are dropped.
    fn close_block(&mut self) {
        match &self.current {
            Some(block) if block.children.is_empty() => self.current = None,
            Some(_) => self.finish_block(),
            None => {}
        }
    }

    /// Ends the current block at its closing tag. Explicit empty blocks
    /// are kept as empty paragraphs.
    fn finish_block(&mut self) {
        let Some(mut block) = self.current.take() else {
            return;
        };
        if block.children.is_empty() && !block.explicit {
            return;
        }
        drop_trailing_break(&mut block.children);
        self.blocks.push(Node::Element(ElementNode {
            kind: block.kind.to_string(),
            attrs: block.attrs,
            children: block.children,
        }));
    }

    fn finish(mut self) -> Document {
        self.finish_block();
        Document::new(self.blocks)
    }
}

fn drop_trailing_break(children: &mut Vec<Node>) {
    let last = children.iter().rposition(|child| match child {
        Node::Text(t) => !(t.text.is_empty() && t.marks.is_plain()),
        _ => true,
    });
    if let Some(ix) = last {
        if matches!(&children[ix], Node::Void(v) if v.kind == LINE_BREAK) {
            children.remove(ix);
        }
    }
}

/// Collapses every whitespace run containing a line break into one space.
fn collapse_newline_whitespace(text: &str) -> String {
    let mut out = String::with_capacity(text.len());
    let mut run = String::new();
    let flush = |run: &mut String, out: &mut String| {
        if run.contains(['\n', '\r']) {
            out.push(' ');
        } else {
            out.push_str(run);
        }
        run.clear();
    };
    for ch in text.chars() {
        if ch.is_ascii_whitespace() {
            run.push(ch);
        } else {
            flush(&mut run, &mut out);
            out.push(ch);
        }
    }
    flush(&mut run, &mut out);
    out
}
