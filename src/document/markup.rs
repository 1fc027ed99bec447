//! Streaming XML rewrite shared by the DOCX and EPUB formats.
//!
//! The walker copies every event to a writer, except that each matching
//! element is captured whole and handed to a visitor which decides what to
//! write in its place.

use quick_xml::events::{BytesEnd, BytesStart, BytesText, Event};
use quick_xml::{Reader, Writer};

use crate::errors::LoadError;

/// Which elements are captured and where their text lives
pub(crate) struct ElementRule {
    /// Whether a start tag opens a captured element
    pub matches: fn(&BytesStart) -> bool,
    /// Only text nested in this tag counts, all text when None
    pub text_tag: Option<&'static [u8]>,
}

/// A captured element: its events from start to end tag, and its text
pub(crate) struct Element {
    pub events: Vec<Event<'static>>,
    pub text: String,
}

impl Element {
    /// Text with whitespace runs collapsed to single spaces
    pub fn collapsed_text(&self) -> String {
        self.text.split_whitespace().collect::<Vec<_>>().join(" ")
    }
}

struct Capture {
    events: Vec<Event<'static>>,
    text: String,
    depth: usize,
    text_depth: usize,
}

impl Capture {
    fn new(start: Event<'static>) -> Self {
        Self {
            events: vec![start],
            text: String::new(),
            depth: 1,
            text_depth: 0,
        }
    }

    /// Add an event, true once the element is closed
    fn push(&mut self, event: Event<'static>, rule: &ElementRule) -> bool {
        let in_text = rule.text_tag.is_none() || self.text_depth > 0;
        match &event {
            Event::Start(start) => {
                self.depth += 1;
                if rule.text_tag == Some(start.name().as_ref()) {
                    self.text_depth += 1;
                }
            }
            Event::End(end) => {
                self.depth -= 1;
                if rule.text_tag == Some(end.name().as_ref()) {
                    self.text_depth = self.text_depth.saturating_sub(1);
                }
            }
            Event::Text(text) if in_text => self.text.push_str(&text_content(text)),
            Event::CData(data) if in_text => self.text.push_str(&String::from_utf8_lossy(data)),
            _ => {}
        }
        self.events.push(event);
        self.depth == 0
    }

    fn into_element(self) -> Element {
        Element {
            events: self.events,
            text: self.text,
        }
    }
}

/// Unescaped text, raw text when it holds entities XML does not know
pub(crate) fn text_content(text: &BytesText) -> String {
    text.unescape_with(|entity| match entity {
        "nbsp" => Some("\u{a0}"),
        _ => None,
    })
    .map(|content| content.into_owned())
    .unwrap_or_else(|_| String::from_utf8_lossy(text).into_owned())
}

/// Walk `data`, copying it to the returned buffer and letting `visit` write captured elements
pub(crate) fn walk_elements<F>(
    part: &str,
    data: &[u8],
    rule: &ElementRule,
    mut visit: F,
) -> Result<Vec<u8>, LoadError>
where
    F: FnMut(Element, &mut XmlWriter) -> Result<(), LoadError>,
{
    let mut reader = Reader::from_reader(data);
    reader.trim_text(false);
    let mut writer = XmlWriter::new(part);
    let mut buf = Vec::new();
    let mut capture: Option<Capture> = None;

    loop {
        let event = reader.read_event_into(&mut buf).map_err(|e| LoadError::Markup {
            part: part.to_string(),
            message: format!("at byte {}: {}", reader.buffer_position(), e),
        })?;

        match event {
            Event::Eof => break,
            event => match capture.as_mut() {
                Some(open) => {
                    if open.push(event.into_owned(), rule) {
                        if let Some(done) = capture.take() {
                            visit(done.into_element(), &mut writer)?;
                        }
                    }
                }
                None => {
                    let opens = matches!(&event, Event::Start(start) if (rule.matches)(start));
                    if opens {
                        capture = Some(Capture::new(event.into_owned()));
                    } else {
                        writer.write(&event)?;
                    }
                }
            },
        }
        buf.clear();
    }

    if capture.is_some() {
        return Err(LoadError::Markup {
            part: part.to_string(),
            message: "unexpected end of document inside an element".to_string(),
        });
    }

    Ok(writer.into_inner())
}

/// `quick_xml::Writer` over a byte buffer, with errors mapped to `LoadError`
pub(crate) struct XmlWriter {
    part: String,
    inner: Writer<Vec<u8>>,
}

impl XmlWriter {
    fn new(part: &str) -> Self {
        Self {
            part: part.to_string(),
            inner: Writer::new(Vec::new()),
        }
    }

    pub fn write(&mut self, event: &Event) -> Result<(), LoadError> {
        self.inner.write_event(event).map_err(|e| LoadError::Markup {
            part: self.part.clone(),
            message: e.to_string(),
        })
    }

    pub fn write_all(&mut self, events: &[Event<'static>]) -> Result<(), LoadError> {
        for event in events {
            self.write(event)?;
        }
        Ok(())
    }

    pub fn write_text(&mut self, text: &str) -> Result<(), LoadError> {
        self.write(&Event::Text(BytesText::new(text)))
    }

    pub fn start(&mut self, start: BytesStart) -> Result<(), LoadError> {
        self.write(&Event::Start(start))
    }

    pub fn end(&mut self, name: &str) -> Result<(), LoadError> {
        self.write(&Event::End(BytesEnd::new(name)))
    }

    pub fn empty(&mut self, name: &str) -> Result<(), LoadError> {
        self.write(&Event::Empty(BytesStart::new(name)))
    }

    fn into_inner(self) -> Vec<u8> {
        self.inner.into_inner()
    }
}
