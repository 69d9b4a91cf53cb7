//! Pull cursor over the structural XML stream.

use quick_xml::events::{BytesStart, Event};
use quick_xml::name::QName;
use quick_xml::Reader;
use std::fmt::Display;
use std::io::BufRead;

use strongroom_common::{Error, Result};

/// An opened element: its name and attributes.
#[derive(Debug, Clone)]
pub(crate) struct StartTag {
    pub name: String,
    attributes: Vec<(String, String)>,
    empty: bool,
}

impl StartTag {
    fn from_event(event: &BytesStart<'_>, empty: bool) -> std::result::Result<Self, quick_xml::Error> {
        let name = String::from_utf8_lossy(event.name().as_ref()).into_owned();
        let mut attributes = Vec::new();
        for attr in event.attributes() {
            let attr = attr?;
            let key = String::from_utf8_lossy(attr.key.as_ref()).into_owned();
            let value = attr.unescape_value()?.into_owned();
            attributes.push((key, value));
        }
        Ok(Self {
            name,
            attributes,
            empty,
        })
    }

    pub fn attribute(&self, name: &str) -> Option<&str> {
        self.attributes
            .iter()
            .find(|(key, _)| key == name)
            .map(|(_, value)| value.as_str())
    }
}

fn xml_error<R>(reader: &Reader<R>, err: impl Display) -> Error {
    Error::Xml {
        message: err.to_string(),
        position: reader.buffer_position() as u64,
    }
}

/// Walks child elements one nesting level at a time.
///
/// Every element returned by [`XmlCursor::next_child`] must be consumed
/// with either [`XmlCursor::read_text`], [`XmlCursor::skip`], or by looping
/// `next_child` until it returns `None`.
pub(crate) struct XmlCursor<R> {
    reader: Reader<R>,
    buf: Vec<u8>,
    depth: usize,
    /// The last element returned was self-closing and is still open.
    pending_end: bool,
}

impl<R: BufRead> XmlCursor<R> {
    pub fn new(input: R) -> Self {
        Self {
            reader: Reader::from_reader(input),
            buf: Vec::new(),
            depth: 0,
            pending_end: false,
        }
    }

    /// Next child element of the current element, or `None` once the
    /// current element (or the document) ends.
    pub fn next_child(&mut self) -> Result<Option<StartTag>> {
        if self.close_pending() {
            return Ok(None);
        }

        loop {
            self.buf.clear();
            let event = self
                .reader
                .read_event_into(&mut self.buf)
                .map_err(|e| xml_error(&self.reader, e))?;

            match event {
                Event::Start(start) => {
                    let tag = StartTag::from_event(&start, false)
                        .map_err(|e| xml_error(&self.reader, e))?;
                    self.depth += 1;
                    return Ok(Some(tag));
                }
                Event::Empty(start) => {
                    let tag = StartTag::from_event(&start, true)
                        .map_err(|e| xml_error(&self.reader, e))?;
                    self.depth += 1;
                    self.pending_end = true;
                    return Ok(Some(tag));
                }
                Event::End(_) => {
                    if self.depth == 0 {
                        return Err(xml_error(&self.reader, "unexpected closing tag"));
                    }
                    self.depth -= 1;
                    return Ok(None);
                }
                Event::Eof => {
                    if self.depth > 0 {
                        return Err(xml_error(&self.reader, "unexpected end of document"));
                    }
                    return Ok(None);
                }
                _ => {}
            }
        }
    }

    /// Character data of `tag`, which must not contain child elements.
    pub fn read_text(&mut self, tag: &StartTag) -> Result<String> {
        if tag.empty {
            self.close_pending();
            return Ok(String::new());
        }

        let mut text = String::new();
        loop {
            self.buf.clear();
            let event = self
                .reader
                .read_event_into(&mut self.buf)
                .map_err(|e| xml_error(&self.reader, e))?;

            match event {
                Event::Text(chunk) => {
                    let unescaped = chunk.unescape().map_err(|e| xml_error(&self.reader, e))?;
                    text.push_str(&unescaped);
                }
                Event::CData(chunk) => {
                    text.push_str(&String::from_utf8_lossy(&chunk.into_inner()));
                }
                Event::End(_) => {
                    self.depth -= 1;
                    return Ok(text);
                }
                Event::Start(_) | Event::Empty(_) => {
                    return Err(xml_error(
                        &self.reader,
                        format!("expected character data in <{}>, found element", tag.name),
                    ));
                }
                Event::Eof => {
                    return Err(xml_error(&self.reader, "unexpected end of document"));
                }
                _ => {}
            }
        }
    }

    /// Consume `tag` and everything inside it.
    pub fn skip(&mut self, tag: &StartTag) -> Result<()> {
        if tag.empty {
            self.close_pending();
            return Ok(());
        }

        self.buf.clear();
        self.reader
            .read_to_end_into(QName(tag.name.as_bytes()), &mut self.buf)
            .map_err(|e| xml_error(&self.reader, e))?;
        self.depth -= 1;
        Ok(())
    }

    /// Close a self-closing element, if one is open.
    fn close_pending(&mut self) -> bool {
        if !self.pending_end {
            return false;
        }
        self.pending_end = false;
        self.depth -= 1;
        true
    }
}
