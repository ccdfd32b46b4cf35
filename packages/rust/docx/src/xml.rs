//! Event-level editing of package parts.
//!
//! A part is read into its `quick_xml` event stream, edited by splicing
//! events, and written back. Events nobody touches are re-emitted byte for
//! byte, so unrelated markup survives unchanged.

use std::fmt::Display;

use quick_xml::events::{BytesStart, Event};
use quick_xml::{Reader, Writer};

use paper_shared::{PaperError, Result};

/// The events of one part, in document order.
pub(crate) struct XmlPart<'a> {
    pub events: Vec<Event<'a>>,
}

impl<'a> XmlPart<'a> {
    pub fn parse(xml: &'a str) -> Result<Self> {
        let mut reader = Reader::from_str(xml);
        let mut events = Vec::new();
        loop {
            match reader.read_event().map_err(malformed)? {
                Event::Eof => break,
                event => events.push(event),
            }
        }
        Ok(Self { events })
    }

    /// Nesting level of every event: the root's start and end are 0, its
    /// children 1, and so on.
    pub fn levels(&self) -> Vec<usize> {
        let mut depth = 0usize;
        self.events
            .iter()
            .map(|event| match event {
                Event::Start(_) => {
                    depth += 1;
                    depth - 1
                }
                Event::End(_) => {
                    depth = depth.saturating_sub(1);
                    depth
                }
                _ => depth,
            })
            .collect()
    }

    /// Index of the end event closing the element opened at `start`.
    ///
    /// An empty element closes itself.
    pub fn close_of(&self, levels: &[usize], start: usize) -> usize {
        match self.events[start] {
            Event::Start(_) => (start + 1..self.events.len())
                .find(|&i| levels[i] == levels[start])
                .unwrap_or(start),
            _ => start,
        }
    }

    pub fn write(self) -> Result<String> {
        let mut writer = Writer::new(Vec::new());
        for event in self.events {
            writer.write_event(event).map_err(malformed)?;
        }
        String::from_utf8(writer.into_inner()).map_err(malformed)
    }
}

/// Whether `event` opens an element called `name` (empty or not).
pub(crate) fn opens(event: &Event<'_>, name: &[u8]) -> bool {
    matches!(event, Event::Start(e) | Event::Empty(e) if e.name().as_ref() == name)
}

/// Unescaped value of attribute `key`.
pub(crate) fn attr_value(element: &BytesStart<'_>, key: &str) -> Result<Option<String>> {
    let Some(attr) = element.try_get_attribute(key).map_err(malformed)? else {
        return Ok(None);
    };
    let value = attr.unescape_value().map_err(malformed)?;
    Ok(Some(value.into_owned()))
}

pub(crate) fn malformed(err: impl Display) -> PaperError {
    PaperError::package(format!("malformed document part: {err}"))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn untouched_parts_write_back_verbatim() {
        let xml = "<?xml version=\"1.0\"?>\n<a x=\"1\"><b/>text &amp; more<!-- note --></a>";
        assert_eq!(XmlPart::parse(xml).unwrap().write().unwrap(), xml);
    }

    #[test]
    fn levels_follow_nesting() {
        let part = XmlPart::parse("<a><b><c/></b><d/></a>").unwrap();
        assert_eq!(part.levels(), vec![0, 1, 2, 1, 1, 0]);
        assert_eq!(part.close_of(&part.levels(), 1), 3);
        assert_eq!(part.close_of(&part.levels(), 4), 4);
    }

    #[test]
    fn mismatched_tags_are_rejected() {
        let err = XmlPart::parse("<a><b></a>").err().unwrap();
        assert!(matches!(err, PaperError::Package(_)));
    }
}
