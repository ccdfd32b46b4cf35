//! Document properties (`docProps/core.xml` and `docProps/app.xml`).

use chrono::{DateTime, Utc};
use quick_xml::escape::escape;
use quick_xml::events::{BytesEnd, BytesStart, BytesText, Event};

use paper_shared::Result;

use crate::xml::{XmlPart, opens};

/// Values written into the core properties part.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CoreProperties {
    pub title: Option<String>,
    pub author: Option<String>,
    pub subject: Option<String>,
    pub revision: u32,
    /// Timestamp for `dcterms:created` and `dcterms:modified`.
    pub timestamp: Option<DateTime<Utc>>,
}

/// Skeleton used when the converter produced no core properties part.
pub const EMPTY_CORE: &str = concat!(
    r#"<?xml version="1.0" encoding="UTF-8" standalone="yes"?>"#,
    "\n",
    r#"<cp:coreProperties xmlns:cp="http://schemas.openxmlformats.org/package/2006/metadata/core-properties" "#,
    r#"xmlns:dc="http://purl.org/dc/elements/1.1/" xmlns:dcterms="http://purl.org/dc/terms/" "#,
    r#"xmlns:dcmitype="http://purl.org/dc/dcmitype/" xmlns:xsi="http://www.w3.org/2001/XMLSchema-instance">"#,
    "</cp:coreProperties>"
);

const W3CDTF: [(&str, &str); 1] = [("xsi:type", "dcterms:W3CDTF")];

/// Rewrite the core properties part.
pub fn apply_core_properties(xml: &str, props: &CoreProperties) -> Result<String> {
    let mut part = XmlPart::parse(xml)?;

    if let Some(title) = &props.title {
        set_element(&mut part, "dc:title", &[], title);
    }
    if let Some(author) = &props.author {
        set_element(&mut part, "dc:creator", &[], author);
        set_element(&mut part, "cp:lastModifiedBy", &[], author);
    }
    if let Some(subject) = &props.subject {
        set_element(&mut part, "dc:subject", &[], subject);
    }
    set_element(&mut part, "cp:revision", &[], &props.revision.to_string());

    if let Some(timestamp) = props.timestamp {
        let stamp = timestamp.format("%Y-%m-%dT%H:%M:%SZ").to_string();
        set_element(&mut part, "dcterms:created", &W3CDTF, &stamp);
        set_element(&mut part, "dcterms:modified", &W3CDTF, &stamp);
    }

    part.write()
}

/// Reset the editing-time counter in the extended properties part.
pub fn reset_total_time(xml: &str) -> Result<String> {
    let mut part = XmlPart::parse(xml)?;
    let levels = part.levels();
    let counters: Vec<usize> = (0..part.events.len())
        .filter(|&i| opens(&part.events[i], b"TotalTime"))
        .collect();

    for at in counters.into_iter().rev() {
        let end = part.close_of(&levels, at);
        part.events.splice(at..=end, element("TotalTime", &[], "0"));
    }
    part.write()
}

/// Replace the root's `tag` child with `<tag attrs>value</tag>`, appending the
/// element when it is absent.
fn set_element(part: &mut XmlPart<'_>, tag: &'static str, attrs: &[(&str, &str)], value: &str) {
    let levels = part.levels();
    let existing =
        (0..part.events.len()).find(|&i| levels[i] == 1 && opens(&part.events[i], tag.as_bytes()));

    match existing {
        Some(at) => {
            let end = part.close_of(&levels, at);
            part.events.splice(at..=end, element(tag, attrs, value));
        }
        None => {
            let at = (0..part.events.len())
                .rev()
                .find(|&i| levels[i] == 0 && matches!(part.events[i], Event::End(_)))
                .unwrap_or(part.events.len());
            part.events.splice(at..at, element(tag, attrs, value));
        }
    }
}

fn element<'a>(tag: &'static str, attrs: &[(&str, &str)], value: &str) -> [Event<'a>; 3] {
    let mut start = BytesStart::new(tag);
    for &attr in attrs {
        start.push_attribute(attr);
    }
    [
        Event::Start(start),
        Event::Text(BytesText::from_escaped(escape(value).into_owned())),
        Event::End(BytesEnd::new(tag)),
    ]
}
