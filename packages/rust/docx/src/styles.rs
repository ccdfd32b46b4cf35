//! Font overrides on the style sheet (`word/styles.xml`).

use std::collections::BTreeMap;

use quick_xml::events::{BytesEnd, BytesStart, Event};

use paper_shared::Result;

use crate::xml::{XmlPart, attr_value, opens};

const STYLE: &[u8] = b"w:style";
const STYLE_NAME: &[u8] = b"w:name";
const RUN_PROPS: &str = "w:rPr";
const RUN_FONTS: &[u8] = b"w:rFonts";

/// Children of a style that come after its run properties.
const AFTER_RUN_PROPS: [&[u8]; 4] = [b"w:tblPr", b"w:trPr", b"w:tcPr", b"w:tblStylePr"];

/// Set the run font of each named style.
///
/// Styles are matched by id first, then by display name. Only the style's own
/// run properties change; conditional formatting nested inside it (table
/// regions and the like) keeps its fonts. Returns the rewritten style sheet
/// and the names that matched no style.
pub fn apply_font_overrides(
    xml: &str,
    overrides: &BTreeMap<String, String>,
) -> Result<(String, Vec<String>)> {
    if overrides.is_empty() {
        return Ok((xml.to_string(), Vec::new()));
    }

    let mut part = XmlPart::parse(xml)?;
    let levels = part.levels();
    let styles: Vec<(usize, usize)> = (0..part.events.len())
        .filter(|&i| matches!(&part.events[i], Event::Start(e) if e.name().as_ref() == STYLE))
        .map(|i| (i, part.close_of(&levels, i)))
        .collect();

    let mut applied: Vec<&str> = Vec::new();

    // Back to front, so earlier indices stay valid across splices.
    for (start, end) in styles.into_iter().rev() {
        let mut style = XmlPart {
            events: part.events.drain(start..=end).collect(),
        };
        if let Some(font) = style_font(&style, overrides, &mut applied)? {
            set_run_font(&mut style, font);
        }
        part.events.splice(start..start, style.events);
    }

    let missing = overrides
        .keys()
        .filter(|name| !applied.contains(&name.as_str()))
        .cloned()
        .collect();

    Ok((part.write()?, missing))
}

/// The override that applies to this style element, if any.
fn style_font<'o>(
    style: &XmlPart<'_>,
    overrides: &'o BTreeMap<String, String>,
    applied: &mut Vec<&'o str>,
) -> Result<Option<&'o str>> {
    let levels = style.levels();
    let id = match style.events.first() {
        Some(Event::Start(e)) => attr_value(e, "w:styleId")?,
        _ => None,
    };
    let name = match style
        .events
        .iter()
        .zip(&levels)
        .find(|(event, level)| **level == 1 && opens(event, STYLE_NAME))
    {
        Some((Event::Start(e) | Event::Empty(e), _)) => attr_value(e, "w:val")?,
        _ => None,
    };

    for (key, font) in overrides {
        if id.as_deref() == Some(key.as_str()) || name.as_deref() == Some(key.as_str()) {
            applied.push(key.as_str());
            return Ok(Some(font.as_str()));
        }
    }
    Ok(None)
}

/// Point the style's direct `w:rPr` at `font`, creating it when absent.
fn set_run_font(style: &mut XmlPart<'_>, font: &str) {
    let levels = style.levels();
    let events = &style.events;
    let run_props = (0..events.len())
        .find(|&i| levels[i] == 1 && opens(&events[i], RUN_PROPS.as_bytes()));

    match run_props {
        Some(i) if matches!(events[i], Event::Empty(_)) => {
            style.events.splice(i..=i, run_properties(font));
        }
        Some(i) => {
            let close = style.close_of(&levels, i);
            let existing =
                (i + 1..close).find(|&j| levels[j] == 2 && opens(&events[j], RUN_FONTS));
            match existing {
                Some(j) => {
                    let end = style.close_of(&levels, j);
                    style.events.splice(j..=end, [run_fonts(font)]);
                }
                None => style.events.insert(i + 1, run_fonts(font)),
            }
        }
        None => {
            let at = (1..events.len())
                .find(|&i| levels[i] == 1 && AFTER_RUN_PROPS.iter().any(|n| opens(&events[i], n)))
                .unwrap_or(events.len().saturating_sub(1));
            style.events.splice(at..at, run_properties(font));
        }
    }
}

fn run_fonts<'a>(font: &str) -> Event<'a> {
    let mut fonts = BytesStart::new("w:rFonts");
    for key in ["w:ascii", "w:hAnsi", "w:eastAsia", "w:cs"] {
        fonts.push_attribute((key, font));
    }
    Event::Empty(fonts)
}

fn run_properties<'a>(font: &str) -> [Event<'a>; 3] {
    [
        Event::Start(BytesStart::new(RUN_PROPS)),
        run_fonts(font),
        Event::End(BytesEnd::new(RUN_PROPS)),
    ]
}
