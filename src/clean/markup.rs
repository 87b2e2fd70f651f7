//! Markup removal for raw speech fragments.

use quick_xml::Reader;
use quick_xml::events::{BytesStart, Event};

/// Elements removed together with everything inside them.
const DELETED: &[&[u8]] = &[b"note", b"pb", b"stage", b"bibl", b"floatingText"];

const GLYPH: &[u8] = b"g";
const GAP: &[u8] = b"gap";

/// Marker emitted for each letter of a gap in the source.
pub const GAP_MARKER: char = '^';

/// Replacement text for a `<g ref="char:...">` glyph, or `None` to keep the
/// glyph's own text.
fn glyph_replacement(reference: &str) -> Option<&'static str> {
    let name = reference.strip_prefix("char:").unwrap_or(reference);
    match name {
        "cmbAbbrStroke" => Some("m"),
        "V" => Some("V"),
        "EOLhyphen" | "EOLunhyphen" | "punc" | "leaf" => Some(""),
        // abbreviation marks (abque, abper, ...)
        n if n.starts_with("ab") => Some(""),
        _ => None,
    }
}

fn attribute(element: &BytesStart<'_>, name: &str) -> Option<String> {
    element
        .try_get_attribute(name)
        .ok()
        .flatten()
        .map(|attr| String::from_utf8_lossy(&attr.value).into_owned())
}

/// Number of letters a `<gap extent="...">` stands for.
///
/// Only letter counts are filled in (`"3 letters"`); words, lines or a
/// missing extent give zero.
fn gap_letters(element: &BytesStart<'_>) -> usize {
    let Some(extent) = attribute(element, "extent") else {
        return 0;
    };
    let mut parts = extent.split_whitespace();
    match (parts.next().map(str::parse::<usize>), parts.next()) {
        (Some(Ok(count)), Some(unit)) if unit.starts_with("letter") => count,
        _ => 0,
    }
}

/// Replace TCP shorthand that survives entity decoding.
fn expand_ampersands(text: &str) -> String {
    text.replace("&c", "etc").replace('&', "and")
}

/// What a start tag contributes to the text.
enum Opening {
    /// Emit this text and drop the element's content.
    Replace(String),
    /// Keep the element's content.
    Descend,
}

fn opening(element: &BytesStart<'_>) -> Opening {
    let local = element.local_name();
    let name = local.as_ref();
    if DELETED.contains(&name) {
        return Opening::Replace(String::new());
    }
    if name == GAP {
        return Opening::Replace(GAP_MARKER.to_string().repeat(gap_letters(element)));
    }
    if name == GLYPH
        && let Some(replacement) = attribute(element, "ref")
            .as_deref()
            .and_then(glyph_replacement)
    {
        return Opening::Replace(replacement.to_string());
    }
    Opening::Descend
}

/// Strip all markup from a fragment, keeping text content.
///
/// Returns an error message when the fragment is not well-formed.
pub fn strip_markup(fragment: &str) -> Result<String, String> {
    let mut reader = Reader::from_str(fragment);
    let mut text = String::with_capacity(fragment.len());
    let mut depth = 0usize;
    // Depth at which content is being dropped.
    let mut skip_from: Option<usize> = None;

    loop {
        let event = reader.read_event().map_err(|e| e.to_string())?;
        match event {
            Event::Start(e) => {
                depth += 1;
                if skip_from.is_some() {
                    continue;
                }
                if let Opening::Replace(replacement) = opening(&e) {
                    text.push_str(&replacement);
                    skip_from = Some(depth);
                }
            }
            Event::Empty(e) => {
                if skip_from.is_none()
                    && let Opening::Replace(replacement) = opening(&e)
                {
                    text.push_str(&replacement);
                }
            }
            Event::End(_) => {
                if skip_from == Some(depth) {
                    skip_from = None;
                }
                depth = depth
                    .checked_sub(1)
                    .ok_or_else(|| "unbalanced end tag".to_string())?;
            }
            Event::Text(t) if skip_from.is_none() => {
                let decoded = t
                    .unescape()
                    .map(|c| c.into_owned())
                    .unwrap_or_else(|_| String::from_utf8_lossy(&t).into_owned());
                text.push_str(&expand_ampersands(&decoded));
            }
            Event::CData(c) if skip_from.is_none() => {
                text.push_str(&String::from_utf8_lossy(&c));
            }
            Event::Eof => {
                if depth != 0 {
                    return Err(format!("{depth} unclosed element(s)"));
                }
                break;
            }
            _ => {}
        }
    }

    Ok(text)
}

/// Fallback for fragments that are not well-formed: drop everything between
/// `<` and `>`, then decode entities where possible.
pub fn strip_tags_lossy(fragment: &str) -> String {
    let mut text = String::with_capacity(fragment.len());
    let mut in_tag = false;
    for c in fragment.chars() {
        match c {
            '<' => in_tag = true,
            '>' if in_tag => in_tag = false,
            _ if !in_tag => text.push(c),
            _ => {}
        }
    }
    let decoded = quick_xml::escape::unescape(&text)
        .map(|c| c.into_owned())
        .unwrap_or(text);
    expand_ampersands(&decoded)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn keeps_text_of_plain_and_nested_elements() {
        assert_eq!(strip_markup("<l>To be</l>").unwrap(), "To be");
        assert_eq!(
            strip_markup("<l>that is the <hi>question</hi>:</l>").unwrap(),
            "that is the question:"
        );
        assert_eq!(
            strip_markup("<p>O for a <l>muse</l> of fire</p>").unwrap(),
            "O for a muse of fire"
        );
    }

    #[test]
    fn self_closing_elements_contribute_nothing() {
        assert_eq!(strip_markup("<l>wor<lb/>ld</l>").unwrap(), "world");
        assert_eq!(strip_markup("<l>a<figure/>b</l>").unwrap(), "ab");
    }

    #[test]
    fn deleted_elements_drop_their_content() {
        assert_eq!(
            strip_markup("<l>Farewell <stage>Exit.</stage>sweet</l>").unwrap(),
            "Farewell sweet"
        );
        assert_eq!(
            strip_markup("<l>text<note n=\"1\">a <hi>long</hi> note</note> more</l>").unwrap(),
            "text more"
        );
        assert_eq!(strip_markup("<l>a<pb n=\"3\"/>b</l>").unwrap(), "ab");
    }

    #[test]
    fn glyphs_are_resolved() {
        assert_eq!(
            strip_markup(r#"<l>fro<g ref="char:cmbAbbrStroke">̄</g></l>"#).unwrap(),
            "from"
        );
        assert_eq!(
            strip_markup(r#"<l>hap<g ref="char:EOLhyphen"/>py</l>"#).unwrap(),
            "happy"
        );
        assert_eq!(
            strip_markup(r#"<l><g ref="char:V">Ʋ</g>ERTUE</l>"#).unwrap(),
            "VERTUE"
        );
        assert_eq!(
            strip_markup(r#"<l>ne<g ref="char:abque"/></l>"#).unwrap(),
            "ne"
        );
        assert_eq!(
            strip_markup(r#"<l><g ref="char:punc">▪</g>So</l>"#).unwrap(),
            "So"
        );
        // unknown glyphs keep their text
        assert_eq!(
            strip_markup(r#"<l><g ref="char:slongbar">ſ</g>o</l>"#).unwrap(),
            "ſo"
        );
    }

    #[test]
    fn gaps_become_markers() {
        assert_eq!(
            strip_markup(r#"<l>gen<gap reason="illegible" extent="2 letters"/>le</l>"#).unwrap(),
            "gen^^le"
        );
        assert_eq!(
            strip_markup(r#"<l>a<gap extent="1 letter"><desc>x</desc></gap>b</l>"#).unwrap(),
            "a^b"
        );
        assert_eq!(
            strip_markup(r#"<l>a <gap extent="1 word"/> b</l>"#).unwrap(),
            "a  b"
        );
    }

    #[test]
    fn ampersands_are_expanded() {
        assert_eq!(strip_markup("<l>you &amp; I</l>").unwrap(), "you and I");
        assert_eq!(strip_markup("<l>lords, &amp;c.</l>").unwrap(), "lords, etc.");
    }

    #[test]
    fn namespaced_fragments_are_handled() {
        assert_eq!(
            strip_markup(r#"<ns0:l xmlns:ns0="http://www.tei-c.org/ns/1.0">Good <ns0:hi>night</ns0:hi></ns0:l>"#)
                .unwrap(),
            "Good night"
        );
    }

    #[test]
    fn malformed_fragment_is_an_error() {
        assert!(strip_markup("<l>open").is_err());
        assert!(strip_markup("<l>bad</p>").is_err());
    }

    #[test]
    fn lossy_strip_drops_tags() {
        assert_eq!(strip_tags_lossy("<l>open <hi>text"), "open text");
        assert_eq!(strip_tags_lossy("<l>a &amp; b</p>"), "a and b");
    }
}
