//! Character-set normalisation: transliteration to printable ASCII and
//! punctuation removal.

/// Punctuation removed by [`strip_punctuation`].
pub const PUNCTUATION: &[char] = &[
    ',', '.', '?', '!', ';', ':', '"', '(', ')', '[', ']', '{', '}', '*',
];

/// ASCII replacement for a known non-ASCII character.
///
/// Covers the characters that actually occur in early modern transcriptions:
/// long s, ligatures, thorn/eth/yogh, accented and macron letters, and
/// typographic quotes and dashes.
pub fn transliterate(c: char) -> Option<&'static str> {
    let replacement = match c {
        'ſ' => "s",
        'ꝛ' => "r",
        'ß' => "ss",
        'æ' | 'ǣ' | 'ǽ' => "ae",
        'Æ' | 'Ǣ' | 'Ǽ' => "Ae",
        'œ' => "oe",
        'Œ' => "Oe",
        'ﬀ' => "ff",
        'ﬁ' => "fi",
        'ﬂ' => "fl",
        'ﬃ' => "ffi",
        'ﬄ' => "ffl",
        'ﬅ' | 'ﬆ' => "st",
        'þ' | 'ð' => "th",
        'Þ' | 'Ð' => "Th",
        'ȝ' => "y",
        'Ȝ' => "Y",
        'ʋ' => "v",
        'Ʋ' => "V",
        'à' | 'á' | 'â' | 'ã' | 'ä' | 'å' | 'ā' | 'ă' | 'ą' => "a",
        'À' | 'Á' | 'Â' | 'Ã' | 'Ä' | 'Å' | 'Ā' | 'Ă' | 'Ą' => "A",
        'ç' | 'ć' | 'č' => "c",
        'Ç' | 'Ć' | 'Č' => "C",
        'è' | 'é' | 'ê' | 'ë' | 'ē' | 'ĕ' | 'ė' | 'ę' | 'ě' | 'ẽ' => "e",
        'È' | 'É' | 'Ê' | 'Ë' | 'Ē' | 'Ĕ' | 'Ė' | 'Ę' | 'Ě' | 'Ẽ' => "E",
        'ì' | 'í' | 'î' | 'ï' | 'ĩ' | 'ī' | 'ĭ' | 'į' | 'ı' => "i",
        'Ì' | 'Í' | 'Î' | 'Ï' | 'Ĩ' | 'Ī' | 'Ĭ' | 'Į' | 'İ' => "I",
        'ñ' | 'ń' | 'ň' => "n",
        'Ñ' | 'Ń' | 'Ň' => "N",
        'ò' | 'ó' | 'ô' | 'õ' | 'ö' | 'ø' | 'ō' | 'ŏ' | 'ő' => "o",
        'Ò' | 'Ó' | 'Ô' | 'Õ' | 'Ö' | 'Ø' | 'Ō' | 'Ŏ' | 'Ő' => "O",
        'ù' | 'ú' | 'û' | 'ü' | 'ũ' | 'ū' | 'ŭ' | 'ů' | 'ű' | 'ų' => "u",
        'Ù' | 'Ú' | 'Û' | 'Ü' | 'Ũ' | 'Ū' | 'Ŭ' | 'Ů' | 'Ű' | 'Ų' => "U",
        'ý' | 'ÿ' | 'ŷ' | 'ẏ' => "y",
        'Ý' | 'Ÿ' | 'Ŷ' => "Y",
        'ꝑ' | 'ꝓ' => "p",
        'ꝗ' | 'ꝙ' => "q",
        'ś' | 'š' => "s",
        'Ś' | 'Š' => "S",
        'ž' | 'ź' | 'ż' => "z",
        'Ž' | 'Ź' | 'Ż' => "Z",
        '‘' | '’' | 'ʼ' | '′' => "'",
        '“' | '”' | '„' | '«' | '»' => "\"",
        '—' | '―' => "--",
        '–' | '‐' | '‑' => "-",
        '…' => "...",
        _ => return None,
    };
    Some(replacement)
}

/// Combining diacritics are dropped; the base letter already carries the word.
fn is_combining_mark(c: char) -> bool {
    matches!(c, '\u{0300}'..='\u{036F}' | '\u{1DC0}'..='\u{1DFF}' | '\u{FE20}'..='\u{FE2F}')
}

/// Reduce `text` to printable ASCII.
///
/// Known characters are transliterated, `|` and control characters are
/// dropped, whitespace of any kind becomes a plain space. Anything else is
/// replaced with `unknown` when given, otherwise dropped.
pub fn filter_text(text: &str, unknown: Option<&str>) -> String {
    let mut out = String::with_capacity(text.len());
    for c in text.chars() {
        if c == '|' {
            continue;
        }
        if c.is_whitespace() {
            out.push(' ');
        } else if c.is_ascii_graphic() {
            out.push(c);
        } else if c.is_control() || is_combining_mark(c) {
            continue;
        } else if let Some(replacement) = transliterate(c) {
            out.push_str(replacement);
        } else if let Some(placeholder) = unknown {
            out.push_str(placeholder);
        }
    }
    out
}

/// Remove sentence punctuation and turn `--` into a word break.
pub fn strip_punctuation(text: &str) -> String {
    let stripped: String = text.chars().filter(|c| !PUNCTUATION.contains(c)).collect();
    stripped.replace("--", " ")
}
