//! Substitutes free references to an identifier in JavaScript source.
//!
//! Only whole identifier tokens are replaced. Property accesses
//! (`config.ROUTES`, `config?.ROUTES`), string and template literal text,
//! regular expression literals, and comments are left alone. Spread
//! (`...ROUTES`) and template substitutions (`${ROUTES}`) are code and are
//! replaced.
//!
//! A `/` opens a regular expression when it follows punctuation or a keyword
//! such as `return`. After `<` or `>` it is read as a division, so JSX
//! closing tags stay code.

/// Replace every free reference to `identifier` in `source` with `replacement`.
pub fn substitute(source: &str, identifier: &str, replacement: &str) -> String {
    let bytes = source.as_bytes();
    let mut out = String::with_capacity(source.len());
    // brace depth at which each open `${` substitution started
    let mut templates: Vec<usize> = Vec::new();
    let mut depth = 0usize;
    let mut copied = 0;
    let mut i = 0;

    while i < bytes.len() {
        match bytes[i] {
            quote @ (b'\'' | b'"') => i = skip_quoted(bytes, i + 1, quote),
            b'`' => i = skip_template(bytes, i + 1, &mut templates, &mut depth),
            b'/' if bytes.get(i + 1) == Some(&b'/') => {
                i = bytes[i..]
                    .iter()
                    .position(|&b| b == b'\n')
                    .map_or(bytes.len(), |n| i + n);
            }
            b'/' if bytes.get(i + 1) == Some(&b'*') => {
                i = source[i + 2..]
                    .find("*/")
                    .map_or(bytes.len(), |n| i + 2 + n + 2);
            }
            b'/' if starts_regex(&bytes[..i]) => i = skip_regex(bytes, i + 1),
            b'{' => {
                depth += 1;
                i += 1;
            }
            b'}' => {
                depth = depth.saturating_sub(1);
                i += 1;
                if templates.last() == Some(&depth) {
                    templates.pop();
                    i = skip_template(bytes, i, &mut templates, &mut depth);
                }
            }
            b if is_identifier_byte(b) => {
                let start = i;
                while i < bytes.len() && is_identifier_byte(bytes[i]) {
                    i += 1;
                }
                let token = &source[start..i];
                if token == identifier
                    && !bytes[start].is_ascii_digit()
                    && !is_property_access(&bytes[..start])
                {
                    out.push_str(&source[copied..start]);
                    out.push_str(replacement);
                    copied = i;
                }
            }
            _ => i += 1,
        }
    }

    out.push_str(&source[copied..]);
    out
}

// Non-ASCII bytes are treated as identifier characters so a multi-byte
// character never splits a token.
fn is_identifier_byte(b: u8) -> bool {
    b.is_ascii_alphanumeric() || b == b'_' || b == b'$' || b >= 0x80
}

fn is_property_access(before: &[u8]) -> bool {
    let mut rest = before
        .iter()
        .rev()
        .skip_while(|b| b.is_ascii_whitespace());
    match rest.next() {
        // `...name` is a spread, not a member access
        Some(b'.') => !(rest.next() == Some(&b'.') && rest.next() == Some(&b'.')),
        _ => false,
    }
}

const REGEX_KEYWORDS: &[&[u8]] = &[
    b"return", b"typeof", b"instanceof", b"case", b"do", b"else", b"in", b"of", b"new",
    b"delete", b"void", b"throw", b"yield", b"await",
];

/// Whether a `/` after `before` opens a regular expression literal rather
/// than a division.
fn starts_regex(before: &[u8]) -> bool {
    let before = before.trim_ascii_end();
    match before.last() {
        None => true,
        Some(b) if b"(,=:[!&|?{};+-*%~^".contains(b) => true,
        Some(&b) if is_identifier_byte(b) => {
            let start = before
                .iter()
                .rposition(|&b| !is_identifier_byte(b))
                .map_or(0, |n| n + 1);
            REGEX_KEYWORDS.contains(&&before[start..])
        }
        _ => false,
    }
}

/// Index just past a regular expression literal and its flags. An
/// unterminated literal ends at the line break.
fn skip_regex(bytes: &[u8], mut i: usize) -> usize {
    let mut in_class = false;
    while i < bytes.len() {
        match bytes[i] {
            b'\\' => i += 2,
            b'\n' => return i,
            b'[' => {
                in_class = true;
                i += 1;
            }
            b']' => {
                in_class = false;
                i += 1;
            }
            b'/' if !in_class => {
                i += 1;
                while i < bytes.len() && is_identifier_byte(bytes[i]) {
                    i += 1;
                }
                return i;
            }
            _ => i += 1,
        }
    }
    bytes.len()
}

/// Index just past the closing `quote`, or the end of input.
fn skip_quoted(bytes: &[u8], mut i: usize, quote: u8) -> usize {
    while i < bytes.len() {
        match bytes[i] {
            b'\\' => i += 2,
            b if b == quote => return i + 1,
            b'\n' => return i + 1,
            _ => i += 1,
        }
    }
    bytes.len()
}

/// Skip template text. Returns the index past the closing backtick, or past
/// a `${` whose depth is recorded in `templates`.
fn skip_template(bytes: &[u8], mut i: usize, templates: &mut Vec<usize>, depth: &mut usize) -> usize {
    while i < bytes.len() {
        match bytes[i] {
            b'\\' => i += 2,
            b'`' => return i + 1,
            b'$' if bytes.get(i + 1) == Some(&b'{') => {
                templates.push(*depth);
                *depth += 1;
                return i + 2;
            }
            _ => i += 1,
        }
    }
    bytes.len()
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    fn sub(source: &str) -> String {
        substitute(source, "PAGES", "[]")
    }

    #[test]
    fn test_replaces_free_reference() {
        assert_eq!(
            sub("export const pagesRef = PAGES"),
            "export const pagesRef = []"
        );
        assert_eq!(sub("f(PAGES, PAGES)"), "f([], [])");
    }

    #[test]
    fn test_keeps_longer_identifiers() {
        assert_eq!(sub("PAGES_2 + $PAGES + PAGES$"), "PAGES_2 + $PAGES + PAGES$");
    }

    #[test]
    fn test_keeps_property_access() {
        assert_eq!(sub("a.PAGES; a?.PAGES; a . PAGES"), "a.PAGES; a?.PAGES; a . PAGES");
    }

    #[test]
    fn test_replaces_spread() {
        assert_eq!(sub("[...PAGES]"), "[...[]]");
    }

    #[test]
    fn test_skips_strings_and_comments() {
        let source = "'PAGES' \"PAGES\" // PAGES\n/* PAGES */ PAGES";
        assert_eq!(sub(source), "'PAGES' \"PAGES\" // PAGES\n/* PAGES */ []");
    }

    #[test]
    fn test_template_literals() {
        assert_eq!(sub("`PAGES ${PAGES} ${ {a: PAGES} }`"), "`PAGES ${[]} ${ {a: []} }`");
        assert_eq!(sub("`${`${PAGES}`}` PAGES"), "`${`${[]}`}` []");
    }

    #[test]
    fn test_escaped_quotes() {
        assert_eq!(sub(r#"'it\'s PAGES' + PAGES"#), r#"'it\'s PAGES' + []"#);
    }

    #[test]
    fn test_skips_regex_literals() {
        assert_eq!(
            sub("x = /PAGES/g.test(s) ? PAGES : 0"),
            "x = /PAGES/g.test(s) ? [] : 0"
        );
        assert_eq!(sub("f(/[/PAGES]/, PAGES)"), "f(/[/PAGES]/, [])");
        assert_eq!(sub("return /PAGES\\/x/.source"), "return /PAGES\\/x/.source");
    }

    #[test]
    fn test_division_is_code() {
        assert_eq!(sub("n = total / PAGES / 2"), "n = total / [] / 2");
        assert_eq!(sub("(a) / PAGES"), "(a) / []");
    }

    #[test]
    fn test_jsx_closing_tags_are_code() {
        assert_eq!(
            sub("<li>a</li><li>{PAGES.length}</li>"),
            "<li>a</li><li>{[].length}</li>"
        );
    }

    #[test]
    fn test_unterminated_input_is_copied() {
        assert_eq!(sub("PAGES + 'open"), "[] + 'open");
        assert_eq!(sub("PAGES /* open"), "[] /* open");
    }

    #[test]
    fn test_non_ascii_neighbours() {
        assert_eq!(sub("PAGESé + é(PAGES)"), "PAGESé + é([])");
    }
}
