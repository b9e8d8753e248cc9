use super::{is_raw_text_tag, is_void_tag, Document, DomError, NodeId};

pub(super) fn parse_into(doc: &mut Document, parent: NodeId, html: &str) -> Result<(), DomError> {
    let bytes = html.as_bytes();
    let mut stack: Vec<(NodeId, String)> = Vec::new();
    let mut i = 0usize;
    let mut text_start = 0usize;

    let current = |stack: &Vec<(NodeId, String)>| stack.last().map(|(id, _)| *id).unwrap_or(parent);

    while i < bytes.len() {
        if bytes[i] != b'<' {
            i += 1;
            continue;
        }

        let markup = if starts_with_at(bytes, i, b"<!--") {
            Markup::Comment
        } else if starts_with_at(bytes, i, b"<!") || starts_with_at(bytes, i, b"<?") {
            Markup::Declaration
        } else if starts_with_at(bytes, i, b"</") && bytes.get(i + 2).is_some_and(|b| b.is_ascii_alphabetic()) {
            Markup::EndTag
        } else if bytes.get(i + 1).is_some_and(|b| b.is_ascii_alphabetic()) {
            Markup::StartTag
        } else {
            // a bare '<' in text
            i += 1;
            continue;
        };

        flush_text(doc, current(&stack), &html[text_start..i]);

        match markup {
            Markup::Comment => {
                let end = find_subslice(bytes, i + 4, b"-->").ok_or_else(|| DomError::Parse {
                    offset: i,
                    message: "unclosed comment".to_string(),
                })?;
                i = end + 3;
            }
            Markup::Declaration => {
                let end = find_byte(bytes, i, b'>').ok_or_else(|| DomError::Parse {
                    offset: i,
                    message: "unclosed declaration".to_string(),
                })?;
                i = end + 1;
            }
            Markup::EndTag => {
                let (tag, next) = parse_end_tag(html, i)?;
                i = next;
                // Stray end tags are dropped instead of unwinding the whole stack.
                if let Some(pos) = stack.iter().rposition(|(_, t)| *t == tag) {
                    stack.truncate(pos);
                }
            }
            Markup::StartTag => {
                let (tag, attrs, self_closing, next) = parse_start_tag(html, i)?;
                i = next;
                let node = doc.create_element(current(&stack), tag.clone(), attrs);

                if is_raw_text_tag(&tag) {
                    let close = find_end_tag_ci(bytes, i, tag.as_bytes()).ok_or_else(|| {
                        DomError::Parse {
                            offset: i,
                            message: format!("unclosed <{tag}>"),
                        }
                    })?;
                    if close > i {
                        doc.create_text(node, html[i..close].to_string());
                    }
                    let (_, after) = parse_end_tag(html, close)?;
                    i = after;
                } else if !self_closing && !is_void_tag(&tag) {
                    stack.push((node, tag));
                }
            }
        }
        text_start = i;
    }

    flush_text(doc, current(&stack), &html[text_start..]);
    Ok(())
}

enum Markup {
    Comment,
    Declaration,
    EndTag,
    StartTag,
}

fn flush_text(doc: &mut Document, parent: NodeId, raw: &str) {
    if !raw.is_empty() {
        doc.create_text(parent, decode_entities(raw));
    }
}

type StartTag = (String, Vec<(String, String)>, bool, usize);

fn parse_start_tag(html: &str, at: usize) -> Result<StartTag, DomError> {
    let bytes = html.as_bytes();
    let mut i = at + 1;
    let tag_start = i;
    while i < bytes.len() && is_tag_char(bytes[i]) {
        i += 1;
    }
    let tag = html[tag_start..i].to_ascii_lowercase();

    let mut attrs: Vec<(String, String)> = Vec::new();
    let mut self_closing = false;
    loop {
        skip_ws(bytes, &mut i);
        if i >= bytes.len() {
            return Err(DomError::Parse {
                offset: at,
                message: format!("unclosed start tag <{tag}>"),
            });
        }
        if bytes[i] == b'>' {
            i += 1;
            break;
        }
        if bytes[i] == b'/' {
            if bytes.get(i + 1) == Some(&b'>') {
                self_closing = true;
                i += 2;
                break;
            }
            i += 1;
            continue;
        }

        let name_start = i;
        while i < bytes.len() && is_attr_name_char(bytes[i]) {
            i += 1;
        }
        if name_start == i {
            return Err(DomError::Parse {
                offset: i,
                message: format!("invalid attribute in <{tag}>"),
            });
        }
        let name = html[name_start..i].to_ascii_lowercase();

        skip_ws(bytes, &mut i);
        let value = if bytes.get(i) == Some(&b'=') {
            i += 1;
            skip_ws(bytes, &mut i);
            parse_attr_value(html, &mut i)?
        } else {
            String::new()
        };
        if !attrs.iter().any(|(k, _)| *k == name) {
            attrs.push((name, value));
        }
    }

    Ok((tag, attrs, self_closing, i))
}

fn parse_end_tag(html: &str, at: usize) -> Result<(String, usize), DomError> {
    let bytes = html.as_bytes();
    let mut i = at + 2;
    let tag_start = i;
    while i < bytes.len() && is_tag_char(bytes[i]) {
        i += 1;
    }
    let tag = html[tag_start..i].to_ascii_lowercase();
    let end = find_byte(bytes, i, b'>').ok_or_else(|| DomError::Parse {
        offset: at,
        message: format!("unclosed end tag </{tag}>"),
    })?;
    Ok((tag, end + 1))
}

fn parse_attr_value(html: &str, i: &mut usize) -> Result<String, DomError> {
    let bytes = html.as_bytes();
    if let Some(&quote) = bytes.get(*i).filter(|b| **b == b'"' || **b == b'\'') {
        let start = *i + 1;
        let end = find_byte(bytes, start, quote).ok_or_else(|| DomError::Parse {
            offset: *i,
            message: "unclosed quoted attribute value".to_string(),
        })?;
        *i = end + 1;
        return Ok(decode_entities(&html[start..end]));
    }

    let start = *i;
    while *i < bytes.len() && !bytes[*i].is_ascii_whitespace() && bytes[*i] != b'>' {
        if bytes[*i] == b'/' && bytes.get(*i + 1) == Some(&b'>') {
            break;
        }
        *i += 1;
    }
    Ok(decode_entities(&html[start..*i]))
}

pub(super) fn decode_entities(raw: &str) -> String {
    if !raw.contains('&') {
        return raw.to_string();
    }
    let mut out = String::with_capacity(raw.len());
    let mut rest = raw;
    while let Some(pos) = rest.find('&') {
        out.push_str(&rest[..pos]);
        rest = &rest[pos..];
        let decoded = rest
            .find(';')
            .filter(|end| *end <= 10)
            .and_then(|end| decode_entity(&rest[1..end]).map(|ch| (ch, end)));
        match decoded {
            Some((ch, end)) => {
                out.push(ch);
                rest = &rest[end + 1..];
            }
            None => {
                out.push('&');
                rest = &rest[1..];
            }
        }
    }
    out.push_str(rest);
    out
}

fn decode_entity(name: &str) -> Option<char> {
    if let Some(num) = name.strip_prefix('#') {
        let code = match num.strip_prefix('x').or_else(|| num.strip_prefix('X')) {
            Some(hex) => u32::from_str_radix(hex, 16).ok()?,
            None => num.parse::<u32>().ok()?,
        };
        return char::from_u32(code);
    }
    match name {
        "amp" => Some('&'),
        "lt" => Some('<'),
        "gt" => Some('>'),
        "quot" => Some('"'),
        "apos" => Some('\''),
        "nbsp" => Some('\u{a0}'),
        "laquo" => Some('\u{ab}'),
        "raquo" => Some('\u{bb}'),
        _ => None,
    }
}

fn skip_ws(bytes: &[u8], i: &mut usize) {
    while *i < bytes.len() && bytes[*i].is_ascii_whitespace() {
        *i += 1;
    }
}

fn is_tag_char(b: u8) -> bool {
    b.is_ascii_alphanumeric() || b == b'-' || b == b'_'
}

fn is_attr_name_char(b: u8) -> bool {
    !b.is_ascii_whitespace() && !matches!(b, b'>' | b'/' | b'=' | b'"' | b'\'')
}

fn starts_with_at(bytes: &[u8], at: usize, needle: &[u8]) -> bool {
    bytes.get(at..at + needle.len()) == Some(needle)
}

fn find_byte(bytes: &[u8], from: usize, needle: u8) -> Option<usize> {
    bytes
        .get(from..)?
        .iter()
        .position(|b| *b == needle)
        .map(|p| p + from)
}

fn find_subslice(bytes: &[u8], from: usize, needle: &[u8]) -> Option<usize> {
    bytes
        .get(from..)?
        .windows(needle.len())
        .position(|w| w == needle)
        .map(|p| p + from)
}

fn find_end_tag_ci(bytes: &[u8], from: usize, tag: &[u8]) -> Option<usize> {
    let mut i = from;
    while let Some(pos) = find_subslice(bytes, i, b"</") {
        let name = bytes.get(pos + 2..pos + 2 + tag.len())?;
        if name.eq_ignore_ascii_case(tag) {
            return Some(pos);
        }
        i = pos + 2;
    }
    None
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::dom::Selector;

    #[test]
    fn stray_end_tag_does_not_close_open_elements() {
        let doc = Document::parse("<div id=\"a\"></span><p>x</p></div>").unwrap();
        let a = doc.element_by_id("a").unwrap();
        assert_eq!(doc.inner_html(a), "<p>x</p>");
    }

    #[test]
    fn comments_and_doctype_are_skipped() {
        let doc = Document::parse("<!DOCTYPE html><!-- note --><p>x</p>").unwrap();
        assert_eq!(doc.to_html(), "<p>x</p>");
    }

    #[test]
    fn void_and_self_closing_tags_do_not_nest() {
        let doc = Document::parse("<div><br><img src=\"a.png\"/><span>s</span></div>").unwrap();
        let span = doc.query_selector(&Selector::parse("div > span").unwrap());
        assert!(span.is_some());
    }

    #[test]
    fn script_bodies_are_raw_text() {
        let doc = Document::parse("<script>if (a < b) { x(); }</script><p>after</p>").unwrap();
        assert_eq!(
            doc.to_html(),
            "<script>if (a < b) { x(); }</script><p>after</p>"
        );
    }

    #[test]
    fn bare_less_than_stays_in_text() {
        let doc = Document::parse("<p>1 < 2</p>").unwrap();
        let p = doc.query_selector(&Selector::parse("p").unwrap()).unwrap();
        assert_eq!(doc.text_content(p), "1 < 2");
    }

    #[test]
    fn unterminated_constructs_fail() {
        assert!(matches!(
            Document::parse("<div class=\"x"),
            Err(DomError::Parse { .. })
        ));
        assert!(matches!(
            Document::parse("<p>x</p><!-- open"),
            Err(DomError::Parse { .. })
        ));
    }

    #[test]
    fn entities_decode_named_and_numeric() {
        assert_eq!(decode_entities("&laquo; Prev &#38; &#x41;"), "\u{ab} Prev & A");
        assert_eq!(decode_entities("AT&T"), "AT&T");
    }
}
