//! Backup loader.
//!
//! Reads an "SMS Backup & Restore" style XML export into a generic element
//! tree, then pulls `<sms>` and `<mms>` records out of the root. The whole
//! document is held in memory; backups are read once per run.

use crate::error::{ReportError, Result};
use crate::models::{Direction, Record, RecordKind};
use quick_xml::events::{BytesStart, Event};
use quick_xml::Reader;
use regex::{Captures, Regex};
use std::borrow::Cow;
use std::fs;
use std::path::Path;
use tracing::{debug, warn};

const EXPECTED_ROOT: &str = "smses";

const HIGH_SURROGATES: std::ops::RangeInclusive<u32> = 0xD800..=0xDBFF;
const LOW_SURROGATES: std::ops::RangeInclusive<u32> = 0xDC00..=0xDFFF;
const REPLACEMENT_REF: &str = "&#xFFFD;";

fn build_char_ref_regex() -> Regex {
    Regex::new(r"&#(x[0-9A-Fa-f]+|[0-9]+);").unwrap()
}

/// A parsed XML element. Attribute order follows the document.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct XmlElement {
    pub name: String,
    pub attributes: Vec<(String, String)>,
    pub children: Vec<XmlElement>,
    pub text: String,
}

impl XmlElement {
    pub fn attr(&self, key: &str) -> Option<&str> {
        self.attributes
            .iter()
            .find(|(k, _)| k == key)
            .map(|(_, v)| v.as_str())
    }

    /// Attribute value, or an empty string when the attribute is absent.
    pub fn attr_or_empty(&self, key: &str) -> String {
        self.attr(key).unwrap_or_default().to_string()
    }

    pub fn children_named<'a>(&'a self, name: &'a str) -> impl Iterator<Item = &'a XmlElement> + 'a {
        self.children.iter().filter(move |c| c.name == name)
    }
}

/// Read and parse the backup at `path`.
pub fn load_document(path: &Path) -> Result<XmlElement> {
    let content = fs::read_to_string(path).map_err(|source| ReportError::ReadInput {
        path: path.to_path_buf(),
        source,
    })?;
    debug!(path = %path.display(), bytes = content.len(), "read backup file");
    parse_document(&content)
}

fn char_ref_value(caps: &Captures) -> Option<u32> {
    let digits = caps.get(1)?.as_str();
    match digits.strip_prefix('x') {
        Some(hex) => u32::from_str_radix(hex, 16).ok(),
        None => digits.parse().ok(),
    }
}

/// Rewrite UTF-16 surrogate pairs written as two character references
/// (`&#55357;&#56832;`) into one reference to the real code point
/// (`&#x1F600;`). Unpaired surrogates become U+FFFD. Other references are
/// left as they are.
pub fn decode_surrogate_refs(xml: &str) -> Cow<'_, str> {
    if !xml.contains("&#") {
        return Cow::Borrowed(xml);
    }

    let re = build_char_ref_regex();
    let mut out = String::with_capacity(xml.len());
    let mut last = 0;
    let mut pending_high: Option<u32> = None;
    let mut unpaired = 0usize;

    for caps in re.captures_iter(xml) {
        let (Some(m), Some(code)) = (caps.get(0), char_ref_value(&caps)) else {
            continue;
        };
        if !HIGH_SURROGATES.contains(&code) && !LOW_SURROGATES.contains(&code) {
            continue;
        }

        // `out` ends exactly where a pending high surrogate was cut out.
        if let Some(high) = pending_high.take() {
            if m.start() == last && LOW_SURROGATES.contains(&code) {
                let combined = 0x10000 + ((high - 0xD800) << 10) + (code - 0xDC00);
                out.push_str(&format!("&#x{:X};", combined));
                last = m.end();
                continue;
            }
            out.push_str(REPLACEMENT_REF);
            unpaired += 1;
        }

        out.push_str(&xml[last..m.start()]);
        last = m.end();
        if HIGH_SURROGATES.contains(&code) {
            pending_high = Some(code);
        } else {
            out.push_str(REPLACEMENT_REF);
            unpaired += 1;
        }
    }

    if last == 0 {
        return Cow::Borrowed(xml);
    }
    if pending_high.is_some() {
        out.push_str(REPLACEMENT_REF);
        unpaired += 1;
    }
    out.push_str(&xml[last..]);

    if unpaired > 0 {
        warn!(count = unpaired, "unpaired surrogate references replaced with U+FFFD");
    }
    Cow::Owned(out)
}

/// Parse an XML string into its root element.
///
/// Entity or character references that still fail to unescape keep their
/// raw text and log a warning; only structural errors reject the document.
pub fn parse_document(xml: &str) -> Result<XmlElement> {
    let xml = decode_surrogate_refs(xml);
    let xml = xml.as_ref();
    let mut reader = Reader::from_str(xml);
    reader.config_mut().trim_text(true);

    let mut stack: Vec<XmlElement> = Vec::new();
    let mut root: Option<XmlElement> = None;

    loop {
        let position = reader.buffer_position() as u64;
        match reader.read_event() {
            Ok(Event::Start(start)) => {
                if stack.is_empty() && root.is_some() {
                    return Err(parse_error(position, "multiple root elements"));
                }
                stack.push(element_from_start(&start, position)?);
            }
            Ok(Event::Empty(start)) => {
                let element = element_from_start(&start, position)?;
                attach(&mut stack, &mut root, element, position)?;
            }
            Ok(Event::End(_)) => {
                let element = stack
                    .pop()
                    .ok_or_else(|| parse_error(position, "closing tag without opening tag"))?;
                attach(&mut stack, &mut root, element, position)?;
            }
            Ok(Event::Text(text)) => {
                let text = text.unescape().unwrap_or_else(|e| {
                    warn!(position, error = %e, "keeping raw text after unescape failure");
                    Cow::Owned(String::from_utf8_lossy(&text).into_owned())
                });
                match stack.last_mut() {
                    Some(current) => current.text.push_str(&text),
                    None if text.trim().is_empty() => {}
                    None => return Err(parse_error(position, "text outside the root element")),
                }
            }
            Ok(Event::CData(data)) => {
                if let Some(current) = stack.last_mut() {
                    current.text.push_str(&String::from_utf8_lossy(&data));
                }
            }
            Ok(Event::Eof) => break,
            // Declaration, comments, processing instructions, doctype
            Ok(_) => {}
            Err(e) => return Err(parse_error(reader.error_position() as u64, e.to_string())),
        }
    }

    if let Some(open) = stack.last() {
        return Err(parse_error(
            xml.len() as u64,
            format!("unclosed element <{}>", open.name),
        ));
    }

    root.ok_or_else(|| parse_error(xml.len() as u64, "document has no root element"))
}

fn element_from_start(start: &BytesStart, position: u64) -> Result<XmlElement> {
    let mut element = XmlElement {
        name: String::from_utf8_lossy(start.name().as_ref()).into_owned(),
        ..Default::default()
    };

    for attr in start.attributes() {
        let attr = attr.map_err(|e| parse_error(position, e.to_string()))?;
        let key = String::from_utf8_lossy(attr.key.as_ref()).into_owned();
        let value = match attr.unescape_value() {
            Ok(value) => value.into_owned(),
            Err(e) => {
                warn!(position, attribute = %key, error = %e, "keeping raw attribute value after unescape failure");
                String::from_utf8_lossy(&attr.value).into_owned()
            }
        };
        element.attributes.push((key, value));
    }

    Ok(element)
}

fn attach(
    stack: &mut [XmlElement],
    root: &mut Option<XmlElement>,
    element: XmlElement,
    position: u64,
) -> Result<()> {
    if let Some(parent) = stack.last_mut() {
        parent.children.push(element);
    } else if root.is_some() {
        return Err(parse_error(position, "multiple root elements"));
    } else {
        *root = Some(element);
    }
    Ok(())
}

fn parse_error(position: u64, message: impl Into<String>) -> ReportError {
    ReportError::Parse { position, message: message.into() }
}

/// Collect message records from the root's direct children, in document order.
///
/// Missing attributes become empty strings; elements other than `<sms>` and
/// `<mms>` are skipped.
pub fn extract_records(root: &XmlElement) -> Vec<Record> {
    if root.name != EXPECTED_ROOT {
        warn!(root = %root.name, "unexpected root element, reading its children anyway");
    }

    root.children
        .iter()
        .filter_map(|child| match child.name.as_str() {
            "sms" => Some(sms_record(child)),
            "mms" => Some(mms_record(child)),
            other => {
                debug!(element = other, "skipping non-message element");
                None
            }
        })
        .collect()
}

fn sms_record(el: &XmlElement) -> Record {
    Record {
        kind: RecordKind::Sms,
        address: el.attr_or_empty("address"),
        contact_name: el.attr_or_empty("contact_name"),
        body: el.attr_or_empty("body"),
        direction: Direction::from_code(el.attr("type").unwrap_or_default()),
        readable_date: el.attr_or_empty("readable_date"),
    }
}

/// MMS text lives in `<parts><part ct="text/plain" text="..."/></parts>`.
fn mms_record(el: &XmlElement) -> Record {
    let body = el
        .children_named("parts")
        .flat_map(|parts| parts.children_named("part"))
        .filter(|part| part.attr("ct") == Some("text/plain"))
        .filter_map(|part| part.attr("text"))
        .filter(|text| !text.is_empty())
        .collect::<Vec<_>>()
        .join("\n");

    Record {
        kind: RecordKind::Mms,
        address: el.attr_or_empty("address"),
        contact_name: el.attr_or_empty("contact_name"),
        body,
        direction: Direction::from_code(el.attr("msg_box").unwrap_or_default()),
        readable_date: el.attr_or_empty("readable_date"),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;
    use tempfile::NamedTempFile;

    const BACKUP: &str = r#"<?xml version='1.0' encoding='UTF-8' standalone='yes' ?>
<!--File Created By SMS Backup & Restore-->
<smses count="3">
  <sms protocol="0" address="+393331112222" type="1" body="Ciao &amp; benvenuto&#10;a casa" readable_date="05/gen/2023 14:03:22" contact_name="Giulia" />
  <sms address="3334445555" type="2" body="ok" readable_date="06/gen/2023 09:00:00" contact_name="(Unknown)" />
  <mms address="+393331112222" msg_box="2" readable_date="07/gen/2023 10:15:00" contact_name="Giulia">
    <parts>
      <part ct="application/smil" text="&lt;smil/&gt;" />
      <part ct="text/plain" text="foto della cena" />
      <part ct="image/jpeg" />
    </parts>
  </mms>
</smses>"#;

    #[test]
    fn test_parse_tree_and_unescape() {
        let root = parse_document(BACKUP).unwrap();
        assert_eq!(root.name, "smses");
        assert_eq!(root.attr("count"), Some("3"));
        assert_eq!(root.children.len(), 3);
        assert_eq!(root.children[0].attr("body"), Some("Ciao & benvenuto\na casa"));
    }

    #[test]
    fn test_extract_sms_records() {
        let root = parse_document(BACKUP).unwrap();
        let records = extract_records(&root);
        assert_eq!(records.len(), 3);

        assert_eq!(records[0].kind, RecordKind::Sms);
        assert_eq!(records[0].address, "+393331112222");
        assert_eq!(records[0].contact_name, "Giulia");
        assert_eq!(records[0].direction, Direction::Received);
        assert_eq!(records[0].readable_date, "05/gen/2023 14:03:22");

        assert_eq!(records[1].direction, Direction::Sent);
        assert_eq!(records[1].contact_name, "(Unknown)");
    }

    #[test]
    fn test_extract_mms_text_parts() {
        let root = parse_document(BACKUP).unwrap();
        let records = extract_records(&root);
        assert_eq!(records[2].kind, RecordKind::Mms);
        assert_eq!(records[2].body, "foto della cena");
        assert_eq!(records[2].direction, Direction::Sent);
    }

    #[test]
    fn test_missing_attributes_become_empty() {
        let root = parse_document(r#"<smses><sms address="123" /><call number="1" /></smses>"#).unwrap();
        let records = extract_records(&root);
        assert_eq!(records.len(), 1);
        assert_eq!(records[0].body, "");
        assert_eq!(records[0].contact_name, "");
        assert_eq!(records[0].readable_date, "");
        assert_eq!(records[0].direction, Direction::Sent);
    }

    #[test]
    fn test_mismatched_tags_rejected() {
        let err = parse_document("<smses><sms></smses>").unwrap_err();
        assert!(matches!(err, ReportError::Parse { .. }));
    }

    #[test]
    fn test_unclosed_root_rejected() {
        let err = parse_document(r#"<smses><sms address="1" />"#).unwrap_err();
        assert!(matches!(err, ReportError::Parse { .. }), "unexpected error: {err}");
    }

    #[test]
    fn test_empty_document_rejected() {
        assert!(matches!(parse_document("   "), Err(ReportError::Parse { .. })));
        assert!(matches!(parse_document("<a/><b/>"), Err(ReportError::Parse { .. })));
    }

    #[test]
    fn test_decode_surrogate_refs() {
        assert_eq!(decode_surrogate_refs("ciao &#55357;&#56832;"), "ciao &#x1F600;");
        assert_eq!(decode_surrogate_refs("&#xD83D;&#xDE00;!"), "&#x1F600;!");
        assert_eq!(decode_surrogate_refs("a &#55357; b"), "a &#xFFFD; b");
        assert_eq!(decode_surrogate_refs("a &#56832;"), "a &#xFFFD;");
        assert_eq!(decode_surrogate_refs("&#55357;&#55357;&#56832;"), "&#xFFFD;&#x1F600;");
        assert_eq!(decode_surrogate_refs("&#55357;"), "&#xFFFD;");
        assert!(matches!(decode_surrogate_refs("a&#10;b &amp;"), Cow::Borrowed("a&#10;b &amp;")));
    }

    #[test]
    fn test_emoji_surrogate_pair_in_body() {
        let root = parse_document(
            r#"<smses>
  <sms address="111" type="1" body="prima" readable_date="05/gen/2023 14:03:22" contact_name="Anna" />
  <sms address="111" type="1" body="ciao &#55357;&#56832;" readable_date="05/gen/2023 14:04:00" contact_name="Anna" />
</smses>"#,
        )
        .unwrap();
        let records = extract_records(&root);
        assert_eq!(records.len(), 2);
        assert_eq!(records[0].body, "prima");
        assert_eq!(records[1].body, "ciao 😀");
    }

    #[test]
    fn test_lone_surrogate_degrades() {
        let root = parse_document(r#"<smses><sms address="111" body="rotto &#55357; qui" /></smses>"#).unwrap();
        assert_eq!(extract_records(&root)[0].body, "rotto \u{FFFD} qui");
    }

    #[test]
    fn test_unknown_entity_keeps_raw_value() {
        let root = parse_document(
            r#"<smses><sms address="1" body="a&nbsp;b" /><sms address="2" body="ok" /></smses>"#,
        )
        .unwrap();
        let records = extract_records(&root);
        assert_eq!(records.len(), 2);
        assert_eq!(records[0].body, "a&nbsp;b");
        assert_eq!(records[1].body, "ok");
    }

    #[test]
    fn test_load_document_from_file() {
        let mut file = NamedTempFile::new().unwrap();
        file.write_all(BACKUP.as_bytes()).unwrap();

        let root = load_document(file.path()).unwrap();
        assert_eq!(extract_records(&root).len(), 3);
    }

    #[test]
    fn test_load_missing_file() {
        let dir = tempfile::tempdir().unwrap();
        let err = load_document(&dir.path().join("input.xml")).unwrap_err();
        assert!(matches!(err, ReportError::ReadInput { .. }));
    }
}
