//! Minimal XML record extraction for PROPFIND and ListObjectsV2 bodies

use std::collections::HashMap;

use quick_xml::events::Event;
use quick_xml::Reader;

/// Field name to concatenated text content
pub(crate) type Record = HashMap<String, String>;

fn local_name(raw: &[u8]) -> String {
    String::from_utf8_lossy(raw).into_owned()
}

/// Collect every `record_tag` element as a map of its `fields`.
///
/// Matching is by local name, so namespace prefixes (`d:`, `D:`) do not
/// matter. A field present as an empty element maps to `""`. Fields are
/// looked up anywhere below the record, not only as direct children.
pub(crate) fn collect_records(
    xml: &str,
    record_tag: &str,
    fields: &[&str],
) -> Result<Vec<Record>, quick_xml::Error> {
    let mut reader = Reader::from_str(xml);
    reader.trim_text(true);

    let mut records = Vec::new();
    let mut current: Option<Record> = None;
    let mut depth = 0usize;
    let mut field: Option<String> = None;

    loop {
        match reader.read_event()? {
            Event::Start(e) => {
                let name = local_name(e.local_name().as_ref());
                if let Some(record) = current.as_mut() {
                    depth += 1;
                    if field.is_none() && fields.contains(&name.as_str()) {
                        record.entry(name.clone()).or_default();
                        field = Some(name);
                    }
                } else if name == record_tag {
                    current = Some(Record::new());
                    depth = 0;
                }
            }
            Event::Empty(e) => {
                if let Some(record) = current.as_mut() {
                    let name = local_name(e.local_name().as_ref());
                    if fields.contains(&name.as_str()) {
                        record.entry(name).or_default();
                    }
                }
            }
            Event::Text(t) => {
                if let (Some(record), Some(name)) = (current.as_mut(), field.as_ref()) {
                    let text = t.unescape()?;
                    record.entry(name.clone()).or_default().push_str(&text);
                }
            }
            Event::CData(c) => {
                if let (Some(record), Some(name)) = (current.as_mut(), field.as_ref()) {
                    let text = String::from_utf8_lossy(&c.into_inner()).into_owned();
                    record.entry(name.clone()).or_default().push_str(&text);
                }
            }
            Event::End(e) => {
                if current.is_some() {
                    let name = local_name(e.local_name().as_ref());
                    if depth == 0 {
                        if let Some(record) = current.take() {
                            records.push(record);
                        }
                    } else {
                        depth -= 1;
                        if field.as_deref() == Some(name.as_str()) {
                            field = None;
                        }
                    }
                }
            }
            Event::Eof => break,
            _ => {}
        }
    }

    Ok(records)
}
