//! Shared plumbing for the zip + XML container formats (DOCX, XLSX).

use docscope_core::{Error, Result};
use quick_xml::events::{BytesStart, Event};
use quick_xml::Reader;
use std::collections::HashMap;
use std::io::{Cursor, Read};
use zip::ZipArchive;

/// Parts larger than this are refused (decompression bombs).
const MAX_PART_BYTES: u64 = 64 * 1024 * 1024;

pub(crate) type Package<'a> = ZipArchive<Cursor<&'a [u8]>>;

pub(crate) fn open_package(bytes: &[u8]) -> Result<Package<'_>> {
    ZipArchive::new(Cursor::new(bytes))
        .map_err(|e| Error::Extraction(format!("not a zip package: {e}")))
}

/// Read a part as UTF-8. `Ok(None)` when the part does not exist.
pub(crate) fn read_part(pkg: &mut Package<'_>, name: &str) -> Result<Option<String>> {
    let file = match pkg.by_name(name) {
        Ok(f) => f,
        Err(zip::result::ZipError::FileNotFound) => return Ok(None),
        Err(e) => return Err(Error::Extraction(format!("{name}: {e}"))),
    };
    if file.size() > MAX_PART_BYTES {
        return Err(Error::Extraction(format!(
            "{name}: part too large ({} bytes)",
            file.size()
        )));
    }
    let mut buf = Vec::with_capacity(file.size() as usize);
    file.take(MAX_PART_BYTES)
        .read_to_end(&mut buf)
        .map_err(|e| Error::Extraction(format!("{name}: {e}")))?;
    Ok(Some(String::from_utf8_lossy(&buf).into_owned()))
}

pub(crate) fn require_part(pkg: &mut Package<'_>, name: &str) -> Result<String> {
    read_part(pkg, name)?.ok_or_else(|| Error::Extraction(format!("missing part {name}")))
}

/// Attribute value by local name (namespace prefix ignored).
pub(crate) fn attr(e: &BytesStart<'_>, local: &[u8]) -> Option<String> {
    e.attributes()
        .flatten()
        .find(|a| a.key.local_name().as_ref() == local)
        .map(|a| {
            a.unescape_value()
                .map(|v| v.into_owned())
                .unwrap_or_else(|_| String::from_utf8_lossy(&a.value).into_owned())
        })
}

/// OOXML toggle properties (`<w:b/>`, `<b val="0"/>`): on unless `val` says otherwise.
pub(crate) fn toggle_on(e: &BytesStart<'_>) -> bool {
    !matches!(
        attr(e, b"val").as_deref(),
        Some("0" | "false" | "off" | "none")
    )
}

pub(crate) fn xml_error(part: &str, e: quick_xml::Error) -> Error {
    Error::Extraction(format!("{part}: malformed xml: {e}"))
}

/// Relationship id → target, from a `.rels` part.
pub(crate) fn parse_relationships(xml: &str) -> Result<HashMap<String, String>> {
    let mut rels = HashMap::new();
    let mut reader = Reader::from_str(xml);
    let mut buf = Vec::new();
    loop {
        match reader.read_event_into(&mut buf) {
            Ok(Event::Empty(e)) | Ok(Event::Start(e))
                if e.local_name().as_ref() == b"Relationship" =>
            {
                if let (Some(id), Some(target)) = (attr(&e, b"Id"), attr(&e, b"Target")) {
                    rels.insert(id, target);
                }
            }
            Ok(Event::Eof) => break,
            Err(e) => return Err(xml_error("relationships", e)),
            _ => {}
        }
        buf.clear();
    }
    Ok(rels)
}

/// Resolve a relationship target against the directory of the part that owns it.
pub(crate) fn resolve_target(base_dir: &str, target: &str) -> String {
    if let Some(abs) = target.strip_prefix('/') {
        return abs.to_string();
    }
    let mut parts: Vec<&str> = base_dir.split('/').filter(|s| !s.is_empty()).collect();
    for seg in target.split('/') {
        match seg {
            "" | "." => {}
            ".." => {
                parts.pop();
            }
            s => parts.push(s),
        }
    }
    parts.join("/")
}
