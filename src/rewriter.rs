//! Data-source rebinding for report definitions.
//!
//! The definition is parsed only to locate `<DataSource>` elements; the
//! output is the original text with a few byte ranges spliced, so anything
//! outside those elements comes back exactly as it went in.

use std::ops::Range;

use roxmltree::{Document, Node, ParsingOptions};

use crate::envelope::escape_text;
use crate::error::MigrateError;

const BOM: &str = "\u{feff}";
const DATA_SOURCE: &str = "DataSource";
const CONNECTION_PROPERTIES: &str = "ConnectionProperties";
const DATA_SOURCE_REFERENCE: &str = "DataSourceReference";

#[derive(Debug)]
struct Splice {
    range: Range<usize>,
    replacement: String,
}

/// Points every data source of `report` at the shared data source
/// `data_source_path`: embedded connection properties and previous
/// references are dropped, one new reference is appended.
pub fn rebind(report: &[u8], data_source_path: &str) -> Result<Vec<u8>, MigrateError> {
    let (bom, text) = decode(report)?;
    let doc = parse(text)?;
    let data_sources = data_source_elements(&doc);
    if data_sources.is_empty() {
        return Ok(report.to_vec());
    }

    let reference = escape_text(data_source_path);
    let mut splices = Vec::new();
    for data_source in data_sources {
        rebind_element(text, data_source, &reference, &mut splices)?;
    }
    splices.sort_by_key(|splice| (splice.range.start, splice.range.end));

    let mut output = String::with_capacity(bom.len() + text.len() + 128);
    output.push_str(bom);
    let mut cursor = 0;
    for splice in splices {
        output.push_str(&text[cursor..splice.range.start]);
        output.push_str(&splice.replacement);
        cursor = splice.range.end;
    }
    output.push_str(&text[cursor..]);

    parse(&output[bom.len()..])?;
    Ok(output.into_bytes())
}

/// Distinct `Name` attributes of the definition's data sources.
pub fn data_source_names(report: &[u8]) -> Result<Vec<String>, MigrateError> {
    let (_, text) = decode(report)?;
    let doc = parse(text)?;
    let mut names: Vec<String> = Vec::new();
    for node in data_source_elements(&doc) {
        if let Some(name) = node.attribute("Name").filter(|name| !name.is_empty()) {
            if !names.iter().any(|known| known == name) {
                names.push(name.to_string());
            }
        }
    }
    Ok(names)
}

fn decode(report: &[u8]) -> Result<(&'static str, &str), MigrateError> {
    let text = std::str::from_utf8(report)
        .map_err(|err| MigrateError::Document(format!("definition is not UTF-8: {err}")))?;
    Ok(match text.strip_prefix(BOM) {
        Some(rest) => (BOM, rest),
        None => ("", text),
    })
}

fn parse(text: &str) -> Result<Document<'_>, MigrateError> {
    let options = ParsingOptions {
        allow_dtd: true,
        ..ParsingOptions::default()
    };
    Document::parse_with_options(text, options)
        .map_err(|err| MigrateError::Document(err.to_string()))
}

/// Outermost `DataSource` elements in the root element's namespace.
fn data_source_elements<'a, 'input>(doc: &'a Document<'input>) -> Vec<Node<'a, 'input>> {
    let namespace = doc.root_element().tag_name().namespace();
    let is_data_source = |node: &Node<'_, '_>| {
        node.is_element()
            && node.tag_name().name() == DATA_SOURCE
            && node.tag_name().namespace() == namespace
    };
    doc.descendants()
        .filter(|node| is_data_source(node))
        .filter(|node| !node.ancestors().skip(1).any(|parent| is_data_source(&parent)))
        .collect()
}

fn rebind_element(
    text: &str,
    data_source: Node<'_, '_>,
    reference: &str,
    splices: &mut Vec<Splice>,
) -> Result<(), MigrateError> {
    let range = data_source.range();
    let source = &text[range.clone()];
    let qualified = qualified_name(source)?;
    let child = match qualified.split_once(':') {
        Some((prefix, _)) => format!("{prefix}:{DATA_SOURCE_REFERENCE}"),
        None => DATA_SOURCE_REFERENCE.to_string(),
    };
    let new_reference = format!("<{child}>{reference}</{child}>");

    if !data_source.has_children() && source.ends_with("/>") {
        splices.push(Splice {
            range: range.end - 2..range.end,
            replacement: format!(">{new_reference}</{qualified}>"),
        });
        return Ok(());
    }

    let namespace = data_source.tag_name().namespace();
    let indent = data_source
        .children()
        .find(|node| node.is_element())
        .and_then(|node| node.prev_sibling())
        .filter(is_whitespace)
        .and_then(|node| node.text())
        .unwrap_or("");

    for node in data_source.children().filter(|node| {
        node.is_element()
            && node.tag_name().namespace() == namespace
            && matches!(
                node.tag_name().name(),
                CONNECTION_PROPERTIES | DATA_SOURCE_REFERENCE
            )
    }) {
        let start = node
            .prev_sibling()
            .filter(is_whitespace)
            .map(|ws| ws.range().start)
            .unwrap_or(node.range().start);
        splices.push(Splice {
            range: start..node.range().end,
            replacement: String::new(),
        });
    }

    let insert_at = match data_source.last_child().filter(is_whitespace) {
        Some(trailing) => trailing.range().start,
        None => {
            let close = source.rfind("</").ok_or_else(|| {
                MigrateError::Document(format!("unterminated <{qualified}> element"))
            })?;
            range.start + close
        }
    };
    splices.push(Splice {
        range: insert_at..insert_at,
        replacement: format!("{indent}{new_reference}"),
    });
    Ok(())
}

fn is_whitespace(node: &Node<'_, '_>) -> bool {
    node.is_text() && node.text().is_some_and(|text| text.trim().is_empty())
}

/// Element name as written in its start tag, prefix included.
fn qualified_name(source: &str) -> Result<&str, MigrateError> {
    let tag = source
        .strip_prefix('<')
        .ok_or_else(|| MigrateError::Document("malformed start tag".to_string()))?;
    let end = tag
        .find(|ch: char| ch.is_whitespace() || ch == '/' || ch == '>')
        .unwrap_or(tag.len());
    Ok(&tag[..end])
}
