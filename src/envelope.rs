//! SOAP request bodies for the ReportService2010 endpoint and the few
//! helpers needed to read its responses.

use roxmltree::{Document, Node};

use crate::error::MigrateError;

pub const SOAP_NS: &str = "http://schemas.xmlsoap.org/soap/envelope/";
pub const REPORT_SERVER_NS: &str =
    "http://schemas.microsoft.com/sqlserver/reporting/2010/03/01/ReportServer";

/// Remote operations used against the catalog.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Operation {
    ListChildren,
    CreateCatalogItem,
    GetItemDefinition,
}

impl Operation {
    pub fn name(self) -> &'static str {
        match self {
            Operation::ListChildren => "ListChildren",
            Operation::CreateCatalogItem => "CreateCatalogItem",
            Operation::GetItemDefinition => "GetItemDefinition",
        }
    }

    /// Value of the `SOAPAction` header.
    pub fn action_uri(self) -> String {
        format!("{REPORT_SERVER_NS}/{}", self.name())
    }
}

#[derive(Debug, Clone)]
enum FieldValue {
    Text(String),
    Empty,
}

/// Builder for a single-operation SOAP envelope. Every text value passes
/// through [`escape_text`]; field order is preserved.
#[derive(Debug, Clone)]
pub struct Envelope {
    operation: Operation,
    fields: Vec<(&'static str, FieldValue)>,
}

impl Envelope {
    pub fn new(operation: Operation) -> Self {
        Self {
            operation,
            fields: Vec::new(),
        }
    }

    pub fn operation(&self) -> Operation {
        self.operation
    }

    pub fn field(mut self, name: &'static str, value: impl Into<String>) -> Self {
        self.fields.push((name, FieldValue::Text(value.into())));
        self
    }

    pub fn flag(self, name: &'static str, value: bool) -> Self {
        self.field(name, if value { "true" } else { "false" })
    }

    pub fn empty(mut self, name: &'static str) -> Self {
        self.fields.push((name, FieldValue::Empty));
        self
    }

    pub fn to_xml(&self) -> Result<String, MigrateError> {
        let operation = self.operation.name();
        let mut xml = String::with_capacity(256);
        xml.push_str(r#"<?xml version="1.0" encoding="utf-8"?>"#);
        xml.push_str(&format!(r#"<soap:Envelope xmlns:soap="{SOAP_NS}">"#));
        xml.push_str("<soap:Body>");
        xml.push_str(&format!(r#"<{operation} xmlns="{REPORT_SERVER_NS}">"#));
        for (name, value) in &self.fields {
            if !is_element_name(name) {
                return Err(MigrateError::Protocol(format!(
                    "invalid request field name: {name}"
                )));
            }
            match value {
                FieldValue::Text(text) => {
                    xml.push_str(&format!("<{name}>{}</{name}>", escape_text(text)));
                }
                FieldValue::Empty => xml.push_str(&format!("<{name} />")),
            }
        }
        xml.push_str(&format!("</{operation}>"));
        xml.push_str("</soap:Body></soap:Envelope>");
        Ok(xml)
    }
}

fn is_element_name(name: &str) -> bool {
    let mut chars = name.chars();
    chars
        .next()
        .map(|first| first.is_ascii_alphabetic())
        .unwrap_or(false)
        && chars.all(|ch| ch.is_ascii_alphanumeric())
}

/// Escapes text for element content and attribute values.
pub fn escape_text(value: &str) -> String {
    let mut escaped = String::with_capacity(value.len());
    for ch in value.chars() {
        match ch {
            '&' => escaped.push_str("&amp;"),
            '<' => escaped.push_str("&lt;"),
            '>' => escaped.push_str("&gt;"),
            '"' => escaped.push_str("&quot;"),
            '\'' => escaped.push_str("&apos;"),
            other => escaped.push(other),
        }
    }
    escaped
}

/// First element anywhere in the document whose local name matches,
/// whatever its namespace. Only used for `faultstring` and `Definition`.
pub fn find_by_local_name<'a, 'input>(
    doc: &'a Document<'input>,
    local_name: &str,
) -> Option<Node<'a, 'input>> {
    doc.descendants()
        .find(|node| node.is_element() && node.tag_name().name() == local_name)
}

/// Concatenated text content of an element.
pub fn text_content(node: Node<'_, '_>) -> String {
    node.descendants()
        .filter(|child| child.is_text())
        .filter_map(|child| child.text())
        .collect()
}

/// Fault text of a SOAP error body, or `None` when the body is not XML or
/// carries no `faultstring`.
pub fn fault_message(body: &str) -> Option<String> {
    let doc = Document::parse(body).ok()?;
    find_by_local_name(&doc, "faultstring").map(text_content)
}
