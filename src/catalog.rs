use base64::Engine;
use base64::engine::general_purpose::STANDARD;
use roxmltree::{Document, Node};

use crate::domain::{CatalogItem, CatalogPath, ItemType};
use crate::envelope::{
    Envelope, Operation, REPORT_SERVER_NS, find_by_local_name, text_content,
};
use crate::error::MigrateError;
use crate::transport::SoapTransport;

/// Catalog calls on top of a [`SoapTransport`].
#[derive(Clone)]
pub struct CatalogClient<T: SoapTransport> {
    transport: T,
}

impl<T: SoapTransport> CatalogClient<T> {
    pub fn new(transport: T) -> Self {
        Self { transport }
    }

    pub fn transport(&self) -> &T {
        &self.transport
    }

    /// Items under `path`. With `recursive` the service walks the subtree.
    pub fn list_children(
        &self,
        path: &CatalogPath,
        recursive: bool,
    ) -> Result<Vec<CatalogItem>, MigrateError> {
        let envelope = Envelope::new(Operation::ListChildren)
            .field("ItemPath", path.as_str())
            .flag("Recursive", recursive);
        let xml = self.transport.call(&envelope)?;
        parse_catalog_items(&xml)
    }

    /// Raw definition bytes of the item at `path`.
    pub fn get_item_definition(&self, path: &str) -> Result<Vec<u8>, MigrateError> {
        let envelope = Envelope::new(Operation::GetItemDefinition).field("ItemPath", path);
        let xml = self.transport.call(&envelope)?;
        extract_definition(&xml)
    }

    /// Creates (or with `overwrite`, replaces) a report under `parent`.
    pub fn create_report(
        &self,
        parent: &CatalogPath,
        name: &str,
        definition: &[u8],
        overwrite: bool,
    ) -> Result<(), MigrateError> {
        let envelope = Envelope::new(Operation::CreateCatalogItem)
            .field("ItemType", ItemType::Report.as_str())
            .field("Name", name)
            .field("Parent", parent.as_str())
            .flag("Overwrite", overwrite)
            .field("Definition", STANDARD.encode(definition))
            .empty("Properties");
        self.transport.call(&envelope)?;
        Ok(())
    }
}

/// Every `CatalogItem` element of a ListChildren response, in document
/// order. Missing fields read as empty strings.
pub fn parse_catalog_items(xml: &str) -> Result<Vec<CatalogItem>, MigrateError> {
    let doc = Document::parse(xml)
        .map_err(|err| MigrateError::Protocol(format!("invalid catalog response: {err}")))?;
    let items = doc
        .descendants()
        .filter(|node| node.has_tag_name((REPORT_SERVER_NS, "CatalogItem")))
        .map(|node| {
            let created_at = child_text(node, "CreationDate");
            let modified_at = child_text(node, "ModifiedDate");
            CatalogItem {
                name: child_text(node, "Name").unwrap_or_default(),
                path: child_text(node, "Path").unwrap_or_default(),
                item_type: ItemType::from_type_name(
                    &child_text(node, "TypeName").unwrap_or_default(),
                ),
                created_at,
                modified_at,
                data_source_path: None,
            }
        })
        .collect();
    Ok(items)
}

fn child_text(node: Node<'_, '_>, name: &str) -> Option<String> {
    node.children()
        .find(|child| child.has_tag_name((REPORT_SERVER_NS, name)))
        .map(text_content)
}

/// Decodes the base64 `Definition` payload of a GetItemDefinition response.
pub fn extract_definition(xml: &str) -> Result<Vec<u8>, MigrateError> {
    let doc = Document::parse(xml)
        .map_err(|err| MigrateError::Protocol(format!("invalid definition response: {err}")))?;
    let node = find_by_local_name(&doc, "Definition").ok_or_else(|| {
        MigrateError::Protocol("response carries no Definition element".to_string())
    })?;
    let encoded: String = text_content(node)
        .chars()
        .filter(|ch| !ch.is_ascii_whitespace())
        .collect();
    STANDARD
        .decode(encoded.as_bytes())
        .map_err(|err| MigrateError::Protocol(format!("definition is not valid base64: {err}")))
}
