//! Printable pick list for the warehouse floor

use serde::{Deserialize, Serialize};

use crate::models::TransferDocument;

/// One printed row; the actual column stays blank for the picker's pen
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PickListRow {
    #[serde(rename = "Pozice")]
    pub position: String,
    #[serde(rename = "Produkt")]
    pub product: String,
    #[serde(rename = "Požadováno")]
    pub requested: i32,
    #[serde(rename = "Skutečnost")]
    pub actual: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PickList {
    pub document_number: String,
    pub source_warehouse: String,
    pub destination_store: String,
    pub rows: Vec<PickListRow>,
}

impl PickList {
    /// Rows follow the stored presentation order
    pub fn for_document(document: &TransferDocument) -> Self {
        let mut items: Vec<_> = document.items.iter().collect();
        items.sort_by_key(|item| item.sequence_index);

        let rows = items
            .into_iter()
            .map(|item| PickListRow {
                position: item.position.clone().unwrap_or_default(),
                product: format!("{} ({})", item.product_name, item.product_code),
                requested: item.requested_quantity,
                actual: String::new(),
            })
            .collect();

        Self {
            document_number: document.document_number.clone(),
            source_warehouse: document.source_warehouse.clone(),
            destination_store: document.destination_store.to_string(),
            rows,
        }
    }

    /// Fixed-width table for plain-text printing
    pub fn render_text(&self) -> String {
        const HEADERS: [&str; 4] = ["Pozice", "Produkt", "Požadováno", "Skutečnost"];

        let width = |header: &str, cells: &mut dyn Iterator<Item = usize>| {
            cells.fold(header.chars().count(), usize::max)
        };
        let position_w = width(HEADERS[0], &mut self.rows.iter().map(|r| r.position.chars().count()));
        let product_w = width(HEADERS[1], &mut self.rows.iter().map(|r| r.product.chars().count()));
        let requested_w = width(
            HEADERS[2],
            &mut self.rows.iter().map(|r| r.requested.to_string().len()),
        );
        let actual_w = HEADERS[3].chars().count().max(10);

        let mut out = format!(
            "Převodka {}\n{} -> {}\n\n",
            self.document_number, self.source_warehouse, self.destination_store
        );
        out.push_str(&format!(
            "{:<position_w$}  {:<product_w$}  {:>requested_w$}  {:<actual_w$}\n",
            HEADERS[0], HEADERS[1], HEADERS[2], HEADERS[3]
        ));
        out.push_str(&format!(
            "{}\n",
            "-".repeat(position_w + product_w + requested_w + actual_w + 6)
        ));
        for row in &self.rows {
            out.push_str(&format!(
                "{:<position_w$}  {:<product_w$}  {:>requested_w$}  {}\n",
                row.position,
                row.product,
                row.requested,
                "_".repeat(actual_w)
            ));
        }
        out
    }
}
