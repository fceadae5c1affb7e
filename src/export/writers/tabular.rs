//! Tabular (CSV) flattener for export operations
//!
//! Flattens feature attributes into delimited text with a header row.
//! Geometry is never written. The column schema is the union of attribute
//! names in first-seen order, so identical input always produces
//! byte-identical output.

use std::collections::HashSet;

use serde_json::Value;
use tracing::debug;

use crate::error::{Result, SerializationError};
use crate::export::artifact::Payload;
use crate::export::format::ExportFormat;
use crate::model::FeatureCollection;

use super::FormatWriter;

/// Default column delimiter
pub const DEFAULT_DELIMITER: char = ',';

/// Flattens feature collections into delimited text
#[derive(Debug, Clone, Copy)]
pub struct TabularFlattener {
    delimiter: char,
}

impl TabularFlattener {
    /// Create a flattener
    ///
    /// # Arguments
    /// * `delimiter` - Column delimiter, must not be a quote or line break
    pub fn new(delimiter: char) -> Self {
        Self { delimiter }
    }

    pub fn delimiter(&self) -> char {
        self.delimiter
    }

    /// Whether `delimiter` can separate columns unambiguously
    pub fn is_valid_delimiter(delimiter: char) -> bool {
        !matches!(delimiter, '"' | '\n' | '\r')
    }

    /// Flatten a collection into delimited text
    ///
    /// # Arguments
    /// * `collection` - Collection to flatten
    ///
    /// # Returns
    /// * `Result<String>` - Header line plus one line per feature, each ending in `\n`
    pub fn to_tabular(&self, collection: &FeatureCollection) -> Result<String> {
        if !Self::is_valid_delimiter(self.delimiter) {
            return Err(SerializationError::Tabular(format!(
                "{:?} cannot be used as a delimiter",
                self.delimiter
            ))
            .into());
        }

        let columns = Self::collect_columns(collection);
        let separator = self.delimiter.to_string();

        let mut out = String::new();
        let header: Vec<String> = columns.iter().map(|c| self.escape(c)).collect();
        out.push_str(&header.join(&separator));
        out.push('\n');

        for feature in &collection.features {
            let mut cells = Vec::with_capacity(columns.len());
            for column in &columns {
                let text = match feature.property(column) {
                    Some(value) => Self::cell_text(value)?,
                    None => String::new(),
                };
                cells.push(self.escape(&text));
            }
            out.push_str(&cells.join(&separator));
            out.push('\n');
        }

        debug!(
            "Flattened {} feature(s) into {} column(s)",
            collection.len(),
            columns.len()
        );
        Ok(out)
    }

    /// Union of attribute names in first-seen order
    fn collect_columns(collection: &FeatureCollection) -> Vec<String> {
        let mut columns: Vec<String> = Vec::new();
        let mut seen: HashSet<&str> = HashSet::new();
        for feature in &collection.features {
            for name in feature.property_names() {
                if seen.insert(name.as_str()) {
                    columns.push(name.clone());
                }
            }
        }
        columns
    }

    /// Natural string form of an attribute value
    fn cell_text(value: &Value) -> Result<String> {
        Ok(match value {
            Value::Null => String::new(),
            Value::Bool(b) => b.to_string(),
            Value::Number(n) => n.to_string(),
            Value::String(s) => s.clone(),
            Value::Array(_) | Value::Object(_) => serde_json::to_string(value)
                .map_err(|e| SerializationError::Tabular(e.to_string()))?,
        })
    }

    /// Quote a value if it contains the delimiter, a quote or a line break
    fn escape(&self, value: &str) -> String {
        if value.contains(self.delimiter)
            || value.contains('"')
            || value.contains('\n')
            || value.contains('\r')
        {
            format!("\"{}\"", value.replace('"', "\"\""))
        } else {
            value.to_string()
        }
    }
}

impl Default for TabularFlattener {
    fn default() -> Self {
        Self::new(DEFAULT_DELIMITER)
    }
}

impl FormatWriter for TabularFlattener {
    fn format(&self) -> ExportFormat {
        ExportFormat::Tabular
    }

    fn encode(&self, collection: &FeatureCollection) -> Result<Payload> {
        self.to_tabular(collection).map(Payload::Text)
    }
}
