use crate::backend::Series;
use crate::domains::export::layout::ColumnLayout;
use crate::domains::export::line_protocol::{dml_header, serialize_row};
use crate::domains::export::types::ExportFormat;
use crate::domains::export::writer::{ExportWriter, RenderedExport};
use crate::errors::{ExportError, ExportResult};

/// Line protocol writer; prefixes the DDL/DML header unless files get merged later
pub struct LineProtocolWriter {
    header: Option<String>,
}

impl LineProtocolWriter {
    pub fn new(database: &str, merge: bool) -> Self {
        Self {
            header: (!merge).then(|| dml_header(database)),
        }
    }
}

impl ExportWriter for LineProtocolWriter {
    fn render(
        &self,
        measurement: &str,
        series: &Series,
        layout: &ColumnLayout,
    ) -> ExportResult<Option<RenderedExport>> {
        let mut lines = Vec::with_capacity(series.values.len() + 1);
        if let Some(header) = &self.header {
            lines.push(header.clone());
        }
        for (row, values) in series.values.iter().enumerate() {
            let line = serialize_row(measurement, layout, values, row).map_err(|source| {
                ExportError::Serialization {
                    measurement: measurement.to_string(),
                    source,
                }
            })?;
            lines.push(line);
        }

        if lines.is_empty() {
            return Ok(None);
        }
        let mut text = lines.join("\n");
        text.push('\n');
        Ok(Some(RenderedExport {
            bytes: text.into_bytes(),
            rows: series.values.len(),
        }))
    }

    fn format(&self) -> ExportFormat {
        ExportFormat::LineProtocol
    }
}
