use crate::backend::Series;
use crate::domains::export::csv_record::{csv_headers, csv_record};
use crate::domains::export::layout::ColumnLayout;
use crate::domains::export::types::ExportFormat;
use crate::domains::export::writer::{ExportWriter, RenderedExport};
use crate::errors::{ExportError, ExportResult};

/// UTF-8 byte order mark, for spreadsheet compatibility
pub const UTF8_BOM: &[u8] = b"\xEF\xBB\xBF";

#[derive(Clone)]
pub struct CsvConfig {
    pub delimiter: u8,
    pub quote_char: u8,
}

impl Default for CsvConfig {
    fn default() -> Self {
        Self {
            delimiter: b',',
            quote_char: b'"',
        }
    }
}

/// CSV writer; always produces at least the BOM and the header row
pub struct CsvFileWriter {
    config: CsvConfig,
}

impl CsvFileWriter {
    pub fn new() -> Self {
        Self {
            config: CsvConfig::default(),
        }
    }
}

impl Default for CsvFileWriter {
    fn default() -> Self {
        Self::new()
    }
}

impl ExportWriter for CsvFileWriter {
    fn render(
        &self,
        measurement: &str,
        series: &Series,
        layout: &ColumnLayout,
    ) -> ExportResult<Option<RenderedExport>> {
        let mut buffer = UTF8_BOM.to_vec();
        {
            let mut wtr = csv::WriterBuilder::new()
                .delimiter(self.config.delimiter)
                .quote(self.config.quote_char)
                .from_writer(&mut buffer);

            wtr.write_record(csv_headers(layout))?;
            for (row, values) in series.values.iter().enumerate() {
                let record = csv_record(measurement, layout, values, row).map_err(|source| {
                    ExportError::Serialization {
                        measurement: measurement.to_string(),
                        source,
                    }
                })?;
                wtr.write_record(&record)?;
            }
            wtr.flush()?;
        }

        Ok(Some(RenderedExport {
            bytes: buffer,
            rows: series.values.len(),
        }))
    }

    fn format(&self) -> ExportFormat {
        ExportFormat::Csv
    }
}
