use crate::backend::Series;
use crate::domains::export::layout::ColumnLayout;
use crate::domains::export::types::ExportFormat;
use crate::domains::export::writers::{CsvFileWriter, LineProtocolWriter};
use crate::errors::ExportResult;

/// Rendered file contents for one measurement
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RenderedExport {
    pub bytes: Vec<u8>,
    pub rows: usize,
}

/// Turns one measurement's series into the bytes of its output file
pub trait ExportWriter: Send + Sync {
    /// `Ok(None)` means there is nothing worth writing
    fn render(
        &self,
        measurement: &str,
        series: &Series,
        layout: &ColumnLayout,
    ) -> ExportResult<Option<RenderedExport>>;

    fn format(&self) -> ExportFormat;
}

/// Writer factory for creating format-specific writers
pub struct WriterFactory;

impl WriterFactory {
    pub fn create_writer(format: ExportFormat, database: &str, merge: bool) -> Box<dyn ExportWriter> {
        match format {
            ExportFormat::LineProtocol => Box::new(LineProtocolWriter::new(database, merge)),
            ExportFormat::Csv => Box::new(CsvFileWriter::new()),
        }
    }
}
