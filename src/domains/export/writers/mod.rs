pub mod csv_writer;
pub mod line_writer;

pub use csv_writer::{CsvConfig, CsvFileWriter, UTF8_BOM};
pub use line_writer::LineProtocolWriter;
