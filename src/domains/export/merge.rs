use crate::domains::export::line_protocol::dml_header;
use crate::errors::{ExportError, ExportResult};
use log::{debug, info};
use std::path::{Path, PathBuf};
use tokio::fs;
use tokio::io::AsyncWriteExt;

pub const MERGE_FILE: &str = "merge.txt";
const MERGE_TMP_FILE: &str = "merge.tmp";

fn merge_error(path: &Path, error: std::io::Error) -> ExportError {
    ExportError::Merge(format!("{}: {}", path.display(), error))
}

/// Concatenate line protocol files under one shared header into `merge.txt`.
///
/// Inputs are appended in the given order and removed once the temporary
/// file is complete; the result only appears under its final name at the end.
pub async fn merge_files(dir: &Path, database: &str, files: &[PathBuf]) -> ExportResult<PathBuf> {
    let tmp_path = dir.join(MERGE_TMP_FILE);
    let merged_path = dir.join(MERGE_FILE);

    let mut out = fs::File::create(&tmp_path)
        .await
        .map_err(|e| merge_error(&tmp_path, e))?;
    let mut header = dml_header(database);
    header.push('\n');
    out.write_all(header.as_bytes())
        .await
        .map_err(|e| merge_error(&tmp_path, e))?;

    for file in files {
        let mut input = fs::File::open(file).await.map_err(|e| merge_error(file, e))?;
        let copied = tokio::io::copy(&mut input, &mut out)
            .await
            .map_err(|e| merge_error(file, e))?;
        debug!("merged {} bytes from {}", copied, file.display());
    }
    out.flush().await.map_err(|e| merge_error(&tmp_path, e))?;
    drop(out);

    for file in files {
        fs::remove_file(file).await.map_err(|e| merge_error(file, e))?;
    }
    fs::rename(&tmp_path, &merged_path)
        .await
        .map_err(|e| merge_error(&merged_path, e))?;

    info!("{} files merged into {}", files.len(), merged_path.display());
    Ok(merged_path)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_merge_concatenates_in_order() {
        let tmp = tempfile::tempdir().unwrap();
        let cpu = tmp.path().join("cpu.txt");
        let mem = tmp.path().join("mem.txt");
        let other = tmp.path().join("other.txt");
        std::fs::write(&cpu, "cpu value=1 1\n").unwrap();
        std::fs::write(&mem, "mem value=2 2\n").unwrap();
        std::fs::write(&other, "other value=3 3\n").unwrap();

        let merged = merge_files(tmp.path(), "telegraf", &[mem.clone(), cpu.clone()])
            .await
            .unwrap();
        assert_eq!(merged, tmp.path().join(MERGE_FILE));

        let text = std::fs::read_to_string(&merged).unwrap();
        let expected = format!("{}\nmem value=2 2\ncpu value=1 1\n", dml_header("telegraf"));
        assert_eq!(text, expected);

        assert!(!cpu.exists());
        assert!(!mem.exists());
        assert!(other.exists());
        assert!(!tmp.path().join(MERGE_TMP_FILE).exists());
    }

    #[tokio::test]
    async fn test_missing_input_is_a_merge_error() {
        let tmp = tempfile::tempdir().unwrap();
        let err = merge_files(tmp.path(), "telegraf", &[tmp.path().join("gone.txt")])
            .await
            .unwrap_err();
        assert!(matches!(err, ExportError::Merge(_)));
        assert!(!tmp.path().join(MERGE_FILE).exists());
    }
}
