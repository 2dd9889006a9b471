use crate::sink_trait::ResultSink;
use async_trait::async_trait;
use std::io::Write;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicUsize, Ordering};
use wavstream_core::{NormalizedResult, SinkError};

/// Appends `"<id> <text>"` lines to a result file.
pub struct FileSink {
    output_path: PathBuf,
    write_count: AtomicUsize,
}

impl FileSink {
    pub fn new(output_path: impl Into<PathBuf>) -> Self {
        Self {
            output_path: output_path.into(),
            write_count: AtomicUsize::new(0),
        }
    }

    pub fn path(&self) -> &Path {
        &self.output_path
    }

    pub fn write_count(&self) -> usize {
        self.write_count.load(Ordering::Relaxed)
    }
}

#[async_trait]
impl ResultSink for FileSink {
    fn name(&self) -> &str {
        "file"
    }

    async fn write_result(&self, result: &NormalizedResult) -> Result<(), SinkError> {
        let mut file = std::fs::OpenOptions::new()
            .create(true)
            .append(true)
            .open(&self.output_path)
            .map_err(|e| {
                SinkError::WriteFailed(format!("{}: {e}", self.output_path.display()))
            })?;

        let line = format!("{}\n", result.to_line());
        file.write_all(line.as_bytes())
            .map_err(|e| SinkError::WriteFailed(e.to_string()))?;

        self.write_count.fetch_add(1, Ordering::Relaxed);
        tracing::debug!(path = %self.output_path.display(), id = %result.id, "result appended");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn result(id: &str, text: &str) -> NormalizedResult {
        NormalizedResult {
            id: id.to_string(),
            text: text.to_string(),
        }
    }

    #[test]
    fn test_file_sink_name() {
        let sink = FileSink::new("/tmp/unused.txt");
        assert_eq!(sink.name(), "file");
    }

    #[tokio::test]
    async fn test_file_sink_writes_line() {
        let dir = std::env::temp_dir().join("wavstream_file_sink_write");
        std::fs::create_dir_all(&dir).unwrap();
        let path = dir.join("result.txt");
        // Clean up from previous runs
        let _ = std::fs::remove_file(&path);

        let sink = FileSink::new(&path);
        sink.write_result(&result("utt1", "你好世界")).await.unwrap();

        let contents = std::fs::read_to_string(&path).unwrap();
        assert_eq!(contents, "utt1 你好世界\n");

        std::fs::remove_dir_all(&dir).unwrap();
    }

    #[tokio::test]
    async fn test_file_sink_appends_to_existing_file() {
        let dir = std::env::temp_dir().join("wavstream_file_sink_append");
        std::fs::create_dir_all(&dir).unwrap();
        let path = dir.join("result.txt");
        std::fs::write(&path, "utt0 earlier\n").unwrap();

        let sink = FileSink::new(&path);
        sink.write_result(&result("utt1", "one")).await.unwrap();
        sink.write_result(&result("utt2", "two")).await.unwrap();

        let contents = std::fs::read_to_string(&path).unwrap();
        assert_eq!(contents, "utt0 earlier\nutt1 one\nutt2 two\n");
        assert_eq!(sink.write_count(), 2);

        std::fs::remove_dir_all(&dir).unwrap();
    }

    #[tokio::test]
    async fn test_file_sink_empty_text_still_writes_id() {
        let dir = std::env::temp_dir().join("wavstream_file_sink_empty");
        std::fs::create_dir_all(&dir).unwrap();
        let path = dir.join("result.txt");
        let _ = std::fs::remove_file(&path);

        let sink = FileSink::new(&path);
        sink.write_result(&result("silence", "")).await.unwrap();

        let contents = std::fs::read_to_string(&path).unwrap();
        assert_eq!(contents, "silence \n");

        std::fs::remove_dir_all(&dir).unwrap();
    }

    #[tokio::test]
    async fn test_file_sink_unwritable_path_fails() {
        let sink = FileSink::new("/nonexistent/dir/result.txt");
        match sink.write_result(&result("utt1", "x")).await {
            Err(SinkError::WriteFailed(msg)) => assert!(msg.contains("result.txt")),
            _ => panic!("expected WriteFailed"),
        }
        assert_eq!(sink.write_count(), 0);
    }

    #[test]
    fn test_file_sink_implements_send_sync() {
        fn assert_send_sync<T: Send + Sync>() {}
        assert_send_sync::<FileSink>();
    }
}
