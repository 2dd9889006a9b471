pub mod file_sink;
pub mod sink_trait;

pub use file_sink::FileSink;
pub use sink_trait::ResultSink;
