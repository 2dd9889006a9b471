use async_trait::async_trait;
use wavstream_core::{NormalizedResult, SinkError};

/// Where finished exchanges are recorded.
///
/// A sink receives exactly one [`NormalizedResult`] per successful exchange
/// and must append it; earlier results are never rewritten.
#[async_trait]
pub trait ResultSink: Send + Sync {
    /// Returns the sink's name (e.g. `"file"`).
    fn name(&self) -> &str;
    /// Append one result.
    async fn write_result(&self, result: &NormalizedResult) -> Result<(), SinkError>;
}
