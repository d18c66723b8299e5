//! Downstream sinks: the measurement service and the metadata service.

mod http;
mod traits;

pub use http::{HttpMeasurementSink, HttpMetadataSink};
pub use traits::{MeasurementSink, MetadataSink, SinkError};
