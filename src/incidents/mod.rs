//! Incident recording.
//!
//! # Data Flow
//! ```text
//! HealthTransition / RecoveryReport / suppressed attempt / alert
//!     → recorder.rs (sequence number + timestamp, in-memory log, summary counters)
//!     → sink.rs (JSON or text line appended to the incident file)
//! ```

pub mod recorder;
pub mod sink;
pub mod types;

pub use recorder::{IncidentRecorder, IncidentSummary};
pub use sink::{FileSink, IncidentSink};
pub use types::{Incident, IncidentEvent};
