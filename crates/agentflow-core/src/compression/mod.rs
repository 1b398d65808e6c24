//! Memory compression: segmentation and LLM-backed content reduction

pub mod segment;
pub mod service;

pub use segment::segment_content;
pub use service::{CompressionService, SegmentRecord};
