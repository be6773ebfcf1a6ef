//! The watermark is the earliest point not yet guaranteed delivered. Continuous collectors keep it
//! as a timestamp, day-bucketed collectors as a [CompanyCheckpoint]. Both are persisted through the
//! [WatermarkStore] and only ever move forward.

mod advance;
mod bounds;
mod checkpoint;
mod store;

pub use advance::{Extractor, advance, rfc3339_at};
pub use bounds::WatermarkBounds;
pub use checkpoint::CompanyCheckpoint;
pub use store::WatermarkStore;
