//! Data model: records, category mapping, normalization and resampling

pub mod category_map;
pub mod dataset;
pub mod normalize;
pub mod record;
pub mod resample;

pub use category_map::CategoryMap;
pub use dataset::BowDataset;
pub use normalize::{load_labeled, load_unlabeled, LabelMode, RowSchema};
pub use record::{Record, RejectReason, RejectionSummary};
pub use resample::{stratified_resample, Partition, ResampleError, ResampleParams};
