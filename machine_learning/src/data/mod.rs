pub mod dataset;
pub mod partition;
pub mod synthetic;

pub use dataset::Dataset;
pub use partition::{Partition, iid, non_iid};
pub use synthetic::{BlobSpec, blobs, train_test_split};
