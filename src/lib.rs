//! Merge tiled LiDAR instance segmentations into one point cloud.
//!
//! Each chunk of a survey is segmented independently, so its tree labels
//! are only meaningful inside the chunk. This crate assigns every chunk a
//! disjoint range of global ids, finds trees that straddle tile borders by
//! matching near-coincident border points across chunks, collapses the
//! matched ids with a union-find, and summarises the final instances.
//!
//! # Example
//!
//! ```
//! use lidar_chunk_merge::{merge_group, ChunkGroup, MergeConfig, Point3, PointTable};
//!
//! // Two tiles meeting at x = 1.0; the tree labelled 2 in tile A continues as 1 in tile B.
//! let a = PointTable::from_labeled_points(
//!     "preds",
//!     [
//!         (Point3::new(0.0, 5.0, 10.0), 1),
//!         (Point3::new(0.995, 5.0, 10.0), 2),
//!     ],
//! );
//! let b = PointTable::from_labeled_points(
//!     "preds",
//!     [
//!         (Point3::new(1.0, 5.0, 10.0), 1),
//!         (Point3::new(2.0, 5.0, 10.0), 0),
//!     ],
//! );
//!
//! let group = ChunkGroup::new("plot").with_chunk("a", a).with_chunk("b", b);
//! let output = merge_group(&group, &MergeConfig::default()).expect("merge should succeed");
//!
//! assert_eq!(output.instances.len(), 2);
//! assert_eq!(output.table.instance_labels, vec![1, 2, 2, 0]);
//! ```

pub mod border;
mod config;
mod driver;
mod error;
pub mod matcher;
mod par;
pub mod remap;
pub mod summary;
mod table;
mod timing;
mod types;
pub mod union_find;

pub use border::{detect_borders, BorderFlags, BorderInfo};
pub use config::MergeConfig;
pub use driver::{
    merge_group, merge_groups, ChunkGroup, GroupOutput, GroupReport, GroupResult,
    MatchOutputStats,
};
pub use error::{MergeError, MergeWarning};
pub use matcher::{match_borders, BorderPoints, MatchOutput, MatchParams, MatchStrategy};
pub use remap::{LabelMap, LabelOffset, LabelOffsetTable};
pub use summary::{Centroid, ChunkReport, InstanceSummary};
pub use table::{
    AttributeColumn, Chunk, MergedPointTable, PointTable, COORDINATE_COLUMNS,
    INSTANCE_LABEL_COLUMN,
};
pub use types::{BoundingBox, Label, Point3, NOISE_LABEL};
pub use union_find::{LabelUnifier, SharedUnifier, UnionRequest};
