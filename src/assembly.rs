//! Turns raw OSM elements into area features: index the payload, stitch member
//! ways into rings, pair rings into polygons and swap coordinates into display
//! order.

pub mod feature;
pub mod index;
pub mod normalize;
pub mod polygons;
pub mod rings;

pub use feature::{build_all, build_feature, Target};
pub use index::{index, ElementIndex};
pub use normalize::{normalize, SwapAxes};
pub use polygons::group_polygons;
pub use rings::{assemble_rings, stitch_paths};
