pub mod geometry;
pub mod osm;

pub use geometry::{Feature, FeatureProperties, Geometry, Polygon, Position, Ring, SourceType};
pub use osm::{Coordinate, Element, Member, MemberType, Node, OsmId, OverpassResponse, Relation, Role, Tags, Way};
