use std::collections::BTreeMap;

use serde::{Deserialize, Deserializer, Serialize, Serializer};

pub type OsmId = i64;

pub type Tags = BTreeMap<String, String>;

/// Geographic position in (latitude, longitude) order.
///
/// Equality is exact: two coordinates join only when they were read from the
/// same node, which is what shared OSM nodes guarantee. Serializes as the
/// `{"lat": .., "lon": ..}` points Overpass emits for `out geom`.
#[derive(Serialize, Deserialize, Debug, Clone, Copy, PartialEq)]
pub struct Coordinate {
    pub lat: f64,
    pub lon: f64,
}

impl Coordinate {
    pub fn new(lat: f64, lon: f64) -> Self {
        Coordinate { lat, lon }
    }

    /// Position array in geographic (lat, lon) order.
    pub fn to_pair(self) -> [f64; 2] {
        [self.lat, self.lon]
    }
}

impl From<(f64, f64)> for Coordinate {
    fn from((lat, lon): (f64, f64)) -> Self {
        Coordinate { lat, lon }
    }
}

impl From<&Node> for Coordinate {
    fn from(value: &Node) -> Self {
        Coordinate {
            lat: value.lat,
            lon: value.lon,
        }
    }
}

#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
pub struct Node {
    pub id: OsmId,
    pub lat: f64,
    pub lon: f64,
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub tags: Tags,
}

#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
pub struct Way {
    pub id: OsmId,
    #[serde(default)]
    pub nodes: Vec<OsmId>,
    /// Inline points from an `out geom` query, parallel to `nodes`.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub geometry: Vec<Coordinate>,
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub tags: Tags,
}

impl Way {
    /// A way whose node list starts and ends on the same node. Ways that only
    /// carry inline geometry are compared by their end points.
    pub fn is_closed(&self) -> bool {
        if self.nodes.is_empty() {
            return self.geometry.len() > 1 && self.geometry.first() == self.geometry.last();
        }
        self.nodes.len() > 1 && self.nodes.first() == self.nodes.last()
    }
}

#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
pub struct Relation {
    pub id: OsmId,
    #[serde(default)]
    pub members: Vec<Member>,
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub tags: Tags,
}

#[derive(Serialize, Deserialize, Debug, Clone, Copy, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum MemberType {
    Node,
    Way,
    Relation,
}

#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
pub struct Member {
    #[serde(rename = "type")]
    pub member_type: MemberType,
    #[serde(rename = "ref")]
    pub reference: OsmId,
    #[serde(default)]
    pub role: Role,
    /// Inline points of a way member from an `out geom` query.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub geometry: Vec<Coordinate>,
}

/// Member role as far as ring assembly is concerned. Anything that is not
/// `outer` or `inner` is kept verbatim but takes no part in assembly.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Role {
    Outer,
    Inner,
    Ignored(String),
}

impl Role {
    pub fn as_str(&self) -> &str {
        match self {
            Role::Outer => "outer",
            Role::Inner => "inner",
            Role::Ignored(role) => role,
        }
    }
}

impl Default for Role {
    fn default() -> Self {
        Role::Ignored(String::new())
    }
}

impl From<&str> for Role {
    fn from(value: &str) -> Self {
        match value {
            "outer" => Role::Outer,
            "inner" => Role::Inner,
            other => Role::Ignored(other.to_string()),
        }
    }
}

impl Serialize for Role {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(self.as_str())
    }
}

impl<'de> Deserialize<'de> for Role {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let role = String::deserialize(deserializer)?;
        Ok(Role::from(role.as_str()))
    }
}

/// One entry of an Overpass `elements` array.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
#[serde(tag = "type", rename_all = "lowercase")]
pub enum Element {
    Node(Node),
    Way(Way),
    Relation(Relation),
    /// Element kinds the assembler has no use for (Overpass `area`, `count`, ...).
    #[serde(other)]
    Other,
}

impl Element {
    pub fn id(&self) -> Option<OsmId> {
        match self {
            Element::Node(node) => Some(node.id),
            Element::Way(way) => Some(way.id),
            Element::Relation(relation) => Some(relation.id),
            Element::Other => None,
        }
    }
}

/// Top level of an Overpass JSON response. Metadata fields are ignored.
#[derive(Serialize, Deserialize, Debug, Default, Clone, PartialEq)]
pub struct OverpassResponse {
    #[serde(default)]
    pub elements: Vec<Element>,
}
