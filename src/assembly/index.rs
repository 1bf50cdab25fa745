use std::collections::{HashMap, HashSet};

use log::debug;

use crate::data::{Coordinate, Element, MemberType, OsmId};

/// Lookup tables resolved from a flat element list.
#[derive(Debug, Default, Clone)]
pub struct ElementIndex {
    pub nodes: HashMap<OsmId, Coordinate>,
    pub ways: HashMap<OsmId, Vec<Coordinate>>,
    /// Ways with at least one node reference that did not resolve and no
    /// inline geometry to fall back on.
    pub incomplete_ways: HashSet<OsmId>,
}

impl ElementIndex {
    pub fn new(elements: &[Element]) -> Self {
        // Overpass lists ways before the nodes they reference, so nodes go first.
        let nodes: HashMap<OsmId, Coordinate> = elements.iter()
            .filter_map(|element| match element {
                Element::Node(node) => Some((node.id, node.into())),
                _ => None,
            })
            .collect();

        let mut ways = HashMap::new();
        let mut incomplete_ways = HashSet::new();
        for element in elements {
            let Element::Way(way) = element else {
                continue;
            };
            let coords: Vec<Coordinate> = way.nodes.iter()
                .filter_map(|node_id| nodes.get(node_id).copied())
                .collect();
            let resolved = coords.len() == way.nodes.len();
            if !way.geometry.is_empty() && (!resolved || coords.is_empty()) {
                ways.insert(way.id, way.geometry.clone());
                continue;
            }
            if !resolved {
                debug!(
                    way_id = way.id,
                    missing = way.nodes.len() - coords.len();
                    "Way references nodes missing from the payload"
                );
                incomplete_ways.insert(way.id);
            }
            ways.insert(way.id, coords);
        }

        // `out geom` relations carry member points inline, often without the
        // way elements themselves.
        for element in elements {
            let Element::Relation(relation) = element else {
                continue;
            };
            for member in &relation.members {
                if member.member_type != MemberType::Way || member.geometry.is_empty() {
                    continue;
                }
                if ways.contains_key(&member.reference) && !incomplete_ways.contains(&member.reference) {
                    continue;
                }
                debug!(relation_id = relation.id, way_id = member.reference; "Using inline member geometry");
                incomplete_ways.remove(&member.reference);
                ways.insert(member.reference, member.geometry.clone());
            }
        }

        ElementIndex {
            nodes,
            ways,
            incomplete_ways,
        }
    }

    pub fn way(&self, id: OsmId) -> Option<&[Coordinate]> {
        self.ways.get(&id).map(Vec::as_slice)
    }

    pub fn is_complete(&self, id: OsmId) -> bool {
        self.ways.contains_key(&id) && !self.incomplete_ways.contains(&id)
    }
}

pub fn index(elements: &[Element]) -> ElementIndex {
    ElementIndex::new(elements)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::data::{Member, Node, Relation, Role, Tags, Way};

    fn node(id: OsmId, lat: f64, lon: f64) -> Element {
        Element::Node(Node { id, lat, lon, tags: Tags::new() })
    }

    fn way(id: OsmId, nodes: Vec<OsmId>) -> Element {
        Element::Way(Way { id, nodes, geometry: Vec::new(), tags: Tags::new() })
    }

    fn points(pairs: &[(f64, f64)]) -> Vec<Coordinate> {
        pairs.iter().copied().map(Coordinate::from).collect()
    }

    #[test]
    fn resolves_ways_listed_before_their_nodes() {
        let elements = vec![
            way(10, vec![1, 2, 3]),
            node(1, 47.0, -122.0),
            node(2, 47.0, -121.9),
            node(3, 47.1, -121.9),
        ];
        let index = index(&elements);

        assert_eq!(index.nodes.len(), 3);
        assert_eq!(
            index.way(10).unwrap(),
            &[
                Coordinate::new(47.0, -122.0),
                Coordinate::new(47.0, -121.9),
                Coordinate::new(47.1, -121.9),
            ]
        );
        assert!(index.is_complete(10));
    }

    #[test]
    fn omits_unresolved_nodes_and_flags_the_way() {
        let elements = vec![
            node(1, 1.0, 1.0),
            node(3, 3.0, 3.0),
            way(10, vec![1, 2, 3]),
        ];
        let index = index(&elements);

        assert_eq!(index.way(10).unwrap(), &[Coordinate::new(1.0, 1.0), Coordinate::new(3.0, 3.0)]);
        assert!(!index.is_complete(10));
        assert!(index.way(11).is_none());
        assert!(!index.is_complete(11));
    }

    #[test]
    fn falls_back_to_inline_way_geometry() {
        let elements = vec![Element::Way(Way {
            id: 10,
            nodes: vec![1, 2, 1],
            geometry: points(&[(1.0, 1.0), (2.0, 2.0), (1.0, 1.0)]),
            tags: Tags::new(),
        })];
        let index = index(&elements);

        assert!(index.is_complete(10));
        assert_eq!(index.way(10).unwrap(), points(&[(1.0, 1.0), (2.0, 2.0), (1.0, 1.0)]).as_slice());
    }

    #[test]
    fn resolved_nodes_win_over_inline_geometry() {
        let elements = vec![
            node(1, 5.0, 5.0),
            node(2, 6.0, 6.0),
            Element::Way(Way { id: 10, nodes: vec![1, 2], geometry: points(&[(0.0, 0.0), (0.0, 0.0)]), tags: Tags::new() }),
        ];
        assert_eq!(index(&elements).way(10).unwrap(), points(&[(5.0, 5.0), (6.0, 6.0)]).as_slice());
    }

    #[test]
    fn relation_members_supply_missing_ways() {
        let elements = vec![
            way(20, vec![1, 2]),
            Element::Relation(Relation {
                id: 1,
                members: vec![
                    Member {
                        member_type: MemberType::Way,
                        reference: 20,
                        role: Role::Outer,
                        geometry: points(&[(0.0, 0.0), (0.0, 1.0)]),
                    },
                    Member {
                        member_type: MemberType::Way,
                        reference: 21,
                        role: Role::Outer,
                        geometry: points(&[(0.0, 1.0), (1.0, 1.0)]),
                    },
                ],
                tags: Tags::new(),
            }),
        ];
        let index = index(&elements);

        assert!(index.is_complete(20));
        assert!(index.is_complete(21));
        assert_eq!(index.way(21).unwrap(), points(&[(0.0, 1.0), (1.0, 1.0)]).as_slice());
    }
}
