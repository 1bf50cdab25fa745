use crate::data::{Polygon, Ring};

/// Pairs outer rings with holes by position: the first outer ring takes every
/// inner ring, the others take none. Containment is not checked.
pub fn group_polygons(outer_rings: Vec<Ring>, inner_rings: Vec<Ring>) -> Vec<Polygon> {
    let mut holes = Some(inner_rings);
    outer_rings.into_iter()
        .map(|outer| Polygon {
            outer,
            holes: holes.take().unwrap_or_default(),
        })
        .collect()
}
