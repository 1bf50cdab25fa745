use std::collections::VecDeque;

use log::debug;

use crate::data::{Coordinate, OsmId, Ring};

use super::index::ElementIndex;

/// Resolves way references through the index and stitches them into rings.
/// Unknown ways, and ways with unresolved nodes, are left out.
pub fn assemble_rings(way_refs: &[OsmId], index: &ElementIndex) -> Vec<Ring> {
    let paths: Vec<&[Coordinate]> = way_refs.iter()
        .filter_map(|&way_id| {
            if !index.is_complete(way_id) {
                debug!(way_id = way_id; "Dropping member way that is missing or incomplete");
                return None;
            }
            index.way(way_id)
        })
        .collect();
    stitch_paths(&paths)
}

/// Greedily chains open paths by their end points.
///
/// Each chain starts from the first unconsumed path and keeps absorbing any path
/// that shares an end point with it, reversing the path when needed, until
/// nothing else attaches. Chains are returned in discovery order whether or
/// not they closed.
pub fn stitch_paths(paths: &[&[Coordinate]]) -> Vec<Ring> {
    let mut consumed: Vec<bool> = paths.iter().map(|path| path.is_empty()).collect();
    let mut rings = Vec::new();

    for seed in 0..paths.len() {
        if consumed[seed] {
            continue;
        }
        consumed[seed] = true;
        let mut ring: VecDeque<Coordinate> = paths[seed].iter().copied().collect();

        while let Some(candidate) = attach_next(&mut ring, paths, &consumed) {
            consumed[candidate] = true;
        }
        rings.push(ring.into_iter().collect());
    }

    rings
}

/// Joins the first unconsumed path that touches either end of `ring` and
/// returns its position.
fn attach_next(ring: &mut VecDeque<Coordinate>, paths: &[&[Coordinate]], consumed: &[bool]) -> Option<usize> {
    let first = *ring.front()?;
    let last = *ring.back()?;

    for (position, path) in paths.iter().enumerate() {
        if consumed[position] {
            continue;
        }
        let (Some(&path_first), Some(&path_last)) = (path.first(), path.last()) else {
            continue;
        };

        if last == path_first {
            ring.extend(path[1..].iter().copied());
        } else if first == path_last {
            for &coords in path[..path.len() - 1].iter().rev() {
                ring.push_front(coords);
            }
        } else if first == path_first {
            for &coords in path[1..].iter() {
                ring.push_front(coords);
            }
        } else if last == path_last {
            ring.extend(path[..path.len() - 1].iter().rev().copied());
        } else {
            continue;
        }
        return Some(position);
    }

    None
}
