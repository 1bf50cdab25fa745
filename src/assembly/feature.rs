use std::collections::HashSet;

use log::{debug, warn};
use serde::Deserialize;

use crate::{
    config::FeatureStyle,
    data::{
        geometry::is_degenerate, Element, Feature, FeatureProperties, Geometry, MemberType, OsmId,
        Polygon, Relation, Role, SourceType, Tags,
    },
};

use super::{
    index::ElementIndex,
    normalize::normalize,
    polygons::group_polygons,
    rings::assemble_rings,
};

/// Tags consulted, in order, when no classification is configured.
const CLASSIFICATION_KEYS: [&str; 6] = ["boundary", "place", "natural", "landuse", "leisure", "building"];

#[derive(Deserialize, Debug, Clone, Copy, PartialEq, Eq)]
pub struct Target {
    #[serde(rename = "type")]
    pub source_type: SourceType,
    pub id: OsmId,
}

impl Target {
    pub fn way(id: OsmId) -> Self {
        Target { source_type: SourceType::Way, id }
    }

    pub fn relation(id: OsmId) -> Self {
        Target { source_type: SourceType::Relation, id }
    }
}

/// Builds the area feature for one way or relation.
///
/// Returns `None` when the target is not in `elements` or no outer ring of at
/// least three points could be assembled.
pub fn build_feature(target: Target, elements: &[Element], index: &ElementIndex, style: &FeatureStyle) -> Option<Feature> {
    let (polygons, tags) = match target.source_type {
        SourceType::Way => {
            let tags = elements.iter().find_map(|element| match element {
                Element::Way(way) if way.id == target.id => Some(&way.tags),
                _ => None,
            })?;
            (way_polygons(target.id, index), tags)
        }
        SourceType::Relation => {
            let relation = elements.iter().find_map(|element| match element {
                Element::Relation(relation) if relation.id == target.id => Some(relation),
                _ => None,
            })?;
            (relation_polygons(relation, index), &relation.tags)
        }
    };

    if polygons.is_empty() {
        debug!(source_type = target.source_type.to_string(), source_id = target.id; "No outer ring assembled");
        return None;
    }

    let geometry = if polygons.len() > 1 {
        Geometry::MultiPolygon(polygons.iter().map(Polygon::to_positions).collect())
    } else {
        Geometry::Polygon(polygons[0].to_positions())
    };

    Some(Feature {
        geometry: normalize(geometry),
        properties: properties(target, tags, style),
    })
}

fn way_polygons(way_id: OsmId, index: &ElementIndex) -> Vec<Polygon> {
    match index.way(way_id) {
        Some(coords) if !is_degenerate(coords) => vec![Polygon {
            outer: coords.to_vec(),
            holes: Vec::new(),
        }],
        _ => Vec::new(),
    }
}

fn relation_polygons(relation: &Relation, index: &ElementIndex) -> Vec<Polygon> {
    let mut outer_refs = Vec::new();
    let mut inner_refs = Vec::new();
    for member in &relation.members {
        if member.member_type != MemberType::Way {
            continue;
        }
        match member.role {
            Role::Outer => outer_refs.push(member.reference),
            Role::Inner => inner_refs.push(member.reference),
            Role::Ignored(_) => (),
        }
    }

    let mut outer_rings = assemble_rings(&outer_refs, index);
    let mut inner_rings = assemble_rings(&inner_refs, index);
    outer_rings.retain(|ring| !is_degenerate(ring));
    inner_rings.retain(|ring| !is_degenerate(ring));

    group_polygons(outer_rings, inner_rings)
}

fn properties(target: Target, tags: &Tags, style: &FeatureStyle) -> FeatureProperties {
    let name = tags.get("name")
        .cloned()
        .unwrap_or_else(|| format!("{} {}", target.source_type, target.id));
    let classification = style.classification.clone()
        .or_else(|| {
            CLASSIFICATION_KEYS.iter()
                .find_map(|key| tags.get(*key).map(|value| format!("{key}={value}")))
        })
        .unwrap_or_else(|| "area".to_string());

    FeatureProperties {
        name,
        source_type: target.source_type,
        source_id: target.id,
        classification,
        color: style.color.clone(),
    }
}

/// Builds a feature for every relation and every closed way that is not itself
/// a relation member, in payload order. Targets that yield nothing are skipped.
pub fn build_all(elements: &[Element], index: &ElementIndex, style: &FeatureStyle) -> Vec<Feature> {
    let member_ways: HashSet<OsmId> = elements.iter()
        .filter_map(|element| match element {
            Element::Relation(relation) => Some(relation),
            _ => None,
        })
        .flat_map(|relation| relation.members.iter())
        .filter(|member| member.member_type == MemberType::Way)
        .map(|member| member.reference)
        .collect();

    let targets: Vec<Target> = elements.iter()
        .filter_map(|element| match element {
            Element::Relation(relation) => Some(Target::relation(relation.id)),
            Element::Way(way) if way.is_closed() && !member_ways.contains(&way.id) => Some(Target::way(way.id)),
            _ => None,
        })
        .collect();

    let mut features = Vec::new();
    for target in tqdm::tqdm(targets.into_iter()) {
        match build_feature(target, elements, index, style) {
            Some(feature) => features.push(feature),
            None => warn!(
                source_type = target.source_type.to_string(),
                source_id = target.id;
                "Skipping target without geometry"
            ),
        }
    }
    features
}
