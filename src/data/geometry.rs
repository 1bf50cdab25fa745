use std::fmt;

use geo::GeodesicArea;
use geojson::{feature::Id, JsonObject, JsonValue};
use serde::{Deserialize, Serialize};

use super::osm::{Coordinate, OsmId};

/// Chain of coordinates produced by the ring assembler. Only rings of at least
/// three points make it into a feature.
pub type Ring = Vec<Coordinate>;

pub const MIN_RING_LEN: usize = 3;

/// A ring is degenerate with fewer than three points once a closing point that
/// repeats the first is discounted.
pub fn is_degenerate(ring: &[Coordinate]) -> bool {
    let closed = ring.len() > 1 && ring.first() == ring.last();
    let open_len = if closed { ring.len() - 1 } else { ring.len() };
    open_len < MIN_RING_LEN
}

/// Two element position array. Holds (lat, lon) before normalization and
/// (lon, lat) after it.
pub type Position = [f64; 2];

#[derive(Debug, Clone, PartialEq)]
pub struct Polygon {
    pub outer: Ring,
    pub holes: Vec<Ring>,
}

impl Polygon {
    /// Rings as position lists, outer ring first, in geographic (lat, lon) order.
    pub fn to_positions(&self) -> Vec<Vec<Position>> {
        std::iter::once(&self.outer)
            .chain(self.holes.iter())
            .map(|ring| ring.iter().map(|coords| coords.to_pair()).collect())
            .collect()
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum Geometry {
    Polygon(Vec<Vec<Position>>),
    MultiPolygon(Vec<Vec<Vec<Position>>>),
}

impl Geometry {
    pub fn type_name(&self) -> &'static str {
        match self {
            Geometry::Polygon(_) => "Polygon",
            Geometry::MultiPolygon(_) => "MultiPolygon",
        }
    }

    fn to_geojson(&self) -> geojson::Geometry {
        fn ring_value(ring: &[Position]) -> Vec<Vec<f64>> {
            ring.iter().map(|position| position.to_vec()).collect()
        }
        fn polygon_value(rings: &[Vec<Position>]) -> Vec<Vec<Vec<f64>>> {
            rings.iter().map(|ring| ring_value(ring)).collect()
        }

        let value = match self {
            Geometry::Polygon(rings) => geojson::Value::Polygon(polygon_value(rings)),
            Geometry::MultiPolygon(polygons) => geojson::Value::MultiPolygon(
                polygons.iter().map(|rings| polygon_value(rings)).collect(),
            ),
        };
        geojson::Geometry::new(value)
    }
}

#[derive(Serialize, Deserialize, Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[serde(rename_all = "lowercase")]
pub enum SourceType {
    Way,
    Relation,
}

impl fmt::Display for SourceType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SourceType::Way => f.write_str("way"),
            SourceType::Relation => f.write_str("relation"),
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct FeatureProperties {
    pub name: String,
    pub source_type: SourceType,
    pub source_id: OsmId,
    pub classification: String,
    pub color: String,
}

impl FeatureProperties {
    fn to_json(&self) -> JsonObject {
        let mut properties = JsonObject::new();
        properties.insert("name".to_string(), JsonValue::from(self.name.as_str()));
        properties.insert("source_type".to_string(), JsonValue::from(self.source_type.to_string()));
        properties.insert("source_id".to_string(), JsonValue::from(self.source_id));
        properties.insert("classification".to_string(), JsonValue::from(self.classification.as_str()));
        properties.insert("color".to_string(), JsonValue::from(self.color.as_str()));
        properties
    }
}

/// Finished area feature. Geometry is always in display (lon, lat) order.
#[derive(Debug, Clone, PartialEq)]
pub struct Feature {
    pub geometry: Geometry,
    pub properties: FeatureProperties,
}

impl Feature {
    pub fn id(&self) -> String {
        format!("{}/{}", self.properties.source_type, self.properties.source_id)
    }

    pub fn to_geojson(&self) -> geojson::Feature {
        geojson::Feature {
            bbox: None,
            geometry: Some(self.geometry.to_geojson()),
            id: Some(Id::String(self.id())),
            properties: Some(self.properties.to_json()),
            foreign_members: None,
        }
    }

    /// Unsigned geodesic area in square metres. Holes are subtracted.
    pub fn geodesic_area(&self) -> f64 {
        match &self.geometry {
            Geometry::Polygon(rings) => to_geo_polygon(rings)
                .map_or(0.0, |polygon| polygon.geodesic_area_unsigned()),
            Geometry::MultiPolygon(polygons) => {
                geo::MultiPolygon::new(polygons.iter().filter_map(|rings| to_geo_polygon(rings)).collect())
                    .geodesic_area_unsigned()
            }
        }
    }
}

fn to_geo_polygon(rings: &[Vec<Position>]) -> Option<geo::Polygon<f64>> {
    let mut line_strings = rings.iter().map(|ring| {
        geo::LineString::from(ring.iter().map(|position| (position[0], position[1])).collect::<Vec<_>>())
    });
    let exterior = line_strings.next()?;
    Some(geo::Polygon::new(exterior, line_strings.collect()))
}

pub fn features_to_geojson(features: &[Feature]) -> geojson::GeoJson {
    geojson::GeoJson::FeatureCollection(geojson::FeatureCollection {
        bbox: None,
        features: features.iter().map(Feature::to_geojson).collect(),
        foreign_members: None,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn square_feature(size: f64) -> Feature {
        let ring = vec![[0.0, 0.0], [size, 0.0], [size, size], [0.0, size], [0.0, 0.0]];
        Feature {
            geometry: Geometry::Polygon(vec![ring]),
            properties: FeatureProperties {
                name: "Square".to_string(),
                source_type: SourceType::Way,
                source_id: 42,
                classification: "area".to_string(),
                color: "#3388ff".to_string(),
            },
        }
    }

    #[test]
    fn polygon_positions_list_outer_ring_first() {
        let polygon = Polygon {
            outer: vec![(1.0, 2.0).into(), (3.0, 4.0).into(), (1.0, 2.0).into()],
            holes: vec![vec![(5.0, 6.0).into()]],
        };
        assert_eq!(
            polygon.to_positions(),
            vec![vec![[1.0, 2.0], [3.0, 4.0], [1.0, 2.0]], vec![[5.0, 6.0]]]
        );
    }

    #[test]
    fn closing_point_does_not_count_towards_ring_length() {
        let a = Coordinate::new(0.0, 0.0);
        let b = Coordinate::new(1.0, 1.0);
        let c = Coordinate::new(1.0, 0.0);
        assert!(is_degenerate(&[a, b]));
        assert!(is_degenerate(&[a, b, a]));
        assert!(!is_degenerate(&[a, b, c]));
        assert!(!is_degenerate(&[a, b, c, a]));
    }

    #[test]
    fn geojson_feature_carries_id_and_properties() {
        let feature = square_feature(0.01).to_geojson();
        assert_eq!(feature.id, Some(Id::String("way/42".to_string())));

        let properties = feature.properties.unwrap();
        assert_eq!(properties["name"], "Square");
        assert_eq!(properties["source_type"], "way");
        assert_eq!(properties["source_id"], 42);

        let geometry = feature.geometry.unwrap();
        let geojson::Value::Polygon(rings) = geometry.value else {
            panic!("expected a polygon");
        };
        assert_eq!(rings[0].len(), 5);
        assert_eq!(rings[0][1], vec![0.01, 0.0]);
    }

    #[test]
    fn geodesic_area_grows_with_size() {
        let small = square_feature(0.01).geodesic_area();
        let large = square_feature(0.02).geodesic_area();
        // 0.01 degrees at the equator is roughly 1.1 km.
        assert!(small > 1.0e6 && small < 1.5e6, "{small}");
        assert!(large > 3.5 * small && large < 4.5 * small);
    }

    #[test]
    fn collection_wraps_every_feature() {
        let collection = features_to_geojson(&[square_feature(0.01), square_feature(0.02)]);
        let geojson::GeoJson::FeatureCollection(collection) = collection else {
            panic!("expected a feature collection");
        };
        assert_eq!(collection.features.len(), 2);
    }
}
