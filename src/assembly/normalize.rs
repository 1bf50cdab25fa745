use crate::data::{Geometry, Position};

/// Swaps the two axes of every position in a nested coordinate structure.
///
/// The assembler works in geographic (lat, lon) order while GeoJSON and the
/// renderers expect (lon, lat). The swap is its own inverse, so it must run
/// exactly once per feature; nothing detects a second application.
pub trait SwapAxes {
    fn swap_axes(self) -> Self;
}

impl SwapAxes for Position {
    fn swap_axes(self) -> Self {
        let [first, second] = self;
        [second, first]
    }
}

impl<T: SwapAxes> SwapAxes for Vec<T> {
    fn swap_axes(self) -> Self {
        self.into_iter().map(SwapAxes::swap_axes).collect()
    }
}

impl SwapAxes for Geometry {
    fn swap_axes(self) -> Self {
        match self {
            Geometry::Polygon(rings) => Geometry::Polygon(rings.swap_axes()),
            Geometry::MultiPolygon(polygons) => Geometry::MultiPolygon(polygons.swap_axes()),
        }
    }
}

pub fn normalize<T: SwapAxes>(coords: T) -> T {
    coords.swap_axes()
}
