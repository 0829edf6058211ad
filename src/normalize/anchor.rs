use crate::geofile::shapefile::Shape;

/// Reduce a shape to the single coordinate a feature is anchored at. `None` for empty shapes.
///
/// - Points anchor at themselves.
/// - Polygons anchor at the arithmetic mean of their outer-ring vertices. For multipolygons the
///   first polygon's outer ring is used.
/// - Lines anchor at the vertex with index `n / 2`. For multilinestrings the first line is used.
///
/// The polygon anchor is a vertex mean, not the area-weighted centroid. Both agree for regular
/// shapes but can differ a lot for concave or unevenly sampled rings.
pub fn reduce_to_anchor(shape: &Shape) -> Option<geo::Point> {
    match shape {
        Shape::Point(point) => Some(*point),
        Shape::Polygon(polygon) => vertex_mean(polygon.exterior()),
        Shape::MultiPolygon(polygons) => polygons
            .0
            .first()
            .and_then(|polygon| vertex_mean(polygon.exterior())),
        Shape::LineString(line) => vertex_midpoint(line),
        Shape::MultiLineString(lines) => lines.0.first().and_then(vertex_midpoint),
    }
}

/// Mean of the ring's vertices, not counting the closing repetition of the first vertex.
pub fn vertex_mean(ring: &geo::LineString) -> Option<geo::Point> {
    let coords = ring.0.as_slice();
    let vertices = match coords {
        [first, .., last] if first == last => &coords[..coords.len() - 1],
        _ => coords,
    };
    if vertices.is_empty() {
        return None;
    }
    let (sum_x, sum_y) = vertices
        .iter()
        .fold((0.0, 0.0), |(x, y), coord| (x + coord.x, y + coord.y));
    let count = vertices.len() as f64;
    Some(geo::Point::new(sum_x / count, sum_y / count))
}

/// The vertex halfway through the vertex sequence, ignoring segment lengths.
pub fn vertex_midpoint(line: &geo::LineString) -> Option<geo::Point> {
    line.0.get(line.0.len() / 2).map(|coord| geo::Point::from(*coord))
}

#[cfg(test)]
mod tests {
    use approx::assert_abs_diff_eq;
    use rstest::rstest;

    use super::{reduce_to_anchor, vertex_mean, vertex_midpoint};
    use crate::geofile::shapefile::Shape;

    fn unit_square() -> geo::LineString {
        vec![(0.0, 0.0), (1.0, 0.0), (1.0, 1.0), (0.0, 1.0), (0.0, 0.0)].into()
    }

    #[test]
    fn test_unit_square_centroid() {
        let polygon = geo::Polygon::new(unit_square(), vec![]);
        let anchor = reduce_to_anchor(&Shape::Polygon(polygon)).unwrap();
        assert_abs_diff_eq!(anchor, geo::Point::new(0.5, 0.5), epsilon = 1e-12);
    }

    #[test]
    fn test_vertex_mean_is_not_area_weighted() {
        // Densely sampled bottom edge pulls the vertex mean below the area centroid at y=0.5.
        let ring: geo::LineString = vec![
            (0.0, 0.0),
            (0.25, 0.0),
            (0.5, 0.0),
            (0.75, 0.0),
            (1.0, 0.0),
            (1.0, 1.0),
            (0.0, 1.0),
            (0.0, 0.0),
        ]
        .into();
        let anchor = vertex_mean(&ring).unwrap();
        assert_abs_diff_eq!(anchor.x(), 3.5 / 7.0, epsilon = 1e-12);
        assert_abs_diff_eq!(anchor.y(), 2.0 / 7.0, epsilon = 1e-12);
    }

    #[test]
    fn test_unclosed_ring_keeps_every_vertex() {
        let ring: geo::LineString = vec![(0.0, 0.0), (3.0, 0.0), (0.0, 3.0)].into();
        assert_abs_diff_eq!(vertex_mean(&ring).unwrap(), geo::Point::new(1.0, 1.0));
    }

    #[rstest]
    #[case(5, 2)]
    #[case(4, 2)]
    #[case(2, 1)]
    #[case(1, 0)]
    fn test_line_midpoint_index(#[case] num_vertices: usize, #[case] expected_index: usize) {
        let line: geo::LineString = (0..num_vertices).map(|i| (i as f64, 0.0)).collect();
        let anchor = vertex_midpoint(&line).unwrap();
        assert_eq!(expected_index as f64, anchor.x());
    }

    #[test]
    fn test_multi_shapes_use_first_member() {
        let second: geo::LineString = vec![(10.0, 10.0), (11.0, 11.0)].into();
        let first: geo::LineString = vec![(0.0, 0.0), (1.0, 2.0), (2.0, 4.0)].into();
        let lines = geo::MultiLineString::new(vec![first, second]);
        assert_eq!(
            Some(geo::Point::new(1.0, 2.0)),
            reduce_to_anchor(&Shape::MultiLineString(lines))
        );

        let far: geo::LineString = vec![(50.0, 50.0), (51.0, 50.0), (51.0, 51.0), (50.0, 50.0)].into();
        let polygons = geo::MultiPolygon::new(vec![
            geo::Polygon::new(unit_square(), vec![]),
            geo::Polygon::new(far, vec![]),
        ]);
        let anchor = reduce_to_anchor(&Shape::MultiPolygon(polygons)).unwrap();
        assert_abs_diff_eq!(anchor, geo::Point::new(0.5, 0.5), epsilon = 1e-12);
    }

    #[test]
    fn test_empty_shapes_have_no_anchor() {
        let empty_line = geo::LineString::new(vec![]);
        assert_eq!(None, reduce_to_anchor(&Shape::LineString(empty_line.clone())));
        assert_eq!(
            None,
            reduce_to_anchor(&Shape::MultiPolygon(geo::MultiPolygon::new(vec![])))
        );
        assert_eq!(
            None,
            reduce_to_anchor(&Shape::Polygon(geo::Polygon::new(empty_line, vec![])))
        );
    }
}
