//! Property tests for Overpass query construction.

use osm_export_core::{BoundingBox, ConfigurationError, QueryBuilder, build_query};
use proptest::prelude::*;

fn ordered_pair(lower: f64, upper: f64) -> impl Strategy<Value = (f64, f64)> {
    (lower..upper, lower..upper)
        .prop_filter("components must differ", |(a, b)| a != b)
        .prop_map(|(a, b)| if a < b { (a, b) } else { (b, a) })
}

proptest! {
    #[test]
    fn valid_boxes_embed_every_component(
        (min_y, max_y) in ordered_pair(-90.0, 90.0),
        (min_x, max_x) in ordered_pair(-180.0, 180.0),
        max_size in 1_u64..=u64::from(u32::MAX),
        timeout in 1_u64..=86_400,
    ) {
        let bbox = BoundingBox::new(min_y, min_x, max_y, max_x).expect("ordered box");
        let query = QueryBuilder::new(max_size, timeout).build(&bbox);

        let bbox_directive = format!("[bbox:{min_y},{min_x},{max_y},{max_x}]");
        prop_assert!(query.contains(&bbox_directive));
        let maxsize_directive = format!("[maxsize:{max_size}]");
        prop_assert!(query.contains(&maxsize_directive));
        let timeout_directive = format!("[timeout:{timeout}]");
        prop_assert!(query.contains(&timeout_directive));
        prop_assert!(query.ends_with("out body;"));
        prop_assert!(
            !query.contains('{') && !query.contains('$'),
            "unresolved placeholder in {}",
            query
        );
    }

    #[test]
    fn rendered_boxes_parse_back(
        (min_y, max_y) in ordered_pair(-90.0, 90.0),
        (min_x, max_x) in ordered_pair(-180.0, 180.0),
    ) {
        let bbox = BoundingBox::new(min_y, min_x, max_y, max_x).expect("ordered box");
        let reparsed: BoundingBox = bbox.to_string().parse().expect("display output parses");
        prop_assert_eq!(reparsed, bbox);
    }

    #[test]
    fn inverted_latitudes_are_rejected(
        (low, high) in ordered_pair(-90.0, 90.0),
        (min_x, max_x) in ordered_pair(-180.0, 180.0),
    ) {
        let raw = format!("{high},{min_x},{low},{max_x}");
        let outcome = build_query(&raw, 1024, 25);
        prop_assert!(
            matches!(outcome, Err(ConfigurationError::InvertedBounds { axis: "y", .. })),
            "expected inverted y axis for {raw}"
        );
    }

    #[test]
    fn truncated_boxes_are_rejected(values in prop::collection::vec(-10.0_f64..10.0, 0..4)) {
        let raw = values
            .iter()
            .map(ToString::to_string)
            .collect::<Vec<_>>()
            .join(",");
        let outcome = build_query(&raw, 1024, 25);
        prop_assert!(
            matches!(outcome, Err(ConfigurationError::MissingComponent { .. })),
            "expected missing component for {raw:?}"
        );
    }
}
