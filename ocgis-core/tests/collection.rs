//! End to end tests melting collections of gridded variables.

mod common;

use ocgis_core::{
    DatePart, Field, KeyedIterator, MeltedIterator, OcgCollection, OcgError, OcgVariable,
};

fn groupings() -> Vec<Option<Vec<DatePart>>> {
    vec![
        None,
        Some(vec![DatePart::Month]),
        Some(vec![DatePart::Year]),
        Some(vec![DatePart::Month, DatePart::Year]),
    ]
}

fn build(
    add_bounds: bool,
    add_level: bool,
    group: Option<&[DatePart]>,
    aggregate: bool,
) -> OcgCollection {
    let mut coll = OcgCollection::new();
    for (idx, name) in ["tas", "tasmax"].iter().enumerate() {
        let mut var = common::variable(name, add_bounds, add_level, common::SEED + idx as u64);
        if aggregate {
            var.aggregate().unwrap();
        }
        if let Some(parts) = group {
            common::calculate(&mut var, parts);
        }
        coll.add_variable(var).unwrap();
        if group.is_some() {
            coll.add_calculation(name).unwrap();
        }
    }
    coll
}

mod melted {
    use super::*;

    #[test]
    fn row_counts_and_keys() {
        for add_bounds in [false, true] {
            for add_level in [false, true] {
                for group in groupings() {
                    for aggregate in [false, true] {
                        let coll = build(add_bounds, add_level, group.as_deref(), aggregate);
                        let it = MeltedIterator::new(&coll).unwrap();
                        let headers = it.get_headers();

                        let var = coll.variable("tas").unwrap();
                        let n_cells = var.spatial().len();
                        let n_level = var.level_len();

                        let (expected, n_keys) = match &group {
                            None => (var.time_len() * n_cells * n_level * 2, 12),
                            Some(parts) => {
                                let n_groups = var.temporal_group().unwrap().len();
                                let n_calc = var.calc_value().len();
                                (n_groups * n_cells * n_level * n_calc * 2, 13 + parts.len())
                            }
                        };

                        let mut n_rows = 0;
                        for row in it.iter_rows() {
                            assert_eq!(row.len(), n_keys);
                            assert_eq!(row["level"].is_null(), !add_level);
                            n_rows += 1;
                        }
                        assert_eq!(n_rows, expected);

                        let mut n_list = 0;
                        for (fields, geometry) in it.iter_list() {
                            assert_eq!(fields.len(), headers.len());
                            assert!(fields[headers.len() - 1].as_f64().is_some());
                            if aggregate {
                                assert!(matches!(
                                    geometry,
                                    geo::Geometry::MultiPoint(_) | geo::Geometry::Point(_)
                                ));
                            }
                            n_list += 1;
                        }
                        assert_eq!(n_list, expected);
                    }
                }
            }
        }
    }

    #[test]
    fn ids_are_shared_across_variables() {
        let coll = build(true, true, None, false);
        let it = MeltedIterator::new(&coll).unwrap();
        let rows: Vec<_> = it.iter_rows().collect();
        let first = &rows[0];
        let last = rows.last().unwrap();
        assert_eq!(first["vid"], Field::Int(1));
        assert_eq!(last["vid"], Field::Int(2));
        assert_eq!(last["did"], Field::Int(2));
        assert_eq!(last["uri"].as_str(), Some("tasmax.nc"));
        assert_eq!(first["ugid"], Field::Int(1));
    }

    #[test]
    fn grouped_by_month_and_year() {
        let coll = build(false, false, Some(&[DatePart::Month, DatePart::Year][..]), false);
        let var = coll.variable("tas").unwrap();
        assert_eq!(var.temporal_group().unwrap().len(), 24);

        let row = MeltedIterator::new(&coll).unwrap().iter_rows().next().unwrap();
        assert_eq!(row["month"], Field::Int(1));
        assert_eq!(row["year"], Field::Int(2000));
        assert_eq!(row["calc_name"].as_str(), Some("my_mean"));
        assert_eq!(row["cid"], Field::Int(1));
    }
}

mod aggregation {
    use super::*;
    use geo::{Geometry, Rect};
    use is_close::is_close;
    use ndarray::Array4;
    use ocgis_core::{MaskedArray, OcgConfig, SpatialDimension};

    #[test]
    fn aggregated_mean_matches_raw_mean() {
        for add_level in [false, true] {
            let mut var = common::variable("tas", true, add_level, common::SEED);
            let raw_mean = var.value().mean().unwrap();
            var.aggregate().unwrap();

            assert_eq!(var.spatial().len(), 1);
            assert_eq!(var.spatial().shape(), vec![1]);
            assert!(var.raw_value().is_some());
            let agg_mean = var.value().mean().unwrap();
            assert!(is_close!(raw_mean, agg_mean, abs_tol = 1e-5));
        }
    }

    #[test]
    fn weighting_follows_config() {
        // The second cell has four times the area of the first
        let geoms = ndarray::array![[
            Geometry::Rect(Rect::new((0.0, 0.0), (1.0, 1.0))),
            Geometry::Rect(Rect::new((1.0, 0.0), (3.0, 2.0))),
        ]];
        for (text, expected) in [("", 2.25 / 1.25), ("weighting = \"uniform\"", 1.5)] {
            let config = OcgConfig::from_toml_str(text).unwrap();
            let spatial = SpatialDimension::from_config(
                ndarray::array![[1, 2]],
                geoms.clone(),
                ndarray::array![[false, false]],
                &config,
            )
            .unwrap();
            let temporal = common::temporal(false);
            let data = Array4::from_shape_fn((temporal.len(), 1, 1, 2), |(_, _, _, c)| {
                (c + 1) as f64
            });
            let mut var =
                OcgVariable::new("tas", MaskedArray::unmasked(data), temporal, spatial, None)
                    .unwrap();
            var.aggregate().unwrap();

            let mut coll = OcgCollection::from_config(&config);
            coll.add_variable(var).unwrap();
            let it = MeltedIterator::with_options(&coll, config.iter_options()).unwrap();
            for row in it.iter_rows() {
                let value = row["value"].as_f64().unwrap();
                assert!(is_close!(value, expected, abs_tol = 1e-10));
            }
        }
    }

    #[test]
    fn grouping_after_aggregation() {
        let coll = build(true, false, Some(&[DatePart::Year][..]), true);
        let rows: Vec<_> = MeltedIterator::new(&coll).unwrap().iter_rows().collect();
        // years x calculations x variables
        assert_eq!(rows.len(), 2 * 2 * 2);
        assert!(rows.iter().all(|row| row["gid"] == Field::Int(1)));
    }
}

mod keyed {
    use super::*;

    #[test]
    fn rows_match_melted() {
        for group in groupings() {
            let coll = build(true, true, group.as_deref(), false);
            let melted = MeltedIterator::new(&coll).unwrap().iter_rows().count();
            let it = KeyedIterator::new(&coll).unwrap();
            assert_eq!(it.iter_rows().count(), melted);

            let var = coll.variable("tas").unwrap();
            assert_eq!(it.tables().level.len(), 2);
            let n_time = match var.temporal_group() {
                Some(tgdim) => tgdim.len(),
                None => var.time_len(),
            };
            assert_eq!(it.tables().time.len(), n_time);
        }
    }
}

#[test]
fn weights_share_the_spatial_mask() {
    let var = common::variable("tas", false, false, common::SEED);
    let spatial = var.spatial();
    assert_eq!(spatial.weights().mask(), spatial.uid().mask());
    assert_eq!(spatial.shape(), vec![5, 5]);
    assert!(spatial.len() <= 25);
}

#[test]
fn duplicate_variable_name() {
    let mut coll = OcgCollection::new();
    coll.add_variable(common::variable("tas", false, false, common::SEED))
        .unwrap();
    let result = coll.add_variable(common::variable("tas", false, false, common::SEED));
    assert!(matches!(result, Err(OcgError::DuplicateName(_))));
}

#[test]
fn get_empty() {
    let var = OcgVariable::get_empty("tas");
    assert!(var.level().is_none());
    assert_eq!(var.spatial().shape(), vec![0]);
    assert_eq!(var.temporal().shape(), (0,));

    let mut coll = OcgCollection::new();
    coll.add_variable(var).unwrap();
    assert_eq!(MeltedIterator::new(&coll).unwrap().iter_rows().count(), 0);
}
