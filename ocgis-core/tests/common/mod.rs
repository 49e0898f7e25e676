//! Shared fixtures for the integration tests
#![allow(dead_code)]

use chrono::{Duration, NaiveDate, NaiveDateTime};
use geo::{Geometry, Point};
use ndarray::{array, Array1, Array2, Array4, Axis};
use ocgis_core::{
    DatePart, LevelDimension, MaskedArray, OcgConfig, OcgVariable, SpatialDimension,
    TemporalDimension,
};
use rand::{Rng, SeedableRng};
use rand_chacha::ChaCha8Rng;

pub const SEED: u64 = 1;

/// Daily time steps at noon from 2000-01-01 to 2001-12-31
pub fn temporal(add_bounds: bool) -> TemporalDimension {
    let start = NaiveDate::from_ymd_opt(2000, 1, 1)
        .unwrap()
        .and_hms_opt(12, 0, 0)
        .unwrap();
    let end = NaiveDate::from_ymd_opt(2001, 12, 31)
        .unwrap()
        .and_hms_opt(12, 0, 0)
        .unwrap();
    let n = (end - start).num_days() as usize + 1;
    let value: Array1<NaiveDateTime> = (0..n).map(|i| start + Duration::days(i as i64)).collect();
    let bounds = add_bounds.then(|| {
        Array2::from_shape_fn((n, 2), |(t, b)| {
            let offset = if b == 0 { -12 } else { 12 };
            value[t] + Duration::hours(offset)
        })
    });
    TemporalDimension::new((1..=n as i64).collect(), value, bounds).unwrap()
}

/// Random mask over the 5x5 grid with the first cell always kept
pub fn spatial_mask(rng: &mut ChaCha8Rng) -> Array2<bool> {
    let mut mask = Array2::from_shape_fn((5, 5), |_| rng.gen_bool(0.3));
    mask[[0, 0]] = false;
    mask
}

/// 5x5 grid of points over x in -90..-85 and y in 40..45
pub fn spatial(rng: &mut ChaCha8Rng) -> SpatialDimension {
    let geoms = Array2::from_shape_fn((5, 5), |(r, c)| {
        Geometry::Point(Point::new(-90.0 + c as f64, 40.0 + r as f64))
    });
    let uid = Array2::from_shape_fn((5, 5), |(r, c)| (r * 5 + c + 1) as i64);
    SpatialDimension::from_config(uid, geoms, spatial_mask(rng), &OcgConfig::default()).unwrap()
}

pub fn level(add_bounds: bool) -> LevelDimension {
    let bounds = add_bounds.then(|| array![[0.0, 100.0], [100.0, 200.0]]);
    LevelDimension::new(array![1, 2], array![50.0, 150.0], bounds).unwrap()
}

/// Variable with random values masked wherever the spatial grid is masked
pub fn variable(name: &str, add_bounds: bool, add_level: bool, seed: u64) -> OcgVariable {
    // Every variable shares the grid mask, only the values depend on `seed`
    let spatial = spatial(&mut ChaCha8Rng::seed_from_u64(SEED));
    let mut rng = ChaCha8Rng::seed_from_u64(seed);
    let temporal = temporal(add_bounds);
    let level = add_level.then(|| level(add_bounds));
    let n_level = if add_level { 2 } else { 1 };

    let shape = (temporal.len(), n_level, 5, 5);
    let data = Array4::from_shape_fn(shape, |_| rng.gen::<f64>() * 100.0);
    let mask = Array4::from_shape_fn(shape, |(_, _, r, c)| spatial.mask()[[r, c]]);
    let value = MaskedArray::new(data, mask).unwrap();

    OcgVariable::new(name, value, temporal, spatial, level)
        .unwrap()
        .with_uri(format!("{}.nc", name))
}

/// Group `variable` and attach the group mean and maximum as calculations
pub fn calculate(variable: &mut OcgVariable, parts: &[DatePart]) {
    let dgroups = variable.group(parts).unwrap().dgroups().to_vec();
    let value = variable.value().clone();
    let (_, n_level, rows, cols) = value.data().dim();
    let shape = (dgroups.len(), n_level, rows, cols);

    let mut mean = Array4::zeros(shape);
    let mut max = Array4::zeros(shape);
    let mut mask = Array4::from_elem(shape, true);
    for (g, dgroup) in dgroups.iter().enumerate() {
        let members: Vec<usize> = dgroup
            .iter()
            .enumerate()
            .filter(|(_, member)| **member)
            .map(|(idx, _)| idx)
            .collect();
        let data = value.data().select(Axis(0), &members);
        let data_mask = value.mask().select(Axis(0), &members);
        for l in 0..n_level {
            for r in 0..rows {
                for c in 0..cols {
                    let values: Vec<f64> = (0..members.len())
                        .filter(|t| !data_mask[[*t, l, r, c]])
                        .map(|t| data[[t, l, r, c]])
                        .collect();
                    if values.is_empty() {
                        continue;
                    }
                    mean[[g, l, r, c]] = values.iter().sum::<f64>() / values.len() as f64;
                    max[[g, l, r, c]] = values.iter().cloned().fold(f64::MIN, f64::max);
                    mask[[g, l, r, c]] = false;
                }
            }
        }
    }

    variable
        .add_calc_value("my_mean", MaskedArray::new(mean, mask.clone()).unwrap())
        .unwrap();
    variable
        .add_calc_value("my_max", MaskedArray::new(max, mask).unwrap())
        .unwrap();
}
