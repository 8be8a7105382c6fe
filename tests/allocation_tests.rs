//! Allocation and aggregation: partition, band pairing, undefined ratios.

mod helpers;

use food_ehanpp::aggregation::{
    aggregate_national, aggregate_regional, quantity_columns, NATIONAL_KEYS,
};
use food_ehanpp::allocation::allocate;
use food_ehanpp::band::intensity_columns;
use food_ehanpp::population::regional_population;
use food_ehanpp::schema::{band_factors, country, energy, population, product, summary, transaction};
use food_ehanpp::{Band, PanelError, Quantity};
use polars::prelude::*;

use helpers::*;

/// (destination_code, gdd_code, income_group, food_group, product_code,
/// pressure, [urban_median, rural_median, urban_upper, rural_upper,
/// urban_lower, rural_lower])
type Row<'a> = (&'a str, &'a str, &'a str, &'a str, &'a str, f64, [f64; 6]);

fn reconciled(rows: &[Row<'_>]) -> DataFrame {
    let factor = |i: usize| rows.iter().map(|r| r.6[i]).collect::<Vec<_>>();
    df!(
        transaction::DESTINATION_CODE => rows.iter().map(|r| r.0).collect::<Vec<_>>(),
        transaction::DESTINATION => rows.iter().map(|r| r.1).collect::<Vec<_>>(),
        country::GDD_CODE => rows.iter().map(|r| r.1).collect::<Vec<_>>(),
        country::INCOME_GROUP => rows.iter().map(|r| r.2).collect::<Vec<_>>(),
        transaction::YEAR => rows.iter().map(|_| 2000i64).collect::<Vec<_>>(),
        transaction::FINAL_USE => rows.iter().map(|_| "Food").collect::<Vec<_>>(),
        product::FOOD_GROUP => rows.iter().map(|r| r.3).collect::<Vec<_>>(),
        transaction::PRODUCT_CODE => rows.iter().map(|r| r.4).collect::<Vec<_>>(),
        transaction::PRODUCT => rows.iter().map(|r| r.4).collect::<Vec<_>>(),
        product::GDD_ITEM_CODE => rows.iter().map(|_| "v07_v08").collect::<Vec<_>>(),
        product::GDD_ITEM => rows.iter().map(|_| "Grains").collect::<Vec<_>>(),
        transaction::PRESSURE => rows.iter().map(|r| r.5).collect::<Vec<_>>(),
        band_factors::URBAN_MEDIAN => factor(0),
        band_factors::RURAL_MEDIAN => factor(1),
        band_factors::URBAN_UPPER => factor(2),
        band_factors::RURAL_UPPER => factor(3),
        band_factors::URBAN_LOWER => factor(4),
        band_factors::RURAL_LOWER => factor(5)
    )
    .unwrap()
}

fn fixture() -> DataFrame {
    reconciled(&[
        ("1", "AUT", "H", "Cereals", "15", 10.0, [2.0, 1.0, 4.0, 2.0, 1.0, 0.5]),
        ("1", "AUT", "H", "Infra", "Infrastructure", 2.0, [1.0; 6]),
        ("2", "SGP", "L", "Cereals", "15", 3.0, [5.0, 0.0, 5.0, 0.0, 5.0, 0.0]),
        // no weight on either side: the split is undefined
        ("2", "SGP", "L", "Cereals", "16", 1.0, [0.0; 6]),
    ])
}

fn national_population() -> DataFrame {
    df!(
        population::CODE_FAO => ["1", "2"],
        country::INCOME_GROUP => ["H", "L"],
        population::YEAR => [2000i64, 2000],
        population::NATIONAL => [1000.0, 500.0],
        population::URBAN_SHARE => [0.25, 1.0],
        population::URBAN => [250.0, 500.0],
        population::RURAL => [750.0, 0.0]
    )
    .unwrap()
}

fn food_supply() -> DataFrame {
    df!(
        energy::DESTINATION_CODE => ["1", "2"],
        energy::YEAR => [2000i64, 2000],
        energy::PRODUCT_CODE => ["15", "15"],
        energy::TONNES_DM => [88.0, 8.8]
    )
    .unwrap()
}

fn factors() -> DataFrame {
    df!(
        energy::PRODUCT_CODE => ["15", "16"],
        energy::DM_CONTENT => [0.88, 0.88],
        energy::KCAL_PER_G => [3.0, 3.0]
    )
    .unwrap()
}

fn allocated() -> DataFrame {
    allocate(&fixture(), &national_population(), &food_supply(), &factors()).unwrap()
}

fn only(df: &DataFrame, destination: &str, product_code: &str) -> DataFrame {
    df.clone()
        .lazy()
        .filter(
            col(transaction::DESTINATION_CODE)
                .eq(lit(destination))
                .and(col(transaction::PRODUCT_CODE).eq(lit(product_code))),
        )
        .collect()
        .unwrap()
}

fn scalar(df: &DataFrame, column: &str) -> f64 {
    assert_eq!(df.height(), 1);
    df.column(column).unwrap().f64().unwrap().get(0).unwrap()
}

#[test]
fn urban_and_rural_partition_the_total() {
    let df = allocated();
    for quantity in Quantity::ALL {
        let totals = f64_values(&df, quantity.total_column());
        for band in Band::ALL {
            let urban = f64_values(&df, &quantity.urban(band));
            let rural = f64_values(&df, &quantity.rural(band));
            for i in 0..df.height() {
                let (Some(t), Some(u), Some(r)) = (totals[i], urban[i], rural[i]) else {
                    continue;
                };
                if u.is_nan() {
                    assert!(r.is_nan());
                    continue;
                }
                assert!(
                    (u + r - t).abs() <= 1e-12 * t.abs().max(1.0),
                    "{quantity:?} {band:?} row {i}"
                );
            }
        }
    }
}

#[test]
fn energy_is_converted_from_dry_matter() {
    let aut = only(&allocated(), "1", "15");
    // 88 t dm / 0.88 = 100 t fresh; 100e6 g * 3 kcal/g
    let kcal = scalar(&aut, energy::KCAL);
    assert!((kcal - 3.0e8).abs() < 1e-3);
    let per_day = scalar(&aut, energy::KCAL_CAP_DAY);
    assert!((per_day - 3.0e8 / 1000.0 / 365.0).abs() < 1e-6);
}

#[test]
fn high_band_pairs_urban_lower_with_rural_upper() {
    let aut = only(&allocated(), "1", "15");
    // urban lower 1.0, rural upper 2.0
    let share = 250.0 / (250.0 + 2.0 * 750.0);
    let urban = scalar(&aut, &Quantity::Pressure.urban(Band::High));
    assert!((urban - share * 10.0).abs() < 1e-12);

    // low: urban upper 4.0, rural lower 0.5
    let share = 4.0 * 250.0 / (4.0 * 250.0 + 0.5 * 750.0);
    let urban = scalar(&aut, &Quantity::Pressure.urban(Band::Low));
    assert!((urban - share * 10.0).abs() < 1e-12);
}

#[test]
fn zero_rural_population_makes_rural_per_capita_undefined() {
    let sgp = only(&allocated(), "2", "15");
    for quantity in Quantity::ALL {
        for band in Band::ALL {
            assert_eq!(scalar(&sgp, &quantity.rural(band)), 0.0);
            assert!(scalar(&sgp, &quantity.rural_cap(band)).is_nan());
            assert!(!scalar(&sgp, &quantity.urban_cap(band)).is_nan());
        }
    }
    let urban_cap = scalar(&sgp, &Quantity::Pressure.urban_cap(Band::Median));
    assert!((urban_cap - 3.0 / 500.0).abs() < 1e-12);
}

#[test]
fn rows_without_supply_have_no_energy() {
    let df = allocated();
    let infra = only(&df, "1", "Infrastructure");
    assert_eq!(infra.column(energy::KCAL).unwrap().null_count(), 1);
    assert_eq!(
        infra
            .column(&Quantity::Energy.urban(Band::Median))
            .unwrap()
            .null_count(),
        1
    );
}

#[test]
fn national_sums_treat_absent_as_zero_and_propagate_undefined() {
    let national = aggregate_national(&allocated(), &national_population()).unwrap();
    for key in NATIONAL_KEYS {
        assert_eq!(national.column(key).unwrap().null_count(), 0);
    }
    // AUT cereals, AUT infra, SGP cereals
    assert_eq!(national.height(), 3);

    let infra = national
        .clone()
        .lazy()
        .filter(col(product::FOOD_GROUP).eq(lit("Infra")))
        .collect()
        .unwrap();
    assert_eq!(scalar(&infra, energy::KCAL), 0.0);
    assert_eq!(scalar(&infra, transaction::PRESSURE), 2.0);
    assert!(scalar(&infra, energy::INTENSITY).is_nan());

    let sgp = national
        .clone()
        .lazy()
        .filter(col(transaction::DESTINATION_CODE).eq(lit("2")))
        .collect()
        .unwrap();
    assert_eq!(scalar(&sgp, transaction::PRESSURE), 4.0);
    assert!(scalar(&sgp, &Quantity::Pressure.urban(Band::Median)).is_nan());
    assert!(scalar(&sgp, &Quantity::Pressure.rural_cap(Band::Median)).is_nan());
    // the undefined row carries no energy, so energy stays defined
    assert!(!scalar(&sgp, &Quantity::Energy.urban(Band::Median)).is_nan());
}

#[test]
fn regional_ratios_use_regional_population() {
    let national_pop = national_population();
    let national = aggregate_national(&allocated(), &national_pop).unwrap();
    let regional_pop = regional_population(&national_pop).unwrap();
    let regional = aggregate_regional(&national, &regional_pop).unwrap();
    assert_eq!(regional.height(), 3);

    let h_cereals = regional
        .clone()
        .lazy()
        .filter(
            col(country::INCOME_GROUP)
                .eq(lit("H"))
                .and(col(product::FOOD_GROUP).eq(lit("Cereals"))),
        )
        .collect()
        .unwrap();
    assert_eq!(scalar(&h_cereals, population::REGIONAL), 1000.0);
    let urban = scalar(&h_cereals, &Quantity::Pressure.urban(Band::Median));
    let cap = scalar(&h_cereals, &Quantity::Pressure.urban_cap(Band::Median));
    assert!((cap - urban / 250.0).abs() < 1e-12);

    let (urban_intensity, _) = intensity_columns(Band::Median);
    let kcal_urban = scalar(&h_cereals, &Quantity::Energy.urban(Band::Median));
    assert!((scalar(&h_cereals, &urban_intensity) - urban / kcal_urban).abs() < 1e-18);

    let l_cereals = regional
        .clone()
        .lazy()
        .filter(col(country::INCOME_GROUP).eq(lit("L")))
        .collect()
        .unwrap();
    assert!(scalar(&l_cereals, &Quantity::Pressure.urban(Band::Median)).is_nan());
}

#[test]
fn destination_without_population_is_fatal() {
    let total = df!(
        population::CODE_FAO => ["1"],
        population::YEAR => [2000i64],
        population::POPULATION_THOUSANDS => [1.0]
    )
    .unwrap();
    let share = df!(
        population::CODE_FAO => ["1", "2"],
        population::YEAR => [2000i64, 2000],
        population::URBAN_SHARE_PERCENT => [25.0, 100.0]
    )
    .unwrap();
    let err = food_ehanpp::population::national_population(&fixture(), &total, &share).unwrap_err();
    match err {
        PanelError::Unreconciled { stage, column, key } => {
            assert_eq!(stage, "population");
            assert_eq!(column, population::NATIONAL);
            assert!(key.contains("code_fao=2"));
        }
        other => panic!("unexpected error: {other}"),
    }
}

/// National rows for one food group, every quantity column set to `value`.
fn national_rows(rows: &[(&str, &str, i64, f64)]) -> DataFrame {
    let mut columns = vec![
        Column::new(
            transaction::DESTINATION_CODE.into(),
            rows.iter().map(|r| r.0).collect::<Vec<_>>(),
        ),
        Column::new(
            country::INCOME_GROUP.into(),
            rows.iter().map(|r| r.1).collect::<Vec<_>>(),
        ),
        Column::new(
            transaction::YEAR.into(),
            rows.iter().map(|r| r.2).collect::<Vec<_>>(),
        ),
        Column::new(
            transaction::FINAL_USE.into(),
            rows.iter().map(|_| "Food").collect::<Vec<_>>(),
        ),
        Column::new(
            product::FOOD_GROUP.into(),
            rows.iter().map(|_| "Cereals").collect::<Vec<_>>(),
        ),
    ];
    for name in quantity_columns() {
        columns.push(Column::new(
            name.as_str().into(),
            rows.iter().map(|r| r.3).collect::<Vec<_>>(),
        ));
    }
    DataFrame::new(columns).unwrap()
}

#[test]
fn regional_series_are_smoothed_separately() {
    let national = national_rows(&[
        ("1", "H", 2000, 1.0),
        ("1", "H", 2001, 2.0),
        ("1", "H", 2002, 6.0),
        ("2", "L", 2000, 4.0),
        ("3", "L", 2000, 6.0),
        ("2", "L", 2001, 8.0),
        ("3", "L", 2001, 12.0),
        ("2", "L", 2002, 24.0),
        ("3", "L", 2002, 36.0),
    ]);
    let regional_pop = df!(
        country::INCOME_GROUP => ["H", "H", "H", "L", "L", "L"],
        population::YEAR => [2000i64, 2001, 2002, 2000, 2001, 2002],
        population::REGIONAL => [10.0; 6],
        population::URBAN => [5.0; 6],
        population::RURAL => [5.0; 6]
    )
    .unwrap();

    let regional = aggregate_regional(&national, &regional_pop).unwrap();
    assert_eq!(regional.height(), 6);
    let expected = [1.5, 3.0, 4.0, 15.0, 30.0, 40.0];
    for name in [
        transaction::PRESSURE.to_string(),
        Quantity::Energy.rural(Band::Low),
    ] {
        let values = f64_values(&regional, &name);
        for (value, want) in values.iter().zip(expected) {
            assert!((value.unwrap() - want).abs() < 1e-9, "{name}: {value:?} != {want}");
        }
    }
    // dry-matter supply is summed but not smoothed
    assert_eq!(
        f64_values(&regional, energy::TONNES_DM),
        vec![Some(1.0), Some(2.0), Some(6.0), Some(10.0), Some(20.0), Some(60.0)]
    );
    let cap = f64_values(&regional, summary::PRESSURE_CAP);
    assert!((cap[1].unwrap() - 0.3).abs() < 1e-12);
}

