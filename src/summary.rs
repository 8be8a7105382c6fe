//! Headline indicators per income group and year, plus a global row, and the
//! global breakdowns by food group and by urban/rural population.

use polars::prelude::*;
use tracing::info;

use crate::allocation::{per_capita_exprs, safe_div, DAYS_PER_YEAR, GRAMS_PER_TONNE};
use crate::band::{Band, Quantity};
use crate::error::Result;
use crate::io::require_columns;
use crate::schema::{country, energy, population, product, summary, transaction};

const LIVESTOCK_URBAN: &str = "_livestock_urban";
const LIVESTOCK_RURAL: &str = "_livestock_rural";
const PLANT_URBAN: &str = "_plant_urban";
const PLANT_RURAL: &str = "_plant_rural";

/// Build the summary table from the regional aggregate (median band).
///
/// Output columns: income_group, year, pressure, pop_regional, pop_urban,
/// pop_rural, then the indicator columns of [`summary`]. Rows are sorted by
/// (income_group, year) with the `Global` rows last.
pub fn summarize(regional: &DataFrame, regional_population: &DataFrame) -> Result<DataFrame> {
    let pressure_urban = Quantity::Pressure.urban(Band::Median);
    let pressure_rural = Quantity::Pressure.rural(Band::Median);
    let kcal_urban = Quantity::Energy.urban(Band::Median);
    let kcal_rural = Quantity::Energy.rural(Band::Median);
    require_columns(
        regional,
        &[
            country::INCOME_GROUP,
            transaction::YEAR,
            product::FOOD_GROUP,
            transaction::PRESSURE,
            &pressure_urban,
            &pressure_rural,
            &kcal_urban,
            &kcal_rural,
        ],
    )?;

    let livestock = col(product::FOOD_GROUP).is_in(
        lit(Series::new("livestock".into(), &product::LIVESTOCK_GROUPS)),
        false,
    );
    let plant = livestock
        .clone()
        .not()
        .and(col(product::FOOD_GROUP).neq(lit(product::INFRA_LABEL)));
    let within = |mask: Expr, column: &str| {
        when(mask)
            .then(col(column).fill_null(lit(0.0)))
            .otherwise(lit(0.0))
            .sum()
    };

    let sums = [
        col(transaction::PRESSURE).sum(),
        col(pressure_urban.as_str()).sum(),
        col(pressure_rural.as_str()).sum(),
        col(kcal_urban.as_str()).sum(),
        col(kcal_rural.as_str()).sum(),
        within(livestock.clone(), &kcal_urban).alias(LIVESTOCK_URBAN),
        within(livestock, &kcal_rural).alias(LIVESTOCK_RURAL),
        within(plant.clone(), &kcal_urban).alias(PLANT_URBAN),
        within(plant, &kcal_rural).alias(PLANT_RURAL),
    ];
    let summed_columns = [
        transaction::PRESSURE,
        pressure_urban.as_str(),
        pressure_rural.as_str(),
        kcal_urban.as_str(),
        kcal_rural.as_str(),
        LIVESTOCK_URBAN,
        LIVESTOCK_RURAL,
        PLANT_URBAN,
        PLANT_RURAL,
        population::REGIONAL,
        population::URBAN,
        population::RURAL,
    ];

    let by_group = regional
        .clone()
        .lazy()
        .group_by([col(country::INCOME_GROUP), col(transaction::YEAR)])
        .agg(sums)
        .join(
            regional_population.clone().lazy().select([
                col(country::INCOME_GROUP),
                col(population::YEAR),
                col(population::REGIONAL),
                col(population::URBAN),
                col(population::RURAL),
            ]),
            [col(country::INCOME_GROUP), col(transaction::YEAR)],
            [col(country::INCOME_GROUP), col(population::YEAR)],
            JoinArgs::new(JoinType::Left),
        )
        .sort(
            [country::INCOME_GROUP, transaction::YEAR],
            SortMultipleOptions::default(),
        )
        .collect()?;

    let global = by_group
        .clone()
        .lazy()
        .group_by([col(transaction::YEAR)])
        .agg(summed_columns.map(|c| col(c).sum()))
        .select(
            std::iter::once(lit(summary::GLOBAL).alias(country::INCOME_GROUP))
                .chain(std::iter::once(col(transaction::YEAR)))
                .chain(summed_columns.map(col))
                .collect::<Vec<_>>(),
        )
        .sort([transaction::YEAR], SortMultipleOptions::default());

    let mut columns: Vec<Expr> = vec![col(country::INCOME_GROUP), col(transaction::YEAR)];
    columns.extend(summed_columns.map(col));
    let stacked = concat(
        [by_group.lazy().select(columns.clone()), global.select(columns)],
        UnionArgs::default(),
    )?;

    let per_day = |quantity: &str, pop: &str| {
        safe_div(col(quantity), col(pop)) / lit(DAYS_PER_YEAR)
    };
    let df = stacked
        .select([
            col(country::INCOME_GROUP),
            col(transaction::YEAR),
            col(transaction::PRESSURE),
            col(population::REGIONAL),
            col(population::URBAN),
            col(population::RURAL),
            safe_div(col(transaction::PRESSURE), col(population::REGIONAL))
                .alias(summary::PRESSURE_CAP),
            safe_div(col(pressure_urban.as_str()), col(population::URBAN))
                .alias(summary::PRESSURE_URBAN_CAP),
            safe_div(col(pressure_rural.as_str()), col(population::RURAL))
                .alias(summary::PRESSURE_RURAL_CAP),
            (safe_div(col(pressure_urban.as_str()), col(kcal_urban.as_str())) * lit(GRAMS_PER_TONNE))
                .alias(summary::INTENSITY_URBAN_G_PER_KCAL),
            (safe_div(col(pressure_rural.as_str()), col(kcal_rural.as_str())) * lit(GRAMS_PER_TONNE))
                .alias(summary::INTENSITY_RURAL_G_PER_KCAL),
            per_day(LIVESTOCK_URBAN, population::URBAN).alias(summary::LIVESTOCK_URBAN_KCAL_CAP_DAY),
            per_day(LIVESTOCK_RURAL, population::RURAL).alias(summary::LIVESTOCK_RURAL_KCAL_CAP_DAY),
            per_day(PLANT_URBAN, population::URBAN).alias(summary::PLANT_URBAN_KCAL_CAP_DAY),
            per_day(PLANT_RURAL, population::RURAL).alias(summary::PLANT_RURAL_KCAL_CAP_DAY),
        ])
        .collect()?;
    info!(rows = df.height(), "summary");
    Ok(df)
}

/// Global totals per (year, food group). The livestock groups are merged into
/// one, infrastructure is reported as built-up land, and an `overall` row
/// closes every year.
///
/// Output columns: year, food_group, kcal, pressure, intensity_g_per_kcal.
pub fn food_group_summary(regional: &DataFrame) -> Result<DataFrame> {
    require_columns(
        regional,
        &[
            transaction::YEAR,
            product::FOOD_GROUP,
            energy::KCAL,
            transaction::PRESSURE,
        ],
    )?;
    let livestock = col(product::FOOD_GROUP).is_in(
        lit(Series::new("livestock".into(), &product::LIVESTOCK_GROUPS)),
        false,
    );
    let label = when(livestock)
        .then(lit(summary::LIVESTOCK_PRODUCTS))
        .when(col(product::FOOD_GROUP).eq(lit(product::INFRA_LABEL)))
        .then(lit(summary::BUILT_UP_LAND))
        .otherwise(col(product::FOOD_GROUP))
        .alias(product::FOOD_GROUP);
    let sums = || {
        [
            col(energy::KCAL).fill_null(lit(0.0)).sum(),
            col(transaction::PRESSURE).fill_null(lit(0.0)).sum(),
        ]
    };
    let columns = || {
        [
            col(transaction::YEAR),
            col(product::FOOD_GROUP),
            col(energy::KCAL),
            col(transaction::PRESSURE),
        ]
    };

    let by_group = regional
        .clone()
        .lazy()
        .with_column(label)
        .group_by([col(transaction::YEAR), col(product::FOOD_GROUP)])
        .agg(sums())
        .sort(
            [transaction::YEAR, product::FOOD_GROUP],
            SortMultipleOptions::default(),
        )
        .select(columns());
    let overall = regional
        .clone()
        .lazy()
        .group_by([col(transaction::YEAR)])
        .agg(sums())
        .with_column(lit(summary::OVERALL).alias(product::FOOD_GROUP))
        .select(columns());

    let df = concat([by_group, overall], UnionArgs::default())?
        .sort(
            [transaction::YEAR],
            SortMultipleOptions::default().with_maintain_order(true),
        )
        .with_column(
            (safe_div(col(transaction::PRESSURE), col(energy::KCAL)) * lit(GRAMS_PER_TONNE))
                .alias(summary::INTENSITY_G_PER_KCAL),
        )
        .collect()?;
    info!(rows = df.height(), "food group summary");
    Ok(df)
}

/// Global urban and rural pressure per year for every band, with per-capita
/// values against the summed regional populations. The high and low bands
/// give the boundaries around the median split.
///
/// Output columns: year, pop_urban, pop_rural, pop_global, pressure, the
/// urban/rural pressure and per-capita pressure of each band, pressure_cap.
pub fn urban_rural_summary(regional: &DataFrame, regional_population: &DataFrame) -> Result<DataFrame> {
    let band_columns: Vec<String> = Band::ALL
        .into_iter()
        .flat_map(|band| [Quantity::Pressure.urban(band), Quantity::Pressure.rural(band)])
        .collect();
    let mut required = vec![transaction::YEAR, transaction::PRESSURE];
    required.extend(band_columns.iter().map(String::as_str));
    require_columns(regional, &required)?;
    require_columns(
        regional_population,
        &[population::YEAR, population::REGIONAL, population::URBAN, population::RURAL],
    )?;

    let mut sums = vec![col(transaction::PRESSURE).sum()];
    sums.extend(band_columns.iter().map(|c| col(c.as_str()).sum()));

    let populations = regional_population
        .clone()
        .lazy()
        .group_by([col(population::YEAR)])
        .agg([
            col(population::URBAN).sum(),
            col(population::RURAL).sum(),
            col(population::REGIONAL).sum().alias(summary::POP_GLOBAL),
        ]);

    let mut ratios = vec![safe_div(
        col(Quantity::Pressure.urban(Band::Median)) + col(Quantity::Pressure.rural(Band::Median)),
        col(summary::POP_GLOBAL),
    )
    .alias(summary::PRESSURE_CAP)];
    for band in Band::ALL {
        ratios.extend(per_capita_exprs(
            Quantity::Pressure,
            band,
            population::URBAN,
            population::RURAL,
        ));
    }

    let df = regional
        .clone()
        .lazy()
        .group_by([col(transaction::YEAR)])
        .agg(sums)
        .join(
            populations,
            [col(transaction::YEAR)],
            [col(population::YEAR)],
            JoinArgs::new(JoinType::Left),
        )
        .with_columns(ratios)
        .sort([transaction::YEAR], SortMultipleOptions::default())
        .collect()?;
    info!(rows = df.height(), "urban/rural summary");
    Ok(df)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn global_row_sums_groups_before_dividing() {
        let regional = df!(
            country::INCOME_GROUP => ["H", "H", "L"],
            transaction::YEAR => [2000i64, 2000, 2000],
            product::FOOD_GROUP => ["Ruminant meat", "Cereals", "Cereals"],
            transaction::PRESSURE => [4.0, 2.0, 6.0],
            "pressure_urban_median" => [3.0, 1.0, 2.0],
            "pressure_rural_median" => [1.0, 1.0, 4.0],
            "kcal_urban_median" => [365.0, 730.0, 365.0],
            "kcal_rural_median" => [0.0, 365.0, 730.0]
        )
        .unwrap();
        let population = df!(
            country::INCOME_GROUP => ["H", "L"],
            population::YEAR => [2000i64, 2000],
            population::REGIONAL => [3.0, 3.0],
            population::URBAN => [1.0, 1.0],
            population::RURAL => [2.0, 2.0]
        )
        .unwrap();
        let out = summarize(&regional, &population).unwrap();
        assert_eq!(out.height(), 3);

        let groups: Vec<_> = out
            .column(country::INCOME_GROUP)
            .unwrap()
            .str()
            .unwrap()
            .into_iter()
            .flatten()
            .map(str::to_string)
            .collect();
        assert_eq!(groups, vec!["H", "L", summary::GLOBAL]);

        let cap = out.column(summary::PRESSURE_CAP).unwrap().f64().unwrap();
        assert_eq!(cap.get(0), Some(2.0));
        assert_eq!(cap.get(2), Some(2.0));

        let livestock = out
            .column(summary::LIVESTOCK_URBAN_KCAL_CAP_DAY)
            .unwrap()
            .f64()
            .unwrap();
        let plant = out
            .column(summary::PLANT_URBAN_KCAL_CAP_DAY)
            .unwrap()
            .f64()
            .unwrap();
        assert_eq!(livestock.get(0), Some(1.0));
        assert_eq!(plant.get(0), Some(2.0));
        assert_eq!(livestock.get(2), Some(0.5));
        assert_eq!(plant.get(2), Some(1.5));
    }

    fn group_rows(df: &DataFrame) -> Vec<(String, f64, f64)> {
        let groups = df.column(product::FOOD_GROUP).unwrap().str().unwrap();
        let kcal = df.column(energy::KCAL).unwrap().f64().unwrap();
        let pressure = df.column(transaction::PRESSURE).unwrap().f64().unwrap();
        (0..df.height())
            .map(|i| {
                (
                    groups.get(i).unwrap().to_string(),
                    kcal.get(i).unwrap(),
                    pressure.get(i).unwrap(),
                )
            })
            .collect()
    }

    #[test]
    fn food_groups_merge_livestock_and_rename_infrastructure() {
        let regional = df!(
            country::INCOME_GROUP => ["H", "L", "L", "H", "L"],
            transaction::YEAR => [2000i64, 2000, 2000, 2000, 2000],
            product::FOOD_GROUP => ["Ruminant meat", "Milk and milk products", "Cereals", "Infra", "Infra"],
            energy::KCAL => [1e6, 3e6, 4e6, 0.0, 0.0],
            transaction::PRESSURE => [2.0, 1.0, 2.0, 0.5, 0.5]
        )
        .unwrap();
        let out = food_group_summary(&regional).unwrap();
        assert_eq!(
            group_rows(&out),
            vec![
                ("Cereals".to_string(), 4e6, 2.0),
                (summary::BUILT_UP_LAND.to_string(), 0.0, 1.0),
                (summary::LIVESTOCK_PRODUCTS.to_string(), 4e6, 3.0),
                (summary::OVERALL.to_string(), 8e6, 6.0),
            ]
        );
        let intensity = out
            .column(summary::INTENSITY_G_PER_KCAL)
            .unwrap()
            .f64()
            .unwrap();
        // t/kcal to g/kcal
        assert!((intensity.get(0).unwrap() - 0.5).abs() < 1e-12);
        assert!(intensity.get(1).unwrap().is_nan());
        assert!((intensity.get(3).unwrap() - 0.75).abs() < 1e-12);
    }

    #[test]
    fn urban_rural_bands_bracket_the_median() {
        let regional = df!(
            country::INCOME_GROUP => ["H", "L"],
            transaction::YEAR => [2000i64, 2000],
            transaction::PRESSURE => [4.0, 6.0],
            "pressure_urban_median" => [3.0, 2.0],
            "pressure_rural_median" => [1.0, 4.0],
            "pressure_urban_high" => [2.0, 1.0],
            "pressure_rural_high" => [2.0, 5.0],
            "pressure_urban_low" => [3.5, 3.0],
            "pressure_rural_low" => [0.5, 3.0]
        )
        .unwrap();
        let population = df!(
            country::INCOME_GROUP => ["H", "L"],
            population::YEAR => [2000i64, 2000],
            population::REGIONAL => [2.0, 3.0],
            population::URBAN => [1.0, 1.0],
            population::RURAL => [1.0, 2.0]
        )
        .unwrap();
        let out = urban_rural_summary(&regional, &population).unwrap();
        assert_eq!(out.height(), 1);

        let value = |name: &str| out.column(name).unwrap().f64().unwrap().get(0).unwrap();
        assert_eq!(value(summary::POP_GLOBAL), 5.0);
        assert_eq!(value(summary::PRESSURE_CAP), 2.0);
        assert_eq!(value(&Quantity::Pressure.urban_cap(Band::Median)), 2.5);
        assert_eq!(value(&Quantity::Pressure.rural_cap(Band::Median)), 5.0 / 3.0);
        assert_eq!(value(&Quantity::Pressure.urban_cap(Band::High)), 1.5);
        assert_eq!(value(&Quantity::Pressure.urban_cap(Band::Low)), 3.25);
        assert_eq!(value(&Quantity::Pressure.rural_cap(Band::High)), 7.0 / 3.0);
    }
}
