//! National and regional roll-ups of the allocated transactions.
//!
//! Only absolute quantities are summed; every ratio is re-derived from the
//! summed quantities and the matching population afterwards.

use polars::prelude::*;
use tracing::{debug, info};

use crate::allocation::{per_capita_exprs, safe_div, DAYS_PER_YEAR};
use crate::band::{intensity_columns, Band, Quantity};
use crate::error::Result;
use crate::io::require_columns;
use crate::schema::{country, energy, population, product, summary, transaction};

/// Grouping keys of the national table.
pub const NATIONAL_KEYS: [&str; 6] = [
    transaction::DESTINATION_CODE,
    transaction::DESTINATION,
    country::INCOME_GROUP,
    transaction::YEAR,
    transaction::FINAL_USE,
    product::FOOD_GROUP,
];

/// Grouping keys of the regional table.
pub const REGIONAL_KEYS: [&str; 4] = [
    country::INCOME_GROUP,
    transaction::YEAR,
    transaction::FINAL_USE,
    product::FOOD_GROUP,
];

/// Periods in the centered moving average of the regional table.
pub const SMOOTHING_WINDOW: usize = 3;

/// A regional time series: one (income group, final use, food group).
pub const REGIONAL_SERIES_KEYS: [&str; 3] = [
    country::INCOME_GROUP,
    transaction::FINAL_USE,
    product::FOOD_GROUP,
];

/// Which population columns ratios are derived against.
#[derive(Debug, Clone, Copy)]
pub struct PopulationColumns {
    pub total: &'static str,
    pub urban: &'static str,
    pub rural: &'static str,
}

impl PopulationColumns {
    pub const NATIONAL: Self = Self {
        total: population::NATIONAL,
        urban: population::URBAN,
        rural: population::RURAL,
    };
    pub const REGIONAL: Self = Self {
        total: population::REGIONAL,
        urban: population::URBAN,
        rural: population::RURAL,
    };
}

/// Every summed column: dry-matter supply plus the absolute columns of both
/// quantities.
pub fn quantity_columns() -> Vec<String> {
    let mut cols = vec![energy::TONNES_DM.to_string()];
    cols.extend(smoothed_columns());
    cols
}

/// Columns smoothed in the regional table.
pub fn smoothed_columns() -> Vec<String> {
    Quantity::ALL
        .into_iter()
        .flat_map(Quantity::absolute_columns)
        .collect()
}

/// Per-capita and per-energy ratio expressions over summed quantities.
pub fn ratio_exprs(pop: PopulationColumns) -> Vec<Expr> {
    let mut exprs = vec![
        safe_div(col(transaction::PRESSURE), col(pop.total)).alias(summary::PRESSURE_CAP),
        (safe_div(col(energy::KCAL), col(pop.total)) / lit(DAYS_PER_YEAR))
            .alias(energy::KCAL_CAP_DAY),
        safe_div(col(transaction::PRESSURE), col(energy::KCAL)).alias(energy::INTENSITY),
    ];
    for band in Band::ALL {
        for quantity in Quantity::ALL {
            exprs.extend(per_capita_exprs(quantity, band, pop.urban, pop.rural));
        }
        let (urban, rural) = intensity_columns(band);
        exprs.push(
            safe_div(
                col(Quantity::Pressure.urban(band)),
                col(Quantity::Energy.urban(band)),
            )
            .alias(urban),
        );
        exprs.push(
            safe_div(
                col(Quantity::Pressure.rural(band)),
                col(Quantity::Energy.rural(band)),
            )
            .alias(rural),
        );
    }
    exprs
}

/// Sum the allocated rows per (country, income group, year, final use, food
/// group) and re-derive the ratios against national population.
///
/// Absent quantities (null) count as 0; undefined ones (NaN) propagate.
pub fn aggregate_national(allocated: &DataFrame, national_population: &DataFrame) -> Result<DataFrame> {
    let quantities = quantity_columns();
    require_columns(allocated, &NATIONAL_KEYS)?;
    require_columns(
        allocated,
        &quantities.iter().map(String::as_str).collect::<Vec<_>>(),
    )?;

    let sums: Vec<Expr> = quantities
        .iter()
        .map(|c| col(c.as_str()).fill_null(lit(0.0)).sum())
        .collect();

    let df = allocated
        .clone()
        .lazy()
        .group_by(NATIONAL_KEYS.map(col))
        .agg(sums)
        .join(
            national_population.clone().lazy().select([
                col(population::CODE_FAO),
                col(population::YEAR),
                col(population::NATIONAL),
                col(population::URBAN),
                col(population::RURAL),
            ]),
            [col(transaction::DESTINATION_CODE), col(transaction::YEAR)],
            [col(population::CODE_FAO), col(population::YEAR)],
            JoinArgs::new(JoinType::Left),
        )
        .with_columns(ratio_exprs(PopulationColumns::NATIONAL))
        .sort(NATIONAL_KEYS, SortMultipleOptions::default())
        .collect()?;
    info!(rows = df.height(), "national aggregate");
    Ok(df)
}

/// Sum the national table per (income group, year, final use, food group),
/// smooth each series with a centered 3-period mean and re-derive the ratios
/// against regional population.
pub fn aggregate_regional(national: &DataFrame, regional_population: &DataFrame) -> Result<DataFrame> {
    let quantities = quantity_columns();
    require_columns(national, &REGIONAL_KEYS)?;

    let sums: Vec<Expr> = quantities.iter().map(|c| col(c.as_str()).sum()).collect();
    let summed = national
        .clone()
        .lazy()
        .group_by(REGIONAL_KEYS.map(col))
        .agg(sums)
        .sort(
            [
                country::INCOME_GROUP,
                transaction::FINAL_USE,
                product::FOOD_GROUP,
                transaction::YEAR,
            ],
            SortMultipleOptions::default(),
        )
        .collect()?;

    debug!(rows = summed.height(), "regional sums");

    let df = summed
        .lazy()
        .with_columns(smoothing_exprs())
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
        .with_columns(ratio_exprs(PopulationColumns::REGIONAL))
        .sort(REGIONAL_KEYS, SortMultipleOptions::default())
        .collect()?;
    info!(rows = df.height(), "regional aggregate");
    Ok(df)
}

/// Centered moving average of `expr` over `SMOOTHING_WINDOW` periods of each
/// regional series, shrinking at the series edges. Rows must be sorted by
/// year within a series.
pub fn centered_mean(expr: Expr) -> Expr {
    expr.rolling_mean(RollingOptionsFixedWindow {
        window_size: SMOOTHING_WINDOW,
        min_periods: 1,
        center: true,
        ..Default::default()
    })
    .over(REGIONAL_SERIES_KEYS.map(col))
}

fn smoothing_exprs() -> Vec<Expr> {
    smoothed_columns()
        .iter()
        .map(|c| centered_mean(col(c.as_str())))
        .collect()
}
