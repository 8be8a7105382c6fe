//! Urban/rural allocation of pressure and food energy.
//!
//! For a band with urban factor `fu`, rural factor `fr` and populations
//! `pu`, `pr`:
//!
//! ```text
//! share = fu*pu / (fu*pu + fr*pr)
//! urban = share * total
//! rural = total - urban
//! ```
//!
//! Per-capita values divide by the matching population and are NaN where
//! that population is 0. Energy per capita is expressed per day.

use polars::prelude::*;
use tracing::{debug, info};

use crate::band::{Band, Quantity};
use crate::error::{PanelError, Result};
use crate::io::require_columns;
use crate::reconcile::RECONCILED_COLUMNS;
use crate::schema::{energy, population, transaction};

const STAGE: &str = "allocation";

pub const DAYS_PER_YEAR: f64 = 365.0;
/// Grams per tonne.
pub const GRAMS_PER_TONNE: f64 = 1e6;

/// `numerator / denominator`, NaN where the denominator is 0.
pub fn safe_div(numerator: Expr, denominator: Expr) -> Expr {
    when(denominator.clone().eq(lit(0.0)))
        .then(lit(f64::NAN))
        .otherwise(numerator / denominator)
}

/// Expressions splitting `quantity` into the urban and rural parts of `band`.
pub fn split_exprs(quantity: Quantity, band: Band) -> [Expr; 2] {
    let (fu, fr) = band.factor_columns();
    let urban_weight = col(fu) * col(population::URBAN);
    let rural_weight = col(fr) * col(population::RURAL);
    let share = safe_div(urban_weight.clone(), urban_weight + rural_weight);
    let total = col(quantity.total_column());
    [
        (share * total.clone()).alias(quantity.urban(band)),
        (total - col(quantity.urban(band))).alias(quantity.rural(band)),
    ]
}

/// Per-capita expressions for the split columns of `band`, dividing by the
/// given urban and rural population columns.
pub fn per_capita_exprs(quantity: Quantity, band: Band, urban_pop: &str, rural_pop: &str) -> [Expr; 2] {
    let per_day = |e: Expr| match quantity {
        Quantity::Pressure => e,
        Quantity::Energy => e / lit(DAYS_PER_YEAR),
    };
    [
        per_day(safe_div(col(quantity.urban(band)), col(urban_pop))).alias(quantity.urban_cap(band)),
        per_day(safe_div(col(quantity.rural(band)), col(rural_pop))).alias(quantity.rural_cap(band)),
    ]
}

/// Join population, food supply and conversion factors onto the reconciled
/// transactions and compute the energy and the three-band splits.
///
/// Rows without supply or factors get null energy (absent), which the
/// aggregation treats as 0.
pub fn allocate(
    reconciled: &DataFrame,
    national_population: &DataFrame,
    food_supply: &DataFrame,
    factors: &DataFrame,
) -> Result<DataFrame> {
    require_columns(reconciled, &RECONCILED_COLUMNS)?;
    require_columns(
        national_population,
        &[
            population::CODE_FAO,
            population::YEAR,
            population::NATIONAL,
            population::URBAN_SHARE,
            population::URBAN,
            population::RURAL,
        ],
    )?;
    require_columns(
        food_supply,
        &[energy::DESTINATION_CODE, energy::YEAR, energy::PRODUCT_CODE, energy::TONNES_DM],
    )?;
    require_columns(factors, &[energy::PRODUCT_CODE, energy::DM_CONTENT, energy::KCAL_PER_G])?;
    check_unique(
        food_supply,
        &[energy::DESTINATION_CODE, energy::YEAR, energy::PRODUCT_CODE],
    )?;
    check_unique(factors, &[energy::PRODUCT_CODE])?;

    let mut lazy = reconciled
        .clone()
        .lazy()
        .join(
            national_population.clone().lazy().select([
                col(population::CODE_FAO),
                col(population::YEAR),
                col(population::NATIONAL),
                col(population::URBAN_SHARE),
                col(population::URBAN),
                col(population::RURAL),
            ]),
            [col(transaction::DESTINATION_CODE), col(transaction::YEAR)],
            [col(population::CODE_FAO), col(population::YEAR)],
            JoinArgs::new(JoinType::Left),
        )
        .join(
            food_supply.clone().lazy().select([
                col(energy::DESTINATION_CODE),
                col(energy::YEAR),
                col(energy::PRODUCT_CODE),
                col(energy::TONNES_DM),
            ]),
            [
                col(transaction::DESTINATION_CODE),
                col(transaction::YEAR),
                col(transaction::PRODUCT_CODE),
            ],
            [
                col(energy::DESTINATION_CODE),
                col(energy::YEAR),
                col(energy::PRODUCT_CODE),
            ],
            JoinArgs::new(JoinType::Left),
        )
        .join(
            factors.clone().lazy().select([
                col(energy::PRODUCT_CODE),
                col(energy::DM_CONTENT),
                col(energy::KCAL_PER_G),
            ]),
            [col(transaction::PRODUCT_CODE)],
            [col(energy::PRODUCT_CODE)],
            JoinArgs::new(JoinType::Left),
        )
        .with_column(
            (col(energy::TONNES_DM) / col(energy::DM_CONTENT)
                * lit(GRAMS_PER_TONNE)
                * col(energy::KCAL_PER_G))
            .alias(energy::KCAL),
        )
        .with_column(
            (safe_div(col(energy::KCAL), col(population::NATIONAL)) / lit(DAYS_PER_YEAR))
                .alias(energy::KCAL_CAP_DAY),
        );

    for quantity in Quantity::ALL {
        for band in Band::ALL {
            let [urban, rural] = split_exprs(quantity, band);
            lazy = lazy
                .with_column(urban)
                .with_column(rural)
                .with_columns(per_capita_exprs(quantity, band, population::URBAN, population::RURAL));
        }
    }

    let df = lazy.collect()?;
    let without_energy = df.column(energy::KCAL)?.null_count();
    debug!(rows = without_energy, "rows without food energy");
    info!(rows = df.height(), columns = df.width(), "allocated");
    Ok(df)
}

fn check_unique(df: &DataFrame, keys: &[&str]) -> Result<()> {
    let dups = df
        .clone()
        .lazy()
        .group_by(keys.iter().map(|&k| col(k)).collect::<Vec<_>>())
        .agg([len().alias("_rows")])
        .filter(col("_rows").gt(lit(1)))
        .collect()?;
    if dups.height() == 0 {
        return Ok(());
    }
    let row = keys
        .iter()
        .map(|&k| -> Result<String> {
            let value = dups.column(k)?.get(0)?;
            Ok(format!("{k}={value}"))
        })
        .collect::<Result<Vec<_>>>()?;
    Err(PanelError::DuplicateKey {
        stage: STAGE,
        key: row.join(", "),
    })
}
