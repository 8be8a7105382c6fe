//! National and regional population tables.

use polars::prelude::*;
use tracing::info;

use crate::error::{PanelError, Result};
use crate::io::require_columns;
use crate::schema::{country, population, transaction};

const STAGE: &str = "population";

/// National population per (country, year) present in `reconciled`.
///
/// Output columns: code_fao, income_group, year, pop_national,
/// pop_urban_share, pop_urban, pop_rural. Every country-year of `reconciled`
/// must have a total population and an urban share.
pub fn national_population(
    reconciled: &DataFrame,
    total: &DataFrame,
    urban_share: &DataFrame,
) -> Result<DataFrame> {
    require_columns(
        reconciled,
        &[transaction::DESTINATION_CODE, country::INCOME_GROUP, transaction::YEAR],
    )?;
    require_columns(
        total,
        &[population::CODE_FAO, population::YEAR, population::POPULATION_THOUSANDS],
    )?;
    require_columns(
        urban_share,
        &[population::CODE_FAO, population::YEAR, population::URBAN_SHARE_PERCENT],
    )?;

    let considered = reconciled
        .clone()
        .lazy()
        .group_by([
            col(transaction::DESTINATION_CODE).alias(population::CODE_FAO),
            col(country::INCOME_GROUP),
            col(transaction::YEAR).alias(population::YEAR),
        ])
        .agg([len().alias("_rows")])
        .select([
            col(population::CODE_FAO),
            col(country::INCOME_GROUP),
            col(population::YEAR),
        ]);

    let keys = || [col(population::CODE_FAO), col(population::YEAR)];
    let df = considered
        .join(
            total.clone().lazy().select([
                col(population::CODE_FAO),
                col(population::YEAR),
                (col(population::POPULATION_THOUSANDS) * lit(1000.0)).alias(population::NATIONAL),
            ]),
            keys(),
            keys(),
            JoinArgs::new(JoinType::Left),
        )
        .join(
            urban_share.clone().lazy().select([
                col(population::CODE_FAO),
                col(population::YEAR),
                (col(population::URBAN_SHARE_PERCENT) / lit(100.0)).alias(population::URBAN_SHARE),
            ]),
            keys(),
            keys(),
            JoinArgs::new(JoinType::Left),
        )
        .with_column(
            (col(population::NATIONAL) * col(population::URBAN_SHARE)).alias(population::URBAN),
        )
        .with_column((col(population::NATIONAL) - col(population::URBAN)).alias(population::RURAL))
        .sort(
            [population::CODE_FAO, population::YEAR],
            SortMultipleOptions::default(),
        )
        .collect()?;

    check_complete(&df)?;
    info!(rows = df.height(), "national population");
    Ok(df)
}

fn check_complete(df: &DataFrame) -> Result<()> {
    for name in [population::NATIONAL, population::URBAN_SHARE] {
        let offenders = df
            .clone()
            .lazy()
            .filter(col(name).is_null())
            .select([col(population::CODE_FAO), col(population::YEAR)])
            .collect()?;
        if offenders.height() == 0 {
            continue;
        }
        let code = offenders.column(population::CODE_FAO)?.str()?.get(0).unwrap_or("null");
        let year = offenders
            .column(population::YEAR)?
            .i64()?
            .get(0)
            .map_or_else(|| "null".to_string(), |y| y.to_string());
        return Err(PanelError::Unreconciled {
            stage: STAGE,
            column: name.to_string(),
            key: format!("code_fao={code}, year={year} ({} rows)", offenders.height()),
        });
    }
    Ok(())
}

/// Population summed per (income_group, year).
///
/// Output columns: income_group, year, pop_regional, pop_urban, pop_rural,
/// pop_urban_share.
pub fn regional_population(national: &DataFrame) -> Result<DataFrame> {
    require_columns(
        national,
        &[
            country::INCOME_GROUP,
            population::YEAR,
            population::NATIONAL,
            population::URBAN,
            population::RURAL,
        ],
    )?;
    let df = national
        .clone()
        .lazy()
        .group_by([col(country::INCOME_GROUP), col(population::YEAR)])
        .agg([
            col(population::NATIONAL).sum().alias(population::REGIONAL),
            col(population::URBAN).sum(),
            col(population::RURAL).sum(),
        ])
        .with_column(
            (col(population::URBAN) / col(population::REGIONAL)).alias(population::URBAN_SHARE),
        )
        .sort(
            [country::INCOME_GROUP, population::YEAR],
            SortMultipleOptions::default(),
        )
        .collect()?;
    info!(rows = df.height(), "regional population");
    Ok(df)
}
