//! Item normalization: one raw survey extract per source, reshaped into one
//! row per (country, year) with an urban and a rural value.

use polars::prelude::*;
use tracing::debug;

use crate::error::{PanelError, Result};
use crate::io::require_columns;
use crate::items::{ItemDefinition, RawSource};
use crate::schema::{panel, survey};

const STAGE: &str = "normalize";
const VALUE: &str = "_value";

/// Filter a raw extract to the total-population slice and pivot the
/// urbanicity strata into `urban_value` / `rural_value`.
///
/// Output columns: country, year, urban_value, rural_value.
pub fn normalize_source(raw: DataFrame, statistic: &str, source: &RawSource) -> Result<DataFrame> {
    require_columns(
        &raw,
        &[
            survey::ISO3,
            survey::AGE,
            survey::FEMALE,
            survey::URBAN,
            survey::EDU,
            survey::YEAR,
            statistic,
        ],
    )?;

    let mut lazy = raw.lazy().filter(
        col(survey::AGE)
            .eq(lit(survey::ALL))
            .and(col(survey::FEMALE).eq(lit(survey::ALL)))
            .and(col(survey::EDU).eq(lit(survey::ALL)))
            .and(col(survey::URBAN).neq(lit(survey::ALL))),
    );

    if !source.excluded_years.is_empty() {
        let excluded = Series::new("excluded_years".into(), source.excluded_years);
        lazy = lazy.filter(col(survey::YEAR).is_in(lit(excluded), false).not());
    }

    let filtered = lazy
        .select([
            col(survey::ISO3).alias(panel::COUNTRY),
            col(survey::YEAR).alias(panel::YEAR),
            col(survey::URBAN),
            col(statistic).cast(DataType::Float64).alias(VALUE),
        ])
        .collect()?;

    check_strata(&filtered, source)?;
    check_unique_strata(&filtered, source)?;

    let stratum = |code: i64, alias: &str| {
        filtered
            .clone()
            .lazy()
            .filter(col(survey::URBAN).eq(lit(code)))
            .select([col(panel::COUNTRY), col(panel::YEAR), col(VALUE).alias(alias)])
    };

    let wide = stratum(survey::URBAN_STRATUM, panel::URBAN_VALUE)
        .join(
            stratum(survey::RURAL_STRATUM, panel::RURAL_VALUE),
            [col(panel::COUNTRY), col(panel::YEAR)],
            [col(panel::COUNTRY), col(panel::YEAR)],
            JoinArgs::new(JoinType::Full).with_coalesce(JoinCoalesce::CoalesceColumns),
        )
        .select([
            col(panel::COUNTRY),
            col(panel::YEAR),
            col(panel::URBAN_VALUE),
            col(panel::RURAL_VALUE),
        ])
        .sort([panel::COUNTRY, panel::YEAR], SortMultipleOptions::default())
        .collect()?;

    debug!(
        source = source.code,
        raw_rows = filtered.height(),
        rows = wide.height(),
        "normalized survey extract"
    );
    Ok(wide)
}

/// Merge the normalized sources of one item and label them with the item
/// code. Composite items are the per-column sum of their sources, where a
/// source without a row for a (country, year) contributes nothing.
///
/// Output columns: country, year, item_code, urban_value, rural_value.
pub fn combine_sources(item_code: &str, sources: Vec<(&str, DataFrame)>) -> Result<DataFrame> {
    let mut iter = sources.into_iter();
    let Some((first_code, first)) = iter.next() else {
        return Err(PanelError::InvalidData(format!(
            "item {item_code} has no sources"
        )));
    };

    let suffixed = |code: &str, df: DataFrame| -> LazyFrame {
        df.lazy().select([
            col(panel::COUNTRY),
            col(panel::YEAR),
            col(panel::URBAN_VALUE).alias(format!("{}_{code}", panel::URBAN_VALUE)),
            col(panel::RURAL_VALUE).alias(format!("{}_{code}", panel::RURAL_VALUE)),
        ])
    };

    let mut urban_cols = vec![format!("{}_{first_code}", panel::URBAN_VALUE)];
    let mut rural_cols = vec![format!("{}_{first_code}", panel::RURAL_VALUE)];
    let mut merged = suffixed(first_code, first);

    for (code, df) in iter {
        urban_cols.push(format!("{}_{code}", panel::URBAN_VALUE));
        rural_cols.push(format!("{}_{code}", panel::RURAL_VALUE));
        merged = merged.join(
            suffixed(code, df),
            [col(panel::COUNTRY), col(panel::YEAR)],
            [col(panel::COUNTRY), col(panel::YEAR)],
            JoinArgs::new(JoinType::Full).with_coalesce(JoinCoalesce::CoalesceColumns),
        );
    }

    let df = merged
        .select([
            col(panel::COUNTRY),
            col(panel::YEAR),
            lit(item_code).alias(panel::ITEM_CODE),
            additive(&urban_cols).alias(panel::URBAN_VALUE),
            additive(&rural_cols).alias(panel::RURAL_VALUE),
        ])
        .sort([panel::COUNTRY, panel::YEAR], SortMultipleOptions::default())
        .collect()?;
    Ok(df)
}

/// Normalize every raw extract of an item and merge them.
///
/// `raw` holds one extract per entry of `item.sources`, in the same order.
pub fn normalize_item(
    item: &ItemDefinition,
    raw: Vec<DataFrame>,
    statistic: &str,
) -> Result<DataFrame> {
    if raw.len() != item.sources.len() {
        return Err(PanelError::InvalidData(format!(
            "item {} expects {} extracts, got {}",
            item.code,
            item.sources.len(),
            raw.len()
        )));
    }

    let sources = item
        .sources
        .iter()
        .zip(raw)
        .map(|(source, df)| Ok((source.code, normalize_source(df, statistic, source)?)))
        .collect::<Result<Vec<_>>>()?;

    let df = combine_sources(item.code, sources)?;
    debug!(item = item.code, rows = df.height(), "normalized item");
    Ok(df)
}

/// Sum of `cols`, a missing entry counting as 0. Null only if every entry is.
fn additive(cols: &[String]) -> Expr {
    let all_missing = cols
        .iter()
        .fold(lit(true), |acc, c| acc.and(col(c.as_str()).is_null()));
    let total = cols
        .iter()
        .fold(lit(0.0), |acc, c| acc + col(c.as_str()).fill_null(lit(0.0)));
    when(all_missing)
        .then(lit(NULL).cast(DataType::Float64))
        .otherwise(total)
}

fn check_strata(filtered: &DataFrame, source: &RawSource) -> Result<()> {
    let urban = filtered.column(survey::URBAN)?.i64()?;
    for value in urban.into_iter() {
        match value {
            Some(survey::URBAN_STRATUM) | Some(survey::RURAL_STRATUM) => {}
            other => {
                return Err(PanelError::InvalidData(format!(
                    "{}: unexpected urbanicity stratum {:?}",
                    source.code, other
                )))
            }
        }
    }
    Ok(())
}

fn check_unique_strata(filtered: &DataFrame, source: &RawSource) -> Result<()> {
    let dups = filtered
        .clone()
        .lazy()
        .group_by([col(panel::COUNTRY), col(panel::YEAR), col(survey::URBAN)])
        .agg([len().alias("_rows")])
        .filter(col("_rows").gt(lit(1)))
        .sort(
            [panel::COUNTRY, panel::YEAR, survey::URBAN],
            SortMultipleOptions::default(),
        )
        .collect()?;

    if dups.height() == 0 {
        return Ok(());
    }

    let country = dups.column(panel::COUNTRY)?.str()?.get(0).unwrap_or("null");
    let year = dups.column(panel::YEAR)?.i64()?.get(0).unwrap_or_default();
    let stratum = dups.column(survey::URBAN)?.i64()?.get(0).unwrap_or_default();
    Err(PanelError::DuplicateKey {
        stage: STAGE,
        key: format!(
            "source={}, country={country}, year={year}, urban={stratum} ({} strata affected)",
            source.code,
            dups.height()
        ),
    })
}
