//! Panel completion: the full (year x country x item) cube built from the
//! normalized items, with interior gaps interpolated and the last surveyed
//! year carried forward.

use std::collections::BTreeSet;

use polars::prelude::*;
use tracing::{debug, info};

use crate::error::{PanelError, Result};
use crate::io::require_columns;
use crate::schema::panel;

const STAGE: &str = "panel";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PanelOptions {
    /// Number of years after the last surveyed year that receive a copy of it.
    pub trailing_years: u32,
}

impl Default for PanelOptions {
    fn default() -> Self {
        Self { trailing_years: 2 }
    }
}

/// Build the completed panel from the normalized per-item tables.
///
/// Output columns: country, year, item_code, urban_value, rural_value,
/// sorted by (country, item_code, year).
pub fn complete_panel(items: &[DataFrame], options: &PanelOptions) -> Result<DataFrame> {
    if items.is_empty() {
        return Err(PanelError::InvalidData("no item tables to complete".into()));
    }
    for df in items {
        require_columns(df, &panel::ALL)?;
    }

    let frames: Vec<LazyFrame> = items
        .iter()
        .map(|df| df.clone().lazy().select(panel::ALL.map(col)))
        .collect();
    let observed = concat(frames, UnionArgs::default())?.collect()?;
    check_unique_keys(&observed)?;

    let years = observed.column(panel::YEAR)?.i64()?;
    let (Some(year_min), Some(year_max)) = (years.min(), years.max()) else {
        return Err(PanelError::InvalidData("item tables contain no years".into()));
    };
    let countries = distinct_strings(&observed, panel::COUNTRY)?;
    let item_codes = distinct_strings(&observed, panel::ITEM_CODE)?;

    let grid = combination_grid(year_min, year_max, &countries, &item_codes)?;
    let joined = grid
        .lazy()
        .join(
            observed.lazy(),
            [col(panel::COUNTRY), col(panel::ITEM_CODE), col(panel::YEAR)],
            [col(panel::COUNTRY), col(panel::ITEM_CODE), col(panel::YEAR)],
            JoinArgs::new(JoinType::Left),
        )
        .select(panel::ALL.map(col))
        .sort(
            [panel::COUNTRY, panel::ITEM_CODE, panel::YEAR],
            SortMultipleOptions::default(),
        )
        .collect()?;

    let interpolated = interpolate_gaps(joined)?;
    let completed = carry_forward(interpolated, year_max, options.trailing_years)?;

    info!(
        year_min,
        year_max,
        countries = countries.len(),
        items = item_codes.len(),
        rows = completed.height(),
        "panel completed"
    );
    Ok(completed)
}

/// Append a copy of every `year_max` row for each of the trailing years.
pub fn carry_forward(df: DataFrame, year_max: i64, trailing_years: u32) -> Result<DataFrame> {
    let mut frames = vec![df.clone().lazy()];
    for offset in 1..=i64::from(trailing_years) {
        frames.push(
            df.clone()
                .lazy()
                .filter(col(panel::YEAR).eq(lit(year_max)))
                .with_column(
                    lit(year_max + offset)
                        .cast(DataType::Int64)
                        .alias(panel::YEAR),
                ),
        );
    }
    let out = concat(frames, UnionArgs::default())?
        .sort(
            [panel::COUNTRY, panel::ITEM_CODE, panel::YEAR],
            SortMultipleOptions::default(),
        )
        .collect()?;
    debug!(year_max, trailing_years, rows = out.height(), "carried last year forward");
    Ok(out)
}

/// Linear interpolation of interior gaps within each (country, item) series.
/// Rows must be sorted by year within a series; leading and trailing gaps
/// stay null.
pub fn interpolate_gaps(df: DataFrame) -> Result<DataFrame> {
    let missing = |df: &DataFrame| -> Result<usize> {
        Ok(df.column(panel::URBAN_VALUE)?.null_count() + df.column(panel::RURAL_VALUE)?.null_count())
    };
    let before = missing(&df)?;
    let series = [col(panel::COUNTRY), col(panel::ITEM_CODE)];
    let out = df
        .lazy()
        .with_columns([
            col(panel::URBAN_VALUE)
                .interpolate(InterpolationMethod::Linear)
                .over(series.clone()),
            col(panel::RURAL_VALUE)
                .interpolate(InterpolationMethod::Linear)
                .over(series),
        ])
        .collect()?;
    let after = missing(&out)?;
    debug!(filled = before - after, remaining = after, "interpolated");
    Ok(out)
}

fn combination_grid(
    year_min: i64,
    year_max: i64,
    countries: &BTreeSet<String>,
    item_codes: &BTreeSet<String>,
) -> Result<DataFrame> {
    let n_years = (year_max - year_min + 1) as usize;
    let capacity = n_years * countries.len() * item_codes.len();
    let mut country_col = Vec::with_capacity(capacity);
    let mut item_col = Vec::with_capacity(capacity);
    let mut year_col = Vec::with_capacity(capacity);

    for country in countries {
        for item in item_codes {
            for year in year_min..=year_max {
                country_col.push(country.as_str());
                item_col.push(item.as_str());
                year_col.push(year);
            }
        }
    }

    Ok(DataFrame::new(vec![
        Column::new(panel::COUNTRY.into(), country_col),
        Column::new(panel::ITEM_CODE.into(), item_col),
        Column::new(panel::YEAR.into(), year_col),
    ])?)
}

fn distinct_strings(df: &DataFrame, column: &str) -> Result<BTreeSet<String>> {
    let values = df.column(column)?.str()?;
    if values.null_count() > 0 {
        return Err(PanelError::InvalidData(format!(
            "{STAGE}: null {column} in item tables"
        )));
    }
    Ok(values.into_iter().flatten().map(str::to_string).collect())
}

fn check_unique_keys(df: &DataFrame) -> Result<()> {
    let dups = df
        .clone()
        .lazy()
        .group_by([col(panel::COUNTRY), col(panel::YEAR), col(panel::ITEM_CODE)])
        .agg([len().alias("_rows")])
        .filter(col("_rows").gt(lit(1)))
        .sort(
            [panel::COUNTRY, panel::ITEM_CODE, panel::YEAR],
            SortMultipleOptions::default(),
        )
        .collect()?;

    if dups.height() == 0 {
        return Ok(());
    }
    let country = dups.column(panel::COUNTRY)?.str()?.get(0).unwrap_or("null");
    let item = dups.column(panel::ITEM_CODE)?.str()?.get(0).unwrap_or("null");
    let year = dups.column(panel::YEAR)?.i64()?.get(0).unwrap_or_default();
    Err(PanelError::DuplicateKey {
        stage: STAGE,
        key: format!("country={country}, year={year}, item={item}"),
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn values(df: &DataFrame, column: &str) -> Vec<Option<f64>> {
        df.column(column).unwrap().f64().unwrap().into_iter().collect()
    }

    #[test]
    fn interpolation_stays_within_a_series() {
        let df = df!(
            panel::COUNTRY => ["AUT", "AUT", "AUT", "AUT", "ETH", "ETH", "ETH", "ETH"],
            panel::YEAR => [2000i64, 2001, 2002, 2003, 2000, 2001, 2002, 2003],
            panel::ITEM_CODE => ["v02"; 8],
            panel::URBAN_VALUE => [Some(1.0), None, Some(4.0), None, None, None, Some(8.0), None],
            panel::RURAL_VALUE => [None, Some(2.0), None, Some(6.0), None::<f64>, None, None, None]
        )
        .unwrap();
        let out = interpolate_gaps(df).unwrap();
        assert_eq!(
            values(&out, panel::URBAN_VALUE),
            vec![Some(1.0), Some(2.5), Some(4.0), None, None, None, Some(8.0), None]
        );
        assert_eq!(
            values(&out, panel::RURAL_VALUE),
            vec![None, Some(2.0), Some(4.0), Some(6.0), None, None, None, None]
        );
    }

    #[test]
    fn carry_forward_copies_last_year() {
        let df = df!(
            panel::COUNTRY => ["AUT", "AUT"],
            panel::YEAR => [2017i64, 2018],
            panel::ITEM_CODE => ["v02", "v02"],
            panel::URBAN_VALUE => [Some(5.0), Some(7.0)],
            panel::RURAL_VALUE => [Some(5.0), None]
        )
        .unwrap();
        let out = carry_forward(df, 2018, 2).unwrap();
        assert_eq!(out.height(), 4);
        assert_eq!(
            values(&out, panel::URBAN_VALUE),
            vec![Some(5.0), Some(7.0), Some(7.0), Some(7.0)]
        );
        assert_eq!(out.column(panel::RURAL_VALUE).unwrap().null_count(), 3);
    }
}
