use std::fs::File;
use std::path::{Path, PathBuf};

use polars::prelude::*;
use tracing::{debug, info};

use crate::band::Bound;
use crate::config::OutputFormat;
use crate::error::{PanelError, Result};
use crate::items::RawSource;
use crate::schema::*;

pub const TRANSACTIONS_FILE: &str = "transactions.csv";
pub const COUNTRIES_FILE: &str = "countries.csv";
pub const PRODUCTS_FILE: &str = "products.csv";
pub const POPULATION_TOTAL_FILE: &str = "population_total.csv";
pub const POPULATION_URBAN_FILE: &str = "population_urban.csv";
pub const FACTORS_FILE: &str = "factors.csv";
pub const FOOD_SUPPLY_FILE: &str = "food_supply.csv";

const WHITESPACE: &str = " \t\r\n";

/// Reads the input tables of a run from one directory.
///
/// Every file is read with all columns as strings; numeric columns are cast
/// afterwards so that blank cells become nulls instead of parse errors.
#[derive(Debug, Clone)]
pub struct DataSource {
    base_path: PathBuf,
}

impl DataSource {
    pub fn new(base_path: impl Into<PathBuf>) -> Self {
        Self {
            base_path: base_path.into(),
        }
    }

    pub fn base_path(&self) -> &Path {
        &self.base_path
    }

    // ── Survey extracts ─────────────────────────────────────────────────────

    /// Load one raw survey extract with the demographic columns as Int64 and
    /// the statistic column as Float64.
    pub fn load_survey_extract(&self, source: &RawSource, statistic: &str) -> Result<DataFrame> {
        let raw = self.read_csv_as_strings(&source.file_name())?;
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
        let df = cast_columns(
            raw.lazy().select([
                col(survey::ISO3),
                col(survey::AGE),
                col(survey::FEMALE),
                col(survey::URBAN),
                col(survey::EDU),
                col(survey::YEAR),
                col(statistic),
            ]),
            &[
                survey::AGE,
                survey::FEMALE,
                survey::URBAN,
                survey::EDU,
                survey::YEAR,
            ],
            &[statistic],
        )?;
        Ok(df)
    }

    /// Load a persisted band panel.
    pub fn load_panel(&self, bound: Bound) -> Result<DataFrame> {
        let raw = self.read_csv_as_strings(&format!("{}.csv", bound.panel_file_stem()))?;
        require_columns(&raw, &panel::ALL)?;
        cast_columns(
            raw.lazy().select(panel::ALL.map(col)),
            &[panel::YEAR],
            &[panel::URBAN_VALUE, panel::RURAL_VALUE],
        )
    }

    // ── Transactions and lookups ────────────────────────────────────────────

    pub fn load_transactions(&self) -> Result<DataFrame> {
        let raw = self.read_csv_as_strings(TRANSACTIONS_FILE)?;
        require_columns(
            &raw,
            &[
                transaction::DESTINATION_CODE,
                transaction::DESTINATION,
                transaction::YEAR,
                transaction::FINAL_USE,
                transaction::PRODUCT_CODE,
                transaction::PRODUCT,
                transaction::PRESSURE,
            ],
        )?;
        cast_columns(
            raw.lazy(),
            &[transaction::YEAR],
            &[transaction::PRESSURE],
        )
    }

    pub fn load_countries(&self) -> Result<DataFrame> {
        let raw = self.read_csv_as_strings(COUNTRIES_FILE)?;
        require_columns(
            &raw,
            &[country::CODE_FAO, country::INCOME_GROUP, country::GDD_CODE],
        )?;
        Ok(raw)
    }

    pub fn load_products(&self) -> Result<DataFrame> {
        let raw = self.read_csv_as_strings(PRODUCTS_FILE)?;
        require_columns(
            &raw,
            &[
                product::PRODUCT_CODE,
                product::FOOD_GROUP,
                product::GDD_ITEM_CODE,
                product::GDD_ITEM,
            ],
        )?;
        Ok(raw)
    }

    pub fn load_population_total(&self) -> Result<DataFrame> {
        let raw = self.read_csv_as_strings(POPULATION_TOTAL_FILE)?;
        require_columns(
            &raw,
            &[
                population::CODE_FAO,
                population::YEAR,
                population::POPULATION_THOUSANDS,
            ],
        )?;
        cast_columns(
            raw.lazy(),
            &[population::YEAR],
            &[population::POPULATION_THOUSANDS],
        )
    }

    pub fn load_population_urban(&self) -> Result<DataFrame> {
        let raw = self.read_csv_as_strings(POPULATION_URBAN_FILE)?;
        require_columns(
            &raw,
            &[
                population::CODE_FAO,
                population::YEAR,
                population::URBAN_SHARE_PERCENT,
            ],
        )?;
        cast_columns(
            raw.lazy(),
            &[population::YEAR],
            &[population::URBAN_SHARE_PERCENT],
        )
    }

    pub fn load_factors(&self) -> Result<DataFrame> {
        let raw = self.read_csv_as_strings(FACTORS_FILE)?;
        require_columns(
            &raw,
            &[energy::PRODUCT_CODE, energy::DM_CONTENT, energy::KCAL_PER_G],
        )?;
        cast_columns(raw.lazy(), &[], &[energy::DM_CONTENT, energy::KCAL_PER_G])
    }

    pub fn load_food_supply(&self) -> Result<DataFrame> {
        let raw = self.read_csv_as_strings(FOOD_SUPPLY_FILE)?;
        require_columns(
            &raw,
            &[
                energy::DESTINATION_CODE,
                energy::YEAR,
                energy::PRODUCT_CODE,
                energy::TONNES_DM,
            ],
        )?;
        cast_columns(raw.lazy(), &[energy::YEAR], &[energy::TONNES_DM])
    }

    // ── Private helpers ─────────────────────────────────────────────────────

    /// Read a CSV file with all columns as String dtype.
    /// Trims whitespace from column names.
    fn read_csv_as_strings(&self, filename: &str) -> Result<DataFrame> {
        let path = self.base_path.join(filename);
        debug!(path = %path.display(), "reading csv");
        let mut df = CsvReadOptions::default()
            .with_has_header(true)
            .with_infer_schema_length(Some(0)) // all columns as String
            .try_into_reader_with_file_path(Some(path))?
            .finish()?;

        let trimmed: Vec<String> = df
            .get_column_names_str()
            .iter()
            .map(|c| c.trim().to_string())
            .collect();
        df.set_column_names(trimmed.as_slice())?;
        Ok(df)
    }
}

pub fn require_columns(df: &DataFrame, required: &[&str]) -> Result<()> {
    for &col_name in required {
        if df.column(col_name).is_err() {
            return Err(PanelError::MissingColumn(col_name.to_string()));
        }
    }
    Ok(())
}

/// Strip whitespace from string columns and cast them to Int64 / Float64.
/// Blank cells become null; a non-blank cell that does not parse is an
/// error.
pub fn cast_columns(lazy: LazyFrame, ints: &[&str], floats: &[&str]) -> Result<DataFrame> {
    let targets: Vec<(&str, DataType)> = ints
        .iter()
        .map(|&name| (name, DataType::Int64))
        .chain(floats.iter().map(|&name| (name, DataType::Float64)))
        .collect();

    let stripped = lazy
        .with_columns(
            targets
                .iter()
                .map(|(name, _)| col(*name).str().strip_chars(lit(WHITESPACE)))
                .collect::<Vec<_>>(),
        )
        .collect()?;

    for (name, dtype) in &targets {
        let unparsed = stripped
            .clone()
            .lazy()
            .filter(
                col(*name)
                    .neq(lit(""))
                    .and(col(*name).cast(dtype.clone()).is_null()),
            )
            .select([col(*name)])
            .collect()?;
        if unparsed.height() > 0 {
            let value = unparsed.column(name)?.str()?.get(0).unwrap_or_default();
            return Err(PanelError::InvalidData(format!(
                "column {name}: cannot parse '{value}' as {dtype} ({} cells)",
                unparsed.height()
            )));
        }
    }

    Ok(stripped
        .lazy()
        .with_columns(
            targets
                .iter()
                .map(|(name, dtype)| col(*name).cast(dtype.clone()))
                .collect::<Vec<_>>(),
        )
        .collect()?)
}

/// Write `df` as `<dir>/<stem>.<ext>`, creating the directory if needed.
pub fn write_table(
    df: &mut DataFrame,
    dir: &Path,
    stem: &str,
    format: OutputFormat,
) -> Result<PathBuf> {
    std::fs::create_dir_all(dir)?;
    let path = dir.join(format!("{stem}.{}", format.extension()));
    let mut file = File::create(&path)?;
    match format {
        OutputFormat::Csv => CsvWriter::new(&mut file).finish(df)?,
        OutputFormat::Parquet => {
            ParquetWriter::new(&mut file).finish(df)?;
        }
    }
    info!(path = %path.display(), rows = df.height(), "wrote table");
    Ok(path)
}
