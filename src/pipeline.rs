//! Stage orchestration: raw extracts to band panels, and band panels plus
//! lookups to the national, regional and summary tables.

use std::path::{Path, PathBuf};

use polars::prelude::*;
use tracing::{info, info_span};

use crate::aggregation::{aggregate_national, aggregate_regional};
use crate::allocation::allocate;
use crate::band::Bound;
use crate::config::{OutputFormat, PanelConfig, PipelineConfig, ReconcileConfig};
use crate::error::Result;
use crate::io::{write_table, DataSource};
use crate::items::{ItemDefinition, ITEMS};
use crate::normalize::normalize_item;
use crate::panel::{complete_panel, PanelOptions};
use crate::population::{national_population, regional_population};
use crate::reconcile::{prepare_transactions, BandPanels, Lookups, Reconciler};
use crate::summary::{food_group_summary, summarize, urban_rural_summary};

pub const NATIONAL_STEM: &str = "national";
pub const REGIONAL_STEM: &str = "regional";
pub const SUMMARY_STEM: &str = "summary";
pub const FOOD_GROUPS_STEM: &str = "food_groups";
pub const URBAN_RURAL_STEM: &str = "urban_rural";

/// Normalize every item of `items` for one statistic and complete the panel.
pub fn build_panel(
    source: &DataSource,
    items: &[ItemDefinition],
    statistic: &str,
    options: &PanelOptions,
) -> Result<DataFrame> {
    let normalized = items
        .iter()
        .map(|item| {
            let raw = item
                .sources
                .iter()
                .map(|s| source.load_survey_extract(s, statistic))
                .collect::<Result<Vec<_>>>()?;
            normalize_item(item, raw, statistic)
        })
        .collect::<Result<Vec<_>>>()?;
    complete_panel(&normalized, options)
}

/// Build the median, upper and lower panels from the raw extracts.
pub fn build_panels(source: &DataSource, config: &PanelConfig) -> Result<BandPanels> {
    let options = PanelOptions {
        trailing_years: config.trailing_years,
    };
    let build = |bound: Bound| -> Result<DataFrame> {
        let statistic = config.statistic_column(bound);
        let span = info_span!("panel", bound = bound.suffix(), statistic);
        let _guard = span.enter();
        build_panel(source, ITEMS, statistic, &options)
    };
    Ok(BandPanels {
        median: build(Bound::Median)?,
        upper: build(Bound::Upper)?,
        lower: build(Bound::Lower)?,
    })
}

/// Read previously written CSV panels.
pub fn load_panels(source: &DataSource) -> Result<BandPanels> {
    Ok(BandPanels {
        median: source.load_panel(Bound::Median)?,
        upper: source.load_panel(Bound::Upper)?,
        lower: source.load_panel(Bound::Lower)?,
    })
}

pub fn write_panels(panels: &BandPanels, dir: &Path, format: OutputFormat) -> Result<Vec<PathBuf>> {
    Bound::ALL
        .into_iter()
        .map(|bound| {
            let mut df = panels.get(bound).clone();
            write_table(&mut df, dir, &bound.panel_file_stem(), format)
        })
        .collect()
}

/// Every intermediate and final table of an allocation run.
#[derive(Debug, Clone)]
pub struct RunOutputs {
    pub reconciled: DataFrame,
    pub allocated: DataFrame,
    pub national: DataFrame,
    pub regional: DataFrame,
    pub summary: DataFrame,
    pub food_groups: DataFrame,
    pub urban_rural: DataFrame,
}

impl RunOutputs {
    /// Write the national, regional and the three summary tables.
    pub fn write(&mut self, dir: &Path, format: OutputFormat) -> Result<Vec<PathBuf>> {
        Ok(vec![
            write_table(&mut self.national, dir, NATIONAL_STEM, format)?,
            write_table(&mut self.regional, dir, REGIONAL_STEM, format)?,
            write_table(&mut self.summary, dir, SUMMARY_STEM, format)?,
            write_table(&mut self.food_groups, dir, FOOD_GROUPS_STEM, format)?,
            write_table(&mut self.urban_rural, dir, URBAN_RURAL_STEM, format)?,
        ])
    }
}

/// Reconcile, allocate and aggregate the transactions found in `source`.
pub fn allocate_and_aggregate(
    source: &DataSource,
    panels: &BandPanels,
    config: &ReconcileConfig,
) -> Result<RunOutputs> {
    let reconciled = info_span!("prepare").in_scope(|| -> Result<DataFrame> {
        let transactions = prepare_transactions(source.load_transactions()?, &config.excluded_final_uses)?;
        let lookups = Lookups {
            countries: source.load_countries()?,
            products: source.load_products()?,
        };
        Reconciler::from_config(config).run(transactions, &lookups, panels)
    })?;

    let (national_pop, regional_pop) = info_span!("population").in_scope(|| -> Result<_> {
        let national = national_population(
            &reconciled,
            &source.load_population_total()?,
            &source.load_population_urban()?,
        )?;
        let regional = regional_population(&national)?;
        Ok((national, regional))
    })?;

    let allocated = info_span!("allocate").in_scope(|| {
        allocate(
            &reconciled,
            &national_pop,
            &source.load_food_supply()?,
            &source.load_factors()?,
        )
    })?;

    let (national, regional) = info_span!("aggregate").in_scope(|| -> Result<_> {
        let national = aggregate_national(&allocated, &national_pop)?;
        let regional = aggregate_regional(&national, &regional_pop)?;
        Ok((national, regional))
    })?;

    let (summary, food_groups, urban_rural) = info_span!("summary").in_scope(|| -> Result<_> {
        Ok((
            summarize(&regional, &regional_pop)?,
            food_group_summary(&regional)?,
            urban_rural_summary(&regional, &regional_pop)?,
        ))
    })?;

    Ok(RunOutputs {
        reconciled,
        allocated,
        national,
        regional,
        summary,
        food_groups,
        urban_rural,
    })
}

/// `panel` command: build and write the three band panels.
pub fn run_panels(config: &PipelineConfig) -> Result<Vec<PathBuf>> {
    let source = DataSource::new(&config.input_dir);
    let panels = build_panels(&source, &config.panel)?;
    write_panels(&panels, &config.output_dir, config.output_format)
}

/// `run` command: build (or load) the panels, then allocate and aggregate.
/// Returns the paths of every table written.
pub fn run(config: &PipelineConfig, panels_from: Option<&Path>) -> Result<Vec<PathBuf>> {
    let source = DataSource::new(&config.input_dir);
    let mut written = Vec::new();

    let panels = match panels_from {
        Some(dir) => {
            info!(dir = %dir.display(), "loading band panels");
            load_panels(&DataSource::new(dir))?
        }
        None => {
            let panels = build_panels(&source, &config.panel)?;
            written.extend(write_panels(&panels, &config.output_dir, config.output_format)?);
            panels
        }
    };

    let mut outputs = allocate_and_aggregate(&source, &panels, &config.reconcile)?;
    written.extend(outputs.write(&config.output_dir, config.output_format)?);
    info!(files = written.len(), "run complete");
    Ok(written)
}
