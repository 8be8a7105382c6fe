use std::path::PathBuf;

use pyo3::prelude::*;
use pyo3::types::PyModule;
use pyo3_polars::PyDataFrame;

use crate::band;
use crate::config::PipelineConfig;
use crate::io::DataSource;
use crate::panel::interpolate_gaps;
use crate::pipeline::{allocate_and_aggregate, build_panels, load_panels};
use crate::reconcile::BandPanels;
use crate::schema;

#[pyclass]
pub struct FoodModel {
    source: DataSource,
    config: PipelineConfig,
    panels: Option<BandPanels>,
}

#[pymethods]
impl FoodModel {
    /// Open the input directory `base_path`, optionally with a TOML config.
    #[new]
    #[pyo3(signature = (base_path, config_path=None))]
    fn new(base_path: String, config_path: Option<String>) -> PyResult<Self> {
        let config = PipelineConfig::load(config_path.map(PathBuf::from).as_deref())?;
        Ok(Self {
            source: DataSource::new(base_path),
            config,
            panels: None,
        })
    }

    // ── Panels ──────────────────────────────────────────────────────────────

    /// Build the median, upper and lower panels from the raw extracts.
    fn build_panels(&mut self) -> PyResult<(PyDataFrame, PyDataFrame, PyDataFrame)> {
        let panels = build_panels(&self.source, &self.config.panel)?;
        Ok(self.cache(panels))
    }

    /// Load panels written by an earlier run from `dir`.
    fn load_panels(&mut self, dir: String) -> PyResult<(PyDataFrame, PyDataFrame, PyDataFrame)> {
        let panels = load_panels(&DataSource::new(dir))?;
        Ok(self.cache(panels))
    }

    // ── Allocation ──────────────────────────────────────────────────────────

    /// Reconcile, allocate and aggregate. Builds the panels first if none are
    /// loaded. Returns (national, regional, summary, food_groups,
    /// urban_rural).
    fn run(
        &mut self,
    ) -> PyResult<(PyDataFrame, PyDataFrame, PyDataFrame, PyDataFrame, PyDataFrame)> {
        if self.panels.is_none() {
            self.build_panels()?;
        }
        let Some(panels) = self.panels.as_ref() else {
            return Err(pyo3::exceptions::PyRuntimeError::new_err("no band panels"));
        };
        let outputs = allocate_and_aggregate(&self.source, panels, &self.config.reconcile)?;
        Ok((
            PyDataFrame(outputs.national),
            PyDataFrame(outputs.regional),
            PyDataFrame(outputs.summary),
            PyDataFrame(outputs.food_groups),
            PyDataFrame(outputs.urban_rural),
        ))
    }

    /// Interpolate interior gaps of a panel sorted by (country, item_code,
    /// year).
    #[staticmethod]
    fn interpolate(panel: PyDataFrame) -> PyResult<PyDataFrame> {
        Ok(PyDataFrame(interpolate_gaps(panel.0)?))
    }
}

impl FoodModel {
    fn cache(&mut self, panels: BandPanels) -> (PyDataFrame, PyDataFrame, PyDataFrame) {
        let out = (
            PyDataFrame(panels.get(band::Bound::Median).clone()),
            PyDataFrame(panels.get(band::Bound::Upper).clone()),
            PyDataFrame(panels.get(band::Bound::Lower).clone()),
        );
        self.panels = Some(panels);
        out
    }
}

/// Export schema constants as Python submodules
fn add_schema_exports(m: &Bound<'_, PyModule>) -> PyResult<()> {
    let panel = PyModule::new(m.py(), "panel")?;
    panel.add("COUNTRY", schema::panel::COUNTRY)?;
    panel.add("YEAR", schema::panel::YEAR)?;
    panel.add("ITEM_CODE", schema::panel::ITEM_CODE)?;
    panel.add("URBAN_VALUE", schema::panel::URBAN_VALUE)?;
    panel.add("RURAL_VALUE", schema::panel::RURAL_VALUE)?;
    m.add_submodule(&panel)?;

    let band_factors = PyModule::new(m.py(), "band_factors")?;
    for name in schema::band_factors::ALL {
        band_factors.add(name.to_uppercase(), name)?;
    }
    m.add_submodule(&band_factors)?;

    let population = PyModule::new(m.py(), "population")?;
    population.add("NATIONAL", schema::population::NATIONAL)?;
    population.add("URBAN", schema::population::URBAN)?;
    population.add("RURAL", schema::population::RURAL)?;
    population.add("REGIONAL", schema::population::REGIONAL)?;
    m.add_submodule(&population)?;

    Ok(())
}

#[pymodule]
fn _core(m: &Bound<'_, PyModule>) -> PyResult<()> {
    m.add_class::<FoodModel>()?;
    add_schema_exports(m)?;
    Ok(())
}
