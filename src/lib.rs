//! Urban/rural food-pressure panel: survey extracts are normalized into a
//! completed (country x year x item) panel, reconciled against the
//! transaction dataset, and used to split pressure and food energy between
//! urban and rural populations under three uncertainty bands.

pub mod aggregation;
pub mod allocation;
pub mod band;
pub mod config;
pub mod error;
pub mod io;
pub mod items;
pub mod normalize;
pub mod panel;
pub mod pipeline;
pub mod population;
pub mod reconcile;
pub mod schema;
pub mod summary;

#[cfg(feature = "python")]
mod python;

pub use band::{Band, Bound, Quantity};
pub use config::{OutputFormat, PipelineConfig};
pub use error::{PanelError, Result};
pub use io::DataSource;
pub use reconcile::{BandPanels, ExceptionRule, Lookups, Reconciler};
