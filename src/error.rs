use thiserror::Error;

pub type Result<T> = std::result::Result<T, PanelError>;

#[derive(Error, Debug)]
pub enum PanelError {
    #[error("Polars error: {0}")]
    Polars(#[from] polars::error::PolarsError),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Missing column: {0}")]
    MissingColumn(String),

    /// More than one row for a key that must be unique (reshape ambiguity).
    #[error("{stage}: duplicate row for key {key}")]
    DuplicateKey { stage: &'static str, key: String },

    /// A required value is still missing after every reconciliation rule ran.
    #[error("{stage}: unreconciled missing value in '{column}' at {key}")]
    Unreconciled {
        stage: &'static str,
        column: String,
        key: String,
    },

    #[error("no value for {country} in reference country {reference} at year {year}, item {item}")]
    MissingReference {
        country: String,
        reference: String,
        year: i64,
        item: String,
    },

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("InvalidData: {0}")]
    InvalidData(String),
}

#[cfg(feature = "python")]
impl From<PanelError> for pyo3::PyErr {
    fn from(err: PanelError) -> pyo3::PyErr {
        pyo3::exceptions::PyRuntimeError::new_err(err.to_string())
    }
}
