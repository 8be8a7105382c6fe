//! Confidence bounds of the survey statistic and the allocation bands built
//! from them.

use crate::schema::{band_factors, energy, transaction};

/// Which survey statistic a panel was built from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Bound {
    Median,
    Upper,
    Lower,
}

impl Bound {
    pub const ALL: [Bound; 3] = [Bound::Median, Bound::Upper, Bound::Lower];

    pub fn suffix(self) -> &'static str {
        match self {
            Bound::Median => "median",
            Bound::Upper => "upper",
            Bound::Lower => "lower",
        }
    }

    /// Band factor columns this bound is relabelled to: (urban, rural).
    pub fn factor_columns(self) -> (&'static str, &'static str) {
        match self {
            Bound::Median => (band_factors::URBAN_MEDIAN, band_factors::RURAL_MEDIAN),
            Bound::Upper => (band_factors::URBAN_UPPER, band_factors::RURAL_UPPER),
            Bound::Lower => (band_factors::URBAN_LOWER, band_factors::RURAL_LOWER),
        }
    }

    /// Stem of the persisted panel file.
    pub fn panel_file_stem(self) -> String {
        format!("gdd_panel_{}", self.suffix())
    }
}

/// Allocation scenario.
///
/// `High` and `Low` cross-match the bounds: `High` pairs the urban lower
/// bound with the rural upper bound, widening the urban/rural gap, `Low`
/// pairs them the other way round.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Band {
    Median,
    High,
    Low,
}

impl Band {
    pub const ALL: [Band; 3] = [Band::Median, Band::High, Band::Low];

    pub fn suffix(self) -> &'static str {
        match self {
            Band::Median => "median",
            Band::High => "high",
            Band::Low => "low",
        }
    }

    /// (urban factor column, rural factor column)
    pub fn factor_columns(self) -> (&'static str, &'static str) {
        match self {
            Band::Median => (band_factors::URBAN_MEDIAN, band_factors::RURAL_MEDIAN),
            Band::High => (band_factors::URBAN_LOWER, band_factors::RURAL_UPPER),
            Band::Low => (band_factors::URBAN_UPPER, band_factors::RURAL_LOWER),
        }
    }
}

/// Absolute quantity split between urban and rural populations.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Quantity {
    Pressure,
    Energy,
}

impl Quantity {
    pub const ALL: [Quantity; 2] = [Quantity::Pressure, Quantity::Energy];

    pub fn total_column(self) -> &'static str {
        match self {
            Quantity::Pressure => transaction::PRESSURE,
            Quantity::Energy => energy::KCAL,
        }
    }

    fn prefix(self) -> &'static str {
        match self {
            Quantity::Pressure => "pressure",
            Quantity::Energy => "kcal",
        }
    }

    pub fn urban(self, band: Band) -> String {
        format!("{}_urban_{}", self.prefix(), band.suffix())
    }

    pub fn rural(self, band: Band) -> String {
        format!("{}_rural_{}", self.prefix(), band.suffix())
    }

    /// Per-capita column; energy is expressed per day.
    pub fn urban_cap(self, band: Band) -> String {
        match self {
            Quantity::Pressure => format!("pressure_urban_cap_{}", band.suffix()),
            Quantity::Energy => format!("kcal_urban_cap_day_{}", band.suffix()),
        }
    }

    pub fn rural_cap(self, band: Band) -> String {
        match self {
            Quantity::Pressure => format!("pressure_rural_cap_{}", band.suffix()),
            Quantity::Energy => format!("kcal_rural_cap_day_{}", band.suffix()),
        }
    }

    /// Every absolute column (total plus both splits of every band).
    pub fn absolute_columns(self) -> Vec<String> {
        let mut cols = vec![self.total_column().to_string()];
        for band in Band::ALL {
            cols.push(self.urban(band));
            cols.push(self.rural(band));
        }
        cols
    }
}

/// Pressure-per-kcal intensity column names: (urban, rural).
pub fn intensity_columns(band: Band) -> (String, String) {
    (
        format!("intensity_urban_{}", band.suffix()),
        format!("intensity_rural_{}", band.suffix()),
    )
}
