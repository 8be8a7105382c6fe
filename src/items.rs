//! Reporting items of the dietary survey and the raw extracts they are built
//! from.

/// One raw survey extract (`{code}_cnty.csv`).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RawSource {
    pub code: &'static str,
    /// Reporting years dropped before reshaping.
    pub excluded_years: &'static [i64],
}

impl RawSource {
    pub const fn new(code: &'static str) -> Self {
        Self {
            code,
            excluded_years: &[],
        }
    }

    pub const fn excluding(code: &'static str, excluded_years: &'static [i64]) -> Self {
        Self {
            code,
            excluded_years,
        }
    }

    pub fn file_name(&self) -> String {
        format!("{}_cnty.csv", self.code)
    }
}

/// A reporting item. Items with more than one source are composites whose
/// values are the sum of their sources.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ItemDefinition {
    pub code: &'static str,
    pub label: &'static str,
    pub sources: &'static [RawSource],
}

impl ItemDefinition {
    pub fn is_composite(&self) -> bool {
        self.sources.len() > 1
    }
}

const YEAR_2020: &[i64] = &[2020];

pub const ITEMS: &[ItemDefinition] = &[
    ItemDefinition {
        code: "v01_v16",
        label: "Fruits and fruit juices",
        sources: &[RawSource::new("v01"), RawSource::new("v16")],
    },
    ItemDefinition {
        code: "v02",
        label: "Non-starchy vegetables",
        sources: &[RawSource::new("v02")],
    },
    ItemDefinition {
        code: "v03",
        label: "Potatoes",
        sources: &[RawSource::new("v03")],
    },
    ItemDefinition {
        code: "v04",
        label: "Other starchy vegetables",
        sources: &[RawSource::new("v04")],
    },
    ItemDefinition {
        code: "v05",
        label: "Beans and legumes",
        sources: &[RawSource::new("v05")],
    },
    ItemDefinition {
        code: "v06",
        label: "Nuts and seeds",
        sources: &[RawSource::new("v06")],
    },
    ItemDefinition {
        code: "v07_v08",
        label: "Refined and whole grains",
        sources: &[RawSource::new("v07"), RawSource::new("v08")],
    },
    ItemDefinition {
        code: "v09_v10",
        label: "Unprocessed and processed meats",
        sources: &[
            RawSource::new("v09"),
            RawSource::excluding("v10", YEAR_2020),
        ],
    },
    ItemDefinition {
        code: "v12",
        label: "Eggs",
        sources: &[RawSource::new("v12")],
    },
    ItemDefinition {
        code: "v13_v14_v57",
        label: "Milk and milk products",
        sources: &[
            RawSource::new("v13"),
            RawSource::new("v14"),
            RawSource::new("v57"),
        ],
    },
    ItemDefinition {
        code: "v17",
        label: "Coffee",
        sources: &[RawSource::new("v17")],
    },
    ItemDefinition {
        code: "v18",
        label: "Tea",
        sources: &[RawSource::new("v18")],
    },
    ItemDefinition {
        code: "v27",
        label: "Saturated fat",
        sources: &[RawSource::new("v27")],
    },
    ItemDefinition {
        code: "v28",
        label: "Monounsaturated fatty acids",
        sources: &[RawSource::new("v28")],
    },
    ItemDefinition {
        code: "v29",
        label: "Total omega-6 fat",
        sources: &[RawSource::new("v29")],
    },
    ItemDefinition {
        code: "v31",
        label: "Plant omega-3 fat",
        sources: &[RawSource::new("v31")],
    },
    ItemDefinition {
        code: "v35",
        label: "Added sugars",
        sources: &[RawSource::excluding("v35", YEAR_2020)],
    },
];

pub fn find(code: &str) -> Option<&'static ItemDefinition> {
    ITEMS.iter().find(|item| item.code == code)
}
