/// Column-name constants for the food-ehanpp tables.
/// Single source of truth for every stage and for the Python exports.

// ── Raw survey extract columns ──────────────────────────────────────────────
pub mod survey {
    pub const ISO3: &str = "iso3";
    pub const AGE: &str = "age";
    pub const FEMALE: &str = "female";
    pub const URBAN: &str = "urban";
    pub const EDU: &str = "edu";
    pub const YEAR: &str = "year";

    /// Demographic value meaning "all strata pooled".
    pub const ALL: i64 = 999;
    pub const URBAN_STRATUM: i64 = 1;
    pub const RURAL_STRATUM: i64 = 0;

    pub const DEMOGRAPHIC: [&str; 4] = [AGE, FEMALE, URBAN, EDU];
}

// ── Normalized item / panel columns ─────────────────────────────────────────
pub mod panel {
    pub const COUNTRY: &str = "country";
    pub const YEAR: &str = "year";
    pub const ITEM_CODE: &str = "item_code";
    pub const URBAN_VALUE: &str = "urban_value";
    pub const RURAL_VALUE: &str = "rural_value";

    pub const ALL: [&str; 5] = [COUNTRY, YEAR, ITEM_CODE, URBAN_VALUE, RURAL_VALUE];
}

// ── Transaction columns ─────────────────────────────────────────────────────
pub mod transaction {
    pub const DESTINATION_CODE: &str = "destination_code";
    pub const DESTINATION: &str = "destination";
    pub const ORIGIN_CODE: &str = "origin_code";
    pub const YEAR: &str = "year";
    pub const FINAL_USE: &str = "final_use";
    pub const PRODUCT_CODE: &str = "product_code";
    pub const PRODUCT: &str = "product";
    pub const PRESSURE: &str = "pressure";

    /// Product code of the non-food infrastructure category.
    pub const INFRASTRUCTURE: &str = "Infrastructure";
    /// Aliases used by the published dataset for the infrastructure category.
    pub const INFRASTRUCTURE_ALIASES: [&str; 2] = ["Agri.Infra", "Agri. Infrastructure"];
}

// ── Country lookup columns ──────────────────────────────────────────────────
pub mod country {
    pub const CODE_FAO: &str = "code_fao";
    pub const INCOME_GROUP: &str = "income_group";
    pub const GDD_CODE: &str = "gdd_code";
}

// ── Product taxonomy columns ────────────────────────────────────────────────
pub mod product {
    pub const PRODUCT_CODE: &str = "product_code";
    pub const FOOD_GROUP: &str = "food_group";
    pub const GDD_ITEM_CODE: &str = "gdd_item_code";
    pub const GDD_ITEM: &str = "gdd_item";

    /// Item code, item label and food group given to infrastructure rows.
    pub const INFRA_LABEL: &str = "Infra";
    /// Item label placeholder for equal-split rows without survey coverage.
    pub const UNCOVERED_ITEM: &str = "XX";

    pub const LIVESTOCK_GROUPS: [&str; 3] = [
        "Milk and milk products",
        "Monogastric products",
        "Ruminant meat",
    ];
}

// ── Band factor columns (panel values after relabelling) ────────────────────
pub mod band_factors {
    pub const URBAN_MEDIAN: &str = "gdd_urban_median";
    pub const RURAL_MEDIAN: &str = "gdd_rural_median";
    pub const URBAN_UPPER: &str = "gdd_urban_upper";
    pub const RURAL_UPPER: &str = "gdd_rural_upper";
    pub const URBAN_LOWER: &str = "gdd_urban_lower";
    pub const RURAL_LOWER: &str = "gdd_rural_lower";

    pub const URBAN: [&str; 3] = [URBAN_MEDIAN, URBAN_UPPER, URBAN_LOWER];
    pub const RURAL: [&str; 3] = [RURAL_MEDIAN, RURAL_UPPER, RURAL_LOWER];
    pub const ALL: [&str; 6] = [
        URBAN_MEDIAN,
        RURAL_MEDIAN,
        URBAN_UPPER,
        RURAL_UPPER,
        URBAN_LOWER,
        RURAL_LOWER,
    ];
}

// ── Population columns ──────────────────────────────────────────────────────
pub mod population {
    pub const CODE_FAO: &str = "code_fao";
    pub const YEAR: &str = "year";
    pub const POPULATION_THOUSANDS: &str = "population_thousands";
    pub const URBAN_SHARE_PERCENT: &str = "urban_share_percent";

    pub const NATIONAL: &str = "pop_national";
    pub const URBAN_SHARE: &str = "pop_urban_share";
    pub const URBAN: &str = "pop_urban";
    pub const RURAL: &str = "pop_rural";
    pub const REGIONAL: &str = "pop_regional";
}

// ── Energy conversion columns ───────────────────────────────────────────────
pub mod energy {
    pub const PRODUCT_CODE: &str = "product_code";
    pub const DM_CONTENT: &str = "dm_content";
    pub const KCAL_PER_G: &str = "kcal_per_g";

    pub const DESTINATION_CODE: &str = "destination_code";
    pub const YEAR: &str = "year";
    pub const TONNES_DM: &str = "tonnes_dm";

    pub const KCAL: &str = "kcal";
    pub const KCAL_CAP_DAY: &str = "kcal_cap_day";
    /// Pressure per kcal, recomputed after aggregation.
    pub const INTENSITY: &str = "intensity";
}

// ── Summary columns ─────────────────────────────────────────────────────────
pub mod summary {
    pub const GLOBAL: &str = "Global";
    pub const PRESSURE_CAP: &str = "pressure_cap";
    pub const PRESSURE_URBAN_CAP: &str = "pressure_urban_cap";
    pub const PRESSURE_RURAL_CAP: &str = "pressure_rural_cap";
    pub const INTENSITY_URBAN_G_PER_KCAL: &str = "intensity_urban_g_per_kcal";
    pub const INTENSITY_RURAL_G_PER_KCAL: &str = "intensity_rural_g_per_kcal";
    pub const LIVESTOCK_URBAN_KCAL_CAP_DAY: &str = "livestock_urban_kcal_cap_day";
    pub const LIVESTOCK_RURAL_KCAL_CAP_DAY: &str = "livestock_rural_kcal_cap_day";
    pub const PLANT_URBAN_KCAL_CAP_DAY: &str = "plant_urban_kcal_cap_day";
    pub const PLANT_RURAL_KCAL_CAP_DAY: &str = "plant_rural_kcal_cap_day";

    /// Food-group breakdown labels.
    pub const LIVESTOCK_PRODUCTS: &str = "Livestock products";
    pub const BUILT_UP_LAND: &str = "Embodied built-up land";
    pub const OVERALL: &str = "overall";
    pub const INTENSITY_G_PER_KCAL: &str = "intensity_g_per_kcal";

    pub const POP_GLOBAL: &str = "pop_global";
}
