//! Lookup reconciliation: attaches country, product and band-panel data to
//! the transaction table and patches the gaps the joins leave behind.
//!
//! Steps, in order:
//! 1. country lookup, dropping unmapped and excluded countries
//! 2. split off infrastructure rows
//! 3. food-group taxonomy
//! 4. GDD item mapping and the three band panels
//! 5. exception rules, each filling only values that are still missing
//! 6. infrastructure rows re-attached with fixed labels and unit factors
//! 7. no missing value may survive

use polars::prelude::*;
use tracing::{debug, info, info_span};

use crate::band::Bound;
use crate::config::ReconcileConfig;
use crate::error::{PanelError, Result};
use crate::io::require_columns;
use crate::schema::{band_factors, country, panel, product, transaction};

const STAGE: &str = "reconcile";

/// Columns of the reconciled table, in output order.
pub const RECONCILED_COLUMNS: [&str; 18] = [
    transaction::DESTINATION_CODE,
    transaction::DESTINATION,
    country::GDD_CODE,
    country::INCOME_GROUP,
    transaction::YEAR,
    transaction::FINAL_USE,
    product::FOOD_GROUP,
    transaction::PRODUCT_CODE,
    transaction::PRODUCT,
    product::GDD_ITEM_CODE,
    product::GDD_ITEM,
    transaction::PRESSURE,
    band_factors::URBAN_MEDIAN,
    band_factors::RURAL_MEDIAN,
    band_factors::URBAN_UPPER,
    band_factors::RURAL_UPPER,
    band_factors::URBAN_LOWER,
    band_factors::RURAL_LOWER,
];

/// Country and product lookup tables.
#[derive(Debug, Clone)]
pub struct Lookups {
    /// code_fao, income_group, gdd_code
    pub countries: DataFrame,
    /// product_code, food_group, gdd_item_code, gdd_item
    pub products: DataFrame,
}

/// The completed panel of each confidence bound.
#[derive(Debug, Clone)]
pub struct BandPanels {
    pub median: DataFrame,
    pub upper: DataFrame,
    pub lower: DataFrame,
}

impl BandPanels {
    pub fn get(&self, bound: Bound) -> &DataFrame {
        match bound {
            Bound::Median => &self.median,
            Bound::Upper => &self.upper,
            Bound::Lower => &self.lower,
        }
    }

    /// One row per (gdd_code, year, gdd_item_code) with all six factor
    /// columns.
    pub fn combined(&self) -> Result<DataFrame> {
        let keys = || [col(country::GDD_CODE), col(panel::YEAR), col(product::GDD_ITEM_CODE)];
        let mut frames = Bound::ALL.into_iter().map(|bound| relabel_panel(self.get(bound), bound));
        let Some(first) = frames.next() else {
            return Err(PanelError::InvalidData("no band panels".into()));
        };
        let mut merged = first?;
        for frame in frames {
            merged = merged.join(
                frame?,
                keys(),
                keys(),
                JoinArgs::new(JoinType::Full).with_coalesce(JoinCoalesce::CoalesceColumns),
            );
        }
        Ok(merged.collect()?)
    }
}

/// Which rows an exception rule applies to.
#[derive(Debug, Clone, PartialEq)]
pub enum RulePredicate {
    /// GDD country code in the list.
    CountryIn(Vec<String>),
    FoodGroupIn(Vec<String>),
}

impl RulePredicate {
    fn expr(&self) -> Expr {
        match self {
            RulePredicate::CountryIn(codes) => col(country::GDD_CODE).is_in(
                lit(Series::new("countries".into(), codes.as_slice())),
                false,
            ),
            RulePredicate::FoodGroupIn(groups) => col(product::FOOD_GROUP).is_in(
                lit(Series::new("food_groups".into(), groups.as_slice())),
                false,
            ),
        }
    }
}

/// How a rule fills a missing value.
#[derive(Debug, Clone, PartialEq)]
pub enum Fill {
    Constant(f64),
    /// The named country's band value at the same (year, item).
    ReferenceCountry(String),
}

/// A named gap-filling rule: for rows matching `predicate`, replace missing
/// values of `targets` according to `fill`.
#[derive(Debug, Clone, PartialEq)]
pub struct ExceptionRule {
    pub name: String,
    pub predicate: RulePredicate,
    pub targets: Vec<&'static str>,
    pub fill: Fill,
    /// Placeholder for a missing GDD item code and label.
    pub item_placeholder: Option<&'static str>,
}

impl ExceptionRule {
    /// City states have no rural population; their rural factors are 0.
    pub fn city_states(countries: Vec<String>) -> Self {
        Self {
            name: "city_states".into(),
            predicate: RulePredicate::CountryIn(countries),
            targets: band_factors::RURAL.to_vec(),
            fill: Fill::Constant(0.0),
            item_placeholder: None,
        }
    }

    /// Food groups without survey coverage are split 1:1.
    pub fn equal_split(food_groups: Vec<String>) -> Self {
        Self {
            name: "equal_split".into(),
            predicate: RulePredicate::FoodGroupIn(food_groups),
            targets: band_factors::ALL.to_vec(),
            fill: Fill::Constant(1.0),
            item_placeholder: Some(product::UNCOVERED_ITEM),
        }
    }

    pub fn reference_country(country: String, reference: String) -> Self {
        Self {
            name: format!("reference_{country}_from_{reference}"),
            predicate: RulePredicate::CountryIn(vec![country]),
            targets: band_factors::ALL.to_vec(),
            fill: Fill::ReferenceCountry(reference),
            item_placeholder: None,
        }
    }

    /// Rules in application order: city states, equal split, reference
    /// substitutions.
    pub fn from_config(config: &ReconcileConfig) -> Vec<Self> {
        let mut rules = Vec::new();
        if !config.city_states.is_empty() {
            rules.push(Self::city_states(config.city_states.clone()));
        }
        if !config.equal_split_food_groups.is_empty() {
            rules.push(Self::equal_split(config.equal_split_food_groups.clone()));
        }
        for sub in &config.reference_substitutions {
            rules.push(Self::reference_country(
                sub.country.clone(),
                sub.reference.clone(),
            ));
        }
        rules
    }

    fn apply(&self, df: DataFrame, bands: &DataFrame) -> Result<DataFrame> {
        let predicate = self.predicate.expr();
        let mut lazy = df.lazy();

        match &self.fill {
            Fill::Constant(value) => {
                let exprs: Vec<Expr> = self
                    .targets
                    .iter()
                    .map(|&t| fill_where_missing(predicate.clone(), t, lit(*value)))
                    .collect();
                lazy = lazy.with_columns(exprs);
            }
            Fill::ReferenceCountry(reference) => {
                let ref_name = |t: &str| format!("_ref_{t}");
                let mut ref_cols = vec![col(panel::YEAR), col(product::GDD_ITEM_CODE)];
                ref_cols.extend(self.targets.iter().map(|&t| col(t).alias(ref_name(t))));
                let reference_values = bands
                    .clone()
                    .lazy()
                    .filter(col(country::GDD_CODE).eq(lit(reference.as_str())))
                    .select(ref_cols);

                lazy = lazy.join(
                    reference_values,
                    [col(transaction::YEAR), col(product::GDD_ITEM_CODE)],
                    [col(panel::YEAR), col(product::GDD_ITEM_CODE)],
                    JoinArgs::new(JoinType::Left),
                );

                let unresolved = self
                    .targets
                    .iter()
                    .fold(lit(false), |acc, &t| {
                        acc.or(col(t).is_null().and(col(ref_name(t)).is_null()))
                    });
                let missing = lazy
                    .clone()
                    .filter(predicate.clone().and(unresolved))
                    .select([
                        col(country::GDD_CODE),
                        col(transaction::YEAR),
                        col(product::GDD_ITEM_CODE),
                    ])
                    .collect()?;
                if missing.height() > 0 {
                    return Err(PanelError::MissingReference {
                        country: first_str(&missing, country::GDD_CODE)?,
                        reference: reference.clone(),
                        year: missing
                            .column(transaction::YEAR)?
                            .i64()?
                            .get(0)
                            .unwrap_or_default(),
                        item: first_str(&missing, product::GDD_ITEM_CODE)?,
                    });
                }

                let exprs: Vec<Expr> = self
                    .targets
                    .iter()
                    .map(|&t| fill_where_missing(predicate.clone(), t, col(ref_name(t))))
                    .collect();
                lazy = lazy
                    .with_columns(exprs)
                    .select(RECONCILED_COLUMNS.map(col));
            }
        }

        if let Some(placeholder) = self.item_placeholder {
            lazy = lazy.with_columns([
                fill_where_missing(predicate.clone(), product::GDD_ITEM_CODE, lit(placeholder)),
                fill_where_missing(predicate, product::GDD_ITEM, lit(placeholder)),
            ]);
        }

        Ok(lazy.collect()?)
    }
}

/// Runs the reconciliation steps with a fixed rule list.
#[derive(Debug, Clone)]
pub struct Reconciler {
    pub excluded_countries: Vec<String>,
    pub rules: Vec<ExceptionRule>,
}

impl Reconciler {
    pub fn from_config(config: &ReconcileConfig) -> Self {
        Self {
            excluded_countries: config.excluded_countries.clone(),
            rules: ExceptionRule::from_config(config),
        }
    }

    /// Reconcile prepared transactions (see [`prepare_transactions`]).
    ///
    /// Output columns: [`RECONCILED_COLUMNS`]. Fails if any value is still
    /// missing after the rules ran.
    pub fn run(
        &self,
        transactions: DataFrame,
        lookups: &Lookups,
        panels: &BandPanels,
    ) -> Result<DataFrame> {
        let span = info_span!("reconcile", rules = self.rules.len());
        let _guard = span.enter();

        require_columns(
            &lookups.countries,
            &[country::CODE_FAO, country::INCOME_GROUP, country::GDD_CODE],
        )?;
        require_columns(
            &lookups.products,
            &[
                product::PRODUCT_CODE,
                product::FOOD_GROUP,
                product::GDD_ITEM_CODE,
                product::GDD_ITEM,
            ],
        )?;
        check_unique(&lookups.countries, country::CODE_FAO)?;
        check_unique(&lookups.products, product::PRODUCT_CODE)?;

        // 1. countries
        let with_countries = self.join_countries(transactions, &lookups.countries)?;

        // 2. infrastructure
        let is_infra = col(transaction::PRODUCT_CODE).eq(lit(transaction::INFRASTRUCTURE));
        let infra = with_countries.clone().lazy().filter(is_infra.clone());
        let food = with_countries.lazy().filter(is_infra.not());

        // 3. food groups
        let food = food.join(
            lookups
                .products
                .clone()
                .lazy()
                .select([col(product::PRODUCT_CODE), col(product::FOOD_GROUP)]),
            [col(transaction::PRODUCT_CODE)],
            [col(product::PRODUCT_CODE)],
            JoinArgs::new(JoinType::Left),
        );

        // 4. GDD mapping and bands
        let bands = panels.combined()?;
        let mut food = food
            .join(
                lookups.products.clone().lazy().select([
                    col(product::PRODUCT_CODE),
                    col(product::GDD_ITEM_CODE),
                    col(product::GDD_ITEM),
                ]),
                [col(transaction::PRODUCT_CODE)],
                [col(product::PRODUCT_CODE)],
                JoinArgs::new(JoinType::Left),
            )
            .join(
                bands.clone().lazy(),
                [
                    col(country::GDD_CODE),
                    col(transaction::YEAR),
                    col(product::GDD_ITEM_CODE),
                ],
                [
                    col(country::GDD_CODE),
                    col(panel::YEAR),
                    col(product::GDD_ITEM_CODE),
                ],
                JoinArgs::new(JoinType::Left),
            )
            .select(RECONCILED_COLUMNS.map(col))
            .collect()?;
        debug!(
            rows = food.height(),
            missing = missing_factor_count(&food)?,
            "joined band panels"
        );

        // 5. exception rules
        for rule in &self.rules {
            let before = missing_factor_count(&food)?;
            food = rule.apply(food, &bands)?;
            let after = missing_factor_count(&food)?;
            debug!(rule = %rule.name, filled = before - after, remaining = after, "applied rule");
        }

        // 6. infrastructure back in
        let mut infra_labels = vec![
            lit(product::INFRA_LABEL).alias(product::FOOD_GROUP),
            lit(product::INFRA_LABEL).alias(product::GDD_ITEM_CODE),
            lit(product::INFRA_LABEL).alias(product::GDD_ITEM),
        ];
        infra_labels.extend(band_factors::ALL.iter().map(|&c| lit(1.0).alias(c)));
        let infra = infra
            .with_columns(infra_labels)
            .select(RECONCILED_COLUMNS.map(col));

        let reconciled = concat([food.lazy(), infra], UnionArgs::default())?
            .sort(
                [
                    transaction::DESTINATION_CODE,
                    transaction::YEAR,
                    transaction::FINAL_USE,
                    transaction::PRODUCT_CODE,
                ],
                SortMultipleOptions::default(),
            )
            .collect()?;

        // 7. post-condition
        check_complete(&reconciled)?;
        info!(rows = reconciled.height(), "reconciled transactions");
        Ok(reconciled)
    }

    fn join_countries(&self, transactions: DataFrame, countries: &DataFrame) -> Result<DataFrame> {
        let before = transactions.height();
        let excluded = Series::new("excluded_countries".into(), self.excluded_countries.as_slice());
        let df = transactions
            .lazy()
            .join(
                countries.clone().lazy().select([
                    col(country::CODE_FAO),
                    col(country::INCOME_GROUP),
                    col(country::GDD_CODE),
                ]),
                [col(transaction::DESTINATION_CODE)],
                [col(country::CODE_FAO)],
                JoinArgs::new(JoinType::Left),
            )
            .filter(col(country::INCOME_GROUP).is_not_null())
            .filter(
                col(country::GDD_CODE)
                    .is_in(lit(excluded), false)
                    .not()
                    .fill_null(lit(true)),
            )
            .collect()?;
        info!(
            kept = df.height(),
            dropped = before - df.height(),
            "joined country lookup"
        );
        Ok(df)
    }
}

/// Drop non-food final uses, normalize the infrastructure product aliases and
/// sum pressure over origin countries.
///
/// Output columns: destination_code, destination, year, final_use,
/// product_code, product, pressure.
pub fn prepare_transactions(raw: DataFrame, excluded_final_uses: &[String]) -> Result<DataFrame> {
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
    let aliases = Series::new("aliases".into(), &transaction::INFRASTRUCTURE_ALIASES);
    let excluded = Series::new("excluded_final_uses".into(), excluded_final_uses);
    let unalias = |name: &str| {
        when(col(name).is_in(lit(aliases.clone()), false))
            .then(lit(transaction::INFRASTRUCTURE))
            .otherwise(col(name))
            .alias(name)
    };

    let before = raw.height();
    let df = raw
        .lazy()
        .with_columns([
            unalias(transaction::PRODUCT_CODE),
            unalias(transaction::PRODUCT),
        ])
        .filter(col(transaction::FINAL_USE).is_in(lit(excluded), false).not())
        .group_by([
            col(transaction::DESTINATION_CODE),
            col(transaction::DESTINATION),
            col(transaction::YEAR),
            col(transaction::FINAL_USE),
            col(transaction::PRODUCT_CODE),
            col(transaction::PRODUCT),
        ])
        .agg([col(transaction::PRESSURE).sum()])
        .sort(
            [
                transaction::DESTINATION_CODE,
                transaction::YEAR,
                transaction::FINAL_USE,
                transaction::PRODUCT_CODE,
            ],
            SortMultipleOptions::default(),
        )
        .collect()?;
    info!(raw_rows = before, rows = df.height(), "prepared transactions");
    Ok(df)
}

/// Rename a panel to the band-factor columns of `bound`.
fn relabel_panel(df: &DataFrame, bound: Bound) -> Result<LazyFrame> {
    require_columns(df, &panel::ALL)?;
    let (urban, rural) = bound.factor_columns();
    Ok(df.clone().lazy().select([
        col(panel::COUNTRY).alias(country::GDD_CODE),
        col(panel::YEAR),
        col(panel::ITEM_CODE).alias(product::GDD_ITEM_CODE),
        col(panel::URBAN_VALUE).alias(urban),
        col(panel::RURAL_VALUE).alias(rural),
    ]))
}

fn fill_where_missing(predicate: Expr, target: &str, value: Expr) -> Expr {
    when(predicate.and(col(target).is_null()))
        .then(value)
        .otherwise(col(target))
        .alias(target)
}

fn missing_factor_count(df: &DataFrame) -> Result<usize> {
    let mut total = 0;
    for name in band_factors::ALL {
        total += df.column(name)?.null_count();
    }
    Ok(total)
}

fn first_str(df: &DataFrame, column: &str) -> Result<String> {
    Ok(df.column(column)?.str()?.get(0).unwrap_or("null").to_string())
}

fn check_unique(df: &DataFrame, key: &str) -> Result<()> {
    let dups = df
        .clone()
        .lazy()
        .group_by([col(key)])
        .agg([len().alias("_rows")])
        .filter(col("_rows").gt(lit(1)))
        .sort([key], SortMultipleOptions::default())
        .collect()?;
    if dups.height() == 0 {
        return Ok(());
    }
    Err(PanelError::DuplicateKey {
        stage: STAGE,
        key: format!("{key}={}", first_str(&dups, key)?),
    })
}

/// Every required column must be free of nulls; report the first offender.
fn check_complete(df: &DataFrame) -> Result<()> {
    for name in RECONCILED_COLUMNS {
        if df.column(name)?.null_count() == 0 {
            continue;
        }
        let offenders = df
            .clone()
            .lazy()
            .filter(col(name).is_null())
            .select([
                col(transaction::DESTINATION_CODE),
                col(transaction::YEAR),
                col(transaction::PRODUCT_CODE),
            ])
            .collect()?;
        let year = offenders
            .column(transaction::YEAR)?
            .i64()?
            .get(0)
            .map(|y| y.to_string())
            .unwrap_or_else(|| "null".into());
        return Err(PanelError::Unreconciled {
            stage: STAGE,
            column: name.to_string(),
            key: format!(
                "destination={}, year={year}, product={} ({} rows)",
                first_str(&offenders, transaction::DESTINATION_CODE)?,
                first_str(&offenders, transaction::PRODUCT_CODE)?,
                offenders.height()
            ),
        });
    }
    Ok(())
}
