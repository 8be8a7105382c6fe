//! Frame builders shared by the integration tests.

#![allow(dead_code)]

use polars::prelude::*;

use food_ehanpp::schema::{country, panel, product, transaction};

pub type PanelRow<'a> = (&'a str, i64, &'a str, Option<f64>, Option<f64>);

pub fn panel_frame(rows: &[PanelRow<'_>]) -> DataFrame {
    df!(
        panel::COUNTRY => rows.iter().map(|r| r.0).collect::<Vec<_>>(),
        panel::YEAR => rows.iter().map(|r| r.1).collect::<Vec<_>>(),
        panel::ITEM_CODE => rows.iter().map(|r| r.2).collect::<Vec<_>>(),
        panel::URBAN_VALUE => rows.iter().map(|r| r.3).collect::<Vec<_>>(),
        panel::RURAL_VALUE => rows.iter().map(|r| r.4).collect::<Vec<_>>()
    )
    .unwrap()
}

/// One raw survey row: (iso3, age, female, urban, edu, year, value).
pub type SurveyRow<'a> = (&'a str, i64, i64, i64, i64, i64, f64);

pub fn survey_frame(rows: &[SurveyRow<'_>]) -> DataFrame {
    df!(
        "iso3" => rows.iter().map(|r| r.0).collect::<Vec<_>>(),
        "age" => rows.iter().map(|r| r.1).collect::<Vec<_>>(),
        "female" => rows.iter().map(|r| r.2).collect::<Vec<_>>(),
        "urban" => rows.iter().map(|r| r.3).collect::<Vec<_>>(),
        "edu" => rows.iter().map(|r| r.4).collect::<Vec<_>>(),
        "year" => rows.iter().map(|r| r.5).collect::<Vec<_>>(),
        "median" => rows.iter().map(|r| r.6).collect::<Vec<_>>()
    )
    .unwrap()
}

/// Total-population urban and rural rows for one (country, year).
pub fn survey_pair<'a>(iso3: &'a str, year: i64, urban: f64, rural: f64) -> [SurveyRow<'a>; 2] {
    [
        (iso3, 999, 999, 1, 999, year, urban),
        (iso3, 999, 999, 0, 999, year, rural),
    ]
}

/// Prepared transactions: (destination_code, destination, year, final_use,
/// product_code, product, pressure).
pub type TransactionRow<'a> = (&'a str, &'a str, i64, &'a str, &'a str, &'a str, f64);

pub fn transaction_frame(rows: &[TransactionRow<'_>]) -> DataFrame {
    df!(
        transaction::DESTINATION_CODE => rows.iter().map(|r| r.0).collect::<Vec<_>>(),
        transaction::DESTINATION => rows.iter().map(|r| r.1).collect::<Vec<_>>(),
        transaction::YEAR => rows.iter().map(|r| r.2).collect::<Vec<_>>(),
        transaction::FINAL_USE => rows.iter().map(|r| r.3).collect::<Vec<_>>(),
        transaction::PRODUCT_CODE => rows.iter().map(|r| r.4).collect::<Vec<_>>(),
        transaction::PRODUCT => rows.iter().map(|r| r.5).collect::<Vec<_>>(),
        transaction::PRESSURE => rows.iter().map(|r| r.6).collect::<Vec<_>>()
    )
    .unwrap()
}

pub fn countries() -> DataFrame {
    df!(
        country::CODE_FAO => ["1", "2", "3", "4", "5"],
        country::INCOME_GROUP => ["H", "L", "L", "L", "L"],
        country::GDD_CODE => ["AUT", "SGP", "SOM", "ETH", "PRK"]
    )
    .unwrap()
}

pub fn products() -> DataFrame {
    df!(
        product::PRODUCT_CODE => ["15", "656"],
        product::FOOD_GROUP => ["Cereals", "Sugars and stimulants"],
        product::GDD_ITEM_CODE => [Some("v12"), None],
        product::GDD_ITEM => [Some("Refined grains"), None]
    )
    .unwrap()
}

pub fn f64_values(df: &DataFrame, column: &str) -> Vec<Option<f64>> {
    df.column(column).unwrap().f64().unwrap().into_iter().collect()
}

pub fn str_values(df: &DataFrame, column: &str) -> Vec<Option<String>> {
    df.column(column)
        .unwrap()
        .str()
        .unwrap()
        .into_iter()
        .map(|v| v.map(str::to_string))
        .collect()
}

/// Row of `df` (filtered by `column == value`) as a single f64 for `target`.
pub fn value_where(df: &DataFrame, column: &str, value: &str, target: &str) -> Option<f64> {
    let row = df
        .clone()
        .lazy()
        .filter(col(column).eq(lit(value)))
        .select([col(target)])
        .collect()
        .unwrap();
    assert_eq!(row.height(), 1, "expected one row where {column} == {value}");
    row.column(target).unwrap().f64().unwrap().get(0)
}
