//! Tabular datasets built from per-variable rasters
//!
//! Rasters named `<Variable>_<Year>.tif` are flattened into one column
//! per variable, rows ordered by year then by cell. The resulting table
//! feeds an external regression model whose scores are appended to a
//! results CSV.

mod regression;
mod table;

pub use regression::{
    evaluate, mean_absolute_error, r2_score, root_mean_squared_error, train_test_split,
    RegressionParams, RegressionScores, Regressor,
};
pub use table::{
    create_table, parse_variable_year, Table, TableBuilder, TableOptions,
    ACRE_FEET_PER_SQ_MILE_TO_MM,
};
