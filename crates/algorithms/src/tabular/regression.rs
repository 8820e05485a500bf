use super::table::Table;
use csv::WriterBuilder;
use gwpump_core::{Error, Result};
use ndarray::{ArrayView2, Axis};
use rand::rngs::StdRng;
use rand::seq::SliceRandom;
use rand::SeedableRng;
use std::fs::OpenOptions;
use std::path::Path;
use tracing::info;

/// A trainable regression model.
///
/// The learner itself (e.g. a random forest) lives outside this crate;
/// implementors adapt it to the evaluation loop below.
pub trait Regressor {
    /// Label used in log output
    fn name(&self) -> &str {
        "regressor"
    }

    fn fit(&mut self, features: ArrayView2<'_, f64>, target: &[f64]) -> Result<()>;

    fn predict(&self, features: ArrayView2<'_, f64>) -> Result<Vec<f64>>;

    /// Relative importance of each feature column, in column order
    fn feature_importances(&self) -> Vec<f64>;
}

/// Evaluation settings
#[derive(Debug, Clone)]
pub struct RegressionParams {
    /// Number of trees, recorded with the scores and passed to the learner
    pub n_estimators: usize,
    /// Seed for the train/test split
    pub random_state: u64,
    /// Fraction of rows held out for testing
    pub test_size: f64,
    /// Name of the predicted column
    pub target: String,
}

impl Default for RegressionParams {
    fn default() -> Self {
        Self {
            n_estimators: 200,
            random_state: 0,
            test_size: 0.2,
            target: "GW_KS".to_string(),
        }
    }
}

/// Shuffle `0..n` with a seeded RNG and split it into (train, test).
///
/// The test set holds `ceil(test_size * n)` rows; both sets must be
/// non-empty.
pub fn train_test_split(n: usize, test_size: f64, seed: u64) -> Result<(Vec<usize>, Vec<usize>)> {
    if !(test_size > 0.0 && test_size < 1.0) {
        return Err(Error::InvalidParameter {
            name: "test_size",
            value: test_size.to_string(),
            reason: "must be in (0, 1)".into(),
        });
    }
    let n_test = (test_size * n as f64).ceil() as usize;
    if n_test == 0 || n_test >= n {
        return Err(Error::InvalidParameter {
            name: "n_rows",
            value: n.to_string(),
            reason: format!("too few rows for a {} test split", test_size),
        });
    }

    let mut indices: Vec<usize> = (0..n).collect();
    let mut rng = StdRng::seed_from_u64(seed);
    indices.shuffle(&mut rng);

    let train = indices.split_off(n_test);
    Ok((train, indices))
}

/// Coefficient of determination
pub fn r2_score(actual: &[f64], predicted: &[f64]) -> f64 {
    let mean = actual.iter().sum::<f64>() / actual.len() as f64;
    let ss_tot: f64 = actual.iter().map(|y| (y - mean).powi(2)).sum();
    let ss_res: f64 = actual
        .iter()
        .zip(predicted)
        .map(|(y, p)| (y - p).powi(2))
        .sum();
    if ss_tot == 0.0 {
        return if ss_res == 0.0 { 1.0 } else { 0.0 };
    }
    1.0 - ss_res / ss_tot
}

pub fn mean_absolute_error(actual: &[f64], predicted: &[f64]) -> f64 {
    actual.iter().zip(predicted).map(|(y, p)| (y - p).abs()).sum::<f64>() / actual.len() as f64
}

pub fn root_mean_squared_error(actual: &[f64], predicted: &[f64]) -> f64 {
    let mse = actual.iter().zip(predicted).map(|(y, p)| (y - p).powi(2)).sum::<f64>()
        / actual.len() as f64;
    mse.sqrt()
}

fn round3(v: f64) -> f64 {
    (v * 1000.0).round() / 1000.0
}

/// One row of the results table
#[derive(Debug, Clone, PartialEq)]
pub struct RegressionScores {
    pub n_estimators: usize,
    pub random_state: u64,
    pub feature_importances: Vec<f64>,
    pub train_score: f64,
    pub test_score: f64,
    pub mae: f64,
    pub rmse: f64,
}

impl RegressionScores {
    const HEADER: [&'static str; 7] = [
        "N_Estimator",
        "Random_State",
        "F_IMP",
        "Train_Score",
        "Test_Score",
        "MAE",
        "RMSE",
    ];

    fn record(&self) -> Vec<String> {
        let importances = self
            .feature_importances
            .iter()
            .map(|v| v.to_string())
            .collect::<Vec<_>>()
            .join(" ");
        vec![
            self.n_estimators.to_string(),
            self.random_state.to_string(),
            importances,
            self.train_score.to_string(),
            self.test_score.to_string(),
            self.mae.to_string(),
            self.rmse.to_string(),
        ]
    }

    /// Append this row to a results CSV, writing the header only when the
    /// file is new or empty
    pub fn append_to_csv<P: AsRef<Path>>(&self, path: P) -> Result<()> {
        let file = OpenOptions::new().create(true).append(true).open(path.as_ref())?;
        let is_new = file.metadata()?.len() == 0;

        let mut writer = WriterBuilder::new().has_headers(false).from_writer(file);
        if is_new {
            writer.write_record(Self::HEADER)?;
        }
        writer.write_record(self.record())?;
        writer.flush()?;
        Ok(())
    }
}

/// Fit `regressor` on a seeded train split of `table` and score it on
/// both splits. All scores are rounded to three decimals.
pub fn evaluate<R: Regressor>(
    regressor: &mut R,
    table: &Table,
    params: &RegressionParams,
) -> Result<RegressionScores> {
    let (features, target, names) = table.split_target(&params.target)?;
    let (train, test) = train_test_split(target.len(), params.test_size, params.random_state)?;

    let x_train = features.select(Axis(0), &train);
    let x_test = features.select(Axis(0), &test);
    let y_train: Vec<f64> = train.iter().map(|&i| target[i]).collect();
    let y_test: Vec<f64> = test.iter().map(|&i| target[i]).collect();

    info!(
        "Fitting {} on {} rows ({} held out), features: {}",
        regressor.name(),
        train.len(),
        test.len(),
        names.join(", ")
    );
    regressor.fit(x_train.view(), &y_train)?;
    let train_pred = regressor.predict(x_train.view())?;
    let test_pred = regressor.predict(x_test.view())?;

    let importances = regressor.feature_importances();
    if importances.len() != names.len() {
        return Err(Error::Other(format!(
            "regressor reported {} importances for {} features",
            importances.len(),
            names.len()
        )));
    }

    let scores = RegressionScores {
        n_estimators: params.n_estimators,
        random_state: params.random_state,
        feature_importances: importances.into_iter().map(round3).collect(),
        train_score: round3(r2_score(&y_train, &train_pred)),
        test_score: round3(r2_score(&y_test, &test_pred)),
        mae: round3(mean_absolute_error(&y_test, &test_pred)),
        rmse: round3(root_mean_squared_error(&y_test, &test_pred)),
    };
    info!(
        "Train R2 {} / Test R2 {} / MAE {} / RMSE {}",
        scores.train_score, scores.test_score, scores.mae, scores.rmse
    );
    Ok(scores)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::tabular::TableBuilder;
    use approx::assert_relative_eq;
    use tempfile::tempdir;

    /// Least squares on the first feature only
    struct FirstFeatureLine {
        slope: f64,
        intercept: f64,
        n_features: usize,
    }

    impl Regressor for FirstFeatureLine {
        fn name(&self) -> &str {
            "first-feature line"
        }

        fn fit(&mut self, features: ArrayView2<'_, f64>, target: &[f64]) -> Result<()> {
            let x = features.column(0);
            let n = x.len() as f64;
            let mx = x.sum() / n;
            let my = target.iter().sum::<f64>() / n;
            let cov: f64 = x.iter().zip(target).map(|(a, b)| (a - mx) * (b - my)).sum();
            let var: f64 = x.iter().map(|a| (a - mx).powi(2)).sum();
            self.slope = cov / var;
            self.intercept = my - self.slope * mx;
            self.n_features = features.ncols();
            Ok(())
        }

        fn predict(&self, features: ArrayView2<'_, f64>) -> Result<Vec<f64>> {
            Ok(features.column(0).iter().map(|x| self.intercept + self.slope * x).collect())
        }

        fn feature_importances(&self) -> Vec<f64> {
            let mut imp = vec![0.0; self.n_features];
            imp[0] = 1.0;
            imp
        }
    }

    fn linear_table() -> Table {
        let mut builder = TableBuilder::new();
        builder.push_values("ET", (0..20).map(f64::from));
        builder.push_values("GW_KS", (0..20).map(|i| 2.0 * f64::from(i) + 1.0));
        builder.push_values("P", (0..20).map(|i| f64::from(i % 3)));
        builder.finish().unwrap()
    }

    #[test]
    fn test_split_is_seeded_and_disjoint() {
        let (train, test) = train_test_split(10, 0.2, 42).unwrap();
        assert_eq!((train.len(), test.len()), (8, 2));
        assert!(test.iter().all(|i| !train.contains(i)));
        assert_eq!(train_test_split(10, 0.2, 42).unwrap(), (train, test));
    }

    #[test]
    fn test_split_rounds_test_size_up() {
        let (train, test) = train_test_split(11, 0.2, 0).unwrap();
        assert_eq!((train.len(), test.len()), (8, 3));
    }

    #[test]
    fn test_split_rejects_bad_sizes() {
        assert!(train_test_split(10, 0.0, 0).is_err());
        assert!(train_test_split(10, 1.0, 0).is_err());
        assert!(train_test_split(1, 0.5, 0).is_err());
    }

    #[test]
    fn test_metrics() {
        let actual = [1.0, 2.0, 3.0, 4.0];
        let predicted = [1.5, 2.0, 2.5, 4.0];
        assert_relative_eq!(mean_absolute_error(&actual, &predicted), 0.25);
        assert_relative_eq!(root_mean_squared_error(&actual, &predicted), 0.125f64.sqrt());
        assert_relative_eq!(r2_score(&actual, &predicted), 1.0 - 0.5 / 5.0);
        assert_relative_eq!(r2_score(&actual, &actual), 1.0);
    }

    #[test]
    fn test_evaluate_perfect_fit() {
        let mut model = FirstFeatureLine {
            slope: 0.0,
            intercept: 0.0,
            n_features: 0,
        };
        let scores = evaluate(&mut model, &linear_table(), &RegressionParams::default()).unwrap();

        assert_eq!(scores.n_estimators, 200);
        assert_eq!(scores.feature_importances, vec![1.0, 0.0]);
        assert_relative_eq!(scores.train_score, 1.0);
        assert_relative_eq!(scores.test_score, 1.0);
        assert_relative_eq!(scores.mae, 0.0);
        assert_relative_eq!(scores.rmse, 0.0);
    }

    #[test]
    fn test_evaluate_unknown_target() {
        let mut model = FirstFeatureLine {
            slope: 0.0,
            intercept: 0.0,
            n_features: 0,
        };
        let params = RegressionParams {
            target: "GW_AZ".into(),
            ..Default::default()
        };
        assert!(evaluate(&mut model, &linear_table(), &params).is_err());
    }

    #[test]
    fn test_append_writes_header_once() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("RF_Results.csv");
        let scores = RegressionScores {
            n_estimators: 200,
            random_state: 0,
            feature_importances: vec![0.612, 0.388],
            train_score: 0.97,
            test_score: 0.81,
            mae: 12.4,
            rmse: 20.021,
        };

        scores.append_to_csv(&path).unwrap();
        scores.append_to_csv(&path).unwrap();

        let text = std::fs::read_to_string(&path).unwrap();
        let lines: Vec<&str> = text.lines().collect();
        assert_eq!(lines.len(), 3);
        assert_eq!(lines[0], "N_Estimator,Random_State,F_IMP,Train_Score,Test_Score,MAE,RMSE");
        assert_eq!(lines[1], "200,0,0.612 0.388,0.97,0.81,12.4,20.021");
        assert_eq!(lines[2], lines[1]);
    }
}
