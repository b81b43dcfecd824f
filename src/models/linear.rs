//! Линейная регрессия (базовая модель)

#![allow(non_snake_case)]

use ndarray::{Array1, Array2, Axis};
use serde::{Deserialize, Serialize};

use super::Regressor;
use crate::error::{BiError, Result};
use crate::types::Algorithm;

/// Наименьшие квадраты со свободным членом.
///
/// Решается через нормальные уравнения на центрированных данных. `alpha > 0`
/// превращает модель в Ridge. Линейно зависимые (в том числе константные)
/// признаки получают нулевой вес вместо ошибки вырожденной матрицы.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LinearRegression {
    alpha: f64,
    coefficients: Option<Array1<f64>>,
    intercept: f64,
}

impl LinearRegression {
    pub fn new() -> Self {
        Self::ridge(0.0)
    }

    pub fn ridge(alpha: f64) -> Self {
        Self {
            alpha,
            coefficients: None,
            intercept: 0.0,
        }
    }

    pub fn coefficients(&self) -> Option<&Array1<f64>> {
        self.coefficients.as_ref()
    }

    pub fn intercept(&self) -> f64 {
        self.intercept
    }

    fn solve_linear_system(A: &Array2<f64>, b: &Array1<f64>) -> Array1<f64> {
        // Метод Гаусса с выбором главного элемента на системе с единичной
        // диагональю: порог вырожденности относителен для каждого столбца
        let n = A.nrows();
        let scale: Array1<f64> = (0..n)
            .map(|i| if A[[i, i]] > 0.0 { A[[i, i]].sqrt() } else { 1.0 })
            .collect();

        let mut augmented = Array2::zeros((n, n + 1));
        for i in 0..n {
            for j in 0..n {
                augmented[[i, j]] = A[[i, j]] / (scale[i] * scale[j]);
            }
            augmented[[i, n]] = b[i] / scale[i];
        }

        let tolerance = 1e-10;

        let mut pivots: Vec<(usize, usize)> = Vec::with_capacity(n);
        let mut row = 0;
        for col in 0..n {
            if row >= n {
                break;
            }

            let mut max_row = row;
            let mut max_val = augmented[[row, col]].abs();
            for k in (row + 1)..n {
                if augmented[[k, col]].abs() > max_val {
                    max_val = augmented[[k, col]].abs();
                    max_row = k;
                }
            }

            // Зависимый столбец: вес остаётся нулевым
            if max_val < tolerance {
                continue;
            }

            if max_row != row {
                for j in 0..=n {
                    augmented.swap([row, j], [max_row, j]);
                }
            }

            let pivot = augmented[[row, col]];
            for k in (row + 1)..n {
                let factor = augmented[[k, col]] / pivot;
                if factor == 0.0 {
                    continue;
                }
                for j in col..=n {
                    augmented[[k, j]] -= factor * augmented[[row, j]];
                }
            }

            pivots.push((row, col));
            row += 1;
        }

        // Обратный ход
        let mut x = Array1::zeros(n);
        for &(r, col) in pivots.iter().rev() {
            let mut sum = augmented[[r, n]];
            for j in (col + 1)..n {
                sum -= augmented[[r, j]] * x[j];
            }
            x[col] = sum / augmented[[r, col]];
        }

        x / &scale
    }
}

impl Regressor for LinearRegression {
    fn algorithm(&self) -> Algorithm {
        Algorithm::LinearRegression
    }

    fn fit(&mut self, X: &Array2<f64>, y: &Array1<f64>) -> Result<()> {
        let n_samples = X.nrows();
        let n_features = X.ncols();

        if n_samples == 0 || n_features == 0 {
            return Err(BiError::Training("Empty dataset".to_string()));
        }
        if y.len() != n_samples {
            return Err(BiError::Training(format!(
                "Target has {} values, features have {} rows",
                y.len(),
                n_samples
            )));
        }

        let x_mean = X
            .mean_axis(Axis(0))
            .ok_or_else(|| BiError::Training("Failed to compute feature means".to_string()))?;
        let y_mean = y.sum() / n_samples as f64;

        let mut Xc = X - &x_mean;
        let yc = y.mapv(|v| v - y_mean);

        // Признак без разброса (с точностью до округления) в решении не участвует
        for j in 0..n_features {
            let raw_ss = X.column(j).mapv(|v| v * v).sum();
            let centered_ss = Xc.column(j).mapv(|v| v * v).sum();
            if centered_ss <= 1e-24 * raw_ss {
                Xc.column_mut(j).fill(0.0);
            }
        }

        let mut xtx = Xc.t().dot(&Xc);
        for i in 0..n_features {
            xtx[[i, i]] += self.alpha;
        }
        let xty = Xc.t().dot(&yc);

        let weights = Self::solve_linear_system(&xtx, &xty);
        self.intercept = y_mean - x_mean.dot(&weights);
        self.coefficients = Some(weights);

        Ok(())
    }

    fn predict(&self, X: &Array2<f64>) -> Result<Array1<f64>> {
        let weights = self
            .coefficients
            .as_ref()
            .ok_or_else(|| BiError::Training("Model not trained".to_string()))?;

        if X.ncols() != weights.len() {
            return Err(BiError::Training(format!(
                "Expected {} features, got {}",
                weights.len(),
                X.ncols()
            )));
        }

        Ok(X.dot(weights) + self.intercept)
    }
}

impl Default for LinearRegression {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use ndarray::array;

    #[test]
    fn test_recovers_exact_line() {
        let X = array![[1.0, 0.0], [2.0, 1.0], [3.0, 0.0], [4.0, 1.0], [5.0, 3.0]];
        let y = X.column(0).mapv(|v| 2.0 * v) + X.column(1).mapv(|v| -1.0 * v) + 3.0;

        let mut model = LinearRegression::new();
        model.fit(&X, &y).unwrap();

        let coef = model.coefficients().unwrap();
        assert!((coef[0] - 2.0).abs() < 1e-9);
        assert!((coef[1] + 1.0).abs() < 1e-9);
        assert!((model.intercept() - 3.0).abs() < 1e-9);

        let pred = model.predict(&array![[10.0, 2.0]]).unwrap();
        assert!((pred[0] - 21.0).abs() < 1e-9);
    }

    #[test]
    fn test_constant_feature_gets_zero_weight() {
        let X = array![[1.0, 7.0], [2.0, 7.0], [3.0, 7.0], [4.0, 7.0]];
        let y = array![2.0, 4.0, 6.0, 8.0];

        let mut model = LinearRegression::new();
        model.fit(&X, &y).unwrap();

        let coef = model.coefficients().unwrap();
        assert!((coef[0] - 2.0).abs() < 1e-9);
        assert_eq!(coef[1], 0.0);
    }

    #[test]
    fn test_duplicated_feature_is_solvable() {
        let X = array![[1.0, 1.0], [2.0, 2.0], [3.0, 3.0]];
        let y = array![1.0, 2.0, 3.0];

        let mut model = LinearRegression::new();
        model.fit(&X, &y).unwrap();
        let pred = model.predict(&X).unwrap();
        for (p, t) in pred.iter().zip(y.iter()) {
            assert!((p - t).abs() < 1e-9);
        }
    }

    #[test]
    fn test_mixed_scale_features() {
        // Unix-секунды рядом с малыми количествами: оба признака сохраняют вес
        let n = 100;
        let X = Array2::from_shape_fn((n, 2), |(i, j)| {
            if j == 0 {
                1_704_067_200.0 + 86_400.0 * i as f64
            } else {
                (i % 10 + 1) as f64
            }
        });
        let y = X.column(1).mapv(|q| 5.0 * q + 2.0);

        let mut model = LinearRegression::new();
        model.fit(&X, &y).unwrap();

        let coef = model.coefficients().unwrap();
        assert!((coef[1] - 5.0).abs() < 1e-6);
        assert!(coef[0].abs() < 1e-9);

        let pred = model.predict(&X).unwrap();
        for (p, t) in pred.iter().zip(y.iter()) {
            assert!((p - t).abs() < 1e-4);
        }
    }

    #[test]
    fn test_nearly_constant_feature_gets_zero_weight() {
        let X = array![[1.0, 0.1], [2.0, 0.1], [3.0, 0.1], [4.0, 0.1], [5.0, 0.1], [6.0, 0.1], [7.0, 0.1]];
        let y = X.column(0).mapv(|v| 3.0 * v - 1.0);

        let mut model = LinearRegression::new();
        model.fit(&X, &y).unwrap();

        let coef = model.coefficients().unwrap();
        assert_eq!(coef[1], 0.0);
        assert!((coef[0] - 3.0).abs() < 1e-9);
    }

    #[test]
    fn test_predict_before_fit_fails() {
        let model = LinearRegression::new();
        assert!(model.predict(&array![[1.0]]).is_err());
    }
}
