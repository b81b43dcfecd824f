//! Метрики качества регрессии

use ndarray::Array1;

use crate::error::{BiError, Result};
use crate::types::RegressionMetrics;

fn check_lengths(y_true: &Array1<f64>, y_pred: &Array1<f64>) -> Result<()> {
    if y_true.is_empty() {
        return Err(BiError::InsufficientData("No samples to evaluate".to_string()));
    }
    if y_true.len() != y_pred.len() {
        return Err(BiError::Training(format!(
            "Prediction length {} does not match target length {}",
            y_pred.len(),
            y_true.len()
        )));
    }
    Ok(())
}

pub fn mean_absolute_error(y_true: &Array1<f64>, y_pred: &Array1<f64>) -> Result<f64> {
    check_lengths(y_true, y_pred)?;
    Ok((y_true - y_pred).mapv(f64::abs).sum() / y_true.len() as f64)
}

pub fn mean_squared_error(y_true: &Array1<f64>, y_pred: &Array1<f64>) -> Result<f64> {
    check_lengths(y_true, y_pred)?;
    Ok((y_true - y_pred).mapv(|e| e * e).sum() / y_true.len() as f64)
}

/// sqrt(MSE); отрицательный ноль и погрешности ниже нуля обрезаются
pub fn root_mean_squared_error(y_true: &Array1<f64>, y_pred: &Array1<f64>) -> Result<f64> {
    Ok(mean_squared_error(y_true, y_pred)?.max(0.0).sqrt())
}

/// Коэффициент детерминации. Для константной истины: 1.0 при точном
/// совпадении, иначе 0.0.
pub fn r2_score(y_true: &Array1<f64>, y_pred: &Array1<f64>) -> Result<f64> {
    check_lengths(y_true, y_pred)?;
    let mean = y_true.sum() / y_true.len() as f64;
    let ss_res: f64 = (y_true - y_pred).mapv(|e| e * e).sum();
    let ss_tot: f64 = y_true.mapv(|v| (v - mean).powi(2)).sum();

    if ss_tot == 0.0 {
        return Ok(if ss_res == 0.0 { 1.0 } else { 0.0 });
    }
    Ok(1.0 - ss_res / ss_tot)
}

pub fn evaluate(y_true: &Array1<f64>, y_pred: &Array1<f64>) -> Result<RegressionMetrics> {
    Ok(RegressionMetrics {
        mae: mean_absolute_error(y_true, y_pred)?,
        rmse: root_mean_squared_error(y_true, y_pred)?,
        r2: r2_score(y_true, y_pred)?,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use ndarray::array;

    #[test]
    fn test_known_values() {
        let y_true = array![3.0, -0.5, 2.0, 7.0];
        let y_pred = array![2.5, 0.0, 2.0, 8.0];

        let m = evaluate(&y_true, &y_pred).unwrap();
        assert!((m.mae - 0.5).abs() < 1e-12);
        assert!((m.rmse - 0.375f64.sqrt()).abs() < 1e-12);
        assert!((m.r2 - 0.9486081370449679).abs() < 1e-12);
    }

    #[test]
    fn test_perfect_prediction() {
        let y = array![1.0, 2.0, 3.0];
        let m = evaluate(&y, &y).unwrap();
        assert_eq!(m.mae, 0.0);
        assert_eq!(m.rmse, 0.0);
        assert!(m.rmse.is_sign_positive());
        assert_eq!(m.r2, 1.0);
    }

    #[test]
    fn test_constant_truth_r2() {
        let y = array![4.0, 4.0];
        assert_eq!(r2_score(&y, &array![4.0, 4.0]).unwrap(), 1.0);
        assert_eq!(r2_score(&y, &array![3.0, 5.0]).unwrap(), 0.0);
    }

    #[test]
    fn test_length_mismatch_is_error() {
        assert!(evaluate(&array![1.0, 2.0], &array![1.0]).is_err());
        assert!(evaluate(&Array1::zeros(0), &Array1::zeros(0)).is_err());
    }
}
