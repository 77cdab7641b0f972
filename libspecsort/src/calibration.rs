use serde::{Deserialize, Serialize};

use super::constants::{INVERSE_MAX_ITERATIONS, INVERSE_TOLERANCE, MAX_CALIBRATION_TERMS};
use super::error::CalibrationError;

/// The functional form of a calibration.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum CalibrationKind {
    /// `E = a0 + a1*ch + a2*ch^2 + ...` with the given number of terms
    Polynomial(usize),
    /// `E = (a0 + a1*ch)^2`, typical for detectors where the channel scales with sqrt(E)
    SqrtEnergy,
}

/// CalibrationFunction maps a histogram channel to a physical value (typically energy).
///
/// A calibration is a pure function of the channel; it can be attached to a 1-D histogram
/// but histograms behave identically without one. Coefficients can be given directly or
/// obtained from a least squares fit to (channel, value) pairs.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CalibrationFunction {
    kind: CalibrationKind,
    coefficients: Vec<f64>,
    labels: Vec<String>,
}

impl CalibrationFunction {
    /// Create a polynomial calibration with `terms` coefficients, all zero
    pub fn polynomial(terms: usize) -> Result<Self, CalibrationError> {
        if terms == 0 || terms > MAX_CALIBRATION_TERMS {
            return Err(CalibrationError::BadTermCount(terms));
        }
        Ok(Self {
            kind: CalibrationKind::Polynomial(terms),
            coefficients: vec![0.0; terms],
            labels: (0..terms).map(|i| format!("a{i}")).collect(),
        })
    }

    /// `E = a0 + a1*ch`
    pub fn linear(a0: f64, a1: f64) -> Self {
        Self {
            kind: CalibrationKind::Polynomial(2),
            coefficients: vec![a0, a1],
            labels: vec![String::from("a0"), String::from("a1")],
        }
    }

    /// `E = (a + b*ch)^2`
    pub fn sqrt_energy(a: f64, b: f64) -> Self {
        Self {
            kind: CalibrationKind::SqrtEnergy,
            coefficients: vec![a, b],
            labels: vec![String::from("a"), String::from("b")],
        }
    }

    pub fn kind(&self) -> CalibrationKind {
        self.kind
    }

    pub fn number_of_terms(&self) -> usize {
        self.coefficients.len()
    }

    pub fn coefficients(&self) -> &[f64] {
        &self.coefficients
    }

    pub fn labels(&self) -> &[String] {
        &self.labels
    }

    /// Replace the coefficients. The count must match the number of terms.
    pub fn set_coefficients(&mut self, coefficients: &[f64]) -> Result<(), CalibrationError> {
        if coefficients.len() != self.coefficients.len() {
            return Err(CalibrationError::CoefficientCount(
                self.coefficients.len(),
                coefficients.len(),
            ));
        }
        self.coefficients.copy_from_slice(coefficients);
        Ok(())
    }

    /// Human readable form of the function, e.g. `E = a0 + a1*ch`
    pub fn formula(&self) -> String {
        match self.kind {
            CalibrationKind::SqrtEnergy => String::from("E = (a + b*ch)^2"),
            CalibrationKind::Polynomial(_) => {
                let terms: Vec<String> = self
                    .labels
                    .iter()
                    .enumerate()
                    .map(|(power, label)| match power {
                        0 => label.clone(),
                        1 => format!("{label}*ch"),
                        _ => format!("{label}*ch^{power}"),
                    })
                    .collect();
                format!("E = {}", terms.join(" + "))
            }
        }
    }

    /// Calibrated value at a (possibly fractional) channel
    pub fn value(&self, channel: f64) -> f64 {
        match self.kind {
            CalibrationKind::Polynomial(_) => horner(&self.coefficients, channel),
            CalibrationKind::SqrtEnergy => {
                let root = self.coefficients[0] + self.coefficients[1] * channel;
                root * root
            }
        }
    }

    /// Channel at which the function takes the given value.
    ///
    /// Closed form for linear and square-root forms. Higher order polynomials use Newton
    /// iteration started from the linear approximation.
    pub fn channel(&self, value: f64) -> Result<f64, CalibrationError> {
        match self.kind {
            CalibrationKind::SqrtEnergy => {
                let (a, b) = (self.coefficients[0], self.coefficients[1]);
                if value < 0.0 || b == 0.0 {
                    return Err(CalibrationError::NoInverse(value));
                }
                Ok((value.sqrt() - a) / b)
            }
            CalibrationKind::Polynomial(1) => Err(CalibrationError::NoInverse(value)),
            CalibrationKind::Polynomial(_) => {
                let (a0, a1) = (self.coefficients[0], self.coefficients[1]);
                let mut channel = if a1 != 0.0 { (value - a0) / a1 } else { 0.0 };
                if self.coefficients.len() == 2 {
                    return if a1 != 0.0 {
                        Ok(channel)
                    } else {
                        Err(CalibrationError::NoInverse(value))
                    };
                }
                let derivative = polynomial_derivative(&self.coefficients);
                for _ in 0..INVERSE_MAX_ITERATIONS {
                    let slope = horner(&derivative, channel);
                    if slope == 0.0 {
                        break;
                    }
                    let step = (horner(&self.coefficients, channel) - value) / slope;
                    channel -= step;
                    if step.abs() < INVERSE_TOLERANCE {
                        return Ok(channel);
                    }
                }
                Err(CalibrationError::NoInverse(value))
            }
        }
    }

    /// Least squares fit of the coefficients to (channel, value) pairs.
    ///
    /// Polynomials are fit through the normal equations. The square-root form is
    /// linearized by fitting `sqrt(E)` against the channel.
    pub fn fit(&mut self, channels: &[f64], values: &[f64]) -> Result<(), CalibrationError> {
        if channels.len() != values.len() {
            return Err(CalibrationError::MismatchedLengths(
                channels.len(),
                values.len(),
            ));
        }
        let terms = self.coefficients.len();
        if channels.len() < terms {
            return Err(CalibrationError::NotEnoughPoints(terms, channels.len()));
        }

        let coefficients = match self.kind {
            CalibrationKind::Polynomial(_) => least_squares(channels, values, terms)?,
            CalibrationKind::SqrtEnergy => {
                let mut roots = Vec::with_capacity(values.len());
                for value in values {
                    if *value < 0.0 {
                        return Err(CalibrationError::NegativeEnergy(*value));
                    }
                    roots.push(value.sqrt());
                }
                least_squares(channels, &roots, terms)?
            }
        };
        self.coefficients = coefficients;
        spdlog::debug!("Fit calibration {} to {} points", self.formula(), channels.len());
        Ok(())
    }
}

fn horner(coefficients: &[f64], x: f64) -> f64 {
    coefficients.iter().rev().fold(0.0, |acc, c| acc * x + c)
}

fn polynomial_derivative(coefficients: &[f64]) -> Vec<f64> {
    coefficients
        .iter()
        .enumerate()
        .skip(1)
        .map(|(power, c)| c * power as f64)
        .collect()
}

/// Solve the normal equations of a polynomial least squares fit with Gaussian elimination
fn least_squares(xs: &[f64], ys: &[f64], terms: usize) -> Result<Vec<f64>, CalibrationError> {
    // Augmented matrix [A | b], A[j][k] = sum x^(j+k), b[j] = sum y*x^j
    let mut matrix = vec![vec![0.0; terms + 1]; terms];
    for (x, y) in xs.iter().zip(ys) {
        let mut powers = vec![1.0; 2 * terms];
        for p in 1..powers.len() {
            powers[p] = powers[p - 1] * x;
        }
        for (j, row) in matrix.iter_mut().enumerate() {
            for k in 0..terms {
                row[k] += powers[j + k];
            }
            row[terms] += y * powers[j];
        }
    }

    for col in 0..terms {
        let pivot = (col..terms)
            .max_by(|a, b| matrix[*a][col].abs().total_cmp(&matrix[*b][col].abs()))
            .unwrap_or(col);
        if matrix[pivot][col].abs() < 1.0e-12 {
            return Err(CalibrationError::Singular);
        }
        matrix.swap(col, pivot);
        for row in (col + 1)..terms {
            let factor = matrix[row][col] / matrix[col][col];
            for k in col..=terms {
                matrix[row][k] -= factor * matrix[col][k];
            }
        }
    }

    let mut solution = vec![0.0; terms];
    for row in (0..terms).rev() {
        let tail: f64 = ((row + 1)..terms)
            .map(|k| matrix[row][k] * solution[k])
            .sum();
        solution[row] = (matrix[row][terms] - tail) / matrix[row][row];
    }
    Ok(solution)
}
