use nalgebra::{DMatrix, DVector};
use tracing::trace;

use super::{LinAlgError, LinAlgResult};

/// Output of eliminating the leading `frontal_dim` columns of `[A | b]`.
///
/// The frontal rows satisfy `R x_F + S x_S = d` with `R` upper triangular
/// and a strictly positive diagonal. The remaining rows `[A_rem | b_rem]`
/// are the whitened system left on the separator after the frontals are
/// marginalized out.
#[derive(Debug, Clone)]
pub struct PartialElimination {
    pub r: DMatrix<f64>,
    pub s: DMatrix<f64>,
    pub d: DVector<f64>,
    pub a_rem: DMatrix<f64>,
    pub b_rem: DVector<f64>,
}

impl PartialElimination {
    /// `ln |det R|`
    pub fn log_det_r(&self) -> f64 {
        self.r.diagonal().iter().map(|v| v.abs().ln()).sum()
    }
}

/// Dense partial QR of an augmented system.
///
/// `ab` holds the frontal columns first, then the separator columns, then
/// `b` as the last column. Pivots with magnitude at or below
/// `tolerance * max |A_F|` are reported as singular, so the check does not
/// depend on the units of the whitened system.
pub fn eliminate_augmented(
    ab: &DMatrix<f64>,
    frontal_dim: usize,
    tolerance: f64,
) -> LinAlgResult<PartialElimination> {
    let rows = ab.nrows();
    let cols = ab.ncols();
    if cols == 0 || frontal_dim + 1 > cols {
        return Err(LinAlgError::InvalidInput(format!(
            "augmented matrix with {cols} columns cannot eliminate {frontal_dim} frontal columns"
        )));
    }
    if rows < frontal_dim {
        return Err(LinAlgError::SingularMatrix(format!(
            "{rows} rows constrain {frontal_dim} frontal dimensions"
        )));
    }
    let separator_dim = cols - 1 - frontal_dim;

    let scale = ab
        .columns(0, frontal_dim)
        .iter()
        .fold(0.0_f64, |acc, v| acc.max(v.abs()));
    if scale == 0.0 {
        return Err(LinAlgError::SingularMatrix(
            "frontal columns are identically zero".to_string(),
        ));
    }
    let threshold = tolerance * scale;

    let mut r_full = ab.clone().qr().r();
    for i in 0..frontal_dim {
        let pivot = r_full[(i, i)];
        if !pivot.is_finite() || pivot.abs() <= threshold {
            return Err(LinAlgError::SingularMatrix(format!(
                "pivot {i} is {pivot:e}, threshold {threshold:e}"
            )));
        }
        if pivot < 0.0 {
            let mut row = r_full.row_mut(i);
            row.neg_mut();
        }
    }

    let remaining = r_full.nrows() - frontal_dim;
    trace!(
        "partial QR: {rows}x{cols}, frontal {frontal_dim}, separator {separator_dim}, {remaining} residual rows"
    );

    Ok(PartialElimination {
        r: r_full.view((0, 0), (frontal_dim, frontal_dim)).into_owned(),
        s: r_full
            .view((0, frontal_dim), (frontal_dim, separator_dim))
            .into_owned(),
        d: r_full.view((0, cols - 1), (frontal_dim, 1)).column(0).into_owned(),
        a_rem: r_full
            .view((frontal_dim, frontal_dim), (remaining, separator_dim))
            .into_owned(),
        b_rem: r_full
            .view((frontal_dim, cols - 1), (remaining, 1))
            .column(0)
            .into_owned(),
    })
}
