use crate::elements::{Element, ELEMENT_COUNT};
use crate::prelude::{XrfError, XrfResult};
use ndarray::{Array2, Array3};
use std::sync::{Arc, OnceLock};

/// Primary influence coefficients `a_ij` of the Fe analyte row.
const FE_PRIMARY: [f64; ELEMENT_COUNT] = [
    0.0000, -0.5588, -0.4261, -0.2820, -0.1143, 0.0741, 0.2772, 0.9789, 1.2330, 1.8293, 2.5307,
    -0.1026, 0.0000,
];

/// Secondary influence coefficients `a_ijj` of the Fe analyte row.
const FE_SECONDARY: [f64; ELEMENT_COUNT] = [
    0.0000, -0.0361, -0.0497, -0.0642, -0.0804, -0.0979, -0.1155, -0.1687, -0.1852, -0.2196,
    -0.2515, 0.0000, 0.0000,
];

/// Ternary cross coefficients `a_jk` for each unordered pair of influencing elements.
const TERNARY_PAIRS: [(Element, Element, f64); 66] = {
    use Element::*;
    [
        (O, Na, 0.0000),
        (O, Mg, 0.0000),
        (O, Al, 0.0000),
        (O, Si, 0.0000),
        (O, P, 0.0000),
        (O, S, 0.0000),
        (O, K, 0.0000),
        (O, Ca, 0.0000),
        (O, Ti, 0.0000),
        (O, Cr, 0.0000),
        (O, Mn, 0.0000),
        (Na, Mg, 0.0005),
        (Na, Al, 0.0018),
        (Na, Si, 0.0038),
        (Na, P, 0.0063),
        (Na, S, 0.0089),
        (Na, K, 0.0171),
        (Na, Ca, 0.0196),
        (Na, Ti, 0.0245),
        (Na, Cr, 0.0291),
        (Na, Mn, 0.0361),
        (Mg, Al, 0.0004),
        (Mg, Si, 0.0015),
        (Mg, P, 0.0032),
        (Mg, S, 0.0053),
        (Mg, K, 0.0120),
        (Mg, Ca, 0.0142),
        (Mg, Ti, 0.0186),
        (Mg, Cr, 0.0227),
        (Mg, Mn, 0.0497),
        (Al, Si, 0.0004),
        (Al, P, 0.0014),
        (Al, S, 0.0028),
        (Al, K, 0.0082),
        (Al, Ca, 0.0100),
        (Al, Ti, 0.0139),
        (Al, Cr, 0.0176),
        (Al, Mn, 0.0638),
        (Si, P, 0.0003),
        (Si, S, 0.0011),
        (Si, K, 0.0052),
        (Si, Ca, 0.0067),
        (Si, Ti, 0.0100),
        (Si, Cr, 0.0133),
        (Si, Mn, 0.0792),
        (P, S, 0.0003),
        (P, K, 0.0030),
        (P, Ca, 0.0042),
        (P, Ti, 0.0069),
        (P, Cr, 0.0097),
        (P, Mn, 0.0952),
        (S, K, 0.0015),
        (S, Ca, 0.0024),
        (S, Ti, 0.0046),
        (S, Cr, 0.0070),
        (S, Mn, 0.1107),
        (K, Ca, 0.0001),
        (K, Ti, 0.0009),
        (K, Cr, 0.0021),
        (K, Mn, 0.1537),
        (Ca, Ti, 0.0004),
        (Ca, Cr, 0.0013),
        (Ca, Mn, 0.1661),
        (Ti, Cr, 0.0003),
        (Ti, Mn, 0.1902),
        (Cr, Mn, 0.2123),
    ]
};

/// Matrix-effect interaction tables indexed by [`Element::index`].
///
/// Built once and shared read-only; nothing mutates the tables after
/// construction.
#[derive(Debug, Clone, PartialEq)]
pub struct CoefficientTensors {
    primary: Array2<f64>,
    secondary: Array2<f64>,
    ternary: Array3<f64>,
}

static REFERENCE: OnceLock<Arc<CoefficientTensors>> = OnceLock::new();

impl CoefficientTensors {
    /// Builds the published reference tables.
    pub fn reference() -> Self {
        let n = ELEMENT_COUNT;
        let fe = Element::Fe.index();

        let mut primary = Array2::zeros((n, n));
        let mut secondary = Array2::zeros((n, n));
        for j in 0..n {
            primary[[fe, j]] = FE_PRIMARY[j];
            secondary[[fe, j]] = FE_SECONDARY[j];
        }

        // The pair table describes the joint effect of j and k, identical for
        // every analyte i and symmetric in (j, k).
        let mut ternary = Array3::zeros((n, n, n));
        for &(first, second, value) in TERNARY_PAIRS.iter() {
            let (j, k) = (first.index(), second.index());
            for i in 0..n {
                ternary[[i, j, k]] = value;
                ternary[[i, k, j]] = value;
            }
        }

        Self {
            primary,
            secondary,
            ternary,
        }
    }

    /// Process-wide reference tables, built on first use.
    pub fn shared() -> Arc<CoefficientTensors> {
        REFERENCE
            .get_or_init(|| Arc::new(CoefficientTensors::reference()))
            .clone()
    }

    /// Assembles custom tables after checking shapes and (j, k) symmetry.
    pub fn from_parts(
        primary: Array2<f64>,
        secondary: Array2<f64>,
        ternary: Array3<f64>,
    ) -> XrfResult<Self> {
        let n = primary.nrows();
        if primary.dim() != (n, n) {
            return Err(XrfError::LengthMismatch {
                context: "primary coefficient columns".into(),
                expected: n,
                actual: primary.ncols(),
            });
        }
        if secondary.dim() != (n, n) {
            return Err(XrfError::LengthMismatch {
                context: "secondary coefficient table".into(),
                expected: n,
                actual: secondary.nrows(),
            });
        }
        if ternary.dim() != (n, n, n) {
            return Err(XrfError::LengthMismatch {
                context: "ternary coefficient table".into(),
                expected: n,
                actual: ternary.dim().0,
            });
        }
        if primary.iter().chain(secondary.iter()).chain(ternary.iter()).any(|v| !v.is_finite()) {
            return Err(XrfError::InvalidConfig(
                "coefficient tables must be finite".into(),
            ));
        }
        for i in 0..n {
            for j in 0..n {
                for k in (j + 1)..n {
                    if ternary[[i, j, k]] != ternary[[i, k, j]] {
                        return Err(XrfError::InvalidConfig(format!(
                            "ternary table is not symmetric at ({i}, {j}, {k})"
                        )));
                    }
                }
            }
        }
        Ok(Self {
            primary,
            secondary,
            ternary,
        })
    }

    /// Number of elements indexed by the tables.
    pub fn len(&self) -> usize {
        self.primary.nrows()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn primary(&self, i: usize, j: usize) -> f64 {
        self.primary[[i, j]]
    }

    pub fn secondary(&self, i: usize, j: usize) -> f64 {
        self.secondary[[i, j]]
    }

    pub fn ternary(&self, i: usize, j: usize, k: usize) -> f64 {
        self.ternary[[i, j, k]]
    }
}

impl Default for CoefficientTensors {
    fn default() -> Self {
        Self::reference()
    }
}
