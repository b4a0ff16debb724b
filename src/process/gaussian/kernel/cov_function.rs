//! Runtime covariance trees built from specification strings such as
//! `"CovSum(CovSEiso, CovNoise)"`.
use super::{
    AddKernel, CompactRBFKernel, ExpSineSquaredKernel, InputDimFilter, Kernel,
    KernelError, LinearArdKernel, LinearKernel, Matern3Kernel, Matern5Kernel,
    PeriodicMatern3Kernel, ProductKernel, RBFKernel, RationalQuadratic,
    SEardKernel, WhiteKernel,
};
use nalgebra::DVector;
use std::fmt;

#[cfg(feature = "serde1")]
use serde::{Deserialize, Serialize};

const NAMES: [&str; 14] = [
    "CovSEiso",
    "CovSEard",
    "CovNoise",
    "CovLinearone",
    "CovLinearard",
    "CovMatern3iso",
    "CovMatern5iso",
    "CovRQiso",
    "CovPeriodic",
    "CovPeriodicMatern3iso",
    "CovRBFCS",
    "CovSum",
    "CovProd",
    "InputDimFilter",
];

/// A covariance function chosen at runtime
///
/// Leaves wrap the concrete kernels; `Sum`, `Prod` and `Filter` own their
/// children. Hyperparameters are laid out depth first, left to right.
#[derive(Clone, Debug, PartialEq)]
#[cfg_attr(feature = "serde1", derive(Serialize, Deserialize))]
#[cfg_attr(feature = "serde1", serde(rename_all = "snake_case"))]
pub enum CovFunction {
    /// Isotropic squared exponential
    SEiso(RBFKernel),
    /// Squared exponential with a length-scale per dimension
    SEard(SEardKernel),
    /// Independent noise
    Noise(WhiteKernel),
    /// Linear with bias and one scale
    LinearOne(LinearKernel),
    /// Linear with a scale per dimension
    LinearArd(LinearArdKernel),
    /// Matérn 3/2
    Matern3(Matern3Kernel),
    /// Matérn 5/2
    Matern5(Matern5Kernel),
    /// Rational quadratic
    RQiso(RationalQuadratic),
    /// Periodic
    Periodic(ExpSineSquaredKernel),
    /// Periodic Matérn 3/2
    PeriodicMatern3(PeriodicMatern3Kernel),
    /// Squared exponential with compact support
    RBFCS(CompactRBFKernel),
    /// Sum of two covariance functions
    Sum(Box<AddKernel<CovFunction, CovFunction>>),
    /// Product of two covariance functions
    Prod(Box<ProductKernel<CovFunction, CovFunction>>),
    /// A covariance function acting on a single input coordinate
    Filter(Box<InputDimFilter<CovFunction>>),
}

macro_rules! dispatch {
    ($self: expr, $k: ident => $body: expr) => {
        match $self {
            CovFunction::SEiso($k) => $body,
            CovFunction::SEard($k) => $body,
            CovFunction::Noise($k) => $body,
            CovFunction::LinearOne($k) => $body,
            CovFunction::LinearArd($k) => $body,
            CovFunction::Matern3($k) => $body,
            CovFunction::Matern5($k) => $body,
            CovFunction::RQiso($k) => $body,
            CovFunction::Periodic($k) => $body,
            CovFunction::PeriodicMatern3($k) => $body,
            CovFunction::RBFCS($k) => $body,
            CovFunction::Sum($k) => $body,
            CovFunction::Prod($k) => $body,
            CovFunction::Filter($k) => $body,
        }
    };
}

macro_rules! rewrap {
    ($self: expr, $k: ident => $body: expr) => {
        match $self {
            CovFunction::SEiso($k) => CovFunction::SEiso($body),
            CovFunction::SEard($k) => CovFunction::SEard($body),
            CovFunction::Noise($k) => CovFunction::Noise($body),
            CovFunction::LinearOne($k) => CovFunction::LinearOne($body),
            CovFunction::LinearArd($k) => CovFunction::LinearArd($body),
            CovFunction::Matern3($k) => CovFunction::Matern3($body),
            CovFunction::Matern5($k) => CovFunction::Matern5($body),
            CovFunction::RQiso($k) => CovFunction::RQiso($body),
            CovFunction::Periodic($k) => CovFunction::Periodic($body),
            CovFunction::PeriodicMatern3($k) => {
                CovFunction::PeriodicMatern3($body)
            }
            CovFunction::RBFCS($k) => CovFunction::RBFCS($body),
            CovFunction::Sum($k) => CovFunction::Sum(Box::new($body)),
            CovFunction::Prod($k) => CovFunction::Prod(Box::new($body)),
            CovFunction::Filter($k) => CovFunction::Filter(Box::new($body)),
        }
    };
}

impl CovFunction {
    /// Build a covariance tree for `input_dim`-dimensional inputs from its
    /// textual specification. Whitespace is ignored and every
    /// hyperparameter starts at zero in log-space.
    ///
    /// # Example
    ///
    /// ```
    /// use gpr::process::gaussian::kernel::{CovFunction, Kernel};
    ///
    /// let cov = CovFunction::parse(2, "CovSum ( CovSEard, CovNoise )").unwrap();
    /// assert_eq!(cov.n_parameters(), 4);
    /// assert_eq!(cov.to_string(), "CovSum(CovSEard, CovNoise)");
    /// ```
    pub fn parse(input_dim: usize, spec: &str) -> Result<Self, KernelError> {
        if input_dim == 0 {
            return Err(KernelError::ZeroInputDimension);
        }
        let compact: String =
            spec.chars().filter(|c| !c.is_whitespace()).collect();
        Parser {
            spec,
            input_dim,
        }
        .node(&compact)
    }

    /// Names accepted by [`CovFunction::parse`]
    #[must_use]
    pub fn names() -> &'static [&'static str] {
        &NAMES
    }

    /// Sum of two covariance functions
    #[must_use]
    pub fn sum(a: Self, b: Self) -> Self {
        Self::Sum(Box::new(AddKernel::new(a, b)))
    }

    /// Product of two covariance functions
    #[must_use]
    pub fn prod(a: Self, b: Self) -> Self {
        Self::Prod(Box::new(ProductKernel::new(a, b)))
    }
}

struct Parser<'s> {
    spec: &'s str,
    input_dim: usize,
}

impl Parser<'_> {
    fn syntax(&self, reason: impl Into<String>) -> KernelError {
        KernelError::Syntax {
            spec: self.spec.to_string(),
            reason: reason.into(),
        }
    }

    fn node(&self, s: &str) -> Result<CovFunction, KernelError> {
        if s.is_empty() {
            return Err(self.syntax("empty covariance function"));
        }

        let Some(open) = s.find('(') else {
            if s.contains([')', ',', '/']) {
                return Err(self.syntax(format!("unexpected token in `{s}`")));
            }
            return self.leaf(s);
        };

        if !s.ends_with(')') {
            return Err(self.syntax(format!("`{s}` must end with `)`")));
        }
        let name = &s[..open];
        let body = &s[open + 1..s.len() - 1];
        if !balanced(body) {
            return Err(self.syntax(format!("unbalanced brackets in `{s}`")));
        }

        match name {
            "CovSum" | "CovProd" => {
                let (lhs, rhs) = split_top(body, ',')
                    .ok_or_else(|| self.syntax(format!("`{name}` takes two arguments")))?;
                if split_top(rhs, ',').is_some() {
                    return Err(self.syntax(format!("`{name}` takes two arguments")));
                }
                let a = self.node(lhs)?;
                let b = self.node(rhs)?;
                Ok(if name == "CovSum" {
                    CovFunction::sum(a, b)
                } else {
                    CovFunction::prod(a, b)
                })
            }
            "InputDimFilter" => {
                let (index, inner) = split_top(body, '/').ok_or_else(|| {
                    self.syntax("`InputDimFilter` takes `index/kernel`")
                })?;
                let dim: usize = index.parse().map_err(|_| {
                    self.syntax(format!("`{index}` is not an input dimension"))
                })?;
                let inner = Parser {
                    spec: self.spec,
                    input_dim: 1,
                }
                .node(inner)?;
                let filter = InputDimFilter::new(self.input_dim, dim, inner)?;
                Ok(CovFunction::Filter(Box::new(filter)))
            }
            _ if NAMES.contains(&name) => {
                Err(self.syntax(format!("`{name}` takes no arguments")))
            }
            _ => Err(KernelError::UnknownKernel(name.to_string())),
        }
    }

    fn leaf(&self, name: &str) -> Result<CovFunction, KernelError> {
        let d = self.input_dim;
        let cov = match name {
            "CovSEiso" => CovFunction::SEiso(RBFKernel::default()),
            "CovSEard" => CovFunction::SEard(SEardKernel::with_dim(d)),
            "CovNoise" => CovFunction::Noise(WhiteKernel::default()),
            "CovLinearone" => CovFunction::LinearOne(LinearKernel::default()),
            "CovLinearard" => {
                CovFunction::LinearArd(LinearArdKernel::with_dim(d))
            }
            "CovMatern3iso" => CovFunction::Matern3(Matern3Kernel::default()),
            "CovMatern5iso" => CovFunction::Matern5(Matern5Kernel::default()),
            "CovRQiso" => CovFunction::RQiso(RationalQuadratic::default()),
            "CovPeriodic" => {
                CovFunction::Periodic(ExpSineSquaredKernel::default())
            }
            "CovPeriodicMatern3iso" => {
                CovFunction::PeriodicMatern3(PeriodicMatern3Kernel::default())
            }
            "CovRBFCS" => CovFunction::RBFCS(CompactRBFKernel::default()),
            "CovSum" | "CovProd" | "InputDimFilter" => {
                return Err(self.syntax(format!("`{name}` needs arguments")))
            }
            _ => return Err(KernelError::UnknownKernel(name.to_string())),
        };
        Ok(cov)
    }
}

fn balanced(s: &str) -> bool {
    let mut depth = 0_i32;
    for c in s.chars() {
        match c {
            '(' => depth += 1,
            ')' => depth -= 1,
            _ => {}
        }
        if depth < 0 {
            return false;
        }
    }
    depth == 0
}

/// Split at the first `sep` outside of any brackets
fn split_top(s: &str, sep: char) -> Option<(&str, &str)> {
    let mut depth = 0_i32;
    for (i, c) in s.char_indices() {
        match c {
            '(' => depth += 1,
            ')' => depth -= 1,
            c if c == sep && depth == 0 => {
                return Some((&s[..i], &s[i + c.len_utf8()..]))
            }
            _ => {}
        }
    }
    None
}

impl fmt::Display for CovFunction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        dispatch!(self, k => fmt::Display::fmt(k, f))
    }
}

impl std::str::FromStr for CovFunction {
    type Err = KernelError;

    /// Parse a specification for one-dimensional inputs
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::parse(1, s)
    }
}

impl Kernel for CovFunction {
    fn n_parameters(&self) -> usize {
        dispatch!(self, k => k.n_parameters())
    }

    fn parameters(&self) -> DVector<f64> {
        dispatch!(self, k => k.parameters())
    }

    fn reparameterize(&self, params: &[f64]) -> Result<Self, KernelError> {
        Ok(rewrap!(self, k => k.reparameterize(params)?))
    }

    fn consume_parameters<'p>(
        &self,
        params: &'p [f64],
    ) -> Result<(Self, &'p [f64]), KernelError> {
        let mut rest = params;
        let cov = rewrap!(self, k => {
            let (k, r) = k.consume_parameters(rest)?;
            rest = r;
            k
        });
        Ok((cov, rest))
    }

    fn covariance(&self, x1: &[f64], x2: &[f64]) -> f64 {
        dispatch!(self, k => k.covariance(x1, x2))
    }

    fn variance(&self, x: &[f64]) -> f64 {
        dispatch!(self, k => k.variance(x))
    }

    fn gradient_into(&self, x1: &[f64], x2: &[f64], grad: &mut [f64]) {
        dispatch!(self, k => k.gradient_into(x1, x2, grad))
    }

    fn variance_gradient_into(&self, x: &[f64], grad: &mut [f64]) {
        dispatch!(self, k => k.variance_gradient_into(x, grad))
    }
}

macro_rules! impl_from {
    ($variant: ident, $type: ty) => {
        impl From<$type> for CovFunction {
            fn from(k: $type) -> Self {
                Self::$variant(k)
            }
        }
    };
}

impl_from!(SEiso, RBFKernel);
impl_from!(SEard, SEardKernel);
impl_from!(Noise, WhiteKernel);
impl_from!(LinearOne, LinearKernel);
impl_from!(LinearArd, LinearArdKernel);
impl_from!(Matern3, Matern3Kernel);
impl_from!(Matern5, Matern5Kernel);
impl_from!(RQiso, RationalQuadratic);
impl_from!(Periodic, ExpSineSquaredKernel);
impl_from!(PeriodicMatern3, PeriodicMatern3Kernel);
impl_from!(RBFCS, CompactRBFKernel);

impl std::ops::Add for CovFunction {
    type Output = Self;

    fn add(self, rhs: Self) -> Self::Output {
        Self::sum(self, rhs)
    }
}

impl std::ops::Mul for CovFunction {
    type Output = Self;

    fn mul(self, rhs: Self) -> Self::Output {
        Self::prod(self, rhs)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parse_leaves() {
        for name in &NAMES[..11] {
            let cov = CovFunction::parse(3, name).unwrap();
            assert_eq!(cov.to_string(), *name);
            assert_eq!(cov.parameters(), DVector::zeros(cov.n_parameters()));
        }
    }

    #[test]
    fn parameter_counts_follow_input_dim() {
        assert_eq!(CovFunction::parse(4, "CovSEard").unwrap().n_parameters(), 5);
        assert_eq!(
            CovFunction::parse(4, "CovLinearard").unwrap().n_parameters(),
            4
        );
        assert_eq!(
            CovFunction::parse(4, "CovSum(CovSEiso, CovNoise)")
                .unwrap()
                .n_parameters(),
            3
        );
    }

    #[test]
    fn display_round_trips() {
        let specs = [
            "CovSum(CovSEiso, CovNoise)",
            "CovProd(CovSum(CovSEard, CovLinearone), CovMatern5iso)",
            "CovSum(InputDimFilter(1/CovPeriodic), CovNoise)",
        ];
        for spec in specs {
            let cov = CovFunction::parse(2, spec).unwrap();
            assert_eq!(cov.to_string(), spec);
            assert_eq!(CovFunction::parse(2, &cov.to_string()).unwrap(), cov);
        }
    }

    #[test]
    fn whitespace_is_ignored() {
        let a = CovFunction::parse(2, " CovSum (CovSEiso ,\tCovNoise ) ").unwrap();
        let b = CovFunction::parse(2, "CovSum(CovSEiso,CovNoise)").unwrap();
        assert_eq!(a, b);
    }

    #[test]
    fn malformed_specifications() {
        assert_eq!(
            CovFunction::parse(2, "CovFoo"),
            Err(KernelError::UnknownKernel("CovFoo".into()))
        );
        for spec in [
            "",
            "CovSum(CovSEiso",
            "CovSum(CovSEiso)",
            "CovSum(CovSEiso, CovNoise, CovNoise)",
            "CovSEiso(CovNoise, CovNoise)",
            "CovSum",
            "CovSum(CovSEiso, CovNoise))",
            "InputDimFilter(x/CovSEiso)",
        ] {
            assert!(
                matches!(
                    CovFunction::parse(2, spec),
                    Err(KernelError::Syntax { .. })
                ),
                "{spec} should not parse"
            );
        }
        assert_eq!(
            CovFunction::parse(2, "InputDimFilter(2/CovSEiso)"),
            Err(KernelError::InvalidDimension {
                dim: 2,
                input_dim: 2
            })
        );
        assert_eq!(
            CovFunction::parse(0, "CovSEiso"),
            Err(KernelError::ZeroInputDimension)
        );
    }

    #[test]
    fn reparameterize_walks_the_tree() {
        let cov =
            CovFunction::parse(2, "CovSum(CovProd(CovSEiso, CovLinearone), CovNoise)")
                .unwrap();
        let params = [0.1, 0.2, 0.3, 0.4];
        let cov = cov.reparameterize(&params).unwrap();
        let out = cov.parameters();
        for (a, b) in params.iter().zip(out.iter()) {
            assert::close(*a, *b, 1E-12);
        }
        assert!(cov.reparameterize(&params[..3]).is_err());
        assert!(cov.reparameterize(&[0.0; 5]).is_err());
    }

    #[test]
    fn matches_static_composition() {
        let dynamic = CovFunction::parse(2, "CovSum(CovSEiso, CovNoise)")
            .unwrap()
            .reparameterize(&[0.3, -0.1, -2.0])
            .unwrap();
        let fixed = (RBFKernel::default() + WhiteKernel::default())
            .reparameterize(&[0.3, -0.1, -2.0])
            .unwrap();
        let x1 = [0.2, 0.4];
        let x2 = [1.0, -0.5];
        assert::close(dynamic.covariance(&x1, &x2), fixed.covariance(&x1, &x2), 1E-14);
        assert::close(dynamic.variance(&x1), fixed.variance(&x1), 1E-14);
        assert_eq!(dynamic.gradient(&x1, &x2), fixed.gradient(&x1, &x2));

        let built = CovFunction::from(RBFKernel::default())
            + CovFunction::from(WhiteKernel::default());
        assert_eq!(built.to_string(), "CovSum(CovSEiso, CovNoise)");
    }
}
