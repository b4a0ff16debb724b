use super::{Kernel, KernelError};
use nalgebra::DVector;
use std::fmt;

#[cfg(feature = "serde1")]
use serde::{Deserialize, Serialize};

/// Kernel representing the sum of two other kernels
#[derive(Debug, Clone, PartialEq, Eq)]
#[cfg_attr(feature = "serde1", derive(Serialize, Deserialize))]
pub struct AddKernel<A, B>
where
    A: Kernel,
    B: Kernel,
{
    a: A,
    b: B,
}

impl<A, B, C> std::ops::Mul<C> for AddKernel<A, B>
where
    A: Kernel,
    B: Kernel,
    C: Kernel,
{
    type Output = ProductKernel<Self, C>;

    fn mul(self, rhs: C) -> Self::Output {
        ProductKernel::new(self, rhs)
    }
}

impl<A, B, C> std::ops::Add<C> for AddKernel<A, B>
where
    A: Kernel,
    B: Kernel,
    C: Kernel,
{
    type Output = AddKernel<Self, C>;

    fn add(self, rhs: C) -> Self::Output {
        AddKernel::new(self, rhs)
    }
}

impl<A, B> AddKernel<A, B>
where
    A: Kernel,
    B: Kernel,
{
    /// Construct a new Kernel from two other Kernels
    pub fn new(a: A, b: B) -> Self {
        Self { a, b }
    }
}

impl<A: Kernel, B: Kernel> fmt::Display for AddKernel<A, B> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "CovSum({}, {})", self.a, self.b)
    }
}

impl<A, B> Kernel for AddKernel<A, B>
where
    A: Kernel,
    B: Kernel,
{
    fn n_parameters(&self) -> usize {
        self.a.n_parameters() + self.b.n_parameters()
    }

    fn covariance(&self, x1: &[f64], x2: &[f64]) -> f64 {
        self.a.covariance(x1, x2) + self.b.covariance(x1, x2)
    }

    fn variance(&self, x: &[f64]) -> f64 {
        self.a.variance(x) + self.b.variance(x)
    }

    fn parameters(&self) -> DVector<f64> {
        let a = self.a.parameters();
        let b = self.b.parameters();
        DVector::from_iterator(a.len() + b.len(), a.iter().chain(b.iter()).copied())
    }

    fn reparameterize(&self, params: &[f64]) -> Result<Self, KernelError> {
        let (a, b_params) = self.a.consume_parameters(params)?;
        let b = self.b.reparameterize(b_params)?;
        Ok(Self::new(a, b))
    }

    fn consume_parameters<'p>(
        &self,
        params: &'p [f64],
    ) -> Result<(Self, &'p [f64]), KernelError> {
        let (a, b_params) = self.a.consume_parameters(params)?;
        let (b, left) = self.b.consume_parameters(b_params)?;
        Ok((Self::new(a, b), left))
    }

    fn gradient_into(&self, x1: &[f64], x2: &[f64], grad: &mut [f64]) {
        let (ga, gb) = grad.split_at_mut(self.a.n_parameters());
        self.a.gradient_into(x1, x2, ga);
        self.b.gradient_into(x1, x2, gb);
    }

    fn variance_gradient_into(&self, x: &[f64], grad: &mut [f64]) {
        let (ga, gb) = grad.split_at_mut(self.a.n_parameters());
        self.a.variance_gradient_into(x, ga);
        self.b.variance_gradient_into(x, gb);
    }
}

/// Kernel representing the product of two other kernels
#[derive(Clone, Debug, PartialEq)]
#[cfg_attr(feature = "serde1", derive(Serialize, Deserialize))]
pub struct ProductKernel<A, B>
where
    A: Kernel,
    B: Kernel,
{
    a: A,
    b: B,
}

impl<A, B> ProductKernel<A, B>
where
    A: Kernel,
    B: Kernel,
{
    /// Construct a new Kernel from two other Kernels
    pub fn new(a: A, b: B) -> Self {
        Self { a, b }
    }
}

impl<A, B, C> std::ops::Mul<C> for ProductKernel<A, B>
where
    A: Kernel,
    B: Kernel,
    C: Kernel,
{
    type Output = ProductKernel<Self, C>;

    fn mul(self, rhs: C) -> Self::Output {
        ProductKernel::new(self, rhs)
    }
}

impl<A, B, C> std::ops::Add<C> for ProductKernel<A, B>
where
    A: Kernel,
    B: Kernel,
    C: Kernel,
{
    type Output = AddKernel<Self, C>;

    fn add(self, rhs: C) -> Self::Output {
        AddKernel::new(self, rhs)
    }
}

impl<A: Kernel, B: Kernel> fmt::Display for ProductKernel<A, B> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "CovProd({}, {})", self.a, self.b)
    }
}

impl<A, B> Kernel for ProductKernel<A, B>
where
    A: Kernel,
    B: Kernel,
{
    fn n_parameters(&self) -> usize {
        self.a.n_parameters() + self.b.n_parameters()
    }

    fn covariance(&self, x1: &[f64], x2: &[f64]) -> f64 {
        self.a.covariance(x1, x2) * self.b.covariance(x1, x2)
    }

    fn variance(&self, x: &[f64]) -> f64 {
        self.a.variance(x) * self.b.variance(x)
    }

    fn parameters(&self) -> DVector<f64> {
        let a = self.a.parameters();
        let b = self.b.parameters();
        DVector::from_iterator(a.len() + b.len(), a.iter().chain(b.iter()).copied())
    }

    fn reparameterize(&self, param_vec: &[f64]) -> Result<Self, KernelError> {
        let (a, b_params) = self.a.consume_parameters(param_vec)?;
        let b = self.b.reparameterize(b_params)?;
        Ok(Self::new(a, b))
    }

    fn consume_parameters<'p>(
        &self,
        param_vec: &'p [f64],
    ) -> Result<(Self, &'p [f64]), KernelError> {
        let (a, b_params) = self.a.consume_parameters(param_vec)?;
        let (b, left) = self.b.consume_parameters(b_params)?;
        Ok((Self::new(a, b), left))
    }

    fn gradient_into(&self, x1: &[f64], x2: &[f64], grad: &mut [f64]) {
        let ka = self.a.covariance(x1, x2);
        let kb = self.b.covariance(x1, x2);
        let (ga, gb) = grad.split_at_mut(self.a.n_parameters());
        self.a.gradient_into(x1, x2, ga);
        self.b.gradient_into(x1, x2, gb);
        ga.iter_mut().for_each(|g| *g *= kb);
        gb.iter_mut().for_each(|g| *g *= ka);
    }

    fn variance_gradient_into(&self, x: &[f64], grad: &mut [f64]) {
        let ka = self.a.variance(x);
        let kb = self.b.variance(x);
        let (ga, gb) = grad.split_at_mut(self.a.n_parameters());
        self.a.variance_gradient_into(x, ga);
        self.b.variance_gradient_into(x, gb);
        ga.iter_mut().for_each(|g| *g *= kb);
        gb.iter_mut().for_each(|g| *g *= ka);
    }
}
