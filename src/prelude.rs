//! Re-imports for convenience
#[doc(no_inline)]
pub use crate::optim::{
    CgParams, ConjugateGradient, Maximizer, Optimum, RProp, RPropParams,
    SignChange,
};
#[doc(no_inline)]
pub use crate::process::gaussian::kernel::*;
#[doc(no_inline)]
pub use crate::process::gaussian::{
    FactorState, GaussianProcess, GaussianProcessParams, GpState, SampleSet,
};
#[doc(no_inline)]
pub use crate::process::{RandomProcess, RandomProcessMle};
#[doc(no_inline)]
pub use crate::result::GpError;
