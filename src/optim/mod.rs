//! Numerical optimizers used internally by the surrogate and the
//! acquisition optimizer.

pub(crate) mod lbfgs;
