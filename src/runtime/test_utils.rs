//! Test utilities for runtime testing
//!
//! A fluent builder that wraps a list of instructions into a
//! single-function module, instantiates it in a fresh store, and runs
//! it through the executor. Used by the runtime unit tests; keeps the
//! module plumbing out of the tests themselves.
