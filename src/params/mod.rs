//! Model parameters and the parameter store.
//!
//! Every scalar in a demographic model (population sizes, segment start
//! times, mixture fractions) lives in a [`ParamStore`] and is addressed
//! by an integer handle. Segments never hold values directly, so the whole
//! store can be rewritten by the optimizer (or duplicated per worker
//! thread) without touching the network.

mod expr;

pub use expr::{Expr, ExprError, Func};

use crate::errors::ParamError;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

/// Handle to a parameter in a [`ParamStore`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ParamId(usize);

impl ParamId {
    pub(crate) fn new(i: usize) -> Self {
        Self(i)
    }

    pub fn index(&self) -> usize {
        self.0
    }
}

/// What a parameter measures.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ParamKind {
    /// Diploid population size (2N).
    TwoN,
    /// Segment start time, in coalescent units.
    Time,
    /// Probability that a lineage ascends via the introgressor parent.
    MixFrac,
}

/// How a parameter may change during an optimization run.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ParamStatus {
    /// Held at its declared value.
    Fixed,
    /// Adjusted by the optimizer within its bounds.
    Free,
    /// Recomputed from other parameters after every `set_free`.
    Constrained,
}

/// One named scalar parameter.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Param {
    name: String,
    value: f64,
    low: f64,
    high: f64,
    kind: ParamKind,
    status: ParamStatus,
    constraint: Option<Expr>,
}

impl Param {
    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn value(&self) -> f64 {
        self.value
    }

    pub fn kind(&self) -> ParamKind {
        self.kind
    }

    pub fn status(&self) -> ParamStatus {
        self.status
    }

    pub fn bounds(&self) -> (f64, f64) {
        (self.low, self.high)
    }
}

/// Category-wide parameter bounds, used both to bound parameters at parse
/// time and to test feasibility of the network.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Bounds {
    pub lo_two_n: f64,
    pub hi_two_n: f64,
    pub lo_t: f64,
    pub hi_t: f64,
}

impl Default for Bounds {
    fn default() -> Self {
        Self {
            lo_two_n: 0.0,
            hi_two_n: 1e6,
            lo_t: 0.0,
            hi_t: 1e6,
        }
    }
}

impl Bounds {
    /// The `(low, high)` interval for a parameter of the given kind.
    pub fn for_kind(&self, kind: ParamKind) -> (f64, f64) {
        match kind {
            ParamKind::TwoN => (self.lo_two_n, self.hi_two_n),
            ParamKind::Time => (self.lo_t, self.hi_t),
            ParamKind::MixFrac => (0.0, 1.0),
        }
    }
}

/// Process-local collection of parameters with stable integer handles.
///
/// Duplication is `Clone`: handles are indices, so every cross-reference in
/// a duplicated network remains valid against the duplicate store.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ParamStore {
    params: Vec<Param>,
    by_name: HashMap<String, ParamId>,
    free: Vec<ParamId>,
    constrained: Vec<ParamId>,
}

impl ParamStore {
    pub fn new() -> Self {
        Self::default()
    }

    fn insert(&mut self, param: Param) -> Result<ParamId, ParamError> {
        if self.by_name.contains_key(&param.name) {
            return Err(ParamError::DuplicateName(param.name));
        }
        let id = ParamId(self.params.len());
        self.by_name.insert(param.name.clone(), id);
        match param.status {
            ParamStatus::Free => self.free.push(id),
            ParamStatus::Constrained => self.constrained.push(id),
            ParamStatus::Fixed => {}
        }
        self.params.push(param);
        Ok(id)
    }

    /// Add a fixed parameter. The value must lie within `(low, high)`.
    pub fn add_fixed(
        &mut self,
        name: impl Into<String>,
        value: f64,
        low: f64,
        high: f64,
        kind: ParamKind,
    ) -> Result<ParamId, ParamError> {
        self.add_with_status(name, value, low, high, kind, ParamStatus::Fixed)
    }

    /// Add a free parameter. The value must lie within `(low, high)`.
    pub fn add_free(
        &mut self,
        name: impl Into<String>,
        value: f64,
        low: f64,
        high: f64,
        kind: ParamKind,
    ) -> Result<ParamId, ParamError> {
        self.add_with_status(name, value, low, high, kind, ParamStatus::Free)
    }

    fn add_with_status(
        &mut self,
        name: impl Into<String>,
        value: f64,
        low: f64,
        high: f64,
        kind: ParamKind,
        status: ParamStatus,
    ) -> Result<ParamId, ParamError> {
        let name = name.into();
        if !(low <= value && value <= high) {
            return Err(ParamError::OutOfBounds {
                name,
                value,
                low,
                high,
            });
        }
        self.insert(Param {
            name,
            value,
            low,
            high,
            kind,
            status,
            constraint: None,
        })
    }

    /// Add a constrained parameter. The expression may reference only
    /// previously declared parameters; an undefined reference is fatal.
    pub fn add_constrained(
        &mut self,
        name: impl Into<String>,
        formula: &str,
        kind: ParamKind,
    ) -> Result<ParamId, ParamError> {
        let name = name.into();
        let expr = Expr::parse(formula, |n| self.by_name.get(n).copied()).map_err(
            |e| match e {
                ExprError::Undefined(reference) => ParamError::UndefinedReference {
                    name: name.clone(),
                    reference,
                },
                ExprError::Malformed(msg) => ParamError::BadExpression {
                    name: name.clone(),
                    msg,
                },
            },
        )?;
        let values: Vec<f64> = self.params.iter().map(|p| p.value).collect();
        let value = expr.eval(&values);
        self.insert(Param {
            name,
            value,
            low: f64::NEG_INFINITY,
            high: f64::INFINITY,
            kind,
            status: ParamStatus::Constrained,
            constraint: Some(expr),
        })
    }

    /// Current value of a parameter.
    pub fn value(&self, id: ParamId) -> f64 {
        self.params[id.0].value
    }

    /// The parameter behind a handle.
    pub fn param(&self, id: ParamId) -> &Param {
        &self.params[id.0]
    }

    /// Handle of the parameter with the given name.
    pub fn lookup(&self, name: &str) -> Option<ParamId> {
        self.by_name.get(name).copied()
    }

    /// Total number of parameters.
    pub fn len(&self) -> usize {
        self.params.len()
    }

    pub fn is_empty(&self) -> bool {
        self.params.is_empty()
    }

    /// Number of free parameters.
    pub fn n_free(&self) -> usize {
        self.free.len()
    }

    /// Current values of the free parameters, in declaration order.
    pub fn free_values(&self) -> Vec<f64> {
        self.free.iter().map(|&id| self.params[id.0].value).collect()
    }

    /// `(lower, upper)` bound vectors over the free parameters.
    pub fn free_bounds(&self) -> (Vec<f64>, Vec<f64>) {
        let lo = self.free.iter().map(|&id| self.params[id.0].low).collect();
        let hi = self.free.iter().map(|&id| self.params[id.0].high).collect();
        (lo, hi)
    }

    /// Overwrite the free parameters, then recompute every constrained
    /// parameter in declaration order. A constrained parameter that
    /// evaluates to a non-finite value yields `ParamError::NonFinite`,
    /// which callers treat as an infeasible parameter vector.
    pub fn set_free(&mut self, values: &[f64]) -> Result<(), ParamError> {
        if values.len() != self.free.len() {
            return Err(ParamError::FreeLenMismatch {
                expected: self.free.len(),
                got: values.len(),
            });
        }
        for (&id, &v) in self.free.iter().zip(values) {
            self.params[id.0].value = v;
        }
        self.recompute_constrained()
    }

    fn recompute_constrained(&mut self) -> Result<(), ParamError> {
        let mut values: Vec<f64> = self.params.iter().map(|p| p.value).collect();
        let mut failed: Option<String> = None;
        for &id in &self.constrained {
            if let Some(expr) = &self.params[id.0].constraint {
                let v = expr.eval(&values);
                values[id.0] = v;
                self.params[id.0].value = v;
                if !v.is_finite() && failed.is_none() {
                    failed = Some(self.params[id.0].name.clone());
                }
            }
        }
        match failed {
            Some(name) => Err(ParamError::NonFinite(name)),
            None => Ok(()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn store_with_constraint() -> ParamStore {
        let mut ps = ParamStore::new();
        ps.add_fixed("T0", 0.0, 0.0, 1e6, ParamKind::Time).unwrap();
        ps.add_free("Tc", 1.0, 0.0, 1e6, ParamKind::Time).unwrap();
        ps.add_free("N", 100.0, 0.0, 1e7, ParamKind::TwoN).unwrap();
        ps.add_constrained("Thalf", "Tc / 2", ParamKind::Time)
            .unwrap();
        ps
    }

    #[test]
    fn test_handles_are_stable() {
        let ps = store_with_constraint();
        let tc = ps.lookup("Tc").unwrap();
        assert_eq!(ps.value(tc), 1.0);
        assert_eq!(ps.param(tc).name(), "Tc");
        assert_eq!(ps.param(tc).status(), ParamStatus::Free);
    }

    #[test]
    fn test_duplicate_name_rejected() {
        let mut ps = store_with_constraint();
        assert!(matches!(
            ps.add_free("Tc", 2.0, 0.0, 1e6, ParamKind::Time),
            Err(ParamError::DuplicateName(_))
        ));
    }

    #[test]
    fn test_value_outside_bounds_rejected() {
        let mut ps = ParamStore::new();
        assert!(matches!(
            ps.add_free("N", -1.0, 0.0, 1e6, ParamKind::TwoN),
            Err(ParamError::OutOfBounds { .. })
        ));
    }

    #[test]
    fn test_undefined_reference_rejected() {
        let mut ps = store_with_constraint();
        assert!(matches!(
            ps.add_constrained("bad", "Tc + nope", ParamKind::Time),
            Err(ParamError::UndefinedReference { .. })
        ));
    }

    #[test]
    fn test_constrained_initial_value() {
        let ps = store_with_constraint();
        let th = ps.lookup("Thalf").unwrap();
        assert_eq!(ps.value(th), 0.5);
    }

    #[test]
    fn test_set_free_recomputes_constrained() {
        let mut ps = store_with_constraint();
        ps.set_free(&[4.0, 200.0]).unwrap();
        assert_eq!(ps.value(ps.lookup("Tc").unwrap()), 4.0);
        assert_eq!(ps.value(ps.lookup("N").unwrap()), 200.0);
        assert_eq!(ps.value(ps.lookup("Thalf").unwrap()), 2.0);
    }

    #[test]
    fn test_set_free_round_trip() {
        let mut ps = store_with_constraint();
        let v = vec![3.25, 123.5];
        ps.set_free(&v).unwrap();
        assert_eq!(ps.free_values(), v);
    }

    #[test]
    fn test_set_free_length_mismatch() {
        let mut ps = store_with_constraint();
        assert!(matches!(
            ps.set_free(&[1.0]),
            Err(ParamError::FreeLenMismatch {
                expected: 2,
                got: 1
            })
        ));
    }

    #[test]
    fn test_division_by_zero_reports_infeasible() {
        let mut ps = ParamStore::new();
        ps.add_free("x", 1.0, 0.0, 1e6, ParamKind::Time).unwrap();
        ps.add_constrained("inv", "1 / x", ParamKind::Time).unwrap();
        assert!(matches!(
            ps.set_free(&[0.0]),
            Err(ParamError::NonFinite(_))
        ));
        // the store itself remains usable
        ps.set_free(&[2.0]).unwrap();
        assert_eq!(ps.value(ps.lookup("inv").unwrap()), 0.5);
    }

    #[test]
    fn test_free_bounds() {
        let ps = store_with_constraint();
        let (lo, hi) = ps.free_bounds();
        assert_eq!(lo, vec![0.0, 0.0]);
        assert_eq!(hi, vec![1e6, 1e7]);
    }

    #[test]
    fn test_duplicate_store_is_independent() {
        let mut ps = store_with_constraint();
        let dup = ps.clone();
        assert_eq!(ps, dup);
        ps.set_free(&[9.0, 300.0]).unwrap();
        assert_ne!(ps.value(ps.lookup("Tc").unwrap()), dup.value(dup.lookup("Tc").unwrap()));
    }
}
