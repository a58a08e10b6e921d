//! The demographic model: parameters, network, and sample labels bound
//! together.

use crate::base::{tip_bit, LabelIndex};
use crate::coalescent::{coalesce, GeneTree};
use crate::errors::{InputError, ModelError, ParamError};
use crate::input::parse_network_file;
use crate::network::{PopNet, SegId};
use crate::params::{Bounds, ParamStore};
use crate::pattern::BranchTab;
use rand::Rng;
use std::path::Path;

/// A complete demographic model, ready to simulate.
///
/// Owns the parameter store, the population network, the label index, and
/// the assignment of each tip to the segment it is sampled from.
/// Duplication for a worker thread is `Clone`; the copy shares nothing
/// with the original, and handle-based cross-references remain valid.
#[derive(Debug, Clone, PartialEq)]
pub struct DemoModel {
    store: ParamStore,
    net: PopNet,
    labels: LabelIndex,
    // tips[i] is the segment seeded with bitmask 1 << i
    tips: Vec<SegId>,
    bounds: Bounds,
    root: SegId,
}

impl DemoModel {
    /// Read a model from a population-description file.
    pub fn from_file(path: impl AsRef<Path>, bounds: Bounds) -> Result<Self, InputError> {
        let text = std::fs::read_to_string(path)?;
        Self::from_str(&text, bounds)
    }

    /// Parse a model from population-description text.
    #[allow(clippy::should_implement_trait)]
    pub fn from_str(text: &str, bounds: Bounds) -> Result<Self, InputError> {
        let parsed = parse_network_file(text, &bounds)?;
        if parsed.labels.is_empty() {
            return Err(ModelError::NoSamples.into());
        }
        let root = parsed.net.root()?;
        Ok(Self {
            store: parsed.store,
            net: parsed.net,
            labels: parsed.labels,
            tips: parsed.tips,
            bounds,
            root,
        })
    }

    pub fn labels(&self) -> &LabelIndex {
        &self.labels
    }

    pub fn store(&self) -> &ParamStore {
        &self.store
    }

    pub fn network(&self) -> &PopNet {
        &self.net
    }

    pub fn bounds(&self) -> &Bounds {
        &self.bounds
    }

    /// Number of sampled tips.
    pub fn n_samples(&self) -> usize {
        self.tips.len()
    }

    /// Number of free parameters.
    pub fn n_free(&self) -> usize {
        self.store.n_free()
    }

    /// Current free-parameter vector.
    pub fn free_values(&self) -> Vec<f64> {
        self.store.free_values()
    }

    /// `(lower, upper)` bounds over the free parameters.
    pub fn free_bounds(&self) -> (Vec<f64>, Vec<f64>) {
        self.store.free_bounds()
    }

    /// Overwrite the free parameters and recompute constrained ones.
    pub fn set_free(&mut self, values: &[f64]) -> Result<(), ParamError> {
        self.store.set_free(values)
    }

    /// True if the current parameter vector is feasible.
    pub fn feasible(&self) -> bool {
        self.net.feasible(&self.store, &self.bounds)
    }

    /// Run `nreps` replicates, accumulating weighted branch lengths into
    /// `tab`. Each replicate clears the network, seeds one lineage per
    /// tip, coalesces from the root, and tabulates the resulting gene
    /// tree. The gene tree itself is discarded.
    pub fn simulate<R: Rng>(
        &mut self,
        tab: &mut BranchTab,
        rng: &mut R,
        nreps: u64,
        include_singletons: bool,
    ) -> Result<(), ModelError> {
        let union = self.labels.union_mask();
        let mut tree = GeneTree::new();
        for _ in 0..nreps {
            self.net.clear();
            tree.clear();
            for (i, &seg) in self.tips.iter().enumerate() {
                let gene = tree.new_tip(tip_bit(i));
                self.net.segment_mut(seg).lineages.push(gene);
            }
            let mrca = coalesce(&mut self.net, &self.store, self.root, &mut tree, rng)?;
            debug_assert_eq!(tree.tipset(mrca), union, "stranded lineages");
            tree.tabulate(mrca, tab, union, include_singletons);
        }
        self.net.clear();
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::SeedableRng;
    use rand_xoshiro::Xoshiro256PlusPlus;

    // three sampled populations; b is admixed, with native parent bb
    // and introgressor c
    const EXAMPLE: &str = "\
# population history with admixture
time fixed  T0=0
time free   Tc=1
time free   Tab=3
time free   Tabc=5.5
twoN free   Na=100
twoN fixed  Nb=123
twoN free   Nc=213.4
twoN fixed  Nbb=32.1
twoN free   Nab=222
twoN fixed  Nabc=1.2e2
mixFrac free Mc=0.02
segment a   t=T0     twoN=Na    samples=1
segment b   t=T0     twoN=Nb    samples=1
segment c   t=Tc     twoN=Nc    samples=1
segment bb  t=Tc     twoN=Nbb
segment ab  t=Tab    twoN=Nab
segment abc t=Tabc   twoN=Nabc
mix    b  from bb + Mc * c
derive a  from ab
derive bb from ab
derive ab from abc
derive c  from abc
";

    #[test]
    fn test_from_str_example() {
        let model = DemoModel::from_str(EXAMPLE, Bounds::default()).unwrap();
        assert_eq!(model.n_samples(), 3);
        assert_eq!(model.network().len(), 6);
        // Tc, Tab, Tabc, Na, Nc, Nab, Mc
        assert_eq!(model.n_free(), 7);
        assert_eq!(model.labels().name(0), Some("a.0"));
        assert_eq!(model.labels().name(1), Some("b.0"));
        assert_eq!(model.labels().name(2), Some("c.0"));
        assert!(model.feasible());
    }

    #[test]
    fn test_duplicate_round_trip() {
        let model = DemoModel::from_str(EXAMPLE, Bounds::default()).unwrap();
        let dup = model.clone();
        assert_eq!(model, dup);
    }

    #[test]
    fn test_duplicate_is_independent() {
        let model = DemoModel::from_str(EXAMPLE, Bounds::default()).unwrap();
        let mut dup = model.clone();
        let mut v = dup.free_values();
        v[0] += 0.5;
        dup.set_free(&v).unwrap();
        assert_ne!(model, dup);
        assert_ne!(model.free_values(), dup.free_values());
    }

    #[test]
    fn test_set_free_round_trip() {
        let mut model = DemoModel::from_str(EXAMPLE, Bounds::default()).unwrap();
        let v = vec![1.5, 4.0, 6.0, 90.0, 200.0, 210.0, 0.05, 7.0];
        assert_eq!(v.len(), model.n_free() + 1);
        // wrong length is rejected
        assert!(model.set_free(&v).is_err());
        let v = &v[..model.n_free()];
        model.set_free(v).unwrap();
        assert_eq!(model.free_values(), v);
    }

    #[test]
    fn test_simulate_accumulates() {
        let mut model = DemoModel::from_str(EXAMPLE, Bounds::default()).unwrap();
        let mut rng = Xoshiro256PlusPlus::seed_from_u64(42);
        let mut tab = BranchTab::new();
        model.simulate(&mut tab, &mut rng, 10, true).unwrap();
        assert!(!tab.is_empty());
        assert!(tab.iter().all(|(_, v)| v >= 0.0));
        // the reserved all-samples pattern never appears
        assert_eq!(tab.get(model.labels().union_mask()), 0.0);
        assert!(model.network().is_clear());
    }

    #[test]
    fn test_no_samples_rejected() {
        let text = "\
time fixed T0=0
twoN fixed N=1
segment a t=T0 twoN=N
";
        assert!(matches!(
            DemoModel::from_str(text, Bounds::default()),
            Err(InputError::Model(ModelError::NoSamples))
        ));
    }
}
