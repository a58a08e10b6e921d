//! The coalescent kernel.
//!
//! One replicate simulates a gene genealogy backward in time through the
//! population network. Lineages within a segment coalesce at the pairwise
//! rate of a Wright-Fisher population of haploid size 2N; lineages that
//! survive to the ancient end of a segment move into its parent, choosing
//! between the two parents of an admixture node by the mixture fraction.

mod gene;

pub use gene::{GeneId, GeneTree};

use crate::errors::{ModelError, NetworkError};
use crate::network::{PopNet, SegId};
use crate::params::ParamStore;
use rand::Rng;
use rand_distr::{Distribution, Exp};

/// Run one replicate from the root of the network.
///
/// Tip lineages must already have been seeded into their segments. On
/// success every lineage has been absorbed into a single gene tree and the
/// handle of its root (the MRCA) is returned.
pub fn coalesce<R: Rng>(
    net: &mut PopNet,
    store: &ParamStore,
    root: SegId,
    tree: &mut GeneTree,
    rng: &mut R,
) -> Result<GeneId, ModelError> {
    visit(net, store, root, tree, rng)?;
    let lineages = &net.segment(root).lineages;
    match lineages.len() {
        1 => Ok(lineages[0]),
        0 => Err(ModelError::NoSamples),
        // the root has no ancient end, so the loop cannot leave two
        n => unreachable!("{n} lineages survived the root segment"),
    }
}

/// Post-order walk: children first, then this segment's coalescent loop.
///
/// An admixture node is reached from both of its parents; the second visit
/// finds an empty lineage list and does nothing.
fn visit<R: Rng>(
    net: &mut PopNet,
    store: &ParamStore,
    seg: SegId,
    tree: &mut GeneTree,
    rng: &mut R,
) -> Result<(), ModelError> {
    let children: Vec<SegId> = net.segment(seg).children().to_vec();
    for c in children {
        visit(net, store, c, tree, rng)?;
    }

    let start = store.value(net.segment(seg).start());
    let end = match net.segment(seg).end() {
        Some(id) => store.value(id),
        None => f64::INFINITY,
    };
    if end.is_nan() {
        return Err(NetworkError::NonFiniteTime(net.segment(seg).name().to_string()).into());
    }
    let two_n = store.value(net.segment(seg).two_n());

    let mut lineages = std::mem::take(&mut net.segment_mut(seg).lineages);
    let mut t = start;

    // Coalescent loop: continues until one lineage is left or the ancient
    // end of the interval is reached.
    while lineages.len() > 1 && t < end {
        let n = lineages.len();
        let mean = 2.0 * two_n / (n * (n - 1)) as f64;
        let exp = Exp::new(1.0 / mean).map_err(|_| ModelError::Infeasible)?;
        let x = exp.sample(rng);

        if t + x < end {
            // coalescent event within the interval
            t += x;
            for &g in &lineages {
                tree.add_to_branch(g, x);
            }
            // choose a random pair to join
            let i = rng.random_range(0..n);
            let mut j = rng.random_range(0..n - 1);
            if j >= i {
                j += 1;
            }
            let (i, j) = if i < j { (i, j) } else { (j, i) };
            lineages[i] = tree.join(lineages[i], lineages[j]);
            lineages.swap_remove(j);
        } else {
            // no event before the interval ends
            let dt = end - t;
            for &g in &lineages {
                tree.add_to_branch(g, dt);
            }
            t = end;
        }
    }

    // Carry 0 or 1 remaining lineages to the end of the interval. The
    // root's interval is open above; a lone survivor there is the MRCA and
    // gains no further length.
    if t < end && end.is_finite() {
        let dt = end - t;
        for &g in &lineages {
            tree.add_to_branch(g, dt);
        }
    }

    let parents: Vec<SegId> = net.segment(seg).parents().to_vec();
    if !lineages.is_empty() && !parents.is_empty() {
        if parents.len() == 1 {
            net.segment_mut(parents[0]).lineages.append(&mut lineages);
        } else {
            // distribute lineages between the two parents
            let mix = net
                .segment(seg)
                .mix()
                .ok_or_else(|| NetworkError::MissingMixture(net.segment(seg).name().to_string()))?;
            let m = store.value(mix);
            for g in lineages.drain(..) {
                let p = if rng.random::<f64>() < m {
                    parents[1]
                } else {
                    parents[0]
                };
                net.segment_mut(p).lineages.push(g);
            }
        }
    }
    net.segment_mut(seg).lineages = lineages;
    Ok(())
}
