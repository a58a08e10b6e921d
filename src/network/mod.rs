//! The population network: a DAG of time-ordered segments.
//!
//! Segments live in an arena and refer to each other, and to their
//! parameters, by integer handles. Duplicating a network for a worker
//! thread is therefore a plain `Clone`; every cross-reference in the copy
//! is valid against the duplicated parameter store.

mod segment;

pub use segment::{SegId, Segment};

use crate::errors::NetworkError;
use crate::params::{Bounds, ParamId, ParamStore};

/// Arena of segments forming one population network.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct PopNet {
    segments: Vec<Segment>,
}

impl PopNet {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add an unwired segment and return its handle.
    pub fn add_segment(
        &mut self,
        name: impl Into<String>,
        two_n: ParamId,
        start: ParamId,
        n_tips: u32,
    ) -> SegId {
        let id = SegId::new(self.segments.len());
        let mut seg = Segment::new(name, two_n, start);
        seg.n_tips = n_tips;
        self.segments.push(seg);
        id
    }

    pub fn len(&self) -> usize {
        self.segments.len()
    }

    pub fn is_empty(&self) -> bool {
        self.segments.is_empty()
    }

    pub fn segment(&self, id: SegId) -> &Segment {
        &self.segments[id.index()]
    }

    pub(crate) fn segment_mut(&mut self, id: SegId) -> &mut Segment {
        &mut self.segments[id.index()]
    }

    pub fn segments(&self) -> impl Iterator<Item = (SegId, &Segment)> {
        self.segments
            .iter()
            .enumerate()
            .map(|(i, s)| (SegId::new(i), s))
    }

    /// Connect `child` to a single `parent`.
    ///
    /// Requires `start(child) <= start(parent)` at wiring time. Fixes
    /// `child.end` to the parent's start handle; if the child already has
    /// an end handle it must be the very same handle, so that adjacent
    /// segments share one time parameter.
    pub fn add_child(
        &mut self,
        store: &ParamStore,
        parent: SegId,
        child: SegId,
    ) -> Result<(), NetworkError> {
        if self.segment(parent).children.len() > 1 {
            return Err(NetworkError::TooManyChildren(
                self.segment(parent).name.clone(),
            ));
        }
        if self.segment(child).parents.len() > 1 {
            return Err(NetworkError::TooManyParents(
                self.segment(child).name.clone(),
            ));
        }
        let parent_start = self.segment(parent).start;
        if store.value(self.segment(child).start) > store.value(parent_start) {
            return Err(self.date_mismatch(child, parent));
        }
        match self.segment(child).end {
            None => self.segment_mut(child).end = Some(parent_start),
            Some(end) if end == parent_start => {}
            Some(_) => return Err(self.date_mismatch(child, parent)),
        }
        self.segment_mut(parent).children.push(child);
        self.segment_mut(child).parents.push(parent);
        Ok(())
    }

    /// Connect `child` to two parents: the `native` population and an
    /// `introgressor`, with mixture-fraction handle `mix`. Both parents
    /// must share one start-time handle, which becomes the child's end.
    pub fn mix(
        &mut self,
        child: SegId,
        mix: ParamId,
        introgressor: SegId,
        native: SegId,
    ) -> Result<(), NetworkError> {
        if !self.segment(child).parents.is_empty() {
            return Err(NetworkError::TooManyParents(
                self.segment(child).name.clone(),
            ));
        }
        for p in [native, introgressor] {
            if self.segment(p).children.len() > 1 {
                return Err(NetworkError::TooManyChildren(self.segment(p).name.clone()));
            }
        }
        let native_start = self.segment(native).start;
        if native_start != self.segment(introgressor).start {
            return Err(self.date_mismatch(child, introgressor));
        }
        match self.segment(child).end {
            None => self.segment_mut(child).end = Some(native_start),
            Some(end) if end == native_start => {}
            Some(_) => return Err(self.date_mismatch(child, native)),
        }
        {
            let c = self.segment_mut(child);
            c.parents = vec![native, introgressor];
            c.mix = Some(mix);
        }
        self.segment_mut(native).children.push(child);
        self.segment_mut(introgressor).children.push(child);
        Ok(())
    }

    fn date_mismatch(&self, child: SegId, parent: SegId) -> NetworkError {
        NetworkError::DateMismatch {
            child: self.segment(child).name.clone(),
            parent: self.segment(parent).name.clone(),
        }
    }

    /// The unique root of the network. Fails if there is no segment
    /// without parents, or more than one.
    pub fn root(&self) -> Result<SegId, NetworkError> {
        let mut root = None;
        for (id, seg) in self.segments() {
            if seg.parents.is_empty() {
                if root.is_some() {
                    return Err(NetworkError::MultipleRoots);
                }
                root = Some(id);
            }
        }
        root.ok_or(NetworkError::MultipleRoots)
    }

    /// True if every parameter referenced by the network lies within its
    /// category bounds and every edge respects the time ordering.
    pub fn feasible(&self, store: &ParamStore, bnd: &Bounds) -> bool {
        for (_, seg) in self.segments() {
            let two_n = store.value(seg.two_n);
            if !(two_n >= bnd.lo_two_n && two_n <= bnd.hi_two_n) {
                return false;
            }
            let start = store.value(seg.start);
            if !(start >= bnd.lo_t && start <= bnd.hi_t) {
                return false;
            }
            if let Some(mix) = seg.mix {
                let m = store.value(mix);
                if !(0.0..=1.0).contains(&m) {
                    return false;
                }
            }
            for &p in &seg.parents {
                if !(store.value(self.segment(p).start) >= start) {
                    return false;
                }
            }
            for &c in &seg.children {
                if !(start >= store.value(self.segment(c).start)) {
                    return false;
                }
            }
        }
        true
    }

    /// Remove every per-replicate lineage from the network.
    pub fn clear(&mut self) {
        for seg in &mut self.segments {
            seg.lineages.clear();
        }
    }

    /// True if no segment holds a lineage.
    pub fn is_clear(&self) -> bool {
        self.segments.iter().all(|s| s.lineages.is_empty())
    }
}
