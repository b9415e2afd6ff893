// SPDX-License-Identifier: MIT
//
// Copyright (c) 2025 the surftri authors
//
// Permission is hereby granted, free of charge, to any person obtaining a copy
// of this software and associated documentation files (the "Software"), to deal
// in the Software without restriction, including without limitation the rights
// to use, copy, modify, merge, publish, distribute, sublicense, and/or sell
// copies of the Software, and to permit persons to whom the Software is
// furnished to do so, subject to the following conditions:
//
// The above copyright notice and this permission notice shall be included in
// all copies or substantial portions of the Software.
//
// THE SOFTWARE IS PROVIDED "AS IS", WITHOUT WARRANTY OF ANY KIND, EXPRESS OR
// IMPLIED, INCLUDING BUT NOT LIMITED TO THE WARRANTIES OF MERCHANTABILITY,
// FITNESS FOR A PARTICULAR PURPOSE AND NONINFRINGEMENT. IN NO EVENT SHALL THE
// AUTHORS OR COPYRIGHT HOLDERS BE LIABLE FOR ANY CLAIM, DAMAGES OR OTHER
// LIABILITY, WHETHER IN AN ACTION OF CONTRACT, TORT OR OTHERWISE, ARISING FROM,
// OUT OF OR IN CONNECTION WITH THE SOFTWARE OR THE USE OR OTHER DEALINGS IN THE
// SOFTWARE.

//! Memoised surface-evaluated centroids, keyed by the unordered vertex
//! triple of the owning triangle. The cache is transient: a phase that can
//! reuse centroids across swaps creates one and drops it when done.

use ahash::AHashMap;

use crate::mesh::basic_types::MidClose;

#[derive(Debug, Clone, Copy)]
pub struct MidEntry {
    pub close: MidClose,
    pub xyz: [f64; 3],
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CacheAdd {
    Added,
    Duplicate,
}

#[derive(Debug, Default)]
pub struct MidpointCache {
    map: AHashMap<[usize; 3], MidEntry>,
}

#[inline]
fn key(i0: usize, i1: usize, i2: usize) -> [usize; 3] {
    let lo = i0.min(i1).min(i2);
    let hi = i0.max(i1).max(i2);
    [lo, i0 + i1 + i2 - lo - hi, hi]
}

impl MidpointCache {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn find(&self, i0: usize, i1: usize, i2: usize) -> Option<MidEntry> {
        self.map.get(&key(i0, i1, i2)).copied()
    }

    /// Insert, keeping the first value seen for a triple.
    pub fn add(
        &mut self,
        i0: usize,
        i1: usize,
        i2: usize,
        close: MidClose,
        xyz: [f64; 3],
    ) -> CacheAdd {
        match self.map.entry(key(i0, i1, i2)) {
            std::collections::hash_map::Entry::Occupied(_) => CacheAdd::Duplicate,
            std::collections::hash_map::Entry::Vacant(e) => {
                e.insert(MidEntry { close, xyz });
                CacheAdd::Added
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn triple_order_is_irrelevant() {
        let mut c = MidpointCache::new();
        assert_eq!(
            c.add(7, 2, 9, MidClose::Far, [1.0, 2.0, 3.0]),
            CacheAdd::Added
        );
        for (a, b, d) in [(2, 7, 9), (9, 7, 2), (2, 9, 7), (9, 2, 7), (7, 9, 2)] {
            let e = c.find(a, b, d).expect("permutation must hit");
            assert_eq!(e.xyz, [1.0, 2.0, 3.0]);
            assert_eq!(e.close, MidClose::Far);
        }
    }

    #[test]
    fn duplicate_add_keeps_first() {
        let mut c = MidpointCache::new();
        c.add(1, 2, 3, MidClose::Near, [0.5; 3]);
        assert_eq!(
            c.add(3, 2, 1, MidClose::Far, [9.0; 3]),
            CacheAdd::Duplicate
        );
        assert_eq!(c.find(1, 2, 3).unwrap().xyz, [0.5; 3]);
    }

    #[test]
    fn miss_is_none() {
        let c = MidpointCache::new();
        assert!(c.find(0, 1, 2).is_none());
    }
}
