//! Software mirror of the fragment-list algorithm.
//!
//! The GPU passes cannot run under `cargo test`, so this module keeps a
//! CPU twin of the exact allocate/splice/traverse/sort/composite sequence
//! the shaders perform, built on `std::sync::atomic` instead of shader
//! atomics. Same one-based indices, same sentinel, same overflow policy,
//! same traversal cap, same front-to-back accumulation — when the shader
//! logic changes, this module changes with it.
//!
//! [`SoftLists::insert`] takes `&self` and is safe to call from many
//! threads at once: the allocation counter and the head pointers are the
//! only contended state, and both are driven purely through atomics, like
//! their storage-buffer counterparts. Node records are set-once cells —
//! each successfully allocated slot has exactly one writer, mirroring the
//! "never mutated after creation" lifecycle of pool nodes.

use std::sync::OnceLock;
use std::sync::atomic::{AtomicU32, Ordering};

use crate::lists::pool_capacity;

/// The list terminator; also the value of an empty head pointer.
pub const SENTINEL: u32 = 0;

/// One fragment contribution, unpacked.
///
/// The GPU pool stores color as packed unorm8; here it stays `f32` so
/// tests reason about exact arithmetic rather than quantization.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct SoftNode {
    pub color: [f32; 4],
    pub depth: f32,
    pub next: u32,
}

/// CPU-resident per-pixel fragment lists.
pub struct SoftLists {
    width: u32,
    height: u32,
    max_nodes_per_pixel: u32,
    heads: Vec<AtomicU32>,
    /// Slot 0 is reserved as the terminator and never written.
    slots: Vec<OnceLock<SoftNode>>,
    counter: AtomicU32,
}

impl SoftLists {
    pub fn new(width: u32, height: u32, max_nodes_per_pixel: u32) -> Self {
        let pixels = (width * height) as usize;
        let capacity = pool_capacity(width, height, max_nodes_per_pixel) as usize;
        Self {
            width,
            height,
            max_nodes_per_pixel,
            heads: (0..pixels).map(|_| AtomicU32::new(SENTINEL)).collect(),
            slots: (0..capacity + 1).map(|_| OnceLock::new()).collect(),
            counter: AtomicU32::new(0),
        }
    }

    /// Usable pool slots.
    pub fn capacity(&self) -> u32 {
        pool_capacity(self.width, self.height, self.max_nodes_per_pixel)
    }

    /// Allocation attempts since the last reset.
    pub fn attempted(&self) -> u32 {
        self.counter.load(Ordering::Relaxed)
    }

    /// Fragments dropped by pool exhaustion since the last reset.
    pub fn dropped(&self) -> u32 {
        self.attempted().saturating_sub(self.capacity())
    }

    /// Inserts one fragment contribution at pixel `(x, y)`.
    ///
    /// Returns `false` when the pool is exhausted; the contribution is
    /// dropped and every other list is unaffected. Safe to call
    /// concurrently: the head exchange is the sole serialization point,
    /// so each racing insert observes a distinct previous head and links
    /// itself exactly once.
    pub fn insert(&self, x: u32, y: u32, color: [f32; 4], depth: f32) -> bool {
        assert!(x < self.width && y < self.height, "pixel out of bounds");

        // One-based slot; 0 stays the terminator.
        let slot = self.counter.fetch_add(1, Ordering::Relaxed) + 1;
        if slot > self.capacity() {
            return false;
        }

        let pixel = (y * self.width + x) as usize;
        let prev = self.heads[pixel].swap(slot, Ordering::AcqRel);
        let stored = self.slots[slot as usize].set(SoftNode {
            color,
            depth,
            next: prev,
        });
        debug_assert!(stored.is_ok(), "pool slot written twice");
        true
    }

    /// The fragments reachable from pixel `(x, y)`'s head, in traversal
    /// (last-inserted-first) order, hard-capped at the configured depth.
    pub fn fragments(&self, x: u32, y: u32) -> Vec<SoftNode> {
        let pixel = (y * self.width + x) as usize;
        let mut out = Vec::new();
        let mut index = self.heads[pixel].load(Ordering::Acquire);
        while index != SENTINEL && (out.len() as u32) < self.max_nodes_per_pixel {
            let Some(node) = self.slots[index as usize].get() else {
                break;
            };
            out.push(*node);
            index = node.next;
        }
        out
    }

    /// Resolves pixel `(x, y)` to a premultiplied RGBA value.
    ///
    /// Traverses (capped), sorts ascending by depth, and accumulates
    /// front to back. An empty list resolves to all zeros — background
    /// compositing is the caller's blend, not this stage.
    pub fn resolve(&self, x: u32, y: u32) -> [f32; 4] {
        let mut entries: Vec<(f32, [f32; 4])> = self
            .fragments(x, y)
            .into_iter()
            .map(|n| (n.depth, n.color))
            .collect();
        entries.sort_by(|a, b| a.0.total_cmp(&b.0));

        let mut accum = [0.0f32; 3];
        let mut alpha = 0.0f32;
        for (_, color) in entries {
            let weight = color[3] * (1.0 - alpha);
            accum[0] += color[0] * weight;
            accum[1] += color[1] * weight;
            accum[2] += color[2] * weight;
            alpha += weight;
        }
        [accum[0], accum[1], accum[2], alpha]
    }

    /// The per-frame reset: every head becomes the sentinel and the
    /// counter returns to zero, invalidating all previously allocated
    /// nodes. `&mut self` stands in for the GPU's write-before-write
    /// barrier — no insert can overlap a reset.
    pub fn reset(&mut self) {
        for head in &mut self.heads {
            *head.get_mut() = SENTINEL;
        }
        *self.counter.get_mut() = 0;
        for slot in &mut self.slots {
            slot.take();
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const RED: [f32; 4] = [1.0, 0.0, 0.0, 0.5];
    const GREEN: [f32; 4] = [0.0, 1.0, 0.0, 0.5];
    const BLUE: [f32; 4] = [0.0, 0.0, 1.0, 0.5];

    /// Front-to-back accumulation of already-sorted colors, written out
    /// longhand so tests don't share code with the implementation.
    fn composite(sorted: &[[f32; 4]]) -> [f32; 4] {
        let mut out = [0.0f32; 4];
        for c in sorted {
            let w = c[3] * (1.0 - out[3]);
            out[0] += c[0] * w;
            out[1] += c[1] * w;
            out[2] += c[2] * w;
            out[3] += w;
        }
        out
    }

    #[test]
    fn newest_insertion_becomes_head() {
        let lists = SoftLists::new(1, 1, 8);
        lists.insert(0, 0, RED, 5.0);
        lists.insert(0, 0, GREEN, 2.0);
        lists.insert(0, 0, BLUE, 8.0);

        // Head-to-tail: blue, green, red — prepend order.
        let frags = lists.fragments(0, 0);
        let colors: Vec<_> = frags.iter().map(|n| n.color).collect();
        assert_eq!(colors, vec![BLUE, GREEN, RED]);
        // The first-inserted node terminates the list.
        assert_eq!(frags.last().map(|n| n.next), Some(SENTINEL));
    }

    #[test]
    fn resolve_sorts_by_depth_not_insertion_order() {
        let lists = SoftLists::new(1, 1, 8);
        lists.insert(0, 0, RED, 5.0);
        lists.insert(0, 0, GREEN, 2.0);
        lists.insert(0, 0, BLUE, 8.0);

        // Front to back is green (2.0), red (5.0), blue (8.0).
        assert_eq!(lists.resolve(0, 0), composite(&[GREEN, RED, BLUE]));
    }

    #[test]
    fn resolve_is_independent_of_insertion_order() {
        let fragments = [(RED, 5.0), (GREEN, 2.0), (BLUE, 8.0), ([0.9, 0.9, 0.2, 0.25], 3.5)];
        let permutations: &[[usize; 4]] = &[
            [0, 1, 2, 3],
            [3, 2, 1, 0],
            [1, 3, 0, 2],
            [2, 0, 3, 1],
            [1, 0, 2, 3],
            [3, 0, 1, 2],
        ];

        let mut results = Vec::new();
        for perm in permutations {
            let lists = SoftLists::new(1, 1, 8);
            for &i in perm {
                let (color, depth) = fragments[i];
                lists.insert(0, 0, color, depth);
            }
            results.push(lists.resolve(0, 0));
        }

        // Identical fragment sets resolve bit-identically no matter the
        // submission order: only the sort determines composite order.
        for r in &results[1..] {
            assert_eq!(*r, results[0]);
        }
    }

    #[test]
    fn concurrent_allocations_receive_unique_slots() {
        use std::collections::HashSet;

        const THREADS: u32 = 8;
        let lists = SoftLists::new(16, 16, THREADS);

        // Every thread inserts one fragment at every pixel; the pool is
        // sized to fit exactly.
        std::thread::scope(|scope| {
            for t in 0..THREADS {
                let lists = &lists;
                scope.spawn(move || {
                    for y in 0..16 {
                        for x in 0..16 {
                            let depth = (t * 31 + x * 7 + y) as f32;
                            let ok = lists.insert(x, y, [0.1, 0.2, 0.3, 0.4], depth);
                            assert!(ok);
                        }
                    }
                });
            }
        });

        assert_eq!(lists.attempted(), lists.capacity());
        assert_eq!(lists.dropped(), 0);

        // Walk every list: each holds exactly one node per thread, every
        // slot index is globally unique, and every walk terminates within
        // the configured bound.
        let mut seen = HashSet::new();
        for y in 0..16 {
            for x in 0..16 {
                let pixel = (y * 16 + x) as usize;
                let mut index = lists.heads[pixel].load(Ordering::Acquire);
                let mut steps = 0;
                while index != SENTINEL {
                    assert!(steps < THREADS, "list exceeds bound");
                    assert!(seen.insert(index), "slot {} linked twice", index);
                    index = lists.slots[index as usize].get().unwrap().next;
                    steps += 1;
                }
                assert_eq!(steps, THREADS);
            }
        }
        assert_eq!(seen.len() as u32, lists.capacity());
    }

    #[test]
    fn reset_is_idempotent() {
        let mut lists = SoftLists::new(2, 2, 4);
        lists.insert(0, 0, RED, 1.0);
        lists.insert(1, 1, GREEN, 2.0);

        lists.reset();
        let after_once: Vec<u32> = lists
            .heads
            .iter()
            .map(|h| h.load(Ordering::Relaxed))
            .collect();
        assert!(after_once.iter().all(|&h| h == SENTINEL));
        assert_eq!(lists.attempted(), 0);

        lists.reset();
        let after_twice: Vec<u32> = lists
            .heads
            .iter()
            .map(|h| h.load(Ordering::Relaxed))
            .collect();
        assert_eq!(after_once, after_twice);
        assert_eq!(lists.attempted(), 0);

        // The pool is reusable immediately: the next frame starts from
        // slot 1 again.
        lists.insert(0, 0, BLUE, 3.0);
        assert_eq!(lists.fragments(0, 0).len(), 1);
        assert_eq!(lists.attempted(), 1);
    }

    #[test]
    fn pool_exhaustion_drops_excess_fragments() {
        let lists = SoftLists::new(1, 1, 4);
        assert_eq!(lists.capacity(), 4);

        let colors = [RED, GREEN, BLUE, [1.0, 1.0, 1.0, 0.1]];
        for (i, c) in colors.iter().enumerate() {
            assert!(lists.insert(0, 0, *c, i as f32));
        }
        // Capacity reached: further inserts are dropped, not errors.
        assert!(!lists.insert(0, 0, [0.5; 4], 9.0));
        assert!(!lists.insert(0, 0, [0.6; 4], 10.0));

        assert_eq!(lists.attempted(), 6);
        assert_eq!(lists.dropped(), 2);

        // The surviving list holds exactly the four successful inserts
        // and resolves deterministically.
        assert_eq!(lists.fragments(0, 0).len(), 4);
        assert_eq!(
            lists.resolve(0, 0),
            composite(&[RED, GREEN, BLUE, [1.0, 1.0, 1.0, 0.1]])
        );
    }

    #[test]
    fn traversal_is_capped_at_configured_depth() {
        // Global capacity (2 pixels x depth 2 = 4) lets one pixel link
        // more nodes than the per-pixel depth; the cap still bounds the
        // walk and keeps the newest (closest-to-head) entries.
        let lists = SoftLists::new(2, 1, 2);
        lists.insert(0, 0, RED, 5.0);
        lists.insert(0, 0, GREEN, 2.0);
        lists.insert(0, 0, BLUE, 8.0);

        let frags = lists.fragments(0, 0);
        assert_eq!(frags.len(), 2);
        assert_eq!(frags[0].color, BLUE);
        assert_eq!(frags[1].color, GREEN);

        assert_eq!(lists.resolve(0, 0), composite(&[GREEN, BLUE]));
    }

    #[test]
    fn empty_pixel_resolves_fully_transparent() {
        let lists = SoftLists::new(4, 4, 4);
        lists.insert(0, 0, RED, 1.0);

        assert_eq!(lists.resolve(3, 3), [0.0, 0.0, 0.0, 0.0]);
    }

    #[test]
    #[should_panic(expected = "pixel out of bounds")]
    fn out_of_bounds_pixel_is_rejected() {
        let lists = SoftLists::new(2, 2, 4);
        lists.insert(2, 0, RED, 1.0);
    }
}
