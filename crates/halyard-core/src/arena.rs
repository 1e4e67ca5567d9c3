//! Scoped bump allocator.
//!
//! Allocate-by-copy, reset in one shot, no per-allocation free. The
//! difference from a raw bump pointer is that handles are
//! generation-tagged, so a reference taken before a `reset()` simply stops
//! resolving afterwards instead of aliasing whatever the arena now holds.

/// A handle into an [`Arena`]. Only resolves against the arena generation it
/// was issued from.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ArenaRef {
    generation: u64,
    offset: usize,
    len: usize,
}

impl ArenaRef {
    pub fn len(&self) -> usize {
        self.len
    }

    pub fn is_empty(&self) -> bool {
        self.len == 0
    }
}

pub struct Arena {
    buf: Vec<u8>,
    cursor: usize,
    generation: u64,
}

impl Arena {
    pub fn new(capacity: usize) -> Self {
        Self {
            buf: vec![0u8; capacity],
            cursor: 0,
            generation: 0,
        }
    }

    pub fn capacity(&self) -> usize {
        self.buf.len()
    }

    pub fn used(&self) -> usize {
        self.cursor
    }

    /// Copies `bytes` into the arena, returning a handle. `None` if the
    /// remaining capacity is insufficient — callers treat this as a
    /// non-fatal "skip this message" condition, never a panic.
    pub fn alloc_copy(&mut self, bytes: &[u8]) -> Option<ArenaRef> {
        if self.cursor + bytes.len() > self.buf.len() {
            return None;
        }
        let offset = self.cursor;
        self.buf[offset..offset + bytes.len()].copy_from_slice(bytes);
        self.cursor += bytes.len();
        Some(ArenaRef {
            generation: self.generation,
            offset,
            len: bytes.len(),
        })
    }

    /// Resolves a handle against the current generation. Returns `None` if
    /// the arena has been reset since the handle was issued, rather than
    /// aliasing whatever the arena now holds.
    pub fn resolve(&self, handle: ArenaRef) -> Option<&[u8]> {
        if handle.generation != self.generation {
            return None;
        }
        self.buf.get(handle.offset..handle.offset + handle.len)
    }

    /// Returns the write cursor to zero and bumps the generation. Does not
    /// shrink the backing buffer. Every handle issued before this call
    /// becomes unresolvable.
    pub fn reset(&mut self) {
        self.cursor = 0;
        self.generation = self.generation.wrapping_add(1);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn alloc_and_resolve_roundtrip() {
        let mut arena = Arena::new(64);
        let handle = arena.alloc_copy(b"hello").unwrap();
        assert_eq!(arena.resolve(handle), Some(b"hello".as_slice()));
    }

    #[test]
    fn alloc_fails_when_capacity_exhausted() {
        let mut arena = Arena::new(4);
        assert!(arena.alloc_copy(b"hello").is_none());
        assert_eq!(arena.used(), 0);
    }

    #[test]
    fn reset_invalidates_prior_handles() {
        let mut arena = Arena::new(64);
        let handle = arena.alloc_copy(b"hello").unwrap();
        arena.reset();
        assert_eq!(arena.resolve(handle), None);
        assert_eq!(arena.used(), 0);
    }

    #[test]
    fn reset_reclaims_capacity() {
        let mut arena = Arena::new(8);
        arena.alloc_copy(b"hello").unwrap();
        assert!(arena.alloc_copy(b"world").is_none());
        arena.reset();
        assert!(arena.alloc_copy(b"world!!!").is_some());
    }
}
