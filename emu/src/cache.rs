//! Decode cache.
//!
//! A fixed-size, directly-indexed table memoizing raw instruction word →
//! decoded form. The slot index is `inst % 8191`; there is no chaining, a
//! colliding instruction simply evicts the previous occupant. The hit
//! criterion is equality of the raw word, not of the address, so distinct
//! code locations holding the same instruction share a slot.
//!
//! The cache is never invalidated on guest stores: self-modifying code
//! observes stale decodes unless the new instruction word lands in a
//! different slot. This is an accepted limitation of the core.

use rvproxy_isa::DecodedInst;

/// Slot count; a prime to smooth the modulo distribution for typical
/// instruction densities.
pub const DECODE_CACHE_SIZE: usize = 8191;

#[derive(Debug, Clone, Copy)]
struct Slot {
    inst: u64,
    dec: DecodedInst,
}

/// Directly-indexed decode cache.
///
/// Slots start with a raw word of zero; a fetched word of zero decodes as
/// illegal, which is exactly what the default slot holds, so the sentinel
/// is also a correct cache entry.
pub struct DecodeCache {
    slots: Box<[Slot]>,
}

impl DecodeCache {
    pub fn new() -> Self {
        let slot = Slot { inst: 0, dec: DecodedInst::default() };
        Self { slots: vec![slot; DECODE_CACHE_SIZE].into_boxed_slice() }
    }

    #[inline]
    pub fn lookup(&self, inst: u64) -> Option<DecodedInst> {
        let slot = &self.slots[(inst % DECODE_CACHE_SIZE as u64) as usize];
        if slot.inst == inst {
            Some(slot.dec)
        } else {
            None
        }
    }

    #[inline]
    pub fn insert(&mut self, inst: u64, dec: DecodedInst) {
        self.slots[(inst % DECODE_CACHE_SIZE as u64) as usize] = Slot { inst, dec };
    }
}

impl Default for DecodeCache {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rvproxy_isa::{decode_inst, Op, Rv64Imafdc};

    fn decoded(word: u64) -> DecodedInst {
        let mut dec = DecodedInst::default();
        decode_inst::<Rv64Imafdc>(&mut dec, word);
        dec
    }

    #[test]
    fn miss_then_hit() {
        let mut cache = DecodeCache::new();
        let word = 0x00500093u64;
        assert!(cache.lookup(word).is_none());
        cache.insert(word, decoded(word));
        let hit = cache.lookup(word).unwrap();
        assert_eq!(hit.op, Op::ADDI);
        assert_eq!(hit.inst, word);
    }

    #[test]
    fn colliding_words_evict() {
        let mut cache = DecodeCache::new();
        let a = 0x00500093u64;
        let b = a + DECODE_CACHE_SIZE as u64; // same slot, different word
        cache.insert(a, decoded(a));
        cache.insert(b, decoded(b));
        assert!(cache.lookup(a).is_none());
        assert!(cache.lookup(b).is_some());
    }

    #[test]
    fn zero_word_hits_the_sentinel_as_illegal() {
        let cache = DecodeCache::new();
        let hit = cache.lookup(0).unwrap();
        assert_eq!(hit.op, Op::ILLEGAL);
    }
}
