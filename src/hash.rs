//! Hash utilities: scalar avalanche mixing and FNV-1a.
//!
//! The map itself only needs a `BuildHasher`; these are the two stock
//! choices. `AvalancheBuildHasher` suits integer and pointer-sized keys,
//! `FnvBuildHasher` suits short strings. Comparison is the key's `Eq`; to
//! change it, newtype the key. Whatever is plugged in, equal keys must
//! hash identically.

use core::ffi::CStr;
use core::hash::{BuildHasher, Hasher};

const XXH_PRIME64_2: u64 = 0xC2B2_AE3D_27D4_EB4F;
const XXH_PRIME64_3: u64 = 0x1656_67B1_9E37_79F9;
const XXH_PRIME32_2: u32 = 0x85EB_CA77;
const XXH_PRIME32_3: u32 = 0xC2B2_AE3D;

const FNV_OFFSET_BASIS: u64 = 0xCBF2_9CE4_8422_2325;
const FNV_PRIME: u64 = 0x0000_0100_0000_01B3;

/// xxHash64 avalanche finaliser. A bijection on `u64`; `0` maps to `0`.
#[inline]
pub const fn avalanche64(mut x: u64) -> u64 {
    x ^= x >> 33;
    x = x.wrapping_mul(XXH_PRIME64_2);
    x ^= x >> 29;
    x = x.wrapping_mul(XXH_PRIME64_3);
    x ^= x >> 32;
    x
}

/// xxHash32 avalanche finaliser.
#[inline]
pub const fn avalanche32(mut x: u32) -> u32 {
    x ^= x >> 15;
    x = x.wrapping_mul(XXH_PRIME32_2);
    x ^= x >> 13;
    x = x.wrapping_mul(XXH_PRIME32_3);
    x ^= x >> 16;
    x
}

/// Avalanche a machine word with the mix matching the pointer width.
#[cfg(target_pointer_width = "64")]
#[inline]
pub const fn mix_word(x: usize) -> usize {
    avalanche64(x as u64) as usize
}

/// Avalanche a machine word with the mix matching the pointer width.
#[cfg(not(target_pointer_width = "64"))]
#[inline]
pub const fn mix_word(x: usize) -> usize {
    avalanche32(x as u32) as usize
}

/// FNV-1a over a byte slice.
#[inline]
pub fn fnv1a(bytes: &[u8]) -> u64 {
    fnv1a_continue(FNV_OFFSET_BASIS, bytes)
}

/// FNV-1a over a NUL-terminated string, excluding the terminator.
pub fn fnv1a_cstr(s: &CStr) -> u64 {
    fnv1a(s.to_bytes())
}

#[inline]
fn fnv1a_continue(mut hash: u64, bytes: &[u8]) -> u64 {
    for &b in bytes {
        hash ^= u64::from(b);
        hash = hash.wrapping_mul(FNV_PRIME);
    }
    hash
}

/// `Hasher` that folds every written byte with FNV-1a.
///
/// Note that `str`'s `Hash` impl writes a trailing `0xff` after the bytes,
/// so `hash_one("abc")` differs from `fnv1a(b"abc")`.
#[derive(Clone, Copy, Debug)]
pub struct FnvHasher(u64);

impl Default for FnvHasher {
    fn default() -> Self {
        FnvHasher(FNV_OFFSET_BASIS)
    }
}

impl Hasher for FnvHasher {
    #[inline]
    fn write(&mut self, bytes: &[u8]) {
        self.0 = fnv1a_continue(self.0, bytes);
    }

    #[inline]
    fn finish(&self) -> u64 {
        self.0
    }
}

#[derive(Clone, Copy, Debug, Default)]
pub struct FnvBuildHasher;

impl BuildHasher for FnvBuildHasher {
    type Hasher = FnvHasher;
    fn build_hasher(&self) -> FnvHasher {
        FnvHasher::default()
    }
}

/// `Hasher` for scalar keys: each written integer is XORed into the state
/// and avalanched, so a lone `u64` key `k` hashes to `avalanche64(k)`.
///
/// Byte slices are consumed in 8-byte little-endian words, the last one
/// zero-padded.
#[derive(Clone, Copy, Debug, Default)]
pub struct AvalancheHasher(u64);

impl Hasher for AvalancheHasher {
    fn write(&mut self, bytes: &[u8]) {
        for chunk in bytes.chunks(8) {
            let mut word = [0u8; 8];
            word[..chunk.len()].copy_from_slice(chunk);
            self.write_u64(u64::from_le_bytes(word));
        }
    }

    #[inline]
    fn write_u8(&mut self, n: u8) {
        self.write_u64(u64::from(n));
    }

    #[inline]
    fn write_u16(&mut self, n: u16) {
        self.write_u64(u64::from(n));
    }

    #[inline]
    fn write_u32(&mut self, n: u32) {
        self.write_u64(u64::from(n));
    }

    #[inline]
    fn write_u64(&mut self, n: u64) {
        self.0 = avalanche64(self.0 ^ n);
    }

    #[inline]
    fn write_usize(&mut self, n: usize) {
        self.write_u64(n as u64);
    }

    #[inline]
    fn finish(&self) -> u64 {
        self.0
    }
}

#[derive(Clone, Copy, Debug, Default)]
pub struct AvalancheBuildHasher;

impl BuildHasher for AvalancheBuildHasher {
    type Hasher = AvalancheHasher;
    fn build_hasher(&self) -> AvalancheHasher {
        AvalancheHasher::default()
    }
}
