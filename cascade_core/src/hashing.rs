use std::hash::Hasher;

/// FNV-1a over 64 bits.
///
/// Structural versions and cascade event ids are compared across processes
/// and runs, so they need a hash with a fixed seed.
#[derive(Debug)]
pub struct FnvHasher {
    state: u64,
}

impl FnvHasher {
    const OFFSET_BASIS: u64 = 0xcbf29ce484222325;
    const PRIME: u64 = 0x100000001b3;

    pub fn new() -> Self {
        Self {
            state: Self::OFFSET_BASIS,
        }
    }

    /// Hashes the bit pattern, so `0.0` and `-0.0` differ.
    pub fn write_f64(&mut self, value: f64) {
        self.write_u64(value.to_bits());
    }
}

impl Default for FnvHasher {
    fn default() -> Self {
        Self::new()
    }
}

impl Hasher for FnvHasher {
    fn finish(&self) -> u64 {
        self.state
    }

    fn write(&mut self, bytes: &[u8]) {
        self.state = bytes.iter().fold(self.state, |state, &byte| {
            (state ^ u64::from(byte)).wrapping_mul(Self::PRIME)
        });
    }
}
