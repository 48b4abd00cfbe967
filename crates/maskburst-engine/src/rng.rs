//! Deterministic RNG using PCG32 with BLAKE3 seed derivation.
//!
//! All randomness in the engine (noise buffers, oscillator start jitter)
//! flows through this module so that a configuration seed reproduces the
//! same output bit for bit.

use rand::SeedableRng;
use rand_pcg::Pcg32;

/// Creates a PCG32 RNG from a 32-bit seed.
///
/// The 32-bit seed is expanded to 64 bits by duplicating the value in both
/// halves, as required by PCG32's state initialization.
pub fn create_rng(seed: u32) -> Pcg32 {
    let seed64 = (seed as u64) | ((seed as u64) << 32);
    Pcg32::seed_from_u64(seed64)
}

/// Derives an independent seed for one voice from the master seed.
///
/// Hashes the master seed and the voice's channel index with BLAKE3 so that
/// every voice gets its own random stream regardless of creation order.
pub fn derive_voice_seed(master_seed: u32, channel_index: u32) -> u32 {
    let mut input = Vec::with_capacity(8);
    input.extend_from_slice(&master_seed.to_le_bytes());
    input.extend_from_slice(&channel_index.to_le_bytes());

    let hash = blake3::hash(&input);

    let bytes: [u8; 4] = hash.as_bytes()[0..4].try_into().unwrap();
    u32::from_le_bytes(bytes)
}

/// Creates an RNG for a specific voice.
pub fn create_voice_rng(master_seed: u32, channel_index: u32) -> Pcg32 {
    create_rng(derive_voice_seed(master_seed, channel_index))
}
