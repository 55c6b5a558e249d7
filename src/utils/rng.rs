use rand_chacha::ChaCha8Rng;
use rand_seeder::Seeder;

/// Position-noise stream for the vehicle behind `address`.
///
/// Seeded through `rand_seeder`'s SipHash-2-4 over `(mission_seed, address)`,
/// whose output is fixed by that crate rather than by the toolchain, so a
/// mission replays the same noise wherever it is rebuilt.
pub fn vehicle_noise(mission_seed: u64, address: &str) -> ChaCha8Rng {
    Seeder::from((mission_seed, address)).make_rng()
}
