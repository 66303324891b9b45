//! Diffie-Hellman key material for the encrypted link
//!
//! Host and device each pick a secret, exchange `g^secret mod p`, and arrive
//! at the same shared value. The shared value forms the upper half of the
//! AES-128 key; the lower half is a fixed constant known to both sides.

use rand::Rng;
use std::fmt;

use crate::math::{self, PRIME_LIMIT};

/// Fixed half of the AES key
pub const FIXED_KEY: u64 = 0x0123_4567_0123_4567;

/// One negotiation's worth of key material
#[derive(Clone, PartialEq, Eq)]
pub struct KeyMaterial {
    pub generator: u64,
    pub modulus: u64,
    host_random: u64,
    pub host_inter: u64,
    pub slave_inter: Option<u64>,
    pub shared_key: Option<u64>,
}

impl KeyMaterial {
    /// Draw fresh primes and a host secret
    pub fn generate<R: Rng + ?Sized>(rng: &mut R) -> Self {
        let generator = math::generate_prime(rng);
        let modulus = math::generate_prime(rng);
        let host_random = math::random_below(rng, PRIME_LIMIT);
        Self::from_parts(generator, modulus, host_random)
    }

    /// Build from known values; the larger prime becomes the generator
    pub fn from_parts(generator: u64, modulus: u64, host_random: u64) -> Self {
        let (generator, modulus) = if generator < modulus {
            (modulus, generator)
        } else {
            (generator, modulus)
        };

        Self {
            generator,
            modulus,
            host_random,
            host_inter: math::xpowymodn(generator, host_random, modulus),
            slave_inter: None,
            shared_key: None,
        }
    }

    /// Combine the device's intermediate key with the host secret
    pub fn complete(&mut self, slave_inter: u64) -> u64 {
        let shared = math::xpowymodn(slave_inter, self.host_random, self.modulus);
        self.slave_inter = Some(slave_inter);
        self.shared_key = Some(shared);
        shared
    }

    pub fn is_complete(&self) -> bool {
        self.shared_key.is_some()
    }

    /// AES-128 key: fixed half then shared half, both little-endian
    pub fn aes_key(&self) -> Option<[u8; 16]> {
        let shared = self.shared_key?;
        let mut key = [0u8; 16];
        key[..8].copy_from_slice(&FIXED_KEY.to_le_bytes());
        key[8..].copy_from_slice(&shared.to_le_bytes());
        Some(key)
    }
}

impl fmt::Debug for KeyMaterial {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("KeyMaterial")
            .field("generator", &self.generator)
            .field("modulus", &self.modulus)
            .field("host_inter", &self.host_inter)
            .field("slave_inter", &self.slave_inter)
            .field("complete", &self.is_complete())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use rand::{rngs::StdRng, SeedableRng};

    #[test]
    fn test_both_sides_agree() {
        let mut host = KeyMaterial::from_parts(982_451_653, 1_000_003, 123_456_789);

        // Device side of the exchange
        let device_secret = 987_654_321;
        let device_inter = math::xpowymodn(host.generator, device_secret, host.modulus);
        let device_shared = math::xpowymodn(host.host_inter, device_secret, host.modulus);

        assert_eq!(host.complete(device_inter), device_shared);
        assert_eq!(host.shared_key, Some(device_shared));
    }

    #[test]
    fn test_generator_not_below_modulus() {
        let keys = KeyMaterial::from_parts(13, 97, 5);
        assert_eq!(keys.generator, 97);
        assert_eq!(keys.modulus, 13);

        let mut rng = StdRng::seed_from_u64(1);
        for _ in 0..5 {
            let keys = KeyMaterial::generate(&mut rng);
            assert!(keys.generator >= keys.modulus);
            assert!(keys.host_inter < keys.modulus);
        }
    }

    #[test]
    fn test_aes_key_layout() {
        let mut keys = KeyMaterial::from_parts(97, 13, 5);
        assert!(keys.aes_key().is_none());

        let shared = keys.complete(7);
        let key = keys.aes_key().unwrap();
        assert_eq!(&key[..8], &[0x67, 0x45, 0x23, 0x01, 0x67, 0x45, 0x23, 0x01]);
        assert_eq!(&key[8..], &shared.to_le_bytes());
    }
}
