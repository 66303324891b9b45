//! Number theory used by the key exchange
//!
//! All values fit in 64 bits; intermediate products are widened to 128 bits
//! so nothing overflows.

use rand::Rng;

/// Primes are drawn below this bound
pub const PRIME_LIMIT: u64 = 1 << 31;

/// Miller-Rabin rounds used when generating primes
pub const PRIMALITY_TRIALS: usize = 5;

/// `x^y mod n` by square-and-multiply
///
/// # Examples
///
/// ```
/// use ssprust_core::math::xpowymodn;
///
/// assert_eq!(xpowymodn(4, 13, 497), 445);
/// ```
pub fn xpowymodn(x: u64, y: u64, n: u64) -> u64 {
    if n == 1 {
        return 0;
    }

    let n = n as u128;
    let mut base = x as u128 % n;
    let mut exp = y;
    let mut result: u128 = 1;

    while exp > 0 {
        if exp & 1 == 1 {
            result = result * base % n;
        }
        base = base * base % n;
        exp >>= 1;
    }

    result as u64
}

/// One Miller-Rabin round with witness `a`; `false` proves `n` composite
///
/// `n` must be odd and greater than 3.
pub fn single_miller_rabin(n: u64, a: u64) -> bool {
    let mut d = n - 1;
    let mut s = 0;
    while d % 2 == 0 {
        d /= 2;
        s += 1;
    }

    let mut x = xpowymodn(a, d, n);
    if x == 1 || x == n - 1 {
        return true;
    }

    for _ in 1..s {
        x = xpowymodn(x, 2, n);
        if x == n - 1 {
            return true;
        }
        if x == 1 {
            return false;
        }
    }

    false
}

/// Test `n` against a fixed list of witnesses
pub fn miller_rabin_with(n: u64, witnesses: &[u64]) -> bool {
    match n {
        0 | 1 => false,
        2 | 3 => true,
        _ if n % 2 == 0 => false,
        _ => witnesses
            .iter()
            .map(|&a| a % (n - 3) + 2)
            .all(|a| single_miller_rabin(n, a)),
    }
}

/// Probabilistic primality test with `trials` random witnesses in `[2, n-2]`
pub fn miller_rabin<R: Rng + ?Sized>(n: u64, trials: usize, rng: &mut R) -> bool {
    let witnesses: Vec<u64> = (0..trials).map(|_| rng.gen_range(0..u64::MAX)).collect();
    miller_rabin_with(n, &witnesses)
}

/// Uniform random value in `[0, limit)`
pub fn random_below<R: Rng + ?Sized>(rng: &mut R, limit: u64) -> u64 {
    rng.gen_range(0..limit)
}

/// Odd probable prime below [`PRIME_LIMIT`]
///
/// Starts from a random odd value and walks upwards in steps of two until a
/// candidate survives [`PRIMALITY_TRIALS`] rounds.
pub fn generate_prime<R: Rng + ?Sized>(rng: &mut R) -> u64 {
    loop {
        let mut candidate = random_below(rng, PRIME_LIMIT) | 1;
        while candidate < PRIME_LIMIT {
            if candidate > 3 && miller_rabin(candidate, PRIMALITY_TRIALS, rng) {
                return candidate;
            }
            candidate += 2;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;
    use rand::{rngs::StdRng, SeedableRng};

    fn naive_powmod(x: u64, y: u64, n: u64) -> u64 {
        let mut r = 1 % n;
        for _ in 0..y {
            r = r * (x % n) % n;
        }
        r
    }

    #[test]
    fn test_zero_exponent() {
        for n in [2, 3, 97, 1 << 31] {
            assert_eq!(xpowymodn(12345, 0, n), 1);
        }
    }

    #[test]
    fn test_large_modulus_does_not_overflow() {
        let p = 2_147_483_647; // 2^31 - 1
        // Fermat: a^(p-1) = 1 mod p
        assert_eq!(xpowymodn(2_000_000_000, p - 1, p), 1);
    }

    #[test]
    fn test_known_primes_accepted() {
        let mut rng = StdRng::seed_from_u64(7);
        for p in [5u64, 7, 13, 97, 7919, 2_147_483_647] {
            assert!(miller_rabin(p, PRIMALITY_TRIALS, &mut rng), "{} is prime", p);
        }
    }

    #[test]
    fn test_known_composites_rejected() {
        let mut rng = StdRng::seed_from_u64(7);
        for c in [9u64, 15, 21, 341, 561, 7917] {
            assert!(!miller_rabin(c, 20, &mut rng), "{} is composite", c);
        }
    }

    #[test]
    fn test_pseudoprime_caught_by_witness() {
        // 341 = 11 * 31 is a Fermat pseudoprime to base 2
        assert_eq!(xpowymodn(2, 340, 341), 1);
        assert!(!miller_rabin_with(341, &[0]));
    }

    #[test]
    fn test_small_inputs() {
        assert!(!miller_rabin_with(0, &[]));
        assert!(!miller_rabin_with(1, &[]));
        assert!(miller_rabin_with(2, &[]));
        assert!(miller_rabin_with(3, &[]));
        assert!(!miller_rabin_with(4, &[]));
    }

    #[test]
    fn test_generated_prime() {
        let mut rng = StdRng::seed_from_u64(42);
        for _ in 0..10 {
            let p = generate_prime(&mut rng);
            assert!(p < PRIME_LIMIT);
            assert_eq!(p % 2, 1);
            assert!(miller_rabin(p, 20, &mut rng));
        }
    }

    proptest! {
        #[test]
        fn matches_naive(x in 0u64..1000, y in 0u64..64, n in 2u64..1000) {
            prop_assert_eq!(xpowymodn(x, y, n), naive_powmod(x, y, n));
        }
    }
}
