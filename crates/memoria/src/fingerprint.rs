// Copyright (c) Microsoft Corporation.
// Licensed under the MIT License.

//! Argument fingerprinting.
//!
//! A [`Fingerprint`] is the cache key derived from an argument tuple. It is deterministic for
//! equal arguments, sensitive to argument order, and cheap to compute. It is not a
//! cryptographic digest: two different argument tuples may collide, in which case they share
//! a cache entry.

use std::fmt;
use std::hash::Hash;
use std::sync::Arc;

/// Prime multipliers, one per argument position.
const PRIMES: [i64; 16] = [3, 5, 7, 11, 13, 17, 19, 23, 29, 31, 37, 41, 43, 47, 53, 59];

/// Stand-in hash for an absent argument in the first position.
const ABSENT_FIRST: i64 = i64::MIN;

/// Stand-in hash for an absent argument in any later position.
const ABSENT_REST: i64 = i64::MAX;

// Fixed seeds keep fingerprints identical across every memoizer and the registry.
const SEEDS: [u64; 4] = [0x243f_6a88_85a3_08d3, 0x1319_8a2e_0370_7344, 0xa409_3822_299f_31d0, 0x082e_fa98_ec4e_6c89];

fn hasher() -> ahash::RandomState {
    ahash::RandomState::with_seeds(SEEDS[0], SEEDS[1], SEEDS[2], SEEDS[3])
}

fn hash_of<T: Hash + ?Sized>(value: &T) -> i64 {
    i64::from_ne_bytes(hasher().hash_one(value).to_ne_bytes())
}

/// The cache key derived from an argument tuple.
///
/// The two sentinel variants can never be equal to a hashed value, so a call without
/// arguments and a call with a single absent argument never share an entry with a call
/// whose arguments happen to hash to a particular number.
///
/// # Examples
///
/// ```
/// use memoria::{Arguments, Fingerprint};
///
/// assert_eq!(().fingerprint(), Fingerprint::NoArgs);
/// assert_eq!((None::<u32>,).fingerprint(), Fingerprint::NullArg);
/// assert_eq!((1, "a").fingerprint(), (1, "a").fingerprint());
/// assert_ne!((1, 2).fingerprint(), (2, 1).fingerprint());
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Fingerprint {
    /// The function takes no arguments.
    NoArgs,
    /// The function takes one argument and it is absent.
    NullArg,
    /// The combined hash of the arguments.
    Hash(i64),
}

impl fmt::Display for Fingerprint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::NoArgs => f.write_str("NOARGS"),
            Self::NullArg => f.write_str("NULLARG"),
            Self::Hash(value) => write!(f, "{value}"),
        }
    }
}

/// A single argument of a memoized function.
///
/// Arguments are identified through their [`Hash`] implementation. Types that can represent
/// a missing value override [`is_absent`](Argument::is_absent); for all others the default
/// is fine and an empty impl block is enough:
///
/// ```
/// use memoria::Argument;
///
/// #[derive(Hash)]
/// struct UserId(u64);
///
/// impl Argument for UserId {}
/// ```
pub trait Argument: Hash {
    /// Returns `true` if this argument stands for "no value".
    fn is_absent(&self) -> bool {
        false
    }
}

macro_rules! impl_argument {
    ($($ty:ty),* $(,)?) => {
        $(impl Argument for $ty {})*
    };
}

impl_argument!(
    (), bool, char, i8, i16, i32, i64, i128, isize, u8, u16, u32, u64, u128, usize, str, String
);

impl<T: Hash> Argument for Option<T> {
    fn is_absent(&self) -> bool {
        self.is_none()
    }
}

impl<T: Hash> Argument for Vec<T> {}

impl<T: Hash> Argument for [T] {}

impl<T: Hash, const N: usize> Argument for [T; N] {}

impl<T: Argument + ?Sized> Argument for &T {
    fn is_absent(&self) -> bool {
        (**self).is_absent()
    }
}

impl<T: Argument + ?Sized> Argument for Box<T> {
    fn is_absent(&self) -> bool {
        (**self).is_absent()
    }
}

impl<T: Argument + ?Sized> Argument for Arc<T> {
    fn is_absent(&self) -> bool {
        (**self).is_absent()
    }
}

/// An argument tuple of a memoized function, from zero to four elements.
///
/// Memoized functions always take their arguments as a tuple: `()` for no arguments,
/// `(a,)` for one, `(a, b)` for two, and so on.
pub trait Arguments {
    /// The number of arguments in the tuple.
    const ARITY: usize;

    /// Computes the fingerprint of the arguments.
    fn fingerprint(&self) -> Fingerprint;
}

impl Arguments for () {
    const ARITY: usize = 0;

    fn fingerprint(&self) -> Fingerprint {
        Fingerprint::NoArgs
    }
}

impl<A: Argument> Arguments for (A,) {
    const ARITY: usize = 1;

    fn fingerprint(&self) -> Fingerprint {
        if self.0.is_absent() {
            Fingerprint::NullArg
        } else {
            Fingerprint::Hash(hash_of(&self.0))
        }
    }
}

fn positional<T: Argument + ?Sized>(value: &T) -> Option<i64> {
    (!value.is_absent()).then(|| hash_of(value))
}

/// Folds positional hashes into one value, multiplying by the prime of each position.
fn combine(hashes: &[Option<i64>]) -> Fingerprint {
    debug_assert!(hashes.len() >= 2 && hashes.len() <= PRIMES.len());

    let mut positions = hashes.iter().zip(PRIMES);
    let Some((first, prime)) = positions.next() else {
        return Fingerprint::NoArgs;
    };

    let seed = first.unwrap_or(ABSENT_FIRST).wrapping_mul(prime);
    let combined = positions.fold(seed, |acc, (hash, prime)| {
        acc.wrapping_mul(prime).wrapping_add(hash.unwrap_or(ABSENT_REST))
    });

    Fingerprint::Hash(combined)
}

macro_rules! impl_arguments {
    ($arity:literal => $($name:ident : $index:tt),+) => {
        impl<$($name: Argument),+> Arguments for ($($name,)+) {
            const ARITY: usize = $arity;

            fn fingerprint(&self) -> Fingerprint {
                combine(&[$(positional(&self.$index)),+])
            }
        }
    };
}

impl_arguments!(2 => A: 0, B: 1);
impl_arguments!(3 => A: 0, B: 1, C: 2);
impl_arguments!(4 => A: 0, B: 1, C: 2, D: 3);

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn no_args_sentinel() {
        assert_eq!(().fingerprint(), Fingerprint::NoArgs);
        assert_eq!(().fingerprint().to_string(), "NOARGS");
        assert_eq!(<() as Arguments>::ARITY, 0);
    }

    #[test]
    fn single_absent_argument_is_null_sentinel() {
        assert_eq!((None::<String>,).fingerprint(), Fingerprint::NullArg);
        assert_eq!((None::<String>,).fingerprint().to_string(), "NULLARG");
    }

    #[test]
    fn single_argument_uses_its_hash() {
        let fingerprint = ("x".to_string(),).fingerprint();

        assert_eq!(fingerprint, Fingerprint::Hash(hash_of("x")));
        assert_eq!(fingerprint.to_string(), hash_of("x").to_string());
    }

    #[test]
    fn present_option_hashes_like_a_value() {
        assert!(matches!((Some(7_u32),).fingerprint(), Fingerprint::Hash(_)));
    }

    #[test]
    fn deterministic() {
        assert_eq!(("x", 1).fingerprint(), ("x", 1).fingerprint());
        assert_eq!(
            (1_u8, "two".to_string(), vec![3_u16], 'c').fingerprint(),
            (1_u8, "two".to_string(), vec![3_u16], 'c').fingerprint()
        );
    }

    #[test]
    fn borrowed_and_owned_strings_agree() {
        assert_eq!(("x", 1).fingerprint(), ("x".to_string(), 1).fingerprint());
    }

    #[test]
    fn order_sensitive() {
        assert_ne!(("a", "b").fingerprint(), ("b", "a").fingerprint());
        assert_ne!((1, 2, 3).fingerprint(), (3, 2, 1).fingerprint());
    }

    #[test]
    fn combination_follows_prime_fold() {
        let (a, b, c) = (hash_of(&10_u64), hash_of(&20_u64), hash_of(&30_u64));
        let expected = a.wrapping_mul(3).wrapping_mul(5).wrapping_add(b).wrapping_mul(7).wrapping_add(c);

        assert_eq!((10_u64, 20_u64, 30_u64).fingerprint(), Fingerprint::Hash(expected));
    }

    #[test]
    fn absent_arguments_use_positional_sentinels() {
        let b = hash_of(&Some(5_i32));
        let expected = ABSENT_FIRST.wrapping_mul(3).wrapping_mul(5).wrapping_add(b);
        assert_eq!((None::<i32>, Some(5_i32)).fingerprint(), Fingerprint::Hash(expected));

        let a = hash_of(&Some(5_i32));
        let expected = a.wrapping_mul(3).wrapping_mul(5).wrapping_add(ABSENT_REST);
        assert_eq!((Some(5_i32), None::<i32>).fingerprint(), Fingerprint::Hash(expected));
    }

    #[test]
    fn smart_pointers_forward_absence() {
        assert_eq!((Box::new(None::<u8>),).fingerprint(), Fingerprint::NullArg);
        assert_eq!((Arc::new(None::<u8>),).fingerprint(), Fingerprint::NullArg);
        assert_eq!((&None::<u8>,).fingerprint(), Fingerprint::NullArg);
    }

    #[test]
    fn arity_is_reported() {
        assert_eq!(<(u8, u8, u8, u8) as Arguments>::ARITY, 4);
    }
}
