//! Deterministic 64-bit identities for types and functions.
//!
//! Every type descriptor and every declared function gets a [`TypeHash`]
//! computed from its name (and, for functions, its owner and parameter
//! types). Two declarations with the same hash are the same entity, which is
//! how duplicate function signatures are detected.

use std::fmt;
use xxhash_rust::xxh64::xxh64;

/// Domain mixing constants so types and functions never share a hash.
mod domain {
    pub const SEP: u64 = 0x4bc94d6bd06053ad;
    pub const TYPE: u64 = 0x2fac10b63a6cc57c;
    pub const FUNCTION: u64 = 0x5ea77ffbcdf5f302;
    pub const INSTANCE: u64 = 0x9a7f3d5e2b8c4601;

    /// Position markers, so `(int, long)` and `(long, int)` differ.
    pub const POSITION: [u64; 8] = [
        0x9e3779b97f4a7c15,
        0xbf58476d1ce4e5b9,
        0x94d049bb133111eb,
        0xd6e8feb86659fd93,
        0xe7037ed1a0b428db,
        0xc6a4a7935bd1e995,
        0x8648dbbc94d49b8d,
        0xa2b48b2c69e0d657,
    ];
}

/// A deterministic hash identifying a type or a function signature.
#[derive(Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
#[repr(transparent)]
pub struct TypeHash(pub u64);

impl TypeHash {
    /// Hash of nothing; never produced by the constructors below.
    pub const EMPTY: TypeHash = TypeHash(0);

    /// Hash a (qualified) type name.
    #[inline]
    pub fn from_name(name: &str) -> Self {
        TypeHash(domain::TYPE ^ xxh64(name.as_bytes(), 0))
    }

    /// Hash a generic instantiation such as `List<int>` from its generic
    /// definition and argument hashes.
    #[inline]
    pub fn from_instance(generic: &str, args: &[TypeHash]) -> Self {
        let seed = domain::INSTANCE ^ xxh64(generic.as_bytes(), 0);
        TypeHash(mix(seed, args))
    }

    /// Hash a function signature: owner type, name and parameter types.
    ///
    /// The return type does not participate, so two functions differing only
    /// by return type collide.
    #[inline]
    pub fn from_function(owner: TypeHash, name: &str, params: &[TypeHash]) -> Self {
        let seed = domain::FUNCTION ^ owner.0 ^ xxh64(name.as_bytes(), 0);
        TypeHash(mix(seed, params))
    }

    /// Whether this is [`TypeHash::EMPTY`].
    #[inline]
    pub const fn is_empty(self) -> bool {
        self.0 == 0
    }
}

fn mix(seed: u64, parts: &[TypeHash]) -> u64 {
    parts.iter().enumerate().fold(seed, |hash, (i, part)| {
        let marker = domain::POSITION[i % domain::POSITION.len()].wrapping_add((i / domain::POSITION.len()) as u64);
        hash.wrapping_mul(domain::SEP).wrapping_add(marker ^ part.0)
    })
}

impl fmt::Debug for TypeHash {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "TypeHash({:#018x})", self.0)
    }
}

impl fmt::Display for TypeHash {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:#018x}", self.0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn names_hash_deterministically() {
        assert_eq!(TypeHash::from_name("Point"), TypeHash::from_name("Point"));
        assert_ne!(TypeHash::from_name("Point"), TypeHash::from_name("point"));
        assert!(!TypeHash::from_name("Point").is_empty());
    }

    #[test]
    fn function_hash_depends_on_parameter_order() {
        let owner = TypeHash::from_name("<ScriptRootType>");
        let int = TypeHash::from_name("int");
        let long = TypeHash::from_name("long");

        let a = TypeHash::from_function(owner, "f", &[int, long]);
        let b = TypeHash::from_function(owner, "f", &[long, int]);
        let c = TypeHash::from_function(owner, "f", &[int, long]);
        assert_ne!(a, b);
        assert_eq!(a, c);
    }

    #[test]
    fn function_and_type_domains_differ() {
        let owner = TypeHash::EMPTY;
        assert_ne!(TypeHash::from_function(owner, "x", &[]), TypeHash::from_name("x"));
    }

    #[test]
    fn instance_hash_depends_on_arguments() {
        let int = TypeHash::from_name("int");
        let string = TypeHash::from_name("string");
        assert_ne!(
            TypeHash::from_instance("Dict", &[int, string]),
            TypeHash::from_instance("Dict", &[string, int])
        );
    }
}
