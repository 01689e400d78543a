pub trait Identifier: Sized {
    /// Create a new (random) identifier
    fn new() -> Self;
}

/// Declares a uuid-backed identifier type
#[macro_export]
macro_rules! identifier {
    ($id_name: ident) => {
        #[derive(
            Debug, PartialEq, Eq, PartialOrd, Ord, serde::Serialize, serde::Deserialize, Clone, Copy, Hash,
        )]
        pub struct $id_name(pub uuid::Uuid);

        impl $id_name {
            pub const fn from_u128(v: u128) -> Self {
                Self(uuid::Uuid::from_u128(v))
            }
        }

        impl $crate::util::Identifier for $id_name {
            fn new() -> Self {
                Self(uuid::Uuid::new_v4())
            }
        }

        impl std::fmt::Display for $id_name {
            fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
                write!(f, "{}", self.0)
            }
        }

        impl std::str::FromStr for $id_name {
            type Err = $crate::error::Error;

            fn from_str(s: &str) -> Result<Self, Self::Err> {
                Ok(Self(
                    uuid::Uuid::from_str(s).map_err(|_error| $crate::error::Error::InvalidUuid)?,
                ))
            }
        }
    };
}

#[cfg(test)]
mod tests {
    use super::Identifier;
    use std::str::FromStr;

    crate::identifier!(TestId);

    #[test]
    fn identifiers_are_unique_and_parseable() {
        let a = TestId::new();
        let b = TestId::new();
        assert_ne!(a, b);

        assert_eq!(TestId::from_str(&a.to_string()).unwrap(), a);
        assert!(TestId::from_str("not-a-uuid").is_err());
        assert_eq!(
            TestId::from_u128(1).to_string(),
            "00000000-0000-0000-0000-000000000001"
        );
    }
}
