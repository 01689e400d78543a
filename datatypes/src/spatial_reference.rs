use crate::error::{self, Error};
use serde::{Deserialize, Serialize};
use snafu::ResultExt;
use std::str::FromStr;

/// The authority part of a spatial reference, e.g. `EPSG`
#[derive(
    Debug,
    Copy,
    Clone,
    Eq,
    PartialEq,
    Ord,
    PartialOrd,
    Hash,
    strum::Display,
    strum::EnumString,
    strum::IntoStaticStr,
)]
pub enum SpatialReferenceAuthority {
    #[strum(serialize = "EPSG")]
    Epsg,
    #[strum(serialize = "SR-ORG")]
    SrOrg,
    #[strum(serialize = "IAU2000")]
    Iau2000,
    #[strum(serialize = "ESRI")]
    Esri,
}

/// A spatial reference consists of an authority and a code, written as `authority:code`
#[derive(Debug, Copy, Clone, Eq, PartialEq, Ord, PartialOrd, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct SpatialReference {
    authority: SpatialReferenceAuthority,
    code: u32,
}

impl SpatialReference {
    pub fn new(authority: SpatialReferenceAuthority, code: u32) -> Self {
        Self { authority, code }
    }

    /// the WGS 84 spatial reference system
    pub fn epsg_4326() -> Self {
        Self::new(SpatialReferenceAuthority::Epsg, 4326)
    }

    pub fn authority(&self) -> SpatialReferenceAuthority {
        self.authority
    }

    pub fn code(&self) -> u32 {
        self.code
    }
}

impl std::fmt::Display for SpatialReference {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}:{}", self.authority, self.code)
    }
}

impl FromStr for SpatialReference {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let invalid = || Error::InvalidSpatialReferenceString {
            spatial_reference_string: s.into(),
        };

        let (authority, code) = s.split_once(':').ok_or_else(invalid)?;
        let authority = authority.parse().map_err(|_| invalid())?;

        Ok(Self::new(
            authority,
            code.parse::<u32>().context(error::ParseU32)?,
        ))
    }
}

impl TryFrom<String> for SpatialReference {
    type Error = Error;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        value.parse()
    }
}

impl From<SpatialReference> for String {
    fn from(spatial_reference: SpatialReference) -> Self {
        spatial_reference.to_string()
    }
}

/// The spatial reference of a grid or shape, if it has one.
///
/// Serialized as `authority:code` or as an empty string if unreferenced.
#[derive(
    Debug, Copy, Clone, Eq, PartialEq, Ord, PartialOrd, Hash, Default, Serialize, Deserialize,
)]
#[serde(try_from = "String", into = "String")]
pub enum SpatialReferenceOption {
    SpatialReference(SpatialReference),
    #[default]
    Unreferenced,
}

impl SpatialReferenceOption {
    pub fn as_option(&self) -> Option<SpatialReference> {
        match self {
            Self::SpatialReference(spatial_reference) => Some(*spatial_reference),
            Self::Unreferenced => None,
        }
    }

    /// Two references are compatible if they are equal or if either side is unreferenced
    pub fn is_compatible_with(&self, other: &Self) -> bool {
        match (self, other) {
            (Self::Unreferenced, _) | (_, Self::Unreferenced) => true,
            (Self::SpatialReference(a), Self::SpatialReference(b)) => a == b,
        }
    }
}

impl std::fmt::Display for SpatialReferenceOption {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            SpatialReferenceOption::SpatialReference(p) => write!(f, "{p}"),
            SpatialReferenceOption::Unreferenced => Ok(()),
        }
    }
}

impl From<SpatialReference> for SpatialReferenceOption {
    fn from(spatial_reference: SpatialReference) -> Self {
        Self::SpatialReference(spatial_reference)
    }
}

impl From<Option<SpatialReference>> for SpatialReferenceOption {
    fn from(option: Option<SpatialReference>) -> Self {
        match option {
            Some(p) => SpatialReferenceOption::SpatialReference(p),
            None => SpatialReferenceOption::Unreferenced,
        }
    }
}

impl TryFrom<String> for SpatialReferenceOption {
    type Error = Error;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        if value.is_empty() {
            return Ok(SpatialReferenceOption::Unreferenced);
        }

        value.parse::<SpatialReference>().map(Into::into)
    }
}

impl From<SpatialReferenceOption> for String {
    fn from(spatial_reference: SpatialReferenceOption) -> Self {
        spatial_reference.to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn display() {
        assert_eq!(SpatialReferenceAuthority::Epsg.to_string(), "EPSG");
        assert_eq!(SpatialReferenceAuthority::SrOrg.to_string(), "SR-ORG");

        assert_eq!(
            SpatialReference::new(SpatialReferenceAuthority::Iau2000, 4711).to_string(),
            "IAU2000:4711"
        );
        assert_eq!(SpatialReferenceOption::Unreferenced.to_string(), "");
    }

    #[test]
    fn parse() {
        assert_eq!(
            "ESRI:42".parse::<SpatialReference>().unwrap(),
            SpatialReference::new(SpatialReferenceAuthority::Esri, 42)
        );

        assert!("EPSG".parse::<SpatialReference>().is_err());
        assert!("FOO:1".parse::<SpatialReference>().is_err());
        assert!(matches!(
            "EPSG:abc".parse::<SpatialReference>(),
            Err(Error::ParseU32 { .. })
        ));
    }

    #[test]
    fn spatial_reference_option_serde() {
        assert_eq!(
            serde_json::to_string(&SpatialReferenceOption::from(SpatialReference::epsg_4326()))
                .unwrap(),
            "\"EPSG:4326\""
        );
        assert_eq!(
            serde_json::to_string(&SpatialReferenceOption::Unreferenced).unwrap(),
            "\"\""
        );

        assert_eq!(
            SpatialReferenceOption::from(SpatialReference::epsg_4326()),
            serde_json::from_str("\"EPSG:4326\"").unwrap()
        );
        assert_eq!(
            SpatialReferenceOption::Unreferenced,
            serde_json::from_str("\"\"").unwrap()
        );

        assert!(serde_json::from_str::<SpatialReferenceOption>("\"foo:bar\"").is_err());
    }

    #[test]
    fn compatibility() {
        let wgs84: SpatialReferenceOption = SpatialReference::epsg_4326().into();
        let other: SpatialReferenceOption =
            SpatialReference::new(SpatialReferenceAuthority::Epsg, 3857).into();

        assert!(wgs84.is_compatible_with(&wgs84));
        assert!(wgs84.is_compatible_with(&SpatialReferenceOption::Unreferenced));
        assert!(SpatialReferenceOption::Unreferenced.is_compatible_with(&other));
        assert!(!wgs84.is_compatible_with(&other));
    }
}
