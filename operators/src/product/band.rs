use std::sync::RwLock;

use rastercalc_datatypes::raster::{Grid2D, GridShape2D, RasterDataType};
use rastercalc_expression::{ExpressionAst, ExpressionParser};
use serde::{Deserialize, Serialize};

use crate::util::{Result, safe_read_lock};

/// Name, element type and no-data value of a band, without its pixels
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BandDescriptor {
    pub name: String,
    pub data_type: RasterDataType,
    #[serde(default)]
    pub no_data_value: Option<f64>,
}

impl BandDescriptor {
    pub fn new(name: impl Into<String>, data_type: RasterDataType) -> Self {
        Self {
            name: name.into(),
            data_type,
            no_data_value: None,
        }
    }

    #[must_use]
    pub fn with_no_data_value(mut self, no_data_value: Option<f64>) -> Self {
        self.no_data_value = no_data_value;
        self
    }
}

/// Where the pixels of a band come from
#[derive(Debug)]
pub enum BandSource {
    /// Owned pixel storage, written tile by tile
    Materialized(RwLock<Grid2D<f64>>),
    /// A formula that is evaluated whenever the band is read
    Virtual(ExpressionAst),
}

/// A named raster layer of a [`super::Product`].
///
/// Whether a band is materialized or virtual is fixed when it is created.
#[derive(Debug)]
pub struct Band {
    descriptor: BandDescriptor,
    source: BandSource,
}

impl Band {
    /// A materialized band of `shape` with all pixels set to zero
    pub fn materialized(
        name: impl Into<String>,
        data_type: RasterDataType,
        shape: GridShape2D,
    ) -> Self {
        Self {
            descriptor: BandDescriptor::new(name, data_type),
            source: BandSource::Materialized(RwLock::new(Grid2D::new_filled(shape, 0.0))),
        }
    }

    /// A materialized band holding `data`, converted to `data_type`
    pub fn from_data(
        name: impl Into<String>,
        data_type: RasterDataType,
        data: Grid2D<f64>,
    ) -> Self {
        Self {
            descriptor: BandDescriptor::new(name, data_type),
            source: BandSource::Materialized(RwLock::new(data.map(|v| data_type.cast(v)))),
        }
    }

    /// A virtual band computed from `formula`
    ///
    /// # Errors
    ///
    /// Fails with `FormulaSyntax` if the formula cannot be parsed.
    ///
    pub fn virtual_band(
        name: impl Into<String>,
        data_type: RasterDataType,
        formula: &str,
    ) -> Result<Self> {
        let expression = ExpressionParser::default().parse(formula)?;
        Ok(Self::from_expression(name, data_type, expression))
    }

    pub fn from_expression(
        name: impl Into<String>,
        data_type: RasterDataType,
        expression: ExpressionAst,
    ) -> Self {
        Self {
            descriptor: BandDescriptor::new(name, data_type),
            source: BandSource::Virtual(expression),
        }
    }

    #[must_use]
    pub fn with_no_data_value(mut self, no_data_value: f64) -> Self {
        self.descriptor.no_data_value = Some(no_data_value);
        self
    }

    pub fn name(&self) -> &str {
        &self.descriptor.name
    }

    pub fn data_type(&self) -> RasterDataType {
        self.descriptor.data_type
    }

    pub fn no_data_value(&self) -> Option<f64> {
        self.descriptor.no_data_value
    }

    pub fn descriptor(&self) -> &BandDescriptor {
        &self.descriptor
    }

    pub fn source(&self) -> &BandSource {
        &self.source
    }

    pub fn is_virtual(&self) -> bool {
        matches!(self.source, BandSource::Virtual(_))
    }

    /// The formula of a virtual band
    pub fn expression(&self) -> Option<&ExpressionAst> {
        match &self.source {
            BandSource::Virtual(expression) => Some(expression),
            BandSource::Materialized(_) => None,
        }
    }

    /// The shape of the storage of a materialized band
    pub(crate) fn storage_shape(&self) -> Option<GridShape2D> {
        match &self.source {
            BandSource::Materialized(grid) => Some(safe_read_lock(grid).shape),
            BandSource::Virtual(_) => None,
        }
    }

    /// Checks if `value` equals the no-data value of the band
    #[allow(clippy::float_cmp)]
    pub fn is_no_data(&self, value: f64) -> bool {
        self.descriptor.no_data_value.is_some_and(|no_data| {
            value == no_data || (no_data.is_nan() && value.is_nan())
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::Error;

    #[test]
    fn stored_values_are_converted() {
        let data = Grid2D::new([1, 3].into(), vec![-1.5, 300.0, f64::NAN]).unwrap();
        let band = Band::from_data("b", RasterDataType::U8, data);

        let BandSource::Materialized(grid) = band.source() else {
            panic!("expected a materialized band");
        };
        assert_eq!(safe_read_lock(grid).data, vec![0.0, 255.0, 0.0]);
        assert!(!band.is_virtual());
    }

    #[test]
    fn virtual_bands_are_parsed_at_declaration() {
        let band = Band::virtual_band("v", RasterDataType::F32, "b1 * 2 + X").unwrap();

        assert!(band.is_virtual());
        assert_eq!(
            band.expression()
                .unwrap()
                .referenced_variables()
                .collect::<Vec<_>>(),
            vec!["X", "b1"]
        );
        assert!(band.storage_shape().is_none());

        assert!(matches!(
            Band::virtual_band("v", RasterDataType::F32, "b1 +* 2"),
            Err(Error::FormulaSyntax { .. })
        ));
    }

    #[test]
    fn no_data_detection() {
        let band = Band::materialized("b", RasterDataType::F64, [1, 1].into());
        assert!(!band.is_no_data(0.0));

        let band = band.with_no_data_value(-9999.0);
        assert!(band.is_no_data(-9999.0));
        assert!(!band.is_no_data(0.0));

        let band = Band::materialized("n", RasterDataType::F64, [1, 1].into())
            .with_no_data_value(f64::NAN);
        assert!(band.is_no_data(f64::NAN));
    }
}
