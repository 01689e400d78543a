use std::collections::HashSet;

use rastercalc_datatypes::raster::{RasterDataType, RasterTile2D};
use rastercalc_expression::{ExpressionAst, ExpressionParser};
use serde::{Deserialize, Serialize};
use snafu::{OptionExt, ensure};

use crate::engine::{BandDescriptor, RasterOperator, TargetSpec, TileContext};
use crate::error;
use crate::product::Product;
use crate::util::Result;

fn default_data_type() -> RasterDataType {
    RasterDataType::F32
}

/// A band of the target product and the formula it is computed from
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TargetBand {
    pub name: String,
    pub expression: String,
    #[serde(default = "default_data_type")]
    pub data_type: RasterDataType,
    /// Replaces results that are not finite
    #[serde(default)]
    pub no_data_value: Option<f64>,
}

impl TargetBand {
    pub fn new(name: impl Into<String>, expression: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            expression: expression.into(),
            data_type: default_data_type(),
            no_data_value: None,
        }
    }

    #[must_use]
    pub fn with_data_type(mut self, data_type: RasterDataType) -> Self {
        self.data_type = data_type;
        self
    }

    #[must_use]
    pub fn with_no_data_value(mut self, no_data_value: f64) -> Self {
        self.no_data_value = Some(no_data_value);
        self
    }
}

/// Parameters of a [`BandMaths`] operator
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BandMathsParams {
    pub target_bands: Vec<TargetBand>,
    /// Name of the target product, the source name if `None`
    #[serde(default)]
    pub product_name: Option<String>,
}

/// Computes new bands from formulas over the bands and pixel coordinates of the source
#[derive(Debug, Clone)]
pub struct BandMaths {
    params: BandMathsParams,
    expressions: Vec<ExpressionAst>,
}

impl BandMaths {
    pub fn new(params: BandMathsParams) -> Self {
        Self {
            params,
            expressions: Vec::new(),
        }
    }

    /// A single target band
    pub fn single(target_band: TargetBand) -> Self {
        Self::new(BandMathsParams {
            target_bands: vec![target_band],
            product_name: None,
        })
    }

    pub fn params(&self) -> &BandMathsParams {
        &self.params
    }
}

impl RasterOperator for BandMaths {
    fn initialize(&mut self, source: &Product) -> Result<TargetSpec> {
        ensure!(
            !self.params.target_bands.is_empty(),
            error::InvalidOperatorSpec {
                reason: "band maths needs at least one target band",
            }
        );

        let parser = ExpressionParser::default();
        let mut names = HashSet::new();
        let mut expressions = Vec::with_capacity(self.params.target_bands.len());

        for target_band in &self.params.target_bands {
            ensure!(
                names.insert(target_band.name.as_str()),
                error::DuplicateBandName {
                    band: &target_band.name,
                }
            );

            let expression = parser.parse(&target_band.expression)?;
            source
                .check_references(expression.referenced_variables())
                .map_err(|error| error.with_band(target_band.name.as_str()))?;

            tracing::debug!(
                band = %target_band.name,
                expression = %target_band.expression,
                "parsed band maths expression"
            );

            expressions.push(expression);
        }

        self.expressions = expressions;

        let name = self
            .params
            .product_name
            .clone()
            .unwrap_or_else(|| source.name().to_string());

        let mut target = TargetSpec::new(name, *source.grid()).with_pins(source.pins().to_vec());
        for target_band in &self.params.target_bands {
            target = target.with_band(
                BandDescriptor::new(&target_band.name, target_band.data_type)
                    .with_no_data_value(target_band.no_data_value),
            );
        }

        Ok(target)
    }

    fn compute_tile(
        &self,
        source: &Product,
        band: &BandDescriptor,
        tile: &mut RasterTile2D<f64>,
        _ctx: &TileContext,
    ) -> Result<()> {
        let expression = self
            .params
            .target_bands
            .iter()
            .position(|target_band| target_band.name == band.name)
            .and_then(|index| self.expressions.get(index))
            .context(error::UnknownBand { band: &band.name })?;

        let values = source.evaluate_tile_prechecked(expression, &tile.tile_information)?;

        for (out, value) in tile.data_mut().iter_mut().zip(values.data()) {
            *out = match band.no_data_value {
                Some(no_data_value) if !value.is_finite() => no_data_value,
                _ => *value,
            };
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::engine::{ExecutionContext, OperatorPipeline};
    use crate::error::Error;
    use crate::product::Band;
    use rastercalc_datatypes::primitives::{Pin, PixelPos};
    use rastercalc_datatypes::raster::{Grid2D, TilingSpecification};
    use rastercalc_datatypes::util::test::TestDefault;
    use std::sync::Arc;

    fn source() -> Arc<Product> {
        let mut product = Product::new("scene", 5, 4).unwrap();
        product
            .add_band(Band::from_data(
                "red",
                RasterDataType::U16,
                Grid2D::new_filled([4, 5].into(), 20.0),
            ))
            .unwrap();
        product
            .add_band(Band::from_data(
                "nir",
                RasterDataType::U16,
                Grid2D::new([4, 5].into(), (0..20).map(|v| f64::from(v) * 10.0).collect()).unwrap(),
            ))
            .unwrap();
        product
            .add_pin(Pin::new("p", "pin", PixelPos::new(1.0, 1.0)))
            .unwrap();
        Arc::new(product)
    }

    #[test]
    fn it_computes_target_bands() {
        let operator = BandMaths::new(BandMathsParams {
            target_bands: vec![
                TargetBand::new("ndvi", "(nir - red) / (nir + red)")
                    .with_data_type(RasterDataType::F64)
                    .with_no_data_value(-1.0),
                TargetBand::new("column", "X - 0.5").with_data_type(RasterDataType::U8),
            ],
            product_name: Some("indices".to_string()),
        });

        let ctx = ExecutionContext::test_default()
            .with_tiling_specification(TilingSpecification::new([3, 2].into()).unwrap());
        let target = OperatorPipeline::run(operator, source(), &ctx).unwrap();

        assert_eq!(target.name(), "indices");
        assert_eq!(target.pins().len(), 1);

        let ndvi = target.read_band("ndvi").unwrap();
        // nir = 0 and red = 20
        assert!((ndvi.data[0] + 1.0).abs() < 1e-12);
        // nir = 20 and red = 20
        assert!(ndvi.data[2].abs() < 1e-12);
        assert!((ndvi.data[19] - 170.0 / 210.0).abs() < 1e-12);

        assert_eq!(
            target.read_band("column").unwrap().data[..5],
            [0.0, 1.0, 2.0, 3.0, 4.0]
        );
        assert_eq!(
            target.band("ndvi").unwrap().no_data_value(),
            Some(-1.0)
        );
    }

    #[test]
    fn invalid_results_become_no_data() {
        let operator = BandMaths::single(
            TargetBand::new("ratio", "red / (nir - nir)").with_no_data_value(-9999.0),
        );

        let target =
            OperatorPipeline::run(operator, source(), &ExecutionContext::test_default()).unwrap();

        assert!(
            target
                .read_band("ratio")
                .unwrap()
                .data
                .iter()
                .all(|v| *v == -9999.0)
        );
    }

    #[test]
    fn formulas_are_checked_at_initialization() {
        let source = source();

        let mut syntax = BandMaths::single(TargetBand::new("bad", "nir +"));
        assert!(matches!(
            syntax.initialize(&source),
            Err(Error::FormulaSyntax { .. })
        ));

        let mut unbound = BandMaths::single(TargetBand::new("bad", "swir * 2"));
        let error = unbound.initialize(&source).unwrap_err();
        assert!(matches!(
            error.root_cause(),
            Error::UnboundVariable { variable } if variable == "swir"
        ));

        let mut duplicate = BandMaths::new(BandMathsParams {
            target_bands: vec![TargetBand::new("a", "1"), TargetBand::new("a", "2")],
            product_name: None,
        });
        assert!(matches!(
            duplicate.initialize(&source),
            Err(Error::DuplicateBandName { band }) if band == "a"
        ));

        let mut empty = BandMaths::new(BandMathsParams {
            target_bands: vec![],
            product_name: None,
        });
        assert!(matches!(
            empty.initialize(&source),
            Err(Error::InvalidOperatorSpec { .. })
        ));
    }

    #[test]
    fn params_deserialize_with_defaults() {
        let params: BandMathsParams = serde_json::from_str(
            r#"{"targetBands": [{"name": "sum", "expression": "red + nir"}]}"#,
        )
        .unwrap();

        assert_eq!(params.target_bands, vec![TargetBand::new("sum", "red + nir")]);
        assert_eq!(params.target_bands[0].data_type, RasterDataType::F32);
        assert!(params.product_name.is_none());
    }
}
