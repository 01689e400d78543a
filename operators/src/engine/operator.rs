use rastercalc_datatypes::primitives::Pin;
use rastercalc_datatypes::raster::{GridGeometry, RasterTile2D};
use serde::{Deserialize, Serialize};

use super::TileContext;
use crate::processing::{BandMaths, Subset};
use crate::product::{BandDescriptor, Product};
use crate::util::Result;

/// The layout of the product an operator creates: its grid, bands and pins
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TargetSpec {
    pub name: String,
    pub grid: GridGeometry,
    pub bands: Vec<BandDescriptor>,
    #[serde(default)]
    pub pins: Vec<Pin>,
}

impl TargetSpec {
    pub fn new(name: impl Into<String>, grid: GridGeometry) -> Self {
        Self {
            name: name.into(),
            grid,
            bands: Vec::new(),
            pins: Vec::new(),
        }
    }

    /// A target on the grid of `source` without bands
    pub fn like(source: &Product) -> Self {
        Self::new(source.name(), *source.grid())
    }

    #[must_use]
    pub fn with_band(mut self, band: BandDescriptor) -> Self {
        self.bands.push(band);
        self
    }

    #[must_use]
    pub fn with_pins(mut self, pins: Vec<Pin>) -> Self {
        self.pins = pins;
        self
    }
}

/// An operator computes a target product from a source product, one tile of one band at a time.
pub trait RasterOperator: Send + Sync {
    /// Checks the parameters against `source` and describes the target.
    ///
    /// Called once, before any tile is computed.
    fn initialize(&mut self, source: &Product) -> Result<TargetSpec>;

    /// Fills `tile` with the values of `band`.
    ///
    /// The buffer of `tile` starts out as `NaN` and is owned by the caller for this call only.
    /// Tiles of the same band never overlap and may be computed in parallel.
    fn compute_tile(
        &self,
        source: &Product,
        band: &BandDescriptor,
        tile: &mut RasterTile2D<f64>,
        ctx: &TileContext,
    ) -> Result<()>;

    fn boxed(self) -> Box<dyn RasterOperator>
    where
        Self: Sized + 'static,
    {
        Box::new(self)
    }
}

/// The operators the engine knows, plus user defined ones
pub enum TypedOperator {
    Subset(Subset),
    BandMaths(BandMaths),
    Custom(CustomOperator),
}

impl std::fmt::Debug for TypedOperator {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Subset(subset) => f.debug_tuple("Subset").field(subset).finish(),
            Self::BandMaths(band_maths) => f.debug_tuple("BandMaths").field(band_maths).finish(),
            Self::Custom(_) => f.write_str("Custom"),
        }
    }
}

impl RasterOperator for TypedOperator {
    fn initialize(&mut self, source: &Product) -> Result<TargetSpec> {
        match self {
            Self::Subset(operator) => operator.initialize(source),
            Self::BandMaths(operator) => operator.initialize(source),
            Self::Custom(operator) => operator.initialize(source),
        }
    }

    fn compute_tile(
        &self,
        source: &Product,
        band: &BandDescriptor,
        tile: &mut RasterTile2D<f64>,
        ctx: &TileContext,
    ) -> Result<()> {
        match self {
            Self::Subset(operator) => operator.compute_tile(source, band, tile, ctx),
            Self::BandMaths(operator) => operator.compute_tile(source, band, tile, ctx),
            Self::Custom(operator) => operator.compute_tile(source, band, tile, ctx),
        }
    }
}

impl From<Subset> for TypedOperator {
    fn from(operator: Subset) -> Self {
        Self::Subset(operator)
    }
}

impl From<BandMaths> for TypedOperator {
    fn from(operator: BandMaths) -> Self {
        Self::BandMaths(operator)
    }
}

impl From<CustomOperator> for TypedOperator {
    fn from(operator: CustomOperator) -> Self {
        Self::Custom(operator)
    }
}

impl From<Box<dyn RasterOperator>> for TypedOperator {
    fn from(operator: Box<dyn RasterOperator>) -> Self {
        Self::Custom(CustomOperator { inner: operator })
    }
}

/// Wraps user defined operators, either trait implementations or a pair of closures
pub struct CustomOperator {
    inner: Box<dyn RasterOperator>,
}

impl CustomOperator {
    pub fn new<O>(operator: O) -> Self
    where
        O: RasterOperator + 'static,
    {
        Self {
            inner: operator.boxed(),
        }
    }

    /// Builds an operator from an initialization and a tile closure
    pub fn from_fn<I, C>(initialize: I, compute_tile: C) -> Self
    where
        I: FnMut(&Product) -> Result<TargetSpec> + Send + Sync + 'static,
        C: Fn(&Product, &BandDescriptor, &mut RasterTile2D<f64>, &TileContext) -> Result<()>
            + Send
            + Sync
            + 'static,
    {
        Self::new(FnOperator {
            initialize,
            compute_tile,
        })
    }
}

impl RasterOperator for CustomOperator {
    fn initialize(&mut self, source: &Product) -> Result<TargetSpec> {
        self.inner.initialize(source)
    }

    fn compute_tile(
        &self,
        source: &Product,
        band: &BandDescriptor,
        tile: &mut RasterTile2D<f64>,
        ctx: &TileContext,
    ) -> Result<()> {
        self.inner.compute_tile(source, band, tile, ctx)
    }
}

struct FnOperator<I, C> {
    initialize: I,
    compute_tile: C,
}

impl<I, C> RasterOperator for FnOperator<I, C>
where
    I: FnMut(&Product) -> Result<TargetSpec> + Send + Sync,
    C: Fn(&Product, &BandDescriptor, &mut RasterTile2D<f64>, &TileContext) -> Result<()>
        + Send
        + Sync,
{
    fn initialize(&mut self, source: &Product) -> Result<TargetSpec> {
        (self.initialize)(source)
    }

    fn compute_tile(
        &self,
        source: &Product,
        band: &BandDescriptor,
        tile: &mut RasterTile2D<f64>,
        ctx: &TileContext,
    ) -> Result<()> {
        (self.compute_tile)(source, band, tile, ctx)
    }
}
