use rastercalc_datatypes::primitives::{Pin, PixelPos, Shape};
use rastercalc_datatypes::raster::{GridGeometry, RasterTile2D, TileInformation};
use serde::{Deserialize, Serialize};
use snafu::{OptionExt, ensure};

use crate::engine::{BandDescriptor, RasterOperator, TargetSpec, TileContext};
use crate::error::{self, Error};
use crate::product::Product;
use crate::util::Result;

/// A rectangle in pixel coordinates
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PixelRegion {
    pub x: usize,
    pub y: usize,
    pub width: usize,
    pub height: usize,
}

impl PixelRegion {
    pub fn new(x: usize, y: usize, width: usize, height: usize) -> Self {
        Self {
            x,
            y,
            width,
            height,
        }
    }

    pub fn is_empty(&self) -> bool {
        self.width == 0 || self.height == 0
    }

    /// The part of the region that lies inside a `width × height` grid
    #[must_use]
    pub fn clip(&self, width: usize, height: usize) -> Self {
        let x = self.x.min(width);
        let y = self.y.min(height);

        Self {
            x,
            y,
            width: self.width.min(width - x),
            height: self.height.min(height - y),
        }
    }

    fn contains(&self, position: PixelPos) -> bool {
        position.x >= self.x as f64
            && position.y >= self.y as f64
            && position.x < (self.x + self.width) as f64
            && position.y < (self.y + self.height) as f64
    }
}

fn default_sub_sampling() -> usize {
    1
}

fn default_copy_pins() -> bool {
    true
}

/// Parameters of a [`Subset`]
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SubsetParams {
    /// The bands to copy, all bands if `None`
    #[serde(default)]
    pub band_names: Option<Vec<String>>,
    /// The region in source pixels, clipped to the source grid
    #[serde(default)]
    pub region: Option<PixelRegion>,
    /// A region in world coordinates; its bounding box is mapped to pixels.
    /// Ignored if `region` is given.
    #[serde(default)]
    pub geo_region: Option<Shape>,
    #[serde(default = "default_sub_sampling")]
    pub sub_sampling_x: usize,
    #[serde(default = "default_sub_sampling")]
    pub sub_sampling_y: usize,
    /// Copies the pins inside the region, moved to the target grid
    #[serde(default = "default_copy_pins")]
    pub copy_pins: bool,
}

impl Default for SubsetParams {
    fn default() -> Self {
        Self {
            band_names: None,
            region: None,
            geo_region: None,
            sub_sampling_x: 1,
            sub_sampling_y: 1,
            copy_pins: true,
        }
    }
}

/// Copies a selection of bands, a pixel region and every n-th pixel of a product.
///
/// Virtual source bands become materialized bands of the target.
#[derive(Debug, Clone)]
pub struct Subset {
    params: SubsetParams,
    region: Option<PixelRegion>,
}

impl Subset {
    pub fn new(params: SubsetParams) -> Self {
        Self {
            params,
            region: None,
        }
    }

    pub fn params(&self) -> &SubsetParams {
        &self.params
    }

    fn source_region(&self, source: &Product) -> Result<PixelRegion> {
        let full = PixelRegion::new(0, 0, source.width(), source.height());

        let region = match (&self.params.region, &self.params.geo_region) {
            (Some(region), _) => *region,
            (None, Some(shape)) => Self::pixel_region_of_shape(shape, source)?,
            (None, None) => full,
        };

        let clipped = region.clip(source.width(), source.height());

        ensure!(
            !clipped.is_empty(),
            error::InvalidOperatorSpec {
                reason: format!("the subset region {region:?} does not overlap the product"),
            }
        );

        Ok(clipped)
    }

    fn pixel_region_of_shape(shape: &Shape, source: &Product) -> Result<PixelRegion> {
        let bounding_box = shape.bounding_box().ok_or_else(|| Error::InvalidOperatorSpec {
            reason: "the geographic subset region is empty".to_string(),
        })?;

        let corners = bounding_box
            .corners()
            .into_iter()
            .map(|corner| source.grid().world_to_pixel(corner))
            .collect::<Result<Vec<_>, _>>()?;

        let min_x = corners.iter().map(|p| p.x).fold(f64::INFINITY, f64::min);
        let min_y = corners.iter().map(|p| p.y).fold(f64::INFINITY, f64::min);
        let max_x = corners.iter().map(|p| p.x).fold(f64::NEG_INFINITY, f64::max);
        let max_y = corners.iter().map(|p| p.y).fold(f64::NEG_INFINITY, f64::max);

        let x = min_x.floor().max(0.0);
        let y = min_y.floor().max(0.0);
        let x_end = max_x.ceil().max(0.0);
        let y_end = max_y.ceil().max(0.0);

        Ok(PixelRegion::new(
            x as usize,
            y as usize,
            (x_end - x) as usize,
            (y_end - y) as usize,
        ))
    }

    fn selected_bands(&self, source: &Product) -> Result<Vec<BandDescriptor>> {
        match &self.params.band_names {
            None => Ok(source
                .bands()
                .iter()
                .map(|band| band.descriptor().clone())
                .collect()),
            Some(names) => names
                .iter()
                .map(|name| {
                    source
                        .band(name)
                        .map(|band| band.descriptor().clone())
                        .ok_or_else(|| Error::UnknownBand { band: name.clone() })
                })
                .collect(),
        }
    }

    /// Moves the pins inside the region to the target grid, whose pixel centres lie on the
    /// centres of the sampled source pixels
    fn subset_pins(
        &self,
        source: &Product,
        region: PixelRegion,
        target: &GridGeometry,
    ) -> Vec<Pin> {
        if !self.params.copy_pins {
            return Vec::new();
        }

        let step_x = self.params.sub_sampling_x as f64;
        let step_y = self.params.sub_sampling_y as f64;
        let origin_x = region.x as f64 - (step_x - 1.0) / 2.0;
        let origin_y = region.y as f64 - (step_y - 1.0) / 2.0;

        source
            .pins()
            .iter()
            .filter(|pin| region.contains(pin.position))
            .map(|pin| Pin {
                position: PixelPos::new(
                    (pin.position.x - origin_x) / step_x,
                    (pin.position.y - origin_y) / step_y,
                ),
                velocity: PixelPos::new(pin.velocity.x / step_x, pin.velocity.y / step_y),
                ..pin.clone()
            })
            .filter(|pin| {
                pin.position.x < target.width() as f64 && pin.position.y < target.height() as f64
            })
            .collect()
    }
}

impl RasterOperator for Subset {
    fn initialize(&mut self, source: &Product) -> Result<TargetSpec> {
        let step_x = self.params.sub_sampling_x;
        let step_y = self.params.sub_sampling_y;

        ensure!(
            step_x > 0 && step_y > 0,
            error::InvalidOperatorSpec {
                reason: format!("sub-sampling must be positive, got {step_x} × {step_y}"),
            }
        );

        let bands = self.selected_bands(source)?;
        for band in &bands {
            let source_band = source.band(&band.name).context(error::UnknownBand {
                band: &band.name,
            })?;
            source
                .check_band_dependencies(source_band)
                .map_err(|error| error.with_band(band.name.as_str()))?;
        }

        let region = self.source_region(source)?;

        let grid = source.grid().subset(
            region.x,
            region.y,
            region.width,
            region.height,
            step_x,
            step_y,
        )?;

        tracing::debug!(?region, step_x, step_y, bands = bands.len(), "initialized subset");

        self.region = Some(region);
        let pins = self.subset_pins(source, region, &grid);

        Ok(TargetSpec {
            name: format!("{}_subset", source.name()),
            grid,
            bands,
            pins,
        })
    }

    fn compute_tile(
        &self,
        source: &Product,
        band: &BandDescriptor,
        tile: &mut RasterTile2D<f64>,
        _ctx: &TileContext,
    ) -> Result<()> {
        let region = self.region.ok_or_else(|| Error::InvalidOperatorSpec {
            reason: "the subset was not initialized".to_string(),
        })?;

        let step_x = self.params.sub_sampling_x;
        let step_y = self.params.sub_sampling_y;
        let target = tile.tile_information;

        let source_tile = TileInformation::region(
            region.x + target.x0() * step_x,
            region.y + target.y0() * step_y,
            (target.width() - 1) * step_x + 1,
            (target.height() - 1) * step_y + 1,
        );

        let source_band = source
            .band(&band.name)
            .context(error::UnknownBand { band: &band.name })?;
        let values = source.read_tile_prechecked(source_band, &source_tile)?;
        let source_width = source_tile.width();

        for (index, value) in tile.data_mut().iter_mut().enumerate() {
            let x = (index % target.width()) * step_x;
            let y = (index / target.width()) * step_y;
            *value = values.data()[y * source_width + x];
        }

        Ok(())
    }
}
