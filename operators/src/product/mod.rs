mod band;
mod dependencies;

use std::collections::HashMap;

pub use band::{Band, BandDescriptor, BandSource};

use rastercalc_datatypes::primitives::Pin;
use rastercalc_datatypes::raster::{
    Grid2D, GridGeometry, GridShape2D, RasterDataType, RasterTile2D, TileInformation,
};
use rastercalc_expression::ExpressionAst;
use snafu::{OptionExt, ensure};

use crate::error::{self, Error};
use crate::util::{Result, safe_read_lock, safe_write_lock};

/// Variable bound to the pixel-centre column of the evaluated pixel
pub const X_VARIABLE: &str = "X";
/// Variable bound to the pixel-centre row of the evaluated pixel
pub const Y_VARIABLE: &str = "Y";

pub(crate) fn is_coordinate_variable(name: &str) -> bool {
    name == X_VARIABLE || name == Y_VARIABLE
}

/// A raster product: a grid with an ordered list of uniquely named bands and a list of pins.
///
/// The grid cannot change once the product exists. Materialized bands can be written
/// concurrently through a shared reference as long as the written tiles do not overlap.
#[derive(Debug)]
pub struct Product {
    name: String,
    grid: GridGeometry,
    bands: Vec<Band>,
    pins: Vec<Pin>,
}

impl Product {
    /// Creates an empty product in pixel coordinates
    ///
    /// # Errors
    ///
    /// Fails if `width` or `height` is zero.
    ///
    pub fn new(name: impl Into<String>, width: usize, height: usize) -> Result<Self> {
        Ok(Self::from_grid(name, GridGeometry::new(width, height)?))
    }

    pub fn from_grid(name: impl Into<String>, grid: GridGeometry) -> Self {
        Self {
            name: name.into(),
            grid,
            bands: Vec::new(),
            pins: Vec::new(),
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn grid(&self) -> &GridGeometry {
        &self.grid
    }

    pub fn width(&self) -> usize {
        self.grid.width()
    }

    pub fn height(&self) -> usize {
        self.grid.height()
    }

    pub fn shape(&self) -> GridShape2D {
        self.grid.shape()
    }

    /// A single tile spanning the whole grid
    pub fn full_tile_information(&self) -> TileInformation {
        TileInformation::region(0, 0, self.width(), self.height())
    }

    pub fn bands(&self) -> &[Band] {
        &self.bands
    }

    pub fn band_names(&self) -> impl Iterator<Item = &str> {
        self.bands.iter().map(Band::name)
    }

    pub fn band(&self, name: &str) -> Option<&Band> {
        self.bands.iter().find(|band| band.name() == name)
    }

    pub fn contains_band(&self, name: &str) -> bool {
        self.band(name).is_some()
    }

    fn existing_band(&self, name: &str) -> Result<&Band> {
        self.band(name).context(error::UnknownBand { band: name })
    }

    /// Appends `band` to the product.
    ///
    /// References of virtual bands are resolved when the band is read, so bands may refer
    /// to bands that are added later.
    ///
    /// # Errors
    ///
    /// Fails if the name is empty, reserved for a coordinate or already taken, or if the
    /// storage of a materialized band does not match the grid.
    ///
    pub fn add_band(&mut self, band: Band) -> Result<()> {
        let name = band.name();

        ensure!(
            !name.trim().is_empty() && !is_coordinate_variable(name),
            error::InvalidBandName { band: name }
        );
        ensure!(
            !self.contains_band(name),
            error::DuplicateBandName { band: name }
        );

        if let Some(storage_shape) = band.storage_shape() {
            ensure!(
                storage_shape == self.shape(),
                error::BandShapeMismatch {
                    band: name,
                    expected: self.shape().into_inner(),
                    found: storage_shape.into_inner(),
                }
            );
        }

        tracing::debug!(
            product = %self.name,
            band = name,
            virtual_band = band.is_virtual(),
            "adding band"
        );

        self.bands.push(band);
        Ok(())
    }

    /// Adds a zero-filled materialized band
    pub fn add_materialized_band(
        &mut self,
        name: impl Into<String>,
        data_type: RasterDataType,
    ) -> Result<()> {
        self.add_band(Band::materialized(name, data_type, self.shape()))
    }

    /// Parses `formula` and adds a virtual band computing it
    pub fn add_virtual_band(
        &mut self,
        name: impl Into<String>,
        data_type: RasterDataType,
        formula: &str,
    ) -> Result<()> {
        self.add_band(Band::virtual_band(name, data_type, formula)?)
    }

    /// Removes a band. Virtual bands referring to it fail to evaluate afterwards.
    pub fn remove_band(&mut self, name: &str) -> Result<Band> {
        let position = self
            .bands
            .iter()
            .position(|band| band.name() == name)
            .context(error::UnknownBand { band: name })?;

        Ok(self.bands.remove(position))
    }

    /// Reads the pixels of `tile` from a band.
    ///
    /// Virtual bands are evaluated for every pixel of the tile. Their dependencies are
    /// checked for missing bands and cycles before anything is evaluated.
    ///
    /// # Errors
    ///
    /// Fails if the band does not exist, the tile is not inside the grid, or a virtual
    /// band refers to a missing band (`UnboundVariable`) or depends on itself (`CyclicDependency`).
    ///
    pub fn read_tile(&self, band: &str, tile: &TileInformation) -> Result<RasterTile2D<f64>> {
        let band = self.existing_band(band)?;
        self.check_band_dependencies(band)?;

        self.read_tile_prechecked(band, tile)
    }

    /// Reads a tile of a band whose dependencies passed [`Self::check_band_dependencies`].
    ///
    /// Callers that read many tiles of the same band check once and read with this.
    pub(crate) fn read_tile_prechecked(
        &self,
        band: &Band,
        tile: &TileInformation,
    ) -> Result<RasterTile2D<f64>> {
        self.ensure_tile_inside(tile)?;
        self.read_tile_cached(band, tile, &mut TileCache::new())
    }

    /// Reads a whole band
    pub fn read_band(&self, band: &str) -> Result<Grid2D<f64>> {
        Ok(self
            .read_tile(band, &self.full_tile_information())?
            .into_grid())
    }

    /// Writes a tile into a materialized band. Values are converted to the band's data type.
    ///
    /// # Errors
    ///
    /// Fails with `ReadOnlyBand` for virtual bands and if the tile is not inside the grid.
    ///
    pub fn write_tile(&self, band: &str, tile: &RasterTile2D<f64>) -> Result<()> {
        let band = self.existing_band(band)?;
        self.ensure_tile_inside(&tile.tile_information)?;

        let storage = match band.source() {
            BandSource::Materialized(storage) => storage,
            BandSource::Virtual(_) => {
                return Err(Error::ReadOnlyBand {
                    band: band.name().to_string(),
                });
            }
        };

        let data_type = band.data_type();
        let converted = Grid2D {
            shape: tile.grid_array.shape,
            data: tile.data().iter().map(|v| data_type.cast(*v)).collect(),
        };

        safe_write_lock(storage)
            .grid_blit_from(&converted, tile.tile_information.global_upper_left_pixel_idx)?;

        Ok(())
    }

    /// Replaces all pixels of a materialized band
    pub fn write_band(&self, band: &str, data: Grid2D<f64>) -> Result<()> {
        ensure!(
            data.shape == self.shape(),
            error::BandShapeMismatch {
                band,
                expected: self.shape().into_inner(),
                found: data.shape.into_inner(),
            }
        );

        let tile = RasterTile2D {
            tile_information: self.full_tile_information(),
            grid_array: data,
        };

        self.write_tile(band, &tile)
    }

    /// Evaluates `expression` for every pixel of `tile`.
    ///
    /// `X` and `Y` are bound to the pixel centre, every other variable to the band of that name.
    pub fn evaluate_tile(
        &self,
        expression: &ExpressionAst,
        tile: &TileInformation,
    ) -> Result<RasterTile2D<f64>> {
        self.check_references(expression.referenced_variables())?;

        self.evaluate_tile_prechecked(expression, tile)
    }

    /// Evaluates an expression whose references passed [`Self::check_references`]
    pub(crate) fn evaluate_tile_prechecked(
        &self,
        expression: &ExpressionAst,
        tile: &TileInformation,
    ) -> Result<RasterTile2D<f64>> {
        self.ensure_tile_inside(tile)?;
        self.evaluate_tile_cached(expression, tile, &mut TileCache::new())
    }

    /// Checks that all bands a band depends on exist and that there is no cycle
    pub fn check_band_dependencies(&self, band: &Band) -> Result<()> {
        dependencies::DependencyCheck::new(self).visit(band)
    }

    /// Checks that all variables are coordinates or bands and that no referenced band depends on itself
    pub fn check_references<'v>(&self, variables: impl IntoIterator<Item = &'v str>) -> Result<()> {
        let mut check = dependencies::DependencyCheck::new(self);

        for variable in variables {
            if is_coordinate_variable(variable) {
                continue;
            }

            let band = self.band(variable).context(error::UnboundVariable { variable })?;
            check.visit(band)?;
        }

        Ok(())
    }

    fn read_tile_cached<'p>(
        &'p self,
        band: &Band,
        tile: &TileInformation,
        cache: &mut TileCache<'p>,
    ) -> Result<RasterTile2D<f64>> {
        match band.source() {
            BandSource::Materialized(storage) => {
                let grid_array = safe_read_lock(storage)
                    .sub_grid(tile.global_upper_left_pixel_idx, tile.tile_size_in_pixels)?;

                Ok(RasterTile2D {
                    tile_information: *tile,
                    grid_array,
                })
            }
            BandSource::Virtual(expression) => {
                let data_type = band.data_type();

                let mut tile = self.evaluate_tile_cached(expression, tile, cache)?;
                for value in tile.data_mut() {
                    *value = data_type.cast(*value);
                }

                Ok(tile)
            }
        }
    }

    /// Evaluates `expression` on `tile`.
    ///
    /// Every band the evaluation needs is read once and kept in `cache`, so bands shared by
    /// several references are not evaluated again.
    fn evaluate_tile_cached<'p>(
        &'p self,
        expression: &ExpressionAst,
        tile: &TileInformation,
        cache: &mut TileCache<'p>,
    ) -> Result<RasterTile2D<f64>> {
        let slot_names: Vec<&str> = expression.referenced_variables().collect();
        let linked = expression.link(&slot_names)?;

        for &name in &slot_names {
            if is_coordinate_variable(name) || cache.contains_key(name) {
                continue;
            }

            let band = self
                .band(name)
                .context(error::UnboundVariable { variable: name })?;
            let values = self.read_tile_cached(band, tile, cache)?;
            cache.insert(band.name(), values);
        }

        let inputs = slot_names
            .iter()
            .map(|&name| match name {
                X_VARIABLE => Ok(SlotInput::X),
                Y_VARIABLE => Ok(SlotInput::Y),
                band => cache
                    .get(band)
                    .map(|values| SlotInput::Band(values.data()))
                    .context(error::UnboundVariable { variable: band }),
            })
            .collect::<Result<Vec<_>>>()?;

        let mut slots = vec![0.0; slot_names.len()];

        let data = tile
            .global_pixel_indices()
            .enumerate()
            .map(|(pixel, grid_index)| {
                for (slot, input) in slots.iter_mut().zip(&inputs) {
                    *slot = match input {
                        SlotInput::X => grid_index.x() as f64 + 0.5,
                        SlotInput::Y => grid_index.y() as f64 + 0.5,
                        SlotInput::Band(values) => values[pixel],
                    };
                }
                linked.evaluate(&slots)
            })
            .collect();

        Ok(RasterTile2D::new_with_data(*tile, data)?)
    }

    fn ensure_tile_inside(&self, tile: &TileInformation) -> Result<()> {
        ensure!(
            tile.x0() + tile.width() <= self.width() && tile.y0() + tile.height() <= self.height(),
            error::TileOutOfBounds {
                x0: tile.x0(),
                y0: tile.y0(),
                width: tile.width(),
                height: tile.height(),
            }
        );
        Ok(())
    }

    pub fn pins(&self) -> &[Pin] {
        &self.pins
    }

    pub fn pins_mut(&mut self) -> &mut [Pin] {
        &mut self.pins
    }

    pub fn pin(&self, name: &str) -> Option<&Pin> {
        self.pins.iter().find(|pin| pin.name == name)
    }

    /// # Errors
    ///
    /// Fails if a pin of that name exists already.
    ///
    pub fn add_pin(&mut self, pin: Pin) -> Result<()> {
        ensure!(
            self.pin(&pin.name).is_none(),
            error::DuplicatePinName { pin: pin.name }
        );

        self.pins.push(pin);
        Ok(())
    }

    pub fn remove_pin(&mut self, name: &str) -> Option<Pin> {
        let position = self.pins.iter().position(|pin| pin.name == name)?;
        Some(self.pins.remove(position))
    }

    /// Moves every pin by one step of `dt`, reflecting at the grid bounds
    pub fn step_pins(&mut self, dt: f64) {
        let shape = self.shape();
        for pin in &mut self.pins {
            pin.step(dt, shape);
        }
    }
}

/// Tiles of the bands read while evaluating one tile, by band name
type TileCache<'p> = HashMap<&'p str, RasterTile2D<f64>>;

/// The value source of one slot of a linked expression
enum SlotInput<'t> {
    X,
    Y,
    Band(&'t [f64]),
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use rastercalc_datatypes::primitives::PixelPos;
    use rastercalc_datatypes::raster::TilingStrategy;
    use rastercalc_expression::ExpressionParser;

    fn product_with_b1() -> Product {
        let mut product = Product::new("p", 4, 3).unwrap();
        let data = Grid2D::new([3, 4].into(), (0..12).map(f64::from).collect()).unwrap();
        product
            .add_band(Band::from_data("b1", RasterDataType::F32, data))
            .unwrap();
        product
    }

    #[test]
    fn band_names_are_validated() {
        let mut product = product_with_b1();

        assert!(matches!(
            product.add_materialized_band("b1", RasterDataType::U8),
            Err(Error::DuplicateBandName { band }) if band == "b1"
        ));
        assert!(matches!(
            product.add_materialized_band("X", RasterDataType::U8),
            Err(Error::InvalidBandName { .. })
        ));
        assert!(matches!(
            product.add_materialized_band("", RasterDataType::U8),
            Err(Error::InvalidBandName { .. })
        ));
        assert!(matches!(
            product.add_band(Band::materialized("b2", RasterDataType::U8, [4, 3].into())),
            Err(Error::BandShapeMismatch { .. })
        ));

        product
            .add_virtual_band("v", RasterDataType::F64, "b1 + 1")
            .unwrap();
        assert_eq!(product.band_names().collect::<Vec<_>>(), vec!["b1", "v"]);

        product.remove_band("b1").unwrap();
        assert_eq!(product.band_names().collect::<Vec<_>>(), vec!["v"]);
        assert!(matches!(
            product.remove_band("b1"),
            Err(Error::UnknownBand { .. })
        ));
    }

    #[test]
    fn materialized_tiles_are_copies() {
        let product = product_with_b1();
        let strategy = TilingStrategy::new(product.shape(), [2, 2].into()).unwrap();
        let tile = strategy.tile_information(1).unwrap();

        let mut read = product.read_tile("b1", &tile).unwrap();
        assert_eq!(read.data(), &[2.0, 3.0, 6.0, 7.0]);

        read.data_mut()[0] = 100.0;
        assert_eq!(product.read_tile("b1", &tile).unwrap().data()[0], 2.0);
    }

    #[test]
    fn writes_are_converted_and_blitted() {
        let mut product = Product::new("p", 3, 3).unwrap();
        product
            .add_materialized_band("b", RasterDataType::I16)
            .unwrap();

        let strategy = TilingStrategy::new(product.shape(), [2, 2].into()).unwrap();
        let tile = strategy.tile_information(3).unwrap();
        let values = RasterTile2D::new_with_data(tile, vec![-2.7]).unwrap();

        product.write_tile("b", &values).unwrap();

        assert_eq!(
            product.read_band("b").unwrap().data,
            vec![0.0, 0.0, 0.0, 0.0, 0.0, 0.0, 0.0, 0.0, -2.0]
        );
    }

    #[test]
    fn virtual_bands_are_read_only() {
        let mut product = product_with_b1();
        product
            .add_virtual_band("v", RasterDataType::F32, "b1 * 2")
            .unwrap();

        let tile = RasterTile2D::new_filled(product.full_tile_information(), 1.0);

        assert!(matches!(
            product.write_tile("v", &tile),
            Err(Error::ReadOnlyBand { band }) if band == "v"
        ));
    }

    #[test]
    fn virtual_bands_bind_pixel_centres_and_siblings() {
        let mut product = product_with_b1();
        product
            .add_virtual_band("v", RasterDataType::F64, "b1 + X * 100 + Y * 1000")
            .unwrap();
        product
            .add_virtual_band("w", RasterDataType::U8, "v / 10")
            .unwrap();

        let v = product.read_band("v").unwrap();
        assert_eq!(v.data[0], 0.0 + 50.0 + 500.0);
        assert_eq!(v.data[6], 6.0 + 250.0 + 1500.0);

        let w = product.read_band("w").unwrap();
        assert_eq!(w.data[6], 175.0);
        assert_eq!(w.data[11], 255.0);
    }

    #[test]
    fn shared_siblings_are_evaluated_once_per_tile() {
        let mut product = Product::new("p", 4, 3).unwrap();
        product
            .add_materialized_band("f0", RasterDataType::F64)
            .unwrap();
        product
            .add_virtual_band("f1", RasterDataType::F64, "f0 + 1")
            .unwrap();

        // every band refers to both of its predecessors
        for k in 2..=70 {
            product
                .add_virtual_band(
                    format!("f{k}"),
                    RasterDataType::F64,
                    &format!("f{} + f{}", k - 1, k - 2),
                )
                .unwrap();
        }

        let tile = product.read_tile("f70", &product.full_tile_information()).unwrap();
        assert!(tile.data().iter().all(|v| *v == 190_392_490_709_135.0));

        let expression = ExpressionParser::default().parse("f69 + f70 + X").unwrap();
        let evaluated = product
            .evaluate_tile(&expression, &product.full_tile_information())
            .unwrap();
        assert_eq!(evaluated.data()[0], 308_061_521_170_129.0 + 0.5);
    }

    #[test]
    fn missing_bands_and_cycles_are_detected() {
        let mut product = product_with_b1();
        product
            .add_virtual_band("a", RasterDataType::F64, "b + 1")
            .unwrap();

        assert!(matches!(
            product.read_band("a"),
            Err(Error::UnboundVariable { variable }) if variable == "b"
        ));

        product
            .add_virtual_band("b", RasterDataType::F64, "c * b1")
            .unwrap();
        product
            .add_virtual_band("c", RasterDataType::F64, "a")
            .unwrap();

        match product.read_band("a") {
            Err(Error::CyclicDependency { cycle }) => {
                assert_eq!(cycle, vec!["a", "b", "c", "a"]);
            }
            other => panic!("expected a cycle, got {other:?}"),
        }

        product
            .add_virtual_band("self", RasterDataType::F64, "self + 1")
            .unwrap();
        assert!(matches!(
            product.read_band("self"),
            Err(Error::CyclicDependency { cycle }) if cycle == ["self", "self"]
        ));
    }

    #[test]
    fn tiles_must_be_inside_the_grid() {
        let product = product_with_b1();
        let strategy = TilingStrategy::new([10, 10].into(), [4, 4].into()).unwrap();
        let tile = strategy.tile_information(1).unwrap();

        assert!(matches!(
            product.read_tile("b1", &tile),
            Err(Error::TileOutOfBounds { .. })
        ));
    }

    #[test]
    fn pins_are_unique_and_move_inside_the_grid() {
        let mut product = Product::new("p", 10, 10).unwrap();
        product
            .add_pin(
                Pin::new("pin_1", "Pin 1", PixelPos::new(0.5, 0.5))
                    .with_velocity(PixelPos::new(-1.0, -1.0)),
            )
            .unwrap();

        assert!(matches!(
            product.add_pin(Pin::new("pin_1", "", PixelPos::default())),
            Err(Error::DuplicatePinName { .. })
        ));

        product.step_pins(1.0);

        let pin = product.pin("pin_1").unwrap();
        assert_eq!(pin.position, PixelPos::new(0.0, 0.0));
        assert_eq!(pin.velocity, PixelPos::new(1.0, 1.0));

        assert!(product.remove_pin("pin_1").is_some());
        assert!(product.pins().is_empty());
    }
}
