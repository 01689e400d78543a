use std::sync::Arc;

use rastercalc_datatypes::identifier;
use rastercalc_datatypes::util::Identifier;

use crate::error::Error;
use crate::product::Product;
use crate::util::Result;

identifier!(ProductId);
identifier!(SubscriptionId);

/// Gets notified when products enter or leave a [`Session`]
pub trait ProductManagerListener: Send + Sync {
    fn on_product_added(&self, id: ProductId, product: &Product);

    fn on_product_removed(&self, id: ProductId, product: &Product);
}

/// The open products of a caller, the selected one and the listeners watching them.
///
/// Products are shared with running computations through `Arc`s. A product can only be
/// changed while nothing else holds it.
#[derive(Default)]
pub struct Session {
    products: Vec<(ProductId, Arc<Product>)>,
    selected: Option<ProductId>,
    listeners: Vec<(SubscriptionId, Arc<dyn ProductManagerListener>)>,
}

impl Session {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add_product(&mut self, product: Product) -> ProductId {
        self.add_shared_product(Arc::new(product))
    }

    pub fn add_shared_product(&mut self, product: Arc<Product>) -> ProductId {
        let id = ProductId::new();

        tracing::debug!(%id, name = product.name(), "adding product");

        for (_, listener) in &self.listeners {
            listener.on_product_added(id, &product);
        }

        self.products.push((id, product));
        id
    }

    /// Removes a product, deselecting it if necessary
    ///
    /// # Errors
    ///
    /// Fails with `UnknownProduct` if there is no product with that id.
    ///
    pub fn remove_product(&mut self, id: ProductId) -> Result<Arc<Product>> {
        let position = self
            .products
            .iter()
            .position(|(product_id, _)| *product_id == id)
            .ok_or_else(|| unknown_product(id))?;

        let (_, product) = self.products.remove(position);

        if self.selected == Some(id) {
            self.selected = None;
        }

        tracing::debug!(%id, name = product.name(), "removed product");

        for (_, listener) in &self.listeners {
            listener.on_product_removed(id, &product);
        }

        Ok(product)
    }

    pub fn product(&self, id: ProductId) -> Option<&Arc<Product>> {
        self.products
            .iter()
            .find(|(product_id, _)| *product_id == id)
            .map(|(_, product)| product)
    }

    /// Mutable access for adding bands and pins
    ///
    /// # Errors
    ///
    /// Fails if the product is unknown or still shared with a computation.
    ///
    pub fn product_mut(&mut self, id: ProductId) -> Result<&mut Product> {
        let (_, product) = self
            .products
            .iter_mut()
            .find(|(product_id, _)| *product_id == id)
            .ok_or_else(|| unknown_product(id))?;

        Arc::get_mut(product).ok_or_else(|| Error::ProductInUse {
            product: id.to_string(),
        })
    }

    /// The first product with the given name
    pub fn find_product(&self, name: &str) -> Option<(ProductId, &Arc<Product>)> {
        self.products
            .iter()
            .find(|(_, product)| product.name() == name)
            .map(|(id, product)| (*id, product))
    }

    /// All products in the order they were added
    pub fn products(&self) -> impl Iterator<Item = (ProductId, &Arc<Product>)> {
        self.products.iter().map(|(id, product)| (*id, product))
    }

    pub fn len(&self) -> usize {
        self.products.len()
    }

    pub fn is_empty(&self) -> bool {
        self.products.is_empty()
    }

    /// # Errors
    ///
    /// Fails with `UnknownProduct` if there is no product with that id.
    ///
    pub fn select(&mut self, id: ProductId) -> Result<()> {
        if self.product(id).is_none() {
            return Err(unknown_product(id));
        }

        self.selected = Some(id);
        Ok(())
    }

    pub fn deselect(&mut self) {
        self.selected = None;
    }

    pub fn selected_id(&self) -> Option<ProductId> {
        self.selected
    }

    pub fn selected(&self) -> Option<&Arc<Product>> {
        self.product(self.selected?)
    }

    pub fn subscribe(&mut self, listener: Arc<dyn ProductManagerListener>) -> SubscriptionId {
        let id = SubscriptionId::new();
        self.listeners.push((id, listener));
        id
    }

    /// Returns `false` if there was no such subscription
    pub fn unsubscribe(&mut self, id: SubscriptionId) -> bool {
        let before = self.listeners.len();
        self.listeners.retain(|(subscription, _)| *subscription != id);
        self.listeners.len() != before
    }
}

fn unknown_product(id: ProductId) -> Error {
    Error::UnknownProduct {
        product: id.to_string(),
    }
}
