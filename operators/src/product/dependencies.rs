use std::collections::HashMap;

use snafu::OptionExt;

use super::{Band, Product, is_coordinate_variable};
use crate::error::{self, Error};
use crate::util::Result;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Mark {
    InProgress,
    Done,
}

/// Depth-first search over the references of virtual bands
pub(super) struct DependencyCheck<'p> {
    product: &'p Product,
    marks: HashMap<&'p str, Mark>,
    path: Vec<&'p str>,
}

impl<'p> DependencyCheck<'p> {
    pub fn new(product: &'p Product) -> Self {
        Self {
            product,
            marks: HashMap::new(),
            path: Vec::new(),
        }
    }

    /// Visits `band` and everything it depends on.
    ///
    /// Bands that were already checked by an earlier call are skipped.
    pub fn visit(&mut self, band: &'p Band) -> Result<()> {
        let name = band.name();

        match self.marks.get(name) {
            Some(Mark::Done) => return Ok(()),
            Some(Mark::InProgress) => {
                let start = self
                    .path
                    .iter()
                    .position(|visited| *visited == name)
                    .unwrap_or_default();

                let mut cycle: Vec<String> =
                    self.path[start..].iter().map(ToString::to_string).collect();
                cycle.push(name.to_string());

                return Err(Error::CyclicDependency { cycle });
            }
            None => {}
        }

        let Some(expression) = band.expression() else {
            self.marks.insert(name, Mark::Done);
            return Ok(());
        };

        self.marks.insert(name, Mark::InProgress);
        self.path.push(name);

        for variable in expression.referenced_variables() {
            if is_coordinate_variable(variable) {
                continue;
            }

            let dependency = self
                .product
                .band(variable)
                .context(error::UnboundVariable { variable })?;

            self.visit(dependency)?;
        }

        self.path.pop();
        self.marks.insert(name, Mark::Done);

        Ok(())
    }
}
