//! Information providers: named, argument-less queries returning a string.

use std::{fmt, rc::Rc};

use anyhow::Result;

use crate::error::{GardenError, validate_name};

/// Query function of a provider.
pub type ProviderQuery = Rc<dyn Fn() -> Result<String>>;

#[derive(Clone)]
pub struct Provider {
    name: String,
    description: String,
    query: ProviderQuery,
}

impl Provider {
    pub fn new(
        name: impl Into<String>,
        description: impl Into<String>,
        query: impl Fn() -> Result<String> + 'static,
    ) -> Result<Self, GardenError> {
        let name = name.into();
        validate_name("provider name", &name)?;
        Ok(Self {
            name,
            description: description.into(),
            query: Rc::new(query),
        })
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn description(&self) -> &str {
        &self.description
    }

    /// Runs the query function.
    pub fn query(&self) -> Result<String> {
        (self.query)()
    }
}

impl fmt::Debug for Provider {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Provider")
            .field("name", &self.name)
            .field("description", &self.description)
            .finish()
    }
}
