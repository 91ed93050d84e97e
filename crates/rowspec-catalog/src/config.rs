//! Catalog configuration

use rowspec_schema::Owner;
use rowspec_validation::ValidationConfig;

/// Catalog configuration
#[derive(Debug, Clone, Default)]
pub struct CatalogConfig {
    /// Register unregistered schema names to this owner on declaration
    /// instead of rejecting the declaration
    pub auto_register_owner: Option<Owner>,
    /// Settings for compliance checks
    pub validation: ValidationConfig,
}

impl CatalogConfig {
    pub fn with_auto_register(mut self, owner: Owner) -> Self {
        self.auto_register_owner = Some(owner);
        self
    }

    pub fn with_validation(mut self, validation: ValidationConfig) -> Self {
        self.validation = validation;
        self
    }
}
