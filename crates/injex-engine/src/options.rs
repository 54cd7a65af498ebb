//! Injector configuration.

use crate::error::{InjectError, Result};
use crate::recursion::RecursionProfile;
use serde::Deserialize;

/// Tunables for one injector. Missing JSON fields take their defaults.
///
/// ```json
/// { "max_resolution_depth": 64, "assisted_injection": false }
/// ```
#[derive(Clone, Debug, PartialEq, Eq, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct InjectorOptions {
    /// Keys allowed on one resolution chain.
    pub max_resolution_depth: u32,
    /// Enter attempts allowed on one resolution chain.
    pub max_resolution_steps: u32,
    pub max_descriptor_depth: u32,
    /// Reflective construction for unbound, unnamed class keys.
    pub assisted_injection: bool,
    /// Conformance check of every produced value against its declared type.
    pub type_check: bool,
}

impl Default for InjectorOptions {
    fn default() -> Self {
        let resolution = RecursionProfile::Resolution;
        Self {
            max_resolution_depth: resolution.max_depth(),
            max_resolution_steps: resolution.max_iterations(),
            max_descriptor_depth: RecursionProfile::DescriptorCompile.max_depth(),
            assisted_injection: true,
            type_check: true,
        }
    }
}

impl InjectorOptions {
    pub fn from_json(json: &str) -> Result<Self> {
        serde_json::from_str(json)
            .map_err(|err| InjectError::InvalidArgument(format!("injector options: {err}")))
    }

    pub(crate) fn resolution_profile(&self) -> RecursionProfile {
        RecursionProfile::Custom {
            max_depth: self.max_resolution_depth,
            max_iterations: self.max_resolution_steps,
        }
    }

    pub(crate) fn descriptor_profile(&self) -> RecursionProfile {
        RecursionProfile::Custom {
            max_depth: self.max_descriptor_depth,
            max_iterations: RecursionProfile::DescriptorCompile.max_iterations(),
        }
    }
}
