//! Device services the sensors query.
//!
//! Real devices plug in through [`Permissions`] and [`Telephony`]. The
//! [`FixturePlatform`] answers every query from a config file.

use std::{fmt, sync::Arc};

use serde::Deserialize;

use crate::{
    error::PlatformError,
    model::{CellInfo, CellLocation, PhoneType},
};

pub const PERMISSION_ACCESS_CELL_INFO: &str = "android.permission.ACCESS_COARSE_LOCATION";

pub trait Permissions: Send + Sync {
    fn is_granted(&self, capability: &str) -> bool;
}

pub trait Telephony: Send + Sync {
    /// All visible cells, or `None` when the device does not support the query.
    fn all_cell_info(&self) -> Result<Option<Vec<CellInfo>>, PlatformError>;

    fn phone_type(&self) -> PhoneType;

    fn cell_location(&self) -> Result<Option<CellLocation>, PlatformError>;

    /// MCC followed by MNC, e.g. `"310260"`.
    fn network_operator(&self) -> Result<String, PlatformError>;
}

/// Application context handed to sensors on creation.
#[derive(Clone)]
pub struct PlatformContext {
    permissions: Arc<dyn Permissions>,
    telephony: Option<Arc<dyn Telephony>>,
}

impl PlatformContext {
    pub fn new(permissions: Arc<dyn Permissions>, telephony: Option<Arc<dyn Telephony>>) -> Self {
        Self {
            permissions,
            telephony,
        }
    }

    pub fn permission_granted(&self, capability: &str) -> bool {
        self.permissions.is_granted(capability)
    }

    pub fn telephony(&self) -> Option<&Arc<dyn Telephony>> {
        self.telephony.as_ref()
    }
}

impl fmt::Debug for PlatformContext {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("PlatformContext")
            .field("telephony", &self.telephony.is_some())
            .finish_non_exhaustive()
    }
}

/// Platform whose answers come from the `[platform]` config table.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct FixturePlatform {
    pub granted: Vec<String>,
    // false simulates a device without a telephony service
    pub telephony: bool,
    pub phone_type: PhoneType,
    pub network_operator: String,
    pub cell_location: Option<CellLocation>,
    // absent means the bulk query is unsupported, `[]` means nothing is visible
    pub all_cell_info: Option<Vec<CellInfo>>,
}

impl Default for FixturePlatform {
    fn default() -> Self {
        Self {
            granted: Vec::new(),
            telephony: true,
            phone_type: PhoneType::None,
            network_operator: String::new(),
            cell_location: None,
            all_cell_info: None,
        }
    }
}

impl FixturePlatform {
    pub fn into_context(self) -> PlatformContext {
        let telephony = self.telephony;
        let platform = Arc::new(self);
        PlatformContext::new(
            platform.clone(),
            telephony.then(|| platform as Arc<dyn Telephony>),
        )
    }
}

impl Permissions for FixturePlatform {
    fn is_granted(&self, capability: &str) -> bool {
        self.granted.iter().any(|x| x == capability)
    }
}

impl Telephony for FixturePlatform {
    fn all_cell_info(&self) -> Result<Option<Vec<CellInfo>>, PlatformError> {
        Ok(self.all_cell_info.clone())
    }

    fn phone_type(&self) -> PhoneType {
        self.phone_type
    }

    fn cell_location(&self) -> Result<Option<CellLocation>, PlatformError> {
        Ok(self.cell_location)
    }

    fn network_operator(&self) -> Result<String, PlatformError> {
        Ok(self.network_operator.clone())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn fixture_permissions() {
        let platform = FixturePlatform {
            granted: vec![PERMISSION_ACCESS_CELL_INFO.to_string()],
            ..Default::default()
        };
        assert!(platform.is_granted(PERMISSION_ACCESS_CELL_INFO));
        assert!(!platform.is_granted("android.permission.ACCESS_FINE_LOCATION"));
    }

    #[test]
    fn fixture_without_telephony() {
        let context = FixturePlatform {
            telephony: false,
            ..Default::default()
        }
        .into_context();
        assert!(context.telephony().is_none());
        assert!(!context.permission_granted(PERMISSION_ACCESS_CELL_INFO));

        assert!(FixturePlatform::default().into_context().telephony().is_some());
    }
}
