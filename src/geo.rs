//! Locality filter for extracted addresses

use serde::{Deserialize, Serialize};

/// The city whose businesses are kept
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TargetCity {
    /// Canonical spelling, used to build address patterns
    pub name: String,
    /// Lower-case spellings accepted in an address
    pub variants: Vec<String>,
}

impl TargetCity {
    pub fn new(name: impl Into<String>, variants: impl IntoIterator<Item = impl Into<String>>) -> Self {
        Self {
            name: name.into(),
            variants: variants
                .into_iter()
                .map(|variant| variant.into().to_lowercase())
                .collect(),
        }
    }

    /// Rostov-on-Don with the spellings seen on both sources
    pub fn rostov_on_don() -> Self {
        Self::new(
            "Ростов-на-Дону",
            [
                "ростов-на-дону",
                "ростов на дону",
                "г.ростов-на-дону",
                "г. ростов-на-дону",
                "г.ростов",
                "г. ростов",
                "ростов,",
            ],
        )
    }
}

impl Default for TargetCity {
    fn default() -> Self {
        Self::rostov_on_don()
    }
}

/// Accepts addresses located in the target city
#[derive(Debug, Clone)]
pub struct GeoFilter {
    city: TargetCity,
}

impl GeoFilter {
    pub fn new(city: TargetCity) -> Self {
        Self { city }
    }

    pub fn city(&self) -> &TargetCity {
        &self.city
    }

    /// Whether the address mentions any spelling of the target city
    ///
    /// An empty address is rejected.
    pub fn is_target_city(&self, address: &str) -> bool {
        let address = address.trim().to_lowercase();
        if address.is_empty() {
            return false;
        }
        self.city
            .variants
            .iter()
            .any(|variant| address.contains(variant.as_str()))
    }
}

impl Default for GeoFilter {
    fn default() -> Self {
        Self::new(TargetCity::default())
    }
}
