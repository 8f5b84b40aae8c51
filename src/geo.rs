//! Geographic scope: the map view state and the region table.
//!
//! Region and municipality references are owned by the feature store; the
//! view only keeps enough to label roots and filter purchases.

use std::collections::HashMap;

use once_cell::sync::Lazy;
use serde::{Deserialize, Serialize};

use crate::types::PurchaseRecord;

/// Official region codes with their display names.
pub static REGIONS: [(u32, &str); 16] = [
    (1, "Región de Tarapacá"),
    (2, "Región de Antofagasta"),
    (3, "Región de Atacama"),
    (4, "Región de Coquimbo"),
    (5, "Región de Valparaíso"),
    (6, "Región del Libertador General Bernardo O'Higgins"),
    (7, "Región del Maule"),
    (8, "Región del Biobío"),
    (9, "Región de la Araucanía"),
    (10, "Región de los Lagos"),
    (11, "Región Aysén del General Carlos Ibáñez del Campo"),
    (12, "Región de Magallanes y de la Antártica"),
    (13, "Región Metropolitana de Santiago"),
    (14, "Región de los Ríos"),
    (15, "Región de Arica y Parinacota"),
    (16, "Región del Ñuble"),
];

static REGION_CODES: Lazy<HashMap<String, u32>> =
    Lazy::new(|| REGIONS.iter().map(|&(code, name)| (region_key(name), code)).collect());

/// Case-folded, accent-free, single-spaced form used for name matching.
pub fn normalize_name(name: &str) -> String {
    let folded: String = name
        .chars()
        .map(|c| match c {
            'á' | 'Á' => 'a',
            'é' | 'É' => 'e',
            'í' | 'Í' => 'i',
            'ó' | 'Ó' => 'o',
            'ú' | 'Ú' | 'ü' | 'Ü' => 'u',
            'ñ' | 'Ñ' => 'n',
            '\'' | '’' => ' ',
            other => other,
        })
        .collect::<String>()
        .to_lowercase();
    folded.split_whitespace().collect::<Vec<_>>().join(" ")
}

// Exports spell O'Higgins both with and without the apostrophe.
fn region_key(name: &str) -> String {
    normalize_name(name).replace("o higgins", "ohiggins")
}

/// Map an export region label to its official code.
pub fn region_code(name: &str) -> Option<u32> {
    REGION_CODES.get(&region_key(name)).copied()
}

pub fn region_name(code: u32) -> Option<&'static str> {
    REGIONS.iter().find(|(c, _)| *c == code).map(|(_, name)| *name)
}

/// Municipality label with the institutional prefix removed, normalized.
pub fn municipality_key(institution: &str) -> String {
    let key = normalize_name(institution);
    for prefix in ["ilustre municipalidad de ", "municipalidad de ", "i. municipalidad de "] {
        if let Some(rest) = key.strip_prefix(prefix) {
            return rest.to_string();
        }
    }
    key
}

#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct RegionRef {
    pub code: u32,
    pub name: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct MunicipalityRef {
    pub code: u32,
    pub region_code: u32,
    pub name: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ViewLevel {
    Country,
    Region,
    Municipality,
}

/// Geographic scope a hierarchy is aggregated over.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum GeoScope {
    Country,
    Region(RegionRef),
    Municipality(MunicipalityRef),
}

impl GeoScope {
    pub fn level(&self) -> ViewLevel {
        match self {
            Self::Country => ViewLevel::Country,
            Self::Region(_) => ViewLevel::Region,
            Self::Municipality(_) => ViewLevel::Municipality,
        }
    }

    /// Root label: the country name, or the selected region/municipality.
    pub fn label(&self, country: &str) -> String {
        match self {
            Self::Country => country.to_string(),
            Self::Region(r) => r.name.clone(),
            Self::Municipality(m) => m.name.clone(),
        }
    }

    /// Stable key for caches and logs.
    pub fn key(&self) -> String {
        match self {
            Self::Country => "country".to_string(),
            Self::Region(r) => format!("region:{}", r.code),
            Self::Municipality(m) => format!("municipality:{}:{}", m.region_code, m.code),
        }
    }

    pub fn contains(&self, purchase: &PurchaseRecord) -> bool {
        match self {
            Self::Country => true,
            Self::Region(r) => purchase.region_code == r.code,
            Self::Municipality(m) => {
                purchase.region_code == m.region_code
                    && municipality_key(&purchase.institution) == municipality_key(&m.name)
            }
        }
    }
}

/// Current map position. Owned by one view; mutated only through the
/// transition methods below.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MapViewState {
    pub level: ViewLevel,
    pub selected_region: Option<RegionRef>,
    pub selected_municipality: Option<MunicipalityRef>,
}

impl Default for MapViewState {
    fn default() -> Self {
        Self {
            level: ViewLevel::Country,
            selected_region: None,
            selected_municipality: None,
        }
    }
}

impl MapViewState {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn select_region(&mut self, region: RegionRef) {
        self.level = ViewLevel::Region;
        self.selected_region = Some(region);
        self.selected_municipality = None;
    }

    /// Select a municipality of the current region. Returns `false` (and
    /// leaves the state untouched) when no region is selected or the
    /// municipality belongs to another region.
    pub fn select_municipality(&mut self, municipality: MunicipalityRef) -> bool {
        match &self.selected_region {
            Some(region) if region.code == municipality.region_code => {
                self.level = ViewLevel::Municipality;
                self.selected_municipality = Some(municipality);
                true
            }
            _ => false,
        }
    }

    /// One level up.
    pub fn back(&mut self) {
        match self.level {
            ViewLevel::Municipality => {
                self.level = ViewLevel::Region;
                self.selected_municipality = None;
            }
            ViewLevel::Region | ViewLevel::Country => self.back_to_country(),
        }
    }

    pub fn back_to_country(&mut self) {
        *self = Self::default();
    }

    pub fn scope(&self) -> GeoScope {
        match (&self.selected_region, &self.selected_municipality) {
            (_, Some(m)) => GeoScope::Municipality(m.clone()),
            (Some(r), None) => GeoScope::Region(r.clone()),
            (None, None) => GeoScope::Country,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn maule() -> RegionRef {
        RegionRef {
            code: 7,
            name: "Región del Maule".to_string(),
        }
    }

    fn talca() -> MunicipalityRef {
        MunicipalityRef {
            code: 7101,
            region_code: 7,
            name: "Talca".to_string(),
        }
    }

    #[test]
    fn resolves_region_codes_from_export_labels() {
        assert_eq!(region_code("Región del Maule"), Some(7));
        assert_eq!(region_code("Region de Los Rios"), Some(14));
        assert_eq!(region_code("Región del Libertador General Bernardo O'Higgins"), Some(6));
        assert_eq!(region_code("Región de Ñuble"), None);
        assert_eq!(region_code("Region del Nuble"), Some(16));
        assert_eq!(region_code("Region del Libertador General Bernardo OHiggins"), Some(6));
        assert_eq!(region_code("Atlantis"), None);
        assert_eq!(region_name(7), Some("Región del Maule"));
        assert_eq!(region_name(99), None);
    }

    #[test]
    fn municipality_key_strips_prefix() {
        assert_eq!(municipality_key("ILUSTRE MUNICIPALIDAD DE TALCA"), "talca");
        assert_eq!(municipality_key("Municipalidad de Curicó"), "curico");
        assert_eq!(municipality_key("Talca"), "talca");
    }

    #[test]
    fn view_state_transitions() {
        let mut view = MapViewState::new();
        assert!(!view.select_municipality(talca()));
        assert_eq!(view.level, ViewLevel::Country);

        view.select_region(maule());
        assert_eq!(view.scope(), GeoScope::Region(maule()));

        assert!(view.select_municipality(talca()));
        assert_eq!(view.level, ViewLevel::Municipality);
        assert_eq!(view.scope().label("Chile"), "Talca");

        view.back();
        assert_eq!(view.level, ViewLevel::Region);
        assert!(view.selected_municipality.is_none());

        view.back_to_country();
        assert_eq!(view, MapViewState::default());
        assert_eq!(view.scope().label("Chile"), "Chile");
    }

    #[test]
    fn municipality_of_other_region_is_rejected() {
        let mut view = MapViewState::new();
        view.select_region(maule());
        let other = MunicipalityRef {
            code: 13101,
            region_code: 13,
            name: "Santiago".to_string(),
        };
        assert!(!view.select_municipality(other));
        assert_eq!(view.level, ViewLevel::Region);
    }

    #[test]
    fn scope_filters_purchases() {
        let purchase = PurchaseRecord {
            institution: "ILUSTRE MUNICIPALIDAD DE TALCA".to_string(),
            region_code: 7,
            supplier: "Proveedor".to_string(),
            commodity_id: "1".to_string(),
            quantity: 1.0,
            unit_price: 1.0,
            overpriced: None,
        };
        assert!(GeoScope::Country.contains(&purchase));
        assert!(GeoScope::Region(maule()).contains(&purchase));
        assert!(GeoScope::Municipality(talca()).contains(&purchase));
        let curico = MunicipalityRef {
            code: 7301,
            region_code: 7,
            name: "Curicó".to_string(),
        };
        assert!(!GeoScope::Municipality(curico).contains(&purchase));
    }
}
