//! Locations in and around Jaú / Itapuí, SP, for realistic test fixtures.
//!
//! Coordinates taken from OpenStreetMap town centres and landmarks.

use delivery_planner::Coordinate;

/// A named location with a postal-style address.
#[derive(Debug, Clone, Copy)]
pub struct Location {
    pub name: &'static str,
    pub address: &'static str,
    pub lat: f64,
    pub lon: f64,
}

impl Location {
    pub const fn new(name: &'static str, address: &'static str, lat: f64, lon: f64) -> Self {
        Self {
            name,
            address,
            lat,
            lon,
        }
    }

    pub fn coordinate(&self) -> Coordinate {
        Coordinate::new(self.lat, self.lon)
    }

    /// The coordinate written the way a spreadsheet cell would hold it.
    pub fn as_literal(&self) -> String {
        format!("{}, {}", self.lat, self.lon)
    }
}

/// Depot used as the start point.
pub const DEPOT: Location = Location::new(
    "Depósito",
    "Rua Floriano Peixoto, 368, Centro, Itapuí - SP",
    -22.2333,
    -48.7189,
);

pub const NEARBY: &[Location] = &[
    Location::new("Praça Itapuí", "Praça da Matriz, Centro, Itapuí - SP", -22.2330, -48.7196),
    Location::new("Jaú Centro", "Rua Edgard Ferraz, 100, Centro, Jaú - SP", -22.2963, -48.5582),
    Location::new("Jaú Rodoviária", "Avenida Zien Nasralla, Jaú - SP", -22.2889, -48.5694),
    Location::new("Bariri", "Rua Campos Salles, Centro, Bariri - SP", -22.0730, -48.7403),
    Location::new("Bocaina", "Rua Sete de Setembro, Centro, Bocaina - SP", -22.1363, -48.5183),
];

/// Far enough from the rest to be flagged.
pub const FAR_AWAY: Location = Location::new(
    "Ribeirão Preto",
    "Avenida Nove de Julho, Ribeirão Preto - SP",
    -21.1775,
    -47.8103,
);
