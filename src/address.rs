//! Address text handling: literal coordinates, diacritics, abbreviations.

use std::sync::LazyLock;

use regex::Regex;
use unicode_normalization::UnicodeNormalization;
use unicode_normalization::char::is_combining_mark;

use crate::coordinate::Coordinate;

/// `lat,lon` optionally followed by `,` or `;` and free text.
static DIRECT_COORDINATE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^\s*(-?\d{1,2}\.\d+),\s*(-?\d{1,3}\.\d+)(?:\s*[,;]\s*.*)?$")
        .expect("direct coordinate pattern compiles")
});

/// Street-type abbreviations and their expansions. Matched as whole words.
const ABBREVIATIONS: &[(&str, &str)] = &[
    ("Av", "Avenida"),
    ("R", "Rua"),
    ("Al", "Alameda"),
    ("Tv", "Travessa"),
    ("Est", "Estrada"),
];

static ABBREVIATION: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"\b(Av|R|Al|Tv|Est)(?:\.\s*|\s+)")
        .expect("abbreviation pattern compiles")
});

/// Outcome of checking an address for a literal coordinate pair.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum DirectCoordinate {
    /// The text is a postal address and needs geocoding.
    NotCoordinate,
    /// The text is a usable coordinate pair.
    Parsed(Coordinate),
    /// The text looks like a coordinate pair but does not form a valid one.
    Malformed,
}

/// Check whether `text` spells out a coordinate pair directly.
pub fn parse_direct(text: &str) -> DirectCoordinate {
    let Some(caps) = DIRECT_COORDINATE.captures(text) else {
        return DirectCoordinate::NotCoordinate;
    };

    let lat = caps.get(1).and_then(|m| m.as_str().parse::<f64>().ok());
    let lon = caps.get(2).and_then(|m| m.as_str().parse::<f64>().ok());
    match (lat, lon) {
        (Some(lat), Some(lon)) => {
            let coord = Coordinate::new(lat, lon);
            if coord.is_valid() {
                DirectCoordinate::Parsed(coord)
            } else {
                DirectCoordinate::Malformed
            }
        }
        _ => DirectCoordinate::Malformed,
    }
}

/// Decompose to NFD and drop combining marks (`"Itapuí"` -> `"Itapui"`).
pub fn strip_diacritics(text: &str) -> String {
    text.nfd().filter(|c| !is_combining_mark(*c)).collect()
}

/// Expand street-type abbreviations such as `Av.` or `R ` into full words.
pub fn expand_abbreviations(address: &str) -> String {
    ABBREVIATION
        .replace_all(address, |caps: &regex::Captures<'_>| {
            let short = caps.get(1).map(|m| m.as_str()).unwrap_or_default();
            let full = ABBREVIATIONS
                .iter()
                .find(|(abbr, _)| *abbr == short)
                .map(|(_, full)| *full)
                .unwrap_or(short);
            format!("{full} ")
        })
        .into_owned()
}

/// Google Maps search link for an address.
pub fn maps_search_url(address: &str) -> String {
    format!(
        "https://www.google.com/maps/search/?api=1&query={}",
        strip_diacritics(address).replace(' ', "+")
    )
}
