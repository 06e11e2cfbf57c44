use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;

/// Elements quantified by the pipeline, in coefficient-table order.
///
/// The derived `Ord` follows declaration order, so a `BTreeMap<Element, _>`
/// iterates in the same order as the coefficient tensors are indexed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum Element {
    O,
    Na,
    Mg,
    Al,
    Si,
    P,
    S,
    K,
    Ca,
    Ti,
    Cr,
    Mn,
    Fe,
}

pub const ELEMENT_COUNT: usize = 13;

/// Per-element scalar values, iterated in coefficient-table order.
pub type ElementMap = BTreeMap<Element, f64>;

/// A named emission line with its literature energy.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct CharacteristicLine {
    pub name: &'static str,
    pub energy_kev: f64,
}

const fn line(name: &'static str, energy_kev: f64) -> CharacteristicLine {
    CharacteristicLine { name, energy_kev }
}

const O_LINES: [CharacteristicLine; 1] = [line("Ka", 0.525)];
const NA_LINES: [CharacteristicLine; 1] = [line("Ka", 1.041)];
const MG_LINES: [CharacteristicLine; 1] = [line("Ka", 1.254)];
const AL_LINES: [CharacteristicLine; 1] = [line("Ka", 1.487)];
const SI_LINES: [CharacteristicLine; 1] = [line("Ka", 1.740)];
const P_LINES: [CharacteristicLine; 1] = [line("Ka", 2.014)];
const S_LINES: [CharacteristicLine; 1] = [line("Ka", 2.308)];
const K_LINES: [CharacteristicLine; 1] = [line("Ka", 3.314)];
const CA_LINES: [CharacteristicLine; 1] = [line("Ka", 3.692)];
const TI_LINES: [CharacteristicLine; 2] = [line("Ka", 4.511), line("Kb", 4.932)];
const CR_LINES: [CharacteristicLine; 2] = [line("Ka", 5.415), line("Kb", 5.947)];
const MN_LINES: [CharacteristicLine; 2] = [line("Ka", 5.899), line("Kb", 6.490)];
const FE_LINES: [CharacteristicLine; 2] = [line("Ka", 6.404), line("Kb", 7.058)];

impl Element {
    pub const ALL: [Element; ELEMENT_COUNT] = [
        Element::O,
        Element::Na,
        Element::Mg,
        Element::Al,
        Element::Si,
        Element::P,
        Element::S,
        Element::K,
        Element::Ca,
        Element::Ti,
        Element::Cr,
        Element::Mn,
        Element::Fe,
    ];

    pub fn symbol(self) -> &'static str {
        match self {
            Element::O => "O",
            Element::Na => "Na",
            Element::Mg => "Mg",
            Element::Al => "Al",
            Element::Si => "Si",
            Element::P => "P",
            Element::S => "S",
            Element::K => "K",
            Element::Ca => "Ca",
            Element::Ti => "Ti",
            Element::Cr => "Cr",
            Element::Mn => "Mn",
            Element::Fe => "Fe",
        }
    }

    /// Position in the coefficient index space.
    pub fn index(self) -> usize {
        self as usize
    }

    /// Emission lines of this element in declaration order.
    pub fn lines(self) -> &'static [CharacteristicLine] {
        match self {
            Element::O => &O_LINES,
            Element::Na => &NA_LINES,
            Element::Mg => &MG_LINES,
            Element::Al => &AL_LINES,
            Element::Si => &SI_LINES,
            Element::P => &P_LINES,
            Element::S => &S_LINES,
            Element::K => &K_LINES,
            Element::Ca => &CA_LINES,
            Element::Ti => &TI_LINES,
            Element::Cr => &CR_LINES,
            Element::Mn => &MN_LINES,
            Element::Fe => &FE_LINES,
        }
    }
}

impl fmt::Display for Element {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.pad(self.symbol())
    }
}

#[derive(thiserror::Error, Debug, Clone, PartialEq, Eq)]
#[error("unknown element symbol `{0}`")]
pub struct UnknownElement(pub String);

impl FromStr for Element {
    type Err = UnknownElement;

    fn from_str(symbol: &str) -> Result<Self, Self::Err> {
        Element::ALL
            .iter()
            .copied()
            .find(|element| element.symbol().eq_ignore_ascii_case(symbol.trim()))
            .ok_or_else(|| UnknownElement(symbol.to_string()))
    }
}

/// Every registry line paired with its element, in registry order.
pub fn registry() -> impl Iterator<Item = (Element, &'static CharacteristicLine)> {
    Element::ALL
        .into_iter()
        .flat_map(|element| element.lines().iter().map(move |line| (element, line)))
}

/// Builds a map with every element set to `value`.
pub fn uniform_map(value: f64) -> ElementMap {
    Element::ALL.iter().map(|&element| (element, value)).collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn index_matches_declaration_order() {
        for (position, element) in Element::ALL.iter().enumerate() {
            assert_eq!(element.index(), position);
        }
    }

    #[test]
    fn registry_lists_transition_metals_with_two_lines() {
        assert_eq!(registry().count(), 17);
        assert_eq!(Element::Fe.lines()[0].energy_kev, 6.404);
        assert_eq!(Element::Fe.lines()[1].name, "Kb");
        assert_eq!(Element::Si.lines().len(), 1);
    }

    #[test]
    fn symbols_round_trip_through_from_str() {
        assert_eq!("fe".parse::<Element>().unwrap(), Element::Fe);
        assert_eq!("Na".parse::<Element>().unwrap(), Element::Na);
        assert!("Ni".parse::<Element>().is_err());
    }

    #[test]
    fn element_map_iterates_in_table_order() {
        let map = uniform_map(1.0);
        let order: Vec<Element> = map.keys().copied().collect();
        assert_eq!(order, Element::ALL.to_vec());
    }
}
