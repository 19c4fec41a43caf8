//! Country-name reconciliation between BOLD exports and Natural Earth data
//!
//! BOLD country fields are free text; Natural Earth uses its own spellings
//! ("Czechia", "Bosnia and Herz."). A static alias table handles the known
//! variations, with a case-insensitive substring match as a last resort.

use crate::worldmap::{Feature, WorldMap};

/// Map property keys checked for a country name, in order
pub const NAME_PROPERTIES: &[&str] = &["NAME", "NAME_LONG", "NAME_EN", "ADMIN"];

/// Known data-name -> Natural Earth name pairs. Identity entries are kept
/// so that membership doubles as a "recognized country" check.
pub const COUNTRY_ALIASES: &[(&str, &str)] = &[
    ("Greece", "Greece"),
    ("Italy", "Italy"),
    ("Spain", "Spain"),
    ("Norway", "Norway"),
    ("Germany", "Germany"),
    ("France", "France"),
    ("Portugal", "Portugal"),
    ("Switzerland", "Switzerland"),
    ("Austria", "Austria"),
    ("Belgium", "Belgium"),
    ("Netherlands", "Netherlands"),
    ("Denmark", "Denmark"),
    ("Sweden", "Sweden"),
    ("Finland", "Finland"),
    ("Poland", "Poland"),
    ("Hungary", "Hungary"),
    ("Romania", "Romania"),
    ("Bulgaria", "Bulgaria"),
    ("Croatia", "Croatia"),
    ("Slovenia", "Slovenia"),
    ("Slovakia", "Slovakia"),
    ("Estonia", "Estonia"),
    ("Latvia", "Latvia"),
    ("Lithuania", "Lithuania"),
    ("Ireland", "Ireland"),
    ("Iceland", "Iceland"),
    ("Cyprus", "Cyprus"),
    ("Malta", "Malta"),
    ("Luxembourg", "Luxembourg"),
    ("Moldova", "Moldova"),
    ("Ukraine", "Ukraine"),
    ("Belarus", "Belarus"),
    ("Serbia", "Serbia"),
    ("Montenegro", "Montenegro"),
    ("Albania", "Albania"),
    ("San Marino", "San Marino"),
    ("United Kingdom", "United Kingdom"),
    ("United-Kingdom", "United Kingdom"),
    ("UK", "United Kingdom"),
    ("North-Macedonia", "North Macedonia"),
    ("North Macedonia", "North Macedonia"),
    // Natural Earth abbreviates Bosnia
    ("Bosnia-Herzegovina", "Bosnia and Herz."),
    ("Bosnia and Herzegovina", "Bosnia and Herz."),
    ("Czech Republic", "Czechia"),
    ("Turkiye", "Turkey"),
    ("Turkey", "Turkey"),
    ("USA", "United States of America"),
    ("United States", "United States of America"),
    ("US", "United States of America"),
    ("Russia", "Russia"),
    ("Russian Federation", "Russia"),
    ("China", "China"),
    ("India", "India"),
    ("Canada", "Canada"),
    ("Australia", "Australia"),
    ("Brazil", "Brazil"),
    ("Mexico", "Mexico"),
    ("Japan", "Japan"),
    ("South Korea", "South Korea"),
    ("Korea", "South Korea"),
    ("New Zealand", "New Zealand"),
    ("South Africa", "South Africa"),
    ("Egypt", "Egypt"),
    ("Morocco", "Morocco"),
    ("Argentina", "Argentina"),
    ("Chile", "Chile"),
    ("Peru", "Peru"),
    ("Colombia", "Colombia"),
    ("Venezuela", "Venezuela"),
    ("Iran", "Iran"),
    ("Iraq", "Iraq"),
    ("Israel", "Israel"),
    ("Saudi Arabia", "Saudi Arabia"),
    ("Thailand", "Thailand"),
    ("Indonesia", "Indonesia"),
    ("Philippines", "Philippines"),
    ("Malaysia", "Malaysia"),
    ("Singapore", "Singapore"),
    ("Vietnam", "Vietnam"),
];

/// Resolve a data country name through the alias table; unknown names pass
/// through unchanged.
pub fn map_name(name: &str) -> &str {
    COUNTRY_ALIASES
        .iter()
        .find(|(data, _)| *data == name)
        .map(|(_, ne)| *ne)
        .unwrap_or(name)
}

/// How a country was matched against the map
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CountryMatch {
    /// Index into the map's feature list
    pub feature: usize,
    /// The map-side name that matched
    pub matched_name: String,
    /// True when only the substring fallback matched
    pub fuzzy: bool,
}

fn exact_match(feature: &Feature, wanted: &str) -> Option<String> {
    for key in NAME_PROPERTIES {
        if let Some(value) = feature.property(key) {
            if value == wanted {
                return Some(value.to_string());
            }
        }
    }
    None
}

fn fuzzy_match(feature: &Feature, wanted: &str) -> Option<String> {
    let needle = wanted.to_lowercase();
    for key in NAME_PROPERTIES {
        if let Some(value) = feature.property(key) {
            if value.to_lowercase().contains(&needle) {
                return Some(value.to_string());
            }
        }
    }
    None
}

/// Match one data country against the map: alias-resolved exact match
/// first, then case-insensitive substring.
pub fn match_country(map: &WorldMap, data_name: &str) -> Option<CountryMatch> {
    let mapped = map_name(data_name);

    for (idx, feature) in map.features.iter().enumerate() {
        if let Some(matched_name) = exact_match(feature, mapped) {
            return Some(CountryMatch {
                feature: idx,
                matched_name,
                fuzzy: false,
            });
        }
    }

    for (idx, feature) in map.features.iter().enumerate() {
        if let Some(matched_name) = fuzzy_match(feature, data_name) {
            return Some(CountryMatch {
                feature: idx,
                matched_name,
                fuzzy: true,
            });
        }
    }

    None
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::worldmap::tests::world_with_names;

    #[test]
    fn test_map_name_aliases() {
        assert_eq!(map_name("Czech Republic"), "Czechia");
        assert_eq!(map_name("UK"), "United Kingdom");
        assert_eq!(map_name("Bosnia and Herzegovina"), "Bosnia and Herz.");
        assert_eq!(map_name("Turkiye"), "Turkey");
        assert_eq!(map_name("Atlantis"), "Atlantis");
    }

    #[test]
    fn test_exact_match_through_alias() {
        let map = world_with_names(&["Czechia", "Norway"]);
        let m = match_country(&map, "Czech Republic").unwrap();

        assert_eq!(m.matched_name, "Czechia");
        assert!(!m.fuzzy);
    }

    #[test]
    fn test_fuzzy_match_falls_back_to_substring() {
        let map = world_with_names(&["Kingdom of Atlantis"]);
        let m = match_country(&map, "Atlantis").unwrap();

        assert!(m.fuzzy);
        assert_eq!(m.matched_name, "Kingdom of Atlantis");
    }

    #[test]
    fn test_fuzzy_match_is_case_insensitive() {
        let map = world_with_names(&["NORWAY"]);
        let m = match_country(&map, "norway").unwrap();
        assert!(m.fuzzy);
    }

    #[test]
    fn test_unmatched_country() {
        let map = world_with_names(&["Norway"]);
        assert!(match_country(&map, "Mordor").is_none());
    }
}
