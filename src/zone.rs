//! Keyboard backlight zones.
//!
//! The keyboard exposes one color file per zone. A monitor owns a
//! non-empty [`ZoneSet`]; constructing one with an unknown name fails
//! instead of silently dropping it.

use serde::Deserialize;
use std::collections::BTreeSet;
use std::fmt;
use std::str::FromStr;

/// One independently colored region of the keyboard.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum Zone {
    Left,
    Center,
    Right,
    Extra,
}

impl Zone {
    pub const ALL: [Zone; 4] = [Zone::Left, Zone::Center, Zone::Right, Zone::Extra];

    pub fn as_str(self) -> &'static str {
        match self {
            Zone::Left => "left",
            Zone::Center => "center",
            Zone::Right => "right",
            Zone::Extra => "extra",
        }
    }
}

impl fmt::Display for Zone {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Zone {
    type Err = ZoneError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Zone::ALL
            .into_iter()
            .find(|zone| zone.as_str() == s)
            .ok_or_else(|| ZoneError::Invalid(s.to_string()))
    }
}

#[derive(Debug, thiserror::Error, PartialEq, Eq)]
pub enum ZoneError {
    #[error("{0} is not a valid location (expected one of: left, right, center, extra)")]
    Invalid(String),
    #[error("at least one location is required")]
    Empty,
}

/// The `locations` parameter as written in the config: one name or a list.
#[derive(Clone, Debug, Deserialize, PartialEq, Eq)]
#[serde(untagged)]
pub enum Locations {
    One(String),
    Many(Vec<String>),
}

/// A validated, non-empty set of zones. Iteration order is fixed
/// (left, center, right, extra) so writes are deterministic.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ZoneSet(BTreeSet<Zone>);

impl ZoneSet {
    pub fn parse<S: AsRef<str>>(names: &[S]) -> Result<Self, ZoneError> {
        let zones = names
            .iter()
            .map(|name| name.as_ref().parse())
            .collect::<Result<BTreeSet<Zone>, _>>()?;

        if zones.is_empty() {
            return Err(ZoneError::Empty);
        }
        Ok(Self(zones))
    }

    pub fn iter(&self) -> impl Iterator<Item = Zone> + '_ {
        self.0.iter().copied()
    }

    pub fn contains(&self, zone: Zone) -> bool {
        self.0.contains(&zone)
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// Zone names, for logs and the status API.
    pub fn names(&self) -> Vec<&'static str> {
        self.iter().map(Zone::as_str).collect()
    }
}

impl TryFrom<Locations> for ZoneSet {
    type Error = ZoneError;

    fn try_from(locations: Locations) -> Result<Self, Self::Error> {
        match locations {
            Locations::One(name) => ZoneSet::parse(&[name]),
            Locations::Many(names) => ZoneSet::parse(&names),
        }
    }
}

impl fmt::Display for ZoneSet {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.names().join(", "))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use rstest::rstest;

    #[rstest]
    #[case("left", Zone::Left)]
    #[case("right", Zone::Right)]
    #[case("center", Zone::Center)]
    #[case("extra", Zone::Extra)]
    fn parses_known_zones(#[case] name: &str, #[case] expected: Zone) {
        assert_eq!(name.parse::<Zone>(), Ok(expected));
        assert_eq!(expected.as_str(), name);
    }

    #[rstest]
    #[case("top")]
    #[case("Left")]
    #[case("")]
    fn rejects_unknown_zones(#[case] name: &str) {
        assert_eq!(name.parse::<Zone>(), Err(ZoneError::Invalid(name.to_string())));
    }

    #[test]
    fn single_location_becomes_one_element_set() {
        let zones = ZoneSet::try_from(Locations::One("center".into())).unwrap();
        assert_eq!(zones.names(), vec!["center"]);
    }

    #[test]
    fn invalid_location_fails_whole_set() {
        let err = ZoneSet::parse(&["left", "top"]).unwrap_err();
        assert_eq!(err, ZoneError::Invalid("top".into()));
    }

    #[test]
    fn empty_locations_rejected() {
        let empty: [&str; 0] = [];
        assert_eq!(ZoneSet::parse(&empty), Err(ZoneError::Empty));
        assert_eq!(
            ZoneSet::try_from(Locations::Many(vec![])),
            Err(ZoneError::Empty)
        );
    }

    #[test]
    fn duplicates_collapse_and_order_is_fixed() {
        let zones = ZoneSet::parse(&["extra", "left", "extra", "right"]).unwrap();
        assert_eq!(zones.len(), 3);
        assert_eq!(zones.names(), vec!["left", "right", "extra"]);
        assert_eq!(zones.to_string(), "left, right, extra");
    }
}
