//! ISO 3166-1 alpha-2 country lookup.
//!
//! Shipping addresses carry the country as the shopper typed or picked it
//! ("United Kingdom", "uk", "GB"). The payment processor wants alpha-2 codes.

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Returned when a country name or code is not in the lookup table.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
#[error("unknown country: {0}")]
pub struct UnknownCountry(pub String);

/// An ISO 3166-1 alpha-2 country code known to the storefront.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct CountryCode(&'static str);

/// (alpha-2 code, English short name, extra aliases)
const COUNTRIES: &[(&str, &str, &[&str])] = &[
    ("US", "United States", &["united states of america", "usa", "u.s.", "u.s.a.", "america"]),
    ("CA", "Canada", &[]),
    ("MX", "Mexico", &[]),
    ("GB", "United Kingdom", &["uk", "great britain", "britain", "england", "scotland", "wales", "northern ireland"]),
    ("IE", "Ireland", &["republic of ireland"]),
    ("FR", "France", &[]),
    ("DE", "Germany", &["deutschland"]),
    ("IT", "Italy", &["italia"]),
    ("ES", "Spain", &["espana", "españa"]),
    ("PT", "Portugal", &[]),
    ("NL", "Netherlands", &["the netherlands", "holland"]),
    ("BE", "Belgium", &[]),
    ("LU", "Luxembourg", &[]),
    ("CH", "Switzerland", &[]),
    ("AT", "Austria", &[]),
    ("DK", "Denmark", &[]),
    ("SE", "Sweden", &[]),
    ("NO", "Norway", &[]),
    ("FI", "Finland", &[]),
    ("IS", "Iceland", &[]),
    ("PL", "Poland", &[]),
    ("CZ", "Czechia", &["czech republic"]),
    ("SK", "Slovakia", &[]),
    ("HU", "Hungary", &[]),
    ("RO", "Romania", &[]),
    ("BG", "Bulgaria", &[]),
    ("GR", "Greece", &[]),
    ("HR", "Croatia", &[]),
    ("SI", "Slovenia", &[]),
    ("EE", "Estonia", &[]),
    ("LV", "Latvia", &[]),
    ("LT", "Lithuania", &[]),
    ("CY", "Cyprus", &[]),
    ("MT", "Malta", &[]),
    ("TR", "Turkey", &["türkiye", "turkiye"]),
    ("IL", "Israel", &[]),
    ("AE", "United Arab Emirates", &["uae"]),
    ("SA", "Saudi Arabia", &[]),
    ("QA", "Qatar", &[]),
    ("EG", "Egypt", &[]),
    ("MA", "Morocco", &[]),
    ("NG", "Nigeria", &[]),
    ("KE", "Kenya", &[]),
    ("GH", "Ghana", &[]),
    ("ZA", "South Africa", &[]),
    ("IN", "India", &[]),
    ("PK", "Pakistan", &[]),
    ("BD", "Bangladesh", &[]),
    ("LK", "Sri Lanka", &[]),
    ("CN", "China", &["people's republic of china", "prc"]),
    ("HK", "Hong Kong", &[]),
    ("TW", "Taiwan", &[]),
    ("JP", "Japan", &[]),
    ("KR", "South Korea", &["korea", "republic of korea"]),
    ("SG", "Singapore", &[]),
    ("MY", "Malaysia", &[]),
    ("TH", "Thailand", &[]),
    ("VN", "Vietnam", &["viet nam"]),
    ("PH", "Philippines", &[]),
    ("ID", "Indonesia", &[]),
    ("AU", "Australia", &[]),
    ("NZ", "New Zealand", &[]),
    ("BR", "Brazil", &["brasil"]),
    ("AR", "Argentina", &[]),
    ("CL", "Chile", &[]),
    ("CO", "Colombia", &[]),
    ("PE", "Peru", &[]),
    ("UY", "Uruguay", &[]),
    ("PR", "Puerto Rico", &[]),
];

impl CountryCode {
    /// United States, the storefront's home market.
    pub const US: Self = Self("US");

    /// Resolve a country name, alias, or alpha-2 code (case-insensitive).
    ///
    /// # Errors
    ///
    /// Returns `UnknownCountry` if the input is not in the table.
    pub fn resolve(input: &str) -> Result<Self, UnknownCountry> {
        let needle = input.trim().to_lowercase();
        if needle.is_empty() {
            return Err(UnknownCountry(input.to_owned()));
        }

        COUNTRIES
            .iter()
            .find(|(code, name, aliases)| {
                code.eq_ignore_ascii_case(&needle)
                    || name.to_lowercase() == needle
                    || aliases.contains(&needle.as_str())
            })
            .map(|(code, _, _)| Self(*code))
            .ok_or_else(|| UnknownCountry(input.to_owned()))
    }

    /// The two-letter code.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        self.0
    }

    /// English short name.
    #[must_use]
    pub fn name(self) -> &'static str {
        COUNTRIES
            .iter()
            .find(|(code, _, _)| *code == self.0)
            .map_or(self.0, |(_, name, _)| *name)
    }
}

impl std::fmt::Display for CountryCode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.0)
    }
}

impl std::str::FromStr for CountryCode {
    type Err = UnknownCountry;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::resolve(s)
    }
}

impl TryFrom<String> for CountryCode {
    type Error = UnknownCountry;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        Self::resolve(&value)
    }
}

impl From<CountryCode> for String {
    fn from(code: CountryCode) -> Self {
        code.0.to_owned()
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn test_resolve_names_codes_and_aliases() {
        assert_eq!(CountryCode::resolve("United States").unwrap(), CountryCode::US);
        assert_eq!(CountryCode::resolve("usa").unwrap().as_str(), "US");
        assert_eq!(CountryCode::resolve("  United Kingdom ").unwrap().as_str(), "GB");
        assert_eq!(CountryCode::resolve("UK").unwrap().as_str(), "GB");
        assert_eq!(CountryCode::resolve("de").unwrap().as_str(), "DE");
        assert_eq!(CountryCode::resolve("CANADA").unwrap().as_str(), "CA");
    }

    #[test]
    fn test_resolve_unknown_is_an_error() {
        assert_eq!(
            CountryCode::resolve("Atlantis"),
            Err(UnknownCountry("Atlantis".to_string()))
        );
        assert!(CountryCode::resolve("").is_err());
    }

    #[test]
    fn test_table_codes_are_unique_two_letter() {
        let mut seen = std::collections::HashSet::new();
        for (code, _, _) in COUNTRIES {
            assert_eq!(code.len(), 2, "{code}");
            assert!(seen.insert(*code), "duplicate {code}");
        }
    }

    #[test]
    fn test_name_lookup() {
        assert_eq!(CountryCode::resolve("jp").unwrap().name(), "Japan");
    }

    #[test]
    fn test_serde_uses_code() {
        let json = serde_json::to_string(&CountryCode::US).unwrap();
        assert_eq!(json, "\"US\"");
        let parsed: CountryCode = serde_json::from_str("\"France\"").unwrap();
        assert_eq!(parsed.as_str(), "FR");
    }
}
