//! Test data: identifier harvesting and form fixtures

use crate::error::ConfigResult;
use crate::validation::{validate_non_empty, validate_regex, validate_required_string, Validatable};
use serde::{Deserialize, Serialize};

/// Business data fed into request templates
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct DataConfig {
    /// Pattern that finds entity identifiers in a harvested response body.
    /// When it has a capture group, group 1 is the identifier.
    pub id_pattern: String,

    /// Identifiers used when harvesting finds nothing
    pub fallback_ids: Vec<String>,

    /// Currency codes accepted by the target
    pub currencies: Vec<String>,

    /// Shipping addresses for checkout
    pub addresses: Vec<Address>,

    /// Payment cards for checkout (mock payment service only)
    pub cards: Vec<PaymentCard>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Address {
    pub street_address: String,
    pub zip_code: String,
    pub city: String,
    pub state: String,
    pub country: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PaymentCard {
    pub number: String,
    pub expiration_month: String,
    pub expiration_year: String,
    pub cvv: String,
}

impl Default for DataConfig {
    fn default() -> Self {
        Self {
            id_pattern: r#"href="/product/([A-Z0-9]{10})""#.to_string(),
            fallback_ids: [
                "OLJCESPC7Z",
                "66VCHSJNUP",
                "1YMWWN1N4O",
                "L9ECAV7KIM",
                "2ZYFJ3GM2N",
                "0PUK6V6EV0",
                "LS4PSXUNUM",
                "9SIQT8TOJO",
                "6E92ZMYYFZ",
            ]
            .iter()
            .map(|id| id.to_string())
            .collect(),
            currencies: ["USD", "EUR", "GBP", "JPY", "CAD", "CHF"]
                .iter()
                .map(|c| c.to_string())
                .collect(),
            addresses: vec![
                Address::new("1600 Amphitheatre Pkwy", "94043", "Mountain View", "CA", "United States"),
                Address::new("221B Baker Street", "NW1 6XE", "London", "England", "United Kingdom"),
                Address::new("350 Fifth Avenue", "10118", "New York", "NY", "United States"),
            ],
            cards: vec![
                PaymentCard::new("4432-8015-6152-0454", "1", "2030", "672"),
                PaymentCard::new("4111111111111111", "6", "2028", "123"),
                PaymentCard::new("5500005555555559", "12", "2027", "456"),
            ],
        }
    }
}

impl Address {
    pub fn new(street_address: &str, zip_code: &str, city: &str, state: &str, country: &str) -> Self {
        Self {
            street_address: street_address.to_string(),
            zip_code: zip_code.to_string(),
            city: city.to_string(),
            state: state.to_string(),
            country: country.to_string(),
        }
    }
}

impl PaymentCard {
    pub fn new(number: &str, month: &str, year: &str, cvv: &str) -> Self {
        Self {
            number: number.to_string(),
            expiration_month: month.to_string(),
            expiration_year: year.to_string(),
            cvv: cvv.to_string(),
        }
    }
}

impl Validatable for DataConfig {
    fn validate(&self) -> ConfigResult<()> {
        validate_regex(&self.id_pattern, "id_pattern", self.domain_name())?;
        validate_non_empty(&self.fallback_ids, "fallback_ids", self.domain_name())?;
        validate_non_empty(&self.currencies, "currencies", self.domain_name())?;
        validate_non_empty(&self.addresses, "addresses", self.domain_name())?;
        validate_non_empty(&self.cards, "cards", self.domain_name())?;

        for id in &self.fallback_ids {
            validate_required_string(id, "fallback_ids entry", self.domain_name())?;
        }

        Ok(())
    }

    fn domain_name(&self) -> &'static str {
        "data"
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_data_defaults() {
        let config = DataConfig::default();
        assert_eq!(config.fallback_ids.len(), 9);
        assert_eq!(config.currencies.len(), 6);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_data_validation() {
        let mut config = DataConfig::default();
        config.fallback_ids.clear();
        assert!(config.validate().is_err());

        let mut config = DataConfig::default();
        config.id_pattern = "([".to_string();
        assert!(config.validate().is_err());
    }
}
