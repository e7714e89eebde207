use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use std::fmt;

/// Whether a listing is offered for sale or for rent
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
pub enum ListingType {
    Sale,
    Rent,
}

impl fmt::Display for ListingType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ListingType::Sale => f.write_str("Sale"),
            ListingType::Rent => f.write_str("Rent"),
        }
    }
}

/// Floor of the unit inside its building.
///
/// Numeric floors are parsed; labels such as "Giriş Katı" are kept verbatim.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub enum Floor {
    Number(i32),
    Label(String),
}

impl Floor {
    pub fn parse(raw: &str) -> Self {
        let raw = raw.trim();
        match raw.parse::<i32>() {
            Ok(n) => Floor::Number(n),
            Err(_) => Floor::Label(raw.to_string()),
        }
    }
}

impl fmt::Display for Floor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Floor::Number(n) => write!(f, "{}", n),
            Floor::Label(label) => f.write_str(label),
        }
    }
}

/// One property listing extracted from a saved listing page
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct ListingRecord {
    pub source_file: String,
    pub property_id: Option<String>,
    pub title: Option<String>,
    pub price: Option<f64>,
    pub currency: Option<String>,
    pub listing_type: Option<ListingType>,
    pub property_type: Option<String>,
    pub property_subtype: Option<String>,
    pub room_count: Option<String>,
    pub district: Option<String>,
    pub city: Option<String>,
    pub country: String,
    pub agency_name: Option<String>,
    pub url: Option<String>,
    pub description: Option<String>,
    pub listing_date: Option<String>,
    pub update_date: Option<String>,
    pub title_deed_type: Option<String>,
    pub min_rental_period: Option<String>,
    pub payment_interval: Option<String>,
    pub exchange_option: Option<String>,
    /// "floor" or "floor / total floors"; not persisted as a column
    pub floor: Option<String>,
    pub image_links: Vec<String>,
    pub phone_numbers: BTreeSet<String>,
    pub whatsapp_numbers: BTreeSet<String>,
}

impl ListingRecord {
    pub fn new(source_file: impl Into<String>, country: impl Into<String>) -> Self {
        Self {
            source_file: source_file.into(),
            country: country.into(),
            ..Default::default()
        }
    }

    /// Identifier plus at least one of listing type / property type
    pub fn has_basic_data(&self) -> bool {
        self.property_id.is_some() && (self.listing_type.is_some() || self.property_type.is_some())
    }

    pub fn has_price_data(&self) -> bool {
        self.price.is_some() && self.currency.is_some()
    }

    pub fn has_location_data(&self) -> bool {
        self.district.is_some() || self.city.is_some()
    }

    /// Low-confidence records are still emitted, callers may filter on this
    pub fn is_low_confidence(&self) -> bool {
        !self.has_basic_data()
    }

    /// Value of a storage column, `None` for unknown columns or empty fields
    pub fn column(&self, name: &str) -> Option<String> {
        match name {
            "source_file" => Some(self.source_file.clone()),
            "property_id" => self.property_id.clone(),
            "title" => self.title.clone(),
            "price" => self.price.map(|p| p.to_string()),
            "currency" => self.currency.clone(),
            "listing_type" => self.listing_type.map(|t| t.to_string()),
            "property_type" => self.property_type.clone(),
            "property_subtype" => self.property_subtype.clone(),
            "room_count" => self.room_count.clone(),
            "district" => self.district.clone(),
            "city" => self.city.clone(),
            "country" => Some(self.country.clone()),
            "agency_name" => self.agency_name.clone(),
            "url" => self.url.clone(),
            "description" => self.description.clone(),
            "listing_date" => self.listing_date.clone(),
            "update_date" => self.update_date.clone(),
            "title_deed_type" => self.title_deed_type.clone(),
            "min_rental_period" => self.min_rental_period.clone(),
            "payment_interval" => self.payment_interval.clone(),
            "exchange_option" => self.exchange_option.clone(),
            "image_links" => join_values(self.image_links.iter()),
            "phone_numbers" => join_values(self.phone_numbers.iter()),
            "whatsapp_numbers" => join_values(self.whatsapp_numbers.iter()),
            _ => None,
        }
    }
}

fn join_values<'a>(items: impl Iterator<Item = &'a String>) -> Option<String> {
    let joined = items.map(String::as_str).collect::<Vec<_>>().join(",");
    if joined.is_empty() {
        None
    } else {
        Some(joined)
    }
}

/// How many search-result pages (and listings) a search has
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PageCountEstimate {
    pub total_listings: Option<u64>,
    /// Always at least 1
    pub total_pages: u32,
}

impl PageCountEstimate {
    /// A user supplied page count beats every computed value
    pub fn with_override(self, max_pages: Option<u32>) -> Self {
        match max_pages {
            Some(pages) => Self {
                total_pages: pages.max(1),
                ..self
            },
            None => self,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn floor_keeps_non_numeric_labels() {
        assert_eq!(Floor::parse(" 3 "), Floor::Number(3));
        assert_eq!(Floor::parse("Giriş Katı"), Floor::Label("Giriş Katı".into()));
    }

    #[test]
    fn confidence_flags() {
        let mut record = ListingRecord::new("1.html", "Northern Cyprus");
        assert!(record.is_low_confidence());
        assert!(!record.has_location_data());

        record.property_id = Some("1".into());
        record.property_type = Some("Konut".into());
        record.city = Some("Gazimağusa".into());
        assert!(record.has_basic_data());
        assert!(record.has_location_data());
        assert!(!record.has_price_data());

        record.price = Some(580.0);
        record.currency = Some("USD".into());
        assert!(record.has_price_data());
    }

    #[test]
    fn multi_valued_columns_are_comma_joined() {
        let mut record = ListingRecord::new("1.html", "Northern Cyprus");
        assert_eq!(record.column("image_links"), None);
        record.image_links = vec!["a".into(), "b".into()];
        record.phone_numbers.insert("+905551112233".into());
        assert_eq!(record.column("image_links").as_deref(), Some("a,b"));
        assert_eq!(record.column("phone_numbers").as_deref(), Some("+905551112233"));
        assert_eq!(record.column("price_tl_14x"), None);
    }

    #[test]
    fn override_wins_and_stays_positive() {
        let estimate = PageCountEstimate {
            total_listings: Some(900),
            total_pages: 30,
        };
        assert_eq!(estimate.with_override(Some(5)).total_pages, 5);
        assert_eq!(estimate.with_override(Some(0)).total_pages, 1);
        assert_eq!(estimate.with_override(None), estimate);
    }
}
