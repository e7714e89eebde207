use anyhow::{bail, Result};
use serde::{Deserialize, Serialize};
use std::fmt;

/// How a page should be fetched
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum RenderMode {
    /// Full browser rendering; search pages need script execution to paginate
    Browser,
    /// Plain HTTP GET; enough for listing pages
    Raw,
}

impl RenderMode {
    /// Suffix used in search page snapshot filenames
    pub fn file_tag(self) -> &'static str {
        match self {
            RenderMode::Browser => "playwright",
            RenderMode::Raw => "raw",
        }
    }
}

/// Sale or rent flag as the count endpoint expects it
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
pub enum SaleFlag {
    /// "R", for sale
    Sale,
    /// "L", for rent
    Rent,
}

impl SaleFlag {
    pub fn code(self) -> &'static str {
        match self {
            SaleFlag::Sale => "R",
            SaleFlag::Rent => "L",
        }
    }
}

/// Site codes behind one property-type key such as `satilik-villa`
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PropertyTypeCodes {
    pub key: &'static str,
    pub type_code: u32,
    pub subtype_codes: &'static [u32],
    pub sale: SaleFlag,
}

pub const PROPERTY_TYPES: &[PropertyTypeCodes] = &[
    PropertyTypeCodes { key: "satilik-villa", type_code: 3, subtype_codes: &[4], sale: SaleFlag::Sale },
    PropertyTypeCodes { key: "satilik-ev", type_code: 1, subtype_codes: &[1], sale: SaleFlag::Sale },
    PropertyTypeCodes { key: "satilik-daire", type_code: 1, subtype_codes: &[2], sale: SaleFlag::Sale },
    PropertyTypeCodes { key: "kiralik-villa", type_code: 3, subtype_codes: &[4], sale: SaleFlag::Rent },
    PropertyTypeCodes { key: "kiralik-daire", type_code: 1, subtype_codes: &[2], sale: SaleFlag::Rent },
];

/// Named city + property type shortcuts
pub const PRESETS: &[(&str, &str, &str)] = &[
    ("iskele_villa", "iskele", "satilik-villa"),
    ("magusa_villa", "magusa", "satilik-villa"),
    ("lefkosa_daire", "lefkosa", "satilik-daire"),
    ("girne_villa", "girne", "satilik-villa"),
];

pub fn property_type_codes(key: &str) -> Option<&'static PropertyTypeCodes> {
    PROPERTY_TYPES.iter().find(|p| p.key == key)
}

/// Result ordering on the search page
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
pub enum SortOrder {
    /// "mr"
    Newest,
    /// "pa"
    PriceAscending,
    /// "pd"
    PriceDescending,
}

impl SortOrder {
    pub fn parse(raw: &str) -> Result<Self> {
        match raw {
            "mr" => Ok(SortOrder::Newest),
            "pa" => Ok(SortOrder::PriceAscending),
            "pd" => Ok(SortOrder::PriceDescending),
            other => bail!("Unknown sort order '{}', expected one of mr, pa, pd", other),
        }
    }

    pub fn code(self) -> &'static str {
        match self {
            SortOrder::Newest => "mr",
            SortOrder::PriceAscending => "pa",
            SortOrder::PriceDescending => "pd",
        }
    }
}

/// Search parameters for property scraping
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SearchParams {
    /// City slug, e.g. `iskele`
    pub city: String,
    /// Property-type key, e.g. `satilik-villa`
    pub property_type: String,
    pub sort: SortOrder,
}

impl Default for SearchParams {
    fn default() -> Self {
        Self {
            city: "iskele".to_string(),
            property_type: "satilik-villa".to_string(),
            sort: SortOrder::Newest,
        }
    }
}

impl SearchParams {
    pub fn new(city: &str, property_type: &str, sort: SortOrder) -> Result<Self> {
        if property_type_codes(property_type).is_none() {
            let known: Vec<_> = PROPERTY_TYPES.iter().map(|p| p.key).collect();
            bail!("Unknown property type '{}', expected one of {}", property_type, known.join(", "));
        }
        Ok(Self {
            city: city.to_string(),
            property_type: property_type.to_string(),
            sort,
        })
    }

    /// Look up a preset by name
    pub fn from_preset(name: &str, sort: SortOrder) -> Result<Self> {
        match PRESETS.iter().find(|(preset, _, _)| *preset == name) {
            Some((_, city, property_type)) => Self::new(city, property_type, sort),
            None => {
                let known: Vec<_> = PRESETS.iter().map(|(preset, _, _)| *preset).collect();
                bail!("Unknown preset '{}', available: {}", name, known.join(", "))
            }
        }
    }

    pub fn codes(&self) -> Result<&'static PropertyTypeCodes> {
        match property_type_codes(&self.property_type) {
            Some(codes) => Ok(codes),
            None => bail!("Unknown property type '{}'", self.property_type),
        }
    }

    /// Search results URL without query string
    pub fn base_search_url(&self, domain: &str) -> String {
        format!("{}/kibris/{}/{}", domain.trim_end_matches('/'), self.property_type, self.city)
    }

    pub fn search_url(&self, domain: &str, page: u32) -> String {
        format!("{}?page={}&sort={}", self.base_search_url(domain), page, self.sort.code())
    }

    /// Form body for the result-count endpoint
    pub fn count_form(&self) -> Result<Vec<(String, String)>> {
        let codes = self.codes()?;
        let mut form = vec![
            ("page".to_string(), "1".to_string()),
            ("s_r".to_string(), codes.sale.code().to_string()),
            ("property_type".to_string(), codes.type_code.to_string()),
            ("city".to_string(), self.city.clone()),
        ];
        for (i, subtype) in codes.subtype_codes.iter().enumerate() {
            form.push((format!("property_subtype[{}]", i), subtype.to_string()));
        }
        Ok(form)
    }
}

impl fmt::Display for SearchParams {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} / {} (sort={})", self.city, self.property_type, self.sort.code())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn builds_search_url() {
        let params = SearchParams::default();
        assert_eq!(
            params.search_url("https://www.101evler.com/", 2),
            "https://www.101evler.com/kibris/satilik-villa/iskele?page=2&sort=mr"
        );
    }

    #[test]
    fn preset_resolves_city_and_type() {
        let params = SearchParams::from_preset("lefkosa_daire", SortOrder::PriceAscending).unwrap();
        assert_eq!(params.city, "lefkosa");
        assert_eq!(params.property_type, "satilik-daire");
        assert!(SearchParams::from_preset("nowhere", SortOrder::Newest).is_err());
    }

    #[test]
    fn count_form_carries_codes() {
        let params = SearchParams::new("magusa", "kiralik-daire", SortOrder::Newest).unwrap();
        let form = params.count_form().unwrap();
        assert!(form.contains(&("s_r".to_string(), "L".to_string())));
        assert!(form.contains(&("property_type".to_string(), "1".to_string())));
        assert!(form.contains(&("property_subtype[0]".to_string(), "2".to_string())));
        assert!(form.contains(&("city".to_string(), "magusa".to_string())));
    }

    #[test]
    fn rejects_unknown_property_type() {
        assert!(SearchParams::new("girne", "satilik-kale", SortOrder::Newest).is_err());
        assert!(SortOrder::parse("zz").is_err());
    }
}
