//! Label/value rows and the table mapping label phrases to record fields.

use super::{Draft, ExtractError};
use crate::models::{Floor, ListingType};
use once_cell::sync::Lazy;
use regex::Regex;
use scraper::{ElementRef, Html, Selector};
use tracing::debug;

static PRICE: Lazy<Regex> = Lazy::new(|| Regex::new(r"^([£$€₺])\s*([0-9,.]+)").expect("valid price regex"));
static ROW: Lazy<Selector> = Lazy::new(|| Selector::parse("div.text-block-141").expect("valid row selector"));
static LABEL: Lazy<Selector> = Lazy::new(|| Selector::parse("div.col-5").expect("valid label selector"));
static VALUE: Lazy<Selector> = Lazy::new(|| Selector::parse("div.col-7").expect("valid value selector"));
static STRONG: Lazy<Selector> = Lazy::new(|| Selector::parse("strong").expect("valid strong selector"));

/// One label/value pair of a two-column row
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LabeledRow {
    pub label: String,
    pub value: String,
}

/// Whether the value is read from an emphasized child first
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ValueSource {
    PreferStrong,
    FullText,
}

pub fn clean_text(element: ElementRef<'_>) -> String {
    element
        .text()
        .map(str::trim)
        .filter(|t| !t.is_empty())
        .collect::<Vec<_>>()
        .join(" ")
}

/// Rows under every element matching `section`; rows missing a column are skipped
pub fn labeled_rows(document: &Html, section: &Selector, source: ValueSource) -> Vec<LabeledRow> {
    let mut rows = Vec::new();
    for container in document.select(section) {
        for row in container.select(&ROW) {
            let (Some(label), Some(value)) = (row.select(&LABEL).next(), row.select(&VALUE).next()) else {
                continue;
            };
            let strong = match source {
                ValueSource::PreferStrong => value.select(&STRONG).next(),
                ValueSource::FullText => None,
            };
            let value = strong.map(clean_text).unwrap_or_else(|| clean_text(value));
            if value.is_empty() {
                continue;
            }
            rows.push(LabeledRow {
                label: clean_text(label),
                value,
            });
        }
    }
    rows
}

type Setter = fn(&mut Draft, &str) -> Result<(), ExtractError>;

/// Label phrases (matched by containment) and the field they fill
pub(super) struct LabelRule {
    pub field: &'static str,
    pub phrases: &'static [&'static str],
    pub apply: Setter,
}

/// Apply the first rule whose phrase occurs in the row label
pub(super) fn apply_rules(rules: &[LabelRule], rows: &[LabeledRow], draft: &mut Draft) -> Result<(), ExtractError> {
    for row in rows {
        let rule = rules
            .iter()
            .find(|rule| rule.phrases.iter().any(|phrase| row.label.contains(phrase)));
        if let Some(rule) = rule {
            debug!("Row '{}' -> {}", row.label, rule.field);
            (rule.apply)(draft, &row.value)?;
        }
    }
    Ok(())
}

fn fill(slot: &mut Option<String>, value: &str) {
    if slot.is_none() {
        *slot = Some(value.trim().to_string());
    }
}

/// "Konum" rows: comma split first, slash split as fallback
pub fn split_location(value: &str) -> Option<(String, String)> {
    for separator in [',', '/'] {
        let parts: Vec<&str> = value.split(separator).collect();
        if parts.len() >= 2 {
            return Some((parts[0].trim().to_string(), parts[1].trim().to_string()));
        }
    }
    None
}

fn currency_code(symbol: &str) -> Option<&'static str> {
    match symbol {
        "£" => Some("GBP"),
        "$" => Some("USD"),
        "€" => Some("EUR"),
        "₺" => Some("TRY"),
        _ => None,
    }
}

/// Amount with grouping separators removed.
///
/// Commas are always grouping. Dots are grouping when repeated or when a
/// single dot is followed by exactly three digits ("₺1.250").
fn parse_amount(raw: &str) -> Result<f64, ExtractError> {
    let without_commas = raw.replace(',', "");
    let dots = without_commas.matches('.').count();
    let grouped_dot = dots == 1
        && without_commas
            .split_once('.')
            .map(|(_, tail)| tail.len() == 3)
            .unwrap_or(false);
    let normalized = if dots > 1 || grouped_dot {
        without_commas.replace('.', "")
    } else {
        without_commas
    };
    normalized.parse::<f64>().map_err(|_| ExtractError::Price { raw: raw.to_string() })
}

/// `"$580 (~ 22,291 TL)"` gives `(580.0, "USD")`; values without a leading
/// currency symbol give `None`
pub fn parse_price(value: &str) -> Result<Option<(f64, &'static str)>, ExtractError> {
    let Some(caps) = PRICE.captures(value.trim()) else {
        return Ok(None);
    };
    let Some(currency) = currency_code(&caps[1]) else {
        return Ok(None);
    };
    let amount = parse_amount(&caps[2])?;
    Ok(Some((amount, currency)))
}

/// Only an all-digit value (after the `#` prefix) is an ID
fn set_property_id(d: &mut Draft, v: &str) -> Result<(), ExtractError> {
    let id = v.replace('#', "");
    let id = id.trim();
    if !id.is_empty() && id.chars().all(|c| c.is_ascii_digit()) {
        fill(&mut d.record.property_id, id);
    }
    Ok(())
}

fn set_location(d: &mut Draft, v: &str) -> Result<(), ExtractError> {
    if d.record.district.is_some() || d.record.city.is_some() {
        return Ok(());
    }
    if let Some((district, city)) = split_location(v) {
        d.record.district = Some(district);
        d.record.city = Some(city);
    }
    Ok(())
}

fn set_property_type(d: &mut Draft, v: &str) -> Result<(), ExtractError> {
    if d.record.property_type.is_some() {
        return Ok(());
    }
    match v.split_once('/') {
        Some((kind, subtype)) => {
            d.record.property_type = Some(kind.trim().to_string());
            let subtype = subtype.split('/').next().unwrap_or_default().trim();
            if !subtype.is_empty() {
                d.record.property_subtype = Some(subtype.to_string());
            }
        }
        None => d.record.property_type = Some(v.trim().to_string()),
    }
    Ok(())
}

fn set_listing_type(d: &mut Draft, v: &str) -> Result<(), ExtractError> {
    if d.record.listing_type.is_some() {
        return Ok(());
    }
    let lower = v.to_lowercase();
    if v.contains("Kiralık") || lower.contains("rent") {
        d.record.listing_type = Some(ListingType::Rent);
    } else if v.contains("Satılık") || lower.contains("sale") {
        d.record.listing_type = Some(ListingType::Sale);
    }
    Ok(())
}

fn set_price(d: &mut Draft, v: &str) -> Result<(), ExtractError> {
    if d.record.price.is_some() {
        return Ok(());
    }
    if let Some((amount, currency)) = parse_price(v)? {
        d.record.price = Some(amount);
        d.record.currency = Some(currency.to_string());
    }
    Ok(())
}

fn set_title_deed(d: &mut Draft, v: &str) -> Result<(), ExtractError> {
    fill(&mut d.record.title_deed_type, v);
    Ok(())
}

fn set_exchange(d: &mut Draft, v: &str) -> Result<(), ExtractError> {
    fill(&mut d.record.exchange_option, v);
    Ok(())
}

fn set_listing_date(d: &mut Draft, v: &str) -> Result<(), ExtractError> {
    fill(&mut d.record.listing_date, v);
    Ok(())
}

fn set_update_date(d: &mut Draft, v: &str) -> Result<(), ExtractError> {
    fill(&mut d.record.update_date, v);
    Ok(())
}

fn set_min_rental(d: &mut Draft, v: &str) -> Result<(), ExtractError> {
    fill(&mut d.record.min_rental_period, v);
    Ok(())
}

fn set_payment_interval(d: &mut Draft, v: &str) -> Result<(), ExtractError> {
    fill(&mut d.record.payment_interval, v);
    Ok(())
}

fn set_room_count(d: &mut Draft, v: &str) -> Result<(), ExtractError> {
    fill(&mut d.record.room_count, v);
    Ok(())
}

fn set_floor(d: &mut Draft, v: &str) -> Result<(), ExtractError> {
    if d.floor.is_none() {
        d.floor = Some(Floor::parse(v));
    }
    Ok(())
}

fn set_total_floors(d: &mut Draft, v: &str) -> Result<(), ExtractError> {
    if d.total_floors.is_none() {
        d.total_floors = Some(Floor::parse(v));
    }
    Ok(())
}

const ID: &[&str] = &["İlan No", "Listing No"];
const LOCATION: &[&str] = &["Konum", "Location"];
const LISTING_DATE: &[&str] = &["İlan Tarihi", "Listing Date"];
const UPDATE_DATE: &[&str] = &["Güncelleme Tarihi", "Update Date"];
const ROOMS: &[&str] = &["Oda Sayısı", "Room Count", "Rooms"];

/// Quick-look section ("Hızlı Bakış")
pub(super) const QUICK_LOOK_RULES: &[LabelRule] = &[
    LabelRule { field: "property_id", phrases: ID, apply: set_property_id },
    LabelRule { field: "location", phrases: LOCATION, apply: set_location },
    LabelRule { field: "property_type", phrases: &["Emlak Türü", "Property Type"], apply: set_property_type },
    LabelRule { field: "listing_type", phrases: &["Durumu", "Status"], apply: set_listing_type },
    LabelRule { field: "price", phrases: &["Fiyat", "Price"], apply: set_price },
    LabelRule { field: "title_deed_type", phrases: &["Tapu Türü", "Title Deed"], apply: set_title_deed },
    LabelRule { field: "exchange_option", phrases: &["Takas", "Exchange"], apply: set_exchange },
    LabelRule { field: "listing_date", phrases: LISTING_DATE, apply: set_listing_date },
    LabelRule { field: "update_date", phrases: UPDATE_DATE, apply: set_update_date },
    LabelRule { field: "min_rental_period", phrases: &["En Az Kiralama", "Minimum Rental"], apply: set_min_rental },
    LabelRule { field: "payment_interval", phrases: &["Kira Ödeme Aralığı", "Payment Interval"], apply: set_payment_interval },
    LabelRule { field: "room_count", phrases: ROOMS, apply: set_room_count },
];

/// Property details section ("Konut Detayları"); total floors before floor
/// because "Floor" is contained in "Total Floors"
pub(super) const DETAIL_RULES: &[LabelRule] = &[
    LabelRule { field: "total_floors", phrases: &["Kat Sayısı", "Total Floors"], apply: set_total_floors },
    LabelRule { field: "floor", phrases: &["Bulunduğu Kat", "Floor"], apply: set_floor },
    LabelRule { field: "room_count", phrases: ROOMS, apply: set_room_count },
];

/// Right-hand summary column, consulted only for fields still missing
pub(super) const ALTERNATE_RULES: &[LabelRule] = &[
    LabelRule { field: "listing_date", phrases: LISTING_DATE, apply: set_listing_date },
    LabelRule { field: "update_date", phrases: UPDATE_DATE, apply: set_update_date },
    LabelRule { field: "location", phrases: LOCATION, apply: set_location },
];

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::ListingRecord;

    fn draft() -> Draft {
        Draft::new(ListingRecord::new("1.html", "Northern Cyprus"))
    }

    fn row(label: &str, value: &str) -> LabeledRow {
        LabeledRow {
            label: label.to_string(),
            value: value.to_string(),
        }
    }

    #[test]
    fn price_with_converted_suffix() {
        assert_eq!(parse_price("$580 (~ 22,291 TL)").unwrap(), Some((580.0, "USD")));
    }

    #[test]
    fn price_with_dot_grouping() {
        assert_eq!(parse_price("₺1.250.000").unwrap(), Some((1_250_000.0, "TRY")));
        assert_eq!(parse_price("£125.000").unwrap(), Some((125_000.0, "GBP")));
        assert_eq!(parse_price("€1,250.50").unwrap(), Some((1250.5, "EUR")));
    }

    #[test]
    fn price_without_symbol_is_absent_and_garbage_is_an_error() {
        assert_eq!(parse_price("Fiyat sorunuz").unwrap(), None);
        assert!(matches!(parse_price("$,"), Err(ExtractError::Price { .. })));
    }

    #[test]
    fn location_splits_on_comma_then_slash() {
        assert_eq!(
            split_location("Long Beach, İskele"),
            Some(("Long Beach".to_string(), "İskele".to_string()))
        );
        assert_eq!(
            split_location("Çanakkale / Gazimağusa"),
            Some(("Çanakkale".to_string(), "Gazimağusa".to_string()))
        );
        assert_eq!(split_location("İskele"), None);
    }

    #[test]
    fn rules_map_labels_by_containment() {
        let mut d = draft();
        let rows = vec![
            row("İlan No:", "#123456"),
            row("Emlak Türü", "Konut / Villa"),
            row("İlan Durumu", "Satılık"),
            row("Fiyat", "£250,000"),
            row("Bilinmeyen", "ignored"),
        ];
        apply_rules(QUICK_LOOK_RULES, &rows, &mut d).unwrap();
        assert_eq!(d.record.property_id.as_deref(), Some("123456"));
        assert_eq!(d.record.property_type.as_deref(), Some("Konut"));
        assert_eq!(d.record.property_subtype.as_deref(), Some("Villa"));
        assert_eq!(d.record.listing_type, Some(ListingType::Sale));
        assert_eq!(d.record.price, Some(250_000.0));
        assert_eq!(d.record.currency.as_deref(), Some("GBP"));
    }

    #[test]
    fn non_numeric_id_is_ignored() {
        let mut d = draft();
        apply_rules(QUICK_LOOK_RULES, &[row("İlan No", "#")], &mut d).unwrap();
        assert_eq!(d.record.property_id, None);
        assert!(!d.record.has_basic_data());

        apply_rules(QUICK_LOOK_RULES, &[row("İlan No", "ABC-12")], &mut d).unwrap();
        assert_eq!(d.record.property_id, None);

        apply_rules(QUICK_LOOK_RULES, &[row("İlan No", " # 4521 ")], &mut d).unwrap();
        assert_eq!(d.record.property_id.as_deref(), Some("4521"));
    }

    #[test]
    fn english_labels_work_too() {
        let mut d = draft();
        let rows = vec![row("Status", "For Rent"), row("Property Type", "Apartment")];
        apply_rules(QUICK_LOOK_RULES, &rows, &mut d).unwrap();
        assert_eq!(d.record.listing_type, Some(ListingType::Rent));
        assert_eq!(d.record.property_type.as_deref(), Some("Apartment"));
        assert_eq!(d.record.property_subtype, None);
    }

    #[test]
    fn first_value_wins() {
        let mut d = draft();
        let rows = vec![row("Oda Sayısı", "3+1"), row("Oda Sayısı", "2+1")];
        apply_rules(QUICK_LOOK_RULES, &rows, &mut d).unwrap();
        assert_eq!(d.record.room_count.as_deref(), Some("3+1"));
    }

    #[test]
    fn total_floors_not_mistaken_for_floor() {
        let mut d = draft();
        let rows = vec![row("Total Floors", "5"), row("Floor", "Ground floor")];
        apply_rules(DETAIL_RULES, &rows, &mut d).unwrap();
        assert_eq!(d.total_floors, Some(Floor::Number(5)));
        assert_eq!(d.floor, Some(Floor::Label("Ground floor".into())));
    }

    #[test]
    fn reads_strong_value_when_present() {
        let html = r#"
            <div id="hizli-bakis"><div class="zebra-rows">
              <div class="text-block-141"><div class="col-5">Fiyat</div>
                <div class="col-7"><strong>$580</strong> (~ 22,291 TL)</div></div>
              <div class="text-block-141"><div class="col-5">Eksik</div></div>
            </div></div>"#;
        let document = Html::parse_document(html);
        let section = Selector::parse("div#hizli-bakis div.zebra-rows").unwrap();
        let rows = labeled_rows(&document, &section, ValueSource::PreferStrong);
        assert_eq!(rows, vec![row("Fiyat", "$580")]);
        let rows = labeled_rows(&document, &section, ValueSource::FullText);
        assert_eq!(rows, vec![row("Fiyat", "$580 (~ 22,291 TL)")]);
    }
}
