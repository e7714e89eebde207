//! Listing page to [`ListingRecord`].
//!
//! Each field has an ordered list of strategies; the first one producing a
//! non-empty value wins. A failing stage stops extraction and the fields
//! gathered so far are returned as [`Extraction::Partial`].

mod contacts;
mod media;
mod rows;

pub use contacts::{is_plausible_phone, normalize_whatsapp};
pub use rows::{parse_price, split_location, LabeledRow};

use crate::config::Config;
use crate::models::{Floor, ListingRecord};
use chrono::NaiveDate;
use once_cell::sync::Lazy;
use regex::Regex;
use rows::{apply_rules, clean_text, labeled_rows, ValueSource, ALTERNATE_RULES, DETAIL_RULES, QUICK_LOOK_RULES};
use scraper::{Html, Selector};
use thiserror::Error;
use tracing::debug;

static H1: Lazy<Selector> = Lazy::new(|| Selector::parse("h1").expect("valid h1 selector"));
static TITLE_BLOCK: Lazy<Selector> = Lazy::new(|| Selector::parse("div.text-block-135").expect("valid title block selector"));
static OG_TITLE: Lazy<Selector> = Lazy::new(|| Selector::parse(r#"meta[property="og:title"]"#).expect("valid og:title selector"));
static TITLE_TAG: Lazy<Selector> = Lazy::new(|| Selector::parse("title").expect("valid title selector"));
static OG_URL: Lazy<Selector> = Lazy::new(|| Selector::parse(r#"meta[property="og:url"]"#).expect("valid og:url selector"));
static DESCRIPTION_BOX: Lazy<Selector> = Lazy::new(|| {
    Selector::parse(r#"div.div-block-361[style*="line-break"]"#).expect("valid description selector")
});
static DESCRIPTION_PARTS: Lazy<Selector> =
    Lazy::new(|| Selector::parse("p.f-s-16, div.f-s-16").expect("valid description part selector"));
static META_DESCRIPTION: Lazy<Selector> =
    Lazy::new(|| Selector::parse(r#"meta[name="description"]"#).expect("valid meta description selector"));
static QUICK_LOOK: Lazy<Selector> =
    Lazy::new(|| Selector::parse("div#hizli-bakis div.zebra-rows").expect("valid quick look selector"));
static DETAILS: Lazy<Selector> = Lazy::new(|| Selector::parse("div#konut-detaylari").expect("valid details selector"));
static SUMMARY_RIGHT: Lazy<Selector> =
    Lazy::new(|| Selector::parse("div.h-zl-bak-sright").expect("valid summary selector"));
static ROOM_ICONS: Lazy<Selector> = Lazy::new(|| Selector::parse("div.text-block-138").expect("valid icon selector"));
static BODY: Lazy<Selector> = Lazy::new(|| Selector::parse("body").expect("valid body selector"));

static ROOM_TOKEN: Lazy<Regex> = Lazy::new(|| Regex::new(r"(\d+\+\d+)").expect("valid room regex"));
static LISTING_DATE_TEXT: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"(?i)(?:İlan\s+Tarihi|Listing\s+Date)\s*:?\s*(\d{2}/\d{2}/\d{4})").expect("valid listing date regex")
});
static UPDATE_DATE_TEXT: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"(?i)(?:Güncelleme\s+Tarihi|Update\s+Date)\s*:?\s*(\d{2}/\d{2}/\d{4})").expect("valid update date regex")
});

/// A stage that could not make sense of its input
#[derive(Debug, Clone, Error, PartialEq)]
pub enum ExtractError {
    #[error("unparseable price amount '{raw}'")]
    Price { raw: String },
}

/// Outcome of extracting one listing page
#[derive(Debug, Clone, PartialEq)]
pub enum Extraction {
    Complete(ListingRecord),
    /// Extraction stopped early; `record` keeps every field found before `error`
    Partial { record: ListingRecord, error: ExtractError },
}

impl Extraction {
    pub fn record(&self) -> &ListingRecord {
        match self {
            Extraction::Complete(record) => record,
            Extraction::Partial { record, .. } => record,
        }
    }

    pub fn into_record(self) -> ListingRecord {
        match self {
            Extraction::Complete(record) => record,
            Extraction::Partial { record, .. } => record,
        }
    }

    pub fn is_partial(&self) -> bool {
        matches!(self, Extraction::Partial { .. })
    }
}

/// Record under construction plus values that are combined at the end
#[derive(Debug)]
pub(crate) struct Draft {
    pub record: ListingRecord,
    pub floor: Option<Floor>,
    pub total_floors: Option<Floor>,
}

impl Draft {
    pub fn new(record: ListingRecord) -> Self {
        Self {
            record,
            floor: None,
            total_floors: None,
        }
    }

    fn finish(self) -> ListingRecord {
        let mut record = self.record;
        record.floor = match (self.floor, self.total_floors) {
            (Some(floor), Some(total)) => Some(format!("{} / {}", floor, total)),
            (Some(floor), None) => Some(floor.to_string()),
            (None, _) => None,
        };
        record
    }
}

#[derive(Debug, Clone)]
pub struct FieldExtractor {
    country: String,
    whatsapp_country_code: String,
}

impl FieldExtractor {
    pub fn new(country: &str, whatsapp_country_code: &str) -> Self {
        Self {
            country: country.to_string(),
            whatsapp_country_code: whatsapp_country_code.to_string(),
        }
    }

    pub fn from_config(cfg: &Config) -> Self {
        Self::new(&cfg.country, &cfg.phone_country_code)
    }

    /// Never fails; `source_file` is always set on the returned record
    pub fn extract(&self, html: &str, source_file: &str) -> Extraction {
        let document = Html::parse_document(html);
        let mut draft = Draft::new(ListingRecord::new(source_file, self.country.as_str()));

        match self.run_stages(&document, &mut draft) {
            Ok(()) => Extraction::Complete(draft.finish()),
            Err(error) => {
                debug!("Extraction of {} stopped early: {}", source_file, error);
                Extraction::Partial {
                    record: draft.finish(),
                    error,
                }
            }
        }
    }

    fn run_stages(&self, document: &Html, draft: &mut Draft) -> Result<(), ExtractError> {
        let record = &mut draft.record;
        record.image_links = media::image_links(document);
        record.title = title(document);
        record.url = meta_content(document, &OG_URL);
        record.agency_name = contacts::agency_name(document);
        record.description = description(document);

        let quick_look = labeled_rows(document, &QUICK_LOOK, ValueSource::PreferStrong);
        apply_rules(QUICK_LOOK_RULES, &quick_look, draft)?;

        let details = labeled_rows(document, &DETAILS, ValueSource::PreferStrong);
        apply_rules(DETAIL_RULES, &details, draft)?;

        if draft.record.room_count.is_none() {
            draft.record.room_count = room_count_from_icons(document);
        }

        let record = &draft.record;
        if record.listing_date.is_none() || record.update_date.is_none() || !record.has_location_data() {
            let summary = labeled_rows(document, &SUMMARY_RIGHT, ValueSource::FullText);
            apply_rules(ALTERNATE_RULES, &summary, draft)?;
        }

        if draft.record.listing_date.is_none() || draft.record.update_date.is_none() {
            let text = page_text(document);
            if draft.record.listing_date.is_none() {
                draft.record.listing_date = date_in_text(&LISTING_DATE_TEXT, &text);
            }
            if draft.record.update_date.is_none() {
                draft.record.update_date = date_in_text(&UPDATE_DATE_TEXT, &text);
            }
        }

        draft.record.phone_numbers = contacts::phone_numbers(document);
        draft.record.whatsapp_numbers = contacts::whatsapp_numbers(document, &self.whatsapp_country_code);
        Ok(())
    }
}

fn non_empty(text: String) -> Option<String> {
    let text = text.trim();
    if text.is_empty() {
        None
    } else {
        Some(text.to_string())
    }
}

fn first_text(document: &Html, selector: &Selector) -> Option<String> {
    document.select(selector).next().map(clean_text).and_then(non_empty)
}

fn meta_content(document: &Html, selector: &Selector) -> Option<String> {
    document
        .select(selector)
        .filter_map(|meta| meta.value().attr("content"))
        .find_map(|content| non_empty(content.to_string()))
}

/// h1, title block, og:title, then `<title>` up to the first " - "
fn title(document: &Html) -> Option<String> {
    first_text(document, &H1)
        .or_else(|| first_text(document, &TITLE_BLOCK))
        .or_else(|| meta_content(document, &OG_TITLE))
        .or_else(|| {
            first_text(document, &TITLE_TAG)
                .and_then(|full| full.split(" - ").next().map(str::to_string))
                .and_then(non_empty)
        })
}

/// Description paragraphs, the whole description box, then meta description
fn description(document: &Html) -> Option<String> {
    let from_box = document.select(&DESCRIPTION_BOX).next().and_then(|container| {
        let parts: Vec<String> = container
            .select(&DESCRIPTION_PARTS)
            .map(clean_text)
            .filter(|part| !part.is_empty())
            .collect();
        if parts.is_empty() {
            non_empty(clean_text(container))
        } else {
            Some(parts.join(" "))
        }
    });
    from_box.or_else(|| meta_content(document, &META_DESCRIPTION))
}

fn room_count_from_icons(document: &Html) -> Option<String> {
    document
        .select(&ROOM_ICONS)
        .map(clean_text)
        .find_map(|text| ROOM_TOKEN.captures(&text).map(|caps| caps[1].to_string()))
}

fn page_text(document: &Html) -> String {
    let root = document.select(&BODY).next().unwrap_or_else(|| document.root_element());
    root.text().collect::<Vec<_>>().join(" ")
}

/// First labeled dd/mm/yyyy that is a real calendar date
fn date_in_text(pattern: &Regex, text: &str) -> Option<String> {
    pattern
        .captures_iter(text)
        .map(|caps| caps[1].to_string())
        .find(|date| NaiveDate::parse_from_str(date, "%d/%m/%Y").is_ok())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::ListingType;

    const LISTING: &str = r#"<!DOCTYPE html>
<html><head>
  <title>Ignored - £250,000 - 123456 | 101evler</title>
  <meta property="og:url" content="https://www.101evler.com/kibris/satilik-emlak/villa-123456.html">
  <meta property="og:image" content="https://cdn.101evler.com/property/123456/1.jpg">
  <meta name="description" content="Meta description">
</head><body>
  <h1>Sea view villa in Long Beach</h1>
  <div class="splide mainGallerySplide"><ul>
    <li class="splide__slide"><img data-splide-lazy="https://cdn.101evler.com/property/123456/1.jpg"></li>
    <li class="splide__slide"><img src="https://cdn.101evler.com/property/123456/2.jpg"></li>
  </ul></div>
  <div class="text-block-157">Kıbrıs Emlak Ofisi</div>
  <div class="div-block-361" style="line-break:anywhere">
    <p class="f-s-16">Three bedrooms.</p>
    <div class="f-s-16">Private pool.</div>
  </div>
  <div id="hizli-bakis"><div class="zebra-rows">
    <div class="text-block-141"><div class="col-5">İlan No</div><div class="col-7"><strong>#123456</strong></div></div>
    <div class="text-block-141"><div class="col-5">Fiyat</div><div class="col-7"><strong>£250,000</strong></div></div>
    <div class="text-block-141"><div class="col-5">Konum</div><div class="col-7">Long Beach, İskele</div></div>
    <div class="text-block-141"><div class="col-5">Emlak Türü</div><div class="col-7">Konut / Villa</div></div>
    <div class="text-block-141"><div class="col-5">İlan Durumu</div><div class="col-7">Satılık</div></div>
    <div class="text-block-141"><div class="col-5">Tapu Türü</div><div class="col-7">Türk Koçanı</div></div>
    <div class="text-block-141"><div class="col-5">İlan Tarihi</div><div class="col-7">01/02/2024</div></div>
  </div></div>
  <div id="konut-detaylari">
    <div class="text-block-141"><div class="col-5">Bulunduğu Kat</div><div class="col-7">Giriş Katı</div></div>
    <div class="text-block-141"><div class="col-5">Kat Sayısı</div><div class="col-7">2</div></div>
    <div class="text-block-141"><div class="col-5">Oda Sayısı</div><div class="col-7">3+1</div></div>
  </div>
  <p>Güncelleme Tarihi: 15/03/2024</p>
  <a href="tel:+905338881122">Ara</a>
  <a href="https://wa.me/5338881122">WhatsApp</a>
</body></html>"#;

    fn extractor() -> FieldExtractor {
        FieldExtractor::new("Northern Cyprus", "90")
    }

    #[test]
    fn extracts_a_full_listing() {
        let outcome = extractor().extract(LISTING, "123456.html");
        assert!(!outcome.is_partial());
        let r = outcome.into_record();

        assert_eq!(r.source_file, "123456.html");
        assert_eq!(r.property_id.as_deref(), Some("123456"));
        assert_eq!(r.title.as_deref(), Some("Sea view villa in Long Beach"));
        assert_eq!(r.price, Some(250_000.0));
        assert_eq!(r.currency.as_deref(), Some("GBP"));
        assert_eq!(r.listing_type, Some(ListingType::Sale));
        assert_eq!(r.property_type.as_deref(), Some("Konut"));
        assert_eq!(r.property_subtype.as_deref(), Some("Villa"));
        assert_eq!(r.district.as_deref(), Some("Long Beach"));
        assert_eq!(r.city.as_deref(), Some("İskele"));
        assert_eq!(r.country, "Northern Cyprus");
        assert_eq!(r.agency_name.as_deref(), Some("Kıbrıs Emlak Ofisi"));
        assert_eq!(r.url.as_deref(), Some("https://www.101evler.com/kibris/satilik-emlak/villa-123456.html"));
        assert_eq!(r.description.as_deref(), Some("Three bedrooms. Private pool."));
        assert_eq!(r.title_deed_type.as_deref(), Some("Türk Koçanı"));
        assert_eq!(r.listing_date.as_deref(), Some("01/02/2024"));
        assert_eq!(r.update_date.as_deref(), Some("15/03/2024"));
        assert_eq!(r.room_count.as_deref(), Some("3+1"));
        assert_eq!(r.floor.as_deref(), Some("Giriş Katı / 2"));
        assert_eq!(r.image_links.len(), 2);
        assert!(r.phone_numbers.contains("+905338881122"));
        assert!(r.whatsapp_numbers.contains("+905338881122"));
        assert!(r.has_basic_data() && r.has_price_data() && r.has_location_data());
    }

    #[test]
    fn title_falls_back_to_title_tag() {
        let html = "<html><head><title>Daire 2+1 - $600 - 555 | 101evler</title></head><body></body></html>";
        let r = extractor().extract(html, "555.html").into_record();
        assert_eq!(r.title.as_deref(), Some("Daire 2+1"));
    }

    #[test]
    fn description_falls_back_to_meta() {
        let html = r#"<head><meta name="description" content="Deniz manzaralı"></head>"#;
        let r = extractor().extract(html, "1.html").into_record();
        assert_eq!(r.description.as_deref(), Some("Deniz manzaralı"));
    }

    #[test]
    fn secondary_sources_fill_missing_fields() {
        let html = r#"
            <div class="text-block-138">3+1</div>
            <div class="h-zl-bak-sright">
              <div class="text-block-141"><div class="col-5">İlan Tarihi</div><div class="col-7">05/05/2023</div></div>
              <div class="text-block-141"><div class="col-5">Konum</div><div class="col-7">Girne / Alsancak</div></div>
            </div>
            <p>Güncelleme Tarihi 99/99/2023</p>"#;
        let r = extractor().extract(html, "9.html").into_record();
        assert_eq!(r.room_count.as_deref(), Some("3+1"));
        assert_eq!(r.listing_date.as_deref(), Some("05/05/2023"));
        assert_eq!(r.district.as_deref(), Some("Girne"));
        assert_eq!(r.city.as_deref(), Some("Alsancak"));
        assert_eq!(r.update_date, None);
        assert!(r.is_low_confidence());
    }

    #[test]
    fn bad_price_keeps_earlier_fields() {
        let html = r#"<h1>Villa</h1>
            <div id="hizli-bakis"><div class="zebra-rows">
              <div class="text-block-141"><div class="col-5">İlan No</div><div class="col-7">#77</div></div>
              <div class="text-block-141"><div class="col-5">Fiyat</div><div class="col-7">$,</div></div>
            </div></div>"#;
        match extractor().extract(html, "77.html") {
            Extraction::Partial { record, error } => {
                assert_eq!(record.source_file, "77.html");
                assert_eq!(record.title.as_deref(), Some("Villa"));
                assert_eq!(record.property_id.as_deref(), Some("77"));
                assert_eq!(error, ExtractError::Price { raw: ",".into() });
            }
            other => panic!("expected partial extraction, got {:?}", other),
        }
    }

    #[test]
    fn malformed_html_still_yields_a_record() {
        for html in ["", "<div><p", "<<<>>>", "<table><tr><td>İlan No</td>", "\u{0}\u{1}garbage"] {
            let outcome = extractor().extract(html, "broken.html");
            assert_eq!(outcome.record().source_file, "broken.html");
        }
    }
}
