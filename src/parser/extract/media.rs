use once_cell::sync::Lazy;
use scraper::{Html, Selector};
use std::collections::HashSet;

/// Path fragment every listing photo URL carries
const IMAGE_MARKER: &str = "property";

static GALLERY_IMAGES: Lazy<Selector> = Lazy::new(|| {
    Selector::parse("div.splide.mainGallerySplide li.splide__slide img").expect("valid gallery selector")
});
static FULL_SIZE_LINKS: Lazy<Selector> =
    Lazy::new(|| Selector::parse(r#"a[data-fancybox="gallery-mobile"]"#).expect("valid fancybox selector"));
static OG_IMAGES: Lazy<Selector> =
    Lazy::new(|| Selector::parse(r#"meta[property="og:image"]"#).expect("valid og:image selector"));

/// Union of gallery slides, full-size gallery links and og:image tags,
/// in first-seen order without duplicates
pub fn image_links(document: &Html) -> Vec<String> {
    let mut candidates: Vec<&str> = Vec::new();

    for img in document.select(&GALLERY_IMAGES) {
        candidates.extend(img.value().attr("src"));
        candidates.extend(img.value().attr("data-splide-lazy"));
    }
    for link in document.select(&FULL_SIZE_LINKS) {
        candidates.extend(link.value().attr("href"));
    }
    for meta in document.select(&OG_IMAGES) {
        candidates.extend(meta.value().attr("content"));
    }

    let mut seen = HashSet::new();
    candidates
        .into_iter()
        .map(str::trim)
        .filter(|url| url.contains(IMAGE_MARKER))
        .filter(|url| seen.insert(*url))
        .map(str::to_string)
        .collect()
}
