//! Keyword and price matching of listings against a watch

use crate::models::{Listing, UserWatch};
use crate::text::normalize;

/// True when the listing satisfies both the keyword and the price criteria.
pub fn matches(listing: &Listing, watch: &UserWatch) -> bool {
    keyword_ok(listing, &watch.keyword) && price_ok(listing, watch)
}

/// Every whitespace-separated keyword token must appear as a substring of the
/// listing's title or context. An empty keyword matches everything.
pub fn keyword_ok(listing: &Listing, keyword: &str) -> bool {
    let keyword = normalize(keyword);
    let mut tokens = keyword.split_whitespace().peekable();

    if tokens.peek().is_none() {
        return true;
    }

    let haystack = format!(
        "{} {}",
        normalize(&listing.title),
        normalize(&listing.context)
    );

    tokens.all(|token| haystack.contains(token))
}

/// The default range tolerates a missing price; an explicit range requires one.
pub fn price_ok(listing: &Listing, watch: &UserWatch) -> bool {
    if watch.price.is_unbounded() {
        return true;
    }

    listing
        .price
        .is_some_and(|price| watch.price.contains(price))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::PriceRange;

    fn listing(title: &str, context: &str, price: Option<i64>) -> Listing {
        Listing {
            site: "https://example.com/list".into(),
            title: title.into(),
            url: "https://example.com/ad".into(),
            context: context.into(),
            price,
        }
    }

    fn watch(keyword: &str, range: PriceRange) -> UserWatch {
        UserWatch {
            keyword: keyword.into(),
            price: range,
            ..UserWatch::new("u")
        }
    }

    #[test]
    fn empty_keyword_and_default_range_match_anything() {
        let w = watch("", PriceRange::UNBOUNDED);
        assert!(matches(&listing("anything", "", None), &w));
    }

    #[test]
    fn keyword_is_diacritic_and_case_insensitive_both_ways() {
        let plain = listing("Apartament Brasov centru", "", None);
        let accented = listing("APARTAMENT BRAȘOV", "", None);

        assert!(keyword_ok(&plain, "brașov"));
        assert!(keyword_ok(&accented, "Brasov"));
    }

    #[test]
    fn all_tokens_must_match() {
        let l = listing("Apartament 2 camere", "Brasov, Preț 90000", None);

        assert!(keyword_ok(&l, "apartament brasov"));
        assert!(!keyword_ok(&l, "apartament cluj"));
    }

    #[test]
    fn tokens_may_come_from_context() {
        let l = listing("Apartament", "zona Tractorul", None);
        assert!(keyword_ok(&l, "tractorul apartament"));
    }

    #[test]
    fn tokens_match_as_substrings() {
        let l = listing("Garsoniere de vanzare", "", None);
        assert!(keyword_ok(&l, "garsonier"));
    }

    #[test]
    fn whitespace_only_keyword_matches_everything() {
        assert!(keyword_ok(&listing("x", "", None), "   "));
    }

    #[test]
    fn price_bounds_are_inclusive() {
        let w = watch("", PriceRange::new(1000, 2000).unwrap());

        assert!(price_ok(&listing("a", "", Some(1000)), &w));
        assert!(price_ok(&listing("a", "", Some(2000)), &w));
        assert!(!price_ok(&listing("a", "", Some(999)), &w));
        assert!(!price_ok(&listing("a", "", Some(2001)), &w));
    }

    #[test]
    fn missing_price_only_passes_the_default_range() {
        let explicit = watch("", PriceRange::new(0, 100_000).unwrap());
        let default = watch("", PriceRange::UNBOUNDED);

        assert!(!price_ok(&listing("a", "", None), &explicit));
        assert!(price_ok(&listing("a", "", None), &default));
    }

    #[test]
    fn both_criteria_are_required() {
        let w = watch("apartament", PriceRange::new(0, 100_000).unwrap());

        assert!(matches(&listing("Apartament", "", Some(90_000)), &w));
        assert!(!matches(&listing("Apartament", "", Some(150_000)), &w));
        assert!(!matches(&listing("Garsoniera", "", Some(50_000)), &w));
    }
}
