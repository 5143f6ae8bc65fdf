use listing_harvester::*;

#[cfg(test)]
mod canonicalize_tests {
    use super::*;

    const TWOGIS: &str = "https://2gis.ru";

    #[test]
    fn test_root_relative_is_expanded() {
        let url = Canonicalizer::canonicalize("/rostov/firm/70000001", TWOGIS);
        assert_eq!(url.as_deref(), Some("https://2gis.ru/rostov/firm/70000001"));
    }

    #[test]
    fn test_scheme_relative_is_expanded() {
        let url = Canonicalizer::canonicalize("//2gis.ru/firm/5", TWOGIS);
        assert_eq!(url.as_deref(), Some("https://2gis.ru/firm/5"));
    }

    #[test]
    fn test_query_and_fragment_are_removed() {
        let url = Canonicalizer::canonicalize(
            "https://2gis.ru/firm/5?utm_source=x&m=1#top",
            TWOGIS,
        );
        assert_eq!(url.as_deref(), Some("https://2gis.ru/firm/5"));
    }

    #[test]
    fn test_tab_suffix_is_removed() {
        for tab in KNOWN_TABS {
            let href = format!("/firm/5/{tab}");
            let url = Canonicalizer::canonicalize(&href, TWOGIS);
            assert_eq!(url.as_deref(), Some("https://2gis.ru/firm/5"), "tab {tab}");
        }
    }

    #[test]
    fn test_trailing_slash_is_removed() {
        let url = Canonicalizer::canonicalize("https://yandex.ru/maps/org/salut/123/", TWOGIS);
        assert_eq!(url.as_deref(), Some("https://yandex.ru/maps/org/salut/123"));
    }

    #[test]
    fn test_host_is_lowercased() {
        let url = Canonicalizer::canonicalize("https://2GIS.RU/firm/5", TWOGIS);
        assert_eq!(url.as_deref(), Some("https://2gis.ru/firm/5"));
    }

    #[test]
    fn test_unusable_hrefs_are_rejected() {
        for href in ["", "   ", "tel:+78631234567", "mailto:a@b.ru", "javascript:void(0)", "firm/5"] {
            assert_eq!(Canonicalizer::canonicalize(href, TWOGIS), None, "href {href:?}");
        }
    }

    #[test]
    fn test_canonical_form_is_a_fixed_point() {
        let once = Canonicalizer::canonicalize("/Ростов/firm/5/reviews?x=1", TWOGIS).unwrap();
        let twice = Canonicalizer::canonicalize(&once, TWOGIS).unwrap();
        assert_eq!(once, twice);
    }
}

#[cfg(test)]
mod identity_tests {
    use super::*;

    #[test]
    fn test_twogis_firm_identity() {
        assert_eq!(
            Canonicalizer::derive_identity("https://2gis.ru/rostov/firm/70000001023/"),
            "2gis_70000001023"
        );
    }

    #[test]
    fn test_yandex_org_identity() {
        assert_eq!(
            Canonicalizer::derive_identity("https://yandex.ru/maps/org/salyut/1234567890"),
            "yandex_1234567890"
        );
    }

    #[test]
    fn test_yandex_business_id_identity() {
        assert_eq!(
            Canonicalizer::derive_identity("https://yandex.ru/maps/?businessId=42&z=3"),
            "yandex_42"
        );
    }

    #[test]
    fn test_unknown_host_tries_every_profile() {
        assert_eq!(
            Canonicalizer::derive_identity("https://mirror.example/firm/99"),
            "2gis_99"
        );
    }

    #[test]
    fn test_hash_fallback_is_stable() {
        let first = Canonicalizer::derive_identity("https://example.com/shop/salut");
        let second = Canonicalizer::derive_identity("https://example.com/shop/salut");
        assert_eq!(first, second);
        assert!(Canonicalizer::is_hash_identity(&first));
        assert_eq!(first.len(), HASH_IDENTITY_PREFIX.len() + 8);
    }

    #[test]
    fn test_equivalent_urls_share_identity() {
        assert_eq!(
            Canonicalizer::identity_of("https://example.com/shop/salut/?utm=1"),
            Canonicalizer::identity_of("https://example.com/shop/salut/reviews#x"),
        );
    }
}
