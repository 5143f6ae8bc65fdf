use listing_harvester::{
    ConfigError, DelayRange, HarvestConfig, PacingConfig, SearchArea, Source, TargetCity,
};
use std::path::Path;

#[test]
fn test_zero_scroll_cap_rejected() {
    let result = HarvestConfig::builder().scroll_cap(0).build();

    match result {
        Err(ConfigError::InvalidScrollCap(0)) => {}
        _ => panic!("Expected InvalidScrollCap error"),
    }
}

#[test]
fn test_zero_stable_after_rejected() {
    let result = HarvestConfig::builder().stable_after(0).build();

    match result {
        Err(ConfigError::InvalidStableAfter { value: 0, cap: 30 }) => {}
        _ => panic!("Expected InvalidStableAfter error"),
    }
}

#[test]
fn test_stable_after_above_scroll_cap_rejected() {
    let result = HarvestConfig::builder().scroll_cap(5).stable_after(6).build();

    match result {
        Err(ConfigError::InvalidStableAfter { value: 6, cap: 5 }) => {}
        _ => panic!("Expected InvalidStableAfter error"),
    }
}

#[test]
fn test_zero_page_cap_rejected() {
    let result = HarvestConfig::builder().page_cap(0).build();

    match result {
        Err(ConfigError::InvalidPageCap(0)) => {}
        _ => panic!("Expected InvalidPageCap error"),
    }
}

#[test]
fn test_zero_ancestor_depth_rejected() {
    let result = HarvestConfig::builder().ancestor_window(0, 200).build();

    match result {
        Err(ConfigError::InvalidAncestorDepth(0)) => {}
        _ => panic!("Expected InvalidAncestorDepth error"),
    }
}

#[test]
fn test_inverted_pacing_rejected() {
    let pacing = PacingConfig {
        between_details: DelayRange::new(5_000, 1_000),
        ..PacingConfig::default()
    };
    let result = HarvestConfig::builder().pacing(pacing).build();

    match result {
        Err(ConfigError::InvertedPacing {
            kind: "between_details",
            min_ms: 5_000,
            max_ms: 1_000,
        }) => {}
        _ => panic!("Expected InvertedPacing error"),
    }
}

#[test]
fn test_city_without_variants_rejected() {
    let city = TargetCity::new("Атлантида", Vec::<String>::new());
    let result = HarvestConfig::builder().target_city(city).build();

    match result {
        Err(ConfigError::EmptyCityVariants(name)) => assert_eq!(name, "Атлантида"),
        _ => panic!("Expected EmptyCityVariants error"),
    }
}

#[test]
fn test_default_configuration() {
    let config = HarvestConfig::builder().build().unwrap();

    assert_eq!(config.scroll_cap(), 30);
    assert_eq!(config.stable_after(), 3);
    assert_eq!(config.page_cap(), 20);
    assert_eq!(config.window().max_depth, 5);
    assert_eq!(config.window().max_nodes, 200);
    assert_eq!(config.catalog_path(), Path::new("data/database.json"));
    assert_eq!(config.sources(), &[Source::Yandex, Source::TwoGis]);
    assert_eq!(config.city().name, "Ростов-на-Дону");
    assert_eq!(config.pacing(), &PacingConfig::default());
}

#[test]
fn test_areas_default_to_profile() {
    let config = HarvestConfig::default();

    assert_eq!(config.areas_for(Source::Yandex).len(), 6);
    assert_eq!(config.areas_for(Source::TwoGis).len(), 1);
    assert!(
        config
            .areas_for(Source::TwoGis)
            .iter()
            .all(|area| area.source == Source::TwoGis)
    );
}

#[test]
fn test_configured_areas_replace_defaults_per_source() {
    let config = HarvestConfig::builder()
        .area(SearchArea::new(
            Source::TwoGis,
            "Центр",
            "https://2gis.ru/rostov-on-don/search/салюты",
        ))
        .build()
        .unwrap();

    let areas = config.areas_for(Source::TwoGis);
    assert_eq!(areas.len(), 1);
    assert_eq!(areas[0].name, "Центр");
    assert_eq!(config.areas_for(Source::Yandex).len(), 6);
}

#[test]
fn test_valid_configuration_accepted() {
    let result = HarvestConfig::builder()
        .scroll_cap(10)
        .stable_after(10)
        .page_cap(1)
        .ancestor_window(3, 50)
        .pacing(PacingConfig::none())
        .sources([Source::TwoGis])
        .catalog_path("/tmp/catalog.json")
        .build();

    assert!(result.is_ok());
}

#[cfg(test)]
mod toml_tests {
    use super::*;

    #[test]
    fn test_empty_document_gives_defaults() {
        let config = HarvestConfig::from_toml_str("").unwrap();
        assert_eq!(config.scroll_cap(), 30);
        assert_eq!(config.sources().len(), 2);
    }

    #[test]
    fn test_full_document() {
        let document = r#"
            catalog_path = "out/catalog.json"
            sources = ["2gis"]

            [crawl]
            scroll_cap = 12
            stable_after = 2
            page_cap = 4

            [extraction]
            ancestor_depth = 3

            [pacing]
            after_navigation = { min_ms = 100, max_ms = 200 }

            [city]
            name = "Таганрог"
            variants = ["Таганрог", "г. Таганрог"]

            [[areas]]
            source = "2gis"
            name = "Центр"
            url = "https://2gis.ru/taganrog/search/салюты"
        "#;
        let config = HarvestConfig::from_toml_str(document).unwrap();

        assert_eq!(config.catalog_path(), Path::new("out/catalog.json"));
        assert_eq!(config.sources(), &[Source::TwoGis]);
        assert_eq!(config.scroll_cap(), 12);
        assert_eq!(config.stable_after(), 2);
        assert_eq!(config.page_cap(), 4);
        assert_eq!(config.window().max_depth, 3);
        assert_eq!(config.window().max_nodes, 200);
        assert_eq!(config.pacing().after_navigation, DelayRange::new(100, 200));
        assert_eq!(config.pacing().after_scroll, PacingConfig::default().after_scroll);
        assert_eq!(config.city().variants, vec!["таганрог", "г. таганрог"]);
        assert_eq!(config.areas_for(Source::TwoGis)[0].name, "Центр");
    }

    #[test]
    fn test_invalid_values_are_validated() {
        let result = HarvestConfig::from_toml_str("[crawl]\nscroll_cap = 0\n");
        assert!(matches!(result, Err(ConfigError::InvalidScrollCap(0))));
    }

    #[test]
    fn test_malformed_document_rejected() {
        let result = HarvestConfig::from_toml_str("[crawl\nscroll_cap = ");
        assert!(matches!(result, Err(ConfigError::Toml(_))));
    }

    #[test]
    fn test_unknown_source_rejected() {
        let result = HarvestConfig::from_toml_str(r#"sources = ["google"]"#);
        assert!(matches!(result, Err(ConfigError::Toml(_))));
    }
}
