use listing_harvester::*;

const ADDRESS_ICON: &str = "M5 11v2a6.82 6.82 0 0 1 4.17 1.41C10.75 15.62 11.53 18 11.5 22h1c0-4 .75-6.38 2.33-7.59A6.82 6.82 0 0 1 19 13v-2a7 7 0 0 0-7-7 7 7 0 0 0-7 7z";
const PHONE_ICON: &str = "M14 14l-1.08 1.45a13.61 13.61 0 0 1-4.37-4.37L10 10a18.47 18.47 0 0 0-.95-5.85L9 4H5.06a1 1 0 0 0-1 1.09 16 16 0 0 0 14.85 14.85 1 1 0 0 0 1.09-1V15h-.15A18.47 18.47 0 0 0 14 14z";
const WEBSITE_ICON: &str = "M12 4a8 8 0 1 0 8 8 8 8 0 0 0-8-8zm5 9h-6l1-7h1v5.25l4 .75z";

fn extractor(source: Source) -> FieldExtractor {
    FieldExtractor::new(source.profile(), TargetCity::rostov_on_don(), AncestorWindow::default())
}

fn twogis_card() -> String {
    format!(
        r#"<html><head><title>2ГИС</title></head><body>
        <h1>Салют-Центр</h1>
        <div class="card">
          <div class="row"><svg><path d="{ADDRESS_ICON}"></path></svg>
            <div><span>г. Ростов-на-Дону, ул. Ленина, д. 5</span><span>Показать вход</span></div>
          </div>
          <div class="row"><svg><path d="{PHONE_ICON}"></path></svg>
            <div>
              <a href="tel:+78631234567">+7 (863) 123-45-67</a>
              <a href="tel:88001112233">8 800 111-22-33</a>
            </div>
          </div>
          <div class="row"><svg><path d="{WEBSITE_ICON}"></path></svg>
            <div><a href="https://link.2gis.ru/abc">salut-shop.ru</a></div>
          </div>
          <div><p>Режим работы</p><p>Ежедневно 10:00–20:00</p><p>Без перерыва</p></div>
        </div>
        </body></html>"#
    )
}

#[cfg(test)]
mod marker_proximity_tests {
    use super::*;

    #[test]
    fn test_full_twogis_card() {
        let fields = extractor(Source::TwoGis).extract(&twogis_card());

        assert_eq!(fields.name, "Салют-Центр");
        assert_eq!(fields.address, "г. Ростов-на-Дону, ул. Ленина, д. 5");
        assert_eq!(fields.phones, vec!["+78631234567", "88001112233"]);
        assert_eq!(fields.websites, vec!["https://salut-shop.ru"]);
        assert_eq!(fields.hours, "Режим работы Ежедневно 10:00–20:00 Без перерыва");
    }

    #[test]
    fn test_phone_regex_near_marker_when_no_tel_links() {
        let html = format!(
            r#"<div class="row"><svg><path d="{PHONE_ICON}"></path></svg>
               <span>+7 (863) 210-00-00, доб. 12</span></div>"#
        );
        let fields = extractor(Source::TwoGis).extract(&html);
        assert_eq!(fields.phones, vec!["+78632100000"]);
    }

    #[test]
    fn test_own_domain_is_not_a_website() {
        let html = format!(
            r#"<div class="row"><svg><path d="{WEBSITE_ICON}"></path></svg>
               <span>2gis.ru</span><span>fejerverk61.ru</span></div>"#
        );
        let fields = extractor(Source::TwoGis).extract(&html);
        assert_eq!(fields.websites, vec!["https://fejerverk61.ru"]);
    }

    #[test]
    fn test_narrow_window_misses_distant_text() {
        let html = format!(
            r#"<div><span>ул. Ленина, д. 5, офис 3</span>
               <div><div><svg><path d="{ADDRESS_ICON}"></path></svg></div></div></div>"#
        );
        let narrow = FieldExtractor::new(
            Source::TwoGis.profile(),
            TargetCity::rostov_on_don(),
            AncestorWindow::new(2, 200),
        );
        assert_eq!(narrow.extract(&html).address, "");
        assert_eq!(
            extractor(Source::TwoGis).extract(&html).address,
            "ул. Ленина, д. 5, офис 3"
        );
    }
}

#[cfg(test)]
mod selector_tests {
    use super::*;

    #[test]
    fn test_yandex_structural_selectors() {
        let html = r#"
            <h1 class="orgpage-header-view__header">Салют</h1>
            <div class="business-contacts-view__address">Ростов-на-Дону, Большая Садовая ул., 1</div>
            <span class="orgpage-phones-view__phone-number">+7 (863) 111-22-33</span>
            <a class="business-urls-view__link" href="https://yandex.ru/maps/org/1">Яндекс</a>
            <a class="business-urls-view__link" href="https://salut.ru/?utm=ya">salut.ru</a>"#;
        let fields = extractor(Source::Yandex).extract(html);

        assert_eq!(fields.name, "Салют");
        assert_eq!(fields.address, "Ростов-на-Дону, Большая Садовая ул., 1");
        assert_eq!(fields.phones, vec!["+78631112233"]);
        assert_eq!(fields.websites, vec!["https://salut.ru"]);
    }
}

#[cfg(test)]
mod fallback_tests {
    use super::*;

    #[test]
    fn test_name_from_meta_title() {
        let html = r#"<html><head><meta property="og:title" content="Фейерверк-Маркет"></head>
                      <body><h1>Меню</h1></body></html>"#;
        assert_eq!(extractor(Source::TwoGis).extract(html).name, "Фейерверк-Маркет");
    }

    #[test]
    fn test_name_from_capitalized_line() {
        let html = "<div><p>поиск по карте</p><p>Магазин Салютов на Садовой</p></div>";
        assert_eq!(
            extractor(Source::TwoGis).extract(html).name,
            "Магазин Салютов на Садовой"
        );
    }

    #[test]
    fn test_address_and_phone_from_page_text() {
        let html = "<p>Телефон: 8 (863) 200-00-00</p><p>Адрес: г. Ростов-на-Дону, пр. Ленина 10</p>";
        let fields = extractor(Source::TwoGis).extract(html);
        assert_eq!(fields.address, "г. Ростов-на-Дону, пр. Ленина 10");
        assert_eq!(fields.phones, vec!["88632000000"]);
    }

    #[test]
    fn test_tel_links_anywhere_before_page_regex() {
        let html = r#"<a href="tel:+7 863 300 00 00">Позвонить</a><p>8 (863) 200-00-00</p>"#;
        assert_eq!(extractor(Source::TwoGis).extract(html).phones, vec!["+78633000000"]);
    }

    #[test]
    fn test_at_most_three_phones() {
        let html = "<p>+7 (863) 100-00-01, +7 (863) 100-00-02, +7 (863) 100-00-03, +7 (863) 100-00-04</p>";
        assert_eq!(extractor(Source::TwoGis).extract(html).phones.len(), MAX_PHONES);
    }

    #[test]
    fn test_short_numbers_are_not_phones() {
        let html = r#"<a href="tel:12345">Короткий</a>"#;
        assert!(extractor(Source::TwoGis).extract(html).phones.is_empty());
    }

    #[test]
    fn test_hours_are_capped() {
        let long = "9:00-21:00 ".repeat(30);
        let html = format!("<p>Часы работы: {long}</p>");
        let hours = extractor(Source::TwoGis).extract(&html).hours;
        assert!(hours.starts_with("Часы работы"));
        assert_eq!(hours.chars().count(), MAX_HOURS_CHARS);
    }

    #[test]
    fn test_empty_page_extracts_nothing() {
        assert_eq!(extractor(Source::Yandex).extract(""), RawFields::default());
    }
}

#[cfg(test)]
mod geo_filter_tests {
    use super::*;

    #[test]
    fn test_rostov_address_is_admitted() {
        let filter = GeoFilter::default();
        assert!(filter.is_target_city("г. Ростов-на-Дону, ул. Ленина, д. 5"));
        assert!(filter.is_target_city("ул. Садовая, 12, Ростов-на-Дону"));
        assert!(filter.is_target_city("Г.РОСТОВ, пр. Стачки, 1"));
    }

    #[test]
    fn test_other_city_is_rejected() {
        let filter = GeoFilter::default();
        assert!(!filter.is_target_city("г. Краснодар, ул. Мира, д. 1"));
    }

    #[test]
    fn test_missing_address_is_rejected() {
        let filter = GeoFilter::default();
        assert!(!filter.is_target_city(""));
        assert!(!filter.is_target_city("   "));
    }

    #[test]
    fn test_custom_city() {
        let filter = GeoFilter::new(TargetCity::new("Таганрог", ["Таганрог", "г. Таганрог"]));
        assert!(filter.is_target_city("Таганрог, ул. Петровская, 1"));
        assert!(!filter.is_target_city("г. Ростов-на-Дону, ул. Ленина, д. 5"));
    }
}
