/// Property-based tests using proptest
/// Invariants of capital parsing, filter patterns and pagination
use arko::company_import::parse_capital_social;
use arko::filters::contains_pattern;
use arko::models::format_money;
use arko::pagination::{with_page, PageRequest};
use proptest::prelude::*;
use url::Url;

// Property: capital parsing never panics and always yields two places
proptest! {
    #[test]
    fn capital_social_never_panics(raw in "\\PC*") {
        let value = parse_capital_social(&raw);
        prop_assert_eq!(value.as_bigint_and_exponent().1, 2);
    }

    #[test]
    fn capital_social_reads_decimal_comma(units in 0u64..1_000_000_000_000, cents in 0u8..100) {
        let raw = format!("{},{:02}", units, cents);
        prop_assert_eq!(format_money(&parse_capital_social(&raw)), format!("{}.{:02}", units, cents));
    }
}

// Property: substring patterns only contain escaped wildcards
proptest! {
    #[test]
    fn contains_pattern_wraps_and_escapes(value in "\\PC{1,40}") {
        let pattern = contains_pattern(Some(&value)).unwrap();
        prop_assert!(pattern.starts_with('%'));
        prop_assert!(pattern.ends_with('%'));

        let inner = &pattern[1..pattern.len() - 1];
        let mut chars = inner.chars();
        let mut unescaped = String::new();
        while let Some(c) = chars.next() {
            if c == '\\' {
                let escaped = chars.next();
                prop_assert!(matches!(escaped, Some('%') | Some('_') | Some('\\')));
                unescaped.extend(escaped);
            } else {
                prop_assert!(c != '%' && c != '_');
                unescaped.push(c);
            }
        }
        prop_assert_eq!(unescaped, value);
    }
}

// Property: every valid page covers a slice of the result set
proptest! {
    #[test]
    fn pages_partition_the_rows(count in 0i64..10_000, size in 1i64..=100) {
        let last = PageRequest::from_params(Some("last"), Some(&size.to_string()), 25, 100)
            .unwrap()
            .resolve(count)
            .unwrap();
        prop_assert!(last.offset() <= count);
        prop_assert_eq!(last.end_index(), count);
        prop_assert!(!last.has_next());

        let past = PageRequest::from_params(
            Some(&(last.number + 1).to_string()),
            Some(&size.to_string()),
            25,
            100,
        )
        .unwrap();
        prop_assert!(past.resolve(count).is_err());
    }

    #[test]
    fn page_size_is_clamped(size in "\\PC{0,6}") {
        let req = PageRequest::from_params(None, Some(&size), 25, 100).unwrap();
        prop_assert!(req.size >= 1 && req.size <= 100);
    }

    #[test]
    fn with_page_keeps_other_params(nome in "[a-z]{1,8}", page in 2i64..500) {
        let url = Url::parse(&format!("http://localhost/api/states/?nome={}&page=1", nome)).unwrap();
        let out = with_page(&url, Some(page));
        let pairs: Vec<(String, String)> = out.query_pairs().into_owned().collect();
        prop_assert_eq!(
            pairs,
            vec![("nome".to_string(), nome), ("page".to_string(), page.to_string())]
        );
    }
}
