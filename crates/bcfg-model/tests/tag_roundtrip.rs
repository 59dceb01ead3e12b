use proptest::prelude::{ProptestConfig, proptest};

use bcfg_model::tag;

proptest! {
    #![proptest_config(ProptestConfig::with_cases(512))]

    #[test]
    fn round_trips_grammar_valid_pairs(
        unit in "[A-Za-z0-9_-]{1,24}",
        value in "[^`]{1,64}",
    ) {
        let tagged = tag::encode(&unit, &value).expect("encode");
        let decoded = tag::parse(&tagged).expect("decode");
        assert_eq!(decoded.unit, unit);
        assert_eq!(decoded.value, value);
    }

    #[test]
    fn encoded_tags_are_recognized_exactly_once(
        unit in "[A-Za-z0-9_-]{1,24}",
        value in "[^`]{1,64}",
        prefix in "[^`]{0,8}",
        suffix in "[^`]{1,8}",
    ) {
        let tagged = tag::encode(&unit, &value).expect("encode");
        assert!(tag::is_tagged(&tagged));
        // Surrounding content breaks the exact-match requirement.
        assert!(!tag::is_tagged(&format!("{prefix}{tagged}{suffix}")));
    }

    #[test]
    fn untagged_text_never_decodes(text in "[^`]{0,64}") {
        assert!(tag::parse(&text).is_none());
    }
}
