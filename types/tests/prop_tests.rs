use proptest::prelude::*;

use amalgam_types::{Asset, Price, Symbol, Timestamp};

fn any_symbol() -> impl Strategy<Value = Symbol> {
    prop_oneof![Just(Symbol::Aml), Just(Symbol::Abd), Just(Symbol::Amlv)]
}

proptest! {
    /// Asset display/parse round-trips exactly.
    #[test]
    fn asset_display_parse_roundtrip(amount in -1_000_000_000_000i64..1_000_000_000_000, symbol in any_symbol()) {
        let asset = Asset::new(amount, symbol);
        let parsed: Asset = asset.to_string().parse().unwrap();
        prop_assert_eq!(parsed, asset);
    }

    /// Asset bincode round-trips exactly.
    #[test]
    fn asset_bincode_roundtrip(amount in any::<i64>(), symbol in any_symbol()) {
        let asset = Asset::new(amount, symbol);
        let encoded = bincode::serialize(&asset).unwrap();
        let decoded: Asset = bincode::deserialize(&encoded).unwrap();
        prop_assert_eq!(decoded, asset);
    }

    /// checked_add matches plain i64 addition when no overflow occurs.
    #[test]
    fn asset_checked_add_matches_i64(a in -1_000_000_000i64..1_000_000_000, b in -1_000_000_000i64..1_000_000_000) {
        let lhs = Asset::new(a, Symbol::Aml);
        let rhs = Asset::new(b, Symbol::Aml);
        prop_assert_eq!(lhs.checked_add(rhs).unwrap(), Asset::new(a + b, Symbol::Aml));
    }

    /// Price comparison agrees with exact rational comparison.
    #[test]
    fn price_ordering_matches_rationals(
        a_base in 1i64..1_000_000, a_quote in 1i64..1_000_000,
        b_base in 1i64..1_000_000, b_quote in 1i64..1_000_000,
    ) {
        let a = Price::new(Asset::new(a_base, Symbol::Aml), Asset::new(a_quote, Symbol::Abd));
        let b = Price::new(Asset::new(b_base, Symbol::Aml), Asset::new(b_quote, Symbol::Abd));
        let exact = (i128::from(a_base) * i128::from(b_quote)).cmp(&(i128::from(b_base) * i128::from(a_quote)));
        prop_assert_eq!(a.cmp(&b), exact);
    }

    /// Price ordering is antisymmetric.
    #[test]
    fn price_ordering_antisymmetric(
        a_base in 1i64..1_000_000, a_quote in 1i64..1_000_000,
        b_base in 1i64..1_000_000, b_quote in 1i64..1_000_000,
    ) {
        let a = Price::new(Asset::new(a_base, Symbol::Aml), Asset::new(a_quote, Symbol::Abd));
        let b = Price::new(Asset::new(b_base, Symbol::Aml), Asset::new(b_quote, Symbol::Abd));
        prop_assert_eq!(a.cmp(&b), b.cmp(&a).reverse());
    }

    /// Converting across a price and back never gains value (truncation only loses).
    #[test]
    fn price_conversion_never_gains(
        amount in 0i64..1_000_000_000,
        base in 1i64..1_000_000,
        quote in 1i64..1_000_000,
    ) {
        let price = Price::new(Asset::new(base, Symbol::Aml), Asset::new(quote, Symbol::Abd));
        let there = Asset::new(amount, Symbol::Aml).mul_price(&price).unwrap();
        let back = there.mul_price(&price).unwrap();
        prop_assert!(back.amount <= amount);
    }

    /// Timestamp::plus_secs then secs_since recovers the increment.
    #[test]
    fn timestamp_add_then_diff(base in 0u32..u32::MAX / 2, delta in 0u32..1_000_000) {
        let start = Timestamp::new(base);
        let end = start.plus_secs(delta);
        prop_assert_eq!(end.secs_since(start), delta);
    }
}
