#[cfg(test)]
mod tests {
    use chrono::{NaiveDate, NaiveDateTime};
    use rust_decimal::Decimal;
    use rust_decimal_macros::dec;

    use crate::{
        app::utils::{
            combine_date_time, crypto_pseudo_isin, currency_from_symbol, parse_date,
            parse_datetime, parse_decimal, parse_decimal_or_zero, parse_locale_decimal,
            translate_spanish_months,
        },
        errors::RowError,
    };

    fn at(year: i32, month: u32, day: u32, h: u32, m: u32, s: u32) -> NaiveDateTime {
        NaiveDate::from_ymd_opt(year, month, day)
            .unwrap()
            .and_hms_opt(h, m, s)
            .unwrap()
    }

    #[test]
    fn locale_numbers() {
        assert_eq!(parse_locale_decimal("1.234,56"), Some(dec!(1234.56)));
        assert_eq!(parse_locale_decimal("1,234.56"), Some(dec!(1234.56)));
        assert_eq!(parse_locale_decimal("-0,5"), Some(dec!(-0.5)));
        assert_eq!(parse_locale_decimal("€1,200.00"), Some(dec!(1200)));
        assert_eq!(parse_locale_decimal("(12.50)"), Some(dec!(-12.5)));
        assert_eq!(parse_locale_decimal("1.234.567"), Some(dec!(1234567)));
        assert_eq!(parse_locale_decimal("12,50 EUR"), Some(dec!(12.5)));
        assert_eq!(parse_locale_decimal("42"), Some(dec!(42)));
        assert_eq!(parse_locale_decimal(""), None);
        assert_eq!(parse_locale_decimal("abc"), None);
    }

    #[test]
    fn blank_cells_are_zero_only_when_allowed() {
        assert_eq!(parse_decimal_or_zero("", "fee"), Ok(Decimal::ZERO));
        assert_eq!(parse_decimal_or_zero("--", "fee"), Ok(Decimal::ZERO));
        assert_eq!(
            parse_decimal("", "price"),
            Err(RowError::InvalidNumber {
                field: "price",
                value: String::new(),
            })
        );
    }

    #[test]
    fn spanish_months_are_translated() {
        assert_eq!(
            translate_spanish_months("5 Ene 2024, 14:02:11"),
            "5 Jan 2024, 14:02:11"
        );
        assert_eq!(translate_spanish_months("15 dic. 2023"), "15 Dec 2023");
        assert_eq!(translate_spanish_months("3 Aug 2024"), "3 Aug 2024");
    }

    #[test]
    fn dates_in_broker_formats() {
        assert_eq!(
            parse_date("01-03-2024").unwrap(),
            NaiveDate::from_ymd_opt(2024, 3, 1).unwrap()
        );
        assert_eq!(
            parse_date("15 dic. 2023").unwrap(),
            NaiveDate::from_ymd_opt(2023, 12, 15).unwrap()
        );
        assert_eq!(
            parse_datetime("2024-03-01, 10:15:00").unwrap(),
            at(2024, 3, 1, 10, 15, 0)
        );
        assert_eq!(
            parse_datetime("5 Ene 2024, 14:02:11").unwrap(),
            at(2024, 1, 5, 14, 2, 11)
        );
        assert_eq!(parse_datetime("2024-02-15").unwrap(), at(2024, 2, 15, 0, 0, 0));
        assert_eq!(
            parse_datetime("garbage"),
            Err(RowError::InvalidDate(String::from("garbage")))
        );
    }

    #[test]
    fn unreadable_time_falls_back_to_midnight() {
        assert_eq!(
            combine_date_time("01-03-2024", "09:05").unwrap(),
            at(2024, 3, 1, 9, 5, 0)
        );
        assert_eq!(
            combine_date_time("01-03-2024", "").unwrap(),
            at(2024, 3, 1, 0, 0, 0)
        );
        assert!(combine_date_time("32-13-2024", "09:05").is_err());
    }

    #[test]
    fn currency_symbols_and_pseudo_isins() {
        assert_eq!(currency_from_symbol("€12.00"), Some("EUR"));
        assert_eq!(currency_from_symbol("$3"), Some("USD"));
        assert_eq!(currency_from_symbol("12"), None);
        assert_eq!(crypto_pseudo_isin(" btc "), "CRYPTO:BTC");
    }
}
