//! Unit tests for currency codes and whole-unit amounts

use core_kernel::{Amount, Currency, MoneyError};

mod currency {
    use super::*;

    #[test]
    fn test_every_currency_parses_from_its_code() {
        for currency in Currency::ALL {
            assert_eq!(currency.code().parse::<Currency>().unwrap(), currency);
        }
    }

    #[test]
    fn test_serde_uses_uppercase_codes() {
        let json = serde_json::to_string(&Currency::INR).unwrap();
        assert_eq!(json, "\"INR\"");
        let parsed: Currency = serde_json::from_str("\"GBP\"").unwrap();
        assert_eq!(parsed, Currency::GBP);
    }

    #[test]
    fn test_unknown_code_is_rejected_by_serde() {
        let parsed: Result<Currency, _> = serde_json::from_str("\"DOGE\"");
        assert!(parsed.is_err());
    }

    #[test]
    fn test_empty_code_is_unknown() {
        assert_eq!(
            "".parse::<Currency>(),
            Err(MoneyError::UnknownCurrency(String::new()))
        );
    }
}

mod amount {
    use super::*;

    #[test]
    fn test_zero_is_allowed() {
        let amount = Amount::from_i64(0).unwrap();
        assert!(amount.is_zero());
    }

    #[test]
    fn test_negative_is_invalid() {
        let err = Amount::from_i64(-550).unwrap_err();
        assert!(err.to_string().contains("-550"));
    }

    #[test]
    fn test_sum_of_amounts() {
        let total = Amount::new(550)
            .checked_add(Amount::new(450))
            .unwrap();
        assert_eq!(total.units(), 1000);
    }

    #[test]
    fn test_serializes_as_plain_number() {
        assert_eq!(serde_json::to_string(&Amount::new(550)).unwrap(), "550");
    }
}
