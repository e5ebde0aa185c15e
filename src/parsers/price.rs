use once_cell::sync::Lazy;
use regex::Regex;

use crate::platform::CurrencyRule;

static AMOUNT_REGEX: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"\d{1,3}(?:,\d{3})+(?:\.\d+)?|\d+(?:\.\d+)?").expect("Invalid amount regex")
});

/// Extract a decimal amount and a currency code from a price string.
/// The symbol table is consulted in order; amounts without a recognized
/// symbol fall back to the platform's default currency.
pub fn parse_price(
    symbols: &[CurrencyRule],
    default_currency: &str,
    text: &str,
) -> Option<(f64, String)> {
    let matched = AMOUNT_REGEX.find(text)?;
    let amount: f64 = matched.as_str().replace(',', "").parse().ok()?;
    let code = symbols
        .iter()
        .find(|rule| text.contains(rule.symbol.as_str()))
        .map(|rule| rule.code.clone())
        .unwrap_or_else(|| default_currency.to_string());
    Some((amount, code))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::platform::PlatformProfile;
    use pretty_assertions::assert_eq;

    fn parse(text: &str) -> Option<(f64, String)> {
        let profile = PlatformProfile::default();
        parse_price(&profile.currency_symbols, &profile.default_currency, text)
    }

    #[test]
    fn parses_dollar_price() {
        assert_eq!(parse("$45.00"), Some((45.0, "CAD".to_string())));
    }

    #[test]
    fn parses_thousands_separators() {
        assert_eq!(parse("CA$ 1,234.50 / night"), Some((1234.5, "CAD".to_string())));
    }

    #[test]
    fn parses_bare_amount_with_default_currency() {
        assert_eq!(parse("42"), Some((42.0, "CAD".to_string())));
    }

    #[test]
    fn parses_euro_symbol() {
        assert_eq!(parse("€30"), Some((30.0, "EUR".to_string())));
    }

    #[test]
    fn rejects_text_without_amount() {
        assert_eq!(parse("call for pricing"), None);
        assert_eq!(parse(""), None);
    }
}
