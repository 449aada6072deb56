use std::sync::LazyLock;

use regex::Regex;
use serde::{Deserialize, Serialize};

static CURRENCY_CODE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^[A-Z]{3}$").expect("static pattern"));

/// Display currencies the calculator knows how to label.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum Currency {
    #[default]
    Usd,
    Cad,
    Aud,
    Nzd,
    Gbp,
    Inr,
    Php,
    Sgd,
}

impl Currency {
    pub const ALL: [Currency; 8] = [
        Self::Usd,
        Self::Cad,
        Self::Aud,
        Self::Nzd,
        Self::Gbp,
        Self::Inr,
        Self::Php,
        Self::Sgd,
    ];

    /// ISO 4217 code.
    pub fn code(&self) -> &'static str {
        match self {
            Self::Usd => "USD",
            Self::Cad => "CAD",
            Self::Aud => "AUD",
            Self::Nzd => "NZD",
            Self::Gbp => "GBP",
            Self::Inr => "INR",
            Self::Php => "PHP",
            Self::Sgd => "SGD",
        }
    }

    pub fn symbol(&self) -> &'static str {
        match self {
            Self::Usd => "$",
            Self::Cad => "C$",
            Self::Aud => "A$",
            Self::Nzd => "NZ$",
            Self::Gbp => "£",
            Self::Inr => "₹",
            Self::Php => "₱",
            Self::Sgd => "S$",
        }
    }

    /// Dropdown label, e.g. `"GBP (£)"`.
    pub fn label(&self) -> String {
        format!("{} ({})", self.code(), self.symbol())
    }

    pub fn parse(code: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|c| c.code() == code)
    }

    /// Looks a code up, falling back to USD for anything unsupported.
    pub fn from_code_or_default(code: &str) -> Self {
        Self::parse(code).unwrap_or_default()
    }

    /// Picks a currency from a browser-style locale list (`en-GB`, `fr-CA`).
    ///
    /// Each locale is tried as an exact match first and then by its region
    /// suffix. The first hit wins; nothing matching gives USD.
    pub fn detect_from_locales<'a, I>(locales: I) -> Self
    where
        I: IntoIterator<Item = &'a str>,
    {
        for locale in locales {
            if let Some(currency) = Self::from_exact_locale(locale) {
                return currency;
            }
            if let Some(region) = locale.rsplit_once('-').map(|(_, region)| region)
                && let Some(currency) = Self::from_region(&region.to_ascii_uppercase())
            {
                return currency;
            }
        }
        Self::default()
    }

    fn from_exact_locale(locale: &str) -> Option<Self> {
        match locale {
            "en-US" => Some(Self::Usd),
            "en-CA" | "fr-CA" => Some(Self::Cad),
            "en-AU" => Some(Self::Aud),
            "en-NZ" => Some(Self::Nzd),
            "en-GB" => Some(Self::Gbp),
            "en-IN" | "hi-IN" => Some(Self::Inr),
            "en-PH" | "fil-PH" => Some(Self::Php),
            "en-SG" | "zh-SG" => Some(Self::Sgd),
            _ => None,
        }
    }

    fn from_region(region: &str) -> Option<Self> {
        match region {
            "US" => Some(Self::Usd),
            "CA" => Some(Self::Cad),
            "AU" => Some(Self::Aud),
            "NZ" => Some(Self::Nzd),
            "GB" | "UK" => Some(Self::Gbp),
            "IN" => Some(Self::Inr),
            "PH" => Some(Self::Php),
            "SG" => Some(Self::Sgd),
            _ => None,
        }
    }
}

/// Whether `code` has the shape of an ISO 4217 code (three upper-case letters).
pub fn is_currency_code(code: &str) -> bool {
    CURRENCY_CODE.is_match(code)
}

/// Trims and upper-cases a stored currency code, replacing anything that is
/// not three letters with `USD`. Unsupported but well-formed codes pass
/// through untouched.
pub fn normalize_currency_code(raw: Option<&str>) -> String {
    let normalized = raw.map(|s| s.trim().to_ascii_uppercase()).unwrap_or_default();
    if is_currency_code(&normalized) {
        normalized
    } else {
        Currency::Usd.code().to_string()
    }
}
