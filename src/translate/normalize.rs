//! Language normalization.
//! Maps free-form language names and codes ("Hindi", "hi", " HINDI ") onto the
//! canonical ISO 639-1 code used as the key for every cache tier.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Deserializer, Serialize, Serializer};

/// Canonical language code. `En` means "no translation needed".
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Default)]
pub enum LangCode {
    #[default]
    En,
    Hi,
    Mr,
    Bn,
    Ta,
    Pa,
    As,
    Gu,
    Te,
    Kn,
    Ml,
    Or,
}

impl LangCode {
    pub fn as_str(self) -> &'static str {
        use LangCode::*;
        match self {
            En => "en",
            Hi => "hi",
            Mr => "mr",
            Bn => "bn",
            Ta => "ta",
            Pa => "pa",
            As => "as",
            Gu => "gu",
            Te => "te",
            Kn => "kn",
            Ml => "ml",
            Or => "or",
        }
    }

    #[inline]
    pub fn is_english(self) -> bool {
        self == LangCode::En
    }

    /// Every supported language, English first.
    pub fn all() -> &'static [LangCode] {
        use LangCode::*;
        &[En, Hi, Mr, Bn, Ta, Pa, As, Gu, Te, Kn, Ml, Or]
    }
}

impl fmt::Display for LangCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Parsing never fails: unknown input normalizes to English.
impl FromStr for LangCode {
    type Err = std::convert::Infallible;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Ok(normalize_lang(Some(s)))
    }
}

impl Serialize for LangCode {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(self.as_str())
    }
}

impl<'de> Deserialize<'de> for LangCode {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let raw = Option::<String>::deserialize(deserializer)?;
        Ok(normalize_lang(raw.as_deref()))
    }
}

/// Normalize a UI language name or code. Absent, empty and unknown input map to `En`.
pub fn normalize_lang(input: Option<&str>) -> LangCode {
    let Some(raw) = input else {
        return LangCode::En;
    };
    let key = raw.trim().to_lowercase();
    use LangCode::*;
    match key.as_str() {
        "en" | "english" => En,
        "hi" | "hindi" => Hi,
        "mr" | "marathi" => Mr,
        "bn" | "bengali" => Bn,
        "ta" | "tamil" => Ta,
        "pa" | "punjabi" => Pa,
        "as" | "assamese" => As,
        "gu" | "gujarati" => Gu,
        "te" | "telugu" => Te,
        "kn" | "kannada" => Kn,
        "ml" | "malayalam" => Ml,
        "or" | "odia" => Or,
        _ => En,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn names_and_codes_are_case_insensitive() {
        assert_eq!(normalize_lang(Some("Hindi")), LangCode::Hi);
        assert_eq!(normalize_lang(Some("HINDI")), LangCode::Hi);
        assert_eq!(normalize_lang(Some("  hi ")), LangCode::Hi);
        assert_eq!(normalize_lang(Some("Odia")), LangCode::Or);
        assert_eq!(normalize_lang(Some("kn")), LangCode::Kn);
    }

    #[test]
    fn unknown_and_empty_default_to_english() {
        assert_eq!(normalize_lang(None), LangCode::En);
        assert_eq!(normalize_lang(Some("")), LangCode::En);
        assert_eq!(normalize_lang(Some("klingon")), LangCode::En);
        assert!(normalize_lang(Some("fr")).is_english());
    }

    #[test]
    fn every_code_round_trips_through_its_own_string() {
        for &lang in LangCode::all() {
            assert_eq!(normalize_lang(Some(lang.as_str())), lang);
            assert_eq!(lang.as_str().parse::<LangCode>().unwrap(), lang);
        }
    }

    #[test]
    fn serde_uses_the_iso_string() {
        let json = serde_json::to_string(&LangCode::Ta).unwrap();
        assert_eq!(json, "\"ta\"");
        let parsed: LangCode = serde_json::from_str("\"Tamil\"").unwrap();
        assert_eq!(parsed, LangCode::Ta);
        let null: LangCode = serde_json::from_str("null").unwrap();
        assert_eq!(null, LangCode::En);
    }
}
