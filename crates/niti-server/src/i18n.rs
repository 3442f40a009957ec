//! Interface strings for the supported languages.

use std::collections::BTreeMap;

use once_cell::sync::Lazy;

pub const LANGUAGES: &[&str] = &["en", "hi"];

const EN: &[(&str, &str)] = &[
    ("welcome", "Welcome"),
    ("login", "Login"),
    ("logout", "Logout"),
    ("signup", "Sign Up"),
    ("dashboard", "Dashboard"),
    ("profile", "Profile"),
    ("find_schemes", "Find Schemes"),
    ("eligible_schemes", "Your Eligible Schemes"),
    ("no_eligible_schemes", "No eligible schemes found for your profile"),
    ("verify_identity", "Verify your Aadhaar"),
    ("profile_verified", "Profile Verified"),
    ("chat_title", "Niti-Mitra"),
    ("chat_placeholder", "Ask about a scheme"),
];

const HI: &[(&str, &str)] = &[
    ("welcome", "स्वागत है"),
    ("login", "लॉगिन"),
    ("logout", "लॉगआउट"),
    ("signup", "साइन अप"),
    ("dashboard", "डैशबोर्ड"),
    ("profile", "प्रोफ़ाइल"),
    ("find_schemes", "योजनाएँ खोजें"),
    ("eligible_schemes", "आपकी पात्र योजनाएँ"),
    ("no_eligible_schemes", "आपकी प्रोफ़ाइल के लिए कोई पात्र योजना नहीं मिली"),
    ("verify_identity", "अपना आधार सत्यापित करें"),
    ("profile_verified", "प्रोफ़ाइल सत्यापित"),
    ("chat_title", "नीति-मित्र"),
    ("chat_placeholder", "किसी योजना के बारे में पूछें"),
];

static TABLES: Lazy<BTreeMap<&'static str, BTreeMap<&'static str, &'static str>>> =
    Lazy::new(|| {
        let mut tables = BTreeMap::new();
        tables.insert("en", EN.iter().copied().collect());
        tables.insert("hi", HI.iter().copied().collect());
        tables
    });

/// The full table for `lang`, if the language is supported.
pub fn table(lang: &str) -> Option<&'static BTreeMap<&'static str, &'static str>> {
    TABLES.get(lang)
}

/// Look up one string. Unknown languages and keys yield the key itself.
pub fn translate<'a>(lang: &str, key: &'a str) -> &'a str {
    match table(lang).and_then(|t| t.get(key)) {
        Some(text) => *text,
        None => key,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_translate() {
        assert_eq!(translate("hi", "login"), "लॉगिन");
        assert_eq!(translate("en", "signup"), "Sign Up");
    }

    #[test]
    fn test_fallback_to_key() {
        assert_eq!(translate("hi", "unknown_key"), "unknown_key");
        assert_eq!(translate("ta", "welcome"), "welcome");
    }

    #[test]
    fn test_tables_share_keys() {
        let en: Vec<_> = table("en").unwrap().keys().collect();
        let hi: Vec<_> = table("hi").unwrap().keys().collect();
        assert_eq!(en, hi);
        assert_eq!(LANGUAGES.len(), TABLES.len());
    }
}
