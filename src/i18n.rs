use std::collections::HashMap;
use std::sync::OnceLock;

/// Locale used when neither the caller nor the environment names one.
pub const DEFAULT_LOCALE: &str = "ja";

/// Environment variable consulted first when detecting the locale.
pub const LANGUAGE_ENV: &str = "CHALLENGE_LANGUAGE";

/// Global localization state for log and report messages
static LOCALIZER: OnceLock<Localizer> = OnceLock::new();

/// Initialize the global localizer from the environment. Later calls are no-ops.
pub fn init() {
    let _ = LOCALIZER.set(Localizer::new());
}

fn global() -> &'static Localizer {
    LOCALIZER.get_or_init(Localizer::new)
}

/// Get a localized message by key
pub fn t(key: &str) -> String {
    global().get(key)
}

/// Get a localized message by key with arguments (simplified)
pub fn t_with_args(key: &str, args: &[(&str, &dyn std::fmt::Display)]) -> String {
    global().get_with_args(key, args)
}

/// Localization manager
#[derive(Debug, Clone)]
pub struct Localizer {
    language: String,
    messages: HashMap<String, String>,
    fallback: HashMap<String, String>,
}

impl Default for Localizer {
    fn default() -> Self {
        Self::new()
    }
}

impl Localizer {
    pub fn new() -> Self {
        Self::for_language(&detect_language())
    }

    pub fn for_language(language: &str) -> Self {
        let language = normalize(language).unwrap_or_else(|| DEFAULT_LOCALE.to_string());
        let messages = load_messages(&language);
        let fallback = load_messages("en");
        Self {
            language,
            messages,
            fallback,
        }
    }

    pub fn language(&self) -> &str {
        &self.language
    }

    /// Message for `key` in this language, then in English.
    pub fn lookup(&self, key: &str) -> Option<&str> {
        self.messages
            .get(key)
            .or_else(|| self.fallback.get(key))
            .map(String::as_str)
    }

    pub fn get(&self, key: &str) -> String {
        self.lookup(key).map(str::to_string).unwrap_or_else(|| {
            tracing::warn!("Missing translation key: {key}");
            format!("MISSING: {key}")
        })
    }

    pub fn get_with_args(&self, key: &str, args: &[(&str, &dyn std::fmt::Display)]) -> String {
        let mut message = self.get(key);

        // Simple string replacement for {$var} patterns
        for (var_name, value) in args {
            let placeholder = format!("{{${var_name}}}");
            message = message.replace(&placeholder, &format!("{value}"));
        }

        message
    }
}

/// Resolve the locale from the environment, in order of preference.
pub fn detect_language() -> String {
    let vars = [LANGUAGE_ENV, "LC_ALL", "LC_MESSAGES", "LANG"];
    vars.iter()
        .filter_map(|var| std::env::var(var).ok())
        .find_map(|value| normalize(&value))
        .unwrap_or_else(|| DEFAULT_LOCALE.to_string())
}

/// Map `ja_JP.UTF-8`, `en-US`, `EN` and friends to a bundled catalog name.
fn normalize(value: &str) -> Option<String> {
    let without_encoding = value.split('.').next().unwrap_or(value);
    let lang = without_encoding
        .split(['_', '-'])
        .next()
        .unwrap_or(without_encoding)
        .to_lowercase();
    match lang.as_str() {
        "ja" | "jpn" => Some("ja".to_string()),
        "en" | "eng" => Some("en".to_string()),
        _ => None,
    }
}

fn load_messages(language: &str) -> HashMap<String, String> {
    let content = match language {
        "ja" => include_str!("../locales/ja.ftl"),
        _ => include_str!("../locales/en.ftl"),
    };

    // Parse simple key = value format
    content
        .lines()
        .map(str::trim)
        .filter(|line| !line.is_empty() && !line.starts_with('#'))
        .filter_map(|line| line.split_once(" = "))
        .map(|(key, value)| (key.trim().to_string(), value.trim().to_string()))
        .collect()
}

// Convenience macros for common usage patterns
#[macro_export]
macro_rules! t {
    ($key:expr) => {
        $crate::i18n::t($key)
    };
}

#[macro_export]
macro_rules! t_args {
    ($key:expr, $($name:expr => $value:expr),*) => {{
        let args: &[(&str, &dyn std::fmt::Display)] = &[
            $(
                ($name, &$value),
            )*
        ];
        $crate::i18n::t_with_args($key, args)
    }};
}
