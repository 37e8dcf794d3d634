//! Language names and codes understood by the translation backends.

pub const AUTO_DETECT: &str = "Auto Detect";
pub const AUTO_CODE: &str = "auto";
pub const POPULAR_HEADER: &str = "— Popular —";
pub const ALL_HEADER: &str = "— All Languages —";
pub const POPULAR: [&str; 5] = ["English", "Hindi", "Spanish", "French", "German"];

/// (code, display name)
pub const LANGUAGES: &[(&str, &str)] = &[
    ("af", "Afrikaans"),
    ("sq", "Albanian"),
    ("am", "Amharic"),
    ("ar", "Arabic"),
    ("hy", "Armenian"),
    ("az", "Azerbaijani"),
    ("eu", "Basque"),
    ("be", "Belarusian"),
    ("bn", "Bengali"),
    ("bs", "Bosnian"),
    ("bg", "Bulgarian"),
    ("ca", "Catalan"),
    ("ceb", "Cebuano"),
    ("ny", "Chichewa"),
    ("zh-cn", "Chinese (Simplified)"),
    ("zh-tw", "Chinese (Traditional)"),
    ("co", "Corsican"),
    ("hr", "Croatian"),
    ("cs", "Czech"),
    ("da", "Danish"),
    ("nl", "Dutch"),
    ("en", "English"),
    ("eo", "Esperanto"),
    ("et", "Estonian"),
    ("tl", "Filipino"),
    ("fi", "Finnish"),
    ("fr", "French"),
    ("fy", "Frisian"),
    ("gl", "Galician"),
    ("ka", "Georgian"),
    ("de", "German"),
    ("el", "Greek"),
    ("gu", "Gujarati"),
    ("ht", "Haitian Creole"),
    ("ha", "Hausa"),
    ("haw", "Hawaiian"),
    ("he", "Hebrew"),
    ("hi", "Hindi"),
    ("hmn", "Hmong"),
    ("hu", "Hungarian"),
    ("is", "Icelandic"),
    ("ig", "Igbo"),
    ("id", "Indonesian"),
    ("ga", "Irish"),
    ("it", "Italian"),
    ("ja", "Japanese"),
    ("jw", "Javanese"),
    ("kn", "Kannada"),
    ("kk", "Kazakh"),
    ("km", "Khmer"),
    ("ko", "Korean"),
    ("ku", "Kurdish (Kurmanji)"),
    ("ky", "Kyrgyz"),
    ("lo", "Lao"),
    ("la", "Latin"),
    ("lv", "Latvian"),
    ("lt", "Lithuanian"),
    ("lb", "Luxembourgish"),
    ("mk", "Macedonian"),
    ("mg", "Malagasy"),
    ("ms", "Malay"),
    ("ml", "Malayalam"),
    ("mt", "Maltese"),
    ("mi", "Maori"),
    ("mr", "Marathi"),
    ("mn", "Mongolian"),
    ("my", "Myanmar (Burmese)"),
    ("ne", "Nepali"),
    ("no", "Norwegian"),
    ("or", "Odia"),
    ("ps", "Pashto"),
    ("fa", "Persian"),
    ("pl", "Polish"),
    ("pt", "Portuguese"),
    ("pa", "Punjabi"),
    ("ro", "Romanian"),
    ("ru", "Russian"),
    ("sm", "Samoan"),
    ("gd", "Scots Gaelic"),
    ("sr", "Serbian"),
    ("st", "Sesotho"),
    ("sn", "Shona"),
    ("sd", "Sindhi"),
    ("si", "Sinhala"),
    ("sk", "Slovak"),
    ("sl", "Slovenian"),
    ("so", "Somali"),
    ("es", "Spanish"),
    ("su", "Sundanese"),
    ("sw", "Swahili"),
    ("sv", "Swedish"),
    ("tg", "Tajik"),
    ("ta", "Tamil"),
    ("te", "Telugu"),
    ("th", "Thai"),
    ("tr", "Turkish"),
    ("uk", "Ukrainian"),
    ("ur", "Urdu"),
    ("ug", "Uyghur"),
    ("uz", "Uzbek"),
    ("vi", "Vietnamese"),
    ("cy", "Welsh"),
    ("xh", "Xhosa"),
    ("yi", "Yiddish"),
    ("yo", "Yoruba"),
    ("zu", "Zulu"),
];

pub fn code_for(name: &str) -> Option<&'static str> {
    LANGUAGES.iter().find(|(_, n)| *n == name).map(|(code, _)| *code)
}

/// Display name for a code, or the code itself when unknown.
pub fn name_for(code: &str) -> String {
    let code = code.to_ascii_lowercase();
    let code = if code == "iw" { "he" } else { code.as_str() };
    LANGUAGES
        .iter()
        .find(|(c, _)| *c == code)
        .map(|(_, name)| name.to_string())
        .unwrap_or_else(|| code.to_string())
}

pub fn is_header(value: &str) -> bool {
    value == POPULAR_HEADER || value == ALL_HEADER
}

/// Target dropdown entries: popular languages first, then everything else by name.
pub fn dropdown_options() -> Vec<String> {
    let mut others: Vec<&str> = LANGUAGES
        .iter()
        .map(|(_, name)| *name)
        .filter(|name| !POPULAR.contains(name))
        .collect();
    others.sort_unstable();

    let mut options = Vec::with_capacity(LANGUAGES.len() + 2);
    options.push(POPULAR_HEADER.to_string());
    options.extend(POPULAR.iter().filter(|n| code_for(n).is_some()).map(|n| n.to_string()));
    options.push(ALL_HEADER.to_string());
    options.extend(others.into_iter().map(str::to_string));
    options
}

/// Source dropdown entries: "Auto Detect" followed by the target entries.
pub fn source_options() -> Vec<String> {
    let mut options = vec![AUTO_DETECT.to_string()];
    options.extend(dropdown_options());
    options
}

/// Current source/target choice, guarded against headers and an automatic target.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LanguagePicker {
    source: String,
    target: String,
}

impl Default for LanguagePicker {
    fn default() -> Self {
        Self { source: AUTO_DETECT.to_string(), target: "English".to_string() }
    }
}

impl LanguagePicker {
    /// Unknown names fall back to the defaults.
    pub fn new(source: &str, target: &str) -> Self {
        let mut picker = Self::default();
        picker.select_source(source);
        picker.select_target(target);
        picker
    }

    pub fn source(&self) -> &str {
        &self.source
    }

    pub fn target(&self) -> &str {
        &self.target
    }

    pub fn source_code(&self) -> &'static str {
        if self.source == AUTO_DETECT {
            AUTO_CODE
        } else {
            code_for(&self.source).unwrap_or(AUTO_CODE)
        }
    }

    pub fn target_code(&self) -> &'static str {
        code_for(&self.target).unwrap_or("en")
    }

    /// Returns whether the choice was accepted; rejected values keep the previous one.
    pub fn select_source(&mut self, value: &str) -> bool {
        if value != AUTO_DETECT && code_for(value).is_none() {
            return false;
        }
        self.source = value.to_string();
        true
    }

    pub fn select_target(&mut self, value: &str) -> bool {
        if code_for(value).is_none() {
            return false;
        }
        self.target = value.to_string();
        true
    }

    /// Refused while the source is Auto Detect.
    pub fn swap(&mut self) -> bool {
        if self.source == AUTO_DETECT {
            return false;
        }
        std::mem::swap(&mut self.source, &mut self.target);
        true
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn codes_and_names_round_trip() {
        assert_eq!(code_for("Spanish"), Some("es"));
        assert_eq!(name_for("es"), "Spanish");
        assert_eq!(name_for("zh-CN"), "Chinese (Simplified)");
        assert_eq!(name_for("iw"), "Hebrew");
        assert_eq!(name_for("xx"), "xx");
    }

    #[test]
    fn dropdown_lists_popular_first_without_duplicates() {
        let options = dropdown_options();
        assert_eq!(
            &options[..7],
            &[POPULAR_HEADER, "English", "Hindi", "Spanish", "French", "German", ALL_HEADER]
        );
        assert_eq!(options.len(), LANGUAGES.len() + 2);
        assert_eq!(options[7], "Afrikaans");
        assert!(!options[7..].contains(&"English".to_string()));
        assert_eq!(source_options()[0], AUTO_DETECT);
    }

    #[test]
    fn headers_are_rejected() {
        let mut picker = LanguagePicker::new("French", "German");
        assert!(!picker.select_source(POPULAR_HEADER));
        assert!(!picker.select_target(ALL_HEADER));
        assert_eq!((picker.source(), picker.target()), ("French", "German"));
    }

    #[test]
    fn target_cannot_be_auto() {
        let mut picker = LanguagePicker::default();
        assert!(!picker.select_target(AUTO_DETECT));
        assert_eq!(picker.target(), "English");
        assert_eq!(picker.source_code(), "auto");
    }

    #[test]
    fn swap_refused_while_auto_detecting() {
        let mut picker = LanguagePicker::default();
        assert!(!picker.swap());

        picker.select_source("Hindi");
        assert!(picker.swap());
        assert_eq!((picker.source(), picker.target()), ("English", "Hindi"));
        assert_eq!((picker.source_code(), picker.target_code()), ("en", "hi"));
    }
}
