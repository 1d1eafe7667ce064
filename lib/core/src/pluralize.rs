//! English pluralization for default container names
//!
//! The input is lowercased first. Rules are tried in order and the first
//! match wins; nouns in [`UNCOUNTABLES`] pass through unchanged.

pub const UNCOUNTABLES: &[&str] = &[
    "advice",
    "energy",
    "excretion",
    "digestion",
    "cooperation",
    "health",
    "justice",
    "labour",
    "machinery",
    "equipment",
    "information",
    "pollution",
    "sewage",
    "paper",
    "money",
    "species",
    "series",
    "rain",
    "rice",
    "fish",
    "sheep",
    "moose",
    "deer",
    "news",
    "expertise",
    "status",
    "media",
];

/// Plain suffix rules: (suffix, characters to drop, replacement)
const SUFFIX_RULES: &[(&str, usize, &str)] = &[
    ("man", 2, "en"),
    ("person", 4, "ople"),
    ("child", 0, "ren"),
];

const SUFFIX_RULES_AFTER_OX: &[(&str, usize, &str)] = &[
    ("axis", 2, "es"),
    ("testis", 2, "es"),
    ("octopus", 2, "i"),
    ("virus", 2, "i"),
    ("alias", 0, "es"),
    ("status", 0, "es"),
    ("bus", 0, "es"),
    ("buffalo", 0, "es"),
    ("tomato", 0, "es"),
    ("potato", 0, "es"),
    ("tum", 2, "a"),
    ("ium", 2, "a"),
    ("sis", 3, "ses"),
];

pub fn pluralize(name: &str) -> String {
    let word = name.to_lowercase();
    if UNCOUNTABLES.contains(&word.as_str()) {
        return word;
    }
    apply_rules(&word)
}

fn apply_rules(word: &str) -> String {
    if let Some(plural) = apply_suffix_rules(word, SUFFIX_RULES) {
        return plural;
    }
    if word == "ox" {
        return "oxen".to_string();
    }
    if let Some(plural) = apply_suffix_rules(word, SUFFIX_RULES_AFTER_OX) {
        return plural;
    }

    // knife -> knives, half -> halves
    if let Some(stem) = word.strip_suffix("fe") {
        if !stem.is_empty() && !stem.ends_with('f') {
            return format!("{}ves", stem);
        }
    }
    if word.ends_with("lf") || word.ends_with("rf") {
        return format!("{}ves", &word[..word.len() - 1]);
    }

    if word.ends_with("hive") {
        return format!("{}s", word);
    }

    if let Some(stem) = word.strip_suffix('y') {
        let consonant = stem
            .chars()
            .last()
            .map_or(false, |c| !matches!(c, 'a' | 'e' | 'i' | 'o' | 'u' | 'y'));
        if consonant || stem.ends_with("qu") {
            return format!("{}ies", stem);
        }
    }

    if ["x", "ch", "ss", "sh"].iter().any(|s| word.ends_with(s)) {
        return format!("{}es", word);
    }

    for stem in ["matr", "vert", "ind"] {
        let singular = format!("{}ix", stem);
        if word.contains(&singular) {
            return word.replace(&singular, &format!("{}ices", stem));
        }
    }

    if word.ends_with("mouse") || word.ends_with("louse") {
        return format!("{}ice", &word[..word.len() - 4]);
    }

    if word.ends_with("quiz") {
        return format!("{}zes", word);
    }

    match word.chars().last() {
        Some('s') => word.to_string(),
        Some(c) if !c.is_ascii_lowercase() => word.to_string(),
        _ => format!("{}s", word),
    }
}

fn apply_suffix_rules(word: &str, rules: &[(&str, usize, &str)]) -> Option<String> {
    rules.iter().find_map(|(suffix, drop, replacement)| {
        word.ends_with(suffix)
            .then(|| format!("{}{}", &word[..word.len() - drop], replacement))
    })
}
