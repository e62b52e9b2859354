use regex::Regex;
use std::sync::LazyLock;

static POTENCY_SUFFIX: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?i)\s*\d+mcg/\d+(\.\d+)?ml\s*$").expect("Invalid potency suffix regex")
});
static PARENTHESIZED: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\s*\(.*?\)\s*").expect("Invalid parenthesis regex"));
static SEASON_SUFFIX: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\s+\d{4}/\d{4}\s*$").expect("Invalid season suffix regex"));
static SEASON_PLACEHOLDER: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\s+20XX/20XX\s*$").expect("Invalid season placeholder regex"));
static VOLUME_SUFFIX: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\s+\d+(\.\d+)?ml\s*$").expect("Invalid volume suffix regex"));

/// Reduce a free-text product name to the key used for rule matching.
///
/// The steps run in a fixed order; later patterns assume the earlier ones have
/// already removed decimal commas and annotations.
pub fn canonical_name(raw: &str) -> String {
    let name = raw.replace(',', ".");
    let name = POTENCY_SUFFIX.replace(&name, "");
    let name = PARENTHESIZED.replace_all(&name, "");
    let name = SEASON_SUFFIX.replace(&name, "");
    let name = SEASON_PLACEHOLDER.replace(&name, "");
    let name = VOLUME_SUFFIX.replace(&name, "");
    name.trim().to_lowercase()
}
