//! Text and name folding used to build canonical keys.

use std::collections::HashSet;

use unicode_normalization::UnicodeNormalization;
use unicode_segmentation::UnicodeSegmentation;

const HONORIFICS: [&str; 9] = ["mr", "mrs", "ms", "dr", "prof", "sir", "hon", "jr", "sr"];
const CORPORATE_SUFFIXES: [&str; 9] = ["corp", "inc", "co", "ltd", "llc", "plc", "gmbh", "ag", "sa"];
const STOPWORDS: [&str; 36] = [
	"a", "an", "the", "of", "in", "on", "at", "to", "for", "and", "or", "by", "with", "from", "as",
	"is", "was", "were", "be", "been", "being", "has", "have", "had", "his", "her", "their", "its",
	"he", "she", "they", "it", "that", "this", "who", "which",
];

/// Tokens of a statement split by role.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct StatementTokens {
	/// Content words minus stopwords, value tokens, and the target's own name.
	pub stem: Vec<String>,
	/// Tokens carrying a digit: years, dates, amounts.
	pub values: Vec<String>,
	/// Every non-stopword, non-target token, values included.
	pub all: Vec<String>,
}
impl StatementTokens {
	pub fn analyze(text: &str, excluded: &HashSet<String>) -> Self {
		let mut tokens = Self::default();

		for word in words(text) {
			if STOPWORDS.contains(&word.as_str()) {
				continue;
			}
			if word.chars().any(|ch| ch.is_ascii_digit() || ch.is_numeric()) {
				tokens.values.push(word.clone());
				tokens.all.push(word);

				continue;
			}
			if excluded.contains(&word) {
				continue;
			}

			tokens.stem.push(word.clone());
			tokens.all.push(word);
		}

		tokens
	}

	pub fn is_empty(&self) -> bool {
		self.all.is_empty()
	}

	/// Canonical key under `scope` (a category label).
	pub fn key(&self, scope: &str) -> String {
		format!("{scope}:{}|{}", self.stem.join(" "), self.values.join(" "))
	}

	/// Family identity: the scope plus the sorted, deduplicated stem.
	pub fn family(&self, scope: &str) -> String {
		let mut stem: Vec<&str> = self.stem.iter().map(String::as_str).collect();

		stem.sort_unstable();
		stem.dedup();

		format!("{scope}:{}", stem.join(" "))
	}
}

/// NFKC, lowercase, `&` spelled out, punctuation replaced by spaces, whitespace collapsed.
pub fn fold_text(input: &str) -> String {
	let normalized: String = input.nfkc().collect::<String>().to_lowercase();
	let mut out = String::with_capacity(normalized.len());

	for ch in normalized.chars() {
		if ch == '&' {
			out.push_str(" and ");
		} else if ch.is_alphanumeric() || ch.is_whitespace() {
			out.push(ch);
		} else {
			out.push(' ');
		}
	}

	out.split_whitespace().collect::<Vec<_>>().join(" ")
}

/// Folded words with honorifics removed and corporate suffixes abbreviated.
pub fn words(input: &str) -> Vec<String> {
	fold_text(input)
		.unicode_words()
		.filter(|word| !HONORIFICS.contains(word))
		.map(|word| fold_alias(word).to_string())
		.collect()
}

/// Name normalization for entity keys: honorifics and corporate suffixes dropped.
///
/// A name made only of suffixes ("Inc.") keeps them rather than normalizing to nothing.
pub fn normalize_name(name: &str) -> String {
	let all = words(name);
	let core: Vec<&str> = all
		.iter()
		.map(String::as_str)
		.filter(|word| !CORPORATE_SUFFIXES.contains(word))
		.collect();

	if core.is_empty() { all.join(" ") } else { core.join(" ") }
}

/// Relation labels fold to `snake_case` words, e.g. "Board Member" -> "board_member".
pub fn normalize_label(label: &str) -> String {
	fold_text(label).unicode_words().collect::<Vec<_>>().join("_")
}

/// Query identity used to avoid re-issuing the same search.
pub fn normalize_query(query: &str) -> String {
	fold_text(query)
}

pub fn name_tokens(name: &str) -> Vec<String> {
	normalize_name(name).split(' ').filter(|word| !word.is_empty()).map(str::to_string).collect()
}

/// Set Jaccard similarity. Two empty inputs are identical.
pub fn jaccard(left: &[String], right: &[String]) -> f32 {
	let left: HashSet<&str> = left.iter().map(String::as_str).collect();
	let right: HashSet<&str> = right.iter().map(String::as_str).collect();

	if left.is_empty() && right.is_empty() {
		return 1.0;
	}

	let shared = left.intersection(&right).count();
	let union = left.union(&right).count();

	shared as f32 / union as f32
}

/// Value tokens agree when one side is silent or one set contains the other.
pub fn values_compatible(left: &[String], right: &[String]) -> bool {
	if left.is_empty() || right.is_empty() {
		return true;
	}

	let left: HashSet<&str> = left.iter().map(String::as_str).collect();
	let right: HashSet<&str> = right.iter().map(String::as_str).collect();

	left.is_subset(&right) || right.is_subset(&left)
}

/// URL host without scheme, credentials, port, or a leading `www.`.
pub fn origin_of(url: &str) -> String {
	let trimmed = url.trim();
	let without_scheme = trimmed.split_once("://").map(|(_, rest)| rest).unwrap_or(trimmed);
	let authority = without_scheme.split(['/', '?', '#']).next().unwrap_or_default();
	let host = authority.rsplit_once('@').map(|(_, host)| host).unwrap_or(authority);
	let host = host.split(':').next().unwrap_or_default().to_lowercase();

	host.strip_prefix("www.").map(str::to_string).unwrap_or(host)
}

pub fn clamp_unit(value: f32) -> f32 {
	if value.is_finite() { value.clamp(0.0, 1.0) } else { 0.0 }
}

pub fn clamp_severity(value: f32) -> f32 {
	if value.is_finite() { value.clamp(0.0, 10.0) } else { 0.0 }
}

fn fold_alias(word: &str) -> &str {
	match word {
		"corporation" => "corp",
		"incorporated" => "inc",
		"company" => "co",
		"limited" => "ltd",
		_ => word,
	}
}

#[cfg(test)]
mod tests {
	use super::*;

	fn target() -> HashSet<String> {
		["jane", "doe"].into_iter().map(str::to_string).collect()
	}

	#[test]
	fn folds_honorifics_and_suffixes() {
		assert_eq!(normalize_name("Dr. Jane  DOE"), "jane doe");
		assert_eq!(normalize_name("Acme Corporation"), "acme");
		assert_eq!(normalize_name("Acme Corp."), "acme");
		assert_eq!(normalize_name("Inc."), "inc");
		assert_eq!(normalize_name("Smith & Sons, Ltd"), "smith and sons");
	}

	#[test]
	fn splits_values_from_stem() {
		let tokens = StatementTokens::analyze("Jane Doe was born in 1970", &target());

		assert_eq!(tokens.stem, vec!["born".to_string()]);
		assert_eq!(tokens.values, vec!["1970".to_string()]);
		assert_eq!(tokens.key("biography"), "biography:born|1970");
	}

	#[test]
	fn target_name_does_not_change_the_key() {
		let short = StatementTokens::analyze("born in 1970", &target());
		let long = StatementTokens::analyze("Ms. Jane Doe was born in 1970.", &target());

		assert_eq!(short.key("biography"), long.key("biography"));
	}

	#[test]
	fn family_ignores_order_and_duplicates() {
		let left = StatementTokens::analyze("CEO of Acme Corp", &target());
		let right = StatementTokens::analyze("Acme Corporation CEO", &target());

		assert_eq!(left.family("professional"), right.family("professional"));
	}

	#[test]
	fn value_compatibility_accepts_refinement() {
		let year = vec!["1970".to_string()];
		let full = vec!["12".to_string(), "1970".to_string()];
		let other = vec!["1972".to_string()];

		assert!(values_compatible(&year, &full));
		assert!(values_compatible(&year, &[]));
		assert!(!values_compatible(&year, &other));
	}

	#[test]
	fn jaccard_handles_empty_sets() {
		assert_eq!(jaccard(&[], &[]), 1.0);
		assert_eq!(jaccard(&["a".to_string()], &[]), 0.0);
	}

	#[test]
	fn extracts_origin_host() {
		assert_eq!(origin_of("https://www.Reuters.com/world/a?b=c"), "reuters.com");
		assert_eq!(origin_of("http://user@news.example.org:8080/x"), "news.example.org");
		assert_eq!(origin_of("example.com/path"), "example.com");
	}

	#[test]
	fn labels_fold_to_snake_case() {
		assert_eq!(normalize_label("Board Member"), "board_member");
		assert_eq!(normalize_label(" co-founder "), "co_founder");
	}

	#[test]
	fn clamps_non_finite_values() {
		assert_eq!(clamp_unit(f32::NAN), 0.0);
		assert_eq!(clamp_unit(1.7), 1.0);
		assert_eq!(clamp_severity(-3.0), 0.0);
		assert_eq!(clamp_severity(12.5), 10.0);
	}
}
