use clap::builder::{
	Styles,
	styling::{AnsiColor, Effects},
};

pub const VERSION: &str = concat!(
	env!("CARGO_PKG_VERSION"),
	"-",
	env!("VERGEN_GIT_SHA"),
	"-",
	env!("VERGEN_CARGO_TARGET_TRIPLE"),
);

pub fn styles() -> Styles {
	Styles::styled()
		.header(AnsiColor::Cyan.on_default() | Effects::BOLD)
		.usage(AnsiColor::Cyan.on_default() | Effects::BOLD)
		.literal(AnsiColor::Yellow.on_default() | Effects::BOLD)
		.placeholder(AnsiColor::Green.on_default())
		.error(AnsiColor::Red.on_default() | Effects::BOLD)
}

/// File-name-safe form of a target name: ASCII alphanumerics kept, runs of anything else
/// collapsed to one underscore.
pub fn file_stem(name: &str) -> String {
	let mut stem = String::with_capacity(name.len());

	for ch in name.trim().chars() {
		if ch.is_ascii_alphanumeric() {
			stem.push(ch.to_ascii_lowercase());
		} else if !stem.ends_with('_') {
			stem.push('_');
		}
	}

	let stem = stem.trim_matches('_');

	if stem.is_empty() { "target".to_string() } else { stem.to_string() }
}
