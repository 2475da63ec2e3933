//! Domain-tier source trust.

/// Official records, wire services, major outlets, professional databases.
const TIER_1: [&str; 27] = [
	"sec.gov",
	"justice.gov",
	"fbi.gov",
	"courts.gov",
	"state.gov",
	"treasury.gov",
	"ftc.gov",
	"reuters.com",
	"apnews.com",
	"afp.com",
	"nytimes.com",
	"washingtonpost.com",
	"wsj.com",
	"bbc.com",
	"bbc.co.uk",
	"theguardian.com",
	"ft.com",
	"economist.com",
	"bloomberg.com",
	"cnbc.com",
	"forbes.com",
	"nature.com",
	"science.org",
	"arxiv.org",
	"linkedin.com",
	"crunchbase.com",
	"opencorporates.com",
];
/// Reputable journalism and general references.
const TIER_2: [&str; 17] = [
	"latimes.com",
	"chicagotribune.com",
	"usatoday.com",
	"cnn.com",
	"foxnews.com",
	"msnbc.com",
	"techcrunch.com",
	"wired.com",
	"arstechnica.com",
	"theverge.com",
	"engadget.com",
	"businessinsider.com",
	"fortune.com",
	"inc.com",
	"wikipedia.org",
	"britannica.com",
	"npr.org",
];
/// Listed so a suffix match never lifts them into a higher tier.
const UNVERIFIED: [&str; 7] =
	["twitter.com", "x.com", "facebook.com", "reddit.com", "quora.com", "medium.com", "tiktok.com"];

pub const TIER_1_TRUST: f32 = 0.85;
pub const TIER_2_TRUST: f32 = 0.60;
pub const DEFAULT_TRUST: f32 = 0.30;

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum SourceTier {
	Official,
	Reputable,
	Unverified,
}
impl SourceTier {
	pub fn trust(self) -> f32 {
		match self {
			Self::Official => TIER_1_TRUST,
			Self::Reputable => TIER_2_TRUST,
			Self::Unverified => DEFAULT_TRUST,
		}
	}
}

/// Exact host match first, then the closest registered parent domain.
pub fn tier_for_host(host: &str) -> SourceTier {
	let host = host.trim().trim_end_matches('.').to_lowercase();
	let host = host.strip_prefix("www.").unwrap_or(&host);

	if UNVERIFIED.contains(&host) {
		return SourceTier::Unverified;
	}
	if TIER_1.contains(&host) {
		return SourceTier::Official;
	}
	if TIER_2.contains(&host) {
		return SourceTier::Reputable;
	}

	let mut rest = host;

	while let Some((_, parent)) = rest.split_once('.') {
		if UNVERIFIED.contains(&parent) {
			return SourceTier::Unverified;
		}
		if TIER_1.contains(&parent) {
			return SourceTier::Official;
		}
		if TIER_2.contains(&parent) {
			return SourceTier::Reputable;
		}

		rest = parent;
	}

	SourceTier::Unverified
}

pub fn trust_for_url(url: &str) -> f32 {
	tier_for_host(host_of(url)).trust()
}

fn host_of(url: &str) -> &str {
	let rest = url.trim().split_once("://").map(|(_, rest)| rest).unwrap_or(url.trim());
	let authority = rest.split(['/', '?', '#']).next().unwrap_or_default();
	let host = authority.rsplit_once('@').map(|(_, host)| host).unwrap_or(authority);

	host.split(':').next().unwrap_or_default()
}

#[cfg(test)]
mod tests {
	use super::*;

	#[test]
	fn matches_exact_and_parent_domains() {
		assert_eq!(tier_for_host("reuters.com"), SourceTier::Official);
		assert_eq!(tier_for_host("WWW.Reuters.com"), SourceTier::Official);
		assert_eq!(tier_for_host("edition.cnn.com"), SourceTier::Reputable);
		assert_eq!(tier_for_host("en.wikipedia.org"), SourceTier::Reputable);
		assert_eq!(tier_for_host("someblog.example"), SourceTier::Unverified);
	}

	#[test]
	fn lookalike_domains_do_not_inherit_trust() {
		assert_eq!(tier_for_host("notreuters.com"), SourceTier::Unverified);
		assert_eq!(tier_for_host("reuters.com.evil.io"), SourceTier::Unverified);
	}

	#[test]
	fn trust_reads_the_url_host() {
		assert_eq!(trust_for_url("https://www.sec.gov/litigation/x"), TIER_1_TRUST);
		assert_eq!(trust_for_url("https://user@fortune.com:443/a"), TIER_2_TRUST);
		assert_eq!(trust_for_url("https://twitter.com/jane"), DEFAULT_TRUST);
		assert_eq!(trust_for_url("not a url"), DEFAULT_TRUST);
	}
}
