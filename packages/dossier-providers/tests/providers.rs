use reqwest::header::{AUTHORIZATION, HeaderName};
use serde_json::{Map, Value};

#[test]
fn builds_bearer_auth_header() {
	let headers =
		dossier_providers::auth_headers("secret", &Map::new()).expect("Failed to build headers.");
	let value = headers.get(AUTHORIZATION).expect("Missing authorization header.");
	assert_eq!(value, "Bearer secret");
}

#[test]
fn builds_api_key_header_with_defaults() {
	let mut defaults = Map::new();

	defaults.insert("x-client".to_string(), Value::String("dossier".to_string()));

	let headers = dossier_providers::api_key_headers("X-API-KEY", "secret", &defaults)
		.expect("Failed to build headers.");

	assert_eq!(headers.get(HeaderName::from_static("x-api-key")).expect("Missing key header."), "secret");
	assert_eq!(headers.get("x-client").expect("Missing default header."), "dossier");
	assert!(headers.get(AUTHORIZATION).is_none());
}

#[test]
fn rejects_non_string_default_headers() {
	let mut defaults = Map::new();

	defaults.insert("x-retries".to_string(), Value::from(3));

	assert!(dossier_providers::auth_headers("secret", &defaults).is_err());
}
