//! Builds a Google authorization URL with PKCE and a nonce, then validates the state returned by
//! the redirect before the code would be exchanged.

// std
use std::collections::HashMap;
// crates.io
use color_eyre::Result;
use url::Url;
// self
use discovery_dispatch::{
	auth::{ClientCreds, ScopeSet},
	config::DispatcherConfig,
	dispatch::Dispatcher,
	strategy::{AuthorizationOptions, StrategyKind},
};

fn main() -> Result<()> {
	color_eyre::install()?;

	let config = DispatcherConfig { user_strategy: StrategyKind::OpenIdConnect, ..Default::default() };
	let client = ClientCreds::new("demo-client.apps.googleusercontent.com", "demo-secret")
		.with_scopes(ScopeSet::new(["https://www.googleapis.com/auth/youtube.readonly"])?)
		.with_redirect_uri(Url::parse("http://127.0.0.1:8080/oauth/callback")?);
	let dispatcher = Dispatcher::builder().config(config).client_creds(client).build()?;
	let session = dispatcher.start_authorization(
		AuthorizationOptions::default().include_granted_scopes().with_prompt("consent"),
	)?;

	println!("Send your user to {}.", &session.authorize_url);
	println!(
		"PKCE challenge ({}): {}.",
		session.code_challenge_method().as_str(),
		session.code_challenge()
	);
	println!("Requested scopes: {}.", session.scopes.normalized());

	let mut sessions: HashMap<String, _> = HashMap::new();

	sessions.insert(session.state.clone(), session.clone());

	// Simulate the redirect handler looking up the stored session by `state`.
	let returned_state = session.state.clone();

	if let Some(stashed) = sessions.remove(&returned_state) {
		stashed.validate_state(&returned_state)?;
		println!("Validated state; nonce {:?}.", stashed.nonce());
		println!("Call Dispatcher::complete_authorization with the returned code to finish.");
	} else {
		eprintln!("State `{returned_state}` was not recognized.");
	}

	Ok(())
}
