//! # Profiles
//!
//! Lists the stored profiles and adds one from the environment.
//!
//! ## Requirements
//!
//! To add a profile, set:
//! - `ONSCALE_ALIAS`: the name to store it under.
//! - `ONSCALE_TOKEN`: a developer or supervisor token.
//! - `ONSCALE_PORTAL`: `test`, `dev` or `prod` (default `prod`).
//!
//! ## Usage
//!
//! ```sh
//! cargo run --example profiles
//! ```

use onscale::prelude::*;
use std::env;

fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt::init();

    let mut store = ProfileStore::open_default()?;

    if let (Ok(alias), Ok(token)) = (env::var("ONSCALE_ALIAS"), env::var("ONSCALE_TOKEN")) {
        let portal = env::var("ONSCALE_PORTAL")
            .ok()
            .map(|p| p.parse::<PortalTarget>())
            .transpose()?
            .unwrap_or_default();
        store.upsert(&alias, Profile::new(portal, token))?;
        store.save()?;
        println!("Saved profile '{alias}' to {}", store.path().display());
    }

    let default = store.default_alias().map(str::to_string);
    for (alias, profile) in store.profiles() {
        let marker = if default.as_deref() == Some(alias.as_str()) {
            "*"
        } else {
            " "
        };
        println!(
            "{marker} {alias:<16} {:<5} {}",
            profile.portal,
            profile.user.as_deref().unwrap_or("-")
        );
    }

    match store.resolve(None, None) {
        Ok((alias, _)) => println!("Without arguments, '{alias}' would be used."),
        Err(e) => println!("No profile would be picked: {e}"),
    }
    Ok(())
}
