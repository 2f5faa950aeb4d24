#![cfg(all(feature = "sdk", feature = "client"))]

use onscale::prelude::*;

#[tokio::test]
async fn connect_without_profiles_is_a_configuration_error() {
    let home = tempfile::tempdir().unwrap();
    // Only test in this binary, so nothing else reads the environment concurrently.
    unsafe {
        std::env::set_var("HOME", home.path());
        std::env::remove_var("ONSCALE_DEFAULT_PROFILE");
    }

    let err = onscale::connect(Some(PortalTarget::Test), None)
        .await
        .err()
        .unwrap();
    assert!(matches!(
        err,
        OnscaleError::Configuration(ConfigError::NoMatchingProfile { ref portal }) if portal == "test"
    ));
}
