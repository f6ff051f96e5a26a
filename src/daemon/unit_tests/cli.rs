// SPDX-License-Identifier: Apache-2.0

use crate::new_cli_command;

#[test]
fn test_cli_version_flag() {
    let matches = new_cli_command()
        .try_get_matches_from(["libnetwork-plugin", "-v"])
        .unwrap();
    assert!(matches.get_flag("version"));
}

#[test]
fn test_cli_default_config_source_is_env() {
    let matches = new_cli_command()
        .try_get_matches_from(["libnetwork-plugin"])
        .unwrap();
    assert!(!matches.get_flag("version"));
    assert_eq!(
        matches.get_one::<String>("config").map(String::as_str),
        Some("")
    );
}

#[test]
fn test_cli_config_path() {
    let matches = new_cli_command()
        .try_get_matches_from([
            "libnetwork-plugin",
            "--config",
            "/etc/calico/calicoctl.cfg",
        ])
        .unwrap();
    assert_eq!(
        matches.get_one::<String>("config").map(String::as_str),
        Some("/etc/calico/calicoctl.cfg")
    );
}

#[test]
fn test_cli_unknown_argument() {
    let e = new_cli_command()
        .try_get_matches_from(["libnetwork-plugin", "--no-such-flag"])
        .unwrap_err();
    assert_eq!(e.exit_code(), 2);
}

#[test]
fn test_version_not_empty() {
    assert!(!crate::VERSION.is_empty());
}
