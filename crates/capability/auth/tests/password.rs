use smsgw_auth::{hash_password, verify_password_and_maybe_upgrade};

#[test]
fn argon2_hash_verifies() {
    let hash = hash_password("p@ss").expect("hash");
    assert!(hash.starts_with("$argon2"));
    let check = verify_password_and_maybe_upgrade(&hash, "p@ss").expect("verify");
    assert!(check.verified);
    assert!(check.upgrade_hash.is_none());
}

#[test]
fn wrong_password_fails() {
    let hash = hash_password("p@ss").expect("hash");
    let check = verify_password_and_maybe_upgrade(&hash, "nope").expect("verify");
    assert!(!check.verified);
}

#[test]
fn legacy_plaintext_upgrades_on_success() {
    let check = verify_password_and_maybe_upgrade("legacy-pass", "legacy-pass").expect("verify");
    assert!(check.verified);
    let upgraded = check.upgrade_hash.expect("upgrade hash");
    assert!(upgraded.starts_with("$argon2"));

    let recheck = verify_password_and_maybe_upgrade(&upgraded, "legacy-pass").expect("verify");
    assert!(recheck.verified);
}

#[test]
fn legacy_plaintext_mismatch_does_not_upgrade() {
    let check = verify_password_and_maybe_upgrade("legacy-pass", "other").expect("verify");
    assert!(!check.verified);
    assert!(check.upgrade_hash.is_none());
}

#[test]
fn salts_differ_between_hashes() {
    let first = hash_password("same").expect("hash");
    let second = hash_password("same").expect("hash");
    assert_ne!(first, second);
}
