use zargo_util::hash::{digest_eq, sha256_hex};

#[test]
fn sha256_of_empty_input() {
    assert_eq!(
        sha256_hex(b""),
        "e3b0c44298fc1c149afbf4c8996fb92427ae41e4649b934ca495991b7852b855"
    );
}

#[test]
fn sha256_of_known_input() {
    assert_eq!(
        sha256_hex(b"abc"),
        "ba7816bf8f01cfea414140de5dae2223b00361a396177a9cb410ff61f20015ad"
    );
}

#[test]
fn digest_comparison_ignores_pin_case() {
    assert!(digest_eq("DEADBEEF", "deadbeef"));
    assert!(digest_eq("deadbeef", "deadbeef"));
    assert!(!digest_eq("deadbeef", "cafef00d"));
}
