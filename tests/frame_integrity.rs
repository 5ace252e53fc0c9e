use vaultbench::{Vault, VaultError, FRAME_OVERHEAD, IV_LEN, TAG_LEN};

fn keyed_vault() -> Vault {
    let mut vault = Vault::init(7, Default::default()).unwrap();
    vault.crypto_init().unwrap();
    vault
}

#[test]
fn test_round_trip_thousand_bytes() {
    let vault = keyed_vault();
    let plaintext: Vec<u8> = (0..1000).map(|i| (i % 256) as u8).collect();

    let frame = vault.encrypt(&plaintext, 1000).unwrap();
    assert_eq!(frame.len(), 1028);

    let opened = vault.decrypt(&frame, 1000).unwrap();
    assert!(opened.is_authentic());
    assert_eq!(opened.plaintext(), &plaintext[..]);
}

#[test]
fn test_round_trip_many_lengths() {
    let vault = keyed_vault();
    for len in [0usize, 1, 15, 16, 17, 255, 4096] {
        let plaintext = vec![0x3c; len];
        let frame = vault.encrypt(&plaintext, len).unwrap();
        assert_eq!(frame.len(), len + FRAME_OVERHEAD);
        assert_eq!(vault.decrypt(&frame, len).unwrap().into_result().unwrap(), plaintext);
    }
}

#[test]
fn test_encrypt_uses_prefix_of_plaintext() {
    let vault = keyed_vault();
    let frame = vault.encrypt(b"hello world", 5).unwrap();
    assert_eq!(frame.len(), 5 + FRAME_OVERHEAD);
    assert_eq!(vault.decrypt(&frame, 5).unwrap().plaintext(), b"hello");
}

#[test]
fn test_any_corrupted_byte_fails_authentication() {
    // Tag, IV and ciphertext are all covered: flipping any byte must be caught.
    let vault = keyed_vault();
    let plaintext = b"integrity of every region";
    let frame = vault.encrypt(plaintext, plaintext.len()).unwrap();

    for i in 0..frame.len() {
        let mut tampered = frame.clone();
        tampered[i] ^= 0x01;
        let opened = vault.decrypt(&tampered, plaintext.len()).unwrap();
        assert!(!opened.is_authentic(), "flip at byte {} went unnoticed", i);
        assert_eq!(opened.len(), plaintext.len());
    }
}

#[test]
fn test_failure_is_reported_through_into_result() {
    let vault = keyed_vault();
    let mut frame = vault.encrypt(b"abc", 3).unwrap();
    frame[TAG_LEN + IV_LEN] ^= 0xff;
    assert_eq!(
        vault.decrypt(&frame, 3).unwrap().into_result(),
        Err(VaultError::AuthenticationFailure)
    );
}

#[test]
fn test_frame_from_another_vault_rejected() {
    let a = keyed_vault();
    let b = keyed_vault();
    let frame = a.encrypt(b"not yours", 9).unwrap();
    assert!(!b.decrypt(&frame, 9).unwrap().is_authentic());
}

#[test]
fn test_truncated_frame_is_malformed() {
    let vault = keyed_vault();
    let frame = vault.encrypt(b"truncate me", 11).unwrap();
    assert!(matches!(
        vault.decrypt(&frame[..frame.len() - 1], 11),
        Err(VaultError::MalformedFrame { .. })
    ));
}
