//! Property tests for the key-store envelope.
//!
//! Every seal runs a real PBKDF2 calibration, so case counts are kept low
//! and the calibration target is 1 ms (which still yields the 20000
//! iteration floor).

use std::sync::OnceLock;
use std::time::Duration;

use base64::{engine::general_purpose::STANDARD, Engine};
use proptest::prelude::*;
use secrecy::SecretString;
use vmcrypt_crypto::kdf::MIN_ITERATIONS;
use vmcrypt_crypto::keystore::KEYSTORE_SIZE;
use vmcrypt_crypto::{CryptoContext, CryptoError, KeyStore, KeyStoreSettings};

const CIPHERS: [(&str, usize); 7] = [
    ("XOR", 16),
    ("AES-GCM128", 16),
    ("AES-GCM256", 32),
    ("AES-CTR128", 16),
    ("AES-CTR256", 32),
    ("AES-XTS128-PLAIN64", 32),
    ("AES-XTS256-PLAIN64", 64),
];

fn fast_settings() -> KeyStoreSettings {
    KeyStoreSettings {
        calibration_target: Duration::from_millis(1),
        ..Default::default()
    }
}

fn shared_keystore() -> &'static (String, SecretString) {
    static SHARED: OnceLock<(String, SecretString)> = OnceLock::new();
    SHARED.get_or_init(|| {
        let password = SecretString::from("shared-vm-password");
        let text = KeyStore::seal(&password, &[0x42u8; 32], "AES-GCM256", &fast_settings())
            .expect("seal shared key-store");
        (text, password)
    })
}

/// Key-stores written by a context reload into a context with the same DEK.
#[test]
fn context_keystore_reloads() {
    let password = SecretString::from("reload");
    let mut ctx = CryptoContext::create_with("AES-CTR256", &password, fast_settings())
        .expect("create context");
    let sealed = ctx.encrypt(None, b"guest registers", b"").expect("encrypt");

    let text = ctx.save().expect("save").to_string();
    assert_eq!(KeyStore::peek_cipher(&text).expect("peek"), "AES-CTR256");
    let decoded = KeyStore::decode(&text).expect("decode");
    assert_eq!(decoded.key_size(), 32);
    assert!(decoded.dek_iterations() >= MIN_ITERATIONS);
    assert_eq!(decoded.dek_iterations() % MIN_ITERATIONS, 0);

    let mut reloaded = CryptoContext::load(&text, &password).expect("load");
    assert_eq!(reloaded.decrypt(&sealed, b"").expect("decrypt"), b"guest registers");
}

/// Every re-seal of the same DEK produces a different envelope.
#[test]
fn reseal_uses_fresh_salts() {
    let password = SecretString::from("salted");
    let a = KeyStore::seal(&password, &[1u8; 16], "AES-GCM128", &fast_settings()).expect("seal");
    let b = KeyStore::seal(&password, &[1u8; 16], "AES-GCM128", &fast_settings()).expect("seal");
    assert_ne!(a, b);
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(12))]

    #[test]
    fn prop_seal_unseal_roundtrip(
        which in 0usize..CIPHERS.len(),
        password in "[ -~]{1,48}",
        seed in any::<u8>(),
    ) {
        let (cipher, key_size) = CIPHERS[which];
        let dek: Vec<u8> = (0..key_size).map(|i| seed.wrapping_add(i as u8)).collect();
        let password = SecretString::from(password);

        let text = KeyStore::seal(&password, &dek, cipher, &fast_settings()).unwrap();
        prop_assert_eq!(STANDARD.decode(&text).unwrap().len(), KEYSTORE_SIZE);

        let unsealed = KeyStore::unseal(&text, Some(&password)).unwrap();
        prop_assert_eq!(unsealed.cipher(), cipher);
        let recovered = unsealed.dek.unwrap();
        prop_assert_eq!(recovered.as_bytes(), &dek[..]);
    }

    #[test]
    fn prop_wrong_password_is_rejected(guess in "[ -~]{1,48}") {
        let (text, _) = shared_keystore();
        prop_assume!(guess != "shared-vm-password");

        let err = KeyStore::unseal(text, Some(&SecretString::from(guess))).unwrap_err();
        prop_assert!(matches!(err, CryptoError::WrongPassword), "got {:?}", err);
    }

    #[test]
    fn prop_salt_and_key_tamper_is_detected(
        offset in prop::sample::select(
            (112usize..144).chain(148..180).chain(188..220).collect::<Vec<_>>()
        ),
        bit in 0u8..8,
    ) {
        let (text, password) = shared_keystore();
        let mut raw = STANDARD.decode(text).unwrap();
        raw[offset] ^= 1 << bit;

        let result = KeyStore::from_bytes(&raw).and_then(|ks| ks.unwrap_dek(password));
        prop_assert!(matches!(result, Err(CryptoError::WrongPassword)));
    }
}
