use std::io::Write;
use std::time::Duration;

use secrecy::SecretString;
use vmcrypt_crypto::container::{EncryptedContainer, MemoryBacking};
use vmcrypt_crypto::{derive, CryptoContext, KdfDigest, KeyStoreSettings};

fn make_data(size: usize) -> Vec<u8> {
    (0..size)
        .map(|i| (i.wrapping_mul(7) ^ (i >> 3)) as u8)
        .collect()
}

fn context(cipher: &str) -> CryptoContext {
    let settings = KeyStoreSettings {
        calibration_target: Duration::from_millis(1),
        ..Default::default()
    };
    CryptoContext::create_with(cipher, &SecretString::from("bench"), settings).unwrap()
}

#[divan::bench(args = ["AES-GCM128", "AES-GCM256", "AES-CTR256"])]
fn bench_encrypt_64k(bencher: divan::Bencher, cipher: &str) {
    let mut ctx = context(cipher);
    let data = make_data(65536);
    bencher
        .counter(divan::counter::BytesCount::new(data.len()))
        .bench_local(|| ctx.encrypt(None, divan::black_box(&data), b"").unwrap());
}

#[divan::bench(args = ["AES-GCM128", "AES-GCM256", "AES-CTR256"])]
fn bench_decrypt_64k(bencher: divan::Bencher, cipher: &str) {
    let mut ctx = context(cipher);
    let data = make_data(65536);
    let sealed = ctx.encrypt(None, &data, b"").unwrap();
    bencher
        .counter(divan::counter::BytesCount::new(data.len()))
        .bench_local(|| ctx.decrypt(divan::black_box(&sealed), b"").unwrap());
}

#[divan::bench(args = [1024, 65536, 1048576])]
fn bench_container_write(bencher: divan::Bencher, size: usize) {
    let keystore = context("AES-GCM256").save().unwrap().to_string();
    let password = SecretString::from("bench");
    let data = make_data(size);
    bencher
        .counter(divan::counter::BytesCount::new(size))
        .with_inputs(|| CryptoContext::load(&keystore, &password).unwrap())
        .bench_local_values(|ctx| {
            let mut container =
                EncryptedContainer::create(MemoryBacking::new(), ctx, 65536).unwrap();
            container.write_all(divan::black_box(&data)).unwrap();
            container.close().unwrap()
        });
}

#[divan::bench(args = [KdfDigest::Sha1, KdfDigest::Sha256, KdfDigest::Sha512])]
fn bench_pbkdf2_20k(digest: KdfDigest) {
    derive(
        divan::black_box(b"correct horse battery staple"),
        &[0u8; 32],
        20_000,
        digest,
        32,
    )
    .unwrap();
}

fn main() {
    divan::main();
}
