//! Per-host leaf certificate minting, signed by the local root CA
//! (§4.F "Per-connection leaf certificate").
//!
//! Grounded on `examples/original_source/mitm.c`'s `setupServerCertificate`
//! / `addSubjectAltName` (2048-bit RSA, SAN-DNS required for modern
//! browsers, SHA-256 signature) and on the `openssl` crate already present
//! in the teacher's dependency graph (declared for `pingora`'s `openssl`
//! feature there; used directly here since this crate owns TLS itself).

use openssl::asn1::Asn1Time;
use openssl::bn::BigNum;
use openssl::hash::MessageDigest;
use openssl::pkey::{PKey, Private};
use openssl::rsa::Rsa;
use openssl::x509::extension::{BasicConstraints, SubjectAlternativeName, SubjectKeyIdentifier};
use openssl::x509::{X509Builder, X509NameBuilder, X509};
use std::sync::atomic::{AtomicU64, Ordering};

use crate::error::TlsError;

const LEAF_KEY_BITS: u32 = 2048;
/// The original C submission starts its process-wide counter at 2; browsers
/// tolerate duplicate serials across process restarts because the root CA
/// is user-installed, so we keep the same starting point (§9).
static SERIAL_COUNTER: AtomicU64 = AtomicU64::new(2);

fn next_serial() -> u64 {
    SERIAL_COUNTER.fetch_add(1, Ordering::SeqCst)
}

/// Mint a fresh leaf certificate for `host`, signed by `root_cert`/`root_key`.
pub fn mint_leaf_cert(
    host: &str,
    root_cert: &X509,
    root_key: &PKey<Private>,
) -> Result<(X509, PKey<Private>), TlsError> {
    let rsa = Rsa::generate(LEAF_KEY_BITS)?;
    let leaf_key = PKey::from_rsa(rsa)?;

    let mut name_builder = X509NameBuilder::new()?;
    name_builder.append_entry_by_text("CN", host)?;
    let subject_name = name_builder.build();

    let mut builder = X509Builder::new()?;
    builder.set_version(2)?; // X.509 v3

    let mut serial = BigNum::new()?;
    serial.set_word(next_serial())?;
    let serial_asn1 = serial.to_asn1_integer()?;
    builder.set_serial_number(&serial_asn1)?;

    let not_before = Asn1Time::days_from_now(0)?;
    let not_after = Asn1Time::days_from_now(365)?;
    builder.set_not_before(&not_before)?;
    builder.set_not_after(&not_after)?;

    builder.set_subject_name(&subject_name)?;
    builder.set_issuer_name(root_cert.subject_name())?;
    builder.set_pubkey(&leaf_key)?;

    builder.append_extension(BasicConstraints::new().build()?)?;
    let ctx = builder.x509v3_context(Some(root_cert), None);
    let ski = SubjectKeyIdentifier::new().build(&ctx)?;
    builder.append_extension(ski)?;

    // Required for modern browsers to accept the forged leaf (§4.F).
    let ctx = builder.x509v3_context(Some(root_cert), None);
    let san = SubjectAlternativeName::new().dns(host).build(&ctx)?;
    builder.append_extension(san)?;

    builder.sign(root_key, MessageDigest::sha256())?;
    let cert = builder.build();

    Ok((cert, leaf_key))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn test_root() -> (X509, PKey<Private>) {
        let rsa = Rsa::generate(2048).unwrap();
        let key = PKey::from_rsa(rsa).unwrap();
        let mut name = X509NameBuilder::new().unwrap();
        name.append_entry_by_text("CN", "Test Root CA").unwrap();
        let name = name.build();

        let mut builder = X509Builder::new().unwrap();
        builder.set_version(2).unwrap();
        let mut serial = BigNum::new().unwrap();
        serial.set_word(1).unwrap();
        let asn1 = serial.to_asn1_integer().unwrap();
        builder.set_serial_number(&asn1).unwrap();
        builder.set_subject_name(&name).unwrap();
        builder.set_issuer_name(&name).unwrap();
        builder.set_pubkey(&key).unwrap();
        let not_before = Asn1Time::days_from_now(0).unwrap();
        let not_after = Asn1Time::days_from_now(3650).unwrap();
        builder.set_not_before(&not_before).unwrap();
        builder.set_not_after(&not_after).unwrap();
        builder.sign(&key, MessageDigest::sha256()).unwrap();
        (builder.build(), key)
    }

    #[test]
    fn mints_leaf_with_matching_san() {
        let (root_cert, root_key) = test_root();
        let (leaf, _leaf_key) = mint_leaf_cert("www.nytimes.com", &root_cert, &root_key).unwrap();
        let cn = leaf
            .subject_name()
            .entries_by_nid(openssl::nid::Nid::COMMONNAME)
            .next()
            .unwrap();
        assert_eq!(cn.data().as_utf8().unwrap().to_string(), "www.nytimes.com");
    }

    #[test]
    fn serials_are_monotonically_increasing() {
        let (root_cert, root_key) = test_root();
        let (first, _) = mint_leaf_cert("a.example", &root_cert, &root_key).unwrap();
        let (second, _) = mint_leaf_cert("b.example", &root_cert, &root_key).unwrap();
        let s1 = first.serial_number().to_bn().unwrap();
        let s2 = second.serial_number().to_bn().unwrap();
        assert!(s2 > s1);
    }
}
