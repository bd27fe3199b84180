//! Writes a short-lived self-signed localhost certificate for the arena server.
//!
//! Run from the repository root: `cargo run --manifest-path scripts/Cargo.toml [out_dir]`
//! (default out_dir is `certs`, which is where the server looks when no
//! TLS_CERT_PATH/TLS_KEY_PATH pair is configured).

use base64::{engine::general_purpose::STANDARD, Engine as _};
use rcgen::{CertificateParams, DistinguishedName, DnType, KeyPair};
use ring::digest::{digest, SHA256};
use std::fs;
use std::path::{Path, PathBuf};
use std::time::{Duration, SystemTime};

// Browsers only pin serverCertificateHashes for certificates valid <= 14 days
const VALIDITY: Duration = Duration::from_secs(14 * 24 * 60 * 60);

fn main() -> Result<(), Box<dyn std::error::Error>> {
    let out_dir = PathBuf::from(std::env::args().nth(1).unwrap_or_else(|| "certs".into()));
    let cert_file = out_dir.join("cert.pem");
    let key_file = out_dir.join("key.pem");

    if cert_file.exists() && key_file.exists() {
        println!("Keeping existing pair in {}/ (delete it to regenerate)", out_dir.display());
        return print_hash(&cert_file);
    }

    fs::create_dir_all(&out_dir)?;

    let mut params = CertificateParams::new(vec!["localhost".to_string(), "127.0.0.1".to_string()])?;
    params.distinguished_name = DistinguishedName::new();
    params
        .distinguished_name
        .push(DnType::CommonName, "Salvage Arena Dev");

    let now = SystemTime::now();
    params.not_before = now.into();
    params.not_after = (now + VALIDITY).into();

    let key_pair = KeyPair::generate()?;
    let cert = params.self_signed(&key_pair)?;

    fs::write(&cert_file, cert.pem())?;
    fs::write(&key_file, key_pair.serialize_pem())?;
    println!("Wrote {} and {}", cert_file.display(), key_file.display());

    print_hash(&cert_file)
}

fn print_hash(cert_file: &Path) -> Result<(), Box<dyn std::error::Error>> {
    let pem = pem::parse(fs::read_to_string(cert_file)?)?;
    let hash = STANDARD.encode(digest(&SHA256, pem.contents()).as_ref());
    println!("serverCertificateHashes value (base64 SHA-256): {hash}");
    Ok(())
}
