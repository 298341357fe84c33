//! HTTP signatures for outbound federation requests
//!
//! Draft-cavage style signing over `(request-target)`, `host` and `date`.
//! Inbound verification is deliberately absent; see the inbox processor.

use base64::{engine::general_purpose::STANDARD as BASE64, Engine};
use rsa::pkcs8::DecodePrivateKey;
use rsa::pkcs1v15::SigningKey;
use rsa::signature::{RandomizedSigner, SignatureEncoding};
use rsa::RsaPrivateKey;
use sha2::Sha256;

use crate::error::AppError;

/// Headers produced by signing a request.
///
/// The `Date` value is generated here and must be sent exactly as returned;
/// regenerating it after signing would invalidate the signature.
#[derive(Debug, Clone)]
pub struct SignedHeaders {
    /// `Signature` header value
    pub signature: String,
    /// `Date` header value (HTTP-date)
    pub date: String,
}

/// Sign an outbound request.
///
/// Builds the signing string over `(request-target)`, `host` and `date`,
/// hashes with SHA-256 and signs with RSA PKCS#1 v1.5.
///
/// # Arguments
/// * `method` - HTTP method, e.g. "POST"
/// * `url` - Full request URL
/// * `private_key_pem` - PKCS#8 (or PKCS#1) private key PEM
/// * `key_id` - Public key URI advertised in the actor document
///
/// # Errors
/// `AppError::Crypto` on an unparseable key; `AppError::Validation` on a
/// malformed URL.
pub fn sign_request(
    method: &str,
    url: &str,
    private_key_pem: &str,
    key_id: &str,
) -> Result<SignedHeaders, AppError> {
    let parsed_url =
        url::Url::parse(url).map_err(|e| AppError::Validation(format!("Invalid URL: {}", e)))?;

    let host = parsed_url
        .host_str()
        .ok_or_else(|| AppError::Validation("Missing host in URL".to_string()))?;
    // The signed host must match the Host header the peer sees, which
    // carries any non-default port.
    let host = match parsed_url.port() {
        Some(port) => format!("{}:{}", host, port),
        None => host.to_string(),
    };

    let path_and_query = match parsed_url.query() {
        Some(query) => format!("{}?{}", parsed_url.path(), query),
        None => parsed_url.path().to_string(),
    };

    // Date is fixed before signing so the header and the signed value agree.
    let date = chrono::Utc::now()
        .format("%a, %d %b %Y %H:%M:%S GMT")
        .to_string();

    let signing_string = build_signing_string(method, &path_and_query, &host, &date);

    let private_key = parse_private_key(private_key_pem)?;
    let signing_key = SigningKey::<Sha256>::new(private_key);
    let mut rng = rand::thread_rng();
    let signature = signing_key.sign_with_rng(&mut rng, signing_string.as_bytes());
    let signature_b64 = BASE64.encode(signature.to_bytes());

    let signature_header = format!(
        "keyId=\"{}\",algorithm=\"rsa-sha256\",headers=\"(request-target) host date\",signature=\"{}\"",
        key_id, signature_b64
    );

    Ok(SignedHeaders {
        signature: signature_header,
        date,
    })
}

/// The exact byte string that gets signed.
pub fn build_signing_string(method: &str, path_and_query: &str, host: &str, date: &str) -> String {
    format!(
        "(request-target): {} {}\nhost: {}\ndate: {}",
        method.to_lowercase(),
        path_and_query,
        host,
        date
    )
}

fn parse_private_key(pem: &str) -> Result<RsaPrivateKey, AppError> {
    // PKCS#8 is what we generate; PKCS#1 keys imported from elsewhere still
    // load through the fallback.
    RsaPrivateKey::from_pkcs8_pem(pem)
        .or_else(|_| {
            use rsa::pkcs1::DecodeRsaPrivateKey;
            RsaPrivateKey::from_pkcs1_pem(pem)
        })
        .map_err(|e| AppError::Crypto(format!("Invalid private key: {}", e)))
}

/// Parsed `Signature` header value.
#[derive(Debug, Clone)]
pub struct ParsedSignature {
    pub key_id: String,
    pub algorithm: String,
    pub headers: Vec<String>,
    pub signature: String,
}

/// Parse a `Signature` header of the form
/// `keyId="...",algorithm="...",headers="...",signature="..."`.
pub fn parse_signature_header(header: &str) -> Result<ParsedSignature, AppError> {
    let mut key_id = None;
    let mut algorithm = None;
    let mut headers = None;
    let mut signature = None;

    for part in header.split(',') {
        if let Some((key, value)) = part.trim().split_once('=') {
            let value = value.trim().trim_matches('"');
            match key.trim() {
                "keyId" => key_id = Some(value.to_string()),
                "algorithm" => algorithm = Some(value.to_string()),
                "headers" => {
                    headers = Some(
                        value
                            .split_whitespace()
                            .map(|s| s.to_ascii_lowercase())
                            .collect(),
                    )
                }
                "signature" => signature = Some(value.to_string()),
                _ => {}
            }
        }
    }

    Ok(ParsedSignature {
        key_id: key_id.ok_or_else(|| AppError::Validation("Missing keyId".to_string()))?,
        algorithm: algorithm
            .ok_or_else(|| AppError::Validation("Missing algorithm".to_string()))?,
        headers: headers.ok_or_else(|| AppError::Validation("Missing headers".to_string()))?,
        signature: signature
            .ok_or_else(|| AppError::Validation("Missing signature".to_string()))?,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use rsa::pkcs1v15::{Signature as Pkcs1v15Signature, VerifyingKey};
    use rsa::pkcs8::{EncodePrivateKey, EncodePublicKey, LineEnding};
    use rsa::pkcs8::DecodePublicKey;
    use rsa::signature::Verifier;
    use rsa::RsaPublicKey;

    fn generate_test_keypair() -> (String, String) {
        let mut rng = rand::thread_rng();
        let private_key = RsaPrivateKey::new(&mut rng, 1024).expect("key generation should work");
        let public_key = RsaPublicKey::from(&private_key);

        let private_key_pem = private_key
            .to_pkcs8_pem(LineEnding::LF)
            .expect("private key pem")
            .to_string();
        let public_key_pem = public_key
            .to_public_key_pem(LineEnding::LF)
            .expect("public key pem");

        (private_key_pem, public_key_pem)
    }

    fn verify(
        public_key_pem: &str,
        method: &str,
        path_and_query: &str,
        host: &str,
        date: &str,
        signature_b64: &str,
    ) -> bool {
        let public_key = RsaPublicKey::from_public_key_pem(public_key_pem).expect("public key");
        let verifier = VerifyingKey::<Sha256>::new(public_key);
        let signature_bytes = BASE64.decode(signature_b64).expect("signature bytes");
        let signature =
            Pkcs1v15Signature::try_from(signature_bytes.as_slice()).expect("signature format");

        let signing_string = build_signing_string(method, path_and_query, host, date);
        verifier
            .verify(signing_string.as_bytes(), &signature)
            .is_ok()
    }

    #[test]
    fn signed_request_round_trips() {
        let (private_key_pem, public_key_pem) = generate_test_keypair();
        let signed = sign_request(
            "POST",
            "https://remote.example/users/bob/inbox",
            &private_key_pem,
            "https://checkins.example.com/users/alice#main-key",
        )
        .unwrap();

        let parsed = parse_signature_header(&signed.signature).unwrap();
        assert_eq!(
            parsed.key_id,
            "https://checkins.example.com/users/alice#main-key"
        );
        assert_eq!(parsed.algorithm, "rsa-sha256");
        assert_eq!(parsed.headers, vec!["(request-target)", "host", "date"]);

        assert!(verify(
            &public_key_pem,
            "POST",
            "/users/bob/inbox",
            "remote.example",
            &signed.date,
            &parsed.signature,
        ));
    }

    #[test]
    fn tampering_with_any_covered_component_breaks_verification() {
        let (private_key_pem, public_key_pem) = generate_test_keypair();
        let signed = sign_request(
            "POST",
            "https://remote.example/users/bob/inbox",
            &private_key_pem,
            "https://checkins.example.com/users/alice#main-key",
        )
        .unwrap();
        let parsed = parse_signature_header(&signed.signature).unwrap();

        // method
        assert!(!verify(
            &public_key_pem,
            "GET",
            "/users/bob/inbox",
            "remote.example",
            &signed.date,
            &parsed.signature,
        ));
        // path
        assert!(!verify(
            &public_key_pem,
            "POST",
            "/users/carol/inbox",
            "remote.example",
            &signed.date,
            &parsed.signature,
        ));
        // host
        assert!(!verify(
            &public_key_pem,
            "POST",
            "/users/bob/inbox",
            "other.example",
            &signed.date,
            &parsed.signature,
        ));
        // date
        assert!(!verify(
            &public_key_pem,
            "POST",
            "/users/bob/inbox",
            "remote.example",
            "Mon, 01 Jan 2001 00:00:00 GMT",
            &parsed.signature,
        ));
    }

    #[test]
    fn signed_host_includes_non_default_port() {
        let (private_key_pem, public_key_pem) = generate_test_keypair();
        let signed = sign_request(
            "POST",
            "http://remote.example:8080/inbox",
            &private_key_pem,
            "https://checkins.example.com/users/alice#main-key",
        )
        .unwrap();
        let parsed = parse_signature_header(&signed.signature).unwrap();

        // The peer reconstructs the signing string from its Host header,
        // which carries the port.
        assert!(verify(
            &public_key_pem,
            "POST",
            "/inbox",
            "remote.example:8080",
            &signed.date,
            &parsed.signature,
        ));
        assert!(!verify(
            &public_key_pem,
            "POST",
            "/inbox",
            "remote.example",
            &signed.date,
            &parsed.signature,
        ));
    }

    #[test]
    fn sign_request_preserves_query_in_request_target() {
        let (private_key_pem, public_key_pem) = generate_test_keypair();
        let signed = sign_request(
            "GET",
            "https://remote.example/collections/followers?page=2",
            &private_key_pem,
            "https://checkins.example.com/users/alice#main-key",
        )
        .unwrap();
        let parsed = parse_signature_header(&signed.signature).unwrap();

        assert!(verify(
            &public_key_pem,
            "GET",
            "/collections/followers?page=2",
            "remote.example",
            &signed.date,
            &parsed.signature,
        ));
    }

    #[test]
    fn sign_request_rejects_garbage_key() {
        let result = sign_request(
            "POST",
            "https://remote.example/inbox",
            "not a pem",
            "https://checkins.example.com/users/alice#main-key",
        );
        match result {
            Err(AppError::Crypto(msg)) => assert!(msg.contains("Invalid private key")),
            other => panic!("expected crypto error, got: {other:?}"),
        }
    }

    #[test]
    fn sign_request_rejects_malformed_url() {
        let (private_key_pem, _) = generate_test_keypair();
        let result = sign_request(
            "POST",
            "not a url",
            &private_key_pem,
            "https://checkins.example.com/users/alice#main-key",
        );
        assert!(matches!(result, Err(AppError::Validation(_))));
    }
}
