//! Authentication messages.

use base64::Engine;
use base64::engine::general_purpose::STANDARD as BASE64;
use hmac::{Hmac, Mac};
use sha2::{Digest, Sha256};

use crate::protocol::codec::MessageBuilder;

/// SASL mechanism name for SCRAM-SHA-256.
pub const SCRAM_SHA_256: &str = "SCRAM-SHA-256";

/// Client nonce length in raw bytes (before base64).
const NONCE_LEN: usize = 18;

/// GS2 header: no channel binding, no authzid.
const GS2_HEADER: &str = "n,,";

/// base64("n,,")
const CHANNEL_BINDING: &str = "biws";

/// Write a PasswordMessage (cleartext or MD5 hashed password).
pub fn write_password(buf: &mut Vec<u8>, password: &str) {
    let mut msg = MessageBuilder::new(buf, super::msg_type::PASSWORD);
    msg.write_cstr(password);
    msg.finish();
}

/// Compute MD5 password hash.
///
/// PostgreSQL MD5 password format: "md5" + md5(md5(password + username) + salt)
pub fn md5_password(username: &str, password: &str, salt: &[u8; 4]) -> String {
    use md5::Md5;

    // First hash: md5(password + username)
    let mut hasher = Md5::new();
    hasher.update(password.as_bytes());
    hasher.update(username.as_bytes());
    let first_hash_hex = format!("{:x}", hasher.finalize());

    // Second hash: md5(first_hash_hex + salt)
    let mut hasher = Md5::new();
    hasher.update(first_hash_hex.as_bytes());
    hasher.update(salt);

    format!("md5{:x}", hasher.finalize())
}

/// Write a SASLInitialResponse message.
///
/// mechanism: SASL mechanism name (e.g., "SCRAM-SHA-256")
/// initial_response: Client-first-message for SCRAM
pub fn write_sasl_initial_response(buf: &mut Vec<u8>, mechanism: &str, initial_response: &[u8]) {
    let mut msg = MessageBuilder::new(buf, super::msg_type::PASSWORD);
    msg.write_cstr(mechanism);
    msg.write_i32(initial_response.len() as i32);
    msg.write_bytes(initial_response);
    msg.finish();
}

/// Write a SASLResponse message.
///
/// response: Client-final-message for SCRAM
pub fn write_sasl_response(buf: &mut Vec<u8>, response: &[u8]) {
    let mut msg = MessageBuilder::new(buf, super::msg_type::PASSWORD);
    msg.write_bytes(response);
    msg.finish();
}

fn hmac_sha256(key: &[u8], data: &[u8]) -> Result<[u8; 32], String> {
    let mut mac = <Hmac<Sha256> as Mac>::new_from_slice(key)
        .map_err(|e| format!("HMAC error: {}", e))?;
    mac.update(data);
    let mut out = [0u8; 32];
    out.copy_from_slice(&mac.finalize().into_bytes());
    Ok(out)
}

/// SCRAM-SHA-256 client (RFC 5802 / RFC 7677), without channel binding.
///
/// Lives only for the duration of the handshake.
pub struct ScramClient {
    /// Username sent in client-first-message (PostgreSQL ignores it and sends "")
    username: String,
    /// Base64-encoded client nonce
    nonce: String,
    password: String,
    /// Auth message, kept for server signature verification
    auth_message: Option<String>,
    /// Salted password, kept for server signature verification
    salted_password: Option<[u8; 32]>,
}

impl ScramClient {
    /// Create a new SCRAM client with a random 18-byte nonce.
    pub fn new(password: &str) -> Self {
        use rand::RngCore;

        let mut nonce_bytes = [0u8; NONCE_LEN];
        rand::rng().fill_bytes(&mut nonce_bytes);
        Self::with_nonce("", password, &BASE64.encode(nonce_bytes))
    }

    /// Create a SCRAM client with a fixed username and nonce.
    pub fn with_nonce(username: &str, password: &str, nonce: &str) -> Self {
        Self {
            username: username.to_string(),
            nonce: nonce.to_string(),
            password: password.to_string(),
            auth_message: None,
            salted_password: None,
        }
    }

    /// Client nonce (base64).
    pub fn nonce(&self) -> &str {
        &self.nonce
    }

    /// Generate the client-first-message: `n,,n=<user>,r=<nonce>`.
    pub fn client_first_message(&self) -> String {
        format!("{}{}", GS2_HEADER, self.client_first_message_bare())
    }

    /// The bare client-first-message (without GS2 header).
    fn client_first_message_bare(&self) -> String {
        format!("n={},r={}", self.username, self.nonce)
    }

    /// Process server-first-message and generate client-final-message.
    pub fn process_server_first(&mut self, server_first: &str) -> Result<String, String> {
        // Parse server-first-message: r=<nonce>,s=<salt>,i=<iterations>
        let mut combined_nonce = None;
        let mut salt_b64 = None;
        let mut iterations = None;

        for part in server_first.split(',') {
            if let Some(value) = part.strip_prefix("r=") {
                combined_nonce = Some(value);
            } else if let Some(value) = part.strip_prefix("s=") {
                salt_b64 = Some(value);
            } else if let Some(value) = part.strip_prefix("i=") {
                iterations = value.parse::<u32>().ok();
            } else if let Some(value) = part.strip_prefix("e=") {
                return Err(format!("Server error: {}", value));
            }
        }

        let combined_nonce = combined_nonce.ok_or("Missing nonce in server-first-message")?;
        let salt_b64 = salt_b64.ok_or("Missing salt in server-first-message")?;
        let iterations = iterations.ok_or("Missing iterations in server-first-message")?;

        if !combined_nonce.starts_with(&self.nonce) {
            return Err("Server nonce doesn't start with client nonce".to_string());
        }
        if iterations == 0 {
            return Err("Invalid iteration count 0".to_string());
        }

        let salt = BASE64
            .decode(salt_b64)
            .map_err(|e| format!("Invalid salt: {}", e))?;

        // SaltedPassword = Hi(password, salt, iterations)
        let mut salted_password = [0u8; 32];
        pbkdf2::pbkdf2_hmac::<Sha256>(
            self.password.as_bytes(),
            &salt,
            iterations,
            &mut salted_password,
        );

        // ClientKey = HMAC(SaltedPassword, "Client Key")
        let client_key = hmac_sha256(&salted_password, b"Client Key")?;

        // StoredKey = H(ClientKey)
        let stored_key = Sha256::digest(client_key);

        let client_final_without_proof = format!("c={},r={}", CHANNEL_BINDING, combined_nonce);

        let auth_message = format!(
            "{},{},{}",
            self.client_first_message_bare(),
            server_first,
            client_final_without_proof
        );

        // ClientSignature = HMAC(StoredKey, AuthMessage)
        let client_signature = hmac_sha256(&stored_key, auth_message.as_bytes())?;

        // ClientProof = ClientKey XOR ClientSignature
        let mut client_proof = [0u8; 32];
        for ((proof, key), sig) in client_proof
            .iter_mut()
            .zip(client_key.iter())
            .zip(client_signature.iter())
        {
            *proof = key ^ sig;
        }

        self.salted_password = Some(salted_password);
        self.auth_message = Some(auth_message);

        Ok(format!(
            "{},p={}",
            client_final_without_proof,
            BASE64.encode(client_proof)
        ))
    }

    /// Verify server-final-message (`v=<signature>` or `e=<error>`).
    pub fn verify_server_final(&self, server_final: &str) -> Result<(), String> {
        if let Some(error) = server_final.strip_prefix("e=") {
            return Err(format!("Server error: {}", error));
        }

        let server_signature_b64 = server_final
            .split(',')
            .find_map(|part| part.strip_prefix("v="))
            .ok_or("Invalid server-final-message format")?;

        let server_signature = BASE64
            .decode(server_signature_b64)
            .map_err(|e| format!("Invalid server signature: {}", e))?;

        let salted_password = self
            .salted_password
            .as_ref()
            .ok_or("Missing salted password")?;
        let auth_message = self.auth_message.as_ref().ok_or("Missing auth message")?;

        // ServerSignature = HMAC(HMAC(SaltedPassword, "Server Key"), AuthMessage)
        let server_key = hmac_sha256(salted_password, b"Server Key")?;
        let expected_signature = hmac_sha256(&server_key, auth_message.as_bytes())?;

        if server_signature.as_slice() != expected_signature.as_slice() {
            return Err("Server signature verification failed".to_string());
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn md5_password_fixture() {
        let result = md5_password("u", "pw", &[1, 2, 3, 4]);
        assert_eq!(result, "md50803a98a0618b75c8f9a50f280cad373");
        assert_eq!(result.len(), 35);
        assert!(result[3..].bytes().all(|b| b.is_ascii_hexdigit() && !b.is_ascii_uppercase()));
    }

    #[test]
    fn password_message_layout() {
        let mut buf = Vec::new();
        write_password(&mut buf, "secret");

        assert_eq!(buf[0], b'p');
        assert_eq!(&buf[1..5], &11_i32.to_be_bytes());
        assert_eq!(&buf[5..], b"secret\0");
    }

    #[test]
    fn sasl_initial_response_layout() {
        let mut buf = Vec::new();
        write_sasl_initial_response(&mut buf, SCRAM_SHA_256, b"n,,n=,r=abc");

        assert_eq!(buf[0], b'p');
        let body = &buf[5..];
        assert_eq!(&body[..14], b"SCRAM-SHA-256\0");
        assert_eq!(&body[14..18], &11_i32.to_be_bytes());
        assert_eq!(&body[18..], b"n,,n=,r=abc");
    }

    #[test]
    fn random_nonce_is_18_bytes_base64() {
        let client = ScramClient::new("pw");
        assert_eq!(client.nonce().len(), 24);
        assert_eq!(BASE64.decode(client.nonce()).unwrap().len(), NONCE_LEN);
        assert!(client.client_first_message().starts_with("n,,n=,r="));
    }

    // RFC 7677 section 3
    #[test]
    fn rfc7677_exchange() {
        let mut client = ScramClient::with_nonce("user", "pencil", "rOprNGfwEbeRWgbNEkqO");
        assert_eq!(
            client.client_first_message(),
            "n,,n=user,r=rOprNGfwEbeRWgbNEkqO"
        );

        let client_final = client
            .process_server_first(
                "r=rOprNGfwEbeRWgbNEkqO%hvYDpWUa2RaTCAfuxFIlj)hNlF$k0,s=W22ZaJ0SNY7soEsUEjb6gQ==,i=4096",
            )
            .unwrap();
        assert_eq!(
            client_final,
            "c=biws,r=rOprNGfwEbeRWgbNEkqO%hvYDpWUa2RaTCAfuxFIlj)hNlF$k0,p=dHzbZapWIk4jUhN+Ute9ytag9zjfMHgsqmmiz7AndVQ="
        );

        client
            .verify_server_final("v=6rriTRBi23WpRR/wtup+mMhUZUn/dB5nLTJRsjl95G4=")
            .unwrap();
    }

    #[test]
    fn proof_with_empty_username_is_deterministic() {
        let server_first = "r=AAECAwQFBgcICQoLDA0ODxARserverpart,s=c2FsdHlzYWx0,i=4096";
        let expected = "c=biws,r=AAECAwQFBgcICQoLDA0ODxARserverpart,p=P8IKFGYJC8k4P9QPy7kCBZsX+QYKdtGPmGH7nYfKQwY=";

        for _ in 0..2 {
            let mut client = ScramClient::with_nonce("", "secret", "AAECAwQFBgcICQoLDA0ODxAR");
            assert_eq!(client.process_server_first(server_first).unwrap(), expected);
            client
                .verify_server_final("v=OSppN12HLrLA6hiCA/ULnt43ecOjDDoSVepgFmBWqP4=")
                .unwrap();
        }
    }

    #[test]
    fn rejects_foreign_nonce_and_bad_signature() {
        let mut client = ScramClient::with_nonce("", "secret", "AAECAwQFBgcICQoLDA0ODxAR");
        assert!(
            client
                .process_server_first("r=somethingelse,s=c2FsdHlzYWx0,i=4096")
                .is_err()
        );

        client
            .process_server_first("r=AAECAwQFBgcICQoLDA0ODxARserverpart,s=c2FsdHlzYWx0,i=4096")
            .unwrap();
        assert!(client.verify_server_final("v=AAAA").is_err());
        assert!(client.verify_server_final("e=invalid-proof").is_err());
    }
}
