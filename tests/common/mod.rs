//! Scripted in-process PostgreSQL backend for integration tests.
//!
//! The backend side of a `tokio::io::duplex` pipe speaks just enough of the
//! protocol to drive the client: it decodes frontend messages, encodes
//! backend messages and plays the server side of SCRAM-SHA-256 on its own,
//! without sharing code with the client.

#![allow(dead_code)]

use std::io;
use std::pin::Pin;
use std::task::{Context, Poll};

use base64::Engine;
use base64::engine::general_purpose::STANDARD as BASE64;
use hmac::{Hmac, Mac};
use sha2::{Digest, Sha256};
use tokio::io::{AsyncRead, AsyncReadExt, AsyncWrite, AsyncWriteExt, DuplexStream, ReadBuf};
use wire_postgres::Opts;
use wire_postgres::tokio::Conn;

pub const PIPE_CAPACITY: usize = 1 << 20;

pub const SCRAM_SALT: &[u8] = b"salty-salt-salt!";
pub const SCRAM_ITERATIONS: u32 = 4096;
pub const SERVER_NONCE_SUFFIX: &str = "3rfcNHYJY1ZVvWVs7j";

/// Client end and scripted backend of an in-memory connection.
pub fn pair() -> (DuplexStream, Backend) {
    let (client, server) = tokio::io::duplex(PIPE_CAPACITY);
    (client, Backend { io: server })
}

pub fn opts(password: Option<&str>) -> Opts {
    Opts {
        host: "mock".into(),
        user: "u".into(),
        database: Some("db".into()),
        password: password.map(Into::into),
        ..Default::default()
    }
}

/// Run the handshake against a backend that accepts without a password.
pub async fn connect_trust() -> (Conn<DuplexStream>, Backend) {
    let (client, backend) = pair();
    connect_with(client, backend, opts(None), |mut backend| async move {
        backend.accept_trust().await;
        backend
    })
    .await
}

/// Run the handshake over `stream` while `script` drives the backend.
pub async fn connect_with<S, F, Fut>(
    stream: S,
    backend: Backend,
    opts: Opts,
    script: F,
) -> (Conn<S>, Backend)
where
    S: AsyncRead + AsyncWrite + Unpin,
    F: FnOnce(Backend) -> Fut,
    Fut: Future<Output = Backend> + Send + 'static,
{
    let server = tokio::spawn(script(backend));
    let conn = Conn::connect_with_stream(stream, opts)
        .await
        .expect("handshake failed");
    let backend = server.await.expect("backend task panicked");
    (conn, backend)
}

pub struct Backend {
    io: DuplexStream,
}

impl Backend {
    /// Read the untyped startup message and return its parameters.
    pub async fn read_startup(&mut self) -> Vec<(String, String)> {
        let len = self.io.read_i32().await.unwrap() as usize;
        let mut body = vec![0; len - 4];
        self.io.read_exact(&mut body).await.unwrap();
        assert_eq!(body[..4], 196608i32.to_be_bytes());

        let mut params = Vec::new();
        let mut rest = &body[4..];
        while rest[0] != 0 {
            let (key, r) = cstr(rest);
            let (value, r) = cstr(r);
            params.push((key, value));
            rest = r;
        }
        assert_eq!(rest, [0]);
        params
    }

    /// Read one typed frontend message.
    pub async fn read_message(&mut self) -> (u8, Vec<u8>) {
        let type_byte = self.io.read_u8().await.unwrap();
        let len = self.io.read_i32().await.unwrap();
        assert!(len >= 4, "bad frontend length {len}");
        let mut payload = vec![0; len as usize - 4];
        self.io.read_exact(&mut payload).await.unwrap();
        (type_byte, payload)
    }

    /// Read a Query message and return its SQL text.
    pub async fn expect_query(&mut self) -> String {
        let (type_byte, payload) = self.read_message().await;
        assert_eq!(type_byte, b'Q');
        let (sql, rest) = cstr(&payload);
        assert!(rest.is_empty());
        sql
    }

    /// Read a PasswordMessage and return the password text.
    pub async fn expect_password(&mut self) -> String {
        let (type_byte, payload) = self.read_message().await;
        assert_eq!(type_byte, b'p');
        cstr(&payload).0
    }

    pub async fn send(&mut self, messages: &[Vec<u8>]) {
        self.io.write_all(&messages.concat()).await.unwrap();
        self.io.flush().await.unwrap();
    }

    /// True once the client has closed its end.
    pub async fn at_eof(&mut self) -> bool {
        let mut byte = [0u8; 1];
        self.io.read(&mut byte).await.unwrap() == 0
    }

    /// AuthenticationOk followed by the usual chatter and ReadyForQuery.
    pub async fn finish_startup(&mut self) {
        self.send(&[
            authentication(0, &[]),
            parameter_status("server_version", "16.2"),
            parameter_status("client_encoding", "UTF8"),
            backend_key_data(4242, 99),
            ready_for_query(b'I'),
        ])
        .await;
    }

    pub async fn accept_trust(&mut self) -> Vec<(String, String)> {
        let params = self.read_startup().await;
        self.finish_startup().await;
        params
    }

    /// Full SCRAM-SHA-256 handshake that expects `password`.
    pub async fn accept_scram(&mut self, password: &str) {
        self.read_startup().await;
        let exchange = self.scram_exchange(password).await;
        assert!(exchange.proof_ok, "client proof rejected");
        self.send(&[authentication(
            12,
            format!("v={}", exchange.server_signature).as_bytes(),
        )])
        .await;
        self.finish_startup().await;
    }

    /// Offer SCRAM-SHA-256, answer the client-first message and check the
    /// client proof. The final server message is left to the caller.
    pub async fn scram_exchange(&mut self, password: &str) -> ScramExchange {
        self.send(&[authentication(10, b"SCRAM-SHA-256\0\0")]).await;

        let (type_byte, payload) = self.read_message().await;
        assert_eq!(type_byte, b'p');
        let (mechanism, rest) = cstr(&payload);
        assert_eq!(mechanism, "SCRAM-SHA-256");
        let len = i32::from_be_bytes(rest[..4].try_into().unwrap()) as usize;
        let client_first = std::str::from_utf8(&rest[4..4 + len]).unwrap().to_string();
        let client_first_bare = client_first
            .strip_prefix("n,,")
            .expect("gs2 header")
            .to_string();
        let client_nonce = client_first_bare
            .strip_prefix("n=,r=")
            .expect("client nonce")
            .to_string();

        let nonce = format!("{client_nonce}{SERVER_NONCE_SUFFIX}");
        let server_first = format!(
            "r={},s={},i={}",
            nonce,
            BASE64.encode(SCRAM_SALT),
            SCRAM_ITERATIONS
        );
        self.send(&[authentication(11, server_first.as_bytes())]).await;

        let (type_byte, payload) = self.read_message().await;
        assert_eq!(type_byte, b'p');
        let client_final = String::from_utf8(payload).unwrap();
        let (without_proof, proof) = client_final.split_once(",p=").expect("client proof");
        assert_eq!(without_proof, format!("c=biws,r={nonce}"));

        let mut salted = [0u8; 32];
        pbkdf2::pbkdf2_hmac::<Sha256>(password.as_bytes(), SCRAM_SALT, SCRAM_ITERATIONS, &mut salted);
        let auth_message = format!("{client_first_bare},{server_first},{without_proof}");

        let client_key = hmac(&salted, b"Client Key");
        let stored_key = Sha256::digest(&client_key);
        let client_signature = hmac(&stored_key, auth_message.as_bytes());
        let expected: Vec<u8> = client_key
            .iter()
            .zip(&client_signature)
            .map(|(a, b)| a ^ b)
            .collect();

        let server_key = hmac(&salted, b"Server Key");
        let server_signature = hmac(&server_key, auth_message.as_bytes());

        ScramExchange {
            proof_ok: BASE64.decode(proof).unwrap() == expected,
            server_signature: BASE64.encode(server_signature),
        }
    }
}

pub struct ScramExchange {
    pub proof_ok: bool,
    pub server_signature: String,
}

fn hmac(key: &[u8], data: &[u8]) -> Vec<u8> {
    let mut mac = Hmac::<Sha256>::new_from_slice(key).unwrap();
    mac.update(data);
    mac.finalize().into_bytes().to_vec()
}

pub fn cstr(data: &[u8]) -> (String, &[u8]) {
    let end = data.iter().position(|b| *b == 0).expect("nul terminator");
    (
        String::from_utf8(data[..end].to_vec()).unwrap(),
        &data[end + 1..],
    )
}

// === Backend message encoders ===

pub fn message(type_byte: u8, payload: &[u8]) -> Vec<u8> {
    let mut out = vec![type_byte];
    out.extend_from_slice(&(payload.len() as i32 + 4).to_be_bytes());
    out.extend_from_slice(payload);
    out
}

pub fn authentication(code: i32, extra: &[u8]) -> Vec<u8> {
    let mut payload = code.to_be_bytes().to_vec();
    payload.extend_from_slice(extra);
    message(b'R', &payload)
}

pub fn parameter_status(name: &str, value: &str) -> Vec<u8> {
    message(b'S', format!("{name}\0{value}\0").as_bytes())
}

pub fn backend_key_data(pid: u32, secret: u32) -> Vec<u8> {
    let mut payload = pid.to_be_bytes().to_vec();
    payload.extend_from_slice(&secret.to_be_bytes());
    message(b'K', &payload)
}

pub fn ready_for_query(status: u8) -> Vec<u8> {
    message(b'Z', &[status])
}

pub fn row_description(columns: &[(&str, u32)]) -> Vec<u8> {
    let mut payload = (columns.len() as u16).to_be_bytes().to_vec();
    for (name, type_oid) in columns {
        payload.extend_from_slice(name.as_bytes());
        payload.push(0);
        payload.extend_from_slice(&0u32.to_be_bytes()); // table oid
        payload.extend_from_slice(&0i16.to_be_bytes()); // column id
        payload.extend_from_slice(&type_oid.to_be_bytes());
        payload.extend_from_slice(&(-1i16).to_be_bytes()); // type size
        payload.extend_from_slice(&(-1i32).to_be_bytes()); // type modifier
        payload.extend_from_slice(&0u16.to_be_bytes()); // text format
    }
    message(b'T', &payload)
}

pub fn data_row(values: &[Option<&str>]) -> Vec<u8> {
    let mut payload = (values.len() as u16).to_be_bytes().to_vec();
    for value in values {
        match value {
            Some(v) => {
                payload.extend_from_slice(&(v.len() as i32).to_be_bytes());
                payload.extend_from_slice(v.as_bytes());
            }
            None => payload.extend_from_slice(&(-1i32).to_be_bytes()),
        }
    }
    message(b'D', &payload)
}

pub fn command_complete(tag: &str) -> Vec<u8> {
    message(b'C', format!("{tag}\0").as_bytes())
}

pub fn empty_query_response() -> Vec<u8> {
    message(b'I', &[])
}

pub fn error_response(severity: &str, code: &str, text: &str) -> Vec<u8> {
    message(
        b'E',
        format!("S{severity}\0V{severity}\0C{code}\0M{text}\0\0").as_bytes(),
    )
}

pub fn notice_response(text: &str) -> Vec<u8> {
    message(b'N', format!("SNOTICE\0VNOTICE\0C00000\0M{text}\0\0").as_bytes())
}

/// Stream wrapper that hands out one byte per read and reports `Pending`
/// on every other poll.
pub struct Trickle<S> {
    inner: S,
    ready: bool,
}

impl<S> Trickle<S> {
    pub fn new(inner: S) -> Self {
        Self {
            inner,
            ready: false,
        }
    }
}

impl<S: AsyncRead + Unpin> AsyncRead for Trickle<S> {
    fn poll_read(
        self: Pin<&mut Self>,
        cx: &mut Context<'_>,
        buf: &mut ReadBuf<'_>,
    ) -> Poll<io::Result<()>> {
        let this = self.get_mut();
        if !this.ready {
            this.ready = true;
            cx.waker().wake_by_ref();
            return Poll::Pending;
        }
        if buf.remaining() == 0 {
            return Poll::Ready(Ok(()));
        }

        let mut one = [0u8; 1];
        let mut small = ReadBuf::new(&mut one);
        match Pin::new(&mut this.inner).poll_read(cx, &mut small) {
            Poll::Ready(Ok(())) => {
                this.ready = false;
                buf.put_slice(small.filled());
                Poll::Ready(Ok(()))
            }
            other => other,
        }
    }
}

impl<S: AsyncWrite + Unpin> AsyncWrite for Trickle<S> {
    fn poll_write(
        self: Pin<&mut Self>,
        cx: &mut Context<'_>,
        buf: &[u8],
    ) -> Poll<io::Result<usize>> {
        Pin::new(&mut self.get_mut().inner).poll_write(cx, buf)
    }

    fn poll_flush(self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<io::Result<()>> {
        Pin::new(&mut self.get_mut().inner).poll_flush(cx)
    }

    fn poll_shutdown(self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<io::Result<()>> {
        Pin::new(&mut self.get_mut().inner).poll_shutdown(cx)
    }
}
