//! Connection startup and authentication state machine.

use crate::error::{Error, Result};
use crate::opts::Opts;
use crate::protocol::backend::auth::auth_type_name;
use crate::protocol::backend::{AuthenticationMessage, BackendKeyData, BackendMessage};
use crate::protocol::frontend::auth::{SCRAM_SHA_256, ScramClient, md5_password};
use crate::protocol::frontend::{
    write_password, write_sasl_initial_response, write_sasl_response, write_startup,
};
use crate::protocol::types::TransactionStatus;

use super::action::Action;

/// Connection state during startup.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConnectionState {
    Initial,
    WaitingAuth,
    SaslInProgress,
    SaslFinal,
    WaitingAuthResult,
    WaitingReady,
    Ready,
    Failed,
}

/// Facts the server reports about the session.
#[derive(Debug, Clone, Default)]
pub struct Session {
    /// Process ID and secret key of the backend
    pub backend_key: Option<BackendKeyData>,
    /// ParameterStatus values, in the order first reported
    pub server_params: Vec<(String, String)>,
    /// Status from the latest ReadyForQuery
    pub transaction_status: TransactionStatus,
}

impl Session {
    /// Record a ParameterStatus, replacing an earlier value of the same name.
    pub fn set_param(&mut self, name: &str, value: &str) {
        match self.server_params.iter_mut().find(|(n, _)| n == name) {
            Some(entry) => {
                entry.1.clear();
                entry.1.push_str(value);
            }
            None => self.server_params.push((name.to_string(), value.to_string())),
        }
    }

    /// Look up a server parameter.
    pub fn param(&self, name: &str) -> Option<&str> {
        self.server_params
            .iter()
            .find(|(n, _)| n == name)
            .map(|(_, v)| v.as_str())
    }
}

/// Connection startup state machine.
///
/// Drives `StartupSent -> AuthRequested -> AuthOk -> (K|S)* -> ReadyForQuery`.
/// The SCRAM client exists only between the SASL request and the SASL final
/// message.
pub struct ConnectionStateMachine {
    state: ConnectionState,
    options: Opts,
    session: Session,
    scram_client: Option<ScramClient>,
}

impl ConnectionStateMachine {
    /// Create a new connection state machine.
    pub fn new(options: Opts) -> Self {
        Self {
            state: ConnectionState::Initial,
            options,
            session: Session::default(),
            scram_client: None,
        }
    }

    /// Get the current connection state.
    pub fn state(&self) -> ConnectionState {
        self.state
    }

    /// Session facts collected so far.
    pub fn session(&self) -> &Session {
        &self.session
    }

    /// Consume the state machine, keeping the session facts.
    pub fn into_session(self) -> Session {
        self.session
    }

    /// Write the startup message into `write_buf`.
    pub fn start(&mut self, write_buf: &mut Vec<u8>) -> Action {
        write_buf.clear();
        self.write_startup_message(write_buf);
        self.state = ConnectionState::WaitingAuth;
        Action::WriteAndReadMessage
    }

    /// Process one message from the server.
    ///
    /// Any response to send is written into `write_buf`.
    pub fn step(&mut self, msg: BackendMessage<'_>, write_buf: &mut Vec<u8>) -> Result<Action> {
        let result = self.step_inner(msg, write_buf);
        if result.is_err() {
            self.state = ConnectionState::Failed;
        }
        result
    }

    fn step_inner(&mut self, msg: BackendMessage<'_>, write_buf: &mut Vec<u8>) -> Result<Action> {
        match msg {
            BackendMessage::ErrorResponse(err) => {
                self.scram_client = None;
                Err(Error::Auth(err.0.message().to_string()))
            }
            BackendMessage::NoticeResponse(notice) => {
                tracing::debug!(notice = %notice.0, "notice during startup");
                Ok(Action::ReadMessage)
            }
            BackendMessage::Other(type_byte) => {
                tracing::trace!(type_byte = %(type_byte as char), "skipping message during startup");
                Ok(Action::ReadMessage)
            }
            msg => match self.state {
                ConnectionState::WaitingAuth | ConnectionState::WaitingAuthResult => {
                    self.handle_auth_message(msg, write_buf)
                }
                ConnectionState::SaslInProgress | ConnectionState::SaslFinal => {
                    self.handle_sasl_message(msg, write_buf)
                }
                ConnectionState::WaitingReady => self.handle_ready_message(msg),
                state => Err(Error::Protocol(format!(
                    "Unexpected message in state {:?}: {:?}",
                    state, msg
                ))),
            },
        }
    }

    fn write_startup_message(&self, write_buf: &mut Vec<u8>) {
        let mut params: Vec<(&str, &str)> = vec![("user", &self.options.user)];

        if let Some(db) = &self.options.database {
            params.push(("database", db));
        }

        params.push(("client_encoding", "UTF8"));

        if let Some(app) = &self.options.application_name {
            params.push(("application_name", app));
        }

        for (name, value) in &self.options.params {
            params.push((name, value));
        }

        write_startup(write_buf, &params);
    }

    fn password(&self) -> Result<&str> {
        self.options
            .password
            .as_deref()
            .ok_or_else(|| Error::Auth("password required but not provided".into()))
    }

    fn handle_auth_message(
        &mut self,
        msg: BackendMessage<'_>,
        write_buf: &mut Vec<u8>,
    ) -> Result<Action> {
        let auth = match msg {
            BackendMessage::Authentication(auth) => auth,
            other => {
                return Err(Error::Protocol(format!(
                    "Expected Authentication message, got {:?}",
                    other
                )));
            }
        };

        write_buf.clear();
        match auth {
            AuthenticationMessage::Ok => {
                tracing::debug!("authenticated");
                self.state = ConnectionState::WaitingReady;
                Ok(Action::ReadMessage)
            }
            AuthenticationMessage::CleartextPassword => {
                tracing::debug!("using cleartext password authentication");
                write_password(write_buf, self.password()?);
                self.state = ConnectionState::WaitingAuthResult;
                Ok(Action::WriteAndReadMessage)
            }
            AuthenticationMessage::Md5Password { salt } => {
                tracing::debug!("using md5 password authentication");
                let hashed = md5_password(&self.options.user, self.password()?, &salt);
                write_password(write_buf, &hashed);
                self.state = ConnectionState::WaitingAuthResult;
                Ok(Action::WriteAndReadMessage)
            }
            AuthenticationMessage::Sasl { mechanisms } => {
                if !mechanisms.contains(&SCRAM_SHA_256) {
                    return Err(Error::UnsupportedAuth(format!(
                        "SASL mechanisms {:?} (only {} is supported)",
                        mechanisms, SCRAM_SHA_256
                    )));
                }
                tracing::debug!("using {} authentication", SCRAM_SHA_256);

                let scram = ScramClient::new(self.password()?);
                write_sasl_initial_response(
                    write_buf,
                    SCRAM_SHA_256,
                    scram.client_first_message().as_bytes(),
                );
                self.scram_client = Some(scram);
                self.state = ConnectionState::SaslInProgress;
                Ok(Action::WriteAndReadMessage)
            }
            AuthenticationMessage::Unsupported(code) => Err(Error::UnsupportedAuth(format!(
                "{} (code {})",
                auth_type_name(code),
                code
            ))),
            other => Err(Error::Protocol(format!(
                "Unexpected authentication message in state {:?}: {:?}",
                self.state, other
            ))),
        }
    }

    fn handle_sasl_message(
        &mut self,
        msg: BackendMessage<'_>,
        write_buf: &mut Vec<u8>,
    ) -> Result<Action> {
        let auth = match msg {
            BackendMessage::Authentication(auth) => auth,
            other => {
                return Err(Error::Protocol(format!(
                    "Expected SASL message, got {:?}",
                    other
                )));
            }
        };

        match (self.state, auth) {
            (ConnectionState::SaslInProgress, AuthenticationMessage::SaslContinue { data }) => {
                let scram = self
                    .scram_client
                    .as_mut()
                    .ok_or_else(|| Error::Protocol("SCRAM client not initialized".into()))?;

                let server_first = simdutf8::compat::from_utf8(data)
                    .map_err(|e| Error::Auth(format!("Invalid server-first-message: {}", e)))?;
                let client_final = scram
                    .process_server_first(server_first)
                    .map_err(Error::Auth)?;

                write_buf.clear();
                write_sasl_response(write_buf, client_final.as_bytes());
                self.state = ConnectionState::SaslFinal;
                Ok(Action::WriteAndReadMessage)
            }
            (ConnectionState::SaslFinal, AuthenticationMessage::SaslFinal { data }) => {
                let scram = self
                    .scram_client
                    .take()
                    .ok_or_else(|| Error::Protocol("SCRAM client not initialized".into()))?;

                let server_final = simdutf8::compat::from_utf8(data)
                    .map_err(|e| Error::Auth(format!("Invalid server-final-message: {}", e)))?;
                scram
                    .verify_server_final(server_final)
                    .map_err(Error::Auth)?;

                self.state = ConnectionState::WaitingAuthResult;
                Ok(Action::ReadMessage)
            }
            (state, other) => Err(Error::Auth(format!(
                "Unexpected SASL message in state {:?}: {:?}",
                state, other
            ))),
        }
    }

    fn handle_ready_message(&mut self, msg: BackendMessage<'_>) -> Result<Action> {
        match msg {
            BackendMessage::BackendKeyData(key) => {
                self.session.backend_key = Some(key);
                Ok(Action::ReadMessage)
            }
            BackendMessage::ParameterStatus(param) => {
                self.session.set_param(param.name, param.value);
                Ok(Action::ReadMessage)
            }
            BackendMessage::ReadyForQuery(status) => {
                self.session.transaction_status = status;
                self.state = ConnectionState::Ready;
                tracing::debug!(
                    pid = self.session.backend_key.map(|k| k.process_id()),
                    "connection ready"
                );
                Ok(Action::Finished)
            }
            other => Err(Error::Protocol(format!(
                "Unexpected message during startup: {:?}",
                other
            ))),
        }
    }
}
