//! Account-level request API over a [`ConnectionManager`].

use std::time::{Duration, Instant};

use gamewire::{Body, DispatchRegistry, Envelope, Registration, opcode};
use log::info;
use serde::Serialize;
use serde_json::Value;

use crate::{
    config::ClientConfig,
    connection::ConnectionManager,
    errors::{ClientError, ClientResult},
};

pub const LOGIN: &str = "login";
pub const REGISTER: &str = "register";
pub const HEARTBEAT: &str = "heartbeat";
pub const LOGOUT: &str = "logout";

#[derive(Serialize)]
struct Credentials<'a> {
    email: &'a str,
    password: &'a str,
}

#[derive(Serialize)]
struct NewAccount<'a> {
    email: &'a str,
    password: &'a str,
    name: &'a str,
}

/// A client session: connection, built-in routes and request helpers.
///
/// Subsystems add their own routes with [`GameSession::route`] and issue
/// requests with [`GameSession::request`].
pub struct GameSession {
    connection: ConnectionManager,
    _routes: Vec<Registration>,
}

impl GameSession {
    pub fn new(config: ClientConfig) -> Self {
        Self::with_registry(config, DispatchRegistry::new())
    }

    pub fn with_registry(config: ClientConfig, registry: DispatchRegistry) -> Self {
        let connection = ConnectionManager::with_registry(config, registry);

        let mut routes = connection.route(
            LOGIN,
            &[opcode::RES_LOGIN_OK],
            &[opcode::ERR_BAD_REQUEST, opcode::ERR_INVALID_USERNAME],
        );
        routes.extend(connection.route(
            REGISTER,
            &[opcode::RES_SUCCESS],
            &[opcode::ERR_BAD_REQUEST, opcode::ERR_INVALID_USERNAME],
        ));
        routes.extend(connection.route(HEARTBEAT, &[opcode::RES_HEARTBEAT_OK], &[]));
        routes.extend(connection.route(LOGOUT, &[opcode::RES_SUCCESS], &[opcode::ERR_NOT_LOGGED_IN]));

        Self {
            connection,
            _routes: routes,
        }
    }

    pub fn connection(&self) -> &ConnectionManager {
        &self.connection
    }

    pub fn registry(&self) -> &DispatchRegistry {
        self.connection.registry()
    }

    pub async fn connect(&self) -> ClientResult<()> {
        self.connection.connect().await
    }

    pub fn close(&self) {
        self.connection.close();
    }

    /// See [`ConnectionManager::route`].
    pub fn route(&self, category: &str, success: &[u16], failure: &[u16]) -> Vec<Registration> {
        self.connection.route(category, success, failure)
    }

    /// See [`ConnectionManager::request`].
    pub async fn request(&self, category: &str, opcode: u16, body: Body) -> ClientResult<Envelope> {
        self.connection.request(category, opcode, body).await
    }

    /// See [`ConnectionManager::request_raw`].
    pub async fn request_raw(&self, opcode: u16, body: Body) -> ClientResult<Envelope> {
        self.connection.request_raw(opcode, body).await
    }

    async fn request_json<T: Serialize>(
        &self,
        category: &str,
        opcode: u16,
        value: &T,
    ) -> ClientResult<Envelope> {
        self.request(category, opcode, Body::json(value)?).await
    }

    /// Log in and remember the returned `session_id` for resumption.
    ///
    /// # Returns
    ///
    /// * `Value` - The server's login response
    pub async fn login(&self, email: &str, password: &str) -> ClientResult<Value> {
        let reply = self
            .request_json(LOGIN, opcode::CMD_LOGIN_REQ, &Credentials { email, password })
            .await?;
        let body = json_body(reply)?;

        if let Some(session_id) = body.get("session_id").and_then(Value::as_str) {
            self.connection
                .set_session_token(Some(session_id.to_string()));
        }
        info!("Logged in as {email}");
        Ok(body)
    }

    pub async fn register(&self, email: &str, password: &str, name: &str) -> ClientResult<Value> {
        let reply = self
            .request_json(
                REGISTER,
                opcode::CMD_REGISTER_REQ,
                &NewAccount {
                    email,
                    password,
                    name,
                },
            )
            .await?;
        json_body(reply)
    }

    /// Round-trip a heartbeat.
    ///
    /// # Returns
    ///
    /// * `Duration` - Time until the server answered
    pub async fn heartbeat(&self) -> ClientResult<Duration> {
        let started = Instant::now();
        self.request(HEARTBEAT, opcode::CMD_HEARTBEAT, Body::Empty)
            .await?;
        Ok(started.elapsed())
    }

    /// Log out and forget the stored session token.
    pub async fn logout(&self) -> ClientResult<()> {
        self.request(LOGOUT, opcode::CMD_LOGOUT_REQ, Body::Empty)
            .await?;
        self.connection.set_session_token(None);
        info!("Logged out");
        Ok(())
    }
}

fn json_body(envelope: Envelope) -> ClientResult<Value> {
    match envelope.body {
        Body::Json(value) => Ok(value),
        Body::Empty => Ok(Value::Null),
        other => Err(ClientError::Payload(format!(
            "expected JSON from {}, got {other:?}",
            opcode::describe(envelope.opcode)
        ))),
    }
}
