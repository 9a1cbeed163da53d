//! Core connection type

use super::state::ConnectionState;
use super::tls::TrustProfile;
use super::transport::Transport;
use super::value::{decode_text, Location, Value};
use crate::auth::{clear_password, AuthPlugin};
use crate::protocol::constants::{caching_sha2, capabilities, collations, status, MAX_PAYLOAD_LEN};
use crate::protocol::{
    decode_auth_reply, decode_column_definition, decode_command_reply, decode_error,
    decode_handshake, decode_packet, decode_row, encode_message, frame_packet, AuthReply,
    ColumnDefinition, CommandReply, FrontendMessage, Handshake, HandshakeResponse, OkPacket,
    RowPacket, MAX_MESSAGE_LENGTH,
};
use crate::{Error, Result};
use bytes::{Buf, Bytes, BytesMut};
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;
use tracing::Instrument;

/// Capabilities requested from every server
const CLIENT_CAPABILITIES: u32 = capabilities::LONG_PASSWORD
    | capabilities::LONG_FLAG
    | capabilities::PROTOCOL_41
    | capabilities::TRANSACTIONS
    | capabilities::SECURE_CONNECTION
    | capabilities::MULTI_RESULTS
    | capabilities::PLUGIN_AUTH;

/// Where to dial
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Address {
    /// TCP host and port
    Tcp {
        /// Host name or IP literal
        host: String,
        /// Port
        port: u16,
    },
    /// Unix domain socket path
    Unix(PathBuf),
}

impl std::fmt::Display for Address {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Address::Tcp { host, port } if host.contains(':') => write!(f, "[{}]:{}", host, port),
            Address::Tcp { host, port } => write!(f, "{}:{}", host, port),
            Address::Unix(path) => write!(f, "{}", path.display()),
        }
    }
}

/// TLS requirement for a connection
#[derive(Debug, Clone, Default)]
pub enum TlsMode {
    /// Plaintext
    #[default]
    Disabled,
    /// Upgrade when the server supports TLS, otherwise stay in plaintext
    Preferred(Arc<TrustProfile>),
    /// Upgrade or fail
    Required(Arc<TrustProfile>),
}

impl TlsMode {
    fn profile(&self) -> Option<&Arc<TrustProfile>> {
        match self {
            TlsMode::Disabled => None,
            TlsMode::Preferred(p) | TlsMode::Required(p) => Some(p),
        }
    }
}

/// Connection configuration
///
/// Usually produced by [`Descriptor::to_config`](crate::descriptor::Descriptor::to_config).
#[derive(Clone)]
pub struct ConnectionConfig {
    /// Where to dial
    pub address: Address,
    /// Username
    pub user: String,
    /// Password (may be empty)
    pub password: String,
    /// Initial database (may be empty)
    pub database: String,
    /// TLS requirement
    pub tls: TlsMode,
    /// Character sets to try with `SET NAMES`, in order
    pub charsets: Vec<String>,
    /// Collation id sent in the handshake
    pub collation_id: u8,
    /// Collation name added to `SET NAMES`
    pub collation: Option<String>,
    /// Permit `mysql_clear_password` without TLS
    pub allow_cleartext_passwords: bool,
    /// Decode DATE, DATETIME and TIMESTAMP columns as [`Value::DateTime`]
    pub parse_time: bool,
    /// Time zone temporal columns are interpreted in
    pub loc: Location,
    /// Dial timeout
    pub connect_timeout: Option<Duration>,
    /// Session variables set after connecting
    pub system_variables: Vec<(String, String)>,
}

impl ConnectionConfig {
    /// Create new configuration with defaults
    ///
    /// # Defaults
    ///
    /// - `tls`: disabled
    /// - `charsets`: none (the handshake collation decides)
    /// - `collation_id`: utf8mb4_general_ci
    /// - `loc`: UTC
    /// - `connect_timeout`: None
    pub fn new(address: Address, user: impl Into<String>, database: impl Into<String>) -> Self {
        Self {
            address,
            user: user.into(),
            password: String::new(),
            database: database.into(),
            tls: TlsMode::Disabled,
            charsets: Vec::new(),
            collation_id: collations::DEFAULT,
            collation: None,
            allow_cleartext_passwords: false,
            parse_time: false,
            loc: Location::Utc,
            connect_timeout: None,
            system_variables: Vec::new(),
        }
    }

    /// Set password
    pub fn password(mut self, password: impl Into<String>) -> Self {
        self.password = password.into();
        self
    }

    /// Set TLS mode
    pub fn tls(mut self, mode: TlsMode) -> Self {
        self.tls = mode;
        self
    }

    /// Set the character sets to try, in order
    pub fn charsets<I, S>(mut self, charsets: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.charsets = charsets
            .into_iter()
            .map(Into::into)
            .filter(|c: &String| !c.is_empty())
            .collect();
        self
    }

    /// Set the connection collation
    pub fn collation(mut self, name: &str) -> Result<Self> {
        self.collation_id = collations::id(name)
            .ok_or_else(|| Error::Config(format!("unknown collation '{}'", name)))?;
        self.collation = Some(name.to_string());
        Ok(self)
    }

    /// Set dial timeout
    pub fn connect_timeout(mut self, duration: Duration) -> Self {
        self.connect_timeout = Some(duration);
        self
    }

    /// Add a session variable
    pub fn system_variable(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.system_variables.push((name.into(), value.into()));
        self
    }
}

impl std::fmt::Debug for ConnectionConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ConnectionConfig")
            .field("address", &self.address)
            .field("user", &self.user)
            .field("password", &if self.password.is_empty() { "" } else { "***" })
            .field("database", &self.database)
            .field("tls", &self.tls)
            .field("charsets", &self.charsets)
            .field("collation_id", &self.collation_id)
            .field("collation", &self.collation)
            .field("allow_cleartext_passwords", &self.allow_cleartext_passwords)
            .field("parse_time", &self.parse_time)
            .field("loc", &self.loc)
            .field("connect_timeout", &self.connect_timeout)
            .field("system_variables", &self.system_variables)
            .finish()
    }
}

/// Text-protocol result set
#[derive(Debug, Clone, Default)]
pub struct QueryResult {
    /// Column metadata
    pub columns: Vec<ColumnDefinition>,
    /// Decoded rows
    pub rows: Vec<Vec<Value>>,
}

impl QueryResult {
    /// Column names in order
    pub fn column_names(&self) -> Vec<&str> {
        self.columns.iter().map(|c| c.name.as_str()).collect()
    }

    /// Index of a column by name (case-insensitive)
    pub fn column_index(&self, name: &str) -> Option<usize> {
        self.columns
            .iter()
            .position(|c| c.name.eq_ignore_ascii_case(name))
    }

    /// Text values of one column across all rows
    ///
    /// NULL and decoded temporal values come back as `None`; read
    /// [`rows`](Self::rows) for those.
    pub fn column(&self, name: &str) -> Option<Vec<Option<&str>>> {
        let idx = self.column_index(name)?;
        Some(
            self.rows
                .iter()
                .map(|row| row.get(idx).and_then(Value::as_str))
                .collect(),
        )
    }

    /// Whether no rows were returned
    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }
}

/// MySQL protocol connection
pub struct Connection {
    transport: Option<Transport>,
    state: ConnectionState,
    read_buf: BytesMut,
    seq: u8,
    capabilities: u32,
    connection_id: u32,
    server_version: String,
    temporal: Option<Location>,
}

impl std::fmt::Debug for Connection {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Connection")
            .field("state", &self.state)
            .field("connection_id", &self.connection_id)
            .field("server_version", &self.server_version)
            .field("tls", &self.is_tls())
            .finish()
    }
}

impl Connection {
    /// Create connection from transport
    pub fn new(transport: Transport) -> Self {
        Self {
            transport: Some(transport),
            state: ConnectionState::Initial,
            read_buf: BytesMut::with_capacity(8192),
            seq: 0,
            capabilities: 0,
            connection_id: 0,
            server_version: String::new(),
            temporal: None,
        }
    }

    /// Dial `config.address` and run startup
    pub async fn connect(config: &ConnectionConfig) -> Result<Self> {
        async {
            let transport = match &config.address {
                Address::Tcp { host, port } => {
                    Transport::connect_tcp(host, *port, config.connect_timeout).await?
                }
                Address::Unix(path) => {
                    if let TlsMode::Required(_) = config.tls {
                        return Err(Error::Connection(
                            "TLS is only supported for TCP connections".into(),
                        ));
                    }
                    Transport::connect_unix(path, config.connect_timeout).await?
                }
            };
            tracing::debug!("transport connected");

            let mut conn = Connection::new(transport);
            conn.startup(config).await?;
            Ok(conn)
        }
        .instrument(tracing::info_span!(
            "connect",
            address = %config.address,
            user = %config.user,
            database = %config.database
        ))
        .await
    }

    /// Get current connection state
    pub fn state(&self) -> ConnectionState {
        self.state
    }

    /// Server-assigned connection id
    pub fn connection_id(&self) -> u32 {
        self.connection_id
    }

    /// Server version string from the handshake
    pub fn server_version(&self) -> &str {
        &self.server_version
    }

    /// Whether traffic is encrypted
    pub fn is_tls(&self) -> bool {
        self.transport.as_ref().map_or(false, Transport::is_tls)
    }

    /// Perform handshake, authentication and session setup
    pub async fn startup(&mut self, config: &ConnectionConfig) -> Result<()> {
        async {
            self.state.transition(ConnectionState::Handshaking)?;
            self.temporal = config.parse_time.then_some(config.loc);
            let handshake = self.read_handshake().await?;

            if !handshake.supports(capabilities::PROTOCOL_41) {
                return Err(Error::Connection(format!(
                    "server {} does not support protocol 4.1",
                    handshake.server_version
                )));
            }
            self.capabilities = CLIENT_CAPABILITIES & handshake.capabilities;

            self.negotiate_tls(config, &handshake).await?;

            self.state.transition(ConnectionState::Authenticating)?;
            self.authenticate(config, &handshake).await?;
            self.state.transition(ConnectionState::Idle)?;

            tracing::info!(
                server_version = %self.server_version,
                connection_id = self.connection_id,
                tls = self.is_tls(),
                "connection established"
            );

            self.setup_session(config).await
        }
        .instrument(tracing::info_span!("startup", user = %config.user))
        .await
    }

    async fn read_handshake(&mut self) -> Result<Handshake> {
        self.seq = 0;
        let payload = self.read_packet().await?;
        if payload.first() == Some(&crate::protocol::constants::headers::ERR) {
            let err = decode_error(&payload).map_err(protocol_error)?;
            return Err(Error::Connection(format!("server refused connection: {}", err)));
        }

        let handshake = decode_handshake(&payload).map_err(protocol_error)?;
        self.connection_id = handshake.connection_id;
        self.server_version = handshake.server_version.clone();
        tracing::debug!(
            server_version = %handshake.server_version,
            auth_plugin = ?handshake.auth_plugin,
            "received handshake"
        );
        Ok(handshake)
    }

    /// Send the SSL request and upgrade the transport, when the TLS mode asks for it
    async fn negotiate_tls(&mut self, config: &ConnectionConfig, handshake: &Handshake) -> Result<()> {
        let Some(profile) = config.tls.profile() else {
            return Ok(());
        };

        let host = match &config.address {
            Address::Tcp { host, .. } => host.as_str(),
            Address::Unix(_) => {
                // Preferred over a Unix socket: stay in plaintext
                if let TlsMode::Required(_) = config.tls {
                    return Err(Error::Connection(
                        "TLS is only supported for TCP connections".into(),
                    ));
                }
                return Ok(());
            }
        };

        if !handshake.supports(capabilities::SSL) {
            return match config.tls {
                TlsMode::Required(_) => Err(Error::Connection(
                    "server does not support TLS".into(),
                )),
                _ => {
                    tracing::debug!("server lacks TLS support, continuing in plaintext");
                    Ok(())
                }
            };
        }

        self.state.transition(ConnectionState::NegotiatingTls)?;
        self.capabilities |= capabilities::SSL;
        self.write_message(&FrontendMessage::SslRequest {
            capabilities: self.capabilities,
            collation: config.collation_id,
        })
        .await?;

        if !self.read_buf.is_empty() {
            return Err(Error::Protocol(
                "unexpected data from server before TLS handshake".into(),
            ));
        }

        let server_name = profile.server_name_for(host)?;
        tracing::debug!(server_name = ?server_name, "upgrading connection to TLS");

        let transport = self.transport.take().ok_or(Error::ConnectionClosed)?;
        let transport = transport
            .upgrade_to_tls(profile.client_config(), server_name)
            .await?;
        tracing::debug!(version = ?transport.tls_version(), "TLS established");
        self.transport = Some(transport);
        Ok(())
    }

    /// Handle authentication
    async fn authenticate(&mut self, config: &ConnectionConfig, handshake: &Handshake) -> Result<()> {
        let advertised = handshake
            .auth_plugin
            .as_deref()
            .unwrap_or(AuthPlugin::NativePassword.name());
        let mut plugin = AuthPlugin::from_name(advertised).unwrap_or_else(|_| {
            tracing::debug!(plugin = advertised, "unknown default plugin, using native password");
            AuthPlugin::NativePassword
        });
        self.check_cleartext(plugin, config)?;

        let mut nonce = handshake.scramble.clone();
        let response = HandshakeResponse {
            capabilities: self.capabilities,
            collation: config.collation_id,
            user: config.user.clone(),
            auth_response: plugin.respond(&config.password, &nonce),
            database: (!config.database.is_empty()).then(|| config.database.clone()),
            auth_plugin: plugin.name().to_string(),
        };
        self.write_message(&FrontendMessage::HandshakeResponse(response))
            .await?;

        loop {
            let payload = self.read_packet().await?;
            match decode_auth_reply(&payload).map_err(protocol_error)? {
                AuthReply::Ok(_) => {
                    tracing::debug!(plugin = %plugin, "authentication successful");
                    return Ok(());
                }
                AuthReply::Err(err) => {
                    return Err(Error::Authentication(err.to_string()));
                }
                AuthReply::Switch { plugin: name, data } => {
                    plugin = AuthPlugin::from_name(&name)?;
                    self.check_cleartext(plugin, config)?;
                    tracing::debug!(plugin = %plugin, "server requested auth switch");
                    nonce = data;
                    let response = plugin.respond(&config.password, &nonce);
                    self.write_message(&FrontendMessage::AuthData(response))
                        .await?;
                }
                AuthReply::MoreData(data) => {
                    if plugin != AuthPlugin::CachingSha2Password {
                        return Err(Error::Protocol(format!(
                            "unexpected auth continuation for {}",
                            plugin
                        )));
                    }
                    match data.first() {
                        Some(&caching_sha2::FAST_AUTH_SUCCESS) => {
                            tracing::debug!("caching_sha2_password fast path");
                        }
                        Some(&caching_sha2::PERFORM_FULL_AUTH) => {
                            if !self.is_tls() {
                                return Err(Error::Authentication(
                                    "caching_sha2_password full authentication requires TLS"
                                        .into(),
                                ));
                            }
                            tracing::debug!("caching_sha2_password full authentication");
                            let response = clear_password(&config.password);
                            self.write_message(&FrontendMessage::AuthData(response))
                                .await?;
                        }
                        other => {
                            return Err(Error::Protocol(format!(
                                "unexpected caching_sha2_password status: {:?}",
                                other
                            )));
                        }
                    }
                }
            }
        }
    }

    fn check_cleartext(&self, plugin: AuthPlugin, config: &ConnectionConfig) -> Result<()> {
        if plugin == AuthPlugin::ClearPassword
            && !self.is_tls()
            && !config.allow_cleartext_passwords
        {
            return Err(Error::Authentication(
                "mysql_clear_password requires TLS or allowCleartextPasswords=true".into(),
            ));
        }
        Ok(())
    }

    /// `SET NAMES` and session variables
    async fn setup_session(&mut self, config: &ConnectionConfig) -> Result<()> {
        if !config.charsets.is_empty() {
            let mut last_err = None;
            for charset in &config.charsets {
                let stmt = match &config.collation {
                    Some(collation) => format!("SET NAMES {} COLLATE {}", charset, collation),
                    None => format!("SET NAMES {}", charset),
                };
                match self.execute(&stmt).await {
                    Ok(_) => {
                        tracing::debug!(charset = %charset, "character set applied");
                        last_err = None;
                        break;
                    }
                    Err(err @ Error::Server { .. }) => {
                        tracing::debug!(charset = %charset, error = %err, "character set rejected");
                        last_err = Some(err);
                    }
                    Err(err) => return Err(err),
                }
            }
            if let Some(err) = last_err {
                return Err(err);
            }
        }

        for (name, value) in &config.system_variables {
            self.execute(&format!("SET {}={}", name, value)).await?;
        }
        Ok(())
    }

    /// Execute a statement, returning the number of affected rows
    ///
    /// A statement that produces a result set has its rows discarded and
    /// reports zero affected rows.
    pub async fn execute(&mut self, sql: &str) -> Result<u64> {
        let (ok, _) = self.run_command(sql, false).await?;
        Ok(ok.map_or(0, |ok| ok.affected_rows))
    }

    /// Run a query and collect its text result set
    ///
    /// A statement without a result set yields an empty [`QueryResult`].
    pub async fn query(&mut self, sql: &str) -> Result<QueryResult> {
        let (_, result) = self.run_command(sql, true).await?;
        Ok(result)
    }

    /// Check that the server is alive
    pub async fn ping(&mut self) -> Result<()> {
        self.begin_command()?;
        self.write_message(&FrontendMessage::Ping).await?;
        let payload = self.read_packet().await?;
        let reply = decode_command_reply(&payload).map_err(protocol_error)?;
        self.state.transition(ConnectionState::Idle)?;
        match reply {
            CommandReply::Ok(_) => Ok(()),
            CommandReply::Err(err) => Err(err.into()),
            other => Err(Error::Protocol(format!(
                "unexpected reply to ping: {:?}",
                other
            ))),
        }
    }

    fn begin_command(&mut self) -> Result<()> {
        if self.state != ConnectionState::Idle {
            return Err(Error::InvalidState {
                expected: ConnectionState::Idle.to_string(),
                actual: self.state.to_string(),
            });
        }
        self.state.transition(ConnectionState::CommandInProgress)?;
        self.seq = 0;
        Ok(())
    }

    async fn run_command(
        &mut self,
        sql: &str,
        keep_rows: bool,
    ) -> Result<(Option<OkPacket>, QueryResult)> {
        self.begin_command()?;
        tracing::trace!(sql, "query");
        self.write_message(&FrontendMessage::Query(sql.to_string()))
            .await?;

        let mut first_ok = None;
        let mut first_result: Option<QueryResult> = None;
        let mut first_err = None;
        let mut decode_err = None;

        loop {
            let payload = self.read_packet().await?;
            let more = match decode_command_reply(&payload).map_err(protocol_error)? {
                CommandReply::Ok(ok) => {
                    let more = ok.status & status::MORE_RESULTS_EXISTS != 0;
                    first_ok.get_or_insert(ok);
                    more
                }
                CommandReply::Err(err) => {
                    // Terminates the whole multi-statement
                    first_err.get_or_insert(err);
                    false
                }
                CommandReply::ResultSet { column_count } => {
                    match self.read_result_set(column_count, keep_rows).await {
                        Ok((result, more, err)) => {
                            if let Some(err) = err {
                                decode_err.get_or_insert(err);
                            }
                            first_result.get_or_insert(result);
                            more
                        }
                        Err(err @ Error::Server { .. }) => {
                            self.state.transition(ConnectionState::Idle)?;
                            return Err(err);
                        }
                        Err(err) => return Err(err),
                    }
                }
                CommandReply::LocalInfile(file) => {
                    return Err(Error::Protocol(format!(
                        "LOAD DATA LOCAL INFILE '{}' is not supported",
                        file
                    )));
                }
            };
            if !more {
                break;
            }
        }

        self.state.transition(ConnectionState::Idle)?;
        if let Some(err) = first_err {
            return Err(err.into());
        }
        if let Some(err) = decode_err {
            return Err(err);
        }
        Ok((first_ok, first_result.unwrap_or_default()))
    }

    /// Read column definitions and rows
    ///
    /// Returns whether more results follow, and the first value that failed
    /// to decode. The row section is always drained.
    async fn read_result_set(
        &mut self,
        column_count: u64,
        keep_rows: bool,
    ) -> Result<(QueryResult, bool, Option<Error>)> {
        let column_count = usize::try_from(column_count)
            .map_err(|_| Error::Protocol(format!("column count {} too large", column_count)))?;

        let mut columns = Vec::with_capacity(column_count.min(4096));
        for _ in 0..column_count {
            let payload = self.read_packet().await?;
            columns.push(decode_column_definition(&payload).map_err(protocol_error)?);
        }

        // Column section terminator
        let payload = self.read_packet().await?;
        match decode_row(&payload, 0).map_err(protocol_error)? {
            RowPacket::Eof(_) => {}
            RowPacket::Err(err) => return Err(err.into()),
            RowPacket::Row(_) => {
                return Err(Error::Protocol("missing EOF after column definitions".into()))
            }
        }

        let temporal = self.temporal;
        let mut rows = Vec::new();
        let mut decode_err = None;
        loop {
            let payload = self.read_packet().await?;
            match decode_row(&payload, column_count).map_err(protocol_error)? {
                RowPacket::Row(values) => {
                    if !keep_rows || decode_err.is_some() {
                        continue;
                    }
                    let row = values
                        .into_iter()
                        .zip(&columns)
                        .map(|(raw, column)| decode_text(column, raw, temporal))
                        .collect::<Result<Vec<_>>>();
                    match row {
                        Ok(row) => rows.push(row),
                        Err(err) => decode_err = Some(err),
                    }
                }
                RowPacket::Eof(eof) => {
                    let more = eof.status & status::MORE_RESULTS_EXISTS != 0;
                    return Ok((QueryResult { columns, rows }, more, decode_err));
                }
                RowPacket::Err(err) => return Err(err.into()),
            }
        }
    }

    /// Encode, frame and send a message
    async fn write_message(&mut self, msg: &FrontendMessage) -> Result<()> {
        let payload = encode_message(msg)?;
        let mut out = BytesMut::with_capacity(payload.len() + 4);
        frame_packet(&mut out, &payload, &mut self.seq);

        let transport = self.transport.as_mut().ok_or(Error::ConnectionClosed)?;
        transport.write_all(&out).await?;
        transport.flush().await?;
        Ok(())
    }

    /// Read one logical payload, reassembling split packets
    async fn read_packet(&mut self) -> Result<Bytes> {
        let mut assembled: Option<BytesMut> = None;

        loop {
            let packet = loop {
                if let Ok((packet, consumed)) = decode_packet(&self.read_buf) {
                    self.read_buf.advance(consumed);
                    break packet;
                }

                let transport = self.transport.as_mut().ok_or(Error::ConnectionClosed)?;
                let n = transport.read_buf(&mut self.read_buf).await?;
                if n == 0 {
                    return Err(Error::ConnectionClosed);
                }
            };

            if packet.seq != self.seq {
                return Err(Error::Protocol(format!(
                    "packet out of order: expected sequence {}, got {}",
                    self.seq, packet.seq
                )));
            }
            self.seq = self.seq.wrapping_add(1);

            let is_partial = packet.payload.len() == MAX_PAYLOAD_LEN;
            if assembled.is_none() && !is_partial {
                return Ok(packet.payload);
            }

            let buf = assembled.get_or_insert_with(BytesMut::new);
            if buf.len() + packet.payload.len() > MAX_MESSAGE_LENGTH {
                return Err(Error::Protocol(format!(
                    "payload exceeds maximum allowed {} bytes",
                    MAX_MESSAGE_LENGTH
                )));
            }
            buf.extend_from_slice(&packet.payload);

            if !is_partial {
                return Ok(std::mem::take(buf).freeze());
            }
        }
    }

    /// Close the connection
    ///
    /// Sends COM_QUIT and shuts the transport down. Closing twice is a no-op.
    pub async fn close(&mut self) -> Result<()> {
        if self.state == ConnectionState::Closed {
            return Ok(());
        }
        let was_idle = self.state == ConnectionState::Idle;
        self.state.transition(ConnectionState::Closed)?;

        if was_idle {
            self.seq = 0;
            let _ = self.write_message(&FrontendMessage::Quit).await;
        }
        if let Some(mut transport) = self.transport.take() {
            transport.shutdown().await?;
        }
        tracing::debug!("connection closed");
        Ok(())
    }
}

fn protocol_error(err: std::io::Error) -> Error {
    Error::Protocol(err.to_string())
}
