//! In-process MySQL protocol server for integration tests
//!
//! Speaks just enough of the protocol to drive a client through handshake,
//! optional TLS upgrade, `mysql_native_password` authentication, and the
//! statements issued by session setup and schema reconciliation. Catalog
//! queries are answered from an in-memory table map that DDL statements
//! update. `SELECT NOW()` returns a fixed DATETIME.

#![allow(dead_code)]

use std::collections::HashMap;
use std::net::SocketAddr;
use std::sync::{Arc, Mutex};
use tidb_bootstrap::auth::scramble_native;
use tidb_bootstrap::protocol::constants::column_types::DATETIME;
use tidb_bootstrap::protocol::constants::{capabilities, commands};
use tokio::io::{AsyncRead, AsyncReadExt, AsyncWrite, AsyncWriteExt};
use tokio::net::TcpListener;
use tokio::task::JoinHandle;
use tokio_rustls::rustls::ServerConfig;
use tokio_rustls::TlsAcceptor;

pub const SERVER_VERSION: &str = "8.0.11-TiDB-v7.5.0";
pub const CONNECTION_ID: u32 = 42;
/// Value returned for `SELECT NOW()`
pub const NOW: &str = "2024-03-01 12:30:45";
pub const SCRAMBLE: [u8; 20] = [
    1, 2, 3, 4, 5, 6, 7, 8, 9, 10, 11, 12, 13, 14, 15, 16, 17, 18, 19, 20,
];

const VAR_STRING: u8 = 0xFD;

const SERVER_CAPABILITIES: u32 = capabilities::LONG_PASSWORD
    | capabilities::LONG_FLAG
    | capabilities::CONNECT_WITH_DB
    | capabilities::PROTOCOL_41
    | capabilities::TRANSACTIONS
    | capabilities::SECURE_CONNECTION
    | capabilities::MULTI_RESULTS
    | capabilities::PLUGIN_AUTH;

pub fn fixture(name: &str) -> String {
    format!("{}/tests/fixtures/{}", env!("CARGO_MANIFEST_DIR"), name)
}

/// TLS acceptor presenting the fixture certificate (CN=localhost)
pub fn tls_acceptor() -> TlsAcceptor {
    let cert_pem = std::fs::read(fixture("server.pem")).unwrap();
    let key_pem = std::fs::read(fixture("server-key.pem")).unwrap();

    let certs = rustls_pemfile::certs(&mut cert_pem.as_slice())
        .collect::<Result<Vec<_>, _>>()
        .unwrap();
    let key = rustls_pemfile::private_key(&mut key_pem.as_slice())
        .unwrap()
        .unwrap();

    let config = ServerConfig::builder()
        .with_no_client_auth()
        .with_single_cert(certs, key)
        .unwrap();
    TlsAcceptor::from(Arc::new(config))
}

/// Table columns and index names, in creation order
#[derive(Debug, Clone, Default)]
pub struct FakeTable {
    pub columns: Vec<String>,
    pub indexes: Vec<String>,
}

/// What the server saw
#[derive(Debug, Default)]
pub struct ServerLog {
    pub user: Option<String>,
    pub database: Option<String>,
    pub auth_plugin: Option<String>,
    pub tls: bool,
    pub queries: Vec<String>,
    pub pings: usize,
    pub quit: bool,
}

#[derive(Debug, Default)]
struct Shared {
    tables: HashMap<String, FakeTable>,
    log: ServerLog,
}

pub struct FakeServerBuilder {
    password: String,
    tls: Option<TlsAcceptor>,
    reject_charsets: Vec<String>,
    read_only: bool,
    tables: HashMap<String, FakeTable>,
}

impl FakeServerBuilder {
    pub fn password(mut self, password: &str) -> Self {
        self.password = password.to_string();
        self
    }

    pub fn tls(mut self, acceptor: TlsAcceptor) -> Self {
        self.tls = Some(acceptor);
        self
    }

    /// Answer `SET NAMES <charset>` with an unknown-charset error
    pub fn reject_charset(mut self, charset: &str) -> Self {
        self.reject_charsets.push(charset.to_string());
        self
    }

    /// Deny every DDL statement
    pub fn read_only(mut self) -> Self {
        self.read_only = true;
        self
    }

    pub fn table(mut self, name: &str, columns: &[&str], indexes: &[&str]) -> Self {
        self.tables.insert(
            name.to_string(),
            FakeTable {
                columns: columns.iter().map(|c| c.to_string()).collect(),
                indexes: indexes.iter().map(|i| i.to_string()).collect(),
            },
        );
        self
    }

    /// Bind and serve connections until the server is dropped
    pub async fn start(self) -> FakeServer {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        let shared = Arc::new(Mutex::new(Shared {
            tables: self.tables,
            log: ServerLog::default(),
        }));

        let options = Arc::new(Options {
            password: self.password,
            tls: self.tls,
            reject_charsets: self.reject_charsets,
            read_only: self.read_only,
        });
        let state = shared.clone();
        let task = tokio::spawn(async move {
            while let Ok((socket, _)) = listener.accept().await {
                let options = options.clone();
                let state = state.clone();
                tokio::spawn(async move {
                    let _ = serve(Box::new(socket), &options, &state).await;
                });
            }
        });

        FakeServer { addr, shared, task }
    }
}

struct Options {
    password: String,
    tls: Option<TlsAcceptor>,
    reject_charsets: Vec<String>,
    read_only: bool,
}

pub struct FakeServer {
    pub addr: SocketAddr,
    shared: Arc<Mutex<Shared>>,
    task: JoinHandle<()>,
}

impl FakeServer {
    pub fn builder() -> FakeServerBuilder {
        FakeServerBuilder {
            password: String::new(),
            tls: None,
            reject_charsets: Vec::new(),
            read_only: false,
            tables: HashMap::new(),
        }
    }

    pub fn port(&self) -> u16 {
        self.addr.port()
    }

    /// Run `f` against the server log
    pub fn log<T>(&self, f: impl FnOnce(&ServerLog) -> T) -> T {
        f(&self.shared.lock().unwrap().log)
    }

    pub fn table(&self, name: &str) -> Option<FakeTable> {
        self.shared.lock().unwrap().tables.get(name).cloned()
    }
}

impl Drop for FakeServer {
    fn drop(&mut self) {
        self.task.abort();
    }
}

trait Stream: AsyncRead + AsyncWrite + Unpin + Send {}
impl<T: AsyncRead + AsyncWrite + Unpin + Send> Stream for T {}

type BoxStream = Box<dyn Stream>;

async fn read_packet(stream: &mut BoxStream) -> std::io::Result<(u8, Vec<u8>)> {
    let mut header = [0u8; 4];
    stream.read_exact(&mut header).await?;
    let len = u32::from_le_bytes([header[0], header[1], header[2], 0]) as usize;
    let mut payload = vec![0u8; len];
    stream.read_exact(&mut payload).await?;
    Ok((header[3], payload))
}

async fn write_packet(stream: &mut BoxStream, seq: u8, payload: &[u8]) -> std::io::Result<()> {
    let len = (payload.len() as u32).to_le_bytes();
    let mut out = vec![len[0], len[1], len[2], seq];
    out.extend_from_slice(payload);
    stream.write_all(&out).await?;
    stream.flush().await
}

fn lenenc_int(out: &mut Vec<u8>, n: u64) {
    match n {
        0..=250 => out.push(n as u8),
        251..=0xFFFF => {
            out.push(0xFC);
            out.extend_from_slice(&(n as u16).to_le_bytes());
        }
        _ => {
            out.push(0xFD);
            out.extend_from_slice(&(n as u32).to_le_bytes()[..3]);
        }
    }
}

fn lenenc_str(out: &mut Vec<u8>, s: &str) {
    lenenc_int(out, s.len() as u64);
    out.extend_from_slice(s.as_bytes());
}

fn handshake_payload(capabilities: u32) -> Vec<u8> {
    let mut p = vec![10];
    p.extend_from_slice(SERVER_VERSION.as_bytes());
    p.push(0);
    p.extend_from_slice(&CONNECTION_ID.to_le_bytes());
    p.extend_from_slice(&SCRAMBLE[..8]);
    p.push(0);
    p.extend_from_slice(&(capabilities as u16).to_le_bytes());
    p.push(45);
    p.extend_from_slice(&2u16.to_le_bytes());
    p.extend_from_slice(&((capabilities >> 16) as u16).to_le_bytes());
    p.push(21);
    p.extend_from_slice(&[0; 10]);
    p.extend_from_slice(&SCRAMBLE[8..]);
    p.push(0);
    p.extend_from_slice(b"mysql_native_password\0");
    p
}

fn ok_payload(affected_rows: u64) -> Vec<u8> {
    let mut p = vec![0x00];
    lenenc_int(&mut p, affected_rows);
    lenenc_int(&mut p, 0);
    p.extend_from_slice(&2u16.to_le_bytes());
    p.extend_from_slice(&0u16.to_le_bytes());
    p
}

fn err_payload(code: u16, state: &str, message: &str) -> Vec<u8> {
    let mut p = vec![0xFF];
    p.extend_from_slice(&code.to_le_bytes());
    p.push(b'#');
    p.extend_from_slice(state.as_bytes());
    p.extend_from_slice(message.as_bytes());
    p
}

fn eof_payload() -> Vec<u8> {
    vec![0xFE, 0, 0, 2, 0]
}

fn column_payload(name: &str, column_type: u8) -> Vec<u8> {
    let mut p = Vec::new();
    lenenc_str(&mut p, "def");
    lenenc_str(&mut p, "information_schema");
    lenenc_str(&mut p, "");
    lenenc_str(&mut p, "");
    lenenc_str(&mut p, name);
    lenenc_str(&mut p, name);
    p.push(0x0C);
    p.extend_from_slice(&45u16.to_le_bytes());
    p.extend_from_slice(&256u32.to_le_bytes());
    p.push(column_type);
    p.extend_from_slice(&0u16.to_le_bytes());
    p.push(0);
    p.extend_from_slice(&[0, 0]);
    p
}

/// Single-column text result set
async fn write_rows(
    stream: &mut BoxStream,
    column: &str,
    values: &[String],
) -> std::io::Result<()> {
    write_typed_rows(stream, column, VAR_STRING, values).await
}

async fn write_typed_rows(
    stream: &mut BoxStream,
    column: &str,
    column_type: u8,
    values: &[String],
) -> std::io::Result<()> {
    let mut seq = 1;
    let mut next = || {
        let s = seq;
        seq += 1;
        s
    };

    write_packet(stream, next(), &[1]).await?;
    write_packet(stream, next(), &column_payload(column, column_type)).await?;
    write_packet(stream, next(), &eof_payload()).await?;
    for value in values {
        let mut row = Vec::new();
        lenenc_str(&mut row, value);
        write_packet(stream, next(), &row).await?;
    }
    write_packet(stream, next(), &eof_payload()).await
}

fn null_terminated(buf: &[u8], pos: &mut usize) -> String {
    let end = buf[*pos..]
        .iter()
        .position(|&b| b == 0)
        .map_or(buf.len(), |i| *pos + i);
    let s = String::from_utf8_lossy(&buf[*pos..end]).into_owned();
    *pos = (end + 1).min(buf.len());
    s
}

/// Every backtick-quoted identifier, in order
fn idents(sql: &str) -> Vec<String> {
    sql.split('`')
        .enumerate()
        .filter(|(i, _)| i % 2 == 1)
        .map(|(_, s)| s.to_string())
        .collect()
}

/// Table name from a `... TABLE_NAME = '<name>'` catalog query
fn quoted_table(sql: &str) -> String {
    sql.rsplit("TABLE_NAME = '")
        .next()
        .unwrap_or_default()
        .trim_end_matches('\'')
        .to_string()
}

fn apply_ddl(tables: &mut HashMap<String, FakeTable>, sql: &str) -> bool {
    if let Some(rest) = sql.strip_prefix("CREATE TABLE IF NOT EXISTS ") {
        let names = idents(rest);
        let Some(table) = names.first() else {
            return false;
        };
        let body = &rest[rest.find('(').unwrap_or(0) + 1..rest.len().saturating_sub(1)];
        let mut shape = FakeTable::default();
        for part in body.split(", ") {
            if part.starts_with('`') {
                shape.columns.push(idents(part)[0].clone());
            } else if part.starts_with("PRIMARY KEY") {
                shape.indexes.push("PRIMARY".to_string());
            } else if part.contains("INDEX `") {
                shape.indexes.push(idents(part)[0].clone());
            }
        }
        tables.entry(table.clone()).or_insert(shape);
        return true;
    }
    if sql.starts_with("ALTER TABLE ") && sql.contains(" ADD COLUMN ") {
        let names = idents(sql);
        if let Some(table) = tables.get_mut(&names[0]) {
            table.columns.push(names[1].clone());
            return true;
        }
        return false;
    }
    if sql.starts_with("CREATE INDEX ") || sql.starts_with("CREATE UNIQUE INDEX ") {
        let names = idents(sql);
        if let Some(table) = tables.get_mut(&names[1]) {
            table.indexes.push(names[0].clone());
            return true;
        }
        return false;
    }
    false
}

async fn serve(
    mut stream: BoxStream,
    options: &Options,
    shared: &Mutex<Shared>,
) -> std::io::Result<()> {
    let mut caps = SERVER_CAPABILITIES;
    if options.tls.is_some() {
        caps |= capabilities::SSL;
    }
    write_packet(&mut stream, 0, &handshake_payload(caps)).await?;

    let (mut seq, mut response) = read_packet(&mut stream).await?;
    let client_caps = u32::from_le_bytes([response[0], response[1], response[2], response[3]]);

    if client_caps & capabilities::SSL != 0 {
        let Some(acceptor) = options.tls.as_ref() else {
            return Ok(());
        };
        assert_eq!(response.len(), 32, "SSL request is exactly 32 bytes");
        let tls = acceptor.accept(stream).await?;
        stream = Box::new(tls);
        shared.lock().unwrap().log.tls = true;
        (seq, response) = read_packet(&mut stream).await?;
    }

    // HandshakeResponse41
    let mut pos = 32;
    let user = null_terminated(&response, &mut pos);
    let auth_len = response[pos] as usize;
    let auth = response[pos + 1..pos + 1 + auth_len].to_vec();
    pos += 1 + auth_len;
    let database = if client_caps & capabilities::CONNECT_WITH_DB != 0 {
        Some(null_terminated(&response, &mut pos))
    } else {
        None
    };
    let plugin = if client_caps & capabilities::PLUGIN_AUTH != 0 && pos < response.len() {
        Some(null_terminated(&response, &mut pos))
    } else {
        None
    };

    {
        let mut state = shared.lock().unwrap();
        state.log.user = Some(user.clone());
        state.log.database = database;
        state.log.auth_plugin = plugin;
    }

    if auth != scramble_native(&options.password, &SCRAMBLE) {
        let msg = format!("Access denied for user '{}'@'127.0.0.1'", user);
        write_packet(&mut stream, seq + 1, &err_payload(1045, "28000", &msg)).await?;
        return Ok(());
    }
    write_packet(&mut stream, seq + 1, &ok_payload(0)).await?;

    loop {
        let (_, command) = match read_packet(&mut stream).await {
            Ok(packet) => packet,
            Err(_) => return Ok(()),
        };
        match command.first().copied() {
            Some(commands::QUIT) => {
                shared.lock().unwrap().log.quit = true;
                return Ok(());
            }
            Some(commands::PING) => {
                shared.lock().unwrap().log.pings += 1;
                write_packet(&mut stream, 1, &ok_payload(0)).await?;
            }
            Some(commands::QUERY) => {
                let sql = String::from_utf8_lossy(&command[1..]).into_owned();
                shared.lock().unwrap().log.queries.push(sql.clone());
                answer(&mut stream, options, shared, &sql).await?;
            }
            _ => {
                write_packet(&mut stream, 1, &err_payload(1047, "08S01", "Unknown command"))
                    .await?;
            }
        }
    }
}

async fn answer(
    stream: &mut BoxStream,
    options: &Options,
    shared: &Mutex<Shared>,
    sql: &str,
) -> std::io::Result<()> {
    if let Some(names) = sql.strip_prefix("SET NAMES ") {
        let charset = names.split_whitespace().next().unwrap_or_default();
        if options.reject_charsets.iter().any(|c| c == charset) {
            let msg = format!("Unknown character set: '{}'", charset);
            return write_packet(stream, 1, &err_payload(1115, "42000", &msg)).await;
        }
        return write_packet(stream, 1, &ok_payload(0)).await;
    }
    if sql.starts_with("SET ") {
        return write_packet(stream, 1, &ok_payload(0)).await;
    }

    if sql.starts_with("SELECT COUNT(*) FROM information_schema.TABLES") {
        let exists = shared
            .lock()
            .unwrap()
            .tables
            .contains_key(&quoted_table(sql));
        let count = if exists { "1" } else { "0" };
        return write_rows(stream, "COUNT(*)", &[count.to_string()]).await;
    }
    if sql.starts_with("SELECT COLUMN_NAME FROM information_schema.COLUMNS") {
        let columns = shared
            .lock()
            .unwrap()
            .tables
            .get(&quoted_table(sql))
            .map(|t| t.columns.clone())
            .unwrap_or_default();
        return write_rows(stream, "COLUMN_NAME", &columns).await;
    }
    if sql.starts_with("SELECT DISTINCT INDEX_NAME FROM information_schema.STATISTICS") {
        let indexes = shared
            .lock()
            .unwrap()
            .tables
            .get(&quoted_table(sql))
            .map(|t| t.indexes.clone())
            .unwrap_or_default();
        return write_rows(stream, "INDEX_NAME", &indexes).await;
    }
    if sql == "SELECT VERSION()" {
        return write_rows(stream, "VERSION()", &[SERVER_VERSION.to_string()]).await;
    }
    if sql == "SELECT NOW()" {
        return write_typed_rows(stream, "NOW()", DATETIME, &[NOW.to_string()]).await;
    }
    if sql == "SELECT CAST('yesterday' AS DATETIME)" {
        let values = [NOW.to_string(), "yesterday".to_string()];
        return write_typed_rows(stream, "value", DATETIME, &values).await;
    }

    if options.read_only && (sql.starts_with("CREATE") || sql.starts_with("ALTER")) {
        let msg = "CREATE command denied to user 'root'@'127.0.0.1'";
        return write_packet(stream, 1, &err_payload(1142, "42000", msg)).await;
    }

    let applied = apply_ddl(&mut shared.lock().unwrap().tables, sql);
    if applied {
        write_packet(stream, 1, &ok_payload(0)).await
    } else {
        let msg = format!("You have an error in your SQL syntax near '{}'", sql);
        write_packet(stream, 1, &err_payload(1064, "42000", &msg)).await
    }
}
