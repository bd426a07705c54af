use std::fmt::Debug;
use std::io;
use std::sync::Arc;
use std::time::Instant;

use async_trait::async_trait;
use futures::stream;
use futures::Sink;
use pgwire::api::auth::cleartext::CleartextPasswordAuthStartupHandler;
use pgwire::api::auth::{DefaultServerParameterProvider, StartupHandler};
use pgwire::api::copy::CopyHandler;
use pgwire::api::portal::{Format, Portal};
use pgwire::api::query::{ExtendedQueryHandler, SimpleQueryHandler};
use pgwire::api::results::{
    DataRowEncoder, DescribePortalResponse, DescribeStatementResponse, FieldFormat, FieldInfo,
    QueryResponse, Response, Tag,
};
use pgwire::api::stmt::{QueryParser, StoredStatement};
use pgwire::api::store::PortalStore;
use pgwire::api::{ClientInfo, ClientPortalStore, NoopHandler, PgWireServerHandlers, Type};
use pgwire::error::{ErrorInfo, PgWireError, PgWireResult};
use pgwire::messages::PgWireBackendMessage;
use pgwire::tokio::TlsAcceptor;
use tokio::net::TcpStream;
use tracing::debug;

use crate::auth::{Credentials, RentalAuthSource, Role};
use crate::engine::{Engine, EngineError};
use crate::model::*;
use crate::observability::{
    command_label, PERMISSION_DENIED_TOTAL, QUERIES_TOTAL, QUERY_DURATION_SECONDS,
};
use crate::sql::{self, Command, SqlError};

pub struct RentalHandler {
    engine: Arc<Engine>,
    query_parser: Arc<RentalQueryParser>,
}

impl RentalHandler {
    pub fn new(engine: Arc<Engine>) -> Self {
        Self {
            engine,
            query_parser: Arc::new(RentalQueryParser),
        }
    }

    /// Role of the session, fixed by the startup user. Auth already refused anyone else.
    fn session_role<C: ClientInfo>(&self, client: &C) -> PgWireResult<Role> {
        let user = client.metadata().get("user").map(String::as_str).unwrap_or("");
        Role::from_user(user).ok_or_else(|| {
            PgWireError::UserError(Box::new(ErrorInfo::new(
                "FATAL".into(),
                "28000".into(),
                format!("unknown user {user:?}"),
            )))
        })
    }

    async fn run_sql(&self, role: Role, query: &str) -> PgWireResult<Response> {
        let cmd = sql::parse_sql(query).map_err(sql_err)?;
        let label = command_label(&cmd);
        if cmd.is_mutation() && !role.may_mutate() {
            metrics::counter!(PERMISSION_DENIED_TOTAL, "command" => label).increment(1);
            return Err(permission_err(label));
        }

        let started = Instant::now();
        let result = self.execute_command(cmd).await;
        let status = if result.is_ok() { "ok" } else { "error" };
        metrics::counter!(QUERIES_TOTAL, "command" => label, "status" => status).increment(1);
        metrics::histogram!(QUERY_DURATION_SECONDS, "command" => label)
            .record(started.elapsed().as_secs_f64());
        result
    }

    async fn execute_command(&self, cmd: Command) -> PgWireResult<Response> {
        let engine = &self.engine;
        match cmd {
            Command::InsertCamera { name, link } => {
                let camera = engine.create_camera(&name, link).await.map_err(engine_err)?;
                Ok(camera_response(vec![camera]))
            }
            Command::UpdateCamera { id, patch } => {
                let camera = engine.update_camera(id, patch).await.map_err(engine_err)?;
                Ok(camera_response(vec![camera]))
            }
            Command::DeleteCamera { id } => {
                let cascaded = engine.delete_camera(id).await.map_err(engine_err)?;
                debug!(%id, cascaded, "camera deleted over the wire");
                Ok(Response::Execution(Tag::new("DELETE").with_rows(1)))
            }
            Command::SelectCameras { id: Some(id) } => {
                let cameras = engine.get_camera(id).await.into_iter().collect();
                Ok(camera_response(cameras))
            }
            Command::SelectCameras { id: None } => {
                Ok(camera_response(engine.list_cameras().await))
            }
            Command::InsertRental { draft } => {
                let rental = engine.create_rental(draft).await.map_err(engine_err)?;
                self.rental_response_for(rental).await
            }
            Command::UpdateRental { id, patch } => {
                let rental = engine.update_rental(id, patch).await.map_err(engine_err)?;
                self.rental_response_for(rental).await
            }
            Command::MoveRental {
                id,
                start,
                days,
                camera_id,
            } => {
                let rental = engine
                    .move_rental(id, start, days, camera_id)
                    .await
                    .map_err(engine_err)?;
                self.rental_response_for(rental).await
            }
            Command::ResizeRental {
                id,
                start,
                end,
                camera_id,
            } => {
                let rental = engine
                    .resize_rental(id, start, end, camera_id)
                    .await
                    .map_err(engine_err)?;
                self.rental_response_for(rental).await
            }
            Command::CancelRental { id } => {
                engine.cancel_rental(id).await.map_err(engine_err)?;
                Ok(Response::Execution(Tag::new("DELETE").with_rows(1)))
            }
            Command::SelectRentals { filter } => {
                Ok(rental_response(engine.list_rentals(&filter).await))
            }
        }
    }

    /// Echo a freshly written rental back as a row, joined with its camera name.
    async fn rental_response_for(&self, rental: Rental) -> PgWireResult<Response> {
        let camera_name = self
            .engine
            .get_camera(rental.camera_id)
            .await
            .map(|c| c.name)
            .unwrap_or_default();
        Ok(rental_response(vec![RentalRow {
            rental,
            camera_name,
        }]))
    }
}

fn text_field(name: &str) -> FieldInfo {
    FieldInfo::new(name.into(), None, None, Type::VARCHAR, FieldFormat::Text)
}

fn camera_schema() -> Vec<FieldInfo> {
    ["id", "name", "link", "status"]
        .into_iter()
        .map(text_field)
        .collect()
}

fn rental_schema() -> Vec<FieldInfo> {
    vec![
        text_field("id"),
        text_field("camera_id"),
        text_field("camera_name"),
        text_field("start_date"),
        text_field("end_date"),
        FieldInfo::new("days".into(), None, None, Type::INT8, FieldFormat::Text),
        text_field("notes"),
        text_field("color"),
        text_field("status"),
    ]
}

fn camera_response(cameras: Vec<Camera>) -> Response {
    let schema = Arc::new(camera_schema());
    let rows: Vec<PgWireResult<_>> = cameras
        .into_iter()
        .map(|camera| {
            let mut encoder = DataRowEncoder::new(schema.clone());
            encoder.encode_field(&camera.id.to_string())?;
            encoder.encode_field(&camera.name)?;
            encoder.encode_field(&camera.link)?;
            encoder.encode_field(&camera.status.as_str())?;
            Ok(encoder.take_row())
        })
        .collect();
    Response::Query(QueryResponse::new(schema, stream::iter(rows)))
}

fn rental_response(rows: Vec<RentalRow>) -> Response {
    let schema = Arc::new(rental_schema());
    let rows: Vec<PgWireResult<_>> = rows
        .into_iter()
        .map(|row| {
            let rental = &row.rental;
            let mut encoder = DataRowEncoder::new(schema.clone());
            encoder.encode_field(&rental.id.to_string())?;
            encoder.encode_field(&rental.camera_id.to_string())?;
            encoder.encode_field(&row.camera_name)?;
            encoder.encode_field(&rental.range.start.to_string())?;
            encoder.encode_field(&rental.range.end.to_string())?;
            encoder.encode_field(&rental.range.days())?;
            encoder.encode_field(&rental.notes)?;
            encoder.encode_field(&rental.color)?;
            encoder.encode_field(&rental.status.as_str())?;
            Ok(encoder.take_row())
        })
        .collect();
    Response::Query(QueryResponse::new(schema, stream::iter(rows)))
}

/// Columns a statement will return, judged from its verb and target table.
fn result_schema(sql: &str) -> Vec<FieldInfo> {
    let verb = sql
        .split_whitespace()
        .next()
        .map(str::to_ascii_uppercase)
        .unwrap_or_default();
    if verb == "DELETE" {
        return vec![];
    }
    match sql::target_table(sql).as_deref() {
        Some("cameras") => camera_schema(),
        Some("rentals" | "moves" | "resizes") => rental_schema(),
        _ => vec![],
    }
}

#[async_trait]
impl SimpleQueryHandler for RentalHandler {
    async fn do_query<C>(&self, client: &mut C, query: &str) -> PgWireResult<Vec<Response>>
    where
        C: ClientInfo + ClientPortalStore + Sink<PgWireBackendMessage> + Unpin + Send + Sync,
        C::Error: Debug,
        PgWireError: From<C::Error>,
    {
        let role = self.session_role(client)?;
        Ok(vec![self.run_sql(role, query).await?])
    }
}

// ── Extended Query Protocol ──────────────────────────────────────

#[derive(Debug)]
pub struct RentalQueryParser;

#[async_trait]
impl QueryParser for RentalQueryParser {
    type Statement = String;

    async fn parse_sql<C>(
        &self,
        _client: &C,
        sql: &str,
        _types: &[Option<Type>],
    ) -> PgWireResult<String>
    where
        C: ClientInfo + Unpin + Send + Sync,
    {
        Ok(sql.to_string())
    }

    fn get_parameter_types(&self, stmt: &String) -> PgWireResult<Vec<Type>> {
        Ok(vec![Type::VARCHAR; count_params(stmt)])
    }

    fn get_result_schema(
        &self,
        stmt: &String,
        _column_format: Option<&Format>,
    ) -> PgWireResult<Vec<FieldInfo>> {
        Ok(result_schema(stmt))
    }
}

#[async_trait]
impl ExtendedQueryHandler for RentalHandler {
    type Statement = String;
    type QueryParser = RentalQueryParser;

    fn query_parser(&self) -> Arc<Self::QueryParser> {
        self.query_parser.clone()
    }

    async fn do_query<C>(
        &self,
        client: &mut C,
        portal: &Portal<Self::Statement>,
        _max_rows: usize,
    ) -> PgWireResult<Response>
    where
        C: ClientInfo + ClientPortalStore + Sink<PgWireBackendMessage> + Unpin + Send + Sync,
        C::PortalStore: PortalStore<Statement = Self::Statement>,
        C::Error: Debug,
        PgWireError: From<C::Error>,
    {
        let role = self.session_role(client)?;
        let sql = substitute_params(portal);
        self.run_sql(role, &sql).await
    }

    async fn do_describe_statement<C>(
        &self,
        _client: &mut C,
        target: &StoredStatement<Self::Statement>,
    ) -> PgWireResult<DescribeStatementResponse>
    where
        C: ClientInfo + ClientPortalStore + Sink<PgWireBackendMessage> + Unpin + Send + Sync,
        C::PortalStore: PortalStore<Statement = Self::Statement>,
        C::Error: Debug,
        PgWireError: From<C::Error>,
    {
        let param_types = vec![Type::VARCHAR; count_params(&target.statement)];
        Ok(DescribeStatementResponse::new(
            param_types,
            result_schema(&target.statement),
        ))
    }

    async fn do_describe_portal<C>(
        &self,
        _client: &mut C,
        target: &Portal<Self::Statement>,
    ) -> PgWireResult<DescribePortalResponse>
    where
        C: ClientInfo + ClientPortalStore + Sink<PgWireBackendMessage> + Unpin + Send + Sync,
        C::PortalStore: PortalStore<Statement = Self::Statement>,
        C::Error: Debug,
        PgWireError: From<C::Error>,
    {
        Ok(DescribePortalResponse::new(result_schema(
            &target.statement.statement,
        )))
    }
}

/// Walk `sql` once, handing each `$N` outside a quoted literal to `on_param`.
/// Everything else is copied through verbatim, so text a callback pushes is never rescanned.
fn rewrite_placeholders(sql: &str, mut on_param: impl FnMut(usize, &str, &mut String)) -> String {
    let mut out = String::with_capacity(sql.len());
    let mut in_literal = false;
    let mut chars = sql.char_indices().peekable();
    while let Some((i, c)) = chars.next() {
        if c == '\'' {
            in_literal = !in_literal;
        }
        if c != '$' || in_literal {
            out.push(c);
            continue;
        }
        let mut end = i + 1;
        while let Some(&(j, d)) = chars.peek() {
            if !d.is_ascii_digit() {
                break;
            }
            end = j + 1;
            chars.next();
        }
        match sql[i + 1..end].parse::<usize>() {
            Ok(n) => on_param(n, &sql[i..end], &mut out),
            Err(_) => out.push_str(&sql[i..end]),
        }
    }
    out
}

/// Count the highest $N parameter placeholder in the SQL string.
fn count_params(sql: &str) -> usize {
    let mut max = 0usize;
    rewrite_placeholders(sql, |n, _, _| max = max.max(n));
    max
}

/// Substitute $1, $2, ... placeholders with bound parameter values (text format).
fn substitute_params(portal: &Portal<String>) -> String {
    let params: Vec<Option<String>> = portal
        .parameters
        .iter()
        .map(|p| p.as_ref().map(|bytes| String::from_utf8_lossy(bytes).into_owned()))
        .collect();
    substitute(&portal.statement.statement, &params)
}

fn substitute(sql: &str, params: &[Option<String>]) -> String {
    rewrite_placeholders(sql, |n, raw, out| {
        match n.checked_sub(1).and_then(|i| params.get(i)) {
            Some(Some(text)) => {
                out.push('\'');
                out.push_str(&text.replace('\'', "''"));
                out.push('\'');
            }
            Some(None) => out.push_str("NULL"),
            // Unbound: leave it for the parser to reject.
            None => out.push_str(raw),
        }
    })
}

// ── Factory ──────────────────────────────────────────────────────

#[derive(Clone)]
pub struct RentalFactory {
    handler: Arc<RentalHandler>,
    auth_handler:
        Arc<CleartextPasswordAuthStartupHandler<RentalAuthSource, DefaultServerParameterProvider>>,
    noop: Arc<NoopHandler>,
}

impl RentalFactory {
    pub fn new(engine: Arc<Engine>, credentials: Credentials) -> Self {
        let auth_source = RentalAuthSource::new(credentials);
        let param_provider = DefaultServerParameterProvider::default();
        Self {
            handler: Arc::new(RentalHandler::new(engine)),
            auth_handler: Arc::new(CleartextPasswordAuthStartupHandler::new(
                auth_source,
                param_provider,
            )),
            noop: Arc::new(NoopHandler),
        }
    }
}

impl PgWireServerHandlers for RentalFactory {
    fn simple_query_handler(&self) -> Arc<impl SimpleQueryHandler> {
        self.handler.clone()
    }

    fn extended_query_handler(&self) -> Arc<impl ExtendedQueryHandler> {
        self.handler.clone()
    }

    fn startup_handler(&self) -> Arc<impl StartupHandler> {
        self.auth_handler.clone()
    }

    fn copy_handler(&self) -> Arc<impl CopyHandler> {
        self.noop.clone()
    }
}

/// Serve one client connection until it closes.
pub async fn process_connection(
    socket: TcpStream,
    factory: RentalFactory,
    tls: Option<TlsAcceptor>,
) -> io::Result<()> {
    pgwire::tokio::process_socket(socket, tls, factory).await
}

fn engine_err(e: EngineError) -> PgWireError {
    PgWireError::UserError(Box::new(ErrorInfo::new(
        "ERROR".into(),
        "P0001".into(),
        e.to_string(),
    )))
}

fn sql_err(e: SqlError) -> PgWireError {
    PgWireError::UserError(Box::new(ErrorInfo::new(
        "ERROR".into(),
        "42601".into(),
        e.to_string(),
    )))
}

fn permission_err(command: &str) -> PgWireError {
    PgWireError::UserError(Box::new(ErrorInfo::new(
        "ERROR".into(),
        "42501".into(),
        format!("permission denied: {command} requires the admin role"),
    )))
}
