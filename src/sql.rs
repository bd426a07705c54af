use sqlparser::ast::{
    self, AssignmentTarget, Expr, FromTable, ObjectNamePart, SetExpr, Statement, TableFactor,
    TableObject, Value, ValueWithSpan,
};
use sqlparser::dialect::PostgreSqlDialect;
use sqlparser::parser::Parser;
use ulid::Ulid;

use crate::date::Day;
use crate::model::*;

/// Parsed command from SQL input.
#[derive(Debug, PartialEq)]
pub enum Command {
    InsertCamera {
        name: String,
        link: Option<String>,
    },
    UpdateCamera {
        id: Ulid,
        patch: CameraPatch,
    },
    DeleteCamera {
        id: Ulid,
    },
    SelectCameras {
        id: Option<Ulid>,
    },
    InsertRental {
        draft: RentalDraft,
    },
    UpdateRental {
        id: Ulid,
        patch: RentalPatch,
    },
    /// `INSERT INTO moves`: keep the span length, new start.
    MoveRental {
        id: Ulid,
        start: Day,
        days: u32,
        camera_id: Option<Ulid>,
    },
    /// `INSERT INTO resizes`: both endpoints given.
    ResizeRental {
        id: Ulid,
        start: Day,
        end: Day,
        camera_id: Option<Ulid>,
    },
    /// `DELETE FROM rentals` cancels; rentals are never physically removed.
    CancelRental {
        id: Ulid,
    },
    SelectRentals {
        filter: RentalFilter,
    },
}

impl Command {
    /// Whether the command changes state. Read-only sessions may run only the rest.
    pub fn is_mutation(&self) -> bool {
        !matches!(
            self,
            Command::SelectCameras { .. } | Command::SelectRentals { .. }
        )
    }
}

pub fn parse_sql(sql: &str) -> Result<Command, SqlError> {
    let dialect = PostgreSqlDialect {};
    let stmts = Parser::parse_sql(&dialect, sql).map_err(|e| SqlError::Parse(e.to_string()))?;
    if stmts.is_empty() {
        return Err(SqlError::Empty);
    }
    if stmts.len() > 1 {
        return Err(SqlError::Unsupported("multiple statements".into()));
    }

    match &stmts[0] {
        Statement::Insert(insert) => parse_insert(insert),
        Statement::Update {
            table,
            assignments,
            selection,
            ..
        } => parse_update(&table.relation, assignments, selection),
        Statement::Delete(delete) => parse_delete(delete),
        Statement::Query(query) => parse_select(query),
        other => Err(SqlError::Unsupported(format!("{other}"))),
    }
}

/// Best-effort name of the table a statement targets, without a full parse.
/// Used to describe result columns for statements still carrying `$n` placeholders.
pub fn target_table(sql: &str) -> Option<String> {
    let mut tokens = sql
        .split(|c: char| c.is_whitespace() || c == '(' || c == ';')
        .filter(|t| !t.is_empty());
    while let Some(token) = tokens.next() {
        let keyword = token.to_ascii_uppercase();
        if matches!(keyword.as_str(), "INTO" | "FROM" | "UPDATE") {
            return tokens
                .next()
                .map(|t| t.trim_matches('"').rsplit('.').next().unwrap_or(t).to_lowercase());
        }
    }
    None
}

// ── INSERT ────────────────────────────────────────────────────

const CAMERA_COLUMNS: &[&str] = &["name", "link"];
const RENTAL_COLUMNS: &[&str] = &["camera_id", "start_date", "end_date", "notes", "color"];
const MOVE_COLUMNS: &[&str] = &["rental_id", "start_date", "days", "camera_id"];
const RESIZE_COLUMNS: &[&str] = &["rental_id", "start_date", "end_date", "camera_id"];

fn parse_insert(insert: &ast::Insert) -> Result<Command, SqlError> {
    let table = insert_table_name(insert)?;
    let (name, columns, required): (&'static str, &'static [&'static str], usize) =
        match table.as_str() {
            "cameras" => ("cameras", CAMERA_COLUMNS, 1),
            "rentals" => ("rentals", RENTAL_COLUMNS, 3),
            "moves" => ("moves", MOVE_COLUMNS, 3),
            "resizes" => ("resizes", RESIZE_COLUMNS, 3),
            _ => return Err(SqlError::UnknownTable(table)),
        };
    let row = arrange_values(
        name,
        columns,
        required,
        &insert.columns,
        extract_insert_values(insert)?,
    )?;
    let arg = |i: usize| row[i].as_ref();
    let need = |i: usize| row[i].as_ref().ok_or(SqlError::MissingColumn(columns[i]));

    match name {
        "cameras" => Ok(Command::InsertCamera {
            name: parse_string(need(0)?)?,
            link: arg(1).map(parse_string_or_null).transpose()?.flatten(),
        }),
        "rentals" => Ok(Command::InsertRental {
            draft: RentalDraft {
                camera_id: parse_ulid(need(0)?)?,
                start: parse_day(need(1)?)?,
                end: parse_day(need(2)?)?,
                notes: arg(3).map(parse_string_or_null).transpose()?.flatten(),
                color: arg(4).map(parse_string_or_null).transpose()?.flatten(),
            },
        }),
        "moves" => Ok(Command::MoveRental {
            id: parse_ulid(need(0)?)?,
            start: parse_day(need(1)?)?,
            days: parse_u32(need(2)?)?,
            camera_id: arg(3).map(parse_ulid_or_null).transpose()?.flatten(),
        }),
        _ => Ok(Command::ResizeRental {
            id: parse_ulid(need(0)?)?,
            start: parse_day(need(1)?)?,
            end: parse_day(need(2)?)?,
            camera_id: arg(3).map(parse_ulid_or_null).transpose()?.flatten(),
        }),
    }
}

/// Lay the VALUES out in `columns` order. Without a column list the values are
/// positional; with one, each value lands on the column it names.
fn arrange_values(
    table: &'static str,
    columns: &'static [&'static str],
    required: usize,
    listed: &[ast::Ident],
    values: Vec<Expr>,
) -> Result<Vec<Option<Expr>>, SqlError> {
    if values.len() > columns.len() {
        return Err(SqlError::Unsupported(format!(
            "{table} takes at most {} values, got {}",
            columns.len(),
            values.len()
        )));
    }
    let mut row: Vec<Option<Expr>> = vec![None; columns.len()];

    if listed.is_empty() {
        if values.len() < required {
            return Err(SqlError::WrongArity(table, required, values.len()));
        }
        for (slot, value) in row.iter_mut().zip(values) {
            *slot = Some(value);
        }
        return Ok(row);
    }

    if listed.len() != values.len() {
        return Err(SqlError::Parse(format!(
            "{} columns listed but {} values given",
            listed.len(),
            values.len()
        )));
    }
    for (ident, value) in listed.iter().zip(values) {
        let column = ident.value.to_lowercase();
        let idx = columns
            .iter()
            .position(|c| *c == column)
            .ok_or_else(|| SqlError::UnknownColumn(column.clone()))?;
        if row[idx].is_some() {
            return Err(SqlError::Parse(format!("column {column} listed twice")));
        }
        row[idx] = Some(value);
    }
    if let Some(missing) = (0..required).find(|&i| row[i].is_none()) {
        return Err(SqlError::MissingColumn(columns[missing]));
    }
    Ok(row)
}

// ── UPDATE ────────────────────────────────────────────────────

fn parse_update(
    relation: &TableFactor,
    assignments: &[ast::Assignment],
    selection: &Option<Expr>,
) -> Result<Command, SqlError> {
    let table = table_factor_name(relation)?;
    let id = extract_where_id(selection)?;
    if assignments.is_empty() {
        return Err(SqlError::Parse("UPDATE without SET".into()));
    }

    match table.as_str() {
        "cameras" => {
            let mut patch = CameraPatch::default();
            for a in assignments {
                let value = &a.value;
                match assignment_column(&a.target)?.as_str() {
                    "name" => patch.name = Some(parse_string(value)?),
                    "link" => patch.link = Some(parse_string_or_null(value)?.unwrap_or_default()),
                    "status" => patch.status = Some(parse_camera_status(value)?),
                    other => return Err(SqlError::UnknownColumn(other.to_string())),
                }
            }
            Ok(Command::UpdateCamera { id, patch })
        }
        "rentals" => {
            let mut patch = RentalPatch::default();
            for a in assignments {
                let value = &a.value;
                match assignment_column(&a.target)?.as_str() {
                    "camera_id" => patch.camera_id = Some(parse_ulid(value)?),
                    "start_date" => patch.start = Some(parse_day(value)?),
                    "end_date" => patch.end = Some(parse_day(value)?),
                    "notes" => patch.notes = Some(parse_string_or_null(value)?.unwrap_or_default()),
                    // NULL and '' both fall back to the default color.
                    "color" => patch.color = Some(parse_string_or_null(value)?.unwrap_or_default()),
                    "status" => patch.status = Some(parse_rental_status(value)?),
                    other => return Err(SqlError::UnknownColumn(other.to_string())),
                }
            }
            Ok(Command::UpdateRental { id, patch })
        }
        _ => Err(SqlError::UnknownTable(table)),
    }
}

fn assignment_column(target: &AssignmentTarget) -> Result<String, SqlError> {
    match target {
        AssignmentTarget::ColumnName(name) => {
            object_name_last(name).ok_or_else(|| SqlError::Parse("empty column name".into()))
        }
        _ => Err(SqlError::Unsupported("tuple assignment".into())),
    }
}

// ── DELETE ────────────────────────────────────────────────────

fn parse_delete(delete: &ast::Delete) -> Result<Command, SqlError> {
    let table = delete_table_name(delete)?;
    let id = extract_where_id(&delete.selection)?;

    match table.as_str() {
        "cameras" => Ok(Command::DeleteCamera { id }),
        "rentals" => Ok(Command::CancelRental { id }),
        _ => Err(SqlError::UnknownTable(table)),
    }
}

// ── SELECT ────────────────────────────────────────────────────

fn parse_select(query: &ast::Query) -> Result<Command, SqlError> {
    let select = match query.body.as_ref() {
        SetExpr::Select(s) => s,
        _ => return Err(SqlError::Unsupported("non-SELECT query".into())),
    };
    if select.from.is_empty() {
        return Err(SqlError::Parse("SELECT without FROM".into()));
    }
    let table = table_factor_name(&select.from[0].relation)?;

    let mut filters = Vec::new();
    if let Some(selection) = &select.selection {
        collect_eq_filters(selection, &mut filters)?;
    }

    match table.as_str() {
        "cameras" => {
            let mut id = None;
            for (column, value) in filters {
                match column.as_str() {
                    "id" => id = Some(parse_ulid(value)?),
                    other => return Err(SqlError::UnknownColumn(other.to_string())),
                }
            }
            Ok(Command::SelectCameras { id })
        }
        "rentals" => {
            let mut filter = RentalFilter::default();
            for (column, value) in filters {
                match column.as_str() {
                    "id" => filter.id = Some(parse_ulid(value)?),
                    "camera_id" => filter.camera_id = Some(parse_ulid(value)?),
                    "status" => filter.status = Some(parse_rental_status(value)?),
                    other => return Err(SqlError::UnknownColumn(other.to_string())),
                }
            }
            Ok(Command::SelectRentals { filter })
        }
        _ => Err(SqlError::UnknownTable(table)),
    }
}

/// Flatten `a = x AND b = y ...` into `(column, value)` pairs.
fn collect_eq_filters<'a>(expr: &'a Expr, out: &mut Vec<(String, &'a Expr)>) -> Result<(), SqlError> {
    match expr {
        Expr::BinaryOp {
            left,
            op: ast::BinaryOperator::And,
            right,
        } => {
            collect_eq_filters(left, out)?;
            collect_eq_filters(right, out)
        }
        Expr::BinaryOp {
            left,
            op: ast::BinaryOperator::Eq,
            right,
        } => {
            let column = expr_column_name(left)
                .ok_or_else(|| SqlError::Unsupported(format!("filter on {left}")))?;
            out.push((column, right));
            Ok(())
        }
        Expr::Nested(inner) => collect_eq_filters(inner, out),
        other => Err(SqlError::Unsupported(format!("WHERE {other}"))),
    }
}

// ── Helpers ───────────────────────────────────────────────────

fn object_name_last(name: &ast::ObjectName) -> Option<String> {
    name.0.last().and_then(|part| match part {
        ObjectNamePart::Identifier(ident) => Some(ident.value.to_lowercase()),
        _ => None,
    })
}

fn insert_table_name(insert: &ast::Insert) -> Result<String, SqlError> {
    match &insert.table {
        TableObject::TableName(name) => {
            object_name_last(name).ok_or_else(|| SqlError::Parse("empty table name".into()))
        }
        _ => Err(SqlError::Parse("unsupported table object in INSERT".into())),
    }
}

fn delete_table_name(delete: &ast::Delete) -> Result<String, SqlError> {
    let tables_with_joins = match &delete.from {
        FromTable::WithFromKeyword(t) | FromTable::WithoutKeyword(t) => t,
    };
    match tables_with_joins.first() {
        Some(first) => table_factor_name(&first.relation),
        None => Err(SqlError::Parse("DELETE without table".into())),
    }
}

fn table_factor_name(tf: &TableFactor) -> Result<String, SqlError> {
    match tf {
        TableFactor::Table { name, .. } => {
            object_name_last(name).ok_or_else(|| SqlError::Parse("empty table name".into()))
        }
        _ => Err(SqlError::Parse("complex table expression".into())),
    }
}

/// Values of a single-row INSERT, in the order written.
fn extract_insert_values(insert: &ast::Insert) -> Result<Vec<Expr>, SqlError> {
    let body = insert
        .source
        .as_ref()
        .ok_or(SqlError::Parse("no VALUES".into()))?;
    match body.body.as_ref() {
        SetExpr::Values(values) => match values.rows.as_slice() {
            [] => Err(SqlError::Parse("empty VALUES".into())),
            [row] => Ok(row.clone()),
            _ => Err(SqlError::Unsupported("multi-row INSERT".into())),
        },
        _ => Err(SqlError::Parse("expected VALUES".into())),
    }
}

fn extract_where_id(selection: &Option<Expr>) -> Result<Ulid, SqlError> {
    let sel = selection.as_ref().ok_or(SqlError::MissingFilter("id"))?;
    match sel {
        Expr::BinaryOp {
            left,
            op: ast::BinaryOperator::Eq,
            right,
        } if expr_column_name(left).as_deref() == Some("id") => parse_ulid(right),
        _ => Err(SqlError::MissingFilter("id")),
    }
}

fn expr_column_name(expr: &Expr) -> Option<String> {
    match expr {
        Expr::Identifier(ident) => Some(ident.value.to_lowercase()),
        Expr::CompoundIdentifier(parts) => parts.last().map(|i| i.value.to_lowercase()),
        _ => None,
    }
}

fn extract_value(expr: &Expr) -> Option<&Value> {
    match expr {
        Expr::Value(ValueWithSpan { value, .. }) => Some(value),
        _ => None,
    }
}

fn parse_string_or_null(expr: &Expr) -> Result<Option<String>, SqlError> {
    match extract_value(expr) {
        Some(Value::Null) => Ok(None),
        Some(Value::SingleQuotedString(s)) | Some(Value::Number(s, _)) => Ok(Some(s.clone())),
        Some(value) => Err(SqlError::Parse(format!("expected string, got {value}"))),
        None => Err(SqlError::Parse(format!("expected value, got {expr}"))),
    }
}

fn parse_string(expr: &Expr) -> Result<String, SqlError> {
    parse_string_or_null(expr)?.ok_or_else(|| SqlError::Parse("unexpected NULL".into()))
}

fn parse_ulid(expr: &Expr) -> Result<Ulid, SqlError> {
    let s = parse_string(expr)?;
    Ulid::from_string(s.trim()).map_err(|e| SqlError::Parse(format!("bad ULID {s:?}: {e}")))
}

fn parse_ulid_or_null(expr: &Expr) -> Result<Option<Ulid>, SqlError> {
    match extract_value(expr) {
        Some(Value::Null) => Ok(None),
        _ => parse_ulid(expr).map(Some),
    }
}

fn parse_day(expr: &Expr) -> Result<Day, SqlError> {
    let s = parse_string(expr)?;
    Day::parse(&s).map_err(|e| SqlError::Parse(e.to_string()))
}

fn parse_i64(expr: &Expr) -> Result<i64, SqlError> {
    if let Expr::UnaryOp {
        op: ast::UnaryOperator::Minus,
        expr,
    } = expr
    {
        return Ok(-parse_i64(expr)?);
    }
    let s = parse_string(expr)?;
    s.trim()
        .parse()
        .map_err(|e| SqlError::Parse(format!("bad integer {s:?}: {e}")))
}

fn parse_u32(expr: &Expr) -> Result<u32, SqlError> {
    let v = parse_i64(expr)?;
    u32::try_from(v).map_err(|_| SqlError::Parse(format!("{v} out of range")))
}

fn parse_rental_status(expr: &Expr) -> Result<RentalStatus, SqlError> {
    let s = parse_string(expr)?;
    RentalStatus::parse(&s).ok_or_else(|| SqlError::Parse(format!("unknown rental status {s:?}")))
}

fn parse_camera_status(expr: &Expr) -> Result<CameraStatus, SqlError> {
    let s = parse_string(expr)?;
    CameraStatus::parse(&s).ok_or_else(|| SqlError::Parse(format!("unknown camera status {s:?}")))
}

// ── Errors ────────────────────────────────────────────────────

#[derive(Debug)]
pub enum SqlError {
    Parse(String),
    Empty,
    Unsupported(String),
    UnknownTable(String),
    UnknownColumn(String),
    WrongArity(&'static str, usize, usize),
    MissingColumn(&'static str),
    MissingFilter(&'static str),
}

impl std::fmt::Display for SqlError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            SqlError::Parse(s) => write!(f, "parse error: {s}"),
            SqlError::Empty => write!(f, "empty query"),
            SqlError::Unsupported(s) => write!(f, "unsupported: {s}"),
            SqlError::UnknownTable(t) => write!(f, "unknown table: {t}"),
            SqlError::UnknownColumn(c) => write!(f, "unknown column: {c}"),
            SqlError::WrongArity(t, expected, got) => {
                write!(f, "{t}: expected at least {expected} values, got {got}")
            }
            SqlError::MissingColumn(col) => write!(f, "missing value for column {col}"),
            SqlError::MissingFilter(col) => write!(f, "missing filter: {col}"),
        }
    }
}

impl std::error::Error for SqlError {}

#[cfg(test)]
mod tests {
    use super::*;

    const CAM: &str = "01ARZ3NDEKTSV4RRFFQ69G5FAV";
    const RENTAL: &str = "01BX5ZZKBKACTAV9WEVGEMMVRY";

    fn day(s: &str) -> Day {
        Day::parse(s).unwrap()
    }

    fn ulid(s: &str) -> Ulid {
        Ulid::from_string(s).unwrap()
    }

    #[test]
    fn parse_insert_camera() {
        let cmd = parse_sql("INSERT INTO cameras (name) VALUES ('Fujifilm X100V')").unwrap();
        assert_eq!(
            cmd,
            Command::InsertCamera {
                name: "Fujifilm X100V".into(),
                link: None
            }
        );

        let sql = "INSERT INTO cameras (name, link) VALUES ('GR III', 'https://ricoh.example/gr3')";
        match parse_sql(sql).unwrap() {
            Command::InsertCamera { link, .. } => {
                assert_eq!(link.as_deref(), Some("https://ricoh.example/gr3"))
            }
            cmd => panic!("expected InsertCamera, got {cmd:?}"),
        }
    }

    #[test]
    fn parse_update_camera() {
        let sql = format!("UPDATE cameras SET name = 'Q3', status = 'maintenance' WHERE id = '{CAM}'");
        match parse_sql(&sql).unwrap() {
            Command::UpdateCamera { id, patch } => {
                assert_eq!(id, ulid(CAM));
                assert_eq!(patch.name.as_deref(), Some("Q3"));
                assert_eq!(patch.link, None);
                assert_eq!(patch.status, Some(CameraStatus::Maintenance));
            }
            cmd => panic!("expected UpdateCamera, got {cmd:?}"),
        }
    }

    #[test]
    fn parse_update_requires_id_filter() {
        assert!(matches!(
            parse_sql("UPDATE cameras SET name = 'Q3'"),
            Err(SqlError::MissingFilter("id"))
        ));
        let sql = format!("UPDATE cameras SET serial = 'x' WHERE id = '{CAM}'");
        assert!(matches!(parse_sql(&sql), Err(SqlError::UnknownColumn(_))));
    }

    #[test]
    fn parse_delete_camera_and_rental() {
        let sql = format!("DELETE FROM cameras WHERE id = '{CAM}'");
        assert_eq!(parse_sql(&sql).unwrap(), Command::DeleteCamera { id: ulid(CAM) });
        let sql = format!("DELETE FROM rentals WHERE id = '{RENTAL}'");
        assert_eq!(parse_sql(&sql).unwrap(), Command::CancelRental { id: ulid(RENTAL) });
    }

    #[test]
    fn parse_insert_rental() {
        let sql = format!(
            "INSERT INTO rentals (camera_id, start_date, end_date, notes) VALUES ('{CAM}', '2024-01-01', '2024-01-05', 'festival')"
        );
        match parse_sql(&sql).unwrap() {
            Command::InsertRental { draft } => {
                assert_eq!(draft.camera_id, ulid(CAM));
                assert_eq!(draft.start, day("2024-01-01"));
                assert_eq!(draft.end, day("2024-01-05"));
                assert_eq!(draft.notes.as_deref(), Some("festival"));
                assert_eq!(draft.color, None);
            }
            cmd => panic!("expected InsertRental, got {cmd:?}"),
        }
    }

    #[test]
    fn parse_insert_rental_truncates_timestamps() {
        let sql = format!(
            "INSERT INTO rentals VALUES ('{CAM}', '2024-03-01T23:30:00-05:00', '2024-03-02T00:00:00Z')"
        );
        match parse_sql(&sql).unwrap() {
            Command::InsertRental { draft } => {
                assert_eq!(draft.start, day("2024-03-01"));
                assert_eq!(draft.end, day("2024-03-02"));
            }
            cmd => panic!("expected InsertRental, got {cmd:?}"),
        }
    }

    #[test]
    fn parse_insert_rental_rejects_bad_input() {
        let short = format!("INSERT INTO rentals VALUES ('{CAM}', '2024-01-01')");
        assert!(matches!(parse_sql(&short), Err(SqlError::WrongArity("rentals", 3, 2))));
        let bad_day = format!("INSERT INTO rentals VALUES ('{CAM}', '2023-02-29', '2023-03-01')");
        assert!(matches!(parse_sql(&bad_day), Err(SqlError::Parse(_))));
        let bad_id = "INSERT INTO rentals VALUES ('not-a-ulid', '2024-01-01', '2024-01-02')";
        assert!(matches!(parse_sql(bad_id), Err(SqlError::Parse(_))));
        let multi = format!(
            "INSERT INTO rentals VALUES ('{CAM}', '2024-01-01', '2024-01-02'), ('{CAM}', '2024-02-01', '2024-02-02')"
        );
        assert!(matches!(parse_sql(&multi), Err(SqlError::Unsupported(_))));
    }

    #[test]
    fn insert_values_follow_the_column_list() {
        let sql = "INSERT INTO cameras (link, name) VALUES ('https://ricoh.example', 'GR III')";
        assert_eq!(
            parse_sql(sql).unwrap(),
            Command::InsertCamera {
                name: "GR III".into(),
                link: Some("https://ricoh.example".into()),
            }
        );

        let sql = format!(
            "INSERT INTO rentals (end_date, color, camera_id, start_date) VALUES ('2024-01-05', '#ff0000', '{CAM}', '2024-01-01')"
        );
        match parse_sql(&sql).unwrap() {
            Command::InsertRental { draft } => {
                assert_eq!(draft.camera_id, ulid(CAM));
                assert_eq!(draft.start, day("2024-01-01"));
                assert_eq!(draft.end, day("2024-01-05"));
                assert_eq!(draft.notes, None);
                assert_eq!(draft.color.as_deref(), Some("#ff0000"));
            }
            cmd => panic!("expected InsertRental, got {cmd:?}"),
        }
    }

    #[test]
    fn insert_column_list_is_checked() {
        let unknown = "INSERT INTO cameras (name, price) VALUES ('GR III', 10)";
        assert!(matches!(parse_sql(unknown), Err(SqlError::UnknownColumn(c)) if c == "price"));
        let missing = format!("INSERT INTO rentals (camera_id, end_date) VALUES ('{CAM}', '2024-01-05')");
        assert!(matches!(parse_sql(&missing), Err(SqlError::MissingColumn("start_date"))));
        let twice = "INSERT INTO cameras (name, name) VALUES ('a', 'b')";
        assert!(matches!(parse_sql(twice), Err(SqlError::Parse(_))));
        let mismatched = "INSERT INTO cameras (name, link) VALUES ('a')";
        assert!(matches!(parse_sql(mismatched), Err(SqlError::Parse(_))));
        let too_many = "INSERT INTO cameras VALUES ('a', 'b', 'c')";
        assert!(matches!(parse_sql(too_many), Err(SqlError::Unsupported(_))));
    }

    #[test]
    fn parse_update_rental() {
        let sql = format!(
            "UPDATE rentals SET end_date = '2024-01-09', color = NULL, status = 'canceled' WHERE id = '{RENTAL}'"
        );
        match parse_sql(&sql).unwrap() {
            Command::UpdateRental { id, patch } => {
                assert_eq!(id, ulid(RENTAL));
                assert_eq!(patch.start, None);
                assert_eq!(patch.end, Some(day("2024-01-09")));
                assert_eq!(patch.color.as_deref(), Some(""));
                assert_eq!(patch.status, Some(RentalStatus::Cancelled));
            }
            cmd => panic!("expected UpdateRental, got {cmd:?}"),
        }
    }

    #[test]
    fn parse_move_and_resize() {
        let sql = format!("INSERT INTO moves VALUES ('{RENTAL}', '2024-02-01', 3)");
        assert_eq!(
            parse_sql(&sql).unwrap(),
            Command::MoveRental {
                id: ulid(RENTAL),
                start: day("2024-02-01"),
                days: 3,
                camera_id: None
            }
        );

        let sql = format!("INSERT INTO moves VALUES ('{RENTAL}', '2024-02-01', 3, '{CAM}')");
        match parse_sql(&sql).unwrap() {
            Command::MoveRental { camera_id, .. } => assert_eq!(camera_id, Some(ulid(CAM))),
            cmd => panic!("expected MoveRental, got {cmd:?}"),
        }

        let negative = format!("INSERT INTO moves VALUES ('{RENTAL}', '2024-02-01', -1)");
        assert!(matches!(parse_sql(&negative), Err(SqlError::Parse(_))));

        let sql = format!("INSERT INTO resizes VALUES ('{RENTAL}', '2024-02-01', '2024-02-04', NULL)");
        assert_eq!(
            parse_sql(&sql).unwrap(),
            Command::ResizeRental {
                id: ulid(RENTAL),
                start: day("2024-02-01"),
                end: day("2024-02-04"),
                camera_id: None
            }
        );
    }

    #[test]
    fn parse_select_cameras() {
        assert_eq!(
            parse_sql("SELECT * FROM cameras").unwrap(),
            Command::SelectCameras { id: None }
        );
        let sql = format!("SELECT * FROM cameras WHERE id = '{CAM}'");
        assert_eq!(
            parse_sql(&sql).unwrap(),
            Command::SelectCameras { id: Some(ulid(CAM)) }
        );
    }

    #[test]
    fn parse_select_rentals_filters() {
        assert_eq!(
            parse_sql("SELECT * FROM rentals").unwrap(),
            Command::SelectRentals {
                filter: RentalFilter::default()
            }
        );
        let sql = format!("SELECT * FROM rentals WHERE camera_id = '{CAM}' AND status = 'active'");
        assert_eq!(
            parse_sql(&sql).unwrap(),
            Command::SelectRentals {
                filter: RentalFilter {
                    id: None,
                    camera_id: Some(ulid(CAM)),
                    status: Some(RentalStatus::Active),
                }
            }
        );
        let sql = "SELECT * FROM rentals WHERE start_date = '2024-01-01'";
        assert!(matches!(parse_sql(sql), Err(SqlError::UnknownColumn(_))));
        let sql = "SELECT * FROM rentals WHERE status = 'active' OR status = 'cancelled'";
        assert!(matches!(parse_sql(sql), Err(SqlError::Unsupported(_))));
    }

    #[test]
    fn mutations_are_flagged() {
        assert!(!parse_sql("SELECT * FROM rentals").unwrap().is_mutation());
        assert!(parse_sql("INSERT INTO cameras VALUES ('A')").unwrap().is_mutation());
        let sql = format!("DELETE FROM rentals WHERE id = '{RENTAL}'");
        assert!(parse_sql(&sql).unwrap().is_mutation());
    }

    #[test]
    fn target_table_without_full_parse() {
        assert_eq!(target_table("SELECT * FROM rentals WHERE camera_id = $1").as_deref(), Some("rentals"));
        assert_eq!(target_table("insert into Moves(rental_id) values ($1)").as_deref(), Some("moves"));
        assert_eq!(target_table("UPDATE public.cameras SET name = $1").as_deref(), Some("cameras"));
        assert_eq!(target_table("SHOW timezone"), None);
    }

    #[test]
    fn parse_errors() {
        assert!(matches!(parse_sql(""), Err(SqlError::Empty)));
        assert!(matches!(parse_sql("INSERT INTO foobar VALUES (1)"), Err(SqlError::UnknownTable(_))));
        assert!(matches!(parse_sql("SELECT 1; SELECT 2"), Err(SqlError::Unsupported(_))));
    }
}
