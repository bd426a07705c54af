use std::net::SocketAddr;
use std::sync::Arc;

use tokio::net::TcpListener;
use tokio_postgres::{Client, Config, NoTls, SimpleQueryMessage, SimpleQueryRow};

use camrent::auth::Credentials;
use camrent::engine::Engine;
use camrent::notify::NotifyHub;
use camrent::wire::{self, RentalFactory};

// ── Test infrastructure ──────────────────────────────────────

async fn start_test_server() -> (SocketAddr, Arc<Engine>) {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();

    let engine = Arc::new(Engine::in_memory(Arc::new(NotifyHub::new())));
    let factory = RentalFactory::new(
        engine.clone(),
        Credentials {
            admin_password: "admin123".into(),
            visitor_password: "visitor".into(),
        },
    );

    tokio::spawn(async move {
        loop {
            let (socket, _) = match listener.accept().await {
                Ok(conn) => conn,
                Err(_) => break,
            };
            let factory = factory.clone();
            tokio::spawn(async move {
                let _ = wire::process_connection(socket, factory, None).await;
            });
        }
    });

    (addr, engine)
}

async fn connect_as(addr: SocketAddr, user: &str, password: &str) -> Result<Client, tokio_postgres::Error> {
    let mut config = Config::new();
    config
        .host(addr.ip().to_string())
        .port(addr.port())
        .dbname("camrent")
        .user(user)
        .password(password);

    let (client, connection) = config.connect(NoTls).await?;
    tokio::spawn(async move {
        let _ = connection.await;
    });
    Ok(client)
}

async fn admin(addr: SocketAddr) -> Client {
    connect_as(addr, "admin", "admin123").await.unwrap()
}

async fn rows(client: &Client, sql: &str) -> Result<Vec<SimpleQueryRow>, tokio_postgres::Error> {
    let messages = client.simple_query(sql).await?;
    Ok(messages
        .into_iter()
        .filter_map(|m| match m {
            SimpleQueryMessage::Row(row) => Some(row),
            _ => None,
        })
        .collect())
}

fn sqlstate(err: &tokio_postgres::Error) -> Option<&str> {
    err.as_db_error().map(|db| db.code().code())
}

// ── Tests ────────────────────────────────────────────────────

#[tokio::test]
async fn booking_flow_over_the_wire() {
    let (addr, engine) = start_test_server().await;
    let client = admin(addr).await;

    let cams = rows(&client, "INSERT INTO cameras (name, link) VALUES ('Ricoh GR III', 'https://ricoh.example')")
        .await
        .unwrap();
    assert_eq!(cams.len(), 1);
    assert_eq!(cams[0].get("name"), Some("Ricoh GR III"));
    assert_eq!(cams[0].get("status"), Some("available"));
    let cam_id = cams[0].get("id").unwrap().to_string();

    let booked = rows(
        &client,
        &format!(
            "INSERT INTO rentals (camera_id, start_date, end_date, notes) VALUES ('{cam_id}', '2024-06-01', '2024-06-03', 'wedding')"
        ),
    )
    .await
    .unwrap();
    assert_eq!(booked[0].get("camera_name"), Some("Ricoh GR III"));
    assert_eq!(booked[0].get("days"), Some("3"));
    assert_eq!(booked[0].get("color"), Some("#409eff"));
    let rental_id = booked[0].get("id").unwrap().to_string();

    // Touching the last day is a conflict.
    let err = rows(
        &client,
        &format!(
            "INSERT INTO rentals (camera_id, start_date, end_date) VALUES ('{cam_id}', '2024-06-03', '2024-06-05')"
        ),
    )
    .await
    .unwrap_err();
    assert_eq!(sqlstate(&err), Some("P0001"));
    assert!(err.as_db_error().unwrap().message().contains(&rental_id));

    let moved = rows(
        &client,
        &format!("INSERT INTO moves (rental_id, start_date, days) VALUES ('{rental_id}', '2024-06-10', 2)"),
    )
    .await
    .unwrap();
    assert_eq!(moved[0].get("start_date"), Some("2024-06-10"));
    assert_eq!(moved[0].get("end_date"), Some("2024-06-11"));

    let resized = rows(
        &client,
        &format!(
            "INSERT INTO resizes (rental_id, start_date, end_date) VALUES ('{rental_id}', '2024-06-09', '2024-06-12')"
        ),
    )
    .await
    .unwrap();
    assert_eq!(resized[0].get("days"), Some("4"));

    client
        .batch_execute(&format!("DELETE FROM rentals WHERE id = '{rental_id}'"))
        .await
        .unwrap();
    let listed = rows(&client, &format!("SELECT * FROM rentals WHERE camera_id = '{cam_id}'"))
        .await
        .unwrap();
    assert_eq!(listed.len(), 1);
    assert_eq!(listed[0].get("status"), Some("cancelled"));

    let again = client
        .batch_execute(&format!("DELETE FROM rentals WHERE id = '{rental_id}'"))
        .await
        .unwrap_err();
    assert_eq!(sqlstate(&again), Some("P0001"));

    assert_eq!(engine.list_cameras().await.len(), 1);
}

#[tokio::test]
async fn bad_sql_and_bad_dates_are_syntax_errors() {
    let (addr, _engine) = start_test_server().await;
    let client = admin(addr).await;

    let err = client.batch_execute("SELECT * FROM bookings").await.unwrap_err();
    assert_eq!(sqlstate(&err), Some("42601"));

    client
        .batch_execute("INSERT INTO cameras (name) VALUES ('Fuji X100V')")
        .await
        .unwrap();
    let cams = rows(&client, "SELECT * FROM cameras").await.unwrap();
    let cam_id = cams[0].get("id").unwrap();
    let err = client
        .batch_execute(&format!(
            "INSERT INTO rentals (camera_id, start_date, end_date) VALUES ('{cam_id}', '2024-02-30', '2024-03-01')"
        ))
        .await
        .unwrap_err();
    assert_eq!(sqlstate(&err), Some("42601"));
}

#[tokio::test]
async fn visitor_reads_but_cannot_write() {
    let (addr, _engine) = start_test_server().await;
    admin(addr)
        .await
        .batch_execute("INSERT INTO cameras (name) VALUES ('Leica Q2')")
        .await
        .unwrap();

    let visitor = connect_as(addr, "visitor", "visitor").await.unwrap();
    let cams = rows(&visitor, "SELECT * FROM cameras").await.unwrap();
    assert_eq!(cams.len(), 1);
    assert_eq!(cams[0].get("name"), Some("Leica Q2"));

    let err = visitor
        .batch_execute("INSERT INTO cameras (name) VALUES ('Sneaky')")
        .await
        .unwrap_err();
    assert_eq!(sqlstate(&err), Some("42501"));
    assert_eq!(rows(&visitor, "SELECT * FROM cameras").await.unwrap().len(), 1);
}

#[tokio::test]
async fn unknown_user_and_wrong_password_refused() {
    let (addr, _engine) = start_test_server().await;
    assert!(connect_as(addr, "postgres", "admin123").await.is_err());
    assert!(connect_as(addr, "admin", "nope").await.is_err());
}

#[tokio::test]
async fn extended_query_with_parameters() {
    let (addr, _engine) = start_test_server().await;
    let client = admin(addr).await;

    let cams = rows(&client, "INSERT INTO cameras (name) VALUES ('Sony RX100')")
        .await
        .unwrap();
    let cam_id = cams[0].get("id").unwrap().to_string();

    client
        .execute(
            "INSERT INTO rentals (camera_id, start_date, end_date, notes) VALUES ($1, $2, $3, $4)",
            &[&cam_id, &"2024-07-01", &"2024-07-02", &"it's for a trip"],
        )
        .await
        .unwrap();

    let found = client
        .query(
            "SELECT * FROM rentals WHERE camera_id = $1 AND status = $2",
            &[&cam_id, &"active"],
        )
        .await
        .unwrap();
    assert_eq!(found.len(), 1);
    let notes: String = found[0].get("notes");
    let start: String = found[0].get("start_date");
    let camera_name: String = found[0].get("camera_name");
    assert_eq!(notes, "it's for a trip");
    assert_eq!(start, "2024-07-01");
    assert_eq!(camera_name, "Sony RX100");
}
