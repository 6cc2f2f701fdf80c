use assert_matches::assert_matches;
use memberstore_core::db::sqlite::BACKEND_NAME;
use memberstore_core::db::{
    connect, BackendConnection, ConnectionMethods, ConnectionProvider, ConnectionSpec, DirectDial,
};
use memberstore_core::{Error, SqlVal};
use memberstore_test_helper::{sqlite_setup, sqlite_setup_without_schema};
use pretty_assertions::assert_eq;

#[test]
fn direct_dial_opens_a_new_connection_every_time() {
    let data = sqlite_setup();
    let provider = data.direct_dial();

    let con1 = provider.acquire().unwrap();
    let con2 = provider.acquire().unwrap();
    assert_ne!(con1.id(), con2.id());
    assert_eq!(con1.backend_name(), BACKEND_NAME);

    provider.release(con1).unwrap();
    provider.release(con2).unwrap();
}

#[test]
fn direct_dial_connections_see_each_others_writes() {
    let data = sqlite_setup();
    let provider = data.direct_dial();

    let writer = provider.acquire().unwrap();
    writer
        .execute("insert into member(member_id, money) values('memberA', 10)")
        .unwrap();
    provider.release(writer).unwrap();

    let reader = provider.acquire().unwrap();
    let mut stmt = reader
        .prepare("select money from member where member_id = ?")
        .unwrap();
    stmt.bind(1, SqlVal::Text("memberA".into())).unwrap();
    let mut cursor = stmt.execute_query().unwrap();
    let row = cursor.next().unwrap().unwrap();
    assert_eq!(row.get_as::<i64>("money").unwrap(), 10);
    cursor.close().unwrap();
    stmt.close().unwrap();
    provider.release(reader).unwrap();
}

#[test]
fn release_fails_while_a_statement_is_still_open() {
    let data = sqlite_setup();
    let provider = data.direct_dial();
    let conn = provider.acquire().unwrap();
    let id = conn.id();
    let stmt = conn.prepare("select 1").unwrap();
    assert_matches!(provider.release(conn), Err(Error::ConnectionInUse(i)) if i == id);
    drop(stmt);
}

#[test]
fn prepare_against_missing_relation_fails() {
    let data = sqlite_setup_without_schema();
    let conn = connect(&data.connspec()).unwrap();
    assert_matches!(
        conn.prepare("select member_id, money from member"),
        Err(Error::SQLite(_))
    );
    conn.close().unwrap();
}

#[test]
fn unknown_backend_is_rejected() {
    let spec = ConnectionSpec::new("h2", "jdbc:h2:tcp://localhost/~/test");
    assert_matches!(DirectDial::new(spec.clone()), Err(Error::UnknownBackend(name)) if name == "h2");
    assert_matches!(connect(&spec), Err(Error::UnknownBackend(_)));
}

#[test]
fn connspec_persists_to_a_directory() {
    let dir = tempfile::tempdir().unwrap();
    let spec = ConnectionSpec::new(BACKEND_NAME, "member.db").with_credentials("sa", "secret");
    spec.save(dir.path()).unwrap();
    assert!(dir.path().join("connection.json").exists());
    assert_eq!(ConnectionSpec::load(dir.path()).unwrap(), spec);
}

#[test]
fn connspec_debug_hides_password() {
    let spec = ConnectionSpec::new(BACKEND_NAME, "member.db").with_credentials("sa", "secret");
    let debug = format!("{spec:?}");
    assert!(debug.contains("sa"));
    assert!(!debug.contains("secret"));
}
