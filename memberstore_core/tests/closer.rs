use std::panic::{self, AssertUnwindSafe};

use assert_matches::assert_matches;
use memberstore_core::db::{closer, ConnectionMethods, ConnectionProvider, Scope};
use memberstore_core::{Error, SqlVal};
use memberstore_test_helper::{common_setup, Event, Faults, FaultyProvider};
use pretty_assertions::assert_eq;

fn open_all(provider: &FaultyProvider) {
    let conn = provider.acquire().unwrap();
    let mut stmt = conn.prepare("select member_id, money from member").unwrap();
    let cursor = stmt.execute_query().unwrap();
    closer::release(provider, Some(conn), Some(stmt), Some(cursor));
}

#[test]
fn releases_in_reverse_acquisition_order() {
    common_setup();
    let provider = FaultyProvider::new(Faults::default());
    open_all(&provider);

    let releases = provider.releases();
    assert_eq!(releases.len(), 3);
    assert_eq!(releases[0], Event::CursorClose);
    assert_eq!(releases[1], Event::StatementClose);
    assert_matches!(releases[2], Event::ConnectionRelease(_));
}

#[test]
fn cursor_close_failure_does_not_skip_the_rest() {
    common_setup();
    let provider = FaultyProvider::new(Faults {
        cursor_close: true,
        ..Default::default()
    });
    open_all(&provider);

    assert_eq!(provider.count(|e| *e == Event::CursorClose), 1);
    assert_eq!(provider.count(|e| *e == Event::StatementClose), 1);
    assert_eq!(
        provider.count(|e| matches!(e, Event::ConnectionRelease(_))),
        1
    );
}

#[test]
fn statement_close_failure_still_releases_connection() {
    common_setup();
    let provider = FaultyProvider::new(Faults {
        statement_close: true,
        ..Default::default()
    });
    open_all(&provider);

    assert_matches!(
        provider.releases().as_slice(),
        [
            Event::CursorClose,
            Event::StatementClose,
            Event::ConnectionRelease(_)
        ]
    );
}

#[test]
fn every_release_failing_is_still_contained() {
    common_setup();
    let provider = FaultyProvider::new(Faults {
        cursor_close: true,
        statement_close: true,
        connection_release: true,
        ..Default::default()
    });
    open_all(&provider);
    assert_eq!(provider.releases().len(), 3);
}

#[test]
fn absent_resources_are_skipped() {
    common_setup();
    let provider = FaultyProvider::new(Faults::default());
    closer::release(&provider, None, None, None);
    assert!(provider.events().is_empty());

    let conn = provider.acquire().unwrap();
    let id = conn.id();
    closer::release(&provider, Some(conn), None, None);
    assert_eq!(provider.releases(), vec![Event::ConnectionRelease(id)]);
}

#[test]
fn scope_releases_on_normal_exit() {
    common_setup();
    let provider = FaultyProvider::new(Faults::default()).with_rows(vec![vec![
        SqlVal::Text("memberA".into()),
        SqlVal::BigInt(10),
    ]]);
    {
        let mut scope = Scope::open(&provider).unwrap();
        scope
            .prepare("select member_id, money from member where member_id = ?")
            .unwrap()
            .bind(1, SqlVal::Text("memberA".into()))
            .unwrap();
        let row = scope.query().unwrap().next().unwrap().unwrap();
        assert_eq!(row.get_as::<i64>("money").unwrap(), 10);
        assert!(provider.releases().is_empty());
    }
    assert_eq!(provider.releases().len(), 3);
}

#[test]
fn scope_releases_only_what_was_opened() {
    common_setup();
    let provider = FaultyProvider::new(Faults {
        prepare: true,
        ..Default::default()
    });
    let result = (|| -> memberstore_core::Result<()> {
        let mut scope = Scope::open(&provider)?;
        scope.prepare("delete from member where member_id = ?")?;
        Ok(())
    })();
    assert_matches!(result, Err(Error::Internal(_)));
    assert_matches!(provider.releases().as_slice(), [Event::ConnectionRelease(_)]);
}

#[test]
fn scope_releases_while_unwinding() {
    common_setup();
    let provider = FaultyProvider::new(Faults::default());
    let outcome = panic::catch_unwind(AssertUnwindSafe(|| {
        let mut scope = Scope::open(&provider).unwrap();
        scope.prepare("update member set money = ? where member_id = ?").unwrap();
        panic!("work failed while the statement was open");
    }));
    assert!(outcome.is_err());
    assert_matches!(
        provider.releases().as_slice(),
        [Event::StatementClose, Event::ConnectionRelease(_)]
    );
}

#[test]
fn scope_holds_a_single_statement_and_cursor() {
    common_setup();
    let provider = FaultyProvider::new(Faults::default());
    let mut scope = Scope::open(&provider).unwrap();
    assert_matches!(scope.query(), Err(Error::NotOpen("statement")));
    scope.prepare("select 1").unwrap();
    assert_matches!(scope.prepare("select 2"), Err(Error::AlreadyOpen("statement")));
    scope.query().unwrap();
    assert_matches!(scope.query(), Err(Error::AlreadyOpen("cursor")));
}

#[test]
fn failed_acquire_opens_nothing() {
    common_setup();
    let provider = FaultyProvider::new(Faults {
        acquire: true,
        ..Default::default()
    });
    assert_matches!(Scope::open(&provider), Err(Error::Internal(_)));
    assert!(provider.events().is_empty());
}
