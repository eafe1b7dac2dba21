mod common;

use std::sync::{Arc, Mutex};
use std::time::Duration;

use common::RecordingConnector;
use sqlkit::prelude::*;

fn recording_db(options: DbOptions) -> (Db, Arc<common::Journal>) {
    let connector = RecordingConnector::new();
    let journal = Arc::clone(&connector.journal);
    (Db::new(connector, options), journal)
}

async fn wait_for(journal: &common::Journal, entry: &str) {
    tokio::time::timeout(Duration::from_secs(5), async {
        while journal.count(entry) == 0 {
            tokio::time::sleep(Duration::from_millis(1)).await;
        }
    })
    .await
    .expect("statement was never sent");
}

#[tokio::test]
async fn nested_transactions_use_savepoints() -> Result<(), SqlKitError> {
    let (db, journal) = recording_db(DbOptions::default());

    let t1 = db.begin(Scope::background()).await?;
    let t2 = db.begin(&t1).await?;
    db.exec(&t2, &raw("INSERT INTO users (id) VALUES (?)", args![1])).await?;
    t2.commit().await?;
    let t3 = db.begin(&t1).await?;
    db.exec(&t3, &raw("INSERT INTO users (id) VALUES (?)", args![2])).await?;
    t3.rollback().await?;
    t1.commit().await?;

    assert_eq!(
        journal.normalized(),
        vec![
            "BEGIN",
            "SAVEPOINT sp",
            "INSERT INTO users (id) VALUES (?)",
            "RELEASE SAVEPOINT sp",
            "SAVEPOINT sp",
            "INSERT INTO users (id) VALUES (?)",
            "ROLLBACK TO SAVEPOINT sp",
            "COMMIT",
        ]
    );
    assert!(t2.savepoint_name().is_some());
    assert_ne!(t2.savepoint_name(), t3.savepoint_name());
    assert!(t1.savepoint_name().is_none());
    Ok(())
}

#[tokio::test]
async fn commit_and_rollback_are_idempotent() -> Result<(), SqlKitError> {
    let (db, journal) = recording_db(DbOptions::default());

    let tx = db.begin(Scope::background()).await?;
    tx.commit().await?;
    tx.commit().await?;
    tx.rollback().await?;
    assert_eq!(tx.state(), TxState::Committed);

    let tx = db.begin(Scope::background()).await?;
    tx.rollback().await?;
    tx.rollback().await?;
    tx.commit().await?;
    assert_eq!(tx.state(), TxState::RolledBack);

    assert_eq!(journal.entries(), vec!["BEGIN", "COMMIT", "BEGIN", "ROLLBACK"]);
    Ok(())
}

#[tokio::test]
async fn cancelling_a_savepoint_rolls_it_back_once() -> Result<(), SqlKitError> {
    let (db, journal) = recording_db(DbOptions::default());
    let token = CancellationToken::new();

    let t1 = db.begin(Scope::background()).await?;
    let t2 = db.begin(Scope::from(&t1).cancelled_by(token.clone())).await?;
    token.cancel();
    wait_for(&journal, "ROLLBACK TO SAVEPOINT sp").await;

    assert_eq!(t2.state(), TxState::RolledBack);
    assert!(matches!(t2.commit().await, Err(SqlKitError::Cancelled)));
    t2.rollback().await?;
    assert_eq!(journal.count("ROLLBACK TO SAVEPOINT sp"), 1);

    // The parent is not bound to the token and still commits.
    t1.commit().await?;
    assert_eq!(journal.count("COMMIT"), 1);
    Ok(())
}

#[tokio::test]
async fn cancelled_scope_refuses_new_work() -> Result<(), SqlKitError> {
    let (db, journal) = recording_db(DbOptions::default());
    let token = CancellationToken::new();
    token.cancel();

    let err = db.begin(token.clone()).await.unwrap_err();
    assert!(matches!(err, SqlKitError::Cancelled));
    let err = db
        .exec(Scope::with_cancellation(token), &raw("DELETE FROM users", vec![]))
        .await
        .unwrap_err();
    assert!(matches!(err, SqlKitError::Cancelled));
    assert!(journal.entries().is_empty());
    Ok(())
}

#[tokio::test]
async fn root_cancellation_rolls_back_the_physical_transaction() -> Result<(), SqlKitError> {
    let (db, journal) = recording_db(DbOptions::default());
    let token = CancellationToken::new();

    let tx = db.begin(token.clone()).await?;
    token.cancel();
    wait_for(&journal, "ROLLBACK").await;

    assert!(matches!(tx.commit().await, Err(SqlKitError::Cancelled)));
    assert_eq!(journal.entries(), vec!["BEGIN", "ROLLBACK"]);
    Ok(())
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn commit_racing_cancellation_never_reports_success_after_rollback() -> Result<(), SqlKitError>
{
    for _ in 0..200 {
        let (db, journal) = recording_db(DbOptions::default());
        let token = CancellationToken::new();
        let tx = db.begin(token.clone()).await?;

        let canceller = tokio::spawn(async move { token.cancel() });
        let committed = tx.commit().await;
        canceller.await.expect("cancel task panicked");

        match committed {
            Ok(()) => {
                assert_eq!(tx.state(), TxState::Committed);
                assert_eq!(journal.count("ROLLBACK"), 0);
            }
            Err(SqlKitError::Cancelled) => assert_ne!(tx.state(), TxState::Committed),
            Err(other) => panic!("unexpected error: {other:?}"),
        }
    }
    Ok(())
}

#[tokio::test]
async fn finished_transactions_reject_statements() -> Result<(), SqlKitError> {
    let (db, _journal) = recording_db(DbOptions::default());

    let tx = db.begin(Scope::background()).await?;
    tx.commit().await?;

    let err = db.exec(&tx, &raw("DELETE FROM users", vec![])).await.unwrap_err();
    assert!(matches!(err, SqlKitError::TransactionDone));
    let err = db.begin(&tx).await.unwrap_err();
    assert!(matches!(err, SqlKitError::TransactionDone));
    Ok(())
}

#[tokio::test]
async fn disabled_savepoints_reject_nesting() -> Result<(), SqlKitError> {
    let (db, journal) = recording_db(DbOptions::default().with_disabled_savepoints());

    let tx = db.begin(Scope::background()).await?;
    let err = db.begin(&tx).await.unwrap_err();
    assert!(matches!(err, SqlKitError::NestedTransactionsDisabled));
    tx.commit().await?;
    assert_eq!(journal.entries(), vec!["BEGIN", "COMMIT"]);
    Ok(())
}

#[tokio::test]
async fn transact_commits_on_success_and_rolls_back_on_error() -> Result<(), SqlKitError> {
    let (db, journal) = recording_db(DbOptions::default());

    let n: i64 = db
        .transact(Scope::background(), |tx| {
            let db = db.clone();
            async move { db.query(&tx, &raw("SELECT 1 AS n", vec![])).await?.decode_one() }
        })
        .await?;
    assert_eq!(n, 1);

    let err = db
        .transact(Scope::background(), |tx| {
            let db = db.clone();
            async move {
                db.exec(&tx, &raw("INSERT FAIL", vec![])).await?;
                Ok(())
            }
        })
        .await
        .unwrap_err();
    assert!(matches!(err, SqlKitError::Driver(_)));

    assert_eq!(
        journal.entries(),
        vec!["BEGIN", "SELECT 1 AS n", "COMMIT", "BEGIN", "INSERT FAIL", "ROLLBACK"]
    );
    Ok(())
}

#[tokio::test]
async fn transact_reports_failed_rollbacks_with_the_original_error() {
    let (db, journal) = recording_db(DbOptions::default());
    journal.fail_rollbacks();

    let err = db
        .transact(Scope::background(), |_tx| async {
            Err::<(), _>(SqlKitError::Driver("work failed".into()))
        })
        .await
        .unwrap_err();

    match err {
        SqlKitError::Rollback { source, rollback } => {
            assert!(matches!(*source, SqlKitError::Driver(ref m) if m == "work failed"));
            assert!(matches!(*rollback, SqlKitError::Driver(ref m) if m == "rollback refused"));
        }
        other => panic!("unexpected error: {other:?}"),
    }
}

#[tokio::test]
async fn nested_transact_uses_a_savepoint() -> Result<(), SqlKitError> {
    let (db, journal) = recording_db(DbOptions::default());

    let outer = db.begin(Scope::background()).await?;
    let result = db
        .transact(&outer, |_inner| async {
            Err::<(), _>(SqlKitError::Driver("inner failed".into()))
        })
        .await;
    assert!(result.is_err());
    outer.commit().await?;

    assert_eq!(
        journal.normalized(),
        vec!["BEGIN", "SAVEPOINT sp", "ROLLBACK TO SAVEPOINT sp", "COMMIT"]
    );
    Ok(())
}

#[tokio::test]
async fn statements_are_rebound_to_the_database_dialect() -> Result<(), SqlKitError> {
    let (db, journal) = recording_db(DbOptions::default().with_dialect(Dialect::Postgres));

    let stmt = select(["*"]).from("users").where_(in_("id", vec![1, 2, 3]));
    db.query(Scope::background(), &stmt).await?;
    db.query(Scope::background(), &stmt).await?;

    assert_eq!(
        journal.entries(),
        vec![
            "SELECT * FROM users WHERE (id IN ($1, $2, $3))",
            "SELECT * FROM users WHERE (id IN ($1, $2, $3))",
        ]
    );
    assert_eq!(journal.prepares(), 1);
    assert_eq!(db.cache().len().await, 1);
    Ok(())
}

#[tokio::test]
async fn exec_results_cannot_be_decoded() -> Result<(), SqlKitError> {
    let (db, _journal) = recording_db(DbOptions::default());
    let result = db.exec(Scope::background(), &raw("DELETE FROM users", vec![])).await?;
    assert_eq!(result.rows_affected(), 1);
    assert!(matches!(result.decode_one::<i64>(), Err(SqlKitError::NotAQuery)));
    Ok(())
}

#[tokio::test]
async fn logger_sees_every_statement_once() -> Result<(), SqlKitError> {
    let seen = Arc::new(Mutex::new(Vec::new()));
    let sink = Arc::clone(&seen);
    let logger = move |stmt: &dyn Sql| {
        if let Ok((sql, _)) = stmt.render() {
            sink.lock().unwrap().push(sql);
        }
    };
    let (db, _journal) = recording_db(DbOptions::default().with_logger(logger));

    let tx = db.begin(Scope::background()).await?;
    db.exec(&tx, &raw("DELETE FROM users", vec![])).await?;
    tx.rollback().await?;

    assert_eq!(
        *seen.lock().unwrap(),
        vec!["BEGIN", "DELETE FROM users", "ROLLBACK"]
    );
    Ok(())
}

#[tokio::test]
async fn close_runs_once() -> Result<(), SqlKitError> {
    let (db, journal) = recording_db(DbOptions::default());
    db.query(Scope::background(), &raw("SELECT 1", vec![])).await?;
    db.close().await?;
    db.close().await?;

    assert_eq!(journal.count("CLOSE"), 1);
    assert!(db.query(Scope::background(), &raw("SELECT 1", vec![])).await.is_err());
    Ok(())
}

#[tokio::test]
async fn raw_sequences_expand_once_before_rebinding() -> Result<(), SqlKitError> {
    let (db, journal) = recording_db(DbOptions::default().with_dialect(Dialect::Postgres));

    let stmt = raw("DELETE FROM users WHERE org = ? AND id IN ?", args![7, vec![1, 2]]);
    db.exec(Scope::background(), &stmt).await?;
    assert_eq!(
        journal.entries(),
        vec!["DELETE FROM users WHERE org = $1 AND id IN ($2, $3)"]
    );

    let err = db
        .exec(Scope::background(), &db.insert().into("users").value("ids", vec![1, 2]))
        .await
        .unwrap_err();
    assert!(matches!(err, SqlKitError::Statement(StatementError::Invalid(_))));
    let err = db
        .exec(Scope::background(), &db.update("users").set("ids", vec![1, 2]))
        .await
        .unwrap_err();
    assert!(matches!(err, SqlKitError::Statement(StatementError::Invalid(_))));
    assert_eq!(journal.entries().len(), 1);
    Ok(())
}
