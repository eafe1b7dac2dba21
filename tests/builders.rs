use sqlkit::prelude::*;

#[test]
fn generic_select_keeps_question_marks() {
    let stmt = select(["*"]).from("users").where_raw("name = ?", args!["alice"]);
    let (sql, values) = stmt.render().unwrap();
    assert_eq!(sql, "SELECT * FROM users WHERE (name = ?)");
    assert_eq!(values, vec![Value::from("alice")]);
}

#[test]
fn postgres_select_numbers_placeholders() {
    let stmt = select(["*"])
        .from("users")
        .where_raw("name = ?", args!["alice"])
        .dialect(Dialect::Postgres);
    let (sql, values) = stmt.render().unwrap();
    assert_eq!(sql, "SELECT * FROM users WHERE (name = $1)");
    assert_eq!(values, vec![Value::from("alice")]);
}

#[test]
fn subqueries_share_the_outer_numbering() {
    let active = select(["user_id"]).from("sessions").where_(gt("expires", 100));
    let stmt = select(["*"])
        .from("users")
        .where_(eq("org", 7))
        .where_(in_("id", active))
        .dialect(Dialect::Postgres);
    let (sql, values) = stmt.render().unwrap();
    assert_eq!(
        sql,
        "SELECT * FROM users WHERE ((org = $1) AND (id IN (SELECT user_id FROM sessions WHERE (expires > $2))))"
    );
    assert_eq!(values, args![7, 100]);
}

#[test]
fn builders_are_immutable_and_reusable() {
    let base = select(["id"]).from("users");
    let a = base.where_(eq("a", 1));
    let b = base.where_(eq("b", 2)).limit(5);

    assert_eq!(base.render().unwrap().0, "SELECT id FROM users");
    assert_eq!(a.render().unwrap().0, "SELECT id FROM users WHERE (a = ?)");
    assert_eq!(b.render().unwrap().0, "SELECT id FROM users WHERE (b = ?) LIMIT 5");
}

#[test]
fn oracle_uses_named_placeholders() {
    let stmt = update("users")
        .set("name", "bob")
        .where_(eq("id", 3))
        .dialect(Dialect::Oracle);
    let (sql, values) = stmt.render().unwrap();
    assert_eq!(sql, "UPDATE users SET name=:arg1 WHERE (id = :arg2)");
    assert_eq!(values, args!["bob", 3]);
}

#[test]
fn build_errors_surface_at_render() {
    let err = insert()
        .into("users")
        .row(vec!["a".into(), "b".into()], args![1, 2])
        .row(vec!["a".into(), "c".into()], args![1, 2])
        .render()
        .unwrap_err();
    assert!(matches!(err, SqlKitError::Statement(StatementError::Invalid(_))));

    let err = select(["*"])
        .from("users")
        .where_(in_("id", Vec::<i64>::new()))
        .render()
        .unwrap_err();
    assert!(matches!(err, SqlKitError::Statement(StatementError::EmptyList { .. })));
}

#[test]
fn rebind_skips_literals_and_comments() {
    let sql = "SELECT '?' AS q, x FROM t -- why?\nWHERE a = ? AND b = ?";
    assert_eq!(
        rebind(Dialect::Postgres, sql),
        "SELECT '?' AS q, x FROM t -- why?\nWHERE a = $1 AND b = $2"
    );
    assert_eq!(rebind(Dialect::MySql, sql), sql);
}
