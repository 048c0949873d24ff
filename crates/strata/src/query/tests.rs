use super::*;
use crate::config::Config;
use crate::dialect::DialectKind;
use crate::model::ModelBuilder;
use crate::registry::Registry;
use crate::schema::SchemaBuilder;
use crate::test_support::{Recorder, row};
use crate::value::Key;
use chrono::{FixedOffset, NaiveDate, TimeZone};

fn registry(kind: DialectKind) -> Registry {
    let registry = Registry::new(Config::new().with_dialect(kind)).unwrap();

    let mut users = SchemaBuilder::new();
    users.add_serial("id");
    users.add_varchar("name", 80);
    registry.define(ModelBuilder::new("users", users.build())).unwrap();

    let mut profiles = SchemaBuilder::new();
    profiles.add_foreign("id").primary();
    profiles.add_varchar("bio", 200).nullable();
    registry.define(ModelBuilder::new("profiles", profiles.build())).unwrap();

    let mut tags = SchemaBuilder::new();
    tags.add_varchar("slug", 40).primary();
    registry.define(ModelBuilder::new("tags", tags.build())).unwrap();

    let mut entries = SchemaBuilder::new();
    entries.add_serial("id");
    entries.add_datetime("created_at");
    entries.add_varchar("status", 20);
    registry.define(ModelBuilder::new("entries", entries.build())).unwrap();

    let mut posts = SchemaBuilder::new();
    posts.add_foreign("id").primary();
    posts.add_varchar("title", 200);
    posts.add_foreign("author_id");
    registry
        .define(ModelBuilder::new("posts", posts.build()).extends("entries"))
        .unwrap();

    registry
}

fn mysql() -> Registry {
    registry(DialectKind::MySql)
}

fn sql(q: &Query) -> String {
    q.build().unwrap().sql
}

const POSTS: &str = "`posts` `post` INNER JOIN `entries` `entry` USING(`id`)";

#[test]
fn test_select_star_over_inheritance_join() {
    let r = mysql();
    let q = r.model("posts").unwrap().query();
    assert_eq!(sql(&q), format!("SELECT * FROM {POSTS}"));
    assert!(q.arguments().is_empty());
}

#[test]
fn test_where_eq_binds_value() {
    let r = mysql();
    let mut q = r.model("posts").unwrap().query();
    q.where_eq("status", "published");
    let stmt = q.build().unwrap();
    assert_eq!(stmt.sql, format!("SELECT * FROM {POSTS} WHERE `status` = ?"));
    assert_eq!(stmt.args, vec![Value::from("published")]);
}

#[test]
fn test_negated_list_is_inlined() {
    let r = mysql();
    let users = r.model("users").unwrap();

    let mut q = users.query();
    q.filter(Conditions::new().with("!name", ["a", "b"]));
    let stmt = q.build().unwrap();
    assert_eq!(stmt.sql, "SELECT * FROM `users` `user` WHERE `name` NOT IN('a','b')");
    assert!(stmt.args.is_empty());

    let mut q = users.query();
    q.filter(Conditions::new().with("name", "a"));
    let stmt = q.build().unwrap();
    assert_eq!(stmt.sql, "SELECT * FROM `users` `user` WHERE `name` = ?");
    assert_eq!(stmt.args, vec![Value::from("a")]);

    let mut q = users.query();
    q.filter(Conditions::new().with("!name", "a").with("id", vec![1i64, 2]));
    assert_eq!(
        sql(&q),
        "SELECT * FROM `users` `user` WHERE `name` != ? AND `id` IN(1,2)"
    );
}

#[test]
fn test_empty_lists() {
    let r = mysql();
    let mut q = r.model("users").unwrap().query();
    q.filter(
        Conditions::new()
            .with("name", Vec::<String>::new())
            .with("!id", Vec::<i64>::new()),
    );
    assert_eq!(sql(&q), "SELECT * FROM `users` `user` WHERE 1=0 AND 1=1");
}

#[test]
fn test_null_criteria() {
    let r = mysql();
    let mut q = r.model("profiles").unwrap().query();
    q.filter(
        Conditions::new()
            .with("bio", None::<String>)
            .with("!bio", Value::Null),
    );
    let stmt = q.build().unwrap();
    assert_eq!(
        stmt.sql,
        "SELECT * FROM `profiles` `profile` WHERE `bio` IS NULL AND `bio` IS NOT NULL"
    );
    assert!(stmt.args.is_empty());
}

#[test]
fn test_dotted_columns_and_operators() {
    let r = mysql();
    let mut q = r.model("posts").unwrap().query();
    q.where_eq("entry.status", "draft")
        .where_op("post.author_id", Op::between(1, 9))
        .where_op("title", Op::like("%rust%"));
    let stmt = q.build().unwrap();
    assert_eq!(
        stmt.sql,
        format!(
            "SELECT * FROM {POSTS} WHERE `entry`.`status` = ? AND `post`.`author_id` BETWEEN ? AND ? AND `title` LIKE ?"
        )
    );
    assert_eq!(
        stmt.args,
        vec![
            Value::from("draft"),
            Value::Int(1),
            Value::Int(9),
            Value::from("%rust%")
        ]
    );
}

#[test]
fn test_dates_are_normalized_to_utc() {
    let r = mysql();
    let at = FixedOffset::east_opt(2 * 3600)
        .unwrap()
        .with_ymd_and_hms(2024, 3, 1, 10, 0, 0)
        .unwrap();
    let day = NaiveDate::from_ymd_opt(2024, 3, 1).unwrap();

    let mut q = r.model("posts").unwrap().query();
    q.where_op("created_at", Op::gte(at))
        .where_in("created_at", [day]);
    let stmt = q.build().unwrap();
    assert_eq!(
        stmt.sql,
        format!("SELECT * FROM {POSTS} WHERE `created_at` >= ? AND `created_at` IN('2024-03-01')")
    );
    assert_eq!(stmt.args, vec![Value::from("2024-03-01 08:00:00")]);
}

#[test]
fn test_argument_buckets_keep_their_order() {
    let r = mysql();
    let mut q = r.model("posts").unwrap().query();
    q.having("COUNT(*) > ?", [3])
        .where_eq("status", "published")
        .join_raw(
            "INNER JOIN `users` `user` ON `user`.`id` = `post`.`author_id` AND `user`.`name` != ?",
            ["bot"],
        )
        .group("`post`.`author_id`");
    let stmt = q.build().unwrap();
    assert_eq!(
        stmt.sql,
        format!(
            "SELECT * FROM {POSTS} INNER JOIN `users` `user` ON `user`.`id` = `post`.`author_id` AND `user`.`name` != ? WHERE `status` = ? GROUP BY `post`.`author_id` HAVING COUNT(*) > ?"
        )
    );
    assert_eq!(
        stmt.args,
        vec![Value::from("bot"), Value::from("published"), Value::Int(3)]
    );
}

#[test]
fn test_rendering_is_idempotent() {
    let r = mysql();
    let mut q = r.model("posts").unwrap().query();
    q.where_eq("status", "a")
        .where_in("id", [1, 2])
        .order("`created_at` DESC")
        .paginate(2, 10);
    let first = q.build().unwrap();
    assert_eq!(q.build().unwrap(), first);
    assert_eq!(q.clone().build().unwrap(), first);
}

#[test]
fn test_singular_clauses_overwrite() {
    let r = mysql();
    let mut q = r.model("users").unwrap().query();
    q.select("a").select("b").order("x").order("y").limit(5).limit(10);
    assert_eq!(sql(&q), "SELECT b FROM `users` `user` ORDER BY y LIMIT 10");
}

#[test]
fn test_select_columns_are_quoted() {
    let r = mysql();
    let mut q = r.model("posts").unwrap().query();
    q.select_columns(&["post.*", "entry.created_at"]);
    assert_eq!(
        sql(&q),
        format!("SELECT `post`.*, `entry`.`created_at` FROM {POSTS}")
    );
}

#[test]
fn test_pagination() {
    let r = mysql();
    let mut q = r.model("users").unwrap().query();
    q.paginate(3, 20);
    assert_eq!(sql(&q), "SELECT * FROM `users` `user` LIMIT 20 OFFSET 40");
    q.paginate(0, 0);
    assert_eq!(sql(&q), "SELECT * FROM `users` `user` LIMIT 1 OFFSET 0");
}

#[test]
fn test_offset_without_limit_per_dialect() {
    let r = mysql();
    let mut q = r.model("users").unwrap().query();
    q.offset(5);
    assert_eq!(
        sql(&q),
        "SELECT * FROM `users` `user` LIMIT 18446744073709551615 OFFSET 5"
    );

    let r = registry(DialectKind::Sqlite);
    let mut q = r.model("users").unwrap().query();
    q.offset(5);
    assert_eq!(sql(&q), r#"SELECT * FROM "users" "user" LIMIT -1 OFFSET 5"#);
}

#[test]
fn test_sqlite_quoting() {
    let r = registry(DialectKind::Sqlite);
    let mut q = r.model("posts").unwrap().query();
    q.filter(Conditions::new().with("status", "x").with("!id", [1, 2]))
        .limit(5);
    assert_eq!(
        sql(&q),
        r#"SELECT * FROM "posts" "post" INNER JOIN "entries" "entry" USING("id") WHERE "status" = ? AND "id" NOT IN(1,2) LIMIT 5"#
    );
}

#[test]
fn test_where_raw_resolves_placeholders() {
    let r = mysql();
    let mut q = r.model("users").unwrap().query();
    q.where_raw("{alias}.{primary} > ? OR {alias}.`name` = ?", [Value::Int(10), "x".into()]);
    let stmt = q.build().unwrap();
    assert_eq!(
        stmt.sql,
        "SELECT * FROM `users` `user` WHERE (`user`.`id` > ? OR `user`.`name` = ?)"
    );
    assert_eq!(stmt.args.len(), 2);
}

#[test]
fn test_placeholder_mismatch_is_reported_on_build() {
    let r = mysql();
    let mut q = r.model("users").unwrap().query();
    q.where_raw("a = ? AND b = ?", [1]).where_eq("name", "still fine");
    let err = q.build().unwrap_err();
    assert!(matches!(err, OrmError::Validation(_)), "{err}");
    assert!(q.conditions.len() == 1, "the bad fragment must not be kept");
}

#[test]
fn test_quoted_question_marks_are_not_placeholders() {
    let r = mysql();
    let mut q = r.model("users").unwrap().query();
    q.where_raw("`name` != '?' AND `id` = ?", [1])
        .where_raw(r#"`name` LIKE "%?%" OR `name` = 'it\'s?'"#, Vec::<Value>::new())
        .having("`weird?` > ?", [2]);
    let stmt = q.build().unwrap();
    assert_eq!(
        stmt.sql,
        r#"SELECT * FROM `users` `user` WHERE (`name` != '?' AND `id` = ?) AND (`name` LIKE "%?%" OR `name` = 'it\'s?') HAVING `weird?` > ?"#
    );
    assert_eq!(stmt.args, vec![Value::Int(1), Value::Int(2)]);
}

#[test]
fn test_invalid_identifier_is_reported_on_build() {
    let r = mysql();
    let mut q = r.model("users").unwrap().query();
    q.where_eq("name; DROP TABLE users", 1);
    assert!(matches!(q.build(), Err(OrmError::Validation(_))));
}

#[test]
fn test_join_model_on_shared_key() {
    let r = mysql();
    let users = r.model("users").unwrap();
    let profiles = r.model("profiles").unwrap();

    let mut q = users.query();
    q.join(&profiles);
    assert_eq!(
        sql(&q),
        "SELECT * FROM `users` `user` INNER JOIN `profiles` AS `profile` USING(`id`)"
    );

    let mut q = users.query();
    q.left_join(&profiles);
    assert_eq!(
        sql(&q),
        "SELECT * FROM `users` `user` LEFT JOIN `profiles` AS `profile` USING(`id`)"
    );
}

#[test]
fn test_join_model_with_ancestors_is_parenthesized() {
    let r = mysql();
    let mut q = r.model("users").unwrap().query();
    q.left_join(&r.model("posts").unwrap());
    assert_eq!(
        sql(&q),
        format!("SELECT * FROM `users` `user` LEFT JOIN ({POSTS}) USING(`id`)")
    );
}

#[test]
fn test_join_without_common_key_is_config_error() {
    let r = mysql();
    let mut q = r.model("users").unwrap().query();
    q.join(&r.model("tags").unwrap());
    assert!(q.build().unwrap_err().is_config());
}

#[test]
fn test_join_alias_clash_is_config_error() {
    let r = mysql();
    let mut q = r.model("posts").unwrap().query();
    q.join(&r.model("entries").unwrap());
    assert!(q.build().unwrap_err().is_config());
}

#[test]
fn test_joining_an_alias_twice_is_config_error() {
    let r = mysql();
    let users = r.model("users").unwrap();
    let profiles = r.model("profiles").unwrap();

    let mut q = users.query();
    q.join(&profiles).left_join(&profiles);
    assert!(q.build().unwrap_err().is_config());

    let mut q = users.query();
    q.left_join(&r.model("posts").unwrap()).join(&r.model("entries").unwrap());
    assert!(q.build().unwrap_err().is_config(), "entry is already joined via posts");

    let mut q = users.query();
    q.join(&profiles).join_query(
        JoinMode::Inner,
        &profiles.query(),
        "profile",
        "`profile`.`id` = {alias}.`id`",
    );
    assert!(q.build().unwrap_err().is_config());
}

#[test]
fn test_join_query_args_go_to_join_bucket() {
    let r = mysql();
    let day = NaiveDate::from_ymd_opt(2024, 1, 1).unwrap();

    let mut recent = r.model("posts").unwrap().query();
    recent.select("`author_id`").where_op("created_at", Op::gt(day));

    let mut q = r.model("users").unwrap().query();
    q.where_eq("name", "ann").join_query(
        JoinMode::Inner,
        &recent,
        "recent",
        "`recent`.`author_id` = {alias}.`id`",
    );
    let stmt = q.build().unwrap();
    assert_eq!(
        stmt.sql,
        format!(
            "SELECT * FROM `users` `user` INNER JOIN (SELECT `author_id` FROM {POSTS} WHERE `created_at` > ?) AS `recent` ON `recent`.`author_id` = `user`.`id` WHERE `name` = ?"
        )
    );
    assert_eq!(stmt.args, vec![Value::from("2024-01-01"), Value::from("ann")]);
}

#[test]
fn test_count_statements() {
    let r = mysql();
    let users = r.model("users").unwrap();

    let mut q = users.query();
    q.where_eq("name", "a").order("`name`").limit(3);
    assert_eq!(
        q.build_count().unwrap().sql,
        "SELECT COUNT(*) AS count FROM `users` `user` WHERE `name` = ?"
    );

    let mut q = users.query();
    q.group("`name`").having("COUNT(*) > ?", [1]);
    let stmt = q.build_count().unwrap();
    assert_eq!(
        stmt.sql,
        "SELECT COUNT(*) AS count FROM (SELECT 1 FROM `users` `user` GROUP BY `name` HAVING COUNT(*) > ?) AS counted"
    );
    assert_eq!(stmt.args, vec![Value::Int(1)]);
}

#[tokio::test]
async fn test_all_goes_through_identity_map() {
    let r = mysql();
    let users = r.model("users").unwrap();
    let rec = Recorder::new();

    rec.reply_rows(vec![row([("id", Value::UInt(1)), ("name", "ann".into())])]);
    let found = users.query().all(&rec).await.unwrap();
    assert_eq!(found.len(), 1);
    assert_eq!(found[0].value("name"), &Value::from("ann"));
    assert!(users.cache().retrieve(&Key::from(1u64)).is_some());

    rec.reply_rows(vec![row([("id", Value::UInt(1)), ("name", "changed".into())])]);
    let again = users.query().all(&rec).await.unwrap();
    assert_eq!(again[0].value("name"), &Value::from("ann"));

    rec.reply_rows(vec![row([("id", Value::UInt(1)), ("name", "changed".into())])]);
    let fresh = users.query().mode(FetchMode::Fresh).all(&rec).await.unwrap();
    assert_eq!(fresh[0].value("name"), &Value::from("changed"));
}

#[tokio::test]
async fn test_joined_rows_bypass_identity_map() {
    let r = mysql();
    let users = r.model("users").unwrap();
    let profiles = r.model("profiles").unwrap();
    let rec = Recorder::new();

    rec.reply_rows(vec![row([
        ("id", Value::UInt(1)),
        ("name", "ann".into()),
        ("bio", "secret".into()),
    ])]);
    let mut q = users.query();
    q.join(&profiles);
    let joined = q.all(&rec).await.unwrap();
    assert_eq!(joined[0].value("bio"), &Value::from("secret"));
    assert!(users.cache().retrieve(&Key::from(1u64)).is_none());

    rec.reply_rows(vec![row([("id", Value::UInt(1)), ("name", "ann".into())])]);
    let found = users.find(&rec, 1u64).await.unwrap().unwrap();
    assert_eq!(rec.statements().len(), 2, "find must go to the database");
    assert!(found.get("bio").is_none());
}

#[tokio::test]
async fn test_one_limits_a_copy() {
    let r = mysql();
    let users = r.model("users").unwrap();
    let rec = Recorder::new();
    rec.reply_rows(Vec::new());

    let mut q = users.query();
    q.where_eq("name", "nobody");
    assert!(q.one(&rec).await.unwrap().is_none());
    assert_eq!(
        rec.last().sql,
        "SELECT * FROM `users` `user` WHERE `name` = ? LIMIT 1"
    );
    assert_eq!(q.limit, None);
}

#[tokio::test]
async fn test_count_and_exists() {
    let r = mysql();
    let users = r.model("users").unwrap();
    let rec = Recorder::new();

    rec.reply_rows(vec![row([("count", Value::Int(3))])]);
    assert_eq!(users.query().count(&rec).await.unwrap(), 3);

    rec.reply_rows(Vec::new());
    let mut q = users.query();
    q.where_eq("name", "x");
    assert!(!q.exists(&rec).await.unwrap());
    assert_eq!(
        rec.last().sql,
        "SELECT 1 FROM `users` `user` WHERE `name` = ? LIMIT 1"
    );
}

#[tokio::test]
async fn test_count_by_returns_pairs() {
    let r = mysql();
    let users = r.model("users").unwrap();
    let rec = Recorder::new();
    rec.reply_rows(vec![
        row([("value", "a".into()), ("count", Value::Int(2))]),
        row([("value", "b".into()), ("count", Value::Int(1))]),
    ]);

    let counts = users.query().count_by(&rec, "name").await.unwrap();
    assert_eq!(
        counts,
        vec![(Value::from("a"), 2), (Value::from("b"), 1)]
    );
    assert_eq!(
        rec.last().sql,
        "SELECT `name` AS `value`, COUNT(*) AS `count` FROM `users` `user` GROUP BY `name`"
    );
}

#[tokio::test]
async fn test_aggregates() {
    let r = mysql();
    let users = r.model("users").unwrap();
    let rec = Recorder::new();

    rec.reply_rows(vec![row([("aggregate", Value::Float(10.5))])]);
    assert_eq!(users.query().sum(&rec, "id").await.unwrap(), Value::Float(10.5));
    assert_eq!(
        rec.last().sql,
        "SELECT SUM(`id`) AS aggregate FROM `users` `user`"
    );

    rec.reply_rows(Vec::new());
    assert_eq!(users.query().maximum(&rec, "id").await.unwrap(), Value::Null);
    assert_eq!(
        rec.last().sql,
        "SELECT MAX(`id`) AS aggregate FROM `users` `user`"
    );
}

#[tokio::test]
async fn test_delete_selects_keys_then_deletes_child_first() {
    let r = mysql();
    let posts = r.model("posts").unwrap();
    let rec = Recorder::new();
    rec.reply_rows(vec![
        row([("id", Value::UInt(1))]),
        row([("id", Value::UInt(2))]),
    ]);

    let mut q = posts.query();
    q.where_eq("status", "spam");
    assert_eq!(q.delete(&rec).await.unwrap(), 1);

    let statements = rec.statements();
    assert_eq!(
        statements[0].sql,
        format!("SELECT `post`.`id` AS `id` FROM {POSTS} WHERE `status` = ?")
    );
    assert_eq!(statements[1].sql, "DELETE FROM `posts` WHERE `id` IN(?, ?)");
    assert_eq!(statements[1].args, vec![Value::UInt(1), Value::UInt(2)]);
    assert_eq!(statements[2].sql, "DELETE FROM `entries` WHERE `id` IN(?, ?)");
}

#[tokio::test]
async fn test_build_errors_stop_finishers() {
    let r = mysql();
    let rec = Recorder::new();
    let mut q = r.model("users").unwrap().query();
    q.where_raw("a = ?", Vec::<Value>::new());
    assert!(q.all(&rec).await.is_err());
    assert!(q.count(&rec).await.is_err());
    assert!(rec.statements().is_empty());
}
