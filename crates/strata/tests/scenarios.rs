//! End-to-end scenarios against a recording executor.

mod common;

use common::{Recorder, row};
use strata::prelude::*;
use strata::schema::{ColumnKind, SizeClass};
use strata::{DialectKind, ResultSet};

/// `entries` <- `posts` <- `news_articles`, plus users/teams/memberships
/// and a `comments` model with a nullable and a required belongs-to.
fn registry(dialect: DialectKind) -> Registry {
    let registry = Registry::new(
        Config::new()
            .with_dialect(dialect)
            .with_table_prefix("app_"),
    )
    .unwrap();

    let mut entries = SchemaBuilder::new();
    entries.add_serial("id");
    entries.add_datetime("created_at");
    entries.add_varchar("status", 20);
    registry
        .define(ModelBuilder::new("entries", entries.build()))
        .unwrap();

    let mut posts = SchemaBuilder::new();
    posts.add_foreign("id").primary();
    posts.add_varchar("title", 200);
    posts.add_varchar("status", 40);
    registry
        .define(ModelBuilder::new("posts", posts.build()).extends("entries"))
        .unwrap();

    let mut articles = SchemaBuilder::new();
    articles.add_foreign("id").primary();
    articles.add_varchar("source", 120).nullable();
    registry
        .define(ModelBuilder::new("news_articles", articles.build()).extends("posts"))
        .unwrap();

    let mut users = SchemaBuilder::new();
    users.add_serial("id");
    users.add_varchar("name", 80);
    registry
        .define(
            ModelBuilder::new("users", users.build())
                .has_many_through("teams", "teams", "memberships")
                .has_many("comments", "comments", "author_id"),
        )
        .unwrap();

    let mut teams = SchemaBuilder::new();
    teams.add_serial("id");
    teams.add_varchar("title", 80);
    registry
        .define(ModelBuilder::new("teams", teams.build()))
        .unwrap();

    let mut memberships = SchemaBuilder::new();
    memberships.add_serial("id");
    memberships.add_foreign("user_id");
    memberships.add_foreign("team_id");
    registry
        .define(
            ModelBuilder::new("memberships", memberships.build())
                .belongs_to("user", "users", "user_id")
                .belongs_to("team", "teams", "team_id"),
        )
        .unwrap();

    let mut comments = SchemaBuilder::new();
    comments.add_serial("id");
    comments.add_foreign("author_id");
    comments.add_foreign("reply_to").nullable();
    comments.add_text("body", SizeClass::Normal);
    registry
        .define(
            ModelBuilder::new("comments", comments.build())
                .belongs_to("author", "users", "author_id")
                .belongs_to("parent", "comments", "reply_to"),
        )
        .unwrap();

    registry.validate().unwrap();
    registry
}

#[test]
fn has_many_through_renders_two_joins_with_owner_key() {
    let r = registry(DialectKind::MySql);
    let user = r
        .model("users")
        .unwrap()
        .record([("id", Value::Int(7)), ("name", "ann".into())])
        .unwrap();

    let stmt = user.relation("teams").unwrap().query().unwrap().build().unwrap();
    assert_eq!(
        stmt.sql,
        "SELECT `team`.* FROM `app_teams` `team` \
         INNER JOIN `app_memberships` `membership` ON `membership`.`team_id` = `team`.`id` \
         INNER JOIN `app_users` `user` ON `user`.`id` = `membership`.`user_id` \
         WHERE `user`.`id` = ?"
    );
    assert_eq!(stmt.args, vec![Value::Int(7)]);
}

#[test]
fn belongs_to_on_nullable_key_is_missing() {
    let r = registry(DialectKind::MySql);
    let comment = r
        .model("comments")
        .unwrap()
        .record([("id", Value::Int(1)), ("author_id", Value::Int(2)), ("reply_to", Value::Null)])
        .unwrap();
    assert!(comment.relation("parent").unwrap().is_missing());
}

#[test]
fn belongs_to_on_required_key_is_an_integrity_error() {
    let r = registry(DialectKind::MySql);
    let comment = r
        .model("comments")
        .unwrap()
        .record([("id", Value::Int(1)), ("author_id", Value::Null)])
        .unwrap();
    let err = comment.relation("author").unwrap_err();
    assert!(err.is_relation_integrity());
    assert!(err.to_string().contains("author_id"), "{err}");
}

#[tokio::test]
async fn writes_evict_the_cached_record() {
    let r = registry(DialectKind::MySql);
    let articles = r.model("news_articles").unwrap();
    let db = Recorder::new();

    let cached = articles
        .record([("id", Value::UInt(5)), ("title", "old".into())])
        .unwrap();
    articles.cache().store(&cached);
    assert!(articles.cache().retrieve(&Key::from(5u64)).is_some());

    articles
        .table()
        .update(&db, &[("id", Value::UInt(5)), ("title", "new".into())].into_values())
        .await
        .unwrap();
    assert!(articles.cache().retrieve(&Key::from(5u64)).is_none());

    let update = db.last();
    assert!(
        update.sql.starts_with(
            "UPDATE `app_news_articles` `article` INNER JOIN `app_posts` `post` USING(`id`)"
        ),
        "{}",
        update.sql
    );
    assert_eq!(update.args, vec![Value::from("new"), Value::UInt(5)]);
}

#[tokio::test]
async fn sqlite_cascades_updates_per_table() {
    let r = registry(DialectKind::Sqlite);
    let articles = r.model("news_articles").unwrap();
    let db = Recorder::new();

    articles
        .update(
            &db,
            [
                ("id", Value::UInt(5)),
                ("title", "new".into()),
                ("source", "wire".into()),
            ],
        )
        .await
        .unwrap();
    assert_eq!(
        db.sql(),
        vec![
            r#"UPDATE "app_posts" SET "title" = ? WHERE "id" = ?"#,
            r#"UPDATE "app_news_articles" SET "source" = ? WHERE "id" = ?"#,
        ]
    );
}

#[tokio::test]
async fn inserts_mint_the_key_in_the_root_table() {
    let r = registry(DialectKind::MySql);
    let articles = r.model("news_articles").unwrap();
    let db = Recorder::new();
    db.reply(ResultSet::with_insert_id(11u64));

    let key = articles
        .insert(&db, [("title", "hello"), ("status", "draft"), ("source", "desk")])
        .await
        .unwrap();
    assert_eq!(key, Key::from(11u64));

    let statements = db.statements();
    assert_eq!(statements.len(), 3);
    assert_eq!(statements[0].sql, "INSERT INTO `app_entries` SET `status` = ?");
    assert_eq!(
        statements[1].sql,
        "INSERT INTO `app_posts` SET `id` = ?, `title` = ?, `status` = ?"
    );
    assert_eq!(statements[2].args[0], Value::UInt(11));
}

#[test]
fn query_arguments_follow_join_condition_having_order() {
    let r = registry(DialectKind::MySql);
    let mut q = r.model("posts").unwrap().query();
    q.having("COUNT(*) >= ?", [2])
        .where_eq("status", "live")
        .join_raw("INNER JOIN {prefix}users `u` ON `u`.`id` = ?", [3])
        .group("{alias}.`title`");

    let stmt = q.build().unwrap();
    assert_eq!(
        stmt.sql,
        "SELECT * FROM `app_posts` `post` INNER JOIN `app_entries` `entry` USING(`id`) \
         INNER JOIN app_users `u` ON `u`.`id` = ? WHERE `status` = ? \
         GROUP BY `post`.`title` HAVING COUNT(*) >= ?"
    );
    assert_eq!(stmt.args, vec![Value::Int(3), Value::from("live"), Value::Int(2)]);
    assert_eq!(q.build().unwrap(), stmt);
}

#[test]
fn negation_round_trip() {
    let r = registry(DialectKind::MySql);
    let users = r.model("users").unwrap();

    let mut negated = users.query();
    negated.filter(Conditions::new().with("!name", ["a", "b"]));
    let stmt = negated.build().unwrap();
    assert_eq!(stmt.sql, "SELECT * FROM `app_users` `user` WHERE `name` NOT IN('a','b')");
    assert!(stmt.args.is_empty());

    let mut plain = users.query();
    plain.filter(Conditions::new().with("name", "a"));
    let stmt = plain.build().unwrap();
    assert_eq!(stmt.sql, "SELECT * FROM `app_users` `user` WHERE `name` = ?");
    assert_eq!(stmt.args, vec![Value::from("a")]);
}

#[test]
fn three_level_extended_schema_shadows_in_place() {
    let r = registry(DialectKind::MySql);
    let articles = r.model("news_articles").unwrap();
    let schema = articles.schema();

    let names: Vec<&str> = schema.column_names().collect();
    assert_eq!(names, ["id", "created_at", "status", "title", "source"]);
    assert_eq!(
        schema.column("status").unwrap().kind,
        ColumnKind::Varchar { size: 40 }
    );
    assert_eq!(schema.primary_key().columns(), ["id"]);
    assert_eq!(
        articles.table().select_join(),
        "`app_news_articles` `article` \
         INNER JOIN `app_posts` `post` USING(`id`) \
         INNER JOIN `app_entries` `entry` USING(`id`)"
    );
}

#[tokio::test]
async fn relations_load_through_the_executor() {
    let r = registry(DialectKind::MySql);
    let db = Recorder::new();
    let user = r
        .model("users")
        .unwrap()
        .record([("id", Value::Int(7))])
        .unwrap();

    db.reply_rows(vec![
        row([("id", Value::Int(1)), ("author_id", Value::Int(7)), ("body", "hi".into())]),
        row([("id", Value::Int(2)), ("author_id", Value::Int(7)), ("body", "yo".into())]),
    ]);
    let comments = user
        .relation("comments")
        .unwrap()
        .load(&db)
        .await
        .unwrap()
        .into_many();
    assert_eq!(comments.len(), 2);
    assert_eq!(
        db.last().sql,
        "SELECT * FROM `app_comments` `comment` WHERE `comment`.`author_id` = ?"
    );

    let author = comments[0].relation("author").unwrap();
    db.reply_rows(vec![row([("id", Value::Int(7)), ("name", "ann".into())])]);
    let author = author.load(&db).await.unwrap().into_one().unwrap();
    assert_eq!(author.get_as::<String>("name").unwrap(), "ann");
}
