use super::*;
use crate::value::Value;

fn pk_set(schema: &Schema) -> Vec<String> {
    schema
        .columns()
        .iter()
        .filter(|c| c.primary)
        .map(|c| c.name.clone())
        .collect()
}

#[test]
fn test_serial_defaults() {
    let mut b = SchemaBuilder::new();
    b.add_serial("id").nullable();
    let schema = b.build();
    let id = schema.column("id").unwrap();
    assert_eq!(id.kind, ColumnKind::Serial);
    assert!(id.primary);
    assert!(id.auto_increment);
    assert!(!id.nullable, "serial columns are never nullable");
    assert_eq!(schema.primary_key(), &PrimaryKey::Single("id".into()));
}

#[test]
fn test_primary_columns_are_never_nullable() {
    let mut b = SchemaBuilder::new();
    b.add_varchar("code", 16).primary().nullable();
    b.add_varchar("label", 16).nullable().primary();
    let schema = b.build();
    assert!(!schema.column("code").unwrap().nullable);
    assert!(!schema.column("label").unwrap().nullable);
}

#[test]
fn test_serial_demoted_to_unique() {
    let mut b = SchemaBuilder::new();
    b.add_varchar("code", 16).primary();
    b.add_serial("seq").not_primary();
    let schema = b.build();
    let seq = schema.column("seq").unwrap();
    assert!(seq.unique);
    assert!(!seq.primary);
    assert_eq!(schema.primary_key().columns(), ["code"]);
}

#[test]
fn test_primary_key_derivation() {
    let mut none = SchemaBuilder::new();
    none.add_varchar("name", 10);
    let none = none.build();
    assert!(none.primary_key().is_none());
    assert!(pk_set(&none).is_empty());

    let mut composite = SchemaBuilder::new();
    composite.add_foreign("user_id").primary();
    composite.add_varchar("note", 20);
    composite.add_foreign("group_id").primary();
    let composite = composite.build();
    assert_eq!(
        composite.primary_key(),
        &PrimaryKey::Composite(vec!["user_id".into(), "group_id".into()])
    );
    assert_eq!(pk_set(&composite), composite.primary_key().columns());
}

#[test]
fn test_index_requires_declared_columns() {
    let mut b = SchemaBuilder::new();
    b.add_serial("id");
    b.add_varchar("email", 100);
    let err = b.add_index(&["email", "phone"], true, None).unwrap_err();
    assert!(err.is_config());
    assert!(err.to_string().contains("phone"));
    assert!(b.build().indexes().is_empty());
}

#[test]
fn test_index_default_names() {
    let mut b = SchemaBuilder::new();
    b.add_varchar("a", 10);
    b.add_varchar("b", 10);
    b.add_index(&["a", "b"], false, None).unwrap();
    b.add_index(&["a"], true, Some("by_a")).unwrap();
    let schema = b.build();
    assert_eq!(schema.indexes()[0].name_for("users"), "users_a_b_idx");
    assert_eq!(schema.indexes()[1].name_for("users"), "by_a");
}

#[test]
fn test_build_is_a_snapshot() {
    let mut b = SchemaBuilder::new();
    b.add_serial("id");
    let first = b.build();
    b.add_boolean("active").default(true);
    let second = b.build();
    assert_eq!(first.columns().len(), 1);
    assert_eq!(second.columns().len(), 2);
    assert_eq!(
        second.column("active").unwrap().default,
        Some(DefaultValue::Value(Value::Bool(true)))
    );
}

#[test]
fn test_redeclare_replaces_in_place() {
    let mut b = SchemaBuilder::new();
    b.add_serial("id");
    b.add_varchar("title", 10);
    b.add_varchar("body", 10);
    b.add_text("title", SizeClass::Long);
    let schema = b.build();
    let names: Vec<&str> = schema.column_names().collect();
    assert_eq!(names, ["id", "title", "body"]);
    assert_eq!(
        schema.column("title").unwrap().kind,
        ColumnKind::Text(SizeClass::Long)
    );
}

#[test]
fn test_invalid_column_name() {
    let mut b = SchemaBuilder::new();
    b.add_varchar("bad name", 10);
    assert!(b.try_build().is_err());
}

#[test]
fn test_merged_three_levels() {
    let mut gp = SchemaBuilder::new();
    gp.add_serial("id");
    gp.add_datetime("created_at");
    let mut p = SchemaBuilder::new();
    p.add_foreign("id").primary();
    p.add_varchar("title", 100);
    let mut c = SchemaBuilder::new();
    c.add_foreign("id").primary();
    c.add_text("body", SizeClass::Normal);
    c.add_varchar("title", 200);

    let (gp, p, c) = (gp.build(), p.build(), c.build());
    let merged = Schema::merged([&gp, &p, &c]);
    let names: Vec<&str> = merged.column_names().collect();
    assert_eq!(names, ["id", "created_at", "title", "body"]);
    assert_eq!(
        merged.column("title").unwrap().kind,
        ColumnKind::Varchar { size: 200 }
    );
    assert_eq!(merged.primary_key().columns(), ["id"]);
}

struct Tag;

impl Schematic for Tag {
    const TABLE: &'static str = "tags";

    fn describe(b: &mut SchemaBuilder) -> crate::OrmResult<()> {
        b.add_serial("id");
        b.add_varchar("label", 64).unique();
        b.add_index(&["label"], true, None)?;
        Ok(())
    }
}

#[test]
fn test_schema_of_schematic() {
    let schema = SchemaBuilder::of::<Tag>().unwrap();
    assert_eq!(schema.columns().len(), 2);
    assert_eq!(schema.indexes().len(), 1);
    assert_eq!(Tag::TABLE, "tags");
}
