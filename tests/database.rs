//! Runs generated SQL against an in-memory SQLite database.

use std::sync::Arc;

use serde_json::json;
use sqlx::{Row, SqlitePool};

use filterparams_sql::{
    Backend, BindingConfig, BindingEntry, BindingError, Entity, Error, FilterNode, FilterQuery,
    OrderSpec, QueryBinding, Relationship, Schema, SqlType, TableSession,
};

const FIXTURES: &str = r#"
CREATE TABLE domain (id INTEGER PRIMARY KEY, domain TEXT NOT NULL);
CREATE TABLE email (id INTEGER PRIMARY KEY, mail TEXT NOT NULL, domain_id INTEGER REFERENCES domain(id));
CREATE TABLE users (
    id INTEGER PRIMARY KEY,
    name TEXT NOT NULL,
    fullname TEXT,
    date_of_birth TEXT,
    email_id INTEGER REFERENCES email(id)
);
INSERT INTO domain VALUES (1, 'example.com'), (2, 'other.org');
INSERT INTO email VALUES (1, 'user@example.com', 1), (2, 'second@other.org', 2), (3, 'third@other.org', 2);
INSERT INTO users VALUES
    (1, 'user', 'The User', '1985-10-26', 1),
    (2, 'user2', 'Second User', '1990-03-01', 2),
    (3, 'user3', NULL, '1985-10-26', 3);
"#;

async fn setup_pool() -> SqlitePool {
    // single connection so every statement sees the same :memory: database
    let pool = sqlx::sqlite::SqlitePoolOptions::new()
        .max_connections(1)
        .connect(":memory:")
        .await
        .unwrap();
    for statement in FIXTURES.split(';').filter(|s| !s.trim().is_empty()) {
        sqlx::query(statement.trim()).execute(&pool).await.unwrap();
    }
    pool
}

fn create_schema() -> Schema {
    Schema::new()
        .with(
            Entity::new("User", "users")
                .column("id", SqlType::Integer)
                .column("name", SqlType::Unicode)
                .column("fullname", SqlType::Unicode)
                .column("date_of_birth", SqlType::Date)
                .column("email_id", SqlType::Integer)
                .relationship(Relationship::many_to_one("email", "EMail", "email_id", "id")),
        )
        .with(
            Entity::new("EMail", "email")
                .column("id", SqlType::Integer)
                .column("mail", SqlType::Unicode)
                .column("domain_id", SqlType::Integer)
                .relationship(Relationship::many_to_one("domain", "Domain", "domain_id", "id")),
        )
        .with(
            Entity::new("Domain", "domain")
                .column("id", SqlType::Integer)
                .column("domain", SqlType::Unicode),
        )
}

fn create_config() -> BindingConfig {
    BindingConfig::new()
        .for_model("User")
        .with_session(Arc::new(TableSession::new(Backend::Sqlite)))
        .bind("id", BindingEntry::simple("id"))
        .bind("name", BindingEntry::simple("name"))
        .bind("fullname", BindingEntry::simple("fullname"))
        .bind("birth_date", BindingEntry::simple("date_of_birth"))
        .bind("mail", BindingEntry::joined("mail", ["email"]))
        .bind("mail.domain", BindingEntry::joined("domain", ["email", "domain"]))
}

async fn fetch_names(pool: &SqlitePool, query: &FilterQuery) -> Vec<String> {
    let schema = create_schema();
    let binding = QueryBinding::new(&schema, create_config());
    let select = binding.evaluate(query).unwrap();
    let sql = binding.to_sql(&select).unwrap();

    sqlx::query(&sql)
        .fetch_all(pool)
        .await
        .unwrap_or_else(|e| panic!("{}: {}", sql, e))
        .iter()
        .map(|row| row.get::<String, _>("name"))
        .collect()
}

fn sorted(mut names: Vec<String>) -> Vec<String> {
    names.sort();
    names
}

#[tokio::test]
async fn test_empty_query_returns_all_rows() {
    let pool = setup_pool().await;
    let names = fetch_names(&pool, &FilterQuery::default()).await;
    assert_eq!(sorted(names), vec!["user", "user2", "user3"]);
}

#[tokio::test]
async fn test_eq_filter() {
    let pool = setup_pool().await;
    let names = fetch_names(&pool, &FilterQuery::new(FilterNode::param("name", "eq", "user"))).await;
    assert_eq!(names, vec!["user"]);
}

#[tokio::test]
async fn test_date_comparison() {
    let pool = setup_pool().await;

    let names = fetch_names(
        &pool,
        &FilterQuery::new(FilterNode::and(
            FilterNode::param("name", "eq", "user"),
            FilterNode::param("birth_date", "gt", "1985-10-25"),
        )),
    )
    .await;
    assert_eq!(names, vec!["user"]);

    let names = fetch_names(
        &pool,
        &FilterQuery::new(FilterNode::and(
            FilterNode::param("name", "eq", "user"),
            FilterNode::param("birth_date", "gt", "1985-10-26"),
        )),
    )
    .await;
    assert!(names.is_empty());

    let names = fetch_names(
        &pool,
        &FilterQuery::new(FilterNode::param("birth_date", "lte", "26 Oct 1985")),
    )
    .await;
    assert_eq!(sorted(names), vec!["user", "user3"]);
}

#[tokio::test]
async fn test_not_excludes_match() {
    let pool = setup_pool().await;
    let names = fetch_names(
        &pool,
        &FilterQuery::new(FilterNode::not(FilterNode::param("name", "eq", "user"))),
    )
    .await;
    assert_eq!(sorted(names), vec!["user2", "user3"]);
}

#[tokio::test]
async fn test_and_or() {
    let pool = setup_pool().await;

    let and = fetch_names(
        &pool,
        &FilterQuery::new(FilterNode::and(
            FilterNode::param("fullname", "eq", "The User"),
            FilterNode::param("name", "eq", "user2"),
        )),
    )
    .await;
    assert!(and.is_empty());

    let or = fetch_names(
        &pool,
        &FilterQuery::new(FilterNode::or(
            FilterNode::param("fullname", "eq", "The User"),
            FilterNode::param("name", "eq", "user2"),
        )),
    )
    .await;
    assert_eq!(sorted(or), vec!["user", "user2"]);
}

#[tokio::test]
async fn test_nested_boolean_tree() {
    let pool = setup_pool().await;
    // (name = user OR name = user3) AND NOT birth_date > 1986-01-01
    let names = fetch_names(
        &pool,
        &FilterQuery::new(FilterNode::and(
            FilterNode::or(
                FilterNode::param("name", "eq", "user"),
                FilterNode::param("name", "eq", "user3"),
            ),
            FilterNode::not(FilterNode::param("birth_date", "gt", "1986-01-01")),
        )),
    )
    .await;
    assert_eq!(sorted(names), vec!["user", "user3"]);
}

#[tokio::test]
async fn test_integer_conversion() {
    let pool = setup_pool().await;
    let names = fetch_names(&pool, &FilterQuery::new(FilterNode::param("id", "gte", "2"))).await;
    assert_eq!(sorted(names), vec!["user2", "user3"]);

    let names = fetch_names(&pool, &FilterQuery::new(FilterNode::param("id", "eq", json!(1)))).await;
    assert_eq!(names, vec!["user"]);
}

#[tokio::test]
async fn test_null_comparison() {
    let pool = setup_pool().await;
    let names = fetch_names(
        &pool,
        &FilterQuery::new(FilterNode::param("fullname", "eq", json!(null))),
    )
    .await;
    assert_eq!(names, vec!["user3"]);

    let names = fetch_names(
        &pool,
        &FilterQuery::new(FilterNode::param("fullname", "neq", json!(null))),
    )
    .await;
    assert_eq!(sorted(names), vec!["user", "user2"]);
}

#[tokio::test]
async fn test_like_and_ilike() {
    let pool = setup_pool().await;
    let names = fetch_names(&pool, &FilterQuery::new(FilterNode::param("fullname", "like", "%User"))).await;
    assert_eq!(sorted(names), vec!["user", "user2"]);

    let names = fetch_names(&pool, &FilterQuery::new(FilterNode::param("fullname", "ilike", "the %"))).await;
    assert_eq!(names, vec!["user"]);
    // non-ASCII capitals match under ilike whenever they match under like
    sqlx::query("INSERT INTO users VALUES (4, 'Émile', 'Émile Zola', '1840-04-02', 3)")
        .execute(&pool)
        .await
        .unwrap();
    let names = fetch_names(&pool, &FilterQuery::new(FilterNode::param("name", "like", "Émile"))).await;
    assert_eq!(names, vec!["Émile"]);
    let names = fetch_names(&pool, &FilterQuery::new(FilterNode::param("name", "ilike", "Émile"))).await;
    assert_eq!(names, vec!["Émile"]);
    let names = fetch_names(&pool, &FilterQuery::new(FilterNode::param("fullname", "ilike", "ÉMILE %"))).await;
    assert_eq!(names, vec!["Émile"]);
}

#[tokio::test]
async fn test_join_filter() {
    let pool = setup_pool().await;

    let names = fetch_names(
        &pool,
        &FilterQuery::new(FilterNode::and(
            FilterNode::param("name", "eq", "user"),
            FilterNode::param("mail.domain", "neq", "example.com"),
        )),
    )
    .await;
    assert!(names.is_empty());

    let names = fetch_names(
        &pool,
        &FilterQuery::new(FilterNode::param("mail.domain", "eq", "other.org")),
    )
    .await;
    assert_eq!(sorted(names), vec!["user2", "user3"]);
}

#[tokio::test]
async fn test_shared_join_path() {
    let pool = setup_pool().await;
    let names = fetch_names(
        &pool,
        &FilterQuery::new(FilterNode::and(
            FilterNode::param("mail.domain", "eq", "other.org"),
            FilterNode::param("mail", "like", "second%"),
        ))
        .order_by(OrderSpec::desc("mail")),
    )
    .await;
    assert_eq!(names, vec!["user2"]);
}

#[tokio::test]
async fn test_ordering() {
    let pool = setup_pool().await;

    let asc = fetch_names(&pool, &FilterQuery::default().order_by(OrderSpec::asc("name"))).await;
    assert_eq!(asc, vec!["user", "user2", "user3"]);

    let desc = fetch_names(&pool, &FilterQuery::default().order_by(OrderSpec::desc("name"))).await;
    assert_eq!(desc, vec!["user3", "user2", "user"]);

    // ties on birth_date are broken by the second key
    let multi = fetch_names(
        &pool,
        &FilterQuery::default()
            .order_by(OrderSpec::asc("birth_date"))
            .order_by(OrderSpec::desc("name")),
    )
    .await;
    assert_eq!(multi, vec!["user3", "user", "user2"]);
}

#[tokio::test]
async fn test_order_through_join() {
    let pool = setup_pool().await;
    let names = fetch_names(&pool, &FilterQuery::default().order_by(OrderSpec::desc("mail"))).await;
    assert_eq!(names, vec!["user", "user3", "user2"]);
}

#[test]
fn test_misconfigured_join_path() {
    let schema = create_schema();
    let config = create_config().bind("broken", BindingEntry::joined("mail", ["name"]));
    let binding = QueryBinding::new(&schema, config);

    let err = binding
        .evaluate(&FilterQuery::new(FilterNode::param("broken", "eq", "x")))
        .unwrap_err();
    assert_eq!(
        err,
        Error::Binding(BindingError::NotARelationship {
            segment: "name".to_string(),
            entity: "User".to_string(),
        })
    );
}
