//! End-to-end checks against a data map loaded from disk.
use std::path::Path;
use std::sync::Arc;

use bytes::BytesMut;
use rust_decimal::Decimal;
use tokio_postgres::types::{ToSql, Type};

use cayenne::access::{BatchAction, CollectingObserver, DataNode};
use cayenne::adapter::{AdapterDetector, DbAdapter, Dialect, JdbcAdapter, VendorAdapter};
use cayenne::db::{DatabaseMetadata, MemoryDataSource, Reply};
use cayenne::exp::{parse_qualifier, Expression};
use cayenne::map::DataMap;
use cayenne::query::{BatchQuery, Ordering, Query, QueryRoot, SelectQuery};
use cayenne::translator::{translate_qualifier, translate_select, TranslationContext};
use cayenne::types::{JdbcType, SqlParam, Value};

fn artist_map() -> DataMap {
    DataMap::load(&Path::new(env!("CARGO_MANIFEST_DIR")).join("tests/fixtures/artist.toml"))
        .expect("fixture map loads")
}

/// Substitute placeholders with literal values, left to right.
fn inline(sql: &str, values: &[Value]) -> String {
    let mut values = values.iter();
    let mut out = String::new();
    for c in sql.chars() {
        match (c, values.clone().next()) {
            ('?', Some(Value::String(s))) => {
                values.next();
                out.push_str(&format!("'{}'", s));
            }
            ('?', Some(v)) => {
                values.next();
                out.push_str(&v.to_string());
            }
            _ => out.push(c),
        }
    }
    out
}

#[test]
fn test_qualifier_round_trip() {
    let map = artist_map();
    let adapter = JdbcAdapter::new();
    let mut ctx =
        TranslationContext::rooted(&adapter, &map, &QueryRoot::Obj("Painting".into()), false).unwrap();
    let expr = Expression::match_exp("paintingTitle", "Sunflowers")
        .and(Expression::match_exp("estimatedPrice", 2i64));
    let sql = translate_qualifier(&mut ctx, Some(&expr)).unwrap().unwrap();
    let values: Vec<Value> = ctx.bindings().iter().map(|b| b.value.clone()).collect();

    assert_eq!(sql, "(PAINTING_TITLE = ?) AND (ESTIMATED_PRICE = ?)");
    assert_eq!(values, vec![Value::from("Sunflowers"), Value::Long(2)]);
    assert_eq!(
        inline(&sql, &values),
        "(PAINTING_TITLE = 'Sunflowers') AND (ESTIMATED_PRICE = 2)"
    );
}

#[test]
fn test_parenthesization() {
    let map = artist_map();
    let adapter = JdbcAdapter::new();

    let mut ctx =
        TranslationContext::rooted(&adapter, &map, &QueryRoot::Obj("Artist".into()), true).unwrap();
    let path = Expression::path("artistName");
    assert_eq!(
        translate_qualifier(&mut ctx, Some(&path)).unwrap().as_deref(),
        Some("t0.ARTIST_NAME")
    );

    let nested = parse_qualifier("(artistName = 'A' or artistName = 'B') and not dateOfBirth = null")
        .unwrap();
    assert_eq!(
        translate_qualifier(&mut ctx, Some(&nested)).unwrap().as_deref(),
        Some("((t0.ARTIST_NAME = ?) OR (t0.ARTIST_NAME = ?)) AND (NOT (t0.DATE_OF_BIRTH IS NULL))")
    );
}

#[test]
fn test_to_many_ordering_forces_distinct() {
    let map = artist_map();
    let query = SelectQuery::new("Artist").order_by(Ordering::asc("paintingArray.paintingTitle"));
    let sql = translate_select(&JdbcAdapter::new(), &map, &query).unwrap().sql;
    assert!(sql.starts_with("SELECT DISTINCT "));
    assert!(sql.ends_with("ORDER BY t1.PAINTING_TITLE"));
}

#[test]
fn test_aliases_per_relationship() {
    let map = artist_map();
    let query = SelectQuery::new("Painting").with_qualifier(
        Expression::match_exp("toArtist.artistName", "A")
            .and(Expression::match_exp("toOriginalArtist.artistName", "B"))
            .and(Expression::like_exp("toArtist.artistName", "A%")),
    );
    let sql = translate_select(&JdbcAdapter::new(), &map, &query).unwrap().sql;
    assert!(sql.contains("FROM PAINTING t0, ARTIST t1, ARTIST t2 WHERE"));
    assert!(sql.contains("t0.ARTIST_ID = t1.ARTIST_ID AND t0.ORIGINAL_ARTIST_ID = t2.ARTIST_ID"));
    assert!(!sql.contains("t3"));
    assert!(!sql.starts_with("SELECT DISTINCT"));
}

#[tokio::test]
async fn test_optimistic_locking_runs_row_by_row() {
    let query = BatchQuery::update("PAINTING", &["PAINTING_TITLE"], &["PAINTING_ID"])
        .add_row(vec!["A".into(), 1.into()])
        .add_row(vec!["B".into(), 2.into()])
        .optimistic_locking();

    assert!(!BatchAction::new(&query, &JdbcAdapter::new()).is_batch());
    for dialect in Dialect::ALL {
        assert!(!BatchAction::new(&query, &VendorAdapter::new(dialect)).is_batch());
    }

    let ds = MemoryDataSource::product("test");
    ds.on_statement(|sql, _| sql.starts_with("UPDATE").then_some(Reply::Count(1)));
    let node = DataNode::new("test", ds.clone(), Arc::new(JdbcAdapter::new()), artist_map());
    let mut observer = CollectingObserver::new();
    node.perform_in_transaction(&[Query::Batch(query)], &mut observer)
        .await
        .unwrap();
    assert_eq!(observer.counts(), vec![1, 1]);
    assert_eq!(ds.statements().len(), 2);
}

#[tokio::test]
async fn test_pk_refill_round_trips() {
    let ds = MemoryDataSource::product("test");
    let mut next_id = 200i64;
    ds.on_statement(move |sql, _| {
        if sql.starts_with("SELECT NEXT_ID") {
            Some(Reply::column("NEXT_ID", JdbcType::Integer, vec![Value::Long(next_id)]))
        } else if let Some(rest) = sql.strip_prefix("UPDATE AUTO_PK_SUPPORT SET NEXT_ID = NEXT_ID + ") {
            next_id += rest.split_whitespace().next()?.parse::<i64>().ok()?;
            Some(Reply::Count(1))
        } else {
            None
        }
    });
    let refills = |ds: &MemoryDataSource| {
        ds.sql_log()
            .iter()
            .filter(|s| s.starts_with("SELECT NEXT_ID"))
            .count()
    };

    let node = DataNode::new("test", ds.clone(), Arc::new(JdbcAdapter::new()), artist_map())
        .with_pk_cache_size(3);
    for expected in 200..203 {
        assert_eq!(node.generate_pk("ARTIST").await.unwrap(), expected);
    }
    assert_eq!(refills(&ds), 1);
    assert_eq!(node.generate_pk("ARTIST").await.unwrap(), 203);
    assert_eq!(refills(&ds), 2);

    ds.clear();
    let uncached = DataNode::new("test", ds.clone(), Arc::new(JdbcAdapter::new()), artist_map())
        .with_pk_cache_size(1);
    for _ in 0..3 {
        uncached.generate_pk("PAINTING").await.unwrap();
    }
    assert_eq!(refills(&ds), 3);
}

#[test]
fn test_custom_sniffer_wins() {
    let metadata = DatabaseMetadata {
        product_name: "PostgreSQL".into(),
        ..Default::default()
    };
    let mut detector = AdapterDetector::default();
    assert_eq!(detector.detect(&metadata).name(), "PostgreSQL");

    detector.add_sniffer(|md: &DatabaseMetadata| {
        md.product_name
            .contains("Postgre")
            .then(|| Arc::new(VendorAdapter::new(Dialect::Hsqldb)) as Arc<dyn DbAdapter>)
    });
    assert_eq!(detector.detect(&metadata).name(), Dialect::Hsqldb.name());
}

#[test]
fn test_artist_painting_example() {
    let map = artist_map();
    let query = SelectQuery::new("Artist")
        .with_qualifier(Expression::match_exp("paintingArray.paintingTitle", "X"));
    let translated = translate_select(&JdbcAdapter::new(), &map, &query).unwrap();
    assert_eq!(
        translated.sql,
        "SELECT DISTINCT t0.ARTIST_ID, t0.ARTIST_NAME, t0.DATE_OF_BIRTH FROM ARTIST t0, PAINTING t1 \
         WHERE t0.ARTIST_ID = t1.ARTIST_ID AND t1.PAINTING_TITLE = ?"
    );
    assert_eq!(translated.values(), vec![&Value::from("X")]);
}

#[tokio::test]
async fn test_select_through_node() {
    let ds = MemoryDataSource::product("PostgreSQL");
    ds.on_statement(|sql, params| {
        (sql.contains("t1.PAINTING_TITLE = $1") && params.len() == 1).then(|| Reply::Rows {
            columns: vec![
                ("ARTIST_ID".into(), JdbcType::BigInt),
                ("ARTIST_NAME".into(), JdbcType::Char),
                ("DATE_OF_BIRTH".into(), JdbcType::Date),
            ],
            rows: vec![vec![Value::Long(1), "Monet".into(), Value::Null]],
        })
    });
    let node = DataNode::detected("pg", ds, artist_map(), &AdapterDetector::default())
        .await
        .unwrap();
    let query = SelectQuery::new("Artist")
        .with_qualifier(Expression::match_exp("paintingArray.paintingTitle", "X"));
    let result = node.select(&query).await.unwrap();
    assert_eq!(result.rows.len(), 1);
    assert_eq!(result.rows[0].get("ARTIST_NAME"), Some(&Value::from("Monet")));
}

#[test]
fn test_decimal_column_binds_as_numeric() {
    let map = artist_map();
    let pg = VendorAdapter::new(Dialect::Postgres);
    let query = SelectQuery::new("Painting")
        .with_qualifier(parse_qualifier("estimatedPrice > 100").unwrap());
    let translated = translate_select(&pg, &map, &query).unwrap();
    assert!(translated.sql.ends_with("WHERE t0.ESTIMATED_PRICE > $1"));

    let params = translated.params(&pg).unwrap();
    assert_eq!(params, vec![SqlParam::Decimal(Decimal::from(100))]);
    let mut buf = BytesMut::new();
    params[0].to_sql_checked(&Type::NUMERIC, &mut buf).unwrap();
    assert!(!buf.is_empty());
}

#[test]
fn test_long_string_binds_in_full() {
    let map = artist_map();
    let pg = VendorAdapter::new(Dialect::Postgres);
    let name = "A".repeat(300);
    let query = SelectQuery::new("Artist")
        .with_qualifier(Expression::match_exp("artistName", name.as_str()));
    let params = translate_select(&pg, &map, &query).unwrap().params(&pg).unwrap();
    assert_eq!(params, vec![SqlParam::Text(name)]);
}
