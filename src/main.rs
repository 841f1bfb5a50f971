use anyhow::{Context, Result};
use tracing_subscriber::EnvFilter;

use filterparams_sql::config::{load_binding, load_query, load_schema};
use filterparams_sql::QueryBinding;

const DEFAULT_SCHEMA: &str = "demos/schema.json";
const DEFAULT_BINDING: &str = "demos/binding.json";
const DEFAULT_QUERY: &str = "demos/query.json";

fn main() -> Result<()> {
    // RUST_LOG=filterparams_sql=debug 可查看join和过滤器日志
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .with_writer(std::io::stderr)
        .init();

    let args: Vec<String> = std::env::args().skip(1).collect();
    if !args.is_empty() && args.len() != 3 {
        eprintln!("usage: filterparams_sql [<schema.json> <binding.json> <query.json>]");
        std::process::exit(2);
    }
    let (schema_path, binding_path, query_path) = match args.as_slice() {
        [schema, binding, query] => (schema.as_str(), binding.as_str(), query.as_str()),
        _ => (DEFAULT_SCHEMA, DEFAULT_BINDING, DEFAULT_QUERY),
    };

    println!("--- filterparams_sql: filter tree to SQL ---");

    // 1. 加载schema
    let schema = load_schema(schema_path).context("loading schema")?;
    println!("\n[schema]: {}", schema_path);
    for entity in schema.entities() {
        println!(
            "  {} -> {} ({} columns, {} relationships)",
            entity.name,
            entity.table,
            entity.columns.len(),
            entity.relationships.len()
        );
    }

    // 2. 加载binding配置
    let config = load_binding(binding_path).context("loading binding configuration")?;
    println!("\n[binding]: {}", binding_path);
    for (name, entry) in &config.binding {
        if entry.join_path().is_empty() {
            println!("  {} -> {}", name, entry.param());
        } else {
            println!("  {} -> {} via {}", name, entry.param(), entry.join_path().join("."));
        }
    }

    // 3. 加载过滤查询并求值
    let query = load_query(query_path).context("loading filter query")?;
    let binding = QueryBinding::new(&schema, config);
    let select = binding
        .evaluate(&query)
        .with_context(|| format!("evaluating {}", query_path))?;

    println!("\n[SQL]:");
    println!("{}", binding.to_sql(&select)?);
    Ok(())
}
