use anyhow::{Context, Result};
use clap::Parser as ClapParser;
use colored::Colorize;
use std::fs::File;
use std::io::{BufRead, BufReader};
use std::path::Path;
use std::time::Duration;
use tracing_subscriber::EnvFilter;

use fathom_search::cli::{Args, Command};
use fathom_search::config::{FathomConfig, OutputFormat, ResolvedConfig};
use fathom_search::engine::{
    GraphRequest, IndexSettings, RuntimeOptions, SearchEngine, SearchRequest,
};
use fathom_search::eval::Qrels;
use fathom_search::models::{DocumentRecord, QueryHits, QueryRecord, Row};

fn main() -> Result<()> {
    let args = Args::parse();
    let mut config = FathomConfig::load()?;

    if let Some(index) = &args.index {
        config.index_dir = index.clone();
    }
    if let Some(format) = &args.format {
        config.format = match format.as_str() {
            "json" => OutputFormat::Json,
            _ => OutputFormat::Text,
        };
    }

    init_tracing(&config.log_level);

    let engine = open_engine(&config)?;
    run(&args.command, &engine, &config)
}

fn init_tracing(log_level: &str) {
    let filter = EnvFilter::try_from_env("FATHOM_LOG")
        .or_else(|_| EnvFilter::try_from_default_env())
        .unwrap_or_else(|_| EnvFilter::new(log_level.to_string()));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();
}

fn open_engine(config: &ResolvedConfig) -> Result<SearchEngine> {
    let requested = config.analyzer_overridden.then(|| IndexSettings {
        analyzer: config.analyzer.clone(),
        bm25: config.bm25,
    });
    let runtime = RuntimeOptions {
        n_jobs: config.n_jobs,
        ingest_batch_size: config.ingest_batch_size,
        query_batch_size: config.query_batch_size,
    };
    SearchEngine::open(&config.index_dir, requested, runtime)
        .context("failed to open the index")
}

fn run(command: &Command, engine: &SearchEngine, config: &ResolvedConfig) -> Result<()> {
    match command {
        Command::UploadDocuments { input, key, fields } => {
            let records = read_document_records(input, key)?;
            let summary = engine.upload_documents(records, fields)?;
            print_json_or(config, &summary, || {
                println!(
                    "{} inserted, {} skipped, {} failed",
                    summary.inserted.to_string().green(),
                    summary.skipped,
                    summary.failed
                );
            });
        }
        Command::UploadQueries { input } => {
            let records = read_query_records(input)?;
            let summary = engine.upload_queries(records)?;
            print_json_or(config, &summary, || {
                println!(
                    "{} inserted, {} skipped, {} failed",
                    summary.inserted.to_string().green(),
                    summary.skipped,
                    summary.failed
                );
            });
        }
        Command::SearchDocuments {
            queries,
            top_k,
            top_k_token,
            filter,
            order_by,
            timeout_ms,
        } => {
            let request = SearchRequest {
                top_k: top_k.unwrap_or(config.top_k),
                top_k_token: top_k_token.unwrap_or(config.top_k_token),
                filter: filter.clone(),
                order_by: order_by.clone(),
                timeout: timeout_ms.map(Duration::from_millis),
            };
            let results = engine.search_documents(queries, &request)?;
            print_results(config, &results);
        }
        Command::SearchQueries {
            queries,
            top_k,
            top_k_token,
        } => {
            let request = SearchRequest {
                top_k: top_k.unwrap_or(config.top_k),
                top_k_token: top_k_token.unwrap_or(config.top_k_token),
                ..Default::default()
            };
            let results = engine.search_queries(queries, &request)?;
            print_results(config, &results);
        }
        Command::SearchGraphs {
            queries,
            top_k,
            top_k_token,
            random_tiebreak,
        } => {
            let request = GraphRequest {
                top_k: top_k.unwrap_or(config.top_k),
                top_k_token: top_k_token.unwrap_or(config.graph_top_k_token),
                random_tiebreak: *random_tiebreak,
                timeout: None,
            };
            let results = engine.search_graphs(queries, &request)?;
            print_results(config, &results);
        }
        Command::DeleteDocuments { keys } => {
            let summary = engine.delete_documents(keys)?;
            print_json_or(config, &summary, || {
                println!(
                    "{} deleted, {} missing",
                    summary.deleted.to_string().green(),
                    summary.missing
                );
            });
        }
        Command::Evaluate {
            queries,
            qrels,
            k,
            top_k,
            top_k_token,
        } => {
            let run_queries = read_run_queries(queries)?;
            let qrels = read_qrels(qrels)?;
            let request = SearchRequest {
                top_k: top_k.unwrap_or_else(|| k.iter().copied().max().unwrap_or(config.top_k)),
                top_k_token: top_k_token.unwrap_or(config.top_k_token),
                ..Default::default()
            };
            let report = engine.evaluate(&run_queries, &qrels, k, &request)?;
            print_json_or(config, &report, || {
                println!("queries evaluated: {}", report.queries_evaluated);
                for (metric, value) in &report.metrics {
                    println!("{metric}: {value:.4}");
                }
            });
        }
    }
    Ok(())
}

/// Read one JSON object per line, pulling the key out of the named column.
/// A line without the key column fails that record only.
fn read_document_records(path: &Path, key_field: &str) -> Result<Vec<DocumentRecord>> {
    let file = File::open(path).context(format!("failed to open {path:?}"))?;
    let mut records = Vec::new();
    for (lineno, line) in BufReader::new(file).lines().enumerate() {
        let line = line?;
        if line.trim().is_empty() {
            continue;
        }
        let row: Row = serde_json::from_str(&line)
            .context(format!("{path:?}:{}: not a JSON object", lineno + 1))?;
        let key = row
            .get(key_field)
            .and_then(|v| match v {
                serde_json::Value::String(s) => Some(s.clone()),
                serde_json::Value::Number(n) => Some(n.to_string()),
                _ => None,
            })
            .unwrap_or_default();
        // an empty key is counted as a failed record by the indexer
        records.push(DocumentRecord { key, row });
    }
    Ok(records)
}

fn read_query_records(path: &Path) -> Result<Vec<QueryRecord>> {
    let file = File::open(path).context(format!("failed to open {path:?}"))?;
    let mut records = Vec::new();
    for (lineno, line) in BufReader::new(file).lines().enumerate() {
        let line = line?;
        if line.trim().is_empty() {
            continue;
        }
        let record: QueryRecord = serde_json::from_str(&line)
            .context(format!("{path:?}:{}: bad query record", lineno + 1))?;
        records.push(record);
    }
    Ok(records)
}

fn read_run_queries(path: &Path) -> Result<Vec<(String, String)>> {
    #[derive(serde::Deserialize)]
    struct RunQuery {
        query_id: String,
        text: String,
    }
    let file = File::open(path).context(format!("failed to open {path:?}"))?;
    let mut out = Vec::new();
    for (lineno, line) in BufReader::new(file).lines().enumerate() {
        let line = line?;
        if line.trim().is_empty() {
            continue;
        }
        let q: RunQuery = serde_json::from_str(&line)
            .context(format!("{path:?}:{}: bad run query", lineno + 1))?;
        out.push((q.query_id, q.text));
    }
    Ok(out)
}

/// TREC qrels format: `query_id 0 doc_key relevance`, whitespace separated.
fn read_qrels(path: &Path) -> Result<Qrels> {
    let file = File::open(path).context(format!("failed to open {path:?}"))?;
    let mut qrels = Qrels::default();
    for (lineno, line) in BufReader::new(file).lines().enumerate() {
        let line = line?;
        let parts: Vec<&str> = line.split_whitespace().collect();
        if parts.is_empty() {
            continue;
        }
        anyhow::ensure!(
            parts.len() == 4,
            "{path:?}:{}: expected 'query_id 0 doc_key relevance'",
            lineno + 1
        );
        let relevance: f32 = parts[3]
            .parse()
            .context(format!("{path:?}:{}: bad relevance grade", lineno + 1))?;
        qrels
            .entry(parts[0].to_string())
            .or_default()
            .insert(parts[2].to_string(), relevance);
    }
    Ok(qrels)
}

fn print_results(config: &ResolvedConfig, results: &[QueryHits]) {
    if config.format == OutputFormat::Json {
        println!("{}", serde_json::to_string_pretty(results).unwrap_or_default());
        return;
    }
    for result in results {
        let header = if result.partial {
            format!("{} (partial)", result.query).yellow()
        } else {
            result.query.normal()
        };
        println!("{} {header}", "query:".bold());
        if result.hits.is_empty() {
            println!("  no results");
            continue;
        }
        for (rank, hit) in result.hits.iter().enumerate() {
            println!(
                "  {:>3}. {}  {}",
                rank + 1,
                hit.key.cyan(),
                format!("{:.4}", hit.score).dimmed()
            );
        }
    }
}

fn print_json_or<T: serde::Serialize>(config: &ResolvedConfig, value: &T, text: impl FnOnce()) {
    if config.format == OutputFormat::Json {
        println!("{}", serde_json::to_string_pretty(value).unwrap_or_default());
    } else {
        text();
    }
}
