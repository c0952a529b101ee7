use bqlite::{
    BqClient, ClientConfig, ColumnSchema, Credentials, Field, JobOutcome, LogicalType,
    MockWarehouse, QueryJobOptions, ReadOptions, Result, TableRef, TypedTable, WriteDisposition,
};
use clap::{Parser, Subcommand, ValueEnum};
use colored::Colorize;
use serde_json::json;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;
use tabled::builder::Builder;
use tabled::settings::Style;
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(name = "bqlite")]
#[command(about = "Simple BigQuery client", long_about = None)]
#[command(version)]
struct Cli {
    /// BigQuery project id
    #[arg(long, env = "BQLITE_PROJECT")]
    project: String,

    /// Service account key file; application default credentials when absent
    #[arg(long, env = "GOOGLE_APPLICATION_CREDENTIALS")]
    key_file: Option<PathBuf>,

    /// Run against an in-memory warehouse seeded with a `demo` dataset
    #[arg(long)]
    mock: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Run a query and print the result
    Query {
        sql: String,

        #[arg(long)]
        legacy_sql: bool,

        #[arg(long)]
        use_cache: bool,

        #[arg(long)]
        max_results: Option<u32>,
    },

    /// Create a table from a YAML schema file
    CreateTable {
        #[arg(long)]
        dataset: String,

        #[arg(long)]
        table: String,

        #[arg(long)]
        schema: PathBuf,
    },

    /// Delete a table
    DeleteTable {
        #[arg(long)]
        dataset: String,

        #[arg(long)]
        table: String,
    },

    /// Print the schema of a table
    Schema {
        #[arg(long)]
        dataset: String,

        #[arg(long)]
        table: String,
    },

    /// Run a query writing its result into a table
    QueryToTable {
        sql: String,

        #[arg(long)]
        dataset: String,

        #[arg(long)]
        table: String,

        #[arg(long, value_enum, default_value = "truncate")]
        disposition: Disposition,

        /// Seconds to wait for the job before giving up
        #[arg(long, default_value = "1800")]
        timeout: u64,

        #[arg(long)]
        legacy_sql: bool,

        #[arg(long)]
        use_cache: bool,
    },
}

#[derive(Clone, Copy, ValueEnum)]
enum Disposition {
    Truncate,
    Append,
    Empty,
}

impl From<Disposition> for WriteDisposition {
    fn from(value: Disposition) -> Self {
        match value {
            Disposition::Truncate => WriteDisposition::WriteTruncate,
            Disposition::Append => WriteDisposition::WriteAppend,
            Disposition::Empty => WriteDisposition::WriteEmpty,
        }
    }
}

#[tokio::main]
async fn main() {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();

    if let Err(e) = run(cli).await {
        eprintln!("{} {}", "error:".red().bold(), e);
        std::process::exit(1);
    }
}

async fn run(cli: Cli) -> Result<()> {
    let client = if cli.mock {
        BqClient::with_warehouse(
            Arc::new(demo_warehouse(&cli.project)),
            ClientConfig::from_env(),
        )
    } else {
        BqClient::new(Credentials::resolve(None, cli.key_file))
    };
    let project = cli.project.as_str();

    match cli.command {
        Commands::Query {
            sql,
            legacy_sql,
            use_cache,
            max_results,
        } => {
            let options = ReadOptions {
                use_legacy_sql: legacy_sql,
                use_query_cache: use_cache,
                max_results,
            };
            match client.read(&sql, project, &options).await? {
                Some(table) => {
                    println!("{}", render_table(&table));
                    println!(
                        "{}",
                        format!("{} row(s)", table.row_count()).dimmed()
                    );
                }
                None => println!("{}", "Query returned no result set".yellow()),
            }
        }

        Commands::CreateTable {
            dataset,
            table,
            schema,
        } => {
            let schema = ColumnSchema::load(&schema)?;
            client
                .create_table_with_schema(&schema, project, &dataset, &table)
                .await?;
            println!("{} {}:{}", "Created".green(), dataset, table);
        }

        Commands::DeleteTable { dataset, table } => {
            client.delete_table(project, &dataset, &table).await?;
            println!("{} {}:{}", "Deleted".green(), dataset, table);
        }

        Commands::Schema { dataset, table } => {
            let schema = client.table_schema(project, &dataset, &table).await?;
            println!("{}", render_schema(&schema));
        }

        Commands::QueryToTable {
            sql,
            dataset,
            table,
            disposition,
            timeout,
            legacy_sql,
            use_cache,
        } => {
            let options = QueryJobOptions {
                write_disposition: disposition.into(),
                use_legacy_sql: legacy_sql,
                use_query_cache: use_cache,
                wait_timeout: Duration::from_secs(timeout),
            };
            match client
                .read_to_table(&sql, project, &dataset, &table, &options)
                .await?
            {
                JobOutcome::Done => println!("{} {}:{}", "Written".green(), dataset, table),
                JobOutcome::TimedOut { job_id } => println!(
                    "{} job {} still running after {}s",
                    "Timeout:".yellow().bold(),
                    job_id,
                    timeout
                ),
            }
        }
    }

    Ok(())
}

const DEMO_DATASET: &str = "demo";
const DEMO_QUERY: &str = "SELECT * FROM demo.events";

/// In-memory warehouse holding `demo.events`, answering `DEMO_QUERY`.
fn demo_warehouse(project_id: &str) -> MockWarehouse {
    let schema = ColumnSchema::new(vec![
        Field::new("id", LogicalType::Integer),
        Field::new("name", LogicalType::String),
        Field::new("active", LogicalType::Boolean),
        Field::new("seen_at", LogicalType::Timestamp),
    ]);

    MockWarehouse::new()
        .with_table(
            TableRef::new(project_id, DEMO_DATASET, "events"),
            schema.clone(),
        )
        .with_query(
            DEMO_QUERY,
            Some(schema),
            vec![vec![
                vec![json!("1"), json!("signup"), json!("true"), json!("1.7052768E9")],
                vec![json!("2"), json!("login"), json!("false"), json!(null)],
            ]],
        )
}

fn render_table(table: &TypedTable) -> String {
    let mut builder = Builder::default();
    builder.push_record(table.column_names().into_iter().map(String::from));
    for row in 0..table.row_count() {
        builder.push_record(table.columns().iter().map(|c| c.data.display_value(row)));
    }
    let mut rendered = builder.build();
    rendered.with(Style::rounded());
    rendered.to_string()
}

fn render_schema(schema: &ColumnSchema) -> String {
    let mut builder = Builder::default();
    builder.push_record(["name", "type", "mode"].map(String::from));
    for field in schema.fields() {
        builder.push_record([
            field.name.clone(),
            field.logical_type.to_string(),
            field.mode.to_string(),
        ]);
    }
    let mut rendered = builder.build();
    rendered.with(Style::rounded());
    rendered.to_string()
}

#[cfg(test)]
mod tests {
    use super::*;
    use tokio_test::assert_ok;

    fn demo_client() -> BqClient {
        BqClient::with_warehouse(
            Arc::new(demo_warehouse("demo-project")),
            ClientConfig::default(),
        )
    }

    #[tokio::test]
    async fn test_demo_query_returns_rows() {
        let client = demo_client();

        let table = assert_ok!(
            client
                .read(DEMO_QUERY, "demo-project", &ReadOptions::default())
                .await
        )
        .unwrap();

        assert_eq!(table.row_count(), 2);
        assert!(render_table(&table).contains("signup"));
    }

    #[tokio::test]
    async fn test_demo_table_schema() {
        let client = demo_client();

        let schema = assert_ok!(client.table_schema("demo-project", DEMO_DATASET, "events").await);

        assert_eq!(schema.len(), 4);
        assert!(render_schema(&schema).contains("seen_at"));
    }

    #[test]
    fn test_key_file_from_application_credentials_env() {
        std::env::set_var("GOOGLE_APPLICATION_CREDENTIALS", "/tmp/key.json");
        let cli = Cli::try_parse_from(["bqlite", "--project", "p", "schema", "--dataset", "d", "--table", "t"]);
        std::env::remove_var("GOOGLE_APPLICATION_CREDENTIALS");

        let cli = cli.unwrap();
        assert_eq!(cli.key_file, Some(PathBuf::from("/tmp/key.json")));
        assert!(matches!(cli.command, Commands::Schema { .. }));
    }
}
