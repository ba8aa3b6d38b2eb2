//! Offline inspection of SQLite replication targets.
//!
//! Provides the `writethru` binary. `summary` counts what a replica holds;
//! `show` prints one entity and its values. Output is JSON on stdout.

use std::collections::BTreeMap;
use std::process;

use clap::{Parser, Subcommand};

use writethru_core::EntityId;
use writethru_storage::SqliteTarget;

/// Inspect writethru replication targets.
#[derive(Parser)]
#[command(name = "writethru", about = "Inspect writethru replication targets")]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

/// Available subcommands.
#[derive(Subcommand)]
enum Commands {
    /// Count stored entities, by type.
    Summary {
        /// Path to the replica database file.
        #[arg(short, long)]
        db: String,
    },
    /// Print one entity and its stored values.
    Show {
        /// Path to the replica database file.
        #[arg(short, long)]
        db: String,

        /// Entity id, full hex.
        #[arg(short, long)]
        entity: String,
    },
}

fn main() {
    let cli = Cli::parse();

    let exit_code = match cli.command {
        Commands::Summary { db } => run_summary(&db),
        Commands::Show { db, entity } => run_show(&db, &entity),
    };
    process::exit(exit_code);
}

fn open(db_path: &str) -> Result<SqliteTarget, i32> {
    SqliteTarget::open(db_path).map_err(|e| {
        eprintln!("Error: failed to open database '{}': {}", db_path, e);
        3
    })
}

fn print_json(value: &serde_json::Value) {
    let json = serde_json::to_string_pretty(value)
        .unwrap_or_else(|e| format!("{{\"error\": \"failed to serialize result: {}\"}}", e));
    println!("{}", json);
}

/// Execute the summary subcommand.
///
/// Returns exit code: 0 = success, 3 = I/O error.
fn run_summary(db_path: &str) -> i32 {
    let target = match open(db_path) {
        Ok(t) => t,
        Err(code) => return code,
    };

    let entities = match target.list_entities() {
        Ok(e) => e,
        Err(e) => {
            eprintln!("Error: failed to read entities: {}", e);
            return 3;
        }
    };

    let mut by_type: BTreeMap<&'static str, usize> = BTreeMap::new();
    let mut values = 0;
    for (id, entity) in &entities {
        *by_type.entry(entity.kind().as_str()).or_default() += 1;
        match target.load_values(*id) {
            Ok(v) => values += v.len(),
            Err(e) => {
                eprintln!("Error: failed to read values of {}: {}", id, e);
                return 3;
            }
        }
    }

    print_json(&serde_json::json!({
        "entities": entities.len(),
        "values": values,
        "by_type": by_type,
    }));
    0
}

/// Execute the show subcommand.
///
/// Returns exit code: 0 = success, 1 = bad id or entity not found,
/// 3 = I/O error.
fn run_show(db_path: &str, entity: &str) -> i32 {
    let id: EntityId = match entity.parse() {
        Ok(id) => id,
        Err(e) => {
            eprintln!("Error: {}", e);
            return 1;
        }
    };

    let target = match open(db_path) {
        Ok(t) => t,
        Err(code) => return code,
    };

    let loaded = match target.load_entity(id) {
        Ok(Some(entity)) => entity,
        Ok(None) => {
            eprintln!("Error: entity {} not found in '{}'", id.to_hex(), db_path);
            return 1;
        }
        Err(e) => {
            eprintln!("Error: failed to load entity: {}", e);
            return 3;
        }
    };

    let values = match target.load_values(id) {
        Ok(v) => v,
        Err(e) => {
            eprintln!("Error: failed to load values: {}", e);
            return 3;
        }
    };

    // Keys are shown by name when the replica holds them.
    let values: Vec<serde_json::Value> = values
        .into_iter()
        .map(|(key, value)| {
            let key_label = match target.load_entity(key) {
                Ok(Some(key_entity)) => key_entity.to_string(),
                _ => key.to_hex(),
            };
            serde_json::json!({ "key": key_label, "value": value })
        })
        .collect();

    print_json(&serde_json::json!({
        "id": id.to_hex(),
        "entity": loaded.to_string(),
        "body": loaded,
        "values": values,
    }));
    0
}
