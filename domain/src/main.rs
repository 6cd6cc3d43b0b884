use std::env;
use std::process;

use domain::adapters::memory_store::InMemoryStore;
use domain::{Condition, Record, RecordStore, Table};

fn print_usage() {
    eprintln!(
        "{}\n\nUsage:\n  domain tables\n  domain list <table> [--where <column>=<value>] [--limit <n>]\n  domain get <table> <id>\n  domain delete <table> <id>\n\nNotes:\n  - This demo CLI uses the seeded in-memory store; changes are not persisted across runs.",
        domain::about()
    );
}

fn print_rows(rows: &[Record]) -> Result<(), String> {
    for row in rows {
        let line = serde_json::to_string(row).map_err(|e| format!("encode failed: {}", e))?;
        println!("{}", line);
    }
    Ok(())
}

fn parse_table(args: &mut impl Iterator<Item = String>) -> Result<Table, String> {
    let Some(name) = args.next() else {
        return Err("missing <table>".into());
    };
    Table::parse(&name).map_err(|e| e.to_string())
}

fn run() -> Result<(), String> {
    let mut args = env::args().skip(1); // skip program name

    let Some(cmd) = args.next() else {
        print_usage();
        return Ok(());
    };

    let store = InMemoryStore::seeded();

    match cmd.as_str() {
        "tables" => {
            for table in Table::ALL {
                let count = store.all(table).map_err(|e| e.to_string())?.len();
                println!("{:<26} {}", table.as_str(), count);
            }
            Ok(())
        }
        "list" => {
            let table = parse_table(&mut args)?;
            let mut conditions = Vec::new();
            let mut limit: Option<usize> = None;

            // Parse simple flags: --where <col>=<val>, --limit <n>
            let rest: Vec<String> = args.collect();
            let mut i = 0;
            while i < rest.len() {
                match rest[i].as_str() {
                    "--where" => {
                        let Some(pair) = rest.get(i + 1) else {
                            return Err("--where requires <column>=<value>".into());
                        };
                        let Some((col, val)) = pair.split_once('=') else {
                            return Err(format!("invalid --where: {}", pair));
                        };
                        conditions.push(Condition::eq(col, val));
                        i += 2;
                    }
                    "--limit" => {
                        let Some(raw) = rest.get(i + 1) else {
                            return Err("--limit requires a value".into());
                        };
                        limit = Some(raw.parse().map_err(|_| format!("invalid --limit: {}", raw))?);
                        i += 2;
                    }
                    unk => {
                        return Err(format!("unknown argument: {}", unk));
                    }
                }
            }

            let mut rows = store
                .filter(table, &conditions)
                .map_err(|e| format!("list failed: {}", e))?;
            if let Some(n) = limit {
                rows.truncate(n);
            }
            print_rows(&rows)
        }
        "get" => {
            let table = parse_table(&mut args)?;
            let Some(id) = args.next() else {
                return Err("missing <id> for get".into());
            };
            match store.get(table, &id) {
                Ok(Some(row)) => print_rows(&[row]),
                Ok(None) => Err("not found".into()),
                Err(e) => Err(format!("get failed: {}", e)),
            }
        }
        "delete" => {
            let table = parse_table(&mut args)?;
            let Some(id) = args.next() else {
                return Err("missing <id> for delete".into());
            };
            match store.delete(table, &id) {
                Ok(Some(row)) => {
                    println!("deleted: {}", row.id().unwrap_or_default());
                    Ok(())
                }
                Ok(None) => Err("not found".into()),
                Err(e) => Err(format!("delete failed: {}", e)),
            }
        }
        _ => {
            print_usage();
            Ok(())
        }
    }
}

fn main() {
    if let Err(msg) = run() {
        eprintln!("error: {}", msg);
        process::exit(1);
    }
}
