// Classroom Economy - Admin CLI
// Classroom setup and the scheduled jobs (price feed, seat repricing, overdue sweep)

use anyhow::{anyhow, Context, Result};
use chrono::Utc;
use classroom_economy::{
    assets, classroom, db, ledger, loans, seats, transaction_log, AccountKind, EconomyConfig,
    PriceSheet, Session,
};
use std::env;
use std::fs::File;
use std::path::PathBuf;

/// Upper bound on entries in one exported statement
const STATEMENT_LIMIT: usize = 100_000;

const USAGE: &str = "Usage: classroom-economy <command>

Commands:
  init <teacher_id> <name>                    Create a classroom
  roster <teacher_id> <roster.csv>            Enroll students (name,credit_score,checking,savings,investment)
  students <teacher_id>                       List students with their account balances
  credit-score <teacher_id> <student> <score> Set a student's credit score (0-1000)
  set-active <teacher_id> <student> <on|off>  Include or exclude a student from seats and batches
  prices <prices.csv>                         Refresh asset prices (symbol,price)
  reprice-seats <teacher_id>                  Recompute the classroom seat price
  mark-overdue <teacher_id>                   Flag loans past their payment date
  stats <teacher_id>                          Money supply and transaction totals
  statement <teacher_id> <student_id> <out>   Export a student statement as CSV

Environment:
  ECONOMY_DB      database path (default: economy.db)
  ECONOMY_CONFIG  JSON config file (default: built-in rules)
  RUST_LOG        log filter (default: warn)";

fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("warn")),
        )
        .init();

    let args: Vec<String> = env::args().skip(1).collect();
    let Some(command) = args.first() else {
        println!("{}", USAGE);
        return Ok(());
    };

    let config = EconomyConfig::from_env()?;
    let db_path = PathBuf::from(env::var("ECONOMY_DB").unwrap_or_else(|_| "economy.db".into()));
    let mut conn = db::open_database(&db_path)?;

    match (command.as_str(), &args[1..]) {
        ("init", [teacher_id, name]) => {
            let session = Session::teacher(teacher_id.as_str());
            let created = classroom::create_classroom(&mut conn, &config, &session, name)?;
            println!("🏫 Classroom '{}' created", created.name);
            println!("✓ Join code: {}", created.join_code);
            println!("✓ Seats: {}", config.seats.seat_count);
        }
        ("roster", [teacher_id, path]) => {
            let file = File::open(path).with_context(|| format!("Failed to open roster {}", path))?;
            let session = Session::teacher(teacher_id.as_str());
            let students = classroom::import_roster(&mut conn, &config, &session, file)?;
            println!("🎓 Enrolled {} students", students.len());
            for student in &students {
                println!("   {}  {} (credit {})", student.id, student.name, student.credit_score);
            }
        }
        ("students", [teacher_id]) => {
            let students = classroom::list_students(&conn, teacher_id)?;
            println!("🎓 {} students", students.len());
            println!("━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━");
            for student in &students {
                let balances = ledger::balances(&conn, &student.id)?;
                let accounts: Vec<String> = AccountKind::ALL
                    .iter()
                    .map(|kind| format!("{} {:.2}", kind, balances.get(*kind)))
                    .collect();
                let marker = if student.active { "" } else { "  (inactive)" };
                println!(
                    "   {}  {} (credit {}){}",
                    student.id, student.name, student.credit_score, marker
                );
                println!("      {}", accounts.join(" | "));
            }
        }
        ("credit-score", [teacher_id, student_id, score]) => {
            let score: i64 = score
                .parse()
                .with_context(|| format!("Invalid credit score '{}'", score))?;
            let session = Session::teacher(teacher_id.as_str());
            let student = classroom::set_credit_score(&conn, &session, student_id, score)?;
            println!("✓ {} now has credit score {}", student.name, student.credit_score);
        }
        ("set-active", [teacher_id, student_id, flag]) => {
            let active = match flag.as_str() {
                "on" => true,
                "off" => false,
                other => return Err(anyhow!("expected 'on' or 'off', got '{}'", other)),
            };
            let session = Session::teacher(teacher_id.as_str());
            let student = classroom::set_active(&conn, &session, student_id, active)?;
            let state = if student.active { "active" } else { "inactive" };
            println!("✓ {} is now {}", student.name, state);
        }
        ("prices", [path]) => {
            let file = File::open(path)
                .with_context(|| format!("Failed to open price sheet {}", path))?;
            let sheet = PriceSheet::from_reader(file)?;
            let refresh = assets::refresh_prices(&conn, &sheet)?;
            println!("📈 Updated {} prices", refresh.updated.len());
            if !refresh.skipped.is_empty() {
                println!("⚠️  No usable quote for: {}", refresh.skipped.join(", "));
            }
        }
        ("reprice-seats", [teacher_id]) => {
            let session = Session::teacher(teacher_id.as_str());
            let repricing = seats::recompute_seat_prices(&mut conn, &config, &session)?;
            println!(
                "🪑 Seat price: {:.0} ({} active students, {:.0} total balance)",
                repricing.price, repricing.active_students, repricing.total_balance
            );
        }
        ("mark-overdue", [teacher_id]) => {
            let session = Session::teacher(teacher_id.as_str());
            let marked = loans::mark_overdue_loans(&conn, &session, Utc::now())?;
            println!("🏦 {} loan(s) marked overdue", marked);
        }
        ("stats", [teacher_id]) => {
            classroom::find_classroom(&conn, teacher_id)?;
            let supply = ledger::money_supply(&conn, teacher_id)?;
            println!("💰 Money supply");
            println!("━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━");
            println!("   Students:    {:>16.2}", supply.student_cash);
            println!("   Government:  {:>16.2}", supply.government);
            println!("   Bank:        {:>16.2}", supply.bank);
            println!("   Securities:  {:>16.2}", supply.securities);
            println!("   Loans owed:  {:>16.2}", supply.outstanding_loans);

            println!("\n📜 Transactions");
            println!("━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━");
            for total in transaction_log::classroom_stats(&conn, teacher_id)? {
                println!(
                    "   {:<22} {:>6}  {:>16.2}  fees {:.2}",
                    total.tx_type, total.count, total.total_amount, total.total_fees
                );
            }
        }
        ("statement", [teacher_id, student_id, out]) => {
            classroom::find_student(&conn, teacher_id, student_id)?;
            let entries = transaction_log::entries_for_student(&conn, student_id, STATEMENT_LIMIT)?;
            let file = File::create(out).with_context(|| format!("Failed to create {}", out))?;
            let rows = transaction_log::export_statement_csv(file, &entries)?;
            println!("✓ Wrote {} entries to {}", rows, out);
        }
        _ => {
            eprintln!("{}", USAGE);
            return Err(anyhow!("unknown command or wrong arguments: {}", args.join(" ")));
        }
    }

    Ok(())
}
