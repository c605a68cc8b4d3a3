mod config;
mod session;
mod tui;

use anyhow::Result;
use chrono::{Datelike, Utc};
use clap::{Parser, Subcommand};
use colored::Colorize;
use comfy_table::{ContentArrangement, Table};
use tokio::runtime::Runtime;

use salescope_core::format::{format_count, format_currency, format_percentage};
use salescope_core::{
    course_table, marketing_stats, monthly_revenue, overview_stats, revenue_by_campaign,
    revenue_by_source, sort_course_rows, trailing_window, CourseSortField, DateOrder, RecordStore,
    SaleQuery, SaleRecord, SortDirection, UNIDENTIFIED_COURSE,
};

use config::Config;

#[derive(Parser)]
#[command(name = "salescope")]
#[command(author, version, about = "Sales and enrollment analytics")]
struct Cli {
    #[command(subcommand)]
    command: Option<Commands>,

    #[arg(long)]
    debug: bool,
}

#[derive(Subcommand)]
enum Commands {
    #[command(about = "Show current-month KPIs and recent sales")]
    Overview {
        #[arg(long, help = "Output as JSON")]
        json: bool,
        #[arg(long, help = "Disable spinner")]
        no_spinner: bool,
    },
    #[command(about = "Show campaign and channel performance")]
    Marketing {
        #[arg(long, help = "Output as JSON")]
        json: bool,
        #[arg(long, help = "Disable spinner")]
        no_spinner: bool,
    },
    #[command(about = "Show per-course analysis table")]
    Courses {
        #[arg(long, help = "Output as JSON")]
        json: bool,
        #[arg(long, help = "Disable spinner")]
        no_spinner: bool,
        #[arg(long, help = "Sort column: name, students, revenue, ticket, last-sale")]
        sort: Option<String>,
        #[arg(long, help = "Sort ascending instead of descending")]
        asc: bool,
    },
    #[command(about = "Show monthly revenue timeline")]
    Timeline {
        #[arg(long, help = "Output as JSON")]
        json: bool,
        #[arg(long, help = "Disable spinner")]
        no_spinner: bool,
        #[arg(long, help = "Restrict to one course id")]
        course: Option<String>,
        #[arg(long, default_value = "6", help = "Trailing window in months")]
        months: u32,
    },
    #[command(about = "Show latest sales")]
    Recent {
        #[arg(long, help = "Output as JSON")]
        json: bool,
        #[arg(long, help = "Disable spinner")]
        no_spinner: bool,
        #[arg(long, default_value = "10")]
        limit: u32,
    },
    #[command(about = "Login to Salescope")]
    Login,
    #[command(about = "Logout from Salescope")]
    Logout,
    #[command(about = "Show current logged in user")]
    Whoami,
}

fn main() -> Result<()> {
    let cli = Cli::parse();

    let filter = if cli.debug { "debug" } else { "warn" };
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(filter)),
        )
        .with_writer(std::io::stderr)
        .init();

    match cli.command {
        Some(Commands::Overview { json, no_spinner }) => run_overview(json, no_spinner),
        Some(Commands::Marketing { json, no_spinner }) => run_marketing(json, no_spinner),
        Some(Commands::Courses {
            json,
            no_spinner,
            sort,
            asc,
        }) => run_courses(json, no_spinner, sort.as_deref(), asc),
        Some(Commands::Timeline {
            json,
            no_spinner,
            course,
            months,
        }) => run_timeline(json, no_spinner, course, months),
        Some(Commands::Recent {
            json,
            no_spinner,
            limit,
        }) => run_recent(json, no_spinner, limit),
        Some(Commands::Login) => session::login(&Config::load()?),
        Some(Commands::Logout) => session::logout(),
        Some(Commands::Whoami) => session::whoami(),
        None => {
            session::require()?;
            tui::run(Config::load()?)
        }
    }
}

fn open_store() -> Result<RecordStore> {
    session::require()?;
    let config = Config::load()?;
    Ok(RecordStore::new(config.store_url, config.store_key))
}

fn spinner(enabled: bool) -> Option<indicatif::ProgressBar> {
    if !enabled {
        return None;
    }
    let pb = indicatif::ProgressBar::new_spinner();
    pb.set_message("Fetching records...");
    pb.enable_steady_tick(std::time::Duration::from_millis(80));
    Some(pb)
}

fn finish(pb: Option<indicatif::ProgressBar>) {
    if let Some(pb) = pb {
        pb.finish_and_clear();
    }
}

fn run_overview(json: bool, no_spinner: bool) -> Result<()> {
    let store = open_store()?;
    let pb = spinner(!no_spinner);

    let today = Utc::now().date_naive();
    let month_start = today.with_day(1).unwrap_or(today);

    let rt = Runtime::new()?;
    let query = SaleQuery::window(trailing_window(12));
    let (sales, leads) = rt.block_on(async {
        tokio::join!(
            store.fetch_sales(&query),
            store.fetch_leads_since(month_start),
        )
    });
    finish(pb);

    let sales = sales?;
    let new_leads = leads?.len() as u32;
    let stats = overview_stats(&sales, new_leads, today);

    if json {
        println!("{}", serde_json::to_string_pretty(&stats)?);
        return Ok(());
    }

    println!("\n  {}\n", "Salescope - Overview".cyan());
    println!(
        "  Revenue (month):  {}",
        format_currency(stats.month_revenue).green().bold()
    );
    println!("  New students:     {}", format_count(u64::from(stats.new_students)).bold());
    println!("  New leads:        {}", format_count(u64::from(stats.new_leads)).bold());
    println!("  Average ticket:   {}", format_currency(stats.average_ticket).bold());
    println!();
    Ok(())
}

fn run_marketing(json: bool, no_spinner: bool) -> Result<()> {
    let store = open_store()?;
    let pb = spinner(!no_spinner);

    let since = trailing_window(12);
    let rt = Runtime::new()?;
    let query = SaleQuery::window(since);
    let (sales, leads) = rt.block_on(async {
        tokio::join!(
            store.fetch_sales(&query),
            store.fetch_leads_since(since),
        )
    });
    finish(pb);

    let sales = sales?;
    let lead_count = leads?.len() as u32;

    let stats = marketing_stats(&sales, lead_count);
    let campaigns = revenue_by_campaign(&sales);
    let channels = revenue_by_source(&sales);

    if json {
        let out = serde_json::json!({
            "stats": stats,
            "campaigns": campaigns,
            "channels": channels,
        });
        println!("{}", serde_json::to_string_pretty(&out)?);
        return Ok(());
    }

    println!("\n  {}\n", "Salescope - Marketing".cyan());
    println!("  Channels:        {}", stats.channel_count);
    println!("  Campaigns:       {}", stats.campaign_count);
    if let Some(best) = &stats.best_channel {
        println!("  Best channel:    {} ({})", best.name.bold(), format_currency(best.total));
    }
    if let Some(best) = &stats.best_campaign {
        println!("  Best campaign:   {} ({})", best.name.bold(), format_currency(best.total));
    }
    println!("  Conversion:      {}", format_percentage(stats.conversion_rate).bold());

    let mut table = Table::new();
    table.set_content_arrangement(ContentArrangement::Dynamic);
    table.set_header(vec!["Campaign", "Sales", "Revenue", "Avg"]);
    for row in &campaigns {
        table.add_row(vec![
            row.full_label.clone(),
            format_count(u64::from(row.count)),
            format_currency(row.total),
            format_currency(row.average),
        ]);
    }
    println!("\n{table}");

    let mut table = Table::new();
    table.set_content_arrangement(ContentArrangement::Dynamic);
    table.set_header(vec!["Channel", "Sales", "Revenue", "Avg"]);
    for row in &channels {
        table.add_row(vec![
            row.full_label.clone(),
            format_count(u64::from(row.count)),
            format_currency(row.total),
            format_currency(row.average),
        ]);
    }
    println!("\n{table}");
    Ok(())
}

fn parse_sort(field: Option<&str>) -> Result<CourseSortField> {
    match field {
        None | Some("revenue") => Ok(CourseSortField::Revenue),
        Some("name") => Ok(CourseSortField::Name),
        Some("students") => Ok(CourseSortField::Students),
        Some("ticket") => Ok(CourseSortField::AverageTicket),
        Some("last-sale") => Ok(CourseSortField::LastSale),
        Some(other) => anyhow::bail!(
            "unknown sort column '{other}' (expected name, students, revenue, ticket or last-sale)"
        ),
    }
}

fn run_courses(json: bool, no_spinner: bool, sort: Option<&str>, asc: bool) -> Result<()> {
    let field = parse_sort(sort)?;
    let store = open_store()?;
    let pb = spinner(!no_spinner);

    let rt = Runtime::new()?;
    let sales = rt.block_on(store.fetch_sales(&SaleQuery::window(trailing_window(12))))?;
    finish(pb);

    let mut rows = course_table(&sales);
    let direction = if asc {
        SortDirection::Ascending
    } else {
        SortDirection::Descending
    };
    sort_course_rows(&mut rows, field, direction);

    if json {
        println!("{}", serde_json::to_string_pretty(&rows)?);
        return Ok(());
    }

    let mut table = Table::new();
    table.set_content_arrangement(ContentArrangement::Dynamic);
    table.set_header(vec![
        "Code", "Course", "Students", "Revenue", "Avg ticket", "First sale", "Last sale",
    ]);
    for row in &rows {
        table.add_row(vec![
            row.code.clone(),
            row.name.clone(),
            format_count(u64::from(row.students)),
            format_currency(row.revenue),
            format_currency(row.average_ticket),
            row.first_sale.map(|d| d.to_string()).unwrap_or_else(|| "-".to_string()),
            row.last_sale.map(|d| d.to_string()).unwrap_or_else(|| "-".to_string()),
        ]);
    }
    println!("{table}");

    let total: f64 = rows.iter().map(|r| r.revenue).sum();
    let students: u32 = rows.iter().map(|r| r.students).sum();
    println!(
        "\nTotal: {} students | {}",
        format_count(u64::from(students)),
        format_currency(total)
    );
    Ok(())
}

fn run_timeline(json: bool, no_spinner: bool, course: Option<String>, months: u32) -> Result<()> {
    let store = open_store()?;
    let pb = spinner(!no_spinner);

    let mut query = SaleQuery::window(trailing_window(months)).order(DateOrder::Ascending);
    if let Some(course_id) = course {
        query = query.course(course_id);
    }

    let rt = Runtime::new()?;
    let sales = rt.block_on(store.fetch_sales(&query))?;
    finish(pb);

    let points = monthly_revenue(&sales);

    if json {
        println!("{}", serde_json::to_string_pretty(&points)?);
        return Ok(());
    }

    if points.is_empty() {
        println!("\n  {}\n", "No sales in the selected window.".yellow());
        return Ok(());
    }

    let mut table = Table::new();
    table.set_content_arrangement(ContentArrangement::Dynamic);
    table.set_header(vec!["Month", "Sales", "Revenue"]);
    for point in &points {
        table.add_row(vec![
            point.label.clone(),
            format_count(u64::from(point.count)),
            format_currency(point.total),
        ]);
    }
    println!("{table}");
    Ok(())
}

fn run_recent(json: bool, no_spinner: bool, limit: u32) -> Result<()> {
    let store = open_store()?;
    let pb = spinner(!no_spinner);

    let rt = Runtime::new()?;
    let sales = rt.block_on(store.fetch_recent_sales(limit))?;
    finish(pb);

    if json {
        let rows: Vec<serde_json::Value> = sales.iter().map(recent_row_json).collect();
        println!("{}", serde_json::to_string_pretty(&rows)?);
        return Ok(());
    }

    let mut table = Table::new();
    table.set_content_arrangement(ContentArrangement::Dynamic);
    table.set_header(vec!["Date", "Buyer", "Course", "Source", "Amount"]);
    for sale in &sales {
        table.add_row(vec![
            sale.purchase_day()
                .map(|d| d.to_string())
                .unwrap_or_else(|| sale.purchase_date.clone()),
            sale.buyer_name().unwrap_or("Unknown").to_string(),
            sale.course_name().unwrap_or(UNIDENTIFIED_COURSE).to_string(),
            sale.source().unwrap_or("-").to_string(),
            format_currency(sale.amount()),
        ]);
    }
    println!("{table}");
    Ok(())
}

fn recent_row_json(sale: &SaleRecord) -> serde_json::Value {
    serde_json::json!({
        "date": sale.purchase_day().map(|d| d.to_string()),
        "buyer": sale.buyer_name(),
        "course": sale.course_name(),
        "source": sale.source(),
        "amount": sale.amount(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn sort_flag_parses_every_column() {
        assert_eq!(parse_sort(None).unwrap(), CourseSortField::Revenue);
        assert_eq!(parse_sort(Some("name")).unwrap(), CourseSortField::Name);
        assert_eq!(parse_sort(Some("students")).unwrap(), CourseSortField::Students);
        assert_eq!(parse_sort(Some("ticket")).unwrap(), CourseSortField::AverageTicket);
        assert_eq!(parse_sort(Some("last-sale")).unwrap(), CourseSortField::LastSale);
        assert!(parse_sort(Some("bogus")).is_err());
    }
}
