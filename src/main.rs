use anyhow::{anyhow, bail, Context, Result};
use chrono::Utc;
use indicatif::{ProgressBar, ProgressStyle};
use log::{info, warn};

use overseas_jobs::cache::{ReferenceCache, SqliteStore};
use overseas_jobs::card::{storage_base, JobCard};
use overseas_jobs::config::Config;
use overseas_jobs::home::HomePage;
use overseas_jobs::{
    ApiClient, ContractPeriod, ExperienceType, FeedState, FeedStatus, FilterPayload, FilterValue, FlexibleId,
    JobListing, ListingEndpoint, PassportType, SortBy, SourceChain,
};

fn arg_values<'a>(args: &'a [String], flag: &str) -> Vec<&'a str> {
    let prefix = format!("--{}=", flag);
    args.iter().filter_map(|a| a.strip_prefix(prefix.as_str())).collect()
}

fn arg_value<'a>(args: &'a [String], flag: &str) -> Option<&'a str> {
    arg_values(args, flag).into_iter().last()
}

fn parse_id(raw: &str, flag: &str) -> Result<i64> {
    raw.trim()
        .parse()
        .with_context(|| format!("--{} expects a numeric id, got '{}'", flag, raw))
}

fn filter_from_args(args: &[String]) -> Result<FilterPayload> {
    let mut values = Vec::new();
    for raw in arg_values(args, "occupation") {
        values.push(FilterValue::Occupation(parse_id(raw, "occupation")?));
    }
    for raw in arg_values(args, "country") {
        values.push(FilterValue::Country(parse_id(raw, "country")?));
    }
    for raw in arg_values(args, "language") {
        values.push(FilterValue::Language(raw.trim().to_string()));
    }
    if let Some(raw) = arg_value(args, "passport") {
        let p = PassportType::parse(raw).ok_or_else(|| anyhow!("Unknown passport type '{}'", raw))?;
        values.push(FilterValue::Passport(p));
    }
    if let Some(raw) = arg_value(args, "contract") {
        let c = ContractPeriod::parse(raw).ok_or_else(|| anyhow!("Unknown contract period '{}'", raw))?;
        values.push(FilterValue::Contract(c));
    }
    if let Some(raw) = arg_value(args, "experience") {
        let e = ExperienceType::parse(raw).ok_or_else(|| anyhow!("Unknown experience type '{}'", raw))?;
        values.push(FilterValue::Experience(e));
    }
    if let Some(raw) = arg_value(args, "sort") {
        let s = SortBy::parse(raw).ok_or_else(|| anyhow!("Unknown sort key '{}'", raw))?;
        values.push(FilterValue::Sort(s));
    }

    // repeated flags must not toggle a value back off
    Ok(values.into_iter().fold(FilterPayload::default(), |filter, value| {
        if filter.contains(&value) { filter } else { filter.apply(value) }
    }))
}

fn sources_from_args(args: &[String], client: &ApiClient) -> Result<SourceChain> {
    let Some(scope) = arg_value(args, "scope") else {
        return Ok(SourceChain::standard(client));
    };
    let endpoint = match scope.split_once(':') {
        Some(("occupation", id)) => ListingEndpoint::ByOccupation(parse_id(id, "scope")?),
        Some(("country", id)) => ListingEndpoint::ByCountry(parse_id(id, "scope")?),
        None if scope == "last-week" => ListingEndpoint::LastWeek,
        _ => bail!("Unknown scope '{}', use occupation:ID, country:ID or last-week", scope),
    };
    Ok(SourceChain::scoped(client, endpoint))
}

fn print_cards<'a>(jobs: impl IntoIterator<Item = &'a JobListing>, client: &ApiClient) {
    let base = storage_base(client.base_url());
    let today = Utc::now().date_naive();
    for job in jobs {
        println!("{}\n", JobCard::from_listing(job, &base, today));
    }
}

async fn show_home(client: &ApiClient, config: &Config) -> Result<()> {
    let cache = ReferenceCache::new(SqliteStore::open(&config.cache_db)?);
    let home = HomePage::load(client, &cache, Utc::now()).await;

    if let Ok(jobs) = &home.latest_jobs {
        println!("Posted this week: {} jobs", jobs.len());
    }
    if let Ok(reference) = &home.reference {
        println!("{} occupations, {} countries", reference.occupations.len(), reference.countries.len());
    }
    if let Ok(institutes) = &home.institutes {
        println!("{} training institutes", institutes.len());
    }
    if let Ok(companies) = &home.companies {
        println!("{} hiring companies", companies.len());
    }
    for (widget, err) in home.failures() {
        println!("[unavailable] {}: {}", widget, err);
    }
    Ok(())
}

async fn run_user_actions(args: &[String], client: &ApiClient) -> Result<bool> {
    let mut acted = false;
    for raw in arg_values(args, "apply") {
        let ack = client.apply_job(&FlexibleId::Number(parse_id(raw, "apply")?)).await?;
        println!("Applied to job {}: {}", raw, ack.message.unwrap_or_else(|| "ok".to_string()));
        acted = true;
    }
    for raw in arg_values(args, "save") {
        let ack = client.save_job(&FlexibleId::Number(parse_id(raw, "save")?)).await?;
        println!("Saved job {}: {}", raw, ack.message.unwrap_or_else(|| "ok".to_string()));
        acted = true;
    }
    if args.iter().any(|a| a == "--saved") {
        let jobs = client.saved_jobs().await?;
        println!("Saved jobs: {}", jobs.len());
        print_cards(&jobs, client);
        acted = true;
    }
    if args.iter().any(|a| a == "--applied") {
        let jobs = client.applied_jobs().await?;
        println!("Applied jobs: {}", jobs.len());
        print_cards(&jobs, client);
        acted = true;
    }
    Ok(acted)
}

#[tokio::main]
async fn main() -> Result<()> {
    dotenvy::dotenv().ok();
    let args: Vec<String> = std::env::args().collect();
    let is_verbose = args.iter().any(|a| a == "--log");
    let default_level = if is_verbose { "info" } else { "error" };

    env_logger::init_from_env(env_logger::Env::default().default_filter_or(default_level));

    let config = Config::load();
    let client = ApiClient::new(&config.api_base, config.api_token.clone(), config.request_timeout)
        .context("Failed to build API client")?;
    info!("Using backend {}", client.base_url());

    if args.iter().any(|a| a == "--home") {
        return show_home(&client, &config).await;
    }
    if run_user_actions(&args, &client).await? {
        return Ok(());
    }

    let filter = filter_from_args(&args)?;
    let sources = sources_from_args(&args, &client)?;
    let max_pages = match arg_value(&args, "pages") {
        Some(raw) => raw.parse::<u32>().with_context(|| format!("--pages expects a number, got '{}'", raw))?,
        None => config.max_pages as u32,
    }
    .max(1);

    let mut feed = FeedState::new();
    let first = match feed.set_filter(filter) {
        Some(ticket) => ticket,
        None => feed.refresh(),
    };

    let pb = ProgressBar::new(max_pages as u64);
    pb.set_style(ProgressStyle::default_bar()
        .template("{spinner:.green} [{elapsed_precise}] [{bar:40.cyan/blue}] {pos}/{len} pages {msg}")
        .context("Invalid progress bar template")?
        .progress_chars("#> -"));

    feed.run(&sources, first).await;
    pb.inc(1);
    while feed.page().current_page < max_pages {
        let Some(ticket) = feed.sentinel_visible() else { break };
        feed.run(&sources, ticket).await;
        pb.inc(1);
        pb.set_message(format!("{} jobs", feed.page().items.len()));
    }
    pb.finish_with_message(format!("{} jobs loaded", feed.page().items.len()));

    match feed.status() {
        FeedStatus::Failed { message, during_append: false } => {
            bail!("Could not load jobs: {}", message);
        }
        FeedStatus::Failed { message, during_append: true } => {
            warn!("Stopped loading more jobs: {}", message);
        }
        FeedStatus::Empty => {
            println!("No jobs found for this filter.");
            return Ok(());
        }
        _ => {}
    }

    let search_key = arg_value(&args, "search").unwrap_or_default();
    feed.set_search_key(search_key);
    let visible = feed.visible_items();
    println!(
        "Showing {} of {} loaded jobs (page {}/{})\n",
        visible.len(),
        feed.page().items.len(),
        feed.page().current_page,
        feed.page().total_pages
    );
    print_cards(visible, &client);

    if feed.page().has_more {
        println!("More jobs available, raise --pages to load them.");
    }
    Ok(())
}
