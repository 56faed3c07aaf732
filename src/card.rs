use std::fmt;

use chrono::{DateTime, NaiveDate, NaiveDateTime};
use once_cell::sync::Lazy;
use regex::Regex;
use reqwest::Url;

use crate::models::{FlexibleId, JobListing};

static WHITESPACE: Lazy<Regex> = Lazy::new(|| Regex::new(r"\s+").unwrap());

const SUMMARY_CHARS: usize = 160;

/// Display projection of a listing: everything a job card shows, already
/// formatted.
#[derive(Debug, Clone, PartialEq)]
pub struct JobCard {
    pub id: FlexibleId,
    pub title: String,
    pub company: Option<String>,
    pub place: Option<String>,
    pub occupation: Option<String>,
    pub wages: Option<String>,
    pub vacancies: Option<i64>,
    pub deadline: Option<NaiveDate>,
    pub days_left: Option<i64>,
    pub photo_url: Option<String>,
    pub description_html: String,
    pub summary: String,
}

impl JobCard {
    pub fn from_listing(job: &JobListing, storage_base: &str, today: NaiveDate) -> Self {
        let deadline = job.deadline.as_deref().and_then(parse_date);
        let description_html = clean_html(job.description.as_deref().unwrap_or_default());

        Self {
            id: job.id.clone(),
            title: job.title.trim().to_string(),
            company: non_empty(job.company.as_deref()),
            place: place(job),
            occupation: non_empty(job.occupation.as_deref()),
            wages: job.wages.as_ref().map(|w| match non_empty(job.currency.as_deref()) {
                Some(currency) => format!("{} {}", w, currency),
                None => w.to_string(),
            }),
            vacancies: job.vacancies,
            deadline,
            days_left: deadline.map(|d| (d - today).num_days()),
            photo_url: non_empty(job.photo.as_deref()).map(|p| absolute_url(storage_base, &p)),
            summary: summarize(&description_html),
            description_html,
        }
    }

    pub fn is_expired(&self) -> bool {
        self.days_left.is_some_and(|d| d < 0)
    }
}

impl fmt::Display for JobCard {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{} {}", self.id, self.title)?;
        if let Some(company) = &self.company {
            write!(f, " @ {}", company)?;
        }
        writeln!(f)?;

        let mut facts = Vec::new();
        if let Some(place) = &self.place {
            facts.push(place.clone());
        }
        if let Some(occupation) = &self.occupation {
            facts.push(occupation.clone());
        }
        if let Some(wages) = &self.wages {
            facts.push(wages.clone());
        }
        if let Some(n) = self.vacancies {
            facts.push(format!("{} vacancies", n));
        }
        match (self.deadline, self.days_left) {
            (Some(d), Some(left)) if left >= 0 => facts.push(format!("apply by {} ({} days left)", d.format("%d %b %Y"), left)),
            (Some(d), _) => facts.push(format!("closed {}", d.format("%d %b %Y"))),
            _ => {}
        }
        write!(f, "    {}", facts.join(" | "))?;
        if !self.summary.is_empty() {
            write!(f, "\n    {}", self.summary)?;
        }
        Ok(())
    }
}

fn non_empty(s: Option<&str>) -> Option<String> {
    s.map(str::trim).filter(|s| !s.is_empty()).map(String::from)
}

fn place(job: &JobListing) -> Option<String> {
    match (non_empty(job.location.as_deref()), non_empty(job.country.as_deref())) {
        (Some(loc), Some(country)) if !loc.to_lowercase().contains(&country.to_lowercase()) => {
            Some(format!("{}, {}", loc, country))
        }
        (Some(loc), _) => Some(loc),
        (None, country) => country,
    }
}

/// Deadlines come as plain dates, SQL timestamps, RFC 3339 or day-first dates.
pub fn parse_date(s: &str) -> Option<NaiveDate> {
    let s = s.trim();
    if s.is_empty() {
        return None;
    }
    if let Ok(dt) = DateTime::parse_from_rfc3339(s) {
        return Some(dt.date_naive());
    }
    if let Ok(dt) = NaiveDateTime::parse_from_str(s, "%Y-%m-%d %H:%M:%S") {
        return Some(dt.date());
    }
    ["%Y-%m-%d", "%d-%m-%Y", "%d/%m/%Y"]
        .iter()
        .find_map(|fmt| NaiveDate::parse_from_str(s, fmt).ok())
}

/// Sanitises a job description. The editor stores markup escaped once more
/// than needed, so escaped tags are restored before cleaning.
pub fn clean_html(html: &str) -> String {
    let unescaped;
    let html = if html.contains("&lt;") {
        unescaped = html.replace("&lt;", "<").replace("&gt;", ">").replace("&amp;", "&");
        unescaped.as_str()
    } else {
        html
    };
    ammonia::clean(html)
}

fn summarize(html: &str) -> String {
    let text = ammonia::Builder::empty().clean(html).to_string();
    let text = text.replace("&amp;", "&").replace("&nbsp;", " ");
    let text = WHITESPACE.replace_all(text.trim(), " ");
    if text.chars().count() <= SUMMARY_CHARS {
        return text.into_owned();
    }
    let cut: String = text.chars().take(SUMMARY_CHARS).collect();
    format!("{}...", cut.trim_end())
}

pub fn absolute_url(base: &str, path: &str) -> String {
    if path.starts_with("http://") || path.starts_with("https://") {
        return path.to_string();
    }
    format!("{}/{}", base.trim_end_matches('/'), path.trim_start_matches('/'))
}

/// Uploaded files live next to the API, one level above `api/`.
pub fn storage_base(api_base: &Url) -> String {
    api_base
        .join("../")
        .map(|u| u.to_string())
        .unwrap_or_else(|_| api_base.to_string())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::FlexibleNumber;

    fn today() -> NaiveDate {
        NaiveDate::from_ymd_opt(2026, 3, 10).unwrap()
    }

    fn listing() -> JobListing {
        let mut job = JobListing::new(77, "  Heavy Driver ");
        job.company = Some("Al Futtaim".to_string());
        job.location = Some("Jebel Ali".to_string());
        job.country = Some("UAE".to_string());
        job.wages = Some(FlexibleNumber::Integer(1500));
        job.currency = Some("AED".to_string());
        job.deadline = Some("2026-03-22".to_string());
        job.photo = Some("uploads/jobs/77.jpg".to_string());
        job.description = Some("&lt;p&gt;Valid GCC licence&lt;/p&gt;&lt;script&gt;alert(1)&lt;/script&gt;".to_string());
        job
    }

    #[test]
    fn test_card_fields() {
        let card = JobCard::from_listing(&listing(), "https://backend.overseas.ai/", today());
        assert_eq!(card.title, "Heavy Driver");
        assert_eq!(card.place.as_deref(), Some("Jebel Ali, UAE"));
        assert_eq!(card.wages.as_deref(), Some("1500 AED"));
        assert_eq!(card.days_left, Some(12));
        assert!(!card.is_expired());
        assert_eq!(card.photo_url.as_deref(), Some("https://backend.overseas.ai/uploads/jobs/77.jpg"));
        assert_eq!(card.description_html, "<p>Valid GCC licence</p>");
        assert_eq!(card.summary, "Valid GCC licence");

        let text = card.to_string();
        assert!(text.starts_with("#77 Heavy Driver @ Al Futtaim"));
        assert!(text.contains("apply by 22 Mar 2026 (12 days left)"));
    }

    #[test]
    fn test_clean_html_leaves_plain_markup_alone() {
        assert_eq!(clean_html("Tom &amp; Jerry <b>wanted</b>"), "Tom &amp; Jerry <b>wanted</b>");
        assert_eq!(clean_html(""), "");
    }

    #[test]
    fn test_expired_and_sparse_listing() {
        let mut job = JobListing::new(1, "Helper");
        job.deadline = Some("01/03/2026".to_string());
        job.country = Some("Kuwait".to_string());
        let card = JobCard::from_listing(&job, "https://backend.overseas.ai/", today());
        assert!(card.is_expired());
        assert_eq!(card.place.as_deref(), Some("Kuwait"));
        assert_eq!(card.wages, None);
        assert!(card.to_string().contains("closed 01 Mar 2026"));
    }

    #[test]
    fn test_parse_date_formats() {
        let expected = NaiveDate::from_ymd_opt(2026, 4, 5);
        assert_eq!(parse_date("2026-04-05"), expected);
        assert_eq!(parse_date("2026-04-05 18:30:00"), expected);
        assert_eq!(parse_date("2026-04-05T18:30:00+04:00"), expected);
        assert_eq!(parse_date("05-04-2026"), expected);
        assert_eq!(parse_date("soon"), None);
    }

    #[test]
    fn test_storage_base_and_urls() {
        let api = Url::parse("https://backend.overseas.ai/api/").unwrap();
        assert_eq!(storage_base(&api), "https://backend.overseas.ai/");
        assert_eq!(absolute_url("https://x.io/", "/a.png"), "https://x.io/a.png");
        assert_eq!(absolute_url("https://x.io", "https://cdn.io/a.png"), "https://cdn.io/a.png");
    }

    #[test]
    fn test_long_summary_is_cut() {
        let mut job = JobListing::new(2, "Cook");
        job.description = Some(format!("<p>{}</p>", "word ".repeat(100)));
        let card = JobCard::from_listing(&job, "", today());
        assert!(card.summary.ends_with("..."));
        assert!(card.summary.chars().count() <= SUMMARY_CHARS + 3);
    }
}
