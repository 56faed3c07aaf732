use regex::{Regex, RegexBuilder};

use crate::models::JobListing;

/// Case-insensitive substring search over the jobs already loaded in memory.
/// Matches title, company, location and occupation. An empty key matches
/// everything.
pub struct LocalSearch {
    pattern: Option<Regex>,
    key_lower: String,
}

impl LocalSearch {
    pub fn new(key: &str) -> Self {
        let key = key.trim();
        let pattern = if key.is_empty() {
            None
        } else {
            RegexBuilder::new(&regex::escape(key))
                .case_insensitive(true)
                .build()
                .ok()
        };
        Self {
            pattern,
            key_lower: key.to_lowercase(),
        }
    }

    pub fn is_active(&self) -> bool {
        !self.key_lower.is_empty()
    }

    fn hit(&self, text: &str) -> bool {
        match &self.pattern {
            Some(re) => re.is_match(text),
            None => text.to_lowercase().contains(&self.key_lower),
        }
    }

    pub fn matches(&self, job: &JobListing) -> bool {
        if !self.is_active() {
            return true;
        }
        [
            Some(job.title.as_str()),
            job.company.as_deref(),
            job.location.as_deref(),
            job.occupation.as_deref(),
        ]
        .into_iter()
        .flatten()
        .any(|field| self.hit(field))
    }

    pub fn apply<'a>(&self, items: &'a [JobListing]) -> Vec<&'a JobListing> {
        items.iter().filter(|job| self.matches(job)).collect()
    }
}

pub fn search<'a>(items: &'a [JobListing], key: &str) -> Vec<&'a JobListing> {
    LocalSearch::new(key).apply(items)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn job(id: i64, title: &str, company: Option<&str>, location: Option<&str>, occupation: Option<&str>) -> JobListing {
        let mut j = JobListing::new(id, title);
        j.company = company.map(String::from);
        j.location = location.map(String::from);
        j.occupation = occupation.map(String::from);
        j
    }

    fn loaded() -> Vec<JobListing> {
        vec![
            job(1, "Heavy DRIVER", Some("Al Futtaim"), Some("Dubai"), Some("Transport")),
            job(2, "Mason", Some("Driver Logistics LLC"), Some("Doha"), Some("Construction")),
            job(3, "Electrician", Some("Bin Ladin"), Some("Riyadh"), Some("Electrical")),
            job(4, "Helper", None, Some("Kuwait City"), Some("Taxi driver support")),
            job(5, "Cook", Some("Emirates Flight Catering"), None, None),
        ]
    }

    #[test]
    fn test_driver_matches_any_display_field() {
        let items = loaded();
        let ids: Vec<_> = search(&items, "driver").iter().map(|j| j.id.to_string()).collect();
        assert_eq!(ids, vec!["1", "2", "4"]);
    }

    #[test]
    fn test_empty_key_restores_loaded_list() {
        let items = loaded();
        assert_eq!(search(&items, "driver").len(), 3);
        let restored = search(&items, "");
        assert_eq!(restored.len(), items.len());
        assert!(restored.iter().zip(items.iter()).all(|(a, b)| *a == b));
        assert_eq!(search(&items, "   ").len(), items.len());
    }

    #[test]
    fn test_key_is_literal_not_a_pattern() {
        let items = vec![job(1, "C++ developer (remote)", None, None, None), job(2, "Welder", None, None, None)];
        assert_eq!(search(&items, "c++").len(), 1);
        assert_eq!(search(&items, "(remote)").len(), 1);
        assert_eq!(search(&items, ".*").len(), 0);
    }

    #[test]
    fn test_no_match() {
        assert!(search(&loaded(), "astronaut").is_empty());
    }
}
