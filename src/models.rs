use log::warn;
use serde::de::{DeserializeOwned, Error as _};
use serde::{Deserialize, Deserializer, Serialize};
use serde_json::{Map, Value};

/// Server ids arrive as numbers from most endpoints and as strings from a few.
#[derive(Debug, Deserialize, Clone, Serialize, PartialEq, Eq, Hash, PartialOrd, Ord)]
#[serde(untagged)]
pub enum FlexibleId {
    Number(i64),
    String(String),
}

impl std::fmt::Display for FlexibleId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Number(n) => write!(f, "{}", n),
            Self::String(s) => write!(f, "{}", s),
        }
    }
}

impl From<i64> for FlexibleId {
    fn from(n: i64) -> Self {
        Self::Number(n)
    }
}

#[derive(Debug, Deserialize, Clone, Serialize, PartialEq)]
#[serde(untagged)]
pub enum FlexibleNumber {
    Integer(i64),
    Float(f64),
    String(String),
}

impl FlexibleNumber {
    pub fn as_i64(&self) -> Option<i64> {
        match self {
            Self::Integer(n) => Some(*n),
            Self::Float(f) if f.is_finite() => Some(f.round() as i64),
            Self::Float(_) => None,
            Self::String(s) => {
                let s = s.trim();
                s.parse::<i64>()
                    .ok()
                    .or_else(|| s.parse::<f64>().ok().filter(|f| f.is_finite()).map(|f| f.round() as i64))
            }
        }
    }
}

impl std::fmt::Display for FlexibleNumber {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Integer(n) => write!(f, "{}", n),
            Self::Float(x) if x.fract() == 0.0 => write!(f, "{}", *x as i64),
            Self::Float(x) => write!(f, "{:.2}", x),
            Self::String(s) => write!(f, "{}", s.trim()),
        }
    }
}

fn de_opt_i64<'de, D: Deserializer<'de>>(d: D) -> Result<Option<i64>, D::Error> {
    Ok(de_opt_number(d)?.and_then(|n| n.as_i64()))
}

/// Any value that is not a number or numeric string reads as absent.
fn de_opt_number<'de, D: Deserializer<'de>>(d: D) -> Result<Option<FlexibleNumber>, D::Error> {
    let raw = Value::deserialize(d)?;
    Ok(FlexibleNumber::deserialize(&raw).ok())
}

/// Display text is optional; relation objects or other non-strings read as absent.
fn de_opt_string<'de, D: Deserializer<'de>>(d: D) -> Result<Option<String>, D::Error> {
    Ok(match Value::deserialize(d)? {
        Value::String(s) if !s.trim().is_empty() => Some(s),
        _ => None,
    })
}

fn de_string<'de, D: Deserializer<'de>>(d: D) -> Result<String, D::Error> {
    Ok(de_opt_string(d)?.unwrap_or_default())
}

/// Text under the first of `keys` that carries any. Eager-loaded relations
/// (`{id, title}` / `{id, name}`) yield their label.
fn text_in(fields: &Map<String, Value>, keys: &[&str]) -> Option<String> {
    keys.iter().filter_map(|k| fields.get(*k)).find_map(|v| match v {
        Value::String(s) if !s.trim().is_empty() => Some(s.clone()),
        Value::Object(obj) => ["title", "name", "occupation"]
            .iter()
            .find_map(|k| obj.get(*k).and_then(Value::as_str))
            .filter(|s| !s.trim().is_empty())
            .map(String::from),
        _ => None,
    })
}

fn number_in(fields: &Map<String, Value>, keys: &[&str]) -> Option<FlexibleNumber> {
    keys.iter()
        .filter_map(|k| fields.get(*k))
        .find_map(|v| FlexibleNumber::deserialize(v).ok())
}

fn count_in(fields: &Map<String, Value>, keys: &[&str]) -> Option<u32> {
    number_in(fields, keys)
        .and_then(|n| n.as_i64())
        .and_then(|n| u32::try_from(n).ok())
}

/// A job as returned by the listing endpoints. The server owns the record;
/// fields this crate does not interpret are kept in `extra`.
#[derive(Debug, Serialize, Deserialize, Clone, PartialEq)]
pub struct JobListing {
    pub id: FlexibleId,
    #[serde(rename = "jobTitle", default, deserialize_with = "de_string")]
    pub title: String,
    #[serde(rename = "jobWages", default, deserialize_with = "de_opt_number")]
    pub wages: Option<FlexibleNumber>,
    #[serde(rename = "jobWagesCurrencyType", default, deserialize_with = "de_opt_string")]
    pub currency: Option<String>,
    #[serde(rename = "countryName", default, deserialize_with = "de_opt_string")]
    pub country: Option<String>,
    #[serde(rename = "jobOccupation", default, deserialize_with = "de_opt_string")]
    pub occupation: Option<String>,
    #[serde(rename = "companyName", default, deserialize_with = "de_opt_string")]
    pub company: Option<String>,
    #[serde(rename = "jobLocation", default, deserialize_with = "de_opt_string")]
    pub location: Option<String>,
    #[serde(rename = "jobDeadline", default, deserialize_with = "de_opt_string")]
    pub deadline: Option<String>,
    #[serde(rename = "jobPhoto", default, deserialize_with = "de_opt_string")]
    pub photo: Option<String>,
    #[serde(rename = "jobVacancyNo", default, deserialize_with = "de_opt_i64")]
    pub vacancies: Option<i64>,
    #[serde(rename = "jobExpTypeReq", default, deserialize_with = "de_opt_string")]
    pub experience_type: Option<String>,
    #[serde(rename = "passportType", default, deserialize_with = "de_opt_string")]
    pub passport_type: Option<String>,
    #[serde(rename = "jobAgeLimitMin", default, deserialize_with = "de_opt_i64")]
    pub age_min: Option<i64>,
    #[serde(rename = "jobAgeLimitMax", default, deserialize_with = "de_opt_i64")]
    pub age_max: Option<i64>,
    #[serde(rename = "jobDescription", default, deserialize_with = "de_opt_string")]
    pub description: Option<String>,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

impl JobListing {
    pub fn new(id: impl Into<FlexibleId>, title: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            title: title.into(),
            wages: None,
            currency: None,
            country: None,
            occupation: None,
            company: None,
            location: None,
            deadline: None,
            photo: None,
            vacancies: None,
            experience_type: None,
            passport_type: None,
            age_min: None,
            age_max: None,
            description: None,
            extra: Map::new(),
        }
    }

    /// Decodes one job row. Older endpoints spell fields in snake_case or
    /// without the `job` prefix; those land in `extra` and fill the gaps here.
    pub fn from_value(row: &Value) -> Result<Self, serde_json::Error> {
        let mut job = Self::deserialize(row)?;
        job.fill_from_extra();
        Ok(job)
    }

    fn fill_from_extra(&mut self) {
        let extra = &self.extra;
        if self.title.trim().is_empty() {
            self.title = text_in(extra, &["title", "job_title"]).unwrap_or_default();
        }
        fill(&mut self.currency, extra, &["job_wages_currency_type", "currency"]);
        fill(&mut self.country, extra, &["country_name", "country"]);
        fill(&mut self.occupation, extra, &["job_occupation", "occupation"]);
        fill(&mut self.company, extra, &["cmpName", "company_name", "company"]);
        fill(&mut self.location, extra, &["job_location", "location"]);
        fill(&mut self.deadline, extra, &["job_deadline"]);
        fill(&mut self.photo, extra, &["job_photo"]);
        fill(&mut self.experience_type, extra, &["job_exp_type_req"]);
        fill(&mut self.passport_type, extra, &["passport_type"]);
        fill(&mut self.description, extra, &["job_description"]);
        if self.wages.is_none() {
            self.wages = number_in(extra, &["job_wages"]);
        }
        if self.vacancies.is_none() {
            self.vacancies = number_in(extra, &["job_vacancy_no"]).and_then(|n| n.as_i64());
        }
        if self.age_min.is_none() {
            self.age_min = number_in(extra, &["job_age_limit_min"]).and_then(|n| n.as_i64());
        }
        if self.age_max.is_none() {
            self.age_max = number_in(extra, &["job_age_limit_max"]).and_then(|n| n.as_i64());
        }
    }
}

fn fill(field: &mut Option<String>, extra: &Map<String, Value>, keys: &[&str]) {
    if field.is_none() {
        *field = text_in(extra, keys);
    }
}

/// Decodes rows one at a time; a malformed row is logged and skipped so the
/// rest of the page still shows.
pub fn decode_jobs(rows: &[Value]) -> Vec<JobListing> {
    rows.iter()
        .enumerate()
        .filter_map(|(i, row)| match JobListing::from_value(row) {
            Ok(job) => Some(job),
            Err(e) => {
                warn!("Skipping job row {}: {}", i, e);
                None
            }
        })
        .collect()
}

/// One page of a listing endpoint.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ListingPage {
    pub jobs: Vec<JobListing>,
    pub total_jobs: Option<u32>,
    pub current_page: Option<u32>,
    pub last_page: Option<u32>,
}

impl ListingPage {
    pub fn empty() -> Self {
        Self::default()
    }

    /// Accepts every envelope the listing endpoints are known to produce:
    /// `{jobs: [...]}`, `{data: [...]}`, a paginator nested under `data`,
    /// or a bare array. `null` rows read as an empty page.
    pub fn from_value(data: &Value) -> Result<Self, serde_json::Error> {
        match data {
            Value::Null => Ok(Self::empty()),
            Value::Array(rows) => Ok(Self {
                jobs: decode_jobs(rows),
                ..Self::default()
            }),
            Value::Object(obj) => {
                let jobs = match obj.get("jobs").or_else(|| obj.get("data")) {
                    Some(inner @ Value::Object(_)) if !obj.contains_key("jobs") => {
                        return Self::from_value(inner);
                    }
                    Some(Value::Array(rows)) => decode_jobs(rows),
                    Some(Value::Null) | None => Vec::new(),
                    Some(other) => decode_jobs(&Vec::<Value>::deserialize(other)?),
                };
                Ok(Self {
                    jobs,
                    total_jobs: count_in(obj, &["totalJobs", "total_jobs", "total"]),
                    current_page: count_in(obj, &["currentPage", "current_page"]),
                    last_page: count_in(obj, &["lastPage", "last_page"]),
                })
            }
            other => Err(serde_json::Error::custom(format!(
                "expected a listing object or array, got {}",
                other
            ))),
        }
    }
}

#[derive(Debug, Serialize, Deserialize, Clone, PartialEq)]
pub struct Occupation {
    pub id: FlexibleId,
    #[serde(alias = "occupation", alias = "name")]
    pub title: String,
}

#[derive(Debug, Serialize, Deserialize, Clone, PartialEq)]
pub struct Country {
    pub id: FlexibleId,
    #[serde(alias = "countryName", alias = "country_name")]
    pub name: String,
}

#[derive(Debug, Serialize, Deserialize, Clone, PartialEq)]
pub struct Institute {
    pub id: FlexibleId,
    #[serde(alias = "instituteName", alias = "institute_name")]
    pub name: String,
    #[serde(alias = "instituteAddress", default)]
    pub address: Option<String>,
}

#[derive(Debug, Serialize, Deserialize, Clone, PartialEq)]
pub struct Company {
    pub id: FlexibleId,
    #[serde(alias = "cmpName", alias = "companyName")]
    pub name: String,
    #[serde(alias = "cmpLogo", default)]
    pub logo: Option<String>,
}

/// Reference data shown on the home page and used to label filter badges.
#[derive(Debug, Serialize, Deserialize, Clone, Default, PartialEq)]
pub struct ReferenceData {
    pub occupations: Vec<Occupation>,
    pub countries: Vec<Country>,
}

/// Reply of the per-user action endpoints.
#[derive(Debug, Deserialize, Clone, Default, PartialEq)]
pub struct ActionAck {
    #[serde(alias = "msg", default)]
    pub message: Option<String>,
}

/// List endpoints wrap their rows in `data` or return them bare.
pub fn decode_list<T: DeserializeOwned>(data: &Value) -> Result<Vec<T>, serde_json::Error> {
    match data {
        Value::Null => Ok(Vec::new()),
        Value::Object(obj) => match obj.get("data") {
            Some(inner) => decode_list(inner),
            None => serde_json::from_value(data.clone()),
        },
        _ => serde_json::from_value(data.clone()),
    }
}
