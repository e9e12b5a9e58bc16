use std::io::Read;
use std::path::Path;

use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Deserializer};

use super::super::pairing::domain::{
    CourseId, PairingId, Session, SessionId, SessionStatus, StudentId, TutorId,
};

#[derive(Debug)]
pub enum SessionImportError {
    Io(std::io::Error),
    Csv(csv::Error),
    Invalid { line: usize, message: String },
}

impl std::fmt::Display for SessionImportError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            SessionImportError::Io(err) => write!(f, "failed to read session export: {}", err),
            SessionImportError::Csv(err) => write!(f, "invalid session CSV data: {}", err),
            SessionImportError::Invalid { line, message } => {
                write!(f, "invalid session on line {}: {}", line, message)
            }
        }
    }
}

impl std::error::Error for SessionImportError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            SessionImportError::Io(err) => Some(err),
            SessionImportError::Csv(err) => Some(err),
            SessionImportError::Invalid { .. } => None,
        }
    }
}

impl From<std::io::Error> for SessionImportError {
    fn from(err: std::io::Error) -> Self {
        Self::Io(err)
    }
}

impl From<csv::Error> for SessionImportError {
    fn from(err: csv::Error) -> Self {
        Self::Csv(err)
    }
}

/// Reads session history exports (one row per session) for offline scoring.
pub struct SessionCsvImporter;

impl SessionCsvImporter {
    pub fn from_path<P: AsRef<Path>>(path: P) -> Result<Vec<Session>, SessionImportError> {
        let file = std::fs::File::open(path)?;
        Self::from_reader(file)
    }

    pub fn from_reader<R: Read>(reader: R) -> Result<Vec<Session>, SessionImportError> {
        let mut csv_reader = csv::ReaderBuilder::new()
            .trim(csv::Trim::All)
            .from_reader(reader);
        let mut sessions = Vec::new();

        for (index, record) in csv_reader.deserialize::<SessionRow>().enumerate() {
            let row = record?;
            // Header occupies line 1.
            let line = index + 2;
            let session = row
                .into_session()
                .map_err(|message| SessionImportError::Invalid { line, message })?;
            sessions.push(session);
        }

        Ok(sessions)
    }
}

#[derive(Debug, Deserialize)]
struct SessionRow {
    session_id: String,
    #[serde(default, deserialize_with = "empty_string_as_none")]
    pairing_id: Option<String>,
    tutor_id: String,
    student_id: String,
    course_id: String,
    status: String,
    scheduled_at: String,
    #[serde(default, deserialize_with = "empty_string_as_none")]
    attended: Option<String>,
    #[serde(default, deserialize_with = "empty_string_as_none")]
    rating: Option<String>,
    #[serde(default, deserialize_with = "empty_string_as_none")]
    assignment_score: Option<String>,
    #[serde(default, deserialize_with = "empty_string_as_none")]
    exam_score: Option<String>,
}

impl SessionRow {
    fn into_session(self) -> Result<Session, String> {
        let status = parse_status(&self.status)?;
        let scheduled_at = parse_datetime(&self.scheduled_at)
            .ok_or_else(|| format!("unrecognised scheduled_at '{}'", self.scheduled_at))?;
        let student_attended = self.attended.as_deref().map(parse_bool).transpose()?;
        let student_rating = self
            .rating
            .as_deref()
            .map(|value| {
                value
                    .parse::<u8>()
                    .ok()
                    .filter(|rating| (1..=5).contains(rating))
                    .ok_or_else(|| format!("rating must be 1-5 (found '{value}')"))
            })
            .transpose()?;
        let assignment_score = self
            .assignment_score
            .as_deref()
            .map(|value| parse_percentage("assignment_score", value))
            .transpose()?;
        let exam_score = self
            .exam_score
            .as_deref()
            .map(|value| parse_percentage("exam_score", value))
            .transpose()?;

        Ok(Session {
            pairing_id: PairingId(
                self.pairing_id
                    .unwrap_or_else(|| format!("import-{}", self.session_id)),
            ),
            id: SessionId(self.session_id),
            tutor_id: TutorId(self.tutor_id),
            student_id: StudentId(self.student_id),
            course_id: CourseId(self.course_id),
            status,
            scheduled_at,
            student_attended,
            student_rating,
            assignment_score,
            exam_score,
            version: 0,
        })
    }
}

fn empty_string_as_none<'de, D>(deserializer: D) -> Result<Option<String>, D::Error>
where
    D: Deserializer<'de>,
{
    let opt = Option::<String>::deserialize(deserializer)?;
    Ok(opt.filter(|value| !value.trim().is_empty()))
}

fn parse_status(value: &str) -> Result<SessionStatus, String> {
    match value.to_ascii_lowercase().as_str() {
        "scheduled" => Ok(SessionStatus::Scheduled),
        "completed" => Ok(SessionStatus::Completed),
        "cancelled" | "canceled" => Ok(SessionStatus::Cancelled),
        other => Err(format!("unknown session status '{other}'")),
    }
}

fn parse_bool(value: &str) -> Result<bool, String> {
    match value.to_ascii_lowercase().as_str() {
        "true" | "yes" | "y" | "1" => Ok(true),
        "false" | "no" | "n" | "0" => Ok(false),
        other => Err(format!("attended must be yes/no (found '{other}')")),
    }
}

fn parse_percentage(field: &str, value: &str) -> Result<f64, String> {
    value
        .trim_end_matches('%')
        .parse::<f64>()
        .ok()
        .filter(|score| score.is_finite() && (0.0..=100.0).contains(score))
        .ok_or_else(|| format!("{field} must be between 0 and 100 (found '{value}')"))
}

fn parse_datetime(value: &str) -> Option<DateTime<Utc>> {
    let trimmed = value.trim();
    if let Ok(dt) = DateTime::parse_from_rfc3339(trimmed) {
        return Some(dt.with_timezone(&Utc));
    }

    NaiveDate::parse_from_str(trimmed, "%Y-%m-%d")
        .ok()
        .and_then(|date| date.and_hms_opt(0, 0, 0))
        .map(|naive| DateTime::<Utc>::from_naive_utc_and_offset(naive, Utc))
}
