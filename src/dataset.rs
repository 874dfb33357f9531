use std::fs;
use std::io::ErrorKind;
use std::path::Path;

use serde::Deserialize;
use tracing::{debug, info};

use crate::domain::RosterError;

/// The roster that ships with the binary.
pub const DEFAULT_ROSTER: &str = include_str!("../data/roster.json");

/// One player-season row. Team and name identify the player, the rest is
/// optional because older seasons have gaps in the source data.
#[derive(Debug, Clone, Deserialize)]
pub struct Record {
    pub team: String,
    pub name: String,
    #[serde(default)]
    pub season: Option<String>,
    #[serde(default)]
    pub ability: Option<u32>,
    #[serde(default)]
    pub role: Option<String>,
    #[serde(default)]
    pub skill: Option<String>,
    #[serde(default)]
    pub signature1: Option<String>,
    #[serde(default)]
    pub signature2: Option<String>,
    #[serde(default)]
    pub signature3: Option<String>,
    #[serde(default)]
    pub proficient1: Option<String>,
    #[serde(default)]
    pub proficient2: Option<String>,
    #[serde(default)]
    pub proficient3: Option<String>,
    #[serde(default)]
    pub proficient4: Option<String>,
    #[serde(default)]
    pub tag1: Option<String>,
    #[serde(default)]
    pub tag2: Option<String>,
    #[serde(default)]
    pub tag3: Option<String>,
    #[serde(default)]
    pub tag4: Option<String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ColumnKey {
    Team,
    Name,
    Season,
    Ability,
    Role,
    Skill,
    Signature1,
    Signature2,
    Signature3,
    Proficient1,
    Proficient2,
    Proficient3,
    Proficient4,
    Tag1,
    Tag2,
    Tag3,
    Tag4,
}

impl ColumnKey {
    pub fn as_str(&self) -> &'static str {
        match self {
            ColumnKey::Team => "team",
            ColumnKey::Name => "name",
            ColumnKey::Season => "season",
            ColumnKey::Ability => "ability",
            ColumnKey::Role => "role",
            ColumnKey::Skill => "skill",
            ColumnKey::Signature1 => "signature1",
            ColumnKey::Signature2 => "signature2",
            ColumnKey::Signature3 => "signature3",
            ColumnKey::Proficient1 => "proficient1",
            ColumnKey::Proficient2 => "proficient2",
            ColumnKey::Proficient3 => "proficient3",
            ColumnKey::Proficient4 => "proficient4",
            ColumnKey::Tag1 => "tag1",
            ColumnKey::Tag2 => "tag2",
            ColumnKey::Tag3 => "tag3",
            ColumnKey::Tag4 => "tag4",
        }
    }
}

impl Record {
    /// Stringified field value, None when the source data has a gap.
    pub fn field(&self, key: ColumnKey) -> Option<String> {
        match key {
            ColumnKey::Team => Some(self.team.clone()),
            ColumnKey::Name => Some(self.name.clone()),
            ColumnKey::Season => self.season.clone(),
            ColumnKey::Ability => self.ability.map(|a| a.to_string()),
            ColumnKey::Role => self.role.clone(),
            ColumnKey::Skill => self.skill.clone(),
            ColumnKey::Signature1 => self.signature1.clone(),
            ColumnKey::Signature2 => self.signature2.clone(),
            ColumnKey::Signature3 => self.signature3.clone(),
            ColumnKey::Proficient1 => self.proficient1.clone(),
            ColumnKey::Proficient2 => self.proficient2.clone(),
            ColumnKey::Proficient3 => self.proficient3.clone(),
            ColumnKey::Proficient4 => self.proficient4.clone(),
            ColumnKey::Tag1 => self.tag1.clone(),
            ColumnKey::Tag2 => self.tag2.clone(),
            ColumnKey::Tag3 => self.tag3.clone(),
            ColumnKey::Tag4 => self.tag4.clone(),
        }
    }

    /// Stable row identity: team, name and season joined with "-".
    pub fn row_key(&self) -> String {
        format!(
            "{}-{}-{}",
            self.team,
            self.name,
            self.season.as_deref().unwrap_or("")
        )
    }
}

/// Parse a roster from JSON text.
pub fn parse_roster(json: &str) -> Result<Vec<Record>, RosterError> {
    let records: Vec<Record> = serde_json::from_str(json)?;
    debug!("Parsed {} roster records", records.len());
    Ok(records)
}

/// The embedded default roster.
pub fn load_default() -> Result<Vec<Record>, RosterError> {
    parse_roster(DEFAULT_ROSTER)
}

/// Load a roster from a user supplied path. "~" and env vars are expanded.
pub fn load_file(raw_path: &str) -> Result<Vec<Record>, RosterError> {
    let expanded = shellexpand::full(raw_path)
        .map_err(|e| RosterError::LoadingFailed(e.to_string()))?;
    let path = Path::new(expanded.as_ref());

    let json = fs::read_to_string(path).map_err(|e| match e.kind() {
        ErrorKind::NotFound => RosterError::FileNotFound,
        ErrorKind::PermissionDenied => RosterError::PermissionDenied,
        _ => RosterError::IoError(e),
    })?;

    let records = parse_roster(&json)?;
    info!("Loaded {} records from {}", records.len(), path.display());
    Ok(records)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn default_roster_loads() {
        let records = load_default().unwrap();
        assert!(!records.is_empty());
        // Ordering is whatever the file says, first row included.
        assert_eq!(records[0].team, "T1");
        assert_eq!(records[0].name, "Faker");
    }

    #[test]
    fn row_key_differs_by_season() {
        let records = load_default().unwrap();
        let summer = records
            .iter()
            .find(|r| r.name == "Faker" && r.season.as_deref() == Some("2022夏"))
            .unwrap();
        let spring = records
            .iter()
            .find(|r| r.name == "Faker" && r.season.as_deref() == Some("2022春"))
            .unwrap();
        assert_eq!(summer.row_key(), "T1-Faker-2022夏");
        assert_eq!(spring.row_key(), "T1-Faker-2022春");
        assert_ne!(summer.row_key(), spring.row_key());
    }

    #[test]
    fn missing_optional_fields_parse_as_none() {
        let json = r#"[{"team": "T1", "name": "Faker"}]"#;
        let records = parse_roster(json).unwrap();
        assert_eq!(records.len(), 1);
        let r = &records[0];
        assert!(r.season.is_none());
        assert!(r.ability.is_none());
        assert!(r.field(ColumnKey::Tag1).is_none());
        assert_eq!(r.field(ColumnKey::Team).as_deref(), Some("T1"));
        assert_eq!(r.row_key(), "T1-Faker-");
    }

    #[test]
    fn ability_stringified_for_matching() {
        let records = load_default().unwrap();
        let faker = &records[0];
        assert_eq!(faker.field(ColumnKey::Ability).as_deref(), Some("97"));
    }

    #[test]
    fn load_from_file() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        write!(
            file,
            r#"[{{"team": "DK", "name": "Khan", "season": "2021夏", "role": "上单"}}]"#
        )
        .unwrap();
        let records = load_file(file.path().to_str().unwrap()).unwrap();
        assert_eq!(records.len(), 1);
        assert_eq!(records[0].role.as_deref(), Some("上单"));
    }

    #[test]
    fn load_missing_file() {
        let err = load_file("/no/such/roster.json").unwrap_err();
        assert!(matches!(err, crate::domain::RosterError::FileNotFound));
    }
}
