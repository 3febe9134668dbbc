use crate::contract::{CandidateRegistration, VoterRegistration};
use crate::models::{CandidateProfile, SocialLinks, SupplementaryRecord};
use chrono::{DateTime, Utc};
use lazy_static::lazy_static;
use regex::Regex;
use serde::{Deserialize, Serialize};
use serde_json::{Value, json};
use std::collections::BTreeSet;
use thiserror::Error;

lazy_static! {
    static ref ADDRESS_RE: Regex = Regex::new(r"^0x[0-9a-fA-F]{40}$").unwrap();
}

pub const MIN_CANDIDATE_AGE: u32 = 18;
pub const MAX_CANDIDATE_AGE: u32 = 120;

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum ValidationError {
    #[error("Please fill in all required fields in the {0} section.")]
    Incomplete(Section),
    #[error("Please enter a valid age")]
    InvalidAge,
    #[error("Candidate must be at least 18 years old")]
    Underage,
    #[error("{0} is not a valid wallet address")]
    InvalidAddress(String),
    #[error("Input Data is missing")]
    MissingInput,
    #[error("Please complete previous sections first.")]
    SectionLocked(Section),
    #[error("Please complete all required sections before registering.")]
    NotReady,
}

pub fn is_valid_address(address: &str) -> bool {
    ADDRESS_RE.is_match(address.trim())
}

pub fn parse_age(raw: &str) -> Result<u32, ValidationError> {
    let age: i64 = raw.trim().parse().map_err(|_| ValidationError::InvalidAge)?;
    if age < MIN_CANDIDATE_AGE as i64 {
        return Err(ValidationError::Underage);
    }
    if age > MAX_CANDIDATE_AGE as i64 {
        return Err(ValidationError::InvalidAge);
    }
    Ok(age as u32)
}

fn filled(value: &str) -> bool {
    !value.trim().is_empty()
}

fn optional(value: &str) -> Option<String> {
    let value = value.trim();
    if value.is_empty() { None } else { Some(value.to_string()) }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Section {
    Basic,
    Political,
    Professional,
    Additional,
    Social,
}

impl Section {
    pub const ALL: [Section; 5] = [
        Section::Basic,
        Section::Political,
        Section::Professional,
        Section::Additional,
        Section::Social,
    ];

    /// Sections that must be saved before a candidate can be submitted.
    pub const REQUIRED: [Section; 3] = [Section::Basic, Section::Political, Section::Professional];

    pub fn next(self) -> Option<Section> {
        let i = Section::ALL.iter().position(|s| *s == self)?;
        Section::ALL.get(i + 1).copied()
    }

    pub fn previous(self) -> Option<Section> {
        let i = Section::ALL.iter().position(|s| *s == self)?;
        i.checked_sub(1).map(|p| Section::ALL[p])
    }

    // Sections that must be complete before this one can be opened.
    fn prerequisites(self) -> &'static [Section] {
        match self {
            Section::Basic => &[],
            Section::Political => &[Section::Basic],
            Section::Professional => &[Section::Basic, Section::Political],
            Section::Additional | Section::Social => &Section::REQUIRED,
        }
    }
}

impl std::fmt::Display for Section {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let name = match self {
            Section::Basic => "basic",
            Section::Political => "political",
            Section::Professional => "professional",
            Section::Additional => "additional",
            Section::Social => "social",
        };
        f.write_str(name)
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct CandidateForm {
    pub name: String,
    pub address: String,
    pub age: String,
    pub email: String,
    pub phone: String,
    pub political_party: String,
    pub constituency: String,
    pub education: String,
    pub profession: String,
    pub experience: String,
    pub manifesto: String,
    pub slogan: String,
    pub previous_offices: String,
    pub achievements: String,
    pub social: SocialLinks,
}

impl CandidateForm {
    pub fn validate_section(&self, section: Section) -> Result<(), ValidationError> {
        let complete = match section {
            Section::Basic => {
                if !(filled(&self.name) && filled(&self.address) && filled(&self.age) && filled(&self.email) && filled(&self.phone)) {
                    return Err(ValidationError::Incomplete(section));
                }
                parse_age(&self.age)?;
                if !is_valid_address(&self.address) {
                    return Err(ValidationError::InvalidAddress(self.address.clone()));
                }
                true
            }
            Section::Political => filled(&self.political_party) && filled(&self.constituency),
            Section::Professional => filled(&self.education) && filled(&self.profession),
            Section::Additional => filled(&self.manifesto),
            Section::Social => true,
        };
        if complete { Ok(()) } else { Err(ValidationError::Incomplete(section)) }
    }

    /// The fields the contract itself stores: name, address and age.
    pub fn validate_core(&self) -> Result<u32, ValidationError> {
        if !(filled(&self.name) && filled(&self.address) && filled(&self.age)) {
            return Err(ValidationError::MissingInput);
        }
        if !is_valid_address(&self.address) {
            return Err(ValidationError::InvalidAddress(self.address.clone()));
        }
        parse_age(&self.age)
    }

    pub fn registration(&self, image_url: &str, metadata_url: &str) -> Result<CandidateRegistration, ValidationError> {
        let age = self.validate_core()?;
        Ok(CandidateRegistration {
            address: self.address.trim().to_string(),
            age,
            name: self.name.trim().to_string(),
            image_url: image_url.to_string(),
            metadata_url: metadata_url.to_string(),
        })
    }

    /// JSON pinned alongside the on-chain record.
    pub fn metadata(&self, image_url: &str) -> Value {
        json!({
            "name": self.name.trim(),
            "address": self.address.trim(),
            "image": image_url,
            "age": self.age.trim(),
        })
    }

    pub fn profile(&self) -> CandidateProfile {
        CandidateProfile {
            political_party: optional(&self.political_party),
            constituency: optional(&self.constituency),
            education: optional(&self.education),
            profession: optional(&self.profession),
            experience: optional(&self.experience),
            manifesto: optional(&self.manifesto),
            slogan: optional(&self.slogan),
            email: optional(&self.email),
            phone: optional(&self.phone),
            previous_offices: optional(&self.previous_offices),
            achievements: optional(&self.achievements),
            social: self.social.clone(),
        }
    }

    pub fn supplementary(&self, image_url: &str, now: DateTime<Utc>) -> SupplementaryRecord {
        let mut record = SupplementaryRecord::new(now);
        record.name = optional(&self.name);
        record.address = optional(&self.address);
        record.age = parse_age(&self.age).ok();
        record.image = optional(image_url);
        record.profile = self.profile();
        record
    }
}

/// Tracks which sections of a candidate form have been saved.
#[derive(Debug, Clone)]
pub struct RegistrationWizard {
    pub form: CandidateForm,
    current: Section,
    completed: BTreeSet<Section>,
    image_url: Option<String>,
}

impl RegistrationWizard {
    pub fn new() -> Self {
        Self {
            form: CandidateForm::default(),
            current: Section::Basic,
            completed: BTreeSet::new(),
            image_url: None,
        }
    }

    pub fn current(&self) -> Section {
        self.current
    }

    pub fn is_completed(&self, section: Section) -> bool {
        self.completed.contains(&section)
    }

    pub fn can_open(&self, section: Section) -> bool {
        section.prerequisites().iter().all(|s| self.completed.contains(s))
    }

    pub fn go_to(&mut self, section: Section) -> Result<(), ValidationError> {
        if !self.can_open(section) {
            return Err(ValidationError::SectionLocked(section));
        }
        self.current = section;
        Ok(())
    }

    /// Validates and saves the current section.
    pub fn save_section(&mut self) -> Result<(), ValidationError> {
        self.form.validate_section(self.current)?;
        self.completed.insert(self.current);
        Ok(())
    }

    /// Saves the current section and moves to the next one, if any.
    pub fn advance(&mut self) -> Result<Section, ValidationError> {
        self.save_section()?;
        if let Some(next) = self.current.next() {
            self.current = next;
        }
        Ok(self.current)
    }

    pub fn back(&mut self) -> Section {
        if let Some(previous) = self.current.previous() {
            self.current = previous;
        }
        self.current
    }

    pub fn set_image(&mut self, image_url: impl Into<String>) {
        self.image_url = Some(image_url.into());
    }

    pub fn image_url(&self) -> Option<&str> {
        self.image_url.as_deref()
    }

    pub fn is_ready(&self) -> bool {
        Section::REQUIRED.iter().all(|s| self.completed.contains(s)) && self.image_url.is_some()
    }

    /// The form, once every required section is saved and an image is attached.
    pub fn finish(&self) -> Result<&CandidateForm, ValidationError> {
        if !self.is_ready() {
            return Err(ValidationError::NotReady);
        }
        Ok(&self.form)
    }
}

impl Default for RegistrationWizard {
    fn default() -> Self {
        Self::new()
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct VoterForm {
    pub name: String,
    pub address: String,
    pub position: String,
}

impl VoterForm {
    pub fn validate(&self) -> Result<(), ValidationError> {
        if !(filled(&self.name) && filled(&self.address) && filled(&self.position)) {
            return Err(ValidationError::MissingInput);
        }
        if !is_valid_address(&self.address) {
            return Err(ValidationError::InvalidAddress(self.address.clone()));
        }
        Ok(())
    }

    pub fn metadata(&self, image_url: &str) -> Value {
        json!({
            "name": self.name.trim(),
            "address": self.address.trim(),
            "position": self.position.trim(),
            "image": image_url,
        })
    }

    pub fn registration(&self, image_url: &str, metadata_url: &str) -> Result<VoterRegistration, ValidationError> {
        self.validate()?;
        Ok(VoterRegistration {
            address: self.address.trim().to_string(),
            name: self.name.trim().to_string(),
            metadata_url: metadata_url.to_string(),
            image_url: image_url.to_string(),
        })
    }
}
