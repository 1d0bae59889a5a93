//! Role taxonomy and label normalization.
//!
//! Every role comparison in the crate goes through [`normalize`]: labels coming from
//! tokens, route declarations or operators are lower-cased, trimmed, separator-folded
//! and passed through one alias table. Unknown labels survive normalization unchanged
//! (apart from the cleanup), so they simply never match an allow-list.

use once_cell::sync::Lazy;
use regex::Regex;
use serde::{Deserialize, Serialize};
use std::fmt::{Display, Formatter};

static WHITESPACE_RUN: Lazy<Regex> = Lazy::new(|| Regex::new(r"\s+").expect("static regex"));

/// Historical and informal spellings, keyed by their cleaned form.
/// Values are always canonical identifiers and never appear as keys.
const ROLE_ALIASES: &[(&str, &str)] = &[
    ("superadmin", "super_admin"),
    ("super", "super_admin"),
    ("admin", "clinician_admin"),
    ("clinician", "clinician_admin"),
    ("clinic_admin", "clinician_admin"),
    ("clinicianadmin", "clinician_admin"),
    ("dr", "doctor"),
    ("physician", "doctor"),
    ("registered_nurse", "nurse"),
    ("rn", "nurse"),
    ("front_desk", "receptionist"),
    ("reception", "receptionist"),
    ("lab_tech", "lab_technician"),
    ("labtech", "lab_technician"),
    ("lab_technologist", "lab_technician"),
    ("pharmacy", "pharmacist"),
    ("chemist", "pharmacist"),
];

/// Normalize an arbitrary role label to its canonical identifier.
/// `None` yields an empty string; unrecognized labels come back cleaned but unmapped.
pub fn normalize(role: Option<&str>) -> String {
    let Some(raw) = role else { return String::new(); };
    let lowered = raw.to_lowercase();
    let cleaned = WHITESPACE_RUN
        .replace_all(lowered.trim(), "_")
        .replace('-', "_");
    match ROLE_ALIASES.iter().find(|(alias, _)| *alias == cleaned) {
        Some((_, canonical)) => (*canonical).to_string(),
        None => cleaned,
    }
}

/// Path a role lands on when it is sent away from a screen it may not view.
pub const DEFAULT_HOME: &str = "/";

/// Landing path for a canonical role string, or [`DEFAULT_HOME`] when the role
/// has no dashboard of its own.
pub fn home_path_for(role: &str) -> &'static str {
    Role::parse(role).map(Role::home_path).unwrap_or(DEFAULT_HOME)
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Role {
    SuperAdmin,
    ClinicianAdmin,
    Doctor,
    Nurse,
    Receptionist,
    LabTechnician,
    Pharmacist,
    Patient,
}

impl Role {
    pub const ALL: [Role; 8] = [
        Role::SuperAdmin,
        Role::ClinicianAdmin,
        Role::Doctor,
        Role::Nurse,
        Role::Receptionist,
        Role::LabTechnician,
        Role::Pharmacist,
        Role::Patient,
    ];

    pub fn as_str(self) -> &'static str {
        match self {
            Role::SuperAdmin => "super_admin",
            Role::ClinicianAdmin => "clinician_admin",
            Role::Doctor => "doctor",
            Role::Nurse => "nurse",
            Role::Receptionist => "receptionist",
            Role::LabTechnician => "lab_technician",
            Role::Pharmacist => "pharmacist",
            Role::Patient => "patient",
        }
    }

    /// Resolve any accepted spelling (canonical, alias, mixed case) to a role.
    pub fn parse(label: &str) -> Option<Role> {
        let canonical = normalize(Some(label));
        Role::ALL.into_iter().find(|r| r.as_str() == canonical)
    }

    pub fn home_path(self) -> &'static str {
        match self {
            Role::SuperAdmin => "/super-admin",
            Role::ClinicianAdmin => "/clinician",
            Role::Doctor => "/doctor",
            Role::Nurse => "/nurse",
            Role::Receptionist => "/receptionist",
            Role::LabTechnician => "/lab-technician",
            Role::Pharmacist => "/pharmacist",
            Role::Patient => "/patient",
        }
    }
}

impl Display for Role {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}
