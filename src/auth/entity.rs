//! Authenticated principals and their identity tags.

use crate::error::ApiError;
use crate::types::MachineJob;
use std::fmt;

const MACHINE_PREFIX: &str = "machine-";
const UNIT_PREFIX: &str = "unit-";
const USER_PREFIX: &str = "user-";

/// An already-authenticated principal.
///
/// Machines and units are agents; users are interactive clients.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Entity {
    Machine { id: String, jobs: Vec<MachineJob> },
    Unit { name: String },
    User { name: String },
}

impl Entity {
    pub fn machine(id: impl Into<String>, jobs: Vec<MachineJob>) -> Self {
        Entity::Machine {
            id: id.into(),
            jobs,
        }
    }

    pub fn unit(name: impl Into<String>) -> Self {
        Entity::Unit { name: name.into() }
    }

    pub fn user(name: impl Into<String>) -> Self {
        Entity::User { name: name.into() }
    }

    /// Identity tag used for ownership comparisons.
    pub fn tag(&self) -> String {
        self.as_tag().to_string()
    }

    pub fn as_tag(&self) -> Tag {
        match self {
            Entity::Machine { id, .. } => Tag::Machine(id.clone()),
            Entity::Unit { name } => Tag::Unit(name.clone()),
            Entity::User { name } => Tag::User(name.clone()),
        }
    }

    /// Machine and unit agents are agents; everything else is a client.
    pub fn is_agent(&self) -> bool {
        matches!(self, Entity::Machine { .. } | Entity::Unit { .. })
    }

    pub fn has_job(&self, job: MachineJob) -> bool {
        match self {
            Entity::Machine { jobs, .. } => jobs.contains(&job),
            _ => false,
        }
    }
}

/// Parsed identity tag.
///
/// Machine ids may contain `/` (containers, `0/lxc/1`); in tag form those become
/// `-`. Unit names are `<service>/<n>`, tagged as `unit-<service>-<n>`.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum Tag {
    Machine(String),
    Unit(String),
    User(String),
}

impl Tag {
    pub fn parse(tag: &str) -> Result<Tag, ApiError> {
        let invalid = || ApiError::InvalidArgument(format!("{:?} is not a valid tag", tag));
        if let Some(rest) = tag.strip_prefix(MACHINE_PREFIX) {
            if rest.is_empty() || rest.split('-').any(str::is_empty) {
                return Err(invalid());
            }
            return Ok(Tag::Machine(rest.replace('-', "/")));
        }
        if let Some(rest) = tag.strip_prefix(UNIT_PREFIX) {
            let (service, number) = rest.rsplit_once('-').ok_or_else(invalid)?;
            if service.is_empty() || number.is_empty() || !number.bytes().all(|b| b.is_ascii_digit())
            {
                return Err(invalid());
            }
            return Ok(Tag::Unit(format!("{}/{}", service, number)));
        }
        if let Some(rest) = tag.strip_prefix(USER_PREFIX) {
            if rest.is_empty() {
                return Err(invalid());
            }
            return Ok(Tag::User(rest.to_string()));
        }
        Err(invalid())
    }

    /// Tag string for a machine id.
    pub fn for_machine(id: &str) -> String {
        Tag::Machine(id.to_string()).to_string()
    }

    /// Tag string for a unit name.
    pub fn for_unit(name: &str) -> String {
        Tag::Unit(name.to_string()).to_string()
    }

    /// Machine id, if this is a machine tag.
    pub fn machine_id(&self) -> Option<&str> {
        match self {
            Tag::Machine(id) => Some(id),
            _ => None,
        }
    }

    /// Unit name, if this is a unit tag.
    pub fn unit_name(&self) -> Option<&str> {
        match self {
            Tag::Unit(name) => Some(name),
            _ => None,
        }
    }
}

impl fmt::Display for Tag {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Tag::Machine(id) => write!(f, "{}{}", MACHINE_PREFIX, id.replace('/', "-")),
            Tag::Unit(name) => write!(f, "{}{}", UNIT_PREFIX, name.replace('/', "-")),
            Tag::User(name) => write!(f, "{}{}", USER_PREFIX, name),
        }
    }
}
