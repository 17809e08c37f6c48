use serde::{Deserialize, Serialize};

/// VAST major versions this driver understands
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum VastVersion {
    V2,
    V3,
}

impl VastVersion {
    /// Parse the major component of a version string such as "3.0"
    pub fn parse(version: &str) -> Option<Self> {
        let major = version.trim().split('.').next()?;
        match major.parse::<u32>().ok()? {
            2 => Some(VastVersion::V2),
            3 => Some(VastVersion::V3),
            _ => None,
        }
    }

    pub fn capabilities(self) -> Capabilities {
        match self {
            VastVersion::V2 => Capabilities::NONE,
            VastVersion::V3 => Capabilities {
                skippable: true,
                podded: true,
                fallback: true,
            },
        }
    }
}

/// Features gated on the VAST major version
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct Capabilities {
    pub skippable: bool,
    pub podded: bool,
    pub fallback: bool,
}

impl Capabilities {
    pub const NONE: Capabilities = Capabilities {
        skippable: false,
        podded: false,
        fallback: false,
    };

    /// Capabilities for a version string. Unknown versions get nothing;
    /// use [`VastVersion::parse`] to reject them outright.
    pub fn for_version(version: &str) -> Self {
        VastVersion::parse(version)
            .map(VastVersion::capabilities)
            .unwrap_or(Capabilities::NONE)
    }
}
