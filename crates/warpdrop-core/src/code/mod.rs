//! Warp code generation and validation.
//!
//! A warp code is the human-readable rendezvous token two peers
//! exchange out of band: two capitalized words joined by a hyphen,
//! e.g. `Cosmic-Falcon`. Codes are drawn uniformly from two fixed
//! 80-entry word lists using the operating system CSPRNG, giving
//! 6,400 combinations of visually distinct words.
//!
//! The routable channel identifier is a pure function of the code:
//! lowercase it and prepend the `wd-` namespace prefix, so
//! `Cosmic-Falcon` becomes `wd-cosmic-falcon`.
//!
//! ## Example
//!
//! ```rust,ignore
//! use warpdrop_core::code::WarpCode;
//!
//! let code = WarpCode::generate();
//! println!("share this code: {code}");
//!
//! // Receivers may type the code in any case.
//! let parsed = WarpCode::parse("cosmic-falcon")?;
//! assert_eq!(parsed.channel_id(), "wd-cosmic-falcon");
//! ```

use std::time::Duration;

use rand::Rng;

use crate::error::{Error, Result};
use crate::CHANNEL_ID_PREFIX;

/// Adjective word list (first half of a code).
pub const ADJECTIVES: [&str; 80] = [
    "Cosmic", "Stellar", "Quantum", "Nebula", "Pulsar", "Galaxy", "Meteor", "Comet", "Aurora",
    "Zenith", "Radiant", "Celestial", "Astral", "Lunar", "Solar", "Void", "Warp", "Flux", "Neon",
    "Cyber", "Hyper", "Ultra", "Mega", "Giga", "Tera", "Plasma", "Photon", "Proton", "Neutron",
    "Atom", "Crystal", "Diamond", "Emerald", "Sapphire", "Ruby", "Thunder", "Storm", "Blizzard",
    "Tempest", "Typhoon", "Amber", "Arctic", "Blazing", "Bold", "Brave", "Bright", "Crimson",
    "Daring", "Electric", "Ember", "Frozen", "Gleaming", "Golden", "Hidden", "Iron", "Ivory",
    "Jade", "Lucid", "Magnetic", "Midnight", "Mystic", "Noble", "Obsidian", "Onyx", "Phantom",
    "Polar", "Prime", "Quartz", "Rapid", "Scarlet", "Shadow", "Silent", "Silver", "Sonic",
    "Swift", "Titan", "Turbo", "Velvet", "Vivid", "Zephyr",
];

/// Noun word list (second half of a code).
pub const NOUNS: [&str; 80] = [
    "Falcon", "Phoenix", "Dragon", "Tiger", "Eagle", "Wolf", "Bear", "Shark", "Panther", "Hawk",
    "Runner", "Rider", "Glider", "Drifter", "Surfer", "Walker", "Climber", "Diver", "Flyer",
    "Pilot", "Engine", "Reactor", "Generator", "Turbine", "Motor", "Blade", "Arrow", "Spear",
    "Sword", "Shield", "Star", "Moon", "Sun", "Planet", "Orbit", "Wave", "Pulse", "Beam", "Ray",
    "Flash", "Anchor", "Badger", "Beacon", "Bison", "Canyon", "Cipher", "Compass", "Condor",
    "Cougar", "Coyote", "Crane", "Delta", "Dynamo", "Ember", "Gale", "Harbor", "Heron", "Jaguar",
    "Kestrel", "Lantern", "Lynx", "Mantis", "Osprey", "Otter", "Panda", "Prism", "Raven",
    "Rocket", "Sentinel", "Signal", "Spark", "Summit", "Talon", "Tracer", "Vector", "Viper",
    "Vortex", "Voyager", "Whale", "Zenith",
];

/// Validity window of a generated code.
pub const CODE_EXPIRY: Duration = Duration::from_secs(crate::DEFAULT_CODE_EXPIRATION_SECS);

/// A validated warp code.
///
/// Invariant: the stored string always matches
/// `^[A-Z][a-z]+-[A-Z][a-z]+$`.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct WarpCode {
    code: String,
}

impl WarpCode {
    /// Generate a new random warp code.
    ///
    /// Both words are chosen independently and uniformly using the
    /// operating system CSPRNG. Unlike the browser environments this
    /// protocol originated in, `OsRng` is always available, so there
    /// is no weaker fallback path.
    #[must_use]
    pub fn generate() -> Self {
        let mut rng = rand::rngs::OsRng;
        let adjective = ADJECTIVES[rng.gen_range(0..ADJECTIVES.len())];
        let noun = NOUNS[rng.gen_range(0..NOUNS.len())];

        Self {
            code: format!("{adjective}-{noun}"),
        }
    }

    /// Parse and validate a warp code from user input.
    ///
    /// Input is case-insensitive and surrounding whitespace is
    /// ignored: `"cosmic-falcon"` and `" Cosmic-Falcon "` both parse
    /// to the same code.
    ///
    /// # Errors
    ///
    /// Returns `Error::InvalidCodeFormat` if the input is not two
    /// hyphen-separated alphabetic words.
    pub fn parse(input: &str) -> Result<Self> {
        let trimmed = input.trim();

        // Already in display form, nothing to normalize.
        if Self::is_valid(trimmed) {
            return Ok(Self {
                code: trimmed.to_string(),
            });
        }

        let (adjective, noun) = trimmed
            .split_once('-')
            .ok_or_else(|| Error::InvalidCodeFormat(format!("expected Word-Word, got '{trimmed}'")))?;

        Ok(Self {
            code: format!("{}-{}", normalize_word(adjective)?, normalize_word(noun)?),
        })
    }

    /// Check whether a string is a well-formed warp code as displayed
    /// (`^[A-Z][a-z]+-[A-Z][a-z]+$`, no case folding).
    #[must_use]
    pub fn is_valid(input: &str) -> bool {
        let Some((adjective, noun)) = input.split_once('-') else {
            return false;
        };
        is_capitalized_word(adjective) && is_capitalized_word(noun)
    }

    /// Derive the routable channel identifier for this code.
    ///
    /// Pure and deterministic: `wd-` plus the lowercased code.
    #[must_use]
    pub fn channel_id(&self) -> String {
        format!("{CHANNEL_ID_PREFIX}-{}", self.code.to_lowercase())
    }

    /// Returns the code as a string slice.
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.code
    }
}

impl std::fmt::Display for WarpCode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.code)
    }
}

/// Lowercase a word and capitalize its first letter, rejecting
/// anything that is not purely ASCII-alphabetic with length >= 2.
fn normalize_word(word: &str) -> Result<String> {
    if word.len() < 2 || !word.chars().all(|c| c.is_ascii_alphabetic()) {
        return Err(Error::InvalidCodeFormat(format!(
            "'{word}' is not an alphabetic word"
        )));
    }

    let lower = word.to_ascii_lowercase();
    let mut chars = lower.chars();
    match chars.next() {
        Some(first) => Ok(first.to_ascii_uppercase().to_string() + chars.as_str()),
        None => Err(Error::InvalidCodeFormat(format!(
            "'{word}' is not an alphabetic word"
        ))),
    }
}

fn is_capitalized_word(word: &str) -> bool {
    let mut chars = word.chars();
    matches!(chars.next(), Some(first) if first.is_ascii_uppercase())
        && word.len() >= 2
        && chars.all(|c| c.is_ascii_lowercase())
}
