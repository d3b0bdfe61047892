//! Persona and scenario registry records
//!
//! The evolution core reads these by id and never mutates them directly;
//! prompt changes happen only through version activation.

use crate::ids::{PersonaId, ScenarioId};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// A named conversational agent defined by a prompt
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Persona {
    /// Unique identifier
    pub id: PersonaId,
    /// Display name
    pub name: String,
    /// Personality sketch
    pub personality: Option<String>,
    /// Default mood
    pub mood: Option<String>,
    /// Voice used by the live-voice collaborator
    pub voice_id: Option<String>,
    /// Initial instruction text (pre-evolution)
    pub system_prompt: String,
    /// Creation timestamp
    pub created_at: DateTime<Utc>,
}

impl Persona {
    /// Create a new persona record
    #[must_use]
    pub fn new(name: impl Into<String>, system_prompt: impl Into<String>) -> Self {
        Self {
            id: PersonaId::new(),
            name: name.into(),
            personality: None,
            mood: None,
            voice_id: None,
            system_prompt: system_prompt.into(),
            created_at: Utc::now(),
        }
    }

    /// With personality sketch
    #[inline]
    #[must_use]
    pub fn with_personality(mut self, personality: impl Into<String>) -> Self {
        self.personality = Some(personality.into());
        self
    }

    /// With mood
    #[inline]
    #[must_use]
    pub fn with_mood(mut self, mood: impl Into<String>) -> Self {
        self.mood = Some(mood.into());
        self
    }

    /// With voice id
    #[inline]
    #[must_use]
    pub fn with_voice(mut self, voice_id: impl Into<String>) -> Self {
        self.voice_id = Some(voice_id.into());
        self
    }
}

/// A conversation setting personas are scored against
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Scenario {
    /// Unique identifier
    pub id: ScenarioId,
    /// Display name
    pub name: String,
    /// Situation description handed to the simulation
    pub context: String,
    /// Goal the persona should reach
    pub goal: Option<String>,
    /// Turn budget for one simulated conversation
    pub max_turns: u32,
    /// Creation timestamp
    pub created_at: DateTime<Utc>,
}

impl Scenario {
    /// Create a new scenario record
    #[must_use]
    pub fn new(name: impl Into<String>, context: impl Into<String>) -> Self {
        Self {
            id: ScenarioId::new(),
            name: name.into(),
            context: context.into(),
            goal: None,
            max_turns: 10,
            created_at: Utc::now(),
        }
    }

    /// With goal
    #[inline]
    #[must_use]
    pub fn with_goal(mut self, goal: impl Into<String>) -> Self {
        self.goal = Some(goal.into());
        self
    }

    /// With turn budget
    #[inline]
    #[must_use]
    pub fn with_max_turns(mut self, max_turns: u32) -> Self {
        self.max_turns = max_turns;
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn persona_builder() {
        let persona = Persona::new("Marcus", "You are a debt collection agent.")
            .with_personality("persistent but professional")
            .with_mood("calm")
            .with_voice("en-US-standard-b");

        assert_eq!(persona.name, "Marcus");
        assert_eq!(persona.mood.as_deref(), Some("calm"));
        assert!(persona.voice_id.is_some());
    }

    #[test]
    fn scenario_defaults() {
        let scenario = Scenario::new("Angry Customer", "Customer disputes the charge.");
        assert_eq!(scenario.max_turns, 10);
        assert!(scenario.goal.is_none());
    }

    #[test]
    fn scenario_builder() {
        let scenario = Scenario::new("Evasive Customer", "Customer dodges questions.")
            .with_goal("Obtain a concrete payment commitment")
            .with_max_turns(16);

        assert_eq!(scenario.max_turns, 16);
        assert!(scenario.goal.is_some());
    }
}
