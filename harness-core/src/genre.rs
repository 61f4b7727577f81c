use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::error::SessionError;
use crate::input::ActionMap;

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Genre {
    Platformer,
    Fps,
    Racing,
    Rpg,
}

impl Genre {
    pub const ALL: [Genre; 4] = [Genre::Platformer, Genre::Fps, Genre::Racing, Genre::Rpg];

    pub fn as_str(self) -> &'static str {
        match self {
            Self::Platformer => "platformer",
            Self::Fps => "fps",
            Self::Racing => "racing",
            Self::Rpg => "rpg",
        }
    }

    /// Which learning algorithm family suits this genre.
    pub fn algorithm(self) -> Algorithm {
        match self {
            Self::Platformer => Algorithm::Dqn,
            Self::Fps => Algorithm::Ppo,
            Self::Racing => Algorithm::Sac,
            Self::Rpg => Algorithm::Hrl,
        }
    }

    pub fn action_space(self) -> ActionSpace {
        match self {
            Self::Racing => ActionSpace::Continuous { dims: 2 },
            other => ActionSpace::Discrete(other.key_names().len()),
        }
    }

    /// Key bound to each discrete action index. Empty for continuous genres.
    pub fn key_names(self) -> &'static [&'static str] {
        match self {
            Self::Platformer | Self::Rpg => &["nop", "left", "right", "space"],
            Self::Fps => &["w", "a", "s", "d", "space", "click"],
            Self::Racing => &[],
        }
    }

    pub fn action_map(self) -> ActionMap {
        ActionMap::from_names(self.key_names())
    }

    pub fn is_continuous(self) -> bool {
        matches!(self.action_space(), ActionSpace::Continuous { .. })
    }
}

impl fmt::Display for Genre {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Genre {
    type Err = SessionError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let lowered = s.trim().to_ascii_lowercase();
        Genre::ALL
            .into_iter()
            .find(|genre| genre.as_str() == lowered)
            .ok_or_else(|| SessionError::InvalidGenre {
                given: s.to_string(),
            })
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum Algorithm {
    Dqn,
    Ppo,
    Sac,
    Hrl,
}

impl Algorithm {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Dqn => "DQN",
            Self::Ppo => "PPO",
            Self::Sac => "SAC",
            Self::Hrl => "HRL",
        }
    }
}

impl fmt::Display for Algorithm {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Shape of the actions an episode accepts.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ActionSpace {
    Discrete(usize),
    Continuous { dims: usize },
}

impl ActionSpace {
    pub fn kind(self) -> &'static str {
        match self {
            Self::Discrete(_) => "discrete",
            Self::Continuous { .. } => "continuous",
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_case_insensitively() {
        assert_eq!("Platformer".parse::<Genre>(), Ok(Genre::Platformer));
        assert_eq!(" FPS ".parse::<Genre>(), Ok(Genre::Fps));
        assert_eq!(
            "chess".parse::<Genre>(),
            Err(SessionError::InvalidGenre {
                given: "chess".to_string()
            })
        );
    }

    #[test]
    fn algorithm_table() {
        let table: Vec<(Genre, &str)> = Genre::ALL
            .iter()
            .map(|genre| (*genre, genre.algorithm().as_str()))
            .collect();
        assert_eq!(
            table,
            vec![
                (Genre::Platformer, "DQN"),
                (Genre::Fps, "PPO"),
                (Genre::Racing, "SAC"),
                (Genre::Rpg, "HRL"),
            ]
        );
    }

    #[test]
    fn action_spaces_follow_key_maps() {
        assert_eq!(Genre::Platformer.action_space(), ActionSpace::Discrete(4));
        assert_eq!(Genre::Fps.action_space(), ActionSpace::Discrete(6));
        assert_eq!(Genre::Racing.action_space(), ActionSpace::Continuous { dims: 2 });
        assert!(Genre::Racing.action_map().is_empty());
        assert_eq!(Genre::Fps.action_map().len(), 6);
    }

    #[test]
    fn serializes_lowercase() {
        assert_eq!(serde_json::to_string(&Genre::Rpg).unwrap(), "\"rpg\"");
        assert_eq!(serde_json::to_string(&Algorithm::Sac).unwrap(), "\"SAC\"");
    }
}
