use serde::{Deserialize, Serialize};

/// Whether we are maximizing or minimizing the objective.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Direction {
    Maximize,
    Minimize,
}

impl Direction {
    /// True when `candidate` is strictly better than `incumbent`.
    pub fn improves(self, candidate: f64, incumbent: f64) -> bool {
        match self {
            Direction::Maximize => candidate > incumbent,
            Direction::Minimize => candidate < incumbent,
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Direction::Maximize => "maximize",
            Direction::Minimize => "minimize",
        }
    }
}

impl Default for Direction {
    fn default() -> Self {
        Self::Minimize
    }
}

impl std::fmt::Display for Direction {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// The metric a study optimizes and which way.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ObjectiveSpec {
    pub metric_name: String,
    pub direction: Direction,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn improves_respects_direction() {
        assert!(Direction::Maximize.improves(0.9, 0.8));
        assert!(!Direction::Maximize.improves(0.8, 0.8));
        assert!(Direction::Minimize.improves(0.1, 0.2));
        assert!(!Direction::Minimize.improves(0.3, 0.2));
    }

    #[test]
    fn direction_serializes_lowercase() {
        assert_eq!(
            serde_json::to_string(&Direction::Maximize).unwrap(),
            "\"maximize\""
        );
        assert_eq!(Direction::Minimize.to_string(), "minimize");
    }
}
