use once_cell::sync::Lazy;
use serde::{Deserialize, Serialize};

/// One team. The roster is fixed at document creation; participants are never
/// added or removed, only marked dead.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Participant {
    pub id: usize,
    pub name: String,
    pub color: String,
    pub score: u32,
    pub action_points: u32,
    pub is_dead: bool,
}

impl Participant {
    pub fn new(id: usize, name: &str, color: &str) -> Self {
        Self {
            id,
            name: name.to_string(),
            color: color.to_string(),
            // Everyone starts with exactly their citadel.
            score: 1,
            action_points: 0,
            is_dead: false,
        }
    }
}

static ROSTER_TEMPLATE: Lazy<Vec<(&'static str, &'static str)>> = Lazy::new(|| {
    vec![
        ("class1", "#f8fafc"),
        ("class2", "#3b82f6"),
        ("class3", "#f97316"),
        ("class4", "#ef4444"),
        ("class5", "#22c55e"),
        ("class6", "#ec4899"),
    ]
});

pub const MAX_TEAMS: usize = 6;

/// The fixed participant list for a new game document.
pub fn team_roster(num_teams: usize) -> Vec<Participant> {
    ROSTER_TEMPLATE
        .iter()
        .take(num_teams.min(MAX_TEAMS))
        .enumerate()
        .map(|(id, (name, color))| Participant::new(id, name, color))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn roster_is_capped_at_six() {
        assert_eq!(team_roster(10).len(), 6);
        assert_eq!(team_roster(3).len(), 3);
    }

    #[test]
    fn fresh_participants_are_alive_with_one_point() {
        for (idx, p) in team_roster(6).iter().enumerate() {
            assert_eq!(p.id, idx);
            assert_eq!(p.score, 1);
            assert_eq!(p.action_points, 0);
            assert!(!p.is_dead);
        }
    }
}
