//! Read views of sessions for polling consumers.

use crate::models::{
    race_session::{Actor, RaceSession},
    snapshot::{ParticipantView, SessionSnapshot},
};

/// Who is looking at a session, which decides how much of it they see.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Audience {
    Public,
    Participant,
    Creator,
    Admin,
}

impl Audience {
    pub fn resolve(session: &RaceSession, actor: Option<&Actor>) -> Self {
        let Some(actor) = actor else {
            return Self::Public;
        };
        if actor.is_admin {
            Self::Admin
        } else if session.is_creator(&actor.user_id) {
            Self::Creator
        } else if session
            .participant(&actor.user_id)
            .is_some_and(|p| p.is_present())
        {
            Self::Participant
        } else {
            Self::Public
        }
    }

    pub fn sees_identities(self) -> bool {
        matches!(self, Self::Creator | Self::Admin)
    }

    /// Private races are only visible to people involved in them.
    pub fn can_view(self, session: &RaceSession) -> bool {
        session.settings.public_race || self != Self::Public
    }
}

pub fn project(session: &RaceSession, audience: Audience) -> SessionSnapshot {
    let participants = audience.sees_identities().then(|| {
        session
            .participants()
            .iter()
            .map(ParticipantView::from)
            .collect()
    });

    SessionSnapshot {
        id: session.id,
        name: session.name.clone(),
        status: session.status,
        participant_count: session.present_count(),
        max_participants: session.settings.max_participants,
        start_time: session.start_time,
        end_time: session.end_time,
        vehicle_restrictions: session.settings.vehicle_restrictions.clone(),
        public_race: session.settings.public_race,
        participants,
    }
}

/// Project every session the actor may see, in the order given.
pub fn project_all<S>(sessions: impl IntoIterator<Item = S>, actor: Option<&Actor>) -> Vec<SessionSnapshot>
where
    S: AsRef<RaceSession>,
{
    sessions
        .into_iter()
        .filter_map(|session| {
            let session = session.as_ref();
            let audience = Audience::resolve(session, actor);
            audience
                .can_view(session)
                .then(|| project(session, audience))
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::race_session::{RaceConfig, RaceSettings};
    use chrono::Utc;
    use pretty_assertions::assert_eq;
    use std::sync::Arc;

    fn session(public_race: bool) -> RaceSession {
        let config = RaceConfig {
            name: "Quarry dash".to_string(),
            settings: RaceSettings {
                max_participants: 4,
                public_race,
                vehicle_restrictions: vec!["4x4".to_string()],
            },
        };
        let mut race = RaceSession::new("owner", config, Utc::now(), 0);
        race.join("a", Utc::now()).unwrap();
        race
    }

    #[test]
    fn public_view_has_counts_only() {
        let race = session(true);
        let snapshot = project(&race, Audience::resolve(&race, None));

        assert_eq!(snapshot.participant_count, 2);
        assert_eq!(snapshot.max_participants, 4);
        assert_eq!(snapshot.vehicle_restrictions, vec!["4x4".to_string()]);
        assert!(snapshot.participants.is_none());

        let json = serde_json::to_value(&snapshot).unwrap();
        assert!(json.get("participants").is_none());
        assert!(json.get("revision").is_none());
    }

    #[test]
    fn fellow_participant_does_not_see_identities() {
        let race = session(true);
        let audience = Audience::resolve(&race, Some(&Actor::user("a")));

        assert_eq!(audience, Audience::Participant);
        assert!(project(&race, audience).participants.is_none());
    }

    #[test]
    fn creator_and_admin_see_identities() {
        let race = session(true);
        for actor in [Actor::user("owner"), Actor::admin("root")] {
            let snapshot = project(&race, Audience::resolve(&race, Some(&actor)));
            let ids: Vec<String> = snapshot
                .participants
                .unwrap()
                .into_iter()
                .map(|p| p.user_id)
                .collect();
            assert_eq!(ids, vec!["owner".to_string(), "a".to_string()]);
        }
    }

    #[test]
    fn project_all_hides_private_races_from_the_public() {
        let public = Arc::new(session(true));
        let private = Arc::new(session(false));
        let sessions = vec![public.clone(), private.clone()];

        let anonymous = project_all(sessions.iter().cloned(), None);
        assert_eq!(anonymous.len(), 1);
        assert_eq!(anonymous[0].id, public.id);

        let admin = project_all(sessions, Some(&Actor::admin("root")));
        assert_eq!(admin.len(), 2);
    }
}
