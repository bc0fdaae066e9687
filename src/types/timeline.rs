//! The timeline model consumed by the layout engine.
//!
//! An arena of entities and sessions plus the entity×timestamp session
//! table. All cross references are ids; the model is immutable once built.

use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet};

use super::entity::{Entity, EntityId};
use super::grid::Grid;
use super::session::{Session, SessionId, SessionKind};

/// Error raised when a timeline model is inconsistent.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum ModelError {
    /// The model has no timestamps or no entities.
    #[error("Timeline model is empty")]
    Empty,
    /// Ego index outside the entity arena.
    #[error("Ego {0} is not an entity of the model")]
    EgoOutOfRange(EntityId),
    /// An entity is stored at a different index than its id.
    #[error("Entity at index {index} carries id {id}")]
    EntityIndexMismatch {
        /// Arena index.
        index: usize,
        /// Id found there.
        id: EntityId,
    },
    /// Session table shape does not match entities × timestamps.
    #[error("Session table is {rows}x{columns}, expected {expected_rows}x{expected_columns}")]
    TableShape {
        /// Actual rows.
        rows: usize,
        /// Actual columns.
        columns: usize,
        /// Entity count.
        expected_rows: usize,
        /// Timestamp count.
        expected_columns: usize,
    },
    /// Two sessions share an id.
    #[error("Duplicate session id {0}")]
    DuplicateSession(SessionId),
    /// The table references a session that does not exist.
    #[error("Unknown session {session} for {entity} at timestamp {timestamp}")]
    UnknownSession {
        /// Referenced session.
        session: SessionId,
        /// Entity row.
        entity: EntityId,
        /// Column.
        timestamp: usize,
    },
    /// An idle session must hold exactly one entity.
    #[error("Idle session {session} has {members} members")]
    IdleSessionNotSingleton {
        /// Offending session.
        session: SessionId,
        /// Member count.
        members: usize,
    },
    /// Table and session membership disagree.
    #[error("Session {session} disagrees with the table for {entity} at timestamp {timestamp}")]
    MembershipMismatch {
        /// Session.
        session: SessionId,
        /// Entity.
        entity: EntityId,
        /// Column.
        timestamp: usize,
    },
    /// More than one contact session at a timestamp.
    #[error("Timestamp {timestamp} has contact sessions {first} and {second}")]
    MultipleContactSessions {
        /// Column.
        timestamp: usize,
        /// First contact session.
        first: SessionId,
        /// Second contact session.
        second: SessionId,
    },
    /// Every contact session is an ego session.
    #[error("Contact session {0} does not contain the ego")]
    ContactWithoutEgo(SessionId),
    /// The ego line must exist at every timestamp.
    #[error("Ego is absent at timestamp {0}")]
    EgoAbsent(usize),
}

/// Presence of an entity at a timestamp.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Presence {
    /// Not part of the storyline yet (or any more).
    Absent,
    /// Interacting in a contact session.
    Contact,
    /// Waiting in an idle session.
    Idle,
}

/// Entity×timestamp description of an egocentric dynamic network.
///
/// Deserialization goes through [`TimelineModel::new`], so a decoded model
/// is validated like a constructed one.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(try_from = "RawTimelineModel")]
pub struct TimelineModel {
    entities: Vec<Entity>,
    timestamps: Vec<String>,
    ego: EntityId,
    sessions: BTreeMap<SessionId, Session>,
    session_table: Grid<Option<SessionId>>,
}

#[derive(Deserialize)]
struct RawTimelineModel {
    entities: Vec<Entity>,
    timestamps: Vec<String>,
    ego: EntityId,
    sessions: BTreeMap<SessionId, Session>,
    session_table: Grid<Option<SessionId>>,
}

impl TryFrom<RawTimelineModel> for TimelineModel {
    type Error = ModelError;

    fn try_from(raw: RawTimelineModel) -> Result<Self, Self::Error> {
        Self::new(
            raw.entities,
            raw.timestamps,
            raw.ego,
            raw.sessions.into_values().collect(),
            raw.session_table,
        )
    }
}

impl TimelineModel {
    /// Build and validate a model.
    pub fn new(
        entities: Vec<Entity>,
        timestamps: Vec<String>,
        ego: EntityId,
        sessions: Vec<Session>,
        session_table: Grid<Option<SessionId>>,
    ) -> Result<Self, ModelError> {
        if entities.is_empty() || timestamps.is_empty() {
            return Err(ModelError::Empty);
        }
        if ego.index() >= entities.len() {
            return Err(ModelError::EgoOutOfRange(ego));
        }
        if let Some((index, entity)) = entities.iter().enumerate().find(|(i, e)| e.id.index() != *i) {
            return Err(ModelError::EntityIndexMismatch { index, id: entity.id });
        }
        if session_table.rows() != entities.len() || session_table.columns() != timestamps.len() {
            return Err(ModelError::TableShape {
                rows: session_table.rows(),
                columns: session_table.columns(),
                expected_rows: entities.len(),
                expected_columns: timestamps.len(),
            });
        }

        let mut by_id = BTreeMap::new();
        for session in sessions {
            if session.is_idle() && session.members().len() != 1 {
                return Err(ModelError::IdleSessionNotSingleton {
                    session: session.id,
                    members: session.members().len(),
                });
            }
            if session.kind == SessionKind::Contact && session.identity(ego).is_none() {
                return Err(ModelError::ContactWithoutEgo(session.id));
            }
            let id = session.id;
            if by_id.insert(id, session).is_some() {
                return Err(ModelError::DuplicateSession(id));
            }
        }

        let model = Self {
            entities,
            timestamps,
            ego,
            sessions: by_id,
            session_table,
        };
        model.validate_table()?;
        Ok(model)
    }

    fn validate_table(&self) -> Result<(), ModelError> {
        for t in 0..self.num_timestamps() {
            let mut contact: Option<SessionId> = None;
            for row in 0..self.num_entities() {
                let entity = EntityId::new(row);
                let Some(sid) = *self.session_table.get(row, t) else {
                    continue;
                };
                let session = self.sessions.get(&sid).ok_or(ModelError::UnknownSession {
                    session: sid,
                    entity,
                    timestamp: t,
                })?;
                let placed = session.contains(entity)
                    && (session.is_idle() || session.timestamp == Some(t));
                if !placed {
                    return Err(ModelError::MembershipMismatch { session: sid, entity, timestamp: t });
                }
                if session.kind == SessionKind::Contact {
                    match contact {
                        Some(first) if first != sid => {
                            return Err(ModelError::MultipleContactSessions {
                                timestamp: t,
                                first,
                                second: sid,
                            });
                        }
                        _ => contact = Some(sid),
                    }
                }
            }
            if self.session_at(self.ego, t).is_none() {
                return Err(ModelError::EgoAbsent(t));
            }
        }

        // Every contact member must point back at its session.
        for session in self.sessions.values().filter(|s| !s.is_idle()) {
            let Some(t) = session.timestamp else {
                continue;
            };
            for &entity in session.members() {
                let listed = t < self.num_timestamps()
                    && entity.index() < self.num_entities()
                    && self.session_at(entity, t) == Some(session.id);
                if !listed {
                    return Err(ModelError::MembershipMismatch {
                        session: session.id,
                        entity,
                        timestamp: t,
                    });
                }
            }
        }
        Ok(())
    }

    /// Number of entities.
    pub fn num_entities(&self) -> usize {
        self.entities.len()
    }

    /// Number of (effective) timestamps.
    pub fn num_timestamps(&self) -> usize {
        self.timestamps.len()
    }

    /// The ego.
    pub fn ego(&self) -> EntityId {
        self.ego
    }

    /// All entities in id order.
    pub fn entities(&self) -> &[Entity] {
        &self.entities
    }

    /// Entity by id.
    pub fn entity(&self, id: EntityId) -> &Entity {
        &self.entities[id.index()]
    }

    /// Look an entity up by display name.
    pub fn entity_by_name(&self, name: &str) -> Option<&Entity> {
        self.entities.iter().find(|e| e.name == name)
    }

    /// Timestamp labels, one per column.
    pub fn timestamps(&self) -> &[String] {
        &self.timestamps
    }

    /// Session by id.
    pub fn session(&self, id: SessionId) -> Option<&Session> {
        self.sessions.get(&id)
    }

    /// All sessions in id order.
    pub fn sessions(&self) -> impl Iterator<Item = &Session> {
        self.sessions.values()
    }

    /// The raw session table.
    pub fn session_table(&self) -> &Grid<Option<SessionId>> {
        &self.session_table
    }

    /// Session of `entity` at `timestamp`.
    pub fn session_at(&self, entity: EntityId, timestamp: usize) -> Option<SessionId> {
        *self.session_table.get(entity.index(), timestamp)
    }

    /// Presence of `entity` at `timestamp`.
    pub fn presence(&self, entity: EntityId, timestamp: usize) -> Presence {
        match self.session_at(entity, timestamp) {
            None => Presence::Absent,
            Some(sid) if self.is_idle(sid) => Presence::Idle,
            Some(_) => Presence::Contact,
        }
    }

    /// Whether `session` is an idle placeholder.
    pub fn is_idle(&self, session: SessionId) -> bool {
        self.sessions.get(&session).map(Session::is_idle).unwrap_or(false)
    }

    /// Ids of all idle sessions.
    pub fn idle_sessions(&self) -> BTreeSet<SessionId> {
        self.sessions
            .values()
            .filter(|s| s.is_idle())
            .map(|s| s.id)
            .collect()
    }

    /// Distinct sessions present at `timestamp`, ascending.
    pub fn sessions_at(&self, timestamp: usize) -> Vec<SessionId> {
        let ids: BTreeSet<SessionId> = (0..self.num_entities())
            .filter_map(|row| *self.session_table.get(row, timestamp))
            .collect();
        ids.into_iter().collect()
    }

    /// Entities in `session` at `timestamp`, ascending by id.
    pub fn members_at(&self, session: SessionId, timestamp: usize) -> Vec<EntityId> {
        (0..self.num_entities())
            .filter(|&row| *self.session_table.get(row, timestamp) == Some(session))
            .map(EntityId::new)
            .collect()
    }

    /// Columns where `entity` exists.
    pub fn lifetime(&self, entity: EntityId) -> Vec<usize> {
        (0..self.num_timestamps())
            .filter(|&t| self.session_at(entity, t).is_some())
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::session::{HopPartition, WeightGroup};

    fn e(i: usize) -> EntityId {
        EntityId::new(i)
    }

    fn entities(n: usize) -> Vec<Entity> {
        (0..n).map(|i| Entity::new(e(i), format!("n{i}"))).collect()
    }

    fn contact(id: u32, t: usize, sources: Vec<usize>, ego: usize) -> Session {
        let mut hops = HopPartition::ego_only(e(ego));
        if !sources.is_empty() {
            hops.sources = vec![WeightGroup::new(1, sources.into_iter().map(e).collect())];
        }
        Session::contact(SessionId::new(id), t, hops, Vec::new())
    }

    fn s(id: u32) -> Option<SessionId> {
        Some(SessionId::new(id))
    }

    /// e0 is ego, e1 interacts at t0 and t2 and idles at t1.
    fn idle_gap_model() -> TimelineModel {
        let table = Grid::from_rows(vec![vec![s(1), s(2), s(3)], vec![s(1), s(4), s(3)]]).unwrap();
        let sessions = vec![
            contact(1, 0, vec![1], 0),
            contact(2, 1, vec![], 0),
            contact(3, 2, vec![1], 0),
            Session::idle(SessionId::new(4), e(1)),
        ];
        let labels = vec!["a".to_string(), "b".to_string(), "c".to_string()];
        TimelineModel::new(entities(2), labels, e(0), sessions, table).unwrap()
    }

    #[test]
    fn test_valid_model_with_idle_gap() {
        let model = idle_gap_model();

        assert_eq!(model.presence(e(1), 0), Presence::Contact);
        assert_eq!(model.presence(e(1), 1), Presence::Idle);
        assert_eq!(model.sessions_at(1), vec![SessionId::new(2), SessionId::new(4)]);
        assert_eq!(model.idle_sessions().len(), 1);
        assert_eq!(model.lifetime(e(1)), vec![0, 1, 2]);
    }

    #[test]
    fn test_rejects_absent_ego() {
        let table = Grid::from_rows(vec![vec![s(1), None], vec![s(1), None]]).unwrap();
        let sessions = vec![contact(1, 0, vec![1], 0)];
        let labels = vec!["a".to_string(), "b".to_string()];
        let err = TimelineModel::new(entities(2), labels, e(0), sessions, table).unwrap_err();
        assert_eq!(err, ModelError::EgoAbsent(1));
    }

    #[test]
    fn test_rejects_unknown_session() {
        let table = Grid::from_rows(vec![vec![s(1)], vec![s(7)]]).unwrap();
        let sessions = vec![contact(1, 0, vec![], 0)];
        let err = TimelineModel::new(entities(2), vec!["a".to_string()], e(0), sessions, table).unwrap_err();
        assert!(matches!(err, ModelError::UnknownSession { .. }));
    }

    #[test]
    fn test_rejects_contact_member_missing_from_table() {
        let table = Grid::from_rows(vec![vec![s(1)], vec![None]]).unwrap();
        let sessions = vec![contact(1, 0, vec![1], 0)];
        let err = TimelineModel::new(entities(2), vec!["a".to_string()], e(0), sessions, table).unwrap_err();
        assert!(matches!(err, ModelError::MembershipMismatch { .. }));
    }

    #[test]
    fn test_rejects_shape_mismatch() {
        let table = Grid::from_rows(vec![vec![s(1), s(1)]]).unwrap();
        let sessions = vec![contact(1, 0, vec![], 0)];
        let err = TimelineModel::new(entities(1), vec!["a".to_string()], e(0), sessions, table).unwrap_err();
        assert!(matches!(err, ModelError::TableShape { .. }));
    }

    #[test]
    fn test_deserialize_validates_model() {
        let model = idle_gap_model();
        let json = serde_json::to_value(&model).unwrap();
        let restored: TimelineModel = serde_json::from_value(json.clone()).unwrap();
        assert_eq!(restored.session_table(), model.session_table());
        assert_eq!(restored.idle_sessions(), model.idle_sessions());

        let mut bad_ego = json.clone();
        bad_ego["ego"] = serde_json::json!(7);
        assert!(serde_json::from_value::<TimelineModel>(bad_ego).is_err());

        let mut bad_cells = json;
        bad_cells["session_table"]["cells"] = serde_json::json!([]);
        assert!(serde_json::from_value::<TimelineModel>(bad_cells).is_err());
    }
}
