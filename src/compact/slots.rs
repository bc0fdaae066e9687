//! Slot construction: vertical tracks sessions occupy across timestamps.

use std::collections::BTreeSet;

use crate::engine::LayoutError;
use crate::types::{OrderedTimeline, SessionAlignment, SessionId, SlotTable, TimelineModel};

/// Build the slot table.
///
/// The first timestamp opens one slot per session. Every later timestamp
/// fills, in this order:
///
/// 1. the ego slot with the ego's session;
/// 2. every other slot with the alignment target of its previous session;
/// 3. free slots, walking outward from the ego, with unplaced sessions
///    above (closest to the ego first) and below the ego;
/// 4. new slots for whatever is left, inserted next to the session ordered
///    just before it.
pub fn construct_slots(
    model: &TimelineModel,
    ordered: &OrderedTimeline,
    alignment: &SessionAlignment,
) -> Result<SlotTable, LayoutError> {
    let ego = model.ego();
    let ego_session = |t: usize| model.session_at(ego, t).ok_or(LayoutError::EgoNotPlaced(t));

    let first = ordered.sessions.first().ok_or(LayoutError::EgoNotPlaced(0))?;
    let mut tracks: Vec<Vec<Option<SessionId>>> = first.iter().map(|&s| vec![Some(s)]).collect();
    let mut ego_slot = first
        .iter()
        .position(|&s| Some(s) == model.session_at(ego, 0))
        .ok_or(LayoutError::EgoNotPlaced(0))?;

    for t in 1..ordered.num_timestamps() {
        let ego_sid = ego_session(t)?;
        let sessions = &ordered.sessions[t];
        let ego_order = sessions
            .iter()
            .position(|&s| s == ego_sid)
            .ok_or(LayoutError::EgoNotPlaced(t))?;

        let mut dealt: BTreeSet<SessionId> = BTreeSet::from([ego_sid]);
        for (slot, track) in tracks.iter_mut().enumerate() {
            if slot == ego_slot {
                track.push(Some(ego_sid));
                continue;
            }
            let next = track[t - 1]
                .and_then(|prev| alignment.target(t - 1, prev))
                .filter(|&s| s != ego_sid);
            if let Some(s) = next {
                dealt.insert(s);
            }
            track.push(next);
        }

        let mut unassigned: BTreeSet<SessionId> = sessions.iter().copied().filter(|s| !dealt.contains(s)).collect();
        let above: Vec<SessionId> = sessions[..ego_order].iter().copied().filter(|s| unassigned.contains(s)).collect();
        let below: Vec<SessionId> = sessions[ego_order + 1..].iter().copied().filter(|s| unassigned.contains(s)).collect();

        for session in above.into_iter().rev() {
            if let Some(slot) = (0..ego_slot).rev().find(|&slot| tracks[slot][t].is_none()) {
                tracks[slot][t] = Some(session);
                unassigned.remove(&session);
            }
        }
        for session in below {
            if let Some(slot) = (ego_slot + 1..tracks.len()).find(|&slot| tracks[slot][t].is_none()) {
                tracks[slot][t] = Some(session);
                unassigned.remove(&session);
            }
        }

        let mut remaining: Vec<(usize, SessionId)> = sessions
            .iter()
            .enumerate()
            .filter(|(_, s)| unassigned.contains(s))
            .map(|(order, &s)| (order, s))
            .collect();
        remaining.sort_by_key(|&(order, _)| order);

        for (order, session) in remaining {
            let mut track = vec![None; t];
            track.push(Some(session));
            if order == 0 {
                tracks.insert(0, track);
                ego_slot += 1;
            } else if order == sessions.len() - 1 {
                tracks.push(track);
            } else {
                let before = sessions[order - 1];
                match tracks.iter().position(|tr| tr[t] == Some(before)) {
                    Some(prev) => {
                        tracks.insert(prev + 1, track);
                        if prev < ego_slot {
                            ego_slot += 1;
                        }
                    }
                    None => tracks.push(track),
                }
            }
        }
    }

    tracing::debug!(slots = tracks.len(), ego_slot, "Slots constructed");
    Ok(SlotTable { tracks, ego_slot })
}
