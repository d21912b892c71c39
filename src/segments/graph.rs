use super::segment::{BranchTarget, Segment, SegmentId};
use crate::error::{IntakeError, Result};
use crate::fields::FieldStore;
use std::collections::HashMap;
use tracing::trace;

/// Ordered segments plus the navigator that walks them
///
/// Position is the only source of navigation order. Skip rules are pure
/// functions of the field store, so `next` and `previous` can be replayed
/// at any time with the same answers and agree with each other.
#[derive(Debug, Clone)]
pub struct SegmentGraph {
    segments: Vec<Segment>,
    positions: HashMap<SegmentId, usize>,
}

impl SegmentGraph {
    pub fn new(segments: Vec<Segment>) -> Result<Self> {
        if segments.is_empty() {
            return Err(IntakeError::Definition(
                "a flow needs at least one segment".to_string(),
            ));
        }

        let mut positions = HashMap::with_capacity(segments.len());
        for (index, segment) in segments.iter().enumerate() {
            if positions.insert(segment.id.clone(), index).is_some() {
                return Err(IntakeError::Definition(format!(
                    "duplicate segment id '{}'",
                    segment.id
                )));
            }
        }

        for (index, segment) in segments.iter().enumerate() {
            for rule in &segment.skip_rules {
                if let BranchTarget::Segment { id } = &rule.target {
                    match positions.get(id) {
                        Some(&target) if target > index => {}
                        Some(_) => {
                            return Err(IntakeError::Definition(format!(
                                "segment '{}' branches backwards to '{id}'",
                                segment.id
                            )))
                        }
                        None => {
                            return Err(IntakeError::Definition(format!(
                                "segment '{}' branches to unknown segment '{id}'",
                                segment.id
                            )))
                        }
                    }
                }
            }
        }

        Ok(Self {
            segments,
            positions,
        })
    }

    pub fn len(&self) -> usize {
        self.segments.len()
    }

    pub fn is_empty(&self) -> bool {
        self.segments.is_empty()
    }

    pub fn last_index(&self) -> usize {
        self.segments.len() - 1
    }

    pub fn segments(&self) -> &[Segment] {
        &self.segments
    }

    pub fn get(&self, index: usize) -> Option<&Segment> {
        self.segments.get(index)
    }

    pub fn index_of(&self, id: &SegmentId) -> Option<usize> {
        self.positions.get(id).copied()
    }

    pub fn segment(&self, id: &SegmentId) -> Option<&Segment> {
        self.index_of(id).and_then(|i| self.segments.get(i))
    }

    /// Distance to the next visible segment from `current`
    pub fn skip_count(&self, current: usize, store: &FieldStore) -> usize {
        let Some(segment) = self.segments.get(current) else {
            return 1;
        };

        segment
            .skip_rules
            .iter()
            .find(|rule| rule.when.evaluate(store))
            .map(|rule| match &rule.target {
                BranchTarget::SkipNext { count } => 1 + count,
                BranchTarget::Segment { id } => self
                    .index_of(id)
                    .map(|target| target.saturating_sub(current).max(1))
                    .unwrap_or(1),
            })
            .unwrap_or(1)
    }

    /// Index of the segment shown after `current`, clamped to the last one
    pub fn next(&self, current: usize, store: &FieldStore) -> usize {
        let target = current.saturating_add(self.skip_count(current, store));
        let next = target.min(self.last_index());
        trace!(from = current, to = next, "Computed next segment");
        next
    }

    /// Index of the segment shown before `current`
    ///
    /// Replays the forward path so a segment hidden on the way in stays hidden
    /// on the way back.
    pub fn previous(&self, current: usize, store: &FieldStore) -> usize {
        if current == 0 {
            return 0;
        }
        let path = self.path(store);
        match path.iter().position(|&index| index == current) {
            // path[0] is always 0, so a match here is never the first entry
            Some(position) => path[position - 1],
            None => path
                .iter()
                .rev()
                .copied()
                .find(|&index| index < current)
                .unwrap_or(0),
        }
    }

    /// Every segment a respondent with these answers would see, in order
    pub fn path(&self, store: &FieldStore) -> Vec<usize> {
        let mut path = vec![0];
        let mut current = 0;
        loop {
            let next = self.next(current, store);
            if next == current {
                break;
            }
            path.push(next);
            current = next;
        }
        path
    }
}
