//! The cached range of one list.

use std::collections::HashMap;

use crate::rest::Id;

use super::traits::Entity;

/// One contiguous, gap-free region of a list.
///
/// ```text
/// |          <|>        c d e f g h i j k      <|>             |
/// MIN       lower          ids in range        upper         MAX
/// ```
///
/// Every element that exists on the server strictly between `lower` and
/// `upper` is in `ids`. A bound may itself be an id that was only used as a
/// request start and never loaded. `lower` is MIN once the server has proven
/// there is nothing below the first id; `upper` is MAX once it has proven
/// there is nothing above the last one.
#[derive(Debug, Clone)]
pub struct RangeRecord<E> {
  lower: Id,
  upper: Id,
  /// Ascending, no duplicates
  ids: Vec<Id>,
  elements: HashMap<Id, E>,
}

/// How a range request relates to the cached range.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum RangePlan {
  /// Throw the range away and load fresh from the request start
  Reset,
  /// The start lies within the bounds
  Inside,
  /// The start lies beyond the bounds in the direction of travel
  Outside,
  /// The start lies before the bounds in the direction of travel
  Invalid,
}

/// What still has to be loaded from the server.
#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) struct Gap {
  pub start: Id,
  pub count: usize,
}

impl<E: Entity> RangeRecord<E> {
  /// An empty range whose bounds are both `start`.
  pub fn new(start: Id) -> Self {
    Self {
      lower: start.clone(),
      upper: start,
      ids: Vec::new(),
      elements: HashMap::new(),
    }
  }

  #[cfg(test)]
  pub(crate) fn from_parts(lower: Id, upper: Id, entities: Vec<E>) -> Self {
    let mut record = Self::new(lower);
    record.upper = upper;
    for entity in entities {
      record.insert(entity);
    }
    record
  }

  /// A range holding exactly one known element.
  pub fn single(entity: E) -> Self {
    let id = entity.element_id().clone();
    let mut elements = HashMap::new();
    elements.insert(id.clone(), entity);
    Self {
      lower: id.clone(),
      upper: id.clone(),
      ids: vec![id],
      elements,
    }
  }

  pub fn lower(&self) -> &Id {
    &self.lower
  }

  pub fn upper(&self) -> &Id {
    &self.upper
  }

  pub fn ids(&self) -> &[Id] {
    &self.ids
  }

  pub fn get(&self, id: &Id) -> Option<&E> {
    self.elements.get(id)
  }

  pub fn contains(&self, id: &Id) -> bool {
    self.elements.contains_key(id)
  }

  /// `lower <= id <= upper`
  pub fn in_bounds(&self, id: &Id) -> bool {
    &self.lower <= id && id <= &self.upper
  }

  /// `lower < id < upper`: an element created here must show up in `ids`.
  pub fn strictly_within(&self, id: &Id) -> bool {
    &self.lower < id && id < &self.upper
  }

  /// Store an element within the bounds; storing an id twice overwrites the
  /// element and keeps a single id. An element outside the bounds is handed
  /// back untouched.
  pub fn insert(&mut self, entity: E) -> Option<E> {
    let id = entity.element_id().clone();
    if !self.in_bounds(&id) {
      return Some(entity);
    }
    if let Err(pos) = self.ids.binary_search(&id) {
      self.ids.insert(pos, id.clone());
    }
    self.elements.insert(id, entity);
    None
  }

  /// Drop an element. The bounds stay where they are.
  pub fn remove(&mut self, id: &Id) -> bool {
    if let Ok(pos) = self.ids.binary_search(id) {
      self.ids.remove(pos);
    }
    self.elements.remove(id).is_some()
  }

  pub(crate) fn plan(&self, start: &Id, reverse: bool) -> RangePlan {
    if (start.is_max() && reverse && !self.upper.is_max())
      || (start.is_min() && !reverse && !self.lower.is_min())
    {
      RangePlan::Reset
    } else if self.in_bounds(start) {
      RangePlan::Inside
    } else if (!reverse && start > &self.upper) || (reverse && start < &self.lower) {
      RangePlan::Outside
    } else {
      RangePlan::Invalid
    }
  }

  /// Where to continue loading in the direction of travel: the outermost
  /// known id on that side, or the opposite bound if nothing is known.
  pub(crate) fn fetch_edge(&self, reverse: bool) -> &Id {
    if reverse {
      self.ids.first().unwrap_or(&self.upper)
    } else {
      self.ids.last().unwrap_or(&self.lower)
    }
  }

  /// Number of elements missing to answer `count` elements from `start`,
  /// and the id to load them from. Expects `start` to be within the bounds.
  pub(crate) fn gap(&self, start: &Id, count: usize, reverse: bool) -> Gap {
    let exhausted = if reverse {
      self.lower.is_min()
    } else {
      self.upper.is_max()
    };
    if exhausted {
      return Gap {
        start: start.clone(),
        count: 0,
      };
    }

    Gap {
      start: self.fetch_edge(reverse).clone(),
      count: count.saturating_sub(self.available(start, reverse)),
    }
  }

  /// Number of cached ids after `start` (before it when `reverse`).
  pub(crate) fn available(&self, start: &Id, reverse: bool) -> usize {
    if reverse {
      self.ids.partition_point(|id| id < start)
    } else {
      self.ids.len() - self.ids.partition_point(|id| id <= start)
    }
  }

  /// Merge the answer to a request for `requested` elements.
  ///
  /// `fetched` is in the order the server returned it. Fewer than requested
  /// means the server ran out, so the bound on that side becomes MIN/MAX.
  pub(crate) fn merge(&mut self, mut fetched: Vec<E>, requested: usize, reverse: bool) {
    let exhausted = fetched.len() < requested;
    if reverse {
      fetched.reverse();
      let lower = if exhausted {
        Some(Id::min())
      } else {
        fetched.first().map(|e| e.element_id().clone())
      };
      if let Some(lower) = lower.filter(|lower| lower < &self.lower) {
        self.lower = lower;
      }
    } else {
      let upper = if exhausted {
        Some(Id::max())
      } else {
        fetched.last().map(|e| e.element_id().clone())
      };
      if let Some(upper) = upper.filter(|upper| upper > &self.upper) {
        self.upper = upper;
      }
    }

    // Anything the server sent outside the widened bounds is not kept.
    for entity in fetched {
      self.insert(entity);
    }
  }

  /// Up to `count` cached elements after `start` (before it when `reverse`),
  /// in the order of travel. `start` itself is never part of the answer.
  pub fn provide(&self, start: &Id, count: usize, reverse: bool) -> Vec<E> {
    let ids: Vec<&Id> = if reverse {
      let end = self.ids.partition_point(|id| id < start);
      self.ids[end.saturating_sub(count)..end].iter().rev().collect()
    } else {
      let begin = self.ids.partition_point(|id| id <= start);
      let end = begin.saturating_add(count).min(self.ids.len());
      self.ids[begin..end].iter().collect()
    };

    ids
      .into_iter()
      .filter_map(|id| self.elements.get(id).cloned())
      .collect()
  }
}
